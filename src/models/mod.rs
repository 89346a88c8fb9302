pub mod aggregation;
pub mod filters;
pub mod geo;
pub mod property;
pub mod request;
pub mod response;

pub use aggregation::*;
pub use filters::*;
pub use geo::*;
pub use property::*;
pub use request::*;
pub use response::*;
