//! Point schemas, record layouts and field accessors

pub mod accessor;
pub mod records;
pub mod schema;
pub mod source;

pub use accessor::{PointAccessor, PointRecord};
pub use records::*;
pub use schema::{Capabilities, PointSchema};
pub use source::{PointSource, PrepareOptions, XyzSource, prepare_points};
