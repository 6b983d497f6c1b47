pub mod attributes;
pub mod batch;
pub mod error;
pub mod record;

pub use attributes::{AttrValue, AttributeMap, ToAttributes};
pub use batch::{Batch, NO_OFFSET};
pub use error::{Error, Result};
pub use record::Record;
