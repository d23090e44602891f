pub mod date_range;
pub mod error;
pub mod frequency;
pub mod record;
pub mod schema;
pub mod source;

pub use error::{AlloError, Result};
