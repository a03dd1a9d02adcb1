pub mod error;

pub use error::{FormError, Result};
