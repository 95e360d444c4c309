pub use crate::error::{Error, ErrorKind, Result};
