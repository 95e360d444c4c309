#![doc = include_str!("../README.md")]

mod error;
mod options;
pub mod prelude;

pub mod format;
pub mod nav;
pub mod record;
pub mod report;
pub mod run;
pub mod summary;

pub use error::{Error, ErrorKind, Result};
pub use format::{FormatHint, Registry};
pub use nav::LonFlip;
pub use options::Options;
pub use report::{Report, Style};
pub use run::{summarize_batch, summarize_file, Batch, CancelToken, Entry, Run, RunState};
pub use summary::Summary;
