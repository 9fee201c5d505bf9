// Generic plumbing shared by the flvdemux crates: typed errors and test
// init. No FLV-specific knowledge lives here.

mod error;
pub mod testutil;

pub use crate::error::{Error, ErrorKind};
