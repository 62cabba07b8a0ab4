//! Presentation Layer
//!
//! The session handle UI code drives.

pub mod handle;

pub use handle::{HandleError, SessionHandle};
