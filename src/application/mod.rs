//! Application Layer
//!
//! Session components, the runtime that drives them, and the view models
//! handed to the presentation layer.

pub mod dto;
pub mod services;
pub mod session;
