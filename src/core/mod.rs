//! Core library components.
//!
//! Store drivers and the watch state machine, the envelope codec, and the
//! config manager that joins them.

pub mod codec;
pub mod config;
pub mod constants;
pub mod manager;
pub mod store;
pub mod types;
