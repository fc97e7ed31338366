//! Meshforge Render Client
//!
//! This crate talks to the remote render service: it submits extracted model
//! code as JSON and classifies the outcome into raw mesh bytes or a
//! structured [`RenderError`].
//!
//! The client performs exactly one attempt per call. Retry policy, if any,
//! belongs to the caller.

pub mod client;
pub mod error;

pub use client::RenderClient;
pub use error::RenderError;
