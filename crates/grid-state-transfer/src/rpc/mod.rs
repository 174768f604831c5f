//! # RPC Layer
//!
//! Transport-facing surface: frame handling and request dispatch.

pub mod handler;

pub use handler::StateRequestDispatcher;
