//! # Domain Module
//!
//! Core types and pure logic for state transfer: the request envelope, its
//! wire codec, the subsystem error enum, and side-effect-free services.

pub mod errors;
pub mod invariants;
pub mod request;
pub mod services;
pub mod wire;

pub use errors::*;
pub use invariants::*;
pub use request::*;
pub use services::*;
