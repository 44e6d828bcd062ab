//! Upstream forwarder
//!
//! - [`params`] - Form decoding and per-parameter rewriting
//! - [`forward`] - Outbound URL construction and response relay
//! - [`relay`] - Body stream wrapper that logs how a transfer ended

pub mod forward;
pub mod params;
pub mod relay;

pub use forward::Forwarder;
pub use params::{Form, parse_form, rewrite_params};
