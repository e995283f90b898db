//! nicflow Gcore Cloud backend
//!
//! Implements the nicflow-core API traits on top of the Gcore Cloud v1 REST
//! API and decodes untyped interface definitions at the resource boundary.
//!
//! Failures are tagged for the retry wrapper: authorization failures and
//! messages listed in [`PERMANENT_ERROR_MARKERS`] are permanent, everything
//! else is treated as transient.

pub mod client;
pub mod compute;
pub mod decode;
pub mod error;
pub mod ports;
pub mod reserved_fixed_ip;

pub use client::{ClientConfig, DEFAULT_TOKEN_ENV, GCORE_API_BASE, GcoreClient};
pub use decode::{decode_interface, decode_interfaces};
pub use error::{GcoreError, PERMANENT_ERROR_MARKERS, Result};
