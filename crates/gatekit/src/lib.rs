//! # gatekit
//!
//! Blocking client handle for the Spinnaker Gate API.
//!
//! This crate provides:
//! - The [`Gate`] trait, a minimal "send a request, get a raw response" seam
//! - [`HttpGate`], backed by `ureq`, with TLS, redirect, header and timeout settings
//! - [`MockGate`], a scripted in-memory implementation for tests
//! - Wire types for task references and task status polling
//!
//! The handle deliberately does not interpret HTTP status codes. Deciding what
//! a `404` means for a given resource is the caller's job.
//!
//! ## Example
//!
//! ```no_run
//! use gatekit::{Gate, GateConfig, GateRequest, HttpGate};
//!
//! let config = GateConfig::new("https://gate.example.com")
//!     .headers_from_str("X-Team=platform")
//!     .unwrap();
//! let gate = HttpGate::new(config).unwrap();
//!
//! let response = gate.send(&GateRequest::get("/applications/demo")).unwrap();
//! if response.status == 404 {
//!     println!("demo does not exist yet");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod error;
pub mod types;

pub use backend::http::HttpGate;
pub use backend::{Gate, MockGate};
pub use config::{GateConfig, parse_headers};
pub use error::{Error, ErrorCategory, Result};
pub use types::{
    GateRequest, Method, RawResponse, TaskAccepted, TaskRef, TaskState, TaskStatus, TaskVariable,
};
