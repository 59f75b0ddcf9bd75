//! # qrserve
//!
//! A small HTTP service that turns a text payload into a QR code image.
//!
//! `qrserve` validates the caller's rendering options, encodes the payload into
//! a QR module matrix and renders that matrix as a PNG bitmap or a standalone
//! SVG document. Every step is a pure function of the request, so identical
//! requests always produce byte-identical images.
//!
//! ## Features
//!
//! - Error correction levels L, M, Q and H (default H).
//! - Automatic or pinned symbol version (1 to 40) and mask pattern (0 to 7).
//! - UTF-8, ISO-8859-1 and US-ASCII payload charsets.
//! - Exact pixel sizing or pixels-per-module sizing, with a configurable quiet zone.
//! - Custom dark and light colours.
//! - PNG or SVG output.
//!
//! ## Endpoint
//!
//! ```text
//! GET /qr?data=Hello&width=300&height=300&margin=1&errorCorrection=H
//!        &charset=UTF-8&qrVersion=5&maskPattern=3&darkColor=%23000&lightColor=%23fff&format=png
//! ```
//!
//! Invalid dimensions and (under the strict policy) a missing payload are
//! rejected with `400`; every other malformed option falls back to its default.
//!
//! ## Example
//!
//! Render a QR code without going through HTTP:
//!
//! ```rust
//! use std::collections::HashMap;
//! use qrserve::{config::ServiceConfig, pipeline::Pipeline};
//!
//! let pipeline = Pipeline::from_config(&ServiceConfig::default());
//! let mut params = HashMap::new();
//! params.insert("data".to_string(), "https://example.com".to_string());
//! params.insert("format".to_string(), "svg".to_string());
//!
//! let response = pipeline.run(&params).unwrap();
//! assert_eq!(response.content_type(), "image/svg+xml");
//! ```
//!
//! ## Modules
//!
//! - [`params`]: Query parameter validation.
//! - [`encoder`]: Payload to module matrix.
//! - [`render`]: Module matrix to PNG or SVG.
//! - [`pipeline`]: The three stages wired together.
//! - [`server`]: The axum router.
//! - [`config`]: Service configuration.

#![forbid(unsafe_code)]

pub mod charset;
pub mod color;
pub mod config;
pub mod encoder;
pub mod error;
pub mod params;
pub mod pipeline;
pub mod render;
pub mod server;

pub use error::{EncodingError, PipelineError, RenderError, ValidationError};
pub use pipeline::Pipeline;
