//! Request orchestration: validate, encode, render.
//!
//! Each call to [`Pipeline::run`] walks `Validating -> Encoding -> Rendering`
//! and stops at the first failure. Nothing is shared between calls apart from
//! the immutable collaborators, so any number of requests can run in parallel.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::config::ServiceConfig;
use crate::encoder::{QrcodeEncoder, SymbolEncoder, SymbolParams};
use crate::error::PipelineError;
use crate::params::ParameterValidator;
use crate::render::{ImageRenderer, RenderSpec, RenderedImage};

/// Where a request is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Encoding,
    Rendering,
    Responding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Encoding => "encoding",
            Stage::Rendering => "rendering",
            Stage::Responding => "responding",
        };
        f.write_str(name)
    }
}

/// A finished image, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrResponse {
    pub image: RenderedImage,
}

impl QrResponse {
    pub fn content_type(&self) -> &'static str {
        self.image.content_type()
    }

    /// Asks clients to display the image rather than download it.
    pub fn content_disposition(&self) -> String {
        let ext = self.image.format.extension();
        format!("inline; filename=\"qrcode.{ext}\"")
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.image.bytes
    }
}

/// Validator, encoder and renderer wired together.
#[derive(Clone)]
pub struct Pipeline {
    validator: ParameterValidator,
    encoder: Arc<dyn SymbolEncoder>,
    renderer: Arc<dyn ImageRenderer>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        validator: ParameterValidator,
        encoder: Arc<dyn SymbolEncoder>,
        renderer: Arc<dyn ImageRenderer>,
    ) -> Pipeline {
        Pipeline {
            validator,
            encoder,
            renderer,
        }
    }

    /// The `qrcode`-backed encoder and the built-in renderer, configured
    /// from `config`.
    pub fn from_config(config: &ServiceConfig) -> Pipeline {
        let renderer = Arc::new(config.renderer());
        Pipeline::new(config.validator(), Arc::new(QrcodeEncoder), renderer)
    }

    /// Runs one request to completion.
    ///
    /// # Errors
    ///
    /// Returns the error of the first stage that fails; see
    /// [`PipelineError::status`] for how each maps to a response.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::HashMap;
    /// use qrserve::config::ServiceConfig;
    /// use qrserve::pipeline::Pipeline;
    ///
    /// let pipeline = Pipeline::from_config(&ServiceConfig::default());
    /// let mut raw = HashMap::new();
    /// raw.insert("data".to_string(), "Hello, QR Code!".to_string());
    ///
    /// let response = pipeline.run(&raw).unwrap();
    /// assert_eq!(response.content_type(), "image/png");
    /// assert_eq!(response.content_disposition(), "inline; filename=\"qrcode.png\"");
    /// ```
    pub fn run(&self, raw: &HashMap<String, String>) -> Result<QrResponse, PipelineError> {
        let mut stage = Stage::Validating;
        let result = self.advance(raw, &mut stage);
        match &result {
            Ok(_) => debug!("request reached {}", stage),
            Err(err) => debug!("request failed while {}: {}", stage, err),
        }
        result
    }

    fn advance(
        &self,
        raw: &HashMap<String, String>,
        stage: &mut Stage,
    ) -> Result<QrResponse, PipelineError> {
        let request = self.validator.validate(raw)?;
        debug!(
            "validated: format={:?} ecc={:?} version={:?} mask={:?} size={}x{} \
             margin={} charset={} payload_bytes={}",
            request.format,
            request.ec_level,
            request.version,
            request.mask,
            request.width_px,
            request.height_px,
            request.margin_modules,
            request.charset,
            request.payload.len()
        );

        *stage = Stage::Encoding;
        let matrix = self.encoder.encode(&SymbolParams::from(&request))?;

        *stage = Stage::Rendering;
        let image = self.renderer.render(&matrix, &RenderSpec::from(&request))?;

        *stage = Stage::Responding;
        Ok(QrResponse { image })
    }
}
