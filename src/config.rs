//! Service configuration.
//!
//! Built-in defaults, optionally overridden by a TOML file, then by command
//! line flags (see `main.rs`). Every key is optional:
//!
//! ```toml
//! bind = "0.0.0.0:8080"
//! payload_policy = "strict"   # or "lenient"
//! default_payload = ""        # used by the lenient policy
//! sizing = "exact"            # or "per-module"
//! pixels_per_module = 10      # per-module sizing only
//! default_width = 300
//! default_height = 300
//! default_margin = 1
//! max_pixels = 67108864      # 8192 x 8192
//! max_in_flight = 32          # concurrent encode/render jobs
//! request_timeout_ms = 5000
//! cache_max_age = 3600
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::params::{ParameterValidator, PayloadPolicy};
use crate::render::{Renderer, SizingMode, DEFAULT_MAX_PIXELS};

/// Raster sizing strategy, as spelled in config files and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[derive(Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SizingKind {
    #[default]
    Exact,
    PerModule,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Listen address.
    pub bind: String,
    pub payload_policy: PayloadPolicy,
    pub default_payload: String,
    pub sizing: SizingKind,
    pub pixels_per_module: u32,
    pub default_width: u32,
    pub default_height: u32,
    pub default_margin: u32,
    /// Raster budget in pixels (`width * height`).
    pub max_pixels: u64,
    /// Encode/render jobs allowed to run at once; further requests wait for
    /// a slot within their time budget.
    pub max_in_flight: u32,
    /// Wall-clock budget for one `/qr` request, waiting for a slot included.
    /// A job that overruns keeps its slot until it finishes.
    pub request_timeout_ms: u64,
    /// `Cache-Control: max-age` for successful images; `0` disables the header.
    pub cache_max_age: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            bind: "0.0.0.0:8080".to_string(),
            payload_policy: PayloadPolicy::Strict,
            default_payload: String::new(),
            sizing: SizingKind::Exact,
            pixels_per_module: 10,
            default_width: 300,
            default_height: 300,
            default_margin: 1,
            max_pixels: DEFAULT_MAX_PIXELS,
            max_in_flight: 32,
            request_timeout_ms: 5_000,
            cache_max_age: 3_600,
        }
    }
}

impl ServiceConfig {
    /// Reads a TOML config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<ServiceConfig, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: ServiceConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("pixels_per_module", u64::from(self.pixels_per_module)),
            ("default_width", u64::from(self.default_width)),
            ("default_height", u64::from(self.default_height)),
            ("max_pixels", self.max_pixels),
            ("max_in_flight", u64::from(self.max_in_flight)),
            ("request_timeout_ms", self.request_timeout_ms),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{key} must be greater than 0")));
            }
        }
        if self.bind.trim().is_empty() {
            return Err(ConfigError::Validation("bind must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn validator(&self) -> ParameterValidator {
        ParameterValidator {
            policy: self.payload_policy,
            default_payload: self.default_payload.clone(),
            default_width: self.default_width,
            default_height: self.default_height,
            default_margin: self.default_margin,
        }
    }

    pub fn renderer(&self) -> Renderer {
        let sizing = match self.sizing {
            SizingKind::Exact => SizingMode::Exact,
            SizingKind::PerModule => SizingMode::PerModule {
                pixels_per_module: self.pixels_per_module,
            },
        };
        Renderer {
            sizing,
            max_pixels: self.max_pixels,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
