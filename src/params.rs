//! Request parameter validation.
//!
//! Turns the raw `/qr` query map into a typed [`RenderRequest`]. Only two
//! conditions are ever rejected ([`ValidationError::MissingPayload`] under the
//! strict payload policy, and non-positive dimensions); every other malformed
//! value degrades to its default.

use std::collections::HashMap;

use serde::Deserialize;

use crate::color::Rgb;
use crate::error::ValidationError;

/// QR error correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcLevel {
    /// Recovers about 7% of damaged codewords.
    L,
    /// About 15%.
    M,
    /// About 25%.
    Q,
    /// About 30%.
    H,
}

impl EcLevel {
    /// Case-insensitive lookup. Anything unrecognised is `H`.
    pub fn parse_or_high(raw: Option<&str>) -> EcLevel {
        match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
            Some("L") => EcLevel::L,
            Some("M") => EcLevel::M,
            Some("Q") => EcLevel::Q,
            _ => EcLevel::H,
        }
    }
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Png,
    Svg,
}

impl OutputFormat {
    /// Case-insensitive lookup. Anything unrecognised is PNG.
    pub fn parse_or_png(raw: Option<&str>) -> OutputFormat {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("svg") => OutputFormat::Svg,
            _ => OutputFormat::Png,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Svg => "image/svg+xml",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
        }
    }
}

/// Symbol version: either pinned to `1..=40` or left to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionChoice {
    Auto,
    Pinned(u8),
}

impl VersionChoice {
    pub const MIN: i64 = 1;
    pub const MAX: i64 = 40;

    /// Out-of-range or unparsable input resolves to [`VersionChoice::Auto`].
    pub fn from_raw(raw: Option<&str>) -> VersionChoice {
        match parse_int(raw) {
            Some(v) if (Self::MIN..=Self::MAX).contains(&v) => VersionChoice::Pinned(v as u8),
            _ => VersionChoice::Auto,
        }
    }
}

/// Mask pattern: either pinned to `0..=7` or chosen by penalty score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskChoice {
    Auto,
    Pinned(u8),
}

impl MaskChoice {
    pub const MIN: i64 = 0;
    pub const MAX: i64 = 7;

    /// Out-of-range or unparsable input resolves to [`MaskChoice::Auto`].
    pub fn from_raw(raw: Option<&str>) -> MaskChoice {
        match parse_int(raw) {
            Some(m) if (Self::MIN..=Self::MAX).contains(&m) => MaskChoice::Pinned(m as u8),
            _ => MaskChoice::Auto,
        }
    }
}

/// What to do when `data` is absent or blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[derive(Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadPolicy {
    /// Reject with [`ValidationError::MissingPayload`].
    #[default]
    Strict,
    /// Substitute the configured default payload.
    Lenient,
}

/// A fully validated request. Nothing downstream needs to range-check it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderRequest {
    pub payload: String,
    pub width_px: u32,
    pub height_px: u32,
    pub margin_modules: u32,
    pub ec_level: EcLevel,
    pub charset: String,
    pub version: VersionChoice,
    pub mask: MaskChoice,
    pub dark_color: Rgb,
    pub light_color: Rgb,
    pub format: OutputFormat,
}

/// Parses raw query parameters into a [`RenderRequest`].
#[derive(Debug, Clone)]
pub struct ParameterValidator {
    pub policy: PayloadPolicy,
    pub default_payload: String,
    pub default_width: u32,
    pub default_height: u32,
    pub default_margin: u32,
}

impl Default for ParameterValidator {
    fn default() -> Self {
        ParameterValidator {
            policy: PayloadPolicy::Strict,
            default_payload: String::new(),
            default_width: 300,
            default_height: 300,
            default_margin: 1,
        }
    }
}

impl ParameterValidator {
    /// Validates the raw parameter map.
    ///
    /// # Errors
    ///
    /// * [`ValidationError::MissingPayload`] when `data` is absent or blank and
    ///   the policy is [`PayloadPolicy::Strict`].
    /// * [`ValidationError::InvalidDimensions`] when `width` or `height` parse
    ///   to a value `<= 0`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::HashMap;
    /// use qrserve::params::{EcLevel, ParameterValidator, VersionChoice};
    ///
    /// let mut raw = HashMap::new();
    /// raw.insert("data".to_string(), "hello".to_string());
    /// raw.insert("errorCorrection".to_string(), "q".to_string());
    /// raw.insert("qrVersion".to_string(), "99".to_string());
    ///
    /// let req = ParameterValidator::default().validate(&raw).unwrap();
    /// assert_eq!(req.ec_level, EcLevel::Q);
    /// assert_eq!(req.version, VersionChoice::Auto);
    /// assert_eq!((req.width_px, req.height_px), (300, 300));
    /// ```
    pub fn validate(
        &self,
        raw: &HashMap<String, String>,
    ) -> Result<RenderRequest, ValidationError> {
        let get = |key: &str| raw.get(key).map(String::as_str);

        let payload = match get("data") {
            Some(data) if !data.trim().is_empty() => data.to_string(),
            _ => match self.policy {
                PayloadPolicy::Strict => return Err(ValidationError::MissingPayload),
                PayloadPolicy::Lenient => self.default_payload.clone(),
            },
        };

        let width_px = dimension(get("width"), self.default_width)?;
        let height_px = dimension(get("height"), self.default_height)?;

        let margin_modules = match parse_int(get("margin")) {
            Some(m) => u32::try_from(m.max(0)).unwrap_or(u32::MAX),
            None => self.default_margin,
        };

        let charset = match get("charset").map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => "UTF-8".to_string(),
        };
        let dark_color = get("darkColor").and_then(Rgb::parse_hex);
        let light_color = get("lightColor").and_then(Rgb::parse_hex);

        Ok(RenderRequest {
            payload,
            width_px,
            height_px,
            margin_modules,
            ec_level: EcLevel::parse_or_high(get("errorCorrection")),
            charset,
            version: VersionChoice::from_raw(get("qrVersion")),
            mask: MaskChoice::from_raw(get("maskPattern")),
            dark_color: dark_color.unwrap_or(Rgb::BLACK),
            light_color: light_color.unwrap_or(Rgb::WHITE),
            format: OutputFormat::parse_or_png(get("format")),
        })
    }
}

fn parse_int(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
}

fn dimension(raw: Option<&str>, default: u32) -> Result<u32, ValidationError> {
    match parse_int(raw) {
        None => Ok(default),
        Some(v) if v <= 0 => Err(ValidationError::InvalidDimensions),
        Some(v) => Ok(u32::try_from(v).unwrap_or(u32::MAX)),
    }
}
