//! Symbol encoding: payload to module matrix.
//!
//! The Reed-Solomon and masking mathematics come from the `qrcode` crate. This
//! module only chooses the parameters (charset, error correction level, pinned
//! or automatic version, pinned or automatic mask) and translates failures into
//! [`EncodingError`].

use qrcode::bits::Bits;
use qrcode::canvas::{Canvas, MaskPattern};
use qrcode::types::{QrError, QrResult};
use qrcode::{ec, Color, QrCode, Version};

use crate::charset::Charset;
use crate::error::EncodingError;
use crate::params::{EcLevel, MaskChoice, RenderRequest, VersionChoice};

/// A square grid of dark and light modules.
///
/// Produced once per request and dropped after rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMatrix {
    /// Side length in modules, between 21 and 177 for a normal QR symbol.
    size: usize,
    /// Row-major, `true` = dark.
    modules: Vec<bool>,
}

impl ModuleMatrix {
    /// Builds a matrix from row-major modules.
    ///
    /// Returns `None` when `modules.len()` is not `size * size`.
    pub fn new(size: usize, modules: Vec<bool>) -> Option<ModuleMatrix> {
        (size.checked_mul(size)? == modules.len())
            .then_some(ModuleMatrix { size, modules })
    }

    /// Side length in modules.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns `true` for a dark module. Coordinates outside the symbol
    /// (the quiet zone) are always light.
    pub fn is_dark(&self, x: i64, y: i64) -> bool {
        let size = self.size as i64;
        (0..size).contains(&x) && (0..size).contains(&y) && self.modules[(y * size + x) as usize]
    }

    /// Number of dark modules.
    pub fn dark_count(&self) -> usize {
        self.modules.iter().filter(|m| **m).count()
    }
}

/// What the encoder needs to know about a request.
#[derive(Debug, Clone, Copy)]
pub struct SymbolParams<'a> {
    pub payload: &'a str,
    pub charset: &'a str,
    pub ec_level: EcLevel,
    pub version: VersionChoice,
    pub mask: MaskChoice,
}

impl<'a> From<&'a RenderRequest> for SymbolParams<'a> {
    fn from(req: &'a RenderRequest) -> Self {
        SymbolParams {
            payload: &req.payload,
            charset: &req.charset,
            ec_level: req.ec_level,
            version: req.version,
            mask: req.mask,
        }
    }
}

/// Turns a payload into a QR module matrix.
///
/// Implementations must be pure: the same parameters always yield the same
/// matrix.
pub trait SymbolEncoder: Send + Sync {
    fn encode(&self, params: &SymbolParams<'_>) -> Result<ModuleMatrix, EncodingError>;
}

/// [`SymbolEncoder`] backed by the `qrcode` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrcodeEncoder;

impl SymbolEncoder for QrcodeEncoder {
    fn encode(&self, params: &SymbolParams<'_>) -> Result<ModuleMatrix, EncodingError> {
        let charset = Charset::from_name(params.charset)?;
        let data = charset.encode(params.payload)?;
        let eci = charset.eci_designator();
        let ec_level = qr_ec_level(params.ec_level);
        let too_long = |err: QrError| encoding_error(err, data.len(), params);

        let bits = match params.version {
            VersionChoice::Auto => smallest_fit(&data, eci, ec_level),
            VersionChoice::Pinned(v) => data_bits(&data, eci, Version::Normal(v.into()), ec_level),
        }
        .map_err(too_long)?;
        let version = bits.version();

        let colors = match params.mask {
            MaskChoice::Auto => QrCode::with_bits(bits, ec_level).map(QrCode::into_colors),
            MaskChoice::Pinned(m) => masked_colors(bits, ec_level, mask_pattern(m)),
        }
        .map_err(too_long)?;

        let size = version.width() as usize;
        let modules = colors.into_iter().map(|c| c == Color::Dark).collect();
        ModuleMatrix::new(size, modules)
            .ok_or_else(|| EncodingError::Encoder(format!("matrix is not {size}x{size}")))
    }
}

/// Data bits in the smallest normal version that holds them, ECI header
/// included.
fn smallest_fit(data: &[u8], eci: u32, ec_level: qrcode::EcLevel) -> QrResult<Bits> {
    (1..=40)
        .map(|v| data_bits(data, eci, Version::Normal(v), ec_level))
        .find(|bits| !matches!(bits, Err(QrError::DataTooLong)))
        .unwrap_or(Err(QrError::DataTooLong))
}

/// ECI designator, optimally segmented payload and terminator for `version`.
fn data_bits(data: &[u8], eci: u32, version: Version, ec_level: qrcode::EcLevel) -> QrResult<Bits> {
    let mut bits = Bits::new(version);
    bits.push_eci_designator(eci)?;
    bits.push_optimal_data(data)?;
    bits.push_terminator(ec_level)?;
    Ok(bits)
}

fn masked_colors(bits: Bits, level: qrcode::EcLevel, mask: MaskPattern) -> QrResult<Vec<Color>> {
    let version = bits.version();
    let data = bits.into_bytes();
    let (codewords, ec_codewords) = ec::construct_codewords(&data, version, level)?;
    let mut canvas = Canvas::new(version, level);
    canvas.draw_all_functional_patterns();
    canvas.draw_data(&codewords, &ec_codewords);
    canvas.apply_mask(mask);
    Ok(canvas.into_colors())
}

fn qr_ec_level(level: EcLevel) -> qrcode::EcLevel {
    match level {
        EcLevel::L => qrcode::EcLevel::L,
        EcLevel::M => qrcode::EcLevel::M,
        EcLevel::Q => qrcode::EcLevel::Q,
        EcLevel::H => qrcode::EcLevel::H,
    }
}

fn mask_pattern(mask: u8) -> MaskPattern {
    match mask {
        0 => MaskPattern::Checkerboard,
        1 => MaskPattern::HorizontalLines,
        2 => MaskPattern::VerticalLines,
        3 => MaskPattern::DiagonalLines,
        4 => MaskPattern::LargeCheckerboard,
        5 => MaskPattern::Fields,
        6 => MaskPattern::Diamonds,
        _ => MaskPattern::Meadow,
    }
}

fn encoding_error(err: QrError, len: usize, params: &SymbolParams<'_>) -> EncodingError {
    match err {
        QrError::DataTooLong => {
            let version = match params.version {
                VersionChoice::Auto => "any version".to_string(),
                VersionChoice::Pinned(v) => format!("version {v}"),
            };
            EncodingError::DataTooLong(format!(
                "{len} bytes do not fit {version} at error correction level {:?}",
                params.ec_level
            ))
        }
        other => EncodingError::Encoder(other.to_string()),
    }
}
