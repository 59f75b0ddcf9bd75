use std::fmt::Write as _;
use std::io::Cursor;

use image::{ImageBuffer, ImageFormat, Rgb as Pixel};

use crate::color::Rgb;
use crate::encoder::ModuleMatrix;
use crate::error::RenderError;
use crate::params::{OutputFormat, RenderRequest};

/*---- Rendering configuration ----*/

/// Default raster budget: an 8192 x 8192 image.
pub const DEFAULT_MAX_PIXELS: u64 = 8192 * 8192;

/// How the raster size of the output is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizingMode {
    /// Output is exactly `width x height`. The symbol is scaled by the largest
    /// integer factor that fits and centred; if even a factor of one does not
    /// fit, each pixel samples the module beneath it.
    #[default]
    Exact,
    /// Output side is `pixels_per_module * (modules + 2 * margin)`, ignoring
    /// the requested width and height.
    PerModule { pixels_per_module: u32 },
}

/// Geometry and colours for one rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSpec {
    pub width_px: u32,
    pub height_px: u32,
    pub margin_modules: u32,
    pub dark_color: Rgb,
    pub light_color: Rgb,
    pub format: OutputFormat,
}

impl From<&RenderRequest> for RenderSpec {
    fn from(req: &RenderRequest) -> Self {
        RenderSpec {
            width_px: req.width_px,
            height_px: req.height_px,
            margin_modules: req.margin_modules,
            dark_color: req.dark_color,
            light_color: req.light_color,
            format: req.format,
        }
    }
}

/// Image bytes plus what they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl RenderedImage {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Turns a module matrix into an image byte stream.
///
/// Implementations must be deterministic: no timestamps, no randomness.
pub trait ImageRenderer: Send + Sync {
    fn render(
        &self,
        matrix: &ModuleMatrix,
        spec: &RenderSpec,
    ) -> Result<RenderedImage, RenderError>;
}

/// The built-in PNG and SVG renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Renderer {
    pub sizing: SizingMode,
    /// Upper bound on `width * height` for raster output.
    pub max_pixels: u64,
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer {
            sizing: SizingMode::Exact,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

impl ImageRenderer for Renderer {
    fn render(
        &self,
        matrix: &ModuleMatrix,
        spec: &RenderSpec,
    ) -> Result<RenderedImage, RenderError> {
        let layout = Layout::new(self.sizing, matrix.size() as u64, spec);
        match spec.format {
            OutputFormat::Png => self.render_png(matrix, spec, &layout),
            OutputFormat::Svg => {
                let (width, height) = layout.clamped_dimensions();
                Ok(RenderedImage {
                    bytes: to_svg_string(matrix, spec, &layout).into_bytes(),
                    format: OutputFormat::Svg,
                    width,
                    height,
                })
            }
        }
    }
}

impl Renderer {
    /// Raster dimensions for `layout`, provided they fit the pixel budget.
    fn raster_size(&self, layout: &Layout) -> Result<(u32, u32), RenderError> {
        let too_large = || RenderError::TooLarge {
            width: layout.width,
            height: layout.height,
            limit: self.max_pixels,
        };
        if layout.width.saturating_mul(layout.height) > self.max_pixels {
            return Err(too_large());
        }
        let width = u32::try_from(layout.width).map_err(|_| too_large())?;
        let height = u32::try_from(layout.height).map_err(|_| too_large())?;
        Ok((width, height))
    }

    fn render_png(
        &self,
        matrix: &ModuleMatrix,
        spec: &RenderSpec,
        layout: &Layout,
    ) -> Result<RenderedImage, RenderError> {
        let (width, height) = self.raster_size(layout)?;

        let dark = Pixel(spec.dark_color.0);
        let light = Pixel(spec.light_color.0);
        let mut img: ImageBuffer<Pixel<u8>, Vec<u8>> = ImageBuffer::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let module_x = layout.x.module_at(u64::from(x));
            let module_y = layout.y.module_at(u64::from(y));
            *pixel = if matrix.is_dark(module_x, module_y) {
                dark
            } else {
                light
            };
        }

        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(RenderedImage {
            bytes,
            format: OutputFormat::Png,
            width,
            height,
        })
    }
}

/*---- Geometry ----*/

/// Maps output pixels on one axis to module coordinates, where `0` is the
/// first module of the symbol and negative values fall in the quiet zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    /// Whole-pixel blocks of `scale` pixels, symbol starting at `offset`.
    Scaled { offset: u64, scale: u64 },
    /// Output shorter than the module count: nearest-module sampling.
    Sampled { len: u64, total: u64, margin: u64 },
}

impl Axis {
    fn module_at(&self, p: u64) -> i64 {
        match *self {
            Axis::Scaled { offset, scale } => {
                if p < offset {
                    -1
                } else {
                    ((p - offset) / scale) as i64
                }
            }
            Axis::Sampled { len, total, margin } => {
                let cell = (u128::from(p) * u128::from(total) / u128::from(len)) as i64;
                cell - margin as i64
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    width: u64,
    height: u64,
    /// Modules plus quiet zone on both sides.
    total: u64,
    x: Axis,
    y: Axis,
}

impl Layout {
    fn new(sizing: SizingMode, modules: u64, spec: &RenderSpec) -> Layout {
        let margin = u64::from(spec.margin_modules);
        let total = (modules + 2 * margin).max(1);
        let (width, height) = match sizing {
            SizingMode::Exact => (u64::from(spec.width_px), u64::from(spec.height_px)),
            SizingMode::PerModule { pixels_per_module } => {
                let side = u64::from(pixels_per_module.max(1)).saturating_mul(total);
                (side, side)
            }
        };
        // same scale on both axes so modules stay square
        let scale = (width / total).min(height / total);
        let axis = |len: u64| {
            if scale == 0 {
                Axis::Sampled { len, total, margin }
            } else {
                Axis::Scaled {
                    offset: (len - modules * scale) / 2,
                    scale,
                }
            }
        };
        Layout {
            width,
            height,
            total,
            x: axis(width),
            y: axis(height),
        }
    }

    fn clamped_dimensions(&self) -> (u32, u32) {
        (
            u32::try_from(self.width).unwrap_or(u32::MAX),
            u32::try_from(self.height).unwrap_or(u32::MAX),
        )
    }
}

/*---- Vector output ----*/

// Returns a standalone SVG document for the given matrix. One `h1v1h-1z`
// subpath per dark module, in a view box of one unit per module including the
// quiet zone. Always uses Unix newlines.
fn to_svg_string(matrix: &ModuleMatrix, spec: &RenderSpec, layout: &Layout) -> String {
    let margin = i64::from(spec.margin_modules);
    let size = matrix.size() as i64;
    let (width, height) = layout.clamped_dimensions();

    let mut result = String::new();
    result += "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
    let _ = writeln!(
        result,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" \
         width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {0} {0}\" \
         stroke=\"none\" shape-rendering=\"crispEdges\">",
        layout.total
    );
    let _ = writeln!(
        result,
        "\t<rect x=\"0\" y=\"0\" width=\"{0}\" height=\"{0}\" fill=\"{1}\"/>",
        layout.total,
        spec.light_color.to_hex()
    );
    result += "\t<path d=\"";
    let mut first = true;
    for y in 0..size {
        for x in 0..size {
            if matrix.is_dark(x, y) {
                if !first {
                    result += " ";
                }
                first = false;
                let _ = write!(result, "M{},{}h1v1h-1z", x + margin, y + margin);
            }
        }
    }
    let _ = writeln!(result, "\" fill=\"{}\"/>", spec.dark_color.to_hex());
    result += "</svg>\n";
    result
}
