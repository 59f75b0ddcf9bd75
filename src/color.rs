/// A flat 8-bit RGB colour.
///
/// Only two colours are ever used per image, one for dark modules and one
/// for light modules and the quiet zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);
    pub const WHITE: Rgb = Rgb([255, 255, 255]);

    /// Parses `#RRGGBB`, `RRGGBB`, `#RGB` or `RGB`.
    ///
    /// Returns `None` for anything else.
    ///
    /// # Example
    ///
    /// ```rust
    /// use qrserve::color::Rgb;
    ///
    /// assert_eq!(Rgb::parse_hex("#ff8000"), Some(Rgb([255, 128, 0])));
    /// assert_eq!(Rgb::parse_hex("0f0"), Some(Rgb([0, 255, 0])));
    /// assert_eq!(Rgb::parse_hex("orange"), None);
    /// ```
    pub fn parse_hex(s: &str) -> Option<Rgb> {
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            6 => {
                let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
                Some(Rgb([channel(0)?, channel(2)?, channel(4)?]))
            }
            3 => {
                let channel =
                    |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
                Some(Rgb([channel(0)?, channel(1)?, channel(2)?]))
            }
            _ => None,
        }
    }

    /// Lower-case `#rrggbb` form, as written into SVG output.
    pub fn to_hex(self) -> String {
        let [r, g, b] = self.0;
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }
}
