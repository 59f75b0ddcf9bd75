//! Text to byte conversion for the `charset` request parameter.
//!
//! The matrix encoder works on raw bytes, so the payload is transcoded here
//! before encoding. Only a handful of charsets are understood; anything else
//! is refused as an [`EncodingError::UnsupportedCharset`].

use crate::error::EncodingError;

/// A character set the payload can be encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Latin1,
    Ascii,
}

impl Charset {
    /// Looks up a charset by name, ignoring case.
    pub fn from_name(name: &str) -> Result<Charset, EncodingError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "UTF-8" | "UTF8" => Ok(Charset::Utf8),
            "ISO-8859-1" | "ISO8859-1" | "ISO_8859_1" | "ISO_8859-1" | "LATIN1" | "LATIN-1" => {
                Ok(Charset::Latin1)
            }
            "US-ASCII" | "ASCII" => Ok(Charset::Ascii),
            _ => Err(EncodingError::UnsupportedCharset(name.to_string())),
        }
    }

    /// Canonical name of the charset.
    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "ISO-8859-1",
            Charset::Ascii => "US-ASCII",
        }
    }

    /// ECI assignment number announcing this charset to a reader.
    pub fn eci_designator(self) -> u32 {
        match self {
            Charset::Latin1 => 3,
            Charset::Utf8 => 26,
            Charset::Ascii => 27,
        }
    }

    /// Encodes `text` in this charset.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, EncodingError> {
        let limit = match self {
            Charset::Utf8 => return Ok(text.as_bytes().to_vec()),
            Charset::Latin1 => 0xFF,
            Charset::Ascii => 0x7F,
        };
        text.chars()
            .map(|ch| {
                u8::try_from(u32::from(ch))
                    .ok()
                    .filter(|b| u32::from(*b) <= limit)
                    .ok_or_else(|| EncodingError::Unrepresentable {
                        charset: self.name().to_string(),
                        ch,
                    })
            })
            .collect()
    }
}
