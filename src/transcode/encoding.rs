//! Output text encodings
//!
//! CSV text is always rendered as UTF-8 first and re-encoded here. Characters
//! the target encoding cannot represent are replaced with `?`.

use crate::error::ConfigError;
use encoding_rs::{EncoderResult, WINDOWS_1252};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Byte written in place of an unrepresentable character
const REPLACEMENT: u8 = b'?';

/// Supported output encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1: code points up to U+00FF map to a single byte
    Latin1,
    Windows1252,
}

impl OutputEncoding {
    /// Encode UTF-8 text into the target encoding
    pub fn encode<'a>(&self, text: &'a str) -> Cow<'a, [u8]> {
        match self {
            OutputEncoding::Utf8 => Cow::Borrowed(text.as_bytes()),
            OutputEncoding::Latin1 => Cow::Owned(encode_latin1(text)),
            OutputEncoding::Windows1252 => Cow::Owned(encode_windows_1252(text)),
        }
    }

    pub fn is_utf8(&self) -> bool {
        matches!(self, OutputEncoding::Utf8)
    }

    /// Canonical label
    pub fn label(&self) -> &'static str {
        match self {
            OutputEncoding::Utf8 => "utf-8",
            OutputEncoding::Latin1 => "latin-1",
            OutputEncoding::Windows1252 => "windows-1252",
        }
    }
}

impl FromStr for OutputEncoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(OutputEncoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Ok(OutputEncoding::Latin1),
            "windows-1252" | "cp1252" | "win-1252" => Ok(OutputEncoding::Windows1252),
            _ => Err(ConfigError::InvalidEncoding {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for OutputEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(REPLACEMENT))
        .collect()
}

fn encode_windows_1252(text: &str) -> Vec<u8> {
    let mut encoder = WINDOWS_1252.new_encoder();
    let mut out = Vec::with_capacity(text.len());
    let mut buf = [0u8; 8192];
    let mut rest = text;

    loop {
        let (result, read, written) =
            encoder.encode_from_utf8_without_replacement(rest, &mut buf, true);
        out.extend_from_slice(&buf[..written]);
        rest = &rest[read..];

        match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::OutputFull => continue,
            EncoderResult::Unmappable(_) => out.push(REPLACEMENT),
        }
    }

    out
}
