//! Input formats and file decoding.
use std::{fmt, path::Path, str::FromStr};

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

use crate::Error;

/// BOM (Byte Order Mark) patterns for encoding detection
const BOM_PATTERNS: &[(&[u8], &Encoding, usize, &str)] = &[
    (&[0xEF, 0xBB, 0xBF], UTF_8, 3, "UTF-8"),
    (&[0xFF, 0xFE], UTF_16LE, 2, "UTF-16 LE"),
    (&[0xFE, 0xFF], UTF_16BE, 2, "UTF-16 BE"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Usfm,
    Usx,
    Tsv,
}

impl Format {
    /// Detects the format from a file extension.
    ///
    /// # Errors
    /// Returns [`Error::UnknownFormat`] for any other extension.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.to_ascii_lowercase().parse().ok())
            .ok_or_else(|| Error::UnknownFormat(path.display().to_string()))
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "usfm" | "sfm" => Ok(Self::Usfm),
            "usx" | "xml" => Ok(Self::Usx),
            "tsv" => Ok(Self::Tsv),
            other => Err(Error::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Usfm => "usfm",
            Self::Usx => "usx",
            Self::Tsv => "tsv",
        })
    }
}

/// Reads a file and decodes it based on BOM (Byte Order Mark) or explicit encoding.
///
/// Supports:
/// - UTF-8 with BOM (EF BB BF)
/// - UTF-16 LE with BOM (FF FE)
/// - UTF-16 BE with BOM (FE FF)
/// - UTF-8 without BOM (fallback)
/// - Explicit encoding via `encoding` parameter
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The explicit encoding label is unknown
/// - The file is not valid UTF-8 and has no BOM
pub fn read_and_decode_file(file_path: &Path, encoding: Option<&str>) -> Result<String, Error> {
    let bytes = std::fs::read(file_path)?;
    decode_bytes(&bytes, encoding).map_err(|error| match error {
        Error::UnrecognizedEncodingInFile(_) => {
            Error::UnrecognizedEncodingInFile(file_path.display().to_string())
        }
        other => other,
    })
}

pub(crate) fn decode_bytes(bytes: &[u8], encoding: Option<&str>) -> Result<String, Error> {
    if let Some(enc_label) = encoding {
        if let Some(encoding) = Encoding::for_label(enc_label.as_bytes()) {
            let (cow, _, had_errors) = encoding.decode(bytes);
            if had_errors {
                tracing::error!(encoding = %enc_label, "decoding encountered errors");
            }
            return Ok(cow.into_owned());
        }
        return Err(Error::UnknownEncoding(enc_label.to_string()));
    }

    for (bom, encoding, skip, name) in BOM_PATTERNS {
        if bytes.starts_with(bom)
            && let Some(content) = bytes.get(*skip..)
        {
            let (cow, had_errors) = encoding.decode_without_bom_handling(content);
            if had_errors {
                tracing::error!(encoding = name, "decoding encountered errors");
            }
            return Ok(cow.into_owned());
        }
    }

    let (cow, _, had_errors) = UTF_8.decode(bytes);
    if !had_errors {
        return Ok(cow.into_owned());
    }

    Err(Error::UnrecognizedEncodingInFile(String::from("<bytes>")))
}
