//! Supported delimited text flavours and their default separators

use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextFormat {
    /// `.tbl`, pipe separated
    Tbl,
    /// `.csv`, comma separated
    Csv,
    /// `.txt`, tab separated
    Txt,
}

impl TextFormat {
    pub const ALL: [TextFormat; 3] = [TextFormat::Tbl, TextFormat::Csv, TextFormat::Txt];

    /// Parse an extension (without the dot), case-insensitively
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "tbl" => Ok(TextFormat::Tbl),
            "csv" => Ok(TextFormat::Csv),
            "txt" => Ok(TextFormat::Txt),
            _ => Err(Error::UnsupportedType(ext.to_string())),
        }
    }

    /// Detect the format from a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| Self::from_extension(e).ok())
    }

    pub fn extension(self) -> &'static str {
        match self {
            TextFormat::Tbl => "tbl",
            TextFormat::Csv => "csv",
            TextFormat::Txt => "txt",
        }
    }

    pub fn default_separator(self) -> char {
        match self {
            TextFormat::Tbl => '|',
            TextFormat::Csv => ',',
            TextFormat::Txt => '\t',
        }
    }
}

impl fmt::Display for TextFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
