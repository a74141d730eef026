//! I/O helpers for delimited sources: delimiter and encoding resolution and
//! CSV reader construction.
//!
//! - **Delimiter resolution**: extension-based (`.tsv` → tab, everything else
//!   → comma) unless overridden.
//! - **Encoding**: input is transcoded to UTF-8 through `encoding_rs_io`
//!   before the CSV parser sees it, so multi-byte encodings and BOMs are
//!   handled up front.
//! - **Format detection**: [`SourceFormat::from_path`] routes a file to the
//!   delimited or workbook reader.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;

use crate::error::{ImportError, ImportResult};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited,
    Workbook,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> ImportResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "csv" | "tsv" | "txt" => Ok(SourceFormat::Delimited),
            "xlsx" | "xlsm" => Ok(SourceFormat::Workbook),
            _ => Err(ImportError::UnsupportedFormat { extension }),
        }
    }
}

pub fn resolve_encoding(label: Option<&str>) -> ImportResult<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes()).ok_or_else(|| {
            ImportError::InvalidSettings {
                message: format!("unknown encoding '{value}'"),
            }
        }),
        None => Ok(UTF_8),
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Builds a header-less, flexible reader: ragged records are accepted and
/// aligned by the caller.
pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> ImportResult<csv::Reader<Box<dyn Read>>> {
    let file = File::open(path)?;
    let decoded = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .bom_override(true)
        .build(BufReader::new(file));
    let reader: Box<dyn Read> = Box::new(decoded);
    Ok(open_csv_reader(reader, delimiter))
}
