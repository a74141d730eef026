//! Delimited-text source (`.csv`, `.tsv`, `.txt`).

use std::path::{Path, PathBuf};

use encoding_rs::Encoding;

use crate::{
    cell::RawCell,
    error::ImportResult,
    io_utils,
    source::{RowFlow, SourceRow, TabularSource},
};

#[derive(Debug, Clone)]
pub struct DelimitedSource {
    path: PathBuf,
    delimiter: u8,
    encoding: &'static Encoding,
}

impl DelimitedSource {
    pub fn new(path: impl AsRef<Path>, delimiter: u8, encoding: &'static Encoding) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            delimiter,
            encoding,
        }
    }

    pub fn from_path(
        path: impl AsRef<Path>,
        delimiter: Option<u8>,
        encoding: Option<&str>,
    ) -> ImportResult<Self> {
        let path = path.as_ref();
        let delimiter = io_utils::resolve_input_delimiter(path, delimiter);
        let encoding = io_utils::resolve_encoding(encoding)?;
        Ok(Self::new(path, delimiter, encoding))
    }
}

impl TabularSource for DelimitedSource {
    fn describe(&self) -> String {
        format!(
            "delimited file {:?} (delimiter '{}', encoding {})",
            self.path,
            crate::printable_delimiter(self.delimiter),
            self.encoding.name()
        )
    }

    fn count_rows(&mut self) -> ImportResult<usize> {
        let mut reader =
            io_utils::open_csv_reader_from_path(&self.path, self.delimiter, self.encoding)?;
        let mut record = csv::ByteRecord::new();
        let mut count = 0usize;
        while reader.read_byte_record(&mut record)? {
            count += 1;
        }
        Ok(count)
    }

    fn scan_rows(
        &mut self,
        visit: &mut dyn FnMut(SourceRow) -> ImportResult<RowFlow>,
    ) -> ImportResult<()> {
        let mut reader =
            io_utils::open_csv_reader_from_path(&self.path, self.delimiter, self.encoding)?;
        let mut record = csv::StringRecord::new();
        let mut number = 0usize;
        while reader.read_record(&mut record)? {
            number += 1;
            let row = SourceRow::dense(
                number,
                record.iter().map(|field| RawCell::Text(field.to_string())),
            );
            if visit(row)? == RowFlow::Stop {
                break;
            }
        }
        Ok(())
    }
}
