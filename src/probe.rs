//! Schema preview: read and infer without touching a database.

use std::path::Path;

use serde::Serialize;

use crate::{
    error::ImportResult,
    progress::{CancellationToken, Checkpoint, ImportSink},
    reader::TabularReader,
    schema::{ColumnProfile, InferenceOptions, SchemaInferencer},
    settings::{ImportSettings, SourceOptions},
    table::{Align, render_table},
};

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub table: String,
    pub rows: usize,
    pub columns: Vec<ColumnProfile>,
    pub create_sql: String,
}

pub fn probe_file(
    path: &Path,
    settings: &ImportSettings,
    options: &SourceOptions,
    sink: &dyn ImportSink,
) -> ImportResult<ProbeReport> {
    let cancel = CancellationToken::new();
    let reader = TabularReader::new(settings, options, Checkpoint::new(sink, &cancel));
    let rows = reader.read(path)?;
    let schema = SchemaInferencer::new(InferenceOptions::default()).infer(&rows);
    Ok(ProbeReport {
        table: settings.table_name.clone(),
        rows: rows.row_count(),
        create_sql: schema.create_statement(&settings.table_name).to_sql(),
        columns: schema.columns().to_vec(),
    })
}

pub fn render_report(report: &ProbeReport) -> String {
    let rows: Vec<Vec<String>> = report
        .columns
        .iter()
        .map(|column| {
            vec![
                (column.ordinal + 1).to_string(),
                column.name.clone(),
                column.sql_type(),
                column.max_chars.to_string(),
                column.null_count.to_string(),
            ]
        })
        .collect();
    let mut output = render_table(
        &["#", "name", "type", "max_len", "nulls"],
        &rows,
        &[Align::Right, Align::Left, Align::Left, Align::Right, Align::Right],
    );
    output.push_str(&format!("\n{} data row(s)\n\n{};\n", report.rows, report.create_sql));
    output
}
