//! Parsing of uploaded batch files (CSV and Excel)

use crate::types::record::{FieldValue, RawRecord};
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputFormatError {
    #[error("Invalid file format '{0}'. Please upload .xlsx or .csv")]
    UnsupportedExtension(String),

    #[error("Error reading file: {0}")]
    Unreadable(String),

    #[error("Error reading file: no data rows")]
    NoRows,
}

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
}

impl FileFormat {
    /// Detect format from file extension
    pub fn from_file_name(file_name: &str) -> Result<Self, InputFormatError> {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".csv") {
            Ok(FileFormat::Csv)
        } else if lower.ends_with(".xlsx") {
            Ok(FileFormat::Xlsx)
        } else {
            Err(InputFormatError::UnsupportedExtension(file_name.to_string()))
        }
    }
}

/// Parse an uploaded file into one record per data row.
pub fn parse_upload(file_name: &str, data: &[u8]) -> Result<Vec<RawRecord>, InputFormatError> {
    let records = match FileFormat::from_file_name(file_name)? {
        FileFormat::Csv => parse_csv(data)?,
        FileFormat::Xlsx => parse_xlsx(data)?,
    };

    if records.is_empty() {
        return Err(InputFormatError::NoRows);
    }
    Ok(records)
}

fn parse_csv(data: &[u8]) -> Result<Vec<RawRecord>, InputFormatError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| InputFormatError::Unreadable(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    reader
        .records()
        .map(|row| {
            let row = row.map_err(|e| InputFormatError::Unreadable(e.to_string()))?;
            Ok(headers
                .iter()
                .zip(row.iter())
                .fold(RawRecord::new(), |record, (name, cell)| {
                    record.with(name.clone(), FieldValue::from_cell(cell))
                }))
        })
        .collect()
}

fn parse_xlsx(data: &[u8]) -> Result<Vec<RawRecord>, InputFormatError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(data))
        .map_err(|e: calamine::XlsxError| InputFormatError::Unreadable(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| InputFormatError::Unreadable("workbook has no sheets".to_string()))?
        .map_err(|e| InputFormatError::Unreadable(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| cell_to_value(cell).as_category().unwrap_or_default())
            .collect(),
        None => return Ok(Vec::new()),
    };

    Ok(rows
        .filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
        .map(|row| {
            headers
                .iter()
                .zip(row.iter())
                .filter(|(name, _)| !name.is_empty())
                .fold(RawRecord::new(), |record, (name, cell)| {
                    record.with(name.clone(), cell_to_value(cell))
                })
        })
        .collect())
}

fn cell_to_value(cell: &Data) -> FieldValue {
    match cell {
        Data::Int(i) => FieldValue::Number(*i as f64),
        Data::Float(f) => FieldValue::Number(*f),
        Data::Bool(b) => FieldValue::Number(if *b { 1.0 } else { 0.0 }),
        Data::String(s) => FieldValue::from_cell(s),
        Data::Empty => FieldValue::Missing,
        other => FieldValue::from_cell(&other.to_string()),
    }
}
