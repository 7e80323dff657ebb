//! Row Decoder: uploaded bytes + file name -> uniform row records.
//!
//! Format selection is by file extension. Spreadsheets decode every sheet
//! and tag rows with the sheet name; delimited text sniffs the delimiter
//! from the first line; JSON accepts an array or a bare object; anything
//! else degrades to one record per non-empty line.
//!
//! Malformed content aborts the whole import with `Error::Decode`. An empty
//! decode result is not an error.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::{Map, Value};

use nid_common::{Error, Result};

use crate::models::RowRecord;

/// Decode an uploaded file into a finite sequence of row records.
pub fn decode(bytes: &[u8], file_name: &str) -> Result<Vec<RowRecord>> {
    match extension(file_name).as_deref() {
        Some("xlsx") | Some("xls") => decode_workbook(bytes),
        Some("csv") | Some("tsv") | Some("txt") => decode_delimited(bytes),
        Some("json") => decode_json(bytes),
        _ => Ok(decode_lines(bytes)),
    }
}

fn extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Decode every sheet of a workbook, concatenating rows in sheet order.
///
/// The first row of each sheet is the header; blank header cells get a
/// positional `column_N` name.
fn decode_workbook(bytes: &[u8]) -> Result<Vec<RowRecord>> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| Error::Decode(format!("unreadable workbook: {e}")))?;

    let mut records = Vec::new();
    for sheet_name in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| Error::Decode(format!("sheet '{sheet_name}': {e}")))?;

        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    let name = cell.to_string();
                    if name.trim().is_empty() {
                        format!("column_{}", i + 1)
                    } else {
                        name
                    }
                })
                .collect(),
            None => continue,
        };

        for row in rows {
            let mut values = Map::new();
            for (i, cell) in row.iter().enumerate() {
                let Some(value) = cell_to_value(cell) else {
                    continue;
                };
                let key = headers
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("column_{}", i + 1));
                values.insert(key, value);
            }
            if !values.is_empty() {
                records.push(RowRecord {
                    sheet: Some(sheet_name.clone()),
                    values,
                });
            }
        }
    }

    Ok(records)
}

fn cell_to_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Int(i) => Some(Value::from(*i)),
        Data::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number),
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::DateTime(dt) => serde_json::Number::from_f64(dt.as_f64()).map(Value::Number),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
    }
}

/// Decode delimited text, sniffing the delimiter from the first line.
///
/// Precedence: tab, semicolon, pipe, comma. The first row is the header.
fn decode_delimited(bytes: &[u8]) -> Result<Vec<RowRecord>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::Decode(format!("file is not valid UTF-8: {e}")))?;

    let first_line = text.lines().next().unwrap_or("");
    let delimiter = if first_line.contains('\t') {
        b'\t'
    } else if first_line.contains(';') {
        b';'
    } else if first_line.contains('|') {
        b'|'
    } else {
        b','
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::Decode(format!("unreadable header row: {e}")))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| Error::Decode(format!("malformed row: {e}")))?;
        let mut values = Map::new();
        for (i, field) in record.iter().enumerate() {
            let key = headers
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("column_{}", i + 1));
            values.insert(key, Value::String(field.to_string()));
        }
        if !values.is_empty() {
            records.push(RowRecord {
                sheet: None,
                values,
            });
        }
    }

    Ok(records)
}

/// Decode a JSON upload: an array of objects, or a bare object treated as a
/// single-element array. Non-object elements are wrapped under `value`.
fn decode_json(bytes: &[u8]) -> Result<Vec<RowRecord>> {
    let parsed: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::Decode(format!("invalid JSON: {e}")))?;

    let elements = match parsed {
        Value::Array(items) => items,
        other => vec![other],
    };

    Ok(elements
        .into_iter()
        .map(|element| {
            let values = match element {
                Value::Object(map) => map,
                other => {
                    let mut map = Map::new();
                    map.insert("value".to_string(), other);
                    map
                }
            };
            RowRecord {
                sheet: None,
                values,
            }
        })
        .collect())
}

/// Fallback for unknown extensions: each non-empty line is one record with
/// the raw text under a generic key.
fn decode_lines(bytes: &[u8]) -> Vec<RowRecord> {
    String::from_utf8_lossy(bytes)
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let mut values = Map::new();
            values.insert("line".to_string(), Value::String(line.to_string()));
            values.insert("idx".to_string(), Value::from(i as i64 + 1));
            RowRecord {
                sheet: None,
                values,
            }
        })
        .collect()
}
