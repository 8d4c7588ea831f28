//! Decoding remote files (CSV, Excel, JSON) into tables.

use calamine::Reader as _;
use color_eyre::{eyre::eyre, Result};
use serde_json::{Map, Value};
use std::io::Cursor;

use super::Table;

/// File formats the store serves, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
  Csv,
  Excel,
  Json,
}

impl PayloadFormat {
  pub fn from_path(path: &str) -> Result<Self> {
    let extension = path
      .rsplit('/')
      .next()
      .and_then(|name| name.rsplit_once('.'))
      .map(|(_, ext)| ext.to_ascii_lowercase())
      .ok_or_else(|| eyre!("Cannot tell the format of '{}': no extension", path))?;

    match extension.as_str() {
      "csv" => Ok(PayloadFormat::Csv),
      "xlsx" | "xlsm" | "xls" | "ods" => Ok(PayloadFormat::Excel),
      "json" => Ok(PayloadFormat::Json),
      other => Err(eyre!("Unsupported file format '.{}' for '{}'", other, path)),
    }
  }
}

/// A decoded remote file.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
  Table(Table),
  /// JSON that is not tabular (settings, metadata)
  Document(Value),
}

impl Payload {
  pub fn into_table(self) -> Result<Table> {
    match self {
      Payload::Table(table) => Ok(table),
      Payload::Document(_) => Err(eyre!("Expected tabular data but found a JSON document")),
    }
  }
}

pub fn decode(format: PayloadFormat, bytes: &[u8]) -> Result<Payload> {
  match format {
    PayloadFormat::Csv => Table::from_csv(bytes).map(Payload::Table),
    PayloadFormat::Excel => Table::from_excel(bytes).map(Payload::Table),
    PayloadFormat::Json => decode_json(bytes),
  }
}

fn decode_json(bytes: &[u8]) -> Result<Payload> {
  let value: Value =
    serde_json::from_slice(bytes).map_err(|e| eyre!("Failed to parse JSON: {}", e))?;

  let table = match &value {
    Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => {
      Some(records_to_table(items))
    }
    Value::Object(columns)
      if !columns.is_empty() && columns.values().all(Value::is_object) =>
    {
      Some(columns_to_table(columns))
    }
    _ => None,
  };

  match table {
    Some(table) => table.map(Payload::Table),
    None => Ok(Payload::Document(value)),
  }
}

/// `[{"SampleCode": "BEA001", "pH": 7.2}, ...]`
fn records_to_table(items: &[Value]) -> Result<Table> {
  let mut headers: Vec<String> = Vec::new();
  for item in items {
    if let Value::Object(record) = item {
      for key in record.keys() {
        if !headers.contains(key) {
          headers.push(key.clone());
        }
      }
    }
  }

  let rows: Vec<Vec<String>> = items
    .iter()
    .filter_map(Value::as_object)
    .map(|record| {
      headers
        .iter()
        .map(|h| record.get(h).map(cell_text).unwrap_or_default())
        .collect()
    })
    .collect();

  Table::from_parts(headers, rows)
}

/// pandas "columns" orientation: `{"SampleCode": {"0": "BEA001"}, ...}`
fn columns_to_table(columns: &Map<String, Value>) -> Result<Table> {
  let headers: Vec<String> = columns.keys().cloned().collect();

  let mut row_keys: Vec<String> = Vec::new();
  for column in columns.values().filter_map(Value::as_object) {
    for key in column.keys() {
      if !row_keys.contains(key) {
        row_keys.push(key.clone());
      }
    }
  }
  row_keys.sort_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
    (Ok(x), Ok(y)) => x.cmp(&y),
    _ => a.cmp(b),
  });

  let rows: Vec<Vec<String>> = row_keys
    .iter()
    .map(|key| {
      columns
        .values()
        .map(|column| column.get(key).map(cell_text).unwrap_or_default())
        .collect()
    })
    .collect();

  Table::from_parts(headers, rows)
}

fn cell_text(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

impl Table {
  /// Read the first worksheet of a workbook; its first row is the header.
  pub fn from_excel(bytes: &[u8]) -> Result<Self> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
      .map_err(|e| eyre!("Failed to open workbook: {}", e))?;

    let range = workbook
      .worksheet_range_at(0)
      .ok_or_else(|| eyre!("Workbook has no worksheets"))?
      .map_err(|e| eyre!("Failed to read worksheet: {}", e))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
      .next()
      .ok_or_else(|| eyre!("Worksheet is empty"))?
      .iter()
      .map(excel_text)
      .collect();

    let body: Vec<Vec<String>> = rows
      .filter(|row| row.iter().any(|c| !matches!(c, calamine::Data::Empty)))
      .map(|row| row.iter().map(excel_text).collect())
      .collect();

    Table::from_parts(headers, body)
  }
}

fn excel_text(cell: &calamine::Data) -> String {
  match cell {
    calamine::Data::Empty => String::new(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn json_table(bytes: &[u8]) -> Result<Table> {
    decode(PayloadFormat::Json, bytes)?.into_table()
  }

  #[test]
  fn test_format_from_path() {
    assert_eq!(PayloadFormat::from_path("/master.csv").unwrap(), PayloadFormat::Csv);
    assert_eq!(
      PayloadFormat::from_path("datalog/Inventory.XLSX").unwrap(),
      PayloadFormat::Excel
    );
    assert_eq!(PayloadFormat::from_path("meta.json").unwrap(), PayloadFormat::Json);
    assert!(PayloadFormat::from_path("spectra.v2/readme").is_err());
    assert!(PayloadFormat::from_path("ACBC_IR_20240906_BEA001_1.dpt").is_err());
  }

  #[test]
  fn test_json_records() {
    let json = br#"[
      {"SampleCode": "BEA001", "pH": 7.2},
      {"SampleCode": "BEA002", "pH": null, "LongName": "Fir"}
    ]"#;
    let table = json_table(json).unwrap();
    assert_eq!(table.headers(), &["SampleCode", "pH", "LongName"]);
    assert_eq!(table.cell(0, "pH"), Some("7.2"));
    assert_eq!(table.cell(0, "LongName"), Some(""));
    assert_eq!(table.cell(1, "pH"), Some(""));
  }

  #[test]
  fn test_json_columns_orientation() {
    let json = br#"{
      "SampleCode": {"0": "BEA001", "1": "BEA002", "10": "BEA011"},
      "pH": {"0": 7.2, "10": 6.5}
    }"#;
    let table = json_table(json).unwrap();
    assert_eq!(table.headers(), &["SampleCode", "pH"]);
    assert_eq!(table.len(), 3);
    assert_eq!(table.cell(2, "SampleCode"), Some("BEA011"));
    assert_eq!(table.cell(1, "pH"), Some(""));
    assert_eq!(table.number(2, "pH"), Some(6.5));
  }

  #[test]
  fn test_json_document() {
    let payload = decode(PayloadFormat::Json, br#"{"version": 3, "owner": "acbc"}"#).unwrap();
    match payload {
      Payload::Document(value) => assert_eq!(value["version"], 3),
      Payload::Table(_) => panic!("expected a document"),
    }
    assert!(json_table(br#"{"version": 3}"#).is_err());
  }

  #[test]
  fn test_invalid_excel() {
    let err = Table::from_excel(b"definitely not a workbook").unwrap_err();
    assert!(err.to_string().contains("workbook"));
  }
}
