//! In-memory tabular data as exchanged with the remote store.
//!
//! Cells are kept as the strings found in the source file so a table can be
//! written back without reformatting numbers; numeric access parses on
//! demand.

mod payload;

pub use payload::{decode, PayloadFormat};

use color_eyre::{eyre::eyre, Result};
use sha2::{Digest, Sha256};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A header row plus data rows, every row as wide as the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
  headers: Vec<String>,
  rows: Vec<Vec<String>>,
}

impl Table {
  /// Build a table, padding short rows. Rows wider than the header are an
  /// error.
  pub fn from_parts(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
    let mut table = Self {
      headers,
      rows: Vec::with_capacity(rows.len()),
    };
    for row in rows {
      table.push_row(row)?;
    }
    Ok(table)
  }

  /// Parse CSV bytes. The first record is the header row.
  pub fn from_csv(bytes: &[u8]) -> Result<Self> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
      .has_headers(true)
      .flexible(true)
      .from_reader(bytes);

    let headers: Vec<String> = reader
      .headers()
      .map_err(|e| eyre!("Failed to read CSV header: {}", e))?
      .iter()
      .map(String::from)
      .collect();

    if headers.is_empty() {
      return Err(eyre!("CSV has no header row"));
    }

    let mut table = Self {
      headers,
      rows: Vec::new(),
    };

    for (index, record) in reader.records().enumerate() {
      let record = record.map_err(|e| eyre!("Failed to read CSV row {}: {}", index + 1, e))?;
      table.push_row(record.iter().map(String::from).collect())?;
    }

    Ok(table)
  }

  /// Serialize as CSV with `\n` line endings and quoting only where needed.
  pub fn to_csv(&self) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
      .terminator(csv::Terminator::Any(b'\n'))
      .from_writer(Vec::new());

    writer
      .write_record(&self.headers)
      .map_err(|e| eyre!("Failed to write CSV header: {}", e))?;
    for row in &self.rows {
      writer
        .write_record(row)
        .map_err(|e| eyre!("Failed to write CSV row: {}", e))?;
    }

    writer
      .into_inner()
      .map_err(|e| eyre!("Failed to finish CSV: {}", e))
  }

  /// SHA-256 of the CSV serialization, as lowercase hex.
  pub fn fingerprint(&self) -> Result<String> {
    let csv = self.to_csv()?;
    Ok(hex::encode(Sha256::digest(&csv)))
  }

  pub fn headers(&self) -> &[String] {
    &self.headers
  }

  pub fn rows(&self) -> &[Vec<String>] {
    &self.rows
  }

  pub fn row(&self, index: usize) -> Option<&[String]> {
    self.rows.get(index).map(|r| r.as_slice())
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  pub fn column_index(&self, name: &str) -> Option<usize> {
    self.headers.iter().position(|h| h == name)
  }

  /// Expected columns absent from the header, in the order given.
  pub fn missing_columns(&self, expected: &[&str]) -> Vec<String> {
    expected
      .iter()
      .filter(|name| self.column_index(name).is_none())
      .map(|name| name.to_string())
      .collect()
  }

  pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
    let col = self.column_index(column)?;
    self.rows.get(row).map(|r| r[col].as_str())
  }

  /// Numeric value of a cell; empty, `nan` and unparsable cells are `None`.
  pub fn number(&self, row: usize, column: &str) -> Option<f64> {
    self.cell(row, column).and_then(parse_number)
  }

  /// Index of the first row whose `key_column` equals `key`.
  pub fn find_row(&self, key_column: &str, key: &str) -> Option<usize> {
    let col = self.column_index(key_column)?;
    self.rows.iter().position(|r| r[col] == key)
  }

  pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) -> Result<()> {
    let width = self.headers.len();
    let cells = self
      .rows
      .get_mut(row)
      .ok_or_else(|| eyre!("Row {} is out of range", row))?;
    if column >= width {
      return Err(eyre!("Column {} is out of range", column));
    }
    cells[column] = value.into();
    Ok(())
  }

  /// Append a row, padding it to the header width.
  pub fn push_row(&mut self, mut row: Vec<String>) -> Result<()> {
    let width = self.headers.len();
    if row.len() > width {
      return Err(eyre!(
        "Row {} has {} fields but the header has {}",
        self.rows.len() + 1,
        row.len(),
        width
      ));
    }
    row.resize(width, String::new());
    self.rows.push(row);
    Ok(())
  }

  /// Append an empty row and return its index.
  pub fn push_empty_row(&mut self) -> usize {
    self.rows.push(vec![String::new(); self.headers.len()]);
    self.rows.len() - 1
  }

  pub fn remove_row(&mut self, index: usize) -> Option<Vec<String>> {
    if index < self.rows.len() {
      Some(self.rows.remove(index))
    } else {
      None
    }
  }

  /// New table with only the given rows (by index, in the given order).
  pub fn select_rows(&self, indices: &[usize]) -> Table {
    Table {
      headers: self.headers.clone(),
      rows: indices
        .iter()
        .filter_map(|&i| self.rows.get(i).cloned())
        .collect(),
    }
  }
}

/// Parse a numeric cell the way a spreadsheet export writes them.
pub fn parse_number(value: &str) -> Option<f64> {
  let value = value.trim();
  if value.is_empty() || value.eq_ignore_ascii_case("nan") {
    return None;
  }
  value.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
  use super::*;

  const MASTER: &str = "SampleCode,LongName,pH,Density \n\
BEA001,\"Spruce, 500C\",7.2,0.41\n\
BEA002,Fir 700C,,0.38\n";

  #[test]
  fn test_csv_round_trip_is_byte_identical() {
    let table = Table::from_csv(MASTER.as_bytes()).unwrap();
    assert_eq!(table.to_csv().unwrap(), MASTER.as_bytes());
  }

  #[test]
  fn test_headers_keep_trailing_spaces() {
    let table = Table::from_csv(MASTER.as_bytes()).unwrap();
    assert_eq!(table.headers()[3], "Density ");
    assert_eq!(table.number(0, "Density "), Some(0.41));
  }

  #[test]
  fn test_short_rows_are_padded() {
    let table = Table::from_csv(b"a,b,c\n1,2\n").unwrap();
    assert_eq!(table.row(0).unwrap(), &["1", "2", ""]);
  }

  #[test]
  fn test_wide_rows_are_rejected() {
    let err = Table::from_csv(b"a,b\n1,2,3\n").unwrap_err();
    assert!(err.to_string().contains("3 fields"));
  }

  #[test]
  fn test_bom_is_ignored() {
    let table = Table::from_csv(b"\xEF\xBB\xBFSampleCode\nBEA001\n").unwrap();
    assert_eq!(table.headers(), &["SampleCode"]);
  }

  #[test]
  fn test_empty_csv_is_an_error() {
    assert!(Table::from_csv(b"").is_err());
  }

  #[test]
  fn test_number_parsing() {
    assert_eq!(parse_number(" 12.5 "), Some(12.5));
    assert_eq!(parse_number(""), None);
    assert_eq!(parse_number("NaN"), None);
    assert_eq!(parse_number("n/a"), None);
    assert_eq!(parse_number("inf"), None);
  }

  #[test]
  fn test_find_and_edit() {
    let mut table = Table::from_csv(MASTER.as_bytes()).unwrap();
    let row = table.find_row("SampleCode", "BEA002").unwrap();
    assert_eq!(row, 1);

    let ph = table.column_index("pH").unwrap();
    table.set_cell(row, ph, "8.1").unwrap();
    assert_eq!(table.number(1, "pH"), Some(8.1));
    assert!(table.set_cell(5, ph, "1").is_err());

    let new_row = table.push_empty_row();
    assert_eq!(table.len(), 3);
    assert_eq!(table.cell(new_row, "SampleCode"), Some(""));
    assert!(table.remove_row(new_row).is_some());
    assert!(table.remove_row(new_row).is_none());
  }

  #[test]
  fn test_missing_columns() {
    let table = Table::from_csv(MASTER.as_bytes()).unwrap();
    assert_eq!(
      table.missing_columns(&["SampleCode", "%C", "pH", "%O"]),
      vec!["%C".to_string(), "%O".to_string()]
    );
  }

  #[test]
  fn test_fingerprint_tracks_content() {
    let mut table = Table::from_csv(MASTER.as_bytes()).unwrap();
    let before = table.fingerprint().unwrap();
    assert_eq!(before.len(), 64);
    assert_eq!(before, table.clone().fingerprint().unwrap());

    table.set_cell(0, 2, "7.3").unwrap();
    assert_ne!(before, table.fingerprint().unwrap());
  }

  #[test]
  fn test_select_rows() {
    let table = Table::from_csv(MASTER.as_bytes()).unwrap();
    let picked = table.select_rows(&[1, 7]);
    assert_eq!(picked.len(), 1);
    assert_eq!(picked.cell(0, "SampleCode"), Some("BEA002"));
  }
}
