//! Plain-text instrument exports (IR, PXRD, TGA, ...) as numeric columns.

use color_eyre::{eyre::eyre, Result};

use crate::naming::Instrument;
use crate::table::parse_number;

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentData {
  /// Lines before the first data row
  pub header: Vec<String>,
  rows: Vec<Vec<String>>,
}

impl InstrumentData {
  /// Parse an export. Fields may be separated by tabs, commas, semicolons
  /// or runs of spaces. Lines before the first one holding a number are
  /// kept as the header; blank lines are skipped.
  pub fn parse(bytes: &[u8]) -> Result<Self> {
    let text = String::from_utf8_lossy(bytes);
    let mut header = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    for (index, line) in text.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() {
        continue;
      }
      let fields = split_fields(line);
      let numeric = fields.iter().any(|f| parse_number(f).is_some());

      if rows.is_empty() && !numeric {
        header.push(line.to_string());
        continue;
      }

      if let Some(first) = rows.first() {
        if fields.len() != first.len() {
          return Err(eyre!(
            "Line {} has {} columns, expected {}",
            index + 1,
            fields.len(),
            first.len()
          ));
        }
      }
      rows.push(fields);
    }

    if rows.is_empty() {
      return Err(eyre!("No numeric data found"));
    }

    Ok(Self { header, rows })
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn columns(&self) -> usize {
    self.rows.first().map(Vec::len).unwrap_or(0)
  }

  pub fn rows(&self) -> &[Vec<String>] {
    &self.rows
  }

  /// Check the column count against the instrument's layout.
  pub fn check_against(&self, instrument: Instrument) -> Result<()> {
    match instrument.expected_columns() {
      Some(expected) if expected != self.columns() => Err(eyre!(
        "{} data should have {} columns ({}), found {}",
        instrument,
        expected,
        instrument.column_labels().join(" | "),
        self.columns()
      )),
      _ => Ok(()),
    }
  }

  /// `(x, y)` pairs from two columns, skipping rows where either is not a
  /// number.
  pub fn series(&self, x: usize, y: usize) -> Vec<(f64, f64)> {
    self
      .rows
      .iter()
      .filter_map(|row| {
        let x = parse_number(row.get(x)?)?;
        let y = parse_number(row.get(y)?)?;
        Some((x, y))
      })
      .collect()
  }

  /// Minimum and maximum of a column, ignoring non-numeric cells.
  pub fn column_range(&self, column: usize) -> Option<[f64; 2]> {
    let values = self
      .rows
      .iter()
      .filter_map(|row| row.get(column).and_then(|v| parse_number(v)));
    range_of(values)
  }
}

/// Axis bounds for a series, widened when flat so a chart has some height.
pub fn bounds(points: &[(f64, f64)]) -> Option<([f64; 2], [f64; 2])> {
  let x = range_of(points.iter().map(|p| p.0))?;
  let y = range_of(points.iter().map(|p| p.1))?;
  Some((widen(x), widen(y)))
}

fn range_of(values: impl Iterator<Item = f64>) -> Option<[f64; 2]> {
  values.fold(None, |acc, v| match acc {
    None => Some([v, v]),
    Some([lo, hi]) => Some([lo.min(v), hi.max(v)]),
  })
}

fn widen([lo, hi]: [f64; 2]) -> [f64; 2] {
  if lo == hi {
    [lo - 1.0, hi + 1.0]
  } else {
    [lo, hi]
  }
}

fn split_fields(line: &str) -> Vec<String> {
  line
    .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
    .filter(|field| !field.is_empty())
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_tab_separated_with_header() {
    let data = InstrumentData::parse(
      b"Bruker OPUS export\nwavenumber\tabsorbance\n\n4000.0\t0.12\n3998.1\t0.15\n3996.2\t0.11\n",
    )
    .unwrap();
    assert_eq!(data.header.len(), 2);
    assert_eq!(data.len(), 3);
    assert_eq!(data.columns(), 2);
    assert!(data.check_against(Instrument::Ir).is_ok());
    assert_eq!(data.series(0, 1)[1], (3998.1, 0.15));
  }

  #[test]
  fn test_parse_mixed_delimiters() {
    let data = InstrumentData::parse(b"10,1.5\n20; 2.5\n30   3.5\r\n").unwrap();
    assert_eq!(data.series(0, 1), vec![(10.0, 1.5), (20.0, 2.5), (30.0, 3.5)]);
  }

  #[test]
  fn test_inconsistent_columns() {
    let err = InstrumentData::parse(b"1\t2\n3\t4\t5\n").unwrap_err();
    assert!(err.to_string().contains("Line 2 has 3 columns, expected 2"));
  }

  #[test]
  fn test_no_numeric_data() {
    assert!(InstrumentData::parse(b"just\na header\n").is_err());
    assert!(InstrumentData::parse(b"").is_err());
  }

  #[test]
  fn test_check_against_layout() {
    let data = InstrumentData::parse(b"78.1 2.3 0.6 12.4\n").unwrap();
    assert!(data.check_against(Instrument::Chno).is_ok());
    let err = data.check_against(Instrument::Pxrd).unwrap_err();
    assert!(err.to_string().contains("PXRD data should have 2 columns"));
    assert!(data.check_against(Instrument::Pa).is_ok());
  }

  #[test]
  fn test_text_cells_are_skipped_in_series() {
    let data = InstrumentData::parse(b"Ca 12.1\nMg 3.4\nK n/a\n").unwrap();
    assert_eq!(data.len(), 3);
    assert!(data.series(0, 1).is_empty());
    assert_eq!(data.column_range(1), Some([3.4, 12.1]));
  }

  #[test]
  fn test_bounds() {
    assert_eq!(bounds(&[]), None);
    assert_eq!(
      bounds(&[(1.0, 5.0), (3.0, 5.0)]),
      Some(([1.0, 3.0], [4.0, 6.0]))
    );
  }
}
