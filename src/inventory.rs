//! The master biochar inventory and the chart data derived from it.

use color_eyre::{eyre::eyre, Result};
use tracing::warn;

use crate::table::Table;

pub const SAMPLE_CODE: &str = "SampleCode";
pub const LONG_NAME: &str = "LongName";

pub const CAPACITY: &str = "Capacity(mg/g)";
pub const BET: &str = "BET(m2/g)";

/// Parameters offered for the per-sample bar chart, in picker order.
///
/// `Density ` and `Hydrophobicity ` carry the trailing space of the real
/// spreadsheet headers.
pub const PARAMETERS: [&str; 8] = [
  CAPACITY,
  BET,
  "pH",
  "Yield (%)",
  "PoreSize(units)",
  "PoreVolume(units)",
  "Density ",
  "Hydrophobicity ",
];

pub const ELEMENTS: [&str; 4] = ["%C", "%H", "%N", "%O"];

/// One bar of a parameter chart. `value` is `None` when the cell is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleValue {
  pub code: String,
  pub value: Option<f64>,
}

/// Elemental analysis of one sample, in `ELEMENTS` order.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
  pub code: String,
  pub percentages: [Option<f64>; 4],
}

/// A sample with adsorption capacity, surface area and `(O+N)/C` all known.
#[derive(Debug, Clone, PartialEq)]
pub struct AdsorptionPoint {
  pub code: String,
  pub long_name: String,
  pub capacity: f64,
  pub bet: f64,
  pub ratio: f64,
}

impl AdsorptionPoint {
  pub fn label(&self) -> String {
    format!(
      "{}: ({:.2}, {:.2}, {:.2})",
      self.code, self.capacity, self.bet, self.ratio
    )
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inventory {
  table: Table,
  missing: Vec<String>,
}

impl Inventory {
  pub fn from_table(table: Table) -> Result<Self> {
    if table.column_index(SAMPLE_CODE).is_none() {
      return Err(eyre!(
        "Inventory has no '{}' column (found: {})",
        SAMPLE_CODE,
        table.headers().join(", ")
      ));
    }

    let expected: Vec<&str> = std::iter::once(LONG_NAME)
      .chain(PARAMETERS)
      .chain(ELEMENTS)
      .collect();
    let missing = table.missing_columns(&expected);
    if !missing.is_empty() {
      warn!(columns = ?missing, "Inventory is missing expected columns");
    }

    Ok(Self { table, missing })
  }

  pub fn table(&self) -> &Table {
    &self.table
  }

  pub fn into_table(self) -> Table {
    self.table
  }

  /// Expected columns that the loaded file lacks.
  pub fn missing_columns(&self) -> &[String] {
    &self.missing
  }

  pub fn len(&self) -> usize {
    self.table.len()
  }

  pub fn is_empty(&self) -> bool {
    self.table.is_empty()
  }

  pub fn sample_codes(&self) -> Vec<String> {
    (0..self.table.len())
      .filter_map(|row| self.table.cell(row, SAMPLE_CODE))
      .filter(|code| !code.is_empty())
      .map(String::from)
      .collect()
  }

  /// Values of `param` for the given samples, in the order given. Unknown
  /// sample codes are skipped.
  pub fn parameter_series(&self, param: &str, codes: &[String]) -> Vec<SampleValue> {
    codes
      .iter()
      .filter_map(|code| {
        let row = self.table.find_row(SAMPLE_CODE, code)?;
        Some(SampleValue {
          code: code.clone(),
          value: self.table.number(row, param),
        })
      })
      .collect()
  }

  pub fn elemental_composition(&self, codes: &[String]) -> Vec<Composition> {
    codes
      .iter()
      .filter_map(|code| {
        let row = self.table.find_row(SAMPLE_CODE, code)?;
        Some(Composition {
          code: code.clone(),
          percentages: ELEMENTS.map(|element| self.table.number(row, element)),
        })
      })
      .collect()
  }

  /// Every sample for which capacity, BET and `(O+N)/C` can be computed.
  pub fn adsorption_points(&self) -> Vec<AdsorptionPoint> {
    (0..self.table.len())
      .filter_map(|row| {
        let capacity = self.table.number(row, CAPACITY)?;
        let bet = self.table.number(row, BET)?;
        let carbon = self.table.number(row, "%C")?;
        let oxygen = self.table.number(row, "%O")?;
        let nitrogen = self.table.number(row, "%N")?;
        if carbon == 0.0 {
          return None;
        }
        Some(AdsorptionPoint {
          code: self.table.cell(row, SAMPLE_CODE)?.to_string(),
          long_name: self.table.cell(row, LONG_NAME).unwrap_or_default().to_string(),
          capacity,
          bet,
          ratio: (oxygen + nitrogen) / carbon,
        })
      })
      .collect()
  }
}

/// Hints shown next to a row being edited: the identifying columns that
/// are still empty.
pub fn required_field_hints(table: &Table, row: usize) -> Vec<String> {
  [SAMPLE_CODE, LONG_NAME]
    .iter()
    .filter(|column| {
      table.column_index(column).is_some()
        && table
          .cell(row, column)
          .map(|value| value.trim().is_empty())
          .unwrap_or(true)
    })
    .map(|column| format!("{} is required", column))
    .collect()
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  pub(crate) const MASTER_CSV: &str = "SampleCode,LongName,Capacity(mg/g),BET(m2/g),pH,\
    Yield (%),PoreSize(units),PoreVolume(units),Density ,Hydrophobicity ,%C,%H,%N,%O\n\
BEA001,Spruce 500C,12.5,310.2,7.2,31,2.1,0.15,0.41,0.9,78.1,2.3,0.6,12.4\n\
BEA002,Fir 700C,20,455,8.9,24,1.8,0.22,0.38,1.1,85.0,1.2,0.4,8.1\n\
BEA003,Maple 400C,,120,6.5,40,,,,,70.2,3.9,0.9,20.3\n";

  fn inventory() -> Inventory {
    Inventory::from_table(Table::from_csv(MASTER_CSV.as_bytes()).unwrap()).unwrap()
  }

  #[test]
  fn test_expected_columns_present() {
    let inv = inventory();
    assert!(inv.missing_columns().is_empty());
    assert_eq!(inv.len(), 3);
    assert_eq!(inv.sample_codes(), vec!["BEA001", "BEA002", "BEA003"]);
  }

  #[test]
  fn test_missing_sample_code_is_an_error() {
    let table = Table::from_csv(b"Code,pH\nX,7\n").unwrap();
    let err = Inventory::from_table(table).unwrap_err();
    assert!(err.to_string().contains("SampleCode"));
  }

  #[test]
  fn test_missing_optional_columns_are_reported() {
    let table = Table::from_csv(b"SampleCode,LongName,pH\nBEA001,Spruce,7\n").unwrap();
    let inv = Inventory::from_table(table).unwrap();
    assert!(inv.missing_columns().contains(&"%C".to_string()));
    assert!(inv.missing_columns().contains(&"Density ".to_string()));
    assert!(!inv.missing_columns().contains(&"pH".to_string()));
  }

  #[test]
  fn test_parameter_series_follows_selection_order() {
    let inv = inventory();
    let codes = vec!["BEA003".to_string(), "NOPE".to_string(), "BEA001".to_string()];
    let series = inv.parameter_series("Density ", &codes);
    assert_eq!(
      series,
      vec![
        SampleValue {
          code: "BEA003".into(),
          value: None
        },
        SampleValue {
          code: "BEA001".into(),
          value: Some(0.41)
        },
      ]
    );
  }

  #[test]
  fn test_elemental_composition() {
    let inv = inventory();
    let comp = inv.elemental_composition(&["BEA002".to_string()]);
    assert_eq!(comp.len(), 1);
    assert_eq!(comp[0].percentages, [Some(85.0), Some(1.2), Some(0.4), Some(8.1)]);
  }

  #[test]
  fn test_adsorption_points_drop_incomplete_rows() {
    let inv = inventory();
    let points = inv.adsorption_points();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].code, "BEA001");
    assert_eq!(points[0].label(), "BEA001: (12.50, 310.20, 0.17)");
    assert_eq!(points[1].label(), "BEA002: (20.00, 455.00, 0.10)");
  }

  #[test]
  fn test_required_field_hints() {
    let mut table = Table::from_csv(MASTER_CSV.as_bytes()).unwrap();
    assert!(required_field_hints(&table, 0).is_empty());

    let row = table.push_empty_row();
    assert_eq!(
      required_field_hints(&table, row),
      vec!["SampleCode is required", "LongName is required"]
    );
  }
}
