//! User submissions: copies of the inventory schema written to the store as
//! new, immutably named files for manual review.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;

use crate::inventory::SAMPLE_CODE;
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
  /// The whole edited table
  Full,
  /// Only rows that are new or changed relative to the master
  Partial,
}

impl SubmissionKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      SubmissionKind::Full => "full",
      SubmissionKind::Partial => "partial",
    }
  }
}

#[derive(Debug, Clone)]
pub struct SubmissionRecord {
  pub kind: SubmissionKind,
  pub author: String,
  pub created_at: DateTime<Utc>,
  pub table: Table,
}

impl SubmissionRecord {
  pub fn full(table: Table, author: &str, now: DateTime<Utc>) -> Result<Self> {
    if table.is_empty() {
      return Err(eyre!("Nothing to submit: the table has no rows"));
    }
    Ok(Self {
      kind: SubmissionKind::Full,
      author: author.to_string(),
      created_at: now,
      table,
    })
  }

  /// Rows of `edited` whose `SampleCode` is absent from `master`, or whose
  /// cells differ from every master row with that code. Rows without a
  /// `SampleCode` are skipped.
  ///
  /// Columns are compared by name so a reordered header is not a change.
  pub fn partial(master: &Table, edited: &Table, author: &str, now: DateTime<Utc>) -> Result<Self> {
    let key = edited
      .column_index(SAMPLE_CODE)
      .ok_or_else(|| eyre!("Edited table has no '{}' column", SAMPLE_CODE))?;

    // A code may repeat in the master; a row is unchanged if it matches any
    // of the rows holding its code.
    let mut master_rows: HashMap<&str, Vec<usize>> = HashMap::new();
    if let Some(col) = master.column_index(SAMPLE_CODE) {
      for (i, row) in master.rows().iter().enumerate() {
        master_rows.entry(row[col].trim()).or_default().push(i);
      }
    }

    let changed: Vec<usize> = edited
      .rows()
      .iter()
      .enumerate()
      .filter(|(_, row)| !row[key].trim().is_empty())
      .filter(|(_, row)| match master_rows.get(row[key].trim()) {
        None => true,
        Some(candidates) => candidates
          .iter()
          .all(|&master_row| differs(master, master_row, edited, row)),
      })
      .map(|(i, _)| i)
      .collect();

    if changed.is_empty() {
      return Err(eyre!("Nothing to submit: no new or changed rows"));
    }

    Ok(Self {
      kind: SubmissionKind::Partial,
      author: author.to_string(),
      created_at: now,
      table: edited.select_rows(&changed),
    })
  }

  /// `submission_<YYYYMMDD-HHMMSS>_<author>.csv`
  pub fn file_name(&self) -> String {
    format!(
      "submission_{}_{}.csv",
      self.created_at.format("%Y%m%d-%H%M%S"),
      author_slug(&self.author)
    )
  }

  pub fn commit_message(&self) -> String {
    format!("Add {} submission by {}", self.kind.as_str(), self.author)
  }

  pub fn to_csv(&self) -> Result<Vec<u8>> {
    self.table.to_csv()
  }
}

fn differs(master: &Table, master_row: usize, edited: &Table, row: &[String]) -> bool {
  edited.headers().iter().zip(row).any(|(header, value)| {
    master
      .cell(master_row, header)
      .map(|old| old != value)
      .unwrap_or(!value.is_empty())
  })
}

fn author_slug(author: &str) -> String {
  let slug: String = author
    .trim()
    .chars()
    .filter_map(|c| match c {
      c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => Some(c),
      ' ' => Some('_'),
      _ => None,
    })
    .collect();
  if slug.is_empty() {
    "anonymous".to_string()
  } else {
    slug
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  const MASTER: &str = "SampleCode,LongName,pH\nBEA001,Spruce,7.2\nBEA002,Fir,8.9\n";

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 6, 14, 3, 9).unwrap()
  }

  #[test]
  fn test_full_record_naming() {
    let table = Table::from_csv(MASTER.as_bytes()).unwrap();
    let record = SubmissionRecord::full(table, "Brian Espinosa", now()).unwrap();
    assert_eq!(
      record.file_name(),
      "submission_20240906-140309_Brian_Espinosa.csv"
    );
    assert_eq!(record.commit_message(), "Add full submission by Brian Espinosa");
    assert_eq!(record.to_csv().unwrap(), MASTER.as_bytes());
  }

  #[test]
  fn test_partial_keeps_only_new_and_changed_rows() {
    let master = Table::from_csv(MASTER.as_bytes()).unwrap();
    let edited = Table::from_csv(
      b"SampleCode,LongName,pH\nBEA001,Spruce,7.2\nBEA002,Fir,9.1\nBEA003,Maple,\n,,\n",
    )
    .unwrap();

    let record = SubmissionRecord::partial(&master, &edited, "bea", now()).unwrap();
    assert_eq!(record.kind, SubmissionKind::Partial);
    assert_eq!(record.table.len(), 2);
    assert_eq!(record.table.cell(0, "SampleCode"), Some("BEA002"));
    assert_eq!(record.table.cell(1, "SampleCode"), Some("BEA003"));
    assert_eq!(record.commit_message(), "Add partial submission by bea");
  }

  #[test]
  fn test_partial_ignores_column_order() {
    let master = Table::from_csv(MASTER.as_bytes()).unwrap();
    let edited = Table::from_csv(b"pH,SampleCode,LongName\n7.2,BEA001,Spruce\n").unwrap();
    let err = SubmissionRecord::partial(&master, &edited, "bea", now()).unwrap_err();
    assert!(err.to_string().contains("Nothing to submit"));
  }

  #[test]
  fn test_partial_new_column_counts_as_change() {
    let master = Table::from_csv(MASTER.as_bytes()).unwrap();
    let edited =
      Table::from_csv(b"SampleCode,LongName,pH,%C\nBEA001,Spruce,7.2,78\nBEA002,Fir,8.9,\n")
        .unwrap();
    let record = SubmissionRecord::partial(&master, &edited, "bea", now()).unwrap();
    assert_eq!(record.table.len(), 1);
    assert_eq!(record.table.cell(0, "SampleCode"), Some("BEA001"));
  }

  #[test]
  fn test_partial_skips_rows_without_sample_code() {
    let master = Table::from_csv(MASTER.as_bytes()).unwrap();
    let edited = Table::from_csv(
      b"SampleCode,LongName,pH\nBEA001,Spruce,7.2\nBEA002,Fir,8.9\n,Oak,6.1\n  ,Ash,5.0\n",
    )
    .unwrap();
    let err = SubmissionRecord::partial(&master, &edited, "bea", now()).unwrap_err();
    assert!(err.to_string().contains("Nothing to submit"));
  }

  #[test]
  fn test_partial_with_duplicate_codes_in_master() {
    let master = Table::from_csv(b"SampleCode,pH\nBEA001,7.2\nBEA001,8.0\n").unwrap();
    let unchanged = master.clone();
    let err = SubmissionRecord::partial(&master, &unchanged, "bea", now()).unwrap_err();
    assert!(err.to_string().contains("Nothing to submit"));

    let edited = Table::from_csv(b"SampleCode,pH\nBEA001,7.2\nBEA001,9.9\n").unwrap();
    let record = SubmissionRecord::partial(&master, &edited, "bea", now()).unwrap();
    assert_eq!(record.table.len(), 1);
    assert_eq!(record.table.cell(0, "pH"), Some("9.9"));
  }

  #[test]
  fn test_empty_full_submission_is_an_error() {
    let table = Table::from_csv(b"SampleCode\n").unwrap();
    assert!(SubmissionRecord::full(table, "bea", now()).is_err());
  }

  #[test]
  fn test_author_slug() {
    assert_eq!(author_slug("  José O'Neil "), "Jos_ONeil");
    assert_eq!(author_slug("lab-user_2"), "lab-user_2");
    assert_eq!(author_slug("???"), "anonymous");
  }
}
