//! One-shot subcommands that run without the dashboard.

use chrono::Utc;
use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::naming::DataFileName;
use crate::session::Session;
use crate::spectrum::InstrumentData;
use crate::store::{RemoteEntry, RemoteStore};
use crate::submission::SubmissionRecord;
use crate::table::Table;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Print the master inventory as CSV (always fetched fresh)
  Inventory,

  /// List a remote directory (default: the submissions directory)
  List {
    #[arg(value_name = "DIR")]
    dir: Option<String>,
  },

  /// Upload a local CSV as a submission record
  Submit {
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Only submit rows that are new or differ from the master
    #[arg(long)]
    partial: bool,
  },

  /// Fetch an instrument data file and summarise it
  Spectrum {
    #[arg(value_name = "PATH")]
    path: String,
  },

  /// Check a data file name against the naming convention
  CheckName {
    #[arg(value_name = "NAME")]
    name: String,
  },
}

pub async fn run<S: RemoteStore>(command: Command, session: &Session<S>) -> Result<()> {
  let mut out = std::io::stdout();
  match command {
    Command::Inventory => {
      let inventory = session.refresh().await?.data;
      for column in inventory.missing_columns() {
        eprintln!("warning: missing column '{}'", column);
      }
      out.write_all(&inventory.table().to_csv()?)?;
    }
    Command::List { dir } => {
      let dir = dir.unwrap_or_else(|| session.config().paths.submissions.clone());
      let entries = session.store().list(&dir).await?;
      for entry in entries {
        writeln!(out, "{}", format_entry(&entry))?;
      }
    }
    Command::Submit { file, partial } => {
      let record = load_record(session, &file, partial).await?;
      let path = session.submit(&record).await?;
      writeln!(
        out,
        "Submitted {} row(s) as {} ({})",
        record.table.len(),
        path,
        record.kind.as_str()
      )?;
    }
    Command::Spectrum { path } => {
      let data = session.spectrum(&path).await?.data;
      write_spectrum_summary(&mut out, &path, &data)?;
    }
    Command::CheckName { name } => check_name(&mut out, &name)?,
  }
  Ok(())
}

/// Explain how a file name splits into the convention's fields. Needs no
/// store, so it runs before one is connected.
pub fn check_name(out: &mut impl Write, name: &str) -> Result<()> {
  let parsed = DataFileName::parse(name)?;
  writeln!(out, "project     {}", parsed.project)?;
  writeln!(
    out,
    "instrument  {} ({})",
    parsed.instrument,
    parsed.instrument.description()
  )?;
  writeln!(out, "date        {}", parsed.date)?;
  writeln!(out, "sample      {}", parsed.sample_code())?;
  writeln!(out, "test        {}", parsed.test)?;
  writeln!(out, "format      {}", parsed.extension)?;
  if parsed.to_string() != name {
    writeln!(out, "canonical   {}", parsed)?;
  }
  Ok(())
}

async fn load_record<S: RemoteStore>(
  session: &Session<S>,
  file: &Path,
  partial: bool,
) -> Result<SubmissionRecord> {
  let bytes =
    std::fs::read(file).map_err(|e| eyre!("Failed to read {}: {}", file.display(), e))?;
  let table = Table::from_csv(&bytes)?;
  let author = session.config().author().to_string();

  if partial {
    let master = session.inventory().await?.data;
    SubmissionRecord::partial(master.table(), &table, &author, Utc::now())
  } else {
    SubmissionRecord::full(table, &author, Utc::now())
  }
}

fn format_entry(entry: &RemoteEntry) -> String {
  let size = match (entry.is_dir, entry.size) {
    (true, _) => "dir".to_string(),
    (false, Some(size)) => size.to_string(),
    (false, None) => "-".to_string(),
  };
  let modified = entry
    .modified
    .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_else(|| "-".to_string());
  format!("{:>10}  {:<16}  {}", size, modified, entry.path)
}

fn write_spectrum_summary(out: &mut impl Write, path: &str, data: &InstrumentData) -> Result<()> {
  writeln!(out, "{}: {} rows, {} columns", path, data.len(), data.columns())?;

  let name = path.rsplit('/').next().unwrap_or(path);
  let labels: &[&str] = match DataFileName::parse(name) {
    Ok(parsed) => {
      if let Err(e) = data.check_against(parsed.instrument) {
        writeln!(out, "warning: {}", e)?;
      }
      parsed.instrument.column_labels()
    }
    Err(e) => {
      writeln!(out, "warning: {}", e)?;
      &[]
    }
  };

  for column in 0..data.columns() {
    let label = labels.get(column).copied().unwrap_or("");
    match data.column_range(column) {
      Some([lo, hi]) => writeln!(out, "  [{}] {:<28} {} .. {}", column, label, lo, hi)?,
      None => writeln!(out, "  [{}] {:<28} (text)", column, label)?,
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_format_entry() {
    let entry = RemoteEntry {
      name: "a.csv".into(),
      path: "submissions/a.csv".into(),
      size: Some(120),
      modified: None,
      is_dir: false,
    };
    assert_eq!(
      format_entry(&entry),
      "       120  -                 submissions/a.csv"
    );
  }

  #[test]
  fn test_spectrum_summary_flags_layout() {
    let data = InstrumentData::parse(b"1 2 3\n4 5 6\n").unwrap();
    let mut out = Vec::new();
    write_spectrum_summary(&mut out, "spectra/ACBC_IR_20240906_BEA001_1.dpt", &data).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("2 rows, 3 columns"));
    assert!(text.contains("warning: IR data should have 2 columns"));
    assert!(text.contains("wavenumber (cm-1)"));
  }

  #[test]
  fn test_check_name_prints_canonical_form() {
    let mut out = Vec::new();
    check_name(&mut out, "ACBC_ir_20240906_BEA001_1.dpt").unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("sample      BEA001"));
    assert!(text.contains("canonical   ACBC_IR_20240906_BEA001_1.dpt"));

    let mut out = Vec::new();
    assert!(check_name(&mut out, "ACBC_IR_BEA001_1.dpt").is_err());
  }
}
