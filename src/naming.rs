//! The group's data file naming convention and instrument column layouts.
//!
//! `ProjectName_instrument_date(yyyymmdd)_ResearcherSampleCode_test.format`,
//! for example `ACBC_IR_20240906_BEA001_1.dpt`.

use chrono::NaiveDate;
use color_eyre::{eyre::eyre, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
  Ir,
  Pxrd,
  Chno,
  IcpOes,
  Eds,
  Pa,
  Tga,
  Ms,
  Ph,
}

impl Instrument {
  pub const ALL: [Instrument; 9] = [
    Instrument::Ir,
    Instrument::Pxrd,
    Instrument::Chno,
    Instrument::IcpOes,
    Instrument::Eds,
    Instrument::Pa,
    Instrument::Tga,
    Instrument::Ms,
    Instrument::Ph,
  ];

  /// Code used in file names.
  pub fn code(&self) -> &'static str {
    match self {
      Instrument::Ir => "IR",
      Instrument::Pxrd => "PXRD",
      Instrument::Chno => "CHNO",
      Instrument::IcpOes => "ICP-OES",
      Instrument::Eds => "EDS",
      Instrument::Pa => "PA",
      Instrument::Tga => "TGA",
      Instrument::Ms => "MS",
      Instrument::Ph => "pH",
    }
  }

  pub fn description(&self) -> &'static str {
    match self {
      Instrument::Ir => "infrared",
      Instrument::Pxrd => "powder X-ray diffraction",
      Instrument::Chno => "elemental analysis",
      Instrument::IcpOes => "inductively coupled plasma optical emission",
      Instrument::Eds => "energy dispersive X-ray",
      Instrument::Pa => "particle analysis",
      Instrument::Tga => "thermogravimetric analysis (TGA-MS)",
      Instrument::Ms => "mass spectrometry (TGA-MS)",
      Instrument::Ph => "pH",
    }
  }

  /// Number of columns a data file from this instrument holds, when known.
  pub fn expected_columns(&self) -> Option<usize> {
    match self {
      Instrument::Ir | Instrument::Pxrd | Instrument::Eds | Instrument::Tga | Instrument::Ms => {
        Some(2)
      }
      Instrument::Chno => Some(4),
      Instrument::IcpOes => Some(6),
      Instrument::Pa => None,
      Instrument::Ph => Some(1),
    }
  }

  pub fn column_labels(&self) -> &'static [&'static str] {
    match self {
      Instrument::Ir => &["wavenumber (cm-1)", "absorption intensity (a.u)"],
      Instrument::Pxrd => &["2theta (degree)", "peak intensity"],
      Instrument::Chno => &["C%", "H%", "N%", "O%"],
      Instrument::IcpOes => &["element", "ppm", "1sd", "wt%", "RSD (%)", "cor.-coeff"],
      Instrument::Eds => &["energy (keV)", "intensity (a.u)"],
      Instrument::Pa => &[],
      Instrument::Tga => &["temperature (oC)", "mass loss (mg)"],
      Instrument::Ms => &["mass-to-charge (m/z)", "relative abundance (%)"],
      Instrument::Ph => &["pH"],
    }
  }

  /// X and Y axis labels for a two column layout.
  pub fn axis_labels(&self) -> Option<(&'static str, &'static str)> {
    match self.column_labels() {
      [x, y] => Some((*x, *y)),
      _ => None,
    }
  }
}

impl FromStr for Instrument {
  type Err = color_eyre::Report;

  fn from_str(s: &str) -> Result<Self> {
    Instrument::ALL
      .into_iter()
      .find(|i| i.code().eq_ignore_ascii_case(s))
      .ok_or_else(|| eyre!("Unknown instrument '{}'", s))
  }
}

impl fmt::Display for Instrument {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.code())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFileName {
  pub project: String,
  pub instrument: Instrument,
  pub date: NaiveDate,
  /// Researcher initials, e.g. `BEA`
  pub researcher: String,
  /// Sample number as written, e.g. `001`
  pub sample: String,
  /// Test number or letter
  pub test: String,
  pub extension: String,
}

impl DataFileName {
  pub fn parse(name: &str) -> Result<Self> {
    let (stem, extension) = name
      .rsplit_once('.')
      .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
      .ok_or_else(|| eyre!("'{}' has no file extension", name))?;

    let fields: Vec<&str> = stem.split('_').collect();
    let [project, instrument, date, sample_code, test] = fields.as_slice() else {
      return Err(eyre!(
        "'{}' should have 5 fields separated by '_' \
         (project, instrument, date, sample code, test), found {}",
        name,
        fields.len()
      ));
    };

    if project.is_empty() || !project.chars().all(|c| c.is_ascii_alphanumeric()) {
      return Err(eyre!("Invalid project '{}'", project));
    }

    let instrument: Instrument = instrument.parse()?;

    if date.len() != 8 {
      return Err(eyre!("Invalid date '{}': expected yyyymmdd", date));
    }
    let date = NaiveDate::parse_from_str(date, "%Y%m%d")
      .map_err(|e| eyre!("Invalid date '{}': {}", date, e))?;

    let split = sample_code
      .find(|c: char| c.is_ascii_digit())
      .ok_or_else(|| eyre!("Invalid sample code '{}': missing sample number", sample_code))?;
    let (researcher, sample) = sample_code.split_at(split);
    if researcher.is_empty() || !researcher.chars().all(|c| c.is_ascii_alphabetic()) {
      return Err(eyre!(
        "Invalid sample code '{}': expected researcher initials then a number",
        sample_code
      ));
    }
    if !sample.chars().all(|c| c.is_ascii_digit()) {
      return Err(eyre!("Invalid sample code '{}': sample number must be digits", sample_code));
    }

    if test.is_empty() || !test.chars().all(|c| c.is_ascii_alphanumeric()) {
      return Err(eyre!("Invalid test '{}': expected a number or letter", test));
    }

    Ok(Self {
      project: project.to_string(),
      instrument,
      date,
      researcher: researcher.to_string(),
      sample: sample.to_string(),
      test: test.to_string(),
      extension: extension.to_string(),
    })
  }

  /// Sample code as stored in the inventory, e.g. `BEA001`.
  pub fn sample_code(&self) -> String {
    format!("{}{}", self.researcher, self.sample)
  }
}

impl fmt::Display for DataFileName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}_{}_{}_{}_{}.{}",
      self.project,
      self.instrument,
      self.date.format("%Y%m%d"),
      self.sample_code(),
      self.test,
      self.extension
    )
  }
}
