//! Tabular record source: reads the delimited source file into an ordered
//! sequence of [`TerritoryRecord`]s.
//!
//! Row order is preserved end to end; it defines processing and retry order.
//! Duplicate identifiers are both emitted — the ledger's skip-if-done check
//! silently drops the second one at run time.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AutomationError;

/// Logical field -> source column header. Externally configurable so the
/// spreadsheet does not have to be renamed to match the tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub identifier: String,
    pub suffix: String,
    pub category: String,
    pub kind: String,
    pub city: String,
    pub gps_link: String,
    pub notes: String,
    pub do_not_visit: String,
    pub publisher_notes: String,
    pub attachment: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            identifier: "Numero".to_string(),
            suffix: "Suffixe".to_string(),
            category: "Categorie".to_string(),
            kind: "Type".to_string(),
            city: "Ville".to_string(),
            gps_link: "Lien_GPS".to_string(),
            notes: "Notes".to_string(),
            do_not_visit: "Ne_Pas_Visiter".to_string(),
            publisher_notes: "Notes_Proclamateur".to_string(),
            attachment: "PDF_Filename".to_string(),
        }
    }
}

/// One row of source data. Constructed once at load time, immutable after.
///
/// `identifier` is guaranteed non-empty; every other field defaults to the
/// empty string, never a missing value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerritoryRecord {
    pub identifier: String,
    pub suffix: String,
    pub category: String,
    /// Raw territory type text; resolved against [`TerritoryType`] at fill time.
    pub kind: String,
    pub city: String,
    pub gps_link: String,
    pub notes: String,
    pub do_not_visit: String,
    pub publisher_notes: String,
    /// Explicit attachment filename. Empty means derive from the identifier.
    pub attachment: String,
}

impl TerritoryRecord {
    /// Explicit override wins; otherwise `identifier + ".pdf"`.
    pub fn attachment_filename(&self) -> String {
        if self.attachment.is_empty() {
            format!("{}.pdf", self.identifier)
        } else {
            self.attachment.clone()
        }
    }
}

/// The closed territory-type vocabulary. Matching is case- and
/// diacritic-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerritoryType {
    InPerson,
    Mail,
    Phone,
    Business,
}

impl TerritoryType {
    pub fn parse(raw: &str) -> Option<Self> {
        match fold_diacritics(&raw.trim().to_lowercase()).as_str() {
            "presentiel" | "en presentiel" => Some(Self::InPerson),
            "courrier" => Some(Self::Mail),
            "telephone" => Some(Self::Phone),
            "entreprise" => Some(Self::Business),
            _ => None,
        }
    }

    pub fn option_anchor(&self) -> &'static str {
        match self {
            Self::InPerson => "dropdown_option_presentiel",
            Self::Mail => "dropdown_option_courrier",
            Self::Phone => "dropdown_option_telephone",
            Self::Business => "dropdown_option_entreprise",
        }
    }

    /// Leaving the default type raises a confirmation modal in the target
    /// application; the default does not.
    pub fn needs_confirmation(&self) -> bool {
        !matches!(self, Self::InPerson)
    }
}

fn fold_diacritics(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// Reads the configured source file into [`TerritoryRecord`]s.
pub struct RecordSource {
    path: PathBuf,
    columns: ColumnMapping,
    records: Vec<TerritoryRecord>,
}

impl RecordSource {
    pub fn new(path: impl Into<PathBuf>, columns: ColumnMapping) -> Self {
        Self {
            path: path.into(),
            columns,
            records: Vec::new(),
        }
    }

    /// Load and validate the source file.
    ///
    /// Fails with [`AutomationError::NotFound`] if the path is absent,
    /// [`AutomationError::UnsupportedFormat`] for an unrecognized extension and
    /// [`AutomationError::InvalidData`] when the identifier column is missing
    /// or an identifier cell is empty.
    pub fn load(&mut self) -> Result<(), AutomationError> {
        if !self.path.exists() {
            return Err(AutomationError::NotFound(format!(
                "source file not found: {}",
                self.path.display()
            )));
        }

        let extension = self
            .path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let delimiter = match extension.as_str() {
            "csv" => b',',
            "tsv" => b'\t',
            "xlsx" | "xls" => {
                return Err(AutomationError::UnsupportedFormat(format!(
                    ".{extension} is not supported; export the sheet as .csv"
                )))
            }
            other => {
                return Err(AutomationError::UnsupportedFormat(format!(
                    ".{other} is not supported; use .csv or .tsv"
                )))
            }
        };

        info!("loading source file {}", self.path.display());
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| {
                AutomationError::InvalidData(format!("cannot open {}: {e}", self.path.display()))
            })?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| AutomationError::InvalidData(format!("unreadable header row: {e}")))?
            .iter()
            .enumerate()
            // Excel exports prefix the first header with a BOM.
            .map(|(i, h)| {
                let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
                h.trim().to_string()
            })
            .collect();

        let column = |name: &str| headers.iter().position(|h| h == name);
        let identifier_col = column(&self.columns.identifier).ok_or_else(|| {
            AutomationError::InvalidData(format!(
                "required column '{}' is missing; available columns: {:?}",
                self.columns.identifier, headers
            ))
        })?;
        let suffix_col = column(&self.columns.suffix);
        let category_col = column(&self.columns.category);
        let kind_col = column(&self.columns.kind);
        let city_col = column(&self.columns.city);
        let gps_col = column(&self.columns.gps_link);
        let notes_col = column(&self.columns.notes);
        let do_not_visit_col = column(&self.columns.do_not_visit);
        let publisher_col = column(&self.columns.publisher_notes);
        let attachment_col = column(&self.columns.attachment);

        let cell = |row: &csv::StringRecord, col: Option<usize>| {
            col.and_then(|i| row.get(i))
                .map(normalize_cell)
                .unwrap_or_default()
        };

        self.records.clear();
        for (index, row) in reader.records().enumerate() {
            let row = row.map_err(|e| {
                AutomationError::InvalidData(format!("row {}: {e}", index + 2))
            })?;
            let identifier = cell(&row, Some(identifier_col));
            if identifier.is_empty() {
                return Err(AutomationError::InvalidData(format!(
                    "row {}: column '{}' is empty",
                    index + 2,
                    self.columns.identifier
                )));
            }
            self.records.push(TerritoryRecord {
                identifier,
                suffix: cell(&row, suffix_col),
                category: cell(&row, category_col),
                kind: cell(&row, kind_col),
                city: cell(&row, city_col),
                gps_link: cell(&row, gps_col),
                notes: cell(&row, notes_col),
                do_not_visit: cell(&row, do_not_visit_col),
                publisher_notes: cell(&row, publisher_col),
                attachment: cell(&row, attachment_col),
            });
        }

        info!("loaded {} records", self.records.len());
        Ok(())
    }

    /// All records, in source file row order.
    pub fn records(&self) -> &[TerritoryRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<TerritoryRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Trim, and render numeric whole values without a decimal point so
/// spreadsheet exports like `12.0` match the `12` the form expects.
fn normalize_cell(raw: &str) -> String {
    let value = raw.trim();
    if value.is_empty() {
        return String::new();
    }
    if let Ok(number) = value.parse::<f64>() {
        if number.is_finite() && number.fract() == 0.0 && number.abs() < 9.0e15 {
            return (number as i64).to_string();
        }
    }
    value.to_string()
}
