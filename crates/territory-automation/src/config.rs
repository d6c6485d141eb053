//! Run configuration: paths, delays, calibrated coordinates and the closed
//! vocabularies used by the form.
//!
//! Everything here is assembled once at startup and handed to the components
//! as an immutable value. Calibration and vocabulary options are read from the
//! same JSON files the calibration tooling writes (`calibration.json`,
//! `options.json`); a missing or corrupt file falls back to the built-in
//! defaults with a warning, never an error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AutomationError;
use crate::records::ColumnMapping;

/// Named pauses inserted between UI actions so the target application's UI
/// can settle. Fixed per run, not adaptive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayProfile {
    /// After every mouse click.
    #[serde(with = "secs")]
    pub after_click: Duration,
    /// After every paste-style text insert.
    #[serde(with = "secs")]
    pub after_type: Duration,
    /// Total budget for the application to come up after spawning it.
    #[serde(with = "secs")]
    pub app_launch: Duration,
    /// After confirming a file picker or any other committing action.
    #[serde(with = "secs")]
    pub after_save: Duration,
    /// Between two consecutive records.
    #[serde(with = "secs")]
    pub between_records: Duration,
}

impl Default for DelayProfile {
    fn default() -> Self {
        Self {
            after_click: Duration::from_millis(300),
            after_type: Duration::from_millis(100),
            app_launch: Duration::from_secs(10),
            after_save: Duration::from_secs(1),
            between_records: Duration::from_millis(500),
        }
    }
}

/// Duration <-> fractional seconds, the unit the calibration tooling uses.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let value = f64::deserialize(deserializer)?;
        // from_secs_f64 panics on negative/NaN input.
        Duration::try_from_secs_f64(value)
            .map_err(|e| serde::de::Error::custom(format!("invalid delay {value}: {e}")))
    }
}

/// Mapping from named UI anchors to absolute screen positions.
///
/// The table is calibrated out-of-band; at run time it is read-only. A missing
/// anchor is either a configuration error (`require`) or degrades the feature
/// that needed it (`get`), depending on the call site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoordinateTable {
    anchors: BTreeMap<String, (i32, i32)>,
}

impl CoordinateTable {
    /// The uncalibrated placeholder table. Real runs are expected to merge a
    /// `calibration.json` over it.
    pub fn defaults() -> Self {
        let mut table = Self::default();
        // Navigation
        table.set("btn_menu_territoires", 100, 80);
        table.set("btn_liste_territoires", 150, 120);
        // Creation
        table.set("btn_new_territory", 50, 150);
        // Form, in fill order
        table.set("dropdown_categorie", 800, 175);
        table.set("dropdown_option_sar", 800, 195);
        table.set("field_numero", 800, 200);
        table.set("field_suffixe", 800, 225);
        table.set("dropdown_type", 800, 250);
        table.set("dropdown_option_presentiel", 800, 270);
        table.set("dropdown_option_courrier", 800, 290);
        table.set("dropdown_option_telephone", 800, 310);
        table.set("dropdown_option_entreprise", 800, 330);
        table.set("btn_confirm_type", 500, 400);
        table.set("dropdown_ville", 800, 375);
        table.set("dropdown_ville_aucun", 800, 395);
        table.set("dropdown_ville_carrieres", 800, 415);
        table.set("dropdown_ville_maisons", 800, 435);
        table.set("dropdown_ville_mesnil", 800, 455);
        table.set("dropdown_ville_montesson", 800, 475);
        table.set("dropdown_ville_sartrouville", 800, 495);
        table.set("field_lien_gps", 800, 400);
        table.set("field_notes", 800, 400);
        table.set("field_ne_pas_visiter", 800, 450);
        table.set("field_notes_proclamateur", 800, 500);
        table.set("btn_carte", 900, 50);
        // Actions
        table.set("btn_import_pdf", 800, 550);
        table
    }

    pub fn set(&mut self, name: impl Into<String>, x: i32, y: i32) {
        self.anchors.insert(name.into(), (x, y));
    }

    pub fn remove(&mut self, name: &str) {
        self.anchors.remove(name);
    }

    /// Calibrated entries override defaults; anchors absent from `other` keep
    /// their current position.
    pub fn merge(&mut self, other: CoordinateTable) {
        self.anchors.extend(other.anchors);
    }

    pub fn get(&self, name: &str) -> Option<(i32, i32)> {
        self.anchors.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.anchors.contains_key(name)
    }

    pub fn require(&self, name: &str) -> Result<(i32, i32), AutomationError> {
        self.get(name)
            .ok_or_else(|| AutomationError::AnchorMissing(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

/// How a detected startup dialog is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseMethod {
    Escape,
    Enter,
    ClickClose,
    ClickOk,
}

/// Startup dialogs ("Tip of the day" and friends) that may cover the main
/// window right after launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupDialogConfig {
    /// Candidate window titles, matched as substrings.
    pub titles: Vec<String>,
    pub close_method: CloseMethod,
    /// Fallback coordinate for the click-based close methods when no
    /// `btn_close_dialog` anchor is calibrated.
    pub close_button: (i32, i32),
    /// Settle time before looking for dialogs.
    #[serde(with = "secs")]
    pub wait: Duration,
}

impl Default for StartupDialogConfig {
    fn default() -> Self {
        Self {
            titles: [
                "Astuce",
                "Tip",
                "Conseil",
                "Bienvenue",
                "Welcome",
                "Did you know",
                "Le saviez-vous",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            close_method: CloseMethod::Escape,
            close_button: (960, 600),
            wait: Duration::from_secs(2),
        }
    }
}

/// Vocabulary options as stored in `options.json`. The on-disk key names match
/// the calibration tooling's format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct OptionsFile {
    #[serde(default)]
    categories: Option<BTreeMap<String, String>>,
    #[serde(rename = "villes", default)]
    cities: Option<BTreeMap<String, String>>,
}

fn default_categories() -> BTreeMap<String, String> {
    BTreeMap::from([("SAR".to_string(), "dropdown_option_sar".to_string())])
}

fn default_cities() -> BTreeMap<String, String> {
    [
        ("AUCUN", "dropdown_ville_aucun"),
        ("", "dropdown_ville_aucun"),
        ("CARRIERE S/ BOIS", "dropdown_ville_carrieres"),
        ("CARRIERES", "dropdown_ville_carrieres"),
        ("MAISONS-LAFFITTE", "dropdown_ville_maisons"),
        ("MAISONS LAFFITTE", "dropdown_ville_maisons"),
        ("MESNIL LE ROI", "dropdown_ville_mesnil"),
        ("MONTESSON", "dropdown_ville_montesson"),
        ("SARTROUVILLE", "dropdown_ville_sartrouville"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Everything a run needs, built once and shared read-only.
#[derive(Debug, Clone)]
pub struct AutomationConfig {
    /// Executable of the target application, used only when no window can be
    /// connected to.
    pub exe_path: PathBuf,
    /// Substring identifying the application's top-level window title.
    pub window_title: String,
    pub data_file: PathBuf,
    pub attachment_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub coordinates: CoordinateTable,
    pub delays: DelayProfile,
    pub startup_dialogs: StartupDialogConfig,
    pub columns: ColumnMapping,
    /// The constant category selected for every record.
    pub category: String,
    /// Category label -> dropdown option anchor.
    pub categories: BTreeMap<String, String>,
    /// Canonicalized (uppercased, trimmed) city spelling -> dropdown option
    /// anchor. Several synonym spellings fold to one option.
    pub cities: BTreeMap<String, String>,
}

impl AutomationConfig {
    pub fn new(
        data_file: impl Into<PathBuf>,
        attachment_dir: impl Into<PathBuf>,
        ledger_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            exe_path: PathBuf::from(r"C:\Program Files\New World Scheduler\NW Scheduler.exe"),
            window_title: "NW Scheduler".to_string(),
            data_file: data_file.into(),
            attachment_dir: attachment_dir.into(),
            ledger_path: ledger_path.into(),
            coordinates: CoordinateTable::defaults(),
            delays: DelayProfile::default(),
            startup_dialogs: StartupDialogConfig::default(),
            columns: ColumnMapping::default(),
            category: "SAR".to_string(),
            categories: default_categories(),
            cities: default_cities(),
        }
    }

    /// Merge `calibration.json` and `options.json` from `dir`, if present.
    pub fn load_dir(&mut self, dir: &Path) {
        self.load_calibration(&dir.join("calibration.json"));
        self.load_options(&dir.join("options.json"));
    }

    /// Merge a calibrated coordinate table over the defaults. A missing file
    /// means the defaults stay, with a loud warning: default coordinates are
    /// placeholders and will click the wrong places.
    pub fn load_calibration(&mut self, path: &Path) {
        match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<CoordinateTable>(&raw) {
                Ok(table) => {
                    info!("calibration loaded from {}", path.display());
                    self.coordinates.merge(table);
                }
                Err(e) => warn!("ignoring unreadable calibration {}: {e}", path.display()),
            },
            Err(_) => {
                warn!(
                    "no calibration found at {}; using placeholder coordinates",
                    path.display()
                );
            }
        }
    }

    /// Merge category/city vocabularies from `options.json`, if present.
    pub fn load_options(&mut self, path: &Path) {
        let Ok(raw) = fs::read_to_string(path) else {
            return;
        };
        match serde_json::from_str::<OptionsFile>(&raw) {
            Ok(options) => {
                if let Some(categories) = options.categories {
                    self.categories = categories;
                }
                if let Some(cities) = options.cities {
                    self.cities = cities;
                }
            }
            Err(e) => warn!("ignoring unreadable options {}: {e}", path.display()),
        }
    }
}
