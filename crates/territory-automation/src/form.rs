//! The fixed per-record UI sequence that creates one territory in the target
//! application.
//!
//! Every action re-activates the main window first and sleeps the relevant
//! [`DelayProfile`](crate::config::DelayProfile) value afterwards; fixed
//! delays are the only synchronization primitive, there is no readiness
//! polling.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::AutomationConfig;
use crate::errors::AutomationError;
use crate::input::{KeyTap, UiBackend};
use crate::records::{TerritoryRecord, TerritoryType};
use crate::session::SessionManager;

/// Settle time between opening a dropdown and clicking its option.
const DROPDOWN_SETTLE: Duration = Duration::from_millis(300);
/// Settle time for the native file picker to open.
const FILE_PICKER_SETTLE: Duration = Duration::from_millis(1500);

pub struct FormDriver {
    backend: Arc<dyn UiBackend>,
    config: Arc<AutomationConfig>,
}

impl FormDriver {
    pub fn new(backend: Arc<dyn UiBackend>, config: Arc<AutomationConfig>) -> Self {
        Self { backend, config }
    }

    /// Run the full entry sequence for one record.
    ///
    /// In no-save mode the attachment import is skipped and nothing commits;
    /// the caller gates on external confirmation before moving on. In normal
    /// mode the record is committed implicitly by the application's own
    /// save-on-navigate behavior when the next record is created.
    pub async fn process_record(
        &self,
        session: &mut SessionManager,
        record: &TerritoryRecord,
        no_save: bool,
    ) -> Result<(), AutomationError> {
        info!("{}", "=".repeat(50));
        info!("TERRITORY: {}", record.identifier);
        info!("{}", "=".repeat(50));

        session.activate_window().await?;

        info!("[step 1] new territory");
        self.click_anchor(session, "btn_new_territory").await?;

        info!("[step 2] category -> {}", self.config.category);
        self.select_category(session).await?;

        info!("[step 3] number");
        self.fill_field(session, "field_numero", &record.identifier)
            .await?;

        info!("[step 4] suffix");
        self.fill_field(session, "field_suffixe", &record.suffix)
            .await?;

        info!("[step 5] type");
        self.select_type(session, &record.kind).await?;

        info!("[step 6] city");
        self.select_city(session, &record.city).await?;

        info!("[step 7] text fields");
        self.fill_field(session, "field_lien_gps", &record.gps_link)
            .await?;
        self.fill_field(session, "field_notes", &record.notes).await?;
        self.fill_field(session, "field_ne_pas_visiter", &record.do_not_visit)
            .await?;
        self.fill_field(session, "field_notes_proclamateur", &record.publisher_notes)
            .await?;

        info!("[step 8] map tab");
        if self.config.coordinates.contains("btn_carte") {
            self.click_anchor(session, "btn_carte").await?;
            sleep(Duration::from_millis(500)).await;
        } else {
            warn!("anchor 'btn_carte' not calibrated, map tab skipped");
        }

        info!("[step 9] attachment import");
        if no_save {
            info!("  (no-save mode, import skipped)");
            info!("[ok] territory {} filled (validation)", record.identifier);
        } else {
            let path = self.attachment_path(record);
            info!("  looking for {}", path.display());
            self.import_attachment(session, &path).await?;
            info!("[ok] territory {} processed", record.identifier);
        }

        sleep(self.config.delays.between_records).await;
        Ok(())
    }

    /// Where the record's attachment is expected: the explicit override, or
    /// `identifier + ".pdf"`, under the attachment directory.
    pub fn attachment_path(&self, record: &TerritoryRecord) -> PathBuf {
        self.config.attachment_dir.join(record.attachment_filename())
    }

    async fn click_anchor(
        &self,
        session: &mut SessionManager,
        anchor: &str,
    ) -> Result<(), AutomationError> {
        let (x, y) = self.config.coordinates.require(anchor)?;
        info!("  click [{anchor}] at ({x}, {y})");
        session.activate_window().await?;
        self.backend.click(x, y)?;
        sleep(self.config.delays.after_click).await;
        Ok(())
    }

    /// Focus a field and replace its content. An empty value means the field
    /// is not touched at all — no click, no keystroke.
    async fn fill_field(
        &self,
        session: &mut SessionManager,
        anchor: &str,
        value: &str,
    ) -> Result<(), AutomationError> {
        if value.is_empty() {
            info!("  field [{anchor}] skipped (empty)");
            return Ok(());
        }
        self.click_anchor(session, anchor).await?;
        self.type_text(value).await
    }

    async fn type_text(&self, text: &str) -> Result<(), AutomationError> {
        let preview: String = if text.chars().count() > 30 {
            format!("{}...", text.chars().take(30).collect::<String>())
        } else {
            text.to_string()
        };
        info!("    typing \"{preview}\"");
        self.backend.select_all()?;
        self.backend.paste_text(text)?;
        sleep(self.config.delays.after_type).await;
        Ok(())
    }

    /// Two-click selection: open the dropdown, click the option.
    async fn select_dropdown_option(
        &self,
        session: &mut SessionManager,
        dropdown: &str,
        option: &str,
    ) -> Result<(), AutomationError> {
        info!("  dropdown [{dropdown}] -> [{option}]");
        self.click_anchor(session, dropdown).await?;
        sleep(DROPDOWN_SETTLE).await;
        self.click_anchor(session, option).await
    }

    async fn select_category(&self, session: &mut SessionManager) -> Result<(), AutomationError> {
        let Some(option) = self.config.categories.get(&self.config.category) else {
            warn!("category '{}' has no configured option", self.config.category);
            return Ok(());
        };
        let option = option.clone();
        if self.config.coordinates.contains("dropdown_categorie")
            && self.config.coordinates.contains(&option)
        {
            self.select_dropdown_option(session, "dropdown_categorie", &option)
                .await?;
        }
        Ok(())
    }

    /// Resolve the type against the closed vocabulary. Unrecognized values
    /// are a warning, not an error: the field stays unset and the record is
    /// still processed.
    async fn select_type(
        &self,
        session: &mut SessionManager,
        raw: &str,
    ) -> Result<(), AutomationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            info!("  (no type)");
            return Ok(());
        }
        match TerritoryType::parse(raw) {
            Some(territory_type) => {
                self.select_dropdown_option(session, "dropdown_type", territory_type.option_anchor())
                    .await?;
                if territory_type.needs_confirmation()
                    && self.config.coordinates.contains("btn_confirm_type")
                {
                    info!("  confirming type-change modal");
                    sleep(DROPDOWN_SETTLE).await;
                    self.click_anchor(session, "btn_confirm_type").await?;
                }
            }
            None => warn!("  unknown type: {raw}"),
        }
        Ok(())
    }

    /// Resolve the city through the synonym map. Same warning-only contract
    /// as the type field.
    async fn select_city(
        &self,
        session: &mut SessionManager,
        raw: &str,
    ) -> Result<(), AutomationError> {
        let city = raw.trim().to_uppercase();
        if city.is_empty() || !self.config.coordinates.contains("dropdown_ville") {
            info!("  (no city)");
            return Ok(());
        }
        match self.config.cities.get(&city) {
            Some(option) => {
                let option = option.clone();
                self.select_dropdown_option(session, "dropdown_ville", &option)
                    .await?;
            }
            None => warn!("  unknown city: {city}"),
        }
        Ok(())
    }

    /// Import one attachment through the native file picker. A missing file
    /// is a warning and a skip — the record still counts as processed.
    async fn import_attachment(
        &self,
        session: &mut SessionManager,
        path: &Path,
    ) -> Result<(), AutomationError> {
        if !path.exists() {
            warn!("  FILE NOT FOUND: {}", path.display());
            return Ok(());
        }

        self.click_anchor(session, "btn_import_pdf").await?;
        sleep(FILE_PICKER_SETTLE).await;

        // The picker's filename field has focus; replace its content with the
        // absolute path and confirm.
        self.backend.select_all()?;
        sleep(Duration::from_millis(100)).await;
        let absolute = path.canonicalize().map_err(|e| {
            AutomationError::InputFailure(format!("cannot resolve {}: {e}", path.display()))
        })?;
        self.backend.paste_text(&absolute.to_string_lossy())?;
        sleep(Duration::from_millis(300)).await;
        debug!("pasted path {}", absolute.display());

        self.backend.tap_key(KeyTap::Enter)?;
        sleep(self.config.delays.after_save).await;

        info!(
            "  attachment imported: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        Ok(())
    }
}
