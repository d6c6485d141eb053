//! Window session management: connect to or launch the target application and
//! keep its main window focused.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{AutomationConfig, CloseMethod};
use crate::errors::AutomationError;
use crate::input::{KeyTap, UiBackend, WindowHandle};

/// Number of connect attempts before deciding the application is not running.
const CONNECT_ATTEMPTS: usize = 3;
/// The launch delay budget is split across this many connect polls.
const LAUNCH_POLLS: u32 = 5;
/// Blind dismiss-key presses in the last dialog-dismissal stage.
const BLIND_ESCAPE_PRESSES: usize = 3;

/// Ensures the target application has a focused, ready top-level window before
/// any UI action is issued.
pub struct SessionManager {
    backend: Arc<dyn UiBackend>,
    config: Arc<AutomationConfig>,
    window: Option<WindowHandle>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn UiBackend>, config: Arc<AutomationConfig>) -> Self {
        Self {
            backend,
            config,
            window: None,
        }
    }

    /// The tracked main window, if a connection has been established.
    pub fn window(&self) -> Option<&WindowHandle> {
        self.window.as_ref()
    }

    /// Try to connect to an existing window.
    ///
    /// First a handle-based lookup (exact title substring), then a looser
    /// title-search activation. `Ok(false)` means "not found"; only unexpected
    /// backend failures surface as errors.
    pub async fn connect(&mut self) -> Result<bool, AutomationError> {
        let windows = self.backend.list_windows()?;
        let pattern = &self.config.window_title;

        if let Some(window) = windows.iter().find(|w| w.title.contains(pattern.as_str())) {
            if self.backend.activate(window).is_ok() {
                debug!("connected to window '{}'", window.title);
                self.window = Some(window.clone());
                return Ok(true);
            }
        }

        // Fallback: case-insensitive title search.
        let lowered = pattern.to_lowercase();
        if let Some(window) = windows
            .iter()
            .find(|w| w.title.to_lowercase().contains(&lowered))
        {
            if self.backend.activate(window).is_ok() {
                debug!("connected via title search to '{}'", window.title);
                self.window = Some(window.clone());
                sleep(Duration::from_millis(500)).await;
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Connect to a running instance, or launch one and wait for its window.
    ///
    /// After a successful connection this also dismisses startup dialogs and
    /// navigates to the territory entry screen.
    pub async fn launch_or_connect(&mut self) -> Result<(), AutomationError> {
        for attempt in 0..CONNECT_ATTEMPTS {
            if self.connect().await? {
                info!("connected to an existing instance");
                self.dismiss_startup_dialogs().await;
                self.navigate_to_entry_screen().await;
                return Ok(());
            }
            if attempt + 1 < CONNECT_ATTEMPTS {
                sleep(Duration::from_secs(1)).await;
            }
        }

        let exe = &self.config.exe_path;
        if !exe.exists() {
            return Err(AutomationError::NotFound(format!(
                "executable not found: {}",
                exe.display()
            )));
        }

        let exe_name = exe
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        info!("launching {}", exe.display());
        self.backend.spawn_process(exe)?;

        let poll_interval = self.config.delays.app_launch / LAUNCH_POLLS;
        for poll in 0..LAUNCH_POLLS {
            debug!("connection attempt {}/{}", poll + 1, LAUNCH_POLLS);
            sleep(poll_interval).await;
            if self.connect().await? {
                info!("application launched");
                self.dismiss_startup_dialogs().await;
                self.navigate_to_entry_screen().await;
                return Ok(());
            }
        }

        if self.backend.process_running(&exe_name) {
            warn!("process '{exe_name}' is running but no window matched '{}'",
                self.config.window_title);
        }
        Err(AutomationError::LaunchTimeout(format!(
            "no window matching '{}' appeared within {:?}",
            self.config.window_title, self.config.delays.app_launch
        )))
    }

    /// Close startup dialogs (tips, welcome screens) through a layered
    /// fallback chain. Every stage is best-effort and independently safe to
    /// attempt against a dialog that does not exist; this method never fails.
    pub async fn dismiss_startup_dialogs(&mut self) {
        let dialogs = self.config.startup_dialogs.clone();

        if dialogs.titles.is_empty() {
            debug!("no dialog titles configured, pressing Escape twice");
            for _ in 0..2 {
                let _ = self.backend.tap_key(KeyTap::Escape);
                sleep(Duration::from_millis(200)).await;
            }
            return;
        }

        debug!("looking for startup dialogs");
        sleep(dialogs.wait).await;

        // Stage 1: handle-based title match, configured close action.
        if let Ok(windows) = self.backend.list_windows() {
            for title in &dialogs.titles {
                if let Some(dialog) = windows.iter().find(|w| w.title.contains(title.as_str())) {
                    info!("startup dialog detected: '{}'", dialog.title);
                    self.close_dialog(dialog).await;
                    sleep(Duration::from_millis(500)).await;
                }
            }
        }

        // Stage 2: title-search activation, then the keyboard fallback action.
        if let Ok(windows) = self.backend.list_windows() {
            for title in &dialogs.titles {
                let lowered = title.to_lowercase();
                if let Some(dialog) = windows
                    .iter()
                    .find(|w| w.title.to_lowercase().contains(&lowered))
                {
                    if self.backend.activate(dialog).is_ok() {
                        info!("startup dialog activated: '{}'", dialog.title);
                        sleep(Duration::from_millis(200)).await;
                        self.close_dialog_fallback();
                        sleep(Duration::from_millis(500)).await;
                    }
                }
            }
        }

        // Stage 3: blind Escape presses, whether or not anything was detected.
        debug!("blind Escape pass");
        for _ in 0..BLIND_ESCAPE_PRESSES {
            let _ = self.backend.tap_key(KeyTap::Escape);
            sleep(Duration::from_millis(300)).await;
        }

        let _ = self.activate_window().await;
    }

    async fn close_dialog(&self, dialog: &WindowHandle) {
        let dialogs = &self.config.startup_dialogs;
        let _ = self.backend.activate(dialog);
        match dialogs.close_method {
            CloseMethod::Escape => {
                let _ = self.backend.tap_key(KeyTap::Escape);
            }
            CloseMethod::Enter => {
                let _ = self.backend.tap_key(KeyTap::Enter);
            }
            CloseMethod::ClickClose | CloseMethod::ClickOk => {
                // A calibrated close-button anchor wins over the configured
                // fallback coordinate.
                let (x, y) = self
                    .config
                    .coordinates
                    .get("btn_close_dialog")
                    .unwrap_or(dialogs.close_button);
                let _ = self.backend.click(x, y);
            }
        }
        debug!("dialog closed with {:?}", dialogs.close_method);
    }

    fn close_dialog_fallback(&self) {
        let key = match self.config.startup_dialogs.close_method {
            CloseMethod::Escape | CloseMethod::ClickClose => KeyTap::Escape,
            CloseMethod::Enter | CloseMethod::ClickOk => KeyTap::Enter,
        };
        let _ = self.backend.tap_key(key);
    }

    /// Re-focus the main window. Called before every UI action to guard
    /// against focus loss from intervening dialogs.
    pub async fn activate_window(&mut self) -> Result<(), AutomationError> {
        if let Some(window) = &self.window {
            if self.backend.activate(window).is_ok() {
                sleep(Duration::from_millis(200)).await;
                return Ok(());
            }
        }

        // Tracked handle is gone or stale; fall back to a fresh title search.
        let windows = self.backend.list_windows()?;
        let lowered = self.config.window_title.to_lowercase();
        match windows
            .iter()
            .find(|w| w.title.to_lowercase().contains(&lowered))
        {
            Some(window) => {
                self.backend.activate(window).map_err(|_| {
                    AutomationError::WindowNotFound(self.config.window_title.clone())
                })?;
                self.window = Some(window.clone());
                sleep(Duration::from_millis(500)).await;
                Ok(())
            }
            None => Err(AutomationError::WindowNotFound(
                self.config.window_title.clone(),
            )),
        }
    }

    /// Click through the menu to the territory list screen. Both anchors are
    /// optional; an uncalibrated one degrades to a warning.
    pub async fn navigate_to_entry_screen(&mut self) {
        info!("navigating to the territory screen");
        for anchor in ["btn_menu_territoires", "btn_liste_territoires"] {
            match self.config.coordinates.get(anchor) {
                Some((x, y)) => {
                    debug!("click [{anchor}] at ({x}, {y})");
                    let _ = self.activate_window().await;
                    let _ = self.backend.click(x, y);
                    sleep(Duration::from_millis(500)).await;
                }
                None => warn!("anchor '{anchor}' not calibrated, navigation step skipped"),
            }
        }
    }
}
