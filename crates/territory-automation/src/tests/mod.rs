//! Test support: a scripted backend behind the [`UiBackend`] seam plus the
//! component and orchestration tests.

mod form_tests;
mod session_tests;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::AutomationConfig;
use crate::errors::AutomationError;
use crate::input::{KeyTap, UiBackend, WindowHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Click(i32, i32),
    Key(KeyTap),
    SelectAll,
    Paste(String),
    Activate(String),
    Spawn(PathBuf),
}

/// Records every action it is asked to perform; optionally fails clicks or
/// everything, to script UI-step failures.
#[derive(Default)]
pub struct MockBackend {
    windows: Mutex<Vec<WindowHandle>>,
    actions: Mutex<Vec<Action>>,
    fail_clicks: AtomicBool,
    fail_everything: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_window(title: &str) -> Arc<Self> {
        let backend = Self::default();
        backend.windows.lock().unwrap().push(WindowHandle {
            id: 1,
            pid: 42,
            title: title.to_string(),
            x: 0,
            y: 0,
            width: 1280,
            height: 800,
        });
        Arc::new(backend)
    }

    pub fn add_window(&self, title: &str) {
        let mut windows = self.windows.lock().unwrap();
        let id = windows.len() as u32 + 1;
        windows.push(WindowHandle {
            id,
            pid: 42,
            title: title.to_string(),
            x: 0,
            y: 0,
            width: 400,
            height: 300,
        });
    }

    pub fn fail_clicks(&self) {
        self.fail_clicks.store(true, Ordering::SeqCst);
    }

    pub fn fail_everything(&self) {
        self.fail_everything.store(true, Ordering::SeqCst);
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    pub fn clicks_at(&self, x: i32, y: i32) -> usize {
        self.actions()
            .iter()
            .filter(|a| **a == Action::Click(x, y))
            .count()
    }

    pub fn pastes(&self) -> Vec<String> {
        self.actions()
            .iter()
            .filter_map(|a| match a {
                Action::Paste(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, action: Action) {
        self.actions.lock().unwrap().push(action);
    }

    fn everything_fails(&self) -> Result<(), AutomationError> {
        if self.fail_everything.load(Ordering::SeqCst) {
            Err(AutomationError::InputFailure("scripted failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl UiBackend for MockBackend {
    fn list_windows(&self) -> Result<Vec<WindowHandle>, AutomationError> {
        self.everything_fails()?;
        Ok(self.windows.lock().unwrap().clone())
    }

    fn activate(&self, window: &WindowHandle) -> Result<(), AutomationError> {
        self.everything_fails()?;
        self.record(Action::Activate(window.title.clone()));
        Ok(())
    }

    fn spawn_process(&self, exe: &Path) -> Result<(), AutomationError> {
        self.everything_fails()?;
        self.record(Action::Spawn(exe.to_path_buf()));
        Ok(())
    }

    fn process_running(&self, _name: &str) -> bool {
        false
    }

    fn click(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        // Attempted clicks are recorded even when scripted to fail, so tests
        // can count retry attempts.
        self.record(Action::Click(x, y));
        self.everything_fails()?;
        if self.fail_clicks.load(Ordering::SeqCst) {
            return Err(AutomationError::InputFailure("scripted click failure".to_string()));
        }
        Ok(())
    }

    fn tap_key(&self, key: KeyTap) -> Result<(), AutomationError> {
        self.everything_fails()?;
        self.record(Action::Key(key));
        Ok(())
    }

    fn select_all(&self) -> Result<(), AutomationError> {
        self.everything_fails()?;
        self.record(Action::SelectAll);
        Ok(())
    }

    fn paste_text(&self, text: &str) -> Result<(), AutomationError> {
        self.everything_fails()?;
        self.record(Action::Paste(text.to_string()));
        Ok(())
    }
}

/// A config rooted in a temp directory, with the default (placeholder)
/// coordinate table.
pub fn test_config(dir: &Path) -> AutomationConfig {
    let mut config = AutomationConfig::new(
        dir.join("territories.csv"),
        dir.join("pdfs"),
        dir.join("progress.json"),
    );
    config.exe_path = dir.join("nws.exe");
    config
}
