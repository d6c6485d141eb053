//! The capability seam between orchestration and the interaction mechanism.
//!
//! Orchestration and retry logic depend only on [`UiBackend`]; the concrete
//! backend is blind coordinate driving (synthetic mouse/keyboard events plus
//! window enumeration), and could be swapped for accessibility-tree driving
//! without touching the state machine.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rdev::{Button, EventType, Key};
use sysinfo::{ProcessesToUpdate, System};
use tracing::debug;

use crate::errors::AutomationError;

/// A top-level window as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowHandle {
    pub id: u32,
    pub pid: u32,
    pub title: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// The only two keys the automation ever taps on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTap {
    Escape,
    Enter,
}

pub trait UiBackend: Send + Sync {
    fn list_windows(&self) -> Result<Vec<WindowHandle>, AutomationError>;
    /// Bring a window to the foreground.
    fn activate(&self, window: &WindowHandle) -> Result<(), AutomationError>;
    fn spawn_process(&self, exe: &Path) -> Result<(), AutomationError>;
    fn process_running(&self, name: &str) -> bool;
    fn click(&self, x: i32, y: i32) -> Result<(), AutomationError>;
    fn tap_key(&self, key: KeyTap) -> Result<(), AutomationError>;
    /// Ctrl+A in the focused field.
    fn select_all(&self) -> Result<(), AutomationError>;
    /// Clipboard insert (set clipboard, Ctrl+V). Survives characters that
    /// per-key typing would mangle.
    fn paste_text(&self, text: &str) -> Result<(), AutomationError>;
}

/// Create the real backend for the current platform.
pub fn create_backend() -> Result<Arc<dyn UiBackend>, AutomationError> {
    Ok(Arc::new(SystemBackend::new()))
}

/// Synthetic-input backend: `rdev` events, `arboard` clipboard, `xcap` window
/// enumeration, `sysinfo` process lookup.
pub struct SystemBackend {
    system: Mutex<System>,
}

impl SystemBackend {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    fn send(&self, event: &EventType) -> Result<(), AutomationError> {
        rdev::simulate(event)
            .map_err(|e| AutomationError::InputFailure(format!("{event:?}: {e:?}")))?;
        // Give the OS event queue time to drain between synthetic events.
        std::thread::sleep(Duration::from_millis(20));
        Ok(())
    }

    fn press_release(&self, key: Key) -> Result<(), AutomationError> {
        self.send(&EventType::KeyPress(key))?;
        self.send(&EventType::KeyRelease(key))
    }

    fn click_once(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        self.send(&EventType::MouseMove {
            x: x as f64,
            y: y as f64,
        })?;
        self.send(&EventType::ButtonPress(Button::Left))?;
        self.send(&EventType::ButtonRelease(Button::Left))
    }
}

impl Default for SystemBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl UiBackend for SystemBackend {
    fn list_windows(&self) -> Result<Vec<WindowHandle>, AutomationError> {
        let windows = xcap::Window::all()
            .map_err(|e| AutomationError::InputFailure(format!("failed to list windows: {e}")))?;
        Ok(windows
            .iter()
            .map(|w| WindowHandle {
                id: w.id().unwrap_or_default(),
                pid: w.pid().unwrap_or_default(),
                title: w.title().unwrap_or_default(),
                x: w.x().unwrap_or_default(),
                y: w.y().unwrap_or_default(),
                width: w.width().unwrap_or_default(),
                height: w.height().unwrap_or_default(),
            })
            .collect())
    }

    fn activate(&self, window: &WindowHandle) -> Result<(), AutomationError> {
        // Blind-coordinate activation: click the middle of the title bar.
        debug!("activating window '{}' via title bar", window.title);
        let x = window.x + (window.width as i32) / 2;
        let y = window.y + 8;
        self.click_once(x, y)
    }

    fn spawn_process(&self, exe: &Path) -> Result<(), AutomationError> {
        Command::new(exe).spawn()?;
        Ok(())
    }

    fn process_running(&self, name: &str) -> bool {
        let Ok(mut system) = self.system.lock() else {
            return false;
        };
        system.refresh_processes(ProcessesToUpdate::All, true);
        let running = system.processes_by_name(OsStr::new(name)).next().is_some();
        running
    }

    fn click(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        self.click_once(x, y)
    }

    fn tap_key(&self, key: KeyTap) -> Result<(), AutomationError> {
        match key {
            KeyTap::Escape => self.press_release(Key::Escape),
            KeyTap::Enter => self.press_release(Key::Return),
        }
    }

    fn select_all(&self) -> Result<(), AutomationError> {
        self.send(&EventType::KeyPress(Key::ControlLeft))?;
        self.press_release(Key::KeyA)?;
        self.send(&EventType::KeyRelease(Key::ControlLeft))
    }

    fn paste_text(&self, text: &str) -> Result<(), AutomationError> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| AutomationError::InputFailure(format!("clipboard unavailable: {e}")))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| AutomationError::InputFailure(format!("clipboard write failed: {e}")))?;
        self.send(&EventType::KeyPress(Key::ControlLeft))?;
        self.press_release(Key::KeyV)?;
        self.send(&EventType::KeyRelease(Key::ControlLeft))
    }
}
