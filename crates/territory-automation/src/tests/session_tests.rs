use std::path::Path;
use std::sync::Arc;

use super::{test_config, Action, MockBackend};
use crate::errors::AutomationError;
use crate::input::KeyTap;
use crate::session::SessionManager;

fn session(dir: &Path, backend: Arc<MockBackend>) -> SessionManager {
    SessionManager::new(backend, Arc::new(test_config(dir)))
}

#[tokio::test(start_paused = true)]
async fn connect_finds_a_window_by_title_substring() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockBackend::with_window("NW Scheduler 7.9 - Congregation");
    let mut session = session(dir.path(), backend.clone());

    assert!(session.connect().await.unwrap());
    assert_eq!(session.window().unwrap().title, "NW Scheduler 7.9 - Congregation");
    assert!(backend
        .actions()
        .contains(&Action::Activate("NW Scheduler 7.9 - Congregation".to_string())));
}

#[tokio::test(start_paused = true)]
async fn connect_falls_back_to_a_case_insensitive_search() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockBackend::with_window("nw scheduler (running)");
    let mut session = session(dir.path(), backend);

    assert!(session.connect().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn connect_reports_absence_without_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockBackend::with_window("Some Other App");
    let mut session = session(dir.path(), backend);

    assert!(!session.connect().await.unwrap());
    assert!(session.window().is_none());
}

#[tokio::test(start_paused = true)]
async fn launch_fails_fast_when_the_executable_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockBackend::new();
    let mut session = session(dir.path(), backend.clone());

    let err = session.launch_or_connect().await.unwrap_err();
    assert!(matches!(err, AutomationError::NotFound(_)));
    // Nothing was spawned.
    assert!(!backend
        .actions()
        .iter()
        .any(|a| matches!(a, Action::Spawn(_))));
}

#[tokio::test(start_paused = true)]
async fn launch_spawns_then_times_out_when_no_window_appears() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("nws.exe"), b"").unwrap();
    let backend = MockBackend::new();
    let mut session = session(dir.path(), backend.clone());

    let err = session.launch_or_connect().await.unwrap_err();
    assert!(matches!(err, AutomationError::LaunchTimeout(_)));
    assert!(backend
        .actions()
        .iter()
        .any(|a| matches!(a, Action::Spawn(path) if path.ends_with("nws.exe"))));
}

#[tokio::test(start_paused = true)]
async fn launch_connects_to_an_already_running_instance() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockBackend::with_window("NW Scheduler 7.9");
    let mut session = session(dir.path(), backend.clone());

    session.launch_or_connect().await.unwrap();
    assert!(!backend
        .actions()
        .iter()
        .any(|a| matches!(a, Action::Spawn(_))));
    // Post-connect navigation clicked both menu anchors.
    assert_eq!(backend.clicks_at(100, 80), 1);
    assert_eq!(backend.clicks_at(150, 120), 1);
}

#[tokio::test(start_paused = true)]
async fn startup_dialog_is_detected_and_dismissed() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockBackend::with_window("NW Scheduler 7.9");
    backend.add_window("Astuce du jour");
    let mut session = session(dir.path(), backend.clone());

    session.dismiss_startup_dialogs().await;

    let actions = backend.actions();
    assert!(actions.contains(&Action::Activate("Astuce du jour".to_string())));
    assert!(actions.contains(&Action::Key(KeyTap::Escape)));
    // The main window regains focus afterwards.
    assert_eq!(
        actions.last(),
        Some(&Action::Activate("NW Scheduler 7.9".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn dialog_dismissal_survives_a_dead_backend() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockBackend::with_window("NW Scheduler 7.9");
    backend.fail_everything();
    let mut session = session(dir.path(), backend);

    // Best-effort contract: no panic, no error, regardless of backend state.
    session.dismiss_startup_dialogs().await;
}

#[tokio::test(start_paused = true)]
async fn activate_window_errors_only_when_the_window_is_truly_gone() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MockBackend::new();
    let mut session = session(dir.path(), backend.clone());

    let err = session.activate_window().await.unwrap_err();
    assert!(matches!(err, AutomationError::WindowNotFound(_)));

    // Once the window exists, the same call recovers via title search.
    backend.add_window("NW Scheduler 7.9");
    session.activate_window().await.unwrap();
    assert_eq!(session.window().unwrap().title, "NW Scheduler 7.9");
}
