use std::sync::Arc;

use super::{test_config, Action, MockBackend};
use crate::form::FormDriver;
use crate::input::KeyTap;
use crate::records::TerritoryRecord;
use crate::session::SessionManager;

fn fixture(dir: &std::path::Path) -> (Arc<MockBackend>, SessionManager, FormDriver) {
    let backend = MockBackend::with_window("NW Scheduler 7.9");
    let config = Arc::new(test_config(dir));
    let session = SessionManager::new(backend.clone(), config.clone());
    let driver = FormDriver::new(backend.clone(), config);
    (backend, session, driver)
}

fn record(id: &str) -> TerritoryRecord {
    TerritoryRecord {
        identifier: id.to_string(),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn empty_fields_are_never_touched() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, mut session, driver) = fixture(dir.path());

    // Identifier only: suffix, type, city and the free-text fields are empty.
    driver
        .process_record(&mut session, &record("SAR-1-01"), false)
        .await
        .unwrap();

    // Exactly one field was filled (the number), so exactly one paste.
    assert_eq!(backend.pastes(), vec!["SAR-1-01".to_string()]);
    // No clicks on the suffix or free-text field anchors.
    assert_eq!(backend.clicks_at(800, 225), 0);
    assert_eq!(backend.clicks_at(800, 450), 0);
    assert_eq!(backend.clicks_at(800, 500), 0);
    // And no dropdown action for the empty type and city.
    assert_eq!(backend.clicks_at(800, 250), 0);
    assert_eq!(backend.clicks_at(800, 375), 0);
}

#[tokio::test(start_paused = true)]
async fn category_is_selected_through_a_two_click_dropdown() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, mut session, driver) = fixture(dir.path());

    driver
        .process_record(&mut session, &record("SAR-1-01"), false)
        .await
        .unwrap();

    assert_eq!(backend.clicks_at(800, 175), 1); // dropdown_categorie
    assert_eq!(backend.clicks_at(800, 195), 1); // dropdown_option_sar
}

#[tokio::test(start_paused = true)]
async fn non_default_type_confirms_the_modal() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, mut session, driver) = fixture(dir.path());

    let mut r = record("SAR-1-01");
    r.kind = "Téléphone".to_string();
    driver.process_record(&mut session, &r, false).await.unwrap();

    assert_eq!(backend.clicks_at(800, 250), 1); // dropdown_type
    assert_eq!(backend.clicks_at(800, 310), 1); // dropdown_option_telephone
    assert_eq!(backend.clicks_at(500, 400), 1); // btn_confirm_type
}

#[tokio::test(start_paused = true)]
async fn default_type_raises_no_modal() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, mut session, driver) = fixture(dir.path());

    let mut r = record("SAR-1-01");
    r.kind = "En Présentiel".to_string();
    driver.process_record(&mut session, &r, false).await.unwrap();

    assert_eq!(backend.clicks_at(800, 270), 1); // dropdown_option_presentiel
    assert_eq!(backend.clicks_at(500, 400), 0); // no confirmation click
}

#[tokio::test(start_paused = true)]
async fn unknown_type_is_a_warning_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, mut session, driver) = fixture(dir.path());

    let mut r = record("SAR-1-01");
    r.kind = "Fax".to_string();
    r.notes = "still filled".to_string();
    driver.process_record(&mut session, &r, false).await.unwrap();

    // Type dropdown untouched, but the rest of the record went through.
    assert_eq!(backend.clicks_at(800, 250), 0);
    assert!(backend.pastes().contains(&"still filled".to_string()));
}

#[tokio::test(start_paused = true)]
async fn city_synonyms_fold_to_one_option() {
    for spelling in ["Carrieres", "carriere s/ bois", "CARRIERES"] {
        let dir = tempfile::tempdir().unwrap();
        let (backend, mut session, driver) = fixture(dir.path());
        let mut r = record("SAR-1-01");
        r.city = spelling.to_string();
        driver.process_record(&mut session, &r, false).await.unwrap();
        assert_eq!(backend.clicks_at(800, 375), 1, "dropdown for {spelling}");
        assert_eq!(backend.clicks_at(800, 415), 1, "option for {spelling}");
    }
}

#[tokio::test(start_paused = true)]
async fn unknown_city_takes_no_dropdown_action() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, mut session, driver) = fixture(dir.path());

    let mut r = record("SAR-1-01");
    r.city = "ATLANTIS".to_string();
    r.gps_link = "https://example.test/map".to_string();
    driver.process_record(&mut session, &r, false).await.unwrap();

    assert_eq!(backend.clicks_at(800, 375), 0);
    // Record still processed: other fields were filled.
    assert!(backend
        .pastes()
        .contains(&"https://example.test/map".to_string()));
}

#[tokio::test(start_paused = true)]
async fn attachment_is_imported_when_the_file_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("pdfs")).unwrap();
    std::fs::write(dir.path().join("pdfs/SAR-1-01.pdf"), b"%PDF-").unwrap();
    let (backend, mut session, driver) = fixture(dir.path());

    driver
        .process_record(&mut session, &record("SAR-1-01"), false)
        .await
        .unwrap();

    assert_eq!(backend.clicks_at(800, 550), 1); // btn_import_pdf
    let pastes = backend.pastes();
    assert!(pastes.iter().any(|p| p.ends_with("SAR-1-01.pdf")));
    assert!(backend.actions().contains(&Action::Key(KeyTap::Enter)));
}

#[tokio::test(start_paused = true)]
async fn missing_attachment_skips_the_import_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, mut session, driver) = fixture(dir.path());

    driver
        .process_record(&mut session, &record("SAR-1-01"), false)
        .await
        .unwrap();

    assert_eq!(backend.clicks_at(800, 550), 0);
    assert!(!backend.actions().contains(&Action::Key(KeyTap::Enter)));
}

#[tokio::test(start_paused = true)]
async fn explicit_attachment_override_is_used_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("pdfs")).unwrap();
    std::fs::write(dir.path().join("pdfs/custom-map.pdf"), b"%PDF-").unwrap();
    let (backend, mut session, driver) = fixture(dir.path());

    let mut r = record("SAR-1-01");
    r.attachment = "custom-map.pdf".to_string();
    driver.process_record(&mut session, &r, false).await.unwrap();

    assert!(backend
        .pastes()
        .iter()
        .any(|p| p.ends_with("custom-map.pdf")));
}

#[tokio::test(start_paused = true)]
async fn no_save_mode_skips_the_attachment_import() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("pdfs")).unwrap();
    std::fs::write(dir.path().join("pdfs/SAR-1-01.pdf"), b"%PDF-").unwrap();
    let (backend, mut session, driver) = fixture(dir.path());

    driver
        .process_record(&mut session, &record("SAR-1-01"), true)
        .await
        .unwrap();

    assert_eq!(backend.clicks_at(800, 550), 0);
}

#[tokio::test(start_paused = true)]
async fn every_anchor_click_reactivates_the_window_first() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, mut session, driver) = fixture(dir.path());

    driver
        .process_record(&mut session, &record("SAR-1-01"), false)
        .await
        .unwrap();

    let actions = backend.actions();
    let activations = actions
        .iter()
        .filter(|a| matches!(a, Action::Activate(_)))
        .count();
    let clicks = actions
        .iter()
        .filter(|a| matches!(a, Action::Click(_, _)))
        .count();
    // One activation per anchor click, plus the record-level one up front.
    assert_eq!(activations, clicks + 1);
}
