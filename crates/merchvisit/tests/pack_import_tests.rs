//! Integration tests for pack validation, import and reload.

use merchvisit::pack::loader;
use merchvisit::{App, PackError, QuestionKind, Store};

const PACK_JSON: &str = include_str!("fixtures/pack.json");

#[test]
fn test_import_valid_pack() {
    let store = Store::open_in_memory().expect("store");
    let pack = loader::import_pack_from_str(&store, PACK_JSON).expect("import");

    assert_eq!(pack.pack_id, "pack-2024-01-10");
    assert_eq!(pack.merch.id, "m-42");
    assert_eq!(pack.stores.len(), 2);
    assert_eq!(pack.visits.len(), 3);

    let template = pack.template_by_id("standard-v2").expect("template");
    assert_eq!(template.version, 2);
    assert_eq!(template.questions().count(), 6);

    let photo = template.question_by_key("shelf_photo").expect("question");
    assert!(matches!(
        photo.kind,
        QuestionKind::Photo {
            photos_min: 2,
            photos_max: 2
        }
    ));

    // The typed pack is persisted and reloads on its own.
    let reloaded = loader::load_current_pack(&store).expect("load").expect("present");
    assert_eq!(reloaded.pack_id, pack.pack_id);
}

#[test]
fn test_malformed_json_is_rejected_without_touching_store() {
    let store = Store::open_in_memory().expect("store");

    let err = loader::import_pack_from_str(&store, "{ not json").unwrap_err();
    assert!(matches!(err, PackError::Malformed(_)));
    assert!(loader::load_current_pack(&store).expect("load").is_none());
}

#[test]
fn test_wrong_schema_yields_single_gate_error() {
    let store = Store::open_in_memory().expect("store");
    let doc = PACK_JSON.replace("\"schemaVersion\": 1", "\"schemaVersion\": 9");

    let err = loader::import_pack_from_str(&store, &doc).unwrap_err();
    match err {
        PackError::Invalid { first, all } => {
            assert_eq!(all.len(), 1);
            assert!(first.contains("Unsupported pack schema"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_structural_errors_keep_previous_pack() {
    let store = Store::open_in_memory().expect("store");
    loader::import_pack_from_str(&store, PACK_JSON).expect("import");

    // A later broken import leaves the prior pack in place.
    let broken = PACK_JSON.replace("\"merch\": { \"id\": \"m-42\" },", "");
    let err = loader::import_pack_from_str(&store, &broken).unwrap_err();
    assert!(matches!(err, PackError::Invalid { .. }));

    let current = loader::load_current_pack(&store).expect("load").expect("present");
    assert_eq!(current.pack_id, "pack-2024-01-10");
}

#[test]
fn test_visit_referencing_unknown_store_is_rejected() {
    let store = Store::open_in_memory().expect("store");
    let doc = PACK_JSON.replace("\"sapId\": \"S200\",\n      \"templateId\"", "\"sapId\": \"S999\",\n      \"templateId\"");

    let err = loader::import_pack_from_str(&store, &doc).unwrap_err();
    match err {
        PackError::Invalid { all, .. } => {
            assert!(all.iter().any(|e| e.contains("unknown store")), "{all:?}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_reimport_replaces_current_pack() {
    let store = Store::open_in_memory().expect("store");
    loader::import_pack_from_str(&store, PACK_JSON).expect("first import");

    let next = PACK_JSON.replace("pack-2024-01-10", "pack-2024-01-17");
    loader::import_pack_from_str(&store, &next).expect("second import");

    let current = loader::load_current_pack(&store).expect("load").expect("present");
    assert_eq!(current.pack_id, "pack-2024-01-17");
}

#[test]
fn test_app_reloads_pack_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("data.db");

    {
        let mut app = App::open(&db).expect("open");
        assert!(app.pack().is_none());
        app.import_pack_from_str(PACK_JSON).expect("import");
    }

    // A fresh handle picks the pack up from the store.
    let app = App::open(&db).expect("reopen");
    let pack = app.pack().expect("pack loaded");
    assert_eq!(pack.pack_id, "pack-2024-01-10");
}
