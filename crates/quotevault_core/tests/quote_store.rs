use quotevault_core::{
    FormatError, KeyValueStore, QuoteService, QuoteStore, SqliteKeyValueStore, StoreError,
};
use quotevault_core::{keys, Provenance};

fn open_service() -> QuoteService<SqliteKeyValueStore> {
    QuoteService::open(SqliteKeyValueStore::open_in_memory().unwrap()).unwrap()
}

#[test]
fn fresh_storage_seeds_the_default_collection_once() {
    let storage = SqliteKeyValueStore::open_in_memory().unwrap();

    let store = QuoteStore::load(storage.clone()).unwrap();
    assert_eq!(store.len(), 10);

    // A second load reads the persisted seed instead of re-seeding.
    let again = QuoteStore::load(storage).unwrap();
    assert_eq!(again.len(), 10);
    assert_eq!(again.snapshot(), store.snapshot());
}

#[test]
fn add_appends_one_trimmed_entry_with_lowercase_category() {
    let mut store = QuoteStore::load(SqliteKeyValueStore::open_in_memory().unwrap()).unwrap();
    let before = store.len();

    store.add("  Simplicity is the soul of efficiency.  ", "  Wisdom ").unwrap();

    assert_eq!(store.len(), before + 1);
    let added = store.snapshot().last().unwrap();
    assert_eq!(added.text, "Simplicity is the soul of efficiency.");
    assert_eq!(added.category, "wisdom");
    assert_eq!(added.source, Provenance::Local);
}

#[test]
fn add_rejects_blank_fields_and_leaves_the_store_unchanged() {
    let mut store = QuoteStore::load(SqliteKeyValueStore::open_in_memory().unwrap()).unwrap();
    let before = store.snapshot().to_vec();

    for (text, category) in [("   ", "wisdom"), ("valid text", " \t "), ("", "")] {
        let err = store.add(text, category).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)), "{text:?}/{category:?}");
    }

    assert_eq!(store.snapshot(), &before[..]);
}

#[test]
fn import_rejects_non_array_payloads_without_mutation() {
    let mut store = QuoteStore::load(SqliteKeyValueStore::open_in_memory().unwrap()).unwrap();
    let before = store.len();

    let err = store
        .import_batch(&serde_json::json!({"text": "A", "category": "b"}))
        .unwrap_err();
    assert!(matches!(err, StoreError::Format(FormatError::NotAnArray)));
    assert_eq!(store.len(), before);
}

#[test]
fn import_keeps_only_entries_with_non_empty_text_and_category() {
    let mut store = QuoteStore::load(SqliteKeyValueStore::open_in_memory().unwrap()).unwrap();
    store.clear().unwrap();

    let imported = store
        .import_batch(&serde_json::json!([
            {"text": "A", "category": "b"},
            {"text": "", "category": "c"},
            {"text": "D", "category": ""},
        ]))
        .unwrap();

    assert_eq!(imported, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(store.snapshot()[0].text, "A");
    assert_eq!(store.snapshot()[0].category, "b");
}

#[test]
fn import_with_zero_surviving_entries_is_a_format_error() {
    let mut store = QuoteStore::load(SqliteKeyValueStore::open_in_memory().unwrap()).unwrap();
    let before = store.len();

    let err = store
        .import_batch(&serde_json::json!([{"text": "", "category": ""}, 42, "junk"]))
        .unwrap_err();
    assert!(matches!(err, StoreError::Format(FormatError::NoValidEntries)));
    assert_eq!(store.len(), before);
}

#[test]
fn export_then_import_into_cleared_store_reproduces_the_collection() {
    let mut service = open_service();
    service.add_quote("Extra entry", "Custom").unwrap();
    let exported = service.export_json().unwrap();
    let original: Vec<(String, String)> = service
        .store()
        .snapshot()
        .iter()
        .map(|quote| (quote.text.clone(), quote.category.clone()))
        .collect();

    service.clear_all().unwrap();
    assert_eq!(service.quote_count(), 0);

    let imported = service.import_json(&exported).unwrap();
    assert_eq!(imported, original.len());

    let round_tripped: Vec<(String, String)> = service
        .store()
        .snapshot()
        .iter()
        .map(|quote| (quote.text.clone(), quote.category.clone()))
        .collect();
    assert_eq!(round_tripped, original);
}

#[test]
fn unparsable_persisted_collection_falls_back_to_the_seed_set() {
    let storage = SqliteKeyValueStore::open_in_memory().unwrap();
    storage.set(keys::QUOTES, "{definitely not json").unwrap();

    let store = QuoteStore::load(storage.clone()).unwrap();
    assert_eq!(store.len(), 10);

    // The fallback is persisted, so the bad payload is gone.
    let repaired = storage.get_json::<Vec<quotevault_core::Quote>>(keys::QUOTES);
    assert_eq!(repaired.unwrap().map(|quotes| quotes.len()), Some(10));
}

#[test]
fn collection_survives_reopen_of_file_backed_storage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.db");

    {
        let mut service = QuoteService::open(SqliteKeyValueStore::open(&path).unwrap()).unwrap();
        service.add_quote("Persisted across sessions", "durability").unwrap();
    }

    let service = QuoteService::open(SqliteKeyValueStore::open(&path).unwrap()).unwrap();
    assert_eq!(service.quote_count(), 11);
    assert!(service
        .store()
        .snapshot()
        .iter()
        .any(|quote| quote.text == "Persisted across sessions"));
}

#[test]
fn clear_all_empties_the_store_and_resets_the_filter() {
    let mut service = open_service();
    service.set_filter("wisdom").unwrap();

    service.clear_all().unwrap();

    assert_eq!(service.quote_count(), 0);
    assert_eq!(service.filter().current(), "all");
    assert_eq!(service.last_viewed().unwrap(), None);
}

#[test]
fn import_from_file_requires_a_json_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quotes.txt");
    std::fs::write(&path, r#"[{"text":"A","category":"b"}]"#).unwrap();

    let mut service = open_service();
    let err = service.import_from_file(&path).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Format(FormatError::UnsupportedExtension(_))
    ));
}

#[test]
fn export_to_file_writes_a_dated_importable_artifact() {
    let dir = tempfile::tempdir().unwrap();

    let mut service = open_service();
    let path = service.export_to_file(dir.path()).unwrap();

    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("quotes_export_"));
    assert!(name.ends_with(".json"));

    service.clear_all().unwrap();
    let imported = service.import_from_file(&path).unwrap();
    assert_eq!(imported, 10);
}

#[test]
fn external_quote_change_replaces_in_memory_state() {
    let storage = SqliteKeyValueStore::open_in_memory().unwrap();
    let mut service = QuoteService::open(storage.clone()).unwrap();
    assert_eq!(service.quote_count(), 10);

    // Another context rewrites the persisted collection wholesale.
    let replacement = vec![quotevault_core::Quote::new("only one left", "solo").unwrap()];
    storage.set_json(keys::QUOTES, &replacement).unwrap();

    assert!(service.handle_external_change(keys::QUOTES).unwrap());
    assert_eq!(service.quote_count(), 1);
    assert_eq!(service.store().snapshot()[0].text, "only one left");

    assert!(!service.handle_external_change("unrelated_key").unwrap());
}
