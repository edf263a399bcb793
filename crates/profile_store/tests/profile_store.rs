use std::fs;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use profile_store::{guidelines, Config, Mode, ProfileStore, ProfileStoreError};
use tempfile::TempDir;

fn store() -> (TempDir, ProfileStore) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let store = ProfileStore::at(dir.path().join("whats_next"));
    (dir, store)
}

#[test]
fn missing_config_reads_as_default() {
    let (_dir, store) = store();
    assert_eq!(store.read_config().expect("config"), Config::default());
    assert_eq!(store.active_profile(), None);
}

#[test]
fn config_round_trips_through_disk() {
    let (_dir, store) = store();
    let config = Config {
        editor: "vim".to_string(),
        selected_profile: "work".to_string(),
        mode: Mode::Native,
    };
    store.write_config(&config).expect("config should be written");
    assert_eq!(store.read_config().expect("config"), config);
}

#[test]
fn malformed_config_is_reported() {
    let (_dir, store) = store();
    fs::create_dir_all(store.root()).expect("root");
    fs::write(store.config_path(), "{not json").expect("write");
    assert_matches!(store.read_config(), Err(ProfileStoreError::ConfigParse { .. }));
}

#[test]
fn ensure_profile_seeds_new_profiles_from_catalog() {
    let (_dir, store) = store();
    let path = store.ensure_profile("work").expect("profile should be created");
    assert_eq!(path, store.group_dir().join("work.md"));
    assert_eq!(
        store.read_profile("work").expect("profile"),
        guidelines::catalog_text()
    );

    fs::write(&path, "# mine\n").expect("overwrite");
    store.ensure_profile("work.md").expect("existing profile");
    assert_eq!(store.read_profile("work").expect("profile"), "# mine\n");
}

#[test]
fn ensure_profile_rejects_directories() {
    let (_dir, store) = store();
    fs::create_dir_all(store.group_dir().join("odd.md")).expect("dir");
    assert_matches!(
        store.ensure_profile("odd"),
        Err(ProfileStoreError::ProfileIsDirectory { .. })
    );
}

#[test]
fn list_profiles_is_sorted_and_skips_directories() {
    let (_dir, store) = store();
    assert_eq!(store.list_profiles().expect("empty list"), Vec::<String>::new());

    fs::create_dir_all(store.group_dir().join("nested")).expect("dir");
    fs::write(store.group_dir().join("zeta.md"), "z").expect("write");
    fs::write(store.group_dir().join("alpha.md"), "a").expect("write");
    assert_eq!(
        store.list_profiles().expect("list"),
        vec!["alpha".to_string(), "zeta".to_string()]
    );
}

#[test]
fn rename_refuses_to_overwrite() {
    let (_dir, store) = store();
    fs::create_dir_all(store.group_dir()).expect("dir");
    fs::write(store.group_dir().join("a.md"), "a").expect("write");
    fs::write(store.group_dir().join("b.md"), "b").expect("write");

    assert_matches!(
        store.rename_profile("a", "b"),
        Err(ProfileStoreError::ProfileExists { .. })
    );
    assert_matches!(
        store.rename_profile("missing", "c"),
        Err(ProfileStoreError::ProfileNotFound { .. })
    );

    store.rename_profile("a", "c").expect("rename");
    assert_eq!(store.read_profile("c").expect("renamed"), "a");
    assert_matches!(
        store.read_profile("a"),
        Err(ProfileStoreError::ProfileNotFound { .. })
    );
}

#[test]
fn remove_profile_reports_missing_files() {
    let (_dir, store) = store();
    fs::create_dir_all(store.group_dir()).expect("dir");
    fs::write(store.group_dir().join("a.md"), "a").expect("write");
    store.remove_profile("a").expect("remove");
    assert_matches!(
        store.remove_profile("a"),
        Err(ProfileStoreError::ProfileNotFound { .. })
    );
}

#[test]
fn selecting_a_profile_makes_it_active() {
    let (_dir, store) = store();
    assert_matches!(
        store.select_profile("work"),
        Err(ProfileStoreError::ProfileNotFound { .. })
    );

    fs::create_dir_all(store.group_dir()).expect("dir");
    fs::write(store.group_dir().join("work.md"), "# Rules\nbe brief\n").expect("write");
    store.select_profile("work.md").expect("select");

    assert_eq!(store.read_config().expect("config").selected_profile, "work");
    let active = store.active_profile().expect("active profile");
    assert_eq!(active.name, "work");
    assert_eq!(active.document, "# Rules\nbe brief\n");

    fs::remove_file(store.group_dir().join("work.md")).expect("remove");
    assert_eq!(store.active_profile(), None);
}

#[test]
fn add_custom_appends_title_and_content() {
    let (_dir, store) = store();
    assert_matches!(store.add_custom("   ", None), Err(ProfileStoreError::EmptyContent));

    store.add_custom("  first rule \n", Some("Rules")).expect("add");
    store.add_custom("second rule", Some("# More")).expect("add");
    store.add_custom("third rule", None).expect("add");

    assert_eq!(
        store.read_custom().expect("custom"),
        Some("# Rules\nfirst rule\n# More\nsecond rule\nthird rule\n".to_string())
    );
}

#[test]
fn catalog_text_appends_custom_guidelines() {
    let (_dir, store) = store();
    assert_eq!(store.catalog_text().expect("catalog"), guidelines::catalog_text());

    store.add_custom("always lint", None).expect("add");
    let text = store.catalog_text().expect("catalog");
    let expected_tail = format!(
        "---- from: {} ----\nalways lint\n\n",
        store.custom_path().display()
    );
    assert!(text.starts_with(&guidelines::catalog_text()));
    assert!(text.ends_with(&expected_tail), "unexpected tail: {text:?}");
}
