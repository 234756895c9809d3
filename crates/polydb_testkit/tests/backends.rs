//! Backend-specific behavior observed through the database.

use std::fs;

use polydb_core::{
    Config, CoreError, Database, DocId, ErrorKind, FileSystemBackend, InMemoryBackend,
    StorageBackend, StorageRecord, WriteThroughBackend,
};
use polydb_testkit::prelude::*;

#[test]
fn file_layout_is_one_directory_per_type() {
    let test_db = TestDatabase::new(BackendKind::FileSystem);
    test_db.save(&mut Person::with_id("ronnie", "Ronnie", 29)).unwrap();
    let (mut cat, _, _) = farm();
    cat.id = "felix".into();
    test_db.save(&mut cat).unwrap();

    let person_file = test_db.root().join("testkit.Person").join("ronnie");
    let payload = fs::read_to_string(person_file).unwrap();
    assert!(payload.contains("\"Ronnie\""));
    assert!(test_db.root().join("testkit.zoo.Cat").join("felix").is_file());
}

#[test]
fn awkward_ids_round_trip_on_disk() {
    let test_db = TestDatabase::new(BackendKind::FileSystem);
    for id in ["a/b", "..", ".hidden", "ünïcode id", "50%"] {
        let mut person = Person::with_id(id, "Odd", 20);
        test_db.save(&mut person).unwrap();
        assert_eq!(test_db.load::<Person>(id).unwrap(), Some(person));
    }

    let test_db = test_db.reopen(|builder| builder);
    let mut ids: Vec<_> = test_db
        .keys()
        .unwrap()
        .into_iter()
        .map(|key| key.id().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["..", ".hidden", "50%", "a/b", "ünïcode id"]);
}

#[test]
fn write_through_reads_only_from_the_mirror() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path(), universe()).unwrap();
    db.save(&mut Person::with_id("r", "Ronnie", 29)).unwrap();

    // Changes made behind the cache's back stay invisible until restart.
    let file = dir.path().join("testkit.Person").join("r");
    fs::write(&file, r#"{"id":"r","name":"Changed","age":1}"#).unwrap();
    assert_eq!(db.load::<Person>("r").unwrap().unwrap().name, "Ronnie");
    drop(db);

    let db = Database::open(dir.path(), universe()).unwrap();
    assert_eq!(db.load::<Person>("r").unwrap().unwrap().name, "Changed");
}

#[test]
fn write_through_hydrates_everything() {
    let dir = tempfile::tempdir().unwrap();
    let durable = FileSystemBackend::open(dir.path()).unwrap();
    durable
        .store(&[
            StorageRecord::new(
                DocId::new("testkit.Person", "1"),
                r#"{"id":"1","name":"Ronnie","age":29}"#,
            ),
            StorageRecord::new(
                DocId::new("testkit.zoo.Cat", "2"),
                r#"{"id":"2","name":"Felix","lives":9}"#,
            ),
        ])
        .unwrap();

    let cache = WriteThroughBackend::open(durable).unwrap();
    assert_eq!(cache.mirror().len(), 2);

    let db = Database::builder(universe()).backend(cache).open().unwrap();
    assert_eq!(db.count::<Box<dyn Animal>>().unwrap(), 1);
    assert_eq!(db.load::<Person>("1").unwrap().unwrap().name, "Ronnie");
}

#[test]
fn unknown_type_directory_is_a_configuration_error() {
    for write_through in [false, true] {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("legacy.Widget")).unwrap();
        fs::write(dir.path().join("legacy.Widget").join("w1"), "{}").unwrap();

        let config = Config::default().write_through(write_through);
        let err = Database::open_with_config(dir.path(), universe(), config).unwrap_err();
        assert!(matches!(err, CoreError::UnknownTypeName { ref name } if name == "legacy.Widget"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}

#[test]
fn schema_drift_surfaces_as_serialization_error() {
    let backend = std::sync::Arc::new(InMemoryBackend::new());
    backend
        .store(&[StorageRecord::new(
            DocId::new("testkit.Person", "x"),
            r#"{"id":"x","name":"Ronnie"}"#,
        )])
        .unwrap();

    let db = Database::builder(universe())
        .shared_backend(backend)
        .open()
        .unwrap();
    let err = db.load::<Person>("x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Serialization);

    let mut people = db.enumerate::<Person>().unwrap();
    assert!(people.next().unwrap().is_err());
}

#[test]
fn memory_purge_empties_the_namespace() {
    let backend = std::sync::Arc::new(InMemoryBackend::new());
    let db = Database::builder(universe())
        .shared_backend(backend.clone())
        .open()
        .unwrap();
    db.save(&mut Person::new("Ronnie", 29)).unwrap();
    let (mut cat, _, _) = farm();
    db.save(&mut cat).unwrap();

    backend.purge_type("testkit.Person");
    assert_eq!(db.count::<Person>().unwrap(), 0);
    assert_eq!(db.count::<Cat>().unwrap(), 1);

    backend.clear();
    assert!(db.keys().unwrap().is_empty());
}

#[test]
fn delete_all_clears_every_backend() {
    on_every_backend(|test_db| {
        let (mut cat, mut dog, mut cow) = farm();
        test_db.save(&mut cat).unwrap();
        test_db.save(&mut dog).unwrap();
        test_db.save(&mut cow).unwrap();
        test_db.save(&mut Person::new("Ronnie", 29)).unwrap();

        assert_eq!(test_db.delete_all().unwrap(), 4);
        assert!(test_db.keys().unwrap().is_empty());
        assert!(test_db.type_counts().unwrap().iter().all(|(_, n)| *n == 0));
    });
}
