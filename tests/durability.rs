//! Dump/restore tests for SmallTable
//!
//! A repository serializes as one self-contained graph. Restoring a dump
//! must reproduce the head exactly and resume both identifier sequences
//! above everything in the persisted state.

use smalltable::{
    read_image_file, write_image_file, Entity, PropertyValue, Repository, Table, Value,
};
use std::sync::Arc;
use tempfile::tempdir;

fn populated_repository() -> Arc<Repository> {
    let repository = Arc::new(Repository::new());

    let mut table = Table::new(repository.create_session());
    let parent = table.new_object();
    let child = table.new_object();
    table.set_property(parent, "name", "parent").unwrap();
    table.set_property(parent, "child", child).unwrap();
    table.set_property(child, "name", "child").unwrap();
    table.set_root("family", Some(parent)).unwrap();
    table.save().unwrap();

    // A second revision so the dump carries real history.
    let mut table = Table::new(repository.create_session());
    let parent_handle = table.root("family").unwrap().expect("root");
    table.set_property(parent_handle, "name", "renamed").unwrap();
    table.save().unwrap();

    repository
}

fn populated_reference(
    repository: &Arc<Repository>,
) -> (smalltable::Reference, smalltable::EntityId) {
    let head = repository.head();
    let reference = head.binding("family").expect("root bound");
    let id = head.id_of(reference).expect("root live");
    (reference, id)
}

#[test]
fn stream_round_trip_preserves_head() {
    let repository = populated_repository();

    let mut buffer = Vec::new();
    repository.save_to(&mut buffer).unwrap();
    let restored = Repository::load_from(&mut buffer.as_slice()).unwrap();

    assert_eq!(*restored.head(), *repository.head());
    assert_eq!(restored.revision_count(), repository.revision_count());

    let (reference, id) = populated_reference(&repository);
    let body = restored.entity(id).expect("body restored");
    assert_eq!(body.self_reference(), reference);
    assert_eq!(
        body.property("name"),
        Some(&Value::String("renamed".to_string()))
    );
}

#[test]
fn restored_repository_serves_new_sessions() {
    let repository = populated_repository();

    let mut buffer = Vec::new();
    repository.save_to(&mut buffer).unwrap();
    let restored = Arc::new(Repository::load_from(&mut buffer.as_slice()).unwrap());

    let mut table = Table::new(restored.create_session());
    let parent = table.root("family").unwrap().expect("root survives");
    assert_eq!(
        table.get_property(parent, "name").unwrap(),
        Some(PropertyValue::String("renamed".to_string()))
    );

    // The object graph link survives too.
    let child = match table.get_property(parent, "child").unwrap() {
        Some(PropertyValue::Object(handle)) => handle,
        other => panic!("expected object link, got {:?}", other),
    };
    assert_eq!(
        table.get_property(child, "name").unwrap(),
        Some(PropertyValue::String("child".to_string()))
    );
}

#[test]
fn sequences_resume_above_persisted_identifiers() {
    let repository = populated_repository();

    let mut buffer = Vec::new();
    repository.save_to(&mut buffer).unwrap();
    let restored = Arc::new(Repository::load_from(&mut buffer.as_slice()).unwrap());

    let image = repository.to_image();
    let fresh_reference = restored.allocate_reference();
    let fresh_id = restored.allocate_entity_ids(1)[0];

    assert!(fresh_reference.as_u64() > image.max_reference());
    assert!(fresh_id.as_u64() > image.max_entity_id());
}

#[test]
fn restored_repository_accepts_commits() {
    let repository = populated_repository();

    let mut buffer = Vec::new();
    repository.save_to(&mut buffer).unwrap();
    let restored = Arc::new(Repository::load_from(&mut buffer.as_slice()).unwrap());

    let mut session = restored.create_session();
    let reference = session.allocate_reference();
    session.bind("extra", Some(reference)).unwrap();
    let body = Entity::builder(reference)
        .property("value", 1i64)
        .unwrap()
        .build();
    let next = session.save(vec![body]).unwrap();

    assert_eq!(next.binding("extra"), Some(reference));
    assert_eq!(next.binding("family"), restored.head().binding("family"));
}

#[test]
fn file_round_trip() {
    let repository = populated_repository();
    let dir = tempdir().unwrap();
    let path = dir.path().join("repository.snap");

    write_image_file(&repository.to_image(), &path).unwrap();
    let restored = Repository::from_image(read_image_file(&path).unwrap());

    assert_eq!(*restored.head(), *repository.head());
}

#[test]
fn corrupted_file_is_rejected() {
    let repository = populated_repository();
    let dir = tempdir().unwrap();
    let path = dir.path().join("repository.snap");

    write_image_file(&repository.to_image(), &path).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0x40;
    std::fs::write(&path, &bytes).unwrap();

    let err = read_image_file(&path).unwrap_err();
    assert!(matches!(err, smalltable::Error::Corruption(_)));
}
