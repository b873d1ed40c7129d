//! Persistence round trips, the schema gate, and computed cells.

use core_model::UserResponse;
use core_state::{
    FileStorage, KEY_RESPONSES, KEY_SCHEMA, ProgressRestored, SessionAtoms, Storage,
};
use pretty_assertions::assert_eq;
use std::rc::Rc;

fn response(id: &str, correct: bool) -> UserResponse {
    UserResponse {
        question_id: id.to_string(),
        domain_id: "all".to_string(),
        selected: if correct {
            Some(core_model::AnswerLabel::A)
        } else {
            None
        },
        is_correct: correct,
        timestamp: 1_700_000_000_000,
        x: 0.4,
        y: 0.6,
    }
}

#[test]
fn responses_survive_a_session_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let storage = Rc::new(FileStorage::open(dir.path()).unwrap());
        let (atoms, gate) = SessionAtoms::new(storage);
        assert_eq!(gate, ProgressRestored::Fresh);
        atoms.push_response(response("q1", true));
        atoms.push_response(response("q2", false));
        atoms.mark_watched("v9");
    }

    let storage = Rc::new(FileStorage::open(dir.path()).unwrap());
    let (atoms, gate) = SessionAtoms::new(storage);
    assert_eq!(gate, ProgressRestored::Restored(2));
    let responses = atoms.responses.get();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].question_id, "q1");
    assert!(responses[1].skipped());
    assert!(atoms.watched_videos.get().contains("v9"));
}

#[test]
fn schema_mismatch_clears_responses_and_reports_incompatible() {
    let dir = tempfile::tempdir().unwrap();

    {
        let storage = Rc::new(FileStorage::open(dir.path()).unwrap());
        let (atoms, _) = SessionAtoms::new(storage);
        atoms.push_response(response("q1", true));
    }

    // Corrupt the schema marker between sessions.
    {
        let storage = FileStorage::open(dir.path()).unwrap();
        storage.set(KEY_SCHEMA, "ancient").unwrap();
    }

    let storage = Rc::new(FileStorage::open(dir.path()).unwrap());
    let (atoms, gate) = SessionAtoms::new(Rc::clone(&storage) as Rc<dyn Storage>);
    assert_eq!(gate, ProgressRestored::Incompatible);
    assert!(atoms.responses.get().is_empty());
    // Marker is healed for the next run.
    assert_eq!(storage.get(KEY_SCHEMA).as_deref(), Some(core_state::SCHEMA_VERSION));
}

#[test]
fn corrupt_response_payload_self_heals() {
    let dir = tempfile::tempdir().unwrap();
    {
        let storage = FileStorage::open(dir.path()).unwrap();
        storage.set(KEY_SCHEMA, core_state::SCHEMA_VERSION).unwrap();
        storage.set(KEY_RESPONSES, "{definitely not an array").unwrap();
    }
    let storage = Rc::new(FileStorage::open(dir.path()).unwrap());
    let (atoms, gate) = SessionAtoms::new(storage);
    assert_eq!(gate, ProgressRestored::Incompatible);
    assert!(atoms.responses.get().is_empty());
}

#[test]
fn export_import_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Rc::new(FileStorage::open(dir.path()).unwrap());
    let (atoms, _) = SessionAtoms::new(storage);
    atoms.push_response(response("q1", true));
    atoms.push_response(response("q2", false));

    let blob = atoms.export();

    let dir2 = tempfile::tempdir().unwrap();
    let storage2 = Rc::new(FileStorage::open(dir2.path()).unwrap());
    let (fresh, _) = SessionAtoms::new(storage2);
    let count = fresh.import(&blob).unwrap();
    assert_eq!(count, 2);
    assert_eq!(fresh.responses.get(), atoms.responses.get());
}

#[test]
fn reset_returns_every_atom_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Rc::new(FileStorage::open(dir.path()).unwrap());
    let (atoms, _) = SessionAtoms::new(Rc::clone(&storage) as Rc<dyn Storage>);
    atoms.push_response(response("q1", true));
    atoms.mark_watched("v1");
    atoms.questions_after_video.set(3);

    atoms.reset();
    assert!(atoms.responses.get().is_empty());
    assert!(atoms.watched_videos.get().is_empty());
    assert_eq!(atoms.questions_after_video.get(), 0);
    assert!(!atoms.insights_available());
    // Persisted keys were overwritten with the cleared values.
    assert_eq!(storage.get(KEY_RESPONSES).as_deref(), Some("[]"));

    // A restart after reset starts fresh, not incompatible.
    let (_, gate) = SessionAtoms::new(Rc::clone(&storage) as Rc<dyn Storage>);
    assert!(matches!(
        gate,
        ProgressRestored::Fresh | ProgressRestored::Restored(0)
    ));
}

#[test]
fn computed_cells_follow_responses() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Rc::new(FileStorage::open(dir.path()).unwrap());
    let (atoms, _) = SessionAtoms::new(storage);

    assert!(atoms.answered_ids().is_empty());
    assert!(!atoms.insights_available());

    for i in 0..10 {
        atoms.push_response(response(&format!("q{i}"), i % 2 == 0));
    }
    assert_eq!(atoms.answered_ids().len(), 10);
    assert!(atoms.insights_available());
}

#[test]
fn coverage_is_zero_with_no_estimates() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Rc::new(FileStorage::open(dir.path()).unwrap());
    let (atoms, _) = SessionAtoms::new(storage);
    assert_eq!(atoms.coverage(), 0.0);
    assert_eq!(atoms.evidence_coverage(), 0.0);
}
