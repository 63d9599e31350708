//! Storage layer tests against an in-memory database.

use chrono::{Duration, Utc};
use tracker_types::models::{RequestKind, RequestPatch, RequestStatus, Role};

use crate::models::{NewRequest, NewUser};
use crate::{Database, Store, StoreError};

fn test_db() -> Database {
    Database::open_in_memory().unwrap()
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        password_hash: "hash".into(),
        security_question: "First pet?".into(),
        security_answer_hash: "answer-hash".into(),
        role: Role::Consumer,
    }
}

fn new_request(user_id: i64, title: &str) -> NewRequest {
    NewRequest {
        user_id,
        kind: RequestKind::Repair,
        title: title.to_string(),
        description: "Kitchen".into(),
        requested_by: "a@x.com".into(),
        date_requested: Utc::now(),
    }
}

// === Users ===

#[test]
fn save_and_get_user() {
    let db = test_db();
    let saved = db.save_user(&new_user("a@x.com")).unwrap();
    assert!(saved.id > 0);
    assert_eq!(saved.role, Role::Consumer);

    let by_email = db.get_user_by_email("a@x.com").unwrap().unwrap();
    assert_eq!(by_email.id, saved.id);
    assert_eq!(by_email.password_hash, "hash");

    let by_id = db.get_user_by_id(saved.id).unwrap().unwrap();
    assert_eq!(by_id.email, "a@x.com");

    assert!(db.get_user_by_email("nobody@x.com").unwrap().is_none());
    assert!(db.get_user_by_id(999).unwrap().is_none());
}

#[test]
fn duplicate_email_is_reported() {
    let db = test_db();
    db.save_user(&new_user("a@x.com")).unwrap();
    let err = db.save_user(&new_user("a@x.com")).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateEmail));
}

#[test]
fn email_lookup_is_not_injectable() {
    let db = test_db();
    db.save_user(&new_user("a@x.com")).unwrap();
    assert!(db.get_user_by_email("' OR '1'='1").unwrap().is_none());
    assert_eq!(db.get_users().unwrap().len(), 1);
}

fn admin_count(db: &Database) -> usize {
    db.get_users()
        .unwrap()
        .iter()
        .filter(|u| u.role == Role::Administrator)
        .count()
}

#[test]
fn change_role_updates_row() {
    let db = test_db();
    let user = db.save_user(&new_user("a@x.com")).unwrap();
    db.save_user(&new_user("b@x.com")).unwrap();

    assert_eq!(admin_count(&db), 0);
    let promoted = db.change_role(user.id, Role::Administrator).unwrap().unwrap();
    assert_eq!(promoted.role, Role::Administrator);
    assert_eq!(admin_count(&db), 1);

    assert!(db.change_role(999, Role::Administrator).unwrap().is_none());
    assert!(db.change_role(999, Role::Consumer).unwrap().is_none());
}

#[test]
fn last_administrator_is_kept() {
    let db = test_db();
    let a = db.save_user(&new_user("a@x.com")).unwrap();
    let b = db.save_user(&new_user("b@x.com")).unwrap();
    db.change_role(a.id, Role::Administrator).unwrap();
    db.change_role(b.id, Role::Administrator).unwrap();

    db.change_role(a.id, Role::Consumer).unwrap().unwrap();
    let err = db.change_role(b.id, Role::Consumer).unwrap_err();
    assert!(matches!(err, StoreError::LastAdministrator(id) if id == b.id));
    assert_eq!(admin_count(&db), 1);

    // Re-stating the role of the last admin is not a demotion.
    let same = db.change_role(b.id, Role::Administrator).unwrap().unwrap();
    assert_eq!(same.role, Role::Administrator);
}

#[test]
fn update_password_replaces_hash() {
    let db = test_db();
    let user = db.save_user(&new_user("a@x.com")).unwrap();
    assert!(db.update_password(user.id, "new-hash").unwrap());
    assert_eq!(db.get_user_by_id(user.id).unwrap().unwrap().password_hash, "new-hash");
    assert!(!db.update_password(999, "x").unwrap());
}

// === Requests ===

#[test]
fn save_request_applies_defaults() {
    let db = test_db();
    let user = db.save_user(&new_user("a@x.com")).unwrap();
    let req = db.save_request(&new_request(user.id, "Leaky sink")).unwrap();

    assert_eq!(req.user_id, user.id);
    assert_eq!(req.status, RequestStatus::PendingApproval);
    assert_eq!(req.version, 1);
    assert_eq!(req.last_modified, req.date_requested);

    let fetched = db.get_request_by_id(req.id).unwrap().unwrap();
    assert_eq!(fetched, req);
    assert!(db.get_request_by_id(req.id + 100).unwrap().is_none());
}

#[test]
fn request_must_reference_existing_user() {
    let db = test_db();
    assert!(db.save_request(&new_request(42, "Orphan")).is_err());
}

#[test]
fn listings_are_ordered_and_scoped() {
    let db = test_db();
    let a = db.save_user(&new_user("a@x.com")).unwrap();
    let b = db.save_user(&new_user("b@x.com")).unwrap();
    let r1 = db.save_request(&new_request(a.id, "one")).unwrap();
    let r2 = db.save_request(&new_request(b.id, "two")).unwrap();
    let r3 = db.save_request(&new_request(a.id, "three")).unwrap();

    let all: Vec<i64> = db.get_requests().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(all, vec![r1.id, r2.id, r3.id]);

    let mine: Vec<i64> = db.get_my_requests(a.id).unwrap().iter().map(|r| r.id).collect();
    assert_eq!(mine, vec![r1.id, r3.id]);

    assert!(db.get_my_requests(999).unwrap().is_empty());
}

#[test]
fn update_writes_only_patched_columns() {
    let db = test_db();
    let user = db.save_user(&new_user("a@x.com")).unwrap();
    let req = db.save_request(&new_request(user.id, "Leaky sink")).unwrap();
    let later = req.last_modified + Duration::seconds(5);

    let patch = RequestPatch {
        status: Some(RequestStatus::Approved),
        ..Default::default()
    };
    let updated = db.update_request(req.id, &patch, req.version, later).unwrap().unwrap();

    assert_eq!(updated.status, RequestStatus::Approved);
    assert_eq!(updated.title, "Leaky sink");
    assert_eq!(updated.description, "Kitchen");
    assert_eq!(updated.date_requested, req.date_requested);
    assert_eq!(updated.last_modified, later);
    assert_eq!(updated.version, req.version + 1);
}

#[test]
fn empty_patch_writes_nothing() {
    let db = test_db();
    let user = db.save_user(&new_user("a@x.com")).unwrap();
    let req = db.save_request(&new_request(user.id, "Leaky sink")).unwrap();

    let same = db
        .update_request(req.id, &RequestPatch::default(), req.version, Utc::now())
        .unwrap()
        .unwrap();
    assert_eq!(same, req);
}

#[test]
fn stale_version_is_a_conflict() {
    let db = test_db();
    let user = db.save_user(&new_user("a@x.com")).unwrap();
    let req = db.save_request(&new_request(user.id, "Leaky sink")).unwrap();

    let patch = RequestPatch {
        title: Some("Dripping tap".into()),
        ..Default::default()
    };
    db.update_request(req.id, &patch, req.version, Utc::now()).unwrap();

    let retry = RequestPatch {
        description: Some("Bathroom".into()),
        ..Default::default()
    };
    let err = db.update_request(req.id, &retry, req.version, Utc::now()).unwrap_err();
    assert!(matches!(err, StoreError::Conflict { expected: 1, found: 2, .. }));

    let stored = db.get_request_by_id(req.id).unwrap().unwrap();
    assert_eq!(stored.description, "Kitchen");
}

#[test]
fn update_of_missing_request_is_none() {
    let db = test_db();
    let patch = RequestPatch {
        title: Some("x".into()),
        ..Default::default()
    };
    assert!(db.update_request(7, &patch, 1, Utc::now()).unwrap().is_none());
}

// === Token blacklist ===

#[test]
fn save_token_is_idempotent() {
    let db = test_db();
    let expires = Utc::now() + Duration::hours(1);
    db.save_token("jti-1", expires).unwrap();
    db.save_token("jti-1", expires).unwrap();

    let row = db.get_token_by_jti("jti-1").unwrap().unwrap();
    assert_eq!(row.jti, "jti-1");
    assert_eq!(row.expires, expires);
    assert!(db.get_token_by_jti("jti-2").unwrap().is_none());
}

#[test]
fn purge_removes_only_expired_rows() {
    let db = test_db();
    let now = Utc::now();
    db.save_token("old", now - Duration::minutes(1)).unwrap();
    db.save_token("live", now + Duration::minutes(30)).unwrap();

    assert_eq!(db.purge_expired_tokens(now).unwrap(), 1);
    assert!(db.get_token_by_jti("old").unwrap().is_none());
    assert!(db.get_token_by_jti("live").unwrap().is_some());
}
