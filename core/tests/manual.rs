//! Supervisor override tests.
//!
//! Tests cover: manual reassignment past capacity, counter inflation on
//! repeated calls, cursor non-involvement, validation of both ids, and
//! the operator unassign helper.

use chrono::Utc;
use leadroute_core::audit::AssignMethod;
use leadroute_core::caller::Caller;
use leadroute_core::config::RouterConfig;
use leadroute_core::engine::{AssignOutcome, AssignmentEngine, IntakeOutcome, REASON_CAPS_FULL};
use leadroute_core::error::RouterError;
use leadroute_core::lead::{Lead, LeadStatus, NewLead};
use leadroute_core::store::RouterStore;
use leadroute_core::types::today_utc;

fn engine() -> AssignmentEngine {
    let store = RouterStore::in_memory().expect("open in-memory store");
    store.migrate().expect("migrate");
    AssignmentEngine::build(store, RouterConfig::default()).expect("build engine")
}

fn add_caller(engine: &AssignmentEngine, id: &str, territories: &[&str], limit: u32) {
    let caller = Caller {
        id: id.to_string(),
        name: format!("Caller {id}"),
        role: "Sales Caller".to_string(),
        phone: String::new(),
        languages: vec![],
        territories: territories.iter().map(|t| t.to_string()).collect(),
        daily_limit: limit,
        active: true,
        created_at: Utc::now(),
    };
    engine.store().insert_caller(&caller).expect("insert caller");
}

fn intake(engine: &AssignmentEngine, territory: &str, phone: &str) -> (Lead, AssignOutcome) {
    match engine
        .intake(NewLead {
            name: String::new(),
            phone: phone.to_string(),
            email: None,
            city: None,
            territory: territory.to_string(),
            source: None,
        })
        .expect("intake lead")
    {
        IntakeOutcome::Routed { lead, outcome } => (lead, outcome),
        IntakeOutcome::Duplicate { .. } => panic!("unexpected duplicate for {phone}"),
    }
}

/// Manual reassignment succeeds against a caller at its daily limit and
/// pushes the counter past it. Capacity binds the automatic path only.
#[test]
fn manual_override_ignores_capacity() {
    let engine = engine();
    add_caller(&engine, "caller-a", &["Goa"], 1);

    let (_, first) = intake(&engine, "Goa", "9861000000");
    assert!(first.assigned(), "first lead fills the only slot");

    let (stuck, second) = intake(&engine, "Goa", "9861000001");
    match &second {
        AssignOutcome::Unassigned { reason } => assert_eq!(reason, REASON_CAPS_FULL),
        other => panic!("expected caps_full before the override, got {other:?}"),
    }

    engine
        .reassign(&stuck.id, &"caller-a".to_string())
        .expect("manual reassign past capacity");

    let store = engine.store();
    let persisted = store.get_lead(&stuck.id).unwrap().unwrap();
    assert_eq!(persisted.status, LeadStatus::Assigned);
    assert_eq!(persisted.assigned_to.as_deref(), Some("caller-a"));
    assert_eq!(
        store.counter_for("caller-a", today_utc()).unwrap(),
        Some(2),
        "override increments past the limit of 1"
    );

    let logs = store.logs_for_lead(&stuck.id).unwrap();
    let manual = logs.last().expect("override appended a log entry");
    assert_eq!(manual.method, AssignMethod::Manual);
    assert_eq!(manual.note, "Manual reassignment");
    assert_eq!(manual.caller_id.as_deref(), Some("caller-a"));
}

/// Repeating the same override re-runs its effects: one more log entry
/// and one more counter increment per call.
#[test]
fn repeated_override_inflates_the_counter() {
    let engine = engine();
    add_caller(&engine, "caller-a", &["Goa"], 5);

    let (lead, _) = intake(&engine, "Goa", "9862000000");
    for _ in 0..3 {
        engine
            .reassign(&lead.id, &"caller-a".to_string())
            .expect("repeat reassign");
    }

    let store = engine.store();
    assert_eq!(
        store.counter_for("caller-a", today_utc()).unwrap(),
        Some(4),
        "one automatic assignment plus three overrides"
    );
    let manual_entries = store
        .logs_for_lead(&lead.id)
        .unwrap()
        .into_iter()
        .filter(|e| e.method == AssignMethod::Manual)
        .count();
    assert_eq!(manual_entries, 3);
}

/// The override never touches any round-robin cursor.
#[test]
fn override_leaves_cursors_alone() {
    let engine = engine();
    add_caller(&engine, "caller-a", &["Goa"], 10);
    add_caller(&engine, "caller-b", &["Goa"], 10);

    let (lead, _) = intake(&engine, "Goa", "9863000000");
    let before = engine.store().read_cursor("Goa").unwrap();

    engine
        .reassign(&lead.id, &"caller-b".to_string())
        .expect("reassign");

    assert_eq!(engine.store().read_cursor("Goa").unwrap(), before);
}

/// Both sides of the override are validated before anything is written.
#[test]
fn override_validates_lead_and_caller() {
    let engine = engine();
    add_caller(&engine, "caller-a", &["Goa"], 10);
    let (lead, _) = intake(&engine, "Goa", "9864000000");

    let err = engine
        .reassign(&lead.id, &"nobody".to_string())
        .expect_err("unknown caller must fail");
    assert!(matches!(err, RouterError::CallerNotFound { .. }));

    let err = engine
        .reassign(&"missing-lead".to_string(), &"caller-a".to_string())
        .expect_err("unknown lead must fail");
    assert!(matches!(err, RouterError::LeadNotFound { .. }));

    let persisted = engine.store().get_lead(&lead.id).unwrap().unwrap();
    assert_eq!(
        persisted.assigned_to.as_deref(),
        Some("caller-a"),
        "failed overrides must not change the lead"
    );
}

/// The operator unassign helper writes the reason to the lead and a
/// matching audit entry, without touching counters.
#[test]
fn mark_unassigned_records_reason_and_log() {
    let engine = engine();
    add_caller(&engine, "caller-a", &["Goa"], 10);
    let (lead, _) = intake(&engine, "Goa", "9865000000");

    engine
        .mark_unassigned(&lead.id, "bad_number")
        .expect("mark unassigned");

    let store = engine.store();
    let persisted = store.get_lead(&lead.id).unwrap().unwrap();
    assert_eq!(persisted.status, LeadStatus::Unassigned);
    assert_eq!(persisted.unassigned_reason.as_deref(), Some("bad_number"));

    let logs = store.logs_for_lead(&lead.id).unwrap();
    let entry = logs.last().unwrap();
    assert_eq!(entry.method, AssignMethod::Unassigned);
    assert_eq!(entry.note, "Unassigned reason: bad_number");
    assert_eq!(
        store.counter_for("caller-a", today_utc()).unwrap(),
        Some(1),
        "unassigning does not decrement the counter"
    );
}

/// The latest-first log listing interleaves automatic and manual
/// entries in reverse insertion order.
#[test]
fn recent_logs_are_newest_first() {
    let engine = engine();
    add_caller(&engine, "caller-a", &["Goa"], 10);

    let (lead, _) = intake(&engine, "Goa", "9866000000");
    engine
        .reassign(&lead.id, &"caller-a".to_string())
        .expect("reassign");

    let recent = engine.store().recent_assignment_logs(10).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].method, AssignMethod::Manual);
    assert_eq!(recent[1].method, AssignMethod::StateRr);
}
