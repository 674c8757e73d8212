//! Audit log backend tests.
//!
//! Both backends run the same checks through the `AuditLog` trait.

use std::sync::Arc;

use herald::{
    AttemptId, AttemptStatus, AuditLog, FileAuditLog, MemoryAuditLog, NewAttempt, Outcome,
    RecipientId, TransportError,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn sent(destination: &str, recipient: u64) -> NewAttempt {
    NewAttempt::from_outcome(
        destination,
        "Your child was absent today.",
        Some(RecipientId(recipient)),
        "hosted",
        &Outcome::Sent {
            reference: Some(format!("wamid.{recipient}")),
        },
    )
}

fn failed(destination: &str) -> NewAttempt {
    NewAttempt::from_outcome(
        destination,
        "Fees reminder",
        None,
        "web",
        &Outcome::Failed(TransportError::Timeout(std::time::Duration::from_secs(90))),
    )
}

fn exercise(log: &dyn AuditLog) {
    assert_eq!(log.count(), 0);
    assert!(log.recent(10).is_empty());

    let a = log.append(sent("111", 1)).unwrap();
    let b = log.append(failed("222")).unwrap();
    let c = log.append(sent("111", 1)).unwrap();
    assert!(a < b && b < c);

    let recent = log.recent(200);
    let ids: Vec<AttemptId> = recent.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![c, b, a]);

    let failure = log.get(b).unwrap();
    assert_eq!(failure.status, AttemptStatus::Failed);
    assert_eq!(failure.error.as_deref(), Some("timeout after 90s"));
    assert_eq!(failure.transport, "web");
    assert!(failure.resolved_at.is_some());

    let success = log.get(a).unwrap();
    assert_eq!(success.reference.as_deref(), Some("wamid.1"));
    assert!(success.recorded_at <= success.resolved_at.unwrap());

    assert_eq!(log.detach_recipient(RecipientId(1)).unwrap(), 2);
    assert_eq!(log.detach_recipient(RecipientId(1)).unwrap(), 0);
    assert_eq!(log.count(), 3);
    assert!(log.recent(3).iter().all(|e| e.recipient.is_none()));

    assert!(log.get(AttemptId(999)).is_none());
}

// ============================================================================
// Backend Tests
// ============================================================================

#[test]
fn memory_backend() {
    exercise(&MemoryAuditLog::new());
}

#[test]
fn file_backend() {
    let dir = tempfile::tempdir().unwrap();
    let log = FileAuditLog::open(dir.path().join("audit.jsonl")).unwrap();
    exercise(&log);
}

#[test]
fn file_backend_persists_one_line_per_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");

    let log = FileAuditLog::open(&path).unwrap();
    log.append(sent("111", 1)).unwrap();
    log.append(failed("222")).unwrap();
    assert_eq!(log.path(), path.as_path());

    let raw = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = raw.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["status"], "sent");
    assert_eq!(first["destination"], "111");
    assert_eq!(first["recipient"], 1);

    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["status"], "failed");
    assert_eq!(second["recipient"], serde_json::Value::Null);
}

#[test]
fn reopened_file_continues_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");

    {
        let log = FileAuditLog::open(&path).unwrap();
        log.append(failed("1")).unwrap();
        log.append(failed("2")).unwrap();
    }

    let log = FileAuditLog::open(&path).unwrap();
    assert_eq!(log.count(), 2);
    assert_eq!(log.append(failed("3")).unwrap(), AttemptId(3));
    assert_eq!(log.recent(1)[0].destination, "3");
}

#[test]
fn concurrent_appends_get_distinct_ids() {
    let log = Arc::new(MemoryAuditLog::new());

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let log = Arc::clone(&log);
            std::thread::spawn(move || {
                (0..25)
                    .map(|_| log.append(failed(&n.to_string())).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids: Vec<AttemptId> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 200);
    assert_eq!(log.count(), 200);
}
