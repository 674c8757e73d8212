//! Append-only audit log of delivery attempts.
//!
//! Every attempt the dispatcher makes ends in exactly one [`DeliveryAttempt`].
//! Entries are never updated in place; a retry is a new entry. The single
//! exception is [`AuditLog::detach_recipient`], which clears the recipient
//! reference when the caller deletes that recipient, and keeps the entry.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::HeraldError;
use crate::recipient::RecipientId;
use crate::transport::Outcome;

/// Audit entry identifier, increasing in append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome recorded for an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    /// Recorded without any network action (log-only).
    Pending,
    Sent,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub id: AttemptId,
    /// Destination exactly as attempted; free-form.
    pub destination: String,
    /// Message snapshot at attempt time.
    pub content: String,
    pub recipient: Option<RecipientId>,
    pub status: AttemptStatus,
    pub error: Option<String>,
    /// Transport that produced the outcome.
    pub transport: String,
    /// Provider-assigned message id, when the gateway returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub recorded_at: DateTime<Utc>,
    /// When the attempt reached `sent` or `failed`. Empty for `pending`.
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Fields of an attempt before it is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttempt {
    pub destination: String,
    pub content: String,
    pub recipient: Option<RecipientId>,
    pub status: AttemptStatus,
    pub error: Option<String>,
    pub transport: String,
    pub reference: Option<String>,
}

impl NewAttempt {
    /// Build the audit record for a transport outcome.
    pub fn from_outcome(
        destination: impl Into<String>,
        content: impl Into<String>,
        recipient: Option<RecipientId>,
        transport: &str,
        outcome: &Outcome,
    ) -> Self {
        let (status, error, reference) = match outcome {
            Outcome::Sent { reference } => (AttemptStatus::Sent, None, reference.clone()),
            Outcome::Skipped => (AttemptStatus::Pending, None, None),
            Outcome::Failed(err) => (AttemptStatus::Failed, Some(err.to_string()), None),
        };

        Self {
            destination: destination.into(),
            content: content.into(),
            recipient,
            status,
            error,
            transport: transport.to_string(),
            reference,
        }
    }
}

/// Trait for audit log backends.
pub trait AuditLog: Send + Sync {
    /// Append an attempt and return its id.
    fn append(&self, attempt: NewAttempt) -> Result<AttemptId, HeraldError>;

    /// Up to `limit` entries, newest first.
    fn recent(&self, limit: usize) -> Vec<DeliveryAttempt>;

    /// Get an entry by id.
    fn get(&self, id: AttemptId) -> Option<DeliveryAttempt>;

    /// Number of stored entries.
    fn count(&self) -> usize;

    /// Clear the recipient reference on every entry naming `recipient`.
    /// Returns how many entries changed.
    fn detach_recipient(&self, recipient: RecipientId) -> Result<usize, HeraldError>;
}

/// Ordered entries shared by both backends.
#[derive(Debug, Default)]
struct Journal {
    next_id: u64,
    entries: Vec<DeliveryAttempt>,
}

impl Journal {
    fn from_entries(entries: Vec<DeliveryAttempt>) -> Self {
        let next_id = entries.iter().map(|e| e.id.0).max().unwrap_or(0);
        Self { next_id, entries }
    }

    fn stamp(&mut self, attempt: NewAttempt) -> DeliveryAttempt {
        self.next_id += 1;
        let now = Utc::now();
        let resolved_at = match attempt.status {
            AttemptStatus::Pending => None,
            AttemptStatus::Sent | AttemptStatus::Failed => Some(now),
        };

        DeliveryAttempt {
            id: AttemptId(self.next_id),
            destination: attempt.destination,
            content: attempt.content,
            recipient: attempt.recipient,
            status: attempt.status,
            error: attempt.error,
            transport: attempt.transport,
            reference: attempt.reference,
            recorded_at: now,
            resolved_at,
        }
    }

    fn recent(&self, limit: usize) -> Vec<DeliveryAttempt> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    fn get(&self, id: AttemptId) -> Option<DeliveryAttempt> {
        self.entries.iter().find(|e| e.id == id).cloned()
    }

    fn detach(&mut self, recipient: RecipientId) -> usize {
        detach_in(&mut self.entries, recipient)
    }
}

fn detach_in(entries: &mut [DeliveryAttempt], recipient: RecipientId) -> usize {
    let mut changed = 0;
    for entry in entries.iter_mut() {
        if entry.recipient == Some(recipient) {
            entry.recipient = None;
            changed += 1;
        }
    }
    changed
}

/// Thread-safe in-memory audit log.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    journal: RwLock<Journal>,
}

impl MemoryAuditLog {
    /// Create a new empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log wrapped in an Arc for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// All entries, newest first.
    pub fn all(&self) -> Vec<DeliveryAttempt> {
        let journal = self.journal.read();
        journal.recent(journal.entries.len())
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, attempt: NewAttempt) -> Result<AttemptId, HeraldError> {
        let mut journal = self.journal.write();
        let entry = journal.stamp(attempt);
        let id = entry.id;
        journal.entries.push(entry);
        Ok(id)
    }

    fn recent(&self, limit: usize) -> Vec<DeliveryAttempt> {
        self.journal.read().recent(limit)
    }

    fn get(&self, id: AttemptId) -> Option<DeliveryAttempt> {
        self.journal.read().get(id)
    }

    fn count(&self) -> usize {
        self.journal.read().entries.len()
    }

    fn detach_recipient(&self, recipient: RecipientId) -> Result<usize, HeraldError> {
        Ok(self.journal.write().detach(recipient))
    }
}

/// Durable audit log stored as JSON lines, one entry per line.
///
/// Appends go straight to the end of the file. A failed append is cut back
/// off the file, or, if that fails too, fenced off by a newline before the
/// next record. Detaching a recipient rewrites the file through a sibling temp
/// file and an atomic rename; memory changes only once the rename succeeded.
/// Entries are also held in memory for reads.
#[derive(Debug)]
pub struct FileAuditLog {
    path: PathBuf,
    state: Mutex<FileState>,
}

#[derive(Debug)]
struct FileState {
    journal: Journal,
    file: File,
    /// A failed append may have left a fragment at the end of the file.
    needs_newline: bool,
}

impl FileAuditLog {
    /// Open (or create) the log at `path`, loading existing entries.
    ///
    /// A line that fails to parse, such as a torn final write, is skipped
    /// with a warning.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HeraldError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            load_entries(&path)?
        } else {
            Vec::new()
        };

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if !ends_with_newline(&path)? {
            file.write_all(b"\n")?;
        }

        tracing::debug!(path = %path.display(), entries = entries.len(), "Audit log opened");

        Ok(Self {
            path,
            state: Mutex::new(FileState {
                journal: Journal::from_entries(entries),
                file,
                needs_newline: false,
            }),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rewrite(&self, entries: &[DeliveryAttempt]) -> Result<File, HeraldError> {
        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut out = File::create(&tmp)?;
            for entry in entries {
                serde_json::to_writer(&mut out, entry)?;
                out.write_all(b"\n")?;
            }
            out.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(OpenOptions::new().append(true).open(&self.path)?)
    }
}

fn ends_with_newline(path: &Path) -> Result<bool, HeraldError> {
    let bytes = fs::read(path)?;
    Ok(bytes.last().map_or(true, |b| *b == b'\n'))
}

fn load_entries(path: &Path) -> Result<Vec<DeliveryAttempt>, HeraldError> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<DeliveryAttempt>(&line) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                tracing::warn!(line = index + 1, error = %err, "Skipping unreadable audit entry")
            }
        }
    }
    Ok(entries)
}

impl AuditLog for FileAuditLog {
    fn append(&self, attempt: NewAttempt) -> Result<AttemptId, HeraldError> {
        let mut state = self.state.lock();
        let entry = state.journal.stamp(attempt);

        let mut line = Vec::new();
        if state.needs_newline {
            line.push(b'\n');
        }
        if let Err(err) = serde_json::to_writer(&mut line, &entry) {
            state.journal.next_id -= 1;
            return Err(err.into());
        }
        line.push(b'\n');

        let start = state.file.metadata().map(|m| m.len());
        if let Err(err) = state.file.write_all(&line) {
            state.journal.next_id -= 1;
            let trimmed = match start {
                Ok(len) => state.file.set_len(len).is_ok(),
                Err(_) => false,
            };
            if !trimmed {
                state.needs_newline = true;
            }
            tracing::error!(path = %self.path.display(), error = %err, trimmed, "Audit append failed");
            return Err(err.into());
        }

        state.needs_newline = false;
        let id = entry.id;
        state.journal.entries.push(entry);
        Ok(id)
    }

    fn recent(&self, limit: usize) -> Vec<DeliveryAttempt> {
        self.state.lock().journal.recent(limit)
    }

    fn get(&self, id: AttemptId) -> Option<DeliveryAttempt> {
        self.state.lock().journal.get(id)
    }

    fn count(&self) -> usize {
        self.state.lock().journal.entries.len()
    }

    fn detach_recipient(&self, recipient: RecipientId) -> Result<usize, HeraldError> {
        let mut state = self.state.lock();
        let mut entries = state.journal.entries.clone();
        let changed = detach_in(&mut entries, recipient);
        if changed > 0 {
            state.file = self.rewrite(&entries)?;
            state.journal.entries = entries;
            state.needs_newline = false;
        }
        Ok(changed)
    }
}
