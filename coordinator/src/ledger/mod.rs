//! Ledger writeback sync.
//!
//! Mirrors task/initiative status into an external append-only JSON
//! document read directly by other processes. Writes are atomic (temp
//! file + rename) so a reader never observes a partial document; two
//! racing writers can still lose an update to each other, which is a
//! documented property of the file, not silently fixed here.
//!
//! Every failure on this path is caught and logged. Writeback is a
//! deliberately weaker consistency boundary than the primary store and
//! must never fail the caller's request.

pub mod resolver;

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::warn;
use ulid::Ulid;

use shared_types::{HistoryRecord, Initiative, InitiativeStatus, LedgerDocument, Task};

/// The `by` field stamped on every history record this service appends.
const WRITTEN_BY: &str = "mission-control";

/// Kanban board status → ledger status.
///
/// Operates on strings so board states this core never emits (other
/// writers move cards too) still map. `review` collapsing into
/// `completed` is preserved as observed; see DESIGN.md.
pub fn map_status(board_status: &str) -> InitiativeStatus {
    match board_status {
        "planning" => InitiativeStatus::Planned,
        "done" | "completed" | "review" => InitiativeStatus::Completed,
        "cancelled" => InitiativeStatus::Canceled,
        // Kept visible on the board rather than hidden.
        "blocked" => InitiativeStatus::InProgress,
        _ => InitiativeStatus::InProgress,
    }
}

/// Fields used to seed a new ledger entry when an explicitly supplied
/// initiative id has no match in the document.
#[derive(Debug, Clone)]
pub struct SeedEntry {
    pub title: String,
    pub source: Option<String>,
    pub external_request_id: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LedgerSync {
    path: PathBuf,
}

impl LedgerSync {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort mirror of a task's status change into the ledger.
    /// Resolves the initiative via the resolver chain; no resolution,
    /// no write. Never propagates an error.
    pub async fn record_task_status(&self, task: &Task, board_status: &str, note: &str) {
        let Some(initiative_id) = resolver::resolve_initiative_id(task) else {
            return;
        };

        // Only an explicitly supplied initiative id may seed a new entry.
        let seed = task
            .initiative_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|_| SeedEntry {
                title: task.title.clone(),
                source: Some(task.source.clone()),
                external_request_id: task.external_request_id.clone(),
                priority: Some(task.priority.as_str().to_string()),
            });

        if let Err(err) = self
            .try_record(&initiative_id, board_status, note, seed)
            .await
        {
            warn!(
                initiative_id = %initiative_id,
                task_id = %task.id,
                error = %err,
                "ledger writeback failed"
            );
        }
    }

    /// The actual read-modify-write. Errors bubble to the best-effort
    /// wrapper above.
    pub async fn try_record(
        &self,
        initiative_id: &str,
        board_status: &str,
        note: &str,
        seed: Option<SeedEntry>,
    ) -> anyhow::Result<()> {
        let now = Utc::now();
        let mut doc = self.load().await?;

        // Match by case-insensitive id first, then by known
        // external-request-id, so a retried seed never duplicates.
        let position = doc
            .initiatives
            .iter()
            .position(|e| e.id.eq_ignore_ascii_case(initiative_id))
            .or_else(|| {
                let ext = seed.as_ref()?.external_request_id.as_deref()?;
                doc.initiatives
                    .iter()
                    .position(|e| e.external_request_id.as_deref() == Some(ext))
            });

        let index = match position {
            Some(i) => i,
            None => {
                let Some(seed) = seed else {
                    // Inferred id with no matching entry: nothing to update.
                    return Ok(());
                };
                doc.initiatives.push(Initiative {
                    id: initiative_id.to_string(),
                    title: seed.title,
                    status: InitiativeStatus::Planned,
                    lead: None,
                    participants: Vec::new(),
                    priority: seed.priority,
                    created: Some(now),
                    target: None,
                    summary: None,
                    source: seed.source,
                    external_request_id: seed.external_request_id,
                    history: vec![HistoryRecord {
                        status: InitiativeStatus::Planned,
                        at: now,
                        by: WRITTEN_BY.to_string(),
                        note: "initiative created".to_string(),
                    }],
                });
                doc.initiatives.len() - 1
            }
        };

        let mapped = map_status(board_status);
        let entry = &mut doc.initiatives[index];
        entry.history.push(HistoryRecord {
            status: mapped,
            at: now,
            by: WRITTEN_BY.to_string(),
            note: note.to_string(),
        });
        entry.status = mapped;
        doc.last_update = now;

        self.write_atomic(&doc).await
    }

    /// Look up an entry for message construction. Errors degrade to None.
    pub async fn find_entry(&self, initiative_id: &str) -> Option<Initiative> {
        match self.load().await {
            Ok(doc) => doc
                .initiatives
                .into_iter()
                .find(|e| e.id.eq_ignore_ascii_case(initiative_id)),
            Err(err) => {
                warn!(initiative_id, error = %err, "ledger read failed");
                None
            }
        }
    }

    pub async fn load(&self) -> anyhow::Result<LedgerDocument> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(LedgerDocument::empty(Utc::now()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Write the whole document to a temp path in the same directory,
    /// then rename over the original. Readers see the old file or the
    /// new one, never a partial write.
    async fn write_atomic(&self, doc: &LedgerDocument) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension(format!("{}.tmp", Ulid::new()));
        tokio::fs::write(&tmp, json.as_bytes()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_matches_observed_board_behavior() {
        assert_eq!(map_status("planning"), InitiativeStatus::Planned);
        assert_eq!(map_status("done"), InitiativeStatus::Completed);
        assert_eq!(map_status("completed"), InitiativeStatus::Completed);
        assert_eq!(map_status("review"), InitiativeStatus::Completed);
        assert_eq!(map_status("cancelled"), InitiativeStatus::Canceled);
        assert_eq!(map_status("blocked"), InitiativeStatus::InProgress);
        assert_eq!(map_status("in_progress"), InitiativeStatus::InProgress);
        assert_eq!(map_status("inbox"), InitiativeStatus::InProgress);
        assert_eq!(map_status("backlog"), InitiativeStatus::InProgress);
        assert_eq!(map_status("assigned"), InitiativeStatus::InProgress);
    }
}
