//! Shared types between the coordinator and external consumers
//!
//! These types are used by:
//! - The coordinator service (persistence + HTTP API)
//! - Other processes that read the initiative ledger document directly
//!
//! Serializable with serde for JSON over HTTP and on disk. The ledger
//! document shape is a durable contract: other tools parse the file
//! as written, so field names here must not drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Task Lifecycle
// ============================================================================

/// Kanban status of a task. The board allows moving a task to almost any
/// state; transitions with side effects are enforced by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    PendingDispatch,
    Planning,
    Inbox,
    Assigned,
    InProgress,
    Testing,
    Review,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::PendingDispatch => "pending_dispatch",
            TaskStatus::Planning => "planning",
            TaskStatus::Inbox => "inbox",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Testing => "testing",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_dispatch" => Some(TaskStatus::PendingDispatch),
            "planning" => Some(TaskStatus::Planning),
            "inbox" => Some(TaskStatus::Inbox),
            "assigned" => Some(TaskStatus::Assigned),
            "in_progress" => Some(TaskStatus::InProgress),
            "testing" => Some(TaskStatus::Testing),
            "review" => Some(TaskStatus::Review),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(TaskPriority::Low),
            "normal" => Some(TaskPriority::Normal),
            "high" => Some(TaskPriority::High),
            "urgent" => Some(TaskPriority::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    #[default]
    NotEvaluated,
    Passed,
    Failed,
}

impl EvaluationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationStatus::NotEvaluated => "not_evaluated",
            EvaluationStatus::Passed => "passed",
            EvaluationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_evaluated" => Some(EvaluationStatus::NotEvaluated),
            "passed" => Some(EvaluationStatus::Passed),
            "failed" => Some(EvaluationStatus::Failed),
            _ => None,
        }
    }
}

/// Per-task-type configuration, tagged by the task type name.
///
/// The message builder and the create-time validator both pattern-match on
/// the tag; each variant owns its own config shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TaskType {
    OpenclawNative,
    ClaudeTeam {
        team_size: u32,
        #[serde(default)]
        team_members: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
    MultiHypothesis {
        hypotheses: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coordinator: Option<String>,
    },
}

impl Default for TaskType {
    fn default() -> Self {
        TaskType::OpenclawNative
    }
}

impl TaskType {
    /// The tag stored in the `task_type` column and exposed by
    /// `GET /task-types`.
    pub fn tag(&self) -> &'static str {
        match self {
            TaskType::OpenclawNative => "openclaw-native",
            TaskType::ClaudeTeam { .. } => "claude-team",
            TaskType::MultiHypothesis { .. } => "multi-hypothesis",
        }
    }
}

/// A unit of work routed through the status lifecycle to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assigned_agent_id: Option<String>,
    pub created_by_agent_id: Option<String>,
    pub workspace_id: String,
    /// Logical reference to a ledger entry; not enforced by the database.
    pub initiative_id: Option<String>,
    pub external_request_id: Option<String>,
    pub source: String,
    pub task_type: TaskType,
    /// At most one level of nesting: the referenced parent must itself
    /// have no parent.
    pub parent_task_id: Option<String>,
    pub evaluation_status: EvaluationStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Agents & Workspaces
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Online,
    Busy,
    #[default]
    Offline,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Online => "online",
            AgentStatus::Busy => "busy",
            AgentStatus::Offline => "offline",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "online" => Some(AgentStatus::Online),
            "busy" => Some(AgentStatus::Busy),
            "offline" => Some(AgentStatus::Offline),
            _ => None,
        }
    }
}

/// An autonomous agent registered in a workspace. Agent inventory is owned
/// by an external sync job; the coordinator reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub workspace_id: String,
    /// Master (orchestrator) agents approve review→done transitions and
    /// own shared external channels; at most one should be actively
    /// dispatched to per workspace.
    pub is_master: bool,
    pub status: AgentStatus,
    /// Transport address for the gateway's chat.send.
    pub session_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub slug: String,
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Ended => "ended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SessionStatus::Active),
            "ended" => Some(SessionStatus::Ended),
            _ => None,
        }
    }
}

/// An open dispatch channel to one agent. The dispatch engine creates at
/// most one active session per agent and reuses it on later dispatches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub agent_id: String,
    pub session_type: String,
    pub status: SessionStatus,
    pub task_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Events
// ============================================================================

/// Immutable audit record, append-only. Every state transition and
/// dispatch attempt writes one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// ULID event id.
    pub id: String,
    pub event_type: String,
    pub agent_id: Option<String>,
    pub task_id: Option<String>,
    pub message: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Initiative Ledger (external JSON document)
// ============================================================================

/// Ledger-side initiative status. Kebab-case on the wire; the file is read
/// by other processes, so these strings are a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitiativeStatus {
    Planned,
    InProgress,
    Completed,
    Canceled,
    Blocked,
}

impl InitiativeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InitiativeStatus::Planned => "planned",
            InitiativeStatus::InProgress => "in-progress",
            InitiativeStatus::Completed => "completed",
            InitiativeStatus::Canceled => "canceled",
            InitiativeStatus::Blocked => "blocked",
        }
    }
}

/// One append-only history record on a ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub status: InitiativeStatus,
    pub at: DateTime<Utc>,
    pub by: String,
    pub note: String,
}

/// A ledger entry: an externally-persisted higher-level grouping of tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Initiative {
    /// Human-readable id, e.g. "INIT-8h2kq".
    pub id: String,
    pub title: String,
    pub status: InitiativeStatus,
    #[serde(default)]
    pub lead: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub external_request_id: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryRecord>,
}

/// The whole ledger document. Must remain syntactically valid JSON after
/// every write; readers may observe it at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerDocument {
    #[serde(rename = "lastUpdate")]
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub initiatives: Vec<Initiative>,
}

impl LedgerDocument {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            last_update: now,
            initiatives: Vec::new(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
