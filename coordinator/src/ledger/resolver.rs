//! Pure resolver chain from a task to its initiative id.
//!
//! Precedence, first match wins:
//! 1. explicit `initiative_id` field
//! 2. `initiative-<id>` pattern embedded in the task id
//! 3. `"<ID>: "` prefix in the task title

use once_cell::sync::Lazy;
use regex::Regex;

use shared_types::Task;

static TASK_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"initiative-([A-Za-z0-9][A-Za-z0-9_-]*)").expect("task id pattern"));

static TITLE_PREFIX_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+-[A-Za-z0-9]+):\s").expect("title prefix pattern"));

pub fn resolve_initiative_id(task: &Task) -> Option<String> {
    if let Some(explicit) = task.initiative_id.as_deref() {
        let trimmed = explicit.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    if let Some(caps) = TASK_ID_PATTERN.captures(&task.id) {
        return Some(caps[1].to_string());
    }

    if let Some(caps) = TITLE_PREFIX_PATTERN.captures(&task.title) {
        return Some(caps[1].to_string());
    }

    None
}
