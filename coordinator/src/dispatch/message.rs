//! Outbound instruction construction.
//!
//! Message shape is polymorphic over the task type; every message embeds
//! priority, due date, task id, the slugified output directory, and the
//! completion protocol. An initiative context block, when the task has
//! one, is spliced in immediately after the first paragraph.

use shared_types::{Task, TaskType};

/// Deterministic slug for the task's output directory: lowercase
/// alphanumeric runs joined by single dashes.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[derive(Debug, Clone)]
pub struct InitiativeContext {
    pub title: String,
    pub status: String,
    pub task_count: i64,
}

pub fn build_message(task: &Task, initiative: Option<&InitiativeContext>) -> String {
    let mut paragraphs: Vec<String> = Vec::new();

    paragraphs.push(match &task.task_type {
        TaskType::OpenclawNative => {
            format!("You have been assigned a task: {}.", task.title)
        }
        TaskType::ClaudeTeam { team_size, .. } => format!(
            "You have been assigned a team task: {}. Assemble a team of {team_size} to work it.",
            task.title
        ),
        TaskType::MultiHypothesis { hypotheses, .. } => format!(
            "You have been assigned a multi-hypothesis investigation: {}. Evaluate {} competing hypotheses in parallel.",
            task.title,
            hypotheses.len()
        ),
    });

    if let Some(ctx) = initiative {
        paragraphs.push(format!(
            "Initiative context: {} (status: {}, {} tasks attached).",
            ctx.title, ctx.status, ctx.task_count
        ));
    }

    if !task.description.trim().is_empty() {
        paragraphs.push(task.description.trim().to_string());
    }

    match &task.task_type {
        TaskType::OpenclawNative => {}
        TaskType::ClaudeTeam {
            team_members,
            model,
            ..
        } => {
            let mut lines = Vec::new();
            if !team_members.is_empty() {
                lines.push(format!("Team members: {}.", team_members.join(", ")));
            }
            if let Some(model) = model {
                lines.push(format!("Model: {model}."));
            }
            if !lines.is_empty() {
                paragraphs.push(lines.join("\n"));
            }
        }
        TaskType::MultiHypothesis {
            hypotheses,
            coordinator,
        } => {
            let mut lines: Vec<String> = hypotheses
                .iter()
                .enumerate()
                .map(|(i, h)| format!("Hypothesis {}: {}", i + 1, h))
                .collect();
            if let Some(coordinator) = coordinator {
                lines.push(format!("Coordinator: {coordinator}."));
            }
            paragraphs.push(lines.join("\n"));
        }
    }

    let due = task
        .due_date
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| "none".to_string());
    paragraphs.push(format!(
        "Priority: {}\nDue: {}\nTask id: {}\nOutput directory: tasks/{}",
        task.priority.as_str(),
        due,
        task.id,
        slugify(&task.title)
    ));

    paragraphs.push(
        "When the work is complete, follow the completion protocol in order: \
         (1) register each deliverable, (2) log a completion activity, \
         (3) move the task to review. Never move the task to done; \
         done requires separate approval."
            .to_string(),
    );

    paragraphs.join("\n\n")
}
