//! # Checkpoint Reconstruction
//!
//! Rebuilds the transcript a live run would have produced from the history
//! snapshot in `checkpoint_info`, then decides what the session does next.
//!
//! For every completed task `i` the block is fixed:
//!
//! ```text
//! operator header (i+1) → task box → operator items
//!   → evaluator header (i+1) → evaluator items → task summary → "Evaluation Passed"
//! ```
//!
//! The in-progress task only gets the parts that were actually recorded.

use std::time::Instant;

use log::{debug, info};

use super::action::Effect;
use super::config;
use super::header::{self, PLANNER, REVIEWER, WORKER};
use super::item::{CommittedItem, ItemKind};
use super::state::{App, Mode, TaskProgress};
use crate::protocol::message::{CheckpointHistory, CheckpointInfo, Command, RecordedItem};

pub const EVALUATION_PASSED: &str = "Evaluation Passed";
pub const TASK_SUMMARY: &str = "Task Summary";

/// Convert one recorded item. Unknown kinds and empty text are skipped.
fn recorded_item(item: &RecordedItem, agent: &str) -> Option<CommittedItem> {
    let committed = match item {
        RecordedItem::Tool {
            content,
            is_error,
            output,
        } => CommittedItem::tool_result(content.clone(), output.clone()).error(*is_error),
        RecordedItem::ModelText { content } if !content.trim().is_empty() => {
            CommittedItem::log(content.clone())
        }
        RecordedItem::ModelText { .. } => return None,
        RecordedItem::CodeSnippet { content } => CommittedItem::new(ItemKind::CodePanel {
            name: content.name.clone(),
            content: content.content.clone(),
        }),
        RecordedItem::CodeResult { content, is_error } => {
            CommittedItem::new(ItemKind::CodeResultPanel {
                output: content.output.clone(),
                file_path: content.file_path.clone(),
            })
            .error(*is_error)
        }
        RecordedItem::ImageAnalysisResult { content, is_error } => {
            let text = if content.file_path.is_empty() {
                "Analyzed image".to_string()
            } else {
                format!("Analyzed {}", content.file_path)
            };
            CommittedItem::tool_result(text, Some(content.output.clone())).error(*is_error)
        }
        RecordedItem::EvaluationFailed { content, summary } => {
            let verdict = if content.is_empty() {
                "Evaluation Failed".to_string()
            } else {
                content.clone()
            };
            CommittedItem::new(ItemKind::EvaluationSummary {
                verdict,
                summary: summary.clone(),
            })
            .error(true)
        }
        RecordedItem::Other => return None,
    };
    Some(committed.tagged(Some(agent)))
}

fn push_recorded(items: &mut Vec<CommittedItem>, recorded: &[RecordedItem], agent: &str) {
    items.extend(recorded.iter().filter_map(|r| recorded_item(r, agent)));
}

fn push_worker_block(items: &mut Vec<CommittedItem>, history: &CheckpointHistory, index: usize) {
    let number = index as u32 + 1;
    items.push(header::header_item(WORKER, Some(number)));
    if let Some(text) = history.plan.get(index) {
        items.push(header::task_box_item(WORKER, number, text));
    }
    push_recorded(items, history.operator_items(index), WORKER);
}

fn push_reviewer_block(items: &mut Vec<CommittedItem>, history: &CheckpointHistory, index: usize) {
    items.push(header::header_item(REVIEWER, Some(index as u32 + 1)));
    push_recorded(items, history.evaluator_items(index), REVIEWER);
}

/// The ordered items live processing would have produced for `history`.
pub fn reconstruct(history: &CheckpointHistory) -> Vec<CommittedItem> {
    let completed = history.completed_count();
    let mut body = Vec::new();

    for i in 0..completed {
        push_worker_block(&mut body, history, i);
        push_reviewer_block(&mut body, history, i);
        if let Some(result) = history.step_result(i) {
            body.push(
                CommittedItem::new(ItemKind::EvaluationSummary {
                    verdict: TASK_SUMMARY.to_string(),
                    summary: Some(result.to_string()),
                })
                .tagged(Some(REVIEWER)),
            );
        }
        body.push(CommittedItem::tool_result(EVALUATION_PASSED, None).tagged(Some(REVIEWER)));
    }

    // In-progress task: only what was recorded.
    if !history.operator_items(completed).is_empty() {
        push_worker_block(&mut body, history, completed);
        if !history.evaluator_items(completed).is_empty() {
            push_reviewer_block(&mut body, history, completed);
        }
    }

    if body.is_empty() && history.plan.is_empty() && history.strategist_items.is_empty() {
        return Vec::new();
    }

    let mut items = vec![header::header_item(PLANNER, None)];
    push_recorded(&mut items, &history.strategist_items, PLANNER);
    if !history.plan.is_empty() {
        items.push(
            CommittedItem::new(ItemKind::PlanBox {
                tasks: history.plan.clone(),
            })
            .tagged(Some(PLANNER)),
        );
    }
    items.extend(body);
    items
}

fn resume_position(app: &App, history: Option<&CheckpointHistory>) -> (u32, u32) {
    match history {
        Some(h) => {
            let task = h
                .current_task
                .unwrap_or(h.completed_count() as u32 + 1);
            let total = h.total_tasks.unwrap_or(h.plan.len() as u32);
            (task, total)
        }
        None => (app.task_progress.current, app.task_progress.total),
    }
}

/// Reconstruct the transcript (once) and resolve what happens next.
pub fn apply_checkpoint(
    app: &mut App,
    info: CheckpointInfo,
    auto_restart: bool,
    _now: Instant,
) -> Effect {
    if let Some(history) = info.history.as_ref() {
        if app.log.has_agent_items(PLANNER) {
            debug!("Transcript already holds planning content, skipping reconstruction");
        } else {
            let items = reconstruct(history);
            let appended = app.append(|_, batch| {
                for item in items {
                    batch.push(item);
                }
            });
            info!(
                "Reconstructed {} items from checkpoint ({} completed tasks)",
                appended,
                history.completed_count()
            );
            app.plan = history.plan.clone();
            app.plan_committed = !history.plan.is_empty();
            let (current, total) = resume_position(app, Some(history));
            app.task_progress = TaskProgress {
                current,
                total,
                title: None,
            };
        }
    }

    let exists = info.exists || config::checkpoint_store_exists(&app.workspace_root);
    let previous_input = info.previous_input.clone().unwrap_or_default();
    debug!("Checkpoint resolution: exists={exists}, auto_restart={auto_restart}");

    if let Some(prompt) = app.single_prompt.clone() {
        return resolve_headless(app, exists, auto_restart, prompt);
    }

    if auto_restart {
        if exists {
            app.mode = Mode::Input;
            app.busy = true;
            app.status_message = String::from("Resuming from checkpoint...");
            return Effect::Send(Command::resume());
        }
        app.mode = Mode::Fatal(String::from("No checkpoint to resume"));
        return Effect::None;
    }

    if exists {
        let (task, total) = resume_position(app, info.history.as_ref());
        app.mode = Mode::ConfirmResume {
            previous_input,
            task,
            total,
        };
    } else {
        app.mode = Mode::Input;
        app.status_message = String::from("Ready for a prompt");
    }
    Effect::None
}

fn resolve_headless(app: &mut App, exists: bool, auto_restart: bool, prompt: String) -> Effect {
    match (exists, auto_restart) {
        (true, true) => {
            app.busy = true;
            Effect::Send(Command::resume())
        }
        (true, false) => {
            // Start clean, then run the prompt once the worker confirms.
            app.pending_prompt = Some(prompt);
            Effect::Send(Command::FreshStart)
        }
        (false, true) => {
            app.mode = Mode::Fatal(String::from("No checkpoint to resume"));
            Effect::Exit(1)
        }
        (false, false) => {
            app.busy = true;
            Effect::Send(Command::prompt(prompt))
        }
    }
}
