//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::path::PathBuf;

use serde_json::json;

use crate::core::config::ResolvedConfig;
use crate::core::state::App;
use crate::protocol::WorkerSpec;
use crate::protocol::message::{CheckpointHistory, RecordedItem};

/// Config pointing at a workspace that never contains a checkpoint store.
pub fn test_config() -> ResolvedConfig {
    ResolvedConfig {
        worker: WorkerSpec {
            program: "worker".to_string(),
            args: Vec::new(),
            workspace_root: PathBuf::from("/nonexistent/quasar-test-workspace"),
            env: Vec::new(),
        },
        auto_restart: false,
        exit_on_completion: false,
    }
}

pub fn test_app() -> App {
    App::new(&test_config())
}

pub fn tool(content: &str) -> RecordedItem {
    RecordedItem::Tool {
        content: content.to_string(),
        is_error: false,
        output: None,
    }
}

/// A three-task history with `completed` finished tasks. Every finished task
/// has one worker tool call, one reviewer note and a step result.
pub fn history(completed: usize) -> CheckpointHistory {
    let mut history = CheckpointHistory {
        plan: vec![
            "Converge the plane-wave cutoff".to_string(),
            "Relax the unit cell".to_string(),
            "Compute the band structure".to_string(),
        ],
        completed_steps: (0..completed).map(|i| json!({ "task": i })).collect(),
        total_tasks: Some(3),
        current_task: Some(completed as u32 + 1),
        strategist_items: vec![RecordedItem::ModelText {
            content: "Three steps should do it.".to_string(),
        }],
        ..Default::default()
    };
    for i in 0..completed {
        let key = i.to_string();
        history
            .operator_items_by_task
            .insert(key.clone(), vec![tool(&format!("Executed step {}", i + 1))]);
        history.evaluator_items_by_task.insert(
            key.clone(),
            vec![RecordedItem::ModelText {
                content: format!("Step {} looks right", i + 1),
            }],
        );
        history
            .step_results
            .insert(key, format!("Task {} converged", i + 1));
    }
    history
}
