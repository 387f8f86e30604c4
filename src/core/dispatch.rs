//! # Event Dispatcher
//!
//! Routes every decoded worker message to its handler. Handlers read the
//! session state (task progress, last code-result error), stage items in a
//! [`Batch`] and commit once, so a message is either fully applied or not
//! at all.
//!
//! While `App::interrupted` is set, only `ready` and `checkpoint_info` get
//! through: anything else is late output from the worker that was just
//! killed.

use std::time::Instant;

use log::{debug, error, info, warn};

use super::action::Effect;
use super::checkpoint;
use super::config;
use super::header::{self, Role, WORKER};
use super::item::{Batch, CommittedItem, ItemKind};
use super::state::{App, Mode, StreamPreview, Surface, TaskProgress};
use crate::protocol::message::{
    AgentEvent, AgentEventKind, Command, CompletedRunInfo, Completion, DoneStatus, Inbound,
    PlanStream, RagState, StreamChunk,
};
use crate::protocol::session::{SessionEvent, SessionEventKind};

pub const PLAN_REVIEWED: &str = "Reviewed Plan";
pub const REPLANNED: &str = "Created Replan";

/// Apply one worker message.
pub fn dispatch(app: &mut App, msg: Inbound, now: Instant) -> Effect {
    if app.interrupted && !matches!(msg, Inbound::Ready | Inbound::CheckpointInfo(_)) {
        debug!("Dropping stale '{}' message after interrupt", msg.kind());
        return Effect::None;
    }

    match msg {
        Inbound::Ready => {
            app.interrupted = false;
            app.worker_ready = true;
            app.status_message = String::from("Worker connected");
            Effect::None
        }
        Inbound::Init(init) => {
            app.model_name = init.model;
            Effect::None
        }
        Inbound::RagStatus(rag) => {
            if matches!(rag.status, RagState::Done | RagState::Error) {
                app.schedule_main_surface(now);
            }
            if !rag.message.is_empty() {
                app.status_message = rag.message.clone();
            }
            app.rag = Some(rag);
            Effect::None
        }
        Inbound::SystemReady => {
            app.system_ready = true;
            app.status_message = String::from("System ready");
            app.schedule_main_surface(now);
            Effect::Send(Command::CheckCheckpoint)
        }
        Inbound::SystemStatus(status) => {
            if status.status == "running" {
                app.busy = true;
            }
            debug!("System status: {}", status.status);
            Effect::None
        }
        Inbound::Status(status) => {
            app.status_message = status.message.clone();
            if let Some(agent) = status.agent.as_deref() {
                app.agents.set_status_text(agent, &status.message);
                if !status.message.is_empty() {
                    append_for(app, agent, |batch| {
                        batch.push(CommittedItem::log(status.message.clone()).tagged(Some(agent)));
                    });
                }
            }
            Effect::None
        }
        Inbound::Log(log_msg) => {
            if log_msg.text.trim().is_empty() {
                return Effect::None;
            }
            let agent = log_msg
                .agent
                .clone()
                .or_else(|| app.agents.active().map(|a| a.name.clone()));
            match agent.as_deref() {
                Some(agent) => append_for(app, agent, |batch| {
                    batch.push(CommittedItem::log(log_msg.text.clone()).tagged(Some(agent)));
                }),
                None => {
                    app.append(|_, batch| {
                        batch.push(CommittedItem::log(log_msg.text.clone()));
                    });
                }
            }
            Effect::None
        }
        Inbound::AgentEvent(event) => {
            agent_event(app, event);
            Effect::None
        }
        Inbound::PlanStream(plan) => {
            plan_stream(app, plan);
            Effect::None
        }
        Inbound::TextStream(chunk) => {
            agent_stream(app, chunk, false);
            Effect::None
        }
        Inbound::ThoughtStream(chunk) => {
            agent_stream(app, chunk, true);
            Effect::None
        }
        Inbound::TaskProgress(progress) => {
            app.task_progress = TaskProgress {
                current: progress.current,
                total: progress.total,
                title: progress.title,
            };
            Effect::None
        }
        Inbound::FileContent(file) => {
            append_for(app, WORKER, |batch| {
                batch.push(
                    CommittedItem::new(ItemKind::CodePanel {
                        name: file.name.clone(),
                        content: file.content.clone(),
                    })
                    .tagged(Some(WORKER)),
                );
            });
            Effect::None
        }
        Inbound::CodeResult(result) => {
            append_for(app, WORKER, |batch| {
                batch.push(
                    CommittedItem::new(ItemKind::CodeResultPanel {
                        output: result.output.clone(),
                        file_path: result.file_path.clone(),
                    })
                    .tagged(Some(WORKER))
                    .error(!result.success),
                );
            });
            app.last_code_result_error = !result.success;
            Effect::None
        }
        Inbound::CheckpointInfo(info) => {
            let auto_restart = config::auto_restart_requested(app.auto_restart);
            checkpoint::apply_checkpoint(app, info, auto_restart, now)
        }
        Inbound::CompletedRunInfo(run) => {
            completed_run_info(app, run);
            Effect::None
        }
        Inbound::ArchiveComplete(done) => archive_complete(app, done),
        Inbound::FreshStartComplete(done) => fresh_start_complete(app, done),
        Inbound::ClearCheckpointComplete(done) => {
            if done.success {
                app.reset_progress();
                app.mode = Mode::Input;
                app.status_message = String::from("Checkpoint cleared");
            } else {
                error_notice(app, "Failed to clear checkpoint", done.error);
            }
            Effect::None
        }
        Inbound::FinalSummary(summary) => {
            if !summary.content.trim().is_empty() {
                app.append(|_, batch| {
                    batch.push(CommittedItem::new(ItemKind::FinalSummary {
                        content: summary.content.clone(),
                    }));
                });
            }
            Effect::None
        }
        Inbound::Done(done) => {
            app.end_run();
            app.status_message = match done.status {
                DoneStatus::Completed => String::from("Run complete"),
                DoneStatus::Error => String::from("Run failed"),
                DoneStatus::Interrupted => String::from("Run interrupted"),
                DoneStatus::Other => String::from("Run finished"),
            };
            info!("Run done: {:?}", done.status);
            let completed = done.status == DoneStatus::Completed;
            if app.single_prompt.is_some() {
                return Effect::Exit(if completed { 0 } else { 1 });
            }
            if completed && app.exit_on_completion {
                app.shutting_down = true;
                return Effect::Exit(0);
            }
            Effect::None
        }
        Inbound::Error(err) => {
            if let Some(traceback) = err.traceback.as_deref() {
                error!("Worker traceback:\n{traceback}");
            }
            warn!("Worker error: {}", err.message);
            let agent = app.agents.active().map(|a| a.name.clone());
            app.append(|_, batch| {
                batch.push(
                    CommittedItem::log(format!("Error: {}", err.message))
                        .tagged(agent.as_deref())
                        .error(true),
                );
            });
            app.busy = false;
            app.status_message = String::from("Worker reported an error");
            if app.single_prompt.is_some() {
                return Effect::Exit(1);
            }
            Effect::None
        }
        Inbound::InterruptAcknowledged => {
            debug!("Worker acknowledged interrupt");
            Effect::None
        }
        Inbound::Unknown(kind) => {
            debug!("Ignoring unknown message type '{kind}'");
            Effect::None
        }
    }
}

/// Apply one event from the worker session. Events from an earlier
/// generation belong to a child that has already been replaced.
pub fn handle_session_event(
    app: &mut App,
    event: SessionEvent,
    current_generation: u64,
    now: Instant,
) -> Effect {
    if event.generation != current_generation {
        debug!(
            "Ignoring event from worker generation {} (current {})",
            event.generation, current_generation
        );
        return Effect::None;
    }

    match event.kind {
        SessionEventKind::Message(msg) => dispatch(app, msg, now),
        SessionEventKind::Fatal(reason) => {
            app.append(|_, batch| {
                batch.push(CommittedItem::log(format!("Worker process failed: {reason}")).error(true));
            });
            app.end_run();
            app.worker_ready = false;
            app.status_message = String::from("Worker failed");
            if app.single_prompt.is_some() {
                return Effect::Exit(1);
            }
            if app.surface == Surface::Splash {
                return startup_failure(app, format!("worker process failed: {reason}"));
            }
            Effect::None
        }
        SessionEventKind::Exited(code) => {
            app.worker_ready = false;
            if app.shutting_down {
                return Effect::None;
            }
            let text = match code {
                Some(code) => format!("Worker process exited with code {code}"),
                None => String::from("Worker process was terminated"),
            };
            warn!("{text}");
            let was_busy = app.busy;
            app.append(|_, batch| {
                batch.push(CommittedItem::log(text.clone()).error(true));
            });
            app.end_run();
            app.status_message = String::from("Worker stopped");
            if app.single_prompt.is_some() {
                return Effect::Exit(if was_busy { 1 } else { code.unwrap_or(1) });
            }
            if app.surface == Surface::Splash {
                return startup_failure(app, text);
            }
            Effect::None
        }
    }
}

/// The worker went away before the main surface came up: nothing on screen
/// can show the failure, so leave and report it on stderr.
fn startup_failure(app: &mut App, reason: String) -> Effect {
    error!("Worker lost during start-up: {reason}");
    app.exit_reason = Some(reason);
    app.shutting_down = true;
    Effect::Exit(1)
}

/// Task number to tag `agent`'s header with.
fn task_for(app: &App, agent: &str) -> Option<u32> {
    if Role::of(agent).is_task_scoped() {
        app.active_task()
    } else {
        None
    }
}

/// Ensure `agent`'s header, then stage content after it.
fn append_for(app: &mut App, agent: &str, content: impl FnOnce(&mut Batch<'_>)) {
    let task = task_for(app, agent);
    app.append(|app, batch| {
        header::ensure_header(batch, agent, task, &app.plan);
        content(batch);
    });
}

fn agent_event(app: &mut App, event: AgentEvent) {
    let AgentEvent {
        agent,
        event: kind,
        status,
        output,
        is_error,
    } = event;
    if agent.is_empty() {
        debug!("Ignoring agent_event without an agent");
        return;
    }
    let role = Role::of(&agent);

    match kind {
        AgentEventKind::Start => {
            app.agents.start(&agent, &status);
            append_for(app, &agent, |_| {});
        }
        AgentEventKind::Update | AgentEventKind::Working => {
            app.agents.set_status_text(&agent, &status);
        }
        AgentEventKind::Log => {
            let text = output.unwrap_or(status);
            if text.trim().is_empty() {
                return;
            }
            append_for(app, &agent, |batch| {
                batch.push(CommittedItem::log(text).tagged(Some(&agent)).error(is_error));
            });
        }
        AgentEventKind::StepComplete => {
            app.agents.set_status_text(&agent, &status);
            let mut is_error = is_error;
            if role == Role::Worker && status.starts_with("Executed") {
                is_error |= app.last_code_result_error;
                app.last_code_result_error = false;
            }
            let plan_box = planning_milestone(app, role, &status, output.as_deref());
            if plan_box.is_some() {
                app.plan_committed = true;
            }
            append_for(app, &agent, |batch| {
                if let Some(tasks) = plan_box {
                    batch.push(CommittedItem::new(ItemKind::PlanBox { tasks }).tagged(Some(&agent)));
                }
                batch.push(
                    CommittedItem::tool_result(status, output)
                        .tagged(Some(&agent))
                        .error(is_error),
                );
            });
        }
        AgentEventKind::Complete => {
            app.agents.complete(&agent, &status);
            if status.trim().is_empty() {
                return;
            }
            let item = if role == Role::Reviewer {
                let failed = status.contains("Failed");
                CommittedItem::new(ItemKind::EvaluationSummary {
                    verdict: status,
                    summary: output,
                })
                .error(failed)
            } else {
                CommittedItem::tool_result(status, output).error(is_error)
            };
            append_for(app, &agent, |batch| {
                batch.push(item.tagged(Some(&agent)));
            });
        }
        AgentEventKind::Error => {
            let text = output.filter(|o| !o.trim().is_empty()).unwrap_or(status);
            append_for(app, &agent, |batch| {
                batch.push(CommittedItem::log(text).tagged(Some(&agent)).error(true));
            });
        }
        AgentEventKind::Other => {
            debug!("Ignoring unknown agent event for {agent}");
        }
    }
}

/// Plan box to insert before a planner milestone, if one is due.
fn planning_milestone(
    app: &App,
    role: Role,
    status: &str,
    output: Option<&str>,
) -> Option<Vec<String>> {
    let milestone = status.contains(PLAN_REVIEWED) || status.contains(REPLANNED);
    if role != Role::Planner || !milestone || app.plan_committed {
        return None;
    }
    let tasks = if app.plan.is_empty() {
        output
            .unwrap_or_default()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        app.plan.clone()
    };
    (!tasks.is_empty()).then_some(tasks)
}

fn plan_stream(app: &mut App, plan: PlanStream) {
    if plan.is_replanning {
        app.plan_committed = false;
    }
    if plan.is_complete {
        app.plan_preview = None;
        if let Some(parsed) = plan.parsed_plan.filter(|p| !p.is_empty()) {
            debug!("Plan parsed with {} tasks", parsed.len());
            app.task_progress.total = parsed.len() as u32;
            app.plan = parsed;
        }
    } else {
        app.plan_preview = Some(plan.content);
    }
}

/// Partial chunks only update the preview. A finished reply is committed as
/// one log entry; finished thoughts are dropped, as checkpoints never hold them.
fn agent_stream(app: &mut App, chunk: StreamChunk, thinking: bool) {
    let StreamChunk {
        agent,
        content,
        is_complete,
    } = chunk;
    if agent.is_empty() {
        debug!("Ignoring stream chunk without an agent");
        return;
    }

    if !is_complete {
        app.agents.set_streaming(&agent, true);
        app.stream_preview = Some(StreamPreview {
            agent,
            text: content,
            thinking,
        });
        return;
    }

    app.agents.set_streaming(&agent, false);
    if app.stream_preview.as_ref().is_some_and(|p| p.agent == agent) {
        app.stream_preview = None;
    }
    if thinking || content.trim().is_empty() {
        return;
    }
    append_for(app, &agent, |batch| {
        batch.push(CommittedItem::log(content).tagged(Some(&agent)));
    });
}

fn completed_run_info(app: &mut App, run: CompletedRunInfo) {
    if app.busy || app.single_prompt.is_some() {
        debug!("Ignoring completed_run_info (busy or headless)");
        return;
    }
    if !run.exists {
        return;
    }
    if !run.summary.trim().is_empty() {
        app.append(|_, batch| {
            batch.push(CommittedItem::with_id(
                "final-summary",
                ItemKind::FinalSummary {
                    content: run.summary.clone(),
                },
            ));
        });
    }
    app.mode = Mode::ConfirmImprove {
        previous_input: run.previous_input,
    };
}

fn archive_complete(app: &mut App, done: Completion) -> Effect {
    if !done.success {
        app.improve_pending = false;
        error_notice(app, "Failed to archive previous run", done.error);
        return Effect::None;
    }
    app.append(|_, batch| {
        batch.push(CommittedItem::log("Previous run archived"));
    });
    app.mode = Mode::Input;
    app.plan_committed = false;
    if std::mem::take(&mut app.improve_pending) {
        app.busy = true;
        app.status_message = String::from("Improving previous run...");
        return Effect::Send(Command::resume());
    }
    app.status_message = String::from("Ready for a prompt");
    Effect::None
}

fn fresh_start_complete(app: &mut App, done: Completion) -> Effect {
    if !done.success {
        app.pending_prompt = None;
        error_notice(app, "Failed to start fresh", done.error);
        return Effect::None;
    }
    app.reset_run();
    app.mode = Mode::Input;
    if let Some(prompt) = app.pending_prompt.take() {
        app.busy = true;
        app.status_message = String::from("Running...");
        return Effect::Send(Command::prompt(prompt));
    }
    app.status_message = String::from("Ready for a prompt");
    Effect::None
}

fn error_notice(app: &mut App, what: &str, detail: Option<String>) {
    let text = match detail {
        Some(detail) if !detail.is_empty() => format!("{what}: {detail}"),
        _ => what.to_string(),
    };
    warn!("{text}");
    app.append(|_, batch| {
        batch.push(CommittedItem::log(text).error(true));
    });
    app.status_message = what.to_string();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::{
        CheckpointHistory, CheckpointInfo, CodeResult, DonePayload, ErrorPayload, LogPayload,
        RagStatusInfo, RecordedItem, StatusPayload, TaskProgressPayload,
    };
    use crate::test_support::{history, test_app};

    fn event(agent: &str, kind: AgentEventKind, status: &str) -> Inbound {
        Inbound::AgentEvent(AgentEvent {
            agent: agent.to_string(),
            event: kind,
            status: status.to_string(),
            ..Default::default()
        })
    }

    fn progress(current: u32) -> Inbound {
        Inbound::TaskProgress(TaskProgressPayload {
            current,
            total: 3,
            title: None,
        })
    }

    fn run(app: &mut App, messages: Vec<Inbound>) -> Vec<Effect> {
        let now = Instant::now();
        messages
            .into_iter()
            .map(|m| dispatch(app, m, now))
            .collect()
    }

    fn header_ids(app: &App) -> Vec<String> {
        app.log
            .items()
            .iter()
            .filter(|i| i.is_header())
            .map(|i| i.id.clone())
            .collect()
    }

    #[test]
    fn test_startup_sequence() {
        let mut app = test_app();
        let effects = run(
            &mut app,
            vec![
                Inbound::Ready,
                Inbound::RagStatus(RagStatusInfo {
                    status: RagState::Done,
                    message: "Index loaded".to_string(),
                    ..Default::default()
                }),
                Inbound::SystemReady,
            ],
        );
        assert!(app.worker_ready);
        assert!(app.system_ready);
        assert!(app.main_surface_at.is_some());
        assert_eq!(effects[2], Effect::Send(Command::CheckCheckpoint));
    }

    #[test]
    fn test_headers_unique_under_repeated_events() {
        let mut app = test_app();
        app.plan = vec!["Converge".into(), "Relax".into(), "Bands".into()];
        let mut messages = Vec::new();
        for _ in 0..3 {
            messages.push(event("strategist", AgentEventKind::Start, "Planning"));
            messages.push(progress(2));
            messages.push(event("operator", AgentEventKind::Start, "Working"));
            messages.push(event("operator", AgentEventKind::StepComplete, "Executed scf.in"));
            messages.push(event("evaluator", AgentEventKind::Start, "Checking"));
            messages.push(event("evaluator", AgentEventKind::Log, "Looks fine"));
        }
        run(&mut app, messages);
        assert_eq!(
            header_ids(&app),
            vec![
                "header-strategist",
                "header-operator-task-2",
                "header-evaluator-task-2"
            ]
        );
    }

    #[test]
    fn test_header_precedes_content_with_task_box() {
        let mut app = test_app();
        app.plan = vec!["Converge".into(), "Relax".into()];
        run(
            &mut app,
            vec![
                progress(2),
                Inbound::Log(LogPayload {
                    text: "running relax".to_string(),
                    agent: Some("operator".to_string()),
                }),
            ],
        );
        let kinds: Vec<_> = app.log.items().iter().map(|i| &i.kind).collect();
        assert!(matches!(kinds[0], ItemKind::Header { task: Some(2), .. }));
        assert!(matches!(kinds[1], ItemKind::TaskBox { number: 2, .. }));
        assert!(matches!(kinds[2], ItemKind::Log { .. }));
    }

    #[test]
    fn test_stale_messages_dropped_until_ready() {
        let mut app = test_app();
        app.interrupted = true;
        run(
            &mut app,
            vec![
                Inbound::Log(LogPayload {
                    text: "late output".to_string(),
                    agent: Some("operator".to_string()),
                }),
                event("operator", AgentEventKind::StepComplete, "Executed late"),
            ],
        );
        assert!(app.log.is_empty());

        let effect = dispatch(
            &mut app,
            Inbound::CheckpointInfo(CheckpointInfo::default()),
            Instant::now(),
        );
        assert_eq!(effect, Effect::None);
        assert!(app.interrupted);

        run(
            &mut app,
            vec![
                Inbound::Ready,
                Inbound::Log(LogPayload {
                    text: "fresh output".to_string(),
                    agent: None,
                }),
            ],
        );
        assert!(!app.interrupted);
        assert_eq!(app.log.len(), 1);
    }

    #[test]
    fn test_executed_step_takes_code_result_error() {
        let mut app = test_app();
        run(
            &mut app,
            vec![
                progress(1),
                Inbound::CodeResult(CodeResult {
                    output: "Error: SCF did not converge".to_string(),
                    success: false,
                    file_path: "scf.in".to_string(),
                }),
                event("operator", AgentEventKind::StepComplete, "Executed scf.in"),
                event("operator", AgentEventKind::StepComplete, "Executed bands.in"),
            ],
        );
        let results: Vec<_> = app
            .log
            .items()
            .iter()
            .filter(|i| matches!(i.kind, ItemKind::ToolResult { .. }))
            .collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_error);
        assert!(!results[1].is_error);
        assert!(!app.last_code_result_error);
    }

    #[test]
    fn test_plan_box_inserted_before_review_milestone() {
        let mut app = test_app();
        run(
            &mut app,
            vec![
                Inbound::PlanStream(PlanStream {
                    content: "1. Converge".to_string(),
                    ..Default::default()
                }),
                Inbound::PlanStream(PlanStream {
                    is_complete: true,
                    parsed_plan: Some(vec!["Converge".into(), "Relax".into()]),
                    ..Default::default()
                }),
                event("strategist", AgentEventKind::StepComplete, "Reviewed Plan"),
                event("strategist", AgentEventKind::StepComplete, "Reviewed Plan"),
            ],
        );
        assert!(app.plan_preview.is_none());
        let kinds: Vec<_> = app.log.items().iter().map(|i| &i.kind).collect();
        assert!(matches!(kinds[0], ItemKind::Header { .. }));
        assert_eq!(
            kinds[1],
            &ItemKind::PlanBox {
                tasks: vec!["Converge".into(), "Relax".into()]
            }
        );
        assert!(matches!(kinds[2], ItemKind::ToolResult { text, .. } if text == "Reviewed Plan"));
        let boxes = kinds
            .iter()
            .filter(|k| matches!(k, ItemKind::PlanBox { .. }))
            .count();
        assert_eq!(boxes, 1);
    }

    #[test]
    fn test_replanning_allows_new_plan_box() {
        let mut app = test_app();
        app.plan_committed = true;
        let mut output_event = AgentEvent {
            agent: "strategist".to_string(),
            event: AgentEventKind::StepComplete,
            status: "Created Replan".to_string(),
            output: Some("Relax again\n\nBands".to_string()),
            is_error: false,
        };
        run(
            &mut app,
            vec![
                Inbound::PlanStream(PlanStream {
                    is_replanning: true,
                    content: "...".to_string(),
                    ..Default::default()
                }),
                Inbound::AgentEvent(output_event.clone()),
            ],
        );
        assert!(app.log.items().iter().any(|i| i.kind
            == ItemKind::PlanBox {
                tasks: vec!["Relax again".into(), "Bands".into()]
            }));

        output_event.status = "Reviewed Plan".to_string();
        let before = app.log.len();
        run(&mut app, vec![Inbound::AgentEvent(output_event)]);
        assert_eq!(app.log.len(), before + 1);
    }

    #[test]
    fn test_reviewer_complete_produces_summary() {
        let mut app = test_app();
        run(
            &mut app,
            vec![
                progress(1),
                Inbound::AgentEvent(AgentEvent {
                    agent: "evaluator".to_string(),
                    event: AgentEventKind::Complete,
                    status: "Evaluation Failed".to_string(),
                    output: Some("Energy not converged".to_string()),
                    is_error: false,
                }),
            ],
        );
        let last = app.log.last().unwrap();
        assert!(last.is_error);
        assert_eq!(
            last.kind,
            ItemKind::EvaluationSummary {
                verdict: "Evaluation Failed".to_string(),
                summary: Some("Energy not converged".to_string()),
            }
        );
        assert!(app.log.contains("header-evaluator-task-1"));
    }

    #[test]
    fn test_status_with_agent_logs_under_header() {
        let mut app = test_app();
        run(
            &mut app,
            vec![Inbound::Status(StatusPayload {
                message: "Searching the index".to_string(),
                agent: Some("strategist".to_string()),
            })],
        );
        assert_eq!(app.status_message, "Searching the index");
        assert_eq!(app.log.len(), 2);
        assert_eq!(
            app.agents.get("strategist").map(|a| a.status_text.as_str()),
            Some("Searching the index")
        );
    }

    #[test]
    fn test_error_clears_busy_and_exits_headless() {
        let mut app = test_app();
        app.busy = true;
        let effects = run(
            &mut app,
            vec![Inbound::Error(ErrorPayload {
                message: "pw.x crashed".to_string(),
                traceback: Some("Traceback ...".to_string()),
            })],
        );
        assert_eq!(effects, vec![Effect::None]);
        assert!(!app.busy);
        assert!(app.log.last().unwrap().is_error);

        app.single_prompt = Some("x".to_string());
        let effects = run(
            &mut app,
            vec![Inbound::Error(ErrorPayload {
                message: "again".to_string(),
                traceback: None,
            })],
        );
        assert_eq!(effects, vec![Effect::Exit(1)]);
    }

    #[test]
    fn test_done_in_single_prompt_mode() {
        let mut app = test_app();
        app.single_prompt = Some("x".to_string());
        app.busy = true;
        app.agents.start("operator", "");
        let effects = run(
            &mut app,
            vec![Inbound::Done(DonePayload {
                status: DoneStatus::Completed,
            })],
        );
        assert_eq!(effects, vec![Effect::Exit(0)]);
        assert!(!app.busy);
        assert!(app.agents.active().is_none());

        let effects = run(
            &mut app,
            vec![Inbound::Done(DonePayload {
                status: DoneStatus::Error,
            })],
        );
        assert_eq!(effects, vec![Effect::Exit(1)]);
    }

    #[test]
    fn test_completed_run_offers_improvement() {
        let mut app = test_app();
        run(
            &mut app,
            vec![Inbound::CompletedRunInfo(CompletedRunInfo {
                exists: true,
                summary: "Lattice constant 5.43 Å".to_string(),
                previous_input: "Relax Si".to_string(),
            })],
        );
        assert!(app.log.contains("final-summary"));
        assert_eq!(
            app.mode,
            Mode::ConfirmImprove {
                previous_input: "Relax Si".to_string()
            }
        );
    }

    #[test]
    fn test_archive_then_improve() {
        let mut app = test_app();
        app.improve_pending = true;
        let effects = run(
            &mut app,
            vec![Inbound::ArchiveComplete(Completion {
                success: true,
                error: None,
            })],
        );
        assert_eq!(effects, vec![Effect::Send(Command::resume())]);
        assert!(app.busy);
        assert!(!app.improve_pending);
    }

    #[test]
    fn test_fresh_start_resets_and_sends_pending_prompt() {
        let mut app = test_app();
        dispatch(
            &mut app,
            Inbound::CheckpointInfo(CheckpointInfo {
                exists: true,
                previous_input: None,
                history: Some(history(1)),
            }),
            Instant::now(),
        );
        assert!(!app.log.is_empty());
        app.pending_prompt = Some("Compute bands".to_string());

        let effects = run(
            &mut app,
            vec![Inbound::FreshStartComplete(Completion {
                success: true,
                error: None,
            })],
        );
        assert_eq!(effects, vec![Effect::Send(Command::prompt("Compute bands"))]);
        assert!(app.log.is_empty());
        assert!(app.plan.is_empty());
        assert_eq!(app.mode, Mode::Input);
    }

    #[test]
    fn test_failed_completion_logs_error() {
        let mut app = test_app();
        run(
            &mut app,
            vec![Inbound::ClearCheckpointComplete(Completion {
                success: false,
                error: Some("locked".to_string()),
            })],
        );
        let last = app.log.last().unwrap();
        assert!(last.is_error);
        assert_eq!(
            last.kind,
            ItemKind::Log {
                text: "Failed to clear checkpoint: locked".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_message_is_ignored() {
        let mut app = test_app();
        let effects = run(&mut app, vec![Inbound::Unknown("heartbeat".to_string())]);
        assert_eq!(effects, vec![Effect::None]);
        assert!(app.log.is_empty());
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let mut app = test_app();
        let effect = handle_session_event(
            &mut app,
            SessionEvent {
                generation: 0,
                kind: SessionEventKind::Fatal("pipe closed".to_string()),
            },
            1,
            Instant::now(),
        );
        assert_eq!(effect, Effect::None);
        assert!(app.log.is_empty());
    }

    #[test]
    fn test_fatal_event_is_shown_inline() {
        let mut app = test_app();
        app.surface = Surface::Main;
        app.busy = true;
        let effect = handle_session_event(
            &mut app,
            SessionEvent {
                generation: 0,
                kind: SessionEventKind::Fatal("broken pipe".to_string()),
            },
            0,
            Instant::now(),
        );
        assert_eq!(effect, Effect::None);
        assert!(!app.busy);
        assert!(app.exit_reason.is_none());
        assert_eq!(
            app.log.last().unwrap().kind,
            ItemKind::Log {
                text: "Worker process failed: broken pipe".to_string()
            }
        );
    }

    #[test]
    fn test_expected_exit_is_silent() {
        let mut app = test_app();
        app.shutting_down = true;
        handle_session_event(
            &mut app,
            SessionEvent {
                generation: 0,
                kind: SessionEventKind::Exited(Some(0)),
            },
            0,
            Instant::now(),
        );
        assert!(app.log.is_empty());
    }

    fn session_event(kind: SessionEventKind) -> SessionEvent {
        SessionEvent { generation: 0, kind }
    }

    #[test]
    fn test_worker_exit_on_splash_leaves_with_reason() {
        let mut app = test_app();
        let effect = handle_session_event(
            &mut app,
            session_event(SessionEventKind::Exited(Some(2))),
            0,
            Instant::now(),
        );
        assert_eq!(effect, Effect::Exit(1));
        assert_eq!(
            app.exit_reason.as_deref(),
            Some("Worker process exited with code 2")
        );
        assert!(app.shutting_down);
    }

    #[test]
    fn test_transport_fault_on_splash_leaves_with_reason() {
        let mut app = test_app();
        let effect = handle_session_event(
            &mut app,
            session_event(SessionEventKind::Fatal("stdout closed".to_string())),
            0,
            Instant::now(),
        );
        assert_eq!(effect, Effect::Exit(1));
        assert_eq!(
            app.exit_reason.as_deref(),
            Some("worker process failed: stdout closed")
        );
    }

    #[test]
    fn test_worker_exit_after_startup_stays_inline() {
        let mut app = test_app();
        app.surface = Surface::Main;
        let effect = handle_session_event(
            &mut app,
            session_event(SessionEventKind::Exited(Some(2))),
            0,
            Instant::now(),
        );
        assert_eq!(effect, Effect::None);
        assert!(app.exit_reason.is_none());
        assert_eq!(app.status_message, "Worker stopped");
    }

    fn chunk(agent: &str, content: &str, is_complete: bool) -> StreamChunk {
        StreamChunk {
            agent: agent.to_string(),
            content: content.to_string(),
            is_complete,
        }
    }

    #[test]
    fn test_partial_text_stream_only_previews() {
        let mut app = test_app();
        run(
            &mut app,
            vec![
                event("operator", AgentEventKind::Start, "Working"),
                Inbound::TextStream(chunk("operator", "Writing", false)),
                Inbound::TextStream(chunk("operator", "Writing scf.in", false)),
            ],
        );
        let preview = app.stream_preview.as_ref().unwrap();
        assert_eq!(preview.agent, "operator");
        assert_eq!(preview.text, "Writing scf.in");
        assert!(!preview.thinking);
        assert!(app.agents.get("operator").unwrap().is_streaming);
        assert!(app.log.items().iter().all(|i| i.is_header()));
    }

    #[test]
    fn test_streamed_reply_matches_reconstruction() {
        let mut app = test_app();
        app.plan = vec!["Converge cutoff".into(), "Relax cell".into()];
        run(
            &mut app,
            vec![
                progress(1),
                event("operator", AgentEventKind::Start, "Working"),
                Inbound::TextStream(chunk("operator", "Starting", false)),
                Inbound::TextStream(chunk("operator", "Starting convergence scan", true)),
            ],
        );
        assert!(app.stream_preview.is_none());
        assert!(!app.agents.get("operator").unwrap().is_streaming);

        let history = CheckpointHistory {
            plan: app.plan.clone(),
            operator_items_by_task: [(
                "0".to_string(),
                vec![RecordedItem::ModelText {
                    content: "Starting convergence scan".into(),
                }],
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let rebuilt = checkpoint::reconstruct(&history);
        let start = rebuilt
            .iter()
            .position(|i| i.id == "header-operator-task-1")
            .unwrap();
        let shape = |items: &[CommittedItem]| {
            items
                .iter()
                .map(|i| (i.kind.clone(), i.agent.clone(), i.is_error))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(app.log.items()), shape(&rebuilt[start..]));
    }

    #[test]
    fn test_finished_thought_is_not_committed() {
        let mut app = test_app();
        run(
            &mut app,
            vec![
                Inbound::ThoughtStream(chunk("strategist", "Weighing k-points", false)),
                Inbound::ThoughtStream(chunk("strategist", "Weighing k-points", true)),
            ],
        );
        assert!(app.stream_preview.is_none());
        assert!(app.log.is_empty());
    }

    #[test]
    fn test_stream_chunks_dropped_after_interrupt() {
        let mut app = test_app();
        app.interrupted = true;
        run(
            &mut app,
            vec![
                Inbound::TextStream(chunk("operator", "late", false)),
                Inbound::TextStream(chunk("operator", "late reply", true)),
            ],
        );
        assert!(app.stream_preview.is_none());
        assert!(app.log.is_empty());
    }
}
