//! Wire types for the worker protocol.
//!
//! Outbound traffic is a [`Command`] object per line. Inbound traffic is an
//! envelope `{"type": ..., "payload": {...}}`; the envelope is read first and
//! the payload is then decoded into the typed variant for that discriminator.
//! Unknown discriminators become [`Inbound::Unknown`] instead of errors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Outbound
// ============================================================================

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Prompt {
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        restart: bool,
    },
    CheckCheckpoint,
    FreshStart,
    ClearCheckpoint,
    ArchiveAndContinue,
    Interrupt,
    Exit,
}

impl Command {
    /// The empty prompt the worker treats as "resume from checkpoint".
    pub fn resume() -> Self {
        Command::Prompt {
            content: String::new(),
            restart: false,
        }
    }

    pub fn prompt(content: impl Into<String>) -> Self {
        Command::Prompt {
            content: content.into(),
            restart: false,
        }
    }
}

// ============================================================================
// Inbound payloads
// ============================================================================

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct InitPayload {
    pub model: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StatusPayload {
    pub message: String,
    pub agent: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct LogPayload {
    pub text: String,
    pub agent: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DoneStatus {
    Completed,
    Error,
    Interrupted,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct DonePayload {
    pub status: DoneStatus,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ErrorPayload {
    pub message: String,
    pub traceback: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RagState {
    #[default]
    #[serde(alias = "initializing", alias = "loading")]
    Running,
    Done,
    Error,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RagProgress {
    pub current: u32,
    pub total: u32,
}

/// Retrieval-index initialization status.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RagStatusInfo {
    pub status: RagState,
    pub message: String,
    pub detail: Option<String>,
    pub progress: Option<RagProgress>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SystemStatusPayload {
    pub status: String,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentEventKind {
    Start,
    Log,
    Update,
    Working,
    StepComplete,
    Complete,
    Error,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AgentEvent {
    pub agent: String,
    pub event: AgentEventKind,
    pub status: String,
    pub output: Option<String>,
    pub is_error: bool,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PlanStream {
    pub content: String,
    pub is_complete: bool,
    pub parsed_plan: Option<Vec<String>>,
    #[serde(rename = "_isReplanning")]
    pub is_replanning: bool,
}

/// One chunk of an agent's streamed output. `content` is the text so far.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StreamChunk {
    pub agent: String,
    pub content: String,
    pub is_complete: bool,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct TaskProgressPayload {
    pub current: u32,
    pub total: u32,
    pub title: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct FileContent {
    pub name: String,
    pub content: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CodeResult {
    pub output: String,
    pub success: bool,
    pub file_path: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CompletedRunInfo {
    pub exists: bool,
    pub summary: String,
    pub previous_input: String,
}

/// Result of `archive_and_continue`, `fresh_start` and `clear_checkpoint`.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Completion {
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct FinalSummary {
    pub content: String,
}

// ============================================================================
// Checkpoint history
// ============================================================================

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CheckpointInfo {
    pub exists: bool,
    pub previous_input: Option<String>,
    pub history: Option<CheckpointHistory>,
}

/// Snapshot of a persisted run, as extracted by the worker.
///
/// Map keys are 0-based task indices rendered as decimal strings.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CheckpointHistory {
    pub plan: Vec<String>,
    pub completed_steps: Vec<Value>,
    pub operator_items_by_task: BTreeMap<String, Vec<RecordedItem>>,
    pub evaluator_items_by_task: BTreeMap<String, Vec<RecordedItem>>,
    pub step_results: BTreeMap<String, String>,
    pub current_task: Option<u32>,
    pub total_tasks: Option<u32>,
    pub strategist_items: Vec<RecordedItem>,
    pub is_replan: bool,
}

impl CheckpointHistory {
    pub fn completed_count(&self) -> usize {
        self.completed_steps.len()
    }

    pub fn operator_items(&self, task: usize) -> &[RecordedItem] {
        self.operator_items_by_task
            .get(&task.to_string())
            .map_or(&[], Vec::as_slice)
    }

    pub fn evaluator_items(&self, task: usize) -> &[RecordedItem] {
        self.evaluator_items_by_task
            .get(&task.to_string())
            .map_or(&[], Vec::as_slice)
    }

    pub fn step_result(&self, task: usize) -> Option<&str> {
        self.step_results.get(&task.to_string()).map(String::as_str)
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RecordedSnippet {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RecordedOutput {
    #[serde(default)]
    pub output: String,
    #[serde(default, rename = "filePath")]
    pub file_path: String,
}

/// One transcript entry recorded in a checkpoint.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RecordedItem {
    Tool {
        #[serde(default)]
        content: String,
        #[serde(default, rename = "isError")]
        is_error: bool,
        #[serde(default)]
        output: Option<String>,
    },
    ModelText {
        #[serde(default)]
        content: String,
    },
    CodeSnippet {
        content: RecordedSnippet,
    },
    CodeResult {
        content: RecordedOutput,
        #[serde(default, rename = "isError")]
        is_error: bool,
    },
    ImageAnalysisResult {
        content: RecordedOutput,
        #[serde(default, rename = "isError")]
        is_error: bool,
    },
    EvaluationFailed {
        #[serde(default)]
        content: String,
        #[serde(default)]
        summary: Option<String>,
    },
    #[serde(other)]
    Other,
}

// ============================================================================
// Inbound envelope
// ============================================================================

/// A decoded worker message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Ready,
    Init(InitPayload),
    Status(StatusPayload),
    Log(LogPayload),
    Done(DonePayload),
    Error(ErrorPayload),
    RagStatus(RagStatusInfo),
    SystemReady,
    SystemStatus(SystemStatusPayload),
    AgentEvent(AgentEvent),
    PlanStream(PlanStream),
    TextStream(StreamChunk),
    ThoughtStream(StreamChunk),
    TaskProgress(TaskProgressPayload),
    FileContent(FileContent),
    CheckpointInfo(CheckpointInfo),
    CompletedRunInfo(CompletedRunInfo),
    ArchiveComplete(Completion),
    FreshStartComplete(Completion),
    ClearCheckpointComplete(Completion),
    FinalSummary(FinalSummary),
    CodeResult(CodeResult),
    InterruptAcknowledged,
    /// Discriminator this build does not know. Carries the raw `type`.
    Unknown(String),
}

/// The outer `{type, payload}` object, before the payload is typed.
#[derive(Deserialize, Debug)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

fn payload<T>(value: Value) -> Result<T, serde_json::Error>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if value.is_null() {
        Ok(T::default())
    } else {
        serde_json::from_value(value)
    }
}

impl Inbound {
    /// Decode one protocol line.
    pub fn from_json(line: &str) -> Result<Self, serde_json::Error> {
        let Envelope { kind, payload: body } = serde_json::from_str(line)?;
        let message = match kind.as_str() {
            "ready" => Inbound::Ready,
            "init" => Inbound::Init(payload(body)?),
            "status" => Inbound::Status(payload(body)?),
            "log" => Inbound::Log(payload(body)?),
            "done" => Inbound::Done(payload(body)?),
            "error" => Inbound::Error(payload(body)?),
            "rag_status" => Inbound::RagStatus(payload(body)?),
            "system_ready" => Inbound::SystemReady,
            "system_status" => Inbound::SystemStatus(payload(body)?),
            "agent_event" => Inbound::AgentEvent(payload(body)?),
            "plan_stream" => Inbound::PlanStream(payload(body)?),
            "text_stream" => Inbound::TextStream(payload(body)?),
            "thought_stream" => Inbound::ThoughtStream(payload(body)?),
            "task_progress" => Inbound::TaskProgress(payload(body)?),
            "file_content" => Inbound::FileContent(payload(body)?),
            "checkpoint_info" => Inbound::CheckpointInfo(payload(body)?),
            "completed_run_info" => Inbound::CompletedRunInfo(payload(body)?),
            "archive_complete" => Inbound::ArchiveComplete(payload(body)?),
            "fresh_start_complete" => Inbound::FreshStartComplete(payload(body)?),
            "clear_checkpoint_complete" => Inbound::ClearCheckpointComplete(payload(body)?),
            "final_summary" => Inbound::FinalSummary(payload(body)?),
            "code_result" => Inbound::CodeResult(payload(body)?),
            "interrupt_acknowledged" => Inbound::InterruptAcknowledged,
            _ => Inbound::Unknown(kind),
        };
        Ok(message)
    }

    /// Wire discriminator, for logging.
    pub fn kind(&self) -> &str {
        match self {
            Inbound::Ready => "ready",
            Inbound::Init(_) => "init",
            Inbound::Status(_) => "status",
            Inbound::Log(_) => "log",
            Inbound::Done(_) => "done",
            Inbound::Error(_) => "error",
            Inbound::RagStatus(_) => "rag_status",
            Inbound::SystemReady => "system_ready",
            Inbound::SystemStatus(_) => "system_status",
            Inbound::AgentEvent(_) => "agent_event",
            Inbound::PlanStream(_) => "plan_stream",
            Inbound::TextStream(_) => "text_stream",
            Inbound::ThoughtStream(_) => "thought_stream",
            Inbound::TaskProgress(_) => "task_progress",
            Inbound::FileContent(_) => "file_content",
            Inbound::CheckpointInfo(_) => "checkpoint_info",
            Inbound::CompletedRunInfo(_) => "completed_run_info",
            Inbound::ArchiveComplete(_) => "archive_complete",
            Inbound::FreshStartComplete(_) => "fresh_start_complete",
            Inbound::ClearCheckpointComplete(_) => "clear_checkpoint_complete",
            Inbound::FinalSummary(_) => "final_summary",
            Inbound::CodeResult(_) => "code_result",
            Inbound::InterruptAcknowledged => "interrupt_acknowledged",
            Inbound::Unknown(kind) => kind.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_serializes_without_default_restart() {
        let json = serde_json::to_string(&Command::prompt("relax Si")).unwrap();
        assert_eq!(json, r#"{"command":"prompt","content":"relax Si"}"#);

        let restart = Command::Prompt {
            content: String::new(),
            restart: true,
        };
        assert_eq!(
            serde_json::to_string(&restart).unwrap(),
            r#"{"command":"prompt","content":"","restart":true}"#
        );
    }

    #[test]
    fn test_unit_commands_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&Command::CheckCheckpoint).unwrap(),
            r#"{"command":"check_checkpoint"}"#
        );
        assert_eq!(
            serde_json::to_string(&Command::ArchiveAndContinue).unwrap(),
            r#"{"command":"archive_and_continue"}"#
        );
    }

    #[test]
    fn test_agent_event_decodes() {
        let line = r#"{"type":"agent_event","payload":{"agent":"operator","event":"step_complete","status":"Executed relax.py","is_error":false}}"#;
        let Inbound::AgentEvent(event) = Inbound::from_json(line).unwrap() else {
            panic!("expected agent_event");
        };
        assert_eq!(event.agent, "operator");
        assert_eq!(event.event, AgentEventKind::StepComplete);
        assert_eq!(event.status, "Executed relax.py");
        assert_eq!(event.output, None);
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let msg = Inbound::from_json(r#"{"type":"heartbeat","payload":{"seq":4}}"#).unwrap();
        assert_eq!(msg, Inbound::Unknown("heartbeat".to_string()));
    }

    #[test]
    fn test_stream_chunks_decode() {
        let line = r#"{"type":"text_stream","payload":{"agent":"operator","content":"Writing scf.in","is_complete":false}}"#;
        let msg = Inbound::from_json(line).unwrap();
        assert_eq!(
            msg,
            Inbound::TextStream(StreamChunk {
                agent: "operator".to_string(),
                content: "Writing scf.in".to_string(),
                is_complete: false,
            })
        );
        assert_eq!(msg.kind(), "text_stream");

        let line = r#"{"type":"thought_stream","payload":{"agent":"strategist","is_complete":true}}"#;
        let Inbound::ThoughtStream(chunk) = Inbound::from_json(line).unwrap() else {
            panic!("expected thought_stream");
        };
        assert!(chunk.is_complete);
        assert!(chunk.content.is_empty());
    }

    #[test]
    fn test_missing_payload_uses_defaults() {
        assert_eq!(Inbound::from_json(r#"{"type":"ready"}"#).unwrap(), Inbound::Ready);
        let msg = Inbound::from_json(r#"{"type":"done","payload":{}}"#).unwrap();
        assert_eq!(msg, Inbound::Done(DonePayload { status: DoneStatus::Other }));
    }

    #[test]
    fn test_rag_loading_maps_to_running() {
        let line = r#"{"type":"rag_status","payload":{"status":"loading","message":"Initializing","detail":"docs"}}"#;
        let Inbound::RagStatus(info) = Inbound::from_json(line).unwrap() else {
            panic!("expected rag_status");
        };
        assert_eq!(info.status, RagState::Running);
        assert_eq!(info.detail.as_deref(), Some("docs"));
    }

    #[test]
    fn test_checkpoint_history_decodes_recorded_items() {
        let line = r#"{"type":"checkpoint_info","payload":{"exists":true,"previous_input":"relax Si","history":{
            "plan":["Converge cutoff","Relax cell"],
            "completed_steps":[{"task":1}],
            "operator_items_by_task":{"0":[
                {"type":"tool","content":"Wrote in.pw","agent":"operator"},
                {"type":"code-snippet","content":{"name":"in.pw","content":"&control","isComplete":true}},
                {"type":"code-result","content":{"output":"done","filePath":"run.py"},"isError":true},
                {"type":"mystery"}
            ]},
            "evaluator_items_by_task":{},
            "step_results":{"0":"Cutoff converged at 60 Ry"},
            "current_task":2,
            "total_tasks":2,
            "is_replan":false
        }}}"#;
        let Inbound::CheckpointInfo(info) = Inbound::from_json(line).unwrap() else {
            panic!("expected checkpoint_info");
        };
        let history = info.history.unwrap();
        assert_eq!(history.completed_count(), 1);
        assert_eq!(history.step_result(0), Some("Cutoff converged at 60 Ry"));
        let items = history.operator_items(0);
        assert_eq!(items.len(), 4);
        assert!(matches!(&items[1], RecordedItem::CodeSnippet { content } if content.name == "in.pw"));
        assert!(matches!(&items[2], RecordedItem::CodeResult { is_error: true, .. }));
        assert_eq!(items[3], RecordedItem::Other);
        assert!(history.evaluator_items(0).is_empty());
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        assert!(Inbound::from_json("Loading model weights...").is_err());
        assert!(Inbound::from_json(r#"{"payload":{}}"#).is_err());
    }
}
