//! # Committed Item Log
//!
//! The transcript is an append-only list of [`CommittedItem`]s. Handlers
//! never push into the log directly: they open a [`Batch`], stage items
//! against a read-only view of the log, and the result is committed in one
//! step. A message is therefore either fully applied or not at all.
//!
//! ```text
//! ItemLog ──batch()──► Batch (stages items + header states)
//!    ▲                     │
//!    └──────commit(Staged)─┘
//! ```

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::header::HeaderState;

/// Payload of a transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Header { agent: String, task: Option<u32> },
    ToolResult { text: String, output: Option<String> },
    Log { text: String },
    PlanBox { tasks: Vec<String> },
    TaskBox { number: u32, text: String },
    EvaluationSummary { verdict: String, summary: Option<String> },
    FinalSummary { content: String },
    CodePanel { name: String, content: String },
    CodeResultPanel { output: String, file_path: String },
    ResumeBanner { previous_input: String, task: u32, total: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedItem {
    pub id: String,
    pub kind: ItemKind,
    pub agent: Option<String>,
    pub is_error: bool,
}

impl CommittedItem {
    /// New item with a random `item-<uuid>` id.
    pub fn new(kind: ItemKind) -> Self {
        Self::with_id(format!("item-{}", Uuid::new_v4()), kind)
    }

    pub fn with_id(id: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            kind,
            agent: None,
            is_error: false,
        }
    }

    pub fn log(text: impl Into<String>) -> Self {
        Self::new(ItemKind::Log { text: text.into() })
    }

    pub fn tool_result(text: impl Into<String>, output: Option<String>) -> Self {
        Self::new(ItemKind::ToolResult {
            text: text.into(),
            output,
        })
    }

    pub fn tagged(mut self, agent: Option<&str>) -> Self {
        self.agent = agent.map(str::to_string);
        self
    }

    pub fn error(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }

    pub fn is_header(&self) -> bool {
        matches!(self.kind, ItemKind::Header { .. })
    }
}

/// Items and header-state changes produced by one [`Batch`].
#[derive(Debug, Default)]
pub struct Staged {
    items: Vec<CommittedItem>,
    headers: HashMap<String, HeaderState>,
}

impl Staged {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.headers.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ItemLog {
    items: Vec<CommittedItem>,
    ids: HashSet<String>,
    headers: HashMap<String, HeaderState>,
}

impl ItemLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CommittedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last(&self) -> Option<&CommittedItem> {
        self.items.last()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn header_state(&self, agent: &str) -> HeaderState {
        self.headers.get(agent).copied().unwrap_or_default()
    }

    /// True if any item is tagged with `agent`.
    pub fn has_agent_items(&self, agent: &str) -> bool {
        self.items.iter().any(|i| i.agent.as_deref() == Some(agent))
    }

    pub fn batch(&self) -> Batch<'_> {
        Batch {
            log: self,
            staged: Staged::default(),
        }
    }

    fn append(&mut self, item: CommittedItem) -> bool {
        if !self.ids.insert(item.id.clone()) {
            return false;
        }
        if let ItemKind::Header { agent, task } = &item.kind {
            self.headers
                .insert(agent.clone(), HeaderState::ForTask(*task));
        }
        self.items.push(item);
        true
    }

    /// Apply a finished batch. Returns the number of items appended.
    pub fn commit(&mut self, staged: Staged) -> usize {
        if staged.is_empty() {
            return 0;
        }
        let Staged { items, headers } = staged;
        let mut appended = 0;
        for item in items {
            if self.append(item) {
                appended += 1;
            }
        }
        self.headers.extend(headers);
        appended
    }

    /// Bulk replace, used by full reset. Ids and header states are rebuilt
    /// from `items`.
    pub fn replace(&mut self, items: Vec<CommittedItem>) {
        self.items.clear();
        self.ids.clear();
        self.headers.clear();
        for item in items {
            self.append(item);
        }
    }
}

/// A read-only view of the log plus the items staged on top of it.
pub struct Batch<'a> {
    log: &'a ItemLog,
    staged: Staged,
}

impl Batch<'_> {
    /// Stage `item`. Returns `false` (and drops it) if its id is already
    /// committed or staged.
    pub fn push(&mut self, item: CommittedItem) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        self.staged.items.push(item);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.log.contains(id) || self.staged.items.iter().any(|i| i.id == id)
    }

    /// Most recent item, staged or committed.
    pub fn last(&self) -> Option<&CommittedItem> {
        self.staged.items.last().or_else(|| self.log.last())
    }

    pub fn header_state(&self, agent: &str) -> HeaderState {
        self.staged
            .headers
            .get(agent)
            .copied()
            .unwrap_or_else(|| self.log.header_state(agent))
    }

    pub fn set_header_state(&mut self, agent: &str, state: HeaderState) {
        self.staged.headers.insert(agent.to_string(), state);
    }

    pub fn finish(self) -> Staged {
        self.staged
    }
}
