//! Agent header de-duplication.
//!
//! Each agent's transcript section starts with a header item. Which header
//! to insert (if any) is decided by a small per-agent state machine, so the
//! rules live in one pure function instead of being scattered over handlers.
//!
//! ```text
//!            request(task)
//! NoHeader ───────────────► ForTask(task)
//! ForTask(m) ─────────────► ForTask(n)     (insert unless a skip rule fires)
//! ```

use super::item::{Batch, CommittedItem, ItemKind};

pub const PLANNER: &str = "strategist";
pub const WORKER: &str = "operator";
pub const REVIEWER: &str = "evaluator";

/// Header id used by workers that predate task tagging.
pub const LEGACY_WORKER_HEADER: &str = "header-operator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Planner,
    Worker,
    Reviewer,
    Other,
}

impl Role {
    pub fn of(agent: &str) -> Self {
        match agent {
            PLANNER => Role::Planner,
            WORKER => Role::Worker,
            REVIEWER => Role::Reviewer,
            _ => Role::Other,
        }
    }

    /// Whether this role's headers carry a task number.
    pub fn is_task_scoped(self) -> bool {
        matches!(self, Role::Worker | Role::Reviewer)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeaderState {
    #[default]
    NoHeader,
    ForTask(Option<u32>),
}

/// What the log looks like at the moment of the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderFacts {
    pub id_exists: bool,
    pub last_item_is_agent: bool,
    pub legacy_exists: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Exists,
    /// Task 1 output continuing directly under this agent's previous items.
    Continuation,
    LegacyHeader,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Insert { id: String, task_box: bool },
    Skip(SkipReason),
}

pub fn header_id(agent: &str, task: Option<u32>) -> String {
    match (Role::of(agent).is_task_scoped(), task) {
        (true, Some(n)) => format!("header-{agent}-task-{n}"),
        _ => format!("header-{agent}"),
    }
}

/// Pure transition for one header request.
pub fn transition(
    agent: &str,
    state: HeaderState,
    task: Option<u32>,
    facts: HeaderFacts,
) -> (HeaderState, Decision) {
    let role = Role::of(agent);
    let task = if role.is_task_scoped() { task } else { None };
    let next = HeaderState::ForTask(task);

    if facts.id_exists {
        return (next, Decision::Skip(SkipReason::Exists));
    }

    if role == Role::Worker && task == Some(1) {
        let moved_past_first = matches!(state, HeaderState::ForTask(Some(m)) if m != 1);
        if facts.last_item_is_agent && !moved_past_first {
            return (next, Decision::Skip(SkipReason::Continuation));
        }
        if facts.legacy_exists {
            return (next, Decision::Skip(SkipReason::LegacyHeader));
        }
    }

    let decision = Decision::Insert {
        id: header_id(agent, task),
        task_box: role == Role::Worker && task.is_some(),
    };
    (next, decision)
}

pub fn header_item(agent: &str, task: Option<u32>) -> CommittedItem {
    let task = if Role::of(agent).is_task_scoped() { task } else { None };
    CommittedItem::with_id(
        header_id(agent, task),
        ItemKind::Header {
            agent: agent.to_string(),
            task,
        },
    )
    .tagged(Some(agent))
}

pub fn task_box_item(agent: &str, number: u32, text: &str) -> CommittedItem {
    CommittedItem::new(ItemKind::TaskBox {
        number,
        text: text.to_string(),
    })
    .tagged(Some(agent))
}

/// Stage a header for `agent` if the rules call for one. A new worker
/// header is followed by its task box from `plan`. Returns whether a header
/// was staged.
pub fn ensure_header(batch: &mut Batch<'_>, agent: &str, task: Option<u32>, plan: &[String]) -> bool {
    let id = header_id(agent, task);
    let facts = HeaderFacts {
        id_exists: batch.contains(&id),
        last_item_is_agent: batch.last().and_then(|i| i.agent.as_deref()) == Some(agent),
        legacy_exists: batch.contains(LEGACY_WORKER_HEADER),
    };
    let (next, decision) = transition(agent, batch.header_state(agent), task, facts);
    batch.set_header_state(agent, next);

    match decision {
        Decision::Skip(reason) => {
            log::trace!("Header for {agent} (task {task:?}) skipped: {reason:?}");
            false
        }
        Decision::Insert { task_box, .. } => {
            batch.push(header_item(agent, task));
            if task_box
                && let Some(n) = task
                && let Some(text) = n.checked_sub(1).and_then(|i| plan.get(i as usize))
            {
                batch.push(task_box_item(agent, n, text));
            }
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::ItemLog;

    fn plan() -> Vec<String> {
        vec!["Converge cutoff".into(), "Relax cell".into()]
    }

    fn ensure(log: &mut ItemLog, agent: &str, task: Option<u32>) -> bool {
        let mut batch = log.batch();
        let inserted = ensure_header(&mut batch, agent, task, &plan());
        log.commit(batch.finish());
        inserted
    }

    fn header_count(log: &ItemLog) -> usize {
        log.items().iter().filter(|i| i.is_header()).count()
    }

    #[test]
    fn test_header_ids() {
        assert_eq!(header_id("operator", Some(3)), "header-operator-task-3");
        assert_eq!(header_id("operator", None), "header-operator");
        assert_eq!(header_id("evaluator", Some(1)), "header-evaluator-task-1");
        assert_eq!(header_id("evaluator", None), "header-evaluator");
        assert_eq!(header_id("strategist", Some(2)), "header-strategist");
    }

    #[test]
    fn test_worker_header_brings_task_box() {
        let mut log = ItemLog::new();
        assert!(ensure(&mut log, "operator", Some(2)));
        let items = log.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "header-operator-task-2");
        assert_eq!(
            items[1].kind,
            ItemKind::TaskBox {
                number: 2,
                text: "Relax cell".into()
            }
        );
    }

    #[test]
    fn test_task_box_needs_plan_entry() {
        let mut log = ItemLog::new();
        assert!(ensure(&mut log, "operator", Some(7)));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_repeated_requests_are_no_ops() {
        let mut log = ItemLog::new();
        for _ in 0..3 {
            ensure(&mut log, "operator", Some(2));
            ensure(&mut log, "evaluator", Some(2));
            ensure(&mut log, "evaluator", None);
            ensure(&mut log, "strategist", None);
        }
        assert_eq!(header_count(&log), 4);
    }

    #[test]
    fn test_task_one_continuation_is_skipped() {
        let mut log = ItemLog::new();
        let mut batch = log.batch();
        batch.push(CommittedItem::log("warming up").tagged(Some("operator")));
        log.commit(batch.finish());

        assert!(!ensure(&mut log, "operator", Some(1)));
        assert_eq!(header_count(&log), 0);
    }

    #[test]
    fn test_continuation_does_not_apply_after_later_task() {
        let mut log = ItemLog::new();
        ensure(&mut log, "operator", Some(2));
        let mut batch = log.batch();
        batch.push(CommittedItem::log("still going").tagged(Some("operator")));
        log.commit(batch.finish());

        // Renumbered back to task 1: the header must still appear.
        assert!(ensure(&mut log, "operator", Some(1)));
        assert!(log.contains("header-operator-task-1"));
    }

    #[test]
    fn test_legacy_header_covers_task_one() {
        let mut log = ItemLog::new();
        ensure(&mut log, "operator", None);
        ensure(&mut log, "strategist", None);
        assert!(!ensure(&mut log, "operator", Some(1)));
        assert!(ensure(&mut log, "operator", Some(2)));
    }

    #[test]
    fn test_transition_is_pure() {
        let facts = HeaderFacts {
            last_item_is_agent: true,
            ..Default::default()
        };
        let (state, decision) = transition("operator", HeaderState::ForTask(Some(3)), Some(1), facts);
        assert_eq!(state, HeaderState::ForTask(Some(1)));
        assert_eq!(
            decision,
            Decision::Insert {
                id: "header-operator-task-1".into(),
                task_box: true
            }
        );

        let (_, decision) = transition("operator", HeaderState::NoHeader, Some(1), facts);
        assert_eq!(decision, Decision::Skip(SkipReason::Continuation));
    }
}
