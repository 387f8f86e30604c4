//! Two-stage cancel and exit gestures.
//!
//! Destructive keys need a second press within [`ARM_WINDOW`]. The first
//! press only arms a warning; [`GestureState::tick`] disarms it once the
//! window passes.

use std::time::{Duration, Instant};

pub const ARM_WINDOW: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    /// Esc while a run is active.
    Cancel,
    /// Ctrl+C / Ctrl+D while idle.
    Exit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GestureState {
    #[default]
    Idle,
    Armed { kind: GestureKind, until: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    Armed(GestureKind),
    Interrupt,
    Exit,
    /// Key has no effect in the current state; carries a hint for the user.
    Ignored(&'static str),
}

impl GestureState {
    fn armed(&self, kind: GestureKind, now: Instant) -> bool {
        matches!(*self, GestureState::Armed { kind: k, until } if k == kind && now < until)
    }

    fn arm(&mut self, kind: GestureKind, now: Instant) -> GestureOutcome {
        *self = GestureState::Armed {
            kind,
            until: now + ARM_WINDOW,
        };
        GestureOutcome::Armed(kind)
    }

    pub fn press_cancel(&mut self, busy: bool, now: Instant) -> GestureOutcome {
        if !busy {
            return GestureOutcome::Ignored("Nothing to interrupt");
        }
        if self.armed(GestureKind::Cancel, now) {
            *self = GestureState::Idle;
            return GestureOutcome::Interrupt;
        }
        self.arm(GestureKind::Cancel, now)
    }

    pub fn press_exit(&mut self, busy: bool, now: Instant) -> GestureOutcome {
        if busy {
            return GestureOutcome::Ignored("Run in progress. Press Esc twice to interrupt it first");
        }
        if self.armed(GestureKind::Exit, now) {
            *self = GestureState::Idle;
            return GestureOutcome::Exit;
        }
        self.arm(GestureKind::Exit, now)
    }

    /// Disarm an expired window. Returns true if the state changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match *self {
            GestureState::Armed { until, .. } if now >= until => {
                *self = GestureState::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        *self = GestureState::Idle;
    }

    /// Warning to show while armed.
    pub fn warning(&self) -> Option<&'static str> {
        match self {
            GestureState::Armed {
                kind: GestureKind::Cancel,
                ..
            } => Some("Press Esc again to interrupt the run"),
            GestureState::Armed {
                kind: GestureKind::Exit,
                ..
            } => Some("Press Ctrl+C again to exit"),
            GestureState::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_escape_interrupts() {
        let now = Instant::now();
        let mut gesture = GestureState::default();
        assert_eq!(
            gesture.press_cancel(true, now),
            GestureOutcome::Armed(GestureKind::Cancel)
        );
        assert!(gesture.warning().is_some());
        assert_eq!(
            gesture.press_cancel(true, now + Duration::from_secs(1)),
            GestureOutcome::Interrupt
        );
        assert_eq!(gesture, GestureState::Idle);
    }

    #[test]
    fn test_armed_window_expires() {
        let now = Instant::now();
        let mut gesture = GestureState::default();
        gesture.press_cancel(true, now);
        assert!(!gesture.tick(now + Duration::from_secs(2)));
        assert!(gesture.tick(now + ARM_WINDOW));
        assert_eq!(gesture.warning(), None);

        // A late second press re-arms instead of interrupting.
        let late = now + Duration::from_secs(4);
        assert_eq!(
            gesture.press_cancel(true, late),
            GestureOutcome::Armed(GestureKind::Cancel)
        );
    }

    #[test]
    fn test_late_press_without_tick_rearms() {
        let now = Instant::now();
        let mut gesture = GestureState::default();
        gesture.press_cancel(true, now);
        assert_eq!(
            gesture.press_cancel(true, now + Duration::from_secs(5)),
            GestureOutcome::Armed(GestureKind::Cancel)
        );
    }

    #[test]
    fn test_exit_only_while_idle() {
        let now = Instant::now();
        let mut gesture = GestureState::default();
        assert!(matches!(gesture.press_exit(true, now), GestureOutcome::Ignored(_)));
        assert_eq!(gesture, GestureState::Idle);

        assert_eq!(
            gesture.press_exit(false, now),
            GestureOutcome::Armed(GestureKind::Exit)
        );
        assert_eq!(gesture.press_exit(false, now), GestureOutcome::Exit);
    }

    #[test]
    fn test_escape_when_idle_is_ignored() {
        let mut gesture = GestureState::default();
        assert!(matches!(
            gesture.press_cancel(false, Instant::now()),
            GestureOutcome::Ignored(_)
        ));
    }

    #[test]
    fn test_cancel_arm_does_not_confirm_exit() {
        let now = Instant::now();
        let mut gesture = GestureState::default();
        gesture.press_cancel(true, now);
        assert_eq!(
            gesture.press_exit(false, now),
            GestureOutcome::Armed(GestureKind::Exit)
        );
    }
}
