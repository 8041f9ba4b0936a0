use crate::models::bug::{BugStatus, StatusAction};

/// Whether the workflow allows moving a bug from `from` to `to`.
///
/// Staying put is always allowed so full-record updates that repeat the
/// current status pass. The three edges are:
/// - open -> in-progress (start progress)
/// - in-progress -> resolved (mark resolved)
/// - resolved -> open (reopen)
pub fn can_transition(from: BugStatus, to: BugStatus) -> bool {
    use BugStatus::*;

    from == to
        || matches!(
            (from, to),
            (Open, InProgress) | (InProgress, Resolved) | (Resolved, Open)
        )
}

/// Transition rules plus the configurable `open -> resolved` shortcut.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Workflow {
    pub allow_direct_resolve: bool,
}

impl Workflow {
    pub fn permits(&self, from: BugStatus, to: BugStatus) -> bool {
        can_transition(from, to)
            || (self.allow_direct_resolve && from == BugStatus::Open && to == BugStatus::Resolved)
    }
}

impl StatusAction {
    /// The state this action starts from.
    pub fn source(self) -> BugStatus {
        match self {
            Self::StartProgress => BugStatus::Open,
            Self::Resolve => BugStatus::InProgress,
            Self::Reopen => BugStatus::Resolved,
        }
    }

    pub fn target(self) -> BugStatus {
        match self {
            Self::StartProgress => BugStatus::InProgress,
            Self::Resolve => BugStatus::Resolved,
            Self::Reopen => BugStatus::Open,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::StartProgress => "start progress",
            Self::Resolve => "mark resolved",
            Self::Reopen => "reopen",
        }
    }

    /// Apply the action to `current`, or `None` when it does not start there.
    pub fn apply(self, current: BugStatus) -> Option<BugStatus> {
        (current == self.source()).then(|| self.target())
    }

    /// Actions an operator may take from `status`.
    pub fn available(status: BugStatus) -> Vec<StatusAction> {
        [Self::StartProgress, Self::Resolve, Self::Reopen]
            .into_iter()
            .filter(|action| action.source() == status)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bug::BugStatus::*;

    #[test]
    fn workflow_edges_and_self_loops_are_allowed() {
        assert!(can_transition(Open, InProgress));
        assert!(can_transition(InProgress, Resolved));
        assert!(can_transition(Resolved, Open));
        for status in BugStatus::ALL {
            assert!(can_transition(status, status));
        }
    }

    #[test]
    fn jumps_are_rejected_by_default() {
        assert!(!can_transition(Open, Resolved));
        assert!(!can_transition(InProgress, Open));
        assert!(!can_transition(Resolved, InProgress));
        assert!(!Workflow::default().permits(Open, Resolved));
    }

    #[test]
    fn direct_resolve_is_opt_in() {
        let workflow = Workflow { allow_direct_resolve: true };
        assert!(workflow.permits(Open, Resolved));
        assert!(!workflow.permits(Resolved, InProgress));
    }

    #[test]
    fn every_action_is_a_legal_edge() {
        for action in [StatusAction::StartProgress, StatusAction::Resolve, StatusAction::Reopen] {
            assert!(can_transition(action.source(), action.target()));
            assert_eq!(action.apply(action.source()), Some(action.target()));
        }
        assert_eq!(StatusAction::Resolve.apply(Open), None);
    }

    #[test]
    fn one_action_is_offered_per_state() {
        assert_eq!(StatusAction::available(Open), vec![StatusAction::StartProgress]);
        assert_eq!(StatusAction::available(InProgress), vec![StatusAction::Resolve]);
        assert_eq!(StatusAction::available(Resolved), vec![StatusAction::Reopen]);
    }
}
