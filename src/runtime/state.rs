use serde::{Deserialize, Serialize};

use super::types::FlowEventKind;

/// 运行状态
///
/// `NotStarted -> InProgress -> {Completed | Failed}`, with `Interrupted`
/// entered on wait/stream events and left on the next ordinary event.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowRunStatus {
    #[default]
    NotStarted,
    InProgress,
    Interrupted,
    Completed,
    Failed,
}

impl FlowRunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowRunStatus::Completed | FlowRunStatus::Failed)
    }

    /// Status after applying an event of `kind`. Terminal states never change.
    pub fn next(self, kind: FlowEventKind) -> FlowRunStatus {
        if self.is_terminal() {
            return self;
        }
        match kind {
            FlowEventKind::OnFlowEnd => FlowRunStatus::Completed,
            FlowEventKind::OnFlowError => FlowRunStatus::Failed,
            FlowEventKind::Unknown => self,
            kind if kind.is_interrupting() => FlowRunStatus::Interrupted,
            _ => FlowRunStatus::InProgress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_through_interruptions() {
        let status = FlowRunStatus::InProgress
            .next(FlowEventKind::OnTaskStart)
            .next(FlowEventKind::OnTaskWait);
        assert_eq!(status, FlowRunStatus::Interrupted);
        let status = status.next(FlowEventKind::OnTaskEnd);
        assert_eq!(status, FlowRunStatus::InProgress);
        assert_eq!(status.next(FlowEventKind::OnFlowEnd), FlowRunStatus::Completed);
    }

    #[test]
    fn terminal_states_are_sticky() {
        let failed = FlowRunStatus::InProgress.next(FlowEventKind::OnFlowError);
        assert_eq!(failed, FlowRunStatus::Failed);
        assert_eq!(failed.next(FlowEventKind::OnFlowEnd), FlowRunStatus::Failed);
        assert_eq!(
            FlowRunStatus::Completed.next(FlowEventKind::OnTaskStart),
            FlowRunStatus::Completed
        );
    }

    #[test]
    fn unknown_events_keep_status() {
        assert_eq!(
            FlowRunStatus::Interrupted.next(FlowEventKind::Unknown),
            FlowRunStatus::Interrupted
        );
    }
}
