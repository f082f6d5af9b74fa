use serde::{Deserialize, Serialize};

use crate::domain::line::{LineId, LineState};
use crate::errors::LineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineOperation {
    Read,
    Edit,
    Delete,
    Duplicate,
    AssignOrder,
}

/// Draft lines are freely editable; ordered lines only allow reads and
/// duplication.
pub struct LineLifecycle;

impl LineLifecycle {
    pub fn can_mutate(state: LineState) -> bool {
        state == LineState::Draft
    }

    pub fn can_delete(state: LineState) -> bool {
        Self::can_mutate(state)
    }

    pub fn permits(state: LineState, operation: LineOperation) -> bool {
        match operation {
            LineOperation::Read | LineOperation::Duplicate => true,
            LineOperation::Edit | LineOperation::AssignOrder => Self::can_mutate(state),
            LineOperation::Delete => Self::can_delete(state),
        }
    }

    pub fn guard(
        line_id: &LineId,
        state: LineState,
        operation: LineOperation,
    ) -> Result<(), LineError> {
        if Self::permits(state, operation) {
            return Ok(());
        }
        Err(LineError::PolicyViolation { line_id: line_id.clone(), operation })
    }
}
