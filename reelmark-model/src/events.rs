use crate::ids::UnitId;
use crate::progress::ProgressRecord;

/// Where a cache mutation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Origin {
    /// Produced by this process (player sample, toggle, clear).
    Local,
    /// Arrived from the remote store during reconciliation.
    Remote,
}

/// Change notification emitted for every cache mutation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum ProgressEvent {
    Updated {
        record: ProgressRecord,
        origin: Origin,
    },
    Deleted {
        unit_id: UnitId,
        origin: Origin,
    },
    Cleared {
        origin: Origin,
    },
}

impl ProgressEvent {
    pub fn origin(&self) -> Origin {
        match self {
            ProgressEvent::Updated { origin, .. }
            | ProgressEvent::Deleted { origin, .. }
            | ProgressEvent::Cleared { origin } => *origin,
        }
    }

    /// Unit the event is about; `None` for clear-all.
    pub fn unit_id(&self) -> Option<&UnitId> {
        match self {
            ProgressEvent::Updated { record, .. } => Some(&record.unit_id),
            ProgressEvent::Deleted { unit_id, .. } => Some(unit_id),
            ProgressEvent::Cleared { .. } => None,
        }
    }
}
