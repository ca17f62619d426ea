use crate::progress::ProgressRecord;

/// Write-back operation waiting to be sent to the remote store.
///
/// The queue holds at most one of these per unit id; a newer action for the
/// same key replaces the older one outright.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "op", rename_all = "snake_case"))]
pub enum PendingOp {
    Upsert { record: ProgressRecord },
    Delete,
}
