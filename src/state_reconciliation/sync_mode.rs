//! How a secondary should be brought in line with its primary

use serde::{Deserialize, Serialize};

use crate::state_monitoring::UserInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncMode {
    /// Same clock, same files
    None,
    /// Primary is ahead
    SyncSecondaryFromPrimary,
    /// Same clock with different files, or the secondary is ahead
    MergePrimaryAndSecondary,
}

/// Compare a user's state on the primary against one secondary
pub fn compute_sync_mode(primary: &UserInfo, secondary: &UserInfo) -> SyncMode {
    if primary.clock > secondary.clock {
        SyncMode::SyncSecondaryFromPrimary
    } else if primary.clock < secondary.clock || primary.files_hash != secondary.files_hash {
        SyncMode::MergePrimaryAndSecondary
    } else {
        SyncMode::None
    }
}
