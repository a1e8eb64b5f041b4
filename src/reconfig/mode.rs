//! Ranked reconfiguration modes

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reconfiguration modes, ordered by rank.
///
/// Enabling a mode enables every mode ranked below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconfigMode {
    ReconfigDisabled,
    OneSecondary,
    MultipleSecondaries,
    PrimaryAndOrSecondaries,
}

impl ReconfigMode {
    /// Every mode in rank order
    pub const ALL: [ReconfigMode; 4] = [
        ReconfigMode::ReconfigDisabled,
        ReconfigMode::OneSecondary,
        ReconfigMode::MultipleSecondaries,
        ReconfigMode::PrimaryAndOrSecondaries,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ReconfigMode::ReconfigDisabled => "RECONFIG_DISABLED",
            ReconfigMode::OneSecondary => "ONE_SECONDARY",
            ReconfigMode::MultipleSecondaries => "MULTIPLE_SECONDARIES",
            ReconfigMode::PrimaryAndOrSecondaries => "PRIMARY_AND_OR_SECONDARIES",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            ReconfigMode::ReconfigDisabled => 1,
            ReconfigMode::OneSecondary => 2,
            ReconfigMode::MultipleSecondaries => 3,
            ReconfigMode::PrimaryAndOrSecondaries => 4,
        }
    }

    pub fn from_key(key: &str) -> Option<ReconfigMode> {
        Self::ALL.iter().copied().find(|mode| mode.key() == key)
    }
}

impl fmt::Display for ReconfigMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Every mode ranked at or below `highest`
pub fn enabled_modes_for(highest: ReconfigMode) -> BTreeSet<ReconfigMode> {
    ReconfigMode::ALL
        .iter()
        .copied()
        .filter(|mode| mode.rank() <= highest.rank())
        .collect()
}
