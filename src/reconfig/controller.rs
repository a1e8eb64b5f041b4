//! Reconfig mode controller

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use serde::Serialize;

use super::mode::{enabled_modes_for, ReconfigMode};
use crate::observability::{log_event_with_fields, Event};

/// The highest enabled mode together with its derived enabled set.
///
/// Always replaced as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconfigModeState {
    pub highest_enabled_reconfig_mode: ReconfigMode,
    pub enabled_reconfig_modes: BTreeSet<ReconfigMode>,
}

impl ReconfigModeState {
    pub fn for_highest(highest: ReconfigMode) -> Self {
        Self {
            highest_enabled_reconfig_mode: highest,
            enabled_reconfig_modes: enabled_modes_for(highest),
        }
    }
}

/// Owns the current reconfig mode state.
///
/// `configured` is the mode from configuration (`None` when its key was not
/// recognized). `recompute(Some(mode))` overrides it for one recompute.
pub struct ReconfigModeController {
    configured: Option<ReconfigMode>,
    state: RwLock<Arc<ReconfigModeState>>,
}

impl ReconfigModeController {
    /// Starts disabled until the first `recompute`
    pub fn new(configured: Option<ReconfigMode>) -> Self {
        Self {
            configured,
            state: RwLock::new(Arc::new(ReconfigModeState::for_highest(
                ReconfigMode::ReconfigDisabled,
            ))),
        }
    }

    /// Re-derive the enabled set from `override_mode`, else from configuration
    pub fn recompute(&self, override_mode: Option<ReconfigMode>) -> Arc<ReconfigModeState> {
        let highest = override_mode
            .or(self.configured)
            .unwrap_or(ReconfigMode::ReconfigDisabled);
        let next = Arc::new(ReconfigModeState::for_highest(highest));

        match self.state.write() {
            Ok(mut guard) => *guard = next.clone(),
            Err(poisoned) => *poisoned.into_inner() = next.clone(),
        }

        let enabled = next
            .enabled_reconfig_modes
            .iter()
            .map(|m| m.key())
            .collect::<Vec<_>>()
            .join(",");
        log_event_with_fields(
            Event::ReconfigModesRecomputed,
            &[("highest", highest.key()), ("enabled", enabled.as_str())],
        );
        next
    }

    /// Current state snapshot
    pub fn snapshot(&self) -> Arc<ReconfigModeState> {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Whether a reconfig of `mode` may be issued. Never true for disabled.
    pub fn is_enabled(&self, mode: ReconfigMode) -> bool {
        mode != ReconfigMode::ReconfigDisabled
            && self.snapshot().enabled_reconfig_modes.contains(&mode)
    }
}
