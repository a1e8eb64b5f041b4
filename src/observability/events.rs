//! Lifecycle events of the state machine service
//!
//! Events are explicit and typed. Job-level events are emitted by the
//! queue observers, not from here.

use std::fmt;

/// Observable lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Boot & lifecycle
    /// Service startup begins
    BootStart,
    /// Service startup complete, queues processing
    BootComplete,
    /// Shutdown initiated
    ShutdownStart,
    /// Shutdown complete
    ShutdownComplete,

    // Configuration
    /// Configuration loaded and validated
    ConfigLoaded,

    // Queues
    /// All jobs of a queue discarded at startup
    QueueObliterated,

    // Service-provider map
    /// Map replaced by a fresh registry snapshot
    SpMapRefreshed,
    /// Registry returned nothing usable; previous map retained
    SpMapRetained,
    /// Map could not be initialized (reconfiguration disabled)
    SpMapInitFailed,

    // Reconfiguration
    /// Enabled reconfig modes recomputed
    ReconfigModesRecomputed,
}

impl Event {
    /// Returns the event name as emitted in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "STATE_MACHINE_BOOT_START",
            Event::BootComplete => "STATE_MACHINE_BOOT_COMPLETE",
            Event::ShutdownStart => "STATE_MACHINE_SHUTDOWN_START",
            Event::ShutdownComplete => "STATE_MACHINE_SHUTDOWN_COMPLETE",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::QueueObliterated => "QUEUE_OBLITERATED",
            Event::SpMapRefreshed => "SP_MAP_REFRESHED",
            Event::SpMapRetained => "SP_MAP_RETAINED",
            Event::SpMapInitFailed => "SP_MAP_INIT_FAILED",
            Event::ReconfigModesRecomputed => "RECONFIG_MODES_RECOMPUTED",
        }
    }

    /// Whether this event is logged at error severity.
    ///
    /// A failed map initialization does not stop the process, but it
    /// disables all automatic reconfiguration.
    pub fn is_error(&self) -> bool {
        matches!(self, Event::SpMapInitFailed)
    }

    /// Whether this event is logged at warn severity
    pub fn is_warning(&self) -> bool {
        matches!(self, Event::SpMapRetained)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
