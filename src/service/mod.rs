//! Service wiring
//!
//! [`StateMachineManager`] boots the state machine from a
//! [`StateMachineConfig`](crate::config::StateMachineConfig) and a set of
//! [`Collaborators`], and owns everything it starts.

mod collaborators;
mod errors;
mod manager;

pub use collaborators::Collaborators;
pub use errors::{ServiceError, ServiceResult};
pub use manager::StateMachineManager;
