//! cnode-state-machine - replica-set monitoring and reconciliation for
//! Content Nodes
//!
//! Each node keeps an endpoint to service-provider id map, decides which
//! of its users' secondaries need a sync and which replica sets need to be
//! reconfigured, and drives both through two background job queues.

pub mod cli;
pub mod config;
pub mod interfacer;
pub mod observability;
pub mod peers;
pub mod queue;
pub mod reconfig;
pub mod service;
pub mod sp_map;
pub mod state_monitoring;
pub mod state_reconciliation;
