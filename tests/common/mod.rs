//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cnode_state_machine::peers::{
    HealthProber, NodeRecord, NodeSelector, PeerError, PeerFuture, Registry, ReplicaClient,
    ReplicaSetWriter, SyncTransport,
};
use cnode_state_machine::config::StateMachineConfig;
use cnode_state_machine::queue::{Job, JobName, QueueObserver};
use cnode_state_machine::service::{Collaborators, StateMachineManager};
use serde_json::Value;
use cnode_state_machine::state_monitoring::{UserInfo, UserReplicaRecord};
use cnode_state_machine::state_reconciliation::{ReplicaSetUpdaters, SyncRequestParameters};

pub const THIS_NODE: &str = "http://cn1.co";

/// Registry whose answer can be swapped between calls
pub struct FakeRegistry {
    answer: Mutex<Result<Vec<NodeRecord>, PeerError>>,
    pub calls: AtomicUsize,
}

impl FakeRegistry {
    pub fn returning(nodes: &[(&str, u64)]) -> Self {
        Self {
            answer: Mutex::new(Ok(records(nodes))),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: Mutex::new(Err(PeerError::Unreachable("registry".into()))),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, nodes: &[(&str, u64)]) {
        *self.answer.lock().unwrap() = Ok(records(nodes));
    }

    pub fn fail(&self) {
        *self.answer.lock().unwrap() = Err(PeerError::Unreachable("registry".into()));
    }
}

fn records(nodes: &[(&str, u64)]) -> Vec<NodeRecord> {
    nodes
        .iter()
        .map(|(endpoint, sp_id)| NodeRecord::new(*endpoint, *sp_id))
        .collect()
}

impl Registry for FakeRegistry {
    fn list_content_node_providers(&self) -> PeerFuture<'_, Vec<NodeRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answer.lock().unwrap().clone();
        Box::pin(async move { answer })
    }
}

/// Primary health prober with a fixed answer per endpoint (default healthy)
#[derive(Default)]
pub struct FakeHealth {
    pub unhealthy: Vec<String>,
    pub erroring: Vec<String>,
}

impl HealthProber for FakeHealth {
    fn is_primary_healthy<'a>(&'a self, endpoint: &'a str) -> PeerFuture<'a, bool> {
        Box::pin(async move {
            if self.erroring.iter().any(|e| e == endpoint) {
                return Err(PeerError::Unreachable(endpoint.to_string()));
            }
            Ok(!self.unhealthy.iter().any(|e| e == endpoint))
        })
    }
}

/// Records every sync request; fails those aimed at `failing`
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<SyncRequestParameters>>,
    pub failing: Vec<String>,
    pub delay: Option<Duration>,
}

impl SyncTransport for RecordingTransport {
    fn send<'a>(&'a self, request: &'a SyncRequestParameters) -> PeerFuture<'a, ()> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.sent.lock().unwrap().push(request.clone());
            let target = request.base_url.clone().unwrap_or_default();
            if self.failing.contains(&target) {
                return Err(PeerError::Rejected(format!("{} refused sync", target)));
            }
            Ok(())
        })
    }
}

/// Healthy nodes plus per-node clocks; unknown nodes report -1
#[derive(Default)]
pub struct FakeNodes {
    pub healthy: Vec<String>,
    pub clocks: HashMap<String, i64>,
}

impl NodeSelector for FakeNodes {
    fn healthy_nodes(&self) -> PeerFuture<'_, Vec<String>> {
        Box::pin(async move { Ok(self.healthy.clone()) })
    }
}

impl ReplicaClient for FakeNodes {
    fn clock_value<'a>(&'a self, endpoint: &'a str, _wallet: &'a str) -> PeerFuture<'a, i64> {
        Box::pin(async move { Ok(self.clocks.get(endpoint).copied().unwrap_or(-1)) })
    }
}

/// Records replica-set writes
#[derive(Default)]
pub struct RecordingWriter {
    pub writes: Mutex<Vec<(u64, u64, Vec<u64>)>>,
}

impl ReplicaSetWriter for RecordingWriter {
    fn update_replica_set<'a>(
        &'a self,
        user_id: u64,
        primary_sp_id: u64,
        secondary_sp_ids: &'a [u64],
    ) -> PeerFuture<'a, ()> {
        Box::pin(async move {
            self.writes
                .lock()
                .unwrap()
                .push((user_id, primary_sp_id, secondary_sp_ids.to_vec()));
            Ok(())
        })
    }
}

/// Handles on every fake, kept by the test after the collaborators move
pub struct Fakes {
    pub registry: Arc<FakeRegistry>,
    pub health: Arc<FakeHealth>,
    pub transport: Arc<RecordingTransport>,
    pub nodes: Arc<FakeNodes>,
    pub writer: Arc<RecordingWriter>,
    pub finished: Arc<FinishedJobs>,
}

/// Keeps every completed or failed job, in finishing order
#[derive(Default)]
pub struct FinishedJobs {
    jobs: Mutex<Vec<Job>>,
}

impl FinishedJobs {
    pub fn named(&self, name: JobName) -> Vec<Job> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|job| job.job_name == name)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

impl QueueObserver for FinishedJobs {
    fn on_completed(&self, job: &Job, _result: &Value) {
        self.jobs.lock().unwrap().push(job.clone());
    }

    fn on_failed(&self, job: &Job, _error: &str) {
        self.jobs.lock().unwrap().push(job.clone());
    }
}

impl Fakes {
    pub fn new(registry: FakeRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            health: Arc::new(FakeHealth::default()),
            transport: Arc::new(RecordingTransport::default()),
            nodes: Arc::new(FakeNodes::default()),
            writer: Arc::new(RecordingWriter::default()),
            finished: Arc::new(FinishedJobs::default()),
        }
    }

    /// Boot a state machine on these fakes, recording finished jobs
    pub async fn boot(&self, config: StateMachineConfig) -> StateMachineManager {
        let finished: Arc<dyn QueueObserver> = self.finished.clone();
        StateMachineManager::init_with_observers(config, self.collaborators(), vec![finished])
            .await
            .unwrap()
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            registry: self.registry.clone(),
            health: self.health.clone(),
            transport: self.transport.clone(),
            updaters: ReplicaSetUpdaters {
                selector: self.nodes.clone(),
                replicas: self.nodes.clone(),
                writer: self.writer.clone(),
            },
        }
    }
}

pub fn user(
    wallet: &str,
    user_id: u64,
    primary: (&str, u64),
    secondary1: (&str, u64),
    secondary2: (&str, u64),
) -> UserReplicaRecord {
    UserReplicaRecord {
        wallet: wallet.into(),
        user_id,
        primary: primary.0.into(),
        secondary1: secondary1.0.into(),
        secondary2: secondary2.0.into(),
        primary_sp_id: primary.1,
        secondary1_sp_id: secondary1.1,
        secondary2_sp_id: secondary2.1,
    }
}

pub fn info(clock: i64) -> UserInfo {
    UserInfo {
        clock,
        files_hash: Some(format!("hash-{}", clock)),
    }
}
