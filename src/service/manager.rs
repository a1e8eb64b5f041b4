//! State machine lifecycle

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::collaborators::Collaborators;
use super::errors::ServiceResult;
use crate::config::StateMachineConfig;
use crate::interfacer::QueueInterfacer;
use crate::observability::{log_event, log_event_with_fields, Event, MetricsRegistry};
use crate::peers::Registry;
use crate::queue::{
    ActivityTracker, JobQueue, JobStore, LoggingObserver, MetricsObserver, QueueName, QueueObserver,
};
use crate::reconfig::{ReconfigMode, ReconfigModeController, ReconfigModeState};
use crate::sp_map::SpIdMapManager;
use crate::state_monitoring::{self, MonitoringDeps, MonitoringSettings};
use crate::state_reconciliation::{self, ReconciliationDeps};

/// Owns the map, the mode controller, both queues and the background tasks.
///
/// Processors only get read-only handles; all queue access goes through
/// the [`QueueInterfacer`].
pub struct StateMachineManager {
    config: StateMachineConfig,
    registry: Arc<dyn Registry>,
    sp_map: Arc<SpIdMapManager>,
    modes: Arc<ReconfigModeController>,
    metrics: Arc<MetricsRegistry>,
    store: Arc<JobStore>,
    activity: Arc<ActivityTracker>,
    interfacer: Arc<QueueInterfacer>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl StateMachineManager {
    /// Boot sequence:
    ///
    /// 1. Open the job store and obliterate both queues
    /// 2. Refresh the service-provider map and recompute reconfig modes
    /// 3. Build both queues with their processors and observers
    /// 4. Spawn the intent dispatch loop and, if configured, periodic refresh
    ///
    /// Must run inside a tokio runtime.
    pub async fn init(config: StateMachineConfig, collaborators: Collaborators) -> ServiceResult<Self> {
        Self::init_with_observers(config, collaborators, Vec::new()).await
    }

    /// [`init`](Self::init) with extra observers on both queues. Finished
    /// jobs leave the store, so observers are where results are read.
    pub async fn init_with_observers(
        config: StateMachineConfig,
        collaborators: Collaborators,
        observers: Vec<Arc<dyn QueueObserver>>,
    ) -> ServiceResult<Self> {
        log_event(Event::BootStart);
        config.validate()?;

        let store = Arc::new(match &config.job_store.path {
            Some(path) => JobStore::open(path)?,
            None => JobStore::in_memory(),
        });
        for queue in [QueueName::StateMonitoring, QueueName::StateReconciliation] {
            let removed = store.obliterate(queue)?.to_string();
            log_event_with_fields(
                Event::QueueObliterated,
                &[("queue", queue.as_str()), ("jobs", removed.as_str())],
            );
        }

        let metrics = Arc::new(MetricsRegistry::new());
        let sp_map = Arc::new(SpIdMapManager::new());
        let modes = Arc::new(ReconfigModeController::new(config.highest_reconfig_mode()));
        refresh_and_recompute(&sp_map, &modes, &metrics, collaborators.registry.as_ref()).await;

        let Collaborators {
            registry,
            health,
            transport,
            updaters,
        } = collaborators;

        let settings = MonitoringSettings {
            this_node_endpoint: config.this_content_node_endpoint.clone(),
            thresholds: config.sync_thresholds(),
        };
        let activity = Arc::new(ActivityTracker::new());
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let logging: Arc<dyn QueueObserver> = Arc::new(LoggingObserver);
        let counting: Arc<dyn QueueObserver> = Arc::new(MetricsObserver::new(metrics.clone()));
        let observers = [vec![logging, counting], observers].concat();

        let mut monitoring = state_monitoring::register_processors(
            JobQueue::builder(QueueName::StateMonitoring, store.clone()),
            &config.queues,
            MonitoringDeps {
                settings: settings.clone(),
                sp_map: sp_map.clone(),
                health,
            },
        )
        .intents(intent_tx.clone())
        .activity(activity.clone());

        let mut reconciliation = state_reconciliation::register_processors(
            JobQueue::builder(QueueName::StateReconciliation, store.clone()),
            &config.queues,
            ReconciliationDeps {
                settings,
                sp_map: sp_map.clone(),
                modes: modes.clone(),
                transport,
                updaters,
                metrics: metrics.clone(),
                node_whitelist: config.reconfig_node_whitelist.clone(),
            },
        )
        .intents(intent_tx)
        .activity(activity.clone());

        for observer in observers {
            monitoring = monitoring.observer(observer.clone());
            reconciliation = reconciliation.observer(observer);
        }
        let monitoring = monitoring.build()?;
        let reconciliation = reconciliation.build()?;

        let interfacer = Arc::new(QueueInterfacer::new(
            Arc::new(monitoring),
            Arc::new(reconciliation),
            activity.clone(),
            metrics.clone(),
        ));

        let mut tasks = vec![tokio::spawn(interfacer.clone().run_dispatch(intent_rx))];
        if let Some(secs) = config.sp_map_refresh_interval_secs {
            tasks.push(tokio::spawn(refresh_loop(
                Duration::from_secs(secs),
                sp_map.clone(),
                modes.clone(),
                metrics.clone(),
                registry.clone(),
            )));
        }

        let highest = modes.snapshot().highest_enabled_reconfig_mode;
        let map_size = sp_map.get().len().to_string();
        log_event_with_fields(
            Event::BootComplete,
            &[
                ("endpoint", config.this_content_node_endpoint.as_str()),
                ("highest_reconfig_mode", highest.key()),
                ("sp_map_size", map_size.as_str()),
            ],
        );

        Ok(Self {
            config,
            registry,
            sp_map,
            modes,
            metrics,
            store,
            activity,
            interfacer,
            tasks: Mutex::new(tasks),
        })
    }

    pub fn config(&self) -> &StateMachineConfig {
        &self.config
    }

    pub fn interfacer(&self) -> &Arc<QueueInterfacer> {
        &self.interfacer
    }

    pub fn sp_map(&self) -> &Arc<SpIdMapManager> {
        &self.sp_map
    }

    pub fn modes(&self) -> &Arc<ReconfigModeController> {
        &self.modes
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Refresh the map now and recompute modes from the outcome
    pub async fn refresh_sp_map(&self) -> Arc<ReconfigModeState> {
        refresh_and_recompute(&self.sp_map, &self.modes, &self.metrics, self.registry.as_ref()).await
    }

    /// Wait until no job is queued or running and no follow-up is in transit.
    /// Returns `false` on timeout.
    pub async fn wait_until_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.activity.wait_idle())
            .await
            .is_ok()
    }

    /// Stop the dispatch and refresh tasks and both queues' lanes
    pub fn shutdown(&self) {
        log_event(Event::ShutdownStart);
        let mut tasks = match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for task in tasks.drain(..) {
            task.abort();
        }
        self.interfacer.close();
        let outstanding = self.activity.outstanding().to_string();
        log_event_with_fields(Event::ShutdownComplete, &[("outstanding", outstanding.as_str())]);
    }
}

/// One refresh attempt followed by a mode recompute: from configuration on
/// success, forced to disabled when the map could not be initialized
async fn refresh_and_recompute(
    sp_map: &SpIdMapManager,
    modes: &ReconfigModeController,
    metrics: &MetricsRegistry,
    registry: &dyn Registry,
) -> Arc<ReconfigModeState> {
    match sp_map.refresh(registry).await {
        Ok(_) => {
            metrics.increment_sp_map_refreshes();
            modes.recompute(None)
        }
        Err(_) => {
            metrics.increment_sp_map_refresh_failures();
            modes.recompute(Some(ReconfigMode::ReconfigDisabled))
        }
    }
}

async fn refresh_loop(
    period: Duration,
    sp_map: Arc<SpIdMapManager>,
    modes: Arc<ReconfigModeController>,
    metrics: Arc<MetricsRegistry>,
    registry: Arc<dyn Registry>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // first tick fires immediately; boot already refreshed
    ticker.tick().await;
    loop {
        ticker.tick().await;
        refresh_and_recompute(&sp_map, &modes, &metrics, registry.as_ref()).await;
    }
}
