//! Test helpers for running several role instances against one store
//!
//! Every simulated process gets its own `ProcessHandle` on a fake host and is
//! alive until the test kills it through `FakeProbe`.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use coordinator::core::{DutyRegistry, FleetContext, RouterLoop, RouterOutcome, WorkerLoop};
use coordinator::services::NoopLauncher;
use coordinator::{Coordinator, CoordinatorError, CoordinatorResult, FleetLauncher, LivenessProbe, MessageHooks, Settings};
use shared::{DutyId, ProcessHandle};
use tokio::task::JoinHandle;
use store::MemoryStore;

use super::fixtures::TestFixtures;

/// Liveness probe over an in-test process table
#[derive(Default)]
pub struct FakeProbe {
    alive: Mutex<HashSet<u32>>,
    next_pid: AtomicU32,
}

impl FakeProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            alive: Mutex::new(HashSet::new()),
            next_pid: AtomicU32::new(1000),
        })
    }

    /// Allocate a live process on the test host
    pub fn start_process(&self) -> ProcessHandle {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.alive.lock().unwrap().insert(pid);
        ProcessHandle::new(TestFixtures::HOST, pid)
    }

    /// Simulate a crash
    pub fn kill(&self, handle: &ProcessHandle) {
        self.alive.lock().unwrap().remove(&handle.pid);
    }
}

impl LivenessProbe for FakeProbe {
    fn process_exists(&self, pid: u32) -> CoordinatorResult<bool> {
        Ok(self.alive.lock().unwrap().contains(&pid))
    }
}

/// What the hooks observed, shared between every role instance of a test
#[derive(Default)]
pub struct HookLog {
    source: Mutex<VecDeque<String>>,
    processed: Mutex<Vec<(String, String)>>,
    unrouted: Mutex<Vec<String>>,
}

impl HookLog {
    pub fn remaining(&self) -> usize {
        self.source.lock().unwrap().len()
    }

    /// `(label, message)` in processing order
    pub fn processed(&self) -> Vec<(String, String)> {
        self.processed.lock().unwrap().clone()
    }

    pub fn processed_count(&self) -> usize {
        self.processed.lock().unwrap().len()
    }

    /// Label of the instance that processed `message`
    pub fn handler_of(&self, message: &str) -> Option<String> {
        self.processed
            .lock()
            .unwrap()
            .iter()
            .find(|(_, m)| m == message)
            .map(|(label, _)| label.clone())
    }

    pub fn unrouted(&self) -> Vec<String> {
        self.unrouted.lock().unwrap().clone()
    }
}

/// Hooks serving a fixed message list
///
/// Affinity key is the first character. Messages starting with `!` fail to
/// process. Processing sleeps for `work_time` so keys stay in flight.
pub struct RecordingHooks {
    log: Arc<HookLog>,
    label: String,
    work_time: Duration,
}

impl RecordingHooks {
    pub fn new(messages: Vec<String>) -> Self {
        let log = HookLog {
            source: Mutex::new(messages.into()),
            ..HookLog::default()
        };
        Self {
            log: Arc::new(log),
            label: "shared".to_string(),
            work_time: Duration::ZERO,
        }
    }

    pub fn with_work_time(mut self, work_time: Duration) -> Self {
        self.work_time = work_time;
        self
    }

    /// Another instance recording into the same log under `label`
    pub fn labelled(&self, label: &str) -> Self {
        Self {
            log: self.log.clone(),
            label: label.to_string(),
            work_time: self.work_time,
        }
    }

    pub fn log(&self) -> Arc<HookLog> {
        self.log.clone()
    }
}

#[async_trait::async_trait]
impl MessageHooks for RecordingHooks {
    async fn next_message(&self) -> CoordinatorResult<Option<String>> {
        Ok(self.log.source.lock().unwrap().pop_front())
    }

    fn affinity_key(&self, message: &str) -> Option<String> {
        message.chars().next().map(String::from)
    }

    async fn process(&self, message: &str) -> CoordinatorResult<()> {
        if !self.work_time.is_zero() {
            tokio::time::sleep(self.work_time).await;
        }
        self.log
            .processed
            .lock()
            .unwrap()
            .push((self.label.clone(), message.to_string()));
        if message.starts_with('!') {
            return Err(CoordinatorError::hook(format!("refused {message}")));
        }
        Ok(())
    }

    async fn unrouted(&self, message: String) {
        self.log.unrouted.lock().unwrap().push(message);
    }
}

/// One store, one probe, many simulated processes
pub struct TestFleet {
    pub store: Arc<MemoryStore>,
    pub probe: Arc<FakeProbe>,
    pub settings: Arc<Settings>,
}

pub type TestCoordinator = Coordinator<MemoryStore, RecordingHooks>;

impl TestFleet {
    pub fn new(max_workers: u8) -> Self {
        Self::with_settings(TestFixtures::settings(max_workers))
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            probe: FakeProbe::new(),
            settings: Arc::new(settings),
        }
    }

    pub fn ctx(&self) -> FleetContext<MemoryStore> {
        FleetContext::new(self.store.clone(), self.settings.clone())
    }

    /// Registry for a freshly started process
    pub fn registry(&self) -> DutyRegistry<MemoryStore> {
        self.registry_for(self.probe.start_process())
    }

    pub fn registry_for(&self, handle: ProcessHandle) -> DutyRegistry<MemoryStore> {
        let ctx = self.ctx();
        DutyRegistry::new(ctx.store.clone(), ctx.keys.clone(), self.probe.clone(), handle)
    }

    /// Coordinator for a freshly started process
    pub fn coordinator(&self, hooks: RecordingHooks) -> TestCoordinator {
        self.coordinator_with_launcher(hooks, Arc::new(NoopLauncher))
    }

    pub fn coordinator_with_launcher(&self, hooks: RecordingHooks, launcher: Arc<dyn FleetLauncher>) -> TestCoordinator {
        Coordinator::new(
            self.ctx(),
            Arc::new(hooks),
            self.probe.clone(),
            launcher,
            self.probe.start_process(),
        )
    }

    /// Run a worker loop as its own simulated process, releasing on exit
    pub fn spawn_worker(&self, hooks: &RecordingHooks, index: u8) -> JoinHandle<CoordinatorResult<u64>> {
        let ctx = self.ctx();
        let duty = DutyId::Worker(index);
        let hooks = hooks.labelled(&duty.to_string());
        let mut registry = self.registry();
        tokio::spawn(async move {
            let result = match WorkerLoop::new(&ctx, &hooks, duty) {
                Ok(worker) => worker.run(&mut registry).await,
                Err(e) => Err(e),
            };
            registry.release().await?;
            result
        })
    }

    /// Run the router loop as its own simulated process, releasing on exit
    pub fn spawn_router(&self, hooks: &RecordingHooks) -> JoinHandle<CoordinatorResult<RouterOutcome>> {
        let ctx = self.ctx();
        let hooks = hooks.labelled("router");
        let mut registry = self.registry();
        tokio::spawn(async move {
            let result = RouterLoop::new(&ctx, &hooks).run(&mut registry).await;
            registry.release().await?;
            result
        })
    }
}

/// Poll `check` until it holds, panicking after `TestFixtures::PATIENCE`
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + TestFixtures::PATIENCE;
    while !check().await {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
