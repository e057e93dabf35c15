//! The validation engine.
//!
//! Every validation is a task in an arena owned by the [`Validator`]. Tasks
//! never block: when one needs data it either consults the cache through
//! [`RecordSource::lookup`], issues a fetch, or spawns a child task, and then
//! suspends. Fetch results, child verdicts and start requests come back as
//! events on a single queue drained by one tokio task, so a task's handlers
//! run one at a time while other tasks progress.

mod answer;
mod chain;
mod insecure;
mod keychain;
mod lifecycle;
mod negative;
mod request;
mod stats;
mod task;

pub use request::{DenialSource, Outcome, TaskId, ValidationRequest, ValidatorOptions};
pub use stats::{StatsSnapshot, ValidatorStats};

use crate::config::ValidatorConfig;
use crate::dnssec::{ConfiguredPolicy, RingCrypto, TrustAnchorStore};
use crate::error::{ConfigError, ValidatorError};
use crate::traits::{Crypto, FetchError, Lookup, RecordSource, TrustAnchors, ValidationPolicy};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use task::{Completion, Lineage, Step, Task};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

/// The services a validator depends on
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn RecordSource>,
    pub anchors: Arc<dyn TrustAnchors>,
    pub crypto: Arc<dyn Crypto>,
    pub policy: Arc<dyn ValidationPolicy>,
}

impl Collaborators {
    /// Ring-backed crypto and a policy that supports everything
    pub fn new(source: Arc<dyn RecordSource>, anchors: Arc<dyn TrustAnchors>) -> Self {
        Self {
            source,
            anchors,
            crypto: Arc::new(RingCrypto::new()),
            policy: Arc::new(ConfiguredPolicy::new()),
        }
    }

    pub fn with_crypto(mut self, crypto: Arc<dyn Crypto>) -> Self {
        self.crypto = crypto;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn ValidationPolicy>) -> Self {
        self.policy = policy;
        self
    }
}

pub(crate) enum Event {
    Start(TaskId),
    FetchDone {
        task: TaskId,
        seq: u64,
        result: Result<Lookup, FetchError>,
    },
    Deliver {
        completion: Completion,
        outcome: Outcome,
    },
}

pub(crate) struct TaskEntry {
    pub lineage: Lineage,
    pub task: Mutex<Task>,
}

pub(crate) struct Engine {
    pub config: ValidatorConfig,
    pub source: Arc<dyn RecordSource>,
    pub anchors: Arc<dyn TrustAnchors>,
    pub crypto: Arc<dyn Crypto>,
    pub policy: Arc<dyn ValidationPolicy>,
    tasks: DashMap<TaskId, Arc<TaskEntry>>,
    next_id: AtomicU64,
    next_fetch: AtomicU64,
    events: mpsc::UnboundedSender<Event>,
    pub stats: ValidatorStats,
}

/// Handle to a validation engine. Cheap to clone; all clones share the
/// same task arena and event loop.
#[derive(Clone)]
pub struct Validator {
    engine: Arc<Engine>,
}

impl Validator {
    /// Create a validator and spawn its event loop. Must be called from
    /// within a tokio runtime.
    pub fn new(config: ValidatorConfig, collaborators: Collaborators) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Engine {
            config,
            source: collaborators.source,
            anchors: collaborators.anchors,
            crypto: collaborators.crypto,
            policy: collaborators.policy,
            tasks: DashMap::new(),
            next_id: AtomicU64::new(1),
            next_fetch: AtomicU64::new(1),
            events: tx,
            stats: ValidatorStats::new(),
        });
        tokio::spawn(run_event_loop(Arc::downgrade(&engine), rx));
        Self { engine }
    }

    /// Build anchors, policy and crypto from `config`
    pub fn from_config(
        config: ValidatorConfig,
        source: Arc<dyn RecordSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let anchors = TrustAnchorStore::from_config(&config.trust_anchors, config.include_root_anchors)?;
        let policy = ConfiguredPolicy::from_config(&config)?;
        let collaborators = Collaborators::new(source, Arc::new(anchors)).with_policy(Arc::new(policy));
        Ok(Self::new(config, collaborators))
    }

    /// Register a validation task. Unless the request is deferred it starts
    /// as soon as the event loop gets to it. `done` is called exactly once,
    /// from the event loop, with the final outcome.
    pub fn create<F>(&self, request: ValidationRequest, done: F) -> Result<TaskId, ValidatorError>
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        request.check()?;
        let defer = request.options.defer;
        let id = self
            .engine
            .insert_task(request, None, 0, Completion::Callback(Box::new(done)))?;
        if !defer {
            self.engine.post(Event::Start(id))?;
        }
        Ok(id)
    }

    /// Start a task created with `defer` set
    pub fn start(&self, id: TaskId) -> Result<(), ValidatorError> {
        let entry = self.engine.entry(id).ok_or(ValidatorError::UnknownTask(id.as_u64()))?;
        {
            let mut task = entry.task.lock();
            if !task.flags.deferred {
                return Err(ValidatorError::AlreadyStarted(id.as_u64()));
            }
            task.flags.deferred = false;
        }
        self.engine.post(Event::Start(id))
    }

    /// Cancel a task and whatever it is waiting on. Idempotent; the
    /// completion still fires exactly once.
    pub fn cancel(&self, id: TaskId) {
        self.engine.cancel(id);
    }

    /// Release a task. Its record leaves the arena once it has completed
    /// and nothing it spawned is still outstanding.
    pub fn destroy(&self, id: TaskId) {
        self.engine.destroy(id);
    }

    /// Create, run and destroy a task, waiting for its outcome
    pub async fn validate(&self, request: ValidationRequest) -> Result<Outcome, ValidatorError> {
        let (tx, rx) = oneshot::channel();
        let id = self.create(request, move |outcome| {
            let _ = tx.send(outcome);
        })?;
        let outcome = rx.await.map_err(|_| ValidatorError::Shutdown);
        self.destroy(id);
        outcome
    }

    pub fn stats(&self) -> &ValidatorStats {
        &self.engine.stats
    }

    /// Tasks currently held in the arena, children included
    pub fn active_tasks(&self) -> usize {
        self.engine.tasks.len()
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.engine.config
    }
}

async fn run_event_loop(engine: Weak<Engine>, mut rx: mpsc::UnboundedReceiver<Event>) {
    while let Some(event) = rx.recv().await {
        let Some(engine) = engine.upgrade() else {
            break;
        };
        engine.handle(event);
    }
    debug!("Validator event loop stopped");
}

impl Engine {
    pub(crate) fn entry(&self, id: TaskId) -> Option<Arc<TaskEntry>> {
        self.tasks.get(&id).map(|e| Arc::clone(e.value()))
    }

    pub(crate) fn post(&self, event: Event) -> Result<(), ValidatorError> {
        self.events.send(event).map_err(|_| ValidatorError::Shutdown)
    }

    pub(crate) fn next_fetch_seq(&self) -> u64 {
        self.next_fetch.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn events(&self) -> mpsc::UnboundedSender<Event> {
        self.events.clone()
    }

    /// Allocate a task record and put it in the arena
    pub(crate) fn insert_task(
        &self,
        request: ValidationRequest,
        parent: Option<TaskId>,
        depth: u32,
        completion: Completion,
    ) -> Result<TaskId, ValidatorError> {
        if self.tasks.len() >= self.config.max_tasks {
            warn!(
                "Refusing validation of {}/{}: {} tasks active",
                request.name,
                request.rtype,
                self.tasks.len()
            );
            return Err(ValidatorError::TooManyTasks(self.config.max_tasks));
        }
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let must_be_secure = self.policy.must_be_secure(&request.name);
        let lineage = Lineage::of(&request, parent);
        let task = Task::new(id, request, parent, depth, must_be_secure, completion);
        trace!("{}: created task {} at depth {}", task, id, depth);
        self.tasks.insert(
            id,
            Arc::new(TaskEntry {
                lineage,
                task: Mutex::new(task),
            }),
        );
        self.stats.record_created();
        Ok(id)
    }

    fn handle(&self, event: Event) {
        match event {
            Event::Start(id) => self.run(id, |task, engine| task.start(engine)),
            Event::FetchDone { task, seq, result } => {
                self.run(task, move |t, engine| t.on_fetch_done(engine, seq, result))
            }
            Event::Deliver {
                completion,
                outcome,
            } => match completion {
                Completion::Callback(done) => done(outcome),
                Completion::Parent(parent) => {
                    self.run(parent, move |t, engine| t.on_child_done(engine, outcome))
                }
            },
        }
    }

    /// Run one handler on a task under its lock, then deliver any
    /// completion once the lock is released.
    fn run<F>(&self, id: TaskId, handler: F)
    where
        F: FnOnce(&mut Task, &Engine) -> Step,
    {
        let Some(entry) = self.entry(id) else {
            trace!("Dropping event for unknown task {}", id);
            return;
        };
        let (delivery, removable) = {
            let mut task = entry.task.lock();
            let step = handler(&mut task, self);
            let delivery = task.settle(self, step);
            (delivery, task.is_removable())
        };
        if removable {
            self.tasks.remove(&id);
        }
        if let Some(event) = delivery {
            self.deliver(event);
        }
    }

    fn deliver(&self, event: Event) {
        if self.post(event).is_err() {
            warn!("Validator event queue closed, dropping completion");
        }
    }

    pub(crate) fn cancel(&self, id: TaskId) {
        let Some(entry) = self.entry(id) else {
            return;
        };
        let (delivery, removable) = {
            let mut task = entry.task.lock();
            let delivery = task.cancel(self);
            (delivery, task.is_removable())
        };
        if removable {
            self.tasks.remove(&id);
        }
        if let Some(event) = delivery {
            self.deliver(event);
        }
    }

    pub(crate) fn destroy(&self, id: TaskId) {
        let Some(entry) = self.entry(id) else {
            return;
        };
        let removable = {
            let mut task = entry.task.lock();
            task.flags.shutdown = true;
            task.is_removable()
        };
        if removable {
            trace!("Removing task {}", id);
            self.tasks.remove(&id);
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            debug!("Validator dropped with {} tasks outstanding", self.tasks.len());
        }
    }
}
