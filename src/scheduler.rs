//! Detection scheduling as an explicit, clock-driven state machine.
//!
//! The host owns the event loop. It calls [`DetectionScheduler::poll`] with
//! the current time whenever a timer fires or the document changes, and
//! uses the returned wake-up time to arm its next timer. Each poll registers
//! at most one batch of containers, so returning from `poll` is the yield
//! point between batches.
//!
//! ```text
//! Idle -> WaitingForRenderers -> Scanning -> Idle
//!                 |                 ^        |
//!                 v                 +--------+  (mutation, rescan)
//!         MaxAttemptsExceeded
//! ```

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::dom::{ArenaDom, ArenaNodeId};
use crate::registry::{Candidate, EquationId, EquationRegistry};
use crate::renderer::{Engine, RendererHost, TypesetState, detect_engine};

/// Externally visible scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SchedulerState {
    Idle,
    WaitingForRenderers,
    Scanning,
    /// Initialization failed on every attempt; detection is off.
    MaxAttemptsExceeded,
}

impl SchedulerState {
    pub fn as_str(self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::WaitingForRenderers => "waitingForRenderers",
            SchedulerState::Scanning => "scanning",
            SchedulerState::MaxAttemptsExceeded => "maxAttemptsExceeded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Stopped,
    Settling { until: u64 },
    AwaitingEngine { engine: Engine, deadline: u64 },
    Running,
    Failed,
}

/// Result of one [`DetectionScheduler::poll`].
#[derive(Debug, Default)]
pub struct Tick {
    /// Containers tagged during this poll, in document order.
    pub tagged: Vec<EquationId>,
    /// When the scheduler next needs to run, if at all.
    pub next_wake: Option<u64>,
}

pub struct DetectionScheduler {
    config: SchedulerConfig,
    phase: Phase,
    state: SchedulerState,
    attempts: u32,
    engine: Engine,
    /// Debounce slot: at most one pending mutation scan.
    pending_scan_at: Option<u64>,
    rescans: Vec<u64>,
    seen_generation: u64,
    queue: VecDeque<Vec<Candidate>>,
    queued: HashSet<ArenaNodeId>,
}

impl DetectionScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            phase: Phase::Stopped,
            state: SchedulerState::Idle,
            attempts: 0,
            engine: Engine::None,
            pending_scan_at: None,
            rescans: Vec::new(),
            seen_generation: 0,
            queue: VecDeque::new(),
            queued: HashSet::new(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Engine found at initialization (`None` until then).
    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.phase, Phase::Stopped | Phase::Failed)
    }

    /// Containers discovered but not yet registered.
    pub fn pending(&self) -> usize {
        self.queue.iter().map(Vec::len).sum()
    }

    /// Begin initialization; engine detection runs after the settle delay.
    pub fn start(&mut self, now: u64) {
        self.attempts = 0;
        self.phase = Phase::Settling {
            until: now + self.config.settle_delay_ms,
        };
        self.state = SchedulerState::WaitingForRenderers;
        info!(settle_ms = self.config.settle_delay_ms, "detection scheduled");
    }

    /// Stop everything. Later polls are no-ops.
    pub fn stop(&mut self) {
        self.phase = Phase::Stopped;
        self.state = SchedulerState::Idle;
        self.pending_scan_at = None;
        self.rescans.clear();
        self.queue.clear();
        self.queued.clear();
    }

    /// Request a full scan now, skipping any remaining settle delay.
    pub fn force(&mut self, now: u64, dom: &ArenaDom, registry: &mut EquationRegistry) {
        match self.phase {
            Phase::Running => self.enqueue_scan(dom, registry),
            Phase::Settling { .. } | Phase::AwaitingEngine { .. } => {
                self.phase = Phase::Settling { until: now };
            }
            Phase::Stopped | Phase::Failed => {}
        }
    }

    /// Advance the state machine to `now`.
    pub fn poll(
        &mut self,
        now: u64,
        dom: &mut ArenaDom,
        registry: &mut EquationRegistry,
        host: &dyn RendererHost,
    ) -> Tick {
        match self.phase {
            Phase::Stopped | Phase::Failed => return Tick::default(),
            Phase::Settling { until } if now < until => {
                return Tick {
                    tagged: Vec::new(),
                    next_wake: Some(until),
                };
            }
            Phase::Settling { .. } => self.initialize(now, dom, registry, host),
            Phase::AwaitingEngine { engine, deadline } => {
                self.await_engine(now, engine, deadline, dom, registry, host)
            }
            Phase::Running => {}
        }

        if self.phase != Phase::Running {
            return Tick {
                tagged: Vec::new(),
                next_wake: self.next_wake(now),
            };
        }

        self.observe_mutations(now, dom);
        let due_mutation = self.pending_scan_at.is_some_and(|at| at <= now);
        let due_rescans = self.rescans.iter().filter(|&&at| at <= now).count();
        if due_mutation || due_rescans > 0 {
            self.pending_scan_at = self.pending_scan_at.filter(|&at| at > now);
            self.rescans.retain(|&at| at > now);
            self.enqueue_scan(dom, registry);
        }

        let tagged = self.process_batch(dom, registry);
        self.state = if self.queue.is_empty() {
            SchedulerState::Idle
        } else {
            SchedulerState::Scanning
        };
        Tick {
            tagged,
            next_wake: self.next_wake(now),
        }
    }

    fn initialize(
        &mut self,
        now: u64,
        dom: &mut ArenaDom,
        registry: &mut EquationRegistry,
        host: &dyn RendererHost,
    ) {
        self.attempts += 1;
        if dom.body().is_none() {
            self.attempt_failed(now, "document has no body");
            return;
        }
        let engine = match detect_engine(dom) {
            Ok(engine) => engine,
            Err(e) => {
                self.attempt_failed(now, &e.to_string());
                return;
            }
        };
        self.engine = engine;
        info!(engine = engine.as_str(), attempt = self.attempts, "renderer detected");

        if engine.is_async() {
            self.phase = Phase::AwaitingEngine {
                engine,
                deadline: now + self.config.renderer_ready_timeout_ms,
            };
            self.await_engine(now, engine, now + self.config.renderer_ready_timeout_ms, dom, registry, host);
        } else {
            self.begin(now, dom, registry);
        }
    }

    fn await_engine(
        &mut self,
        now: u64,
        engine: Engine,
        deadline: u64,
        dom: &mut ArenaDom,
        registry: &mut EquationRegistry,
        host: &dyn RendererHost,
    ) {
        match host.typeset_state(engine) {
            TypesetState::Done | TypesetState::Unknown => self.begin(now, dom, registry),
            TypesetState::Failed => self.attempt_failed(now, "renderer reported a typesetting failure"),
            TypesetState::Pending if now >= deadline => {
                warn!(engine = engine.as_str(), "renderer not ready before timeout; scanning anyway");
                self.begin(now, dom, registry);
            }
            TypesetState::Pending => {}
        }
    }

    fn attempt_failed(&mut self, now: u64, reason: &str) {
        if self.attempts >= self.config.max_init_attempts {
            warn!(attempts = self.attempts, reason, "initialization failed; detection disabled");
            self.phase = Phase::Failed;
            self.state = SchedulerState::MaxAttemptsExceeded;
        } else {
            warn!(attempt = self.attempts, reason, "initialization attempt failed; retrying");
            self.phase = Phase::Settling {
                until: now + self.config.settle_delay_ms,
            };
        }
    }

    /// First scan plus the follow-up rescans.
    fn begin(&mut self, now: u64, dom: &ArenaDom, registry: &mut EquationRegistry) {
        self.phase = Phase::Running;
        self.state = SchedulerState::Scanning;
        self.seen_generation = dom.generation();
        self.rescans = self.config.rescan_delays_ms.iter().map(|d| now + d).collect();
        self.enqueue_scan(dom, registry);
    }

    /// Restart the debounce window if the document changed since last seen.
    fn observe_mutations(&mut self, now: u64, dom: &ArenaDom) {
        let generation = dom.generation();
        if generation != self.seen_generation {
            self.seen_generation = generation;
            self.pending_scan_at = Some(now + self.config.mutation_throttle_ms);
            debug!(generation, "mutation observed; scan debounced");
        }
    }

    fn enqueue_scan(&mut self, dom: &ArenaDom, registry: &mut EquationRegistry) {
        registry.reconcile(dom);
        let fresh: Vec<Candidate> = registry
            .discover(dom, dom.document())
            .into_iter()
            .filter(|c| self.queued.insert(c.node))
            .collect();
        if fresh.is_empty() {
            return;
        }
        debug!(found = fresh.len(), "scan queued containers");
        for batch in fresh.chunks(self.config.batch_size.max(1)) {
            self.queue.push_back(batch.to_vec());
        }
    }

    fn process_batch(&mut self, dom: &mut ArenaDom, registry: &mut EquationRegistry) -> Vec<EquationId> {
        let Some(batch) = self.queue.pop_front() else {
            return Vec::new();
        };
        let mut tagged = Vec::with_capacity(batch.len());
        for candidate in batch {
            self.queued.remove(&candidate.node);
            match registry.register(dom, candidate) {
                Some(id) => tagged.push(id),
                None => debug!(node = candidate.node.0, "candidate skipped: tagged or detached"),
            }
        }
        debug!(tagged = tagged.len(), remaining = self.queue.len(), "batch registered");
        tagged
    }

    fn next_wake(&self, now: u64) -> Option<u64> {
        if !self.queue.is_empty() {
            return Some(now);
        }
        let phase_wake = match self.phase {
            Phase::Settling { until } => Some(until),
            Phase::AwaitingEngine { deadline, .. } => Some(deadline),
            Phase::Running | Phase::Stopped | Phase::Failed => None,
        };
        phase_wake
            .into_iter()
            .chain(self.pending_scan_at)
            .chain(self.rescans.iter().copied())
            .min()
    }
}
