//! One page's worth of detection and interaction state.
//!
//! A [`Session`] owns the document, the registry, the scheduler and the
//! copy controller, and is the only thing a host talks to. Hosts drive it
//! with [`Session::poll`] from their timer and forward pointer events and
//! popup commands to it.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clipboard::{ClipboardWriter, MemoryClipboard};
use crate::commands::{Command, Notification, Notifier, Response, Stats};
use crate::config::{SchedulerConfig, Settings};
use crate::controller::{ClickOutcome, CopyEnv, SelectionAndCopyController};
use crate::dom::{ArenaDom, ArenaNodeId};
use crate::error::Result;
use crate::format::Format;
use crate::history::ClipboardHistory;
use crate::registry::{EquationId, EquationRegistry, RendererKind, VisualState};
use crate::renderer::{NoHost, RendererAdapter, RendererHost};
use crate::scheduler::{DetectionScheduler, SchedulerState};

/// Upper bound on polls in [`Session::run_until_idle`].
const MAX_IDLE_POLLS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Active,
    TornDown,
}

/// One extracted equation, as reported by [`Session::extract_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extracted {
    pub id: u32,
    pub kind: RendererKind,
    pub content: Option<String>,
}

pub struct Session {
    dom: ArenaDom,
    registry: EquationRegistry,
    scheduler: DetectionScheduler,
    adapter: RendererAdapter,
    controller: SelectionAndCopyController,
    clipboard: Box<dyn ClipboardWriter>,
    settings: Settings,
    format: Format,
    history: ClipboardHistory,
    outbox: Vec<Notification>,
    lifecycle: Lifecycle,
}

impl Session {
    /// A session over `dom` with no renderer introspection and an
    /// in-memory clipboard. Swap either with the `with_*` builders.
    pub fn new(dom: ArenaDom, settings: Settings, config: SchedulerConfig) -> Result<Self> {
        Ok(Self {
            dom,
            registry: EquationRegistry::new()?,
            adapter: RendererAdapter::new(Box::new(NoHost), config.max_errors),
            controller: SelectionAndCopyController::new(config.success_reset_ms, config.error_reset_ms),
            scheduler: DetectionScheduler::new(config),
            clipboard: Box::new(MemoryClipboard::new()),
            format: settings.format,
            settings,
            history: ClipboardHistory::default(),
            outbox: Vec::new(),
            lifecycle: Lifecycle::Created,
        })
    }

    pub fn with_host(mut self, host: Box<dyn RendererHost>) -> Self {
        let max_errors = self.adapter.budget().max_errors();
        self.adapter = RendererAdapter::new(host, max_errors);
        self
    }

    pub fn with_clipboard(mut self, clipboard: Box<dyn ClipboardWriter>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn with_history(mut self, history: ClipboardHistory) -> Self {
        self.history = history;
        self
    }

    pub fn dom(&self) -> &ArenaDom {
        &self.dom
    }

    /// Mutable document access, for hosts that mirror page mutations.
    pub fn dom_mut(&mut self) -> &mut ArenaDom {
        &mut self.dom
    }

    pub fn registry(&self) -> &EquationRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &DetectionScheduler {
        &self.scheduler
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The globally active copy format.
    pub fn format(&self) -> Format {
        self.format
    }

    pub fn history(&self) -> &ClipboardHistory {
        &self.history
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    /// Start detection. A second call, or a call after teardown, does nothing.
    pub fn init(&mut self, now: u64) {
        if self.lifecycle != Lifecycle::Created {
            return;
        }
        self.lifecycle = Lifecycle::Active;
        self.scheduler.start(now);
        info!(format = %self.format, "session initialized");
    }

    /// Stop detection, drop interaction state and remove every tag marker.
    pub fn teardown(&mut self) {
        if self.lifecycle != Lifecycle::Active {
            self.lifecycle = Lifecycle::TornDown;
            return;
        }
        self.lifecycle = Lifecycle::TornDown;
        self.scheduler.stop();
        self.controller.reset();
        self.registry.untag_all(&mut self.dom);
        info!("session torn down");
    }

    /// Run due work. Returns when the host should poll again.
    pub fn poll(&mut self, now: u64) -> Option<u64> {
        if !self.is_active() {
            return None;
        }
        let tick = self
            .scheduler
            .poll(now, &mut self.dom, &mut self.registry, self.adapter.host());
        self.controller.attach(&mut self.registry, &tick.tagged);
        let reset = self.controller.tick(&mut self.registry, now);
        tick.next_wake.into_iter().chain(reset).min()
    }

    /// Initialize and poll until the initial detection pass has drained.
    ///
    /// For static documents (the CLI, tests). Follow-up rescans are not
    /// waited for.
    pub fn run_until_idle(&mut self, start: u64) -> u64 {
        self.init(start);
        let mut now = start;
        for _ in 0..MAX_IDLE_POLLS {
            let wake = self.poll(now);
            let busy = self.scheduler.pending() > 0 || self.scheduler.state() == SchedulerState::WaitingForRenderers;
            match wake {
                Some(at) if busy && self.scheduler.is_active() => now = at.max(now),
                _ => break,
            }
        }
        debug!(containers = self.registry.len(), now, "detection pass drained");
        now
    }

    fn container(&mut self, node: ArenaNodeId) -> Option<EquationId> {
        if !self.is_active() {
            return None;
        }
        let id = self.registry.container_of(&self.dom, node)?;
        self.registry.live(&self.dom, id).map(|_| id)
    }

    pub fn pointer_enter(&mut self, node: ArenaNodeId) {
        if let Some(id) = self.container(node) {
            self.controller.pointer_enter(&mut self.registry, id);
        }
    }

    pub fn pointer_leave(&mut self, node: ArenaNodeId) {
        if let Some(id) = self.container(node) {
            self.controller.pointer_leave(&mut self.registry, id);
        }
    }

    /// Hint text for a hovered container, when tooltips are enabled.
    pub fn tooltip(&self, id: EquationId) -> Option<String> {
        if !self.settings.show_tooltips {
            return None;
        }
        let entry = self.registry.get(id)?;
        (entry.visual_state == VisualState::Hover).then(|| {
            if self.settings.multi_selection {
                format!("Click to copy as {}; modifier-click to select", self.format.label())
            } else {
                format!("Click to copy as {}", self.format.label())
            }
        })
    }

    /// A click anywhere inside an equation.
    pub fn click(&mut self, node: ArenaNodeId, modifier: bool, now: u64) -> Result<ClickOutcome> {
        let Some(id) = self.container(node) else {
            return Ok(ClickOutcome::Ignored);
        };
        let multi = self.settings.multi_selection;
        if !(modifier && multi) && !self.settings.auto_copy {
            return Ok(ClickOutcome::Ignored);
        }
        let format = self.format;
        let mark = self.outbox.len();
        let (controller, mut env) = self.split(now);
        let outcome = controller.click(&mut env, id, modifier, multi, format);
        self.record(mark);
        outcome
    }

    /// Context-menu copy in `format`, leaving the active format alone.
    pub fn context_copy(&mut self, node: ArenaNodeId, format: Format, now: u64) -> Result<Option<String>> {
        let Some(id) = self.container(node) else {
            return Ok(None);
        };
        let mark = self.outbox.len();
        let (controller, mut env) = self.split(now);
        let copied = controller.context_copy(&mut env, id, format);
        self.record(mark);
        copied
    }

    /// Escape key: drop the selection.
    pub fn escape(&mut self) {
        if !self.is_active() || self.controller.selection().is_empty() {
            return;
        }
        let mark = self.outbox.len();
        self.controller.clear_selection(&mut self.registry, &mut self.outbox);
        self.record(mark);
    }

    pub fn handle_command(&mut self, command: Command, now: u64) -> Response {
        if !self.is_active() {
            return Response::failed("session is not active");
        }
        debug!(?command, "command received");
        let mark = self.outbox.len();
        let response = match command {
            Command::CopySelected => {
                let format = self.format;
                let (controller, mut env) = self.split(now);
                match controller.copy_selected(&mut env, format) {
                    Ok(Some(count)) => Response::ok().with_count(count),
                    Ok(None) => Response::failed("no equations selected"),
                    Err(e) => {
                        warn!(error = %e, "multi-copy failed");
                        Response::failed(e.to_string())
                    }
                }
            }
            Command::ClearSelection => {
                self.controller.clear_selection(&mut self.registry, &mut self.outbox);
                Response::ok()
            }
            Command::GetStats => Response::ok().with_stats(self.stats()),
            Command::ForceDetection => {
                self.scheduler.force(now, &self.dom, &mut self.registry);
                Response::ok()
            }
            Command::SettingsUpdated { settings } => {
                self.apply_settings(settings);
                Response::ok()
            }
            Command::FormatChanged { format } => {
                self.format = Format::parse_lenient(&format);
                self.settings.format = self.format;
                info!(format = %self.format, "format changed");
                Response::ok()
            }
        };
        self.record(mark);
        response
    }

    /// [`handle_command`](Self::handle_command) over JSON text.
    pub fn handle_json(&mut self, json: &str, now: u64) -> String {
        let response = match serde_json::from_str::<Command>(json) {
            Ok(command) => self.handle_command(command, now),
            Err(e) => Response::failed(format!("invalid command: {e}")),
        };
        serde_json::to_string(&response).unwrap_or_else(|_| r#"{"success":false}"#.to_string())
    }

    fn apply_settings(&mut self, settings: Settings) {
        if !settings.multi_selection && !self.controller.selection().is_empty() {
            self.controller.clear_selection(&mut self.registry, &mut self.outbox);
        }
        self.format = settings.format;
        self.settings = settings;
        info!(format = %self.format, "settings updated");
    }

    pub fn stats(&self) -> Stats {
        Stats {
            total: self.registry.len(),
            selected: self.controller.selection().len(),
            copied: self.controller.copied(),
            errors: self.adapter.budget().errors(),
            format: self.format,
            engine: self.scheduler.engine(),
            state: self.scheduler.state(),
        }
    }

    /// Extract every tagged equation in `format`, in tagging order.
    pub fn extract_all(&mut self, format: Format) -> Vec<Extracted> {
        let entries: Vec<(EquationId, ArenaNodeId, RendererKind)> =
            self.registry.iter().map(|e| (e.id, e.node, e.kind)).collect();
        entries
            .into_iter()
            .map(|(id, node, kind)| Extracted {
                id: id.0,
                kind,
                content: self
                    .adapter
                    .extract(&self.dom, node, kind, format)
                    .map(|r| r.into_content()),
            })
            .collect()
    }

    /// Drain notifications produced since the last call.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    fn split(&mut self, now: u64) -> (&mut SelectionAndCopyController, CopyEnv<'_>) {
        (
            &mut self.controller,
            CopyEnv {
                dom: &self.dom,
                registry: &mut self.registry,
                adapter: &mut self.adapter,
                clipboard: self.clipboard.as_mut(),
                notifications: &mut self.outbox,
                now,
            },
        )
    }

    /// Feed notifications queued since `mark` to the history.
    fn record(&mut self, mark: usize) {
        for notification in &self.outbox[mark..] {
            self.history.notify(notification);
        }
    }
}
