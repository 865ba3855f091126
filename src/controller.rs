//! Per-equation interaction: hover, click-to-copy, multi-select and the
//! context-menu copy.
//!
//! Visual states follow
//! `idle -> hover -> {idle | copying}` and `copying -> {success | error} -> idle`,
//! where the last step is a timed reset driven by [`tick`](SelectionAndCopyController::tick).

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::clipboard::{ClipboardWriter, copy_text};
use crate::commands::Notification;
use crate::dom::ArenaDom;
use crate::error::Result;
use crate::format::Format;
use crate::registry::{EquationId, EquationRegistry, VisualState};
use crate::renderer::RendererAdapter;

/// Separator placed between equations in a multi-copy.
pub const MULTI_COPY_SEPARATOR: &str = "\n\n";

/// Source label used for multi-copies.
pub const MULTI_SOURCE: &str = "multiple";

/// Everything a copy needs from the session, borrowed for one call.
pub struct CopyEnv<'a> {
    pub dom: &'a ArenaDom,
    pub registry: &'a mut EquationRegistry,
    pub adapter: &'a mut RendererAdapter,
    pub clipboard: &'a mut dyn ClipboardWriter,
    pub notifications: &'a mut Vec<Notification>,
    pub now: u64,
}

/// What a click did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Modifier click: selection membership toggled.
    Toggled { selected: bool, count: usize },
    /// Plain click: the equation was copied.
    Copied(String),
    /// Plain click, but nothing could be extracted.
    NothingToCopy,
    /// The target is not a live tagged equation.
    Ignored,
}

pub struct SelectionAndCopyController {
    selection: BTreeSet<EquationId>,
    resets: BTreeMap<EquationId, u64>,
    copied: u64,
    success_reset_ms: u64,
    error_reset_ms: u64,
}

impl SelectionAndCopyController {
    pub fn new(success_reset_ms: u64, error_reset_ms: u64) -> Self {
        Self {
            selection: BTreeSet::new(),
            resets: BTreeMap::new(),
            copied: 0,
            success_reset_ms,
            error_reset_ms,
        }
    }

    /// Successful copy operations so far.
    pub fn copied(&self) -> u64 {
        self.copied
    }

    pub fn selection(&self) -> &BTreeSet<EquationId> {
        &self.selection
    }

    /// Wire newly tagged containers for interaction.
    pub fn attach(&mut self, registry: &mut EquationRegistry, ids: &[EquationId]) {
        for &id in ids {
            if let Some(entry) = registry.get_mut(id) {
                entry.visual_state = VisualState::Idle;
                entry.selected = false;
            }
        }
        if !ids.is_empty() {
            debug!(count = ids.len(), "containers attached");
        }
    }

    pub fn pointer_enter(&mut self, registry: &mut EquationRegistry, id: EquationId) {
        self.transition(registry, id, VisualState::Idle, VisualState::Hover);
    }

    pub fn pointer_leave(&mut self, registry: &mut EquationRegistry, id: EquationId) {
        self.transition(registry, id, VisualState::Hover, VisualState::Idle);
    }

    fn transition(&self, registry: &mut EquationRegistry, id: EquationId, from: VisualState, to: VisualState) {
        if let Some(entry) = registry.get_mut(id)
            && entry.visual_state == from
        {
            entry.visual_state = to;
        }
    }

    /// Click on an equation. With `modifier` held (and multi-selection
    /// enabled) membership is toggled instead of copying.
    pub fn click(
        &mut self,
        env: &mut CopyEnv<'_>,
        id: EquationId,
        modifier: bool,
        multi_selection: bool,
        format: Format,
    ) -> Result<ClickOutcome> {
        if env.registry.live(env.dom, id).is_none() {
            return Ok(ClickOutcome::Ignored);
        }
        if modifier && multi_selection {
            let selected = self.toggle(env.registry, id);
            let count = self.selection.len();
            env.notifications.push(Notification::SelectionUpdated { count });
            return Ok(ClickOutcome::Toggled { selected, count });
        }
        Ok(match self.copy_one(env, id, format)? {
            Some(text) => ClickOutcome::Copied(text),
            None => ClickOutcome::NothingToCopy,
        })
    }

    /// Copy one equation in `format` without touching any global setting.
    /// Used by the context menu.
    pub fn context_copy(&mut self, env: &mut CopyEnv<'_>, id: EquationId, format: Format) -> Result<Option<String>> {
        if env.registry.live(env.dom, id).is_none() {
            return Ok(None);
        }
        self.copy_one(env, id, format)
    }

    /// Extract and copy one container.
    ///
    /// `Ok(None)` means extraction came back empty; the container shows the
    /// error state. Clipboard failures are returned as errors.
    fn copy_one(&mut self, env: &mut CopyEnv<'_>, id: EquationId, format: Format) -> Result<Option<String>> {
        let Some((node, kind)) = env.registry.get(id).map(|e| (e.node, e.kind)) else {
            return Ok(None);
        };
        self.set_state(env.registry, id, VisualState::Copying, env.now);

        let Some(result) = env.adapter.extract(env.dom, node, kind, format) else {
            self.set_state(env.registry, id, VisualState::Error, env.now);
            return Ok(None);
        };
        if let Err(e) = copy_text(env.clipboard, result.content(), format) {
            self.set_state(env.registry, id, VisualState::Error, env.now);
            return Err(e);
        }

        self.copied += 1;
        self.set_state(env.registry, id, VisualState::Success, env.now);
        env.notifications.push(Notification::EquationCopied {
            formula: result.content().to_string(),
            format,
            source: kind.as_str().to_string(),
            count: None,
        });
        Ok(Some(result.into_content()))
    }

    /// Toggle selection membership; returns whether `id` is now selected.
    pub fn toggle(&mut self, registry: &mut EquationRegistry, id: EquationId) -> bool {
        let selected = if self.selection.remove(&id) {
            false
        } else {
            self.selection.insert(id);
            true
        };
        if let Some(entry) = registry.get_mut(id) {
            entry.selected = selected;
        }
        selected
    }

    /// Copy every selected equation as one payload, joined by a blank line.
    ///
    /// Members that fail to extract are skipped and flash the error state.
    /// If the clipboard write fails every extracted member flashes it too.
    /// The selection is cleared after a successful copy.
    pub fn copy_selected(&mut self, env: &mut CopyEnv<'_>, format: Format) -> Result<Option<usize>> {
        self.prune(env.dom, env.registry);
        if self.selection.is_empty() {
            return Ok(None);
        }

        let members: Vec<EquationId> = self.selection.iter().copied().collect();
        let mut parts = Vec::with_capacity(members.len());
        let mut copied_ids = Vec::with_capacity(members.len());
        for id in members {
            let Some((node, kind)) = env.registry.get(id).map(|e| (e.node, e.kind)) else {
                continue;
            };
            match env.adapter.extract(env.dom, node, kind, format) {
                Some(result) => {
                    parts.push(result.into_content());
                    copied_ids.push(id);
                }
                None => self.set_state(env.registry, id, VisualState::Error, env.now),
            }
        }
        if parts.is_empty() {
            warn!(selected = self.selection.len(), "no selected equation could be extracted");
            return Ok(None);
        }

        let joined = parts.join(MULTI_COPY_SEPARATOR);
        if let Err(e) = copy_text(env.clipboard, &joined, format) {
            for &id in &copied_ids {
                self.set_state(env.registry, id, VisualState::Error, env.now);
            }
            return Err(e);
        }

        self.copied += 1;
        for &id in &copied_ids {
            self.set_state(env.registry, id, VisualState::Success, env.now);
        }
        let count = copied_ids.len();
        env.notifications.push(Notification::EquationCopied {
            formula: joined,
            format,
            source: MULTI_SOURCE.to_string(),
            count: Some(count),
        });
        self.clear_selection(env.registry, env.notifications);
        Ok(Some(count))
    }

    pub fn clear_selection(&mut self, registry: &mut EquationRegistry, notifications: &mut Vec<Notification>) {
        for id in std::mem::take(&mut self.selection) {
            if let Some(entry) = registry.get_mut(id) {
                entry.selected = false;
            }
        }
        notifications.push(Notification::SelectionUpdated { count: 0 });
    }

    /// Drop selected ids that are no longer tagged and attached.
    pub fn prune(&mut self, dom: &ArenaDom, registry: &mut EquationRegistry) {
        self.selection.retain(|&id| registry.live(dom, id).is_some());
        self.resets.retain(|id, _| registry.get(*id).is_some());
    }

    fn set_state(&mut self, registry: &mut EquationRegistry, id: EquationId, state: VisualState, now: u64) {
        let Some(entry) = registry.get_mut(id) else {
            return;
        };
        entry.visual_state = state;
        match state {
            VisualState::Success => {
                self.resets.insert(id, now + self.success_reset_ms);
            }
            VisualState::Error => {
                self.resets.insert(id, now + self.error_reset_ms);
            }
            _ => {
                self.resets.remove(&id);
            }
        }
    }

    /// Apply due visual resets. Returns the next reset time, if any.
    pub fn tick(&mut self, registry: &mut EquationRegistry, now: u64) -> Option<u64> {
        let due: Vec<EquationId> = self
            .resets
            .iter()
            .filter(|&(_, &at)| at <= now)
            .map(|(&id, _)| id)
            .collect();
        for id in due {
            self.resets.remove(&id);
            if let Some(entry) = registry.get_mut(id) {
                entry.visual_state = VisualState::Idle;
            }
        }
        self.resets.values().copied().min()
    }

    /// Forget all interaction state. Used on teardown.
    pub fn reset(&mut self) {
        self.selection.clear();
        self.resets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::dom::parse_html;
    use crate::renderer::NoHost;

    struct Fixture {
        dom: ArenaDom,
        registry: EquationRegistry,
        adapter: RendererAdapter,
        clipboard: MemoryClipboard,
        notifications: Vec<Notification>,
        ids: Vec<EquationId>,
    }

    impl Fixture {
        fn new(html: &str) -> Self {
            let mut dom = parse_html(html);
            let mut registry = EquationRegistry::new().unwrap();
            let ids = registry.scan_document(&mut dom);
            Self {
                dom,
                registry,
                adapter: RendererAdapter::new(Box::new(NoHost), 10),
                clipboard: MemoryClipboard::new(),
                notifications: Vec::new(),
                ids,
            }
        }

        fn env(&mut self, now: u64) -> CopyEnv<'_> {
            CopyEnv {
                dom: &self.dom,
                registry: &mut self.registry,
                adapter: &mut self.adapter,
                clipboard: &mut self.clipboard,
                notifications: &mut self.notifications,
                now,
            }
        }

        fn state(&self, id: EquationId) -> VisualState {
            self.registry.get(id).unwrap().visual_state
        }
    }

    const THREE: &str = r#"<math><mi>a</mi></math><math><mi>b</mi></math><math><mi>c</mi></math>"#;

    #[test]
    fn test_click_copies_and_resets() {
        let mut f = Fixture::new(THREE);
        let mut ctl = SelectionAndCopyController::new(1_500, 2_000);
        let id = f.ids[0];

        ctl.pointer_enter(&mut f.registry, id);
        assert_eq!(f.state(id), VisualState::Hover);

        let outcome = ctl.click(&mut f.env(100), id, false, true, Format::Unicode).unwrap();
        assert_eq!(outcome, ClickOutcome::Copied("a".into()));
        assert_eq!(f.clipboard.last_text(), Some("a"));
        assert_eq!(f.state(id), VisualState::Success);
        assert_eq!(ctl.tick(&mut f.registry, 1_000), Some(1_600));
        assert_eq!(ctl.tick(&mut f.registry, 1_600), None);
        assert_eq!(f.state(id), VisualState::Idle);
        assert!(matches!(
            f.notifications.last(),
            Some(Notification::EquationCopied { source, .. }) if source == "mathml"
        ));
    }

    #[test]
    fn test_multi_select_round_trip() {
        let mut f = Fixture::new(THREE);
        let mut ctl = SelectionAndCopyController::new(1_500, 2_000);
        for &id in &f.ids.clone() {
            let outcome = ctl.click(&mut f.env(0), id, true, true, Format::Unicode).unwrap();
            assert!(matches!(outcome, ClickOutcome::Toggled { selected: true, .. }));
        }
        assert_eq!(ctl.selection().len(), 3);

        let count = ctl.copy_selected(&mut f.env(10), Format::Unicode).unwrap();
        assert_eq!(count, Some(3));
        assert_eq!(f.clipboard.last_text(), Some("a\n\nb\n\nc"));
        assert!(ctl.selection().is_empty());
        assert!(f.ids.iter().all(|&id| f.state(id) == VisualState::Success));
        assert!(f.ids.iter().all(|&id| !f.registry.get(id).unwrap().selected));
        assert_eq!(
            f.notifications.last(),
            Some(&Notification::SelectionUpdated { count: 0 })
        );
    }

    #[test]
    fn test_modifier_click_without_multi_selection_copies() {
        let mut f = Fixture::new(THREE);
        let mut ctl = SelectionAndCopyController::new(1_500, 2_000);
        let id = f.ids[1];
        let outcome = ctl.click(&mut f.env(0), id, true, false, Format::Unicode).unwrap();
        assert_eq!(outcome, ClickOutcome::Copied("b".into()));
    }

    #[test]
    fn test_failed_extraction_shows_error() {
        let mut f = Fixture::new(r#"<span class="katex"><span class="katex-html">x</span></span>"#);
        let mut ctl = SelectionAndCopyController::new(1_500, 2_000);
        let id = f.ids[0];
        let outcome = ctl.click(&mut f.env(0), id, false, true, Format::LaTeX).unwrap();
        assert_eq!(outcome, ClickOutcome::NothingToCopy);
        assert_eq!(f.state(id), VisualState::Error);
        assert!(f.clipboard.writes().is_empty());
        assert_eq!(ctl.tick(&mut f.registry, 0), Some(2_000));
    }

    #[test]
    fn test_clipboard_failure_propagates() {
        let mut f = Fixture::new(THREE);
        f.clipboard = MemoryClipboard::unavailable();
        let mut ctl = SelectionAndCopyController::new(1_500, 2_000);
        let id = f.ids[0];
        assert!(ctl.click(&mut f.env(0), id, false, true, Format::Unicode).is_err());
        assert_eq!(f.state(id), VisualState::Error);
    }

    #[test]
    fn test_multi_copy_clipboard_failure_flags_members() {
        let mut f = Fixture::new(THREE);
        f.clipboard = MemoryClipboard::unavailable();
        let mut ctl = SelectionAndCopyController::new(1_500, 2_000);
        ctl.toggle(&mut f.registry, f.ids[0]);
        ctl.toggle(&mut f.registry, f.ids[2]);

        let err = ctl.copy_selected(&mut f.env(50), Format::Unicode).unwrap_err();
        assert!(matches!(err, crate::error::Error::ClipboardUnavailable(_)));
        assert_eq!(f.state(f.ids[0]), VisualState::Error);
        assert_eq!(f.state(f.ids[2]), VisualState::Error);
        assert_eq!(f.state(f.ids[1]), VisualState::Idle);
        // Kept for a retry
        assert_eq!(ctl.selection().len(), 2);
        assert_eq!(ctl.tick(&mut f.registry, 50), Some(2_050));
    }

    #[test]
    fn test_detached_selection_is_pruned() {
        let mut f = Fixture::new(THREE);
        let mut ctl = SelectionAndCopyController::new(1_500, 2_000);
        ctl.toggle(&mut f.registry, f.ids[0]);
        ctl.toggle(&mut f.registry, f.ids[1]);
        let node = f.registry.get(f.ids[0]).unwrap().node;
        f.dom.detach(node);

        let count = ctl.copy_selected(&mut f.env(0), Format::Unicode).unwrap();
        assert_eq!(count, Some(1));
        assert_eq!(f.clipboard.last_text(), Some("b"));
    }

    #[test]
    fn test_context_copy_uses_requested_format() {
        let mut f = Fixture::new(r#"<math><msup><mi>x</mi><mn>2</mn></msup></math>"#);
        let mut ctl = SelectionAndCopyController::new(1_500, 2_000);
        let id = f.ids[0];
        let text = ctl.context_copy(&mut f.env(0), id, Format::AsciiMath).unwrap();
        assert_eq!(text.as_deref(), Some("x^2"));
    }
}
