//! Inbound commands, their responses, and outbound notifications.
//!
//! The JSON shapes match what the popup and background pages exchange:
//! commands and notifications are tagged by an `action` field, responses
//! always carry `success`.

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::format::Format;
use crate::renderer::Engine;
use crate::scheduler::SchedulerState;

/// A request from the popup or background page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    CopySelected,
    ClearSelection,
    GetStats,
    ForceDetection,
    SettingsUpdated { settings: Settings },
    /// Unknown names fall back to the default format.
    FormatChanged { format: String },
}

/// Counters reported by `getStats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub selected: usize,
    pub copied: u64,
    pub errors: u32,
    pub format: Format,
    pub engine: Engine,
    pub state: SchedulerState,
}

/// Reply to a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_stats(mut self, stats: Stats) -> Self {
        self.stats = Some(stats);
        self
    }
}

/// Event sent to the background page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Notification {
    EquationCopied {
        formula: String,
        format: Format,
        /// Renderer kind of a single copy, or `multiple`.
        source: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        count: Option<usize>,
    },
    SelectionUpdated { count: usize },
}

/// Receiver of outbound notifications.
pub trait Notifier {
    fn notify(&mut self, notification: &Notification);
}

impl Notifier for Vec<Notification> {
    fn notify(&mut self, notification: &Notification) {
        self.push(notification.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json() {
        let c: Command = serde_json::from_str(r#"{"action":"getStats"}"#).unwrap();
        assert_eq!(c, Command::GetStats);

        let c: Command = serde_json::from_str(r#"{"action":"formatChanged","format":"latex"}"#).unwrap();
        assert_eq!(
            c,
            Command::FormatChanged {
                format: "latex".into()
            }
        );

        let c: Command =
            serde_json::from_str(r#"{"action":"settingsUpdated","settings":{"format":"bogus"}}"#).unwrap();
        let Command::SettingsUpdated { settings } = c else {
            panic!("wrong variant");
        };
        assert_eq!(settings.format, Format::MathML);
    }

    #[test]
    fn test_response_shape() {
        let json = serde_json::to_string(&Response::ok().with_count(3)).unwrap();
        assert_eq!(json, r#"{"success":true,"count":3}"#);
        let json = serde_json::to_string(&Response::failed("nothing selected")).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"nothing selected"}"#);
    }

    #[test]
    fn test_notification_shape() {
        let n = Notification::EquationCopied {
            formula: "x".into(),
            format: Format::LaTeX,
            source: "katex".into(),
            count: None,
        };
        assert_eq!(
            serde_json::to_string(&n).unwrap(),
            r#"{"action":"equationCopied","formula":"x","format":"latex","source":"katex"}"#
        );
        let n = Notification::SelectionUpdated { count: 2 };
        assert_eq!(
            serde_json::to_string(&n).unwrap(),
            r#"{"action":"selectionUpdated","count":2}"#
        );
    }
}
