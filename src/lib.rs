//! # mathclip
//!
//! Find rendered equations in an HTML document and extract each one as
//! MathML, LaTeX, Unicode text or AsciiMath.
//!
//! ## Features
//!
//! - Detects KaTeX, MathJax v2, MathJax v3, native MathML, `data-*`
//!   annotated and generically classed equations
//! - Prefers a renderer's original source over its visual output
//! - Cleans MathML for pasting into word processors
//! - Scheduled, batched detection that follows document mutations
//! - Click-to-copy, multi-select and context-menu copy
//!
//! ## Quick Start
//!
//! ```
//! use mathclip::{Format, SchedulerConfig, Session, Settings, parse_html};
//!
//! let dom = parse_html(r#"<p><math><msup><mi>x</mi><mn>2</mn></msup></math></p>"#);
//! let mut session = Session::new(dom, Settings::default(), SchedulerConfig::default()).unwrap();
//! session.run_until_idle(0);
//!
//! let found = session.extract_all(Format::Unicode);
//! assert_eq!(found[0].content.as_deref(), Some("x²"));
//! ```
//!
//! ## Conversions
//!
//! The converters in [`convert`] work on plain strings too:
//!
//! ```
//! use mathclip::convert::{latex_to_asciimath, latex_to_unicode};
//!
//! assert_eq!(latex_to_unicode(r"\alpha^2"), "α²");
//! assert_eq!(latex_to_asciimath(r"\sqrt{x}"), "sqrt(x)");
//! ```

pub mod clipboard;
pub mod commands;
pub mod config;
pub mod controller;
pub mod convert;
pub mod dom;
pub mod error;
pub mod format;
pub mod history;
pub mod registry;
pub mod renderer;
pub mod scheduler;
pub mod session;
pub(crate) mod util;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use clipboard::{ClipboardPayload, ClipboardWriter, MemoryClipboard, copy_text};
pub use commands::{Command, Notification, Notifier, Response, Stats};
pub use config::{SchedulerConfig, Settings};
pub use controller::{ClickOutcome, SelectionAndCopyController};
pub use dom::{ArenaDom, ArenaNodeId, parse_html, parse_html_bytes};
pub use error::{Error, Result, Severity};
pub use format::{ExtractionResult, Format};
pub use history::{ClipboardHistory, ClipboardHistoryItem};
pub use registry::{EquationContainer, EquationId, EquationRegistry, RendererKind, VisualState};
pub use renderer::{Engine, RendererAdapter, RendererHost, SourceKind, SourceText, TypesetState};
pub use scheduler::{DetectionScheduler, SchedulerState, Tick};
pub use session::{Extracted, Session};
