//! Synchronization controller.
//!
//! A [`Session`] owns the two editor buffers of the playground and keeps
//! everything derived from them consistent: the input AST and its display
//! tree, the transform output, the active node type under the cursor in the
//! transform buffer, and the decorations that highlight that type in the
//! input buffer.
//!
//! The session never reads a clock. Callers pass `now` into the methods that
//! deal with the debounce timer, which keeps event loops and tests
//! deterministic.

use crate::config::PlaygroundConfig;
use crate::locator::{locate, CursorPosition};
use crate::resolver::resolve;
use crate::transform::{on_large_stack, Runner, TransformMode, TransformResult};
use crate::tree::{project, DisplayNode, ProjectOptions};
use astplay_parser::{parse, Ast, NodeRef, ParseError, ParserOptions, SourceRange};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

// =============================================================================
// Debouncer
// =============================================================================

/// Trailing-edge debounce timer. Every `schedule` re-arms it; only the last
/// arming fires.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
    generation: u64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Re-arm the timer for `now + delay`. Returns the new generation.
    pub fn schedule(&mut self, now: Instant) -> u64 {
        self.generation += 1;
        self.deadline = Some(now + self.delay);
        self.generation
    }

    /// Whether the armed deadline has passed. Disarms the timer when it
    /// has, so each arming fires at most once.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}

// =============================================================================
// Editor collaborator
// =============================================================================

/// Handle of a decoration created by the editor host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DecorationId(pub u64);

/// The editor that displays the input buffer.
pub trait EditorHost {
    /// Replace the decorations `previous` with one decoration per range and
    /// return their handles.
    fn set_decorations(&mut self, previous: &[DecorationId], ranges: &[SourceRange]) -> Vec<DecorationId>;
}

/// Host that keeps decorations in memory and hands out sequential ids.
#[derive(Debug, Default)]
pub struct MemoryHost {
    next_id: u64,
    live: Vec<(DecorationId, SourceRange)>,
    updates: usize,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ranges currently decorated.
    pub fn ranges(&self) -> Vec<SourceRange> {
        self.live.iter().map(|(_, range)| *range).collect()
    }

    /// Number of `set_decorations` calls so far.
    pub fn updates(&self) -> usize {
        self.updates
    }
}

impl EditorHost for MemoryHost {
    fn set_decorations(&mut self, previous: &[DecorationId], ranges: &[SourceRange]) -> Vec<DecorationId> {
        self.updates += 1;
        self.live.retain(|(id, _)| !previous.contains(id));
        ranges
            .iter()
            .map(|range| {
                self.next_id += 1;
                let id = DecorationId(self.next_id);
                self.live.push((id, *range));
                id
            })
            .collect()
    }
}

// =============================================================================
// Keys
// =============================================================================

/// A key press in the transform editor. `code` is the physical key name
/// (`"Enter"`, `"KeyS"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: String,
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyEvent {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// A key combination that triggers an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyChord {
    pub code: String,
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Default for KeyChord {
    /// Shift+Enter
    fn default() -> Self {
        Self {
            code: "Enter".to_string(),
            shift: true,
            ctrl: false,
            alt: false,
            meta: false,
        }
    }
}

impl KeyChord {
    /// Modifiers must match exactly.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.code == event.code
            && self.shift == event.shift
            && self.ctrl == event.ctrl
            && self.alt == event.alt
            && self.meta == event.meta
    }
}

// =============================================================================
// Session
// =============================================================================

/// State of one playground: input buffer, transform buffer and everything
/// derived from them.
pub struct Session<H: EditorHost> {
    host: H,
    parser: ParserOptions,
    project: ProjectOptions,
    runner: Runner,
    run_shortcut: KeyChord,
    debouncer: Debouncer,

    input: String,
    /// The input as of the last debounce flush.
    accepted_input: String,
    transform_code: String,

    /// Last input that parsed.
    ast: Option<Ast>,
    tree: Option<DisplayNode>,
    last_parse_error: Option<ParseError>,
    active_node_type: Option<String>,
    output: Option<TransformResult>,
    decorations: Vec<DecorationId>,
}

impl<H: EditorHost> Session<H> {
    /// Parse and project `input`, then run `transform_code` once if it is
    /// not blank.
    pub fn new(
        config: &PlaygroundConfig,
        input: impl Into<String>,
        transform_code: impl Into<String>,
        host: H,
    ) -> Self {
        let input = input.into();
        let mut session = Self {
            host,
            parser: config.parser_options(),
            project: config.project_options(),
            runner: Runner::new(config.runner_options()),
            run_shortcut: config.run_shortcut.clone(),
            debouncer: Debouncer::new(config.debounce()),
            accepted_input: input.clone(),
            input,
            transform_code: transform_code.into(),
            ast: None,
            tree: None,
            last_parse_error: None,
            active_node_type: None,
            output: None,
            decorations: Vec::new(),
        };
        session.reparse();
        session.run_now();
        session
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// The input buffer changed. Re-parsing waits for the debounce delay.
    pub fn on_input_changed(&mut self, text: impl Into<String>, now: Instant) {
        self.input = text.into();
        let generation = self.debouncer.schedule(now);
        debug!(generation, "input changed, flush scheduled");
    }

    /// Flush the input if the debounce deadline has passed. Returns whether
    /// a flush happened.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.debouncer.take_due(now) {
            return false;
        }
        self.flush();
        true
    }

    /// When the pending flush is due, if one is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// The transform buffer changed. Nothing runs until [`Session::run_now`]
    /// or the next input flush.
    pub fn on_transform_code_changed(&mut self, code: impl Into<String>) {
        self.transform_code = code.into();
    }

    /// A key was pressed in the transform editor. Returns whether it was the
    /// run shortcut.
    pub fn on_key_down(&mut self, event: &KeyEvent, now: Instant) -> bool {
        if !self.run_shortcut.matches(event) {
            return false;
        }
        // An overdue flush lands first so the run sees the latest input.
        if !self.poll(now) {
            self.run_now();
        }
        true
    }

    /// Run the transform on the accepted input now. Blank transform code is
    /// a no-op.
    pub fn run_now(&mut self) {
        if self.transform_code.trim().is_empty() {
            return;
        }
        let result = self.runner.run(&self.accepted_input, &self.transform_code);
        debug!(failure = result.is_failure(), "transform ran");
        self.output = Some(result);
    }

    /// The cursor moved in the transform editor.
    pub fn on_cursor_moved(&mut self, position: CursorPosition) {
        let active = locate(&self.transform_code, position);
        if active == self.active_node_type {
            return;
        }
        debug!(active = ?active, "active node type changed");
        self.active_node_type = active;
        self.reproject();
        self.redecorate();
    }

    // =========================================================================
    // Derived state
    // =========================================================================

    /// Accept the pending input. An input that does not parse keeps the
    /// previous tree and output; direct-code transforms do not need a parse
    /// and still run.
    fn flush(&mut self) {
        self.accepted_input = self.input.clone();
        let parsed = self.reparse();
        self.redecorate();
        if parsed || self.runner.options().mode == TransformMode::DirectCode {
            self.run_now();
        }
    }

    fn reparse(&mut self) -> bool {
        let source = self.accepted_input.as_str();
        let options = self.parser.clone();
        let parsed = on_large_stack(move || parse(source, options)).unwrap_or_else(|err| {
            warn!(error = %err, "no parser thread, parsing inline");
            parse(&self.accepted_input, self.parser.clone())
        });
        match parsed {
            Ok(ast) => {
                debug!(bytes = self.accepted_input.len(), "input parsed");
                self.ast = Some(ast);
                self.last_parse_error = None;
                self.reproject();
                true
            }
            Err(err) => {
                warn!(error = %err, "input does not parse, keeping the previous tree");
                self.last_parse_error = Some(err);
                false
            }
        }
    }

    fn reproject(&mut self) {
        let active = self.active_node_type.as_deref();
        let options = &self.project;
        self.tree = self.ast.as_ref().map(|ast| {
            let build = || project(NodeRef::program(&ast.program), active, options, ast.line_index());
            on_large_stack(build).unwrap_or_else(|_| build())
        });
    }

    fn redecorate(&mut self) {
        let ranges = match (&self.active_node_type, &self.ast) {
            (Some(active), Some(ast)) => resolve(ast, Some(active)).ranges,
            _ => Vec::new(),
        };
        if ranges.is_empty() && self.decorations.is_empty() {
            return;
        }
        self.decorations = self.host.set_decorations(&self.decorations, &ranges);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn accepted_input(&self) -> &str {
        &self.accepted_input
    }

    pub fn transform_code(&self) -> &str {
        &self.transform_code
    }

    pub fn ast(&self) -> Option<&Ast> {
        self.ast.as_ref()
    }

    pub fn tree(&self) -> Option<&DisplayNode> {
        self.tree.as_ref()
    }

    pub fn output(&self) -> Option<&TransformResult> {
        self.output.as_ref()
    }

    pub fn active_node_type(&self) -> Option<&str> {
        self.active_node_type.as_deref()
    }

    pub fn last_parse_error(&self) -> Option<&ParseError> {
        self.last_parse_error.as_ref()
    }

    pub fn decorations(&self) -> &[DecorationId] {
        &self.decorations
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> SourceRange {
        SourceRange {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    #[test]
    fn test_debouncer_last_write_wins() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        assert!(!debouncer.take_due(start));

        debouncer.schedule(start);
        debouncer.schedule(start + Duration::from_millis(300));
        // The first arming would have fired here.
        assert!(!debouncer.take_due(start + Duration::from_millis(600)));
        assert!(debouncer.take_due(start + Duration::from_millis(800)));
        // At most once per arming.
        assert!(!debouncer.take_due(start + Duration::from_millis(900)));
        assert_eq!(debouncer.generation(), 2);
        assert!(!debouncer.is_armed());
    }

    #[test]
    fn test_key_chord() {
        let chord = KeyChord::default();
        assert!(chord.matches(&KeyEvent::new("Enter").with_shift()));
        assert!(!chord.matches(&KeyEvent::new("Enter")));
        let mut ctrl = KeyEvent::new("Enter").with_shift();
        ctrl.ctrl = true;
        assert!(!chord.matches(&ctrl));
        let chord: KeyChord = serde_json::from_str(r#"{ "code": "KeyR", "shift": false, "ctrl": true }"#).unwrap();
        let mut event = KeyEvent::new("KeyR");
        event.ctrl = true;
        assert!(chord.matches(&event));
    }

    #[test]
    fn test_memory_host() {
        let mut host = MemoryHost::new();
        let first = host.set_decorations(&[], &[range(1, 1, 1, 2), range(2, 1, 2, 2)]);
        assert_eq!(first, [DecorationId(1), DecorationId(2)]);
        let second = host.set_decorations(&first, &[range(3, 1, 3, 1)]);
        assert_eq!(second, [DecorationId(3)]);
        assert_eq!(host.ranges(), [range(3, 1, 3, 1)]);
        assert_eq!(host.updates(), 2);
    }
}
