//! `astplay watch`: a terminal stand-in for the two editors.
//!
//! The input file plays the input editor (changes are debounced), the
//! transform file plays the transform editor (a save counts as the run
//! shortcut). Every update prints the output and the highlighted ranges.

use super::{read_source, resolve_path};
use astplay_core::{CursorPosition, MemoryHost, PlaygroundConfig, Session, TransformResult};
use astplay_parser::SourceRange;
use miette::{IntoDiagnostic, Result};
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One JSON line per update.
#[derive(Serialize)]
struct WatchUpdate<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_error: Option<String>,
    active: Option<&'a str>,
    ranges: Vec<SourceRange>,
    output: Option<&'a TransformResult>,
}

/// Which watched file an event touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Changed {
    Input,
    Plugin,
}

struct Watched {
    input: PathBuf,
    plugin: PathBuf,
}

impl Watched {
    fn classify(&self, path: &Path) -> Option<Changed> {
        // Editors often save by renaming over the file, so match on name
        // within the watched directory as well as on the exact path.
        let same = |target: &Path| {
            path == target || (path.file_name() == target.file_name() && path.parent() == target.parent())
        };
        if same(&self.input) {
            Some(Changed::Input)
        } else if same(&self.plugin) {
            Some(Changed::Plugin)
        } else {
            None
        }
    }

    fn directories(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = [&self.input, &self.plugin]
            .iter()
            .filter_map(|path| path.parent().map(Path::to_path_buf))
            .collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }
}

pub fn run(
    cwd: &Path,
    config: &PlaygroundConfig,
    input: &Path,
    plugin: &Path,
    cursor: Option<CursorPosition>,
    json: bool,
) -> Result<()> {
    let watched = Watched {
        input: canonical(&resolve_path(cwd, input)),
        plugin: canonical(&resolve_path(cwd, plugin)),
    };

    let mut session = Session::new(
        config,
        read_source(cwd, input)?,
        read_source(cwd, plugin)?,
        MemoryHost::new(),
    );
    if let Some(cursor) = cursor {
        session.on_cursor_moved(cursor);
    }
    report(&session, json)?;

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = RecommendedWatcher::new(tx, Config::default()).into_diagnostic()?;
    for dir in watched.directories() {
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .into_diagnostic()?;
    }
    info!(
        input = %watched.input.display(),
        plugin = %watched.plugin.display(),
        debounce_ms = config.debounce_ms,
        "watching"
    );

    loop {
        let event = match session.next_deadline() {
            Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match event {
            Ok(Ok(event)) => {
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    continue;
                }
                let mut plugin_changed = false;
                for changed in event.paths.iter().filter_map(|path| watched.classify(path)) {
                    match changed {
                        Changed::Input => {
                            if let Some(text) = reread(&watched.input) {
                                if text != session.input() {
                                    session.on_input_changed(text, Instant::now());
                                }
                            }
                        }
                        Changed::Plugin => {
                            if let Some(code) = reread(&watched.plugin) {
                                if code != session.transform_code() {
                                    session.on_transform_code_changed(code);
                                    plugin_changed = true;
                                }
                            }
                        }
                    }
                }
                if plugin_changed {
                    debug!("transform code saved, running");
                    if let Some(cursor) = cursor {
                        session.on_cursor_moved(cursor);
                    }
                    session.run_now();
                    report(&session, json)?;
                }
            }
            Ok(Err(e)) => warn!(error = %e, "watch error"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if session.poll(Instant::now()) {
            report(&session, json)?;
        }
    }

    Ok(())
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Read a watched file, tolerating the moment an editor has it half-written.
fn reread(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "file not readable yet");
            None
        }
    }
}

fn report(session: &Session<MemoryHost>, json: bool) -> Result<()> {
    if json {
        let update = WatchUpdate {
            parse_error: session.last_parse_error().map(ToString::to_string),
            active: session.active_node_type(),
            ranges: session.host().ranges(),
            output: session.output(),
        };
        println!("{}", serde_json::to_string(&update).into_diagnostic()?);
        return Ok(());
    }

    if let Some(err) = session.last_parse_error() {
        eprintln!("input: {err}");
    }
    if let Some(active) = session.active_node_type() {
        let ranges: Vec<String> = session.host().ranges().iter().map(ToString::to_string).collect();
        eprintln!("{active}: {}", ranges.join(", "));
    }
    match session.output() {
        Some(TransformResult::Output(text)) => println!("{text}"),
        Some(TransformResult::Failure(message)) => eprintln!("error: {message}"),
        None => {}
    }
    println!("---");
    Ok(())
}
