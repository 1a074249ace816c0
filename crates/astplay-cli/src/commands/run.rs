use super::{print_json, read_source};
use astplay_core::{PlaygroundConfig, Runner, TransformMode, TransformResult};
use miette::Result;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

#[derive(Serialize)]
struct RunOutput<'a> {
    ok: bool,
    mode: TransformMode,
    duration_ms: u128,
    result: &'a TransformResult,
}

/// Run the transform once.
///
/// A failing transform is reported like any output and the process exits
/// with status 1.
pub fn run(
    cwd: &Path,
    config: &PlaygroundConfig,
    input: &Path,
    plugin: &Path,
    json: bool,
) -> Result<()> {
    let source = read_source(cwd, input)?;
    let code = read_source(cwd, plugin)?;

    let runner = Runner::new(config.runner_options());
    let start = Instant::now();
    let result = runner.run(&source, &code);
    let elapsed = start.elapsed();
    debug!(elapsed_ms = elapsed.as_millis(), "run finished");

    if json {
        print_json(&RunOutput {
            ok: !result.is_failure(),
            mode: runner.options().mode,
            duration_ms: elapsed.as_millis(),
            result: &result,
        })?;
    } else {
        match &result {
            TransformResult::Output(text) => println!("{text}"),
            TransformResult::Failure(message) => eprintln!("error: {message}"),
        }
    }

    if result.is_failure() {
        std::process::exit(1);
    }
    Ok(())
}
