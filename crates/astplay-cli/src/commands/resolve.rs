use super::{print_json, read_source};
use astplay_core::{resolve, PlaygroundConfig, Resolution, VisitorKey};
use astplay_parser::parse;
use miette::{miette, Result};
use serde::Serialize;
use std::path::Path;
use tracing::warn;

#[derive(Serialize)]
struct ResolveOutput<'a> {
    node_type: &'a str,
    known: bool,
    #[serde(flatten)]
    resolution: &'a Resolution,
}

/// Run the resolve command: one `L:C-L:C` range per line, in source order.
pub fn run(
    cwd: &Path,
    config: &PlaygroundConfig,
    input: &Path,
    node_type: &str,
    json: bool,
) -> Result<()> {
    let source = read_source(cwd, input)?;
    let ast = parse(&source, config.parser_options())
        .map_err(|err| miette!("{}: {err}", input.display()))?;

    let known = VisitorKey::parse(node_type).is_some();
    if !known {
        warn!(node_type, "not a known visitor type, nothing will match");
    }
    let resolution = resolve(&ast, Some(node_type));

    if json {
        print_json(&ResolveOutput {
            node_type,
            known,
            resolution: &resolution,
        })?;
    } else {
        for range in &resolution.ranges {
            println!("{range}");
        }
        if resolution.skipped > 0 {
            eprintln!("{} node(s) without a location skipped", resolution.skipped);
        }
    }
    Ok(())
}
