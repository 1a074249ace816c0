use super::{print_json, read_source};
use astplay_core::{project, PlaygroundConfig};
use astplay_parser::{parse, NodeRef};
use miette::{miette, Result};
use std::path::Path;

/// Command-line overrides for the projector settings.
#[derive(Debug, Default)]
pub struct TreeArgs {
    pub depth: Option<usize>,
    pub show_all: bool,
    pub whitelist: Vec<String>,
    pub active: Option<String>,
}

/// Run the tree command.
///
/// When `json` is true, outputs the display tree as a single JSON object.
/// Otherwise, prints the indented text rendering.
pub fn run(
    cwd: &Path,
    config: &PlaygroundConfig,
    input: &Path,
    args: &TreeArgs,
    json: bool,
) -> Result<()> {
    let source = read_source(cwd, input)?;
    let ast = parse(&source, config.parser_options())
        .map_err(|err| miette!("{}: {err}", input.display()))?;

    let mut options = config.project_options();
    if let Some(depth) = args.depth {
        options = options.with_max_depth(depth);
    }
    if args.show_all {
        options.show_all_fields = true;
    }
    if !args.whitelist.is_empty() {
        options = options.with_whitelist(args.whitelist.iter().map(String::as_str));
    }

    let tree = project(
        NodeRef::program(&ast.program),
        args.active.as_deref(),
        &options,
        ast.line_index(),
    );

    if json {
        print_json(&tree)?;
    } else {
        print!("{}", tree.render());
    }
    Ok(())
}
