use super::{print_json, read_source};
use astplay_core::{locate, CursorPosition};
use miette::Result;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct LocateOutput<'a> {
    cursor: CursorPosition,
    node_type: Option<&'a str>,
}

pub fn run(cwd: &Path, plugin: &Path, cursor: CursorPosition, json: bool) -> Result<()> {
    let code = read_source(cwd, plugin)?;
    let node_type = locate(&code, cursor);

    if json {
        print_json(&LocateOutput {
            cursor,
            node_type: node_type.as_deref(),
        })?;
    } else {
        match node_type {
            Some(node_type) => println!("{node_type}"),
            None => println!("(none)"),
        }
    }
    Ok(())
}
