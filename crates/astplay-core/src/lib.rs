#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! astplay-core: the playground behind the editors.
//!
//! - [`tree`] projects an AST into the display tree
//! - [`locator`] guesses the node type under the cursor in transform code
//! - [`resolver`] finds the source ranges of a node type
//! - [`transform`] runs user transform code against the input
//! - [`session`] keeps buffers, AST, tree, output and decorations in sync

pub mod config;
pub mod error;
pub mod locator;
pub mod resolver;
pub mod session;
pub mod transform;
pub mod tree;

pub use config::PlaygroundConfig;
pub use error::{Error, Result};
pub use locator::{locate, CursorPosition};
pub use resolver::{resolve, Resolution, VisitorKey};
pub use session::{Debouncer, DecorationId, EditorHost, KeyChord, KeyEvent, MemoryHost, Session};
pub use transform::{run, Budget, Runner, RunnerOptions, TransformMode, TransformResult};
pub use tree::{project, project_list, DisplayNode, ProjectOptions};

/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
