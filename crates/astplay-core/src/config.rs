//! Playground configuration.
//!
//! Loaded from `astplay.config.json` in the working directory, or from an
//! explicit path. Every field is optional:
//!
//! ```json
//! {
//!   "parser": { "module": true },
//!   "projector": { "max_depth": 3, "field_whitelist": ["name", "value"] },
//!   "debounce_ms": 500,
//!   "mode": "ast-mutation",
//!   "run_shortcut": { "code": "Enter", "shift": true },
//!   "budget": { "max_steps": 1000000, "max_call_depth": 256, "time_limit_ms": 2000 }
//! }
//! ```

use crate::error::{Error, Result};
use crate::session::KeyChord;
use crate::transform::{Budget, RunnerOptions, TransformMode};
use crate::tree::ProjectOptions;
use astplay_parser::{CodegenOptions, ParserOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file name looked up in the working directory.
pub const CONFIG_FILE: &str = "astplay.config.json";

/// Scalar fields shown in the tree view unless configured otherwise.
pub const DEFAULT_FIELD_WHITELIST: &[&str] = &["name", "value", "kind", "operator"];

/// Top-level playground configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaygroundConfig {
    pub parser: ParserConfig,
    pub projector: ProjectorConfig,
    /// Quiet period after the last input edit before re-parsing.
    pub debounce_ms: u64,
    pub mode: TransformMode,
    /// Key chord that runs the transform immediately.
    pub run_shortcut: KeyChord,
    pub budget: BudgetConfig,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            parser: ParserConfig::default(),
            projector: ProjectorConfig::default(),
            debounce_ms: 500,
            mode: TransformMode::default(),
            run_shortcut: KeyChord::default(),
            budget: BudgetConfig::default(),
        }
    }
}

/// How the input buffer is parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub module: bool,
    pub allow_return_outside_function: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            module: true,
            allow_return_outside_function: false,
        }
    }
}

/// Tree view options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    pub max_depth: Option<usize>,
    pub field_whitelist: Option<Vec<String>>,
    pub show_all_fields: bool,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            field_whitelist: Some(DEFAULT_FIELD_WHITELIST.iter().map(ToString::to_string).collect()),
            show_all_fields: false,
        }
    }
}

/// Execution budget for user transform code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub max_steps: u64,
    pub max_call_depth: usize,
    pub time_limit_ms: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        let budget = Budget::default();
        Self {
            max_steps: budget.max_steps,
            max_call_depth: budget.max_call_depth,
            time_limit_ms: u64::try_from(budget.time_limit.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl PlaygroundConfig {
    /// Read a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Find the config file in `root`.
    pub fn find(root: &Path) -> Option<PathBuf> {
        let path = root.join(CONFIG_FILE);
        path.is_file().then_some(path)
    }

    /// Load `explicit` if given, else the config found in `root`, else the
    /// defaults.
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => root.join(p),
            None => match Self::find(root) {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };
        tracing::debug!(path = %path.display(), "loading config");
        Self::load(&path)
    }

    #[must_use]
    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            module: self.parser.module,
            allow_return_outside_function: self.parser.allow_return_outside_function,
        }
    }

    #[must_use]
    pub fn project_options(&self) -> ProjectOptions {
        ProjectOptions {
            max_depth: self.projector.max_depth,
            field_whitelist: self
                .projector
                .field_whitelist
                .as_ref()
                .map(|fields| fields.iter().cloned().collect::<BTreeSet<_>>()),
            show_all_fields: self.projector.show_all_fields,
        }
    }

    #[must_use]
    pub fn budget(&self) -> Budget {
        Budget {
            max_steps: self.budget.max_steps,
            max_call_depth: self.budget.max_call_depth,
            time_limit: Duration::from_millis(self.budget.time_limit_ms),
        }
    }

    #[must_use]
    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            mode: self.mode,
            parser: self.parser_options(),
            codegen: CodegenOptions::default(),
            budget: self.budget(),
        }
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Set the transform mode.
    #[must_use]
    pub fn with_mode(mut self, mode: TransformMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the debounce delay.
    #[must_use]
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlaygroundConfig::default();
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.mode, TransformMode::AstMutation);
        assert!(config.parser_options().module);
        let whitelist = config.project_options().field_whitelist.unwrap();
        assert!(whitelist.contains("kind"));
        assert!(config.run_shortcut.shift);
        assert_eq!(config.run_shortcut.code, "Enter");
    }

    #[test]
    fn test_partial_json() {
        let config: PlaygroundConfig =
            serde_json::from_str(r#"{ "debounce_ms": 50, "mode": "direct-code", "projector": { "max_depth": 2 } }"#)
                .unwrap();
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.mode, TransformMode::DirectCode);
        assert_eq!(config.projector.max_depth, Some(2));
        // Unset nested fields keep their defaults.
        assert!(config.projector.field_whitelist.is_some());
        assert_eq!(config.budget, BudgetConfig::default());
    }

    #[test]
    fn test_discover() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlaygroundConfig::discover(dir.path(), None).unwrap();
        assert_eq!(config, PlaygroundConfig::default());

        std::fs::write(dir.path().join(CONFIG_FILE), r#"{ "debounce_ms": 10 }"#).unwrap();
        let config = PlaygroundConfig::discover(dir.path(), None).unwrap();
        assert_eq!(config.debounce_ms, 10);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            PlaygroundConfig::load(&missing),
            Err(Error::ConfigRead { .. })
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ debounce_ms: }").unwrap();
        let err = PlaygroundConfig::discover(dir.path(), Some(Path::new("bad.json"))).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
        assert!(err.to_string().contains("bad.json"));
    }
}
