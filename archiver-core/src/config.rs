//! Configuration management for the branch archiver
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (GIT_ARCHIVER_*)
//! 3. Config file (~/.config/git-branch-archiver/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Git-related configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitConfig {
    /// Path to the git executable
    pub path: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            path: "git".to_string(),
        }
    }
}

/// Temporary workspace configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Parent directory for temporary clones (system temp dir when unset)
    pub tmp_dir: Option<PathBuf>,

    /// Leave the temporary clone on disk after the run
    pub keep_temp: bool,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Export tags as well as branches
    pub include_tags: bool,

    /// Write the run manifest next to the archives
    pub manifest: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            include_tags: false,
            manifest: true,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Git configuration
    pub git: GitConfig,

    /// Workspace configuration
    pub workspace: WorkspaceConfig,

    /// Output configuration
    pub output: OutputConfig,
}

/// Values supplied on the command line; `None`/`false` means "not given"
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub git_path: Option<String>,
    pub tmp_dir: Option<PathBuf>,
    pub keep_temp: bool,
    pub include_tags: bool,
    pub no_manifest: bool,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/git-branch-archiver/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("git-branch-archiver").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - GIT_ARCHIVER_GIT: Path to git executable
    /// - GIT_ARCHIVER_TMP: Parent directory for temporary clones
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(git_path) = std::env::var("GIT_ARCHIVER_GIT") {
            if !git_path.is_empty() {
                self.git.path = git_path;
            }
        }

        if let Ok(tmp) = std::env::var("GIT_ARCHIVER_TMP") {
            if !tmp.is_empty() {
                self.workspace.tmp_dir = Some(PathBuf::from(tmp));
            }
        }

        self
    }

    /// Apply CLI flag overrides
    ///
    /// Boolean flags can only switch a setting on; they never turn off
    /// something the config file enabled, except `no_manifest`.
    pub fn with_cli_overrides(mut self, cli: CliOverrides) -> Self {
        if let Some(path) = cli.git_path {
            self.git.path = path;
        }

        if let Some(tmp) = cli.tmp_dir {
            self.workspace.tmp_dir = Some(tmp);
        }

        self.workspace.keep_temp |= cli.keep_temp;
        self.output.include_tags |= cli.include_tags;

        if cli.no_manifest {
            self.output.manifest = false;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(config_file: Option<&Path>, cli: CliOverrides) -> Result<Self> {
        let base = match config_file {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load()?,
        };

        Ok(base.with_env_overrides().with_cli_overrides(cli))
    }
}
