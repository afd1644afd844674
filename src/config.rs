//! Configuration module for the dependency indexer.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `DEPSCAN_` and use double
//! underscores to separate nested levels:
//! - `DEPSCAN_SCAN__PARALLEL_THREADS=8` sets `scan.parallel_threads`
//! - `DEPSCAN_DEBUG=true` sets `debug`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// File name of the persisted index blob under `index_path`.
pub const INDEX_BLOB_NAME: &str = "dependencies.idx";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Path to the index directory
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Workspace root directory (where .depscan is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Scan configuration
    #[serde(default)]
    pub scan: ScanConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScanConfig {
    /// Number of parallel threads for the scan pass
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Project root directory to scan (defaults to workspace root)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_root: Option<PathBuf>,

    /// Patterns to ignore during the walk (gitignore syntax)
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Extension of sidecar metadata files
    #[serde(default = "default_meta_extension")]
    pub meta_extension: String,

    /// Extensions of script sources scanned for weak references
    #[serde(default = "default_script_extensions")]
    pub script_extensions: Vec<String>,

    /// Top-level directory whose documents are classified as packages
    #[serde(default = "default_packages_root")]
    pub packages_root: String,

    /// Host-builtin ids registered before every scan so references to them
    /// resolve as tracked documents
    #[serde(default = "default_builtin_ids")]
    pub builtin_ids: Vec<String>,

    /// Ids excluded from registration and edge tracking
    #[serde(default)]
    pub ignore_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".depscan/index")
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_false() -> bool {
    false
}
fn default_meta_extension() -> String {
    "meta".to_string()
}
fn default_script_extensions() -> Vec<String> {
    vec!["cs".to_string()]
}
fn default_packages_root() -> String {
    "packages".to_string()
}
fn default_builtin_ids() -> Vec<String> {
    vec![
        "0000000000000000d000000000000000".to_string(),
        "0000000000000000e000000000000000".to_string(),
        "0000000000000000f000000000000000".to_string(),
    ]
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            workspace_root: None,
            debug: false,
            scan: ScanConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            project_root: None,
            ignore_patterns: vec![
                "library/**".to_string(),
                "temp/**".to_string(),
                "logs/**".to_string(),
                ".git/**".to_string(),
            ],
            meta_extension: default_meta_extension(),
            script_extensions: default_script_extensions(),
            packages_root: default_packages_root(),
            builtin_ids: default_builtin_ids(),
            ignore_ids: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace root by looking for .depscan directory
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(".depscan/settings.toml"));

        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path))
            // Layer in environment variables with DEPSCAN_ prefix.
            // Double underscore separates nested levels, single underscore
            // stays as is within field names.
            .merge(
                Env::prefixed("DEPSCAN_")
                    .map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Find the workspace config by looking for a .depscan directory,
    /// searching from the current directory up to the filesystem root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(".depscan");
            if config_dir.exists() && config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Check if configuration is properly initialized
    pub fn check_init() -> Result<(), String> {
        let config_path = if let Some(path) = Self::find_workspace_config() {
            path
        } else {
            PathBuf::from(".depscan/settings.toml")
        };

        if !config_path.exists() {
            return Err("No configuration file found".to_string());
        }

        match std::fs::read_to_string(&config_path) {
            Ok(content) => {
                if let Err(e) = toml::from_str::<Settings>(&content) {
                    return Err(format!(
                        "Configuration file is corrupted: {e}\nRun 'depscan init --force' to regenerate."
                    ));
                }
            }
            Err(e) => {
                return Err(format!("Cannot read configuration file: {e}"));
            }
        }

        Ok(())
    }

    /// Get the workspace root directory (where .depscan is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(".depscan");
            if config_dir.exists() && config_dir.is_dir() {
                return Some(ancestor.to_path_buf());
            }
        }

        None
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(
                Env::prefixed("DEPSCAN_")
                    .map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
            .extract()
            .map_err(Box::new)
    }

    /// The directory the scan pass walks
    pub fn project_root(&self) -> PathBuf {
        self.scan
            .project_root
            .clone()
            .or_else(|| self.workspace_root.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Location of the persisted index blob
    pub fn blob_path(&self) -> PathBuf {
        let base = match &self.workspace_root {
            Some(root) if self.index_path.is_relative() => root.join(&self.index_path),
            _ => self.index_path.clone(),
        };
        base.join(INDEX_BLOB_NAME)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(".depscan/settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        let mut settings = Settings::default();

        // Set workspace root to current directory
        if let Ok(current_dir) = std::env::current_dir() {
            settings.workspace_root = Some(current_dir);
        }

        settings.save(&config_path)?;
        if force && config_path.exists() {
            println!("Overwrote configuration at: {}", config_path.display());
        } else {
            println!("Created default configuration at: {}", config_path.display());
        }

        Self::create_default_ignore_file(force)?;

        Ok(config_path)
    }

    /// Create a default .depscanignore file with helpful patterns
    fn create_default_ignore_file(force: bool) -> Result<(), Box<dyn std::error::Error>> {
        let ignore_path = PathBuf::from(".depscanignore");

        if !force && ignore_path.exists() {
            println!("Found existing .depscanignore file");
            return Ok(());
        }

        let default_content = r#"# depscan ignore patterns (gitignore syntax)
# https://git-scm.com/docs/gitignore
#
# This file tells depscan which files to exclude from scanning.
# Each line specifies a pattern. Patterns follow the same rules as .gitignore.

# Host-generated directories that never carry sidecars worth indexing
Library/
Temp/
Logs/
Build/
Builds/
obj/

# Temporary files
*.tmp
*.bak
*.swp
*~
.DS_Store

# depscan's own directory
.depscan/

# Version control
.git/
.svn/
.hg/

# Example of including specific files from ignored directories:
# !Library/keep-this.meta
"#;

        std::fs::write(&ignore_path, default_content)?;

        if force && ignore_path.exists() {
            println!("Overwrote .depscanignore file");
        } else {
            println!("Created default .depscanignore file");
        }

        Ok(())
    }
}
