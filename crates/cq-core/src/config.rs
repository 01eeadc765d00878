//! Configuration management for the SCM layer
//!
//! Repository-level settings: the Subversion server the commit queue talks
//! to, where the checkout keeps its helper scripts, and ChangeLog naming.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Result, ScmError};

/// Repository-level configuration
///
/// Loaded from `.cq/config.toml` in the checkout root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CqConfig {
    /// Subversion server settings
    #[serde(default)]
    pub svn: SvnServerConfig,

    /// Helper scripts shipped inside the checkout
    #[serde(default)]
    pub scripts: ScriptsConfig,

    /// ChangeLog conventions
    #[serde(default)]
    pub changelog: ChangeLogConfig,

    /// Home directory holding the `.subversion` credential cache
    ///
    /// Defaults to the current user's home directory.
    #[serde(default)]
    pub home_dir: Option<PathBuf>,
}

/// Subversion server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvnServerConfig {
    /// Host name shown when prompting for a login
    #[serde(default = "default_server_host")]
    pub server_host: String,

    /// Authentication realm searched for in cached credentials
    #[serde(default = "default_server_realm")]
    pub server_realm: String,
}

/// Helper script locations, relative to the checkout root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptsConfig {
    #[serde(default = "default_scripts_directory")]
    pub directory: PathBuf,

    #[serde(default = "default_create_patch")]
    pub create_patch: String,

    #[serde(default = "default_apply_patch")]
    pub apply_patch: String,

    #[serde(default = "default_resolve_changelogs")]
    pub resolve_changelogs: String,

    #[serde(default = "default_build_directory")]
    pub build_directory: String,
}

/// ChangeLog conventions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogConfig {
    /// File name that marks a path as a ChangeLog
    #[serde(default = "default_changelog_file_name")]
    pub file_name: String,
}

// Default value providers
fn default_server_host() -> String {
    "svn.webkit.org".to_string()
}

fn default_server_realm() -> String {
    "<http://svn.webkit.org:80> Mac OS Forge".to_string()
}

fn default_scripts_directory() -> PathBuf {
    PathBuf::from("WebKitTools").join("Scripts")
}

fn default_create_patch() -> String {
    "svn-create-patch".to_string()
}

fn default_apply_patch() -> String {
    "svn-apply".to_string()
}

fn default_resolve_changelogs() -> String {
    "resolve-ChangeLogs".to_string()
}

fn default_build_directory() -> String {
    "webkit-build-directory".to_string()
}

fn default_changelog_file_name() -> String {
    "ChangeLog".to_string()
}

impl CqConfig {
    /// Load configuration from `.cq/config.toml` or use defaults
    pub fn load_or_default(repo_root: &Path) -> Result<Self> {
        let config_path = repo_root.join(".cq/config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ScmError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Write default configuration to `.cq/config.toml`
    pub fn write_default(repo_root: &Path) -> Result<()> {
        let config_dir = repo_root.join(".cq");
        std::fs::create_dir_all(&config_dir)?;

        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| ScmError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(config_dir.join("config.toml"), content)?;
        Ok(())
    }

    /// Absolute path of a helper script inside `checkout_root`
    pub fn script_path(&self, checkout_root: &Path, script_name: &str) -> PathBuf {
        checkout_root.join(&self.scripts.directory).join(script_name)
    }
}

impl Default for CqConfig {
    fn default() -> Self {
        Self {
            svn: SvnServerConfig::default(),
            scripts: ScriptsConfig::default(),
            changelog: ChangeLogConfig::default(),
            home_dir: None,
        }
    }
}

impl Default for SvnServerConfig {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            server_realm: default_server_realm(),
        }
    }
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            directory: default_scripts_directory(),
            create_patch: default_create_patch(),
            apply_patch: default_apply_patch(),
            resolve_changelogs: default_resolve_changelogs(),
            build_directory: default_build_directory(),
        }
    }
}

impl Default for ChangeLogConfig {
    fn default() -> Self {
        Self {
            file_name: default_changelog_file_name(),
        }
    }
}
