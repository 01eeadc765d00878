//! Build directory and default build configuration lookup
//!
//! Both come from the checkout's perl tooling and are expensive to compute,
//! so they are cached until [`BuildConfig::invalidate`] is called.

use cq_core::{CqConfig, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::backend::ScmContext;
use crate::command::{path_arg, ErrorPolicy, Executive, Invocation};

/// File in the top-level build directory naming the default configuration
const CONFIGURATION_FILE: &str = "Configuration";

/// Used when no configuration has been set
const FALLBACK_CONFIGURATION: &str = "Release";

/// A recognized build configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Configuration {
    Debug,
    Release,
}

impl Configuration {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Debug" => Some(Self::Debug),
            "Release" => Some(Self::Release),
            _ => None,
        }
    }

    /// Flag understood by the build scripts
    pub fn flag(self) -> &'static str {
        match self {
            Self::Debug => "--debug",
            Self::Release => "--release",
        }
    }
}

impl std::fmt::Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "Debug"),
            Self::Release => write!(f, "Release"),
        }
    }
}

/// Memoized build settings for one checkout
#[derive(Debug)]
pub struct BuildConfig {
    executive: Executive,
    config: Arc<CqConfig>,
    checkout_root: PathBuf,
    build_directories: Mutex<HashMap<Option<Configuration>, PathBuf>>,
    default_configuration: Mutex<Option<String>>,
}

impl BuildConfig {
    pub fn new(ctx: &ScmContext, checkout_root: impl Into<PathBuf>) -> Self {
        Self {
            executive: ctx.executive.clone(),
            config: ctx.config.clone(),
            checkout_root: checkout_root.into(),
            build_directories: Mutex::new(HashMap::new()),
            default_configuration: Mutex::new(None),
        }
    }

    pub fn checkout_root(&self) -> &Path {
        &self.checkout_root
    }

    /// Build directory for `configuration`, or the top-level one for `None`
    #[instrument(skip(self))]
    pub async fn build_directory(&self, configuration: Option<Configuration>) -> Result<PathBuf> {
        let mut cache = self.build_directories.lock().await;
        if let Some(directory) = cache.get(&configuration) {
            return Ok(directory.clone());
        }

        let script = self
            .config
            .script_path(&self.checkout_root, &self.config.scripts.build_directory);
        let mut args = vec!["perl".to_string(), path_arg(&script)];
        match configuration {
            Some(configuration) => {
                args.push("--configuration".to_string());
                args.push(configuration.flag().to_string());
            }
            None => args.push("--top-level".to_string()),
        }

        let output = self
            .executive
            .run_command(Invocation::new(args).cwd(&self.checkout_root), ErrorPolicy::Raise)
            .await?;
        let directory = PathBuf::from(output.trim_end());
        debug!("Build directory: {}", directory.display());
        cache.insert(configuration, directory.clone());
        Ok(directory)
    }

    /// Configuration chosen with `set-webkit-configuration`, else `Release`
    ///
    /// Unrecognized names are returned as-is with a warning.
    pub async fn default_configuration(&self) -> Result<String> {
        let mut cached = self.default_configuration.lock().await;
        if let Some(configuration) = cached.as_ref() {
            return Ok(configuration.clone());
        }

        let configuration = self
            .read_configuration()
            .await?
            .map(|contents| match contents.as_str() {
                "Deployment" => "Release".to_string(),
                "Development" => "Debug".to_string(),
                _ => contents,
            })
            .filter(|contents| !contents.is_empty())
            .unwrap_or_else(|| FALLBACK_CONFIGURATION.to_string());

        if Configuration::from_name(&configuration).is_none() {
            warn!(
                "Configuration \"{}\" is not a recognized value. Scripts may fail. See 'set-webkit-configuration --help'.",
                configuration
            );
        }

        *cached = Some(configuration.clone());
        Ok(configuration)
    }

    /// Drop every cached value
    pub async fn invalidate(&self) {
        self.build_directories.lock().await.clear();
        self.default_configuration.lock().await.take();
    }

    async fn read_configuration(&self) -> Result<Option<String>> {
        let path = self.build_directory(None).await?.join(CONFIGURATION_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let contents = tokio::fs::read_to_string(&path).await?;
        Ok(Some(contents.trim_end().to_string()))
    }
}
