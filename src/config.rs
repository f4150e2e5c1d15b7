use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use kube::{
    Client, Config,
    config::{KubeConfigOptions, Kubeconfig},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::ConfigError, query::DEFAULT_EXECUTABLE};

/// File name looked up in the home directory when no settings path is given.
pub const SETTINGS_FILE_NAME: &str = ".kubectl-iget.yaml";

/// Connection and executable settings supplied by the surrounding application.
///
/// Nothing in the resolver, lister or query builder reads the environment; a
/// `Settings` value is turned into a [`Client`] and an executable name here and
/// handed to them explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Kubeconfig to read instead of `$KUBECONFIG` / `~/.kube/config`.
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub namespace: Option<String>,
    /// Executable used for queries, `kubectl` by default.
    pub executable: Option<String>,
}

impl Settings {
    /// `~/.kubectl-iget.yaml`, if a home directory can be found.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(SETTINGS_FILE_NAME))
    }

    pub fn from_yaml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read settings from `path`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(path, &text)
    }

    /// Load settings from an explicit path, which must exist, or from the default
    /// path, which may be absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let Some(path) = Self::default_path() else {
            return Ok(Self::default());
        };
        match Self::from_file(&path) {
            Err(ConfigError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Ok(settings) => {
                debug!(path = %path.display(), "using settings file");
                Ok(settings)
            }
            Err(err) => Err(err),
        }
    }

    /// Overlay every value set in `overrides` on top of `self`.
    pub fn merge(self, overrides: Settings) -> Self {
        Self {
            kubeconfig: overrides.kubeconfig.or(self.kubeconfig),
            context: overrides.context.or(self.context),
            namespace: overrides.namespace.or(self.namespace),
            executable: overrides.executable.or(self.executable),
        }
    }

    pub fn executable(&self) -> &str {
        self.executable.as_deref().unwrap_or(DEFAULT_EXECUTABLE)
    }

    /// Read the configured kubeconfig, falling back to the default lookup.
    pub fn read_kubeconfig(&self) -> Result<Kubeconfig, ConfigError> {
        let kubeconfig = match &self.kubeconfig {
            Some(path) => Kubeconfig::read_from(path)?,
            None => Kubeconfig::read()?,
        };
        Ok(kubeconfig)
    }

    /// Build a client for the configured kubeconfig and context.
    pub async fn client(&self) -> Result<Client, ConfigError> {
        let kubeconfig = self.read_kubeconfig()?;
        let options = KubeConfigOptions {
            context: self.context.clone(),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
        Client::try_from(config).map_err(ConfigError::Client)
    }

    /// Namespace to list in: the configured one, else the context's, else `default`.
    pub fn resolve_namespace(&self) -> Result<String, ConfigError> {
        if let Some(namespace) = &self.namespace {
            return Ok(namespace.clone());
        }
        let kubeconfig = self.read_kubeconfig()?;
        let context = determine_context(self.context.as_deref(), &kubeconfig)?;
        Ok(determine_namespace(None, &context, &kubeconfig))
    }
}

/// Detects the Kubernetes context based on the provided `context` argument.
///
/// Context determination follows this priority:
/// 1. Uses the context if explicitly specified.
/// 2. Retrieves the current context from `kubeconfig`.
///
/// # Errors
/// Returns an error if no current context is set in the kubeconfig.
pub fn determine_context(
    context: Option<&str>,
    kubeconfig: &Kubeconfig,
) -> Result<String, ConfigError> {
    match context {
        Some(context) => Ok(context.to_string()),
        None => kubeconfig
            .current_context
            .clone()
            .ok_or(ConfigError::MissingContext),
    }
}

/// Determines the Kubernetes namespace based on the provided `namespace` and `context`.
///
/// Namespace determination follows this priority:
/// 1. Uses the namespace if explicitly specified.
/// 2. Retrieves the default namespace associated with `context` from `kubeconfig`.
/// 3. Uses "default".
pub fn determine_namespace(
    namespace: Option<String>,
    context: &str,
    kubeconfig: &Kubeconfig,
) -> String {
    if let Some(ns) = namespace {
        return ns;
    }

    kubeconfig
        .contexts
        .iter()
        .find(|c| c.name == context)
        .and_then(|named| named.context.as_ref())
        .and_then(|ctx| ctx.namespace.clone())
        .unwrap_or_else(|| String::from("default"))
}
