// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deployment settings layout.
//!
//! Everything about a deployment that does not come from the platform
//! environment lives here: where the application root is, which directories
//! must stay writable, install defaults, and how to reach the Magento CLI.
//! Every field has a default, so a settings file only needs to list what it
//! overrides.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Deployment settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub install: InstallSettings,
    pub magento: MagentoSettings,
    pub deploy: DeploySettings,
}

impl Settings {
    /// Load settings file from target path.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Read`] if file cannot be read.
    /// - Return [`Error::Deserialize`] or [`Error::ShellExpansion`] if file
    ///   content is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = read_to_string(path.as_ref()).map_err(|err| Error::Read {
            source: err,
            path: path.as_ref().into(),
        })?;

        data.parse()
    }

    /// Application root relative path to target writable directory.
    pub fn root_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.paths.root.join(relative)
    }

    /// Staging tree counterpart of target writable directory.
    pub fn init_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.paths.root.join(&self.paths.init).join(relative)
    }
}

impl FromStr for Settings {
    type Err = Error;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(Error::Deserialize)?;

        // INVARIANT: Perform shell expansion on filesystem locations.
        settings.paths.root = expand(&settings.paths.root)?;
        settings.paths.init = expand(&settings.paths.init)?;

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(Error::Serialize)?
                .as_str(),
        )
    }
}

fn expand(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(Error::ShellExpansion)?
            .into_owned(),
    ))
}

/// Filesystem layout of the application.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathSettings {
    /// Application root.
    pub root: PathBuf,

    /// Staging tree for writable directories, relative to root.
    pub init: PathBuf,

    /// Directories that must be writable at runtime, relative to root.
    pub writable: Vec<PathBuf>,

    /// Persisted configuration document, relative to root.
    pub env_file: PathBuf,

    /// Generated code directory cleared on update, relative to root.
    pub generated_code: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            init: PathBuf::from("../init"),
            writable: vec![
                PathBuf::from("var/di"),
                PathBuf::from("var/generation"),
                PathBuf::from("app/etc"),
            ],
            env_file: PathBuf::from("app/etc/env.php"),
            generated_code: PathBuf::from("var/generation"),
        }
    }
}

/// Defaults passed to first time installation.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InstallSettings {
    pub currency: String,
    pub locale: String,
    pub timezone: String,
}

impl Default for InstallSettings {
    fn default() -> Self {
        Self {
            currency: "USD".into(),
            locale: "en_US".into(),
            timezone: "America/Los_Angeles".into(),
        }
    }
}

/// How to invoke the Magento CLI.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MagentoSettings {
    /// PHP interpreter.
    pub php: String,

    /// Magento CLI script, relative to root.
    pub bin: PathBuf,

    /// Enable modules and compile dependency injection during build.
    pub compile: bool,
}

impl Default for MagentoSettings {
    fn default() -> Self {
        Self {
            php: "php".into(),
            bin: PathBuf::from("bin/magento"),
            compile: true,
        }
    }
}

/// Deploy time behavior.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeploySettings {
    /// Branch considered production. Analytics stay enabled only here.
    pub primary_branch: String,

    /// Configuration path of the analytics toggle.
    pub analytics_path: String,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            primary_branch: "master".into(),
            analytics_path: "google/analytics/active".into(),
        }
    }
}

/// Settings error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to read settings file.
    #[error("failed to read settings at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize settings.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize settings.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on settings.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<Error> for FmtError {
    fn from(_: Error) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
