// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Magento CLI invocations.
//!
//! Builds command lines for `bin/magento`. Nothing here runs anything, the
//! lifecycle hands the result to a [`crate::shell::Shell`].

use crate::{
    context::{ApplicationMode, DeploymentContext},
    route::UrlKind,
    settings::{InstallSettings, Settings},
    shell::CommandLine,
};

use std::path::PathBuf;
use tracing::warn;

/// Command line builder for the Magento CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagentoCli {
    php: String,
    bin: PathBuf,
    root: PathBuf,
}

impl MagentoCli {
    pub fn new(settings: &Settings) -> Self {
        Self {
            php: settings.magento.php.clone(),
            bin: settings.magento.bin.clone(),
            root: settings.paths.root.clone(),
        }
    }

    /// Bare Magento command run from application root.
    pub fn command(&self, name: &str) -> CommandLine {
        CommandLine::new(self.php.as_str())
            .arg(self.bin.to_string_lossy())
            .arg(name)
            .current_dir(self.root.as_path())
    }

    /// First time installation.
    ///
    /// The database password option is left out entirely when the password is
    /// empty. Base URL options are left out when no default route exists.
    pub fn install(&self, context: &DeploymentContext, defaults: &InstallSettings) -> CommandLine {
        let mut command = self
            .command("setup:install")
            .opt("currency", &defaults.currency);

        match context.urls.default_url(UrlKind::Unsecure) {
            Some(url) => command = command.opt("base-url", url),
            None => warn!("no default unsecure route, installing without base url"),
        }
        match context.urls.default_url(UrlKind::Secure) {
            Some(url) => command = command.opt("base-url-secure", url),
            None => warn!("no default secure route, installing without secure base url"),
        }

        command = command
            .opt("language", &defaults.locale)
            .opt("timezone", &defaults.timezone)
            .opt("db-host", &context.database.host)
            .opt("db-name", &context.database.name)
            .opt("db-user", &context.database.username);
        if !context.database.password.is_empty() {
            command = command.secret_opt("db-password", &context.database.password);
        }

        let admin = &context.admin;
        command
            .opt("backend-frontname", &admin.backend_path)
            .opt("admin-user", &admin.username)
            .opt("admin-firstname", &admin.firstname)
            .opt("admin-lastname", &admin.lastname)
            .opt("admin-email", &admin.email)
            .secret_opt("admin-password", &admin.password)
    }

    pub fn enable_modules(&self) -> CommandLine {
        self.command("module:enable").arg("--all")
    }

    pub fn compile_di(&self) -> CommandLine {
        self.command("setup:di:compile")
    }

    /// Schema and data upgrade, keeping generated code from the build.
    pub fn upgrade(&self) -> CommandLine {
        self.command("setup:upgrade").arg("--keep-generated")
    }

    pub fn flush_cache(&self) -> CommandLine {
        self.command("cache:flush")
    }

    pub fn set_mode(&self, mode: ApplicationMode) -> CommandLine {
        self.command("deploy:mode:set")
            .arg(mode.as_str())
            .arg("--skip-compilation")
    }

    /// Static asset generation, for every locale when none are given.
    pub fn deploy_static<I, L>(&self, locales: I) -> CommandLine
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        self.command("setup:static-content:deploy").args(locales)
    }
}
