// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Build and deploy sequencing.
//!
//! # Stages
//!
//! A release moves through the following stages:
//!
//! ```text
//! Start -> TempRelocated -> (Installed | Updated) -> ModeApplied
//!       -> AnalyticsProcessed -> Done
//! ```
//!
//! [`Lifecycle::build`] covers the first transition, and runs at build time
//! while the application tree is still writable. [`Lifecycle::deploy`] covers
//! the rest once the platform has attached its mounts. The two run in separate
//! processes, so everything handed from one to the other goes through the
//! staging tree on disk.
//!
//! Every step is fail fast. The first failure aborts the sequence, and
//! whatever the completed steps did stays done. [`Lifecycle::stage`] tells how
//! far the sequence got.

use crate::{
    context::{ApplicationMode, DeploymentContext},
    database::{self, Connector, Database},
    env::{self, PlatformEnv},
    magento::MagentoCli,
    materialize, relocate,
    settings::Settings,
    shell::{self, CommandLine, Shell},
};

use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{info, instrument};

/// Last stage a release reached.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Start,
    TempRelocated,
    Installed,
    Updated,
    ModeApplied,
    AnalyticsProcessed,
    Done,
}

impl Display for Stage {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Start => "start",
            Self::TempRelocated => "temp relocated",
            Self::Installed => "installed",
            Self::Updated => "updated",
            Self::ModeApplied => "mode applied",
            Self::AnalyticsProcessed => "analytics processed",
            Self::Done => "done",
        };

        fmt.write_str(name)
    }
}

/// Drives build and deploy of a Magento application.
pub struct Lifecycle<S, C>
where
    S: Shell,
    C: Connector,
{
    settings: Settings,
    cli: MagentoCli,
    shell: S,
    connector: C,
    database: Option<C::Database>,
    stage: Stage,
}

impl<S, C> Lifecycle<S, C>
where
    S: Shell,
    C: Connector,
{
    pub fn new(settings: Settings, shell: S, connector: C) -> Self {
        Self {
            cli: MagentoCli::new(&settings),
            settings,
            shell,
            connector,
            database: None,
            stage: Stage::default(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    /// Prepare application tree for read-only deployment.
    ///
    /// Compiles the application when enabled, then moves writable directory
    /// content into the staging tree.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Shell`] if compilation fails.
    /// - Return [`Error::Relocate`] if writable directories cannot be staged.
    #[instrument(skip(self), level = "debug")]
    pub fn build(&mut self) -> Result<()> {
        info!("Start build.");
        if self.settings.magento.compile {
            info!("Enabling modules and compiling dependency injection.");
            self.execute(&self.cli.enable_modules())?;
            self.execute(&self.cli.compile_di())?;
        }

        relocate::stage(&self.settings)?;
        self.advance(Stage::TempRelocated);

        info!("Build finished.");
        Ok(())
    }

    /// Deploy with platform environment of current process.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Env`] if platform environment is missing or malformed.
    /// - Return any error of [`Lifecycle::deploy_with`].
    pub async fn deploy(&mut self) -> Result<()> {
        let env = PlatformEnv::from_env()?;
        self.deploy_with(&env).await
    }

    /// Bring deployed instance in line with given platform environment.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Env`] if a required service relationship is missing.
    /// - Return [`Error::Relocate`] if writable directories cannot be restored.
    /// - Return [`Error::Shell`] if any Magento command fails.
    /// - Return [`Error::Config`] if configuration cannot be rewritten.
    /// - Return [`Error::Database`] if any statement fails.
    #[instrument(skip(self, env), level = "debug")]
    pub async fn deploy_with(&mut self, env: &PlatformEnv) -> Result<()> {
        info!("Start deploy.");
        let context = DeploymentContext::assemble(env)?;

        relocate::restore(&self.settings)?;

        let env_file = self.settings.root_path(&self.settings.paths.env_file);
        if env_file.is_file() {
            info!("File env.php exists.");
            self.update(&context).await?;
            self.advance(Stage::Updated);
        } else {
            info!("File env.php does not exist. Installing Magento.");
            self.install(&context)?;
            self.advance(Stage::Installed);
        }

        self.apply_mode(&context).await?;
        self.advance(Stage::ModeApplied);

        self.process_analytics(&context).await?;
        self.advance(Stage::AnalyticsProcessed);

        self.advance(Stage::Done);
        info!("Deployment finished.");
        Ok(())
    }

    fn install(&self, context: &DeploymentContext) -> Result<()> {
        self.execute(&self.cli.install(context, &self.settings.install))?;
        Ok(())
    }

    async fn update(&mut self, context: &DeploymentContext) -> Result<()> {
        let env_file = self.settings.root_path(&self.settings.paths.env_file);
        materialize::rewrite(&env_file, |document| {
            materialize::apply_context(document, context)
        })?;

        info!("Updating admin credentials.");
        let mut statements = vec![database::admin_credentials(&context.admin)];
        statements.extend(database::search_endpoint(&context.search));
        statements.extend(database::base_urls(&context.urls));
        let db = self.database(context).await?;
        database::execute_all(db, &statements).await?;

        info!("Running schema and data upgrade.");
        self.execute(&self.cli.upgrade())?;

        info!("Clearing generated code.");
        relocate::clear_contents(self.settings.root_path(&self.settings.paths.generated_code))?;

        info!("Flushing cache.");
        self.execute(&self.cli.flush_cache())?;

        Ok(())
    }

    async fn apply_mode(&mut self, context: &DeploymentContext) -> Result<()> {
        info!("Setting application mode to {}.", context.mode);
        self.execute(&self.cli.set_mode(context.mode))?;

        if context.mode == ApplicationMode::Developer {
            let db = self.database(context).await?;
            let locales = db.fetch_strings(&database::locales()).await?;
            info!("Generating static content for locales {locales:?}.");
            self.execute(&self.cli.deploy_static(locales))?;
        }

        Ok(())
    }

    async fn process_analytics(&mut self, context: &DeploymentContext) -> Result<()> {
        if context.is_primary_branch(&self.settings.deploy.primary_branch) {
            info!("Keeping analytics enabled on {:?}.", context.branch);
            return Ok(());
        }

        info!("Disabling analytics on non-primary branch {:?}.", context.branch);
        let statement = database::disable_flag(&self.settings.deploy.analytics_path);
        let db = self.database(context).await?;
        db.execute(&statement).await?;

        Ok(())
    }

    async fn database(&mut self, context: &DeploymentContext) -> Result<&mut C::Database> {
        let database = match self.database.take() {
            Some(database) => database,
            None => self.connector.connect(&context.database).await?,
        };

        Ok(self.database.insert(database))
    }

    fn execute(&self, command: &CommandLine) -> Result<Vec<String>> {
        Ok(self.shell.run(command)?)
    }

    fn advance(&mut self, stage: Stage) {
        info!("Reached stage: {stage}");
        self.stage = stage;
    }
}

/// Lifecycle error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Env(#[from] env::Error),

    #[error(transparent)]
    Shell(#[from] shell::Error),

    #[error(transparent)]
    Config(#[from] materialize::Error),

    #[error(transparent)]
    Database(#[from] database::Error),

    #[error(transparent)]
    Relocate(#[from] relocate::Error),
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
