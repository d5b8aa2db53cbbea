// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use magento_platformsh::{
    context::{DbCredentials, CACHE_SERVICE, DATABASE_SERVICE, SEARCH_SERVICE},
    database::{self, Connector, Database, Statement},
    env::{self, PlatformEnv, Relationship, Relationships, Route, Routes, Variables},
    lifecycle::{Error, Lifecycle, Stage},
    materialize,
    settings::Settings,
    shell::{self, CommandLine, Shell},
};

use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::{
    cell::RefCell,
    fs::{create_dir_all, read_dir, read_to_string, write},
    path::{Path, PathBuf},
    rc::Rc,
};
use tempfile::TempDir;

/// Shell that records every command line instead of running it.
#[derive(Debug, Default)]
struct RecordingShell {
    commands: RefCell<Vec<CommandLine>>,
    fail_on: Option<&'static str>,
}

impl RecordingShell {
    fn failing_on(subcommand: &'static str) -> Self {
        Self {
            fail_on: Some(subcommand),
            ..Default::default()
        }
    }

    /// Magento subcommand of every recorded command line, in order.
    fn subcommands(&self) -> Vec<String> {
        self.commands
            .borrow()
            .iter()
            .filter_map(|command| command.arg_values().nth(1).map(String::from))
            .collect()
    }

    fn command(&self, subcommand: &str) -> Option<CommandLine> {
        self.commands
            .borrow()
            .iter()
            .find(|command| command.arg_values().nth(1) == Some(subcommand))
            .cloned()
    }
}

impl Shell for RecordingShell {
    fn run(&self, command: &CommandLine) -> shell::Result<Vec<String>> {
        self.commands.borrow_mut().push(command.clone());
        match self.fail_on {
            Some(subcommand) if command.has_arg(subcommand) => Err(shell::Error::CommandFailed {
                command: command.to_string(),
                status: Some(1),
            }),
            _ => Ok(Vec::new()),
        }
    }
}

/// Connector whose connections record every statement they receive.
#[derive(Debug, Default, Clone)]
struct RecordingConnector {
    statements: Rc<RefCell<Vec<Statement>>>,
    connections: Rc<RefCell<Vec<DbCredentials>>>,
    locales: Vec<String>,
}

impl RecordingConnector {
    fn with_locales(locales: &[&str]) -> Self {
        Self {
            locales: locales.iter().map(|locale| locale.to_string()).collect(),
            ..Default::default()
        }
    }

    fn statements(&self) -> Vec<Statement> {
        self.statements.borrow().clone()
    }
}

impl Connector for RecordingConnector {
    type Database = RecordingDatabase;

    async fn connect(&self, credentials: &DbCredentials) -> database::Result<RecordingDatabase> {
        self.connections.borrow_mut().push(credentials.clone());
        Ok(RecordingDatabase {
            statements: self.statements.clone(),
            locales: self.locales.clone(),
        })
    }
}

#[derive(Debug)]
struct RecordingDatabase {
    statements: Rc<RefCell<Vec<Statement>>>,
    locales: Vec<String>,
}

impl Database for RecordingDatabase {
    async fn execute(&mut self, statement: &Statement) -> database::Result<u64> {
        self.statements.borrow_mut().push(statement.clone());
        Ok(1)
    }

    async fn fetch_strings(&mut self, statement: &Statement) -> database::Result<Vec<String>> {
        self.statements.borrow_mut().push(statement.clone());
        Ok(self.locales.clone())
    }
}

/// Application tree inside a scratch directory.
struct AppFixture {
    dir: TempDir,
}

impl AppFixture {
    fn new() -> Result<Self> {
        let dir = TempDir::new()?;

        // INVARIANT: Application root must exist so the sibling staging tree
        //   can be reached through "../init".
        create_dir_all(dir.path().join("app"))?;

        Ok(Self { dir })
    }

    fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.paths.root = self.dir.path().join("app");
        settings
    }

    fn app(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join("app").join(relative)
    }

    fn init(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join("init").join(relative)
    }

    fn write_app(&self, relative: impl AsRef<Path>, contents: &str) -> Result<()> {
        let path = self.app(relative);
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        write(path, contents)?;
        Ok(())
    }
}

const ENV_PHP: &str = indoc! {r#"
    <?php
    return [
        'backend' => ['frontName' => 'admin'],
        'db' => [
            'connection' => [
                'default' => ['host' => 'old.internal', 'dbname' => 'old', 'username' => 'old', 'password' => ''],
            ],
        ],
        'cache' => [
            'frontend' => [
                'default' => [
                    'backend' => 'Cm_Cache_Backend_Redis',
                    'backend_options' => ['server' => 'old.redis', 'port' => '6000'],
                ],
            ],
        ],
    ];
"#};

fn upstream(template: &str) -> Route {
    Route {
        kind: "upstream".into(),
        original_url: Some(template.into()),
    }
}

fn platform_env(branch: &str, db_password: &str, variables: Variables) -> PlatformEnv {
    PlatformEnv {
        routes: Routes::new([
            ("http://main.example.com/", upstream("http://{default}/")),
            ("https://main.example.com/", upstream("https://{default}/")),
        ]),
        relationships: Relationships::new([
            (
                DATABASE_SERVICE,
                vec![Relationship {
                    host: Some("db.internal".into()),
                    path: Some("main".into()),
                    username: Some("u".into()),
                    password: Some(db_password.into()),
                    ..Default::default()
                }],
            ),
            (
                CACHE_SERVICE,
                vec![Relationship {
                    host: Some("redis.internal".into()),
                    scheme: Some("redis".into()),
                    port: Some(6379),
                    ..Default::default()
                }],
            ),
            (
                SEARCH_SERVICE,
                vec![Relationship {
                    host: Some("solr.internal".into()),
                    path: Some("solr".into()),
                    scheme: Some("solr".into()),
                    port: Some(8080),
                    ..Default::default()
                }],
            ),
        ]),
        variables,
        branch: branch.into(),
    }
}

#[test]
fn build_compiles_then_stages_writable_dirs() -> Result<()> {
    let fixture = AppFixture::new()?;
    fixture.write_app("var/di/compiled.php", "<?php return [];")?;
    fixture.write_app("app/etc/config.php", "<?php return [];")?;

    let mut lifecycle = Lifecycle::new(
        fixture.settings(),
        RecordingShell::default(),
        RecordingConnector::default(),
    );
    lifecycle.build()?;

    assert_eq!(
        lifecycle.shell().subcommands(),
        vec!["module:enable", "setup:di:compile"]
    );
    assert_eq!(
        read_to_string(fixture.init("var/di/compiled.php"))?,
        "<?php return [];"
    );
    assert!(fixture.init("app/etc/config.php").is_file());
    assert_eq!(read_dir(fixture.app("var/di"))?.count(), 0);
    assert!(fixture.app("var/generation").is_dir());
    assert_eq!(lifecycle.stage(), Stage::TempRelocated);

    Ok(())
}

#[test]
fn build_without_compile() -> Result<()> {
    let fixture = AppFixture::new()?;
    let mut settings = fixture.settings();
    settings.magento.compile = false;

    let mut lifecycle = Lifecycle::new(
        settings,
        RecordingShell::default(),
        RecordingConnector::default(),
    );
    lifecycle.build()?;

    assert!(lifecycle.shell().subcommands().is_empty());
    assert_eq!(lifecycle.stage(), Stage::TempRelocated);

    Ok(())
}

#[tokio::test]
async fn deploy_installs_without_empty_db_password() -> Result<()> {
    let fixture = AppFixture::new()?;
    let connector = RecordingConnector::default();
    let mut lifecycle = Lifecycle::new(
        fixture.settings(),
        RecordingShell::default(),
        connector.clone(),
    );

    lifecycle
        .deploy_with(&platform_env("master", "", Variables::default()))
        .await?;

    let shell = lifecycle.shell();
    assert_eq!(shell.subcommands(), vec!["setup:install", "deploy:mode:set"]);

    let install = shell
        .command("setup:install")
        .ok_or_else(|| anyhow::anyhow!("install never ran"))?;
    assert!(!install.arg_values().any(|arg| arg.starts_with("--db-password")));
    assert!(install.has_arg("--db-host=db.internal"));
    assert!(install.has_arg("--db-name=main"));
    assert!(install.has_arg("--db-user=u"));
    assert!(install.has_arg("--base-url=http://main.example.com/"));
    assert!(install.has_arg("--base-url-secure=https://main.example.com/"));

    let mode = shell
        .command("deploy:mode:set")
        .ok_or_else(|| anyhow::anyhow!("mode never set"))?;
    assert!(mode.has_arg("production"));

    assert!(connector.statements().is_empty());
    assert!(connector.connections.borrow().is_empty());
    assert_eq!(lifecycle.stage(), Stage::Done);

    Ok(())
}

#[tokio::test]
async fn deploy_restores_staged_content() -> Result<()> {
    let fixture = AppFixture::new()?;
    create_dir_all(fixture.init("var/di"))?;
    write(fixture.init("var/di/compiled.php"), "<?php return [];")?;

    let mut lifecycle = Lifecycle::new(
        fixture.settings(),
        RecordingShell::default(),
        RecordingConnector::default(),
    );
    lifecycle
        .deploy_with(&platform_env("master", "", Variables::default()))
        .await?;

    assert_eq!(
        read_to_string(fixture.app("var/di/compiled.php"))?,
        "<?php return [];"
    );
    assert!(fixture.app("var/generation").is_dir());
    assert!(fixture.app("app/etc").is_dir());

    Ok(())
}

#[tokio::test]
async fn deploy_updates_existing_install() -> Result<()> {
    let fixture = AppFixture::new()?;
    fixture.write_app("app/etc/env.php", ENV_PHP)?;
    fixture.write_app("var/generation/Magento/Interceptor.php", "<?php")?;

    let connector = RecordingConnector::default();
    let mut lifecycle = Lifecycle::new(
        fixture.settings(),
        RecordingShell::default(),
        connector.clone(),
    );
    lifecycle
        .deploy_with(&platform_env("master", "secret", Variables::default()))
        .await?;

    assert_eq!(
        lifecycle.shell().subcommands(),
        vec!["setup:upgrade", "cache:flush", "deploy:mode:set"]
    );

    let env_php = read_to_string(fixture.app("app/etc/env.php"))?;
    assert!(env_php.contains("'host' => 'db.internal',"));
    assert!(env_php.contains("'password' => 'secret',"));
    assert!(env_php.contains("'server' => 'redis.internal',"));
    assert!(env_php.contains("'indexer' => ["));
    assert!(!env_php.contains("old.internal"));

    let statements = connector.statements();
    let sql = statements
        .iter()
        .map(|statement| statement.sql)
        .collect::<Vec<_>>();
    assert_eq!(
        sql,
        vec![
            database::UPDATE_ADMIN,
            database::UPDATE_CONFIG,
            database::UPDATE_CONFIG,
            database::UPDATE_CONFIG,
            database::UPDATE_CONFIG,
            database::UPDATE_CONFIG,
            database::UPDATE_CONFIG,
        ]
    );
    assert_eq!(
        statements[5].params,
        vec!["http://main.example.com/", "web/unsecure/base_url"]
    );
    assert_eq!(
        statements[6].params,
        vec!["https://main.example.com/", "web/secure/base_url"]
    );
    assert_eq!(connector.connections.borrow().len(), 1);

    assert!(fixture.app("var/generation").is_dir());
    assert_eq!(read_dir(fixture.app("var/generation"))?.count(), 0);
    assert_eq!(lifecycle.stage(), Stage::Done);

    Ok(())
}

#[tokio::test]
async fn deploy_disables_analytics_off_primary_branch() -> Result<()> {
    let fixture = AppFixture::new()?;
    let connector = RecordingConnector::default();
    let mut lifecycle = Lifecycle::new(
        fixture.settings(),
        RecordingShell::default(),
        connector.clone(),
    );
    lifecycle
        .deploy_with(&platform_env("feature-x", "", Variables::default()))
        .await?;

    assert_eq!(
        connector.statements(),
        vec![database::disable_flag("google/analytics/active")]
    );

    let connector = RecordingConnector::default();
    let mut lifecycle = Lifecycle::new(
        fixture.settings(),
        RecordingShell::default(),
        connector.clone(),
    );
    lifecycle
        .deploy_with(&platform_env("master", "", Variables::default()))
        .await?;

    assert!(connector.statements().is_empty());

    Ok(())
}

#[tokio::test]
async fn deploy_developer_mode_generates_static_content() -> Result<()> {
    let fixture = AppFixture::new()?;
    let connector = RecordingConnector::with_locales(&["en_US", "de_DE"]);
    let mut lifecycle = Lifecycle::new(
        fixture.settings(),
        RecordingShell::default(),
        connector.clone(),
    );
    let variables = Variables::new([("APPLICATION_MODE", "developer")]);
    lifecycle
        .deploy_with(&platform_env("master", "", variables))
        .await?;

    let shell = lifecycle.shell();
    assert_eq!(
        shell.subcommands(),
        vec!["setup:install", "deploy:mode:set", "setup:static-content:deploy"]
    );

    let result = shell
        .command("setup:static-content:deploy")
        .ok_or_else(|| anyhow::anyhow!("static content never deployed"))?;
    assert_eq!(
        result.arg_values().skip(2).collect::<Vec<_>>(),
        vec!["en_US", "de_DE"]
    );
    assert_eq!(connector.statements(), vec![database::locales()]);

    Ok(())
}

#[tokio::test]
async fn deploy_stops_at_first_failed_command() -> Result<()> {
    let fixture = AppFixture::new()?;
    let connector = RecordingConnector::default();
    let mut lifecycle = Lifecycle::new(
        fixture.settings(),
        RecordingShell::failing_on("setup:install"),
        connector.clone(),
    );

    let result = lifecycle
        .deploy_with(&platform_env("feature-x", "", Variables::default()))
        .await;

    assert!(matches!(
        result,
        Err(Error::Shell(shell::Error::CommandFailed { status: Some(1), .. }))
    ));
    assert_eq!(lifecycle.shell().subcommands(), vec!["setup:install"]);
    assert!(connector.statements().is_empty());
    assert_eq!(lifecycle.stage(), Stage::Start);

    Ok(())
}

#[tokio::test]
async fn deploy_update_stops_at_failed_upgrade() -> Result<()> {
    let fixture = AppFixture::new()?;
    fixture.write_app("app/etc/env.php", ENV_PHP)?;

    let connector = RecordingConnector::default();
    let mut lifecycle = Lifecycle::new(
        fixture.settings(),
        RecordingShell::failing_on("setup:upgrade"),
        connector.clone(),
    );
    let result = lifecycle
        .deploy_with(&platform_env("feature-x", "", Variables::default()))
        .await;

    assert!(matches!(
        result,
        Err(Error::Shell(shell::Error::CommandFailed { .. }))
    ));
    assert_eq!(lifecycle.shell().subcommands(), vec!["setup:upgrade"]);

    let analytics = database::disable_flag("google/analytics/active");
    let statements = connector.statements();
    assert_eq!(statements.len(), 7);
    assert!(!statements.contains(&analytics));
    assert_eq!(lifecycle.stage(), Stage::Start);

    Ok(())
}

#[tokio::test]
async fn deploy_update_rejects_unparseable_env_php() -> Result<()> {
    let fixture = AppFixture::new()?;
    let content = "<?php return include __DIR__ . '/env.local.php';";
    fixture.write_app("app/etc/env.php", content)?;

    let connector = RecordingConnector::default();
    let mut lifecycle = Lifecycle::new(
        fixture.settings(),
        RecordingShell::default(),
        connector.clone(),
    );
    let result = lifecycle
        .deploy_with(&platform_env("feature-x", "", Variables::default()))
        .await;

    assert!(matches!(
        result,
        Err(Error::Config(materialize::Error::ConfigParseError { .. }))
    ));
    assert!(connector.connections.borrow().is_empty());
    assert!(connector.statements().is_empty());
    assert!(lifecycle.shell().subcommands().is_empty());
    assert_eq!(read_to_string(fixture.app("app/etc/env.php"))?, content);

    Ok(())
}

#[tokio::test]
async fn deploy_requires_every_service() -> Result<()> {
    let fixture = AppFixture::new()?;
    let mut platform = platform_env("master", "", Variables::default());
    platform.relationships = Relationships::new([(
        DATABASE_SERVICE,
        vec![Relationship {
            host: Some("db.internal".into()),
            ..Default::default()
        }],
    )]);

    let mut lifecycle = Lifecycle::new(
        fixture.settings(),
        RecordingShell::default(),
        RecordingConnector::default(),
    );
    let result = lifecycle.deploy_with(&platform).await;

    assert!(matches!(
        result,
        Err(Error::Env(env::Error::MissingService { .. }))
    ));
    assert!(lifecycle.shell().subcommands().is_empty());
    assert!(!fixture.app("var/di").exists());
    assert_eq!(lifecycle.stage(), Stage::Start);

    Ok(())
}
