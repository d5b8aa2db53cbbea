// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Direct database updates.
//!
//! Some settings only live in the database, e.g., base URLs, search service
//! location, and the admin account. These are updated with a small fixed set
//! of statements. Every environment derived value is bound as a parameter,
//! never spliced into the SQL text.

use crate::{
    context::{AdminIdentity, DbCredentials, SearchEndpoint},
    password,
    route::{UrlKind, UrlTable},
};

use sqlx::{
    mysql::{MySqlConnectOptions, MySqlConnection},
    ConnectOptions,
};
use std::future::Future;
use tracing::{debug, info, instrument};

pub const UPDATE_ADMIN: &str = "UPDATE admin_user SET firstname = ?, lastname = ?, email = ?, \
     username = ?, password = ? WHERE user_id = 1";

pub const UPDATE_CONFIG: &str =
    "UPDATE core_config_data SET value = ? WHERE path = ? AND scope_id = 0";

pub const UPDATE_CONFIG_LIKE: &str =
    "UPDATE core_config_data SET value = ? WHERE path = ? AND (value LIKE ? OR value LIKE ?)";

pub const SELECT_LOCALES: &str =
    "SELECT DISTINCT value FROM core_config_data WHERE path = 'general/locale/code'";

pub const SOLR_HOSTNAME: &str = "catalog/search/solr_server_hostname";
pub const SOLR_PORT: &str = "catalog/search/solr_server_port";
pub const SOLR_USERNAME: &str = "catalog/search/solr_server_username";
pub const SOLR_PATH: &str = "catalog/search/solr_server_path";

/// Fixed SQL template with bound parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: &'static str,
    pub params: Vec<String>,
}

impl Statement {
    pub fn new(sql: &'static str) -> Self {
        Self {
            sql,
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<String>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// Executes statements against the application database.
pub trait Database {
    /// Execute statement, returning number of affected rows.
    fn execute(&mut self, statement: &Statement) -> impl Future<Output = Result<u64>>;

    /// Execute query, returning first column of every non-null row.
    fn fetch_strings(&mut self, statement: &Statement) -> impl Future<Output = Result<Vec<String>>>;
}

/// Opens database connections.
pub trait Connector {
    type Database: Database;

    fn connect(&self, credentials: &DbCredentials) -> impl Future<Output = Result<Self::Database>>;
}

/// MySQL connector.
#[derive(Debug, Default, Clone)]
pub struct MySqlConnector;

impl Connector for MySqlConnector {
    type Database = MySqlDatabase;

    #[instrument(skip(self, credentials), level = "debug")]
    async fn connect(&self, credentials: &DbCredentials) -> Result<MySqlDatabase> {
        debug!(
            "connect to {}@{}:{}/{}",
            credentials.username, credentials.host, credentials.port, credentials.name
        );

        let mut options = MySqlConnectOptions::new()
            .host(&credentials.host)
            .port(credentials.port)
            .username(&credentials.username)
            .database(&credentials.name);
        if !credentials.password.is_empty() {
            options = options.password(&credentials.password);
        }

        let connection = options.connect().await.map_err(Error::Connect)?;
        Ok(MySqlDatabase { connection })
    }
}

/// Single MySQL connection.
#[derive(Debug)]
pub struct MySqlDatabase {
    connection: MySqlConnection,
}

impl Database for MySqlDatabase {
    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        debug!("execute: {} {:?}", statement.sql, statement.params);
        let mut query = sqlx::query(statement.sql);
        for param in &statement.params {
            query = query.bind(param.as_str());
        }

        let done = query
            .execute(&mut self.connection)
            .await
            .map_err(|err| Error::Statement {
                sql: statement.sql,
                source: err,
            })?;

        Ok(done.rows_affected())
    }

    async fn fetch_strings(&mut self, statement: &Statement) -> Result<Vec<String>> {
        debug!("query: {} {:?}", statement.sql, statement.params);
        let mut query = sqlx::query_scalar::<_, Option<String>>(statement.sql);
        for param in &statement.params {
            query = query.bind(param.as_str());
        }

        let rows = query
            .fetch_all(&mut self.connection)
            .await
            .map_err(|err| Error::Statement {
                sql: statement.sql,
                source: err,
            })?;

        Ok(rows.into_iter().flatten().collect())
    }
}

/// Statement to replace admin account with new identity.
///
/// The password is hashed with a fresh salt every call.
pub fn admin_credentials(admin: &AdminIdentity) -> Statement {
    Statement::new(UPDATE_ADMIN)
        .bind(admin.firstname.as_str())
        .bind(admin.lastname.as_str())
        .bind(admin.email.as_str())
        .bind(admin.username.as_str())
        .bind(password::hash(&admin.password))
}

/// Statements pointing search configuration at the Solr service.
///
/// The username field carries the scheme, following the legacy layout of the
/// search configuration.
pub fn search_endpoint(search: &SearchEndpoint) -> Vec<Statement> {
    [
        (SOLR_HOSTNAME, search.host.clone()),
        (SOLR_PORT, search.port.to_string()),
        (SOLR_USERNAME, search.scheme.clone()),
        (SOLR_PATH, search.path.clone()),
    ]
    .into_iter()
    .map(|(path, value)| Statement::new(UPDATE_CONFIG).bind(value).bind(path))
    .collect()
}

/// Statements replacing stored base URLs with current routes.
///
/// The default route overwrites the global base URL outright. Any other
/// route rewrites every stored URL that starts with its host stem, either
/// literally or with dots written as "---". The stem keeps its separator dot,
/// so "shop." never matches URLs of "shopping.".
pub fn base_urls(urls: &UrlTable) -> Vec<Statement> {
    urls.iter()
        .map(|(kind, fragment, entry)| {
            let path = format!("web/{}/base_url", kind.as_str());
            if fragment.is_empty() {
                return Statement::new(UPDATE_CONFIG)
                    .bind(entry.url.as_str())
                    .bind(path);
            }

            let (literal, dashed) = like_patterns(kind, &entry.stem);
            Statement::new(UPDATE_CONFIG_LIKE)
                .bind(entry.url.as_str())
                .bind(path)
                .bind(literal)
                .bind(dashed)
        })
        .collect()
}

fn like_patterns(kind: UrlKind, stem: &str) -> (String, String) {
    let literal = format!("{}{}%", kind.prefix(), escape_like(stem));
    let dashed = format!(
        "{}{}%",
        kind.prefix(),
        escape_like(&stem.replace('.', "---"))
    );

    (literal, dashed)
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Statement disabling a boolean configuration flag globally.
pub fn disable_flag(path: &str) -> Statement {
    Statement::new(UPDATE_CONFIG).bind("0").bind(path)
}

/// Query listing every configured locale.
pub fn locales() -> Statement {
    Statement::new(SELECT_LOCALES)
}

/// Execute batch of statements in order, stopping at first failure.
///
/// # Errors
///
/// - Return [`Error::Statement`] if any statement fails.
pub async fn execute_all<D>(database: &mut D, statements: &[Statement]) -> Result<u64>
where
    D: Database,
{
    let mut affected = 0;
    for statement in statements {
        affected += database.execute(statement).await?;
    }

    info!("updated {affected} rows");
    Ok(affected)
}

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connection could not be opened.
    #[error("failed to connect to database")]
    Connect(#[source] sqlx::Error),

    /// Statement failed.
    #[error("statement `{sql}` failed")]
    Statement {
        sql: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
