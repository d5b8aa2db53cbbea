// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deployment context.
//!
//! Assembled once from the platform environment at the start of a deploy, and
//! passed by reference to every step afterwards. Nothing mutates it.

use crate::{
    env::{PlatformEnv, Relationships, Result, Variables},
    route::UrlTable,
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};
use tracing::{info, warn};

pub const DATABASE_SERVICE: &str = "database";
pub const CACHE_SERVICE: &str = "redis";
pub const SEARCH_SERVICE: &str = "solr";

/// Everything a deploy needs to know, derived from the platform environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentContext {
    pub urls: UrlTable,
    pub database: DbCredentials,
    pub cache: CacheEndpoint,
    pub search: SearchEndpoint,
    pub admin: AdminIdentity,
    pub mode: ApplicationMode,
    pub branch: String,
}

impl DeploymentContext {
    /// Assemble context from platform environment.
    ///
    /// # Errors
    ///
    /// - Return [`crate::env::Error::MissingService`] if the database, cache,
    ///   or search relationship has no connection descriptor.
    pub fn assemble(env: &PlatformEnv) -> Result<Self> {
        info!("Preparing environment specific data.");

        let context = Self {
            urls: UrlTable::classify(&env.routes),
            database: DbCredentials::from_relationships(&env.relationships)?,
            cache: CacheEndpoint::from_relationships(&env.relationships)?,
            search: SearchEndpoint::from_relationships(&env.relationships)?,
            admin: AdminIdentity::from_variables(&env.variables),
            mode: ApplicationMode::from_variables(&env.variables),
            branch: env.branch.clone(),
        };

        Ok(context)
    }

    /// Check if deploying the production branch.
    pub fn is_primary_branch(&self, primary: &str) -> bool {
        self.branch == primary
    }
}

/// Database connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbCredentials {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    /// Empty when the database accepts the user without one.
    pub password: String,
}

impl DbCredentials {
    fn from_relationships(relationships: &Relationships) -> Result<Self> {
        let database = relationships.first(DATABASE_SERVICE)?;
        Ok(Self {
            host: database.host.clone().unwrap_or_default(),
            port: database.port.unwrap_or(3306),
            name: database.path.clone().unwrap_or_default(),
            username: database.username.clone().unwrap_or_default(),
            password: database.password.clone().unwrap_or_default(),
        })
    }
}

/// Redis cache backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEndpoint {
    pub host: String,
    pub port: u16,
    pub scheme: String,
}

impl CacheEndpoint {
    fn from_relationships(relationships: &Relationships) -> Result<Self> {
        let redis = relationships.first(CACHE_SERVICE)?;
        Ok(Self {
            host: redis.host.clone().unwrap_or_default(),
            port: redis.port.unwrap_or(6379),
            scheme: redis.scheme.clone().unwrap_or_else(|| "redis".into()),
        })
    }
}

/// Solr search service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEndpoint {
    pub host: String,
    pub port: u16,
    pub scheme: String,
    pub path: String,
}

impl SearchEndpoint {
    fn from_relationships(relationships: &Relationships) -> Result<Self> {
        let solr = relationships.first(SEARCH_SERVICE)?;
        Ok(Self {
            host: solr.host.clone().unwrap_or_default(),
            port: solr.port.unwrap_or(8983),
            scheme: solr.scheme.clone().unwrap_or_else(|| "solr".into()),
            path: solr.path.clone().unwrap_or_default(),
        })
    }
}

/// Admin account and backend location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub password: String,
    /// URL path segment of the admin backend.
    pub backend_path: String,
}

impl AdminIdentity {
    fn from_variables(variables: &Variables) -> Self {
        Self {
            username: variables.get_or("ADMIN_USERNAME", "admin"),
            firstname: variables.get_or("ADMIN_FIRSTNAME", "John"),
            lastname: variables.get_or("ADMIN_LASTNAME", "Doe"),
            email: variables.get_or("ADMIN_EMAIL", "john@example.com"),
            password: variables.get_or("ADMIN_PASSWORD", "admin12"),
            backend_path: variables.get_or("ADMIN_URL", "admin"),
        }
    }
}

/// Magento application mode.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum ApplicationMode {
    #[default]
    Production,
    Developer,
}

impl ApplicationMode {
    fn from_variables(variables: &Variables) -> Self {
        match variables.get("APPLICATION_MODE") {
            Some(value) => value.parse().unwrap_or_else(|_| {
                warn!("unknown application mode {value:?}, using production");
                Self::Production
            }),
            None => Self::Production,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Developer => "developer",
        }
    }
}

impl FromStr for ApplicationMode {
    type Err = UnknownMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "production" => Ok(Self::Production),
            "developer" => Ok(Self::Developer),
            _ => Err(UnknownMode(value.into())),
        }
    }
}

impl Display for ApplicationMode {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Application mode literal is not recognized.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown application mode {0:?}")]
pub struct UnknownMode(pub String);
