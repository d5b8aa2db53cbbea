// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Platform environment access.
//!
//! The hosting platform hands deployment metadata to the application through
//! environment variables. Three of them carry structured data as base64
//! encoded JSON:
//!
//! - `PLATFORM_ROUTES`: inbound URL to route descriptor.
//! - `PLATFORM_RELATIONSHIPS`: service name to list of connection descriptors.
//! - `PLATFORM_VARIABLES`: custom project variables.
//!
//! A fourth, `PLATFORM_ENVIRONMENT`, is a plain string naming the branch being
//! deployed. There is no partial-data mode. If any of these cannot be read,
//! deployment stops.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

pub const ROUTES: &str = "PLATFORM_ROUTES";
pub const RELATIONSHIPS: &str = "PLATFORM_RELATIONSHIPS";
pub const VARIABLES: &str = "PLATFORM_VARIABLES";
pub const ENVIRONMENT: &str = "PLATFORM_ENVIRONMENT";

/// Read and decode structured environment variable from current process.
///
/// # Errors
///
/// - Return [`Error::MissingEnvironmentData`] if variable is not set.
/// - Return [`Error::MalformedEnvironmentData`] if variable is not valid
///   base64, or decodes to something that is not the expected JSON.
pub fn read_encoded<T>(name: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    decode(name, std::env::var(name).ok())
}

fn decode<T>(name: &str, raw: Option<String>) -> Result<T>
where
    T: DeserializeOwned,
{
    let raw = raw.ok_or_else(|| Error::MissingEnvironmentData { name: name.into() })?;
    let bytes = STANDARD
        .decode(raw.trim())
        .map_err(|err| Error::MalformedEnvironmentData {
            name: name.into(),
            source: Malformed::Base64(err),
        })?;

    serde_json::from_slice(&bytes).map_err(|err| Error::MalformedEnvironmentData {
        name: name.into(),
        source: Malformed::Json(err),
    })
}

/// Everything the platform tells us about the current deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformEnv {
    pub routes: Routes,
    pub relationships: Relationships,
    pub variables: Variables,
    pub branch: String,
}

impl PlatformEnv {
    /// Read platform environment of current process.
    ///
    /// # Errors
    ///
    /// - Return [`Error::MissingEnvironmentData`] if any required variable is
    ///   not set.
    /// - Return [`Error::MalformedEnvironmentData`] if any structured variable
    ///   cannot be decoded.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read platform environment through arbitrary variable lookup.
    #[instrument(skip(lookup), level = "debug")]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let routes = decode(ROUTES, lookup(ROUTES))?;
        let relationships = decode(RELATIONSHIPS, lookup(RELATIONSHIPS))?;
        let variables = decode(VARIABLES, lookup(VARIABLES))?;
        let branch = lookup(ENVIRONMENT).ok_or_else(|| Error::MissingEnvironmentData {
            name: ENVIRONMENT.into(),
        })?;
        debug!("deploying branch {branch:?}");

        Ok(Self {
            routes,
            relationships,
            variables,
            branch,
        })
    }
}

/// Route descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Route {
    /// Route kind, e.g., "upstream" or "redirect".
    #[serde(rename = "type")]
    pub kind: String,

    /// Route template this entry was expanded from.
    #[serde(default)]
    pub original_url: Option<String>,
}

impl Route {
    pub fn is_upstream(&self) -> bool {
        self.kind == "upstream"
    }
}

/// Route map in the order the platform listed it.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Routes(Vec<(String, Route)>);

impl Routes {
    pub fn new(entries: impl IntoIterator<Item = (impl Into<String>, Route)>) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(key, route)| (key.into(), route))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Route)> {
        self.0.iter().map(|(key, route)| (key.as_str(), route))
    }
}

impl TryFrom<Map<String, Value>> for Routes {
    type Error = serde_json::Error;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        map.into_iter()
            .map(|(key, value)| Ok((key, serde_json::from_value(value)?)))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// Service connection descriptor.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Relationship {
    pub host: Option<String>,
    pub path: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub scheme: Option<String>,
    pub port: Option<u16>,
}

/// Service relationships keyed by service name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct Relationships(BTreeMap<String, Vec<Relationship>>);

impl Relationships {
    pub fn new(entries: impl IntoIterator<Item = (impl Into<String>, Vec<Relationship>)>) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(service, list)| (service.into(), list))
                .collect(),
        )
    }

    /// First connection descriptor of a service.
    ///
    /// # Errors
    ///
    /// - Return [`Error::MissingService`] if service is absent or has no
    ///   descriptors.
    pub fn first(&self, service: &str) -> Result<&Relationship> {
        self.0
            .get(service)
            .and_then(|list| list.first())
            .ok_or_else(|| Error::MissingService {
                service: service.into(),
            })
    }
}

/// Custom project variables.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct Variables(BTreeMap<String, Value>);

impl Variables {
    pub fn new(entries: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(name, value)| (name.into(), Value::String(value.into())))
                .collect(),
        )
    }

    /// Lookup variable as string.
    ///
    /// Non-string JSON values are rendered as JSON text. Null counts as unset.
    pub fn get(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::Null => None,
            Value::String(value) => Some(value.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Lookup variable, falling back to default when unset.
    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.into())
    }
}

/// Decoding stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum Malformed {
    #[error("invalid base64")]
    Base64(#[source] base64::DecodeError),

    #[error("invalid json")]
    Json(#[source] serde_json::Error),
}

/// Environment reading error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Required variable is not set.
    #[error("environment variable {name} is not set")]
    MissingEnvironmentData { name: String },

    /// Variable is set, but cannot be decoded.
    #[error("environment variable {name} is malformed")]
    MalformedEnvironmentData {
        name: String,
        #[source]
        source: Malformed,
    },

    /// Required service relationship has no connection descriptor.
    #[error("service relationship {service:?} is not available")]
    MissingService { service: String },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
