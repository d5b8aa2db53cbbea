// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Persisted configuration rewriting.
//!
//! Magento keeps connection settings in `app/etc/env.php`. Platform services
//! can move between deploys, so on update the file is patched with whatever
//! the environment says now. The file is parsed, patched in memory, and
//! written back through a sibling temp file that replaces the original in one
//! rename. A reader sees either the old document or the new one.

use crate::{
    context::DeploymentContext,
    php::{Document, ParseError},
};

use std::{
    fs::{metadata, read_to_string, set_permissions},
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

/// Cache backends that speak to Redis.
pub const REDIS_BACKENDS: [&str; 2] = [
    "Cm_Cache_Backend_Redis",
    "Magento\\Framework\\Cache\\Backend\\Redis",
];

/// Connection entries that need database credentials.
pub const CONNECTIONS: [&str; 2] = ["default", "indexer"];

/// Cache frontends that may be backed by Redis.
pub const CACHE_FRONTENDS: [&str; 2] = ["default", "page_cache"];

/// Rewrite configuration document in place.
///
/// # Errors
///
/// - Return [`Error::ConfigNotFound`] if no document exists at path.
/// - Return [`Error::ConfigParseError`] if document cannot be parsed.
/// - Return [`Error::Io`] if reading or replacing the document fails.
#[instrument(skip(path, mutator), level = "debug")]
pub fn rewrite<F>(path: impl AsRef<Path>, mutator: F) -> Result<()>
where
    F: FnOnce(&mut Document),
{
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::ConfigNotFound { path: path.into() });
    }

    let content = read_to_string(path).map_err(|err| Error::Io {
        source: err,
        path: path.into(),
    })?;
    let mut document: Document = content.parse().map_err(|err| Error::ConfigParseError {
        source: err,
        path: path.into(),
    })?;

    mutator(&mut document);

    let rendered = document.to_string();
    if rendered == content {
        debug!("{:?} already up to date", path.display());
        return Ok(());
    }

    replace(path, &rendered)
}

fn replace(path: &Path, content: &str) -> Result<()> {
    let io_err = |err: std::io::Error| Error::Io {
        source: err,
        path: path.into(),
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(parent).map_err(io_err)?;
    temp.write_all(content.as_bytes()).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    set_permissions(temp.path(), metadata(path).map_err(io_err)?.permissions()).map_err(io_err)?;
    temp.persist(path).map_err(|err| io_err(err.error))?;

    Ok(())
}

/// Patch configuration document with environment derived settings.
///
/// Sets database credentials on every connection entry, points Redis backed
/// cache frontends at the current Redis service, and sets the admin backend
/// path. Applying it twice changes nothing the second time.
pub fn apply_context(document: &mut Document, context: &DeploymentContext) {
    info!("Updating env.php database configuration.");
    let root = document.root_mut();

    let connections = root.path_mut(&["db", "connection"]);
    for name in CONNECTIONS {
        let connection = connections.array_mut(name);
        connection.insert("username", context.database.username.as_str());
        connection.insert("host", context.database.host.as_str());
        connection.insert("dbname", context.database.name.as_str());
        connection.insert("password", context.database.password.as_str());
    }

    for name in CACHE_FRONTENDS {
        let is_redis = root
            .get_path(&["cache", "frontend", name, "backend"])
            .and_then(|backend| backend.as_str())
            .is_some_and(|backend| REDIS_BACKENDS.iter().any(|known| *known == backend));
        if !is_redis {
            debug!("cache frontend {name:?} is not backed by redis");
            continue;
        }

        info!("Updating env.php Redis cache configuration for {name:?}.");
        let options = root.path_mut(&["cache", "frontend", name, "backend_options"]);
        options.insert("server", context.cache.host.as_str());
        options.insert("port", context.cache.port.to_string());
    }

    info!("Updating env.php backend front name.");
    root.array_mut("backend")
        .insert("frontName", context.admin.backend_path.as_str());
}

/// Configuration rewriting error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Document does not exist.
    #[error("configuration not found at {:?}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Document is not a parseable configuration literal.
    #[error("failed to parse configuration at {:?}", path.display())]
    ConfigParseError {
        #[source]
        source: ParseError,
        path: PathBuf,
    },

    /// Document cannot be read or replaced.
    #[error("failed to access configuration at {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
