// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Writable directory relocation.
//!
//! The deployed application tree is read-only at runtime, except for mounts
//! that the platform attaches over a few directories. Whatever the build put
//! into those directories would be hidden by the mounts. So the build stages
//! their content into a sibling `init/` tree and leaves empty mount points
//! behind, and the deploy copies the staged content back once the mounts
//! are attached.

use crate::settings::Settings;

use std::{
    fs::{copy, read_dir, remove_dir_all, remove_file},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// Move writable directory content into staging tree.
///
/// Clears the staging tree first. Content is copied before the original is
/// removed, so a failed copy never loses data.
///
/// # Errors
///
/// - Return [`Error`] if any filesystem operation fails.
#[instrument(skip(settings), level = "debug")]
pub fn stage(settings: &Settings) -> Result<()> {
    let init = settings.init_path("");
    info!("Clearing temporary directory {:?}.", init.display());
    mkdir(&init)?;
    clear_contents(&init)?;

    for dir in &settings.paths.writable {
        let source = settings.root_path(dir);
        let target = settings.init_path(dir);
        info!("Staging {:?}.", dir.display());

        mkdir(&target)?;
        if source.is_dir() {
            copy_contents(&source, &target)?;
            remove_dir_all(&source).map_err(|err| Error::Remove {
                source: err,
                path: source.clone(),
            })?;
        } else {
            warn!("writable directory {:?} does not exist", source.display());
        }
        mkdir(&source)?;
    }

    Ok(())
}

/// Copy staged content back into writable directories.
///
/// A writable directory without staged content is left as is, since nothing
/// was staged on first deploy.
///
/// # Errors
///
/// - Return [`Error`] if any filesystem operation fails.
#[instrument(skip(settings), level = "debug")]
pub fn restore(settings: &Settings) -> Result<()> {
    info!("Copying read/write directories back.");
    for dir in &settings.paths.writable {
        let source = settings.init_path(dir);
        let target = settings.root_path(dir);

        mkdir(&target)?;
        if !source.is_dir() {
            warn!("nothing staged for {:?}", dir.display());
            continue;
        }

        copy_contents(&source, &target)?;
        info!("Copied directory: {:?}", dir.display());
    }

    Ok(())
}

/// Remove everything inside directory, keeping the directory itself.
///
/// # Errors
///
/// - Return [`Error::Remove`] if an entry cannot be removed.
pub fn clear_contents(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    let entries = match read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(Error::Remove {
                source: err,
                path: dir.into(),
            })
        }
    };

    for entry in entries {
        let entry = entry.map_err(|err| Error::Remove {
            source: err,
            path: dir.into(),
        })?;
        let path = entry.path();
        let is_dir = entry
            .file_type()
            .map(|kind| kind.is_dir())
            .unwrap_or(false);

        debug!("remove {:?}", path.display());
        let result = if is_dir {
            remove_dir_all(&path)
        } else {
            remove_file(&path)
        };
        result.map_err(|err| Error::Remove { source: err, path })?;
    }

    Ok(())
}

/// Recursively copy directory content, hidden entries included.
///
/// # Errors
///
/// - Return [`Error::Walk`] if source cannot be traversed.
/// - Return [`Error::Copy`] or [`Error::Create`] if target cannot be written.
pub fn copy_contents(source: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<()> {
    let source = source.as_ref();
    let target = target.as_ref();

    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let destination = target.join(relative);
        let kind = entry.file_type();

        if kind.is_dir() {
            mkdir(&destination)?;
        } else if kind.is_symlink() {
            copy_symlink(entry.path(), &destination)?;
        } else {
            copy(entry.path(), &destination).map_err(|err| Error::Copy {
                source: err,
                from: entry.path().into(),
                to: destination.clone(),
            })?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let copy_err = |err: std::io::Error| Error::Copy {
        source: err,
        from: from.into(),
        to: to.into(),
    };

    let link = std::fs::read_link(from).map_err(copy_err)?;
    if to.symlink_metadata().is_ok() {
        remove_file(to).map_err(copy_err)?;
    }
    std::os::unix::fs::symlink(link, to).map_err(copy_err)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    copy(from, to).map(|_| ()).map_err(|err| Error::Copy {
        source: err,
        from: from.into(),
        to: to.into(),
    })
}

fn mkdir(path: &Path) -> Result<()> {
    mkdirp::mkdirp(path).map_err(|err| Error::Create {
        source: err,
        path: path.into(),
    })?;

    Ok(())
}

/// Relocation error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create directory {:?}", path.display())]
    Create {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("failed to copy {:?} to {:?}", from.display(), to.display())]
    Copy {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;
