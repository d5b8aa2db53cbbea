// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deploy hooks for Magento on Platform.sh.
//!
//! The platform runs a build hook while the application tree is writable, and
//! a deploy hook once the tree is mounted read-only with a few writable mounts
//! on top. [`lifecycle::Lifecycle`] implements both hooks. Everything else is
//! a building block it sequences.

pub mod context;
pub mod database;
pub mod env;
pub mod lifecycle;
pub mod magento;
pub mod materialize;
pub mod password;
pub mod php;
pub mod relocate;
pub mod route;
pub mod settings;
pub mod shell;
