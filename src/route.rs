// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Route classification.
//!
//! Platform routes are keyed by fully expanded URL, and remember the template
//! they were expanded from through `original_url`. Templates stand in for the
//! environment specific host with the [`MAGIC_ROUTE`] placeholder, so stripping
//! that placeholder from a template host yields a stable __fragment__ that
//! identifies the route across environments. The empty fragment is the
//! default route.
//!
//! Only upstream routes are classified. Each one lands in the secure or
//! unsecure table by the scheme of its key. Keys with any other prefix are
//! dropped.

use crate::env::Routes;

use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Placeholder for environment specific host in route templates.
pub const MAGIC_ROUTE: &str = "{default}";

pub const PREFIX_SECURE: &str = "https://";
pub const PREFIX_UNSECURE: &str = "http://";

/// Base URL tables keyed by route fragment.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UrlTable {
    pub secure: BTreeMap<String, BaseUrl>,
    pub unsecure: BTreeMap<String, BaseUrl>,
}

/// Expanded route URL and the host stem it was classified by.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    /// Route key, i.e., the fully expanded URL.
    pub url: String,

    /// Template host with placeholders removed and separator dots kept, e.g.,
    /// "shop." for "shop.{default}". Stored URLs are matched against this.
    pub stem: String,
}

impl BaseUrl {
    pub fn new(url: impl Into<String>, stem: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stem: stem.into(),
        }
    }
}

impl UrlTable {
    /// Classify upstream routes into secure and unsecure tables.
    ///
    /// Later routes win when two routes share a fragment in the same table.
    /// If no secure route exists, the secure table becomes a copy of the
    /// unsecure one. Never the reverse.
    pub fn classify(routes: &Routes) -> Self {
        let mut table = UrlTable::default();

        for (key, route) in routes.iter() {
            if !route.is_upstream() {
                continue;
            }

            let target = host(route.original_url.as_deref().unwrap_or(key));
            let fragment = fragment(target);
            let entry = BaseUrl::new(key, stem(target));

            if key.starts_with(PREFIX_UNSECURE) {
                debug!("unsecure route {fragment:?} -> {key}");
                table.unsecure.insert(fragment, entry);
            } else if key.starts_with(PREFIX_SECURE) {
                debug!("secure route {fragment:?} -> {key}");
                table.secure.insert(fragment, entry);
            } else {
                warn!("skipping route {key:?} with unknown scheme");
            }
        }

        if table.secure.is_empty() {
            table.secure = table.unsecure.clone();
        }

        table
    }

    /// Iterate both tables as `(kind, fragment, base url)`, unsecure first.
    pub fn iter(&self) -> impl Iterator<Item = (UrlKind, &str, &BaseUrl)> {
        let secure = self
            .secure
            .iter()
            .map(|(fragment, url)| (UrlKind::Secure, fragment.as_str(), url));
        let unsecure = self
            .unsecure
            .iter()
            .map(|(fragment, url)| (UrlKind::Unsecure, fragment.as_str(), url));

        unsecure.chain(secure)
    }

    /// Default route of a table.
    pub fn default_url(&self, kind: UrlKind) -> Option<&str> {
        match kind {
            UrlKind::Secure => self.secure.get(""),
            UrlKind::Unsecure => self.unsecure.get(""),
        }
        .map(|entry| entry.url.as_str())
    }
}

/// Which base URL table an entry belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UrlKind {
    Secure,
    Unsecure,
}

impl UrlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secure => "secure",
            Self::Unsecure => "unsecure",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Secure => PREFIX_SECURE,
            Self::Unsecure => PREFIX_UNSECURE,
        }
    }
}

/// Host component of a URL.
///
/// Lenient on purpose, templates are not valid URLs until the placeholder is
/// expanded.
pub fn host(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

    match host_port.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => host_port,
    }
}

/// Strip every placeholder occurence from a host, keeping every dot.
pub fn stem(host: &str) -> String {
    host.replace(MAGIC_ROUTE, "")
}

/// Strip every placeholder occurence from a host.
///
/// Dots left dangling by the removal are trimmed, so "www.{default}" becomes
/// "www", and "{default}" becomes the empty default fragment. Hosts without a
/// placeholder are returned unchanged.
pub fn fragment(host: &str) -> String {
    if !host.contains(MAGIC_ROUTE) {
        return host.into();
    }

    stem(host).trim_matches('.').into()
}
