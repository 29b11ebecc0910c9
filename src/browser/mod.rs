//! Browser cookie extraction module
//!
//! This module handles extracting cookies from the browsers installed on
//! the local machine, across different operating systems.

use crate::config::{Browser, BrowserCookieConfig};
use crate::error::{ExportError, Result};
use rusqlite::types::FromSql;
use rusqlite::Row;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

pub mod chrome;
pub mod firefox;
pub mod safari;

/// Represents a browser cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// Unix seconds; `None` for session cookies.
    pub expires: Option<i64>,
}

/// Anything that can list cookie records from local storage.
pub trait CookieSource {
    fn load(&self) -> Result<Vec<Cookie>>;
}

/// Cookie collection keyed by (domain, path, name).
///
/// Iteration is depth-first in sorted order: by domain, then path, then
/// name. Inserting a cookie whose key is already present replaces it.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: BTreeMap<(String, String, String), Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cookie: Cookie) {
        let key = (
            cookie.domain.clone(),
            cookie.path.clone(),
            cookie.name.clone(),
        );
        self.cookies.insert(key, cookie);
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> + '_ {
        self.cookies.values()
    }

    pub fn into_vec(self) -> Vec<Cookie> {
        self.cookies.into_values().collect()
    }
}

impl Extend<Cookie> for CookieJar {
    fn extend<I: IntoIterator<Item = Cookie>>(&mut self, iter: I) {
        for cookie in iter {
            self.insert(cookie);
        }
    }
}

/// Extracts cookies from a single browser
pub struct BrowserCookieExtractor {
    config: BrowserCookieConfig,
}

impl BrowserCookieExtractor {
    /// Create a new cookie extractor with the given configuration
    pub fn new(config: BrowserCookieConfig) -> Self {
        Self { config }
    }

    /// Extract every cookie stored by the configured browser
    pub fn extract_cookies(&self) -> Result<Vec<Cookie>> {
        match self.config.browser {
            Browser::Chrome => chrome::extract_cookies(&self.config),
            Browser::Chromium => {
                chrome::extract_chromium_cookies(chrome::ChromiumBrowser::Chromium, &self.config)
            }
            Browser::Opera => {
                chrome::extract_chromium_cookies(chrome::ChromiumBrowser::Opera, &self.config)
            }
            Browser::OperaGx => {
                chrome::extract_chromium_cookies(chrome::ChromiumBrowser::OperaGx, &self.config)
            }
            Browser::Brave => {
                chrome::extract_chromium_cookies(chrome::ChromiumBrowser::Brave, &self.config)
            }
            Browser::Edge => {
                chrome::extract_chromium_cookies(chrome::ChromiumBrowser::Edge, &self.config)
            }
            Browser::Vivaldi => {
                chrome::extract_chromium_cookies(chrome::ChromiumBrowser::Vivaldi, &self.config)
            }
            Browser::Whale => {
                chrome::extract_chromium_cookies(chrome::ChromiumBrowser::Whale, &self.config)
            }
            Browser::Firefox => firefox::extract_cookies(&self.config),
            Browser::LibreWolf => {
                firefox::extract_gecko_cookies(firefox::GeckoBrowser::LibreWolf, &self.config)
            }
            Browser::Safari => safari::extract_cookies(&self.config),
        }
    }
}

/// Loads cookies from every configured browser into one jar.
///
/// Browsers that are not installed or not supported on this platform are
/// skipped; any other failure aborts the whole load.
pub struct BrowserCookieLoader {
    browsers: Vec<BrowserCookieConfig>,
}

impl BrowserCookieLoader {
    pub fn new(browsers: Vec<BrowserCookieConfig>) -> Self {
        Self { browsers }
    }

    pub fn load_jar(&self) -> Result<CookieJar> {
        let mut jar = CookieJar::new();
        for config in &self.browsers {
            let browser = config.browser;
            match BrowserCookieExtractor::new(config.clone()).extract_cookies() {
                Ok(cookies) => {
                    log::info!("Loaded {} cookies from {}", cookies.len(), browser);
                    jar.extend(cookies);
                }
                Err(err) if err.is_unavailable() => {
                    log::debug!("Skipping {}: {}", browser, err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(jar)
    }
}

impl CookieSource for BrowserCookieLoader {
    fn load(&self) -> Result<Vec<Cookie>> {
        self.load_jar().map(CookieJar::into_vec)
    }
}

/// Read a column that browsers may leave NULL.
pub(crate) fn nullable_column<T: FromSql>(
    row: &Row<'_>,
    index: usize,
    what: &str,
) -> Result<Option<T>> {
    row.get(index)
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie {}: {}", what, e)))
}

/// Map an I/O failure on a browser store to the matching error variant.
pub fn map_cookie_io_error(
    context: &str,
    path: &Path,
    err: io::Error,
    hint: Option<&str>,
) -> ExportError {
    let message = match hint {
        Some(hint) => format!("{} {:?}: {}. {}", context, path, err, hint),
        None => format!("{} {:?}: {}", context, path, err),
    };
    match err.kind() {
        io::ErrorKind::PermissionDenied => ExportError::PermissionDenied(message),
        io::ErrorKind::NotFound => ExportError::FileNotFound(message),
        _ => ExportError::BrowserCookie(message),
    }
}
