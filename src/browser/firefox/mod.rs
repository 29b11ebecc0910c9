//! Firefox (and other Gecko browsers) cookie extraction
//!
//! Gecko keeps cookies unencrypted in `cookies.sqlite` inside each profile
//! directory, so one reader serves every platform.

use crate::browser::{nullable_column, Cookie};
use crate::config::BrowserCookieConfig;
use crate::error::{ExportError, Result};
use crate::utils::{DatabaseSnapshot, FileUtils};
use rusqlite::{Connection, Row};
use std::path::PathBuf;

const COOKIE_DB_NAME: &str = "cookies.sqlite";
const MAX_SUPPORTED_DB_SCHEMA_VERSION: i64 = 17;
/// Schema 16 switched `expiry` from seconds to milliseconds.
const MILLISECOND_EXPIRY_SCHEMA_VERSION: i64 = 16;

/// Supported Gecko-based browsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeckoBrowser {
    Firefox,
    LibreWolf,
}

/// Extract cookies from Firefox browser
pub fn extract_cookies(config: &BrowserCookieConfig) -> Result<Vec<Cookie>> {
    extract_gecko_cookies(GeckoBrowser::Firefox, config)
}

pub fn extract_gecko_cookies(
    browser: GeckoBrowser,
    config: &BrowserCookieConfig,
) -> Result<Vec<Cookie>> {
    let search_roots = search_roots(browser, config.profile.as_deref())?;
    let cookie_db = find_cookie_dbs(&search_roots)
        .and_then(FileUtils::newest_path)
        .ok_or_else(|| {
            ExportError::FileNotFound(format!("{:?} cookies database not found", browser))
        })?;
    log::debug!("Reading {:?} cookies from {:?}", browser, cookie_db);

    let snapshot = DatabaseSnapshot::copy(&cookie_db, "firefox-cookies.sqlite")?;
    let conn = snapshot.connect()?;
    let cookies = read_cookies(&conn)?;

    if cookies.is_empty() {
        return Err(ExportError::BrowserCookie(
            "No Firefox cookies could be extracted".to_string(),
        ));
    }
    Ok(cookies)
}

fn search_roots(browser: GeckoBrowser, profile: Option<&str>) -> Result<Vec<PathBuf>> {
    let bases = profile_bases(browser)?;

    if let Some(profile) = profile {
        if FileUtils::is_path_like(profile) {
            return Ok(vec![FileUtils::expand_path(profile)?]);
        }
        return Ok(bases.iter().map(|base| base.join(profile)).collect());
    }

    Ok(bases)
}

/// Directories that hold the browser's profile folders on this platform.
#[cfg(target_os = "linux")]
fn profile_bases(browser: GeckoBrowser) -> Result<Vec<PathBuf>> {
    let home = dirs::home_dir()
        .ok_or_else(|| ExportError::Config("Cannot determine home directory".to_string()))?;
    let relative: &[&str] = match browser {
        GeckoBrowser::Firefox => &[
            ".mozilla/firefox",
            "snap/firefox/common/.mozilla/firefox",
            ".var/app/org.mozilla.firefox/.mozilla/firefox",
        ],
        GeckoBrowser::LibreWolf => &[
            ".librewolf",
            ".var/app/io.gitlab.librewolf-community/.librewolf",
        ],
    };
    Ok(relative.iter().map(|dir| home.join(dir)).collect())
}

#[cfg(target_os = "macos")]
fn profile_bases(browser: GeckoBrowser) -> Result<Vec<PathBuf>> {
    let app_support = dirs::home_dir()
        .ok_or_else(|| ExportError::Config("Cannot determine home directory".to_string()))?
        .join("Library/Application Support");
    let relative = match browser {
        GeckoBrowser::Firefox => "Firefox/Profiles",
        GeckoBrowser::LibreWolf => "librewolf/Profiles",
    };
    Ok(vec![app_support.join(relative)])
}

#[cfg(target_os = "windows")]
fn profile_bases(browser: GeckoBrowser) -> Result<Vec<PathBuf>> {
    let roaming = dirs::data_dir()
        .ok_or_else(|| ExportError::Config("Cannot determine APPDATA".to_string()))?;
    let relative = match browser {
        GeckoBrowser::Firefox => "Mozilla/Firefox/Profiles",
        GeckoBrowser::LibreWolf => "librewolf/Profiles",
    };
    Ok(vec![roaming.join(relative)])
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
fn profile_bases(browser: GeckoBrowser) -> Result<Vec<PathBuf>> {
    Err(ExportError::Unsupported(format!(
        "{:?} cookie extraction is only implemented for macOS, Linux, and Windows",
        browser
    )))
}

fn find_cookie_dbs(roots: &[PathBuf]) -> Option<Vec<PathBuf>> {
    let mut results = Vec::new();
    for root in roots {
        if root.is_file() && root.ends_with(COOKIE_DB_NAME) {
            results.push(root.clone());
        } else if root.is_dir() {
            results.extend(FileUtils::find_files(root, COOKIE_DB_NAME));
        }
    }
    if results.is_empty() {
        None
    } else {
        Some(results)
    }
}

fn read_schema_version(conn: &Connection) -> i64 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap_or(0)
}

struct CookieColumns {
    expiry: &'static str,
    secure: &'static str,
    http_only: &'static str,
}

fn cookie_columns(conn: &Connection) -> Result<CookieColumns> {
    let mut stmt = conn
        .prepare("PRAGMA table_info(moz_cookies)")
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie schema: {}", e)))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie schema: {}", e)))?;
    let mut columns = Vec::new();
    for row in rows {
        columns.push(row.map_err(|e| {
            ExportError::BrowserCookie(format!("Failed to read cookie schema: {}", e))
        })?);
    }
    let has = |name: &str| columns.iter().any(|c| c == name);

    let expiry = if has("expiry") {
        "expiry"
    } else if has("expires") {
        "expires"
    } else {
        return Err(ExportError::BrowserCookie(
            "Firefox cookies table missing expiry column".to_string(),
        ));
    };
    let secure = if has("is_secure") {
        "is_secure"
    } else {
        "isSecure"
    };
    let http_only = if has("isHttpOnly") {
        "isHttpOnly"
    } else if has("is_http_only") {
        "is_http_only"
    } else {
        "0"
    };
    Ok(CookieColumns {
        expiry,
        secure,
        http_only,
    })
}

/// Read every row of `moz_cookies`, in rowid order.
pub(crate) fn read_cookies(conn: &Connection) -> Result<Vec<Cookie>> {
    let schema_version = read_schema_version(conn);
    if schema_version > MAX_SUPPORTED_DB_SCHEMA_VERSION {
        log::warn!(
            "Firefox cookie DB schema version {} may be unsupported",
            schema_version
        );
    }

    let columns = cookie_columns(conn)?;
    let query = format!(
        "SELECT host, name, value, path, {}, {}, {} FROM moz_cookies",
        columns.expiry, columns.secure, columns.http_only
    );
    let mut stmt = conn.prepare(&query).map_err(|e| {
        ExportError::BrowserCookie(format!("Failed to prepare Firefox query: {}", e))
    })?;
    let mut rows = stmt.query([]).map_err(|e| {
        ExportError::BrowserCookie(format!("Failed to query Firefox cookies: {}", e))
    })?;

    let mut cookies = Vec::new();
    while let Some(row) = rows.next().map_err(|e| {
        ExportError::BrowserCookie(format!("Failed to read Firefox cookie row: {}", e))
    })? {
        match row_to_cookie(row, schema_version) {
            Ok(cookie) => cookies.push(cookie),
            Err(err) => log::warn!("Skipping malformed Firefox cookie row: {}", err),
        }
    }
    Ok(cookies)
}

fn row_to_cookie(row: &Row<'_>, schema_version: i64) -> Result<Cookie> {
    let domain: String = nullable_column(row, 0, "host")?.unwrap_or_default();
    let name: String = nullable_column(row, 1, "name")?.unwrap_or_default();
    let value: String = nullable_column(row, 2, "value")?.unwrap_or_default();
    let path: String = nullable_column(row, 3, "path")?.unwrap_or_default();
    let expiry: Option<i64> = nullable_column(row, 4, "expiry")?;
    let secure: i64 = nullable_column(row, 5, "secure flag")?.unwrap_or(0);
    let http_only: i64 = nullable_column(row, 6, "http-only flag")?.unwrap_or(0);

    Ok(Cookie {
        name,
        value,
        domain,
        path,
        secure: secure != 0,
        http_only: http_only != 0,
        expires: gecko_expiry_to_unix_seconds(expiry, schema_version),
    })
}

fn gecko_expiry_to_unix_seconds(expiry: Option<i64>, schema_version: i64) -> Option<i64> {
    let seconds = if schema_version >= MILLISECOND_EXPIRY_SCHEMA_VERSION {
        expiry? / 1000
    } else {
        expiry?
    };
    (seconds > 0).then_some(seconds)
}

#[cfg(test)]
mod tests;
