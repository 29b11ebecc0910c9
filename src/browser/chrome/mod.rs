//! Chrome/Chromium browser cookie extraction
//!
//! All Chromium-family browsers share one SQLite schema; only the location
//! of the profile directory and the way the encryption key is obtained
//! differ per operating system.

use crate::browser::{nullable_column, Cookie};
use crate::config::BrowserCookieConfig;
use crate::error::{ExportError, Result};
use crate::utils::{DatabaseSnapshot, FileUtils};
use rusqlite::{Connection, Row};
use std::collections::HashSet;
use std::path::PathBuf;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform;
#[cfg(target_os = "macos")]
use macos as platform;
#[cfg(target_os = "windows")]
use windows as platform;

/// Length of the SHA-256 host digest prepended to plaintext since DB version 24.
const HOST_DIGEST_LEN: usize = 32;
/// Seconds between 1601-01-01 (Chromium epoch) and 1970-01-01.
const WINDOWS_EPOCH_OFFSET: i64 = 11_644_473_600;

/// Supported Chromium-based browsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromiumBrowser {
    Chrome,
    Chromium,
    Edge,
    Brave,
    Opera,
    OperaGx,
    Vivaldi,
    Whale,
}

/// Where a Chromium browser keeps its data and how its key is labelled.
#[cfg_attr(
    not(any(target_os = "macos", target_os = "linux", target_os = "windows")),
    allow(dead_code)
)]
pub(crate) struct ChromiumSettings {
    pub user_data_dir: PathBuf,
    /// Keyring/Keychain label, e.g. "Chrome" for "Chrome Safe Storage".
    pub key_name: &'static str,
    pub supports_profiles: bool,
}

/// Decrypts `encrypted_value` blobs for one browser.
pub(crate) trait CookieDecryptor {
    /// Returns `None` when the value cannot be decrypted; the cookie is then skipped.
    fn decrypt(&self, encrypted_value: &[u8]) -> Option<String>;
}

/// Extract cookies from Chrome browser
pub fn extract_cookies(config: &BrowserCookieConfig) -> Result<Vec<Cookie>> {
    extract_chromium_cookies(ChromiumBrowser::Chrome, config)
}

#[cfg(any(target_os = "macos", target_os = "linux", target_os = "windows"))]
pub fn extract_chromium_cookies(
    browser: ChromiumBrowser,
    config: &BrowserCookieConfig,
) -> Result<Vec<Cookie>> {
    let settings = platform::chromium_settings(browser)?;
    let cookie_db = find_cookie_database(&settings, config.profile.as_deref())?;
    log::debug!("Reading {:?} cookies from {:?}", browser, cookie_db);

    let snapshot = DatabaseSnapshot::copy(&cookie_db, "chromium-cookies.sqlite")?;
    let conn = snapshot.connect()?;
    let meta_version = read_meta_version(&conn);
    let decryptor = platform::decryptor(&settings, meta_version)?;
    let cookies = read_cookies(&conn, decryptor.as_ref())?;

    if cookies.is_empty() {
        return Err(ExportError::BrowserCookie(
            "No Chromium cookies could be extracted".to_string(),
        ));
    }
    Ok(cookies)
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
pub fn extract_chromium_cookies(
    browser: ChromiumBrowser,
    config: &BrowserCookieConfig,
) -> Result<Vec<Cookie>> {
    let _ = (browser, config);
    Err(ExportError::Unsupported(
        "Chromium cookie extraction is only implemented for macOS, Linux, and Windows".to_string(),
    ))
}

#[cfg_attr(
    not(any(target_os = "macos", target_os = "linux", target_os = "windows")),
    allow(dead_code)
)]
fn find_cookie_database(settings: &ChromiumSettings, profile: Option<&str>) -> Result<PathBuf> {
    let search_root = if let Some(profile) = profile {
        if FileUtils::is_path_like(profile) {
            let expanded = FileUtils::expand_path(profile)?;
            if expanded.is_file() {
                return Ok(expanded);
            }
            expanded
        } else if settings.supports_profiles {
            settings.user_data_dir.join(profile)
        } else {
            log::warn!("Profile selection is not supported for this browser");
            settings.user_data_dir.clone()
        }
    } else {
        settings.user_data_dir.clone()
    };

    if !search_root.exists() {
        return Err(ExportError::FileNotFound(format!(
            "Browser data dir not found: {:?}",
            search_root
        )));
    }

    FileUtils::newest_path(FileUtils::find_files(&search_root, "Cookies"))
        .ok_or_else(|| ExportError::FileNotFound("Chrome cookies database not found".to_string()))
}

pub(crate) fn read_meta_version(conn: &Connection) -> i64 {
    let result: std::result::Result<String, _> =
        conn.query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| {
            row.get(0)
        });
    result
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

fn read_cookie_columns(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn
        .prepare("PRAGMA table_info(cookies)")
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie schema: {}", e)))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie schema: {}", e)))?;
    let mut columns = HashSet::new();
    for row in rows {
        let name = row.map_err(|e| {
            ExportError::BrowserCookie(format!("Failed to read cookie schema: {}", e))
        })?;
        columns.insert(name);
    }
    Ok(columns)
}

/// Read every row of the `cookies` table, in rowid order.
pub(crate) fn read_cookies(
    conn: &Connection,
    decryptor: &dyn CookieDecryptor,
) -> Result<Vec<Cookie>> {
    let columns = read_cookie_columns(conn)?;
    let secure_column = if columns.contains("is_secure") {
        "is_secure"
    } else {
        "secure"
    };
    let httponly_column = if columns.contains("is_httponly") {
        "is_httponly"
    } else if columns.contains("httponly") {
        "httponly"
    } else {
        "0"
    };
    let query = format!(
        "SELECT host_key, name, value, encrypted_value, path, expires_utc, {}, {} FROM cookies",
        secure_column, httponly_column
    );

    let mut stmt = conn
        .prepare(&query)
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to prepare cookie query: {}", e)))?;
    let mut rows = stmt
        .query([])
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to query cookies: {}", e)))?;

    let mut cookies = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| ExportError::BrowserCookie(format!("Failed to read cookie row: {}", e)))?
    {
        match row_to_cookie(row, decryptor) {
            Ok(Some(cookie)) => cookies.push(cookie),
            Ok(None) => {}
            Err(err) => log::warn!("Skipping malformed cookie row: {}", err),
        }
    }
    Ok(cookies)
}

fn row_to_cookie(row: &Row<'_>, decryptor: &dyn CookieDecryptor) -> Result<Option<Cookie>> {
    let host_key: String = nullable_column(row, 0, "host")?.unwrap_or_default();
    let name: String = nullable_column(row, 1, "name")?.unwrap_or_default();
    let value: String = nullable_column(row, 2, "value")?.unwrap_or_default();
    let encrypted_value = read_encrypted_value(row)?;
    let path: String = nullable_column(row, 4, "path")?.unwrap_or_default();
    let expires_utc: i64 = nullable_column(row, 5, "expiry")?.unwrap_or(0);
    let secure: i64 = nullable_column(row, 6, "secure flag")?.unwrap_or(0);
    let http_only: i64 = nullable_column(row, 7, "httponly flag")?.unwrap_or(0);

    let cookie_value = if !value.is_empty() {
        value
    } else if !encrypted_value.is_empty() {
        match decryptor.decrypt(&encrypted_value) {
            Some(value) => value,
            None => {
                log::warn!("Skipping undecryptable cookie {} for {}", name, host_key);
                return Ok(None);
            }
        }
    } else {
        // Empty cookies are legitimate; keep them.
        String::new()
    };

    Ok(Some(Cookie {
        name,
        value: cookie_value,
        domain: host_key,
        path,
        secure: secure != 0,
        http_only: http_only != 0,
        expires: chromium_expires_to_unix_seconds(expires_utc),
    }))
}

fn read_encrypted_value(row: &Row<'_>) -> Result<Vec<u8>> {
    let value = row.get_ref(3).map_err(|e| {
        ExportError::BrowserCookie(format!("Failed to read cookie ciphertext: {}", e))
    })?;
    match value {
        rusqlite::types::ValueRef::Blob(bytes) => Ok(bytes.to_vec()),
        rusqlite::types::ValueRef::Text(text) => Ok(text.to_vec()),
        rusqlite::types::ValueRef::Null => Ok(Vec::new()),
        _ => Err(ExportError::BrowserCookie(
            "Unsupported cookie ciphertext type".to_string(),
        )),
    }
}

/// Chromium stores microseconds since 1601-01-01; 0 marks a session cookie.
pub(crate) fn chromium_expires_to_unix_seconds(expires_utc: i64) -> Option<i64> {
    if expires_utc == 0 {
        return None;
    }
    let unix_seconds = (expires_utc / 1_000_000) - WINDOWS_EPOCH_OFFSET;
    if unix_seconds <= 0 {
        None
    } else {
        Some(unix_seconds)
    }
}

/// Drop the host digest prefix newer databases put in front of the value.
#[cfg_attr(
    not(any(target_os = "macos", target_os = "linux", target_os = "windows")),
    allow(dead_code)
)]
pub(crate) fn decode_cookie_value(plaintext: &[u8], meta_version: i64) -> Option<String> {
    let trimmed = if meta_version >= 24 && plaintext.len() > HOST_DIGEST_LEN {
        &plaintext[HOST_DIGEST_LEN..]
    } else {
        plaintext
    };
    String::from_utf8(trimmed.to_vec()).ok()
}

#[cfg(any(target_os = "macos", target_os = "linux"))]
pub(crate) mod cbc_key {
    //! PBKDF2 + AES-128-CBC scheme shared by the Linux and macOS stores.

    use crate::error::{ExportError, Result};
    use aes::Aes128;
    use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
    use pbkdf2::pbkdf2_hmac;
    use sha1::Sha1;

    const KEY_DERIVE_SALT: &[u8] = b"saltysalt";
    pub const KEY_LENGTH: usize = 16;
    const AES_IV: &[u8; 16] = b"                ";

    pub fn derive_key(password: &[u8], iterations: u32) -> [u8; KEY_LENGTH] {
        let mut key = [0u8; KEY_LENGTH];
        pbkdf2_hmac::<Sha1>(password, KEY_DERIVE_SALT, iterations, &mut key);
        key
    }

    pub fn decrypt_aes_cbc(ciphertext: &[u8], key: &[u8; KEY_LENGTH]) -> Result<Vec<u8>> {
        let mut buffer = ciphertext.to_vec();
        let decryptor = cbc::Decryptor::<Aes128>::new_from_slices(key, AES_IV).map_err(|e| {
            ExportError::BrowserCookie(format!("Failed to create AES decryptor: {}", e))
        })?;
        let plaintext = decryptor
            .decrypt_padded_mut::<Pkcs7>(&mut buffer)
            .map_err(|_| ExportError::BrowserCookie("Failed to decrypt cookie".to_string()))?;
        Ok(plaintext.to_vec())
    }
}

#[cfg(test)]
mod tests;
