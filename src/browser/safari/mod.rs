//! Safari browser cookie extraction
//!
//! Safari keeps cookies in `Cookies.binarycookies`: a big-endian header
//! listing page sizes, followed by pages of little-endian cookie records.
//! Only macOS has a Safari store, but the parser itself is portable.

use crate::browser::Cookie;
use crate::config::BrowserCookieConfig;
use crate::error::{ExportError, Result};
#[cfg(target_os = "macos")]
use crate::utils::FileUtils;
#[cfg(target_os = "macos")]
use std::fs;
#[cfg(target_os = "macos")]
use std::path::PathBuf;

const MAGIC: &[u8; 4] = b"cook";
const PAGE_HEADER: u32 = 0x0000_0100;
const COOKIE_HEADER_LEN: usize = 56;
const FLAG_SECURE: u32 = 0x1;
const FLAG_HTTP_ONLY: u32 = 0x4;
/// Seconds between 1970-01-01 and 2001-01-01 (Mac absolute time epoch).
const MAC_EPOCH_OFFSET: i64 = 978_307_200;

/// Extract cookies from Safari browser
#[cfg(target_os = "macos")]
pub fn extract_cookies(config: &BrowserCookieConfig) -> Result<Vec<Cookie>> {
    let path = safari_cookie_path(config.profile.as_deref())?;
    log::debug!("Reading Safari cookies from {:?}", path);
    let data = fs::read(&path).map_err(|e| {
        crate::browser::map_cookie_io_error(
            "Failed to read Safari cookies",
            &path,
            e,
            Some("Grant Full Disk Access to the terminal running this tool."),
        )
    })?;
    parse_binary_cookies(&data)
}

#[cfg(not(target_os = "macos"))]
pub fn extract_cookies(config: &BrowserCookieConfig) -> Result<Vec<Cookie>> {
    let _ = config;
    Err(ExportError::Unsupported(
        "Safari is only available on macOS".to_string(),
    ))
}

#[cfg(target_os = "macos")]
fn safari_cookie_path(profile: Option<&str>) -> Result<PathBuf> {
    if let Some(profile) = profile {
        let path = FileUtils::expand_path(profile)?;
        if path.is_file() {
            return Ok(path);
        }
        return Err(ExportError::FileNotFound(format!(
            "Safari cookies file not found: {:?}",
            path
        )));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| ExportError::Config("Cannot determine home directory".to_string()))?;
    [
        "Library/Containers/com.apple.Safari/Data/Library/Cookies/Cookies.binarycookies",
        "Library/Cookies/Cookies.binarycookies",
    ]
    .iter()
    .map(|relative| home.join(relative))
    .find(|path| path.is_file())
    .ok_or_else(|| ExportError::FileNotFound("Safari cookies file not found".to_string()))
}

/// Parse the contents of a `Cookies.binarycookies` file.
pub fn parse_binary_cookies(data: &[u8]) -> Result<Vec<Cookie>> {
    if data.get(..4) != Some(MAGIC.as_slice()) {
        return Err(invalid("Not a Safari binary cookies file"));
    }
    let page_count = read_u32_be(data, 4)? as usize;

    let mut page_sizes = Vec::with_capacity(page_count.min(1024));
    for index in 0..page_count {
        page_sizes.push(read_u32_be(data, 8 + index * 4)? as usize);
    }

    let mut cookies = Vec::new();
    let mut offset = 8 + page_count * 4;
    for size in page_sizes {
        let page = data
            .get(offset..offset + size)
            .ok_or_else(|| invalid("Page extends beyond end of file"))?;
        parse_page(page, &mut cookies)?;
        offset += size;
    }
    Ok(cookies)
}

fn parse_page(page: &[u8], cookies: &mut Vec<Cookie>) -> Result<()> {
    if read_u32_be(page, 0)? != PAGE_HEADER {
        return Err(invalid("Unexpected page header"));
    }
    let cookie_count = read_u32_le(page, 4)? as usize;
    for index in 0..cookie_count {
        let start = read_u32_le(page, 8 + index * 4)? as usize;
        let size = read_u32_le(page, start)? as usize;
        let record = page
            .get(start..start + size)
            .ok_or_else(|| invalid("Cookie record extends beyond page"))?;
        cookies.push(parse_cookie(record)?);
    }
    Ok(())
}

fn parse_cookie(record: &[u8]) -> Result<Cookie> {
    if record.len() < COOKIE_HEADER_LEN {
        return Err(invalid("Cookie record too small"));
    }
    let flags = read_u32_le(record, 8)?;
    let domain_offset = read_u32_le(record, 16)? as usize;
    let name_offset = read_u32_le(record, 20)? as usize;
    let path_offset = read_u32_le(record, 24)? as usize;
    let value_offset = read_u32_le(record, 28)? as usize;
    let expiry = read_f64_le(record, 40)?;

    Ok(Cookie {
        domain: read_null_terminated_string_at(record, domain_offset)?,
        name: read_null_terminated_string_at(record, name_offset)?,
        path: read_null_terminated_string_at(record, path_offset)?,
        value: read_null_terminated_string_at(record, value_offset)?,
        secure: flags & FLAG_SECURE != 0,
        http_only: flags & FLAG_HTTP_ONLY != 0,
        expires: (expiry > 0.0).then(|| mac_absolute_to_unix(expiry)),
    })
}

fn invalid(message: &str) -> ExportError {
    ExportError::BrowserCookie(format!("Invalid Safari cookies file: {}", message))
}

fn field<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    data.get(offset..offset + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| invalid("Unexpected end of data"))
}

fn read_u32_be(data: &[u8], offset: usize) -> Result<u32> {
    field(data, offset).map(u32::from_be_bytes)
}

fn read_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    field(data, offset).map(u32::from_le_bytes)
}

fn read_f64_le(data: &[u8], offset: usize) -> Result<f64> {
    field(data, offset).map(f64::from_le_bytes)
}

fn read_null_terminated_string_at(data: &[u8], offset: usize) -> Result<String> {
    let tail = data
        .get(offset..)
        .filter(|tail| !tail.is_empty())
        .ok_or_else(|| invalid("String offset out of bounds"))?;
    let end = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| invalid("String not terminated"))?;
    String::from_utf8(tail[..end].to_vec()).map_err(|_| invalid("String is not valid UTF-8"))
}

/// Mac absolute time (seconds since 2001-01-01) to Unix seconds.
fn mac_absolute_to_unix(timestamp: f64) -> i64 {
    timestamp as i64 + MAC_EPOCH_OFFSET
}
