//! Netscape cookie-file formatting and writing
//!
//! Each cookie becomes one tab-separated line:
//! `domain, SECURE, path, SECURE, expiry, name, value`.
//! The secure flag fills both the second and fourth fields.

use crate::browser::Cookie;
use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Upper-case textual form of a boolean flag.
pub fn secure_flag(secure: bool) -> &'static str {
    if secure {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Text written in the expiry field of a session cookie.
pub const SESSION_EXPIRY: &str = "None";

/// Expiry field text: the timestamp as is, or [`SESSION_EXPIRY`].
pub fn expiry_field(expires: Option<i64>) -> String {
    match expires {
        Some(seconds) => seconds.to_string(),
        None => SESSION_EXPIRY.to_string(),
    }
}

/// Format one cookie as a Netscape line, including the trailing newline.
pub fn format_line(cookie: &Cookie) -> String {
    let flag = secure_flag(cookie.secure);
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
        cookie.domain,
        flag,
        cookie.path,
        flag,
        expiry_field(cookie.expires),
        cookie.name,
        cookie.value
    )
}

/// Streams Netscape lines into a freshly truncated file
pub struct CookieFileWriter {
    writer: BufWriter<File>,
    lines: usize,
}

impl CookieFileWriter {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    pub fn write_cookie(&mut self, cookie: &Cookie) -> Result<()> {
        self.writer.write_all(format_line(cookie).as_bytes())?;
        self.lines += 1;
        Ok(())
    }

    /// Flush buffered lines and return how many were written.
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.lines)
    }
}

#[cfg(test)]
mod tests;
