//! get-cookies - export local browser cookies to a Netscape cookies.txt file
//!
//! This crate scans the cookie stores of the browsers installed on the local
//! machine, decrypts them where needed, and writes every cookie to
//! `cookies.txt` in the current working directory.

pub mod browser;
pub mod config;
pub mod error;
pub mod exporter;
pub mod logging;
pub mod output;
pub mod utils;

pub use error::{ExportError, Result};
pub use exporter::export;
