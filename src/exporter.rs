//! Cookie export pipeline
//!
//! Load cookies, then write them to the output file, behind a single
//! failure boundary. Failures are printed as `Error: <description>` and
//! never turned into a non-zero exit status. A file left half-written by a
//! failure stays on disk as is.

use crate::browser::{BrowserCookieLoader, CookieSource};
use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::output::CookieFileWriter;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Writes the cookies produced by a [`CookieSource`] to a Netscape file
pub struct CookieExporter<S> {
    source: S,
    output: PathBuf,
}

impl<S: CookieSource> CookieExporter<S> {
    pub fn new(source: S, output: impl Into<PathBuf>) -> Self {
        Self {
            source,
            output: output.into(),
        }
    }

    /// Run the export and return the number of lines written.
    ///
    /// The output file is only created once the source has produced its
    /// cookies, so a failing source leaves any previous file untouched.
    pub fn export(&self) -> Result<usize> {
        let cookies = self.source.load()?;
        log::debug!("Writing {} cookies to {:?}", cookies.len(), self.output);

        let mut writer = CookieFileWriter::create(&self.output)?;
        for cookie in &cookies {
            writer.write_cookie(cookie)?;
        }
        writer.finish()
    }
}

/// Text printed for a failed export.
pub fn error_message(err: &ExportError) -> String {
    format!("Error: {}", err)
}

/// Export from `source` to `output`, reporting any failure on `report`.
pub fn run<S: CookieSource, W: Write>(source: S, output: &Path, report: &mut W) {
    match CookieExporter::new(source, output).export() {
        Ok(count) => log::info!("Exported {} cookies to {:?}", count, output),
        Err(err) => {
            if let Err(write_err) = writeln!(report, "{}", error_message(&err)) {
                log::error!("Failed to report export error: {}", write_err);
            }
        }
    }
}

/// Export every local browser cookie to `cookies.txt` in the working directory.
pub fn export() {
    let config = ExportConfig::default();
    let loader = BrowserCookieLoader::new(config.browsers);
    run(loader, &config.output, &mut io::stdout());
}
