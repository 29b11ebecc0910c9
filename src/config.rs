//! Configuration for get-cookies

use std::fmt;
use std::path::PathBuf;

/// Fixed name of the exported cookie file, relative to the working directory.
pub const OUTPUT_FILE: &str = "cookies.txt";

/// Browser types supported for cookie extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
    Chrome,
    Chromium,
    Opera,
    OperaGx,
    Brave,
    Edge,
    Vivaldi,
    Whale,
    Firefox,
    LibreWolf,
    Safari,
}

impl Browser {
    /// Every supported browser, in the order the loader visits them.
    pub const ALL: [Browser; 11] = [
        Browser::Chrome,
        Browser::Chromium,
        Browser::Opera,
        Browser::OperaGx,
        Browser::Brave,
        Browser::Edge,
        Browser::Vivaldi,
        Browser::Whale,
        Browser::Firefox,
        Browser::LibreWolf,
        Browser::Safari,
    ];
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Browser::Chrome => "Chrome",
            Browser::Chromium => "Chromium",
            Browser::Opera => "Opera",
            Browser::OperaGx => "Opera GX",
            Browser::Brave => "Brave",
            Browser::Edge => "Edge",
            Browser::Vivaldi => "Vivaldi",
            Browser::Whale => "Whale",
            Browser::Firefox => "Firefox",
            Browser::LibreWolf => "LibreWolf",
            Browser::Safari => "Safari",
        };
        write!(f, "{}", name)
    }
}

/// Browser cookie configuration
///
/// `profile` is either a profile directory name inside the browser's data
/// directory or a path (directory or database file).
#[derive(Debug, Clone)]
pub struct BrowserCookieConfig {
    pub browser: Browser,
    pub profile: Option<String>,
}

impl BrowserCookieConfig {
    pub fn new(browser: Browser) -> Self {
        Self {
            browser,
            profile: None,
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }
}

/// Export configuration
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub output: PathBuf,
    pub browsers: Vec<BrowserCookieConfig>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            output: PathBuf::from(OUTPUT_FILE),
            browsers: Browser::ALL
                .iter()
                .map(|browser| BrowserCookieConfig::new(*browser))
                .collect(),
        }
    }
}
