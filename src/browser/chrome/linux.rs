use super::cbc_key::{decrypt_aes_cbc, derive_key, KEY_LENGTH};
use super::{decode_cookie_value, ChromiumBrowser, ChromiumSettings, CookieDecryptor};
use crate::error::{ExportError, Result};
use dirs::{config_dir, home_dir};
use secret_service::blocking::SecretService;
use secret_service::EncryptionType;
use std::env;
use std::process::Command;

const KEY_DERIVE_ITERATIONS: u32 = 1;
const LINUX_V10_PASSWORD: &[u8] = b"peanuts";

pub(super) fn chromium_settings(browser: ChromiumBrowser) -> Result<ChromiumSettings> {
    let config_home = config_dir().or_else(|| home_dir().map(|home| home.join(".config")));
    let config_home = config_home
        .ok_or_else(|| ExportError::Config("Cannot determine config directory".to_string()))?;
    let (relative_dir, key_name, supports_profiles) = match browser {
        ChromiumBrowser::Chrome => ("google-chrome", "Chrome", true),
        ChromiumBrowser::Chromium => ("chromium", "Chromium", true),
        ChromiumBrowser::Edge => ("microsoft-edge", "Chromium", true),
        ChromiumBrowser::Brave => ("BraveSoftware/Brave-Browser", "Brave", true),
        ChromiumBrowser::Opera => ("opera", "Chromium", false),
        ChromiumBrowser::OperaGx => ("opera-gx", "Chromium", false),
        ChromiumBrowser::Vivaldi => ("vivaldi", "Chrome", true),
        ChromiumBrowser::Whale => ("naver-whale", "Whale", true),
    };
    Ok(ChromiumSettings {
        user_data_dir: config_home.join(relative_dir),
        key_name,
        supports_profiles,
    })
}

pub(super) fn decryptor(
    settings: &ChromiumSettings,
    meta_version: i64,
) -> Result<Box<dyn CookieDecryptor>> {
    let password = get_linux_keyring_password(settings.key_name);
    Ok(Box::new(LinuxChromeCookieDecryptor::new(
        password.as_deref(),
        meta_version,
    )))
}

struct LinuxChromeCookieDecryptor {
    v10_key: [u8; KEY_LENGTH],
    empty_key: [u8; KEY_LENGTH],
    v11_key: Option<[u8; KEY_LENGTH]>,
    meta_version: i64,
}

impl LinuxChromeCookieDecryptor {
    fn new(keyring_password: Option<&[u8]>, meta_version: i64) -> Self {
        Self {
            v10_key: derive_key(LINUX_V10_PASSWORD, KEY_DERIVE_ITERATIONS),
            empty_key: derive_key(b"", KEY_DERIVE_ITERATIONS),
            v11_key: keyring_password.map(|password| derive_key(password, KEY_DERIVE_ITERATIONS)),
            meta_version,
        }
    }
}

impl CookieDecryptor for LinuxChromeCookieDecryptor {
    fn decrypt(&self, encrypted_value: &[u8]) -> Option<String> {
        if encrypted_value.len() < 3 {
            return None;
        }
        let (version, ciphertext) = encrypted_value.split_at(3);
        let primary = match version {
            b"v10" => &self.v10_key,
            b"v11" => self.v11_key.as_ref()?,
            _ => {
                log::warn!("Unknown Chrome cookie version: {:?}", version);
                return None;
            }
        };
        // Some builds encrypt with an empty password when no keyring is reachable.
        for key in [primary, &self.empty_key] {
            if let Ok(plaintext) = decrypt_aes_cbc(ciphertext, key) {
                if let Some(value) = decode_cookie_value(&plaintext, self.meta_version) {
                    return Some(value);
                }
            }
        }
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LinuxDesktopEnvironment {
    Other,
    Cinnamon,
    Deepin,
    Gnome,
    Kde3,
    Kde4,
    Kde5,
    Kde6,
    Pantheon,
    Ukui,
    Unity,
    Xfce,
    Lxqt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LinuxKeyring {
    KWallet,
    KWallet5,
    KWallet6,
    GnomeKeyring,
    BasicText,
}

/// Snapshot of the session variables used to guess the desktop.
#[derive(Default)]
struct DesktopSession {
    xdg_current_desktop: Option<String>,
    desktop_session: String,
    kde_session_version: Option<String>,
    gnome_session_id: bool,
    kde_full_session: bool,
}

impl DesktopSession {
    fn from_env() -> Self {
        Self {
            xdg_current_desktop: env::var("XDG_CURRENT_DESKTOP").ok(),
            desktop_session: env::var("DESKTOP_SESSION").unwrap_or_default(),
            kde_session_version: env::var("KDE_SESSION_VERSION").ok(),
            gnome_session_id: env::var("GNOME_DESKTOP_SESSION_ID").is_ok(),
            kde_full_session: env::var("KDE_FULL_SESSION").is_ok(),
        }
    }

    fn desktop_environment(&self) -> LinuxDesktopEnvironment {
        if let Some(xdg_current_desktop) = &self.xdg_current_desktop {
            for part in xdg_current_desktop.split(':').map(|part| part.trim()) {
                match part {
                    "Unity" => {
                        if self.desktop_session.contains("gnome-fallback") {
                            return LinuxDesktopEnvironment::Gnome;
                        }
                        return LinuxDesktopEnvironment::Unity;
                    }
                    "Deepin" => return LinuxDesktopEnvironment::Deepin,
                    "GNOME" => return LinuxDesktopEnvironment::Gnome,
                    "X-Cinnamon" => return LinuxDesktopEnvironment::Cinnamon,
                    "KDE" => {
                        return match self.kde_session_version.as_deref() {
                            Some("5") => LinuxDesktopEnvironment::Kde5,
                            Some("6") => LinuxDesktopEnvironment::Kde6,
                            _ => LinuxDesktopEnvironment::Kde4,
                        };
                    }
                    "Pantheon" => return LinuxDesktopEnvironment::Pantheon,
                    "XFCE" => return LinuxDesktopEnvironment::Xfce,
                    "UKUI" => return LinuxDesktopEnvironment::Ukui,
                    "LXQt" => return LinuxDesktopEnvironment::Lxqt,
                    _ => {}
                }
            }
        }

        match self.desktop_session.as_str() {
            "deepin" => return LinuxDesktopEnvironment::Deepin,
            "mate" | "gnome" => return LinuxDesktopEnvironment::Gnome,
            "kde4" | "kde-plasma" => return LinuxDesktopEnvironment::Kde4,
            "kde" => {
                if self.kde_session_version.is_some() {
                    return LinuxDesktopEnvironment::Kde4;
                }
                return LinuxDesktopEnvironment::Kde3;
            }
            "ukui" => return LinuxDesktopEnvironment::Ukui,
            _ => {}
        }

        if self.desktop_session.contains("xfce") || self.desktop_session == "xubuntu" {
            return LinuxDesktopEnvironment::Xfce;
        }
        if self.gnome_session_id {
            return LinuxDesktopEnvironment::Gnome;
        }
        if self.kde_full_session {
            if self.kde_session_version.is_some() {
                return LinuxDesktopEnvironment::Kde4;
            }
            return LinuxDesktopEnvironment::Kde3;
        }

        LinuxDesktopEnvironment::Other
    }
}

fn choose_linux_keyring(desktop_environment: LinuxDesktopEnvironment) -> LinuxKeyring {
    match desktop_environment {
        LinuxDesktopEnvironment::Kde4 => LinuxKeyring::KWallet,
        LinuxDesktopEnvironment::Kde5 => LinuxKeyring::KWallet5,
        LinuxDesktopEnvironment::Kde6 => LinuxKeyring::KWallet6,
        LinuxDesktopEnvironment::Kde3
        | LinuxDesktopEnvironment::Lxqt
        | LinuxDesktopEnvironment::Other => LinuxKeyring::BasicText,
        _ => LinuxKeyring::GnomeKeyring,
    }
}

/// Password protecting `v11` values, if the desktop keyring holds one.
fn get_linux_keyring_password(browser_keyring_name: &str) -> Option<Vec<u8>> {
    let keyring = choose_linux_keyring(DesktopSession::from_env().desktop_environment());
    log::debug!("Using Linux keyring {:?}", keyring);
    let password = match keyring {
        LinuxKeyring::KWallet | LinuxKeyring::KWallet5 | LinuxKeyring::KWallet6 => {
            get_kwallet_password(browser_keyring_name, keyring)
        }
        LinuxKeyring::GnomeKeyring => get_gnome_keyring_password(browser_keyring_name),
        LinuxKeyring::BasicText => None,
    };
    password.filter(|password| !password.is_empty())
}

fn get_kwallet_password(browser_keyring_name: &str, keyring: LinuxKeyring) -> Option<Vec<u8>> {
    let network_wallet = get_kwallet_network_wallet(keyring);
    let output = Command::new("kwallet-query")
        .args([
            "--read-password",
            &format!("{} Safe Storage", browser_keyring_name),
            "--folder",
            &format!("{} Keys", browser_keyring_name),
            &network_wallet,
        ])
        .output();

    let output = match output {
        Ok(output) => output,
        Err(err) => {
            log::warn!("kwallet-query command failed: {}", err);
            return None;
        }
    };

    if !output.status.success() {
        log::warn!(
            "kwallet-query failed with status {}",
            output.status.code().unwrap_or(-1)
        );
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.to_lowercase().starts_with("failed to read") {
        log::debug!("Failed to read password from kwallet");
        return None;
    }
    Some(stdout.trim_end_matches('\n').as_bytes().to_vec())
}

fn get_kwallet_network_wallet(keyring: LinuxKeyring) -> String {
    let default_wallet = "kdewallet".to_string();
    let (service_name, wallet_path) = match keyring {
        LinuxKeyring::KWallet => ("org.kde.kwalletd", "/modules/kwalletd"),
        LinuxKeyring::KWallet5 => ("org.kde.kwalletd5", "/modules/kwalletd5"),
        LinuxKeyring::KWallet6 => ("org.kde.kwalletd6", "/modules/kwalletd6"),
        _ => return default_wallet,
    };

    let output = Command::new("dbus-send")
        .args([
            "--session",
            "--print-reply=literal",
            &format!("--dest={}", service_name),
            wallet_path,
            "org.kde.KWallet.networkWallet",
        ])
        .output();

    match output {
        Ok(output) if output.status.success() => {
            parse_network_wallet(&String::from_utf8_lossy(&output.stdout))
                .unwrap_or(default_wallet)
        }
        Ok(output) => {
            log::warn!(
                "dbus-send failed with status {}",
                output.status.code().unwrap_or(-1)
            );
            default_wallet
        }
        Err(err) => {
            log::warn!("dbus-send failed: {}", err);
            default_wallet
        }
    }
}

fn parse_network_wallet(reply: &str) -> Option<String> {
    reply.lines().find_map(|line| {
        let start = line.find("string \"")?;
        let rest = &line[start + "string \"".len()..];
        let end = rest.find('"')?;
        Some(rest[..end].to_string())
    })
}

fn get_gnome_keyring_password(browser_keyring_name: &str) -> Option<Vec<u8>> {
    let service = match SecretService::connect(EncryptionType::Dh) {
        Ok(service) => service,
        Err(err) => {
            log::warn!("Failed to connect to secret service: {}", err);
            return None;
        }
    };

    let collection = service
        .get_default_collection()
        .or_else(|_| service.get_any_collection());
    let collection = match collection {
        Ok(collection) => collection,
        Err(err) => {
            log::warn!("Failed to read keyring collection: {}", err);
            return None;
        }
    };

    let items = match collection.get_all_items() {
        Ok(items) => items,
        Err(err) => {
            log::warn!("Failed to read keyring items: {}", err);
            return None;
        }
    };

    let label = format!("{} Safe Storage", browser_keyring_name);
    for item in items {
        if item.get_label().unwrap_or_default() != label {
            continue;
        }
        if item.is_locked().unwrap_or(false) {
            if let Err(err) = item.unlock() {
                log::warn!("Failed to unlock keyring item: {}", err);
            }
        }
        return match item.get_secret() {
            Ok(secret) => Some(secret),
            Err(err) => {
                log::warn!("Failed to read keyring secret: {}", err);
                None
            }
        };
    }

    log::warn!("No '{}' entry in the keyring", label);
    None
}
