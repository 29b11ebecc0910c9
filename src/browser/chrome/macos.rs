use super::cbc_key::{decrypt_aes_cbc, derive_key, KEY_LENGTH};
use super::{decode_cookie_value, ChromiumBrowser, ChromiumSettings, CookieDecryptor};
use crate::error::{ExportError, Result};
use dirs::home_dir;
use security_framework::passwords::get_generic_password;

const KEY_DERIVE_ITERATIONS: u32 = 1003;

pub(super) fn chromium_settings(browser: ChromiumBrowser) -> Result<ChromiumSettings> {
    let home = home_dir()
        .ok_or_else(|| ExportError::Config("Cannot determine home directory".to_string()))?;
    let app_support = home.join("Library/Application Support");
    let (relative_dir, key_name, supports_profiles) = match browser {
        ChromiumBrowser::Chrome => ("Google/Chrome", "Chrome", true),
        ChromiumBrowser::Chromium => ("Chromium", "Chromium", true),
        ChromiumBrowser::Edge => ("Microsoft Edge", "Microsoft Edge", true),
        ChromiumBrowser::Brave => ("BraveSoftware/Brave-Browser", "Brave", true),
        ChromiumBrowser::Opera => ("com.operasoftware.Opera", "Opera", false),
        ChromiumBrowser::OperaGx => ("com.operasoftware.OperaGX", "Opera", false),
        ChromiumBrowser::Vivaldi => ("Vivaldi", "Vivaldi", true),
        ChromiumBrowser::Whale => ("Naver/Whale", "Whale", true),
    };
    Ok(ChromiumSettings {
        user_data_dir: app_support.join(relative_dir),
        key_name,
        supports_profiles,
    })
}

pub(super) fn decryptor(
    settings: &ChromiumSettings,
    meta_version: i64,
) -> Result<Box<dyn CookieDecryptor>> {
    let service = format!("{} Safe Storage", settings.key_name);
    let key = match get_generic_password(&service, settings.key_name) {
        Ok(password) => Some(derive_key(&password, KEY_DERIVE_ITERATIONS)),
        Err(err) => {
            log::warn!(
                "Failed to read keychain password for {}: {}",
                settings.key_name,
                err
            );
            None
        }
    };
    Ok(Box::new(MacChromeCookieDecryptor { key, meta_version }))
}

struct MacChromeCookieDecryptor {
    key: Option<[u8; KEY_LENGTH]>,
    meta_version: i64,
}

impl CookieDecryptor for MacChromeCookieDecryptor {
    fn decrypt(&self, encrypted_value: &[u8]) -> Option<String> {
        if encrypted_value.len() < 3 {
            return None;
        }
        let (version, ciphertext) = encrypted_value.split_at(3);
        if version == b"v10" {
            let key = self.key.as_ref()?;
            let plaintext = decrypt_aes_cbc(ciphertext, key).ok()?;
            decode_cookie_value(&plaintext, self.meta_version)
        } else {
            // Pre-encryption databases stored the plain value in this column.
            String::from_utf8(encrypted_value.to_vec()).ok()
        }
    }
}
