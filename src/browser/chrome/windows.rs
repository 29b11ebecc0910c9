use super::{decode_cookie_value, ChromiumBrowser, ChromiumSettings, CookieDecryptor};
use crate::error::{ExportError, Result};
use crate::utils::FileUtils;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dirs::home_dir;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use winapi::um::dpapi::CryptUnprotectData;
use winapi::um::winbase::LocalFree;
use winapi::um::wincrypt::DATA_BLOB;

const WINDOWS_V10_PREFIX: &[u8; 3] = b"v10";
const WINDOWS_DPAPI_PREFIX: &[u8] = b"DPAPI";
const AES_GCM_NONCE_LEN: usize = 12;
const AES_GCM_TAG_LEN: usize = 16;

#[derive(Deserialize)]
struct LocalState {
    os_crypt: Option<OsCrypt>,
}

#[derive(Deserialize)]
struct OsCrypt {
    encrypted_key: Option<String>,
}

pub(super) fn chromium_settings(browser: ChromiumBrowser) -> Result<ChromiumSettings> {
    let home = home_dir();
    let local_root = env::var("LOCALAPPDATA")
        .ok()
        .map(PathBuf::from)
        .or_else(|| home.as_ref().map(|home| home.join("AppData/Local")))
        .ok_or_else(|| ExportError::Config("Cannot determine LOCALAPPDATA".to_string()))?;
    let roaming_root = env::var("APPDATA")
        .ok()
        .map(PathBuf::from)
        .or_else(|| home.as_ref().map(|home| home.join("AppData/Roaming")))
        .ok_or_else(|| ExportError::Config("Cannot determine APPDATA".to_string()))?;

    let (root, relative_dir, supports_profiles) = match browser {
        ChromiumBrowser::Chrome => (&local_root, "Google/Chrome/User Data", true),
        ChromiumBrowser::Chromium => (&local_root, "Chromium/User Data", true),
        ChromiumBrowser::Edge => (&local_root, "Microsoft/Edge/User Data", true),
        ChromiumBrowser::Brave => (&local_root, "BraveSoftware/Brave-Browser/User Data", true),
        ChromiumBrowser::Opera => (&roaming_root, "Opera Software/Opera Stable", false),
        ChromiumBrowser::OperaGx => (&roaming_root, "Opera Software/Opera GX Stable", false),
        ChromiumBrowser::Vivaldi => (&local_root, "Vivaldi/User Data", true),
        ChromiumBrowser::Whale => (&local_root, "Naver/Naver Whale/User Data", true),
    };

    Ok(ChromiumSettings {
        user_data_dir: root.join(relative_dir),
        key_name: "",
        supports_profiles,
    })
}

pub(super) fn decryptor(
    settings: &ChromiumSettings,
    meta_version: i64,
) -> Result<Box<dyn CookieDecryptor>> {
    let v10_key = read_windows_v10_key(&settings.user_data_dir)?;
    Ok(Box::new(WindowsChromeCookieDecryptor {
        v10_key,
        meta_version,
    }))
}

struct WindowsChromeCookieDecryptor {
    v10_key: Option<Vec<u8>>,
    meta_version: i64,
}

impl CookieDecryptor for WindowsChromeCookieDecryptor {
    fn decrypt(&self, encrypted_value: &[u8]) -> Option<String> {
        if encrypted_value.len() < 3 {
            return None;
        }
        let (version, ciphertext) = encrypted_value.split_at(3);
        let plaintext = if version == WINDOWS_V10_PREFIX {
            let key = self.v10_key.as_ref()?;
            decrypt_aes_gcm(ciphertext, key).ok()?
        } else {
            decrypt_windows_dpapi(encrypted_value).ok()?
        };
        decode_cookie_value(&plaintext, self.meta_version)
    }
}

fn read_windows_v10_key(browser_root: &Path) -> Result<Option<Vec<u8>>> {
    let local_state_path =
        match FileUtils::newest_path(FileUtils::find_files(browser_root, "Local State")) {
            Some(path) => path,
            None => return Ok(None),
        };
    let data = fs::read_to_string(&local_state_path).map_err(|e| {
        crate::browser::map_cookie_io_error(
            "Failed to read Local State",
            &local_state_path,
            e,
            Some("Close the browser or run without elevation."),
        )
    })?;
    let encrypted_key = match serde_json::from_str::<LocalState>(&data) {
        Ok(state) => state.os_crypt.and_then(|os_crypt| os_crypt.encrypted_key),
        Err(err) => {
            log::warn!("Failed to parse Local State: {}", err);
            None
        }
    };
    let encrypted_bytes = match encrypted_key.and_then(|key| STANDARD.decode(key).ok()) {
        Some(bytes) => bytes,
        None => return Ok(None),
    };
    if !encrypted_bytes.starts_with(WINDOWS_DPAPI_PREFIX) {
        log::warn!("Invalid DPAPI prefix in Local State");
        return Ok(None);
    }
    Ok(decrypt_windows_dpapi(&encrypted_bytes[WINDOWS_DPAPI_PREFIX.len()..]).ok())
}

fn decrypt_aes_gcm(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if key.len() != 32 {
        return Err(ExportError::BrowserCookie(
            "Invalid AES-GCM key length".to_string(),
        ));
    }
    if ciphertext.len() < AES_GCM_NONCE_LEN + AES_GCM_TAG_LEN {
        return Err(ExportError::BrowserCookie(
            "Invalid AES-GCM ciphertext length".to_string(),
        ));
    }
    let (nonce_bytes, payload) = ciphertext.split_at(AES_GCM_NONCE_LEN);
    let nonce = aes_gcm::Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| {
        ExportError::BrowserCookie(format!("Failed to create AES-GCM cipher: {}", e))
    })?;
    cipher
        .decrypt(nonce, payload)
        .map_err(|_| ExportError::BrowserCookie("Failed to decrypt cookie".to_string()))
}

fn decrypt_windows_dpapi(ciphertext: &[u8]) -> Result<Vec<u8>> {
    // SAFETY: the input blob borrows `ciphertext` for the duration of the
    // call, and the output buffer is copied before being released with
    // LocalFree as the DPAPI contract requires.
    unsafe {
        let mut in_blob = DATA_BLOB {
            cbData: ciphertext.len() as u32,
            pbData: ciphertext.as_ptr() as *mut u8,
        };
        let mut out_blob = DATA_BLOB {
            cbData: 0,
            pbData: std::ptr::null_mut(),
        };

        let result = CryptUnprotectData(
            &mut in_blob,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            0,
            &mut out_blob,
        );
        if result == 0 {
            return Err(ExportError::BrowserCookie(
                "Failed to decrypt with DPAPI".to_string(),
            ));
        }

        let data = std::slice::from_raw_parts(out_blob.pbData, out_blob.cbData as usize).to_vec();
        LocalFree(out_blob.pbData as *mut _);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::{decrypt_aes_gcm, LocalState};
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::Aes256Gcm;

    #[test]
    fn local_state_key_is_optional() {
        let state: LocalState = serde_json::from_str("{}").expect("parse");
        assert!(state.os_crypt.is_none());
        let state: LocalState =
            serde_json::from_str(r#"{"os_crypt":{"encrypted_key":"RFBBUEk="}}"#).expect("parse");
        assert_eq!(
            state.os_crypt.and_then(|c| c.encrypted_key).as_deref(),
            Some("RFBBUEk=")
        );
    }

    #[test]
    fn aes_gcm_decrypts_nonce_prefixed_payload() {
        let key = [9u8; 32];
        let nonce = [1u8; 12];
        let cipher = Aes256Gcm::new_from_slice(&key).expect("cipher");
        let sealed = cipher
            .encrypt(aes_gcm::Nonce::from_slice(&nonce), b"abc123".as_ref())
            .expect("encrypt");
        let mut payload = nonce.to_vec();
        payload.extend(sealed);
        assert_eq!(decrypt_aes_gcm(&payload, &key).expect("decrypt"), b"abc123");
    }

    #[test]
    fn aes_gcm_rejects_short_input() {
        assert!(decrypt_aes_gcm(&[0u8; 10], &[0u8; 32]).is_err());
        assert!(decrypt_aes_gcm(&[0u8; 40], &[0u8; 16]).is_err());
    }
}
