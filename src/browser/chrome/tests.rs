use super::{
    chromium_expires_to_unix_seconds, decode_cookie_value, read_cookies, read_meta_version,
    CookieDecryptor,
};
use rusqlite::Connection;

/// Treats the ciphertext as the plain value, prefixed with "enc:".
struct PrefixDecryptor;

impl CookieDecryptor for PrefixDecryptor {
    fn decrypt(&self, encrypted_value: &[u8]) -> Option<String> {
        let value = std::str::from_utf8(encrypted_value).ok()?;
        value.strip_prefix("enc:").map(str::to_string)
    }
}

fn cookie_db(secure_column: &str, with_httponly: bool) -> Connection {
    let conn = Connection::open_in_memory().expect("open db");
    conn.execute("CREATE TABLE meta (key TEXT, value TEXT)", [])
        .expect("create meta");
    conn.execute("INSERT INTO meta (key, value) VALUES ('version', '24')", [])
        .expect("insert meta");
    let httponly = if with_httponly {
        ", is_httponly INTEGER"
    } else {
        ""
    };
    conn.execute(
        &format!(
            "CREATE TABLE cookies (
                host_key TEXT,
                name TEXT,
                value TEXT,
                encrypted_value BLOB,
                path TEXT,
                expires_utc INTEGER,
                {} INTEGER{}
            )",
            secure_column, httponly
        ),
        [],
    )
    .expect("create cookies");
    conn
}

fn insert(conn: &Connection, host: &str, name: &str, value: &str, encrypted: &[u8], secure: i64) {
    conn.execute(
        "INSERT INTO cookies (
            host_key, name, value, encrypted_value, path, expires_utc, is_secure, is_httponly
         ) VALUES (?1, ?2, ?3, ?4, '/', 13000000000000000, ?5, 0)",
        (host, name, value, encrypted.to_vec(), secure),
    )
    .expect("insert cookie");
}

#[test]
fn reads_plain_and_encrypted_rows_in_order() {
    let conn = cookie_db("is_secure", true);
    insert(&conn, "example.com", "sid", "abc123", b"", 1);
    insert(&conn, ".example.org", "token", "", b"enc:secret", 0);

    let cookies = read_cookies(&conn, &PrefixDecryptor).expect("read cookies");
    assert_eq!(cookies.len(), 2);
    assert_eq!(cookies[0].domain, "example.com");
    assert_eq!(cookies[0].value, "abc123");
    assert!(cookies[0].secure);
    assert_eq!(cookies[1].name, "token");
    assert_eq!(cookies[1].value, "secret");
    assert!(!cookies[1].secure);
    assert_eq!(cookies[1].expires, Some(13_000_000_000 - 11_644_473_600));
}

#[test]
fn skips_rows_that_cannot_be_decrypted() {
    let conn = cookie_db("is_secure", true);
    insert(&conn, "example.com", "bad", "", b"v10garbage", 0);
    insert(&conn, "example.com", "good", "ok", b"", 0);

    let cookies = read_cookies(&conn, &PrefixDecryptor).expect("read cookies");
    let names: Vec<&str> = cookies.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["good"]);
}

#[test]
fn keeps_empty_cookies() {
    let conn = cookie_db("is_secure", true);
    insert(&conn, "example.com", "flag", "", b"", 0);
    let cookies = read_cookies(&conn, &PrefixDecryptor).expect("read cookies");
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].value, "");
}

#[test]
fn null_columns_fall_back_to_defaults() {
    let conn = cookie_db("is_secure", true);
    insert(&conn, "a.com", "good", "ok", b"", 1);
    conn.execute(
        "INSERT INTO cookies (host_key, name, value, encrypted_value, path, expires_utc)
         VALUES ('a.com', 'bare', NULL, NULL, NULL, NULL)",
        [],
    )
    .expect("insert null row");

    let cookies = read_cookies(&conn, &PrefixDecryptor).expect("read cookies");
    assert_eq!(cookies.len(), 2);
    assert_eq!(cookies[0].name, "good");
    assert_eq!(cookies[0].value, "ok");
    assert_eq!(cookies[1].name, "bare");
    assert_eq!(cookies[1].value, "");
    assert_eq!(cookies[1].path, "");
    assert!(!cookies[1].secure);
    assert!(!cookies[1].http_only);
    assert_eq!(cookies[1].expires, None);
}

#[test]
fn malformed_row_does_not_drop_the_rest() {
    let conn = cookie_db("is_secure", true);
    insert(&conn, "a.com", "first", "1", b"", 0);
    conn.execute(
        "INSERT INTO cookies (host_key, name, value, encrypted_value, path, expires_utc, is_secure)
         VALUES ('a.com', 'broken', 'x', X'', '/', 'soon', 0)",
        [],
    )
    .expect("insert malformed row");
    insert(&conn, "a.com", "last", "2", b"", 0);

    let cookies = read_cookies(&conn, &PrefixDecryptor).expect("read cookies");
    let names: Vec<&str> = cookies.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["first", "last"]);
}

#[test]
fn tolerates_old_schema_without_httponly() {
    let conn = cookie_db("secure", false);
    conn.execute(
        "INSERT INTO cookies (host_key, name, value, encrypted_value, path, expires_utc, secure)
         VALUES ('example.com', 'a', 'b', X'', '/', 0, 1)",
        [],
    )
    .expect("insert");
    let cookies = read_cookies(&conn, &PrefixDecryptor).expect("read cookies");
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].secure);
    assert!(!cookies[0].http_only);
    assert_eq!(cookies[0].expires, None);
}

#[test]
fn meta_version_defaults_to_zero() {
    let conn = cookie_db("is_secure", true);
    assert_eq!(read_meta_version(&conn), 24);
    let empty = Connection::open_in_memory().expect("open db");
    assert_eq!(read_meta_version(&empty), 0);
}

#[test]
fn expiry_converts_from_windows_epoch() {
    assert_eq!(chromium_expires_to_unix_seconds(0), None);
    assert_eq!(chromium_expires_to_unix_seconds(1_000_000), None);
    assert_eq!(
        chromium_expires_to_unix_seconds((1_999_999_999 + 11_644_473_600) * 1_000_000),
        Some(1_999_999_999)
    );
}

#[test]
fn decode_strips_digest_only_for_new_versions() {
    let mut plaintext = vec![b'x'; 32];
    plaintext.extend_from_slice(b"value");
    assert_eq!(
        decode_cookie_value(&plaintext, 24),
        Some("value".to_string())
    );
    assert_eq!(
        decode_cookie_value(b"value", 24),
        Some("value".to_string())
    );
    assert_eq!(decode_cookie_value(&plaintext, 23).map(|v| v.len()), Some(37));
    assert_eq!(decode_cookie_value(&[0xff, 0xfe], 0), None);
}
