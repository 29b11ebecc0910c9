use super::{extract_gecko_cookies, gecko_expiry_to_unix_seconds, read_cookies, GeckoBrowser};
use crate::config::{Browser, BrowserCookieConfig};
use crate::error::ExportError;
use rusqlite::Connection;
use std::path::Path;
use tempfile::tempdir;

fn create_cookie_db(path: &Path, schema_version: i64) {
    let conn = Connection::open(path).expect("open firefox db");
    conn.execute_batch(&format!("PRAGMA user_version = {};", schema_version))
        .expect("set schema version");
    conn.execute(
        "CREATE TABLE moz_cookies (
            id INTEGER PRIMARY KEY,
            host TEXT,
            name TEXT,
            value TEXT,
            path TEXT,
            expiry INTEGER,
            isSecure INTEGER,
            isHttpOnly INTEGER
        )",
        [],
    )
    .expect("create moz_cookies");
}

fn insert(path: &Path, row: (&str, &str, &str, &str, i64, i64, i64)) {
    let conn = Connection::open(path).expect("open firefox db");
    conn.execute(
        "INSERT INTO moz_cookies (host, name, value, path, expiry, isSecure, isHttpOnly)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        row,
    )
    .expect("insert cookie");
}

#[test]
fn extracts_cookies_from_database_path() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("cookies.sqlite");
    create_cookie_db(&db_path, 16);
    insert(
        &db_path,
        (".example.com", "sid", "abc123", "/", 1_999_999_999_000, 1, 1),
    );
    insert(&db_path, ("example.org", "pref", "dark", "/app", 0, 0, 0));

    let config = BrowserCookieConfig::new(Browser::Firefox)
        .with_profile(db_path.to_string_lossy().to_string());
    let cookies = extract_gecko_cookies(GeckoBrowser::Firefox, &config).expect("extract");

    assert_eq!(cookies.len(), 2);
    assert_eq!(cookies[0].domain, ".example.com");
    assert_eq!(cookies[0].expires, Some(1_999_999_999));
    assert!(cookies[0].secure);
    assert!(cookies[0].http_only);
    assert_eq!(cookies[1].path, "/app");
    assert_eq!(cookies[1].expires, None);
    assert!(!cookies[1].secure);
}

#[test]
fn finds_database_inside_profile_directory() {
    let dir = tempdir().expect("tempdir");
    let profile = dir.path().join("abcd.default-release");
    std::fs::create_dir_all(&profile).expect("mkdir");
    let db_path = profile.join("cookies.sqlite");
    create_cookie_db(&db_path, 12);
    insert(&db_path, ("example.com", "a", "b", "/", 1_700_000_000, 0, 0));

    let config = BrowserCookieConfig::new(Browser::LibreWolf)
        .with_profile(dir.path().to_string_lossy().to_string());
    let cookies = extract_gecko_cookies(GeckoBrowser::LibreWolf, &config).expect("extract");
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].expires, Some(1_700_000_000));
}

#[test]
fn empty_store_is_reported_as_unavailable() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("cookies.sqlite");
    create_cookie_db(&db_path, 16);

    let config = BrowserCookieConfig::new(Browser::Firefox)
        .with_profile(db_path.to_string_lossy().to_string());
    let err = extract_gecko_cookies(GeckoBrowser::Firefox, &config).expect_err("empty");
    assert!(matches!(err, ExportError::BrowserCookie(_)));
    assert!(err.is_unavailable());
}

#[test]
fn missing_profile_is_not_found() {
    let dir = tempdir().expect("tempdir");
    let config = BrowserCookieConfig::new(Browser::Firefox)
        .with_profile(dir.path().join("nope").to_string_lossy().to_string());
    let err = extract_gecko_cookies(GeckoBrowser::Firefox, &config).expect_err("missing");
    assert!(matches!(err, ExportError::FileNotFound(_)));
}

#[test]
fn legacy_expires_column_is_accepted() {
    let conn = Connection::open_in_memory().expect("open");
    conn.execute(
        "CREATE TABLE moz_cookies (host TEXT, name TEXT, value TEXT, path TEXT, expires INTEGER, isSecure INTEGER)",
        [],
    )
    .expect("create");
    conn.execute(
        "INSERT INTO moz_cookies VALUES ('example.com', 'n', 'v', '/', 1234, 1)",
        [],
    )
    .expect("insert");
    let cookies = read_cookies(&conn).expect("read");
    assert_eq!(cookies[0].expires, Some(1234));
    assert!(!cookies[0].http_only);
}

#[test]
fn expiry_units_follow_schema_version() {
    assert_eq!(gecko_expiry_to_unix_seconds(Some(5_000), 16), Some(5));
    assert_eq!(gecko_expiry_to_unix_seconds(Some(5_000), 15), Some(5_000));
    assert_eq!(gecko_expiry_to_unix_seconds(Some(0), 16), None);
    assert_eq!(gecko_expiry_to_unix_seconds(None, 16), None);
}

#[test]
fn null_and_malformed_rows_keep_the_rest() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("cookies.sqlite");
    create_cookie_db(&db_path, 16);
    insert(&db_path, ("a.com", "good", "ok", "/", 1_999_999_999_000, 0, 0));
    let conn = Connection::open(&db_path).expect("open firefox db");
    conn.execute_batch(
        "INSERT INTO moz_cookies (host, name, value) VALUES ('a.com', 'bare', NULL);
         INSERT INTO moz_cookies (host, name, value, path, expiry, isSecure)
             VALUES ('a.com', 'broken', 'x', '/', 'never', 0);",
    )
    .expect("insert rows");

    let cookies = read_cookies(&conn).expect("read");
    let names: Vec<&str> = cookies.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["good", "bare"]);
    assert_eq!(cookies[1].value, "");
    assert_eq!(cookies[1].expires, None);
    assert!(!cookies[1].secure);
}
