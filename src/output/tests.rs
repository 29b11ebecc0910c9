use super::{expiry_field, format_line, secure_flag, CookieFileWriter, SESSION_EXPIRY};
use crate::browser::Cookie;
use std::fs;
use tempfile::tempdir;

fn sample(secure: bool, expires: Option<i64>) -> Cookie {
    Cookie {
        name: "sid".to_string(),
        value: "abc123".to_string(),
        domain: "example.com".to_string(),
        path: "/".to_string(),
        secure,
        http_only: true,
        expires,
    }
}

#[test]
fn secure_flag_is_upper_case() {
    assert_eq!(secure_flag(true), "TRUE");
    assert_eq!(secure_flag(false), "FALSE");
}

#[test]
fn format_line_matches_netscape_layout() {
    assert_eq!(
        format_line(&sample(true, Some(1_999_999_999))),
        "example.com\tTRUE\t/\tTRUE\t1999999999\tsid\tabc123\n"
    );
}

#[test]
fn format_line_duplicates_insecure_flag() {
    let line = format_line(&sample(false, Some(5)));
    let fields: Vec<&str> = line.trim_end_matches('\n').split('\t').collect();
    assert_eq!(fields.len(), 7);
    assert_eq!(fields[1], "FALSE");
    assert_eq!(fields[3], "FALSE");
}

#[test]
fn session_cookie_expiry_is_written_as_none() {
    assert_eq!(
        format_line(&sample(false, None)),
        "example.com\tFALSE\t/\tFALSE\tNone\tsid\tabc123\n"
    );
}

#[test]
fn expiry_field_keeps_timestamp_text() {
    assert_eq!(expiry_field(Some(0)), "0");
    assert_eq!(expiry_field(Some(1_999_999_999)), "1999999999");
    assert_eq!(expiry_field(None), SESSION_EXPIRY);
}

#[test]
fn writer_truncates_existing_file() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("cookies.txt");
    fs::write(&path, "stale line\nanother\n").expect("seed");

    let mut writer = CookieFileWriter::create(&path).expect("create");
    writer.write_cookie(&sample(true, Some(1))).expect("write");
    assert_eq!(writer.finish().expect("finish"), 1);

    let written = fs::read_to_string(&path).expect("read");
    assert_eq!(written, "example.com\tTRUE\t/\tTRUE\t1\tsid\tabc123\n");
}

#[test]
fn writer_with_no_cookies_leaves_empty_file() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("cookies.txt");
    let writer = CookieFileWriter::create(&path).expect("create");
    assert_eq!(writer.finish().expect("finish"), 0);
    assert_eq!(fs::read_to_string(&path).expect("read"), "");
}
