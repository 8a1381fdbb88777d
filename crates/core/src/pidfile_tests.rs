// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{PidfileContents, PidfileParseError};

#[test]
fn empty_file_parses_to_empty_contents() {
    let contents = PidfileContents::parse("").unwrap();
    assert!(contents.is_empty());
    assert!(!contents.is_complete());
}

#[test]
fn whitespace_only_is_empty() {
    let contents = PidfileContents::parse("\n  \n").unwrap();
    assert!(contents.is_empty());
}

#[test]
fn pid_only_means_running() {
    let contents = PidfileContents::parse("4312\n").unwrap();
    assert_eq!(contents.pid, Some(4312));
    assert_eq!(contents.exit_status, None);
    assert!(!contents.is_complete());
}

#[test]
fn full_contents_parse() {
    let contents = PidfileContents::parse("4312\n1\n3\n").unwrap();
    assert_eq!(contents.pid, Some(4312));
    assert_eq!(contents.exit_status, Some(1));
    assert_eq!(contents.num_tests_failed, Some(3));
    assert!(contents.is_complete());
}

#[yare::parameterized(
    garbage_pid  = { "not-a-pid\n" },
    garbage_exit = { "4312\nbang\n" },
    garbage_fail = { "4312\n0\nmany\n" },
)]
fn malformed_lines_are_invalid(raw: &str) {
    assert!(PidfileContents::parse(raw).is_err());
}

#[test]
fn negative_exit_status_is_accepted() {
    // Signal deaths are reported as negative statuses by some runners.
    let contents = PidfileContents::parse("99\n-9\n0\n").unwrap();
    assert_eq!(contents.exit_status, Some(-9));
}

#[test]
fn bad_pid_error_carries_line() {
    match PidfileContents::parse("oops\n") {
        Err(PidfileParseError::BadPid(line)) => assert_eq!(line, "oops"),
        other => panic!("unexpected result: {:?}", other),
    }
}
