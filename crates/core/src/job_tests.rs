// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::test_support::job;

#[test]
fn execution_tag_includes_id_owner_and_subdir() {
    let job = job(12, "deborah", 0);
    assert_eq!(job.execution_tag("bench-07"), "12-deborah/bench-07");
}

#[test]
fn execution_tag_hostless() {
    let job = job(3, "ci", 0);
    assert_eq!(job.execution_tag("hostless"), "3-ci/hostless");
}
