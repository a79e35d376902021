// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use yare::parameterized;

use super::runner_lock_id;

// Reference values computed with zlib's crc32, which existing installs
// used to derive their lock keys.
#[parameterized(
    runner_1 = { "runner-1", 193_130_708 },
    runner_2 = { "runner-2", 311_140_718 },
    vm_alpha = { "vm-alpha", 1_217_180_356 },
    bare_01 = { "bare-01", 1_930_037_673 },
    short = { "r1", 219_023_793 },
    empty = { "", 0 },
)]
fn lock_id_matches_crc32_with_high_bit_cleared(runner_id: &str, expected: i32) {
    assert_eq!(runner_lock_id(runner_id), expected);
}

#[test]
fn lock_id_is_non_negative() {
    for id in ["a", "zz", "runner-with-a-rather-long-name-0123456789"] {
        assert!(runner_lock_id(id) >= 0);
    }
}

#[test]
fn distinct_runners_get_distinct_keys() {
    assert_ne!(runner_lock_id("runner-1"), runner_lock_id("runner-2"));
}
