//! Property tests for datastore usage figures

use proptest::prelude::*;
use vcimport_core::storage::Usage;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: used and free always add up to the total
    #[test]
    fn used_plus_free_is_total(capacity in any::<u64>(), free in any::<u64>()) {
        let usage = Usage::from_bytes(capacity, free.min(capacity));
        prop_assert_eq!(usage.used_mb + usage.free_mb, usage.total_mb);
    }

    /// Property: an inconsistent snapshot never underflows
    #[test]
    fn free_above_capacity_reads_as_full_free(capacity in 0u64..1 << 40, extra in 0u64..1 << 30) {
        let usage = Usage::from_bytes(capacity, capacity + extra);
        prop_assert_eq!(usage.used_mb, 0);
        prop_assert_eq!(usage.total_mb, capacity / 1024 / 1024);
    }

    /// Property: monitor lines carry the three figures in order
    #[test]
    fn monitor_lines_render_figures(capacity in 0u64..1 << 50, free in 0u64..1 << 50) {
        let usage = Usage::from_bytes(capacity, free.min(capacity));
        let lines = usage.monitor_lines();
        let expected = format!(
            "USED_MB={}\nFREE_MB={}\nTOTAL_MB={}",
            usage.used_mb, usage.free_mb, usage.total_mb
        );
        prop_assert_eq!(lines, expected);
    }
}

#[test]
fn one_tebibyte_half_free() {
    let usage = Usage::from_bytes(1_099_511_627_776, 549_755_813_888);
    assert_eq!(usage.used_mb, 524_288);
    assert_eq!(usage.free_mb, 524_288);
    assert_eq!(usage.total_mb, 1_048_576);
}
