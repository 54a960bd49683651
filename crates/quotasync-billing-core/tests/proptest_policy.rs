//! Property-based tests for the carry-over policy and period arithmetic
//!
//! - Carried quota never exceeds the remaining balance or a positive cap
//! - Without carry-over the day always resets to the daily allowance
//! - Extensions always move the end date forward and never shrink the period

use chrono::{Datelike, NaiveDate};
use proptest::prelude::*;

use quotasync_billing_core::{extend_end_date, next_allotment};
use quotasync_types::{PeriodKind, QuotaSnapshot};

// ============================================================================
// Strategies
// ============================================================================

fn arb_snapshot() -> impl Strategy<Value = QuotaSnapshot> {
    (1i64..1_000_000, any::<bool>(), 0i64..2_000_000).prop_map(
        |(daily_quota, carry_over, max_carry_over)| QuotaSnapshot {
            daily_quota,
            carry_over,
            max_carry_over,
            external_group: "default".to_string(),
        },
    )
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (2000i32..2100, 1u32..=12, 1u32..=31).prop_filter_map("valid date", |(y, m, d)| {
        NaiveDate::from_ymd_opt(y, m, d)
    })
}

fn arb_kind() -> impl Strategy<Value = PeriodKind> {
    prop_oneof![
        Just(PeriodKind::Day),
        Just(PeriodKind::Week),
        Just(PeriodKind::Month),
        Just(PeriodKind::Custom),
    ]
}

// ============================================================================
// Carry-over Properties
// ============================================================================

proptest! {
    /// Property: the carried amount is bounded by the balance and the cap
    #[test]
    fn prop_carry_is_bounded(snapshot in arb_snapshot(), remaining in -1_000_000i64..5_000_000) {
        let allotment = next_allotment(&snapshot, remaining);

        prop_assert!(allotment.carried >= 0);
        prop_assert!(allotment.carried <= remaining.max(0));
        if snapshot.max_carry_over > 0 {
            prop_assert!(allotment.carried <= snapshot.max_carry_over);
        }
        prop_assert_eq!(allotment.quota, snapshot.daily_quota + allotment.carried);
    }

    /// Property: plans without carry-over always reset to the daily quota
    #[test]
    fn prop_no_carry_over_resets(snapshot in arb_snapshot(), remaining in any::<i64>()) {
        let snapshot = QuotaSnapshot { carry_over: false, ..snapshot };
        let allotment = next_allotment(&snapshot, remaining);

        prop_assert_eq!(allotment.carried, 0);
        prop_assert_eq!(allotment.quota, snapshot.daily_quota);
    }

    /// Property: an uncapped carry-over keeps the whole positive balance
    #[test]
    fn prop_uncapped_keeps_balance(daily in 1i64..1_000_000, remaining in 1i64..1_000_000) {
        let snapshot = QuotaSnapshot {
            daily_quota: daily,
            carry_over: true,
            max_carry_over: 0,
            external_group: "default".to_string(),
        };
        prop_assert_eq!(next_allotment(&snapshot, remaining).quota, daily + remaining);
    }
}

// ============================================================================
// Period Properties
// ============================================================================

proptest! {
    /// Property: every positive purchase strictly extends the end date
    #[test]
    fn prop_extension_moves_forward(kind in arb_kind(), base in arb_date(), days in 1u32..400) {
        let end = extend_end_date(kind, base, days).unwrap();
        prop_assert!(end > base);
    }

    /// Property: day-based periods add exactly the purchased days
    #[test]
    fn prop_day_periods_are_exact(base in arb_date(), days in 1u32..400) {
        for kind in [PeriodKind::Day, PeriodKind::Custom] {
            let end = extend_end_date(kind, base, days).unwrap();
            prop_assert_eq!((end - base).num_days(), i64::from(days));
        }
    }

    /// Property: week periods add whole weeks, at least one
    #[test]
    fn prop_week_periods_are_whole_weeks(base in arb_date(), days in 1u32..400) {
        let end = extend_end_date(PeriodKind::Week, base, days).unwrap();
        let added = (end - base).num_days();
        prop_assert_eq!(added % 7, 0);
        prop_assert_eq!(added, i64::from((days / 7).max(1)) * 7);
    }

    /// Property: month periods land on the same day or the clamped month end
    #[test]
    fn prop_month_periods_keep_day_of_month(base in arb_date(), days in 1u32..400) {
        let end = extend_end_date(PeriodKind::Month, base, days).unwrap();
        let months = (days / 30).max(1) as i32;
        let expected_month = (base.year() * 12 + base.month0() as i32) + months;

        prop_assert_eq!(end.year() * 12 + end.month0() as i32, expected_month);
        prop_assert!(end.day() <= base.day());
    }

    /// Property: zero-day purchases are always rejected
    #[test]
    fn prop_zero_days_rejected(kind in arb_kind(), base in arb_date()) {
        prop_assert!(extend_end_date(kind, base, 0).is_err());
    }
}
