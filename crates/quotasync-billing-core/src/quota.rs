//! Daily carry-over policy

use quotasync_types::QuotaSnapshot;

/// Quota granted for one billing day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyAllotment {
    /// Amount rolled over from the previous day
    pub carried: i64,
    /// Total quota for the day
    pub quota: i64,
}

/// Compute today's quota from the balance left on the gateway.
///
/// Carry-over plans roll a positive balance forward, capped by
/// `max_carry_over` when it is positive. Every other case resets to the
/// daily allowance.
pub fn next_allotment(snapshot: &QuotaSnapshot, remaining: i64) -> DailyAllotment {
    if !snapshot.carry_over || remaining <= 0 {
        return DailyAllotment {
            carried: 0,
            quota: snapshot.daily_quota,
        };
    }

    let carried = if snapshot.max_carry_over > 0 {
        remaining.min(snapshot.max_carry_over)
    } else {
        remaining
    };

    DailyAllotment {
        carried,
        quota: snapshot.daily_quota.saturating_add(carried),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(carry_over: bool, max_carry_over: i64) -> QuotaSnapshot {
        QuotaSnapshot {
            daily_quota: 1000,
            carry_over,
            max_carry_over,
            external_group: "default".to_string(),
        }
    }

    #[test]
    fn test_capped_carry_over() {
        let a = next_allotment(&snapshot(true, 500), 800);
        assert_eq!(a, DailyAllotment { carried: 500, quota: 1500 });
    }

    #[test]
    fn test_nothing_left() {
        let a = next_allotment(&snapshot(true, 500), 0);
        assert_eq!(a, DailyAllotment { carried: 0, quota: 1000 });
    }

    #[test]
    fn test_unbounded_carry_over() {
        let a = next_allotment(&snapshot(true, 0), 2500);
        assert_eq!(a, DailyAllotment { carried: 2500, quota: 3500 });
    }

    #[test]
    fn test_no_carry_over_resets() {
        let a = next_allotment(&snapshot(false, 0), 2500);
        assert_eq!(a, DailyAllotment { carried: 0, quota: 1000 });
    }

    #[test]
    fn test_negative_balance_not_carried() {
        let a = next_allotment(&snapshot(true, 0), -40);
        assert_eq!(a.carried, 0);
        assert_eq!(a.quota, 1000);
    }
}
