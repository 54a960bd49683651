//! Subscription period arithmetic

use chrono::{Days, Months, NaiveDate};

use quotasync_types::PeriodKind;

use crate::error::{BillingError, BillingResult};

/// End date after adding a purchased period of `days` to `base`.
///
/// Month periods add `days / 30` calendar months (at least one), clamping to
/// the last day of shorter months. Week periods add whole weeks (at least
/// one). Other kinds add `days` calendar days.
pub fn extend_end_date(kind: PeriodKind, base: NaiveDate, days: u32) -> BillingResult<NaiveDate> {
    if days == 0 {
        return Err(BillingError::InvalidPeriod(
            "period must be at least one day".to_string(),
        ));
    }

    let end = match kind {
        PeriodKind::Month => base.checked_add_months(Months::new((days / 30).max(1))),
        PeriodKind::Week => base.checked_add_days(Days::new(u64::from((days / 7).max(1)) * 7)),
        PeriodKind::Day | PeriodKind::Custom => base.checked_add_days(Days::new(u64::from(days))),
    };

    end.ok_or_else(|| BillingError::InvalidPeriod(format!("{days} days from {base} overflows")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_uses_whole_months() {
        let base = date(2024, 1, 15);
        assert_eq!(extend_end_date(PeriodKind::Month, base, 45).unwrap(), date(2024, 2, 15));
        assert_eq!(extend_end_date(PeriodKind::Month, base, 10).unwrap(), date(2024, 2, 15));
        assert_eq!(extend_end_date(PeriodKind::Month, base, 90).unwrap(), date(2024, 4, 15));
    }

    #[test]
    fn test_month_clamps_to_month_end() {
        let base = date(2024, 1, 31);
        assert_eq!(extend_end_date(PeriodKind::Month, base, 30).unwrap(), date(2024, 2, 29));
    }

    #[test]
    fn test_week_rounds_to_weeks() {
        let base = date(2024, 1, 1);
        assert_eq!(extend_end_date(PeriodKind::Week, base, 3).unwrap(), date(2024, 1, 8));
        assert_eq!(extend_end_date(PeriodKind::Week, base, 15).unwrap(), date(2024, 1, 15));
    }

    #[test]
    fn test_day_and_custom_add_days() {
        let base = date(2024, 1, 1);
        assert_eq!(extend_end_date(PeriodKind::Day, base, 1).unwrap(), date(2024, 1, 2));
        assert_eq!(extend_end_date(PeriodKind::Custom, base, 45).unwrap(), date(2024, 2, 15));
    }

    #[test]
    fn test_zero_days_rejected() {
        let err = extend_end_date(PeriodKind::Day, date(2024, 1, 1), 0).unwrap_err();
        assert!(matches!(err, BillingError::InvalidPeriod(_)));
    }

    #[test]
    fn test_overflow_rejected() {
        assert!(extend_end_date(PeriodKind::Day, NaiveDate::MAX, 1).is_err());
    }
}
