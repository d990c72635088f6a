//! Supply projection: how many whole days the current stock will last.
//!
//! The projection walks forward one calendar day at a time from `today`,
//! subtracting every dose active on that weekday. A day is covered when its
//! doses can be paid in full, so a day that uses up the last unit still
//! counts. Days without doses cost nothing and extend the supply until the
//! next dose that cannot be paid.

use crate::DoseRule;
use chrono::{Datelike, Days, NaiveDate};

/// Simulation stops here; a result equal to this means "this many or more"
pub const SUPPLY_HORIZON_DAYS: u32 = 365;

/// Returned when there is stock but no schedule to consume it
pub const UNLIMITED_SUPPLY_DAYS: u32 = 999;

/// Absorbs float drift from fractional quantities such as 0.1
const STOCK_EPSILON: f64 = 1e-9;

/// Project the number of fully covered days starting from `today`
pub fn project_supply_days(current_stock: f64, rules: &[DoseRule], today: NaiveDate) -> u32 {
    if current_stock <= 0.0 {
        return 0;
    }
    if rules.is_empty() {
        return UNLIMITED_SUPPLY_DAYS;
    }

    let mut simulated_stock = current_stock;
    let mut covered = 0;

    while covered < SUPPLY_HORIZON_DAYS {
        let Some(day) = today.checked_add_days(Days::new(covered.into())) else {
            break;
        };
        let weekday = day.weekday();

        simulated_stock -= rules
            .iter()
            .filter(|rule| rule.recurrence.is_active_on(weekday))
            .map(|rule| rule.quantity)
            .sum::<f64>();

        if simulated_stock < -STOCK_EPSILON {
            break;
        }
        covered += 1;
    }

    tracing::debug!(
        "Projected {} covered days from stock {} over {} rules",
        covered,
        current_stock,
        rules.len()
    );
    covered
}

/// Human text for a projected day count
pub fn describe_supply(days: u32) -> String {
    if days >= SUPPLY_HORIZON_DAYS {
        "1+ Year".to_string()
    } else if days == 1 {
        "1 Day".to_string()
    } else {
        format!("{} Days", days)
    }
}

/// Whether the projection is short enough to warrant a refill
pub fn is_low_supply(days: u32, threshold_days: u32) -> bool {
    days < threshold_days
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::{Recurrence, WeekdaySet};

    // 2024-01-01 was a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    fn daily(time: &str, qty: f64) -> DoseRule {
        DoseRule::new(time.parse().unwrap(), qty, Recurrence::Daily).unwrap()
    }

    fn weekly(time: &str, qty: f64, days: &[u8]) -> DoseRule {
        let set = WeekdaySet::from_indices(days).unwrap();
        DoseRule::new(time.parse().unwrap(), qty, Recurrence::Weekly(set)).unwrap()
    }

    #[test]
    fn test_zero_stock_is_zero_days() {
        let rule_sets = vec![vec![], vec![daily("08:00", 1.0)], vec![weekly("08:00", 2.0, &[1])]];
        for rules in rule_sets {
            assert_eq!(project_supply_days(0.0, &rules, monday()), 0);
            assert_eq!(project_supply_days(-3.0, &rules, monday()), 0);
        }
    }

    #[test]
    fn test_no_rules_is_unlimited() {
        assert_eq!(project_supply_days(1.0, &[], monday()), UNLIMITED_SUPPLY_DAYS);
        assert_eq!(project_supply_days(0.25, &[], monday()), UNLIMITED_SUPPLY_DAYS);
    }

    #[test]
    fn test_single_daily_dose() {
        let rules = vec![daily("08:00", 1.0)];
        assert_eq!(project_supply_days(10.0, &rules, monday()), 10);
        assert_eq!(project_supply_days(10.5, &rules, monday()), 10);
        assert_eq!(project_supply_days(9.5, &rules, monday()), 9);
    }

    #[test]
    fn test_two_doses_exceed_stock_on_first_day() {
        let rules = vec![daily("08:00", 1.0), daily("20:00", 1.0)];
        assert_eq!(project_supply_days(1.0, &rules, monday()), 0);
    }

    #[test]
    fn test_weekly_rule_gaps_extend_supply() {
        let rules = vec![weekly("09:00", 2.0, &[1])];

        // Starting on a Monday: five Mondays (offsets 0..=28) use all ten
        // pills and the idle days after the last one are still covered. The
        // sixth Monday (offset 35) cannot be paid.
        assert_eq!(project_supply_days(10.0, &rules, monday()), 35);

        // Starting on a Tuesday the first Monday is six days away.
        assert_eq!(project_supply_days(10.0, &rules, tuesday()), 41);
    }

    #[test]
    fn test_fractional_quantities_do_not_drift() {
        let rules = vec![daily("08:00", 0.1)];
        assert_eq!(project_supply_days(1.0, &rules, monday()), 10);
    }

    #[test]
    fn test_rule_that_never_fires_hits_horizon() {
        let rules = vec![weekly("09:00", 1.0, &[])];
        assert_eq!(project_supply_days(1.0, &rules, monday()), SUPPLY_HORIZON_DAYS);
    }

    #[test]
    fn test_never_exceeds_horizon() {
        let rules = vec![daily("08:00", 0.01)];
        assert_eq!(
            project_supply_days(1_000_000.0, &rules, monday()),
            SUPPLY_HORIZON_DAYS
        );
    }

    #[test]
    fn test_monotonic_in_stock() {
        let rules = vec![daily("08:00", 1.5), weekly("21:00", 1.0, &[0, 3, 6])];
        let mut previous = 0;
        for tenths in 0..600 {
            let days = project_supply_days(tenths as f64 / 10.0, &rules, tuesday());
            assert!(days >= previous, "supply dropped at stock {}", tenths as f64 / 10.0);
            assert!(days <= SUPPLY_HORIZON_DAYS);
            previous = days;
        }
    }

    #[test]
    fn test_projection_is_deterministic() {
        let rules = vec![daily("08:00", 1.0), weekly("13:00", 0.5, &[2, 4])];
        let first = project_supply_days(42.0, &rules, tuesday());
        let second = project_supply_days(42.0, &rules, tuesday());
        assert_eq!(first, second);
    }

    #[test]
    fn test_describe_supply() {
        assert_eq!(describe_supply(0), "0 Days");
        assert_eq!(describe_supply(1), "1 Day");
        assert_eq!(describe_supply(30), "30 Days");
        assert_eq!(describe_supply(SUPPLY_HORIZON_DAYS), "1+ Year");
        assert_eq!(describe_supply(UNLIMITED_SUPPLY_DAYS), "1+ Year");
    }

    #[test]
    fn test_low_supply_threshold() {
        assert!(is_low_supply(4, 5));
        assert!(!is_low_supply(5, 5));
    }
}
