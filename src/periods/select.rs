use chrono::{Datelike, NaiveDate};

use super::{PeriodRecord, PeriodSelection};

/// Pick the default from/to pair for `today`: "from" is the first period
/// mentioning last year, "to" the first mentioning this year. A slot with
/// no match stays unselected; nearest-match guessing is never attempted.
///
/// Pure function of its inputs; callers re-run it whenever the period list
/// changes rather than caching the result.
pub fn select_defaults(periods: &[PeriodRecord], today: NaiveDate) -> PeriodSelection {
    let year = today.year();
    PeriodSelection {
        from_period_id: first_mentioning(periods, year - 1),
        to_period_id: first_mentioning(periods, year),
    }
}

fn first_mentioning(periods: &[PeriodRecord], year: i32) -> String {
    let needle = year.to_string();
    periods
        .iter()
        .find(|p| p.label.contains(&needle) || p.id.contains(&needle))
        .map(|p| p.id.clone())
        .unwrap_or_default()
}
