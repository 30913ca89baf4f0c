//! Conversions between time budgets and credit budgets.
//!
//! Runtimes are billed by a burning rate expressed in credits per hour.
//! Converting minutes to credits rounds up (a partial credit is still spent),
//! converting credits back to minutes rounds down (a partial minute is not
//! granted). The two functions are therefore only inverse up to that slack.

/// Credits needed to keep a runtime alive for `minutes` at `burning_rate_per_hour`.
///
/// Returns 0 when either input is non-positive.
pub fn credits_for_duration(minutes: u64, burning_rate_per_hour: f64) -> u64 {
    if minutes == 0 || !(burning_rate_per_hour > 0.0) {
        return 0;
    }
    (minutes as f64 * burning_rate_per_hour / 60.0).ceil() as u64
}

/// Whole minutes a runtime can run on `credits` at `burning_rate_per_hour`.
///
/// Returns 0 when the rate is non-positive.
pub fn max_duration_for_credits(credits: u64, burning_rate_per_hour: f64) -> u64 {
    if !(burning_rate_per_hour > 0.0) {
        return 0;
    }
    (credits as f64 * 60.0 / burning_rate_per_hour).floor() as u64
}
