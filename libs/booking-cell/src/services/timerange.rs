use chrono::{DateTime, Utc};

/// Half-open interval overlap: `[a_start, a_end)` intersects `[b_start, b_end)`.
/// Touching endpoints do not overlap.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Whole minutes from `earlier` to `later`, floored. Negative when `later`
/// precedes `earlier`; euclidean division keeps the floor direction there too,
/// which the cancellation-window gate relies on for already-started
/// appointments.
pub fn whole_minutes_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> i64 {
    (later - earlier).num_milliseconds().div_euclid(60_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    #[test]
    fn touching_intervals_do_not_overlap() {
        assert!(!overlaps(at(9, 0), at(10, 0), at(10, 0), at(11, 0)));
        assert!(overlaps(at(9, 0), at(10, 1), at(10, 0), at(11, 0)));
    }

    #[test]
    fn containment_overlaps() {
        assert!(overlaps(at(9, 0), at(12, 0), at(10, 0), at(11, 0)));
        assert!(overlaps(at(10, 15), at(10, 30), at(10, 0), at(11, 0)));
    }

    #[test]
    fn minute_difference_floors_toward_negative_infinity() {
        assert_eq!(whole_minutes_between(at(10, 0), at(9, 0)), 60);
        let half_past = at(9, 0) + chrono::Duration::seconds(90);
        assert_eq!(whole_minutes_between(at(10, 0), half_past), 58);
        assert_eq!(whole_minutes_between(half_past, at(10, 0)), -59);
    }
}
