use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};

#[derive(Debug, Clone)]
pub(crate) struct DailyCadence {
    tz: FixedOffset,
    target: NaiveTime,
}

impl DailyCadence {
    /// `None` when the offset or the time of day is out of range.
    pub(crate) fn new(utc_offset_hours: i32, hour: u32, minute: u32) -> Option<Self> {
        let tz = FixedOffset::east_opt(utc_offset_hours.checked_mul(3600)?)?;
        let target = NaiveTime::from_hms_opt(hour, minute, 0)?;
        Some(Self { tz, target })
    }

    pub(crate) fn timezone(&self) -> FixedOffset {
        self.tz
    }

    pub(crate) fn next_run_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let localized_now = now.with_timezone(&self.tz);
        let mut date = localized_now.date_naive();
        if localized_now.time() > self.target {
            date = date.succ_opt().unwrap_or(date);
        }

        // fixed offsets map every local time to exactly one instant
        self.tz
            .from_local_datetime(&date.and_time(self.target))
            .earliest()
            .map_or(now, |dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::DailyCadence;
    use chrono::{DateTime, Utc};
    use rstest::rstest;

    fn parse_utc(ts: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(ts)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    #[rstest]
    // 03:30 JST, same calendar day
    #[case("2025-11-08T18:30:00Z", "2025-11-08T19:00:00Z")]
    // 19:00 JST, already past 04:00
    #[case("2025-11-08T10:00:00Z", "2025-11-08T19:00:00Z")]
    // exactly 04:00 JST
    #[case("2025-11-08T19:00:00Z", "2025-11-08T19:00:00Z")]
    fn next_run_in_jst(#[case] now: &str, #[case] expected: &str) {
        let cadence = DailyCadence::new(9, 4, 0).expect("valid cadence");

        assert_eq!(cadence.next_run_from(parse_utc(now)), parse_utc(expected));
    }

    #[test]
    fn negative_offsets_are_supported() {
        let cadence = DailyCadence::new(-5, 3, 0).expect("valid cadence");
        let now = parse_utc("2025-01-01T09:00:00Z"); // 04:00 at -05:00

        assert_eq!(cadence.next_run_from(now), parse_utc("2025-01-02T08:00:00Z"));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(DailyCadence::new(9, 24, 0).is_none());
        assert!(DailyCadence::new(30, 4, 0).is_none());
    }
}
