use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};

use crate::model::{Activatable, AppError, Dated, ErrorCode};

/// Anything that can be reduced to a calendar day in the local timezone.
pub trait CalendarDay {
    fn calendar_day(&self) -> NaiveDate;
}

impl CalendarDay for NaiveDate {
    fn calendar_day(&self) -> NaiveDate {
        *self
    }
}

impl CalendarDay for NaiveDateTime {
    fn calendar_day(&self) -> NaiveDate {
        self.date()
    }
}

impl<Tz: TimeZone> CalendarDay for DateTime<Tz> {
    fn calendar_day(&self) -> NaiveDate {
        self.with_timezone(&Local).date_naive()
    }
}

/// Keeps values whose active flag equals `active`; `None` keeps everything.
pub fn filter_by_active_status<T: Activatable>(values: Vec<T>, active: Option<bool>) -> Vec<T> {
    match active {
        None => values,
        Some(active) => values
            .into_iter()
            .filter(|value| value.active() == Some(active))
            .collect(),
    }
}

/// Keeps values effective on the calendar day of `date`. Both bounds are inclusive.
pub fn filter_by_effective_date<T: Dated, D: CalendarDay + ?Sized>(
    values: Vec<T>,
    date: &D,
) -> Vec<T> {
    let day = date.calendar_day();
    values
        .into_iter()
        .filter(|value| value.is_effective_on(day))
        .collect()
}

/// Parses a strict `yyyy-MM-dd` date, reporting `error` for anything else.
pub fn parse_date(text: &str, error: ErrorCode) -> Result<NaiveDate, AppError> {
    let bytes = text.as_bytes();
    let shaped = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shaped {
        return Err(error.into());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| error.into())
}

/// Like [`parse_date`] but blank input means "no date".
pub fn parse_optional_date(text: &str, error: ErrorCode) -> Result<Option<NaiveDate>, AppError> {
    let text = text.trim();
    if text.is_empty() {
        Ok(None)
    } else {
        parse_date(text, error).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LookupValue;
    use chrono::Utc;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dated(name: &str, from: Option<NaiveDate>, to: Option<NaiveDate>) -> LookupValue {
        let mut value = LookupValue::new("vehicle-make", name);
        value.effective_from = from;
        value.effective_to = to;
        value
    }

    fn names(values: &[LookupValue]) -> Vec<&str> {
        values
            .iter()
            .filter_map(|v| v.display_value.as_deref())
            .collect()
    }

    #[test]
    fn test_active_filter_none_is_identity() {
        let mut inactive = LookupValue::new("vehicle-make", "Saab");
        inactive.active = Some(false);
        let values = vec![LookupValue::new("vehicle-make", "Ford"), inactive];

        assert_eq!(filter_by_active_status(values.clone(), None), values);
        assert_eq!(
            names(&filter_by_active_status(values.clone(), Some(false))),
            vec!["Saab"]
        );
        assert_eq!(
            names(&filter_by_active_status(values, Some(true))),
            vec!["Ford"]
        );
    }

    #[test]
    fn test_effective_window_is_inclusive() {
        let values = vec![
            dated("open", None, None),
            dated("from", Some(day(2024, 3, 1)), None),
            dated("to", None, Some(day(2024, 3, 1))),
            dated("window", Some(day(2024, 1, 1)), Some(day(2024, 2, 1))),
        ];

        assert_eq!(
            names(&filter_by_effective_date(values.clone(), &day(2024, 3, 1))),
            vec!["open", "from", "to"]
        );
        assert_eq!(
            names(&filter_by_effective_date(values.clone(), &day(2024, 2, 1))),
            vec!["open", "to", "window"]
        );
        assert_eq!(
            names(&filter_by_effective_date(values, &day(2023, 12, 31))),
            vec!["open", "to"]
        );
    }

    #[test]
    fn test_timestamps_reduce_to_local_day() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 6, 23, 30, 0).unwrap();
        assert_eq!(
            instant.calendar_day(),
            instant.with_timezone(&Local).date_naive()
        );

        let noon = day(2024, 5, 6).and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(noon.calendar_day(), day(2024, 5, 6));
    }

    #[test]
    fn test_strict_date_parsing() {
        let code = ErrorCode::InvalidEffectiveDate;
        assert_eq!(parse_date("2024-02-29", code).unwrap(), day(2024, 2, 29));

        for bad in ["2023-02-29", "2024-2-01", "24-02-01", "2024/02/01", "2024-02-01x", ""] {
            let err = parse_date(bad, code).unwrap_err();
            assert_eq!(err.error_code(), Some(code), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_blank_optional_date() {
        let code = ErrorCode::CsvInvalidDate;
        assert_eq!(parse_optional_date("  ", code).unwrap(), None);
        assert_eq!(
            parse_optional_date(" 2024-01-02 ", code).unwrap(),
            Some(day(2024, 1, 2))
        );
        assert!(parse_optional_date("01/02/2024", code).is_err());
    }
}
