//! Cleaning primitives for raw Form 700 field text.
//!
//! Every primitive is total over its input: missing or empty source text
//! becomes `None`, and malformed text is either logged and dropped
//! (integers, decimals, datetimes) or surfaced as an error the caller
//! must treat as a parser defect (coded choices).

use chrono::{NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::America::Los_Angeles;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::netfile::vocab::CodedChoice;

/// Datetime layouts observed in NetFile documents. Date-only layouts are
/// tried after the timestamped ones and resolve to midnight.
const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];

/// Collapses internal whitespace runs (including newlines) to single
/// spaces and trims the edges. Empty or missing input becomes `None`,
/// never an empty string.
pub fn clean_string(s: Option<&str>) -> Option<String> {
    let s = s?;
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Case-insensitive boolean: `"true"` and `"1"` are true, everything
/// else (including absent) is false.
pub fn clean_boolean(s: Option<&str>) -> bool {
    match s {
        Some(s) => s.eq_ignore_ascii_case("true") || s == "1",
        None => false,
    }
}

/// Parses a base-10 integer. Malformed text is logged and becomes
/// absent; it never fails the filing.
pub fn clean_integer(s: Option<&str>) -> Option<i64> {
    let s = s?;
    if s.is_empty() {
        return None;
    }
    match s.parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(value = %s, "could not parse integer field");
            None
        }
    }
}

/// Parses an exact decimal. No rounding; malformed text is logged and
/// becomes absent.
pub fn clean_decimal(s: Option<&str>) -> Option<Decimal> {
    let s = s?;
    if s.is_empty() {
        return None;
    }
    match Decimal::from_str(s) {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(value = %s, "could not parse decimal field");
            None
        }
    }
}

/// Parses a date/time string into whole UTC seconds since the epoch.
///
/// Inputs without a timezone are assumed to be Pacific civil time and
/// are converted to UTC exactly once, here. Unparseable text is logged
/// and becomes absent.
pub fn clean_datetime(s: Option<&str>) -> Option<i64> {
    let s = s?;
    if s.is_empty() {
        return None;
    }

    // A few registry exports carry an explicit offset; honor it.
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }

    let naive = parse_naive(s)?;
    match Los_Angeles.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Some(dt.timestamp()),
        // Fall-back DST hour: take the earlier (standard-time) reading.
        chrono::LocalResult::Ambiguous(earliest, _) => Some(earliest.timestamp()),
        chrono::LocalResult::None => {
            warn!(value = %s, "datetime does not exist in Pacific civil time");
            None
        }
    }
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date.and_hms_opt(0, 0, 0)?);
        }
    }
    warn!(value = %s, "could not parse datetime field");
    None
}

/// Decodes a 1-based coded-choice index against the field's vocabulary.
///
/// `"0"` and absent both mean "no choice made" and map to `None`. Any
/// other non-numeric or out-of-range input is a defect in the parser's
/// field mapping, not user data, and is returned as an error.
pub fn clean_choice<C: CodedChoice>(s: Option<&str>) -> Result<Option<C>> {
    let s = match s {
        Some(s) if !s.is_empty() => s,
        _ => return Ok(None),
    };
    if s == "0" {
        return Ok(None);
    }

    let index = s.parse::<u32>().map_err(|_| PipelineError::Choice {
        field: C::FIELD,
        value: s.to_string(),
    })?;
    C::from_index(index)
        .map(Some)
        .ok_or_else(|| PipelineError::Choice {
            field: C::FIELD,
            value: s.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netfile::vocab::A1FairMarketValue;
    use chrono::NaiveDate;

    #[test]
    fn clean_string_collapses_whitespace() {
        assert_eq!(clean_string(Some("a ")), Some("a".to_string()));
        assert_eq!(clean_string(Some("a\nb")), Some("a b".to_string()));
        assert_eq!(clean_string(Some("a\n\nb")), Some("a b".to_string()));
        assert_eq!(clean_string(Some("  a \t b  ")), Some("a b".to_string()));
    }

    #[test]
    fn clean_string_distinguishes_empty_from_absent_by_collapsing_both_to_none() {
        assert_eq!(clean_string(Some("")), None);
        assert_eq!(clean_string(Some("   ")), None);
        assert_eq!(clean_string(None), None);
    }

    #[test]
    fn clean_boolean_is_total() {
        assert!(clean_boolean(Some("true")));
        assert!(clean_boolean(Some("TRUE")));
        assert!(clean_boolean(Some("1")));
        assert!(!clean_boolean(Some("false")));
        assert!(!clean_boolean(Some("yes")));
        assert!(!clean_boolean(Some("")));
        assert!(!clean_boolean(None));
    }

    #[test]
    fn clean_integer_recovers_from_malformed_text() {
        assert_eq!(clean_integer(Some("42")), Some(42));
        assert_eq!(clean_integer(Some("-7")), Some(-7));
        assert_eq!(clean_integer(Some("forty")), None);
        assert_eq!(clean_integer(Some("")), None);
        assert_eq!(clean_integer(None), None);
    }

    #[test]
    fn clean_decimal_is_exact() {
        let rate = clean_decimal(Some("3.25")).unwrap();
        assert_eq!(rate, Decimal::new(325, 2));
        assert_eq!(rate.to_string(), "3.25");
        assert_eq!(clean_decimal(Some("")), None);
        assert_eq!(clean_decimal(Some("n/a")), None);
    }

    #[test]
    fn clean_datetime_assumes_pacific_civil_time() {
        // Parsing a bare date must equal explicitly localizing midnight
        // Pacific on the same day.
        let parsed = clean_datetime(Some("11/9/2018")).unwrap();
        let midnight = NaiveDate::from_ymd_opt(2018, 11, 9)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let expected = Los_Angeles
            .from_local_datetime(&midnight)
            .single()
            .unwrap()
            .timestamp();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn clean_datetime_converts_timestamps_to_utc() {
        // 5:20:48 PM PDT on 2019-08-12 is 00:20:48 UTC the next day.
        let parsed = clean_datetime(Some("8/12/2019 5:20:48 PM")).unwrap();
        let expected = NaiveDate::from_ymd_opt(2019, 8, 13)
            .unwrap()
            .and_hms_opt(0, 20, 48)
            .unwrap()
            .and_utc()
            .timestamp();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn clean_datetime_recovers_from_malformed_text() {
        assert_eq!(clean_datetime(Some("not a date")), None);
        assert_eq!(clean_datetime(Some("")), None);
        assert_eq!(clean_datetime(None), None);
    }

    #[test]
    fn clean_choice_maps_zero_and_absent_to_none() {
        assert_eq!(clean_choice::<A1FairMarketValue>(Some("0")).unwrap(), None);
        assert_eq!(clean_choice::<A1FairMarketValue>(None).unwrap(), None);
        assert_eq!(clean_choice::<A1FairMarketValue>(Some("")).unwrap(), None);
    }

    #[test]
    fn clean_choice_decodes_one_based_indexes() {
        assert_eq!(
            clean_choice::<A1FairMarketValue>(Some("1")).unwrap(),
            Some(A1FairMarketValue::Usd2000To10000)
        );
    }

    #[test]
    fn clean_choice_rejects_out_of_range_input() {
        assert!(clean_choice::<A1FairMarketValue>(Some("9")).is_err());
        assert!(clean_choice::<A1FairMarketValue>(Some("stock")).is_err());
    }
}
