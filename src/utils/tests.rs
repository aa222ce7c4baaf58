use super::*;
use chrono::{TimeZone, Timelike};

#[test]
fn test_format_number_comma() {
    let options = NumberFormatOptions {
        use_comma: true,
        use_human: false,
        locale: "en".to_string(),
        decimal_places: 2,
    };

    assert_eq!(format_number(1000u64, &options), "1,000");
    assert_eq!(format_number(1000000u64, &options), "1,000,000");
    assert_eq!(format_number(123u64, &options), "123");
}

#[test]
fn test_format_number_human() {
    let options = NumberFormatOptions {
        use_comma: false,
        use_human: true,
        locale: "en".to_string(),
        decimal_places: 1,
    };

    assert_eq!(format_number(100u64, &options), "100");
    assert_eq!(format_number(1500u64, &options), "1.5k");
    assert_eq!(format_number(1_500_000u64, &options), "1.5m");
    assert_eq!(format_number(1_500_000_000u64, &options), "1.5b");
    assert_eq!(format_number(1_500_000_000_000u64, &options), "1.5t");
}

#[test]
fn test_format_number_plain() {
    let options = NumberFormatOptions {
        use_comma: false,
        use_human: false,
        locale: "en".to_string(),
        decimal_places: 2,
    };

    assert_eq!(format_number(1000u64, &options), "1000");
}

#[test]
fn test_parse_date_window_covers_whole_days() {
    let window = parse_date_window("2024-01-01", "2024-01-03").unwrap();

    assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 1, 3, 23, 59, 59).unwrap());
    assert_eq!(window.end.second(), 59);
}

#[test]
fn test_parse_date_window_single_day() {
    let window = parse_date_window("2024-02-29", "2024-02-29").unwrap();
    assert!(window.contains(&Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap()));
    assert!(!window.contains(&Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
}

#[test]
fn test_parse_date_window_rejects_bad_input() {
    for (from, to) in [
        ("2024-13-01", "2024-12-31"),
        ("yesterday", "2024-01-01"),
        ("2024-01-01", ""),
        ("2024-01-05", "2024-01-01"),
    ] {
        let err = parse_date_window(from, to).unwrap_err();
        assert!(
            matches!(err, MetricsError::InvalidDate(_)),
            "unexpected error for {from}..{to}: {err}"
        );
    }
}

#[test]
fn test_trailing_window() {
    let now = Utc.with_ymd_and_hms(2024, 8, 10, 15, 30, 0).unwrap();
    let window = trailing_window(220, now);

    assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap());
    assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 8, 10, 23, 59, 59).unwrap());
    assert_eq!(
        window.end.date_naive() - window.start.date_naive(),
        chrono::Duration::days(220)
    );

    let today_only = trailing_window(0, now);
    assert_eq!(today_only.start.date_naive(), today_only.end.date_naive());
}
