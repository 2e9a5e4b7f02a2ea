//! Formatting helpers exposed to certificate templates.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Whole-dollar currency with thousands separators: `1000000` → `$1,000,000`.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return String::new();
    }

    let rounded = amount.abs().round() as u64;
    let digits = rounded.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    if amount < 0.0 && rounded > 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

/// `yyyy/MM/dd` in the given IANA zone; unknown zones fall back to UTC.
pub fn format_date(date: DateTime<Utc>, time_zone: &str) -> String {
    format_in_zone(date, time_zone, "%Y/%m/%d")
}

/// `MM-dd-yyyy`, the layout used on ACORD forms.
pub fn format_form_date(date: DateTime<Utc>, time_zone: &str) -> String {
    format_in_zone(date, time_zone, "%m-%d-%Y")
}

fn format_in_zone(date: DateTime<Utc>, time_zone: &str, pattern: &str) -> String {
    match time_zone.parse::<Tz>() {
        Ok(zone) => date.with_timezone(&zone).format(pattern).to_string(),
        Err(_) => date.format(pattern).to_string(),
    }
}

/// Canadian province or territory abbreviation to its full name.
pub fn long_province_name(abbreviation: &str) -> &str {
    match abbreviation {
        "AB" => "Alberta",
        "BC" => "British Columbia",
        "MB" => "Manitoba",
        "NB" => "New Brunswick",
        "NL" => "Newfoundland and Labrador",
        "NT" => "Northwest Territories",
        "NS" => "Nova Scotia",
        "NU" => "Nunavut",
        "ON" => "Ontario",
        "PE" => "Prince Edward Island",
        "QC" => "Quebec",
        "SK" => "Saskatchewan",
        "YT" => "Yukon",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn currency_has_no_decimals() {
        assert_eq!(format_currency(1_000_000.0), "$1,000,000");
        assert_eq!(format_currency(2_500.4), "$2,500");
        assert_eq!(format_currency(999.5), "$1,000");
        assert_eq!(format_currency(0.0), "$0");
        assert_eq!(format_currency(-1_250.0), "-$1,250");
        assert_eq!(format_currency(f64::NAN), "");
    }

    #[test]
    fn dates_honor_the_time_zone() {
        let instant = Utc.with_ymd_and_hms(2025, 3, 1, 3, 0, 0).unwrap();
        assert_eq!(format_date(instant, "America/Toronto"), "2025/02/28");
        assert_eq!(format_date(instant, "Not/AZone"), "2025/03/01");
        assert_eq!(format_form_date(instant, "America/New_York"), "02-28-2025");
        assert_eq!(format_form_date(instant, "UTC"), "03-01-2025");
    }

    #[test]
    fn provinces_expand_and_unknown_values_pass_through() {
        assert_eq!(long_province_name("ON"), "Ontario");
        assert_eq!(long_province_name("NL"), "Newfoundland and Labrador");
        assert_eq!(long_province_name("TX"), "TX");
    }
}
