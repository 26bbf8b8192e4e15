// Utility helpers for parsing, formatting and text matching.
//
// This module centralizes the "dirty" spreadsheet text handling so the rest
// of the code can assume clean, typed values.
use calamine::ExcelDateTime;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Parse a string-like value into `f64` while being forgiving about the
/// formatting found in hand-maintained workbooks.
///
/// - Trims whitespace and rejects values that contain letters.
/// - Accepts both `1.234,5` (pt-BR) and `1,234.5` (en) separators: whichever
///   of `.`/`,` appears last is the decimal mark. A lone comma is a decimal
///   comma; several dots are thousands separators.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_alphabetic()) {
        return None;
    }
    let last_dot = s.rfind('.');
    let last_comma = s.rfind(',');
    let cleaned = match (last_dot, last_comma) {
        (Some(d), Some(c)) if c > d => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (None, Some(_)) if s.matches(',').count() == 1 => s.replace(',', "."),
        (None, Some(_)) => s.replace(',', ""),
        (Some(_), None) if s.matches('.').count() > 1 => s.replace('.', ""),
        _ => s.to_string(),
    };
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parse a date written as text. Time-of-day, when present, is dropped.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .map(|dt| dt.date())
        })
}

/// Convert an Excel serial day number (1900 date system) to a date.
///
/// Serial 0 corresponds to 1899-12-30 for every date after February 1900,
/// which is the only range these workbooks use.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > 2_958_465.0 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Calendar date of a date-formatted cell, honouring the workbook's 1900 or
/// 1904 date system. Durations are not dates.
pub fn excel_datetime_to_date(dt: &ExcelDateTime) -> Option<NaiveDate> {
    let serial = dt.as_f64();
    if dt.is_duration() || !serial.is_finite() || serial < 0.0 || serial > 2_958_465.0 {
        return None;
    }
    let (y, m, d, ..) = dt.to_ymd_hms_milli();
    NaiveDate::from_ymd_opt(i32::from(y), u32::from(m), u32::from(d))
}

/// First day of the month containing `d`.
pub fn month_start(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

/// Lowercase and strip Portuguese diacritics so "Sapê" also matches "sape".
pub fn fold_ascii(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// Format a value with pt-BR separators: `.` for thousands and `,` for
/// decimals (e.g. `1.234.567,89`).
pub fn format_number(n: f64, decimals: usize) -> String {
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    // `Locale::en` groups with commas; swap to dots afterwards.
    let mut res = int_val.to_formatted_string(&Locale::en).replace(',', ".");
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push(',');
            res.push_str(frac);
        }
    }
    if neg && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

/// Percentage with two decimals, e.g. `45,20%`.
pub fn format_pct(n: f64) -> String {
    format!("{}%", format_number(n, 2))
}

pub fn format_count<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en).replace(',', ".")
}

pub fn format_date_br(d: NaiveDate) -> String {
    d.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_plain_and_localized_numbers() {
        assert_eq!(parse_f64_safe(Some(" 120 ")), Some(120.0));
        assert_eq!(parse_f64_safe(Some("12,5")), Some(12.5));
        assert_eq!(parse_f64_safe(Some("1.234,5")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some("1,234.5")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some("1.234.567")), Some(1_234_567.0));
        assert_eq!(parse_f64_safe(Some("3.75")), Some(3.75));
    }

    #[test]
    fn rejects_text_and_blanks() {
        assert_eq!(parse_f64_safe(Some("abc")), None);
        assert_eq!(parse_f64_safe(Some("12 m")), None);
        assert_eq!(parse_f64_safe(Some("   ")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn parses_supported_date_layouts() {
        assert_eq!(parse_date_safe(Some("2025-01-15")), Some(ymd(2025, 1, 15)));
        assert_eq!(parse_date_safe(Some("15/01/2025")), Some(ymd(2025, 1, 15)));
        assert_eq!(
            parse_date_safe(Some("2025-01-15 13:45:00")),
            Some(ymd(2025, 1, 15))
        );
        assert_eq!(
            parse_date_safe(Some("2025-01-15T08:00:00")),
            Some(ymd(2025, 1, 15))
        );
        assert_eq!(parse_date_safe(Some("janeiro")), None);
        assert_eq!(parse_date_safe(Some("2025-13-01")), None);
    }

    #[test]
    fn converts_excel_serials() {
        assert_eq!(excel_serial_to_date(45658.0), Some(ymd(2025, 1, 1)));
        assert_eq!(excel_serial_to_date(45672.75), Some(ymd(2025, 1, 15)));
        assert_eq!(excel_serial_to_date(-3.0), None);
        assert_eq!(excel_serial_to_date(f64::NAN), None);
    }

    #[test]
    fn converts_date_cells_in_either_date_system() {
        use calamine::ExcelDateTimeType;
        let v1900 = ExcelDateTime::new(45658.0, ExcelDateTimeType::DateTime, false);
        let v1904 = ExcelDateTime::new(45658.0 - 1462.0, ExcelDateTimeType::DateTime, true);
        assert_eq!(excel_datetime_to_date(&v1900), Some(ymd(2025, 1, 1)));
        assert_eq!(excel_datetime_to_date(&v1904), Some(ymd(2025, 1, 1)));
        let afternoon = ExcelDateTime::new(45672.75, ExcelDateTimeType::DateTime, false);
        assert_eq!(excel_datetime_to_date(&afternoon), Some(ymd(2025, 1, 15)));
        let span = ExcelDateTime::new(1.5, ExcelDateTimeType::TimeDelta, false);
        assert_eq!(excel_datetime_to_date(&span), None);
    }

    #[test]
    fn folds_diacritics() {
        assert_eq!(fold_ascii("Bacia Sapê"), "bacia sape");
        assert_eq!(fold_ascii("ICARAÍ"), "icarai");
        assert_eq!(fold_ascii("Ligações"), "ligacoes");
    }

    #[test]
    fn formats_pt_br_numbers() {
        assert_eq!(format_number(1_234_567.891, 2), "1.234.567,89");
        assert_eq!(format_number(1500.0, 0), "1.500");
        assert_eq!(format_number(-42.5, 1), "-42,5");
        assert_eq!(format_number(-0.001, 0), "0");
        assert_eq!(format_pct(45.2), "45,20%");
        assert_eq!(format_count(12_345usize), "12.345");
    }

    #[test]
    fn truncates_to_month() {
        assert_eq!(month_start(ymd(2025, 2, 20)), ymd(2025, 2, 1));
        assert_eq!(format_date_br(ymd(2025, 2, 1)), "01/02/2025");
    }
}
