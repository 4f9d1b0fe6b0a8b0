use crate::schema::CellValue;
use chrono::{Datelike, Days, NaiveDate};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Portuguese month names, accent-stripped and lowercased, January first.
pub const MONTHS_NORMALIZED: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "marco",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

pub fn strip_accents(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// Recognizes a Portuguese month name, with or without diacritics.
pub fn normalize_month(label: &str) -> Option<&'static str> {
    let cleaned = strip_accents(label);
    MONTHS_NORMALIZED
        .iter()
        .find(|month| **month == cleaned)
        .copied()
}

/// 1-based month number of a normalized month name.
pub fn month_number(month: &str) -> Option<u32> {
    MONTHS_NORMALIZED
        .iter()
        .position(|m| *m == month)
        .map(|idx| idx as u32 + 1)
}

pub fn month_name(month: u32) -> Option<&'static str> {
    if (1..=12).contains(&month) {
        Some(MONTHS_NORMALIZED[month as usize - 1])
    } else {
        None
    }
}

/// Parses spreadsheet text such as `"1.234,56"` or `"R$ 12,00"`.
/// Dots are thousands separators, the first comma is the decimal point and
/// any other non-numeric character is dropped. Failures read as 0.
pub fn parse_localized_number(text: &str) -> f64 {
    let cleaned: String = text
        .replace('.', "")
        .replacen(',', ".", 1)
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    if cleaned.is_empty() {
        return 0.0;
    }

    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

pub fn format_period(year: i32, month: u32) -> String {
    format!("{:04}-{:02}", year, month)
}

/// Splits a `YYYY-MM` key into its year and month.
pub fn split_period(key: &str) -> Option<(i32, u32)> {
    let (year, month) = key.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some((year, month))
}

/// The same month one year earlier.
pub fn previous_year_period(key: &str) -> Option<String> {
    let (year, month) = split_period(key)?;
    Some(format_period(year - 1, month))
}

/// Converts an Excel serial date (days since 1899-12-30) into a period key.
pub fn period_from_excel_serial(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = epoch.checked_add_days(Days::new(serial.floor() as u64))?;
    Some(format_period(date.year(), date.month()))
}

/// Normalizes a period label into a `YYYY-MM` key.
///
/// Accepted shapes:
/// - `YYYY-MM`
/// - `MM/YYYY` or `MM-YYYY` (one or two digit month)
/// - a Portuguese month name, optionally followed by a four digit year
///   (`"Outubro 2024"`, `"março"`); without a year `fallback_year` is used
pub fn normalize_period(label: &str, fallback_year: Option<i32>) -> Option<String> {
    let raw = label.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some((year, month)) = split_period(raw) {
        return Some(format_period(year, month));
    }

    if let Some(period) = parse_month_slash_year(raw) {
        return Some(period);
    }

    parse_month_name_and_year(raw, fallback_year)
}

/// Period normalization for a raw cell: numbers are Excel serial dates.
pub fn normalize_period_value(value: &CellValue, fallback_year: Option<i32>) -> Option<String> {
    match value {
        CellValue::Number(serial) => period_from_excel_serial(*serial),
        CellValue::Text(text) => normalize_period(text, fallback_year),
        CellValue::Empty | CellValue::Other(_) => None,
    }
}

fn parse_month_slash_year(raw: &str) -> Option<String> {
    let (month, year) = raw.split_once(['/', '-'])?;
    let valid_month = (1..=2).contains(&month.len()) && month.chars().all(|c| c.is_ascii_digit());
    let valid_year = year.len() == 4 && year.chars().all(|c| c.is_ascii_digit());
    if !valid_month || !valid_year {
        return None;
    }

    let month: u32 = month.parse().ok()?;
    let year: i32 = year.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some(format_period(year, month))
}

fn parse_month_name_and_year(raw: &str, fallback_year: Option<i32>) -> Option<String> {
    // First run of letters is the month candidate
    let start = raw.find(|c: char| c.is_alphabetic())?;
    let rest = &raw[start..];
    let name_end = rest
        .find(|c: char| !c.is_alphabetic())
        .unwrap_or(rest.len());
    let name = &rest[..name_end];

    let month = month_number(normalize_month(name)?)?;

    let after = rest[name_end..].trim_start();
    let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
    let year = if digits.len() >= 4 {
        digits[..4].parse().ok()
    } else {
        fallback_year
    }?;

    Some(format_period(year, month))
}
