//! Calendar dates in day-first, month-first and ISO layouts.

use super::PatternMatcher;
use once_cell::sync::Lazy;
use regex::Regex;

/// Matches `dd-mm-yyyy`, `dd/mm/yyyy`, `dd.mm.yyyy` and `yyyy-mm-dd`.
///
/// A hit is only accepted when it names a real calendar day, read either
/// day-first or month-first.
#[derive(Debug, Clone, Default)]
pub struct DateMatcher;

impl DateMatcher {
    fn regex() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(
                r"(?i)\b(?:(\d{1,2})[-/.](\d{1,2})[-/.](\d{4})|(\d{4})-(\d{2})-(\d{2}))\b",
            )
            .expect("Valid date regex")
        });
        &PATTERN
    }

    pub fn is_leap_year(year: u32) -> bool {
        (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
    }

    pub fn days_in_month(year: u32, month: u32) -> u32 {
        match month {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            2 if Self::is_leap_year(year) => 29,
            2 => 28,
            _ => 0,
        }
    }

    pub fn is_valid_date(year: u32, month: u32, day: u32) -> bool {
        day >= 1 && day <= Self::days_in_month(year, month)
    }
}

impl PatternMatcher for DateMatcher {
    fn pattern(&self) -> &Regex {
        Self::regex()
    }

    fn validate(&self, candidate: &str) -> bool {
        let Some(caps) = Self::regex().captures(candidate) else {
            return false;
        };
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

        if let (Some(a), Some(b), Some(year)) = (num(1), num(2), num(3)) {
            return Self::is_valid_date(year, b, a) || Self::is_valid_date(year, a, b);
        }
        match (num(4), num(5), num(6)) {
            (Some(year), Some(month), Some(day)) => Self::is_valid_date(year, month, day),
            _ => false,
        }
    }
}
