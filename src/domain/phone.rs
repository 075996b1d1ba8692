//! Phone number detection.
//!
//! This module encapsulates the North American Numbering Plan rules used
//! to reject number-shaped strings that cannot be dialled.

use super::PatternMatcher;
use once_cell::sync::Lazy;
use regex::Regex;

/// American phone number pattern matcher.
///
/// Supports various North American Numbering Plan (NANP) formats:
/// - (555) 234-5678
/// - 555-234-5678
/// - 555.234.5678
/// - +1 555 234 5678
#[derive(Debug, Clone, Default)]
pub struct PhoneNumberMatcher;

impl PhoneNumberMatcher {
    /// Creates a new phone number matcher.
    pub fn new() -> Self {
        Self
    }

    fn regex() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(
                r"(?i)(?:\+\s*)?(?:\b1[-.\s]?)?(?:\(\s*)?\b([2-9]\d{2})\s*\)?[-.\s]?\s*(\d{3})[-.\s]?\s*(\d{4})\b",
            )
            .expect("Valid phone number regex")
        });
        &PATTERN
    }

    /// Validates that a phone number follows NANP rules.
    ///
    /// # Rules
    /// - Area code (NXX): First digit 2-9, remaining digits 0-9
    /// - Exchange code: First digit 2-9, remaining digits 0-9
    /// - Subscriber number: Any 4 digits
    pub fn validate_parts(area: &str, exchange: &str, subscriber: &str) -> bool {
        area.len() == 3
            && exchange.len() == 3
            && subscriber.len() == 4
            && area
                .chars()
                .next()
                .is_some_and(|c| ('2'..='9').contains(&c))
            && exchange
                .chars()
                .next()
                .is_some_and(|c| ('2'..='9').contains(&c))
    }

    /// Reduces a matched number to its ten NANP digits.
    pub fn normalize(&self, text: &str) -> Option<String> {
        Self::regex().captures(text).and_then(|caps| {
            let area = caps.get(1)?.as_str();
            let exchange = caps.get(2)?.as_str();
            let subscriber = caps.get(3)?.as_str();

            if Self::validate_parts(area, exchange, subscriber) {
                Some(format!("{}{}{}", area, exchange, subscriber))
            } else {
                None
            }
        })
    }
}

impl PatternMatcher for PhoneNumberMatcher {
    fn pattern(&self) -> &Regex {
        Self::regex()
    }

    fn validate(&self, candidate: &str) -> bool {
        self.normalize(candidate).is_some()
    }
}
