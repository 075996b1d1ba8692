//! Checksummed identifiers: national ID, bank account and card numbers.
//!
//! Each matcher accepts the regex shape first and then verifies the
//! check digits. A value consisting only of zeros passes most modulus
//! schemes trivially and is always rejected.

use super::{digits_of, PatternMatcher};
use once_cell::sync::Lazy;
use regex::Regex;

/// Dutch citizen service number (BSN): nine digits, eleven-test checksum.
///
/// Accepts `123456782` and the dotted layout `1234.56.782`.
#[derive(Debug, Clone, Default)]
pub struct BsnMatcher;

impl BsnMatcher {
    /// Weighted sum `9*d1 + 8*d2 + ... + 2*d8 - d9` must be divisible by 11.
    pub fn checksum_ok(digits: &[u32]) -> bool {
        if digits.len() != 9 || digits.iter().all(|&d| d == 0) {
            return false;
        }
        let sum: i64 = digits
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                let weight = if i == 8 { -1 } else { 9 - i as i64 };
                weight * d as i64
            })
            .sum();
        sum % 11 == 0
    }
}

impl PatternMatcher for BsnMatcher {
    fn pattern(&self) -> &Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?i)\b\d{4}\.?\d{2}\.?\d{3}\b").expect("Valid BSN regex")
        });
        &PATTERN
    }

    fn validate(&self, candidate: &str) -> bool {
        Self::checksum_ok(&digits_of(candidate))
    }
}

/// International bank account number, ISO 13616 mod-97 check.
#[derive(Debug, Clone, Default)]
pub struct IbanMatcher;

impl IbanMatcher {
    /// Validates a compact or space-grouped IBAN.
    pub fn checksum_ok(candidate: &str) -> bool {
        let compact: Vec<char> = candidate
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if !(15..=34).contains(&compact.len()) {
            return false;
        }
        if compact[4..].iter().all(|&c| c == '0') {
            return false;
        }

        let rearranged = compact[4..].iter().chain(compact[..4].iter());
        let mut remainder: u32 = 0;
        for c in rearranged {
            let value = match c.to_digit(36) {
                Some(v) => v,
                None => return false,
            };
            remainder = if value < 10 {
                (remainder * 10 + value) % 97
            } else {
                (remainder * 100 + value) % 97
            };
        }
        remainder == 1
    }
}

impl PatternMatcher for IbanMatcher {
    fn pattern(&self) -> &Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?i)\b[a-z]{2}\d{2}(?: ?[a-z0-9]{4}){2,7}(?: ?[a-z0-9]{1,3})?\b")
                .expect("Valid IBAN regex")
        });
        &PATTERN
    }

    fn validate(&self, candidate: &str) -> bool {
        Self::checksum_ok(candidate)
    }
}

/// Payment card numbers, Luhn check.
#[derive(Debug, Clone, Default)]
pub struct CreditCardMatcher;

impl CreditCardMatcher {
    pub fn luhn_ok(digits: &[u32]) -> bool {
        if !(13..=19).contains(&digits.len()) || digits.iter().all(|&d| d == 0) {
            return false;
        }
        let sum: u32 = digits
            .iter()
            .rev()
            .enumerate()
            .map(|(i, &d)| {
                if i % 2 == 1 {
                    let doubled = d * 2;
                    if doubled > 9 {
                        doubled - 9
                    } else {
                        doubled
                    }
                } else {
                    d
                }
            })
            .sum();
        sum % 10 == 0
    }
}

impl PatternMatcher for CreditCardMatcher {
    fn pattern(&self) -> &Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?i)\b(?:\d[ -]?){12,18}\d\b").expect("Valid card number regex")
        });
        &PATTERN
    }

    fn validate(&self, candidate: &str) -> bool {
        Self::luhn_ok(&digits_of(candidate))
    }
}
