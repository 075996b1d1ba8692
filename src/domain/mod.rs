//! Pattern matching: turning a search term into validated text candidates.
//!
//! A term is either one of the named patterns below (a pre-built regex
//! plus a value-level validator) or a raw user regular expression. User
//! expressions that fail to compile are escaped and searched literally,
//! so compiling a term never fails the scan.

pub mod date;
pub mod identifiers;
pub mod phone;

pub use date::DateMatcher;
pub use identifiers::{BsnMatcher, CreditCardMatcher, IbanMatcher};
pub use phone::PhoneNumberMatcher;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// A regex together with the semantic check applied to each hit.
pub trait PatternMatcher: Send + Sync {
    fn pattern(&self) -> &Regex;

    /// Value-level check beyond the regex shape. Rejected hits are dropped.
    fn validate(&self, _candidate: &str) -> bool {
        true
    }

    /// Every validated hit in `text`, as string slices.
    fn extract_all<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.pattern()
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty() && self.validate(s))
            .collect()
    }
}

/// Email addresses.
#[derive(Debug, Clone, Default)]
pub struct EmailMatcher;

impl PatternMatcher for EmailMatcher {
    fn pattern(&self) -> &Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?i)\b[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}\b")
                .expect("Valid email regex")
        });
        &PATTERN
    }
}

/// The closed set of patterns addressable by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedPattern {
    Email,
    Phone,
    Date,
    Iban,
    Bsn,
    CreditCard,
}

impl NamedPattern {
    pub const ALL: [NamedPattern; 6] = [
        NamedPattern::Email,
        NamedPattern::Phone,
        NamedPattern::Date,
        NamedPattern::Iban,
        NamedPattern::Bsn,
        NamedPattern::CreditCard,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Date => "date",
            Self::Iban => "iban",
            Self::Bsn => "bsn",
            Self::CreditCard => "credit_card",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }

    pub fn matcher(self) -> &'static dyn PatternMatcher {
        static EMAIL: EmailMatcher = EmailMatcher;
        static PHONE: PhoneNumberMatcher = PhoneNumberMatcher;
        static DATE: DateMatcher = DateMatcher;
        static IBAN: IbanMatcher = IbanMatcher;
        static BSN: BsnMatcher = BsnMatcher;
        static CARD: CreditCardMatcher = CreditCardMatcher;

        match self {
            Self::Email => &EMAIL,
            Self::Phone => &PHONE,
            Self::Date => &DATE,
            Self::Iban => &IBAN,
            Self::Bsn => &BSN,
            Self::CreditCard => &CARD,
        }
    }
}

/// A user-supplied expression, compiled case-insensitively.
#[derive(Debug, Clone)]
pub struct UserPattern {
    regex: Regex,
    literal: bool,
}

impl UserPattern {
    /// Compiles `term`, falling back to an escaped literal on failure.
    pub fn compile(term: &str) -> Option<Self> {
        match RegexBuilder::new(term).case_insensitive(true).build() {
            Ok(regex) => Some(Self {
                regex,
                literal: false,
            }),
            Err(err) => {
                log::debug!("term {:?} is not a valid regex ({}), searching literally", term, err);
                RegexBuilder::new(&regex::escape(term))
                    .case_insensitive(true)
                    .build()
                    .map_err(|err| log::warn!("ignoring unsearchable term {:?}: {}", term, err))
                    .ok()
                    .map(|regex| Self {
                        regex,
                        literal: true,
                    })
            }
        }
    }

    /// True when the term was escaped because it did not compile.
    pub fn is_literal_fallback(&self) -> bool {
        self.literal
    }
}

impl PatternMatcher for UserPattern {
    fn pattern(&self) -> &Regex {
        &self.regex
    }
}

#[derive(Debug, Clone)]
enum TermKind {
    Named(NamedPattern),
    User(UserPattern),
}

/// One validated hit inside a block of text.
///
/// Offsets are character indices, not byte offsets, so they line up
/// with per-character geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
}

/// A search term ready to run over text blocks.
#[derive(Debug, Clone)]
pub struct CompiledTerm {
    term: String,
    kind: TermKind,
}

impl CompiledTerm {
    /// Resolves a term to a named pattern or compiles it as a user regex.
    ///
    /// Returns `None` only for blank terms or terms the regex engine cannot
    /// hold even after escaping.
    pub fn compile(term: &str) -> Option<Self> {
        let trimmed = term.trim();
        if trimmed.is_empty() {
            return None;
        }
        let kind = match NamedPattern::from_key(trimmed) {
            Some(named) => TermKind::Named(named),
            None => TermKind::User(UserPattern::compile(trimmed)?),
        };
        Some(Self {
            term: trimmed.to_string(),
            kind,
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn named(&self) -> Option<NamedPattern> {
        match self.kind {
            TermKind::Named(named) => Some(named),
            TermKind::User(_) => None,
        }
    }

    fn matcher(&self) -> &dyn PatternMatcher {
        match &self.kind {
            TermKind::Named(named) => named.matcher(),
            TermKind::User(user) => user,
        }
    }

    /// Validated `(text, char_index)` hits in reading order.
    pub fn candidates(&self, text: &str) -> Vec<Candidate> {
        let matcher = self.matcher();
        let mut out = Vec::new();
        let mut chars_before = 0usize;
        let mut last_byte = 0usize;

        for m in matcher.pattern().find_iter(text) {
            if m.as_str().is_empty() || !matcher.validate(m.as_str()) {
                continue;
            }
            chars_before += text[last_byte..m.start()].chars().count();
            last_byte = m.start();
            let len = m.as_str().chars().count();
            out.push(Candidate {
                text: m.as_str().to_string(),
                char_start: chars_before,
                char_end: chars_before + len,
            });
        }
        out
    }
}

/// Compiles a list of terms, skipping blanks and duplicates.
pub fn compile_terms<S: AsRef<str>>(terms: &[S]) -> Vec<CompiledTerm> {
    let mut compiled: Vec<CompiledTerm> = Vec::new();
    for term in terms {
        if let Some(c) = CompiledTerm::compile(term.as_ref()) {
            if !compiled.iter().any(|existing| existing.term == c.term) {
                compiled.push(c);
            }
        }
    }
    compiled
}

/// Digits of `text`, ignoring separators.
pub(crate) fn digits_of(text: &str) -> Vec<u32> {
    text.chars().filter_map(|c| c.to_digit(10)).collect()
}
