//! Loose e-mail address check.
//!
//! The pattern is permissive: the start is unanchored, so any prefix is
//! allowed before the address, and the domain separator is an unescaped `.`
//! that matches any character. Word characters are ASCII only.

use std::sync::OnceLock;

use regex::Regex;

const EMAIL_PATTERN: &str = r"[[:word:].]+@[[:word:]]+(.[[:word:]]+)+$";

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email regex should be valid"))
}

/// Whether `input` ends in something shaped like an e-mail address.
pub fn is_email(input: &str) -> bool {
    email_regex().is_match(input)
}
