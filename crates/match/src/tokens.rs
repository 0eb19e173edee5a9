use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use regex::Regex;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Purchase order references look like `FOB/PO/2023/8/5023`.
re!(re_purchase_order, r"(?i)\b[A-Z]+/PO/\d+/\d+/\d+");
// Letter of credit references look like `L/C-187724010124/24`.
re!(re_letter_of_credit, r"(?i)\bL/C-\d+(?:/\d+)+");

/// Words that say nothing about which transfer a narration belongs to.
pub const STOP_WORDS: &[&str] = &[
    "the", "and", "or", "to", "from", "for", "of", "in", "on", "at", "by", "as", "a", "an", "is",
    "was", "are", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did",
    "will", "would", "could", "should", "may", "might", "must", "can", "payment", "amount",
    "paid", "dr", "cr", "ac", "no", "ref", "vide", "towards", "against", "with",
];

/// Splits ledger narrations into comparable keyword sets.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    stop_words: HashSet<String>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl Tokenizer {
    pub fn new(extra_stop_words: &[String]) -> Self {
        let stop_words = STOP_WORDS
            .iter()
            .map(|w| w.to_string())
            .chain(extra_stop_words.iter().map(|w| w.trim().to_lowercase()))
            .filter(|w| !w.is_empty())
            .collect();
        Self { stop_words }
    }

    /// Lowercased alphanumeric words, minus stop words, single characters
    /// and anything without a letter in it (amounts, dates, voucher numbers).
    pub fn tokens(&self, text: &str) -> BTreeSet<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 1)
            .filter(|w| w.chars().any(char::is_alphabetic))
            .filter(|w| !self.stop_words.contains(*w))
            .map(str::to_string)
            .collect()
    }
}

/// Document references (purchase orders, letters of credit) quoted in a
/// narration, uppercased so both ledgers compare equal.
pub fn references(text: &str) -> BTreeSet<String> {
    re_purchase_order()
        .find_iter(text)
        .chain(re_letter_of_credit().find_iter(text))
        .map(|m| m.as_str().to_uppercase())
        .collect()
}

/// Whitespace- and case-insensitive form of a narration.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Jaccard similarity of two keyword sets, in [0.0, 1.0].
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
