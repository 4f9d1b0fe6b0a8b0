//! Canonical product keys shared by the sales and cost sources.
//!
//! Sales exports and cost sheets spell the same product differently
//! (`"ab-12"`, `"AB12"`, `"00AB12"`). A code is cleaned down to its uppercase
//! ASCII alphanumerics and then left-padded with zeros to the code length
//! most frequently seen across all sources of the run.

use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Keeps ASCII alphanumerics only, uppercased.
pub fn clean_sku(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Key of the product-description lookup: whitespace removed, uppercased,
/// punctuation kept.
pub fn normalize_product_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Most frequent non-zero length among the given cleaned codes.
/// Ties resolve to the shortest length. Returns 0 for no codes.
pub fn determine_pad_length<'a, I>(cleaned_codes: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    let mut frequency: BTreeMap<usize, usize> = BTreeMap::new();
    for code in cleaned_codes {
        let len = code.len();
        if len == 0 {
            continue;
        }
        *frequency.entry(len).or_default() += 1;
    }

    let mut best: Option<(usize, usize)> = None;
    for (&len, &count) in &frequency {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((len, count)),
        }
    }

    best.map(|(len, _)| len).unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SkuNormalizer {
    pad_length: usize,
}

impl SkuNormalizer {
    pub fn new(pad_length: usize) -> Self {
        Self { pad_length }
    }

    /// Learns the pad length from a snapshot of every raw code in the run.
    /// Codes are deduplicated after cleaning, so a product repeated on many
    /// invoice lines counts once.
    pub fn from_raw_codes<I, S>(raw_codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let samples: BTreeSet<String> = raw_codes
            .into_iter()
            .map(|raw| clean_sku(raw.as_ref()))
            .filter(|cleaned| !cleaned.is_empty())
            .collect();

        let pad_length = determine_pad_length(samples.iter().map(String::as_str));
        debug!(
            "Learned SKU pad length {} from {} distinct codes",
            pad_length,
            samples.len()
        );

        Self { pad_length }
    }

    pub fn pad_length(&self) -> usize {
        self.pad_length
    }

    /// Canonical key of a raw code. Empty when the code has no alphanumerics.
    pub fn normalize(&self, raw: &str) -> String {
        let cleaned = clean_sku(raw);
        if cleaned.is_empty() {
            return cleaned;
        }
        if self.pad_length > 0 && cleaned.len() < self.pad_length {
            format!("{:0>width$}", cleaned, width = self.pad_length)
        } else {
            cleaned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_sku() {
        assert_eq!(clean_sku(" ab-12/x "), "AB12X");
        assert_eq!(clean_sku("---"), "");
        assert_eq!(clean_sku("çab"), "AB");
    }

    #[test]
    fn test_normalize_product_code() {
        assert_eq!(normalize_product_code(" ab-12 x"), "AB-12X");
    }

    #[test]
    fn test_pad_length_most_frequent() {
        assert_eq!(determine_pad_length(["12345", "23456", "123", "ABCDE"]), 5);
        assert_eq!(determine_pad_length(Vec::<&str>::new()), 0);
        assert_eq!(determine_pad_length(["", ""]), 0);
    }

    #[test]
    fn test_pad_length_tie_prefers_shortest() {
        assert_eq!(determine_pad_length(["1234", "12345", "4321", "54321"]), 4);
    }

    #[test]
    fn test_snapshot_counts_distinct_codes() {
        // "123" appears three times but counts once, "00001"/"00002" win
        let normalizer =
            SkuNormalizer::from_raw_codes(["123", "1-2-3", "123", "00001", "00002"]);
        assert_eq!(normalizer.pad_length(), 5);
        assert_eq!(normalizer.normalize("123"), "00123");
    }

    #[test]
    fn test_normalize_pads_only_shorter_codes() {
        let normalizer = SkuNormalizer::new(6);
        assert_eq!(normalizer.normalize("ab-12"), "00AB12");
        assert_eq!(normalizer.normalize("ABCDEFGH"), "ABCDEFGH");
        assert_eq!(normalizer.normalize("  "), "");
        assert_eq!(SkuNormalizer::new(0).normalize("ab1"), "AB1");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = SkuNormalizer::new(6);
        for raw in ["ab-12", "x", "123456789", "", "ç-9", "00 12"] {
            let once = normalizer.normalize(raw);
            assert_eq!(normalizer.normalize(&once), once, "raw code {:?}", raw);
        }
    }
}
