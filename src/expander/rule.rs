//! A deterministic, rule-based reference `Expander`.
//!
//! Grounded in the teacher's `ingest::synonyms::SynonymService`: a flat
//! token->canonical-form replacement table driven by lowercase +
//! whitespace-collapse + punctuation-strip normalization. This is not a
//! production-grade address parser (that lives outside this crate, per
//! spec.md S1) - it exists so the crate is runnable end-to-end in tests
//! and from the CLI without a network service.

use hashbrown::HashMap;

use super::{primitive_parse, Expander, Parse, ParseResult, Variant};

/// A name longer than this is dropped from the index (spec.md S4.1).
pub const MAX_NAME_LEN: usize = 200;
/// Expansions beyond this count drop the name from the index.
pub const MAX_VARIANTS: usize = 85;
/// More than this many commas drops the name.
pub const MAX_COMMAS: usize = 10;

#[derive(Debug, Clone)]
pub struct RuleExpander {
    /// variant -> canonical substitutions, applied per-token (e.g. "st" <-> "street").
    abbreviations: HashMap<String, Vec<String>>,
}

impl Default for RuleExpander {
    fn default() -> Self {
        let mut abbreviations: HashMap<String, Vec<String>> = HashMap::new();
        let groups: &[&[&str]] = &[
            &["street", "st"],
            &["saint", "st"],
            &["mount", "mt"],
            &["avenue", "ave"],
            &["boulevard", "blvd"],
            &["road", "rd"],
            &["drive", "dr"],
            &["north", "n"],
            &["south", "s"],
            &["east", "e"],
            &["west", "w"],
        ];
        for group in groups {
            for word in *group {
                let others: Vec<String> = group
                    .iter()
                    .filter(|w| *w != word)
                    .map(|w| w.to_string())
                    .collect();
                abbreviations.insert(word.to_string(), others);
            }
        }
        Self { abbreviations }
    }
}

impl RuleExpander {
    pub fn new() -> Self {
        Self::default()
    }

    /// lowercase, unicode-fold, strip punctuation, collapse whitespace.
    pub fn normalize_token(s: &str) -> String {
        let folded = deunicode::deunicode(s).to_lowercase();
        let stripped: String = folded
            .chars()
            .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
            .collect();
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// True if `s` should be dropped from the index per spec.md S4.1's
    /// sanity checks (independent of the variant-count cap, which the
    /// caller checks on the output of `expand`).
    pub fn is_suspicious(s: &str) -> bool {
        if s.len() > MAX_NAME_LEN {
            let digit_or_space = s.chars().filter(|c| c.is_ascii_digit() || c.is_whitespace()).count();
            if digit_or_space * 2 > s.len() {
                return true;
            }
        }
        s.chars().filter(|&c| c == ',').count() > MAX_COMMAS
    }
}

impl Expander for RuleExpander {
    fn parse(&self, address: &str) -> ParseResult {
        let primitive = primitive_parse(address);
        let mut labels_only = HashMap::new();
        for (label, variants) in &primitive.labels {
            if let Some(first) = variants.first() {
                labels_only.insert(label.clone(), first.clone());
            }
        }

        // Map the primitive h-i segmentation onto standard labels using
        // the common "house, road, city, ..., country" ordering.
        let mut by_index: Vec<(usize, &str)> = primitive
            .labels
            .iter()
            .filter_map(|(label, variants)| {
                label
                    .strip_prefix("h-")
                    .and_then(|n| n.parse::<usize>().ok())
                    .zip(variants.first().map(String::as_str))
            })
            .collect();
        by_index.sort_by_key(|(i, _)| *i);

        const ORDER: &[&str] = &["country", "city", "road", "house"];
        let mut standard = Parse::new();
        let mut standard_labels_only = HashMap::new();
        for (pos, (_, seg)) in by_index.iter().enumerate() {
            if let Some(label) = ORDER.get(pos) {
                let variants = self.expand(seg);
                standard_labels_only.insert(label.to_string(), seg.to_string());
                standard = standard.with(label, variants);
            }
        }
        if let Some(postal) = primitive.get("postal_code") {
            standard = standard.with("postal_code", postal.to_vec());
        }

        labels_only.extend(standard_labels_only);

        ParseResult {
            parses: vec![standard, primitive],
            labels_only,
        }
    }

    fn expand(&self, s: &str) -> Vec<Variant> {
        let normalized = Self::normalize_token(s);
        if normalized.is_empty() {
            return Vec::new();
        }

        let tokens: Vec<&str> = normalized.split(' ').collect();
        let mut variants: Vec<Vec<String>> = vec![vec![]];

        for token in tokens {
            let mut options = vec![token.to_string()];
            if let Some(alts) = self.abbreviations.get(token) {
                options.extend(alts.iter().cloned());
            }

            let mut next = Vec::with_capacity(variants.len() * options.len());
            'outer: for existing in &variants {
                for opt in &options {
                    if next.len() >= MAX_VARIANTS {
                        break 'outer;
                    }
                    let mut v = existing.clone();
                    v.push(opt.clone());
                    next.push(v);
                }
            }
            variants = next;
        }

        variants.into_iter().map(|parts| parts.join(" ")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_token_lowercases_and_strips_punctuation() {
        assert_eq!(RuleExpander::normalize_token("Saint-Germain!"), "saint germain");
    }

    #[test]
    fn expand_produces_abbreviation_variants() {
        let e = RuleExpander::new();
        let variants = e.expand("Main Street");
        assert!(variants.contains(&"main street".to_string()));
        assert!(variants.contains(&"main st".to_string()));
    }

    #[test]
    fn expand_is_deterministic() {
        let e = RuleExpander::new();
        assert_eq!(e.expand("North Avenue"), e.expand("North Avenue"));
    }

    #[test]
    fn suspicious_name_rules() {
        assert!(RuleExpander::is_suspicious(&"1 ".repeat(150)));
        assert!(RuleExpander::is_suspicious(&",".repeat(11)));
        assert!(!RuleExpander::is_suspicious("Paris"));
    }

    #[test]
    fn parse_maps_primitive_segments_to_standard_labels() {
        let e = RuleExpander::new();
        let result = e.parse("123 Main St, Paris, France");
        let standard = &result.parses[0];
        assert!(standard.get("country").unwrap().iter().any(|v| v == "france"));
        assert!(standard.get("city").unwrap().iter().any(|v| v == "paris"));
    }
}
