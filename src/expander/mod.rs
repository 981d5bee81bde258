//! The token-expansion contract the search core consumes.
//!
//! `Expander` is the trait boundary onto the external address-parser
//! service (out of scope per spec.md S1 - "specified only by
//! interface"). `search::core` is generic over any `E: Expander` so
//! callers can supply a real adapter; `RuleExpander` (in `rule.rs`) is a
//! deterministic reference implementation used by tests and by the CLI
//! when no richer expander is wired in.

pub(crate) mod rule;

pub use rule::RuleExpander;

use hashbrown::HashMap;

/// One normalized textual variant of a parsed component.
pub type Variant = String;

/// One candidate segmentation of an address: label -> non-empty variant list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parse {
    pub labels: HashMap<String, Vec<Variant>>,
}

impl Parse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, label: &str, variants: Vec<Variant>) -> Self {
        if !variants.is_empty() {
            self.labels.insert(label.to_string(), variants);
        }
        self
    }

    pub fn get(&self, label: &str) -> Option<&[Variant]> {
        self.labels.get(label).map(Vec::as_slice)
    }
}

/// Result of `Expander::parse`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseResult {
    pub parses: Vec<Parse>,
    /// Best single segmentation before expansion: label -> value.
    pub labels_only: HashMap<String, String>,
}

/// Recognized hierarchy labels, in the exact projection order search
/// uses (spec.md S4.4). `postal_code` is held out and applied as a
/// candidate filter rather than a level.
pub const HIERARCHY_LABELS: &[&str] = &[
    "country",
    "country_region",
    "state",
    "state_district",
    "island",
    "city",
    "city_district",
    "suburb",
    "road",
    "house_number",
    "category",
    "house",
];

/// The external token-expansion service. Implementations must reproduce
/// the normalization rules of spec.md S4.1: lowercase, Unicode-fold,
/// punctuation-strip, language-specific abbreviation expansion.
pub trait Expander {
    /// Map a raw address string to a set of parses plus the best single
    /// segmentation (`labels_only`).
    fn parse(&self, address: &str) -> ParseResult;

    /// Single-string expansion used by the index builder and by nearby
    /// search name matching.
    fn expand(&self, s: &str) -> Vec<Variant>;

    /// Uppercase, collapse internal spaces, strip trailing space.
    /// Idempotent: `normalize_postalcode(normalize_postalcode(x)) ==
    /// normalize_postalcode(x)`.
    fn normalize_postalcode(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        let mut last_was_space = false;
        for ch in s.trim().chars() {
            let upper = ch.to_ascii_uppercase();
            if upper.is_whitespace() {
                if !last_was_space {
                    out.push(' ');
                }
                last_was_space = true;
            } else {
                out.push(upper);
                last_was_space = false;
            }
        }
        out.trim_end().to_string()
    }
}

/// Fallback "primitive" parse: split on commas, trim, assign the i-th
/// segment from the end the synthetic label `h-i`. A segment starting
/// with `post:` is lifted to the `postal_code` label (spec.md S4.1).
pub fn primitive_parse(address: &str) -> Parse {
    let segments: Vec<&str> = address.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    let mut parse = Parse::new();
    let n = segments.len();
    for (i, seg) in segments.iter().enumerate() {
        let from_end = n - 1 - i;
        if let Some(code) = seg.strip_prefix("post:") {
            parse = parse.with("postal_code", vec![code.trim().to_string()]);
        } else {
            parse = parse.with(&format!("h-{from_end}"), vec![seg.to_string()]);
        }
    }
    parse
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_parse_labels_from_the_end() {
        let parse = primitive_parse("123 Main St, Paris, France");
        assert_eq!(parse.get("h-0"), Some(&["France".to_string()][..]));
        assert_eq!(parse.get("h-1"), Some(&["Paris".to_string()][..]));
        assert_eq!(parse.get("h-2"), Some(&["123 Main St".to_string()][..]));
    }

    #[test]
    fn primitive_parse_lifts_postal_prefix() {
        let parse = primitive_parse("Paris, post:75001");
        assert_eq!(parse.get("postal_code"), Some(&["75001".to_string()][..]));
        assert_eq!(parse.get("h-0"), Some(&["Paris".to_string()][..]));
    }

    struct Dummy;
    impl Expander for Dummy {
        fn parse(&self, _address: &str) -> ParseResult {
            ParseResult::default()
        }
        fn expand(&self, s: &str) -> Vec<Variant> {
            vec![s.to_string()]
        }
    }

    #[test]
    fn default_normalize_postalcode_is_idempotent() {
        let d = Dummy;
        let once = d.normalize_postalcode(" 75  001 ");
        let twice = d.normalize_postalcode(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "75 001");
    }
}
