//! Assigning reads to barcodes.
//!
//! The [`Matcher`] consults the mismatch levels in increasing order and stops at the first
//! level with a hit, so an exact match always beats a one-mismatch match, which beats a
//! two-mismatch match, and so on.

use crate::barcode::{Barcode, BarcodeSet};
use crate::errors::Result;
use crate::index::{MismatchIndex, MismatchLevel};

/// A successful barcode assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarcodeMatch {
    /// Position of the barcode in its [`BarcodeSet`]
    pub barcode: usize,
    /// Number of leading read bases covered by the barcode
    pub length: usize,
    /// Mismatch level that produced the hit
    pub mismatches: usize,
}

/// Matches read prefixes against a barcode set with up to `max_mismatches` substitutions.
#[derive(Debug, Clone)]
pub struct Matcher {
    barcodes: BarcodeSet,
    index: MismatchIndex,
}

impl Matcher {
    /// Builds the mismatch levels `0..=max_mismatches` for `barcodes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be built.
    pub fn new(barcodes: BarcodeSet, max_mismatches: usize) -> Result<Self> {
        let index = MismatchIndex::build(&barcodes, max_mismatches)?;
        Ok(Self { barcodes, index })
    }

    /// The barcodes being matched against.
    #[must_use]
    pub fn barcodes(&self) -> &BarcodeSet {
        &self.barcodes
    }

    /// The underlying mismatch index.
    #[must_use]
    pub fn index(&self) -> &MismatchIndex {
        &self.index
    }

    /// Finds the barcode whose variant best prefixes `read`.
    ///
    /// Returns `None` when no level has a key that prefixes the read.
    #[must_use]
    pub fn find(&self, read: &[u8]) -> Option<BarcodeMatch> {
        self.index.levels().iter().find_map(|level| match_level(level, read))
    }

    /// Identity and matched length for `read`, or `(None, 0)` when nothing matches.
    #[must_use]
    pub fn assign(&self, read: &[u8]) -> (Option<&Barcode>, usize) {
        match self.find(read) {
            Some(hit) => (self.barcodes.get(hit.barcode), hit.length),
            None => (None, 0),
        }
    }
}

/// Looks `read` up in one level.
///
/// The trie walk gives the deepest path spelling a prefix of the read, which can end inside a
/// longer key. The candidate is shortened one base at a time until it is a real key.
fn match_level(level: &MismatchLevel, read: &[u8]) -> Option<BarcodeMatch> {
    let trie = level.trie();
    let mut candidate = &read[..trie.longest_prefix(read)];
    while !candidate.is_empty() {
        if let Some(&barcode) = trie.get(candidate) {
            return Some(BarcodeMatch {
                barcode,
                length: candidate.len(),
                mismatches: level.mismatches(),
            });
        }
        candidate = &candidate[..candidate.len() - 1];
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn matcher(pairs: &[(&str, &str)], max_mismatches: usize) -> Matcher {
        let set =
            BarcodeSet::new(pairs.iter().map(|(id, seq)| Barcode::new(*id, *seq)).collect(), "t")
                .unwrap();
        Matcher::new(set, max_mismatches).unwrap()
    }

    fn assigned_id(matcher: &Matcher, read: &str) -> Option<String> {
        matcher.assign(read.as_bytes()).0.map(|b| b.id.clone())
    }

    #[test]
    fn test_exact_match_at_level_zero() {
        let m = matcher(&[("id1", "AAAA"), ("id2", "CCCC")], 1);
        let hit = m.find(b"AAAA").unwrap();
        assert_eq!(hit, BarcodeMatch { barcode: 0, length: 4, mismatches: 0 });
        assert_eq!(m.find(b"CCCCGGT").unwrap().mismatches, 0);
    }

    #[test]
    fn test_one_mismatch_found_at_level_one_only() {
        let m = matcher(&[("id1", "AAAA"), ("id2", "CCCC")], 1);
        let hit = m.find(b"AAAT").unwrap();
        assert_eq!(hit, BarcodeMatch { barcode: 0, length: 4, mismatches: 1 });

        let exact_only = matcher(&[("id1", "AAAA"), ("id2", "CCCC")], 0);
        assert_eq!(exact_only.find(b"AAAT"), None);
    }

    #[rstest]
    #[case::one_mismatch("AAAT", Some("id1"), 4)]
    #[case::too_far("GGGG", None, 0)]
    #[case::exact_with_tail("CCCCTTTT", Some("id2"), 4)]
    #[case::short_read("AAA", None, 0)]
    #[case::empty_read("", None, 0)]
    fn test_assign(#[case] read: &str, #[case] expected: Option<&str>, #[case] length: usize) {
        let m = matcher(&[("id1", "AAAA"), ("id2", "CCCC")], 1);
        let (barcode, matched) = m.assign(read.as_bytes());
        assert_eq!(barcode.map(|b| b.id.as_str()), expected);
        assert_eq!(matched, length);
    }

    #[test]
    fn test_lower_levels_take_precedence() {
        // "ACGT" is exact for a and one mismatch from b.
        let m = matcher(&[("b", "ACGA"), ("a", "ACGT")], 1);
        let hit = m.find(b"ACGTCC").unwrap();
        assert_eq!(m.barcodes().get(hit.barcode).unwrap().id, "a");
        assert_eq!(hit.mismatches, 0);
    }

    #[test]
    fn test_non_acgt_bases_never_match() {
        let m = matcher(&[("id1", "AAAA")], 1);
        assert_eq!(assigned_id(&m, "AANA"), None);
        assert_eq!(assigned_id(&m, "AAAN"), None);
        assert_eq!(assigned_id(&m, "aaaa").as_deref(), Some("id1"));
    }

    #[test]
    fn test_confirm_and_shrink_falls_back_to_shorter_key() {
        // The read walks into the interior of TTTTAAAA's path before diverging; the real
        // key is the shorter barcode TTTT.
        let m = matcher(&[("short", "TTTT"), ("long", "TTTTAAAA")], 0);
        let hit = m.find(b"TTTTAAGG").unwrap();
        assert_eq!(m.barcodes().get(hit.barcode).unwrap().id, "short");
        assert_eq!(hit.length, 4);

        let hit = m.find(b"TTTTAAAAGG").unwrap();
        assert_eq!(m.barcodes().get(hit.barcode).unwrap().id, "long");
        assert_eq!(hit.length, 8);
    }

    #[test]
    fn test_interior_path_without_key_is_no_match() {
        let m = matcher(&[("long", "TTTTAAAA")], 0);
        assert_eq!(m.find(b"TTTTAAGG"), None);
    }

    #[test]
    fn test_variable_length_barcodes() {
        let m = matcher(&[("six", "ACGTAC"), ("four", "GGCC")], 1);
        assert_eq!(m.find(b"ACGTTCAAA").unwrap().length, 6);
        assert_eq!(m.find(b"GGCATTT").unwrap().length, 4);
    }

    #[test]
    fn test_conflicting_variant_goes_to_last_barcode() {
        let m = matcher(&[("first", "AAAC"), ("second", "AACC")], 1);
        assert_eq!(assigned_id(&m, "AAGC").as_deref(), Some("second"));
        assert_eq!(assigned_id(&m, "AAAC").as_deref(), Some("first"));
    }

    #[test]
    fn test_rebuilding_gives_identical_assignments() {
        let pairs = [("x", "ACGTA"), ("y", "ACGAA"), ("z", "TTTTT")];
        let a = matcher(&pairs, 2);
        let b = matcher(&pairs, 2);
        for read in ["ACGTAGG", "ACGCAGG", "TTATTCC", "GGGGGGG", "ACGAT"] {
            assert_eq!(a.find(read.as_bytes()), b.find(read.as_bytes()), "{read}");
        }
    }
}
