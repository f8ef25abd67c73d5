//! Substitution variants of a barcode.
//!
//! A variant at level `k` is the barcode with exactly `k` positions substituted. The raw
//! enumeration visits every choice of `k` positions and every assignment of the four bases to
//! them, which includes assignments that put the original base back. [`generate_variants`]
//! keeps only the members that really are `k` substitutions away, so the union of levels
//! `0..=K` covers "at most `K` mismatches" with each sequence appearing at exactly one level.

use ahash::AHashSet;
use itertools::Itertools;

use crate::dna::{DNA_BASES, hamming_distance};

/// Number of raw candidates [`enumerate_variants`] yields: `C(len, k) * 4^k`, or 0 when
/// `k > len`. Saturates at `u64::MAX`.
///
/// # Examples
///
/// ```
/// use bcdemux_lib::mutate::variant_count;
///
/// assert_eq!(variant_count(4, 0), 1);
/// assert_eq!(variant_count(4, 1), 16);
/// assert_eq!(variant_count(4, 2), 96);
/// assert_eq!(variant_count(3, 4), 0);
/// ```
#[must_use]
pub fn variant_count(len: usize, k: usize) -> u64 {
    if k > len {
        return 0;
    }
    let mut combinations: u64 = 1;
    for i in 0..k as u64 {
        combinations = combinations.saturating_mul(len as u64 - i) / (i + 1);
    }
    let assignments = 4_u64.checked_pow(k as u32).unwrap_or(u64::MAX);
    combinations.saturating_mul(assignments)
}

/// Lazily enumerates every raw candidate at level `k`, duplicates included.
///
/// Position sets are visited in lexicographic order and, within one, base assignments in
/// `ACGT` order. Nothing downstream depends on this order.
pub fn enumerate_variants(sequence: &[u8], k: usize) -> Box<dyn Iterator<Item = Vec<u8>> + '_> {
    if k > sequence.len() {
        return Box::new(std::iter::empty());
    }
    if k == 0 {
        return Box::new(std::iter::once(sequence.to_vec()));
    }

    Box::new((0..sequence.len()).combinations(k).flat_map(move |positions| {
        std::iter::repeat_n(DNA_BASES.iter().copied(), k).multi_cartesian_product().map(
            move |bases| {
                let mut variant = sequence.to_vec();
                for (&pos, &base) in positions.iter().zip(&bases) {
                    variant[pos] = base;
                }
                variant
            },
        )
    }))
}

/// Returns the set of sequences exactly `k` substitutions away from `sequence`.
///
/// `k == 0` gives `{sequence}`; `k > sequence.len()` gives the empty set.
///
/// # Examples
///
/// ```
/// use bcdemux_lib::mutate::generate_variants;
///
/// let variants = generate_variants(b"AC", 1);
/// assert_eq!(variants.len(), 6);
/// assert!(variants.contains(&b"TC".to_vec()));
/// assert!(!variants.contains(&b"AC".to_vec()));
/// ```
#[must_use]
pub fn generate_variants(sequence: &[u8], k: usize) -> AHashSet<Vec<u8>> {
    enumerate_variants(sequence, k).filter(|v| hamming_distance(v, sequence) == k).collect()
}

/// [`generate_variants`] in sorted order, for callers that need a reproducible insertion order.
#[must_use]
pub fn sorted_variants(sequence: &[u8], k: usize) -> Vec<Vec<u8>> {
    let mut variants: Vec<Vec<u8>> = generate_variants(sequence, k).into_iter().collect();
    variants.sort_unstable();
    variants
}
