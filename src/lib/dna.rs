//! DNA alphabet utilities.
//!
//! Barcodes and their variants live in the four-letter `ACGT` alphabet. Everything else
//! (including `N`) is treated as a base that can never match.

/// The substitution alphabet, in the order used for trie child slots.
pub const DNA_BASES: [u8; 4] = *b"ACGT";

/// Returns the alphabet slot of a base, accepting either case.
///
/// # Examples
///
/// ```
/// use bcdemux_lib::dna::base_index;
///
/// assert_eq!(base_index(b'A'), Some(0));
/// assert_eq!(base_index(b't'), Some(3));
/// assert_eq!(base_index(b'N'), None);
/// ```
#[inline]
#[must_use]
pub const fn base_index(base: u8) -> Option<usize> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

/// Returns true if every base is one of `ACGT` (either case). Empty sequences are accepted.
#[must_use]
pub fn is_acgt(seq: &[u8]) -> bool {
    seq.iter().all(|&b| base_index(b).is_some())
}

/// Counts positions at which two sequences differ, comparing over the shorter length.
///
/// # Examples
///
/// ```
/// use bcdemux_lib::dna::hamming_distance;
///
/// assert_eq!(hamming_distance(b"AAAA", b"AAAT"), 1);
/// assert_eq!(hamming_distance(b"ACGT", b"ACGT"), 0);
/// ```
#[must_use]
pub fn hamming_distance(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).filter(|(x, y)| x != y).count()
}
