//! Mismatch-level indices over barcode variants.
//!
//! Level `k` holds every sequence exactly `k` substitutions away from some barcode, keyed in a
//! [`PrefixTrie`] and mapped to that barcode's position in the [`BarcodeSet`]. Levels are built
//! independently and kept for the whole run.
//!
//! When two barcodes generate the same variant at a level, the barcode appearing later in the
//! set takes the key and the collision is recorded as a [`BarcodeConflict`].

use std::fmt;

use ahash::AHashMap;
use log::{debug, info, warn};

use crate::barcode::BarcodeSet;
use crate::errors::Result;
use crate::logging::format_count;
use crate::mutate::sorted_variants;
use crate::trie::PrefixTrie;

/// Maximum number of conflicts spelled out individually when logging.
const MAX_CONFLICTS_LOGGED: usize = 20;

/// A variant claimed by two barcodes at the same mismatch level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeConflict {
    /// Mismatch level at which the collision happened
    pub level: usize,
    /// The colliding variant sequence
    pub sequence: String,
    /// Identity that held the key before
    pub existing: String,
    /// Identity that now holds the key
    pub incoming: String,
}

impl fmt::Display for BarcodeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is {} mismatch(es) from both {} and {}; assigned to {}",
            self.sequence, self.level, self.existing, self.incoming, self.incoming
        )
    }
}

/// One mismatch level: all exactly-`k` variants of every barcode.
#[derive(Debug, Clone)]
pub struct MismatchLevel {
    mismatches: usize,
    trie: PrefixTrie<usize>,
}

impl MismatchLevel {
    /// Number of substitutions represented by this level.
    #[must_use]
    pub fn mismatches(&self) -> usize {
        self.mismatches
    }

    /// The level's trie, mapping variants to barcode positions.
    #[must_use]
    pub fn trie(&self) -> &PrefixTrie<usize> {
        &self.trie
    }

    /// Number of distinct variants stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trie.len()
    }

    /// True when no barcode has variants at this level.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }
}

/// The stack of mismatch levels `0..=max_mismatches`.
#[derive(Debug, Clone)]
pub struct MismatchIndex {
    levels: Vec<MismatchLevel>,
    conflicts: Vec<BarcodeConflict>,
}

impl MismatchIndex {
    /// Builds every level from `0` to `max_mismatches` inclusive.
    ///
    /// Barcodes are inserted in set order and each barcode's variants in sorted order, so the
    /// result and the conflict list are reproducible for a fixed barcode file.
    ///
    /// # Errors
    ///
    /// Returns an error if a variant cannot be inserted, which only happens for sequences
    /// that bypassed [`BarcodeSet`] validation.
    pub fn build(barcodes: &BarcodeSet, max_mismatches: usize) -> Result<Self> {
        let mut levels = Vec::with_capacity(max_mismatches + 1);
        let mut conflicts = Vec::new();

        for k in 0..=max_mismatches {
            let mut trie = PrefixTrie::new();
            for (index, barcode) in barcodes.iter().enumerate() {
                for variant in sorted_variants(&barcode.sequence, k) {
                    let Some(previous) = trie.insert(&variant, index)? else { continue };
                    if previous != index {
                        let existing =
                            barcodes.get(previous).map(|b| b.id.clone()).unwrap_or_default();
                        let conflict = BarcodeConflict {
                            level: k,
                            sequence: String::from_utf8_lossy(&variant).into_owned(),
                            existing,
                            incoming: barcode.id.clone(),
                        };
                        debug!("Barcode conflict: {conflict}");
                        conflicts.push(conflict);
                    }
                }
            }
            info!(
                "Built mismatch level {k} with {} variants ({} trie nodes)",
                format_count(trie.len() as u64),
                format_count(trie.node_count() as u64)
            );
            levels.push(MismatchLevel { mismatches: k, trie });
        }

        let index = Self { levels, conflicts };
        index.log_conflicts();
        Ok(index)
    }

    /// Levels in increasing mismatch order.
    #[must_use]
    pub fn levels(&self) -> &[MismatchLevel] {
        &self.levels
    }

    /// Highest mismatch level built.
    #[must_use]
    pub fn max_mismatches(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Every collision seen while building, in insertion order.
    #[must_use]
    pub fn conflicts(&self) -> &[BarcodeConflict] {
        &self.conflicts
    }

    /// Conflicts grouped by level and barcode pair, with the number of colliding variants.
    #[must_use]
    pub fn conflict_summary(&self) -> Vec<(usize, String, String, usize)> {
        let mut counts: AHashMap<(usize, &str, &str), usize> = AHashMap::new();
        for c in &self.conflicts {
            *counts.entry((c.level, c.existing.as_str(), c.incoming.as_str())).or_default() += 1;
        }
        let mut summary: Vec<_> = counts
            .into_iter()
            .map(|((level, a, b), n)| (level, a.to_string(), b.to_string(), n))
            .collect();
        summary.sort();
        summary
    }

    fn log_conflicts(&self) {
        if self.conflicts.is_empty() {
            return;
        }

        warn!("###################################################################");
        warn!(
            "# WARNING: {} barcode variant(s) are claimed by more than one barcode!",
            format_count(self.conflicts.len() as u64)
        );
        warn!("# Reads matching these variants go to the later barcode in the file.");
        for (level, existing, incoming, n) in self.conflict_summary() {
            warn!("#   {existing} <-> {incoming}: {n} variant(s) at {level} mismatch(es)");
        }
        for conflict in self.conflicts.iter().take(MAX_CONFLICTS_LOGGED) {
            warn!("#   {conflict}");
        }
        if self.conflicts.len() > MAX_CONFLICTS_LOGGED {
            warn!("#   ... and {} more", self.conflicts.len() - MAX_CONFLICTS_LOGGED);
        }
        warn!("###################################################################");
    }
}
