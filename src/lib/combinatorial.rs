//! Combinatorial barcodes: one barcode at the start of each read of a pair.
//!
//! A sample is identified by a forward barcode (at the start of R1) together with a reverse
//! barcode (at the start of R2). The distinct forward sequences and the distinct reverse
//! sequences are indexed separately, each by its own [`Matcher`], and the pair of hits is
//! looked up in a table of known combinations. A read pair whose hits do not form a known
//! combination is unmatched.
//!
//! Combination tables are tab-separated `forward<TAB>reverse<TAB>identity` rows with an optional
//! header line starting with `Barcode`.

use std::io::BufRead;
use std::path::Path;

use ahash::AHashMap;
use anyhow::{Context, Result};
use fgoxide::io::Io;
use log::info;

use crate::barcode::{Barcode, BarcodeSet, validate_barcode};
use crate::errors::DemuxError;
use crate::matcher::{BarcodeMatch, Matcher};
use crate::validation::validate_file_exists;

/// A sample identified by a forward and a reverse barcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodeCombo {
    /// Identity, used in output file names and reports
    pub id: String,
    /// Barcode at the start of the forward read, upper-cased
    pub forward: Vec<u8>,
    /// Barcode at the start of the reverse read, upper-cased
    pub reverse: Vec<u8>,
}

impl BarcodeCombo {
    /// Creates a combination, upper-casing both sequences.
    pub fn new(
        id: impl Into<String>,
        forward: impl AsRef<[u8]>,
        reverse: impl AsRef<[u8]>,
    ) -> Self {
        Self {
            id: id.into(),
            forward: forward.as_ref().to_ascii_uppercase(),
            reverse: reverse.as_ref().to_ascii_uppercase(),
        }
    }

    /// Both sequences as `FORWARD+REVERSE`.
    #[must_use]
    pub fn sequence_str(&self) -> String {
        let forward = String::from_utf8_lossy(&self.forward);
        let reverse = String::from_utf8_lossy(&self.reverse);
        format!("{forward}+{reverse}")
    }
}

/// An ordered, validated set of barcode combinations.
///
/// Each side obeys the same rules as a [`BarcodeSet`] entry. Identities are unique and no two
/// entries share both sequences.
#[derive(Debug, Clone)]
pub struct ComboSet {
    combos: Vec<BarcodeCombo>,
}

impl ComboSet {
    /// Validates `combos`, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns an error if the set is empty, a sequence or identity is invalid, an identity
    /// repeats, or a combination repeats.
    pub fn new(combos: Vec<BarcodeCombo>, source_name: &str) -> crate::errors::Result<Self> {
        if combos.is_empty() {
            return Err(DemuxError::EmptyBarcodeSet { source_name: source_name.to_string() });
        }

        let mut ids: AHashMap<&str, &BarcodeCombo> = AHashMap::with_capacity(combos.len());
        let mut pairs: AHashMap<(&[u8], &[u8]), &str> = AHashMap::with_capacity(combos.len());
        for combo in &combos {
            validate_barcode(&Barcode::new(combo.id.as_str(), &combo.forward))?;
            validate_barcode(&Barcode::new(combo.id.as_str(), &combo.reverse))?;
            if let Some(first) = ids.insert(combo.id.as_str(), combo) {
                return Err(DemuxError::DuplicateBarcodeId {
                    id: combo.id.clone(),
                    first: first.sequence_str(),
                    second: combo.sequence_str(),
                });
            }
            let key = (combo.forward.as_slice(), combo.reverse.as_slice());
            if let Some(first) = pairs.insert(key, combo.id.as_str()) {
                return Err(DemuxError::InvalidBarcode {
                    id: combo.id.clone(),
                    reason: format!(
                        "combination {} is already used by {first}",
                        combo.sequence_str()
                    ),
                });
            }
        }

        Ok(Self { combos })
    }

    /// Loads combinations from a table, which may be gzip-compressed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, malformed, or fails validation.
    pub fn from_path(path: &Path) -> Result<Self> {
        validate_file_exists(path, "Barcode file")?;
        let reader: Box<dyn BufRead + Send> = Io::default()
            .new_reader(path)
            .with_context(|| format!("Failed to open barcode file: {}", path.display()))?;
        let source_name = path.display().to_string();
        let set = Self::from_table_reader(reader, &source_name)?;
        info!("Loaded {} barcode combinations from {}", set.len(), source_name);
        Ok(set)
    }

    /// Parses `forward<TAB>reverse<TAB>identity` rows, skipping blank lines and a leading
    /// header row that starts with `Barcode` or `barcode`.
    ///
    /// # Errors
    ///
    /// Returns an error if a row has fewer than three columns or validation fails.
    pub fn from_table_reader<R: BufRead>(reader: R, source_name: &str) -> Result<Self> {
        let mut combos = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line =
                line.with_context(|| format!("Failed to read barcode table: {source_name}"))?;
            let line = line.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            if combos.is_empty() && (line.starts_with("Barcode") || line.starts_with("barcode")) {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            let [forward, reverse, id, ..] = fields.as_slice() else {
                return Err(DemuxError::InvalidFileFormat {
                    file_type: "barcode combination table".to_string(),
                    path: source_name.to_string(),
                    reason: format!(
                        "line {} needs forward and reverse barcodes and an ID separated by tabs",
                        i + 1
                    ),
                }
                .into());
            };
            combos.push(BarcodeCombo::new(*id, *forward, *reverse));
        }
        Ok(Self::new(combos, source_name)?)
    }

    /// Number of combinations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.combos.len()
    }

    /// Always false for a constructed set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }

    /// Combination at `index` in file order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&BarcodeCombo> {
        self.combos.get(index)
    }

    /// Iterates combinations in file order.
    pub fn iter(&self) -> std::slice::Iter<'_, BarcodeCombo> {
        self.combos.iter()
    }

    /// Length of the shortest barcode on either side.
    #[must_use]
    pub fn shortest(&self) -> usize {
        self.combos.iter().map(|c| c.forward.len().min(c.reverse.len())).min().unwrap_or(0)
    }
}

/// Distinct sequences of one side, in first-seen order, named by their own sequence.
fn distinct_side<'a>(
    sequences: impl Iterator<Item = &'a [u8]>,
    source_name: &str,
) -> crate::errors::Result<(BarcodeSet, AHashMap<&'a [u8], usize>)> {
    let mut positions: AHashMap<&[u8], usize> = AHashMap::new();
    let mut barcodes = Vec::new();
    for sequence in sequences {
        positions.entry(sequence).or_insert_with(|| {
            barcodes.push(Barcode::new(String::from_utf8_lossy(sequence), sequence));
            barcodes.len() - 1
        });
    }
    Ok((BarcodeSet::new(barcodes, source_name)?, positions))
}

/// A read pair assigned to a combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComboMatch {
    /// Position of the combination in its [`ComboSet`]
    pub combo: usize,
    /// Hit of the forward barcode on R1
    pub forward: BarcodeMatch,
    /// Hit of the reverse barcode on R2
    pub reverse: BarcodeMatch,
}

impl ComboMatch {
    /// True when neither barcode needed a substitution.
    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.forward.mismatches == 0 && self.reverse.mismatches == 0
    }
}

/// Matches read pairs against a [`ComboSet`].
#[derive(Debug, Clone)]
pub struct ComboMatcher {
    combos: ComboSet,
    forward: Matcher,
    reverse: Matcher,
    lookup: AHashMap<(usize, usize), usize>,
}

impl ComboMatcher {
    /// Builds mismatch levels `0..=max_mismatches` for each side.
    ///
    /// # Errors
    ///
    /// Returns an error if either index cannot be built.
    pub fn new(combos: ComboSet, max_mismatches: usize) -> crate::errors::Result<Self> {
        let (forward_set, reverse_set, lookup) = {
            let (forward_set, forward_pos) =
                distinct_side(combos.iter().map(|c| c.forward.as_slice()), "forward barcodes")?;
            let (reverse_set, reverse_pos) =
                distinct_side(combos.iter().map(|c| c.reverse.as_slice()), "reverse barcodes")?;

            let mut lookup = AHashMap::with_capacity(combos.len());
            for (i, combo) in combos.iter().enumerate() {
                let f = forward_pos.get(combo.forward.as_slice());
                let r = reverse_pos.get(combo.reverse.as_slice());
                if let (Some(&f), Some(&r)) = (f, r) {
                    lookup.insert((f, r), i);
                }
            }
            (forward_set, reverse_set, lookup)
        };

        let forward = Matcher::new(forward_set, max_mismatches)?;
        let reverse = Matcher::new(reverse_set, max_mismatches)?;
        Ok(Self { combos, forward, reverse, lookup })
    }

    /// The combinations being matched against.
    #[must_use]
    pub fn combos(&self) -> &ComboSet {
        &self.combos
    }

    /// Matcher over the distinct forward barcodes.
    #[must_use]
    pub fn forward(&self) -> &Matcher {
        &self.forward
    }

    /// Matcher over the distinct reverse barcodes.
    #[must_use]
    pub fn reverse(&self) -> &Matcher {
        &self.reverse
    }

    /// Ambiguous variants found on both sides.
    #[must_use]
    pub fn conflicts(&self) -> usize {
        self.forward.index().conflicts().len() + self.reverse.index().conflicts().len()
    }

    /// Finds the combination whose barcodes prefix `r1` and `r2`.
    ///
    /// Returns `None` when either read has no hit or the two hits are not a known combination.
    #[must_use]
    pub fn find(&self, r1: &[u8], r2: &[u8]) -> Option<ComboMatch> {
        let forward = self.forward.find(r1)?;
        let reverse = self.reverse.find(r2)?;
        let combo = *self.lookup.get(&(forward.barcode, reverse.barcode))?;
        Some(ComboMatch { combo, forward, reverse })
    }
}
