//! Loading and validating the barcode set.
//!
//! Barcodes come from either a FASTA file (`>identity` then the sequence) or a tab-separated
//! table of `sequence<TAB>identity` rows with an optional `Barcode...` header line. The order of
//! barcodes in the file is preserved: it decides which barcode wins when two of them generate
//! the same variant.

use std::io::{BufRead, Read};
use std::path::Path;

use ahash::AHashMap;
use anyhow::{Context, Result};
use clap::ValueEnum;
use fgoxide::io::Io;
use log::info;
use seq_io::fasta::{self, Record};

use crate::dna::is_acgt;
use crate::errors::DemuxError;
use crate::validation::validate_file_exists;

/// Identity of the bucket that collects reads matching no barcode. Reserved.
pub const UNKNOWN_ID: &str = "unknown";

/// A known barcode: an identity used to name outputs and an upper-case `ACGT` sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Barcode {
    /// Identity, used in output file names and reports
    pub id: String,
    /// Barcode sequence, upper-cased
    pub sequence: Vec<u8>,
}

impl Barcode {
    /// Creates a barcode, upper-casing the sequence. Validation happens in [`BarcodeSet::new`].
    pub fn new(id: impl Into<String>, sequence: impl AsRef<[u8]>) -> Self {
        Self { id: id.into(), sequence: sequence.as_ref().to_ascii_uppercase() }
    }

    /// The sequence as text.
    #[must_use]
    pub fn sequence_str(&self) -> String {
        String::from_utf8_lossy(&self.sequence).into_owned()
    }

    /// Length of the barcode sequence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// True for an empty sequence (never true inside a [`BarcodeSet`]).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// Layout of a barcode file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BarcodeFormat {
    /// Pick from the file extension: FASTA for `.fa`, `.fasta`, `.fna` (optionally `.gz`), else table
    #[default]
    Auto,
    /// FASTA records; the header's first word is the identity
    Fasta,
    /// Tab-separated `sequence<TAB>identity` rows
    Table,
}

impl BarcodeFormat {
    /// Resolves [`BarcodeFormat::Auto`] against a path's extension.
    #[must_use]
    pub fn resolve(self, path: &Path) -> Self {
        match self {
            BarcodeFormat::Auto => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_ascii_lowercase())
                    .unwrap_or_default();
                let name = name.strip_suffix(".gz").unwrap_or(&name);
                if [".fa", ".fasta", ".fna"].iter().any(|ext| name.ends_with(ext)) {
                    BarcodeFormat::Fasta
                } else {
                    BarcodeFormat::Table
                }
            }
            other => other,
        }
    }
}

/// An ordered, validated set of barcodes.
///
/// Guarantees: at least one barcode; every sequence is non-empty `ACGT`; identities are
/// unique, non-empty, free of whitespace and path separators, and never [`UNKNOWN_ID`].
#[derive(Debug, Clone)]
pub struct BarcodeSet {
    barcodes: Vec<Barcode>,
}

impl BarcodeSet {
    /// Validates `barcodes`, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns an error if the set is empty, a barcode is invalid, or identities repeat.
    pub fn new(barcodes: Vec<Barcode>, source_name: &str) -> crate::errors::Result<Self> {
        if barcodes.is_empty() {
            return Err(DemuxError::EmptyBarcodeSet { source_name: source_name.to_string() });
        }

        let mut seen: AHashMap<&str, &Barcode> = AHashMap::with_capacity(barcodes.len());
        for barcode in &barcodes {
            validate_barcode(barcode)?;
            if let Some(first) = seen.insert(barcode.id.as_str(), barcode) {
                return Err(DemuxError::DuplicateBarcodeId {
                    id: barcode.id.clone(),
                    first: first.sequence_str(),
                    second: barcode.sequence_str(),
                });
            }
        }

        Ok(Self { barcodes })
    }

    /// Loads barcodes from a file, which may be gzip-compressed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, malformed, or fails validation.
    pub fn from_path(path: &Path, format: BarcodeFormat) -> Result<Self> {
        validate_file_exists(path, "Barcode file")?;
        let reader: Box<dyn BufRead + Send> = Io::default()
            .new_reader(path)
            .with_context(|| format!("Failed to open barcode file: {}", path.display()))?;

        let source_name = path.display().to_string();
        let set = match format.resolve(path) {
            BarcodeFormat::Fasta => Self::from_fasta_reader(reader, &source_name)?,
            _ => Self::from_table_reader(reader, &source_name)?,
        };

        info!("Loaded {} barcodes from {}", set.len(), source_name);
        Ok(set)
    }

    /// Parses FASTA records. The identity is the header up to the first whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed FASTA or if validation fails.
    pub fn from_fasta_reader<R: Read>(reader: R, source_name: &str) -> Result<Self> {
        let mut fasta = fasta::Reader::new(reader);
        let mut barcodes = Vec::new();
        while let Some(result) = fasta.next() {
            let record = result
                .with_context(|| format!("Failed to parse barcode FASTA: {source_name}"))?;
            let id = record
                .id()
                .with_context(|| format!("Barcode header is not UTF-8 in {source_name}"))?;
            barcodes.push(Barcode::new(id, record.full_seq()));
        }
        Ok(Self::new(barcodes, source_name)?)
    }

    /// Parses `sequence<TAB>identity` rows, skipping blank lines and a leading header row
    /// that starts with `Barcode` or `barcode`.
    ///
    /// # Errors
    ///
    /// Returns an error if a row has fewer than two columns or validation fails.
    pub fn from_table_reader<R: BufRead>(reader: R, source_name: &str) -> Result<Self> {
        let mut barcodes = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line =
                line.with_context(|| format!("Failed to read barcode table: {source_name}"))?;
            let line = line.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            if barcodes.is_empty() && (line.starts_with("Barcode") || line.starts_with("barcode"))
            {
                continue;
            }

            let mut fields = line.split('\t');
            let (Some(sequence), Some(id)) = (fields.next(), fields.next()) else {
                return Err(DemuxError::InvalidFileFormat {
                    file_type: "barcode table".to_string(),
                    path: source_name.to_string(),
                    reason: format!("line {} needs a sequence and an ID separated by a tab", i + 1),
                }
                .into());
            };
            barcodes.push(Barcode::new(id.trim(), sequence.trim()));
        }
        Ok(Self::new(barcodes, source_name)?)
    }

    /// Number of barcodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.barcodes.len()
    }

    /// Always false for a constructed set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.barcodes.is_empty()
    }

    /// Barcode at `index` in file order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Barcode> {
        self.barcodes.get(index)
    }

    /// Iterates barcodes in file order.
    pub fn iter(&self) -> std::slice::Iter<'_, Barcode> {
        self.barcodes.iter()
    }

    /// Lengths of the shortest and longest barcode.
    #[must_use]
    pub fn length_range(&self) -> (usize, usize) {
        let min = self.barcodes.iter().map(Barcode::len).min().unwrap_or(0);
        let max = self.barcodes.iter().map(Barcode::len).max().unwrap_or(0);
        (min, max)
    }
}

impl<'a> IntoIterator for &'a BarcodeSet {
    type Item = &'a Barcode;
    type IntoIter = std::slice::Iter<'a, Barcode>;

    fn into_iter(self) -> Self::IntoIter {
        self.barcodes.iter()
    }
}

pub(crate) fn validate_barcode(barcode: &Barcode) -> crate::errors::Result<()> {
    let invalid = |reason: &str| DemuxError::InvalidBarcode {
        id: barcode.id.clone(),
        reason: reason.to_string(),
    };

    if barcode.id.is_empty() {
        return Err(invalid("identity is empty"));
    }
    if barcode.id == UNKNOWN_ID {
        return Err(invalid("identity is reserved for unmatched reads"));
    }
    if barcode.id.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\') {
        return Err(invalid("identity must not contain whitespace or path separators"));
    }
    if barcode.sequence.is_empty() {
        return Err(invalid("sequence is empty"));
    }
    if !is_acgt(&barcode.sequence) {
        return Err(invalid(&format!(
            "sequence {} contains bases other than A, C, G and T",
            barcode.sequence_str()
        )));
    }
    Ok(())
}
