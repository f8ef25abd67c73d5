//! FASTQ records, a recovering line-group reader, and paired read sources.
//!
//! [`FastqReader`] reads four lines at a time. A bad group (no `@` header, no `+` separator,
//! empty sequence, quality length mismatch) is reported once as
//! [`DemuxError::MalformedRecord`], after which the reader resynchronises on the next line that
//! starts with `@` and is followed two lines later by a line starting with `+`. The lines after
//! the bad header are searched too, so a record with a missing line costs only itself. I/O
//! failures end the stream.
//!
//! [`ReadSource`] turns one or two record streams into a stream of [`ReadPair`]s for
//! single-end, paired-end (two files in lockstep) or interleaved input.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use fgoxide::io::Io;

use crate::errors::DemuxError;
use crate::validation::validate_file_exists;

/// Buffer size for FASTQ input.
const BUFFER_SIZE: usize = 64 * 1024;

/// An owned FASTQ record. The header is stored without its leading `@`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FastqRecord {
    /// Header line without the `@`
    pub header: Vec<u8>,
    /// Bases
    pub seq: Vec<u8>,
    /// Quality string, same length as `seq`
    pub qual: Vec<u8>,
}

impl FastqRecord {
    /// Creates a record from its three parts.
    pub fn new(
        header: impl Into<Vec<u8>>,
        seq: impl Into<Vec<u8>>,
        qual: impl Into<Vec<u8>>,
    ) -> Self {
        Self { header: header.into(), seq: seq.into(), qual: qual.into() }
    }

    /// Removes the first `n` bases and quality scores (or all of them if shorter).
    pub fn trim_prefix(&mut self, n: usize) {
        self.seq.drain(..n.min(self.seq.len()));
        self.qual.drain(..n.min(self.qual.len()));
    }

    /// Writes the record as four lines.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(b"@")?;
        writer.write_all(&self.header)?;
        writer.write_all(b"\n")?;
        writer.write_all(&self.seq)?;
        writer.write_all(b"\n+\n")?;
        writer.write_all(&self.qual)?;
        writer.write_all(b"\n")
    }
}

/// A line number paired with the line's text, without its terminator.
type Line = (u64, Vec<u8>);

/// Reads FASTQ as groups of four lines, reporting bad groups without stopping.
pub struct FastqReader<R: BufRead> {
    reader: R,
    source_name: String,
    line: u64,
    lookahead: VecDeque<Line>,
    finished: bool,
}

impl<R: BufRead> FastqReader<R> {
    /// Wraps `reader`; `source_name` is used in error messages.
    pub fn new(reader: R, source_name: impl Into<String>) -> Self {
        Self {
            reader,
            source_name: source_name.into(),
            line: 0,
            lookahead: VecDeque::with_capacity(4),
            finished: false,
        }
    }

    /// Name used in error messages.
    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Reads one line from the input, bypassing the lookahead.
    fn read_line(&mut self) -> std::io::Result<Option<Line>> {
        let mut buf = Vec::new();
        if self.reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        self.line += 1;
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        Ok(Some((self.line, buf)))
    }

    /// The next line, taken from the lookahead first.
    fn next_line(&mut self) -> std::io::Result<Option<Line>> {
        match self.lookahead.pop_front() {
            Some(line) => Ok(Some(line)),
            None => self.read_line(),
        }
    }

    /// Drops lines until the lookahead starts with `@`, with a `+` line two lines later.
    ///
    /// Fewer than three remaining lines cannot hold a record and are dropped.
    fn resync(&mut self) -> std::io::Result<()> {
        loop {
            while self.lookahead.len() < 3 {
                match self.read_line()? {
                    Some(line) => self.lookahead.push_back(line),
                    None => {
                        self.lookahead.clear();
                        return Ok(());
                    }
                }
            }
            let starts = |i: usize, c: u8| self.lookahead[i].1.first() == Some(&c);
            if starts(0, b'@') && starts(2, b'+') {
                return Ok(());
            }
            self.lookahead.pop_front();
        }
    }

    fn malformed(&self, line: u64, reason: impl Into<String>) -> DemuxError {
        DemuxError::MalformedRecord {
            source_name: self.source_name.clone(),
            line,
            reason: reason.into(),
        }
    }

    fn read_record(&mut self) -> std::io::Result<Option<Result<FastqRecord, DemuxError>>> {
        let (start, mut header) = loop {
            match self.next_line()? {
                None => return Ok(None),
                Some((_, text)) if text.is_empty() => {}
                Some(line) => break line,
            }
        };

        let mut rest: [Line; 3] = Default::default();
        for slot in &mut rest {
            match self.next_line()? {
                Some(line) => *slot = line,
                None => {
                    self.finished = true;
                    return Ok(Some(Err(self.malformed(start, "truncated record at end of input"))));
                }
            }
        }

        let [(_, seq), (_, plus), (_, qual)] = &rest;
        let reason = if header.first() != Some(&b'@') {
            Some("header line does not start with '@'".to_string())
        } else if plus.first() != Some(&b'+') {
            Some("separator line does not start with '+'".to_string())
        } else if seq.is_empty() {
            Some("empty sequence".to_string())
        } else if seq.len() != qual.len() {
            Some(format!("sequence length {} != quality length {}", seq.len(), qual.len()))
        } else {
            None
        };

        if let Some(reason) = reason {
            for line in rest.into_iter().rev() {
                self.lookahead.push_front(line);
            }
            self.resync()?;
            return Ok(Some(Err(self.malformed(start, reason))));
        }

        let [(_, seq), _, (_, qual)] = rest;
        header.remove(0);
        Ok(Some(Ok(FastqRecord { header, seq, qual })))
    }
}

impl<R: BufRead> Iterator for FastqReader<R> {
    type Item = Result<FastqRecord, DemuxError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.read_record().unwrap_or_else(|e| Some(Err(e.into())));
        match &item {
            None => self.finished = true,
            Some(Err(e)) if !e.is_recoverable() => self.finished = true,
            _ => {}
        }
        item
    }
}

/// Opens a FASTQ file, plain or gzip-compressed.
///
/// # Errors
///
/// Returns an error if the file does not exist or cannot be opened.
pub fn open_fastq(path: &Path) -> Result<FastqReader<Box<dyn BufRead + Send>>> {
    validate_file_exists(path, "Input FASTQ")?;
    let reader: Box<dyn BufRead + Send> = Io::new(5, BUFFER_SIZE)
        .new_reader(path)
        .with_context(|| format!("Failed to open FASTQ: {}", path.display()))?;
    Ok(FastqReader::new(reader, path.display().to_string()))
}

/// A forward read and, for paired input, its mate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPair {
    /// Forward read; carries the barcode
    pub r1: FastqRecord,
    /// Reverse read, absent for single-end input
    pub r2: Option<FastqRecord>,
}

/// How reads arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// One stream of forward reads
    Single,
    /// Two streams read in lockstep
    Paired,
    /// One stream alternating forward and reverse reads
    Interleaved,
}

impl InputLayout {
    /// True when each unit carries a reverse read.
    #[must_use]
    pub fn is_paired(self) -> bool {
        !matches!(self, InputLayout::Single)
    }
}

/// Yields [`ReadPair`]s from one or two record streams.
///
/// Each item is either a complete pair, a recoverable malformed-record error covering the
/// whole unit, or a fatal error after which the stream should not be polled again.
pub struct ReadSource<I> {
    layout: InputLayout,
    r1: I,
    r2: Option<I>,
    r1_name: String,
    r2_name: String,
    records: u64,
}

impl<I> ReadSource<I>
where
    I: Iterator<Item = Result<FastqRecord, DemuxError>>,
{
    /// Single-end reads.
    pub fn single(reads: I) -> Self {
        Self::build(InputLayout::Single, reads, None)
    }

    /// Paired reads from two streams that must have the same number of records.
    pub fn paired(r1: I, r2: I) -> Self {
        Self::build(InputLayout::Paired, r1, Some(r2))
    }

    /// Paired reads alternating in one stream.
    pub fn interleaved(reads: I) -> Self {
        Self::build(InputLayout::Interleaved, reads, None)
    }

    fn build(layout: InputLayout, r1: I, r2: Option<I>) -> Self {
        let r1_name = if layout == InputLayout::Interleaved { "interleaved input" } else { "R1" };
        Self { layout, r1, r2, r1_name: r1_name.to_string(), r2_name: "R2".to_string(), records: 0 }
    }

    /// Replaces the names used in error messages.
    #[must_use]
    pub fn with_names(mut self, r1_name: impl Into<String>, r2_name: impl Into<String>) -> Self {
        self.r1_name = r1_name.into();
        self.r2_name = r2_name.into();
        self
    }

    /// The input layout.
    #[must_use]
    pub fn layout(&self) -> InputLayout {
        self.layout
    }

    fn next_paired(&mut self) -> Option<Result<ReadPair, DemuxError>> {
        let first = self.r1.next();
        let second = self.r2.as_mut().and_then(Iterator::next);
        match (first, second) {
            (None, None) => None,
            (Some(Err(e)), _) if !e.is_recoverable() => Some(Err(e)),
            (_, Some(Err(e))) if !e.is_recoverable() => Some(Err(e)),
            (Some(_), None) => Some(Err(DemuxError::PairedLengthMismatch {
                shorter: self.r2_name.clone(),
                longer: self.r1_name.clone(),
                records: self.records,
            })),
            (None, Some(_)) => Some(Err(DemuxError::PairedLengthMismatch {
                shorter: self.r1_name.clone(),
                longer: self.r2_name.clone(),
                records: self.records,
            })),
            (Some(a), Some(b)) => {
                self.records += 1;
                Some(combine(a, Some(b)))
            }
        }
    }

    fn next_interleaved(&mut self) -> Option<Result<ReadPair, DemuxError>> {
        let first = self.r1.next()?;
        self.records += 1;
        if first.as_ref().is_err_and(|e| !e.is_recoverable()) {
            return Some(first.map(|r1| ReadPair { r1, r2: None }));
        }
        let Some(second) = self.r1.next() else {
            return Some(match first {
                Err(e) => Err(e),
                Ok(_) => Err(DemuxError::UnpairedInterleavedRecord {
                    source_name: self.r1_name.clone(),
                    records: self.records,
                }),
            });
        };
        self.records += 1;
        Some(combine(first, Some(second)))
    }
}

impl<I> Iterator for ReadSource<I>
where
    I: Iterator<Item = Result<FastqRecord, DemuxError>>,
{
    type Item = Result<ReadPair, DemuxError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.layout {
            InputLayout::Single => {
                let item = self.r1.next()?;
                self.records += 1;
                Some(combine(item, None))
            }
            InputLayout::Paired => self.next_paired(),
            InputLayout::Interleaved => self.next_interleaved(),
        }
    }
}

/// Joins two record results into one unit, preferring a fatal error over a malformed record.
fn combine(
    r1: Result<FastqRecord, DemuxError>,
    r2: Option<Result<FastqRecord, DemuxError>>,
) -> Result<ReadPair, DemuxError> {
    match (r1, r2) {
        (Ok(r1), None) => Ok(ReadPair { r1, r2: None }),
        (Ok(r1), Some(Ok(r2))) => Ok(ReadPair { r1, r2: Some(r2) }),
        (Err(e), Some(Err(f))) if e.is_recoverable() => Err(f),
        (Err(e), _) | (_, Some(Err(e))) => Err(e),
    }
}
