//! Output buckets: one per barcode plus one for unmatched reads.
//!
//! Every bucket is opened up front by [`BucketManager::provision`], before the first read is
//! processed, so a sink that cannot be created stops the run before any output is written.
//! Sinks come from a [`SinkFactory`]; [`FileSinkFactory`] names them
//! `<prefix>_<identity>_<R1|R2|il>.fastq[.gz]`.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::write::GzEncoder;
use log::debug;

use crate::barcode::UNKNOWN_ID;
use crate::fastq::ReadPair;

/// Which reads a sink receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    /// Forward reads
    R1,
    /// Reverse reads
    R2,
    /// Forward and reverse reads, alternating
    Interleaved,
}

impl SinkKind {
    /// File name suffix for this kind of sink.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            SinkKind::R1 => "R1",
            SinkKind::R2 => "R2",
            SinkKind::Interleaved => "il",
        }
    }
}

/// How many sinks each bucket has and what goes in them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// One sink of forward reads
    Single,
    /// Separate forward and reverse sinks
    Paired,
    /// One sink alternating forward and reverse reads
    Interleaved,
}

impl OutputLayout {
    /// Sinks opened for every bucket, in order.
    #[must_use]
    pub fn sink_kinds(self) -> &'static [SinkKind] {
        match self {
            OutputLayout::Single => &[SinkKind::R1],
            OutputLayout::Paired => &[SinkKind::R1, SinkKind::R2],
            OutputLayout::Interleaved => &[SinkKind::Interleaved],
        }
    }
}

/// A destination for FASTQ text that must be finished explicitly.
pub trait BucketSink: Write + Send {
    /// Flushes buffered data and writes any stream trailer.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying writer fails.
    fn finish(&mut self) -> io::Result<()>;
}

/// Creates the sinks for a bucket.
pub trait SinkFactory {
    /// Opens the sink of `kind` for the bucket named `bucket`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be created.
    fn create(&self, bucket: &str, kind: SinkKind) -> Result<Box<dyn BucketSink>>;
}

/// A FASTQ output file, optionally gzip-compressed.
pub enum FileSink {
    /// Uncompressed text
    Plain(BufWriter<File>),
    /// Gzip-compressed text
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileSink::Plain(w) => w.write(buf),
            FileSink::Gzip(w) => w.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            FileSink::Plain(w) => w.write_all(buf),
            FileSink::Gzip(w) => w.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileSink::Plain(w) => w.flush(),
            FileSink::Gzip(w) => w.flush(),
        }
    }
}

impl BucketSink for FileSink {
    fn finish(&mut self) -> io::Result<()> {
        match self {
            FileSink::Plain(w) => w.flush(),
            FileSink::Gzip(w) => {
                w.try_finish()?;
                w.get_mut().flush()
            }
        }
    }
}

/// Creates FASTQ files named from an output prefix.
#[derive(Debug, Clone)]
pub struct FileSinkFactory {
    prefix: PathBuf,
    compression_level: u32,
}

impl FileSinkFactory {
    /// `compression_level` 0 writes plain text; 1-9 writes gzip at that level.
    #[must_use]
    pub fn new(prefix: impl Into<PathBuf>, compression_level: u32) -> Self {
        Self { prefix: prefix.into(), compression_level }
    }

    /// Path of the sink of `kind` for `bucket`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bcdemux_lib::output::{FileSinkFactory, SinkKind};
    /// use std::path::PathBuf;
    ///
    /// let factory = FileSinkFactory::new("out/run1", 0);
    /// assert_eq!(factory.path_for("s1", SinkKind::R2), PathBuf::from("out/run1_s1_R2.fastq"));
    ///
    /// let gz = FileSinkFactory::new("out/run1", 6);
    /// assert_eq!(gz.path_for("unknown", SinkKind::R1), PathBuf::from("out/run1_unknown_R1.fastq.gz"));
    /// ```
    #[must_use]
    pub fn path_for(&self, bucket: &str, kind: SinkKind) -> PathBuf {
        let extension = if self.compression_level > 0 { "fastq.gz" } else { "fastq" };
        let mut name = self.prefix.clone().into_os_string();
        name.push(format!("_{bucket}_{}.{extension}", kind.suffix()));
        PathBuf::from(name)
    }

    fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
        }
        Ok(())
    }
}

impl SinkFactory for FileSinkFactory {
    fn create(&self, bucket: &str, kind: SinkKind) -> Result<Box<dyn BucketSink>> {
        let path = self.path_for(bucket, kind);
        Self::ensure_parent(&path)?;
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        let writer = BufWriter::new(file);
        debug!("Opened {}", path.display());

        Ok(if self.compression_level > 0 {
            Box::new(FileSink::Gzip(GzEncoder::new(
                writer,
                Compression::new(self.compression_level),
            )))
        } else {
            Box::new(FileSink::Plain(writer))
        })
    }
}

/// The sinks for one identity.
pub struct Bucket {
    id: String,
    layout: OutputLayout,
    sinks: Vec<Box<dyn BucketSink>>,
    written: u64,
}

impl Bucket {
    /// Bucket identity.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Read units written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Appends a read (or pair) to this bucket's sinks.
    ///
    /// # Errors
    ///
    /// Returns an error if the pair does not fit the layout or a write fails.
    pub fn write(&mut self, pair: &ReadPair) -> Result<()> {
        let result = match (self.layout, &pair.r2) {
            (OutputLayout::Single, None) => pair.r1.write_to(&mut self.sinks[0]),
            (OutputLayout::Paired, Some(r2)) => {
                pair.r1.write_to(&mut self.sinks[0]).and_then(|()| r2.write_to(&mut self.sinks[1]))
            }
            (OutputLayout::Interleaved, Some(r2)) => {
                pair.r1.write_to(&mut self.sinks[0]).and_then(|()| r2.write_to(&mut self.sinks[0]))
            }
            (layout, r2) => bail!(
                "Bucket {} has {layout:?} output but was given a {} read",
                self.id,
                if r2.is_some() { "paired" } else { "single-end" }
            ),
        };
        result.with_context(|| format!("Failed to write to bucket {}", self.id))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for sink in &mut self.sinks {
            sink.finish().with_context(|| format!("Failed to finish bucket {}", self.id))?;
        }
        Ok(())
    }
}

/// Owns every bucket: index `i` belongs to the `i`th identity, the last one to unmatched reads.
pub struct BucketManager {
    buckets: Vec<Bucket>,
}

impl BucketManager {
    /// Opens all sinks for every identity in `ids` and for the unknown bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if any sink cannot be created.
    pub fn provision<F: SinkFactory + ?Sized>(
        ids: &[&str],
        layout: OutputLayout,
        factory: &F,
    ) -> Result<Self> {
        let mut buckets = Vec::with_capacity(ids.len() + 1);
        for &id in ids.iter().chain(std::iter::once(&UNKNOWN_ID)) {
            let sinks = layout
                .sink_kinds()
                .iter()
                .map(|&kind| factory.create(id, kind))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("Failed to open output for bucket {id}"))?;
            buckets.push(Bucket { id: id.to_string(), layout, sinks, written: 0 });
        }
        Ok(Self { buckets })
    }

    /// The bucket for a barcode position, or the unknown bucket for `None`.
    pub fn bucket_for(&mut self, barcode: Option<usize>) -> &mut Bucket {
        let unknown = self.buckets.len() - 1;
        let index = barcode.filter(|&i| i < unknown).unwrap_or(unknown);
        &mut self.buckets[index]
    }

    /// Appends a read unit to the bucket for `barcode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn write(&mut self, barcode: Option<usize>, pair: &ReadPair) -> Result<()> {
        self.bucket_for(barcode).write(pair)
    }

    /// All buckets, barcodes first and unknown last.
    #[must_use]
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Flushes and closes every sink.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered.
    pub fn finish(mut self) -> Result<()> {
        for bucket in &mut self.buckets {
            bucket.finish()?;
        }
        Ok(())
    }
}
