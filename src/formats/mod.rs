use std::path::Path;

use ndarray::Array2;

use crate::error::{DatasetError, Result};
use crate::types::RecordingHeader;

pub mod brainvision;
pub mod edf;

pub use brainvision::BrainVisionReader;
pub use edf::EdfReader;

/// Uniform capability contract over on-disk recording formats.
///
/// A format reader hides one format's binary/directory layout behind two
/// operations: the header parsed at open time, and rectangular sample
/// extraction. Opening is format-specific (each reader has its own `open`
/// constructor); a path that does not look like the reader's format fails
/// with [`DatasetError::UnrecognizedFormat`], which is how
/// [`open_recording`] decides which reader owns a path.
///
/// Implementations outside this crate are supported: anything implementing
/// this trait can back a [`Dataset`](crate::Dataset) via
/// [`Dataset::from_reader`](crate::Dataset::from_reader).
pub trait FormatReader {
    /// Short format name for logs and diagnostics.
    fn format(&self) -> &'static str;

    /// Header parsed when the reader was opened.
    fn header(&self) -> &RecordingHeader;

    /// Reads the half-open sample span `[begsam, endsam)` for the given
    /// channels.
    ///
    /// `channels` holds zero-based positions into the header's
    /// `channel_names`; the returned buffer is channel-major with one row
    /// per requested channel, in request order, and `endsam - begsam`
    /// columns. Span bounds are validated by the caller; readers still
    /// check channel indices and report I/O failures as
    /// [`DatasetError::ReadFailed`].
    fn read_samples(
        &mut self,
        channels: &[usize],
        begsam: usize,
        endsam: usize,
    ) -> Result<Array2<f64>>;
}

type ProbeFn = fn(&Path) -> Result<Box<dyn FormatReader>>;

fn probe_edf(path: &Path) -> Result<Box<dyn FormatReader>> {
    Ok(Box::new(EdfReader::open(path)?))
}

fn probe_brainvision(path: &Path) -> Result<Box<dyn FormatReader>> {
    Ok(Box::new(BrainVisionReader::open(path)?))
}

// 探测顺序固定，保证同一输入总是选中同一格式
const PROBES: &[(&str, ProbeFn)] = &[
    ("EDF", probe_edf),
    ("BrainVision", probe_brainvision),
];

/// Opens a recording of unknown format by probing every known reader.
///
/// Readers are tried in a fixed order (EDF, then BrainVision). A reader
/// that rejects the path with `UnrecognizedFormat` passes the turn to the
/// next one; any other error (I/O failure, corrupt header, unsupported
/// variant of a recognized format) aborts the probe and propagates. If no
/// reader accepts the path, the result is `UnrecognizedFormat` naming it.
///
/// A path that does not exist at all fails with `FileNotFound` instead,
/// so callers can tell a typo from a genuinely unknown format.
///
/// # Examples
///
/// ```rust
/// use eegio::formats::open_recording;
///
/// # // Generate test file (hidden from docs)
/// # eegio::fixtures::create_edf_file("probe_demo.edf")?;
/// #
/// let reader = open_recording("probe_demo.edf")?;
/// println!("format: {}", reader.format());
/// println!("channels: {}", reader.header().channel_names.len());
///
/// # std::fs::remove_file("probe_demo.edf").ok();
/// # Ok::<(), eegio::DatasetError>(())
/// ```
pub fn open_recording<P: AsRef<Path>>(path: P) -> Result<Box<dyn FormatReader>> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(DatasetError::FileNotFound(path.display().to_string()));
    }

    for (name, probe) in PROBES {
        match probe(path) {
            Ok(reader) => {
                log::debug!("{} opened as {}", path.display(), name);
                return Ok(reader);
            }
            Err(DatasetError::UnrecognizedFormat(reason)) => {
                log::debug!("{} is not {}: {}", path.display(), name, reason);
            }
            Err(e) => return Err(e),
        }
    }

    Err(DatasetError::UnrecognizedFormat(path.display().to_string()))
}
