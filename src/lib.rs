//! # eegio
//!
//! Format-agnostic reading of EEG/iEEG recordings with time-indexed random
//! access and slab caching.
//!
//! Recordings come in many on-disk formats; this library hides the
//! differences behind a single [`Dataset`] facade. Opening a path probes the
//! supported formats in a fixed order, and [`Dataset::read_data`] serves any
//! span of samples as a channels-by-samples block of physical values,
//! addressed in whichever time coordinate is at hand. Blocks are cached, so
//! scrolling back and forth over the same spans does not re-read the file.
//!
//! ## Quick Start
//!
//! ```rust
//! use eegio::{ChannelSelection, Dataset, Interval, Result};
//!
//! fn main() -> Result<()> {
//!     # // Create a test recording first
//!     # eegio::fixtures::create_edf_file("quickstart.edf")?;
//!     // Open a recording; the format is detected automatically
//!     let mut dataset = Dataset::open("quickstart.edf")?;
//!
//!     let header = dataset.header();
//!     println!("Subject: {}", header.subject_id);
//!     println!("Channels: {:?}", header.channel_names);
//!     println!("Duration: {:.2} seconds", header.duration_seconds());
//!
//!     // Second 2 to second 3, one channel
//!     let slab = dataset.read_data(
//!         &ChannelSelection::names(["MFD1"]),
//!         Interval::Seconds { begtime: 2.0, endtime: 3.0 },
//!     )?;
//!     assert_eq!(slab.data.dim(), (1, 512));
//!
//!     # std::fs::remove_file("quickstart.edf").ok();
//!     Ok(())
//! }
//! ```
//!
//! ## Addressing time
//!
//! The same span can be requested in four coordinate forms; each resolves to
//! the same half-open sample interval and therefore to the same cache entry:
//!
//! ```rust
//! use chrono::Duration;
//! use eegio::{ChannelSelection, Dataset, Interval};
//!
//! # // Create a test recording first
//! # eegio::fixtures::create_edf_file("addressing.edf")?;
//! let mut dataset = Dataset::open("addressing.edf")?;
//! let start = dataset.header().start_time;
//!
//! let a = dataset.read_data(
//!     &ChannelSelection::All,
//!     Interval::Samples { begsam: 0, endsam: 512 },
//! )?;
//! let b = dataset.read_data(
//!     &ChannelSelection::All,
//!     Interval::Seconds { begtime: 0.0, endtime: 1.0 },
//! )?;
//! let c = dataset.read_data(
//!     &ChannelSelection::All,
//!     Interval::Timestamps {
//!         begtime: start,
//!         endtime: start + Duration::seconds(1),
//!     },
//! )?;
//! let d = dataset.read_data(
//!     &ChannelSelection::All,
//!     Interval::Durations {
//!         begtime: Duration::zero(),
//!         endtime: Duration::seconds(1),
//!     },
//! )?;
//!
//! // 同一块数据，文件只读了一次
//! assert!(std::sync::Arc::ptr_eq(&a, &b));
//! assert!(std::sync::Arc::ptr_eq(&a, &c));
//! assert!(std::sync::Arc::ptr_eq(&a, &d));
//!
//! # std::fs::remove_file("addressing.edf").ok();
//! # Ok::<(), eegio::DatasetError>(())
//! ```
//!
//! ## Beyond the built-in formats
//!
//! EDF/EDF+C and BrainVision readers are built in. Recordings in other
//! formats plug in through the [`FormatReader`] trait and
//! [`Dataset::from_reader`], and get the same addressing and caching
//! behavior for free.

pub mod dataset;
pub mod error;
pub mod formats;
pub mod types;

#[doc(hidden)]
pub mod fixtures; // For doctest and integration-test recordings

// Re-export main types for convenience
pub use dataset::{Dataset, DatasetConfig};
pub use error::{DatasetError, Result};
pub use formats::FormatReader;
pub use types::{ChannelSelection, DataSlab, Interval, MetaValue, RecordingHeader};

/// Library version
///
/// # Examples
///
/// ```rust
/// let version = eegio::version();
/// assert!(!version.is_empty());
/// assert!(version.contains('.'));
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
