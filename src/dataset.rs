use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{DatasetError, Result};
use crate::formats::{self, FormatReader};
use crate::types::{ChannelSelection, DataSlab, Interval, RecordingHeader};

/// Cache tuning for a [`Dataset`].
///
/// The default keeps every slab until [`Dataset::clear_cache`]; both limits
/// are opt-in and fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct DatasetConfig {
    /// Upper bound on cached slabs; when full, the oldest entry is evicted.
    /// `Some(0)` disables caching entirely.
    pub max_cache_entries: Option<usize>,
    /// Entries older than this are re-read instead of served from cache.
    pub cache_ttl: Option<Duration>,
}

/// 缓存键：解析后的通道序号加上样本区间
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    channels: Vec<usize>,
    begsam: usize,
    endsam: usize,
}

struct CacheEntry {
    slab: Arc<DataSlab>,
    inserted_at: Instant,
    /// 单调递增的插入序号，最小的最老
    seq: u64,
}

/// Format-agnostic access to an EEG/iEEG recording.
///
/// `Dataset` probes the on-disk format, parses the header once, and serves
/// blocks of samples through [`read_data`](Dataset::read_data). Requested
/// spans can be expressed in sample indices, elapsed seconds, absolute
/// timestamps, or durations from the recording start; every form resolves
/// to the same half-open sample span `[begsam, endsam)`, and resolved
/// blocks are cached so repeated requests do not touch the file again.
///
/// # Examples
///
/// ```rust
/// use eegio::{ChannelSelection, Dataset, Interval};
///
/// # // Generate a test file (hidden from docs)
/// # eegio::fixtures::create_edf_file("facade_demo.edf")?;
/// #
/// let mut dataset = Dataset::open("facade_demo.edf")?;
/// println!("subject: {}", dataset.header().subject_id);
///
/// // 头两个通道的第一秒
/// let slab = dataset.read_data(
///     &ChannelSelection::names(["MFD1", "MFD2"]),
///     Interval::Seconds { begtime: 0.0, endtime: 1.0 },
/// )?;
/// assert_eq!(slab.data.dim(), (2, 512));
///
/// # std::fs::remove_file("facade_demo.edf").ok();
/// # Ok::<(), eegio::DatasetError>(())
/// ```
pub struct Dataset {
    reader: Box<dyn FormatReader>,
    header: RecordingHeader,
    config: DatasetConfig,
    cache: HashMap<CacheKey, CacheEntry>,
    next_seq: u64,
}

// reader是trait对象，无法派生Debug
impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("format", &self.reader.format())
            .field("header", &self.header)
            .field("config", &self.config)
            .field("cache_len", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl Dataset {
    /// Opens a recording, probing each supported format in a fixed order.
    ///
    /// Equivalent to [`open_with_config`](Dataset::open_with_config) with
    /// the default (unbounded) cache.
    ///
    /// # Errors
    ///
    /// * [`DatasetError::FileNotFound`] - the path does not exist
    /// * [`DatasetError::UnrecognizedFormat`] - no supported format claims
    ///   the path
    /// * [`DatasetError::InvalidHeader`] - a format claimed the path but its
    ///   header is malformed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, DatasetConfig::default())
    }

    /// Opens a recording with explicit cache limits.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use eegio::{Dataset, DatasetConfig};
    ///
    /// # // Generate a test file (hidden from docs)
    /// # eegio::fixtures::create_edf_file("facade_config_demo.edf")?;
    /// #
    /// let config = DatasetConfig {
    ///     max_cache_entries: Some(32),
    ///     cache_ttl: Some(Duration::from_secs(600)),
    /// };
    /// let dataset = Dataset::open_with_config("facade_config_demo.edf", config)?;
    /// assert_eq!(dataset.cache_len(), 0);
    ///
    /// # std::fs::remove_file("facade_config_demo.edf").ok();
    /// # Ok::<(), eegio::DatasetError>(())
    /// ```
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: DatasetConfig) -> Result<Self> {
        let reader = formats::open_recording(path)?;
        Self::from_boxed(reader, config)
    }

    /// Wraps an already-constructed reader, bypassing format probing.
    ///
    /// This is how recordings in formats outside the built-in probe list get
    /// the same slicing and caching behavior: implement [`FormatReader`] and
    /// hand the reader over.
    pub fn from_reader<R: FormatReader + 'static>(reader: R) -> Result<Self> {
        Self::from_reader_with_config(reader, DatasetConfig::default())
    }

    /// Wraps an already-constructed reader with explicit cache limits.
    pub fn from_reader_with_config<R: FormatReader + 'static>(
        reader: R,
        config: DatasetConfig,
    ) -> Result<Self> {
        Self::from_boxed(Box::new(reader), config)
    }

    fn from_boxed(reader: Box<dyn FormatReader>, config: DatasetConfig) -> Result<Self> {
        // 头部在构造时克隆并检查一次，之后只读
        let header = reader.header().clone();
        header.validate()?;

        Ok(Dataset {
            reader,
            header,
            config,
            cache: HashMap::new(),
            next_seq: 0,
        })
    }

    /// The parsed recording header.
    pub fn header(&self) -> &RecordingHeader {
        &self.header
    }

    /// Short name of the format that claimed the recording.
    pub fn format(&self) -> &'static str {
        self.reader.format()
    }

    /// Reads a block of samples for the selected channels.
    ///
    /// The span may be given in any [`Interval`] form; seconds, timestamps
    /// and durations are converted to sample indices by rounding
    /// `seconds * sampling_frequency` to the nearest integer. The resolved
    /// span must satisfy `0 <= begsam < endsam <= sample_count`.
    ///
    /// The returned slab has one row per entry of the selection, in the
    /// order given (a repeated name yields a repeated row), and
    /// `endsam - begsam` columns. Identical requests are served from the
    /// cache: the same [`Arc`] is returned and the file is not read again,
    /// no matter which coordinate form produced the span.
    ///
    /// # Errors
    ///
    /// * [`DatasetError::ChannelNotFound`] - a selected name is not in the
    ///   header
    /// * [`DatasetError::InvalidChannelSelection`] - empty or blank selection
    /// * [`DatasetError::InvalidInterval`] - a time coordinate is NaN or
    ///   infinite
    /// * [`DatasetError::SampleSpanOutOfRange`] - `begsam >= endsam`, or the
    ///   span reaches outside `[0, sample_count]`
    /// * [`DatasetError::ReadFailed`] - the underlying reader failed
    ///
    /// # Examples
    ///
    /// ```rust
    /// use eegio::{ChannelSelection, Dataset, Interval};
    ///
    /// # // Generate a test file (hidden from docs)
    /// # eegio::fixtures::create_edf_file("facade_read_demo.edf")?;
    /// #
    /// let mut dataset = Dataset::open("facade_read_demo.edf")?;
    ///
    /// // 同一个区间的四种写法
    /// let by_sample = dataset.read_data(
    ///     &ChannelSelection::All,
    ///     Interval::Samples { begsam: 512, endsam: 1024 },
    /// )?;
    /// let by_seconds = dataset.read_data(
    ///     &ChannelSelection::All,
    ///     Interval::Seconds { begtime: 1.0, endtime: 2.0 },
    /// )?;
    ///
    /// // 第二次命中缓存，返回同一块数据
    /// assert!(std::sync::Arc::ptr_eq(&by_sample, &by_seconds));
    ///
    /// # std::fs::remove_file("facade_read_demo.edf").ok();
    /// # Ok::<(), eegio::DatasetError>(())
    /// ```
    pub fn read_data(
        &mut self,
        channels: &ChannelSelection,
        interval: Interval,
    ) -> Result<Arc<DataSlab>> {
        let indices = self.resolve_channels(channels)?;
        let (begsam, endsam) = self.resolve_interval(interval)?;

        let key = CacheKey {
            channels: indices,
            begsam,
            endsam,
        };

        // TTL在查询时惰性检查
        if let Some(ttl) = self.config.cache_ttl {
            if let Some(entry) = self.cache.get(&key) {
                if entry.inserted_at.elapsed() >= ttl {
                    self.cache.remove(&key);
                }
            }
        }

        if let Some(entry) = self.cache.get(&key) {
            log::debug!(
                "cache hit for channels {:?}, samples [{}, {})",
                key.channels,
                begsam,
                endsam
            );
            return Ok(Arc::clone(&entry.slab));
        }

        let data = self.reader.read_samples(&key.channels, begsam, endsam)?;

        let slab = Arc::new(DataSlab {
            data,
            channels: key
                .channels
                .iter()
                .map(|&i| self.header.channel_names[i].clone())
                .collect(),
            begsam,
            endsam,
            begtime: self.header.time_at_sample(begsam),
            endtime: self.header.time_at_sample(endsam),
        });

        self.insert(key, Arc::clone(&slab));
        Ok(slab)
    }

    /// Drops every cached slab. Outstanding [`Arc`]s stay valid.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Number of slabs currently cached.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn resolve_channels(&self, selection: &ChannelSelection) -> Result<Vec<usize>> {
        match selection {
            ChannelSelection::All => Ok((0..self.header.channel_names.len()).collect()),
            ChannelSelection::Names(names) => {
                if names.is_empty() {
                    return Err(DatasetError::InvalidChannelSelection(
                        "empty channel list".to_string(),
                    ));
                }

                let mut indices = Vec::with_capacity(names.len());
                for name in names {
                    if name.trim().is_empty() {
                        return Err(DatasetError::InvalidChannelSelection(
                            "blank channel name".to_string(),
                        ));
                    }
                    let index = self
                        .header
                        .channel_index(name)
                        .ok_or_else(|| DatasetError::ChannelNotFound(name.clone()))?;
                    indices.push(index);
                }
                Ok(indices)
            }
        }
    }

    /// 四种坐标先统一换算成样本号，再做一次范围检查
    fn resolve_interval(&self, interval: Interval) -> Result<(usize, usize)> {
        let sampling_frequency = self.header.sampling_frequency;
        let start_time = self.header.start_time;

        let (begsam, endsam) = match interval {
            Interval::Samples { begsam, endsam } => (begsam, endsam),
            Interval::Seconds { begtime, endtime } => (
                seconds_to_sample(begtime, sampling_frequency)?,
                seconds_to_sample(endtime, sampling_frequency)?,
            ),
            Interval::Timestamps { begtime, endtime } => (
                seconds_to_sample(duration_seconds(begtime - start_time), sampling_frequency)?,
                seconds_to_sample(duration_seconds(endtime - start_time), sampling_frequency)?,
            ),
            Interval::Durations { begtime, endtime } => (
                seconds_to_sample(duration_seconds(begtime), sampling_frequency)?,
                seconds_to_sample(duration_seconds(endtime), sampling_frequency)?,
            ),
        };

        let sample_count = self.header.sample_count;
        let in_range = |s: i64| s >= 0 && s <= sample_count as i64;
        if begsam >= endsam || !in_range(begsam) || !in_range(endsam) {
            return Err(DatasetError::SampleSpanOutOfRange {
                begsam,
                endsam,
                sample_count,
            });
        }

        Ok((begsam as usize, endsam as usize))
    }

    fn insert(&mut self, key: CacheKey, slab: Arc<DataSlab>) {
        if let Some(max) = self.config.max_cache_entries {
            if max == 0 {
                return;
            }
            while self.cache.len() >= max {
                self.evict_oldest();
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.cache.insert(
            key,
            CacheEntry {
                slab,
                inserted_at: Instant::now(),
                seq,
            },
        );
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .cache
            .iter()
            .min_by_key(|(_, entry)| entry.seq)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            log::debug!(
                "cache full, evicting channels {:?}, samples [{}, {})",
                key.channels,
                key.begsam,
                key.endsam
            );
            self.cache.remove(&key);
        }
    }
}

/// 秒数换算成最近的样本号；NaN和无穷大当作非法区间拒绝
fn seconds_to_sample(seconds: f64, sampling_frequency: f64) -> Result<i64> {
    if !seconds.is_finite() {
        return Err(DatasetError::InvalidInterval(format!(
            "time coordinate {} is not finite",
            seconds
        )));
    }
    Ok((seconds * sampling_frequency).round() as i64)
}

/// chrono时长换算成秒，保留亚秒部分
fn duration_seconds(duration: chrono::Duration) -> f64 {
    duration.num_seconds() as f64 + duration.subsec_nanos() as f64 * 1e-9
}
