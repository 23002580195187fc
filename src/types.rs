use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{Duration, NaiveDateTime};
use ndarray::Array2;

use crate::error::{DatasetError, Result};

/// 头部附加元数据的取值类型
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Text(s) => write!(f, "{}", s),
            MetaValue::Integer(i) => write!(f, "{}", i),
            MetaValue::Float(x) => write!(f, "{}", x),
            MetaValue::Bool(b) => write!(f, "{}", b),
            MetaValue::Null => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordingHeader {
    pub subject_id: String,
    pub start_time: NaiveDateTime,
    pub sampling_frequency: f64,      // Hz
    pub channel_names: Vec<String>,
    pub sample_count: usize,          // 每个通道的样本数
    pub extra: BTreeMap<String, MetaValue>,
}

impl RecordingHeader {
    /// 检查头部不变量
    pub fn validate(&self) -> Result<()> {
        if !self.sampling_frequency.is_finite() || self.sampling_frequency <= 0.0 {
            return Err(DatasetError::InvalidHeader(format!(
                "sampling frequency must be positive, got {}",
                self.sampling_frequency
            )));
        }

        if self.channel_names.is_empty() {
            return Err(DatasetError::InvalidHeader(
                "recording has no channels".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for name in &self.channel_names {
            if !seen.insert(name.as_str()) {
                return Err(DatasetError::InvalidHeader(format!(
                    "duplicate channel name: {}",
                    name
                )));
            }
        }

        Ok(())
    }

    /// 按名称查找通道索引
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channel_names.iter().position(|c| c == name)
    }

    /// 样本索引对应的绝对时刻
    pub fn time_at_sample(&self, sample: usize) -> NaiveDateTime {
        let nanos = (sample as f64 / self.sampling_frequency * 1e9).round() as i64;
        self.start_time + Duration::nanoseconds(nanos)
    }

    /// 记录总时长（秒）
    pub fn duration_seconds(&self) -> f64 {
        self.sample_count as f64 / self.sampling_frequency
    }
}

/// One rectangular block of samples returned by a read.
///
/// The buffer is channel-major: row `i` holds the samples of `channels[i]`,
/// columns run from `begsam` (inclusive) to `endsam` (exclusive). The resolved
/// sample span and the matching absolute timestamps are carried along so the
/// caller can audit what was actually read, whichever coordinate form the
/// request used.
#[derive(Debug, Clone)]
pub struct DataSlab {
    pub data: Array2<f64>,
    pub channels: Vec<String>,
    pub begsam: usize,
    pub endsam: usize,
    pub begtime: NaiveDateTime,
    pub endtime: NaiveDateTime,
}

impl DataSlab {
    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }
}

/// Which channels a read should return.
///
/// `All` expands to every channel in header order; `Names` is matched
/// exactly against the header labels, in the order given, duplicates kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSelection {
    All,
    Names(Vec<String>),
}

impl ChannelSelection {
    pub fn all() -> Self {
        ChannelSelection::All
    }

    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ChannelSelection::Names(names.into_iter().map(Into::into).collect())
    }
}

impl Default for ChannelSelection {
    fn default() -> Self {
        ChannelSelection::All
    }
}

/// One time span, in exactly one coordinate system.
///
/// All four forms resolve to the same half-open sample span
/// `[begsam, endsam)`; which one to use is the caller's convenience:
///
/// - `Samples`: absolute sample indices, used as-is.
/// - `Seconds`: seconds since the start of the recording.
/// - `Timestamps`: absolute wall-clock instants.
/// - `Durations`: offsets from the recording start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interval {
    Samples { begsam: i64, endsam: i64 },
    Seconds { begtime: f64, endtime: f64 },
    Timestamps { begtime: NaiveDateTime, endtime: NaiveDateTime },
    Durations { begtime: Duration, endtime: Duration },
}

impl Interval {
    pub fn samples(begsam: i64, endsam: i64) -> Self {
        Interval::Samples { begsam, endsam }
    }

    pub fn seconds(begtime: f64, endtime: f64) -> Self {
        Interval::Seconds { begtime, endtime }
    }

    pub fn timestamps(begtime: NaiveDateTime, endtime: NaiveDateTime) -> Self {
        Interval::Timestamps { begtime, endtime }
    }

    pub fn durations(begtime: Duration, endtime: Duration) -> Self {
        Interval::Durations { begtime, endtime }
    }
}
