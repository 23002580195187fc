use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use ndarray::Array2;

use crate::error::{DatasetError, Result};
use crate::formats::FormatReader;
use crate::types::{MetaValue, RecordingHeader};

const VHDR_MAGIC: &str = "Brain Vision Data Exchange Header File";

/// Reader for BrainVision recordings (`.vhdr`/`.vmrk`/`.eeg` triplets).
///
/// The `.vhdr` text header names the other two files and describes the
/// binary layout; samples live in the `.eeg` file as multiplexed
/// little-endian 16-bit integers scaled by a per-channel resolution; the
/// recording start time comes from the `New Segment` marker in `.vmrk`.
/// Only the `BINARY`/`MULTIPLEXED`/`INT_16` layout is supported.
///
/// Opening accepts either the `.vhdr` path itself or a directory that
/// contains exactly one `.vhdr`.
///
/// # Examples
///
/// ```rust
/// use eegio::formats::{BrainVisionReader, FormatReader};
///
/// # // Generate test files (hidden from docs)
/// # eegio::fixtures::create_brainvision_set("bv_demo", "session1")?;
/// #
/// let mut reader = BrainVisionReader::open("bv_demo/session1.vhdr")?;
///
/// assert_eq!(reader.header().sampling_frequency, 500.0);
/// assert_eq!(reader.header().channel_names, ["Fp1", "Fp2", "Cz"]);
///
/// let block = reader.read_samples(&[0, 2], 0, 100)?;
/// assert_eq!(block.dim(), (2, 100));
///
/// # std::fs::remove_dir_all("bv_demo").ok();
/// # Ok::<(), eegio::DatasetError>(())
/// ```
#[derive(Debug)]
pub struct BrainVisionReader {
    data_file: BufReader<File>,
    header: RecordingHeader,
    /// 每个通道的原始值乘数
    resolutions: Vec<f64>,
    n_channels: usize,
}

#[derive(Debug, Default)]
struct VhdrFields {
    data_file: Option<String>,
    marker_file: Option<String>,
    data_format: String,
    data_orientation: String,
    binary_format: String,
    num_channels: usize,
    sampling_interval_us: f64,
    /// 通道名称和分辨率，按头部顺序
    channels: Vec<(String, f64)>,
}

impl BrainVisionReader {
    /// Opens a BrainVision recording.
    ///
    /// # Errors
    ///
    /// * [`DatasetError::FileNotFound`] - the path does not exist
    /// * [`DatasetError::UnrecognizedFormat`] - the file lacks the Brain
    ///   Vision signature line, or the directory contains no `.vhdr`
    /// * [`DatasetError::Unsupported`] - a recognized header asking for a
    ///   layout other than `BINARY`/`MULTIPLEXED`/`INT_16`
    /// * [`DatasetError::InvalidHeader`] - missing `DataFile`, channel list
    ///   disagreeing with `NumberOfChannels`, bad `SamplingInterval`, or a
    ///   missing data file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DatasetError::FileNotFound(path.display().to_string()));
        }

        let vhdr_path = Self::locate_vhdr(path)?;
        let bytes = fs::read(&vhdr_path)?;
        let content = String::from_utf8_lossy(&bytes);
        let content = content.trim_start_matches('\u{feff}');

        let first_line = content.lines().next().unwrap_or("").trim();
        if !first_line.starts_with(VHDR_MAGIC) {
            return Err(DatasetError::UnrecognizedFormat(format!(
                "{} does not start with the Brain Vision signature",
                vhdr_path.display()
            )));
        }

        let fields = Self::parse_vhdr(content);

        if !fields.data_format.eq_ignore_ascii_case("BINARY") {
            return Err(DatasetError::Unsupported(format!(
                "only BINARY BrainVision data is supported, got {:?}",
                fields.data_format
            )));
        }
        if !fields.data_orientation.eq_ignore_ascii_case("MULTIPLEXED") {
            return Err(DatasetError::Unsupported(format!(
                "only MULTIPLEXED orientation is supported, got {:?}",
                fields.data_orientation
            )));
        }
        if !fields.binary_format.eq_ignore_ascii_case("INT_16") {
            return Err(DatasetError::Unsupported(format!(
                "only INT_16 binary format is supported, got {:?}",
                fields.binary_format
            )));
        }

        if fields.num_channels == 0 {
            return Err(DatasetError::InvalidHeader(
                "header declares no channels".to_string(),
            ));
        }
        if fields.channels.len() != fields.num_channels {
            return Err(DatasetError::InvalidHeader(format!(
                "channel list has {} entries, header says {}",
                fields.channels.len(),
                fields.num_channels
            )));
        }
        if !fields.sampling_interval_us.is_finite() || fields.sampling_interval_us <= 0.0 {
            return Err(DatasetError::InvalidHeader(format!(
                "bad sampling interval: {}",
                fields.sampling_interval_us
            )));
        }

        let data_file = fields.data_file.as_deref().ok_or_else(|| {
            DatasetError::InvalidHeader("header names no DataFile".to_string())
        })?;
        let parent = vhdr_path.parent().unwrap_or_else(|| Path::new("."));
        let data_path = parent.join(data_file);
        if !data_path.exists() {
            return Err(DatasetError::InvalidHeader(format!(
                "data file not found: {}",
                data_path.display()
            )));
        }

        // 标记文件可选，开始时间取自New Segment标记
        let mut start_time = None;
        let mut n_markers = 0usize;
        if let Some(marker_name) = &fields.marker_file {
            let marker_path = parent.join(marker_name);
            if marker_path.exists() {
                let bytes = fs::read(&marker_path)?;
                let marker_content = String::from_utf8_lossy(&bytes);
                let (t, n) = Self::parse_vmrk(&marker_content);
                start_time = t;
                n_markers = n;
            } else {
                log::warn!("marker file not found: {}", marker_path.display());
            }
        }
        let start_time = start_time.unwrap_or_else(|| {
            log::warn!(
                "{}: no New Segment marker, start time unknown",
                vhdr_path.display()
            );
            NaiveDateTime::default()
        });

        let n_channels = fields.num_channels;
        let file_size = fs::metadata(&data_path)?.len();
        let sample_count = file_size as usize / (2 * n_channels);

        let subject_id = vhdr_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut extra = BTreeMap::new();
        extra.insert(
            "data_file".to_string(),
            MetaValue::Text(data_file.to_string()),
        );
        extra.insert(
            "marker_count".to_string(),
            MetaValue::Integer(n_markers as i64),
        );
        extra.insert(
            "sampling_interval_us".to_string(),
            MetaValue::Float(fields.sampling_interval_us),
        );

        let (channel_names, resolutions): (Vec<String>, Vec<f64>) =
            fields.channels.into_iter().unzip();

        let header = RecordingHeader {
            subject_id,
            start_time,
            sampling_frequency: 1e6 / fields.sampling_interval_us,
            channel_names,
            sample_count,
            extra,
        };

        log::debug!(
            "{}: BrainVision with {} channels, {} samples at {} Hz",
            vhdr_path.display(),
            n_channels,
            sample_count,
            header.sampling_frequency
        );

        let data_file = BufReader::new(File::open(&data_path)?);

        Ok(BrainVisionReader {
            data_file,
            header,
            resolutions,
            n_channels,
        })
    }

    /// 文件路径直接使用；目录里必须恰好有一个.vhdr
    fn locate_vhdr(path: &Path) -> Result<PathBuf> {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }

        let mut found = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let p = entry.path();
            let is_vhdr = p
                .extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("vhdr"));
            if is_vhdr {
                found.push(p);
            }
        }

        match found.len() {
            0 => Err(DatasetError::UnrecognizedFormat(format!(
                "{} contains no .vhdr header",
                path.display()
            ))),
            1 => Ok(found.remove(0)),
            n => Err(DatasetError::Unsupported(format!(
                "{} contains {} .vhdr headers",
                path.display(),
                n
            ))),
        }
    }

    /// 逐行解析INI风格的头部
    fn parse_vhdr(content: &str) -> VhdrFields {
        let mut fields = VhdrFields::default();
        let mut in_channel_section = false;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }

            if line.starts_with("[Channel Infos]") {
                in_channel_section = true;
                continue;
            } else if line.starts_with('[') {
                in_channel_section = false;
            }

            if in_channel_section && line.starts_with("Ch") {
                // Ch<N>=<Name>,<Reference>,<Resolution>,<Unit>
                if let Some(eq) = line.find('=') {
                    let mut parts = line[eq + 1..].split(',');
                    let name = parts.next().unwrap_or("").trim().to_string();
                    let _reference = parts.next();
                    let resolution = parts
                        .next()
                        .and_then(|r| r.trim().parse::<f64>().ok())
                        .unwrap_or(1.0);
                    fields.channels.push((name, resolution));
                }
            } else if let Some(value) = line.strip_prefix("DataFile=") {
                fields.data_file = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("MarkerFile=") {
                fields.marker_file = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("DataFormat=") {
                fields.data_format = value.trim().to_string();
            } else if let Some(value) = line.strip_prefix("DataOrientation=") {
                fields.data_orientation = value.trim().to_string();
            } else if let Some(value) = line.strip_prefix("BinaryFormat=") {
                fields.binary_format = value.trim().to_string();
            } else if let Some(value) = line.strip_prefix("NumberOfChannels=") {
                fields.num_channels = value.trim().parse().unwrap_or(0);
            } else if let Some(value) = line.strip_prefix("SamplingInterval=") {
                fields.sampling_interval_us = value.trim().parse().unwrap_or(0.0);
            }
        }

        fields
    }

    /// 扫描标记文件，取New Segment的时间戳并统计标记数
    fn parse_vmrk(content: &str) -> (Option<NaiveDateTime>, usize) {
        let mut start_time = None;
        let mut n_markers = 0usize;

        for line in content.lines() {
            let line = line.trim();
            if !line.starts_with("Mk") {
                continue;
            }
            let Some(eq) = line.find('=') else {
                continue;
            };
            n_markers += 1;

            let value = &line[eq + 1..];
            if start_time.is_none() && value.starts_with("New Segment") {
                if let Some(stamp) = value.split(',').nth(5) {
                    start_time = Self::parse_timestamp(stamp.trim());
                }
            }
        }

        (start_time, n_markers)
    }

    /// yyyymmddhhmmssuuuuuu
    fn parse_timestamp(stamp: &str) -> Option<NaiveDateTime> {
        if stamp.len() < 14 || !stamp.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let year: i32 = stamp[0..4].parse().ok()?;
        let month: u32 = stamp[4..6].parse().ok()?;
        let day: u32 = stamp[6..8].parse().ok()?;
        let hour: u32 = stamp[8..10].parse().ok()?;
        let minute: u32 = stamp[10..12].parse().ok()?;
        let second: u32 = stamp[12..14].parse().ok()?;
        let micros: u32 = stamp[14..].parse().unwrap_or(0);

        NaiveDate::from_ymd_opt(year, month, day)?
            .and_hms_micro_opt(hour, minute, second, micros)
    }

    fn read_block(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.data_file.seek(SeekFrom::Start(offset))?;
        self.data_file.read_exact(buf)
    }
}

impl FormatReader for BrainVisionReader {
    fn format(&self) -> &'static str {
        "BrainVision"
    }

    fn header(&self) -> &RecordingHeader {
        &self.header
    }

    fn read_samples(
        &mut self,
        channels: &[usize],
        begsam: usize,
        endsam: usize,
    ) -> Result<Array2<f64>> {
        for &ch in channels {
            if ch >= self.n_channels {
                return Err(DatasetError::InvalidChannelIndex(ch));
            }
        }

        let n_samples = endsam.saturating_sub(begsam);
        let mut data = Array2::zeros((channels.len(), n_samples));
        if n_samples == 0 || channels.is_empty() {
            return Ok(data);
        }

        // 交错帧：样本s的通道c位于 (s*n_ch + c)*2
        let frame = self.n_channels * 2;
        let mut buf = vec![0u8; n_samples * frame];
        self.read_block(begsam as u64 * frame as u64, &mut buf)
            .map_err(|e| {
                DatasetError::ReadFailed(format!(
                    "BrainVision read of samples [{}, {}) failed: {}",
                    begsam, endsam, e
                ))
            })?;

        for (row, &ch) in channels.iter().enumerate() {
            let resolution = self.resolutions[ch];
            for s in 0..n_samples {
                let at = s * frame + ch * 2;
                let raw = i16::from_le_bytes([buf[at], buf[at + 1]]);
                data[[row, s]] = raw as f64 * resolution;
            }
        }

        Ok(data)
    }
}
