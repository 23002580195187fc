use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use ndarray::{Array2, ArrayViewMut1};

use crate::error::{DatasetError, Result};
use crate::formats::FormatReader;
use crate::types::{MetaValue, RecordingHeader};

const MAX_SIGNALS: usize = 4096;

/// Reader for EDF and continuous EDF+ (`EDF+C`) recordings.
///
/// Samples are stored as little-endian 16-bit integers inside fixed-duration
/// data records; this reader converts them to physical units using the
/// per-signal calibration from the header and supports random access by
/// absolute sample index. `EDF Annotations` signals are skipped: their bytes
/// are accounted for when addressing records, but they never appear among
/// the channels. Discontinuous files (`EDF+D`) are rejected.
///
/// # Examples
///
/// ```rust
/// use eegio::formats::{EdfReader, FormatReader};
///
/// # // Generate test file (hidden from docs)
/// # eegio::fixtures::create_edf_file("edf_demo.edf")?;
/// #
/// let mut reader = EdfReader::open("edf_demo.edf")?;
///
/// let header = reader.header();
/// assert_eq!(header.sampling_frequency, 512.0);
/// assert_eq!(header.channel_names[0], "MFD1");
///
/// // First second of the first channel
/// let block = reader.read_samples(&[0], 0, 512)?;
/// assert_eq!(block.dim(), (1, 512));
///
/// # std::fs::remove_file("edf_demo.edf").ok();
/// # Ok::<(), eegio::DatasetError>(())
/// ```
#[derive(Debug)]
pub struct EdfReader {
    file: BufReader<File>,
    header: RecordingHeader,
    /// 每个数据信号在记录内的布局与标定参数
    signals: Vec<SignalLayout>,
    header_size: usize,
    record_size: usize,
    samples_per_record: usize,
}

#[derive(Debug, Clone, Copy)]
struct SignalLayout {
    /// 信号样本在每条记录内的字节偏移
    buffer_offset: usize,
    physical_min: f64,
    physical_max: f64,
    digital_min: i32,
    digital_max: i32,
}

impl SignalLayout {
    fn bit_value(&self) -> f64 {
        (self.physical_max - self.physical_min)
            / (self.digital_max - self.digital_min) as f64
    }

    fn offset(&self) -> f64 {
        self.physical_max / self.bit_value() - self.digital_max as f64
    }

    /// 数字值转物理值
    fn to_physical(&self, digital: i32) -> f64 {
        self.bit_value() * (self.offset() + digital as f64)
    }
}

struct ParsedEdf {
    header: RecordingHeader,
    signals: Vec<SignalLayout>,
    header_size: usize,
    record_size: usize,
    samples_per_record: usize,
}

impl EdfReader {
    /// Opens an EDF/EDF+C file and parses its header.
    ///
    /// # Errors
    ///
    /// * [`DatasetError::FileNotFound`] - the path does not exist
    /// * [`DatasetError::UnrecognizedFormat`] - the path is a directory, is
    ///   shorter than an EDF header, or does not carry the EDF version
    ///   signature
    /// * [`DatasetError::Unsupported`] - discontinuous EDF+ (`EDF+D`)
    /// * [`DatasetError::InvalidHeader`] - the signature matches but the
    ///   header contents are inconsistent (bad sizes, mixed sampling rates,
    ///   degenerate calibration ranges)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.is_dir() {
            return Err(DatasetError::UnrecognizedFormat(format!(
                "{} is a directory, EDF is a single file",
                path.display()
            )));
        }

        let file = File::open(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                DatasetError::FileNotFound(path.display().to_string())
            } else {
                DatasetError::Io(e)
            }
        })?;

        let mut file = BufReader::new(file);
        let parsed = Self::parse_header(&mut file, path)?;

        log::debug!(
            "{}: EDF with {} channels, {} samples at {} Hz",
            path.display(),
            parsed.header.channel_names.len(),
            parsed.header.sample_count,
            parsed.header.sampling_frequency
        );

        Ok(EdfReader {
            file,
            header: parsed.header,
            signals: parsed.signals,
            header_size: parsed.header_size,
            record_size: parsed.record_size,
            samples_per_record: parsed.samples_per_record,
        })
    }

    /// 解析主头部和信号表
    fn parse_header(file: &mut BufReader<File>, path: &Path) -> Result<ParsedEdf> {
        file.seek(SeekFrom::Start(0))?;
        let mut main = vec![0u8; 256];
        if let Err(e) = file.read_exact(&mut main) {
            // 空文件或比EDF头还短的文件都不算EDF
            if e.kind() == io::ErrorKind::UnexpectedEof {
                return Err(DatasetError::UnrecognizedFormat(format!(
                    "{} is too short for an EDF header",
                    path.display()
                )));
            }
            return Err(e.into());
        }

        // 版本字段必须是'0'加空格填充
        let version = field_str(&main[0..8]);
        if version != "0" {
            return Err(DatasetError::UnrecognizedFormat(format!(
                "{} has no EDF version signature",
                path.display()
            )));
        }

        let reserved = field_str(&main[192..236]);
        if reserved.starts_with("EDF+D") {
            return Err(DatasetError::Unsupported(
                "discontinuous EDF+ (EDF+D) is not supported".to_string(),
            ));
        }

        let n_signals = field_i64(&main[252..256])
            .filter(|&n| n >= 1 && n <= MAX_SIGNALS as i64)
            .ok_or_else(|| {
                DatasetError::InvalidHeader(format!(
                    "bad signal count: {:?}",
                    field_str(&main[252..256])
                ))
            })? as usize;

        let header_size = field_i64(&main[184..192])
            .ok_or_else(|| DatasetError::InvalidHeader("bad header size".to_string()))?;
        if header_size != ((n_signals + 1) * 256) as i64 {
            return Err(DatasetError::InvalidHeader(format!(
                "header size {} does not match {} signals",
                header_size, n_signals
            )));
        }
        let header_size = header_size as usize;

        let n_records = field_i64(&main[236..244])
            .filter(|&n| n >= 0)
            .ok_or_else(|| DatasetError::InvalidHeader("bad data record count".to_string()))?
            as usize;

        let record_duration = field_f64(&main[244..252])
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or_else(|| DatasetError::InvalidHeader("bad data record duration".to_string()))?;

        let start_time = Self::parse_start_time(&main[168..176], &main[176..184])?;
        let subject_id = field_str(&main[8..88]);
        let recording_id = field_str(&main[88..168]);

        let mut table = vec![0u8; n_signals * 256];
        file.read_exact(&mut table).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                DatasetError::InvalidHeader("truncated signal table".to_string())
            } else {
                DatasetError::Io(e)
            }
        })?;

        let (channel_names, signals, record_size, samples_per_record) =
            Self::parse_signal_table(&table, n_signals)?;

        let mut extra = BTreeMap::new();
        extra.insert(
            "edf_variant".to_string(),
            MetaValue::Text(if reserved.starts_with("EDF+C") {
                "EDF+C".to_string()
            } else {
                "EDF".to_string()
            }),
        );
        extra.insert("recording_id".to_string(), MetaValue::Text(recording_id));
        extra.insert("data_records".to_string(), MetaValue::Integer(n_records as i64));
        extra.insert("record_duration".to_string(), MetaValue::Float(record_duration));

        let header = RecordingHeader {
            subject_id,
            start_time,
            sampling_frequency: samples_per_record as f64 / record_duration,
            channel_names,
            sample_count: samples_per_record * n_records,
            extra,
        };

        Ok(ParsedEdf {
            header,
            signals,
            header_size,
            record_size,
            samples_per_record,
        })
    }

    /// 解析"dd.mm.yy"和"hh.mm.ss"
    fn parse_start_time(date_field: &[u8], time_field: &[u8]) -> Result<NaiveDateTime> {
        let date_str = field_str(date_field);
        let parts: Vec<&str> = date_str.split('.').collect();
        if parts.len() != 3 {
            return Err(DatasetError::InvalidHeader(format!(
                "bad start date: {}",
                date_str
            )));
        }

        let day = parts[0].trim().parse::<u32>().ok();
        let month = parts[1].trim().parse::<u32>().ok();
        let year = parts[2].trim().parse::<i32>().ok().map(|yy| {
            // EDF的两位年份以1985为分界
            if yy > 84 {
                1900 + yy
            } else {
                2000 + yy
            }
        });

        let date = match (year, month, day) {
            (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d),
            _ => None,
        }
        .ok_or_else(|| DatasetError::InvalidHeader(format!("bad start date: {}", date_str)))?;

        let time_str = field_str(time_field);
        let parts: Vec<&str> = time_str.split('.').collect();
        if parts.len() != 3 {
            return Err(DatasetError::InvalidHeader(format!(
                "bad start time: {}",
                time_str
            )));
        }

        let hour = parts[0].trim().parse::<u32>().ok();
        let minute = parts[1].trim().parse::<u32>().ok();
        let second = parts[2].trim().parse::<u32>().ok();

        let time = match (hour, minute, second) {
            (Some(h), Some(m), Some(s)) => NaiveTime::from_hms_opt(h, m, s),
            _ => None,
        }
        .ok_or_else(|| DatasetError::InvalidHeader(format!("bad start time: {}", time_str)))?;

        Ok(date.and_time(time))
    }

    /// 解析按字段排列的信号表
    ///
    /// 注释信号只计入记录字节数，不进入通道列表。
    fn parse_signal_table(
        table: &[u8],
        n_signals: usize,
    ) -> Result<(Vec<String>, Vec<SignalLayout>, usize, usize)> {
        let mut channel_names = Vec::new();
        let mut signals = Vec::new();
        let mut record_size = 0usize;
        let mut data_spr: Option<usize> = None;

        for i in 0..n_signals {
            let label = field_str(&table[i * 16..i * 16 + 16]);

            let spr_at = n_signals * 216 + i * 8;
            let spr = field_i64(&table[spr_at..spr_at + 8])
                .filter(|&v| v > 0)
                .ok_or_else(|| {
                    DatasetError::InvalidHeader(format!(
                        "bad samples-per-record for signal {}",
                        i
                    ))
                })? as usize;

            if label == "EDF Annotations" {
                record_size += spr * 2;
                continue;
            }

            let pmin_at = n_signals * 104 + i * 8;
            let pmax_at = n_signals * 112 + i * 8;
            let physical_min = field_f64(&table[pmin_at..pmin_at + 8]).ok_or_else(|| {
                DatasetError::InvalidHeader(format!("bad physical minimum for {}", label))
            })?;
            let physical_max = field_f64(&table[pmax_at..pmax_at + 8]).ok_or_else(|| {
                DatasetError::InvalidHeader(format!("bad physical maximum for {}", label))
            })?;

            let dmin_at = n_signals * 120 + i * 8;
            let dmax_at = n_signals * 128 + i * 8;
            let digital_min = field_i64(&table[dmin_at..dmin_at + 8])
                .filter(|&v| (i16::MIN as i64..=i16::MAX as i64).contains(&v))
                .ok_or_else(|| {
                    DatasetError::InvalidHeader(format!("bad digital minimum for {}", label))
                })? as i32;
            let digital_max = field_i64(&table[dmax_at..dmax_at + 8])
                .filter(|&v| (i16::MIN as i64..=i16::MAX as i64).contains(&v))
                .ok_or_else(|| {
                    DatasetError::InvalidHeader(format!("bad digital maximum for {}", label))
                })? as i32;

            if physical_min == physical_max {
                return Err(DatasetError::InvalidHeader(format!(
                    "physical minimum equals maximum for {}",
                    label
                )));
            }
            // 钳位和标定都要求数字量程严格递增
            if digital_min >= digital_max {
                return Err(DatasetError::InvalidHeader(format!(
                    "digital minimum {} is not below maximum {} for {}",
                    digital_min, digital_max, label
                )));
            }

            // 头部只有一个采样率，所有数据信号必须一致
            match data_spr {
                None => data_spr = Some(spr),
                Some(expected) if expected != spr => {
                    return Err(DatasetError::InvalidHeader(format!(
                        "mixed sampling rates: {} and {} samples per record",
                        expected, spr
                    )));
                }
                Some(_) => {}
            }

            signals.push(SignalLayout {
                buffer_offset: record_size,
                physical_min,
                physical_max,
                digital_min,
                digital_max,
            });
            channel_names.push(label);
            record_size += spr * 2;
        }

        let samples_per_record = data_spr.ok_or_else(|| {
            DatasetError::InvalidHeader("file contains no data signals".to_string())
        })?;

        Ok((channel_names, signals, record_size, samples_per_record))
    }

    /// 按记录边界分段读取一个通道的样本
    fn fill_channel(
        &mut self,
        layout: SignalLayout,
        begsam: usize,
        endsam: usize,
        mut row: ArrayViewMut1<f64>,
    ) -> io::Result<()> {
        let spr = self.samples_per_record;
        let mut pos = begsam;
        let mut filled = 0usize;

        while pos < endsam {
            let record = pos / spr;
            let in_record = pos % spr;
            let run = (endsam - pos).min(spr - in_record);

            let offset = self.header_size as u64
                + record as u64 * self.record_size as u64
                + layout.buffer_offset as u64
                + in_record as u64 * 2;
            self.file.seek(SeekFrom::Start(offset))?;

            let mut bytes = vec![0u8; run * 2];
            self.file.read_exact(&mut bytes)?;

            for (k, pair) in bytes.chunks_exact(2).enumerate() {
                let digital = i16::from_le_bytes([pair[0], pair[1]]) as i32;
                let clamped = digital.clamp(layout.digital_min, layout.digital_max);
                row[filled + k] = layout.to_physical(clamped);
            }

            filled += run;
            pos += run;
        }

        Ok(())
    }
}

impl FormatReader for EdfReader {
    fn format(&self) -> &'static str {
        "EDF"
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
            if ch >= self.signals.len() {
                return Err(DatasetError::InvalidChannelIndex(ch));
            }
        }

        let n_samples = endsam.saturating_sub(begsam);
        let mut data = Array2::zeros((channels.len(), n_samples));
        if n_samples == 0 {
            return Ok(data);
        }

        for (row, &ch) in channels.iter().enumerate() {
            let layout = self.signals[ch];
            self.fill_channel(layout, begsam, endsam, data.row_mut(row))
                .map_err(|e| {
                    DatasetError::ReadFailed(format!(
                        "EDF read of samples [{}, {}) failed: {}",
                        begsam, endsam, e
                    ))
                })?;
        }

        Ok(data)
    }
}

/// 定长ASCII字段，去掉填充空格
fn field_str(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

fn field_i64(bytes: &[u8]) -> Option<i64> {
    let s = String::from_utf8_lossy(bytes);
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse().ok()
}

fn field_f64(bytes: &[u8]) -> Option<f64> {
    let s = String::from_utf8_lossy(bytes);
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse().ok()
}
