// Fixture generators for documentation examples and integration tests
// Recordings are tiny and fully deterministic so tests can assert exact values

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

struct FixtureSignal {
    label: &'static str,
    dimension: &'static str,
    physical_min: i32,
    physical_max: i32,
    digital_min: i32,
    digital_max: i32,
    samples_per_record: usize,
}

/// Creates a two-channel 512 Hz recording with identity calibration.
///
/// Channels `MFD1` and `MFD2`, five seconds starting 2013-04-03 06:39:33;
/// the physical value of channel `c` at sample `s` is exactly
/// `(c * 1000 + s % 1000) as f64`.
pub fn create_edf_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let signals = [
        FixtureSignal {
            label: "MFD1",
            dimension: "uV",
            physical_min: -32768,
            physical_max: 32767,
            digital_min: -32768,
            digital_max: 32767,
            samples_per_record: 512,
        },
        FixtureSignal {
            label: "MFD2",
            dimension: "uV",
            physical_min: -32768,
            physical_max: 32767,
            digital_min: -32768,
            digital_max: 32767,
            samples_per_record: 512,
        },
    ];

    write_edf(path, "", 5, &signals, &|signal, s| {
        (signal * 1000 + s % 1000) as i16
    })
}

/// Creates a one-channel 100 Hz recording whose physical values are exactly
/// twice the stored digital values.
///
/// Sample `s` stores digital `s - 150`, except the final sample which is
/// stored out of digital range to exercise clamping.
pub fn create_calibrated_edf_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let signals = [FixtureSignal {
        label: "EEG C3",
        dimension: "uV",
        physical_min: -2000,
        physical_max: 2000,
        digital_min: -1000,
        digital_max: 1000,
        samples_per_record: 100,
    }];

    write_edf(path, "", 3, &signals, &|_, s| {
        if s == 299 {
            1500
        } else {
            s as i16 - 150
        }
    })
}

/// Creates an EDF+C recording with an annotation signal wedged between two
/// data channels.
///
/// The data channels carry the same values as [`create_edf_file`].
pub fn create_edf_file_with_annotations<P: AsRef<Path>>(path: P) -> Result<()> {
    let signals = [
        FixtureSignal {
            label: "MFD1",
            dimension: "uV",
            physical_min: -32768,
            physical_max: 32767,
            digital_min: -32768,
            digital_max: 32767,
            samples_per_record: 512,
        },
        FixtureSignal {
            label: "EDF Annotations",
            dimension: "",
            physical_min: -1,
            physical_max: 1,
            digital_min: -32768,
            digital_max: 32767,
            samples_per_record: 60,
        },
        FixtureSignal {
            label: "MFD2",
            dimension: "uV",
            physical_min: -32768,
            physical_max: 32767,
            digital_min: -32768,
            digital_max: 32767,
            samples_per_record: 512,
        },
    ];

    write_edf(path, "EDF+C", 5, &signals, &|signal, s| {
        // 数据通道的取值与create_edf_file一致
        let channel = if signal == 0 { 0 } else { 1 };
        (channel * 1000 + s % 1000) as i16
    })
}

/// Creates a BrainVision header/marker/data triplet under `dir`, returning
/// the path of the `.vhdr`.
///
/// Three channels (`Fp1`, `Fp2`, `Cz`) at 500 Hz for two seconds, starting
/// 2013-04-03 06:39:33; channel `c` stores raw value `c * 100 + s % 100` at
/// sample `s`, scaled by per-channel resolutions 0.1, 0.2 and 0.5 µV.
pub fn create_brainvision_set<P: AsRef<Path>>(dir: P, stem: &str) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let vhdr_path = dir.join(format!("{}.vhdr", stem));
    let vhdr = format!(
        "Brain Vision Data Exchange Header File Version 1.0\n\
         ; Created for read-back examples\n\
         \n\
         [Common Infos]\n\
         Codepage=UTF-8\n\
         DataFile={0}.eeg\n\
         MarkerFile={0}.vmrk\n\
         DataFormat=BINARY\n\
         DataOrientation=MULTIPLEXED\n\
         NumberOfChannels=3\n\
         SamplingInterval=2000\n\
         \n\
         [Binary Infos]\n\
         BinaryFormat=INT_16\n\
         \n\
         [Channel Infos]\n\
         Ch1=Fp1,,0.1,µV\n\
         Ch2=Fp2,,0.2,µV\n\
         Ch3=Cz,,0.5,µV\n",
        stem
    );
    fs::write(&vhdr_path, vhdr)?;

    let vmrk = format!(
        "Brain Vision Data Exchange Marker File, Version 1.0\n\
         \n\
         [Common Infos]\n\
         Codepage=UTF-8\n\
         DataFile={0}.eeg\n\
         \n\
         [Marker Infos]\n\
         Mk1=New Segment,,1,1,0,20130403063933000000\n\
         Mk2=Stimulus,S  1,500,1,0\n",
        stem
    );
    fs::write(dir.join(format!("{}.vmrk", stem)), vmrk)?;

    let mut data = Vec::with_capacity(1000 * 3 * 2);
    for s in 0..1000usize {
        for c in 0..3usize {
            let raw = (c * 100 + s % 100) as i16;
            data.extend(raw.to_le_bytes());
        }
    }
    fs::write(dir.join(format!("{}.eeg", stem)), data)?;

    Ok(vhdr_path)
}

fn write_edf<P: AsRef<Path>>(
    path: P,
    reserved: &str,
    n_records: usize,
    signals: &[FixtureSignal],
    sample: &dyn Fn(usize, usize) -> i16,
) -> Result<()> {
    let mut bytes = Vec::new();

    // 主头部256字节
    bytes.extend(field("0", 8));
    bytes.extend(field("S001", 80));
    bytes.extend(field("Startdate 03-APR-2013 fixture", 80));
    bytes.extend(field("03.04.13", 8));
    bytes.extend(field("06.39.33", 8));
    bytes.extend(field(&((signals.len() + 1) * 256).to_string(), 8));
    bytes.extend(field(reserved, 44));
    bytes.extend(field(&n_records.to_string(), 8));
    bytes.extend(field("1", 8));
    bytes.extend(field(&signals.len().to_string(), 4));

    // 信号表按字段分组
    for s in signals {
        bytes.extend(field(s.label, 16));
    }
    for _ in signals {
        bytes.extend(field("", 80)); // transducer
    }
    for s in signals {
        bytes.extend(field(s.dimension, 8));
    }
    for s in signals {
        bytes.extend(field(&s.physical_min.to_string(), 8));
    }
    for s in signals {
        bytes.extend(field(&s.physical_max.to_string(), 8));
    }
    for s in signals {
        bytes.extend(field(&s.digital_min.to_string(), 8));
    }
    for s in signals {
        bytes.extend(field(&s.digital_max.to_string(), 8));
    }
    for _ in signals {
        bytes.extend(field("", 80)); // prefilter
    }
    for s in signals {
        bytes.extend(field(&s.samples_per_record.to_string(), 8));
    }
    for _ in signals {
        bytes.extend(field("", 32)); // reserved
    }

    // 数据记录：每条记录内按信号顺序排列
    for record in 0..n_records {
        for (index, s) in signals.iter().enumerate() {
            if s.label == "EDF Annotations" {
                // EDF+的计时注释
                let mut tal = format!("+{}\u{14}\u{14}", record).into_bytes();
                tal.resize(s.samples_per_record * 2, 0);
                bytes.extend(tal);
            } else {
                for k in 0..s.samples_per_record {
                    let value = sample(index, record * s.samples_per_record + k);
                    bytes.extend(value.to_le_bytes());
                }
            }
        }
    }

    fs::write(path, bytes)?;
    Ok(())
}

/// 定长ASCII字段，右侧补空格
fn field(value: &str, width: usize) -> Vec<u8> {
    let mut bytes = value.as_bytes().to_vec();
    bytes.truncate(width);
    bytes.resize(width, b' ');
    bytes
}
