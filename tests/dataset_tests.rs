use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use eegio::fixtures::create_edf_file;
use eegio::{
    ChannelSelection, Dataset, DatasetError, FormatReader, Interval, RecordingHeader,
};
use ndarray::Array2;

// 清理测试文件的辅助函数
fn cleanup_test_file(filename: &str) {
    if Path::new(filename).exists() {
        fs::remove_file(filename).ok();
    }
}

fn recording_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2013, 4, 3)
        .unwrap()
        .and_hms_opt(6, 39, 33)
        .unwrap()
}

fn stub_header() -> RecordingHeader {
    RecordingHeader {
        subject_id: "stub".to_string(),
        start_time: recording_start(),
        sampling_frequency: 512.0,
        channel_names: vec![
            "MFD1".to_string(),
            "MFD2".to_string(),
            "MFD3".to_string(),
        ],
        sample_count: 2560,
        extra: BTreeMap::new(),
    }
}

// 记录read_samples调用次数的桩读取器
struct CountingReader {
    header: RecordingHeader,
    reads: Rc<Cell<usize>>,
}

impl CountingReader {
    fn new(reads: &Rc<Cell<usize>>) -> Self {
        CountingReader {
            header: stub_header(),
            reads: Rc::clone(reads),
        }
    }
}

impl FormatReader for CountingReader {
    fn format(&self) -> &'static str {
        "stub"
    }

    fn header(&self) -> &RecordingHeader {
        &self.header
    }

    fn read_samples(
        &mut self,
        channels: &[usize],
        begsam: usize,
        endsam: usize,
    ) -> eegio::Result<Array2<f64>> {
        self.reads.set(self.reads.get() + 1);

        let mut data = Array2::zeros((channels.len(), endsam - begsam));
        for (row, &ch) in channels.iter().enumerate() {
            for s in 0..(endsam - begsam) {
                data[[row, s]] = (ch * 10_000 + begsam + s) as f64;
            }
        }
        Ok(data)
    }
}

struct FailingReader {
    header: RecordingHeader,
}

impl FormatReader for FailingReader {
    fn format(&self) -> &'static str {
        "stub"
    }

    fn header(&self) -> &RecordingHeader {
        &self.header
    }

    fn read_samples(
        &mut self,
        _channels: &[usize],
        begsam: usize,
        endsam: usize,
    ) -> eegio::Result<Array2<f64>> {
        Err(DatasetError::ReadFailed(format!(
            "stub refused samples [{}, {})",
            begsam, endsam
        )))
    }
}

#[test]
fn test_slab_shape_matches_request() {
    let filename = "test_slab_shape.edf";
    create_edf_file(filename).unwrap();

    let mut dataset = Dataset::open(filename).unwrap();

    // 单通道单样本
    let slab = dataset
        .read_data(&ChannelSelection::names(["MFD1"]), Interval::samples(0, 1))
        .unwrap();
    assert_eq!(slab.data.dim(), (1, 1));
    assert_eq!(slab.data[[0, 0]], 0.0);

    // 单通道一整秒
    let slab = dataset
        .read_data(&ChannelSelection::names(["MFD1"]), Interval::seconds(0.0, 1.0))
        .unwrap();
    assert_eq!(slab.begsam, 0);
    assert_eq!(slab.endsam, 512);
    assert_eq!(slab.data.dim(), (1, 512));

    // 全部通道，跨记录边界
    let slab = dataset
        .read_data(&ChannelSelection::All, Interval::samples(100, 612))
        .unwrap();
    assert_eq!(slab.data.dim(), (2, 512));
    assert_eq!(slab.n_channels(), 2);
    assert_eq!(slab.n_samples(), 512);

    cleanup_test_file(filename);
}

#[test]
fn test_read_values_match_file() {
    let filename = "test_read_values.edf";
    create_edf_file(filename).unwrap();

    let mut dataset = Dataset::open(filename).unwrap();
    let slab = dataset
        .read_data(&ChannelSelection::All, Interval::samples(1500, 1504))
        .unwrap();

    // 通道c在样本s的取值是 c*1000 + s%1000
    for s in 0..4usize {
        assert_eq!(slab.data[[0, s]], (500 + s) as f64);
        assert_eq!(slab.data[[1, s]], (1500 + s) as f64);
    }

    cleanup_test_file(filename);
}

#[test]
fn test_cache_hit_across_coordinate_forms() {
    let reads = Rc::new(Cell::new(0));
    let mut dataset = Dataset::from_reader(CountingReader::new(&reads)).unwrap();
    let start = dataset.header().start_time;

    let a = dataset
        .read_data(&ChannelSelection::All, Interval::samples(512, 1024))
        .unwrap();
    let b = dataset
        .read_data(&ChannelSelection::All, Interval::seconds(1.0, 2.0))
        .unwrap();
    let c = dataset
        .read_data(
            &ChannelSelection::All,
            Interval::timestamps(start + Duration::seconds(1), start + Duration::seconds(2)),
        )
        .unwrap();
    let d = dataset
        .read_data(
            &ChannelSelection::All,
            Interval::durations(Duration::seconds(1), Duration::seconds(2)),
        )
        .unwrap();

    // 四种写法只触发一次文件读取，返回同一块数据
    assert_eq!(reads.get(), 1);
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &c));
    assert!(Arc::ptr_eq(&a, &d));
    assert_eq!(dataset.cache_len(), 1);
}

#[test]
fn test_full_selection_by_name_hits_all_channels_entry() {
    let reads = Rc::new(Cell::new(0));
    let mut dataset = Dataset::from_reader(CountingReader::new(&reads)).unwrap();

    let a = dataset
        .read_data(&ChannelSelection::All, Interval::samples(0, 64))
        .unwrap();
    // 名字列表解析后与All相同，命中同一条缓存
    let b = dataset
        .read_data(
            &ChannelSelection::names(["MFD1", "MFD2", "MFD3"]),
            Interval::samples(0, 64),
        )
        .unwrap();

    assert_eq!(reads.get(), 1);
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_unknown_channel_rejected() {
    let filename = "test_unknown_channel.edf";
    create_edf_file(filename).unwrap();

    let mut dataset = Dataset::open(filename).unwrap();
    let err = dataset
        .read_data(&ChannelSelection::names(["aaa"]), Interval::samples(0, 1))
        .unwrap_err();

    match err {
        DatasetError::ChannelNotFound(name) => assert_eq!(name, "aaa"),
        other => panic!("expected ChannelNotFound, got {:?}", other),
    }

    // 已知加未知的混合列表同样失败，而且不会留下缓存
    let err = dataset
        .read_data(
            &ChannelSelection::names(["MFD1", "aaa"]),
            Interval::samples(0, 1),
        )
        .unwrap_err();
    assert!(matches!(err, DatasetError::ChannelNotFound(_)));
    assert_eq!(dataset.cache_len(), 0);

    cleanup_test_file(filename);
}

#[test]
fn test_empty_or_blank_selection_rejected() {
    let reads = Rc::new(Cell::new(0));
    let mut dataset = Dataset::from_reader(CountingReader::new(&reads)).unwrap();

    let err = dataset
        .read_data(&ChannelSelection::Names(vec![]), Interval::samples(0, 1))
        .unwrap_err();
    assert!(matches!(err, DatasetError::InvalidChannelSelection(_)));

    let err = dataset
        .read_data(&ChannelSelection::names(["  "]), Interval::samples(0, 1))
        .unwrap_err();
    assert!(matches!(err, DatasetError::InvalidChannelSelection(_)));

    assert_eq!(reads.get(), 0);
}

#[test]
fn test_inverted_and_out_of_range_spans() {
    let reads = Rc::new(Cell::new(0));
    let mut dataset = Dataset::from_reader(CountingReader::new(&reads)).unwrap();

    // begsam >= endsam
    for interval in [
        Interval::samples(1024, 512),
        Interval::samples(512, 512),
        Interval::seconds(2.0, 1.0),
    ] {
        let err = dataset
            .read_data(&ChannelSelection::All, interval)
            .unwrap_err();
        assert!(matches!(err, DatasetError::SampleSpanOutOfRange { .. }));
    }

    // 区间越过[0, sample_count]
    for interval in [
        Interval::samples(-1, 512),
        Interval::samples(0, 2561),
        Interval::seconds(-0.5, 1.0),
        Interval::seconds(4.9, 5.1),
    ] {
        let err = dataset
            .read_data(&ChannelSelection::All, interval)
            .unwrap_err();
        assert!(matches!(err, DatasetError::SampleSpanOutOfRange { .. }));
    }

    // 边界本身是合法的
    dataset
        .read_data(&ChannelSelection::All, Interval::seconds(0.0, 5.0))
        .unwrap();

    assert_eq!(reads.get(), 1);
}

#[test]
fn test_non_finite_seconds_rejected() {
    let reads = Rc::new(Cell::new(0));
    let mut dataset = Dataset::from_reader(CountingReader::new(&reads)).unwrap();

    // NaN换算不出样本号，必须报错而不是当成0
    for interval in [
        Interval::seconds(f64::NAN, 1.0),
        Interval::seconds(0.0, f64::NAN),
        Interval::seconds(f64::INFINITY, 1.0),
        Interval::seconds(0.0, f64::NEG_INFINITY),
    ] {
        let err = dataset
            .read_data(&ChannelSelection::All, interval)
            .unwrap_err();
        assert!(matches!(err, DatasetError::InvalidInterval(_)));
    }

    assert_eq!(reads.get(), 0);
    assert_eq!(dataset.cache_len(), 0);
}

#[test]
fn test_span_error_reports_bounds() {
    let reads = Rc::new(Cell::new(0));
    let mut dataset = Dataset::from_reader(CountingReader::new(&reads)).unwrap();

    let err = dataset
        .read_data(&ChannelSelection::All, Interval::samples(4000, 5000))
        .unwrap_err();

    match err {
        DatasetError::SampleSpanOutOfRange {
            begsam,
            endsam,
            sample_count,
        } => {
            assert_eq!(begsam, 4000);
            assert_eq!(endsam, 5000);
            assert_eq!(sample_count, 2560);
        }
        other => panic!("expected SampleSpanOutOfRange, got {:?}", other),
    }
}

#[test]
fn test_unrecognized_inputs() {
    // 空文件不属于任何格式
    let filename = "test_unrecognized_empty.bin";
    fs::write(filename, b"").unwrap();
    let err = Dataset::open(filename).unwrap_err();
    assert!(matches!(err, DatasetError::UnrecognizedFormat(_)));
    cleanup_test_file(filename);

    // 没有.vhdr的目录同样无法识别
    let dirname = "test_unrecognized_dir";
    fs::create_dir_all(dirname).unwrap();
    let err = Dataset::open(dirname).unwrap_err();
    assert!(matches!(err, DatasetError::UnrecognizedFormat(_)));
    fs::remove_dir_all(dirname).ok();

    // 不存在的路径报FileNotFound而不是UnrecognizedFormat
    let err = Dataset::open("test_no_such_recording.edf").unwrap_err();
    assert!(matches!(err, DatasetError::FileNotFound(_)));
}

#[test]
fn test_read_error_propagates() {
    let mut dataset = Dataset::from_reader(FailingReader {
        header: stub_header(),
    })
    .unwrap();

    let err = dataset
        .read_data(&ChannelSelection::All, Interval::samples(0, 10))
        .unwrap_err();

    match err {
        DatasetError::ReadFailed(message) => {
            assert!(message.contains("[0, 10)"));
        }
        other => panic!("expected ReadFailed, got {:?}", other),
    }

    // 失败的请求不会缓存
    assert_eq!(dataset.cache_len(), 0);
}

#[test]
fn test_duplicate_names_duplicate_rows() {
    let filename = "test_duplicate_rows.edf";
    create_edf_file(filename).unwrap();

    let mut dataset = Dataset::open(filename).unwrap();
    let slab = dataset
        .read_data(
            &ChannelSelection::names(["MFD2", "MFD2"]),
            Interval::samples(0, 8),
        )
        .unwrap();

    assert_eq!(slab.data.dim(), (2, 8));
    assert_eq!(slab.channels, ["MFD2", "MFD2"]);
    assert_eq!(slab.data.row(0), slab.data.row(1));

    cleanup_test_file(filename);
}

#[test]
fn test_selection_order_preserved() {
    let filename = "test_selection_order.edf";
    create_edf_file(filename).unwrap();

    let mut dataset = Dataset::open(filename).unwrap();
    let slab = dataset
        .read_data(
            &ChannelSelection::names(["MFD2", "MFD1"]),
            Interval::samples(10, 12),
        )
        .unwrap();

    assert_eq!(slab.channels, ["MFD2", "MFD1"]);
    // 第一行是MFD2的数据
    assert_eq!(slab.data[[0, 0]], 1010.0);
    assert_eq!(slab.data[[1, 0]], 10.0);

    cleanup_test_file(filename);
}

#[test]
fn test_timestamp_and_duration_forms() {
    let filename = "test_time_forms.edf";
    create_edf_file(filename).unwrap();

    let mut dataset = Dataset::open(filename).unwrap();
    let start = dataset.header().start_time;
    assert_eq!(start, recording_start());

    // 开始后0.5秒到1.5秒
    let by_timestamp = dataset
        .read_data(
            &ChannelSelection::names(["MFD1"]),
            Interval::timestamps(
                start + Duration::milliseconds(500),
                start + Duration::milliseconds(1500),
            ),
        )
        .unwrap();
    assert_eq!(by_timestamp.begsam, 256);
    assert_eq!(by_timestamp.endsam, 768);

    let by_duration = dataset
        .read_data(
            &ChannelSelection::names(["MFD1"]),
            Interval::durations(
                Duration::milliseconds(500),
                Duration::milliseconds(1500),
            ),
        )
        .unwrap();
    assert!(Arc::ptr_eq(&by_timestamp, &by_duration));

    cleanup_test_file(filename);
}

#[test]
fn test_slab_time_metadata() {
    let filename = "test_slab_metadata.edf";
    create_edf_file(filename).unwrap();

    let mut dataset = Dataset::open(filename).unwrap();
    let slab = dataset
        .read_data(&ChannelSelection::names(["MFD1"]), Interval::seconds(1.0, 3.0))
        .unwrap();

    let start = recording_start();
    assert_eq!(slab.begsam, 512);
    assert_eq!(slab.endsam, 1536);
    assert_eq!(slab.begtime, start + Duration::seconds(1));
    assert_eq!(slab.endtime, start + Duration::seconds(3));
    assert_eq!(slab.channels, ["MFD1"]);

    cleanup_test_file(filename);
}

#[test]
fn test_header_validation_on_construction() {
    // 重复的通道名
    let mut header = stub_header();
    header.channel_names = vec!["A".to_string(), "A".to_string()];
    let err = Dataset::from_reader(FailingReader { header }).unwrap_err();
    assert!(matches!(err, DatasetError::InvalidHeader(_)));

    // 采样率必须是正的有限值
    let mut header = stub_header();
    header.sampling_frequency = 0.0;
    let err = Dataset::from_reader(FailingReader { header }).unwrap_err();
    assert!(matches!(err, DatasetError::InvalidHeader(_)));

    let mut header = stub_header();
    header.sampling_frequency = f64::NAN;
    let err = Dataset::from_reader(FailingReader { header }).unwrap_err();
    assert!(matches!(err, DatasetError::InvalidHeader(_)));
}
