// Command-line inspector: prints the header of a recording and a short
// summary of the first channel's signal. RUST_LOG=debug shows probe steps.

use std::env;
use std::process;

use eegio::{ChannelSelection, Dataset, Interval, Result};

fn main() -> Result<()> {
    env_logger::init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: recinfo <recording>");
        process::exit(2);
    };

    let mut dataset = Dataset::open(&path)?;
    let header = dataset.header().clone();

    println!("Format:    {}", dataset.format());
    println!("Subject:   {}", header.subject_id);
    println!("Start:     {}", header.start_time);
    println!("Sampling:  {} Hz", header.sampling_frequency);
    println!(
        "Samples:   {} per channel ({:.2} s)",
        header.sample_count,
        header.duration_seconds()
    );
    println!("Channels:  {}", header.channel_names.len());
    for (index, name) in header.channel_names.iter().enumerate() {
        println!("  {:>4}  {}", index, name);
    }
    if !header.extra.is_empty() {
        println!("Extra:");
        for (key, value) in &header.extra {
            println!("  {} = {}", key, value);
        }
    }

    // 第一个通道的第一秒作为信号预览
    if let Some(first) = header.channel_names.first() {
        let span = header.sampling_frequency.min(header.sample_count as f64) as i64;
        if span > 0 {
            let slab = dataset.read_data(
                &ChannelSelection::names([first.as_str()]),
                Interval::Samples {
                    begsam: 0,
                    endsam: span,
                },
            )?;

            let row = slab.data.row(0);
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for &value in row.iter() {
                min = min.min(value);
                max = max.max(value);
            }
            let mean = row.sum() / row.len() as f64;

            println!(
                "Preview:   {} samples of {}: min {:.3}, max {:.3}, mean {:.3}",
                slab.n_samples(),
                first,
                min,
                max,
                mean
            );
        }
    }

    Ok(())
}
