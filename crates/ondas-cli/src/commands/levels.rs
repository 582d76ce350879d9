//! Per-block signal-level report for a raw I/Q capture.
//!
//! Prints the average magnitude and dBFS of every 16,384-byte block, plus
//! a summary, which is the quickest way to pick a squelch threshold or an
//! AGC operating point for a given antenna setup.

use std::fs::File;
use std::io::Read;

use anyhow::Context;
use clap::Args;

use ondas_dsp::{DbfsTable, average_magnitude};
use ondas_rx::IQ_BLOCK_BYTES;

/// Arguments for `ondas levels`.
#[derive(Args)]
pub struct LevelsArgs {
    /// Input raw I/Q capture ("-" for stdin)
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Print only the summary line
    #[arg(short, long)]
    summary: bool,
}

/// Run the levels subcommand.
pub fn run(args: LevelsArgs) -> anyhow::Result<()> {
    let mut input: Box<dyn Read> = if args.input == "-" {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(File::open(&args.input).with_context(|| format!("open {}", args.input))?)
    };

    let table = DbfsTable::new();
    let mut buffer = vec![0u8; IQ_BLOCK_BYTES];
    let mut signed = Vec::with_capacity(IQ_BLOCK_BYTES);

    let mut block_index = 0u64;
    let mut min_dbfs = i32::MAX;
    let mut max_dbfs = i32::MIN;
    let mut dbfs_sum = 0i64;

    loop {
        let n = read_some(&mut input, &mut buffer)?;
        if n < 2 {
            break;
        }

        signed.clear();
        for &byte in &buffer[..n - (n % 2)] {
            signed.push((i16::from(byte) - 128) as i8);
        }

        let magnitude = average_magnitude(&signed);
        let dbfs = table.dbfs(magnitude);

        if !args.summary {
            println!("block {block_index:>6}: magnitude {magnitude:>3}, {dbfs:>4} dBFS");
        }

        min_dbfs = min_dbfs.min(dbfs);
        max_dbfs = max_dbfs.max(dbfs);
        dbfs_sum += i64::from(dbfs);
        block_index += 1;
    }

    anyhow::ensure!(block_index > 0, "no complete sample pairs in input");

    println!(
        "{} blocks: min {} dBFS, mean {:.1} dBFS, max {} dBFS",
        block_index,
        min_dbfs,
        dbfs_sum as f64 / block_index as f64,
        max_dbfs,
    );

    Ok(())
}

fn read_some(input: &mut dyn Read, buffer: &mut [u8]) -> anyhow::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match input.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
