//! Offline demodulation: raw I/Q capture in, 8 kHz PCM out.
//!
//! Reads 16,384-byte blocks (the receiver's DMA block size) from a file
//! or stdin and drives the full pipeline synchronously, so squelch, AGC,
//! and demodulation behave exactly as they do live. Output is raw s16le
//! or a WAV file.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;

use anyhow::Context;
use clap::Args;

use ondas_demod::DemodMode;
use ondas_rx::{
    ConfigCell, IQ_BLOCK_BYTES, IqBlock, Pipeline, RxConfig, RxEvent, RxStats, SampleClock,
    StubTuner, shared,
};

use crate::config::Profile;

/// Arguments for `ondas demod`.
#[derive(Args)]
pub struct DemodArgs {
    /// Input raw I/Q capture ("-" for stdin)
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Output PCM file ("-" for stdout)
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Demodulation mode: none, am, fm, wbfm, lsb, usb
    #[arg(short, long)]
    mode: Option<String>,

    /// Receiver profile (TOML)
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Demodulator output gain override
    #[arg(long)]
    gain: Option<f32>,

    /// Squelch threshold in dBFS (-200..=0)
    #[arg(long)]
    squelch: Option<i32>,

    /// Enable the AGC loop (against the software tuner stub)
    #[arg(long)]
    agc: bool,

    /// Write a WAV file instead of raw s16le
    #[arg(long)]
    wav: bool,
}

/// PCM output rate in Hz.
const PCM_RATE: u32 = 8_000;

enum PcmWriter {
    Raw(BufWriter<Box<dyn Write + Send>>),
    Wav(Box<hound::WavWriter<BufWriter<File>>>),
}

impl PcmWriter {
    fn write(&mut self, pcm: &[i16]) -> anyhow::Result<()> {
        match self {
            PcmWriter::Raw(writer) => {
                for &sample in pcm {
                    writer.write_all(&sample.to_le_bytes())?;
                }
            }
            PcmWriter::Wav(writer) => {
                for &sample in pcm {
                    writer.write_sample(sample)?;
                }
            }
        }
        Ok(())
    }

    fn finalize(self) -> anyhow::Result<()> {
        match self {
            PcmWriter::Raw(mut writer) => writer.flush()?,
            PcmWriter::Wav(writer) => writer.finalize()?,
        }
        Ok(())
    }
}

/// Run the demod subcommand.
pub fn run(args: DemodArgs) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    anyhow::ensure!(
        config.demod_mode != DemodMode::None,
        "select a demodulation mode with --mode or a profile"
    );

    let mut input: Box<dyn Read> = if args.input == "-" {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(File::open(&args.input).with_context(|| format!("open {}", args.input))?)
    };

    let mut writer = open_writer(&args)?;

    // The sink collects each block's PCM; the synchronous drive loop
    // flushes it to the writer between blocks.
    let (pcm_tx, pcm_rx) = channel::<Vec<i16>>();
    let sink = Box::new(move |pcm: &[i16]| {
        let _ = pcm_tx.send(pcm.to_vec());
    });

    let cell = ConfigCell::new(config);
    let tuner = shared(Box::new(StubTuner::new()));
    let stats = Arc::new(RxStats::default());
    let (event_tx, event_rx) = channel::<RxEvent>();

    let mut pipeline = Pipeline::new(cell, tuner, sink, Arc::clone(&stats))?;
    pipeline.set_event_sender(event_tx);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("install interrupt handler")?;
    }

    let mut clock = SampleClock::new();
    let mut buffer = vec![0u8; IQ_BLOCK_BYTES];
    let mut blocks = 0u64;
    let mut pcm_samples = 0u64;

    while !stop.load(Ordering::SeqCst) {
        let n = read_block(&mut input, &mut buffer)?;
        if n == 0 {
            break;
        }
        // An odd trailing byte cannot form a sample pair.
        let usable = n - (n % 2);
        if usable == 0 {
            break;
        }

        let block = IqBlock::new(clock.next(), buffer[..usable].to_vec())?;
        let _recycled = pipeline.accept_block(block);

        while let Ok(pcm) = pcm_rx.try_recv() {
            pcm_samples += pcm.len() as u64;
            writer.write(&pcm)?;
        }
        blocks += 1;
    }

    writer.finalize()?;

    for event in event_rx.try_iter() {
        tracing::debug!(?event, "squelch/agc event");
    }

    let snapshot = stats.snapshot();
    eprintln!(
        "{} blocks in, {} PCM samples out ({:.1} s of audio), {} short blocks",
        blocks,
        pcm_samples,
        pcm_samples as f64 / f64::from(PCM_RATE),
        snapshot.short_blocks,
    );

    Ok(())
}

fn build_config(args: &DemodArgs) -> anyhow::Result<RxConfig> {
    let mut config = RxConfig::default();

    if let Some(path) = &args.profile {
        let profile = Profile::load(path)?;
        profile.apply(&mut config)?;
    }

    if let Some(mode) = &args.mode {
        config.demod_mode = mode
            .parse::<DemodMode>()
            .map_err(|e| anyhow::anyhow!("--mode {mode}: {e}"))?;
    }

    if let Some(gain) = args.gain {
        anyhow::ensure!(
            gain > 0.0 && gain.is_finite(),
            "--gain must be positive and finite"
        );
        config.demodulator_gain = Some(gain);
    }

    if let Some(squelch) = args.squelch {
        anyhow::ensure!(
            (-200..=0).contains(&squelch),
            "--squelch must be within -200..=0 dBFS"
        );
        config.squelch_threshold_dbfs = squelch;
    }

    if args.agc {
        config.agc_enabled = true;
    }

    Ok(config)
}

fn open_writer(args: &DemodArgs) -> anyhow::Result<PcmWriter> {
    if args.wav {
        anyhow::ensure!(args.output != "-", "--wav needs a file path, not stdout");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: PCM_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(&args.output, spec)
            .with_context(|| format!("create {}", args.output))?;
        Ok(PcmWriter::Wav(Box::new(writer)))
    } else if args.output == "-" {
        Ok(PcmWriter::Raw(BufWriter::new(Box::new(std::io::stdout()))))
    } else {
        let file = File::create(&args.output).with_context(|| format!("create {}", args.output))?;
        Ok(PcmWriter::Raw(BufWriter::new(Box::new(file))))
    }
}

/// Fill `buffer` from the reader, tolerating short reads; returns the
/// byte count (0 at EOF).
fn read_block(input: &mut dyn Read, buffer: &mut [u8]) -> anyhow::Result<usize> {
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
