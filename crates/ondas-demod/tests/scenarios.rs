//! End-to-end demodulation scenarios over one second of synthesized
//! 256 kS/s input.

use core::f32::consts::PI;

use ondas_demod::coefficients::{
    AUDIO_DECIMATION, AUDIO_DECIMATOR_TAPS, POST_DEMOD_DECIMATION, POST_DEMOD_DECIMATOR_TAPS,
};
use ondas_demod::{DemodMode, Demodulator, FmDemodulator, SignalEvent, SignalTracker};
use ondas_dsp::quantize_q15;

const SAMPLE_RATE: f32 = 256_000.0;
const BLOCK_BYTES: usize = 16_384;

/// One second of interleaved signed I/Q from a generator function.
fn synthesize(pairs: usize, mut f: impl FnMut(usize) -> (i8, i8)) -> Vec<i8> {
    let mut iq = Vec::with_capacity(pairs * 2);
    for n in 0..pairs {
        let (i, q) = f(n);
        iq.push(i);
        iq.push(q);
    }
    iq
}

/// Demodulate block by block, as the pipeline would feed it.
fn demodulate_blocks(demod: &mut Demodulator, iq: &[i8]) -> Vec<i16> {
    let mut pcm = Vec::new();
    for block in iq.chunks(BLOCK_BYTES) {
        demod.demodulate(block, &mut pcm);
    }
    pcm
}

/// DC gain of the post-demod + audio decimation chain as built: the
/// product of the emission-phase sub-filter tap sums, in quantized Q15.
fn pcm_chain_dc_gain() -> f64 {
    let sub_sum = |taps: &[f32], factor: usize| -> f64 {
        taps.iter()
            .enumerate()
            .filter(|(k, _)| k % factor == factor - 1)
            .map(|(_, &h)| f64::from(quantize_q15(h)) / 32768.0)
            .sum()
    };
    sub_sum(&POST_DEMOD_DECIMATOR_TAPS, POST_DEMOD_DECIMATION)
        * sub_sum(&AUDIO_DECIMATOR_TAPS, AUDIO_DECIMATION)
}

#[test]
fn silent_input_fm_produces_silence_and_no_squelch_transition() {
    // 256,000 samples of (0, 0): bytes 128 on the wire, 0 after offset
    // removal.
    let iq = synthesize(256_000, |_| (0, 0));

    let mut demod = Demodulator::new(DemodMode::Fm).unwrap();
    let pcm = demodulate_blocks(&mut demod, &iq);
    assert_eq!(pcm.len(), 8_000, "one second of PCM");

    // The discriminator settles on the epsilon angle after its very first
    // sample; once the filter transient has flushed, the output is bounded
    // by +/- 1.
    let transient = 64;
    for (k, &s) in pcm.iter().enumerate().skip(transient) {
        assert!((-1..=1).contains(&s), "sample {k} = {s}");
    }

    // A realistic threshold keeps the squelch closed on silence: no state
    // transition across the whole second.
    let mut tracker = SignalTracker::new(-40);
    for block in iq.chunks(BLOCK_BYTES) {
        assert_eq!(tracker.run(block, 0), SignalEvent::Noise);
    }
}

#[test]
fn cw_carrier_at_baseband_fm_is_zero_after_transient() {
    // Constant (I, Q) = (100, 0): zero frequency deviation.
    let iq = synthesize(256_000, |_| (100, 0));

    let mut demod = Demodulator::new(DemodMode::Fm).unwrap();
    let pcm = demodulate_blocks(&mut demod, &iq);

    // Transient bound: the settling of the three filter stages.
    let transient = 48 / 4 + 12 / 4 + 40 / 2;
    for (k, &s) in pcm.iter().enumerate().skip(transient) {
        assert_eq!(s, 0, "sample {k} = {s}");
    }
}

#[test]
fn frequency_shifted_carrier_maps_to_predicted_level() {
    // A +10 kHz shifted carrier demodulates to a constant level of
    // gain * 2*pi*10000/64000 through the chain's passband gain.
    let iq = synthesize(256_000, |n| {
        let phase = 2.0 * PI * 10_000.0 * n as f32 / SAMPLE_RATE;
        (
            (100.0 * phase.cos()) as i8,
            (100.0 * phase.sin()) as i8,
        )
    });

    let mut demod = Demodulator::new(DemodMode::Fm).unwrap();
    let pcm = demodulate_blocks(&mut demod, &iq);

    let discriminator_level =
        f64::from(FmDemodulator::DEFAULT_GAIN) * 2.0 * f64::from(PI) * 10_000.0 / 64_000.0;
    let predicted = discriminator_level * pcm_chain_dc_gain();

    let tail = &pcm[pcm.len() / 2..];
    let mean = tail.iter().map(|&s| f64::from(s)).sum::<f64>() / tail.len() as f64;
    let error = (mean - predicted).abs() / predicted;
    assert!(
        error < 0.03,
        "level {mean:.1}, predicted {predicted:.1}, error {error:.4}"
    );
}

#[test]
fn squelch_gates_the_demodulator_with_a_tail() {
    // Three blocks: below, above, below threshold. The event sequence is
    // Noise, StartOfSignal, EndOfSignal, and the tail block still reaches
    // the demodulator while later quiet blocks do not.
    let quiet = synthesize(BLOCK_BYTES / 2, |_| (1, 0));
    let loud = synthesize(BLOCK_BYTES / 2, |_| (100, 0));

    let mut tracker = SignalTracker::new(-20);
    let mut demod = Demodulator::new(DemodMode::Fm).unwrap();
    let mut pcm_per_block = Vec::new();

    for block in [&quiet, &loud, &quiet, &quiet] {
        let event = tracker.run(block, 0);
        let mut pcm = Vec::new();
        if event.forwards_block() {
            demod.demodulate(block, &mut pcm);
        }
        pcm_per_block.push((event, pcm.len()));
    }

    assert_eq!(pcm_per_block[0].0, SignalEvent::Noise);
    assert_eq!(pcm_per_block[1].0, SignalEvent::StartOfSignal);
    assert_eq!(pcm_per_block[2].0, SignalEvent::EndOfSignal);
    assert_eq!(pcm_per_block[3].0, SignalEvent::Noise);

    assert_eq!(pcm_per_block[0].1, 0, "noise block must not demodulate");
    assert!(pcm_per_block[1].1 > 0);
    assert!(pcm_per_block[2].1 > 0, "squelch tail is forwarded");
    assert_eq!(pcm_per_block[3].1, 0);
}
