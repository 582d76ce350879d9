//! Ondas DSP - fixed-point multirate primitives for a software-defined
//! radio receiver.
//!
//! This crate provides the building blocks the receiver chain is composed
//! from, designed for real-time block processing with zero allocation in
//! the sample path.
//!
//! # Core Abstractions
//!
//! ## Fixed-point filtering
//!
//! - [`FirState`] - circular Q15 delay line with the saturating
//!   multiply-accumulate kernel shared by every filter in the crate
//! - [`Fir`] - plain (non-rate-changing) Q15 FIR filter
//! - [`IirFilter`] - small direct-form I IIR filter (de-emphasis)
//!
//! ## Sample-rate conversion
//!
//! - [`PolyphaseBank`] - quantized, permuted coefficient storage derived
//!   from a [`FilterSpec`]
//! - [`Decimator`] - polyphase decimation by an integer factor M
//! - [`Interpolator`] - polyphase interpolation by an integer factor L
//!
//! ## Demodulation support
//!
//! - [`PhaseDiscriminator`] - atan2 + phase-unwrap FM discriminator with a
//!   direct and a differentiated variant
//! - [`Atan2Table`] - 256x256 atan2 lookup keyed by offset-binary bytes
//! - [`DbfsTable`] - integer magnitude-to-dBFS conversion table
//!
//! # Numeric contract
//!
//! The Q15 integer path (FIR, decimator, interpolator) is bit-exact on any
//! platform: two's-complement i16 samples and coefficients, a 32-bit
//! accumulator saturated to `[-2^30, 2^30 - 1]` after every MAC, a
//! `1 << 14` rounding preload, and an arithmetic right shift by 15 into the
//! output sample. The float paths (atan2, IIR, output gains) use IEEE-754
//! f32 via `libm` and are reproducible wherever f32 arithmetic is.
//!
//! # no_std Support
//!
//! The crate is `no_std` compatible (it allocates only at construction
//! time). Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! ondas-dsp = { version = "0.1", default-features = false }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod decimator;
pub mod discriminator;
pub mod fir;
pub mod iir;
pub mod interpolator;
pub mod level;
pub mod polyphase;

pub use decimator::Decimator;
pub use discriminator::{Atan2Table, DiscriminatorKind, PhaseDiscriminator, wrap_phase};
pub use fir::{Fir, FirState};
pub use iir::IirFilter;
pub use interpolator::Interpolator;
pub use level::{DbfsTable, average_magnitude};
pub use polyphase::{FilterError, FilterSpec, PolyphaseBank, quantize_q15};
