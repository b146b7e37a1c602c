//! Device models and MNA stamps for Voltaic.
//!
//! This crate provides device models for:
//! - Passive elements: R, C, L
//! - Sources: V, I (independent) with time-varying waveforms
//! - Nonlinear devices: Diode, BJT
//!
//! Every model implements [`voltaic_core::Device`]; the engines in
//! `voltaic-solver` drive them through that contract.

pub mod bjt;
pub mod diode;
pub mod passive;
pub mod sources;
pub mod waveforms;

pub use bjt::{Bjt, BjtParams, BjtType};
pub use diode::{Diode, DiodeOpPoint, DiodeParams};
pub use passive::{Capacitor, Inductor, Resistor};
pub use sources::{CurrentSource, VoltageSource};
pub use waveforms::Waveform;
