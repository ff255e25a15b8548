//! Audio feature extraction and simulation core for pulse-viz.
//!
//! Everything here is windowing-free: spectra come in as byte snapshots, and
//! scenes read band energies, beats and simulation state back out once per
//! animation tick.

pub mod bands;
pub mod beat_tracker;
pub mod error;
pub mod flux;
pub mod lens;
pub mod onset;
pub mod particles;
pub mod ripple;
pub mod schedule;
pub mod smoothing;
pub mod spectrum;
pub mod tempo;
pub mod track;

pub use bands::{band_energy, BandEnergies, BandLayout, BandRange};
pub use beat_tracker::{BeatFrame, BeatTracker, TrackerConfig};
pub use error::{SpectrumError, TrackError};
pub use flux::{spectral_flux, FluxHistory, FluxWeighting};
pub use lens::{hit_test, LensConfig, LensPhysics, Region};
pub use onset::{
    BandKind, BeatEvent, IntenseConfig, IntenseOnsetDetector, OnsetConfig, OnsetDetector,
    OnsetTrigger,
};
pub use particles::{FieldDrive, Particle, ParticleConfig, ParticleField};
pub use ripple::{RippleConfig, RippleId, RippleInstance, RipplePool};
pub use schedule::{Scheduler, TickId};
pub use smoothing::{Envelope, SmoothedEnergy};
pub use spectrum::{FrequencyAnalyser, SpectrumSnapshot, SpectrumSource};
pub use tempo::{TempoConfig, TempoEstimator};
pub use track::{Color, Palette, SceneKind, SceneTable, Track};
