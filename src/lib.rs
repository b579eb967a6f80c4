//! Synthesize realistic GPX activity tracks (timestamps, elevation, heart
//! rate, cadence) from a bare sequence of route coordinates.

pub mod batch;
pub mod config;
pub mod elevation;
pub mod error;
pub mod export;
pub mod geodesic;
pub mod gpx_io;
pub mod model;
pub mod pacing;
pub mod physiology;
pub mod resample;
pub mod track;

pub use config::{Preset, SynthConfig, Tuning};
pub use error::{Result, SynthError};
pub use model::{ActivityType, AnnotatedPoint, PathType, RoutePoint, SkillLevel, TrackSummary, UserProfile};
pub use track::{assemble, synthesize, Track};
