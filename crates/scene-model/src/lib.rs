//! Storyreel Scene Model
//!
//! Defines the value types the assembly engine consumes and produces:
//! - **Dialogue:** Ordered script lines with speaker, emotion, and duration
//! - **Timeline:** The cumulative time axis derived from dialogue durations
//! - **Layers:** Positioned, z-ordered visual inputs to composition
//! - **Clips:** Immutable records of rendered video files
//! - **Profiles:** Closed `(format, quality)` export presets
//!
//! Everything here is owned by the caller; the engine never retains
//! references across calls.

pub mod clip;
pub mod dialogue;
pub mod layer;
pub mod profile;
pub mod scene;
pub mod timeline;

pub use clip::*;
pub use dialogue::*;
pub use layer::*;
pub use profile::*;
pub use scene::*;
pub use timeline::*;
