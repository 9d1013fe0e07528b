//! Core library for mdpbc.
//!
//! Pure Rust periodic boundary geometry for MD trajectory analysis, with no
//! Python dependencies. Provides minimum-image displacements, whole-molecule
//! reconstruction, no-jump unwrapping from jump matrices, and periodic image
//! generation for orthorhombic boxes.

pub mod error;
pub mod frame;
pub mod images;
pub mod nojump;
pub mod pbc;
pub mod util;
pub mod whole;

pub use error::{PbcError, PbcResult};
pub use frame::{Frame, FrameSource};
pub use images::{pbc_points, PeriodicImages, TileOptions};
pub use nojump::{
    nojump_uncached, JumpMatrices, JumpMatrix, JumpSource, NoJumpCache, NoJumpTracker,
    DEFAULT_NOJUMP_CACHE_SIZE,
};
pub use pbc::{fold, pbc_diff, pbc_diff_many, pbc_distance, OrthoBox};
pub use whole::{whole, whole_frame, whole_trajectory, WHOLE_THRESHOLD};
