//! # dingcad kernel
//!
//! Immutable triangle-mesh solids and the operations a script layer needs
//! to build them: primitives, booleans, affine transforms, hulls, sweeps,
//! level sets, refinement and measurement.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dingcad_kernel::prelude::*;
//!
//! let block = Solid::cube(DVec3::splat(10.0), true);
//! let hole = Solid::cylinder(12.0, 2.0, 2.0, 0, true);
//! let part = block.boolean(&hole, OpType::Subtract);
//!
//! assert_eq!(part.status(), Status::NoError);
//! println!("volume: {}", part.volume());
//! ```
//!
//! ## Conventions
//!
//! - **Precision**: all geometry is `f64`
//! - **Winding**: triangles are counter-clockwise seen from outside
//! - **Angles**: rotation, twist and revolve angles are in **degrees**
//! - **Coordinate system**: right-handed, Z-up
//! - **Validity**: operations never panic on bad geometry; they return an
//!   empty solid carrying a [`Status`]

pub mod boolean;
pub mod cross_section;
pub mod io;

mod error;
mod hull;
mod level_set;
mod measure;
mod primitives;
mod properties;
mod refine;
mod repair;
mod simplify;
mod solid;
mod status;
mod sweep;
mod transform;

pub use boolean::OpType;
pub use cross_section::{Polygon, Polygons};
pub use error::{Error, Result};
pub use level_set::LEVEL_SET_MAX_SAMPLES;
pub use measure::BoundingBox;
pub use primitives::circular_segments;
pub use solid::{Solid, reserve_ids};
pub use status::Status;
pub use transform::{affine_from_rows, rotation_degrees};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::boolean::OpType;
    pub use crate::cross_section::{Polygon, Polygons};
    pub use crate::measure::BoundingBox;
    pub use crate::solid::Solid;
    pub use crate::status::Status;
    pub use crate::Error;

    pub use glam::{DAffine3, DMat3, DVec2, DVec3};
}
