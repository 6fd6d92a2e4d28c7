#![allow(clippy::needless_range_loop)]

mod bounding_box;
mod intersection;
mod misc;
mod surface;

pub mod prelude {
    pub use crate::bounding_box::*;
    pub use crate::intersection::*;
    pub use crate::misc::*;
    pub use crate::surface::*;
}
