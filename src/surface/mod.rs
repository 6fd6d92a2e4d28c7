pub mod parametric_surface;
pub mod surface_patch;

pub use parametric_surface::*;
pub use surface_patch::*;

/// Parameter axis of a surface domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UVDirection {
    U,
    V,
}
