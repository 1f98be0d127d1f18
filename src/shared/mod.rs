//! Shared geometry primitives used by the pinning and sticking subsystems.

pub mod geometry;

pub use geometry::{Edges, Point, Rect, Size, SizeLimits};
