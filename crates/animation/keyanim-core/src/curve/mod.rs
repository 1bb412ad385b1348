//! Keyframe curves: storage, tangent derivation and evaluation.

pub mod hermite;
pub mod keyframe;
pub mod store;

pub use keyframe::{CurveType, Keyframe, KeyframeTuple};
pub use store::CurveStore;
