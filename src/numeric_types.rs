//! Numeric trait bounds shared across the engine.

use nalgebra::RealField;
use num::FromPrimitive;

/// Marker trait for thread-safe types usable across the worker pool.
pub trait ThreadSafe: Send + Sync + 'static {}
impl<T> ThreadSafe for T where T: Send + Sync + 'static {}

/// Bound satisfied by `f32` and `f64`, the two scalar types the engine is generic over:
/// a `nalgebra::RealField` plus the `num` traits needed for conversions between scalar
/// kinds and literal construction. Deliberately not `num::Float`, whose methods collide
/// with the `RealField` ones.
pub trait Real:
    RealField + FromPrimitive + Copy + ThreadSafe + num::NumCast + PartialOrd + Default
{
}

impl<T> Real for T where
    T: RealField + FromPrimitive + Copy + ThreadSafe + num::NumCast + PartialOrd + Default
{
}
