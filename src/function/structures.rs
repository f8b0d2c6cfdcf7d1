//! Concrete stationary covariance/variogram structures.
//!
//! Each structure stores its sill and range directly and knows how to express itself in
//! either covariance or variogram form; `covariance()` always returns the covariance-form
//! value, so downstream matrix assembly never branches on the declared form.

use super::{FormKind, Scalable, Structure};
use crate::numeric_types::Real;

macro_rules! structure {
    ($name:ident, $shape_fn:ident) => {
        /// See module docs.
        #[derive(Clone, Copy, Debug)]
        pub struct $name<R: Real> {
            range: R,
            sill: R,
            form: FormKind,
        }

        impl<R: Real> $name<R> {
            pub fn new(range: R, sill: R, form: FormKind) -> Self {
                assert!(range > R::zero(), "range must be positive");
                assert!(sill > R::zero(), "sill must be positive");
                Self { range, sill, form }
            }
        }

        impl<R: Real> Structure<R> for $name<R> {
            fn covariance(&self, h: R) -> R {
                // Always expressed as a variogram internally; both the covariance-form and
                // variogram-form constructors describe the same kernel, so `sill - gamma(h)`
                // is the covariance value regardless of which form the caller named.
                self.sill - $shape_fn(h, self.range, self.sill)
            }

            fn sill(&self) -> R {
                self.sill
            }

            fn range(&self) -> R {
                self.range
            }

            fn form(&self) -> FormKind {
                self.form
            }
        }

        impl<R: Real> Scalable<R> for $name<R> {
            fn scaled(&self, alpha: R) -> Self {
                Self {
                    range: self.range * alpha,
                    sill: self.sill,
                    form: self.form,
                }
            }
        }
    };
}

/// Shape function value at lag `h`, always returned as a variogram (`0` at `h=0`, rising
/// to `sill` at the range); `covariance()` above converts to covariance form uniformly.
fn spherical_shape<R: Real>(h: R, range: R, sill: R) -> R {
    if h >= range {
        sill
    } else {
        let r = h / range;
        sill * (r * (R::from_f64(1.5).unwrap() - R::from_f64(0.5).unwrap() * r * r))
    }
}

fn gaussian_shape<R: Real>(h: R, range: R, sill: R) -> R {
    let r = h / range;
    sill * (R::one() - (-r * r * R::from_f64(3.0).unwrap()).exp())
}

fn exponential_shape<R: Real>(h: R, range: R, sill: R) -> R {
    let r = h / range;
    sill * (R::one() - (-r * R::from_f64(3.0).unwrap()).exp())
}

structure!(SphericalStructure, spherical_shape);
structure!(GaussianStructure, gaussian_shape);
structure!(ExponentialStructure, exponential_shape);
