//! Minimal n-d FFT collaborator. `rustfft` only operates on flat 1-d buffers, so this module
//! adapts it to `ndarray`'s n-d arrays via the standard row-column algorithm: apply a 1-d
//! FFT along every axis in turn.
//!
//! All internal math is done in `f64` regardless of the engine's scalar type, since
//! `rustfft`/complex FFT implementations only target `f32`/`f64`; callers convert at the
//! boundary.

use ndarray::{ArrayD, Axis, IxDyn};
use num_complex::Complex64;
use rustfft::FftPlanner;
use std::sync::Arc;

/// Forward FFT of a complex n-d array, applied axis by axis.
pub fn fftn(input: &ArrayD<Complex64>) -> ArrayD<Complex64> {
    fft_axes(input, false)
}

/// Inverse FFT (unnormalized output divided by the total element count, matching the usual
/// FFT/IFFT convention).
pub fn ifftn(input: &ArrayD<Complex64>) -> ArrayD<Complex64> {
    let n: usize = input.len();
    let mut out = fft_axes(input, true);
    let scale = 1.0 / n as f64;
    out.mapv_inplace(|c| c * scale);
    out
}

fn fft_axes(input: &ArrayD<Complex64>, inverse: bool) -> ArrayD<Complex64> {
    let mut data = input.clone();
    let mut planner = FftPlanner::<f64>::new();
    for axis in 0..data.ndim() {
        let len = data.len_of(Axis(axis));
        let plan = if inverse {
            planner.plan_fft_inverse(len)
        } else {
            planner.plan_fft_forward(len)
        };
        apply_1d_along_axis(&mut data, axis, &plan);
    }
    data
}

fn apply_1d_along_axis(
    data: &mut ArrayD<Complex64>,
    axis: usize,
    plan: &Arc<dyn rustfft::Fft<f64>>,
) {
    let axis = Axis(axis);
    for mut lane in data.lanes_mut(axis) {
        let mut buf: Vec<Complex64> = lane.iter().cloned().collect();
        plan.process(&mut buf);
        for (dst, src) in lane.iter_mut().zip(buf.into_iter()) {
            *dst = src;
        }
    }
}

/// Circularly shifts every axis so that the zero-frequency (or, for a spatial array, the
/// center-cell) component moves to index `0` (or to the center, for [`fftshift`]).
pub fn fftshift(input: &ArrayD<Complex64>) -> ArrayD<Complex64> {
    shift(input, |n| n / 2)
}

fn shift(input: &ArrayD<Complex64>, amount_fn: impl Fn(usize) -> usize) -> ArrayD<Complex64> {
    let shape = input.shape().to_vec();
    let mut out = ArrayD::<Complex64>::zeros(IxDyn(&shape));
    for (idx, value) in input.indexed_iter() {
        let mut dst = idx.clone();
        for (d, len) in shape.iter().enumerate() {
            let amount = amount_fn(*len);
            dst[d] = (idx[d] + amount) % len;
        }
        out[dst] = *value;
    }
    out
}

/// Elementwise complex argument (phase angle).
pub fn angle(input: &ArrayD<Complex64>) -> ArrayD<f64> {
    input.mapv(|c| c.arg())
}

/// Elementwise modulus.
pub fn modulus(input: &ArrayD<Complex64>) -> ArrayD<f64> {
    input.mapv(|c| c.norm())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ifft_undoes_fft() {
        let data: Vec<Complex64> = (0..8).map(|i| Complex64::new(i as f64, 0.0)).collect();
        let input = ArrayD::from_shape_vec(IxDyn(&[2, 4]), data).unwrap();
        let transformed = fftn(&input);
        let recovered = ifftn(&transformed);
        for (a, b) in input.iter().zip(recovered.iter()) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn dc_only_signal_has_flat_spectrum_modulus() {
        let data = vec![Complex64::new(3.0, 0.0); 4];
        let input = ArrayD::from_shape_vec(IxDyn(&[4]), data).unwrap();
        let spectrum = fftn(&input);
        let m = modulus(&spectrum);
        assert!((m[[0]] - 12.0).abs() < 1e-9);
        for i in 1..4 {
            assert!(m[[i]] < 1e-9);
        }
    }

    #[test]
    fn fftshift_moves_first_element_to_center() {
        let data: Vec<Complex64> = (0..4).map(|i| Complex64::new(i as f64, 0.0)).collect();
        let input = ArrayD::from_shape_vec(IxDyn(&[4]), data).unwrap();
        let shifted = fftshift(&input);
        assert_eq!(shifted[[2]], Complex64::new(0.0, 0.0));
    }

    #[test]
    fn angle_of_positive_real_is_zero() {
        let data = vec![Complex64::new(2.0, 0.0)];
        let input = ArrayD::from_shape_vec(IxDyn(&[1]), data).unwrap();
        let a = angle(&input);
        assert!(a[[0]].abs() < 1e-12);
    }
}
