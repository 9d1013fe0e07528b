//! Minimum-image folding for orthorhombic periodic boxes.
//!
//! Displacements are folded with `v' = b * (s - round(s))`, `s = v / b`.
//! Ties round to even, so a component of exactly `+b/2` or `-b/2` is kept
//! as is while `1.5 b` folds to `-b/2`.
//!
//! Older call sites used a modulo formulation (`v1 % b - v2 % b`, then shift
//! components beyond `±b/2` by one box). Away from exact half-box ties both
//! give the same vector; only the round-based form is provided here.

use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

use crate::error::{check_len, PbcError, PbcResult};
use crate::util::{norm_squared, sub3};

/// Orthorhombic simulation box, stored as its three edge lengths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoBox {
    lengths: [f64; 3],
}

impl OrthoBox {
    /// Create a box from edge lengths. Every edge must be positive and finite.
    pub fn new(lengths: [f64; 3]) -> PbcResult<Self> {
        for (axis, &length) in lengths.iter().enumerate() {
            if !(length.is_finite() && length > 0.0) {
                return Err(PbcError::InvalidBox { axis, length });
            }
        }
        Ok(Self { lengths })
    }

    /// Build from a 3x3 box matrix by taking its diagonal.
    ///
    /// Non-zero off-diagonal entries mean a triclinic cell, which is rejected.
    pub fn from_matrix(matrix: &Matrix3<f64>) -> PbcResult<Self> {
        for i in 0..3 {
            for j in 0..3 {
                if i != j && matrix[(i, j)] != 0.0 {
                    return Err(PbcError::TriclinicBox);
                }
            }
        }
        let diagonal = matrix.diagonal();
        Self::new([diagonal[0], diagonal[1], diagonal[2]])
    }

    #[inline]
    pub fn lengths(&self) -> [f64; 3] {
        self.lengths
    }

    #[inline]
    pub fn half(&self) -> [f64; 3] {
        [
            self.lengths[0] / 2.0,
            self.lengths[1] / 2.0,
            self.lengths[2] / 2.0,
        ]
    }

    /// Geometric center of a box anchored at the origin.
    #[inline]
    pub fn center(&self) -> [f64; 3] {
        self.half()
    }

    /// The diagonal box matrix.
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_diagonal(&Vector3::from(self.lengths))
    }

    /// Fold a displacement into the minimum-image convention.
    #[inline]
    pub fn fold(&self, v: &[f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for d in 0..3 {
            let s = v[d] / self.lengths[d];
            out[d] = self.lengths[d] * (s - s.round_ties_even());
        }
        out
    }
}

/// Fold `v` into the box, or return it unchanged when there is no box.
#[inline]
pub fn fold(v: &[f64; 3], pbc_box: Option<&OrthoBox>) -> [f64; 3] {
    match pbc_box {
        Some(b) => b.fold(v),
        None => *v,
    }
}

/// Minimum-image displacement `a - b`.
#[inline]
pub fn pbc_diff(a: &[f64; 3], b: &[f64; 3], pbc_box: Option<&OrthoBox>) -> [f64; 3] {
    fold(&sub3(a, b), pbc_box)
}

/// Minimum-image distance between two points.
#[inline]
pub fn pbc_distance(a: &[f64; 3], b: &[f64; 3], pbc_box: Option<&OrthoBox>) -> f64 {
    norm_squared(&pbc_diff(a, b, pbc_box)).sqrt()
}

/// Row-wise minimum-image displacements.
///
/// With `b = None` the rows of `a` are treated as displacements and folded
/// directly.
///
/// # Arguments
/// * `a` - First set of vectors [n]
/// * `b` - Optional second set [n], subtracted from `a`
/// * `pbc_box` - Box to fold into, `None` for no periodicity
pub fn pbc_diff_many(
    a: &[[f64; 3]],
    b: Option<&[[f64; 3]]>,
    pbc_box: Option<&OrthoBox>,
) -> PbcResult<Vec<[f64; 3]>> {
    match b {
        Some(b) => {
            check_len("pbc_diff operands", a.len(), b.len())?;
            Ok(a
                .par_iter()
                .zip(b.par_iter())
                .map(|(p, q)| pbc_diff(p, q, pbc_box))
                .collect())
        }
        None => Ok(a.par_iter().map(|v| fold(v, pbc_box)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Modulo-based formulation kept for comparison.
    fn legacy_diff(a: &[f64; 3], b: &[f64; 3], lengths: &[f64; 3]) -> [f64; 3] {
        let mut v = [0.0; 3];
        for d in 0..3 {
            v[d] = a[d].rem_euclid(lengths[d]) - b[d].rem_euclid(lengths[d]);
            if v[d] > lengths[d] / 2.0 {
                v[d] -= lengths[d];
            }
            if v[d] < -lengths[d] / 2.0 {
                v[d] += lengths[d];
            }
        }
        v
    }

    fn assert_close(a: &[f64; 3], b: &[f64; 3]) {
        for d in 0..3 {
            assert!((a[d] - b[d]).abs() < 1e-10, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_box_validation() {
        assert!(OrthoBox::new([1.0, 2.0, 3.0]).is_ok());
        assert_eq!(
            OrthoBox::new([1.0, 0.0, 3.0]),
            Err(PbcError::InvalidBox {
                axis: 1,
                length: 0.0
            })
        );
        assert!(OrthoBox::new([1.0, 2.0, f64::NAN]).is_err());
        assert!(OrthoBox::new([-1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_from_matrix() {
        let m = Matrix3::new(4.0, 0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 6.0);
        let b = OrthoBox::from_matrix(&m).unwrap();
        assert_eq!(b.lengths(), [4.0, 5.0, 6.0]);
        assert_eq!(b.to_matrix(), m);

        let tric = Matrix3::new(4.0, 0.5, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 6.0);
        assert_eq!(OrthoBox::from_matrix(&tric), Err(PbcError::TriclinicBox));
    }

    #[test]
    fn test_fold_simple() {
        let b = OrthoBox::new([10.0, 10.0, 10.0]).unwrap();
        assert_close(&b.fold(&[9.0, -9.0, 3.0]), &[-1.0, 1.0, 3.0]);
        assert_close(&b.fold(&[21.0, -14.0, 0.0]), &[1.0, -4.0, 0.0]);
    }

    #[test]
    fn test_fold_ties_round_to_even() {
        let b = OrthoBox::new([10.0, 10.0, 10.0]).unwrap();
        assert_eq!(b.fold(&[5.0, -5.0, 15.0]), [5.0, -5.0, -5.0]);
    }

    #[test]
    fn test_fold_without_box_is_identity() {
        let v = [123.4, -0.001, 7.0];
        assert_eq!(fold(&v, None), v);
        assert_close(&pbc_diff(&v, &[1.0, 1.0, 1.0], None), &[122.4, -1.001, 6.0]);
    }

    #[test]
    fn test_pbc_diff_across_boundary() {
        let b = OrthoBox::new([10.0, 8.0, 6.0]).unwrap();
        let d = pbc_diff(&[0.5, 7.5, 0.2], &[9.5, 0.5, 5.8], Some(&b));
        assert_close(&d, &[1.0, -1.0, 0.4]);
        let dist = pbc_distance(&[0.5, 0.0, 0.0], &[9.5, 0.0, 0.0], Some(&b));
        assert!((dist - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_matches_legacy_modulo_form() {
        let lengths = [7.3, 11.0, 4.2];
        let b = OrthoBox::new(lengths).unwrap();
        let points = [
            [0.1, 0.2, 0.3],
            [7.0, 10.9, 4.1],
            [-3.3, 25.4, 13.7],
            [15.2, -0.7, -8.9],
            [3.0, 5.0, 2.5],
        ];
        for p in &points {
            for q in &points {
                assert_close(&pbc_diff(p, q, Some(&b)), &legacy_diff(p, q, &lengths));
            }
        }
    }

    #[test]
    fn test_pbc_diff_many() {
        let b = OrthoBox::new([10.0, 10.0, 10.0]).unwrap();
        let a = vec![[9.0, 0.0, 0.0], [1.0, 1.0, 1.0]];
        let c = vec![[1.0, 0.0, 0.0], [2.0, 9.0, 1.0]];

        let diffs = pbc_diff_many(&a, Some(&c), Some(&b)).unwrap();
        assert_close(&diffs[0], &[-2.0, 0.0, 0.0]);
        assert_close(&diffs[1], &[-1.0, 2.0, 0.0]);

        let folded = pbc_diff_many(&a, None, Some(&b)).unwrap();
        assert_close(&folded[0], &[-1.0, 0.0, 0.0]);

        let err = pbc_diff_many(&a, Some(&c[..1]), Some(&b)).unwrap_err();
        assert!(matches!(err, PbcError::ShapeMismatch { .. }));
    }
}
