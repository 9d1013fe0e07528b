//! Periodic images of a point set, e.g. as input for a neighbor search near
//! the box faces. Images are not folded back into the box.

use crate::error::{PbcError, PbcResult};
use crate::pbc::OrthoBox;
use crate::util::{add3, mul3};

/// Options for [`pbc_points`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileOptions {
    /// Shell around the box to keep. 0 keeps all 27 copies, positive values
    /// keep the box grown by `thickness` on every side, negative values keep
    /// less than the box.
    pub thickness: f64,
    /// Keep the untranslated originals. `false` needs `thickness > 0`.
    pub inclusive: bool,
    /// Center of the shell; the box center when `None`.
    pub center: Option<[f64; 3]>,
}

impl Default for TileOptions {
    fn default() -> Self {
        Self {
            thickness: 0.0,
            inclusive: true,
            center: None,
        }
    }
}

/// Periodic images together with the input index each row came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodicImages {
    pub positions: Vec<[f64; 3]>,
    pub origins: Vec<usize>,
}

impl PeriodicImages {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn into_parts(self) -> (Vec<[f64; 3]>, Vec<usize>) {
        (self.positions, self.origins)
    }
}

/// The 27 image shifts in box units: the zero shift first, then every
/// non-zero combination of {-1, 0, 1} with x varying slowest.
pub fn image_shifts() -> impl Iterator<Item = [f64; 3]> {
    let neighbors = (-1i32..=1).flat_map(|x| {
        (-1i32..=1).flat_map(move |y| (-1i32..=1).map(move |z| [x, y, z]))
    });
    std::iter::once([0.0; 3]).chain(
        neighbors
            .filter(|shift| *shift != [0, 0, 0])
            .map(|[x, y, z]| [f64::from(x), f64::from(y), f64::from(z)]),
    )
}

/// Generate the points and their first periodic images.
///
/// Rows are ordered by image (originals first, then the shifts of
/// [`image_shifts`]) and by input index within an image. With a non-zero
/// thickness only rows strictly inside
/// `(center - box/2 - thickness, center + box/2 + thickness)` on every axis
/// are kept.
///
/// # Errors
/// [`PbcError::UnsupportedTiling`] when `inclusive` is false and
/// `thickness <= 0`.
pub fn pbc_points(
    points: &[[f64; 3]],
    pbc_box: &OrthoBox,
    options: &TileOptions,
) -> PbcResult<PeriodicImages> {
    let thickness = options.thickness;
    if !options.inclusive && (thickness.is_nan() || thickness <= 0.0) {
        return Err(PbcError::UnsupportedTiling { thickness });
    }

    let lengths = pbc_box.lengths();
    let half = pbc_box.half();
    let center = options.center.unwrap_or_else(|| pbc_box.center());
    let mut lower = [0.0; 3];
    let mut upper = [0.0; 3];
    for d in 0..3 {
        lower[d] = center[d] - half[d] - thickness;
        upper[d] = center[d] + half[d] + thickness;
    }
    let in_shell = |q: &[f64; 3]| (0..3).all(|d| q[d] < upper[d] && q[d] > lower[d]);

    let mut images = PeriodicImages {
        positions: Vec::with_capacity(27 * points.len()),
        origins: Vec::with_capacity(27 * points.len()),
    };
    for (block, shift) in image_shifts().enumerate() {
        if block == 0 && !options.inclusive {
            continue;
        }
        let offset = mul3(&shift, &lengths);
        for (index, point) in points.iter().enumerate() {
            let image = add3(point, &offset);
            if thickness != 0.0 && !in_shell(&image) {
                continue;
            }
            images.positions.push(image);
            images.origins.push(index);
        }
    }

    log::trace!(
        "pbc_points: {} points -> {} rows (thickness {})",
        points.len(),
        images.len(),
        thickness
    );
    Ok(images)
}
