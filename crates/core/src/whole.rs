//! Make molecules whole again after they were split by the periodic box.
//!
//! Every residue is reduced to its center of mass; atoms lying further than
//! [`WHOLE_THRESHOLD`] box lengths from it along an axis are shifted by one
//! box edge towards it.
//!
//! Two-atom residues only move their first atom. The second atom (in input
//! order) keeps its position, so callers must keep the atoms of a residue
//! contiguous.
//!
//! Older tools instead pinned every atom at an odd index in the full atom
//! list among the two-atom residues. That only agrees with this rule when
//! every two-atom residue starts at an even index. With residues of sizes
//! `[3, 2]`, for example, they keep atom 3 and move atom 4, while
//! [`whole`] keeps atom 4 and may move atom 3.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::error::{check_len, PbcError, PbcResult};
use crate::frame::FrameSource;
use crate::pbc::OrthoBox;

/// Fraction of a box edge beyond which an atom counts as wrapped (90% of half a box).
pub const WHOLE_THRESHOLD: f64 = 0.45;

/// Per-residue accumulator for the center-of-mass reduction.
#[derive(Debug, Clone, Copy)]
struct ResidueGroup {
    weighted: [f64; 3],
    mass: f64,
    n_atoms: usize,
    last_atom: usize,
    com: [f64; 3],
}

impl ResidueGroup {
    fn new() -> Self {
        Self {
            weighted: [0.0; 3],
            mass: 0.0,
            n_atoms: 0,
            last_atom: 0,
            com: [0.0; 3],
        }
    }

    fn add(&mut self, atom: usize, position: &[f64; 3], mass: f64) {
        for d in 0..3 {
            self.weighted[d] += position[d] * mass;
        }
        self.mass += mass;
        self.n_atoms += 1;
        self.last_atom = atom;
    }
}

/// Group atoms by residue id (skipping id 0) and compute every center of mass.
fn group_residues(
    positions: &[[f64; 3]],
    residue_ids: &[usize],
    masses: &[f64],
) -> PbcResult<BTreeMap<usize, ResidueGroup>> {
    let mut groups: BTreeMap<usize, ResidueGroup> = BTreeMap::new();
    for (atom, ((position, &residue), &mass)) in
        positions.iter().zip(residue_ids).zip(masses).enumerate()
    {
        if residue == 0 {
            continue;
        }
        groups
            .entry(residue)
            .or_insert_with(ResidueGroup::new)
            .add(atom, position, mass);
    }

    for (&residue, group) in groups.iter_mut() {
        if group.mass.is_nan() || group.mass <= 0.0 {
            return Err(PbcError::ZeroMassResidue { residue });
        }
        for d in 0..3 {
            group.com[d] = group.weighted[d] / group.mass;
        }
        if group.n_atoms == 2 && residue_ids.get(group.last_atom - 1) != Some(&residue) {
            log::warn!(
                "Two-atom residue {} is not contiguous (second atom at index {}); \
                 only its first atom will be moved",
                residue,
                group.last_atom
            );
        }
    }

    Ok(groups)
}

/// Reassemble residues split across the periodic boundary.
///
/// # Arguments
/// * `positions` - Atom positions [n_atoms]
/// * `residue_ids` - 1-based residue id per atom, 0 for atoms outside any residue
/// * `masses` - Atom masses [n_atoms]
/// * `pbc_box` - Box of this frame
///
/// # Returns
/// Corrected positions; atoms with residue id 0 are returned unchanged.
pub fn whole(
    positions: &[[f64; 3]],
    residue_ids: &[usize],
    masses: &[f64],
    pbc_box: &OrthoBox,
) -> PbcResult<Vec<[f64; 3]>> {
    check_len("residue_ids", positions.len(), residue_ids.len())?;
    check_len("masses", positions.len(), masses.len())?;

    let groups = group_residues(positions, residue_ids, masses)?;
    let lengths = pbc_box.lengths();

    let corrected = positions
        .iter()
        .zip(residue_ids)
        .enumerate()
        .map(|(atom, (position, residue))| {
            let group = match groups.get(residue) {
                Some(group) => group,
                None => return *position,
            };
            if group.n_atoms == 2 && group.last_atom == atom {
                return *position;
            }

            let mut out = *position;
            for d in 0..3 {
                let delta = position[d] - group.com[d];
                let limit = WHOLE_THRESHOLD * lengths[d];
                if delta > limit {
                    out[d] -= lengths[d];
                } else if delta < -limit {
                    out[d] += lengths[d];
                }
            }
            out
        })
        .collect();

    Ok(corrected)
}

/// [`whole`] applied to a frame from a trajectory reader.
pub fn whole_frame<F: FrameSource>(frame: &F) -> PbcResult<Vec<[f64; 3]>> {
    let pbc_box = OrthoBox::from_matrix(&frame.box_matrix())?;
    whole(
        frame.positions(),
        frame.residue_ids(),
        frame.masses(),
        &pbc_box,
    )
}

/// Apply [`whole`] to every frame of a trajectory, in parallel.
///
/// # Arguments
/// * `trajectory` - Frames of [n_atoms] positions
/// * `residue_ids` - Residue id per atom, shared by all frames
/// * `masses` - Mass per atom, shared by all frames
/// * `boxes` - Box per frame
pub fn whole_trajectory(
    trajectory: &[Vec<[f64; 3]>],
    residue_ids: &[usize],
    masses: &[f64],
    boxes: &[OrthoBox],
) -> PbcResult<Vec<Vec<[f64; 3]>>> {
    check_len("boxes", trajectory.len(), boxes.len())?;
    trajectory
        .par_iter()
        .zip(boxes.par_iter())
        .map(|(frame, pbc_box)| whole(frame, residue_ids, masses, pbc_box))
        .collect()
}
