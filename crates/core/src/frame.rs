//! Frame interface consumed by the PBC routines.
//!
//! Trajectory readers live outside this crate. They hand frames over through
//! [`FrameSource`]; every per-atom slice refers to the atom subset loaded in
//! the frame, while `selection` maps that subset back to indices in the full
//! system (the indexing used by jump matrices).

use nalgebra::Matrix3;

use crate::pbc::OrthoBox;

/// One frame of an atom subset.
pub trait FrameSource {
    /// Positions of the loaded subset [n].
    fn positions(&self) -> &[[f64; 3]];

    /// 3x3 box matrix of this frame.
    fn box_matrix(&self) -> Matrix3<f64>;

    /// Trajectory step index of this frame.
    fn step(&self) -> usize;

    /// 1-based residue id per loaded atom; 0 means no residue.
    fn residue_ids(&self) -> &[usize];

    /// Full-system atom index of every loaded atom.
    fn selection(&self) -> &[usize];

    /// Mass per loaded atom.
    fn masses(&self) -> &[f64];
}

/// Owned frame, for callers that already hold plain arrays.
#[derive(Debug, Clone)]
pub struct Frame {
    pub positions: Vec<[f64; 3]>,
    pub box_matrix: Matrix3<f64>,
    pub step: usize,
    pub residue_ids: Vec<usize>,
    pub selection: Vec<usize>,
    pub masses: Vec<f64>,
}

impl Frame {
    /// Frame of a full system: identity selection, unit masses, no residues.
    pub fn new(positions: Vec<[f64; 3]>, pbc_box: &OrthoBox, step: usize) -> Self {
        let n_atoms = positions.len();
        Self {
            positions,
            box_matrix: pbc_box.to_matrix(),
            step,
            residue_ids: vec![0; n_atoms],
            selection: (0..n_atoms).collect(),
            masses: vec![1.0; n_atoms],
        }
    }

    pub fn with_residues(mut self, residue_ids: Vec<usize>, masses: Vec<f64>) -> Self {
        self.residue_ids = residue_ids;
        self.masses = masses;
        self
    }

    pub fn with_selection(mut self, selection: Vec<usize>) -> Self {
        self.selection = selection;
        self
    }
}

impl FrameSource for Frame {
    fn positions(&self) -> &[[f64; 3]] {
        &self.positions
    }

    fn box_matrix(&self) -> Matrix3<f64> {
        self.box_matrix
    }

    fn step(&self) -> usize {
        self.step
    }

    fn residue_ids(&self) -> &[usize] {
        &self.residue_ids
    }

    fn selection(&self) -> &[usize] {
        &self.selection
    }

    fn masses(&self) -> &[f64] {
        &self.masses
    }
}

/// Convert a boolean atom mask into the indices of the selected atoms.
pub fn selection_from_mask(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &selected)| selected.then_some(i))
        .collect()
}
