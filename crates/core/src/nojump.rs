//! No-jump unwrapping from precomputed jump matrices.
//!
//! A jump matrix records, per box axis, how many times every atom crossed the
//! periodic boundary at each step. The real-space correction at step `S` is
//! the sum of all crossings over steps `0..=S` times the box edge, and the
//! unwrapped position is `position - correction`.
//!
//! Summing from step 0 on every query is linear in the trajectory length, so
//! a [`NoJumpTracker`] can carry a [`NoJumpCache`] of checkpoints and resume
//! from the closest earlier one. Hits and misses give the same correction.
//!
//! The cached path mutates the tracker and takes `&mut self`. Share a tracker
//! between threads behind a lock (e.g. `Mutex<NoJumpTracker>`).

use std::collections::{BTreeMap, VecDeque};

use crate::error::{check_len, PbcError, PbcResult};
use crate::frame::FrameSource;
use crate::pbc::OrthoBox;
use crate::util::sub3;

/// Default number of checkpoints kept by a [`NoJumpCache`].
pub const DEFAULT_NOJUMP_CACHE_SIZE: usize = 128;

// ============================================================================
// Jump matrices
// ============================================================================

/// Signed boundary crossings of one box axis, shape [n_steps][n_atoms].
#[derive(Debug, Clone, PartialEq)]
pub struct JumpMatrix {
    n_steps: usize,
    n_atoms: usize,
    /// Row-major crossing counts.
    counts: Vec<i32>,
}

impl JumpMatrix {
    /// Wrap row-major counts of shape [n_steps][n_atoms].
    pub fn new(n_steps: usize, n_atoms: usize, counts: Vec<i32>) -> PbcResult<Self> {
        check_len("jump matrix entries", n_steps * n_atoms, counts.len())?;
        Ok(Self {
            n_steps,
            n_atoms,
            counts,
        })
    }

    /// Matrix without any crossings.
    pub fn zeros(n_steps: usize, n_atoms: usize) -> Self {
        Self {
            n_steps,
            n_atoms,
            counts: vec![0; n_steps * n_atoms],
        }
    }

    /// Build from one row per step.
    pub fn from_rows(rows: &[Vec<i32>]) -> PbcResult<Self> {
        let n_atoms = rows.first().map_or(0, Vec::len);
        let mut counts = Vec::with_capacity(rows.len() * n_atoms);
        for row in rows {
            check_len("jump matrix row", n_atoms, row.len())?;
            counts.extend_from_slice(row);
        }
        Ok(Self {
            n_steps: rows.len(),
            n_atoms,
            counts,
        })
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    pub fn n_atoms(&self) -> usize {
        self.n_atoms
    }

    /// Crossings recorded at `step`, one entry per atom.
    pub fn row(&self, step: usize) -> Option<&[i32]> {
        if step >= self.n_steps {
            return None;
        }
        let start = step * self.n_atoms;
        Some(&self.counts[start..start + self.n_atoms])
    }

    /// Add `crossings` to the entry of `atom` at `step`.
    pub fn record(&mut self, step: usize, atom: usize, crossings: i32) -> PbcResult<()> {
        if step >= self.n_steps {
            return Err(PbcError::StepOutOfRange {
                step,
                n_steps: self.n_steps,
            });
        }
        if atom >= self.n_atoms {
            return Err(PbcError::AtomOutOfRange {
                index: atom,
                n_atoms: self.n_atoms,
            });
        }
        let entry = &mut self.counts[step * self.n_atoms + atom];
        *entry = entry
            .checked_add(crossings)
            .ok_or(PbcError::JumpCountOverflow { step, atom })?;
        Ok(())
    }
}

/// The three per-axis jump matrices of one trajectory, all of the same shape.
#[derive(Debug, Clone, PartialEq)]
pub struct JumpMatrices {
    axes: [JumpMatrix; 3],
}

impl JumpMatrices {
    pub fn new(axes: [JumpMatrix; 3]) -> PbcResult<Self> {
        let (n_steps, n_atoms) = (axes[0].n_steps, axes[0].n_atoms);
        for axis in &axes[1..] {
            check_len("jump matrix steps", n_steps, axis.n_steps)?;
            check_len("jump matrix atoms", n_atoms, axis.n_atoms)?;
        }
        Ok(Self { axes })
    }

    pub fn n_steps(&self) -> usize {
        self.axes[0].n_steps
    }

    pub fn n_atoms(&self) -> usize {
        self.axes[0].n_atoms
    }

    pub fn axis(&self, d: usize) -> &JumpMatrix {
        &self.axes[d]
    }

    fn check_step(&self, step: usize) -> PbcResult<()> {
        if step >= self.n_steps() {
            return Err(PbcError::StepOutOfRange {
                step,
                n_steps: self.n_steps(),
            });
        }
        Ok(())
    }

    fn check_selection(&self, selection: &[usize]) -> PbcResult<()> {
        let n_atoms = self.n_atoms();
        match selection.iter().find(|&&i| i >= n_atoms) {
            Some(&index) => Err(PbcError::AtomOutOfRange { index, n_atoms }),
            None => Ok(()),
        }
    }

    /// Add the crossings of steps `first..=last` (all atoms), scaled by the
    /// box edges, onto `correction`. Nothing happens when `first > last`.
    fn accumulate_all(
        &self,
        first: usize,
        last: usize,
        lengths: &[f64; 3],
        correction: &mut [[f64; 3]],
    ) {
        let mut crossings = vec![0i64; self.n_atoms()];
        for (d, axis) in self.axes.iter().enumerate() {
            crossings.fill(0);
            for step in first..=last {
                if let Some(row) = axis.row(step) {
                    for (total, &count) in crossings.iter_mut().zip(row) {
                        *total += i64::from(count);
                    }
                }
            }
            for (atom, &total) in crossings.iter().enumerate() {
                correction[atom][d] += total as f64 * lengths[d];
            }
        }
    }

    /// Correction at `last` for the selected atoms only, summed from step 0.
    fn accumulate_selected(
        &self,
        last: usize,
        lengths: &[f64; 3],
        selection: &[usize],
    ) -> Vec<[f64; 3]> {
        let mut correction = vec![[0.0; 3]; selection.len()];
        for (d, axis) in self.axes.iter().enumerate() {
            for (out, &atom) in correction.iter_mut().zip(selection) {
                let total: i64 = (0..=last)
                    .filter_map(|step| axis.row(step))
                    .map(|row| i64::from(row[atom]))
                    .sum();
                out[d] = total as f64 * lengths[d];
            }
        }
        correction
    }
}

/// Anything that exposes the jump matrices of a trajectory.
pub trait JumpSource {
    fn jump_matrices(&self) -> &JumpMatrices;
}

impl JumpSource for JumpMatrices {
    fn jump_matrices(&self) -> &JumpMatrices {
        self
    }
}

// ============================================================================
// Checkpoint cache
// ============================================================================

/// Bounded map from step to the all-atom correction at that step.
///
/// Entries are evicted in insertion order. Storing an existing step again
/// replaces its value but keeps its original position in that order.
///
/// All entries were scaled with the same box edges, see
/// [`NoJumpCache::box_lengths`].
#[derive(Debug, Clone)]
pub struct NoJumpCache {
    capacity: usize,
    entries: BTreeMap<usize, Vec<[f64; 3]>>,
    order: VecDeque<usize>,
    lengths: Option<[f64; 3]>,
}

impl NoJumpCache {
    pub fn new(capacity: usize) -> PbcResult<Self> {
        if capacity == 0 {
            return Err(PbcError::InvalidCacheCapacity);
        }
        Ok(Self {
            capacity,
            entries: BTreeMap::new(),
            order: VecDeque::with_capacity(capacity + 1),
            lengths: None,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, step: usize) -> bool {
        self.entries.contains_key(&step)
    }

    pub fn get(&self, step: usize) -> Option<&[[f64; 3]]> {
        self.entries.get(&step).map(Vec::as_slice)
    }

    /// Cached steps, oldest first.
    pub fn steps(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().copied()
    }

    /// The checkpoint with the largest step not after `step`.
    pub fn latest_at_or_before(&self, step: usize) -> Option<(usize, &[[f64; 3]])> {
        self.entries
            .range(..=step)
            .next_back()
            .map(|(&s, correction)| (s, correction.as_slice()))
    }

    pub fn insert(&mut self, step: usize, correction: Vec<[f64; 3]>) {
        if self.entries.insert(step, correction).is_none() {
            self.order.push_back(step);
        }
        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                log::debug!("no-jump cache full, evicted step {}", oldest);
            }
        }
    }

    /// Box edges the stored corrections were computed with.
    pub fn box_lengths(&self) -> Option<[f64; 3]> {
        self.lengths
    }

    /// Bind the cache to `lengths`, dropping every entry computed with other
    /// box edges. Returns true if entries were dropped.
    pub fn bind_box(&mut self, lengths: [f64; 3]) -> bool {
        if self.lengths == Some(lengths) {
            return false;
        }
        let dropped = !self.entries.is_empty();
        self.entries.clear();
        self.order.clear();
        self.lengths = Some(lengths);
        dropped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.lengths = None;
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// Computes no-jump corrections for one trajectory.
#[derive(Debug, Clone)]
pub struct NoJumpTracker {
    jumps: JumpMatrices,
    cache: Option<NoJumpCache>,
}

impl NoJumpTracker {
    /// Tracker without a cache; every query sums from step 0.
    pub fn new(jumps: JumpMatrices) -> Self {
        Self { jumps, cache: None }
    }

    /// Tracker with a checkpoint cache of `capacity` entries.
    pub fn with_cache(jumps: JumpMatrices, capacity: usize) -> PbcResult<Self> {
        Ok(Self {
            jumps,
            cache: Some(NoJumpCache::new(capacity)?),
        })
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    pub fn cache(&self) -> Option<&NoJumpCache> {
        self.cache.as_ref()
    }

    pub fn clear_cache(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
    }

    /// Real-space correction at `step` for the selected atoms.
    ///
    /// Checkpoints are only reused while the box edges stay the same; a
    /// different box empties the cache first.
    ///
    /// # Arguments
    /// * `step` - Trajectory step, must be below the number of jump matrix steps
    /// * `selection` - Full-system indices of the atoms to return
    /// * `pbc_box` - Box whose edges scale the crossing counts
    pub fn correction(
        &mut self,
        step: usize,
        selection: &[usize],
        pbc_box: &OrthoBox,
    ) -> PbcResult<Vec<[f64; 3]>> {
        self.jumps.check_step(step)?;
        self.jumps.check_selection(selection)?;
        let lengths = pbc_box.lengths();

        let cache = match self.cache.as_mut() {
            Some(cache) => cache,
            None => return Ok(self.jumps.accumulate_selected(step, &lengths, selection)),
        };
        if cache.bind_box(lengths) {
            log::debug!(
                "no-jump cache invalidated: box changed to {:?} at step {}",
                lengths,
                step
            );
        }

        let (first, mut full) = match cache.latest_at_or_before(step) {
            Some((checkpoint, base)) => {
                log::debug!(
                    "no-jump cache hit: resuming step {} from checkpoint {}",
                    step,
                    checkpoint
                );
                (checkpoint + 1, base.to_vec())
            }
            None => {
                log::debug!("no-jump cache miss: summing step {} from 0", step);
                (0, vec![[0.0; 3]; self.jumps.n_atoms()])
            }
        };
        self.jumps.accumulate_all(first, step, &lengths, &mut full);

        let selected = selection.iter().map(|&atom| full[atom]).collect();
        cache.insert(step, full);
        Ok(selected)
    }

    /// Unwrapped positions: `positions - correction`.
    ///
    /// `positions[k]` belongs to the full-system atom `selection[k]`.
    pub fn nojump(
        &mut self,
        positions: &[[f64; 3]],
        step: usize,
        selection: &[usize],
        pbc_box: &OrthoBox,
    ) -> PbcResult<Vec<[f64; 3]>> {
        check_len("positions", selection.len(), positions.len())?;
        let correction = self.correction(step, selection, pbc_box)?;
        Ok(positions
            .iter()
            .zip(&correction)
            .map(|(p, c)| sub3(p, c))
            .collect())
    }

    /// [`NoJumpTracker::nojump`] for a frame from a trajectory reader.
    pub fn nojump_frame<F: FrameSource>(&mut self, frame: &F) -> PbcResult<Vec<[f64; 3]>> {
        let pbc_box = OrthoBox::from_matrix(&frame.box_matrix())?;
        self.nojump(frame.positions(), frame.step(), frame.selection(), &pbc_box)
    }
}

impl JumpSource for NoJumpTracker {
    fn jump_matrices(&self) -> &JumpMatrices {
        &self.jumps
    }
}

/// No-jump positions without any cache or shared state.
pub fn nojump_uncached<J: JumpSource>(
    jumps: &J,
    positions: &[[f64; 3]],
    step: usize,
    selection: &[usize],
    pbc_box: &OrthoBox,
) -> PbcResult<Vec<[f64; 3]>> {
    let jumps = jumps.jump_matrices();
    check_len("positions", selection.len(), positions.len())?;
    jumps.check_step(step)?;
    jumps.check_selection(selection)?;
    let correction = jumps.accumulate_selected(step, &pbc_box.lengths(), selection);
    Ok(positions
        .iter()
        .zip(&correction)
        .map(|(p, c)| sub3(p, c))
        .collect())
}
