#![allow(clippy::useless_conversion)]

use nalgebra::Matrix3;
use ndarray::{Array2, Array3, ArrayViewD};
use numpy::{
    PyArray1, PyArray2, PyArray3, PyReadonlyArray1, PyReadonlyArray2, PyReadonlyArray3,
    PyReadonlyArrayDyn, ToPyArray,
};
use pyo3::exceptions::{PyIndexError, PyTypeError, PyValueError};
use pyo3::prelude::*;

use mdpbc_core::frame::selection_from_mask;
use mdpbc_core::images::{pbc_points, TileOptions};
use mdpbc_core::nojump::{
    JumpMatrices, JumpMatrix, JumpSource, NoJumpTracker, DEFAULT_NOJUMP_CACHE_SIZE,
};
use mdpbc_core::pbc::{pbc_diff_many, OrthoBox};
use mdpbc_core::whole::{whole, whole_trajectory};
use mdpbc_core::PbcError;

// ============================================================================
// Helpers: numpy <-> [f64; 3] conversions and error mapping
// ============================================================================

fn pbc_err(e: PbcError) -> PyErr {
    match e {
        PbcError::StepOutOfRange { .. } | PbcError::AtomOutOfRange { .. } => {
            PyIndexError::new_err(e.to_string())
        }
        _ => PyValueError::new_err(e.to_string()),
    }
}

/// Read a (3,) vector or (n, 3) array. The flag tells whether the input was 1-D.
fn array_to_coords(arr: &ArrayViewD<f64>) -> PyResult<(Vec<[f64; 3]>, bool)> {
    match arr.shape() {
        [3] => Ok((vec![[arr[[0]], arr[[1]], arr[[2]]]], true)),
        [n, 3] => Ok((
            (0..*n)
                .map(|i| [arr[[i, 0]], arr[[i, 1]], arr[[i, 2]]])
                .collect(),
            false,
        )),
        shape => Err(PyValueError::new_err(format!(
            "expected an array of shape (3,) or (n, 3), got {:?}",
            shape
        ))),
    }
}

fn array2_to_coords(arr: &ndarray::ArrayView2<f64>) -> PyResult<Vec<[f64; 3]>> {
    if arr.shape()[1] != 3 {
        return Err(PyValueError::new_err("coordinates must have shape (n, 3)"));
    }
    let n = arr.shape()[0];
    Ok((0..n)
        .map(|i| [arr[[i, 0]], arr[[i, 1]], arr[[i, 2]]])
        .collect())
}

fn array3_to_trajectory(arr: &ndarray::ArrayView3<f64>) -> PyResult<Vec<Vec<[f64; 3]>>> {
    if arr.shape()[2] != 3 {
        return Err(PyValueError::new_err(
            "trajectory must have shape (n_frames, n_atoms, 3)",
        ));
    }
    let n_frames = arr.shape()[0];
    let n_atoms = arr.shape()[1];
    let mut traj = Vec::with_capacity(n_frames);
    for i in 0..n_frames {
        let mut frame = Vec::with_capacity(n_atoms);
        for j in 0..n_atoms {
            frame.push([arr[[i, j, 0]], arr[[i, j, 1]], arr[[i, j, 2]]]);
        }
        traj.push(frame);
    }
    Ok(traj)
}

fn coords_to_array2(coords: &[[f64; 3]]) -> Array2<f64> {
    let mut result = Array2::<f64>::zeros((coords.len(), 3));
    for (i, &[x, y, z]) in coords.iter().enumerate() {
        result[[i, 0]] = x;
        result[[i, 1]] = y;
        result[[i, 2]] = z;
    }
    result
}

fn trajectory_to_array3(traj: &[Vec<[f64; 3]>]) -> Array3<f64> {
    let n_frames = traj.len();
    let n_atoms = if n_frames > 0 { traj[0].len() } else { 0 };
    let mut result = Array3::<f64>::zeros((n_frames, n_atoms, 3));
    for (i, frame) in traj.iter().enumerate() {
        for (j, atom) in frame.iter().enumerate() {
            result[[i, j, 0]] = atom[0];
            result[[i, j, 1]] = atom[1];
            result[[i, j, 2]] = atom[2];
        }
    }
    result
}

/// Accept box edge lengths (3,) or a 3x3 box matrix.
fn parse_box(arr: &PyReadonlyArrayDyn<f64>) -> PyResult<OrthoBox> {
    let view = arr.as_array();
    match view.shape() {
        [3] => OrthoBox::new([view[[0]], view[[1]], view[[2]]]).map_err(pbc_err),
        [3, 3] => {
            let matrix = Matrix3::from_fn(|i, j| view[[i, j]]);
            OrthoBox::from_matrix(&matrix).map_err(pbc_err)
        }
        shape => Err(PyValueError::new_err(format!(
            "box must have shape (3,) or (3, 3), got {:?}",
            shape
        ))),
    }
}

/// Convert any non-negative integer array to indices.
fn extract_indices(obj: &Bound<'_, PyAny>, what: &str) -> PyResult<Vec<usize>> {
    let values: Vec<i64> = if let Ok(idx_i64) = obj.extract::<PyReadonlyArray1<i64>>() {
        idx_i64.as_array().to_vec()
    } else if let Ok(idx_i32) = obj.extract::<PyReadonlyArray1<i32>>() {
        idx_i32.as_array().iter().map(|&x| i64::from(x)).collect()
    } else if let Ok(list) = obj.extract::<Vec<i64>>() {
        list
    } else {
        return Err(PyTypeError::new_err(format!(
            "{} must be an integer array",
            what
        )));
    };
    values
        .into_iter()
        .map(|v| {
            usize::try_from(v)
                .map_err(|_| PyValueError::new_err(format!("{} must be non-negative", what)))
        })
        .collect()
}

/// Selections may be boolean masks or index arrays.
fn extract_selection(obj: &Bound<'_, PyAny>) -> PyResult<Vec<usize>> {
    if let Ok(mask) = obj.extract::<PyReadonlyArray1<bool>>() {
        let mask: Vec<bool> = mask.as_array().to_vec();
        return Ok(selection_from_mask(&mask));
    }
    extract_indices(obj, "selection")
}

fn extract_jump_matrix(obj: &Bound<'_, PyAny>) -> PyResult<JumpMatrix> {
    let (shape, counts): ([usize; 2], Vec<i32>) =
        if let Ok(arr) = obj.extract::<PyReadonlyArray2<i32>>() {
            let view = arr.as_array();
            let shape = [view.shape()[0], view.shape()[1]];
            (shape, view.iter().copied().collect())
        } else if let Ok(arr) = obj.extract::<PyReadonlyArray2<i64>>() {
            let view = arr.as_array();
            let shape = [view.shape()[0], view.shape()[1]];
            let counts = view
                .iter()
                .map(|&v| {
                    i32::try_from(v)
                        .map_err(|_| PyValueError::new_err("jump count does not fit in int32"))
                })
                .collect::<PyResult<Vec<i32>>>()?;
            (shape, counts)
        } else {
            return Err(PyTypeError::new_err(
                "jump matrices must be 2-D int32 or int64 arrays (n_steps, n_atoms)",
            ));
        };
    JumpMatrix::new(shape[0], shape[1], counts).map_err(pbc_err)
}

// ============================================================================
// MINIMUM IMAGE
// ============================================================================

/// Difference of two vectors (or arrays of vectors) under periodic boundaries.
/// `v2` may be a single vector that is broadcast against every row of `v1`.
#[pyfunction]
#[pyo3(name = "pbc_diff", signature = (v1, v2=None, r#box=None))]
fn pbc_diff_py<'py>(
    py: Python<'py>,
    v1: PyReadonlyArrayDyn<'py, f64>,
    v2: Option<PyReadonlyArrayDyn<'py, f64>>,
    r#box: Option<PyReadonlyArrayDyn<'py, f64>>,
) -> PyResult<PyObject> {
    let (mut a, a_is_vector) = array_to_coords(&v1.as_array())?;
    let pbc_box = r#box.as_ref().map(parse_box).transpose()?;

    let mut as_vector = a_is_vector;
    let b = match &v2 {
        Some(v2) => {
            let (mut b, b_is_vector) = array_to_coords(&v2.as_array())?;
            if b_is_vector && !a_is_vector {
                b = vec![b[0]; a.len()];
            } else if a_is_vector && !b_is_vector {
                a = vec![a[0]; b.len()];
            }
            as_vector = a_is_vector && b_is_vector;
            Some(b)
        }
        None => None,
    };

    let diff = pbc_diff_many(&a, b.as_deref(), pbc_box.as_ref()).map_err(pbc_err)?;

    if as_vector {
        Ok(PyArray1::from_vec_bound(py, diff[0].to_vec())
            .into_any()
            .unbind())
    } else {
        Ok(coords_to_array2(&diff).to_pyarray_bound(py).into_any().unbind())
    }
}

// ============================================================================
// WHOLE MOLECULES
// ============================================================================

#[pyfunction]
#[pyo3(name = "whole", signature = (positions, residue_ids, masses, r#box))]
fn whole_py<'py>(
    py: Python<'py>,
    positions: PyReadonlyArray2<'py, f64>,
    residue_ids: &Bound<'py, PyAny>,
    masses: PyReadonlyArray1<'py, f64>,
    r#box: PyReadonlyArrayDyn<'py, f64>,
) -> PyResult<Bound<'py, PyArray2<f64>>> {
    let coords = array2_to_coords(&positions.as_array())?;
    let ids = extract_indices(residue_ids, "residue_ids")?;
    let masses_vec: Vec<f64> = masses.as_array().to_vec();
    let pbc_box = parse_box(&r#box)?;

    let result = whole(&coords, &ids, &masses_vec, &pbc_box).map_err(pbc_err)?;
    Ok(coords_to_array2(&result).to_pyarray_bound(py))
}

#[pyfunction]
#[pyo3(name = "whole_trajectory", signature = (trajectory, residue_ids, masses, box_dimensions))]
fn whole_trajectory_py<'py>(
    py: Python<'py>,
    trajectory: PyReadonlyArray3<'py, f64>,
    residue_ids: &Bound<'py, PyAny>,
    masses: PyReadonlyArray1<'py, f64>,
    box_dimensions: PyReadonlyArray2<'py, f64>,
) -> PyResult<Bound<'py, PyArray3<f64>>> {
    let traj_vec = array3_to_trajectory(&trajectory.as_array())?;
    let ids = extract_indices(residue_ids, "residue_ids")?;
    let masses_vec: Vec<f64> = masses.as_array().to_vec();

    let box_arr = box_dimensions.as_array();
    if box_arr.shape()[1] < 3 {
        return Err(PyValueError::new_err(
            "box_dimensions must have at least 3 columns",
        ));
    }
    let boxes = (0..box_arr.shape()[0])
        .map(|i| OrthoBox::new([box_arr[[i, 0]], box_arr[[i, 1]], box_arr[[i, 2]]]))
        .collect::<Result<Vec<_>, _>>()
        .map_err(pbc_err)?;

    let result = whole_trajectory(&traj_vec, &ids, &masses_vec, &boxes).map_err(pbc_err)?;
    Ok(trajectory_to_array3(&result).to_pyarray_bound(py))
}

// ============================================================================
// NO-JUMP
// ============================================================================

#[pyclass(name = "NoJumpTracker")]
struct PyNoJumpTracker {
    inner: NoJumpTracker,
}

#[pymethods]
impl PyNoJumpTracker {
    /// Build a tracker from the x, y and z jump matrices (n_steps, n_atoms).
    /// `cache_size=None` disables the checkpoint cache.
    #[new]
    #[pyo3(signature = (jump_x, jump_y, jump_z, cache_size=Some(DEFAULT_NOJUMP_CACHE_SIZE)))]
    fn new(
        jump_x: &Bound<'_, PyAny>,
        jump_y: &Bound<'_, PyAny>,
        jump_z: &Bound<'_, PyAny>,
        cache_size: Option<usize>,
    ) -> PyResult<Self> {
        let jumps = JumpMatrices::new([
            extract_jump_matrix(jump_x)?,
            extract_jump_matrix(jump_y)?,
            extract_jump_matrix(jump_z)?,
        ])
        .map_err(pbc_err)?;
        let inner = match cache_size {
            Some(capacity) => NoJumpTracker::with_cache(jumps, capacity).map_err(pbc_err)?,
            None => NoJumpTracker::new(jumps),
        };
        Ok(PyNoJumpTracker { inner })
    }

    #[getter]
    fn n_steps(&self) -> usize {
        self.inner.jump_matrices().n_steps()
    }

    #[getter]
    fn n_atoms(&self) -> usize {
        self.inner.jump_matrices().n_atoms()
    }

    #[getter]
    fn has_cache(&self) -> bool {
        self.inner.has_cache()
    }

    #[getter]
    fn cache_len(&self) -> usize {
        self.inner.cache().map_or(0, |cache| cache.len())
    }

    fn clear_cache(&mut self) {
        self.inner.clear_cache();
    }

    /// Real-space correction of the selected atoms at `step`.
    #[pyo3(signature = (step, selection, r#box))]
    fn correction<'py>(
        &mut self,
        py: Python<'py>,
        step: usize,
        selection: &Bound<'py, PyAny>,
        r#box: PyReadonlyArrayDyn<'py, f64>,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let selection = extract_selection(selection)?;
        let pbc_box = parse_box(&r#box)?;
        let correction = self
            .inner
            .correction(step, &selection, &pbc_box)
            .map_err(pbc_err)?;
        Ok(coords_to_array2(&correction).to_pyarray_bound(py))
    }

    /// No-jump positions of the selected atoms at `step`.
    #[pyo3(signature = (positions, step, selection, r#box))]
    fn nojump<'py>(
        &mut self,
        py: Python<'py>,
        positions: PyReadonlyArray2<'py, f64>,
        step: usize,
        selection: &Bound<'py, PyAny>,
        r#box: PyReadonlyArrayDyn<'py, f64>,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let coords = array2_to_coords(&positions.as_array())?;
        let selection = extract_selection(selection)?;
        let pbc_box = parse_box(&r#box)?;
        let result = self
            .inner
            .nojump(&coords, step, &selection, &pbc_box)
            .map_err(pbc_err)?;
        Ok(coords_to_array2(&result).to_pyarray_bound(py))
    }
}

// ============================================================================
// PERIODIC IMAGES
// ============================================================================

/// Points and their first periodic images. Returns `(images, indices)` when
/// `index=True`.
#[pyfunction]
#[pyo3(
    name = "pbc_points",
    signature = (coordinates, r#box, thickness=0.0, index=false, inclusive=true, center=None)
)]
fn pbc_points_py<'py>(
    py: Python<'py>,
    coordinates: PyReadonlyArray2<'py, f64>,
    r#box: PyReadonlyArrayDyn<'py, f64>,
    thickness: f64,
    index: bool,
    inclusive: bool,
    center: Option<[f64; 3]>,
) -> PyResult<PyObject> {
    let coords = array2_to_coords(&coordinates.as_array())?;
    let pbc_box = parse_box(&r#box)?;
    let options = TileOptions {
        thickness,
        inclusive,
        center,
    };

    let (positions, origins) = pbc_points(&coords, &pbc_box, &options)
        .map_err(pbc_err)?
        .into_parts();
    let images = coords_to_array2(&positions).to_pyarray_bound(py);

    if index {
        let indices: Vec<i64> = origins.iter().map(|&i| i as i64).collect();
        let indices = PyArray1::from_vec_bound(py, indices);
        Ok((images, indices).into_py(py))
    } else {
        Ok(images.into_any().unbind())
    }
}

// ============================================================================
// MODULE DEFINITION
// ============================================================================

#[pymodule]
fn mdpbc(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Minimum image
    m.add_function(wrap_pyfunction!(pbc_diff_py, m)?)?;

    // Whole molecules
    m.add_function(wrap_pyfunction!(whole_py, m)?)?;
    m.add_function(wrap_pyfunction!(whole_trajectory_py, m)?)?;

    // No-jump
    m.add_class::<PyNoJumpTracker>()?;
    m.add("NOJUMP_CACHESIZE", DEFAULT_NOJUMP_CACHE_SIZE)?;

    // Periodic images
    m.add_function(wrap_pyfunction!(pbc_points_py, m)?)?;

    Ok(())
}
