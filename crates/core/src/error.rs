//! Error types for periodic boundary operations.

use thiserror::Error;

/// Errors raised by the PBC geometry routines.
///
/// All of them describe bad input; nothing here is transient.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PbcError {
    #[error("box edge {axis} must be positive and finite, got {length}")]
    InvalidBox { axis: usize, length: f64 },

    #[error("triclinic boxes are not supported (off-diagonal box matrix entries must be zero)")]
    TriclinicBox,

    #[error("{what}: expected length {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("step {step} out of range for jump matrices with {n_steps} steps")]
    StepOutOfRange { step: usize, n_steps: usize },

    #[error("atom index {index} out of range for {n_atoms} atoms")]
    AtomOutOfRange { index: usize, n_atoms: usize },

    #[error("inclusive=false requires thickness > 0, got {thickness}")]
    UnsupportedTiling { thickness: f64 },

    #[error("residue {residue} has non-positive total mass")]
    ZeroMassResidue { residue: usize },

    #[error("no-jump cache capacity must be at least 1")]
    InvalidCacheCapacity,

    #[error("jump count of atom {atom} at step {step} overflows i32")]
    JumpCountOverflow { step: usize, atom: usize },
}

pub type PbcResult<T> = Result<T, PbcError>;

/// Fail with [`PbcError::ShapeMismatch`] unless `found == expected`.
pub(crate) fn check_len(what: &'static str, expected: usize, found: usize) -> PbcResult<()> {
    if expected != found {
        return Err(PbcError::ShapeMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = PbcError::StepOutOfRange {
            step: 12,
            n_steps: 10,
        };
        assert_eq!(
            err.to_string(),
            "step 12 out of range for jump matrices with 10 steps"
        );

        let err = PbcError::ShapeMismatch {
            what: "masses",
            expected: 4,
            found: 3,
        };
        assert_eq!(err.to_string(), "masses: expected length 4, found 3");
    }

    #[test]
    fn test_check_len() {
        assert!(check_len("positions", 3, 3).is_ok());
        assert_eq!(
            check_len("positions", 3, 2),
            Err(PbcError::ShapeMismatch {
                what: "positions",
                expected: 3,
                found: 2
            })
        );
    }
}
