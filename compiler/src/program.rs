// program.rs — Program model and scoped construction
//
// A `Program` is a fixed number of modes plus an ordered operation list.
// Operations are appended only inside `Program::context`, whose scope guard
// locks the program on every exit path (normal return, error, panic).
//
// Preconditions: none.
// Postconditions: after `context` returns, the program is locked and immutable.
// Failure modes: appends after lock, wrong register arity, registers out of
//   range or repeated within one operation.
// Side effects: none.

use std::fmt;

use crate::error::ValidationError;
use crate::ops::{Gate, Operation};

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    num_modes: usize,
    operations: Vec<Operation>,
    locked: bool,
}

impl Program {
    pub fn new(num_modes: usize) -> Self {
        Program {
            num_modes,
            operations: Vec::new(),
            locked: false,
        }
    }

    pub fn num_modes(&self) -> usize {
        self.num_modes
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Operations that are measurements, in program order.
    pub fn measurements(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(|op| op.gate.is_measurement())
    }

    /// Open the construction scope.
    ///
    /// `build` appends operations through the supplied context. The program is
    /// locked when the scope closes, whatever `build` returns; a locked program
    /// rejects a second scope with `ValidationError::ProgramLocked`.
    pub fn context<F, E>(&mut self, build: F) -> Result<(), E>
    where
        F: FnOnce(&mut ProgramContext<'_>) -> Result<(), E>,
        E: From<ValidationError>,
    {
        if self.locked {
            return Err(ValidationError::ProgramLocked.into());
        }
        let mut ctx = ProgramContext { program: self };
        build(&mut ctx)
        // ctx drops here and locks the program
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Program({} modes)", self.num_modes)?;
        for op in &self.operations {
            writeln!(f, "  {}", op)?;
        }
        Ok(())
    }
}

// ── Construction scope ──────────────────────────────────────────────────────

/// Live construction scope over a `Program`. Dropping it locks the program.
pub struct ProgramContext<'a> {
    program: &'a mut Program,
}

impl ProgramContext<'_> {
    pub fn num_modes(&self) -> usize {
        self.program.num_modes
    }

    /// Append `gate` acting on `registers`, in the given order.
    pub fn append(&mut self, gate: Gate, registers: &[usize]) -> Result<(), ValidationError> {
        if self.program.locked {
            return Err(ValidationError::ProgramLocked);
        }
        if let Some(m) = gate.matrix() {
            if m.nrows() != m.ncols() {
                return Err(ValidationError::MatrixShape {
                    gate: gate.name().to_string(),
                    rows: m.nrows(),
                    cols: m.ncols(),
                });
            }
        }
        if registers.len() != gate.num_registers() {
            return Err(ValidationError::RegisterArity {
                gate: gate.name().to_string(),
                expected: gate.num_registers(),
                found: registers.len(),
            });
        }
        for (i, &r) in registers.iter().enumerate() {
            if r >= self.program.num_modes || registers[..i].contains(&r) {
                return Err(ValidationError::RegisterInvalid {
                    gate: gate.name().to_string(),
                    register: r,
                    num_modes: self.program.num_modes,
                });
            }
        }
        self.program
            .operations
            .push(Operation::new(gate, registers.to_vec()));
        Ok(())
    }

    /// Operations appended so far.
    pub fn operations(&self) -> &[Operation] {
        &self.program.operations
    }
}

impl Drop for ProgramContext<'_> {
    fn drop(&mut self) {
        self.program.locked = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn context_appends_and_locks() {
        let mut prog = Program::new(3);
        prog.context(|q| {
            q.append(Gate::rgate(0.5), &[0])?;
            q.append(Gate::bsgate(0.1, 0.0), &[2, 1])?;
            Ok::<_, ValidationError>(())
        })
        .unwrap();
        assert!(prog.is_locked());
        assert_eq!(prog.len(), 2);
        assert_eq!(prog.operations()[1].registers, vec![2, 1]);
    }

    #[test]
    fn second_scope_rejected() {
        let mut prog = Program::new(1);
        prog.context(|_| Ok::<_, ValidationError>(())).unwrap();
        let err = prog
            .context(|q| {
                q.append(Gate::rgate(0.5), &[0])?;
                Ok::<_, ValidationError>(())
            })
            .unwrap_err();
        assert_eq!(err, ValidationError::ProgramLocked);
        assert!(prog.is_empty());
    }

    #[test]
    fn failing_scope_still_locks() {
        let mut prog = Program::new(2);
        let res: Result<(), Error> = prog.context(|q| {
            q.append(Gate::rgate(0.5), &[0])?;
            q.append(Gate::rgate(0.5), &[5])?;
            Ok(())
        });
        assert!(matches!(
            res,
            Err(Error::Validation(ValidationError::RegisterInvalid { register: 5, .. }))
        ));
        assert!(prog.is_locked());
        assert_eq!(prog.len(), 1);
    }

    #[test]
    fn panicking_scope_still_locks() {
        let mut prog = Program::new(1);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = prog.context(|_| -> Result<(), ValidationError> { panic!("boom") });
        }));
        assert!(outcome.is_err());
        assert!(prog.is_locked());
    }

    #[test]
    fn arity_and_duplicates_rejected() {
        let mut prog = Program::new(2);
        let res = prog.context(|q| q.append(Gate::bsgate(0.1, 0.0), &[0]));
        assert!(matches!(
            res,
            Err(ValidationError::RegisterArity {
                expected: 2,
                found: 1,
                ..
            })
        ));

        let mut prog = Program::new(2);
        let res = prog.context(|q| q.append(Gate::bsgate(0.1, 0.0), &[1, 1]));
        assert!(matches!(
            res,
            Err(ValidationError::RegisterInvalid { register: 1, .. })
        ));
    }

    #[test]
    fn non_square_matrix_rejected() {
        let mut prog = Program::new(3);
        let m = ndarray::Array2::zeros((2, 3));
        let res = prog.context(|q| q.append(Gate::passive_channel(m), &[0, 1]));
        assert!(matches!(
            res,
            Err(ValidationError::MatrixShape { rows: 2, cols: 3, .. })
        ));
    }

    #[test]
    fn display_lists_operations() {
        let mut prog = Program::new(2);
        prog.context(|q| {
            q.append(Gate::sgate(0.5, 0.0), &[1])?;
            q.append(Gate::homodyne(0.0), &[0])
        })
        .unwrap();
        assert_eq!(
            prog.to_string(),
            "Program(2 modes)\n  Sgate(0.5, 0) | 1\n  MeasureHomodyne(0) | 0\n"
        );
    }
}
