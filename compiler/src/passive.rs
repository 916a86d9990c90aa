// passive.rs — Passive reduction compiler
//
// Collapses a sequence of passive operations over N modes into one linear
// transfer matrix T, then emits a single `PassiveChannel` restricted to the
// registers actually touched.
//
// Preconditions: every operation is passive with numeric parameters.
// Postconditions: applying the emitted channel once equals applying the input
//   operations in order; the emitted register list is sorted and equals the set
//   of targeted registers.
// Failure modes: `CompileError::NotPassive`, `RegisterOutOfRange`,
//   `DuplicateRegister`, `RegisterArity`, `MatrixShape`, `SymbolicParameter`,
//   `ParameterDomain` (loss outside [0, 1]).
// Side effects: none (emits `tracing` debug events).

use std::collections::BTreeSet;

use ndarray::{Array2, Axis};
use num_complex::Complex64;
use tracing::debug;

use crate::error::CompileError;
use crate::ops::{Gate, LossyGate, Operation, Param, PassiveGate};

/// Result of a passive reduction: the full transfer matrix and its active part.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    /// N×N transfer matrix.
    pub transfer: Array2<Complex64>,
    /// Sorted registers targeted by at least one operation.
    pub active: Vec<usize>,
}

impl Reduction {
    /// `transfer` restricted to the active registers (rows and columns).
    pub fn active_matrix(&self) -> Array2<Complex64> {
        self.transfer
            .select(Axis(0), &self.active)
            .select(Axis(1), &self.active)
    }

    /// The single compiled operation carrying the active submatrix.
    pub fn into_operation(self) -> Operation {
        let m = self.active_matrix();
        Operation::new(Gate::passive_channel(m), self.active)
    }
}

/// Matrix of one passive gate, or the reason it has none.
pub fn gate_matrix(index: usize, gate: &Gate) -> Result<Array2<Complex64>, CompileError> {
    let value = |p: &Param| {
        p.as_literal().ok_or_else(|| CompileError::SymbolicParameter {
            index,
            gate: gate.name().to_string(),
            name: p.to_string(),
        })
    };
    let i = Complex64::i();
    let one = Complex64::new(1.0, 0.0);
    match gate {
        Gate::Passive(PassiveGate::Rgate(phi)) => {
            let phi = value(phi)?;
            Ok(Array2::from_elem((1, 1), Complex64::from_polar(1.0, phi)))
        }
        Gate::Passive(PassiveGate::BSgate(theta, phi)) => {
            let (theta, phi) = (value(theta)?, value(phi)?);
            let (s, c) = theta.sin_cos();
            let e = Complex64::from_polar(1.0, phi);
            Ok(ndarray::arr2(&[
                [Complex64::new(c, 0.0), -e.conj() * s],
                [e * s, Complex64::new(c, 0.0)],
            ]))
        }
        Gate::Passive(PassiveGate::MZgate(phi_in, phi_ex)) => {
            let (phi_in, phi_ex) = (value(phi_in)?, value(phi_ex)?);
            let e_in = Complex64::from_polar(1.0, phi_in);
            let e_ex = Complex64::from_polar(1.0, phi_ex);
            Ok(ndarray::arr2(&[
                [e_ex * (e_in - one), i * (one + e_in)],
                [i * e_ex * (one + e_in), one - e_in],
            ])
            .mapv(|z| z * 0.5))
        }
        Gate::Passive(PassiveGate::Interferometer(u)) => Ok(u.clone()),
        Gate::Lossy(LossyGate::LossChannel(tau)) => {
            let tau = value(tau)?;
            if !(0.0..=1.0).contains(&tau) {
                return Err(CompileError::ParameterDomain {
                    index,
                    gate: gate.name().to_string(),
                    value: tau,
                });
            }
            Ok(Array2::from_elem((1, 1), Complex64::new(tau.sqrt(), 0.0)))
        }
        Gate::Lossy(LossyGate::PassiveChannel(t)) => Ok(t.clone()),
        Gate::Measurement(_) | Gate::Other(_) => Err(CompileError::NotPassive {
            index,
            gate: gate.to_string(),
        }),
    }
}

/// Compose `operations` over `num_modes` modes into one transfer matrix.
///
/// Each operation's matrix M over registers R replaces rows R of T with
/// `M · T[R, :]`, so later operations act on the output of earlier ones.
pub fn reduce(num_modes: usize, operations: &[Operation]) -> Result<Reduction, CompileError> {
    let mut transfer: Array2<Complex64> = Array2::eye(num_modes);
    let mut active = BTreeSet::new();

    for (index, op) in operations.iter().enumerate() {
        if let Some(&register) = op.registers.iter().find(|&&r| r >= num_modes) {
            return Err(CompileError::RegisterOutOfRange {
                index,
                register,
                num_modes,
            });
        }
        let repeated = op
            .registers
            .iter()
            .enumerate()
            .find(|&(k, r)| op.registers[..k].contains(r));
        if let Some((_, &register)) = repeated {
            return Err(CompileError::DuplicateRegister {
                index,
                gate: op.gate.name().to_string(),
                register,
            });
        }
        let m = gate_matrix(index, &op.gate)?;
        if m.nrows() != m.ncols() {
            return Err(CompileError::MatrixShape {
                index,
                gate: op.gate.name().to_string(),
                rows: m.nrows(),
                cols: m.ncols(),
            });
        }
        if m.nrows() != op.registers.len() {
            return Err(CompileError::RegisterArity {
                index,
                gate: op.gate.name().to_string(),
                expected: m.nrows(),
                found: op.registers.len(),
            });
        }
        let rows = transfer.select(Axis(0), &op.registers);
        let updated = m.dot(&rows);
        for (k, &r) in op.registers.iter().enumerate() {
            transfer.row_mut(r).assign(&updated.row(k));
        }
        active.extend(op.registers.iter().copied());
    }

    debug!(
        modes = num_modes,
        operations = operations.len(),
        active = active.len(),
        "passive reduction complete"
    );
    Ok(Reduction {
        transfer,
        active: active.into_iter().collect(),
    })
}
