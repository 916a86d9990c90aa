// ops.rs — Operation model
//
// A closed set of gate variants grouped by physical class (passive unitary,
// passive lossy, measurement, other) so the passive compiler and the device
// validator can match exhaustively. Parameters are either literals or
// references to a TDM placeholder bound elsewhere.
//
// Preconditions: none (data-only module).
// Postconditions: `Operation`s are immutable values; binding produces a copy.
// Failure modes: binding an out-of-range placeholder reports `UnknownPlaceholder`.
// Side effects: none.

use std::f64::consts::PI;
use std::fmt;

use ndarray::Array2;
use num_complex::Complex64;

use crate::error::ValidationError;

// ── Parameters ──────────────────────────────────────────────────────────────

/// Handle to a placeholder bound to one value list per timebin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamRef {
    pub index: usize,
    pub name: String,
}

impl ParamRef {
    pub fn new(index: usize) -> Self {
        ParamRef {
            index,
            name: format!("p{}", index),
        }
    }
}

/// A scalar gate argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Literal(f64),
    Symbolic(ParamRef),
}

impl Param {
    pub fn as_literal(&self) -> Option<f64> {
        match self {
            Param::Literal(v) => Some(*v),
            Param::Symbolic(_) => None,
        }
    }

    /// Substitute the value bound at this timebin. `values[i]` is the value of placeholder `i`.
    pub fn bind(&self, values: &[f64]) -> Result<Param, ValidationError> {
        match self {
            Param::Literal(v) => Ok(Param::Literal(*v)),
            Param::Symbolic(r) => values.get(r.index).map(|v| Param::Literal(*v)).ok_or_else(
                || ValidationError::UnknownPlaceholder {
                    name: r.name.clone(),
                    bound: values.len(),
                },
            ),
        }
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Literal(v)
    }
}

impl From<ParamRef> for Param {
    fn from(r: ParamRef) -> Self {
        Param::Symbolic(r)
    }
}

impl From<&ParamRef> for Param {
    fn from(r: &ParamRef) -> Self {
        Param::Symbolic(r.clone())
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Literal(v) => write!(f, "{}", v),
            Param::Symbolic(r) => write!(f, "{}", r.name),
        }
    }
}

// ── Gates ───────────────────────────────────────────────────────────────────

/// Unitary linear-optical transforms.
#[derive(Debug, Clone, PartialEq)]
pub enum PassiveGate {
    /// Phase rotation by φ.
    Rgate(Param),
    /// Beamsplitter with transmissivity angle θ and phase φ.
    BSgate(Param, Param),
    /// Mach-Zehnder interferometer with internal and external phases.
    MZgate(Param, Param),
    /// Arbitrary unitary on n registers.
    Interferometer(Array2<Complex64>),
}

/// Non-unitary linear transforms.
#[derive(Debug, Clone, PartialEq)]
pub enum LossyGate {
    /// Loss with transmissivity τ in [0, 1].
    LossChannel(Param),
    /// Arbitrary linear (possibly non-unitary) map on n registers.
    PassiveChannel(Array2<Complex64>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    /// Homodyne detection at quadrature angle φ.
    Homodyne(Param),
    Fock,
}

/// Operations that add energy or squeezing.
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveGate {
    Sgate(Param, Param),
    Dgate(Param, Param),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    Passive(PassiveGate),
    Lossy(LossyGate),
    Measurement(Measurement),
    Other(ActiveGate),
}

impl Gate {
    pub fn rgate(phi: impl Into<Param>) -> Self {
        Gate::Passive(PassiveGate::Rgate(phi.into()))
    }

    pub fn bsgate(theta: impl Into<Param>, phi: impl Into<Param>) -> Self {
        Gate::Passive(PassiveGate::BSgate(theta.into(), phi.into()))
    }

    pub fn mzgate(phi_in: impl Into<Param>, phi_ex: impl Into<Param>) -> Self {
        Gate::Passive(PassiveGate::MZgate(phi_in.into(), phi_ex.into()))
    }

    pub fn interferometer(u: Array2<Complex64>) -> Self {
        Gate::Passive(PassiveGate::Interferometer(u))
    }

    pub fn loss(transmissivity: impl Into<Param>) -> Self {
        Gate::Lossy(LossyGate::LossChannel(transmissivity.into()))
    }

    pub fn passive_channel(t: Array2<Complex64>) -> Self {
        Gate::Lossy(LossyGate::PassiveChannel(t))
    }

    pub fn homodyne(phi: impl Into<Param>) -> Self {
        Gate::Measurement(Measurement::Homodyne(phi.into()))
    }

    pub fn fock() -> Self {
        Gate::Measurement(Measurement::Fock)
    }

    pub fn sgate(r: impl Into<Param>, phi: impl Into<Param>) -> Self {
        Gate::Other(ActiveGate::Sgate(r.into(), phi.into()))
    }

    pub fn dgate(r: impl Into<Param>, phi: impl Into<Param>) -> Self {
        Gate::Other(ActiveGate::Dgate(r.into(), phi.into()))
    }

    /// Build a scalar-parameter gate from its layout name, filling omitted
    /// trailing arguments with the gate's defaults. Matrix-valued gates have no
    /// layout form and return `None`, as do unknown names and surplus arguments.
    pub fn from_name(name: &str, args: Vec<Param>) -> Option<Gate> {
        let proto = Gate::prototype(name)?;
        let arity = proto.params().len();
        if args.len() > arity {
            return None;
        }
        let mut full = args;
        for i in full.len()..arity {
            full.push(Param::Literal(proto.param_default(i)?));
        }
        let mut it = full.into_iter();
        let mut next = || it.next().unwrap_or(Param::Literal(0.0));
        Some(match proto {
            Gate::Passive(PassiveGate::Rgate(_)) => Gate::rgate(next()),
            Gate::Passive(PassiveGate::BSgate(..)) => Gate::bsgate(next(), next()),
            Gate::Passive(PassiveGate::MZgate(..)) => Gate::mzgate(next(), next()),
            Gate::Lossy(LossyGate::LossChannel(_)) => Gate::loss(next()),
            Gate::Measurement(Measurement::Homodyne(_)) => Gate::homodyne(next()),
            Gate::Other(ActiveGate::Sgate(..)) => Gate::sgate(next(), next()),
            Gate::Other(ActiveGate::Dgate(..)) => Gate::dgate(next(), next()),
            other => other,
        })
    }

    /// Maximum number of scalar arguments a named gate takes, or `None` for
    /// names with no layout form.
    pub fn layout_arity(name: &str) -> Option<usize> {
        Gate::prototype(name).map(|g| g.params().len())
    }

    fn prototype(name: &str) -> Option<Gate> {
        Some(match name {
            "Rgate" => Gate::rgate(0.0),
            "BSgate" => Gate::bsgate(0.0, 0.0),
            "MZgate" => Gate::mzgate(0.0, 0.0),
            "LossChannel" => Gate::loss(0.0),
            "MeasureHomodyne" | "MeasureX" => Gate::homodyne(0.0),
            "MeasureFock" => Gate::fock(),
            "Sgate" => Gate::sgate(0.0, 0.0),
            "Dgate" => Gate::dgate(0.0, 0.0),
            _ => return None,
        })
    }

    /// Layout/display name.
    pub fn name(&self) -> &'static str {
        match self {
            Gate::Passive(PassiveGate::Rgate(_)) => "Rgate",
            Gate::Passive(PassiveGate::BSgate(..)) => "BSgate",
            Gate::Passive(PassiveGate::MZgate(..)) => "MZgate",
            Gate::Passive(PassiveGate::Interferometer(_)) => "Interferometer",
            Gate::Lossy(LossyGate::LossChannel(_)) => "LossChannel",
            Gate::Lossy(LossyGate::PassiveChannel(_)) => "PassiveChannel",
            Gate::Measurement(Measurement::Homodyne(_)) => "MeasureHomodyne",
            Gate::Measurement(Measurement::Fock) => "MeasureFock",
            Gate::Other(ActiveGate::Sgate(..)) => "Sgate",
            Gate::Other(ActiveGate::Dgate(..)) => "Dgate",
        }
    }

    pub fn is_passive(&self) -> bool {
        matches!(self, Gate::Passive(_) | Gate::Lossy(_))
    }

    pub fn is_measurement(&self) -> bool {
        matches!(self, Gate::Measurement(_))
    }

    /// Scalar parameters in declaration order. Matrix-valued gates have none.
    pub fn params(&self) -> Vec<&Param> {
        match self {
            Gate::Passive(PassiveGate::Rgate(p))
            | Gate::Lossy(LossyGate::LossChannel(p))
            | Gate::Measurement(Measurement::Homodyne(p)) => vec![p],
            Gate::Passive(PassiveGate::BSgate(a, b))
            | Gate::Passive(PassiveGate::MZgate(a, b))
            | Gate::Other(ActiveGate::Sgate(a, b))
            | Gate::Other(ActiveGate::Dgate(a, b)) => vec![a, b],
            Gate::Passive(PassiveGate::Interferometer(_))
            | Gate::Lossy(LossyGate::PassiveChannel(_))
            | Gate::Measurement(Measurement::Fock) => Vec::new(),
        }
    }

    /// Value assumed when a layout omits the argument at `index`.
    pub fn param_default(&self, index: usize) -> Option<f64> {
        match (self, index) {
            (Gate::Passive(PassiveGate::BSgate(..)), 0) => Some(PI / 4.0),
            (Gate::Passive(PassiveGate::BSgate(..)), 1) => Some(0.0),
            (Gate::Measurement(Measurement::Homodyne(_)), 0) => Some(0.0),
            (Gate::Other(_), 1) => Some(0.0),
            _ => None,
        }
    }

    /// Number of registers the gate acts on.
    pub fn num_registers(&self) -> usize {
        match self {
            Gate::Passive(PassiveGate::BSgate(..)) | Gate::Passive(PassiveGate::MZgate(..)) => 2,
            Gate::Passive(PassiveGate::Interferometer(m))
            | Gate::Lossy(LossyGate::PassiveChannel(m)) => m.nrows(),
            _ => 1,
        }
    }

    /// Matrix argument, for matrix-valued gates.
    pub fn matrix(&self) -> Option<&Array2<Complex64>> {
        match self {
            Gate::Passive(PassiveGate::Interferometer(m))
            | Gate::Lossy(LossyGate::PassiveChannel(m)) => Some(m),
            _ => None,
        }
    }

    /// Copy with every placeholder replaced by its value at one timebin.
    pub fn bind(&self, values: &[f64]) -> Result<Gate, ValidationError> {
        Ok(match self {
            Gate::Passive(PassiveGate::Rgate(p)) => Gate::rgate(p.bind(values)?),
            Gate::Passive(PassiveGate::BSgate(a, b)) => {
                Gate::bsgate(a.bind(values)?, b.bind(values)?)
            }
            Gate::Passive(PassiveGate::MZgate(a, b)) => {
                Gate::mzgate(a.bind(values)?, b.bind(values)?)
            }
            Gate::Lossy(LossyGate::LossChannel(p)) => Gate::loss(p.bind(values)?),
            Gate::Measurement(Measurement::Homodyne(p)) => Gate::homodyne(p.bind(values)?),
            Gate::Other(ActiveGate::Sgate(a, b)) => Gate::sgate(a.bind(values)?, b.bind(values)?),
            Gate::Other(ActiveGate::Dgate(a, b)) => Gate::dgate(a.bind(values)?, b.bind(values)?),
            other => other.clone(),
        })
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(m) = self.matrix() {
            return write!(f, "{}(<{}x{} matrix>)", self.name(), m.nrows(), m.ncols());
        }
        let params: Vec<String> = self.params().iter().map(|p| p.to_string()).collect();
        if params.is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}({})", self.name(), params.join(", "))
        }
    }
}

// ── Operation ───────────────────────────────────────────────────────────────

/// A gate applied to an ordered list of registers.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub gate: Gate,
    pub registers: Vec<usize>,
}

impl Operation {
    pub fn new(gate: Gate, registers: Vec<usize>) -> Self {
        Operation { gate, registers }
    }

    pub fn bind(&self, values: &[f64]) -> Result<Operation, ValidationError> {
        Ok(Operation {
            gate: self.gate.bind(values)?,
            registers: self.registers.clone(),
        })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.registers.as_slice() {
            [r] => write!(f, "{} | {}", self.gate, r),
            regs => {
                let regs: Vec<String> = regs.iter().map(|r| r.to_string()).collect();
                write!(f, "{} | ({})", self.gate, regs.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_layout_syntax() {
        let op = Operation::new(Gate::bsgate(&ParamRef::new(0), 0.0), vec![1, 0]);
        assert_eq!(op.to_string(), "BSgate(p0, 0) | (1, 0)");
        let op = Operation::new(Gate::homodyne(&ParamRef::new(2)), vec![0]);
        assert_eq!(op.to_string(), "MeasureHomodyne(p2) | 0");
        let op = Operation::new(Gate::fock(), vec![3]);
        assert_eq!(op.to_string(), "MeasureFock | 3");
    }

    #[test]
    fn matrix_gate_display_and_arity() {
        let g = Gate::interferometer(Array2::eye(3));
        assert_eq!(g.num_registers(), 3);
        assert_eq!(g.to_string(), "Interferometer(<3x3 matrix>)");
        assert!(g.params().is_empty());
    }

    #[test]
    fn classification() {
        assert!(Gate::rgate(0.1).is_passive());
        assert!(Gate::loss(0.5).is_passive());
        assert!(!Gate::sgate(1.0, 0.0).is_passive());
        assert!(!Gate::homodyne(0.0).is_passive());
        assert!(Gate::homodyne(0.0).is_measurement());
    }

    #[test]
    fn bind_substitutes_placeholders() {
        let op = Operation::new(Gate::bsgate(&ParamRef::new(1), 0.5), vec![0, 1]);
        let bound = op.bind(&[10.0, 20.0]).unwrap();
        assert_eq!(bound.gate, Gate::bsgate(20.0, 0.5));
        assert_eq!(bound.registers, vec![0, 1]);
    }

    #[test]
    fn bind_reports_missing_placeholder() {
        let op = Operation::new(Gate::rgate(&ParamRef::new(3)), vec![0]);
        let err = op.bind(&[1.0]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownPlaceholder {
                name: "p3".into(),
                bound: 1
            }
        );
    }

    #[test]
    fn from_name_fills_defaults() {
        let g = Gate::from_name("Sgate", vec![Param::Literal(0.5)]).unwrap();
        assert_eq!(g, Gate::sgate(0.5, 0.0));
        let g = Gate::from_name("BSgate", Vec::new()).unwrap();
        assert_eq!(g, Gate::bsgate(PI / 4.0, 0.0));
        assert!(Gate::from_name("Rgate", Vec::new()).is_none());
        assert!(Gate::from_name("Rgate", vec![0.0.into(), 1.0.into()]).is_none());
        assert!(Gate::from_name("Kgate", vec![0.0.into()]).is_none());
        assert_eq!(Gate::from_name("MeasureFock", Vec::new()), Some(Gate::fock()));
        assert_eq!(Gate::layout_arity("MZgate"), Some(2));
        assert_eq!(Gate::layout_arity("Interferometer"), None);
    }
}
