// compile.rs — Compiler descriptors and the compile entry point
//
// Declares the available compilers, what each accepts, and the target name a
// device record must list to accept its output. `compile` optionally validates
// against a device, then lowers the circuit.
//
// Preconditions: programs have been built (their construction scope closed).
// Postconditions: on success, a fresh `CompiledCircuit`; on failure, nothing.
// Failure modes: `CompileError`, `DeviceError` (when a device is given),
//   `ValidationError`.
// Side effects: none (emits `tracing` events).

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use crate::device::DeviceSpec;
use crate::error::{CompileError, Result, ValidationError};
use crate::ops::Operation;
use crate::passive;
use crate::program::Program;
use crate::tdm::TdmProgram;
use crate::validate::{self, CircuitView};

// ── Compiler identifiers ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compiler {
    /// Collapse passive operations into one transfer matrix.
    Passive,
    /// Time-domain device target; keeps the template and its bindings.
    Tdm,
}

/// Static metadata about a compiler.
pub struct CompilerDescriptor {
    /// Target name matched against a device record's `compiler` list.
    pub target: &'static str,
    /// Other names accepted by `Compiler::from_name`.
    pub aliases: &'static [&'static str],
    /// Gate names the compiler accepts.
    pub primitives: &'static [&'static str],
}

/// Return the static descriptor for a given compiler.
pub fn descriptor(compiler: Compiler) -> CompilerDescriptor {
    match compiler {
        Compiler::Passive => CompilerDescriptor {
            target: "passive",
            aliases: &[],
            primitives: &[
                "Rgate",
                "BSgate",
                "MZgate",
                "Interferometer",
                "LossChannel",
                "PassiveChannel",
            ],
        },
        Compiler::Tdm => CompilerDescriptor {
            target: "TD2",
            aliases: &["tdm", "TDM"],
            primitives: &["Sgate", "Rgate", "BSgate", "MeasureHomodyne", "MeasureFock"],
        },
    }
}

impl Compiler {
    pub const ALL: [Compiler; 2] = [Compiler::Passive, Compiler::Tdm];

    /// Look up a compiler by target name or alias (ASCII case-insensitive).
    pub fn from_name(name: &str) -> std::result::Result<Compiler, CompileError> {
        Compiler::ALL
            .into_iter()
            .find(|&c| {
                let d = descriptor(c);
                d.target.eq_ignore_ascii_case(name)
                    || d.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| CompileError::UnknownCompiler(name.to_string()))
    }

    pub fn target(self) -> &'static str {
        descriptor(self).target
    }
}

impl FromStr for Compiler {
    type Err = CompileError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Compiler::from_name(s)
    }
}

impl fmt::Display for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target())
    }
}

// ── Input and output ────────────────────────────────────────────────────────

/// A circuit accepted by `compile`.
#[derive(Debug, Clone, Copy)]
pub enum Circuit<'a> {
    Program(&'a Program),
    Tdm(&'a TdmProgram),
}

impl<'a> From<&'a Program> for Circuit<'a> {
    fn from(p: &'a Program) -> Self {
        Circuit::Program(p)
    }
}

impl<'a> From<&'a TdmProgram> for Circuit<'a> {
    fn from(p: &'a TdmProgram) -> Self {
        Circuit::Tdm(p)
    }
}

impl<'a> Circuit<'a> {
    fn view(&self) -> CircuitView<'a> {
        match *self {
            Circuit::Program(p) => CircuitView::from(p),
            Circuit::Tdm(p) => p.view(),
        }
    }

    fn num_modes(&self) -> usize {
        match self {
            Circuit::Program(p) => p.num_modes(),
            Circuit::Tdm(p) => p.num_registers(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCircuit {
    pub compiler: Compiler,
    pub num_modes: usize,
    pub operations: Vec<Operation>,
    /// Placeholder value lists carried over from a TDM program.
    pub bindings: Vec<Vec<f64>>,
    /// Fingerprint of the device the circuit was validated against.
    pub device_fingerprint: Option<String>,
}

impl fmt::Display for CompiledCircuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "CompiledCircuit(target={}, {} modes, {} operation(s))",
            self.compiler,
            self.num_modes,
            self.operations.len()
        )?;
        for op in &self.operations {
            writeln!(f, "  {}", op)?;
        }
        if let Some(fp) = &self.device_fingerprint {
            writeln!(f, "  device: {}", fp)?;
        }
        Ok(())
    }
}

// ── Entry point ─────────────────────────────────────────────────────────────

/// Compile `circuit`, validating against `device` first when one is given.
/// All-or-nothing: no output accompanies an error.
pub fn compile<'a>(
    circuit: impl Into<Circuit<'a>>,
    compiler: Compiler,
    device: Option<&DeviceSpec>,
) -> Result<CompiledCircuit> {
    let circuit = circuit.into();
    let view = circuit.view();
    debug!(
        compiler = compiler.target(),
        operations = view.operations.len(),
        device = device.map(|d| d.name()),
        "compile requested"
    );

    if let Circuit::Tdm(p) = circuit {
        if !p.is_built() {
            return Err(ValidationError::NoMeasurements.into());
        }
    }
    if let Some(device) = device {
        validate::validate(&view, compiler.target(), device)?;
    }

    let compiled = match compiler {
        Compiler::Passive => {
            let reduction = passive::reduce(circuit.num_modes(), view.operations)?;
            CompiledCircuit {
                compiler,
                num_modes: circuit.num_modes(),
                operations: vec![reduction.into_operation()],
                bindings: Vec::new(),
                device_fingerprint: None,
            }
        }
        Compiler::Tdm => {
            let primitives = descriptor(compiler).primitives;
            if let Some((index, op)) = view
                .operations
                .iter()
                .enumerate()
                .find(|(_, op)| !primitives.contains(&op.gate.name()))
            {
                return Err(CompileError::UnsupportedOperation {
                    compiler: compiler.target().to_string(),
                    index,
                    gate: op.gate.name().to_string(),
                }
                .into());
            }
            CompiledCircuit {
                compiler,
                num_modes: circuit.num_modes(),
                operations: view.operations.to_vec(),
                bindings: view.bindings.to_vec(),
                device_fingerprint: None,
            }
        }
    };

    let compiled = CompiledCircuit {
        device_fingerprint: device.map(DeviceSpec::fingerprint),
        ..compiled
    };
    info!(
        compiler = compiler.target(),
        operations = compiled.operations.len(),
        "compiled circuit"
    );
    Ok(compiled)
}
