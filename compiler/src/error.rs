// error.rs — Error types for every phase
//
// Each phase owns one error enum; `Error` collects them so `?` composes across
// construction, compilation, validation and execution. Every variant maps to a
// stable `DiagCode` and renders into a `Diagnostic` for the CLI.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::diag::{codes, DiagCode, Diagnostic};
use crate::layout::Span;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

// ── Program validation ──────────────────────────────────────────────────────

/// Malformed program structure, detected without reference to any device.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// An operation was appended after the construction scope closed.
    ProgramLocked,
    /// Wrong number of target registers for a gate.
    RegisterArity {
        gate: String,
        expected: usize,
        found: usize,
    },
    /// A register index outside the program's modes, or used twice by one operation.
    RegisterInvalid {
        gate: String,
        register: usize,
        num_modes: usize,
    },
    /// A matrix-valued gate whose matrix is not square.
    MatrixShape {
        gate: String,
        rows: usize,
        cols: usize,
    },
    UnequalParameterLengths {
        lengths: Vec<usize>,
    },
    NoMeasurements,
    SpatialModeMismatch {
        measurements: usize,
        spatial_modes: usize,
    },
    BatchedPrograms {
        count: usize,
    },
    /// A placeholder reference with no bound value list.
    UnknownPlaceholder {
        name: String,
        bound: usize,
    },
    /// Concurrent-mode counts that cannot describe a device (empty, or zero depth).
    InvalidModes(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::ProgramLocked => {
                write!(f, "The program is locked, no more operations can be appended.")
            }
            ValidationError::RegisterArity {
                gate,
                expected,
                found,
            } => write!(
                f,
                "{} acts on {} register(s), but {} were given.",
                gate, expected, found
            ),
            ValidationError::RegisterInvalid {
                gate,
                register,
                num_modes,
            } => write!(
                f,
                "{} cannot act on register {}: registers must be distinct and below {}.",
                gate, register, num_modes
            ),
            ValidationError::MatrixShape { gate, rows, cols } => {
                write!(f, "{} requires a square matrix, got {}x{}.", gate, rows, cols)
            }
            ValidationError::UnequalParameterLengths { lengths } => write!(
                f,
                "Gate-parameter lists must be of equal length. Got lengths {:?}.",
                lengths
            ),
            ValidationError::NoMeasurements => write!(f, "Must be at least one measurement."),
            ValidationError::SpatialModeMismatch {
                measurements,
                spatial_modes,
            } => write!(
                f,
                "Number of measurement operators must match number of spatial modes. \
                 Got {} measurement(s) for {} spatial mode(s).",
                measurements, spatial_modes
            ),
            ValidationError::BatchedPrograms { count } => write!(
                f,
                "Lists of TDM programs are not currently supported (got {} programs).",
                count
            ),
            ValidationError::UnknownPlaceholder { name, bound } => write!(
                f,
                "Placeholder '{}' has no value list; {} list(s) were bound.",
                name, bound
            ),
            ValidationError::InvalidModes(msg) => write!(f, "Invalid mode layout: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn code(&self) -> DiagCode {
        match self {
            ValidationError::ProgramLocked => codes::PROGRAM_LOCKED,
            ValidationError::RegisterArity { .. } => codes::REGISTER_ARITY,
            ValidationError::RegisterInvalid { .. } | ValidationError::MatrixShape { .. } => {
                codes::REGISTER_INVALID
            }
            ValidationError::UnequalParameterLengths { .. } => codes::UNEQUAL_PARAMETER_LENGTHS,
            ValidationError::NoMeasurements => codes::NO_MEASUREMENTS,
            ValidationError::SpatialModeMismatch { .. } => codes::SPATIAL_MODE_MISMATCH,
            ValidationError::BatchedPrograms { .. } => codes::BATCHED_PROGRAMS,
            ValidationError::UnknownPlaceholder { .. } => codes::UNKNOWN_PLACEHOLDER,
            ValidationError::InvalidModes(_) => codes::INVALID_MODES,
        }
    }
}

// ── Compilation ─────────────────────────────────────────────────────────────

/// A compile call that cannot produce output for its input circuit.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    NotPassive {
        index: usize,
        gate: String,
    },
    RegisterOutOfRange {
        index: usize,
        register: usize,
        num_modes: usize,
    },
    /// A passive gate whose parameter is still a placeholder.
    SymbolicParameter {
        index: usize,
        gate: String,
        name: String,
    },
    UnknownCompiler(String),
    /// Register count differs from the gate's matrix size.
    RegisterArity {
        index: usize,
        gate: String,
        expected: usize,
        found: usize,
    },
    /// One register listed twice by the same operation.
    DuplicateRegister {
        index: usize,
        gate: String,
        register: usize,
    },
    /// A matrix-valued gate whose matrix is not square.
    MatrixShape {
        index: usize,
        gate: String,
        rows: usize,
        cols: usize,
    },
    /// A numeric parameter outside the gate's physical range.
    ParameterDomain {
        index: usize,
        gate: String,
        value: f64,
    },
    /// An operation outside the compiler's primitive set.
    UnsupportedOperation {
        compiler: String,
        index: usize,
        gate: String,
    },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::NotPassive { index, gate } => write!(
                f,
                "The passive compiler only accepts passive operations, but operation {} is {}.",
                index, gate
            ),
            CompileError::RegisterOutOfRange {
                index,
                register,
                num_modes,
            } => write!(
                f,
                "Operation {} targets register {}, outside the {} declared mode(s).",
                index, register, num_modes
            ),
            CompileError::SymbolicParameter { index, gate, name } => write!(
                f,
                "Operation {} ({}) has unbound parameter '{}'; passive compilation needs numeric values.",
                index, gate, name
            ),
            CompileError::UnknownCompiler(name) => write!(f, "Unknown compiler '{}'.", name),
            CompileError::RegisterArity {
                index,
                gate,
                expected,
                found,
            } => write!(
                f,
                "Operation {} ({}) acts on {} register(s), but {} were given.",
                index, gate, expected, found
            ),
            CompileError::DuplicateRegister {
                index,
                gate,
                register,
            } => write!(
                f,
                "Operation {} ({}) lists register {} more than once.",
                index, gate, register
            ),
            CompileError::MatrixShape {
                index,
                gate,
                rows,
                cols,
            } => write!(
                f,
                "Operation {} ({}) requires a square matrix, got {}x{}.",
                index, gate, rows, cols
            ),
            CompileError::ParameterDomain { index, gate, value } => write!(
                f,
                "Operation {} ({}) has parameter {} outside [0, 1].",
                index, gate, value
            ),
            CompileError::UnsupportedOperation {
                compiler,
                index,
                gate,
            } => write!(
                f,
                "The {} compiler does not support {} (operation {}).",
                compiler, gate, index
            ),
        }
    }
}

impl std::error::Error for CompileError {}

impl CompileError {
    pub fn code(&self) -> DiagCode {
        match self {
            CompileError::NotPassive { .. } => codes::NOT_PASSIVE,
            CompileError::RegisterOutOfRange { .. } => codes::REGISTER_OUT_OF_RANGE,
            CompileError::SymbolicParameter { .. } => codes::SYMBOLIC_PARAMETER,
            CompileError::UnknownCompiler(_) => codes::UNKNOWN_COMPILER,
            CompileError::RegisterArity { .. } | CompileError::MatrixShape { .. } => {
                codes::OPERATION_ARITY
            }
            CompileError::DuplicateRegister { .. } => codes::DUPLICATE_REGISTER,
            CompileError::ParameterDomain { .. } => codes::PARAMETER_DOMAIN,
            CompileError::UnsupportedOperation { .. } => codes::UNSUPPORTED_OPERATION,
        }
    }
}

// ── Device incompatibility ──────────────────────────────────────────────────

/// A program that cannot run on the described device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceError {
    UnsupportedTarget {
        device: String,
        target: String,
        accepted: Vec<String>,
    },
    /// Gate kind (or gate count) differs from the layout at `position`.
    GateMismatch {
        device: String,
        position: usize,
        expected: Option<String>,
        found: Option<String>,
    },
    ModeOrdering {
        device: String,
        position: usize,
        gate: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    /// `valid` is the declared allowed-value specification, rendered verbatim.
    Parameter {
        device: String,
        position: usize,
        gate: String,
        value: f64,
        valid: String,
    },
    TemporalModes {
        device: String,
        requested: usize,
        limit: usize,
    },
    ConcurrentModes {
        device: String,
        requested: usize,
        limit: usize,
    },
    SpatialModes {
        device: String,
        requested: usize,
        limit: usize,
    },
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::UnsupportedTarget {
                device,
                target,
                accepted,
            } => write!(
                f,
                "The device '{}' does not accept compiler target '{}'; accepted targets: {}.",
                device,
                target,
                accepted.join(", ")
            ),
            DeviceError::GateMismatch {
                device,
                position,
                expected,
                found,
            } => write!(
                f,
                "The gates or the order of gates used in the Program are incompatible with the device '{}' \
                 (position {}: expected {}, found {}).",
                device,
                position,
                expected.as_deref().unwrap_or("end of program"),
                found.as_deref().unwrap_or("end of program"),
            ),
            DeviceError::ModeOrdering {
                device,
                position,
                gate,
                expected,
                found,
            } => write!(
                f,
                "Program cannot be used with the device '{}' due to incompatible mode ordering. \
                 {} at position {} acts on {:?}, expected {:?}.",
                device, gate, position, found, expected
            ),
            DeviceError::Parameter {
                device,
                position,
                gate,
                value,
                valid,
            } => write!(
                f,
                "Program cannot be used with the device '{}' due to incompatible parameter. \
                 Parameter has value '{}' while its valid range is {} ({} at position {}).",
                device, value, valid, gate, position
            ),
            DeviceError::TemporalModes {
                device,
                requested,
                limit,
            } => write!(
                f,
                "This program contains {} temporal modes, but the device '{}' only supports up to {} modes.",
                requested, device, limit
            ),
            DeviceError::ConcurrentModes {
                device,
                requested,
                limit,
            } => write!(
                f,
                "This program contains {} concurrent modes, but the device '{}' only supports up to {} concurrent modes.",
                requested, device, limit
            ),
            DeviceError::SpatialModes {
                device,
                requested,
                limit,
            } => write!(
                f,
                "This program contains {} spatial modes, but the device '{}' only supports up to {} spatial modes.",
                requested, device, limit
            ),
        }
    }
}

impl std::error::Error for DeviceError {}

impl DeviceError {
    pub fn code(&self) -> DiagCode {
        match self {
            DeviceError::UnsupportedTarget { .. } => codes::UNSUPPORTED_TARGET,
            DeviceError::GateMismatch { .. } => codes::GATE_MISMATCH,
            DeviceError::ModeOrdering { .. } => codes::MODE_ORDERING,
            DeviceError::Parameter { .. } => codes::PARAMETER_RANGE,
            DeviceError::TemporalModes { .. } => codes::TEMPORAL_MODES,
            DeviceError::ConcurrentModes { .. } => codes::CONCURRENT_MODES,
            DeviceError::SpatialModes { .. } => codes::SPATIAL_MODES,
        }
    }
}

// ── Layout / device record ──────────────────────────────────────────────────

/// A device description that could not be read.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// Lex or parse errors in the layout text.
    Syntax { errors: Vec<(Span, String)> },
    /// The device record itself is malformed.
    Record(String),
    /// A required header line is missing or malformed.
    Header(String),
    /// A gate line names a gate the operation library does not know.
    UnknownGate { name: String, span: Span },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::Syntax { errors } => match errors.first() {
                Some((_, first)) if errors.len() > 1 => write!(
                    f,
                    "layout syntax error: {} (and {} more)",
                    first,
                    errors.len() - 1
                ),
                Some((_, first)) => write!(f, "layout syntax error: {}", first),
                None => write!(f, "layout syntax error"),
            },
            LayoutError::Record(msg) => write!(f, "invalid device record: {}", msg),
            LayoutError::Header(msg) => write!(f, "invalid layout header: {}", msg),
            LayoutError::UnknownGate { name, .. } => {
                write!(f, "layout uses unknown gate '{}'", name)
            }
        }
    }
}

impl std::error::Error for LayoutError {}

impl From<serde_json::Error> for LayoutError {
    fn from(e: serde_json::Error) -> Self {
        LayoutError::Record(e.to_string())
    }
}

impl LayoutError {
    pub fn code(&self) -> DiagCode {
        match self {
            LayoutError::Syntax { .. } => codes::LAYOUT_SYNTAX,
            LayoutError::Record(_) => codes::LAYOUT_RECORD,
            LayoutError::Header(_) => codes::LAYOUT_HEADER,
            LayoutError::UnknownGate { .. } => codes::LAYOUT_UNKNOWN_GATE,
        }
    }
}

// ── Backend ─────────────────────────────────────────────────────────────────

/// Failure reported by an execution backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendError {
    pub backend: String,
    pub message: String,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backend '{}' failed: {}", self.backend, self.message)
    }
}

impl std::error::Error for BackendError {}

// ── Top-level error ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Validation(ValidationError),
    Compile(CompileError),
    Device(DeviceError),
    Layout(LayoutError),
    Backend(BackendError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(e) => write!(f, "{}", e),
            Error::Compile(e) => write!(f, "{}", e),
            Error::Device(e) => write!(f, "{}", e),
            Error::Layout(e) => write!(f, "{}", e),
            Error::Backend(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Validation(e) => Some(e),
            Error::Compile(e) => Some(e),
            Error::Device(e) => Some(e),
            Error::Layout(e) => Some(e),
            Error::Backend(e) => Some(e),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Self {
        Error::Compile(e)
    }
}

impl From<DeviceError> for Error {
    fn from(e: DeviceError) -> Self {
        Error::Device(e)
    }
}

impl From<LayoutError> for Error {
    fn from(e: LayoutError) -> Self {
        Error::Layout(e)
    }
}

impl From<BackendError> for Error {
    fn from(e: BackendError) -> Self {
        Error::Backend(e)
    }
}

impl Error {
    pub fn code(&self) -> DiagCode {
        match self {
            Error::Validation(e) => e.code(),
            Error::Compile(e) => e.code(),
            Error::Device(e) => e.code(),
            Error::Layout(e) => e.code(),
            Error::Backend(_) => codes::BACKEND,
        }
    }

    /// Render as a diagnostic, with a hint where a fix is mechanical.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string()).with_code(self.code());
        match self {
            Error::Layout(LayoutError::Syntax { errors }) => match errors.first() {
                Some((span, _)) => diag.with_span(*span),
                None => diag,
            },
            Error::Layout(LayoutError::UnknownGate { span, .. }) => diag.with_span(*span),
            Error::Device(DeviceError::ModeOrdering { expected, .. }) => {
                diag.with_hint(format!("apply the gate to registers {:?}", expected))
            }
            Error::Device(DeviceError::UnsupportedTarget { accepted, .. }) => {
                diag.with_hint(format!("compile with one of: {}", accepted.join(", ")))
            }
            Error::Compile(CompileError::NotPassive { .. }) => {
                diag.with_hint("remove non-passive operations or use a device compiler")
            }
            _ => diag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn validation_messages_match_documented_text() {
        assert_eq!(
            ValidationError::NoMeasurements.to_string(),
            "Must be at least one measurement."
        );
        assert!(ValidationError::UnequalParameterLengths {
            lengths: vec![4, 5]
        }
        .to_string()
        .starts_with("Gate-parameter lists must be of equal length."));
        assert!(ValidationError::SpatialModeMismatch {
            measurements: 1,
            spatial_modes: 2
        }
        .to_string()
        .starts_with("Number of measurement operators must match number of spatial modes."));
    }

    #[test]
    fn parameter_error_reports_value_and_range() {
        let e = DeviceError::Parameter {
            device: "TD2".into(),
            position: 0,
            gate: "Sgate".into(),
            value: -999.0,
            valid: "[-1]".into(),
        };
        assert!(e
            .to_string()
            .contains("Parameter has value '-999' while its valid range is [-1]"));
    }

    #[test]
    fn bound_errors_are_distinguishable() {
        let t = DeviceError::TemporalModes {
            device: "d".into(),
            requested: 200,
            limit: 100,
        };
        let c = DeviceError::ConcurrentModes {
            device: "d".into(),
            requested: 3,
            limit: 2,
        };
        let s = DeviceError::SpatialModes {
            device: "d".into(),
            requested: 2,
            limit: 1,
        };
        assert!(t.to_string().contains("temporal modes, but the device"));
        assert!(c.to_string().contains("concurrent modes, but the device"));
        assert!(s.to_string().contains("spatial modes, but the device"));
        assert_ne!(t.code(), c.code());
        assert_ne!(c.code(), s.code());
    }

    #[test]
    fn top_level_error_wraps_source() {
        let e: Error = CompileError::UnknownCompiler("foo".into()).into();
        assert!(e.source().is_some());
        assert_eq!(e.code(), codes::UNKNOWN_COMPILER);
        assert_eq!(e.to_string(), "Unknown compiler 'foo'.");
    }

    #[test]
    fn diagnostic_carries_hint_for_mode_ordering() {
        let e: Error = DeviceError::ModeOrdering {
            device: "TD2".into(),
            position: 1,
            gate: "BSgate".into(),
            expected: vec![1, 0],
            found: vec![0, 1],
        }
        .into();
        let d = e.to_diagnostic();
        assert_eq!(d.code, Some(codes::MODE_ORDERING));
        assert_eq!(d.hint.as_deref(), Some("apply the gate to registers [1, 0]"));
    }

    #[test]
    fn serde_error_becomes_record_error() {
        let err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
        let e: LayoutError = err.into();
        assert!(matches!(e, LayoutError::Record(_)));
    }
}
