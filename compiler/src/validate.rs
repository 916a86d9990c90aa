// validate.rs — Device compatibility checks
//
// Confirms that a circuit can run on a described device. Each check is a free
// function over a `CircuitView`, so callers can run any subset; `validate`
// runs them all in a fixed order: compiler target, mode bounds, structure,
// parameters. The first failure is returned.
//
// Preconditions: the `DeviceSpec` holds a parsed layout (guaranteed by construction).
// Postconditions: `Ok(())` means every check passed; nothing is mutated.
// Failure modes: `DeviceError` variants carrying the offending position, value,
//   range or bound; `ValidationError::UnknownPlaceholder` when a symbolic
//   argument has no bound value list.
// Side effects: none (emits `tracing` events).

use tracing::{debug, info};

use crate::device::{approx_eq, DeviceSpec};
use crate::error::{DeviceError, Result, ValidationError};
use crate::layout::LayoutArg;
use crate::ops::{Operation, Param};
use crate::program::Program;

// ── Input view ──────────────────────────────────────────────────────────────

/// Mode counts of a circuit, in device terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeCounts {
    /// Concurrent modes per spatial channel; its length is the spatial-mode count.
    pub concurrent: Vec<usize>,
    /// Timebins (temporal modes).
    pub temporal: usize,
}

impl ModeCounts {
    pub fn spatial(&self) -> usize {
        self.concurrent.len()
    }
}

/// Borrowed description of a circuit for validation.
#[derive(Debug, Clone)]
pub struct CircuitView<'a> {
    pub operations: &'a [Operation],
    /// Value list bound to each placeholder, indexed by placeholder number.
    pub bindings: &'a [Vec<f64>],
    pub modes: ModeCounts,
}

impl<'a> From<&'a Program> for CircuitView<'a> {
    /// A plain program is one spatial channel holding all its modes, run once.
    fn from(program: &'a Program) -> Self {
        CircuitView {
            operations: program.operations(),
            bindings: &[],
            modes: ModeCounts {
                concurrent: vec![program.num_modes()],
                temporal: 1,
            },
        }
    }
}

// ── Checks ──────────────────────────────────────────────────────────────────

/// Fails unless the device lists `target` among its accepted compilers.
pub fn check_target(target: &str, device: &DeviceSpec) -> Result<()> {
    if device.accepts_target(target) {
        return Ok(());
    }
    Err(DeviceError::UnsupportedTarget {
        device: device.name().to_string(),
        target: target.to_string(),
        accepted: device.compiler_targets().to_vec(),
    }
    .into())
}

/// Temporal, concurrent and spatial mode counts against the device limits.
pub fn check_mode_bounds(modes: &ModeCounts, device: &DeviceSpec) -> Result<()> {
    let limits = device.modes();
    let name = device.name().to_string();
    if modes.temporal > limits.temporal_max {
        return Err(DeviceError::TemporalModes {
            device: name,
            requested: modes.temporal,
            limit: limits.temporal_max,
        }
        .into());
    }
    if let Some(&n) = modes.concurrent.iter().find(|&&n| n > limits.concurrent) {
        return Err(DeviceError::ConcurrentModes {
            device: name,
            requested: n,
            limit: limits.concurrent,
        }
        .into());
    }
    if modes.spatial() > limits.spatial {
        return Err(DeviceError::SpatialModes {
            device: name,
            requested: modes.spatial(),
            limit: limits.spatial,
        }
        .into());
    }
    Ok(())
}

/// Same operation count, gate kind and register order as the device layout.
pub fn check_layout(operations: &[Operation], device: &DeviceSpec) -> Result<()> {
    let layout = &device.layout().gates;
    for position in 0..operations.len().max(layout.len()) {
        let op = operations.get(position);
        let expected = layout.get(position);
        let (op, expected) = match (op, expected) {
            (Some(op), Some(expected)) if op.gate.name() == canonical_name(&expected.name) => {
                (op, expected)
            }
            (op, expected) => {
                return Err(DeviceError::GateMismatch {
                    device: device.name().to_string(),
                    position,
                    expected: expected.map(|g| canonical_name(&g.name).to_string()),
                    found: op.map(|o| o.gate.name().to_string()),
                }
                .into());
            }
        };
        if op.registers != expected.registers {
            return Err(DeviceError::ModeOrdering {
                device: device.name().to_string(),
                position,
                gate: op.gate.name().to_string(),
                expected: expected.registers.clone(),
                found: op.registers.clone(),
            }
            .into());
        }
    }
    Ok(())
}

/// Every argument value against the layout at the same position.
///
/// A layout literal must be matched exactly; a named layout parameter must
/// satisfy the device's allowed values when it declares any; an argument the
/// layout omits must equal the gate default. A symbolic program argument is
/// checked at every value of its bound list. Assumes `check_layout` passed.
pub fn check_parameters(view: &CircuitView<'_>, device: &DeviceSpec) -> Result<()> {
    for (position, (op, expected)) in view
        .operations
        .iter()
        .zip(&device.layout().gates)
        .enumerate()
    {
        for (i, param) in op.gate.params().into_iter().enumerate() {
            let values: &[f64] = match param {
                Param::Literal(v) => std::slice::from_ref(v),
                Param::Symbolic(r) => view.bindings.get(r.index).ok_or_else(|| {
                    ValidationError::UnknownPlaceholder {
                        name: r.name.clone(),
                        bound: view.bindings.len(),
                    }
                })?,
            };
            let rejected = match expected.args.get(i) {
                Some(LayoutArg::Literal(b)) => values
                    .iter()
                    .find(|&&v| !approx_eq(v, *b))
                    .map(|&v| (v, format!("[{}]", b))),
                Some(LayoutArg::Placeholder(name)) => device.allowed(name).and_then(|allowed| {
                    values
                        .iter()
                        .find(|&&v| !allowed.contains(v))
                        .map(|&v| (v, allowed.to_string()))
                }),
                None => op.gate.param_default(i).and_then(|b| {
                    values
                        .iter()
                        .find(|&&v| !approx_eq(v, b))
                        .map(|&v| (v, format!("[{}]", b)))
                }),
            };
            if let Some((value, valid)) = rejected {
                return Err(DeviceError::Parameter {
                    device: device.name().to_string(),
                    position,
                    gate: op.gate.name().to_string(),
                    value,
                    valid,
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Run every check in order: target, mode bounds, structure, parameters.
pub fn validate(view: &CircuitView<'_>, target: &str, device: &DeviceSpec) -> Result<()> {
    debug!(
        device = device.name(),
        compiler = target,
        operations = view.operations.len(),
        temporal = view.modes.temporal,
        "validating circuit"
    );
    check_target(target, device)?;
    check_mode_bounds(&view.modes, device)?;
    check_layout(view.operations, device)?;
    check_parameters(view, device)?;
    info!(device = device.name(), compiler = target, "circuit is compatible with device");
    Ok(())
}

fn canonical_name(name: &str) -> &str {
    match name {
        "MeasureX" => "MeasureHomodyne",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::ops::{Gate, ParamRef};

    fn device(layout: &str, params: &str) -> DeviceSpec {
        let text = format!(
            r#"{{"layout": {}, "modes": {{"concurrent": 2, "spatial": 1, "temporal_max": 100}},
                "compiler": ["TD2"], "gate_parameters": {}}}"#,
            serde_json::to_string(layout).unwrap(),
            params
        );
        DeviceSpec::from_json("TD2", &text).unwrap()
    }

    const LAYOUT: &str = "name t\nversion 1.0\ntarget TD2\ntype tdm (temporal_modes=2)\n\
                          Sgate(p0) | 1\nRgate(p1) | 0\nBSgate(p2, 0) | (0, 1)\nMeasureHomodyne(p3) | 0\n";
    const RANGES: &str = r#"{"p0": [-1], "p1": [1], "p2": [2], "p3": [3]}"#;

    fn ops(r: f64, registers: [usize; 2]) -> Vec<Operation> {
        vec![
            Operation::new(Gate::sgate(&ParamRef::new(0), r), vec![1]),
            Operation::new(Gate::rgate(&ParamRef::new(1)), vec![0]),
            Operation::new(Gate::bsgate(&ParamRef::new(2), 0.0), registers.to_vec()),
            Operation::new(Gate::homodyne(&ParamRef::new(3)), vec![0]),
        ]
    }

    fn view<'a>(operations: &'a [Operation], bindings: &'a [Vec<f64>]) -> CircuitView<'a> {
        CircuitView {
            operations,
            bindings,
            modes: ModeCounts {
                concurrent: vec![2],
                temporal: 1,
            },
        }
    }

    #[test]
    fn matching_program_passes() {
        let dev = device(LAYOUT, RANGES);
        let operations = ops(0.0, [0, 1]);
        let bindings = vec![vec![-1.0], vec![1.0], vec![2.0], vec![3.0]];
        validate(&view(&operations, &bindings), "TD2", &dev).unwrap();
    }

    #[test]
    fn wrong_register_order_is_mode_ordering() {
        let dev = device(LAYOUT, RANGES);
        let operations = ops(0.0, [1, 0]);
        let err = check_layout(&operations, &dev).unwrap_err();
        assert!(err.to_string().contains("due to incompatible mode ordering."));
        assert!(matches!(
            err,
            Error::Device(DeviceError::ModeOrdering { position: 2, .. })
        ));
    }

    #[test]
    fn out_of_range_value_reports_value_and_range() {
        let dev = device(LAYOUT, RANGES);
        let operations = ops(0.0, [0, 1]);
        let bindings = vec![vec![-999.0], vec![1.0], vec![2.0], vec![3.0]];
        let err = check_parameters(&view(&operations, &bindings), &dev).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("due to incompatible parameter."));
        assert!(msg.contains("Parameter has value '-999' while its valid range is [-1]"));
    }

    #[test]
    fn every_bound_value_is_checked() {
        let dev = device(LAYOUT, RANGES);
        let operations = ops(0.0, [0, 1]);
        let bindings = vec![vec![-1.0, -1.0], vec![1.0, 1.5], vec![2.0, 2.0], vec![3.0, 3.0]];
        let err = check_parameters(&view(&operations, &bindings), &dev).unwrap_err();
        assert!(matches!(
            err,
            Error::Device(DeviceError::Parameter { position: 1, value, .. }) if value == 1.5
        ));
    }

    #[test]
    fn omitted_layout_argument_requires_default() {
        let dev = device(LAYOUT, RANGES);
        let operations = ops(0.4, [0, 1]);
        let bindings = vec![vec![-1.0], vec![1.0], vec![2.0], vec![3.0]];
        let err = check_parameters(&view(&operations, &bindings), &dev).unwrap_err();
        assert!(matches!(
            err,
            Error::Device(DeviceError::Parameter { position: 0, value, .. }) if value == 0.4
        ));
    }

    #[test]
    fn gate_kind_and_count_mismatch() {
        let dev = device(LAYOUT, RANGES);
        let mut operations = ops(0.0, [0, 1]);
        operations[1] = Operation::new(Gate::loss(0.5), vec![0]);
        let err = check_layout(&operations, &dev).unwrap_err();
        assert!(err
            .to_string()
            .contains("The gates or the order of gates used in the Program"));

        let operations = ops(0.0, [0, 1])[..3].to_vec();
        let err = check_layout(&operations, &dev).unwrap_err();
        assert!(matches!(
            err,
            Error::Device(DeviceError::GateMismatch { position: 3, found: None, .. })
        ));
    }

    #[test]
    fn mode_bounds_are_inclusive() {
        let dev = device(LAYOUT, RANGES);
        let at_limit = ModeCounts {
            concurrent: vec![2],
            temporal: 100,
        };
        check_mode_bounds(&at_limit, &dev).unwrap();

        let too_long = ModeCounts {
            concurrent: vec![2],
            temporal: 101,
        };
        assert!(check_mode_bounds(&too_long, &dev)
            .unwrap_err()
            .to_string()
            .contains("temporal modes, but the device"));

        let too_wide = ModeCounts {
            concurrent: vec![3],
            temporal: 1,
        };
        assert!(check_mode_bounds(&too_wide, &dev)
            .unwrap_err()
            .to_string()
            .contains("concurrent modes, but the device"));

        let too_many_channels = ModeCounts {
            concurrent: vec![1, 1],
            temporal: 1,
        };
        assert!(check_mode_bounds(&too_many_channels, &dev)
            .unwrap_err()
            .to_string()
            .contains("spatial modes, but the device"));
    }

    #[test]
    fn undeclared_target_rejected_first() {
        let dev = device(LAYOUT, RANGES);
        let operations = ops(0.0, [1, 0]);
        let err = validate(&view(&operations, &[]), "gaussian", &dev).unwrap_err();
        assert!(matches!(
            err,
            Error::Device(DeviceError::UnsupportedTarget { .. })
        ));
    }

    #[test]
    fn unnamed_parameter_accepts_anything() {
        let dev = device(LAYOUT, r#"{"p0": [-1]}"#);
        let operations = ops(0.0, [0, 1]);
        let bindings = vec![vec![-1.0], vec![42.0], vec![-7.0], vec![0.1]];
        check_parameters(&view(&operations, &bindings), &dev).unwrap();
    }

    #[test]
    fn unbound_placeholder_is_validation_error() {
        let dev = device(LAYOUT, RANGES);
        let operations = ops(0.0, [0, 1]);
        let err = check_parameters(&view(&operations, &[vec![-1.0]]), &dev).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::UnknownPlaceholder { .. })
        ));
    }
}
