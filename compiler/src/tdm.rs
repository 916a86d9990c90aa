// tdm.rs — Time-domain multiplexed programs
//
// A `TdmProgram` is a template circuit replayed once per timebin, with each
// placeholder bound to the value at that timebin. Spatial channel s carries
// `N_s` concurrent modes; the template acts on `Σ N_s` registers and measurement
// i (in template order) feeds channel i.
//
// Preconditions: concurrent-mode counts are non-empty and positive.
// Postconditions: after a successful `context`, every placeholder list has the
//   same length, the template has one measurement per spatial channel, and
//   every symbolic argument refers to a bound list.
// Failure modes: `ValidationError::{UnequalParameterLengths, NoMeasurements,
//   SpatialModeMismatch, UnknownPlaceholder, InvalidModes, ProgramLocked}`.
// Side effects: none.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result, ValidationError};
use crate::layout::{Layout, LayoutArg};
use crate::ops::{Gate, Param, ParamRef};
use crate::program::{Program, ProgramContext};
use crate::validate::{CircuitView, ModeCounts};

// ── Configuration ───────────────────────────────────────────────────────────

/// How many leading timebins each channel discards as vacuum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Shift {
    /// `N_s - 1` on channel s.
    #[default]
    Default,
    /// The same count on every channel.
    By(usize),
}

/// Run options stored on a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Shots per run; an explicit shots argument to `Engine::run` takes precedence.
    pub shots: Option<usize>,
    /// Truncate all channels to the shortest after dropping vacuum modes.
    pub crop: bool,
}

/// Concurrent-mode counts, one per spatial channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrentModes(pub Vec<usize>);

impl From<usize> for ConcurrentModes {
    fn from(n: usize) -> Self {
        ConcurrentModes(vec![n])
    }
}

impl From<Vec<usize>> for ConcurrentModes {
    fn from(v: Vec<usize>) -> Self {
        ConcurrentModes(v)
    }
}

impl From<&[usize]> for ConcurrentModes {
    fn from(v: &[usize]) -> Self {
        ConcurrentModes(v.to_vec())
    }
}

impl<const K: usize> From<[usize; K]> for ConcurrentModes {
    fn from(v: [usize; K]) -> Self {
        ConcurrentModes(v.to_vec())
    }
}

// ── Placeholder handles ─────────────────────────────────────────────────────

/// Handles for the placeholders bound by one `context` call.
#[derive(Debug, Clone)]
pub struct Placeholders {
    refs: Vec<ParamRef>,
}

impl Placeholders {
    /// Handle for placeholder `i`. Out-of-range handles are reported when the
    /// scope closes.
    pub fn get(&self, i: usize) -> ParamRef {
        self.refs.get(i).cloned().unwrap_or_else(|| ParamRef::new(i))
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamRef> {
        self.refs.iter()
    }
}

// ── Program ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TdmProgram {
    concurrent: Vec<usize>,
    template: Program,
    names: Vec<String>,
    bindings: Vec<Vec<f64>>,
    timebins: usize,
    shift: Shift,
    run_options: RunOptions,
    built: bool,
}

impl TdmProgram {
    pub fn new(concurrent: impl Into<ConcurrentModes>) -> std::result::Result<Self, ValidationError> {
        let ConcurrentModes(concurrent) = concurrent.into();
        if concurrent.is_empty() {
            return Err(ValidationError::InvalidModes(
                "at least one spatial channel is required".into(),
            ));
        }
        if concurrent.contains(&0) {
            return Err(ValidationError::InvalidModes(format!(
                "concurrent-mode counts must be positive, got {:?}",
                concurrent
            )));
        }
        let registers = concurrent.iter().sum();
        Ok(TdmProgram {
            concurrent,
            template: Program::new(registers),
            names: Vec::new(),
            bindings: Vec::new(),
            timebins: 0,
            shift: Shift::Default,
            run_options: RunOptions::default(),
            built: false,
        })
    }

    /// Bind `lists` (one value per timebin each) and build the template.
    ///
    /// `build` receives placeholder handles (`p.get(i)` is list i) and the
    /// template's construction scope. The template is locked when this
    /// returns, whatever the outcome. With no lists the program has one timebin.
    pub fn context<F, E>(&mut self, lists: Vec<Vec<f64>>, shift: Shift, build: F) -> std::result::Result<(), E>
    where
        F: FnOnce(&Placeholders, &mut ProgramContext<'_>) -> std::result::Result<(), E>,
        E: From<ValidationError>,
    {
        let names = (0..lists.len()).map(|i| format!("p{}", i)).collect();
        self.bind_and_build(names, lists, shift, build)
    }

    fn bind_and_build<F, E>(
        &mut self,
        names: Vec<String>,
        lists: Vec<Vec<f64>>,
        shift: Shift,
        build: F,
    ) -> std::result::Result<(), E>
    where
        F: FnOnce(&Placeholders, &mut ProgramContext<'_>) -> std::result::Result<(), E>,
        E: From<ValidationError>,
    {
        if self.template.is_locked() {
            return Err(ValidationError::ProgramLocked.into());
        }
        let lengths: Vec<usize> = lists.iter().map(Vec::len).collect();
        if lengths.windows(2).any(|w| w[0] != w[1]) {
            return Err(ValidationError::UnequalParameterLengths { lengths }.into());
        }

        let placeholders = Placeholders {
            refs: names
                .iter()
                .enumerate()
                .map(|(index, name)| ParamRef {
                    index,
                    name: name.clone(),
                })
                .collect(),
        };
        self.template.context(|q| build(&placeholders, q))?;

        let measurements = self.template.measurements().count();
        if measurements == 0 {
            return Err(ValidationError::NoMeasurements.into());
        }
        if measurements != self.concurrent.len() {
            return Err(ValidationError::SpatialModeMismatch {
                measurements,
                spatial_modes: self.concurrent.len(),
            }
            .into());
        }
        for op in self.template.operations() {
            for param in op.gate.params() {
                if let Param::Symbolic(r) = param {
                    if r.index >= lists.len() {
                        return Err(ValidationError::UnknownPlaceholder {
                            name: r.name.clone(),
                            bound: lists.len(),
                        }
                        .into());
                    }
                }
            }
        }

        self.timebins = lengths.first().copied().unwrap_or(1);
        self.names = names;
        self.bindings = lists;
        self.shift = shift;
        self.built = true;
        Ok(())
    }

    /// Instantiate a device layout as a program. Each named layout parameter
    /// becomes a placeholder bound to `values[name]`, or to the array's inline
    /// rows when the layout declares them. Omitted gate arguments take the gate
    /// defaults.
    pub fn from_layout(
        layout: &Layout,
        concurrent: impl Into<ConcurrentModes>,
        values: &BTreeMap<String, Vec<f64>>,
    ) -> Result<TdmProgram> {
        let mut prog = TdmProgram::new(concurrent)?;

        // Placeholders are numbered in order of first use.
        let mut names: Vec<String> = Vec::new();
        let mut gate_args: Vec<Vec<Param>> = Vec::with_capacity(layout.gates.len());
        for gate in &layout.gates {
            let mut args = Vec::with_capacity(gate.args.len());
            for arg in &gate.args {
                args.push(match arg {
                    LayoutArg::Literal(v) => Param::Literal(*v),
                    LayoutArg::Placeholder(name) => {
                        let index = match names.iter().position(|n| n == name) {
                            Some(index) => index,
                            None => {
                                names.push(name.clone());
                                names.len() - 1
                            }
                        };
                        Param::Symbolic(ParamRef {
                            index,
                            name: name.clone(),
                        })
                    }
                });
            }
            gate_args.push(args);
        }
        let mut lists = Vec::with_capacity(names.len());
        for name in &names {
            let inline = layout
                .arrays
                .get(name)
                .and_then(|a| a.values.as_ref())
                .map(|rows| rows.concat());
            let list = values.get(name).cloned().or(inline).ok_or_else(|| {
                ValidationError::UnknownPlaceholder {
                    name: name.clone(),
                    bound: values.len(),
                }
            })?;
            lists.push(list);
        }

        prog.bind_and_build(names, lists, Shift::Default, |_, q| {
            for (gate, args) in layout.gates.iter().zip(gate_args) {
                let op = Gate::from_name(&gate.name, args).ok_or_else(|| {
                    LayoutError::UnknownGate {
                        name: gate.name.clone(),
                        span: gate.span,
                    }
                })?;
                q.append(op, &gate.registers)?;
            }
            Ok::<_, crate::error::Error>(())
        })?;
        Ok(prog)
    }

    pub fn with_run_options(mut self, options: RunOptions) -> Self {
        self.run_options = options;
        self
    }

    pub fn run_options(&self) -> RunOptions {
        self.run_options
    }

    pub fn concurrent_modes(&self) -> &[usize] {
        &self.concurrent
    }

    pub fn spatial_modes(&self) -> usize {
        self.concurrent.len()
    }

    pub fn num_registers(&self) -> usize {
        self.template.num_modes()
    }

    pub fn timebins(&self) -> usize {
        self.timebins
    }

    pub fn shift(&self) -> Shift {
        self.shift
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn template(&self) -> &Program {
        &self.template
    }

    pub fn bindings(&self) -> &[Vec<f64>] {
        &self.bindings
    }

    /// Bound value lists keyed by placeholder name.
    pub fn parameters(&self) -> BTreeMap<String, Vec<f64>> {
        self.names
            .iter()
            .cloned()
            .zip(self.bindings.iter().cloned())
            .collect()
    }

    /// Placeholder values at timebin `t`, indexed by placeholder number.
    pub fn values_at(&self, t: usize) -> Vec<f64> {
        self.bindings
            .iter()
            .map(|list| list.get(t).copied().unwrap_or(0.0))
            .collect()
    }

    /// Leading timebins to discard per spatial channel.
    pub fn drains(&self) -> Vec<usize> {
        match self.shift {
            Shift::Default => self.concurrent.iter().map(|n| n - 1).collect(),
            Shift::By(k) => vec![k; self.concurrent.len()],
        }
    }

    pub fn view(&self) -> CircuitView<'_> {
        CircuitView {
            operations: self.template.operations(),
            bindings: &self.bindings,
            modes: ModeCounts {
                concurrent: self.concurrent.clone(),
                temporal: self.timebins,
            },
        }
    }
}

impl fmt::Display for TdmProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spatial = if self.built { self.concurrent.len() } else { 0 };
        write!(
            f,
            "<TDMProgram: concurrent modes={}, time bins={}, spatial modes={}>",
            self.concurrent.iter().sum::<usize>(),
            self.timebins,
            spatial
        )
    }
}
