// engine.rs — Running TDM programs on a sampling backend
//
// The engine resolves the shot count, asks its backend for raw per-channel
// samples, and shapes them into a (shots, spatial, timebins) tensor with the
// program's vacuum modes removed.
//
// Preconditions: the submitted program has been built.
// Postconditions: `RunResult::samples` has `shots` rows and one column block per
//   spatial channel; the program's stored run options are never modified.
// Failure modes: `ValidationError::BatchedPrograms` for more than one program,
//   `ValidationError::NoMeasurements` for an unbuilt program, `BackendError`.
// Side effects: consumes randomness from the injected RNG (emits `tracing` events).

use ndarray::Array3;
use rand::RngCore;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{BackendError, Result, ValidationError};
use crate::ops::{Gate, Measurement};
use crate::reshape::reshape_samples;
use crate::tdm::TdmProgram;

// ── Backend ─────────────────────────────────────────────────────────────────

/// Raw samples indexed `[shot][channel][timebin]`.
pub type RawSamples = Vec<Vec<Vec<f64>>>;

/// A source of measurement samples for TDM programs.
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// One sequence per spatial channel per shot, before vacuum removal.
    fn sample(
        &self,
        program: &TdmProgram,
        shots: usize,
        rng: &mut dyn RngCore,
    ) -> std::result::Result<RawSamples, BackendError>;
}

/// Samples every measurement as if the modes held vacuum: homodyne outcomes
/// are normal with variance ħ/2, photon counts are zero. Placeholders are still
/// bound at every timebin, so binding errors surface here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VacuumSampler {
    pub hbar: f64,
}

impl Default for VacuumSampler {
    fn default() -> Self {
        VacuumSampler { hbar: 2.0 }
    }
}

impl Backend for VacuumSampler {
    fn name(&self) -> &str {
        "vacuum"
    }

    fn sample(
        &self,
        program: &TdmProgram,
        shots: usize,
        rng: &mut dyn RngCore,
    ) -> std::result::Result<RawSamples, BackendError> {
        let fail = |message: String| BackendError {
            backend: self.name().to_string(),
            message,
        };
        let normal = Normal::new(0.0, (self.hbar / 2.0).sqrt()).map_err(|e| fail(e.to_string()))?;
        let measurements: Vec<_> = program.template().measurements().collect();

        let mut raw = Vec::with_capacity(shots);
        for _ in 0..shots {
            let mut channels = vec![Vec::with_capacity(program.timebins()); measurements.len()];
            for t in 0..program.timebins() {
                let values = program.values_at(t);
                for (channel, op) in measurements.iter().enumerate() {
                    let bound = op.bind(&values).map_err(|e| fail(e.to_string()))?;
                    let x = match bound.gate {
                        Gate::Measurement(Measurement::Homodyne(_)) => normal.sample(rng),
                        _ => 0.0,
                    };
                    channels[channel].push(x);
                }
            }
            raw.push(channels);
        }
        Ok(raw)
    }
}

// ── Engine ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Shots used when neither the call nor the program specifies any.
    pub default_shots: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions { default_shots: 1 }
    }
}

/// What a caller hands to `Engine::run`.
#[derive(Debug, Clone, Copy)]
pub enum Submission<'a> {
    Single(&'a TdmProgram),
    Batch(&'a [TdmProgram]),
}

impl<'a> From<&'a TdmProgram> for Submission<'a> {
    fn from(p: &'a TdmProgram) -> Self {
        Submission::Single(p)
    }
}

impl<'a> From<&'a [TdmProgram]> for Submission<'a> {
    fn from(p: &'a [TdmProgram]) -> Self {
        Submission::Batch(p)
    }
}

impl<'a> From<&'a Vec<TdmProgram>> for Submission<'a> {
    fn from(p: &'a Vec<TdmProgram>) -> Self {
        Submission::Batch(p)
    }
}

impl<'a, const K: usize> From<&'a [TdmProgram; K]> for Submission<'a> {
    fn from(p: &'a [TdmProgram; K]) -> Self {
        Submission::Batch(p)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    /// Shape (shots, spatial, timebins after vacuum removal).
    pub samples: Array3<f64>,
    pub shots: usize,
}

pub struct Engine {
    backend: Box<dyn Backend>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Engine {
            backend: Box::new(backend),
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Run one program. `shots` overrides the program's stored run options for
    /// this call only; without either, the engine default applies.
    pub fn run<'a>(
        &self,
        submission: impl Into<Submission<'a>>,
        shots: Option<usize>,
        rng: &mut dyn RngCore,
    ) -> Result<RunResult> {
        let program = match submission.into() {
            Submission::Single(p) => p,
            Submission::Batch([p]) => p,
            Submission::Batch(batch) => {
                return Err(ValidationError::BatchedPrograms { count: batch.len() }.into());
            }
        };
        if !program.is_built() {
            return Err(ValidationError::NoMeasurements.into());
        }

        let options = program.run_options();
        let shots = shots
            .or(options.shots)
            .unwrap_or(self.options.default_shots);
        if shots == 0 {
            warn!(backend = self.backend.name(), "run requested with zero shots");
        }
        debug!(
            backend = self.backend.name(),
            shots,
            timebins = program.timebins(),
            spatial = program.spatial_modes(),
            crop = options.crop,
            "running program"
        );

        let raw = self.backend.sample(program, shots, rng)?;
        let samples = reshape_samples(&raw, &program.drains(), options.crop)?;
        info!(
            backend = self.backend.name(),
            shape = ?samples.dim(),
            "run complete"
        );
        Ok(RunResult { samples, shots })
    }
}
