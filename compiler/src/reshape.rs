// reshape.rs — Sample tensor shaping for time-multiplexed programs
//
// Two views of the same problem: the leading temporal modes of each spatial
// channel carry vacuum until the delay lines fill.
//
// `reshape_samples` builds the (shots, spatial, timebins) tensor from raw
// per-channel sequences, dropping each channel's own vacuum count.
// `move_vacuum_modes` works on an already shaped tensor whose samples form one
// continuous stream, shifting the stream left past the vacuum entries.
//
// Preconditions: every shot carries one sequence per spatial channel.
// Postconditions: outputs are freshly allocated; inputs are never aliased.
// Failure modes: `ValidationError::InvalidModes` for a channel count that does
//   not match the drain list.
// Side effects: none.

use ndarray::Array3;

use crate::error::ValidationError;

/// Shape raw samples indexed `[shot][channel][k]` into (shots, spatial, timebins).
///
/// Channel `s` drops its first `drain[s]` entries. With `crop`, every channel
/// is truncated to the shortest remaining length; otherwise shorter channels
/// are zero-padded to the longest.
pub fn reshape_samples(
    raw: &[Vec<Vec<f64>>],
    drain: &[usize],
    crop: bool,
) -> Result<Array3<f64>, ValidationError> {
    let spatial = drain.len();
    if let Some(shot) = raw.iter().find(|shot| shot.len() != spatial) {
        return Err(ValidationError::InvalidModes(format!(
            "expected samples for {} spatial channel(s), got {}",
            spatial,
            shot.len()
        )));
    }

    let remaining = raw.iter().flat_map(|shot| {
        shot.iter()
            .zip(drain)
            .map(|(seq, &d)| seq.len().saturating_sub(d))
    });
    let timebins = if crop {
        remaining.min()
    } else {
        remaining.max()
    }
    .unwrap_or(0);

    let mut out = Array3::zeros((raw.len(), spatial, timebins));
    for (i, shot) in raw.iter().enumerate() {
        for (s, (seq, &d)) in shot.iter().zip(drain).enumerate() {
            for (t, &v) in seq.iter().skip(d).take(timebins).enumerate() {
                out[[i, s, t]] = v;
            }
        }
    }
    Ok(out)
}

/// Shift a continuous sample stream past its vacuum entries.
///
/// With `v = max(concurrent) - 1`, the flattened tensor loses its first `v`
/// entries and gains `v` trailing zeros, keeping its shape. With `crop`, the
/// trailing `ceil(v / (spatial * timebins))` shots, which now hold padding, are
/// dropped.
pub fn move_vacuum_modes(samples: &Array3<f64>, concurrent: &[usize], crop: bool) -> Array3<f64> {
    let vacuum = concurrent.iter().max().map_or(0, |&n| n.saturating_sub(1));
    let (shots, spatial, timebins) = samples.dim();
    let per_shot = spatial * timebins;
    if vacuum == 0 || per_shot == 0 {
        return samples.to_owned();
    }

    let keep = if crop {
        shots.saturating_sub(vacuum.div_ceil(per_shot))
    } else {
        shots
    };
    let flat: Vec<f64> = samples
        .iter()
        .copied()
        .skip(vacuum)
        .chain(std::iter::repeat(0.0))
        .take(keep * per_shot)
        .collect();
    Array3::from_shape_fn((keep, spatial, timebins), |(i, s, t)| {
        flat[i * per_shot + s * timebins + t]
    })
}
