// device.rs — Device description records
//
// A device record bundles layout text, mode limits, accepted compiler targets
// and an allowed-value table for named layout parameters. The layout is parsed
// exactly once, when the `DeviceSpec` is constructed.
//
// Preconditions: none.
// Postconditions: a `DeviceSpec` always holds a successfully parsed `Layout`.
// Failure modes: `LayoutError::Record` for malformed JSON or fields,
//   `LayoutError::Syntax`/`Header`/`UnknownGate` for bad layout text.
// Side effects: none (emits `tracing` debug events).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::LayoutError;
use crate::layout::Layout;

// ── Record ──────────────────────────────────────────────────────────────────

/// Device record as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDeviceSpec {
    pub layout: String,
    pub modes: ModeLimits,
    #[serde(default)]
    pub compiler: Vec<String>,
    #[serde(default)]
    pub gate_parameters: BTreeMap<String, AllowedValues>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeLimits {
    /// Maximum concurrent modes per spatial channel.
    pub concurrent: usize,
    pub spatial: usize,
    pub temporal_max: usize,
}

/// One allowed-value entry: a fixed scalar or an inclusive `[lo, hi]` interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowedEntry {
    Fixed(f64),
    Range([f64; 2]),
}

impl AllowedEntry {
    pub fn contains(&self, value: f64) -> bool {
        match *self {
            AllowedEntry::Fixed(v) => approx_eq(value, v),
            AllowedEntry::Range([lo, hi]) => {
                (value >= lo && value <= hi) || approx_eq(value, lo) || approx_eq(value, hi)
            }
        }
    }
}

impl fmt::Display for AllowedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowedEntry::Fixed(v) => write!(f, "{}", v),
            AllowedEntry::Range([lo, hi]) => write!(f, "[{}, {}]", lo, hi),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AllowedRepr {
    Many(Vec<AllowedEntry>),
    One(AllowedEntry),
}

/// Allowed values for one named parameter. A value is allowed if any entry
/// admits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AllowedRepr")]
pub struct AllowedValues(pub Vec<AllowedEntry>);

impl From<AllowedRepr> for AllowedValues {
    fn from(repr: AllowedRepr) -> Self {
        match repr {
            AllowedRepr::Many(entries) => AllowedValues(entries),
            AllowedRepr::One(entry) => AllowedValues(vec![entry]),
        }
    }
}

impl AllowedValues {
    pub fn contains(&self, value: f64) -> bool {
        self.0.iter().any(|e| e.contains(value))
    }
}

impl fmt::Display for AllowedValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "[{}]", entries.join(", "))
    }
}

/// Equality with relative tolerance 1e-8 (absolute below magnitude 1).
pub(crate) fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 * b.abs().max(1.0)
}

// ── Parsed device ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSpec {
    name: String,
    raw: RawDeviceSpec,
    layout: Layout,
}

impl DeviceSpec {
    /// Build from an already-deserialized record; parses the layout text.
    pub fn new(name: impl Into<String>, raw: RawDeviceSpec) -> Result<Self, LayoutError> {
        let name = name.into();
        let layout = Layout::parse(&raw.layout)?;
        debug!(
            device = %name,
            target = %layout.target,
            gates = layout.gates.len(),
            "parsed device layout"
        );
        Ok(DeviceSpec { name, raw, layout })
    }

    /// Deserialize a JSON device record and parse its layout.
    pub fn from_json(name: impl Into<String>, text: &str) -> Result<Self, LayoutError> {
        let raw: RawDeviceSpec = serde_json::from_str(text)?;
        DeviceSpec::new(name, raw)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn raw(&self) -> &RawDeviceSpec {
        &self.raw
    }

    pub fn modes(&self) -> ModeLimits {
        self.raw.modes
    }

    pub fn compiler_targets(&self) -> &[String] {
        &self.raw.compiler
    }

    pub fn gate_parameters(&self) -> &BTreeMap<String, AllowedValues> {
        &self.raw.gate_parameters
    }

    /// Allowed values for a named layout parameter, if the device declares any.
    pub fn allowed(&self, name: &str) -> Option<&AllowedValues> {
        self.raw.gate_parameters.get(name)
    }

    /// Whether the record lists `target` among its compilers (ASCII case-insensitive).
    pub fn accepts_target(&self, target: &str) -> bool {
        self.raw
            .compiler
            .iter()
            .any(|c| c.eq_ignore_ascii_case(target))
    }

    /// Compact JSON of the record. Map keys are sorted, so equal records
    /// serialize identically.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(&self.raw).unwrap_or_default()
    }

    /// SHA-256 of `canonical_json()`, lowercase hex.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_json().as_bytes());
        let digest = hasher.finalize();
        let mut s = String::with_capacity(64);
        for b in digest.iter() {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
        }
        s
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.raw.modes;
        write!(
            f,
            "<DeviceSpec: name={}, target={}, concurrent={}, spatial={}, temporal_max={}>",
            self.name, self.layout.target, m.concurrent, m.spatial, m.temporal_max
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TD2_JSON: &str = r#"{
        "layout": "name template_tdm\nversion 1.0\ntarget TD2 (shots=1)\ntype tdm (temporal_modes=4)\nfloat array p1[1, 4] =\n    {bs_array}\nfloat array p2[1, 4] =\n    {r_array}\nfloat array p3[1, 4] =\n    {m_array}\n\nSgate(0.5643) | 1\nBSgate(p1) | (1, 0)\nRgate(p2) | 1\nMeasureHomodyne(p3) | 0\n",
        "modes": {"concurrent": 2, "spatial": 1, "temporal_max": 100},
        "compiler": ["TD2"],
        "gate_parameters": {
            "p1": [0, [0, 6.283185307179586]],
            "p2": [0, [0, 3.141592653589793], 3.141592653589793],
            "p3": [0, [0, 6.283185307179586]]
        }
    }"#;

    #[test]
    fn parses_record_and_layout() {
        let spec = DeviceSpec::from_json("TD2", TD2_JSON).unwrap();
        assert_eq!(spec.name(), "TD2");
        assert_eq!(spec.modes().concurrent, 2);
        assert_eq!(spec.modes().temporal_max, 100);
        assert_eq!(spec.layout().gates.len(), 4);
        assert!(spec.accepts_target("TD2"));
        assert!(spec.accepts_target("td2"));
        assert!(!spec.accepts_target("gaussian"));
    }

    #[test]
    fn allowed_values_render_verbatim() {
        let spec = DeviceSpec::from_json("TD2", TD2_JSON).unwrap();
        assert_eq!(
            spec.allowed("p2").unwrap().to_string(),
            "[0, [0, 3.141592653589793], 3.141592653589793]"
        );
        assert_eq!(
            spec.allowed("p1").unwrap().to_string(),
            "[0, [0, 6.283185307179586]]"
        );
    }

    #[test]
    fn allowed_values_membership() {
        let spec = DeviceSpec::from_json("TD2", TD2_JSON).unwrap();
        let p2 = spec.allowed("p2").unwrap();
        assert!(p2.contains(0.0));
        assert!(p2.contains(1.0));
        assert!(p2.contains(std::f64::consts::PI));
        assert!(!p2.contains(4.0));
        assert!(!p2.contains(-0.1));
        assert!(spec.allowed("missing").is_none());
    }

    #[test]
    fn scalar_allowed_value_accepted() {
        let allowed: AllowedValues = serde_json::from_str("-1").unwrap();
        assert_eq!(allowed, AllowedValues(vec![AllowedEntry::Fixed(-1.0)]));
        assert!(allowed.contains(-1.0));
        assert!(!allowed.contains(-999.0));
    }

    #[test]
    fn fingerprint_is_stable() {
        let a = DeviceSpec::from_json("TD2", TD2_JSON).unwrap();
        let b = DeviceSpec::from_json("other-name", TD2_JSON).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let mut raw = a.raw().clone();
        raw.modes.temporal_max = 50;
        let c = DeviceSpec::new("TD2", raw).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn malformed_record_is_record_error() {
        let err = DeviceSpec::from_json("x", r#"{"layout": "name a"}"#).unwrap_err();
        assert!(matches!(err, LayoutError::Record(_)));
    }

    #[test]
    fn bad_layout_is_layout_error() {
        let text = r#"{"layout": "name a\nversion 1\ntarget X\nRgate(1) 0\n",
                       "modes": {"concurrent": 1, "spatial": 1, "temporal_max": 1}}"#;
        let err = DeviceSpec::from_json("x", text).unwrap_err();
        assert!(matches!(err, LayoutError::Syntax { .. }));
    }
}
