// Layout AST and the structured layout derived from it.
//
// `LayoutScript` mirrors the layout text line by line as the parser sees it.
// `Layout` is the checked form consumed by the validator: header fields pulled
// out, array declarations indexed, gate lines reduced to
// (gate kind, operand registers, literal-or-placeholder arguments).
//
// Preconditions: a `LayoutScript` comes from `parser::parse`.
// Postconditions: a `Layout` has a name, version and target, and only known
//   gate names with no more arguments than each gate takes.
// Failure modes: `LayoutError::Header`, `LayoutError::UnknownGate`, `LayoutError::Syntax`.
// Side effects: none.

use std::collections::BTreeMap;
use std::fmt;

use chumsky::span::SimpleSpan;

use crate::error::LayoutError;
use crate::ops::Gate;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

// ── Script AST ──

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutScript {
    pub statements: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// `name IDENT`
    Name(Ident),
    /// `version NUMBER`
    Version(f64),
    /// `target IDENT options?`
    Target(Ident, Vec<KeyValue>),
    /// `type IDENT options?`
    Type(Ident, Vec<KeyValue>),
    /// `dtype array IDENT shape? = init`
    Array(ArrayDecl),
    /// `IDENT args? | registers`
    Gate(GateStmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// `key=value` inside a header option list.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub key: Ident,
    pub value: OptionValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Number(f64),
    Ident(Ident),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDecl {
    pub dtype: Ident,
    pub name: Ident,
    pub shape: Vec<usize>,
    pub init: ArrayInit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayInit {
    /// Values supplied later, e.g. `{bs_array}`.
    Placeholder(Ident),
    /// Literal rows, one per line.
    Rows(Vec<Vec<f64>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateStmt {
    pub name: Ident,
    pub args: Vec<ArgExpr>,
    pub registers: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgExpr {
    /// Constant-folded numeric expression.
    Number(f64, Span),
    /// Bare parameter name, either a declared array or a free placeholder.
    Name(Ident),
    /// `{name}` placeholder.
    Placeholder(Ident),
}

// ── Structured layout ──

/// A layout argument after name resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutArg {
    Literal(f64),
    /// Named placeholder (array name or `{name}`), looked up in the device's
    /// allowed-value table.
    Placeholder(String),
}

impl fmt::Display for LayoutArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutArg::Literal(v) => write!(f, "{}", v),
            LayoutArg::Placeholder(name) => write!(f, "{}", name),
        }
    }
}

/// One gate line of the layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutGate {
    pub name: String,
    pub args: Vec<LayoutArg>,
    pub registers: Vec<usize>,
    pub span: Span,
}

impl fmt::Display for LayoutGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
            write!(f, "({})", args.join(", "))?;
        }
        match self.registers.as_slice() {
            [r] => write!(f, " | {}", r),
            regs => {
                let regs: Vec<String> = regs.iter().map(|r| r.to_string()).collect();
                write!(f, " | ({})", regs.join(", "))
            }
        }
    }
}

/// Declared array: element type, shape, and literal contents if given inline.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutArray {
    pub dtype: String,
    pub shape: Vec<usize>,
    pub values: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub name: String,
    pub version: f64,
    pub target: String,
    pub target_options: BTreeMap<String, OptionValue>,
    /// Program type from the `type` line (`tdm` for time-domain programs).
    pub program_type: Option<String>,
    pub type_options: BTreeMap<String, OptionValue>,
    pub arrays: BTreeMap<String, LayoutArray>,
    pub gates: Vec<LayoutGate>,
}

impl Layout {
    /// Lex, parse and check layout text.
    pub fn parse(source: &str) -> Result<Layout, LayoutError> {
        let result = crate::parser::parse(source);
        if !result.errors.is_empty() {
            return Err(LayoutError::Syntax {
                errors: result
                    .errors
                    .iter()
                    .map(|e| (*e.span(), e.to_string()))
                    .collect(),
            });
        }
        let script = result
            .script
            .ok_or_else(|| LayoutError::Syntax { errors: Vec::new() })?;
        Layout::from_script(&script)
    }

    /// Check a parsed script and extract the structured layout.
    pub fn from_script(script: &LayoutScript) -> Result<Layout, LayoutError> {
        let mut name = None;
        let mut version = None;
        let mut target = None;
        let mut target_options = BTreeMap::new();
        let mut program_type = None;
        let mut type_options = BTreeMap::new();
        let mut arrays = BTreeMap::new();
        let mut gate_stmts = Vec::new();

        for stmt in &script.statements {
            match &stmt.kind {
                StatementKind::Name(id) => name = Some(id.name.clone()),
                StatementKind::Version(v) => version = Some(*v),
                StatementKind::Target(id, opts) => {
                    target = Some(id.name.clone());
                    target_options = options_map(opts);
                }
                StatementKind::Type(id, opts) => {
                    program_type = Some(id.name.clone());
                    type_options = options_map(opts);
                }
                StatementKind::Array(decl) => {
                    let values = match &decl.init {
                        ArrayInit::Placeholder(_) => None,
                        ArrayInit::Rows(rows) => Some(rows.clone()),
                    };
                    let previous = arrays.insert(
                        decl.name.name.clone(),
                        LayoutArray {
                            dtype: decl.dtype.name.clone(),
                            shape: decl.shape.clone(),
                            values,
                        },
                    );
                    if previous.is_some() {
                        return Err(LayoutError::Syntax {
                            errors: vec![(
                                decl.name.span,
                                format!("array '{}' declared twice", decl.name.name),
                            )],
                        });
                    }
                }
                StatementKind::Gate(g) => gate_stmts.push((g, stmt.span)),
            }
        }

        let name = name.ok_or_else(|| LayoutError::Header("missing `name` line".into()))?;
        let version =
            version.ok_or_else(|| LayoutError::Header("missing `version` line".into()))?;
        let target = target.ok_or_else(|| LayoutError::Header("missing `target` line".into()))?;

        let mut gates = Vec::with_capacity(gate_stmts.len());
        for (g, span) in gate_stmts {
            let mut args = Vec::with_capacity(g.args.len());
            for arg in &g.args {
                args.push(match arg {
                    ArgExpr::Number(v, _) => LayoutArg::Literal(*v),
                    ArgExpr::Name(id) | ArgExpr::Placeholder(id) => {
                        LayoutArg::Placeholder(id.name.clone())
                    }
                });
            }
            let arity = Gate::layout_arity(&g.name.name).ok_or_else(|| LayoutError::UnknownGate {
                name: g.name.name.clone(),
                span: g.name.span,
            })?;
            if args.len() > arity {
                return Err(LayoutError::Syntax {
                    errors: vec![(
                        span,
                        format!(
                            "{} takes at most {} argument(s), {} given",
                            g.name.name,
                            arity,
                            args.len()
                        ),
                    )],
                });
            }
            gates.push(LayoutGate {
                name: g.name.name.clone(),
                args,
                registers: g.registers.clone(),
                span,
            });
        }

        Ok(Layout {
            name,
            version,
            target,
            target_options,
            program_type,
            type_options,
            arrays,
            gates,
        })
    }

    /// Temporal-mode count declared by `type tdm (temporal_modes=N)`, if any.
    pub fn temporal_modes(&self) -> Option<usize> {
        match self.type_options.get("temporal_modes") {
            Some(OptionValue::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
            _ => None,
        }
    }

}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "name {}", self.name)?;
        writeln!(f, "version {}", self.version)?;
        writeln!(f, "target {}{}", self.target, OptionList(&self.target_options))?;
        if let Some(ty) = &self.program_type {
            writeln!(f, "type {}{}", ty, OptionList(&self.type_options))?;
        }
        for (name, array) in &self.arrays {
            let shape: Vec<String> = array.shape.iter().map(|d| d.to_string()).collect();
            writeln!(f, "{} array {}[{}]", array.dtype, name, shape.join(", "))?;
        }
        for gate in &self.gates {
            writeln!(f, "{}", gate)?;
        }
        Ok(())
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Number(n) => write!(f, "{}", n),
            OptionValue::Ident(id) => write!(f, "{}", id.name),
        }
    }
}

/// ` (k=v, ...)`, or nothing for an empty map.
struct OptionList<'a>(&'a BTreeMap<String, OptionValue>);

impl fmt::Display for OptionList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        let items: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, " ({})", items.join(", "))
    }
}

fn options_map(opts: &[KeyValue]) -> BTreeMap<String, OptionValue> {
    opts.iter()
        .map(|kv| (kv.key.name.clone(), kv.value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "name template_tdm
version 1.0
target TD2 (shots=1)
type tdm (temporal_modes=4)
float array p1[1, 4] =
    {bs_array}
float array p2[1, 4] =
    {r_array}
float array p3[1, 4] =
    {m_array}

Sgate(0.5643) | 1
BSgate(p1) | (1, 0)
Rgate(p2) | 1
MeasureHomodyne(p3) | 0
";

    #[test]
    fn template_layout_structure() {
        let layout = Layout::parse(TEMPLATE).unwrap();
        assert_eq!(layout.name, "template_tdm");
        assert_eq!(layout.target, "TD2");
        assert_eq!(layout.program_type.as_deref(), Some("tdm"));
        assert_eq!(layout.temporal_modes(), Some(4));
        assert_eq!(layout.arrays.len(), 3);
        assert_eq!(layout.arrays["p1"].shape, vec![1, 4]);
        assert!(layout.arrays["p1"].values.is_none());
        let names: Vec<&str> = layout.gates.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["Sgate", "BSgate", "Rgate", "MeasureHomodyne"]);
        assert_eq!(layout.gates[0].args, vec![LayoutArg::Literal(0.5643)]);
        assert_eq!(layout.gates[1].args, vec![LayoutArg::Placeholder("p1".into())]);
        assert_eq!(layout.gates[1].registers, vec![1, 0]);
    }

    #[test]
    fn free_parameter_names_become_placeholders() {
        let layout = Layout::parse(
            "name t\nversion 1.0\ntarget TD2\nSgate(p0) | 1\nBSgate(p2, 0) | (0, 1)\n",
        )
        .unwrap();
        assert_eq!(
            layout.gates[1].args,
            vec![LayoutArg::Placeholder("p2".into()), LayoutArg::Literal(0.0)]
        );
        assert_eq!(layout.temporal_modes(), None);
        assert!(layout.program_type.is_none());
    }

    #[test]
    fn display_keeps_header_options() {
        let layout = Layout::parse(TEMPLATE).unwrap();
        let text = layout.to_string();
        assert!(text.contains("target TD2 (shots=1)\n"));
        assert!(text.contains("type tdm (temporal_modes=4)\n"));

        let source = "name t\nversion 1.5\ntarget X8 (shots=10, mode=fast)\n\
                      type tdm (temporal_modes=2)\nRgate(p1) | 0\nMeasureHomodyne(p2) | 0\n";
        let layout = Layout::parse(source).unwrap();
        let text = layout.to_string();
        assert!(text.contains("target X8 (mode=fast, shots=10)\n"));
        let reparsed = Layout::parse(&text).unwrap();
        assert_eq!(reparsed.to_string(), text);
        assert_eq!(reparsed.temporal_modes(), Some(2));
    }

    #[test]
    fn missing_header_rejected() {
        let err = Layout::parse("name t\nversion 1.0\nRgate(0) | 0\n").unwrap_err();
        assert!(matches!(err, LayoutError::Header(ref m) if m.contains("target")));
    }

    #[test]
    fn unknown_gate_rejected_with_span() {
        let source = "name t\nversion 1\ntarget X\nKgate(1) | 0\n";
        let err = Layout::parse(source).unwrap_err();
        let LayoutError::UnknownGate { name, span } = err else {
            panic!("expected UnknownGate, got {err:?}")
        };
        assert_eq!(name, "Kgate");
        assert_eq!(&source[span.start..span.end], "Kgate");
    }

    #[test]
    fn surplus_arguments_rejected() {
        let err = Layout::parse("name t\nversion 1\ntarget X\nRgate(1, 2) | 0\n").unwrap_err();
        assert!(matches!(err, LayoutError::Syntax { .. }));
    }

    #[test]
    fn syntax_errors_carry_spans() {
        let err = Layout::parse("name t\nversion 1\ntarget X\nRgate(1) 0\n").unwrap_err();
        let LayoutError::Syntax { errors } = err else {
            panic!("expected Syntax")
        };
        assert!(!errors.is_empty());
    }

    #[test]
    fn display_lists_headers_arrays_and_gates() {
        let layout = Layout::parse(TEMPLATE).unwrap();
        let text = layout.to_string();
        assert!(text.contains("type tdm (temporal_modes=4)"));
        assert!(text.contains("BSgate(p1) | (1, 0)"));
        assert!(text.contains("float array p2[1, 4]"));
        assert!(text.starts_with("name template_tdm\nversion 1\ntarget TD2\n"));
    }
}
