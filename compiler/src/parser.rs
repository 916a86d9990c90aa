// Parser for device layout text.
//
// Parses a token stream (from the lexer) into a `LayoutScript`. One statement
// per line: header lines, array declarations (whose initializer may continue on
// following lines), and gate lines. Uses chumsky combinators.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics; parsing continues.
// Side effects: none.

use std::f64::consts::PI;

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::layout::*;
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub script: Option<LayoutScript>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse layout text. Lexes then parses.
///
/// Returns an AST (if parsing succeeded) plus any errors.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = layout_parser(source);
    let (script, parse_errors) = parser.parse(stream).into_output_errors();

    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        script,
        errors: all_errors,
    }
}

// ── Main parser builder ──
//
// All grammar rules are built inside `layout_parser` so that the `source`
// reference is captured once and shared by all combinators.

fn layout_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, LayoutScript, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let nl = just(Token::Newline).repeated().ignored();

    // ── Identifier ──

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    // ── Constant expression: '-'? atom (('*' | '/') atom)* ──

    let atom = select! {
        Token::Number(n) => n,
        Token::Pi => PI,
    };

    let factor = just(Token::Minus)
        .or_not()
        .then(atom)
        .map(|(neg, v)| if neg.is_some() { -v } else { v });

    let op = just(Token::Star).to(true).or(just(Token::Slash).to(false));

    let expr = factor
        .clone()
        .then(op.then(factor).repeated().collect::<Vec<_>>())
        .map(|(first, rest)| {
            rest.into_iter()
                .fold(first, |acc, (mul, v)| if mul { acc * v } else { acc / v })
        });

    // ── Non-negative integer ──

    let index = select! {
        Token::Number(n) if n >= 0.0 && n.fract() == 0.0 => n as usize,
    };

    // ── Header options: '(' key '=' value (',' key '=' value)* ')' ──

    let option_value = select! {
        Token::Number(n) => OptionValue::Number(n),
    }
    .or(ident.clone().map(OptionValue::Ident));

    let options = ident
        .clone()
        .then_ignore(just(Token::Equals))
        .then(option_value)
        .map(|(key, value)| KeyValue { key, value })
        .separated_by(just(Token::Comma))
        .at_least(1)
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    // ── Header statements ──

    let name_stmt = just(Token::Name)
        .ignore_then(ident.clone())
        .map(StatementKind::Name);

    let version_stmt = just(Token::Version)
        .ignore_then(select! { Token::Number(n) => n })
        .map(StatementKind::Version);

    let target_stmt = just(Token::Target)
        .ignore_then(ident.clone())
        .then(options.clone().or_not())
        .map(|(name, opts)| StatementKind::Target(name, opts.unwrap_or_default()));

    let type_stmt = just(Token::Type)
        .ignore_then(ident.clone())
        .then(options.or_not())
        .map(|(name, opts)| StatementKind::Type(name, opts.unwrap_or_default()));

    // ── Array declaration: dtype 'array' IDENT shape? '=' init ──

    let placeholder = select! {
        Token::Placeholder(name) = e => Ident { name, span: e.span() },
    };

    let shape = index
        .clone()
        .separated_by(just(Token::Comma))
        .at_least(1)
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LBracket), just(Token::RBracket));

    let row = expr
        .clone()
        .separated_by(just(Token::Comma))
        .at_least(1)
        .collect::<Vec<_>>();

    let rows = row
        .separated_by(just(Token::Newline))
        .at_least(1)
        .collect::<Vec<_>>();

    let array_init = nl.clone().ignore_then(
        placeholder
            .clone()
            .map(ArrayInit::Placeholder)
            .or(rows.map(ArrayInit::Rows)),
    );

    let array_stmt = ident
        .clone()
        .then_ignore(just(Token::Array))
        .then(ident.clone())
        .then(shape.or_not())
        .then_ignore(just(Token::Equals))
        .then(array_init)
        .map(|(((dtype, name), shape), init)| {
            StatementKind::Array(ArrayDecl {
                dtype,
                name,
                shape: shape.unwrap_or_default(),
                init,
            })
        });

    // ── Gate line: IDENT ('(' args ')')? '|' registers ──

    let arg = expr
        .map_with(|v, e| ArgExpr::Number(v, e.span()))
        .or(placeholder.map(ArgExpr::Placeholder))
        .or(ident.clone().map(ArgExpr::Name));

    let args = arg
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let registers = index.clone().map(|r| vec![r]).or(index
        .separated_by(just(Token::Comma))
        .at_least(1)
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen)));

    let gate_stmt = ident
        .clone()
        .then(args.or_not())
        .then_ignore(just(Token::Pipe))
        .then(registers)
        .map(|((name, args), registers)| {
            StatementKind::Gate(GateStmt {
                name,
                args: args.unwrap_or_default(),
                registers,
            })
        });

    // ── Statement dispatch ──

    let statement = choice((
        name_stmt,
        version_stmt,
        target_stmt,
        type_stmt,
        array_stmt,
        gate_stmt,
    ))
    .map_with(|kind, e| Statement {
        kind,
        span: e.span(),
    });

    // ── Script ──

    nl.clone()
        .ignore_then(
            statement
                .separated_by(just(Token::Newline).repeated().at_least(1))
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .then_ignore(nl)
        .map_with(|statements, e| LayoutScript {
            statements,
            span: e.span(),
        })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> LayoutScript {
        let result = parse(source);
        assert!(
            result.errors.is_empty(),
            "unexpected errors: {:#?}",
            result.errors
        );
        result.script.expect("expected script")
    }

    fn parse_one_stmt(source: &str) -> Statement {
        let script = parse_ok(source);
        assert_eq!(script.statements.len(), 1, "expected 1 statement");
        script.statements.into_iter().next().unwrap()
    }

    // ── Headers ──

    #[test]
    fn empty_script() {
        assert!(parse_ok("").statements.is_empty());
        assert!(parse_ok("\n\n# only a comment\n").statements.is_empty());
    }

    #[test]
    fn header_lines() {
        let script = parse_ok("name template_tdm\nversion 1.0\ntarget TD2 (shots=1)\n");
        assert_eq!(script.statements.len(), 3);
        let StatementKind::Name(name) = &script.statements[0].kind else {
            panic!("expected Name")
        };
        assert_eq!(name.name, "template_tdm");
        assert_eq!(script.statements[1].kind, StatementKind::Version(1.0));
        let StatementKind::Target(target, opts) = &script.statements[2].kind else {
            panic!("expected Target")
        };
        assert_eq!(target.name, "TD2");
        assert_eq!(opts[0].key.name, "shots");
        assert_eq!(opts[0].value, OptionValue::Number(1.0));
    }

    #[test]
    fn type_line_with_temporal_modes() {
        let s = parse_one_stmt("type tdm (temporal_modes=2)");
        let StatementKind::Type(ty, opts) = &s.kind else {
            panic!("expected Type")
        };
        assert_eq!(ty.name, "tdm");
        assert_eq!(opts.len(), 1);
        assert_eq!(opts[0].key.name, "temporal_modes");
    }

    // ── Arrays ──

    #[test]
    fn array_with_placeholder_on_next_line() {
        let s = parse_one_stmt("float array p1[1, 4] =\n    {bs_array}");
        let StatementKind::Array(decl) = &s.kind else {
            panic!("expected Array")
        };
        assert_eq!(decl.dtype.name, "float");
        assert_eq!(decl.name.name, "p1");
        assert_eq!(decl.shape, vec![1, 4]);
        assert!(matches!(&decl.init, ArrayInit::Placeholder(id) if id.name == "bs_array"));
    }

    #[test]
    fn array_with_literal_rows() {
        let script = parse_ok("float array p2[2, 2] =\n  1, 2\n  3, -4\nRgate(p2) | 0\n");
        assert_eq!(script.statements.len(), 2);
        let StatementKind::Array(decl) = &script.statements[0].kind else {
            panic!("expected Array")
        };
        assert_eq!(
            decl.init,
            ArrayInit::Rows(vec![vec![1.0, 2.0], vec![3.0, -4.0]])
        );
        assert!(matches!(script.statements[1].kind, StatementKind::Gate(_)));
    }

    // ── Gates ──

    #[test]
    fn gate_with_literal_and_registers() {
        let s = parse_one_stmt("Sgate(0.5643) | 1");
        let StatementKind::Gate(g) = &s.kind else {
            panic!("expected Gate")
        };
        assert_eq!(g.name.name, "Sgate");
        assert!(matches!(g.args[0], ArgExpr::Number(v, _) if v == 0.5643));
        assert_eq!(g.registers, vec![1]);
    }

    #[test]
    fn gate_with_names_and_register_tuple() {
        let s = parse_one_stmt("BSgate(p2, 0) | (0, 1)");
        let StatementKind::Gate(g) = &s.kind else {
            panic!("expected Gate")
        };
        assert!(matches!(&g.args[0], ArgExpr::Name(id) if id.name == "p2"));
        assert!(matches!(g.args[1], ArgExpr::Number(v, _) if v == 0.0));
        assert_eq!(g.registers, vec![0, 1]);
    }

    #[test]
    fn gate_without_arguments() {
        let s = parse_one_stmt("MeasureFock | 0");
        let StatementKind::Gate(g) = &s.kind else {
            panic!("expected Gate")
        };
        assert!(g.args.is_empty());
    }

    #[test]
    fn constant_expressions_fold() {
        let s = parse_one_stmt("BSgate(pi/4, -pi*2) | (1, 0)");
        let StatementKind::Gate(g) = &s.kind else {
            panic!("expected Gate")
        };
        assert!(matches!(g.args[0], ArgExpr::Number(v, _) if (v - PI / 4.0).abs() < 1e-15));
        assert!(matches!(g.args[1], ArgExpr::Number(v, _) if (v + 2.0 * PI).abs() < 1e-15));
    }

    #[test]
    fn placeholder_argument() {
        let s = parse_one_stmt("Rgate({phase}) | 0");
        let StatementKind::Gate(g) = &s.kind else {
            panic!("expected Gate")
        };
        assert!(matches!(&g.args[0], ArgExpr::Placeholder(id) if id.name == "phase"));
    }

    // ── Spans ──

    #[test]
    fn spans_gate_stmt() {
        let source = "Rgate(p1) | 0";
        let s = parse_one_stmt(source);
        assert_eq!(s.span.start, 0);
        assert_eq!(s.span.end, source.len());
    }

    // ── Errors ──

    #[test]
    fn error_missing_pipe() {
        assert!(!parse("Rgate(p1) 0").errors.is_empty());
    }

    #[test]
    fn error_fractional_register() {
        assert!(!parse("Rgate(p1) | 0.5").errors.is_empty());
    }

    #[test]
    fn lex_errors_are_reported() {
        let result = parse("Rgate(p1) ~ 0");
        assert!(result
            .errors
            .iter()
            .any(|e| e.to_string().contains("unexpected character")));
    }

    #[test]
    fn two_statements_on_one_line_rejected() {
        assert!(!parse("name a version 1").errors.is_empty());
    }
}
