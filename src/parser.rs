//! Extracts motion blocks from control-loop source text.
//!
//! The parser recognises two shapes of pose data:
//!
//! * named 9-element arrays (`std::array<float, 9> pose = {…};` or
//!   `float pose[9] = {…};`) referenced by a pose-update call, and
//! * inline brace lists passed straight to a pose-update call.
//!
//! A pose-update call has the layout
//! `update(duration, pose, state, nonlinearity, …)`; a trailing `1` or `2`
//! argument marks the startup and shutdown calls, whose durations belong to
//! the sentinel blocks. Anything malformed is reported as a [`Diagnostic`]
//! and skipped; the parse itself only fails for input that is not a motion
//! script at all.

use crate::config::ParserConfig;
use crate::error::{EvalError, ParseError};
use crate::expr::{Constants, evaluate};
use crate::joint::{JOINT_COUNT, JointIndex, JointVector};
use crate::lexer::{Token, TokenKind, tokenize};
use crate::sequence::{
    BlockId, MAX_NONLINEARITY, MIN_DURATION_MS, MIN_NONLINEARITY, MotionBlock, MotionSequence,
};
use std::fmt;
use std::ops::Range;

/// Keywords that may directly precede a call statement.
const STATEMENT_KEYWORDS: [&str; 3] = ["return", "else", "do"];

/// A non-fatal problem found while parsing.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    /// 1-based source line.
    pub line: usize,
    pub kind: DiagnosticKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DiagnosticKind {
    /// The array did not resolve to exactly nine cells and was dropped.
    WrongCellCount { array: String, cells: usize },
    /// A cell could not be evaluated and was read as `0`.
    UnresolvedCell {
        array: String,
        cell: usize,
        error: EvalError,
    },
    /// A named pose array that no pose-update call references.
    UnreferencedArray { array: String },
    /// A pose-update call that does not follow the expected argument layout.
    MalformedCall { reason: String },
    /// A call references an array that was never declared (or was dropped).
    UnknownArray { array: String },
    DurationRaised { array: String, duration_ms: i64 },
    NonlinearityClamped { array: String, value: f64 },
    PositionOutOfLimit {
        array: String,
        joint: JointIndex,
        value: f32,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: ", self.line)?;
        match &self.kind {
            DiagnosticKind::WrongCellCount { array, cells } => {
                write!(f, "`{array}` has {cells} cells, expected {JOINT_COUNT}; skipped")
            }
            DiagnosticKind::UnresolvedCell { array, cell, error } => {
                write!(f, "`{array}` cell {cell}: {error}; using 0")
            }
            DiagnosticKind::UnreferencedArray { array } => {
                write!(f, "`{array}` is not used by any pose-update call")
            }
            DiagnosticKind::MalformedCall { reason } => write!(f, "pose-update call skipped: {reason}"),
            DiagnosticKind::UnknownArray { array } => {
                write!(f, "pose-update call references unknown array `{array}`")
            }
            DiagnosticKind::DurationRaised { array, duration_ms } => write!(
                f,
                "`{array}` duration {duration_ms} ms raised to {MIN_DURATION_MS} ms"
            ),
            DiagnosticKind::NonlinearityClamped { array, value } => write!(
                f,
                "`{array}` nonlinearity {value} clamped into {MIN_NONLINEARITY}..={MAX_NONLINEARITY}"
            ),
            DiagnosticKind::PositionOutOfLimit { array, joint, value } => {
                write!(f, "`{array}` {joint} = {value} exceeds the joint limit")
            }
        }
    }
}

/// Everything recovered from one script.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedScript {
    /// User blocks: named arrays in declaration order, then inline arrays in call order.
    pub blocks: Vec<MotionBlock>,
    /// Duration of the startup call, if the script has one.
    pub init_duration_ms: Option<u32>,
    /// Duration of the shutdown call, if the script has one.
    pub shutdown_duration_ms: Option<u32>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParsedScript {
    /// Frames the blocks with the sentinels, carrying over any recovered sentinel durations.
    pub fn into_sequence(self) -> MotionSequence {
        let mut sequence = MotionSequence::with_user_blocks(self.blocks);
        if let Some(ms) = self.init_duration_ms {
            sequence.set_sentinel_duration(BlockId::Init, ms);
        }
        if let Some(ms) = self.shutdown_duration_ms {
            sequence.set_sentinel_duration(BlockId::Shutdown, ms);
        }
        sequence
    }
}

/// Parses `text` with the default configuration.
pub fn parse(text: &str) -> Result<MotionSequence, ParseError> {
    MotionScriptParser::default()
        .parse(text)
        .map(ParsedScript::into_sequence)
}

/// Parses raw bytes with the default configuration.
pub fn parse_bytes(bytes: &[u8]) -> Result<MotionSequence, ParseError> {
    MotionScriptParser::default()
        .parse_bytes(bytes)
        .map(ParsedScript::into_sequence)
}

/// Stateless script parser.
#[derive(Clone, Debug, Default)]
pub struct MotionScriptParser {
    config: ParserConfig,
}

/// A declared pose array, before cross-referencing.
struct ArrayDecl {
    name: String,
    line: usize,
    cells: Option<JointVector>,
}

/// A pose-update call referencing a named array.
struct NamedCall {
    array: String,
    line: usize,
    duration_ms: i64,
    nonlinearity: f64,
}

impl MotionScriptParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<ParsedScript, ParseError> {
        let text = std::str::from_utf8(bytes).map_err(|e| ParseError::NotText {
            offset: e.valid_up_to(),
        })?;
        self.parse(text)
    }

    pub fn parse(&self, text: &str) -> Result<ParsedScript, ParseError> {
        let tokens = tokenize(text);
        let src = Source::new(&tokens);

        if !(0..src.len()).any(|i| src.ident(i).is_some_and(|id| self.is_call_name(id))) {
            return Err(ParseError::NoPoseCalls {
                expected: self.config.call_names.clone(),
            });
        }

        let mut out = ParsedScript::default();
        let constants = src.constants();

        let arrays = self.declarations(&src, &constants, &mut out.diagnostics);
        let mut named_calls = Vec::new();
        let mut inline_blocks = Vec::new();
        self.calls(&src, &constants, &mut out, &mut named_calls, &mut inline_blocks);

        for decl in &arrays {
            let Some(cells) = decl.cells else { continue };
            let Some(call) = named_calls.iter().find(|c| c.array == decl.name) else {
                tracing::debug!(array = %decl.name, line = decl.line, "pose array not referenced");
                out.diagnostics.push(Diagnostic {
                    line: decl.line,
                    kind: DiagnosticKind::UnreferencedArray {
                        array: decl.name.clone(),
                    },
                });
                continue;
            };
            let block = make_block(
                &decl.name,
                call.line,
                cells,
                call.duration_ms,
                call.nonlinearity,
                &mut out.diagnostics,
            );
            out.blocks.push(block);
        }

        for call in &named_calls {
            if !arrays.iter().any(|d| d.name == call.array) {
                out.diagnostics.push(Diagnostic {
                    line: call.line,
                    kind: DiagnosticKind::UnknownArray {
                        array: call.array.clone(),
                    },
                });
            }
        }

        out.blocks.extend(inline_blocks);

        for diagnostic in &out.diagnostics {
            if !matches!(diagnostic.kind, DiagnosticKind::UnreferencedArray { .. }) {
                tracing::warn!("{diagnostic}");
            }
        }
        Ok(out)
    }

    fn is_call_name(&self, ident: &str) -> bool {
        self.config.call_names.iter().any(|n| n == ident)
    }

    /// Finds every 9-element float array declaration.
    fn declarations(
        &self,
        src: &Source<'_>,
        constants: &Constants,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<ArrayDecl> {
        let mut arrays = Vec::new();
        let mut i = 0;
        while i < src.len() {
            let Some((name, size, open)) = src.array_declaration(i) else {
                i += 1;
                continue;
            };
            let Some(close) = src.matching(open) else {
                break;
            };
            i = close + 1;
            // `{}` is value-initialisation (a zeroed working buffer), not a pose.
            if size.is_some_and(|n| n != JOINT_COUNT) || close == open + 1 {
                continue;
            }

            let line = src.line(open);
            let cells = src.cells(open + 1..close, &name, constants, diagnostics);
            let cells = match to_vector(&cells) {
                Some(v) => Some(v),
                None => {
                    diagnostics.push(Diagnostic {
                        line,
                        kind: DiagnosticKind::WrongCellCount {
                            array: name.clone(),
                            cells: cells.len(),
                        },
                    });
                    None
                }
            };
            arrays.push(ArrayDecl { name, line, cells });
        }
        arrays
    }

    /// Walks every pose-update call, filling sentinel durations and inline blocks.
    fn calls(
        &self,
        src: &Source<'_>,
        constants: &Constants,
        out: &mut ParsedScript,
        named: &mut Vec<NamedCall>,
        inline: &mut Vec<MotionBlock>,
    ) {
        let mut inline_count = 0;
        for i in 0..src.len() {
            let Some(ident) = src.ident(i) else { continue };
            if !self.is_call_name(ident) || !src.is_punct(i + 1, '(') {
                continue;
            }
            // `void update(int steps, …)` is the definition, not a call.
            if i > 0 && src.ident(i - 1).is_some_and(|prev| !STATEMENT_KEYWORDS.contains(&prev)) {
                continue;
            }
            let Some(close) = src.matching(i + 1) else {
                continue;
            };
            let line = src.line(i);
            let args = src.split_top_level(i + 2..close);
            let malformed = |reason: &str| Diagnostic {
                line,
                kind: DiagnosticKind::MalformedCall {
                    reason: reason.to_string(),
                },
            };

            if args.len() < 4 {
                out.diagnostics.push(malformed("fewer than four arguments"));
                continue;
            }
            let Some(duration_ms) = src
                .eval(args[0].clone(), constants)
                .ok()
                .filter(|d| d.is_finite() && d.fract() == 0.0)
                .map(|d| d as i64)
            else {
                out.diagnostics.push(malformed("duration is not an integer"));
                continue;
            };

            let flag = args
                .last()
                .filter(|_| args.len() > 7)
                .and_then(|r| src.single_number(r.clone()))
                .filter(|n| n.integer)
                .map(|n| n.value as i64);
            if flag == Some(self.config.startup_flag) {
                out.init_duration_ms = Some(clamp_duration(duration_ms));
                continue;
            }
            if flag == Some(self.config.shutdown_flag) {
                out.shutdown_duration_ms = Some(clamp_duration(duration_ms));
                continue;
            }

            let Some(nonlinearity) = src.single_number(args[3].clone()) else {
                out.diagnostics
                    .push(malformed("nonlinearity argument is not a numeric literal"));
                continue;
            };

            let pose = args[1].clone();
            if src.is_punct(pose.start, '{') {
                let Some(pose_close) = src.matching(pose.start) else {
                    continue;
                };
                let label = format!("inline_{}", inline_count + 1);
                let cells = src.cells(pose.start + 1..pose_close, &label, constants, &mut out.diagnostics);
                let Some(positions) = to_vector(&cells) else {
                    out.diagnostics.push(Diagnostic {
                        line,
                        kind: DiagnosticKind::WrongCellCount {
                            array: label,
                            cells: cells.len(),
                        },
                    });
                    continue;
                };
                inline_count += 1;
                let name = src
                    .trailing_comment(close)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .unwrap_or(label);
                inline.push(make_block(
                    &name,
                    line,
                    positions,
                    duration_ms,
                    nonlinearity.value,
                    &mut out.diagnostics,
                ));
            } else if pose.len() == 1
                && let Some(array) = src.ident(pose.start)
            {
                named.push(NamedCall {
                    array: array.to_string(),
                    line,
                    duration_ms,
                    nonlinearity: nonlinearity.value,
                });
            } else {
                out.diagnostics
                    .push(malformed("pose argument is neither an array name nor a brace list"));
            }
        }
    }
}

fn clamp_duration(duration_ms: i64) -> u32 {
    duration_ms.clamp(i64::from(MIN_DURATION_MS), i64::from(u32::MAX)) as u32
}

fn to_vector(cells: &[f32]) -> Option<JointVector> {
    let cells: [f32; JOINT_COUNT] = cells.try_into().ok()?;
    Some(JointVector::new(cells))
}

/// Builds a user block, bringing duration and nonlinearity into range.
fn make_block(
    name: &str,
    line: usize,
    positions: JointVector,
    duration_ms: i64,
    nonlinearity: f64,
    diagnostics: &mut Vec<Diagnostic>,
) -> MotionBlock {
    if duration_ms < i64::from(MIN_DURATION_MS) {
        diagnostics.push(Diagnostic {
            line,
            kind: DiagnosticKind::DurationRaised {
                array: name.to_string(),
                duration_ms,
            },
        });
    }
    let range = f64::from(MIN_NONLINEARITY)..=f64::from(MAX_NONLINEARITY);
    if !range.contains(&nonlinearity) {
        diagnostics.push(Diagnostic {
            line,
            kind: DiagnosticKind::NonlinearityClamped {
                array: name.to_string(),
                value: nonlinearity,
            },
        });
    }
    for (joint, value) in positions.iter() {
        if !joint.limit().contains(value) {
            diagnostics.push(Diagnostic {
                line,
                kind: DiagnosticKind::PositionOutOfLimit {
                    array: name.to_string(),
                    joint,
                    value,
                },
            });
        }
    }

    MotionBlock::new(
        name,
        positions,
        clamp_duration(duration_ms),
        (nonlinearity as f32).clamp(MIN_NONLINEARITY, MAX_NONLINEARITY),
    )
}

/// Token stream with comments hidden from structural matching.
struct Source<'t> {
    tokens: &'t [Token],
    /// Indices of non-comment tokens.
    code: Vec<usize>,
}

impl<'t> Source<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        let code = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_comment())
            .map(|(i, _)| i)
            .collect();
        Self { tokens, code }
    }

    fn len(&self) -> usize {
        self.code.len()
    }

    fn tok(&self, i: usize) -> Option<&'t Token> {
        self.code.get(i).map(|&k| &self.tokens[k])
    }

    fn ident(&self, i: usize) -> Option<&'t str> {
        self.tok(i).and_then(Token::ident)
    }

    fn is_punct(&self, i: usize, c: char) -> bool {
        self.tok(i).is_some_and(|t| t.is_punct(c))
    }

    fn is_ident(&self, i: usize, name: &str) -> bool {
        self.ident(i) == Some(name)
    }

    fn line(&self, i: usize) -> usize {
        self.tok(i).map_or(0, |t| t.line)
    }

    /// Index of the bracket closing the one at `open`.
    fn matching(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for i in open..self.len() {
            match self.tok(i)?.kind {
                TokenKind::Punct('(' | '{' | '[') => depth += 1,
                TokenKind::Punct(')' | '}' | ']') => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Splits `range` at commas outside nested brackets.
    fn split_top_level(&self, range: Range<usize>) -> Vec<Range<usize>> {
        let mut parts = Vec::new();
        let mut depth = 0usize;
        let mut start = range.start;
        for i in range.clone() {
            match self.tok(i).map(|t| &t.kind) {
                Some(TokenKind::Punct('(' | '{' | '[')) => depth += 1,
                Some(TokenKind::Punct(')' | '}' | ']')) => depth = depth.saturating_sub(1),
                Some(TokenKind::Punct(',')) if depth == 0 => {
                    parts.push(start..i);
                    start = i + 1;
                }
                _ => {}
            }
        }
        if start < range.end || !parts.is_empty() {
            parts.push(start..range.end);
        }
        parts
    }

    /// Evaluates the code tokens in `range`, comments included in the slice but ignored.
    fn eval(&self, range: Range<usize>, constants: &Constants) -> Result<f64, EvalError> {
        if range.is_empty() {
            return Err(EvalError::Empty);
        }
        let first = self.code[range.start];
        let last = self.code[range.end - 1];
        evaluate(&self.tokens[first..=last], constants)
    }

    /// The literal in `range` if it is exactly one number token.
    fn single_number(&self, range: Range<usize>) -> Option<crate::lexer::NumberLit> {
        if range.len() != 1 {
            return None;
        }
        self.tok(range.start)?.number()
    }

    /// Evaluates every non-empty element of a brace list.
    fn cells(
        &self,
        range: Range<usize>,
        array: &str,
        constants: &Constants,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<f32> {
        self.split_top_level(range)
            .into_iter()
            .filter(|r| !r.is_empty())
            .enumerate()
            .map(|(cell, r)| match self.eval(r.clone(), constants) {
                Ok(v) => v as f32,
                Err(error) => {
                    diagnostics.push(Diagnostic {
                        line: self.line(r.start),
                        kind: DiagnosticKind::UnresolvedCell {
                            array: array.to_string(),
                            cell,
                            error,
                        },
                    });
                    0.0
                }
            })
            .collect()
    }

    /// Text of a `//` comment on the same line right after the statement ending at `close`.
    fn trailing_comment(&self, close: usize) -> Option<&'t str> {
        let end = if self.is_punct(close + 1, ';') {
            close + 1
        } else {
            close
        };
        let k = self.code[end];
        let line = self.tokens[k].line;
        match self.tokens.get(k + 1) {
            Some(Token {
                kind: TokenKind::LineComment(text),
                line: l,
            }) if *l == line => Some(text.as_str()),
            _ => None,
        }
    }

    /// Recognises a pose array declaration starting at `i`; returns its
    /// name, declared size (if written) and the index of its `{`.
    fn array_declaration(&self, i: usize) -> Option<(String, Option<usize>, usize)> {
        let is_float = |j: usize| self.is_ident(j, "float") || self.is_ident(j, "double");

        // std::array<float, N> name [=] {
        if self.is_ident(i, "array")
            && self.is_punct(i + 1, '<')
            && is_float(i + 2)
            && self.is_punct(i + 3, ',')
            && self.is_punct(i + 5, '>')
        {
            let size = self.tok(i + 4)?.number().filter(|n| n.integer)?.value as usize;
            let name = self.ident(i + 6)?;
            let open = if self.is_punct(i + 7, '=') { i + 8 } else { i + 7 };
            return self
                .is_punct(open, '{')
                .then(|| (name.to_string(), Some(size), open));
        }

        // float name[N] = {   /   float name[] = {
        if is_float(i) && self.is_punct(i + 2, '[') {
            let name = self.ident(i + 1)?;
            let (size, after) = if self.is_punct(i + 3, ']') {
                (None, i + 4)
            } else {
                let n = self.tok(i + 3)?.number().filter(|n| n.integer)?;
                if !self.is_punct(i + 4, ']') {
                    return None;
                }
                (Some(n.value as usize), i + 5)
            };
            let open = if self.is_punct(after, '=') { after + 1 } else { after };
            return self.is_punct(open, '{').then(|| (name.to_string(), size, open));
        }

        None
    }

    /// Built-in constants plus every `const`/`constexpr` numeric definition in the source.
    fn constants(&self) -> Constants {
        let mut constants = Constants::default();
        for i in 0..self.len() {
            if !(self.is_ident(i, "constexpr") || self.is_ident(i, "const")) {
                continue;
            }
            let numeric = ["float", "double", "int", "auto"]
                .iter()
                .any(|ty| self.is_ident(i + 1, ty));
            if !numeric || !self.is_punct(i + 3, '=') {
                continue;
            }
            let Some(name) = self.ident(i + 2) else { continue };
            let Some(end) = (i + 4..self.len()).find(|&j| self.is_punct(j, ';')) else {
                continue;
            };
            if let Ok(value) = self.eval(i + 4..end, &constants) {
                constants.define(name, value);
            }
        }
        constants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keeps_nested_commas_together() {
        let tokens = tokenize("a, f(b, c), {d, e}");
        let src = Source::new(&tokens);
        let parts = src.split_top_level(0..src.len());
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 6);
    }

    #[test]
    fn source_constants_override_builtins() {
        let tokens = tokenize("constexpr float kPi_2 = 1.5; const double half = kPi_2 / 3;");
        let constants = Source::new(&tokens).constants();
        assert_eq!(constants.get("kPi_2"), Some(1.5));
        assert_eq!(constants.get("half"), Some(0.5));
    }

    #[test]
    fn definition_is_not_a_call() {
        let src = "void updateJointPositions(int num_time_steps, const std::array<float, 9> &target, float k) {}";
        let parsed = MotionScriptParser::default().parse(src).unwrap();
        assert!(parsed.blocks.is_empty());
        assert!(parsed.diagnostics.is_empty());
    }
}
