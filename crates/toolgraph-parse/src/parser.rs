//! Expression compiler: tokens -> immutable operator tree.
//!
//! The parser is a two-stack precedence machine: an operator stack of
//! tagged pending-op frames and an operand stack of tagged frames. Function
//! and index openers push a `Marker` operand frame; the matching closer
//! reduces back to it and binds everything above it as the argument list.
//! Parenthesis, function, and index frames are hard barriers that
//! `reduce` never crosses.

use std::cell::Cell;
use std::fmt::{self, Display};
use std::sync::Arc;

use smallvec::SmallVec;
use toolgraph_common::{CalcError, CalcErrorKind, Unit, UnitRegistry};

use crate::tokenizer::{Token, TokenType, Tokenizer};

/// Resolves function names (case-insensitive) to their minimum arity.
/// Unknown names fail compilation with `UnknownFunction`.
pub trait FunctionResolver {
    fn min_args(&self, name: &str) -> Option<usize>;
}

impl<F> FunctionResolver for F
where
    F: Fn(&str) -> Option<usize>,
{
    fn min_args(&self, name: &str) -> Option<usize> {
        self(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Range,
}

impl BinaryOp {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(BinaryOp::Add),
            '-' => Some(BinaryOp::Subtract),
            '*' => Some(BinaryOp::Multiply),
            '/' => Some(BinaryOp::Divide),
            '%' => Some(BinaryOp::Modulo),
            '^' => Some(BinaryOp::Power),
            ':' => Some(BinaryOp::Range),
            _ => None,
        }
    }

    /// Higher binds tighter. Leaves and argument boundaries sit far above
    /// all of these; unary minus (150) outranks everything here.
    fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Range => 50,
            BinaryOp::Power => 40,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 30,
            BinaryOp::Add | BinaryOp::Subtract => 20,
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "^",
            BinaryOp::Range => ":",
        })
    }
}

/// One node of a compiled formula. The tree is immutable; evaluation is
/// pure given the state of everything it references. The only interior
/// state is each reference's bounded recursion counter.
#[derive(Debug, Clone, PartialEq)]
pub enum OpNode {
    NumberConstant(f64),
    StringConstant(String),
    /// A numeric literal folded with its display unit at parse time.
    UnitConstant { value: f64, unit: Arc<Unit> },
    Reference { path: String, depth: Cell<u8> },
    Unary { op: UnaryOp, expr: Box<OpNode> },
    Binary {
        op: BinaryOp,
        left: Box<OpNode>,
        right: Box<OpNode>,
    },
    Function { name: String, args: Vec<OpNode> },
    Index {
        target: Box<OpNode>,
        args: Vec<OpNode>,
    },
}

impl OpNode {
    pub fn reference<S: Into<String>>(path: S) -> OpNode {
        OpNode::Reference {
            path: path.into(),
            depth: Cell::new(0),
        }
    }

    /// Every reference path in the tree, in evaluation order. This is the
    /// walk hosts use to collect input sources for diagram/undo tooling;
    /// it visits the same nodes evaluation touches.
    pub fn collect_reference_paths(&self, out: &mut Vec<String>) {
        match self {
            OpNode::Reference { path, .. } => out.push(path.clone()),
            OpNode::Unary { expr, .. } => expr.collect_reference_paths(out),
            OpNode::Binary { left, right, .. } => {
                left.collect_reference_paths(out);
                right.collect_reference_paths(out);
            }
            OpNode::Function { args, .. } => {
                for arg in args {
                    arg.collect_reference_paths(out);
                }
            }
            OpNode::Index { target, args } => {
                target.collect_reference_paths(out);
                for arg in args {
                    arg.collect_reference_paths(out);
                }
            }
            OpNode::NumberConstant(_) | OpNode::StringConstant(_) | OpNode::UnitConstant { .. } => {
            }
        }
    }
}

impl Display for OpNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpNode::NumberConstant(v) => write!(f, "{v}"),
            OpNode::StringConstant(s) => write!(f, "\"{s}\""),
            OpNode::UnitConstant { value, unit } => write!(f, "{value} {unit}"),
            OpNode::Reference { path, .. } => write!(f, "{path}"),
            OpNode::Unary { expr, .. } => write!(f, "-({expr})"),
            OpNode::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
            OpNode::Function { name, args } => {
                write!(f, "{{{name}")?;
                for (i, arg) in args.iter().enumerate() {
                    write!(f, "{}{arg}", if i == 0 { " " } else { ", " })?;
                }
                write!(f, "}}")
            }
            OpNode::Index { target, args } => {
                write!(f, "{target}[")?;
                for (i, arg) in args.iter().enumerate() {
                    write!(f, "{}{arg}", if i == 0 { "" } else { ", " })?;
                }
                write!(f, "]")
            }
        }
    }
}

/* ───────────────────── parser stack frames ───────────────────── */

/// Operand-stack frame. The marker delimits a function/index argument
/// list; nothing reduces past it.
#[derive(Debug)]
enum OperandFrame {
    Node(OpNode),
    Marker,
}

/// Operator-stack frame. `Paren`, `Function`, and `Index` are barriers.
#[derive(Debug)]
enum PendingOp {
    Unary(UnaryOp),
    Binary(BinaryOp),
    Paren,
    Function { name: String, min_args: usize },
    Index,
}

impl PendingOp {
    fn is_barrier(&self) -> bool {
        matches!(
            self,
            PendingOp::Paren | PendingOp::Function { .. } | PendingOp::Index
        )
    }

    fn precedence(&self) -> u8 {
        match self {
            PendingOp::Unary(_) => 150,
            PendingOp::Binary(op) => op.precedence(),
            _ => 0,
        }
    }
}

/// A parser for one formula's source text.
pub struct Parser<'a> {
    tokens: Vec<Token>,
    position: usize,
    registry: &'a UnitRegistry,
    resolver: &'a dyn FunctionResolver,
    operators: SmallVec<[PendingOp; 8]>,
    operands: SmallVec<[OperandFrame; 8]>,
    expect_operand: bool,
}

pub fn parse(
    formula: &str,
    registry: &UnitRegistry,
    resolver: &dyn FunctionResolver,
) -> Result<OpNode, CalcError> {
    let tokenizer = Tokenizer::new(formula)?;
    Parser::new(tokenizer.items, registry, resolver).parse()
}

impl<'a> Parser<'a> {
    pub fn new(
        tokens: Vec<Token>,
        registry: &'a UnitRegistry,
        resolver: &'a dyn FunctionResolver,
    ) -> Self {
        Parser {
            tokens,
            position: 0,
            registry,
            resolver,
            operators: SmallVec::new(),
            operands: SmallVec::new(),
            expect_operand: true,
        }
    }

    pub fn parse(mut self) -> Result<OpNode, CalcError> {
        while let Some(token) = self.next_significant() {
            match token.token_type {
                TokenType::Word => self.parse_word(token)?,
                TokenType::Text => {
                    self.require_operand_position(&token)?;
                    self.push_node(OpNode::StringConstant(token.value));
                }
                TokenType::Operator => self.parse_operator(token)?,
                TokenType::Punctuation => self.parse_punctuation(token)?,
                TokenType::Whitespace => unreachable!("whitespace skipped"),
            }
        }

        while let Some(op) = self.operators.pop() {
            match op {
                PendingOp::Paren | PendingOp::Function { .. } => {
                    return Err(CalcError::new(CalcErrorKind::ParenthesisMismatch));
                }
                PendingOp::Index => {
                    return Err(CalcError::new(CalcErrorKind::IndexMismatch));
                }
                other => self.apply(other)?,
            }
        }

        match (self.operands.pop(), self.operands.pop()) {
            (Some(OperandFrame::Node(node)), None) => Ok(node),
            _ => Err(CalcError::new(CalcErrorKind::Syntax)
                .with_param("reason", "expression did not reduce to one value")),
        }
    }

    /* ───────── token stream helpers ───────── */

    fn next_significant(&mut self) -> Option<Token> {
        while self.position < self.tokens.len() {
            let token = self.tokens[self.position].clone();
            self.position += 1;
            if token.token_type != TokenType::Whitespace {
                return Some(token);
            }
        }
        None
    }

    fn peek_significant(&self) -> Option<&Token> {
        self.tokens[self.position..]
            .iter()
            .find(|t| t.token_type != TokenType::Whitespace)
    }

    /// The token physically next in the stream (whitespace included).
    fn peek_raw(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn syntax(&self, reason: &str, token: &Token) -> CalcError {
        CalcError::new(CalcErrorKind::Syntax)
            .with_param("reason", reason)
            .with_param("token", token.value.clone())
            .with_param("position", token.start.to_string())
    }

    fn require_operand_position(&self, token: &Token) -> Result<(), CalcError> {
        if !self.expect_operand {
            return Err(self.syntax("operand where operator expected", token));
        }
        Ok(())
    }

    /* ───────── stack helpers ───────── */

    fn push_node(&mut self, node: OpNode) {
        self.operands.push(OperandFrame::Node(node));
        self.expect_operand = false;
    }

    fn pop_node(&mut self) -> Result<OpNode, CalcError> {
        match self.operands.pop() {
            Some(OperandFrame::Node(node)) => Ok(node),
            _ => Err(CalcError::new(CalcErrorKind::Syntax)
                .with_param("reason", "operator is missing an operand")),
        }
    }

    fn apply(&mut self, op: PendingOp) -> Result<(), CalcError> {
        match op {
            PendingOp::Unary(op) => {
                let expr = self.pop_node()?;
                self.operands.push(OperandFrame::Node(OpNode::Unary {
                    op,
                    expr: Box::new(expr),
                }));
            }
            PendingOp::Binary(op) => {
                let right = self.pop_node()?;
                let left = self.pop_node()?;
                self.operands.push(OperandFrame::Node(OpNode::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                }));
            }
            PendingOp::Paren | PendingOp::Function { .. } | PendingOp::Index => {
                unreachable!("barriers are handled by their closers")
            }
        }
        Ok(())
    }

    /// Reduce pending unary/binary ops with precedence >= `incoming`.
    /// Barriers stop the reduction unconditionally.
    fn reduce_while(&mut self, incoming: u8) -> Result<(), CalcError> {
        while let Some(top) = self.operators.last() {
            if top.is_barrier() || top.precedence() < incoming {
                break;
            }
            let op = self.operators.pop().unwrap();
            self.apply(op)?;
        }
        Ok(())
    }

    /// Reduce everything down to the nearest barrier and return it.
    fn reduce_to_barrier(&mut self) -> Result<Option<PendingOp>, CalcError> {
        while let Some(op) = self.operators.pop() {
            if op.is_barrier() {
                return Ok(Some(op));
            }
            self.apply(op)?;
        }
        Ok(None)
    }

    /* ───────── grammar pieces ───────── */

    fn parse_word(&mut self, token: Token) -> Result<(), CalcError> {
        self.require_operand_position(&token)?;
        let bytes = token.value.as_bytes();
        let numeric = bytes[0].is_ascii_digit()
            || (bytes[0] == b'.' && bytes.len() > 1 && bytes[1].is_ascii_digit());
        if numeric {
            self.parse_number(token)
        } else {
            self.push_node(OpNode::reference(token.value));
            Ok(())
        }
    }

    fn parse_number(&mut self, token: Token) -> Result<(), CalcError> {
        // A word like "10ft" carries its unit in the same token.
        let (value, inline_unit) = match token.value.parse::<f64>() {
            Ok(v) => (v, None),
            Err(_) => {
                let split = token
                    .value
                    .find(|c: char| c.is_ascii_alphabetic())
                    .ok_or_else(|| self.syntax("invalid number", &token))?;
                let value: f64 = token.value[..split]
                    .parse()
                    .map_err(|_| self.syntax("invalid number", &token))?;
                (value, Some(token.value[split..].to_string()))
            }
        };

        let unit_name = match inline_unit {
            Some(name) => Some(name),
            None => self.take_unit_suffix(),
        };

        match unit_name {
            Some(name) => {
                let unit = self.registry.lookup(&name)?;
                self.push_node(OpNode::UnitConstant { value, unit });
            }
            None => self.push_node(OpNode::NumberConstant(value)),
        }
        Ok(())
    }

    /// A numeric token immediately followed by a unit-shaped token folds
    /// into one unit-scaled constant. Unit-shaped: a word starting with a
    /// letter, a quoted string, or `1/...`. Compound tails (`m/s^2`) are
    /// consumed greedily while the tokens stay physically adjacent.
    fn take_unit_suffix(&mut self) -> Option<String> {
        let next = self.peek_significant()?;
        match next.token_type {
            TokenType::Text => {
                let name = next.value.clone();
                self.skip_to_after_peeked();
                Some(name)
            }
            TokenType::Word => {
                let starts_letter = next.value.as_bytes()[0].is_ascii_alphabetic();
                let is_one_over = next.value == "1" && self.word_begins_compound(next);
                if !(starts_letter || is_one_over) {
                    return None;
                }
                Some(self.consume_compound_unit())
            }
            _ => None,
        }
    }

    /// True when the word token is physically followed by `/` and a word,
    /// i.e. the `1/...` unit spelling.
    fn word_begins_compound(&self, word: &Token) -> bool {
        let mut iter = self
            .tokens
            .iter()
            .skip_while(|t| !std::ptr::eq(*t, word))
            .skip(1);
        match (iter.next(), iter.next()) {
            (Some(op), Some(tail)) => {
                op.token_type == TokenType::Operator
                    && op.value == "/"
                    && op.start == word.end
                    && tail.token_type == TokenType::Word
                    && tail.start == op.end
            }
            _ => false,
        }
    }

    fn skip_to_after_peeked(&mut self) {
        while self.position < self.tokens.len() {
            let is_ws = self.tokens[self.position].token_type == TokenType::Whitespace;
            self.position += 1;
            if !is_ws {
                return;
            }
        }
    }

    /// Consume `word (op word)*` with ops in `- / ^` while adjacent, and
    /// return the joined unit text.
    fn consume_compound_unit(&mut self) -> String {
        // Skip whitespace to the unit word.
        while self.tokens[self.position].token_type == TokenType::Whitespace {
            self.position += 1;
        }
        let mut text = self.tokens[self.position].value.clone();
        let mut end = self.tokens[self.position].end;
        self.position += 1;
        while self.position + 1 < self.tokens.len() {
            let op = &self.tokens[self.position];
            let tail = &self.tokens[self.position + 1];
            let joins = op.token_type == TokenType::Operator
                && matches!(op.first_char(), '-' | '/' | '^')
                && op.start == end
                && tail.token_type == TokenType::Word
                && tail.start == op.end;
            if !joins {
                break;
            }
            text.push(op.first_char());
            text.push_str(&tail.value);
            end = tail.end;
            self.position += 2;
        }
        text
    }

    fn parse_operator(&mut self, token: Token) -> Result<(), CalcError> {
        let c = token.first_char();
        if self.expect_operand {
            return match c {
                '-' => {
                    self.operators.push(PendingOp::Unary(UnaryOp::Minus));
                    Ok(())
                }
                // Root / parent markers introduce a reference path.
                '/' | '^' => {
                    let next = self
                        .peek_raw()
                        .filter(|t| t.token_type == TokenType::Word && t.start == token.end)
                        .cloned()
                        .ok_or_else(|| self.syntax("operator where value expected", &token))?;
                    self.skip_to_after_peeked();
                    self.push_node(OpNode::reference(format!("{c}{}", next.value)));
                    Ok(())
                }
                _ => Err(self.syntax("operator where value expected", &token)),
            };
        }

        let op = BinaryOp::from_char(c)
            .ok_or_else(|| self.syntax("unrecognized operator", &token))?;
        self.reduce_while(op.precedence())?;
        self.operators.push(PendingOp::Binary(op));
        self.expect_operand = true;
        Ok(())
    }

    fn parse_punctuation(&mut self, token: Token) -> Result<(), CalcError> {
        match token.first_char() {
            '(' => {
                self.require_operand_position(&token)?;
                self.operators.push(PendingOp::Paren);
                Ok(())
            }
            ')' => {
                match self.reduce_to_barrier()? {
                    Some(PendingOp::Paren) => Ok(()),
                    _ => Err(CalcError::new(CalcErrorKind::ParenthesisMismatch)
                        .with_param("position", token.start.to_string())),
                }
            }
            '{' => {
                self.require_operand_position(&token)?;
                let name_token = self
                    .next_significant()
                    .filter(|t| t.is_word())
                    .ok_or_else(|| self.syntax("function name expected after '{'", &token))?;
                let name = name_token.value.to_lowercase();
                let min_args = self.resolver.min_args(&name).ok_or_else(|| {
                    CalcError::new(CalcErrorKind::UnknownFunction)
                        .with_param("name", name_token.value.clone())
                })?;
                self.operators.push(PendingOp::Function { name, min_args });
                self.operands.push(OperandFrame::Marker);
                self.expect_operand = true;
                Ok(())
            }
            '}' => {
                let frame = self.reduce_to_barrier()?;
                let Some(PendingOp::Function { name, min_args }) = frame else {
                    return Err(CalcError::new(CalcErrorKind::ParenthesisMismatch)
                        .with_param("position", token.start.to_string()));
                };
                let args = self.collect_arguments()?;
                if args.len() < min_args {
                    return Err(CalcError::new(CalcErrorKind::ArgumentCount)
                        .with_param("name", name)
                        .with_param("given", args.len().to_string())
                        .with_param("required", min_args.to_string()));
                }
                self.push_node(OpNode::Function { name, args });
                Ok(())
            }
            '[' => {
                if self.expect_operand {
                    return Err(self.syntax("index without a value to index", &token));
                }
                self.operators.push(PendingOp::Index);
                self.operands.push(OperandFrame::Marker);
                self.expect_operand = true;
                Ok(())
            }
            ']' => {
                let frame = self.reduce_to_barrier()?;
                let Some(PendingOp::Index) = frame else {
                    return Err(CalcError::new(CalcErrorKind::IndexMismatch)
                        .with_param("position", token.start.to_string()));
                };
                let args = self.collect_arguments()?;
                if args.is_empty() {
                    return Err(CalcError::new(CalcErrorKind::ArgumentCount)
                        .with_param("name", "[]")
                        .with_param("given", "0")
                        .with_param("required", "1"));
                }
                let target = self.pop_node()?;
                self.push_node(OpNode::Index {
                    target: Box::new(target),
                    args,
                });
                Ok(())
            }
            ',' => {
                // Finish the current argument; keep the list's barrier.
                let barrier = self.reduce_to_barrier()?;
                match barrier {
                    Some(frame @ (PendingOp::Function { .. } | PendingOp::Index)) => {
                        self.operators.push(frame);
                        self.expect_operand = true;
                        Ok(())
                    }
                    _ => Err(self.syntax("',' outside an argument list", &token)),
                }
            }
            _ => Err(self.syntax("unexpected punctuation", &token)),
        }
    }

    /// Pop operands down to the marker; they are the argument list in
    /// source order.
    fn collect_arguments(&mut self) -> Result<Vec<OpNode>, CalcError> {
        let mut args = Vec::new();
        loop {
            match self.operands.pop() {
                Some(OperandFrame::Marker) => break,
                Some(OperandFrame::Node(node)) => args.push(node),
                None => {
                    return Err(CalcError::new(CalcErrorKind::Syntax)
                        .with_param("reason", "argument list has no opening marker"));
                }
            }
        }
        args.reverse();
        Ok(args)
    }
}
