//! Expression trees stored in cells.
//!
//! An [`Expr`] is a closed tagged union. Function calls own a fixed-size
//! argument slice whose length always equals the arity of their
//! [`FunctionKind`]; [`Call::new`] is the only way to build one.

use std::collections::BTreeSet;
use std::fmt;

use super::cell_ref::{CellRange, CellRef};
use super::error::ParseError;
use super::format::number_literal;
use super::position::Position;

/// Every operator and named function the engine understands.
///
/// The declaration order defines the persisted function codes.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum FunctionKind {
    Sum,
    Count,
    Min,
    Max,
    CountEqual,
    If,
    Pow,
    Mul,
    Div,
    Add,
    Sub,
    Neg,
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
    Eq,
}

impl FunctionKind {
    pub const ALL: [FunctionKind; 18] = [
        FunctionKind::Sum,
        FunctionKind::Count,
        FunctionKind::Min,
        FunctionKind::Max,
        FunctionKind::CountEqual,
        FunctionKind::If,
        FunctionKind::Pow,
        FunctionKind::Mul,
        FunctionKind::Div,
        FunctionKind::Add,
        FunctionKind::Sub,
        FunctionKind::Neg,
        FunctionKind::Lt,
        FunctionKind::Le,
        FunctionKind::Gt,
        FunctionKind::Ge,
        FunctionKind::Ne,
        FunctionKind::Eq,
    ];

    /// Number of arguments this function always takes.
    pub const fn arity(self) -> usize {
        match self {
            FunctionKind::Sum
            | FunctionKind::Count
            | FunctionKind::Min
            | FunctionKind::Max
            | FunctionKind::Neg => 1,
            FunctionKind::CountEqual
            | FunctionKind::Pow
            | FunctionKind::Mul
            | FunctionKind::Div
            | FunctionKind::Add
            | FunctionKind::Sub
            | FunctionKind::Lt
            | FunctionKind::Le
            | FunctionKind::Gt
            | FunctionKind::Ge
            | FunctionKind::Ne
            | FunctionKind::Eq => 2,
            FunctionKind::If => 3,
        }
    }

    /// Persisted code for this kind.
    pub fn code(self) -> i8 {
        self as i8
    }

    pub fn from_code(code: i8) -> Option<FunctionKind> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| FunctionKind::ALL.get(idx).copied())
    }

    /// Infix symbol for operators, `None` for named functions.
    pub fn operator_symbol(self) -> Option<&'static str> {
        Some(match self {
            FunctionKind::Pow => "^",
            FunctionKind::Mul => "*",
            FunctionKind::Div => "/",
            FunctionKind::Add => "+",
            FunctionKind::Sub => "-",
            FunctionKind::Neg => "-",
            FunctionKind::Lt => "<",
            FunctionKind::Le => "<=",
            FunctionKind::Gt => ">",
            FunctionKind::Ge => ">=",
            FunctionKind::Ne => "<>",
            FunctionKind::Eq => "=",
            _ => return None,
        })
    }
}

/// A function or operator application with exactly `kind.arity()` arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    kind: FunctionKind,
    args: Box<[Expr]>,
}

impl Call {
    /// Build a call, checking the argument count against the kind's arity.
    pub fn new(kind: FunctionKind, args: Vec<Expr>) -> Result<Call, ParseError> {
        if args.len() != kind.arity() {
            return Err(ParseError::ArityMismatch {
                function: format!("{kind:?}"),
                expected: kind.arity(),
                found: args.len(),
            });
        }
        Ok(Call {
            kind,
            args: args.into_boxed_slice(),
        })
    }

    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    pub fn args(&self) -> &[Expr] {
        &self.args
    }

    /// Mutable access to the arguments. The slice length cannot change.
    pub fn args_mut(&mut self) -> &mut [Expr] {
        &mut self.args
    }
}

/// An expression tree node.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Expr {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Reference(CellRef),
    Range(CellRange),
    Call(Call),
}

impl Expr {
    /// Visit every node in pre-order.
    pub fn walk<F: FnMut(&Expr)>(&self, f: &mut F) {
        f(self);
        if let Expr::Call(call) = self {
            for arg in call.args() {
                arg.walk(f);
            }
        }
    }

    fn walk_mut<F: FnMut(&mut Expr)>(&mut self, f: &mut F) {
        f(self);
        if let Expr::Call(call) = self {
            for arg in call.args_mut() {
                arg.walk_mut(f);
            }
        }
    }

    /// Every position this expression reads, with ranges expanded.
    pub fn dependencies(&self) -> BTreeSet<Position> {
        let mut deps = BTreeSet::new();
        self.walk(&mut |node| match node {
            Expr::Reference(r) => {
                deps.insert(r.pos);
            }
            Expr::Range(range) => deps.extend(range.positions()),
            _ => {}
        });
        deps
    }

    /// Total number of cells covered by the ranges in this expression.
    pub fn range_cells(&self) -> u64 {
        let mut total = 0u64;
        self.walk(&mut |node| {
            if let Expr::Range(range) = node {
                total = total.saturating_add(range.cell_count());
            }
        });
        total
    }

    /// Shift every relative reference by `(dx, dy)`.
    /// Returns whether any reference now points somewhere else.
    pub fn apply_relative_offset(&mut self, dx: i32, dy: i32) -> bool {
        let mut moved = false;
        self.walk_mut(&mut |node| match node {
            Expr::Reference(r) => moved |= r.apply_relative_offset(dx, dy),
            Expr::Range(range) => moved |= range.apply_relative_offset(dx, dy),
            _ => {}
        });
        moved
    }

    /// First referenced position with no A1 text form, if any.
    pub fn off_grid_reference(&self) -> Option<Position> {
        let mut found = None;
        self.walk(&mut |node| {
            let corners = match node {
                Expr::Reference(r) => [Some(r.pos), None],
                Expr::Range(range) => [Some(range.start.pos), Some(range.end.pos)],
                _ => return,
            };
            if found.is_none() {
                found = corners.into_iter().flatten().find(|pos| !pos.is_addressable());
            }
        });
        found
    }

    /// Maximum nesting depth of calls (a leaf has depth 1).
    pub fn depth(&self) -> usize {
        match self {
            Expr::Call(call) => 1 + call.args().iter().map(Expr::depth).max().unwrap_or(0),
            _ => 1,
        }
    }
}

/// Renders formula text (without the leading `=`) that parses back to an
/// expression with the same value. Operators are fully parenthesized.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Empty => Ok(()),
            Expr::Number(n) => match number_literal(*n) {
                Some(text) if text.starts_with('-') => write!(f, "({text})"),
                Some(text) => f.write_str(&text),
                None => f.write_str("(1e999-1e999)"),
            },
            Expr::Text(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Expr::Reference(r) => write!(f, "{r}"),
            Expr::Range(range) => write!(f, "{range}"),
            Expr::Call(call) => {
                let args = call.args();
                match (call.kind(), call.kind().operator_symbol()) {
                    (FunctionKind::Neg, _) => write!(f, "(-{})", args[0]),
                    (_, Some(symbol)) => write!(f, "({}{}{})", args[0], symbol, args[1]),
                    (kind, None) => {
                        write!(f, "{}(", crate::builtins::function_name(kind))?;
                        for (idx, arg) in args.iter().enumerate() {
                            if idx > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{arg}")?;
                        }
                        write!(f, ")")
                    }
                }
            }
        }
    }
}
