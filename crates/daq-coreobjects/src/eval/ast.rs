//! Immutable expression tree.
//!
//! Trees are produced once by the parser and shared (`Arc`) between every
//! bound copy of an [`EvalValue`](super::EvalValue); evaluation never mutates
//! them.

use crate::value::Value;

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

/// Infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// `if(cond, then, else)`, only the taken branch is evaluated
    If,
    /// `switch(v, k1, r1, k2, r2, ..., [default])`
    Switch,
    Min,
    Max,
    Abs,
    Round,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "if" => Some(Function::If),
            "switch" => Some(Function::Switch),
            "min" => Some(Function::Min),
            "max" => Some(Function::Max),
            "abs" => Some(Function::Abs),
            "round" => Some(Function::Round),
            _ => None,
        }
    }

    /// Accepted argument count range.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Function::If => (3, 3),
            Function::Switch => (3, usize::MAX),
            Function::Min | Function::Max => (2, 2),
            Function::Abs | Function::Round => (1, 1),
        }
    }
}

/// Accessor applied to a `$` reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueAccessor {
    /// Raw stored or default value
    Value,
    /// Selection-mapped value (`:SelectedValue`)
    SelectedValue,
}

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    /// The proposed value bound by coercers and validators
    ProposedValue,
    /// `$Path` or `$Path:SelectedValue`
    PropertyValue {
        path: String,
        accessor: ValueAccessor,
    },
    /// `%Name` (yields the property) or `%Name:Value` (yields its value)
    PropertyReference { name: String, as_value: bool },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Nesting depth of the tree (a leaf has depth 1).
    pub fn depth(&self) -> usize {
        1 + match self {
            Expr::Literal(_)
            | Expr::ProposedValue
            | Expr::PropertyValue { .. }
            | Expr::PropertyReference { .. } => 0,
            Expr::List(items) => items.iter().map(Expr::depth).max().unwrap_or(0),
            Expr::Unary { operand, .. } => operand.depth(),
            Expr::Binary { lhs, rhs, .. } => lhs.depth().max(rhs.depth()),
            Expr::Call { args, .. } => args.iter().map(Expr::depth).max().unwrap_or(0),
        }
    }

    /// Visit every `$`/`%` name in source order.
    pub fn collect_names(&self, out: &mut Vec<String>) {
        match self {
            Expr::PropertyValue { path, .. } => out.push(path.clone()),
            Expr::PropertyReference { name, .. } => out.push(name.clone()),
            Expr::List(items) | Expr::Call { args: items, .. } => {
                for item in items {
                    item.collect_names(out);
                }
            }
            Expr::Unary { operand, .. } => operand.collect_names(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_names(out);
                rhs.collect_names(out);
            }
            Expr::Literal(_) | Expr::ProposedValue => {}
        }
    }
}
