//! AST for condition expressions and update value templates.
//!
//! Values are never inlined: a `?` placeholder becomes [`Operand::Value`]
//! holding its position in the bound argument list.

use std::fmt;

/// A dotted attribute path such as `Address.City`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePath(Vec<String>);

impl AttributePath {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Splits a dotted path string into segments.
    pub fn parse(path: &str) -> Self {
        Self(path.split('.').map(str::to_string).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// A value producer inside an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Path(AttributePath),
    /// Index into the bound argument list.
    Value(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "<>"),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// Boolean functions usable in conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionName {
    AttributeExists,
    AttributeNotExists,
    BeginsWith,
    Contains,
}

impl FunctionName {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "attribute_exists" => Some(Self::AttributeExists),
            "attribute_not_exists" => Some(Self::AttributeNotExists),
            "begins_with" => Some(Self::BeginsWith),
            "contains" => Some(Self::Contains),
            _ => None,
        }
    }

    /// Number of arguments the function takes.
    pub fn arity(&self) -> usize {
        match self {
            Self::AttributeExists | Self::AttributeNotExists => 1,
            Self::BeginsWith | Self::Contains => 2,
        }
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttributeExists => write!(f, "attribute_exists"),
            Self::AttributeNotExists => write!(f, "attribute_not_exists"),
            Self::BeginsWith => write!(f, "begins_with"),
            Self::Contains => write!(f, "contains"),
        }
    }
}

/// Condition / filter expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionExpr {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    Between {
        value: Operand,
        low: Operand,
        high: Operand,
    },
    In {
        value: Operand,
        list: Vec<Operand>,
    },
    Logical {
        op: LogicalOp,
        left: Box<ConditionExpr>,
        right: Box<ConditionExpr>,
    },
    Not(Box<ConditionExpr>),
    Function {
        name: FunctionName,
        args: Vec<Operand>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Subtract => write!(f, "-"),
        }
    }
}

/// Right-hand side of a `SET path = ...` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueExpr {
    Operand(Operand),
    IfNotExists {
        path: AttributePath,
        default: Box<ValueExpr>,
    },
    ListAppend(Box<ValueExpr>, Box<ValueExpr>),
    Arithmetic {
        op: ArithmeticOp,
        left: Box<ValueExpr>,
        right: Box<ValueExpr>,
    },
}
