use crate::value::Value;

/// A compiled expression: `name`, `base|filter` or `base.step.step`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    /// A direct lookup of a name in the render scope.
    Variable { name: String },
    /// `filter(base)`, where `filter` is looked up like a variable.
    Pipe { base: Box<Expr>, filter: String },
    /// Attribute/key resolution of each step, left to right.
    Dots { base: Box<Expr>, steps: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

impl CompareOp {
    pub(crate) fn parse(word: &str) -> Option<Self> {
        match word {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "in" => Some(Self::In),
            _ => None,
        }
    }

    pub(crate) const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Expr(Expr),
    Literal(Value),
}

/// The condition of an `if`/`elif` branch.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Condition {
    Operand(Operand),
    Compare {
        op: CompareOp,
        left: Operand,
        right: Operand,
    },
    Not {
        condition: Box<Condition>,
    },
    And {
        left: Box<Condition>,
        right: Box<Condition>,
    },
    Or {
        left: Box<Condition>,
        right: Box<Condition>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LoopTarget {
    Single(String),
    Pair(String, String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Branch {
    pub condition: Condition,
    pub body: Vec<Node>,
}

/// One instruction of a compiled template.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    /// Literal text, adjacent runs already merged.
    Text(String),
    /// `{{ expr }}`
    Emit(Expr),
    /// `if` followed by any `elif` branches, in source order.
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Node>>,
    },
    For {
        target: LoopTarget,
        source: Expr,
        body: Vec<Node>,
    },
}
