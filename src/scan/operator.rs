use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Operator a filter condition applies, as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonOperator {
    Null,
    NotNull,
    Eq,
    Ne,
    Lt,
    Le,
    Ge,
    Gt,
    Contains,
    NotContains,
    BeginsWith,
    In,
    Between,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Null => "NULL",
            ComparisonOperator::NotNull => "NOT_NULL",
            ComparisonOperator::Eq => "EQ",
            ComparisonOperator::Ne => "NE",
            ComparisonOperator::Lt => "LT",
            ComparisonOperator::Le => "LE",
            ComparisonOperator::Ge => "GE",
            ComparisonOperator::Gt => "GT",
            ComparisonOperator::Contains => "CONTAINS",
            ComparisonOperator::NotContains => "NOT_CONTAINS",
            ComparisonOperator::BeginsWith => "BEGINS_WITH",
            ComparisonOperator::In => "IN",
            ComparisonOperator::Between => "BETWEEN",
        }
    }

    /// Number of operands the operator takes. `None` for a variable count
    /// of at least one.
    pub fn arity(&self) -> Option<usize> {
        match self {
            ComparisonOperator::Null | ComparisonOperator::NotNull => Some(0),
            ComparisonOperator::In => None,
            ComparisonOperator::Between => Some(2),
            _ => Some(1),
        }
    }
}

impl Display for ComparisonOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison methods of the scan builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Null,
    Eq,
    Lt,
    Le,
    Ge,
    Gt,
    Contains,
    BeginsWith,
    In,
    Between,
}

impl Comparison {
    /// Operator the comparison translates to. `None` when the comparison has
    /// no negated form.
    ///
    /// The ordering negations mirror the store's legacy filter semantics:
    /// `lt` and `ge` negate each other, as do `le` and `gt`.
    pub fn operator(self, negated: bool) -> Option<ComparisonOperator> {
        use ComparisonOperator as Op;

        match (self, negated) {
            (Comparison::Null, false) => Some(Op::Null),
            (Comparison::Null, true) => Some(Op::NotNull),
            (Comparison::Eq, false) => Some(Op::Eq),
            (Comparison::Eq, true) => Some(Op::Ne),
            (Comparison::Lt, false) => Some(Op::Lt),
            (Comparison::Lt, true) => Some(Op::Ge),
            (Comparison::Le, false) => Some(Op::Le),
            (Comparison::Le, true) => Some(Op::Gt),
            (Comparison::Ge, false) => Some(Op::Ge),
            (Comparison::Ge, true) => Some(Op::Lt),
            (Comparison::Gt, false) => Some(Op::Gt),
            (Comparison::Gt, true) => Some(Op::Le),
            (Comparison::Contains, false) => Some(Op::Contains),
            (Comparison::Contains, true) => Some(Op::NotContains),
            (Comparison::BeginsWith, false) => Some(Op::BeginsWith),
            (Comparison::In, false) => Some(Op::In),
            (Comparison::Between, false) => Some(Op::Between),
            (Comparison::BeginsWith | Comparison::In | Comparison::Between, true) => None,
        }
    }

    /// Builder method name, for error messages.
    pub fn method(self) -> &'static str {
        match self {
            Comparison::Null => "null()",
            Comparison::Eq => "eq()",
            Comparison::Lt => "lt()",
            Comparison::Le => "le()",
            Comparison::Ge => "ge()",
            Comparison::Gt => "gt()",
            Comparison::Contains => "contains()",
            Comparison::BeginsWith => "begins_with()",
            Comparison::In => "is_in()",
            Comparison::Between => "between()",
        }
    }
}
