//! Predicate and value expression trees.

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Logical
    And,
    Or,

    // String
    Concat,
    Like,
}

impl BinaryOp {
    /// SQL spelling of the operator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Concat => "||",
            Self::Like => "LIKE",
        }
    }

    /// Binding strength; higher binds tighter.
    #[must_use]
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq => 4,
            Self::Like => 5,
            Self::Add | Self::Sub | Self::Concat => 8,
            Self::Mul | Self::Div | Self::Mod => 9,
        }
    }

    /// True for the six comparison operators.
    #[must_use]
    pub const fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }

    /// The comparison that holds exactly when this one is false, for
    /// non-null operands.
    #[must_use]
    pub const fn negated(&self) -> Option<Self> {
        match self {
            Self::Eq => Some(Self::NotEq),
            Self::NotEq => Some(Self::Eq),
            Self::Lt => Some(Self::GtEq),
            Self::LtEq => Some(Self::Gt),
            Self::Gt => Some(Self::LtEq),
            Self::GtEq => Some(Self::Lt),
            _ => None,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
    /// Logical NOT
    Not,
}

impl UnaryOp {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "NOT",
        }
    }
}

/// An SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),

    /// A column reference.
    Column {
        /// Qualifying table, if any.
        table: Option<String>,
        name: String,
        /// Known nullability; `None` asks the nullability provider.
        nullable: Option<bool>,
    },

    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    /// `expr IS [NOT] NULL`.
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },

    /// IN expression over a value list.
    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },

    /// Searched CASE expression.
    Case {
        /// Condition and result pairs, in order.
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },

    /// A named parameter placeholder (`:name`).
    Parameter {
        name: String,
        /// Whether the bound value may be NULL.
        nullable: bool,
    },
}

impl Expr {
    /// Creates a column reference whose nullability comes from the model.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column {
            table: None,
            name: name.into(),
            nullable: None,
        }
    }

    /// Creates a column reference qualified by `table`.
    #[must_use]
    pub fn qualified_column(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Column {
            table: Some(table.into()),
            name: name.into(),
            nullable: None,
        }
    }

    /// Creates a column reference with known nullability.
    #[must_use]
    pub fn typed_column(name: impl Into<String>, nullable: bool) -> Self {
        Self::Column {
            table: None,
            name: name.into(),
            nullable: Some(nullable),
        }
    }

    #[must_use]
    pub const fn integer(value: i64) -> Self {
        Self::Literal(Literal::Integer(value))
    }

    #[must_use]
    pub const fn float(value: f64) -> Self {
        Self::Literal(Literal::Float(value))
    }

    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(Literal::String(value.into()))
    }

    #[must_use]
    pub const fn boolean(value: bool) -> Self {
        Self::Literal(Literal::Boolean(value))
    }

    #[must_use]
    pub const fn null() -> Self {
        Self::Literal(Literal::Null)
    }

    /// Creates a parameter that never binds NULL.
    #[must_use]
    pub fn parameter(name: impl Into<String>) -> Self {
        Self::Parameter {
            name: name.into(),
            nullable: false,
        }
    }

    /// Creates a parameter that may bind NULL.
    #[must_use]
    pub fn nullable_parameter(name: impl Into<String>) -> Self {
        Self::Parameter {
            name: name.into(),
            nullable: true,
        }
    }

    #[must_use]
    pub fn binary(self, op: BinaryOp, right: Self) -> Self {
        Self::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn eq(self, right: Self) -> Self {
        self.binary(BinaryOp::Eq, right)
    }

    #[must_use]
    pub fn not_eq(self, right: Self) -> Self {
        self.binary(BinaryOp::NotEq, right)
    }

    #[must_use]
    pub fn lt(self, right: Self) -> Self {
        self.binary(BinaryOp::Lt, right)
    }

    #[must_use]
    pub fn lt_eq(self, right: Self) -> Self {
        self.binary(BinaryOp::LtEq, right)
    }

    #[must_use]
    pub fn gt(self, right: Self) -> Self {
        self.binary(BinaryOp::Gt, right)
    }

    #[must_use]
    pub fn gt_eq(self, right: Self) -> Self {
        self.binary(BinaryOp::GtEq, right)
    }

    #[must_use]
    pub fn and(self, right: Self) -> Self {
        self.binary(BinaryOp::And, right)
    }

    #[must_use]
    pub fn or(self, right: Self) -> Self {
        self.binary(BinaryOp::Or, right)
    }

    #[must_use]
    pub fn like(self, pattern: Self) -> Self {
        self.binary(BinaryOp::Like, pattern)
    }

    /// Creates a NOT expression.
    #[must_use]
    pub fn not(self) -> Self {
        Self::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }

    #[must_use]
    pub fn is_null(self) -> Self {
        Self::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    #[must_use]
    pub fn is_not_null(self) -> Self {
        Self::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    #[must_use]
    pub fn in_list(self, list: Vec<Self>) -> Self {
        Self::In {
            expr: Box::new(self),
            list,
            negated: false,
        }
    }

    #[must_use]
    pub fn not_in_list(self, list: Vec<Self>) -> Self {
        Self::In {
            expr: Box::new(self),
            list,
            negated: true,
        }
    }

    /// Creates a searched CASE expression.
    #[must_use]
    pub fn case(when_clauses: Vec<(Self, Self)>, else_clause: Option<Self>) -> Self {
        Self::Case {
            when_clauses,
            else_clause: else_clause.map(Box::new),
        }
    }

    /// Joins `terms` with AND, or returns `None` when there are none.
    #[must_use]
    pub fn all(terms: impl IntoIterator<Item = Self>) -> Option<Self> {
        terms.into_iter().reduce(Self::and)
    }

    /// Joins `terms` with OR, or returns `None` when there are none.
    #[must_use]
    pub fn any(terms: impl IntoIterator<Item = Self>) -> Option<Self> {
        terms.into_iter().reduce(Self::or)
    }

    #[must_use]
    pub const fn is_null_literal(&self) -> bool {
        matches!(self, Self::Literal(Literal::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_operators_bind_loosest() {
        assert!(BinaryOp::Or.precedence() < BinaryOp::And.precedence());
        assert!(BinaryOp::And.precedence() < BinaryOp::NotEq.precedence());
        assert!(BinaryOp::Concat.precedence() > BinaryOp::Like.precedence());
    }

    #[test]
    fn test_comparison_negation() {
        assert_eq!(BinaryOp::Lt.negated(), Some(BinaryOp::GtEq));
        assert_eq!(BinaryOp::NotEq.negated(), Some(BinaryOp::Eq));
        assert_eq!(BinaryOp::And.negated(), None);
    }

    #[test]
    fn test_null_tests_wrap_their_operand() {
        match Expr::typed_column("Url", true).is_not_null() {
            Expr::IsNull { expr, negated: true } => {
                assert_eq!(*expr, Expr::typed_column("Url", true));
            }
            other => panic!("Expected IS NOT NULL, got {other:?}"),
        }
        assert!(Expr::null().is_null_literal());
        assert!(!Expr::nullable_parameter("p").is_null_literal());
    }

    #[test]
    fn test_all_and_any_fold_left() {
        let expr = Expr::any([Expr::column("A"), Expr::column("B"), Expr::column("C")]);
        match expr {
            Some(Expr::Binary { left, op: BinaryOp::Or, right }) => {
                assert!(matches!(*left, Expr::Binary { op: BinaryOp::Or, .. }));
                assert_eq!(*right, Expr::column("C"));
            }
            other => panic!("Expected OR chain, got {other:?}"),
        }
        assert_eq!(Expr::all(Vec::<Expr>::new()), None);
    }
}
