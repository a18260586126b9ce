//! Null-semantics rewriting.
//!
//! SQL compares with three-valued logic: `a = b` is unknown when either side
//! is NULL, and `WHERE` drops unknown rows. Application code usually expects
//! two-valued logic instead, where NULL equals NULL and a comparison is
//! always true or false. [`NullSemanticsRewriter`] turns a predicate written
//! with the latter in mind into SQL that computes the same result.
//!
//! Rewriting distinguishes two contexts. In a *predicate* context (a
//! `WHERE` clause, the operands of AND/OR under it, a `CASE WHEN` condition)
//! unknown and false are interchangeable, which allows shorter expansions.
//! In a *value* context the result must never be unknown.

use tracing::debug;

use crate::error::{QueryError, Result};
use crate::expr::{BinaryOp, Expr, Literal, UnaryOp};
use crate::nullability::NullabilityProvider;

/// How NULL takes part in comparisons of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullSemantics {
    /// The database's own three-valued logic; predicates are left as written.
    Relational,
    /// NULL equals NULL and comparisons are never unknown.
    #[default]
    TwoValued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Predicate,
    Value,
}

/// Rewrites expressions for one [`NullSemantics`].
pub struct NullSemanticsRewriter<'a> {
    semantics: NullSemantics,
    provider: &'a dyn NullabilityProvider,
    default_table: Option<String>,
    strict: bool,
}

impl<'a> NullSemanticsRewriter<'a> {
    #[must_use]
    pub fn new(semantics: NullSemantics, provider: &'a dyn NullabilityProvider) -> Self {
        Self {
            semantics,
            provider,
            default_table: None,
            strict: false,
        }
    }

    /// Resolves unqualified columns against `table`.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.default_table = Some(table.into());
        self
    }

    /// Fails on columns the provider does not know instead of treating them
    /// as nullable.
    #[must_use]
    pub const fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub const fn semantics(&self) -> NullSemantics {
        self.semantics
    }

    /// Rewrites a filter predicate.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownColumn`] in strict mode and
    /// [`QueryError::EmptyCase`] for a `CASE` without clauses.
    pub fn rewrite_predicate(&self, expr: &Expr) -> Result<Expr> {
        debug!(semantics = ?self.semantics, "Rewriting predicate");
        match self.semantics {
            NullSemantics::Relational => Ok(expr.clone()),
            NullSemantics::TwoValued => Ok(self.visit(expr, Context::Predicate)?.0),
        }
    }

    /// Rewrites an expression whose value is used, e.g. a projection. Under
    /// two-valued semantics boolean results are never unknown.
    ///
    /// # Errors
    ///
    /// See [`rewrite_predicate`](Self::rewrite_predicate).
    pub fn rewrite_value(&self, expr: &Expr) -> Result<Expr> {
        match self.semantics {
            NullSemantics::Relational => Ok(expr.clone()),
            NullSemantics::TwoValued => Ok(self.visit(expr, Context::Value)?.0),
        }
    }

    /// Whether `expr` may evaluate to NULL as written.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownColumn`] in strict mode.
    pub fn is_nullable(&self, expr: &Expr) -> Result<bool> {
        Ok(match expr {
            Expr::Literal(literal) => *literal == Literal::Null,
            Expr::Column {
                table,
                name,
                nullable,
            } => self.column_nullable(table.as_deref(), name, *nullable)?,
            Expr::Parameter { nullable, .. } => *nullable,
            Expr::Binary { left, right, .. } => self.is_nullable(left)? || self.is_nullable(right)?,
            Expr::Unary { operand, .. } => self.is_nullable(operand)?,
            Expr::IsNull { .. } => false,
            Expr::In { expr, list, .. } => {
                self.is_nullable(expr)? || list.iter().any(Expr::is_null_literal)
            }
            Expr::Case {
                when_clauses,
                else_clause,
            } => {
                let Some(else_clause) = else_clause else {
                    return Ok(true);
                };
                for (_, result) in when_clauses {
                    if self.is_nullable(result)? {
                        return Ok(true);
                    }
                }
                self.is_nullable(else_clause)?
            }
        })
    }

    fn column_nullable(&self, table: Option<&str>, name: &str, known: Option<bool>) -> Result<bool> {
        if let Some(nullable) = known {
            return Ok(nullable);
        }
        let table = table.or(self.default_table.as_deref());
        match self.provider.is_nullable(table, name) {
            Some(nullable) => Ok(nullable),
            None if self.strict => Err(QueryError::UnknownColumn {
                table: table.map(str::to_string),
                column: name.to_string(),
            }),
            None => {
                debug!(column = name, "Column without nullability facts treated as nullable");
                Ok(true)
            }
        }
    }

    /// Returns the rewritten expression and whether it may still be NULL.
    fn visit(&self, expr: &Expr, context: Context) -> Result<(Expr, bool)> {
        match expr {
            Expr::Literal(_) | Expr::Column { .. } | Expr::Parameter { .. } => {
                Ok((expr.clone(), self.is_nullable(expr)?))
            }
            Expr::Binary { left, op, right } => match op {
                BinaryOp::And | BinaryOp::Or => {
                    let (left, left_nullable) = self.visit(left, context)?;
                    let (right, right_nullable) = self.visit(right, context)?;
                    Ok((left.binary(*op, right), left_nullable || right_nullable))
                }
                op if op.is_comparison() => self.comparison(left, *op, right, context),
                op => {
                    let (left, left_nullable) = self.visit(left, Context::Value)?;
                    let (right, right_nullable) = self.visit(right, Context::Value)?;
                    Ok((left.binary(*op, right), left_nullable || right_nullable))
                }
            },
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.negate(operand, context),
            Expr::Unary { op, operand } => {
                let (operand, nullable) = self.visit(operand, Context::Value)?;
                Ok((
                    Expr::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    },
                    nullable,
                ))
            }
            Expr::IsNull { expr, negated } => {
                let (inner, nullable) = self.visit(expr, Context::Value)?;
                if !nullable {
                    return Ok((Expr::boolean(*negated), false));
                }
                Ok((
                    Expr::IsNull {
                        expr: Box::new(inner),
                        negated: *negated,
                    },
                    false,
                ))
            }
            Expr::In {
                expr,
                list,
                negated,
            } => self.in_list(expr, list, *negated, context),
            Expr::Case {
                when_clauses,
                else_clause,
            } => {
                if when_clauses.is_empty() {
                    return Err(QueryError::EmptyCase);
                }
                let mut nullable = else_clause.is_none();
                let mut clauses = Vec::with_capacity(when_clauses.len());
                for (condition, result) in when_clauses {
                    let (condition, _) = self.visit(condition, Context::Predicate)?;
                    let (result, result_nullable) = self.visit(result, Context::Value)?;
                    nullable |= result_nullable;
                    clauses.push((condition, result));
                }
                let else_clause = match else_clause {
                    Some(else_clause) => {
                        let (else_clause, else_nullable) = self.visit(else_clause, Context::Value)?;
                        nullable |= else_nullable;
                        Some(else_clause)
                    }
                    None => None,
                };
                Ok((Expr::case(clauses, else_clause), nullable))
            }
        }
    }

    fn comparison(&self, left: &Expr, op: BinaryOp, right: &Expr, context: Context) -> Result<(Expr, bool)> {
        match (left.is_null_literal(), right.is_null_literal()) {
            (true, true) => return Ok((Expr::boolean(op == BinaryOp::Eq), false)),
            (true, false) => return self.compare_with_null(right, op),
            (false, true) => return self.compare_with_null(left, op),
            (false, false) => {}
        }

        let (left, left_nullable) = self.visit(left, Context::Value)?;
        let (right, right_nullable) = self.visit(right, Context::Value)?;
        let compared = left.clone().binary(op, right.clone());
        if !left_nullable && !right_nullable {
            return Ok((compared, false));
        }

        let nullable_sides: Vec<Expr> = [(&left, left_nullable), (&right, right_nullable)]
            .into_iter()
            .filter_map(|(side, nullable)| nullable.then(|| side.clone()))
            .collect();
        let not_null = || nullable_sides.iter().cloned().map(Expr::is_not_null);
        let is_null = || nullable_sides.iter().cloned().map(Expr::is_null);

        let rewritten = match (op, context) {
            (BinaryOp::Eq, _) if left_nullable && right_nullable => {
                let both_null = left.clone().is_null().and(right.clone().is_null());
                let equal = match context {
                    Context::Predicate => compared,
                    Context::Value => chain(BinaryOp::And, compared, not_null()),
                };
                equal.or(both_null)
            }
            (BinaryOp::NotEq, _) if left_nullable && right_nullable => {
                let differs = chain(BinaryOp::Or, compared, is_null());
                differs.and(left.is_not_null().or(right.is_not_null()))
            }
            (BinaryOp::NotEq, _) => chain(BinaryOp::Or, compared, is_null()),
            (_, Context::Predicate) => compared,
            (_, Context::Value) => chain(BinaryOp::And, compared, not_null()),
        };
        Ok((rewritten, false))
    }

    /// `x = NULL` and `x <> NULL` become null tests; ordering against NULL
    /// is always false.
    fn compare_with_null(&self, operand: &Expr, op: BinaryOp) -> Result<(Expr, bool)> {
        let (operand, nullable) = self.visit(operand, Context::Value)?;
        let rewritten = match op {
            BinaryOp::Eq if nullable => operand.is_null(),
            BinaryOp::NotEq if nullable => operand.is_not_null(),
            BinaryOp::NotEq => Expr::boolean(true),
            _ => Expr::boolean(false),
        };
        Ok((rewritten, false))
    }

    /// Pushes NOT through `operand`.
    fn negate(&self, operand: &Expr, context: Context) -> Result<(Expr, bool)> {
        match operand {
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.visit(operand, context),
            Expr::Literal(Literal::Boolean(value)) => Ok((Expr::boolean(!value), false)),
            Expr::Binary {
                left,
                op: op @ (BinaryOp::And | BinaryOp::Or),
                right,
            } => {
                let (left, left_nullable) = self.negate(left, context)?;
                let (right, right_nullable) = self.negate(right, context)?;
                let flipped = if *op == BinaryOp::And {
                    BinaryOp::Or
                } else {
                    BinaryOp::And
                };
                Ok((left.binary(flipped, right), left_nullable || right_nullable))
            }
            Expr::Binary { left, op, right } if op.is_comparison() => {
                let Some(negated) = op.negated() else {
                    return self.negate_value(operand);
                };
                match op {
                    BinaryOp::Eq | BinaryOp::NotEq => self.comparison(left, negated, right, context),
                    _ => self.negate_ordering(left, negated, right),
                }
            }
            Expr::IsNull { expr, negated } => self.visit(
                &Expr::IsNull {
                    expr: expr.clone(),
                    negated: !negated,
                },
                context,
            ),
            Expr::In {
                expr,
                list,
                negated,
            } => self.in_list(expr, list, !negated, context),
            _ => self.negate_value(operand),
        }
    }

    /// The negation of an ordering comparison holds when either side is
    /// NULL, since the comparison itself was false then.
    fn negate_ordering(&self, left: &Expr, negated: BinaryOp, right: &Expr) -> Result<(Expr, bool)> {
        if left.is_null_literal() || right.is_null_literal() {
            return Ok((Expr::boolean(true), false));
        }
        let (left, left_nullable) = self.visit(left, Context::Value)?;
        let (right, right_nullable) = self.visit(right, Context::Value)?;
        let mut tests = Vec::new();
        if left_nullable {
            tests.push(left.clone().is_null());
        }
        if right_nullable {
            tests.push(right.clone().is_null());
        }
        Ok((chain(BinaryOp::Or, left.binary(negated, right), tests), false))
    }

    fn negate_value(&self, operand: &Expr) -> Result<(Expr, bool)> {
        let (operand, nullable) = self.visit(operand, Context::Value)?;
        Ok((operand.not(), nullable))
    }

    fn in_list(&self, expr: &Expr, list: &[Expr], negated: bool, context: Context) -> Result<(Expr, bool)> {
        let (operand, nullable) = self.visit(expr, Context::Value)?;
        let has_null = list.iter().any(Expr::is_null_literal);
        let mut values = Vec::with_capacity(list.len());
        for item in list.iter().filter(|item| !item.is_null_literal()) {
            values.push(self.visit(item, Context::Value)?.0);
        }

        let rewritten = if values.is_empty() {
            match (negated, has_null && nullable) {
                (false, true) => operand.is_null(),
                (true, true) => operand.is_not_null(),
                (false, false) => Expr::boolean(false),
                (true, false) => Expr::boolean(true),
            }
        } else if negated {
            let not_in = operand.clone().not_in_list(values);
            match (nullable, has_null) {
                (false, _) => not_in,
                (true, true) => not_in.and(operand.is_not_null()),
                (true, false) => not_in.or(operand.is_null()),
            }
        } else {
            let within = operand.clone().in_list(values);
            match (nullable, has_null, context) {
                (true, true, _) => within.or(operand.is_null()),
                (true, false, Context::Value) => within.and(operand.is_not_null()),
                _ => within,
            }
        };
        Ok((rewritten, false))
    }
}

/// Left-folds `first` and `rest` with `op`.
fn chain(op: BinaryOp, first: Expr, rest: impl IntoIterator<Item = Expr>) -> Expr {
    rest.into_iter().fold(first, |acc, term| acc.binary(op, term))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nullability::ColumnNullability;

    fn facts() -> ColumnNullability {
        ColumnNullability::new()
            .column("Widgets", "Id", false)
            .column("Widgets", "Sku", false)
            .column("Widgets", "Name", true)
            .column("Widgets", "Label", true)
    }

    fn two_valued(facts: &ColumnNullability) -> NullSemanticsRewriter<'_> {
        NullSemanticsRewriter::new(NullSemantics::TwoValued, facts).with_table("Widgets")
    }

    #[test]
    fn test_non_nullable_equality_is_unchanged() {
        let facts = facts();
        let predicate = Expr::column("Id").eq(Expr::column("Sku"));
        assert_eq!(two_valued(&facts).rewrite_predicate(&predicate).unwrap(), predicate);
    }

    #[test]
    fn test_equality_of_nullable_columns_matches_nulls() {
        let facts = facts();
        let predicate = Expr::column("Name").eq(Expr::column("Label"));
        let expected = Expr::column("Name")
            .eq(Expr::column("Label"))
            .or(Expr::column("Name").is_null().and(Expr::column("Label").is_null()));
        assert_eq!(two_valued(&facts).rewrite_predicate(&predicate).unwrap(), expected);
    }

    #[test]
    fn test_null_literal_becomes_null_test() {
        let facts = facts();
        let rewriter = two_valued(&facts);
        assert_eq!(
            rewriter
                .rewrite_predicate(&Expr::column("Name").eq(Expr::null()))
                .unwrap(),
            Expr::column("Name").is_null()
        );
        assert_eq!(
            rewriter
                .rewrite_predicate(&Expr::null().not_eq(Expr::column("Name")))
                .unwrap(),
            Expr::column("Name").is_not_null()
        );
        assert_eq!(
            rewriter
                .rewrite_predicate(&Expr::column("Id").eq(Expr::null()))
                .unwrap(),
            Expr::boolean(false)
        );
    }

    #[test]
    fn test_relational_semantics_keep_the_predicate() {
        let facts = facts();
        let rewriter = NullSemanticsRewriter::new(NullSemantics::Relational, &facts);
        let predicate = Expr::column("Name").eq(Expr::null());
        assert_eq!(rewriter.rewrite_predicate(&predicate).unwrap(), predicate);
    }

    #[test]
    fn test_strict_mode_rejects_unknown_columns() {
        let facts = facts();
        let rewriter = two_valued(&facts).strict();
        match rewriter.rewrite_predicate(&Expr::column("Color").eq(Expr::string("red"))) {
            Err(QueryError::UnknownColumn { table, column }) => {
                assert_eq!(table.as_deref(), Some("Widgets"));
                assert_eq!(column, "Color");
            }
            other => panic!("Expected UnknownColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_case_without_clauses_is_rejected() {
        let facts = facts();
        let case = Expr::case(Vec::new(), Some(Expr::integer(1)));
        assert!(matches!(
            two_valued(&facts).rewrite_value(&case),
            Err(QueryError::EmptyCase)
        ));
    }
}
