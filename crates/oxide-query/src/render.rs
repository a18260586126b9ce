//! SQL rendering of expressions.

use crate::error::{QueryError, Result};
use crate::expr::{BinaryOp, Expr, Literal, UnaryOp};

/// Precedence of atoms and self-delimiting expressions.
const ATOM: u8 = 11;
const NOT: u8 = 3;
const NULL_TEST: u8 = 4;
const NEGATION: u8 = 10;

/// Renders expressions as SQL text.
#[derive(Debug, Clone, Copy)]
pub struct SqlRenderer {
    open_quote: char,
    close_quote: char,
}

impl Default for SqlRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlRenderer {
    /// A renderer delimiting identifiers with double quotes.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            open_quote: '"',
            close_quote: '"',
        }
    }

    /// A renderer with other identifier delimiters, e.g. `[` and `]`.
    #[must_use]
    pub const fn with_quotes(open: char, close: char) -> Self {
        Self {
            open_quote: open,
            close_quote: close,
        }
    }

    /// Delimits an identifier, doubling the closing delimiter inside it.
    #[must_use]
    pub fn quote_identifier(&self, name: &str) -> String {
        let close = self.close_quote.to_string();
        format!(
            "{}{}{}",
            self.open_quote,
            name.replace(self.close_quote, &close.repeat(2)),
            self.close_quote
        )
    }

    /// Renders `expr`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::EmptyInList`] or [`QueryError::EmptyCase`] for
    /// expressions SQL cannot express.
    pub fn render(&self, expr: &Expr) -> Result<String> {
        let mut sql = String::new();
        self.write(expr, &mut sql)?;
        Ok(sql)
    }

    fn write(&self, expr: &Expr, sql: &mut String) -> Result<()> {
        match expr {
            Expr::Literal(literal) => sql.push_str(&literal_sql(literal)),
            Expr::Column { table, name, .. } => {
                if let Some(table) = table {
                    sql.push_str(&self.quote_identifier(table));
                    sql.push('.');
                }
                sql.push_str(&self.quote_identifier(name));
            }
            Expr::Parameter { name, .. } => {
                sql.push(':');
                sql.push_str(name);
            }
            Expr::Binary { left, op, right } => {
                self.write_operand(left, needs_parens(left, *op, false), sql)?;
                sql.push(' ');
                sql.push_str(op.as_str());
                sql.push(' ');
                self.write_operand(right, needs_parens(right, *op, true), sql)?;
            }
            Expr::Unary { op, operand } => {
                sql.push_str(op.as_str());
                if *op == UnaryOp::Not {
                    sql.push(' ');
                }
                self.write_operand(operand, precedence(operand) < ATOM, sql)?;
            }
            Expr::IsNull { expr, negated } => {
                self.write_operand(expr, precedence(expr) <= NULL_TEST, sql)?;
                sql.push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Expr::In {
                expr,
                list,
                negated,
            } => {
                if list.is_empty() {
                    return Err(QueryError::EmptyInList(self.render(expr)?));
                }
                self.write_operand(expr, precedence(expr) <= NULL_TEST, sql)?;
                sql.push_str(if *negated { " NOT IN (" } else { " IN (" });
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    self.write(item, sql)?;
                }
                sql.push(')');
            }
            Expr::Case {
                when_clauses,
                else_clause,
            } => {
                if when_clauses.is_empty() {
                    return Err(QueryError::EmptyCase);
                }
                sql.push_str("CASE");
                for (condition, result) in when_clauses {
                    sql.push_str(" WHEN ");
                    self.write(condition, sql)?;
                    sql.push_str(" THEN ");
                    self.write(result, sql)?;
                }
                if let Some(else_clause) = else_clause {
                    sql.push_str(" ELSE ");
                    self.write(else_clause, sql)?;
                }
                sql.push_str(" END");
            }
        }
        Ok(())
    }

    fn write_operand(&self, expr: &Expr, parens: bool, sql: &mut String) -> Result<()> {
        if parens {
            sql.push('(');
        }
        self.write(expr, sql)?;
        if parens {
            sql.push(')');
        }
        Ok(())
    }
}

fn literal_sql(literal: &Literal) -> String {
    match literal {
        Literal::Integer(i) => i.to_string(),
        Literal::Float(f) => {
            let text = f.to_string();
            if text.contains(['.', 'e', 'E']) || !f.is_finite() {
                text
            } else {
                format!("{text}.0")
            }
        }
        Literal::String(s) => format!("'{}'", s.replace('\'', "''")),
        Literal::Boolean(true) => "TRUE".to_string(),
        Literal::Boolean(false) => "FALSE".to_string(),
        Literal::Null => "NULL".to_string(),
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary { op, .. } => op.precedence(),
        Expr::Unary {
            op: UnaryOp::Not, ..
        } => NOT,
        Expr::Unary { .. } => NEGATION,
        Expr::IsNull { .. } | Expr::In { .. } => NULL_TEST,
        Expr::Literal(_) | Expr::Column { .. } | Expr::Parameter { .. } | Expr::Case { .. } => ATOM,
    }
}

/// Binds looser than the parent, sits on the right of an operator of the
/// same precedence, or is an AND under an OR.
fn needs_parens(child: &Expr, parent: BinaryOp, right: bool) -> bool {
    let child_precedence = precedence(child);
    let parent_precedence = parent.precedence();
    child_precedence < parent_precedence
        || (right && child_precedence == parent_precedence)
        || (parent == BinaryOp::Or
            && matches!(
                child,
                Expr::Binary {
                    op: BinaryOp::And,
                    ..
                }
            ))
        || (parent.is_comparison() && child_precedence == NULL_TEST)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(expr: &Expr) -> String {
        SqlRenderer::new().render(expr).unwrap()
    }

    #[test]
    fn test_precedence_adds_parentheses() {
        let expr = Expr::column("A")
            .eq(Expr::integer(1))
            .or(Expr::column("B").is_null().and(Expr::column("C").is_null()));
        assert_eq!(render(&expr), "\"A\" = 1 OR (\"B\" IS NULL AND \"C\" IS NULL)");

        let expr = Expr::column("A").or(Expr::column("B")).and(Expr::column("C"));
        assert_eq!(render(&expr), "(\"A\" OR \"B\") AND \"C\"");

        let expr = Expr::column("Price").binary(
            BinaryOp::Mul,
            Expr::column("Quantity").binary(BinaryOp::Add, Expr::integer(1)),
        );
        assert_eq!(render(&expr), "\"Price\" * (\"Quantity\" + 1)");
    }

    #[test]
    fn test_literals_and_parameters() {
        let expr = Expr::column("Name")
            .eq(Expr::string("O'Neil"))
            .and(Expr::column("Score").gt(Expr::float(2.0)))
            .and(Expr::column("Owner").eq(Expr::parameter("owner")));
        assert_eq!(
            render(&expr),
            "\"Name\" = 'O''Neil' AND \"Score\" > 2.0 AND \"Owner\" = :owner"
        );
    }

    #[test]
    fn test_not_in_and_case() {
        let expr = Expr::qualified_column("w", "Id")
            .not_in_list(vec![Expr::integer(1), Expr::integer(2)])
            .not();
        assert_eq!(render(&expr), "NOT (\"w\".\"Id\" NOT IN (1, 2))");

        let expr = Expr::case(
            vec![(Expr::column("Active").eq(Expr::boolean(true)), Expr::string("on"))],
            Some(Expr::string("off")),
        );
        assert_eq!(
            render(&expr),
            "CASE WHEN \"Active\" = TRUE THEN 'on' ELSE 'off' END"
        );
    }

    #[test]
    fn test_custom_quotes_escape_closing_delimiter() {
        let renderer = SqlRenderer::with_quotes('[', ']');
        assert_eq!(renderer.quote_identifier("a]b"), "[a]]b]");
    }

    #[test]
    fn test_empty_in_list_is_an_error() {
        let expr = Expr::column("Id").in_list(Vec::new());
        match SqlRenderer::new().render(&expr) {
            Err(QueryError::EmptyInList(operand)) => assert_eq!(operand, "\"Id\""),
            other => panic!("Expected EmptyInList, got {other:?}"),
        }
    }
}
