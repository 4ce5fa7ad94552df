//! A small SQL AST covering what intermediate queries translate to.
//!
//! Every node renders itself into a [`SqlWriter`]. Expressions carry a
//! precedence so that operands are parenthesized only where needed.

use quarry_core::Constant;

use crate::sql_string::SqlWriter;

/// Alias of a table or derived table in a `FROM` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAlias(String);

impl TableAlias {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// A `SELECT` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// Output expressions with their column aliases.
    pub columns: Vec<(Expression, String)>,
    pub from: Option<From>,
    /// Conditions of the `WHERE` clause, combined with `AND`.
    pub where_: Vec<Expression>,
}

impl Select {
    pub fn to_sql(&self, sql: &mut SqlWriter) {
        sql.append_syntax("SELECT ");
        if self.columns.is_empty() {
            sql.append_syntax("1");
        }
        for (i, (expression, alias)) in self.columns.iter().enumerate() {
            if i > 0 {
                sql.append_syntax(", ");
            }
            expression.to_sql(sql);
            sql.append_syntax(" AS ");
            sql.append_identifier(alias);
        }
        if let Some(from) = &self.from {
            sql.append_clause_break();
            sql.append_syntax("FROM ");
            from.to_sql(sql);
        }
        if !self.where_.is_empty() {
            sql.append_clause_break();
            sql.append_syntax("WHERE ");
            append_conjunction(&self.where_, sql);
        }
    }
}

/// Items of a `FROM` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum From {
    Table { name: String, alias: TableAlias },
    Select { select: Box<Select>, alias: TableAlias },
    UnionAll { selects: Vec<Select>, alias: TableAlias },
    /// Opaque SQL used as a derived table.
    Native { sql: String, alias: TableAlias },
    CrossJoin(Vec<From>),
    LeftOuterJoin {
        left: Box<From>,
        right: Box<From>,
        on: Vec<Expression>,
    },
}

impl From {
    fn is_join(&self) -> bool {
        matches!(self, Self::CrossJoin(_) | Self::LeftOuterJoin { .. })
    }

    fn operand_to_sql(&self, sql: &mut SqlWriter) {
        if self.is_join() {
            sql.append_syntax("(");
            self.to_sql(sql);
            sql.append_syntax(")");
        } else {
            self.to_sql(sql);
        }
    }

    pub fn to_sql(&self, sql: &mut SqlWriter) {
        match self {
            Self::Table { name, alias } => {
                sql.append_identifier(name);
                append_alias(alias, sql);
            }
            Self::Select { select, alias } => {
                sql.append_syntax("(");
                select.to_sql(sql);
                sql.append_syntax(")");
                append_alias(alias, sql);
            }
            Self::UnionAll { selects, alias } => {
                sql.append_syntax("(");
                for (i, select) in selects.iter().enumerate() {
                    if i > 0 {
                        sql.append_clause_break();
                        sql.append_syntax("UNION ALL");
                        sql.append_clause_break();
                    }
                    select.to_sql(sql);
                }
                sql.append_syntax(")");
                append_alias(alias, sql);
            }
            Self::Native { sql: native, alias } => {
                sql.append_syntax("(");
                sql.append_syntax(native);
                sql.append_syntax(")");
                append_alias(alias, sql);
            }
            Self::CrossJoin(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        sql.append_clause_break();
                        sql.append_syntax("CROSS JOIN ");
                    }
                    item.operand_to_sql(sql);
                }
            }
            Self::LeftOuterJoin { left, right, on } => {
                // Joins associate to the left, the left operand needs no parentheses.
                left.to_sql(sql);
                sql.append_clause_break();
                sql.append_syntax("LEFT OUTER JOIN ");
                right.operand_to_sql(sql);
                sql.append_syntax(" ON ");
                append_conjunction(on, sql);
            }
        }
    }
}

fn append_alias(alias: &TableAlias, sql: &mut SqlWriter) {
    sql.append_syntax(" AS ");
    sql.append_identifier(alias.name());
}

fn append_conjunction(conditions: &[Expression], sql: &mut SqlWriter) {
    match conditions {
        [] => sql.append_syntax("TRUE"),
        [single] => single.to_sql(sql),
        many => append_separated(many, " AND ", Precedence::Not, sql),
    }
}

fn append_separated(items: &[Expression], separator: &str, min: Precedence, sql: &mut SqlWriter) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            sql.append_syntax(separator);
        }
        item.operand_to_sql(min, sql);
    }
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    String(String),
}

impl std::convert::From<&Constant> for Value {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Null => Self::Null,
            Constant::Boolean(b) => Self::Boolean(*b),
            Constant::Integer(i) => Self::Integer(*i),
            Constant::String(s) | Constant::Iri(s) => Self::String(s.clone()),
            // Only its non-nullness is observable.
            Constant::Provenance => Self::Boolean(true),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl BinaryOperator {
    fn symbol(&self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "<>",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
        }
    }
}

/// Binding strength of an expression, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Or,
    And,
    Not,
    Comparison,
    Concat,
    Atom,
}

/// Scalar and boolean expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Column {
        table: TableAlias,
        column: String,
    },
    Value(Value),
    BinaryOperation {
        left: Box<Expression>,
        operator: BinaryOperator,
        right: Box<Expression>,
    },
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Not(Box<Expression>),
    IsNull(Box<Expression>),
    IsNotNull(Box<Expression>),
    IsTrue(Box<Expression>),
    /// `CASE WHEN condition THEN value ELSE NULL END`
    CaseWhen {
        condition: Box<Expression>,
        value: Box<Expression>,
    },
    Coalesce(Vec<Expression>),
    /// Null-propagating `||` concatenation.
    Concat(Vec<Expression>),
}

impl Expression {
    pub fn column(table: &TableAlias, column: impl Into<String>) -> Self {
        Self::Column {
            table: table.clone(),
            column: column.into(),
        }
    }

    pub fn equals(left: Expression, right: Expression) -> Self {
        Self::BinaryOperation {
            left: Box::new(left),
            operator: BinaryOperator::Equals,
            right: Box::new(right),
        }
    }

    fn precedence(&self) -> Precedence {
        match self {
            Self::Or(_) => Precedence::Or,
            Self::And(_) => Precedence::And,
            Self::Not(_) => Precedence::Not,
            Self::BinaryOperation { .. } | Self::IsNull(_) | Self::IsNotNull(_) | Self::IsTrue(_) => {
                Precedence::Comparison
            }
            Self::Concat(_) => Precedence::Concat,
            Self::Column { .. } | Self::Value(_) | Self::CaseWhen { .. } | Self::Coalesce(_) => {
                Precedence::Atom
            }
        }
    }

    fn operand_to_sql(&self, min: Precedence, sql: &mut SqlWriter) {
        if self.precedence() < min {
            sql.append_syntax("(");
            self.to_sql(sql);
            sql.append_syntax(")");
        } else {
            self.to_sql(sql);
        }
    }

    pub fn to_sql(&self, sql: &mut SqlWriter) {
        match self {
            Self::Column { table, column } => {
                sql.append_identifier(table.name());
                sql.append_syntax(".");
                sql.append_identifier(column);
            }
            Self::Value(value) => match value {
                Value::Null => sql.append_syntax("NULL"),
                Value::Boolean(true) => sql.append_syntax("TRUE"),
                Value::Boolean(false) => sql.append_syntax("FALSE"),
                Value::Integer(i) => sql.append_syntax(&i.to_string()),
                Value::String(s) => sql.append_string_literal(s),
            },
            Self::BinaryOperation {
                left,
                operator,
                right,
            } => {
                left.operand_to_sql(Precedence::Concat, sql);
                sql.append_syntax(" ");
                sql.append_syntax(operator.symbol());
                sql.append_syntax(" ");
                right.operand_to_sql(Precedence::Concat, sql);
            }
            Self::And(items) if items.is_empty() => sql.append_syntax("TRUE"),
            Self::And(items) => append_separated(items, " AND ", Precedence::Not, sql),
            Self::Or(items) if items.is_empty() => sql.append_syntax("FALSE"),
            Self::Or(items) => append_separated(items, " OR ", Precedence::And, sql),
            Self::Not(inner) => {
                sql.append_syntax("NOT ");
                inner.operand_to_sql(Precedence::Concat, sql);
            }
            Self::IsNull(inner) => {
                inner.operand_to_sql(Precedence::Atom, sql);
                sql.append_syntax(" IS NULL");
            }
            Self::IsNotNull(inner) => {
                inner.operand_to_sql(Precedence::Atom, sql);
                sql.append_syntax(" IS NOT NULL");
            }
            Self::IsTrue(inner) => {
                inner.operand_to_sql(Precedence::Atom, sql);
                sql.append_syntax(" IS TRUE");
            }
            Self::CaseWhen { condition, value } => {
                sql.append_syntax("CASE WHEN ");
                condition.to_sql(sql);
                sql.append_syntax(" THEN ");
                value.to_sql(sql);
                sql.append_syntax(" ELSE NULL END");
            }
            Self::Coalesce(items) => {
                sql.append_syntax("COALESCE(");
                append_separated(items, ", ", Precedence::Or, sql);
                sql.append_syntax(")");
            }
            Self::Concat(items) => append_separated(items, " || ", Precedence::Concat, sql),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_config::SqlSettings;

    fn render(expression: &Expression) -> String {
        let mut sql = SqlWriter::new(SqlSettings::default());
        expression.to_sql(&mut sql);
        sql.into_string()
    }

    fn col(name: &str) -> Expression {
        Expression::column(&TableAlias::new("t0"), name)
    }

    #[test]
    fn test_operands_parenthesized_by_precedence() {
        let a_eq_1 = Expression::equals(col("a"), Expression::Value(Value::Integer(1)));
        let b_null = Expression::IsNull(Box::new(col("b")));
        let or = Expression::Or(vec![a_eq_1.clone(), b_null.clone()]);
        assert_eq!(
            render(&Expression::And(vec![or, b_null.clone()])),
            r#"("t0"."a" = 1 OR "t0"."b" IS NULL) AND "t0"."b" IS NULL"#
        );
        assert_eq!(
            render(&Expression::Not(Box::new(a_eq_1))),
            r#"NOT ("t0"."a" = 1)"#
        );
    }

    #[test]
    fn test_case_and_concat() {
        let case = Expression::CaseWhen {
            condition: Box::new(Expression::IsNotNull(Box::new(col("a")))),
            value: Box::new(Expression::Concat(vec![
                Expression::Value(Value::String("http://x/".into())),
                col("a"),
            ])),
        };
        assert_eq!(
            render(&case),
            r#"CASE WHEN "t0"."a" IS NOT NULL THEN 'http://x/' || "t0"."a" ELSE NULL END"#
        );
        let null_concat = Expression::IsNull(Box::new(Expression::Concat(vec![col("a"), col("b")])));
        assert_eq!(render(&null_concat), r#"("t0"."a" || "t0"."b") IS NULL"#);
    }

    #[test]
    fn test_left_join_with_nested_join_on_the_right() {
        let t = |name: &str, alias: &str| From::Table {
            name: name.into(),
            alias: TableAlias::new(alias),
        };
        let from = From::LeftOuterJoin {
            left: Box::new(t("A", "t0")),
            right: Box::new(From::CrossJoin(vec![t("B", "t1"), t("C", "t2")])),
            on: vec![],
        };
        let mut sql = SqlWriter::new(SqlSettings::default());
        from.to_sql(&mut sql);
        assert_eq!(
            sql.into_string(),
            r#""A" AS "t0" LEFT OUTER JOIN ("B" AS "t1" CROSS JOIN "C" AS "t2") ON TRUE"#
        );
    }

    #[test]
    fn test_provenance_renders_non_null() {
        assert_eq!(Value::from(&Constant::Provenance), Value::Boolean(true));
        assert_eq!(
            Value::from(&Constant::Iri("http://x".into())),
            Value::String("http://x".into())
        );
    }
}
