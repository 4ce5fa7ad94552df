//! Translation of intermediate query trees into SQL.
//!
//! Every subtree translates to a `Relation`: an optional `FROM` item, the
//! SQL expression reading each of its variables and the conditions its rows
//! must satisfy. Operators combine the relations of their children:
//!
//! - inner joins cross-join their children and equate shared variables
//! - left joins keep the conditions of the right side in the `ON` clause
//! - construction nodes, unions and native leaves become derived tables

use std::collections::BTreeMap;

use common_config::SqlSettings;
use common_error::{QuarryError, QuarryResult};
use log::debug;
use quarry_core::{FunctionSymbol, ImmutableTerm, MetadataProvider, Variable};
use quarry_iq::{
    ConstructionNode, EmptyNode, ExtensionalDataNode, IQTree, NativeNode, UnionNode, IQ,
};

use crate::sql_ast::{self, BinaryOperator, Expression, Select, TableAlias, Value};
use crate::sql_string::SqlWriter;

/// Converts optimized queries into their executable shape: the root
/// construction node over one native leaf holding the SQL of everything
/// below it.
pub struct NativeQueryGenerator<'a> {
    metadata: &'a dyn MetadataProvider,
    settings: SqlSettings,
}

impl<'a> NativeQueryGenerator<'a> {
    pub fn new(metadata: &'a dyn MetadataProvider) -> Self {
        Self {
            metadata,
            settings: SqlSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SqlSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Generate the native query.
    ///
    /// Declared-empty queries and queries already in executable shape are
    /// returned unchanged. The native signature lists the variables of the
    /// subtree in variable order.
    pub fn generate(&self, iq: IQ) -> QuarryResult<IQ> {
        if iq.is_declared_empty() {
            return Ok(iq);
        }
        let iq = iq.normalize_for_optimization()?;
        let IQTree::Construction { node, child } = iq.tree() else {
            return Err(QuarryError::malformed(
                "normalized query has no root construction node",
            ));
        };
        if matches!(**child, IQTree::Native(_)) {
            return Ok(iq);
        }

        let signature: Vec<Variable> = child.variables().into_iter().collect();
        let select = Translate::new(self.metadata).translate_select(child, &signature)?;
        let mut sql = SqlWriter::new(self.settings.clone());
        select.to_sql(&mut sql);
        let sql = sql.into_string();
        debug!("Generated SQL for {}: {}", iq.projection(), sql);

        let native = NativeNode::new(sql, signature)?;
        iq.with_tree(IQTree::Construction {
            node: node.clone(),
            child: Box::new(IQTree::Native(native)),
        })
    }
}

/// Rows of a translated subtree.
#[derive(Debug, Default)]
struct Relation {
    from: Option<sql_ast::From>,
    columns: BTreeMap<Variable, Expression>,
    conditions: Vec<Expression>,
}

impl Relation {
    fn column(&self, variable: &Variable) -> QuarryResult<Expression> {
        column_of(&self.columns, variable)
    }

    /// A `SELECT` returning `variables` as columns named after them.
    fn into_select(self, variables: &[Variable]) -> QuarryResult<Select> {
        let columns = variables
            .iter()
            .map(|v| Ok((self.column(v)?, v.name().to_string())))
            .collect::<QuarryResult<Vec<_>>>()?;
        Ok(Select {
            columns,
            from: self.from,
            where_: self.conditions,
        })
    }
}

fn column_of(columns: &BTreeMap<Variable, Expression>, variable: &Variable) -> QuarryResult<Expression> {
    columns
        .get(variable)
        .cloned()
        .ok_or_else(|| QuarryError::malformed(format!("variable {variable} is not provided by the subtree")))
}

/// State of one translation.
pub(crate) struct Translate<'a> {
    metadata: &'a dyn MetadataProvider,
    /// Gives each alias a unique name.
    unique_index: u64,
}

impl<'a> Translate<'a> {
    pub(crate) fn new(metadata: &'a dyn MetadataProvider) -> Self {
        Self {
            metadata,
            unique_index: 0,
        }
    }

    /// Translate a tree to a `SELECT` whose output columns are `signature`.
    pub(crate) fn translate_select(
        &mut self,
        tree: &IQTree,
        signature: &[Variable],
    ) -> QuarryResult<Select> {
        self.translate_tree(tree)?.into_select(signature)
    }

    fn make_table_alias(&mut self, name: &str) -> TableAlias {
        let index = self.unique_index;
        self.unique_index += 1;
        TableAlias::new(format!("{}_{index}", name.to_lowercase()))
    }

    fn translate_tree(&mut self, tree: &IQTree) -> QuarryResult<Relation> {
        match tree {
            IQTree::ExtensionalData(node) => self.translate_extensional(node),
            IQTree::Native(node) => Ok(self.translate_native(node)),
            IQTree::Empty(node) => Ok(empty_relation(node)),
            IQTree::True => Ok(Relation::default()),
            IQTree::Construction { node, child } => self.translate_construction(node, child),
            IQTree::Filter { node, child } => {
                let mut relation = self.translate_tree(child)?;
                let condition = translate_term(node.condition(), &relation.columns)?;
                relation.conditions.push(condition);
                Ok(relation)
            }
            IQTree::InnerJoin { node, children } => {
                self.translate_inner_join(node.condition(), children)
            }
            IQTree::LeftJoin { node, left, right } => {
                self.translate_left_join(node.condition(), left, right)
            }
            IQTree::Union { node, children } => self.translate_union(node, children),
        }
    }

    fn translate_extensional(&mut self, node: &ExtensionalDataNode) -> QuarryResult<Relation> {
        let definition = self.metadata.require_relation(node.relation())?;
        let name = definition.id().as_str();
        let alias = self.make_table_alias(name);
        let mut relation = Relation::default();
        for (position, term) in node.arguments() {
            let attribute = definition.attribute(*position).ok_or_else(|| {
                QuarryError::malformed(format!("{name} has no attribute at position {position}"))
            })?;
            let column = Expression::column(&alias, &attribute.name);
            match term {
                ImmutableTerm::Variable(v) => match relation.columns.get(v) {
                    Some(first) => relation
                        .conditions
                        .push(Expression::equals(first.clone(), column)),
                    None => {
                        relation.columns.insert(v.clone(), column);
                    }
                },
                ImmutableTerm::Constant(c) => relation
                    .conditions
                    .push(Expression::equals(column, Expression::Value(Value::from(c)))),
                ImmutableTerm::Functional(f) => {
                    common_error::malformed_err!("functional term {f} as argument of {name}")
                }
            }
        }
        relation.from = Some(sql_ast::From::Table {
            name: name.to_string(),
            alias,
        });
        Ok(relation)
    }

    fn translate_native(&mut self, node: &NativeNode) -> Relation {
        let sql = node.sql().to_string();
        self.derived_table("native", node.signature(), |alias| sql_ast::From::Native {
            sql,
            alias,
        })
    }

    fn translate_construction(
        &mut self,
        node: &ConstructionNode,
        child: &IQTree,
    ) -> QuarryResult<Relation> {
        let child = self.translate_tree(child)?;
        let variables: Vec<Variable> = node.projected().iter().cloned().collect();
        let columns = variables
            .iter()
            .map(|v| {
                let expression = match node.substitution().get(v) {
                    Some(term) => translate_term(term, &child.columns)?,
                    None => child.column(v)?,
                };
                Ok((expression, v.name().to_string()))
            })
            .collect::<QuarryResult<Vec<_>>>()?;
        let select = Select {
            columns,
            from: child.from,
            where_: child.conditions,
        };
        Ok(self.derived_table("sub", &variables, |alias| sql_ast::From::Select {
            select: Box::new(select),
            alias,
        }))
    }

    fn translate_inner_join(
        &mut self,
        condition: Option<&ImmutableTerm>,
        children: &[IQTree],
    ) -> QuarryResult<Relation> {
        let mut joined = Relation::default();
        let mut items = Vec::new();
        for child in children {
            let relation = self.translate_tree(child)?;
            items.extend(relation.from);
            joined.conditions.extend(relation.conditions);
            for (v, column) in relation.columns {
                match joined.columns.get(&v) {
                    Some(first) => joined
                        .conditions
                        .push(Expression::equals(first.clone(), column)),
                    None => {
                        joined.columns.insert(v, column);
                    }
                }
            }
        }
        if let Some(condition) = condition {
            let condition = translate_term(condition, &joined.columns)?;
            joined.conditions.push(condition);
        }
        joined.from = match items.len() {
            0 | 1 => items.pop(),
            _ => Some(sql_ast::From::CrossJoin(items)),
        };
        Ok(joined)
    }

    fn translate_left_join(
        &mut self,
        condition: Option<&ImmutableTerm>,
        left: &IQTree,
        right: &IQTree,
    ) -> QuarryResult<Relation> {
        let left = self.translate_join_operand(left)?;
        let right = self.translate_join_operand(right)?;

        let mut on = right.conditions;
        let mut columns = left.columns;
        for (v, column) in right.columns {
            match columns.get(&v) {
                Some(first) => on.push(Expression::equals(first.clone(), column)),
                None => {
                    columns.insert(v, column);
                }
            }
        }
        if let Some(condition) = condition {
            on.push(translate_term(condition, &columns)?);
        }

        let (Some(left_from), Some(right_from)) = (left.from, right.from) else {
            return Err(QuarryError::internal("left join operand without FROM item"));
        };
        Ok(Relation {
            from: Some(sql_ast::From::LeftOuterJoin {
                left: Box::new(left_from),
                right: Box::new(right_from),
                on,
            }),
            columns,
            conditions: left.conditions,
        })
    }

    /// Left-join operands need a `FROM` item; leaves without one become a
    /// derived table.
    fn translate_join_operand(&mut self, tree: &IQTree) -> QuarryResult<Relation> {
        let relation = self.translate_tree(tree)?;
        if relation.from.is_some() {
            return Ok(relation);
        }
        let variables: Vec<Variable> = tree.variables().into_iter().collect();
        let select = relation.into_select(&variables)?;
        Ok(self.derived_table("sub", &variables, |alias| sql_ast::From::Select {
            select: Box::new(select),
            alias,
        }))
    }

    fn translate_union(&mut self, node: &UnionNode, children: &[IQTree]) -> QuarryResult<Relation> {
        let variables: Vec<Variable> = node.projected().iter().cloned().collect();
        if children.is_empty() {
            return Ok(empty_relation(&EmptyNode::new(node.projected().clone())));
        }
        let selects = children
            .iter()
            .map(|child| self.translate_select(child, &variables))
            .collect::<QuarryResult<Vec<_>>>()?;
        Ok(self.derived_table("union", &variables, |alias| sql_ast::From::UnionAll {
            selects,
            alias,
        }))
    }

    fn derived_table(
        &mut self,
        name: &str,
        variables: &[Variable],
        make: impl FnOnce(TableAlias) -> sql_ast::From,
    ) -> Relation {
        let alias = self.make_table_alias(name);
        let columns = variables
            .iter()
            .map(|v| (v.clone(), Expression::column(&alias, v.name())))
            .collect();
        Relation {
            from: Some(make(alias)),
            columns,
            conditions: Vec::new(),
        }
    }
}

/// No row: every variable reads `NULL` under an unsatisfiable condition.
fn empty_relation(node: &EmptyNode) -> Relation {
    Relation {
        from: None,
        columns: node
            .variables()
            .iter()
            .map(|v| (v.clone(), Expression::Value(Value::Null)))
            .collect(),
        conditions: vec![Expression::Value(Value::Boolean(false))],
    }
}

/// Translate a term, reading variables from `columns`.
///
/// IRI templates become concatenations of their constant parts and
/// arguments; argument values are not percent-encoded.
pub(crate) fn translate_term(
    term: &ImmutableTerm,
    columns: &BTreeMap<Variable, Expression>,
) -> QuarryResult<Expression> {
    let functional = match term {
        ImmutableTerm::Variable(v) => return column_of(columns, v),
        ImmutableTerm::Constant(c) => return Ok(Expression::Value(Value::from(c))),
        ImmutableTerm::Functional(f) => f,
    };
    let args = functional
        .args()
        .iter()
        .map(|arg| translate_term(arg, columns))
        .collect::<QuarryResult<Vec<_>>>()?;
    let comparison = |operator: BinaryOperator, args: Vec<Expression>| {
        let [left, right] = exact_args::<2>(functional.symbol(), args)?;
        Ok::<_, QuarryError>(Expression::BinaryOperation {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    };
    Ok(match functional.symbol() {
        FunctionSymbol::StrictEq => comparison(BinaryOperator::Equals, args)?,
        FunctionSymbol::StrictNeq => comparison(BinaryOperator::NotEquals, args)?,
        FunctionSymbol::LessThan => comparison(BinaryOperator::LessThan, args)?,
        FunctionSymbol::LessThanOrEqual => comparison(BinaryOperator::LessThanOrEqual, args)?,
        FunctionSymbol::GreaterThan => comparison(BinaryOperator::GreaterThan, args)?,
        FunctionSymbol::GreaterThanOrEqual => {
            comparison(BinaryOperator::GreaterThanOrEqual, args)?
        }
        FunctionSymbol::And => Expression::And(args),
        FunctionSymbol::Or => Expression::Or(args),
        symbol @ (FunctionSymbol::Not
        | FunctionSymbol::IsNull
        | FunctionSymbol::IsNotNull
        | FunctionSymbol::IsTrue) => {
            let [arg] = exact_args::<1>(symbol, args)?;
            let arg = Box::new(arg);
            match symbol {
                FunctionSymbol::Not => Expression::Not(arg),
                FunctionSymbol::IsNull => Expression::IsNull(arg),
                FunctionSymbol::IsNotNull => Expression::IsNotNull(arg),
                _ => Expression::IsTrue(arg),
            }
        }
        FunctionSymbol::IfElseNull => {
            let [condition, value] = exact_args::<2>(functional.symbol(), args)?;
            Expression::CaseWhen {
                condition: Box::new(condition),
                value: Box::new(value),
            }
        }
        FunctionSymbol::Coalesce => Expression::Coalesce(args),
        FunctionSymbol::Concat => Expression::Concat(args),
        FunctionSymbol::IriTemplate(template) => iri_concatenation(template, args),
    })
}

fn exact_args<const N: usize>(
    symbol: &FunctionSymbol,
    args: Vec<Expression>,
) -> QuarryResult<[Expression; N]> {
    let count = args.len();
    args.try_into().map_err(|_| {
        QuarryError::malformed(format!(
            "{} applied to {count} argument(s), expected {N}",
            symbol.name()
        ))
    })
}

fn iri_concatenation(template: &str, args: Vec<Expression>) -> Expression {
    let mut args = args.into_iter();
    let mut parts = Vec::new();
    for (i, literal) in template.split("{}").enumerate() {
        if i > 0 {
            parts.extend(args.next());
        }
        if !literal.is_empty() {
            parts.push(Expression::Value(Value::String(literal.to_string())));
        }
    }
    match parts.len() {
        0 => Expression::Value(Value::String(String::new())),
        1 => parts.remove(0),
        _ => Expression::Concat(parts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::term::{
        coalesce, greater_than, if_else_null, int, iri_template, is_not_null, not, string,
        strict_eq, strict_neq, var,
    };
    use quarry_core::testing::nullable_unique_metadata;
    use quarry_core::ProjectionAtom;
    use std::collections::BTreeSet;

    fn ext(relation: &str, args: &[(usize, ImmutableTerm)]) -> IQTree {
        IQTree::extensional(relation, args.iter().cloned()).unwrap()
    }

    fn vars(names: &[&str]) -> Vec<Variable> {
        names.iter().map(|n| Variable::new(*n)).collect()
    }

    fn to_sql(tree: &IQTree, signature: &[&str]) -> String {
        let metadata = nullable_unique_metadata();
        let select = Translate::new(&metadata)
            .translate_select(tree, &vars(signature))
            .unwrap();
        let mut sql = SqlWriter::new(SqlSettings::default());
        select.to_sql(&mut sql);
        sql.into_string()
    }

    fn term_sql(term: &ImmutableTerm) -> String {
        let columns = BTreeMap::from([(Variable::new("a"), Expression::column(&TableAlias::new("t"), "c"))]);
        let mut sql = SqlWriter::new(SqlSettings::default());
        translate_term(term, &columns).unwrap().to_sql(&mut sql);
        sql.into_string()
    }

    #[test]
    fn test_extensional_repeated_variable_and_constant() {
        let tree = ext("TABLE1", &[(0, var("a")), (1, var("a")), (2, int(3))]);
        assert_eq!(
            to_sql(&tree, &["a"]),
            r#"SELECT "table1_0"."col1" AS "a" FROM "TABLE1" AS "table1_0" WHERE "table1_0"."col1" = "table1_0"."col2" AND "table1_0"."col3" = 3"#
        );
    }

    #[test]
    fn test_inner_join_equates_shared_variables() {
        let tree = IQTree::inner_join_with(
            Some(is_not_null(var("b"))),
            vec![
                ext("TABLE1", &[(0, var("a")), (1, var("b"))]),
                ext("TABLE2", &[(0, var("a"))]),
            ],
        );
        assert_eq!(
            to_sql(&tree, &["a", "b"]),
            r#"SELECT "table1_0"."col1" AS "a", "table1_0"."col2" AS "b" FROM "TABLE1" AS "table1_0" CROSS JOIN "TABLE2" AS "table2_1" WHERE "table1_0"."col1" = "table2_1"."col1" AND "table1_0"."col2" IS NOT NULL"#
        );
    }

    #[test]
    fn test_left_join_keeps_right_conditions_in_on_clause() {
        let tree = IQTree::left_join(
            IQTree::filter(is_not_null(var("a")), ext("TABLE1", &[(0, var("a"))])),
            ext("TABLE2", &[(0, var("a")), (1, int(2)), (2, var("g"))]),
        );
        assert_eq!(
            to_sql(&tree, &["a", "g"]),
            r#"SELECT "table1_0"."col1" AS "a", "table2_1"."col3" AS "g" FROM "TABLE1" AS "table1_0" LEFT OUTER JOIN "TABLE2" AS "table2_1" ON "table2_1"."col2" = 2 AND "table1_0"."col1" = "table2_1"."col1" WHERE "table1_0"."col1" IS NOT NULL"#
        );
    }

    #[test]
    fn test_union_and_construction_become_derived_tables() {
        let branch = |relation: &str| {
            IQTree::construction(
                BTreeSet::from([Variable::new("a"), Variable::new("k")]),
                quarry_core::Substitution::singleton(Variable::new("k"), int(7)),
                ext(relation, &[(0, var("a"))]),
            )
            .unwrap()
        };
        let tree = IQTree::union(
            BTreeSet::from([Variable::new("a"), Variable::new("k")]),
            vec![branch("TABLE1"), branch("TABLE2")],
        );
        assert_eq!(
            to_sql(&tree, &["a", "k"]),
            concat!(
                r#"SELECT "union_4"."a" AS "a", "union_4"."k" AS "k" FROM ("#,
                r#"SELECT "sub_1"."a" AS "a", "sub_1"."k" AS "k" FROM (SELECT "table1_0"."col1" AS "a", 7 AS "k" FROM "TABLE1" AS "table1_0") AS "sub_1""#,
                r#" UNION ALL "#,
                r#"SELECT "sub_3"."a" AS "a", "sub_3"."k" AS "k" FROM (SELECT "table2_2"."col1" AS "a", 7 AS "k" FROM "TABLE2" AS "table2_2") AS "sub_3""#,
                r#") AS "union_4""#
            )
        );
    }

    #[test]
    fn test_empty_subtree_has_no_rows() {
        let tree = IQTree::Empty(EmptyNode::new(BTreeSet::from([Variable::new("a")])));
        assert_eq!(to_sql(&tree, &["a"]), r#"SELECT NULL AS "a" WHERE FALSE"#);
    }

    #[test]
    fn test_unknown_relation_is_reported() {
        let metadata = nullable_unique_metadata();
        let err = Translate::new(&metadata)
            .translate_select(&ext("MISSING", &[(0, var("a"))]), &vars(&["a"]))
            .unwrap_err();
        assert!(matches!(err, QuarryError::UnknownRelation(_)));
    }

    #[test]
    fn test_term_rendering() {
        assert_eq!(
            term_sql(&if_else_null(strict_eq(var("a"), int(2)), string("x"))),
            r#"CASE WHEN "t"."c" = 2 THEN 'x' ELSE NULL END"#
        );
        assert_eq!(
            term_sql(&iri_template("http://ex.org/{}/page", vec![var("a")]).unwrap()),
            r#"'http://ex.org/' || "t"."c" || '/page'"#
        );
        assert_eq!(term_sql(&iri_template("{}", vec![var("a")]).unwrap()), r#""t"."c""#);
        assert_eq!(
            term_sql(&not(greater_than(var("a"), int(1)))),
            r#"NOT ("t"."c" > 1)"#
        );
        assert_eq!(
            term_sql(&coalesce(vec![var("a"), int(0)])),
            r#"COALESCE("t"."c", 0)"#
        );
        assert_eq!(
            term_sql(&strict_neq(var("a"), string("it's"))),
            r#""t"."c" <> 'it''s'"#
        );
    }

    #[test]
    fn test_unbound_variable_is_malformed() {
        let columns = BTreeMap::new();
        let err = translate_term(&var("z"), &columns).unwrap_err();
        assert!(err.is_defect());
    }

    #[test]
    fn test_generator_builds_native_leaf() {
        let metadata = nullable_unique_metadata();
        let answer = ProjectionAtom::new("ans", vars(&["a"])).unwrap();
        let iq = IQ::new(answer, ext("TABLE1", &[(0, var("a")), (2, var("e"))])).unwrap();
        let generated = NativeQueryGenerator::new(&metadata).generate(iq).unwrap();
        let IQTree::Construction { node, child } = generated.tree() else {
            panic!("root construction expected");
        };
        assert_eq!(node.projected(), &BTreeSet::from([Variable::new("a")]));
        let IQTree::Native(native) = &**child else {
            panic!("native leaf expected");
        };
        assert_eq!(native.signature(), vars(&["a", "e"]).as_slice());
        assert_eq!(
            native.sql(),
            r#"SELECT "table1_0"."col1" AS "a", "table1_0"."col3" AS "e" FROM "TABLE1" AS "table1_0""#
        );

        let again = NativeQueryGenerator::new(&metadata)
            .generate(generated.clone())
            .unwrap();
        assert_eq!(again, generated);
    }

    #[test]
    fn test_pretty_settings() {
        let metadata = nullable_unique_metadata();
        let answer = ProjectionAtom::new("ans", vars(&["a"])).unwrap();
        let tree = IQTree::filter(is_not_null(var("a")), ext("TABLE1", &[(0, var("a"))]));
        let iq = IQ::new(answer, tree).unwrap();
        let settings = SqlSettings {
            identifier_quote: '`',
            pretty: true,
        };
        let generated = NativeQueryGenerator::new(&metadata)
            .with_settings(settings)
            .generate(iq)
            .unwrap();
        let IQTree::Construction { child, .. } = generated.tree() else {
            panic!("root construction expected");
        };
        let IQTree::Native(native) = &**child else {
            panic!("native leaf expected");
        };
        assert_eq!(
            native.sql(),
            "SELECT `table1_0`.`col1` AS `a`\nFROM `TABLE1` AS `table1_0`\nWHERE `table1_0`.`col1` IS NOT NULL"
        );
    }
}
