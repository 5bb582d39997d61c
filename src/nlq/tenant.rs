//! Tenant isolation for model-generated SQL.
//!
//! The query is parsed with `sqlparser`, every base-table reference at every
//! nesting level receives an equality predicate on the tenant column, and the
//! statement is printed back. Anything the walker cannot account for is an
//! error: a query is either fully scoped or rejected.
//!
//! Placement rules:
//! - tables in a scope's FROM list and inner/right/full/cross joins are
//!   filtered in that scope's WHERE clause;
//! - the nullable side of `LEFT JOIN ... ON` is filtered inside the ON clause
//!   so unmatched rows still come back with NULLs;
//! - CTE references and configured global tables are not filtered (the CTE
//!   bodies themselves are).

use sqlparser::ast::{
    visit_expressions_mut, visit_relations, BinaryOperator, Expr, FunctionArg, FunctionArgExpr,
    Ident, JoinConstraint, JoinOperator, ObjectName, Query, Select, SelectItem, SetExpr,
    Statement, TableFactor, TableWithJoins, Value,
};
use sqlparser::dialect::{Dialect as SqlDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;
use std::collections::HashSet;
use std::ops::ControlFlow;
use tracing::debug;

use super::error::TenantFilterError;
use super::sql_text::escape_literal;
use super::types::Dialect;
use crate::config::NlqConfig;

type Result<T> = std::result::Result<T, TenantFilterError>;

#[derive(Debug, Clone)]
pub struct TenantScope {
    column: String,
    placeholder: String,
    global_tables: HashSet<String>,
    dialect: Dialect,
}

impl Default for TenantScope {
    fn default() -> Self {
        Self::from_config(&NlqConfig::default())
    }
}

impl TenantScope {
    pub fn new(column: &str, placeholder: &str, global_tables: &[String]) -> Self {
        Self {
            column: column.to_string(),
            placeholder: placeholder.to_string(),
            global_tables: global_tables.iter().cloned().collect(),
            dialect: Dialect::default(),
        }
    }

    pub fn from_config(config: &NlqConfig) -> Self {
        Self::new(
            &config.tenant_column,
            &config.tenant_placeholder,
            &config.global_tables,
        )
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Rewrite `sql` so every tenant-scoped table reference is filtered on
    /// `tenant_id`. Literal placeholder tokens are bound to `tenant_id` first.
    pub fn secure(&self, sql: &str, tenant_id: &str) -> Result<String> {
        if tenant_id.trim().is_empty() {
            return Err(TenantFilterError::EmptyTenantId);
        }

        let mut statements = Parser::parse_sql(self.parser_dialect().as_ref(), sql)?;
        if statements.len() != 1 {
            return Err(TenantFilterError::StatementCount(statements.len()));
        }
        let mut statement = statements.remove(0);

        self.bind_placeholders(&mut statement, tenant_id);

        let Statement::Query(query) = &mut statement else {
            return Err(TenantFilterError::NotAQuery);
        };

        let mut injector = Injector {
            scope: self,
            tenant_id,
            reached: 0,
            injected: 0,
        };
        injector.secure_query(query, &[])?;

        let mut found = 0usize;
        let _ = visit_relations(&statement, |_| {
            found += 1;
            ControlFlow::<()>::Continue(())
        });
        if found != injector.reached {
            return Err(TenantFilterError::UnreachableRelation {
                found,
                reached: injector.reached,
            });
        }

        debug!(
            "Tenant scope applied: {} table references, {} predicates added",
            injector.reached, injector.injected
        );
        Ok(statement.to_string())
    }

    /// Substitute the placeholder token in SQL produced without a tenant id,
    /// then scope it. A token left outside a string literal fails to parse.
    pub fn bind(&self, sql: &str, tenant_id: &str) -> Result<String> {
        if tenant_id.trim().is_empty() {
            return Err(TenantFilterError::EmptyTenantId);
        }
        let bound = sql.replace(&self.placeholder, &escape_literal(tenant_id));
        self.secure(&bound, tenant_id)
    }

    fn parser_dialect(&self) -> Box<dyn SqlDialect> {
        match self.dialect {
            Dialect::Postgresql => Box::new(PostgreSqlDialect {}),
            Dialect::Mysql => Box::new(MySqlDialect {}),
            Dialect::Sqlserver => Box::new(MsSqlDialect {}),
        }
    }

    fn bind_placeholders(&self, statement: &mut Statement, tenant_id: &str) {
        let _ = visit_expressions_mut(statement, |expr| {
            if let Expr::Value(Value::SingleQuotedString(value)) = expr {
                if *value == self.placeholder {
                    *value = tenant_id.to_string();
                }
            }
            ControlFlow::<()>::Continue(())
        });
    }

    /// Global entries match the reference as written: `Currency` exempts only
    /// an unqualified `Currency`, never `crm.Currency`.
    fn is_global(&self, name: &ObjectName) -> bool {
        let written = name.0.iter().map(ident_key).collect::<Vec<_>>().join(".");
        self.global_tables.contains(&written)
    }

    fn column_ident(&self) -> Ident {
        Ident::with_quote(self.dialect.quote_char(), self.column.clone())
    }

    fn is_tenant_column(&self, ident: &Ident) -> bool {
        ident.value.eq_ignore_ascii_case(&self.column)
    }
}

/// Scope `sql` to `tenant_id` with the default column, placeholder and the
/// PostgreSQL dialect.
pub fn secure_query_for_tenant(sql: &str, tenant_id: &str) -> Result<String> {
    TenantScope::default().secure(sql, tenant_id)
}

struct Injector<'a> {
    scope: &'a TenantScope,
    tenant_id: &'a str,
    reached: usize,
    injected: usize,
}

impl Injector<'_> {
    fn secure_query(&mut self, query: &mut Query, outer_ctes: &[String]) -> Result<()> {
        let mut visible = outer_ctes.to_vec();

        if let Some(with) = query.with.as_mut() {
            if with.recursive {
                visible.extend(with.cte_tables.iter().map(|cte| ident_key(&cte.alias.name)));
                for cte in with.cte_tables.iter_mut() {
                    self.secure_query(&mut cte.query, &visible)?;
                }
            } else {
                // A plain CTE only sees the ones declared before it
                for cte in with.cte_tables.iter_mut() {
                    self.secure_query(&mut cte.query, &visible)?;
                    visible.push(ident_key(&cte.alias.name));
                }
            }
        }

        self.secure_set_expr(&mut query.body, &visible)?;

        for order in query.order_by.iter_mut() {
            self.secure_expr(&mut order.expr, &visible)?;
        }
        if let Some(limit) = query.limit.as_mut() {
            self.secure_expr(limit, &visible)?;
        }
        Ok(())
    }

    fn secure_set_expr(&mut self, body: &mut SetExpr, ctes: &[String]) -> Result<()> {
        match body {
            SetExpr::Select(select) => self.secure_select(select, ctes),
            SetExpr::Query(query) => self.secure_query(query, ctes),
            SetExpr::SetOperation { left, right, .. } => {
                self.secure_set_expr(left, ctes)?;
                self.secure_set_expr(right, ctes)
            }
            SetExpr::Values(values) => {
                for row in values.rows.iter_mut() {
                    for expr in row.iter_mut() {
                        self.secure_expr(expr, ctes)?;
                    }
                }
                Ok(())
            }
            other => Err(TenantFilterError::UnsupportedSource(other.to_string())),
        }
    }

    fn secure_select(&mut self, select: &mut Select, ctes: &[String]) -> Result<()> {
        if select.into.is_some() {
            return Err(TenantFilterError::SelectInto);
        }
        if !select.lateral_views.is_empty() {
            return Err(TenantFilterError::UnsupportedSource("LATERAL VIEW".to_string()));
        }

        // Unqualified tenant predicates only count when nothing else is in scope
        let single_source = select.from.len() == 1
            && select.from[0].joins.is_empty()
            && matches!(select.from[0].relation, TableFactor::Table { .. });

        let mut where_targets = Vec::new();
        for from in select.from.iter_mut() {
            self.secure_table_with_joins(from, ctes, &mut where_targets)?;
        }

        for item in select.projection.iter_mut() {
            if let SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } = item {
                self.secure_expr(expr, ctes)?;
            }
        }
        if let Some(having) = select.having.as_mut() {
            self.secure_expr(having, ctes)?;
        }
        if let Some(selection) = select.selection.as_mut() {
            self.secure_expr(selection, ctes)?;
        }

        let existing = select.selection.take();
        let missing = self.missing_predicates(existing.as_ref(), &where_targets, single_source)?;
        select.selection = combine(existing, missing);
        Ok(())
    }

    fn secure_table_with_joins(
        &mut self,
        from: &mut TableWithJoins,
        ctes: &[String],
        where_targets: &mut Vec<Vec<Ident>>,
    ) -> Result<()> {
        self.secure_factor(&mut from.relation, ctes, where_targets)?;

        for join in from.joins.iter_mut() {
            match &mut join.join_operator {
                JoinOperator::LeftOuter(JoinConstraint::On(on)) => {
                    let mut on_targets = Vec::new();
                    self.secure_factor(&mut join.relation, ctes, &mut on_targets)?;
                    self.secure_expr(on, ctes)?;

                    let existing = std::mem::replace(on, Expr::Value(Value::Boolean(true)));
                    let missing = self.missing_predicates(Some(&existing), &on_targets, false)?;
                    if let Some(combined) = combine(Some(existing), missing) {
                        *on = combined;
                    }
                }
                operator => {
                    self.secure_factor(&mut join.relation, ctes, where_targets)?;
                    if let Some(on) = join_condition(operator) {
                        self.secure_expr(on, ctes)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn secure_factor(
        &mut self,
        factor: &mut TableFactor,
        ctes: &[String],
        targets: &mut Vec<Vec<Ident>>,
    ) -> Result<()> {
        match factor {
            TableFactor::Table {
                name, alias, args, ..
            } => {
                self.reached += 1;
                if args.is_some() {
                    return Err(TenantFilterError::UnsupportedSource(format!(
                        "table function {name}"
                    )));
                }
                if is_cte_reference(name, ctes) || self.scope.is_global(name) {
                    return Ok(());
                }
                let qualifier = match alias {
                    Some(alias) => vec![alias.name.clone()],
                    None => name.0.clone(),
                };
                targets.push(qualifier);
                Ok(())
            }
            TableFactor::Derived { subquery, .. } => self.secure_query(subquery, ctes),
            TableFactor::NestedJoin {
                table_with_joins,
                alias: None,
            } => self.secure_table_with_joins(table_with_joins, ctes, targets),
            other => Err(TenantFilterError::UnsupportedSource(other.to_string())),
        }
    }

    fn secure_expr(&mut self, expr: &mut Expr, ctes: &[String]) -> Result<()> {
        match expr {
            Expr::Subquery(query) => self.secure_query(query, ctes),
            Expr::Exists { subquery, .. } => self.secure_query(subquery, ctes),
            Expr::InSubquery { expr, subquery, .. } => {
                self.secure_expr(expr, ctes)?;
                self.secure_query(subquery, ctes)
            }
            Expr::BinaryOp { left, right, .. } => {
                self.secure_expr(left, ctes)?;
                self.secure_expr(right, ctes)
            }
            Expr::UnaryOp { expr, .. }
            | Expr::Nested(expr)
            | Expr::IsNull(expr)
            | Expr::IsNotNull(expr)
            | Expr::IsTrue(expr)
            | Expr::IsFalse(expr)
            | Expr::Cast { expr, .. } => self.secure_expr(expr, ctes),
            Expr::InList { expr, list, .. } => {
                self.secure_expr(expr, ctes)?;
                for item in list.iter_mut() {
                    self.secure_expr(item, ctes)?;
                }
                Ok(())
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.secure_expr(expr, ctes)?;
                self.secure_expr(low, ctes)?;
                self.secure_expr(high, ctes)
            }
            Expr::Like { expr, pattern, .. } | Expr::ILike { expr, pattern, .. } => {
                self.secure_expr(expr, ctes)?;
                self.secure_expr(pattern, ctes)
            }
            Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => {
                if let Some(operand) = operand {
                    self.secure_expr(operand, ctes)?;
                }
                for expr in conditions.iter_mut().chain(results.iter_mut()) {
                    self.secure_expr(expr, ctes)?;
                }
                if let Some(else_result) = else_result {
                    self.secure_expr(else_result, ctes)?;
                }
                Ok(())
            }
            Expr::Function(function) => {
                for arg in function.args.iter_mut() {
                    if let FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
                    | FunctionArg::Named {
                        arg: FunctionArgExpr::Expr(expr),
                        ..
                    } = arg
                    {
                        self.secure_expr(expr, ctes)?;
                    }
                }
                Ok(())
            }
            // Leaves, or shapes whose subqueries the completeness check will catch
            _ => Ok(()),
        }
    }

    /// Predicates still needed for `targets` given the conjuncts already in
    /// `existing`.
    fn missing_predicates(
        &mut self,
        existing: Option<&Expr>,
        targets: &[Vec<Ident>],
        allow_unqualified: bool,
    ) -> Result<Vec<Expr>> {
        let conjuncts = existing.map(conjuncts).unwrap_or_default();
        let mut missing: Vec<Expr> = Vec::new();
        let mut added: Vec<&[Ident]> = Vec::new();

        for target in targets {
            let mut satisfied = false;
            for conjunct in &conjuncts {
                let Some((qualifier, value)) = self.tenant_comparison(conjunct) else {
                    continue;
                };
                let applies = match qualifier {
                    Some(qualifier) => same_qualifier(qualifier, target),
                    None => allow_unqualified,
                };
                if !applies {
                    continue;
                }
                if value != self.tenant_id {
                    return Err(TenantFilterError::ConflictingTenant {
                        qualifier: display_qualifier(target),
                    });
                }
                satisfied = true;
            }

            if satisfied || added.iter().any(|q| same_qualifier(q, target)) {
                continue;
            }
            added.push(target);
            missing.push(self.predicate(target));
        }

        self.injected += missing.len();
        Ok(missing)
    }

    /// `qualifier.tenant_column = 'literal'` in either operand order.
    fn tenant_comparison<'e>(&self, expr: &'e Expr) -> Option<(Option<&'e [Ident]>, &'e str)> {
        let Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } = expr
        else {
            return None;
        };

        let column = |e: &'e Expr| -> Option<Option<&'e [Ident]>> {
            match e {
                Expr::Identifier(ident) if self.scope.is_tenant_column(ident) => Some(None),
                Expr::CompoundIdentifier(parts) => match parts.split_last() {
                    Some((last, qualifier))
                        if !qualifier.is_empty() && self.scope.is_tenant_column(last) =>
                    {
                        Some(Some(qualifier))
                    }
                    _ => None,
                },
                _ => None,
            }
        };
        let literal = |e: &'e Expr| match e {
            Expr::Value(Value::SingleQuotedString(value)) => Some(value.as_str()),
            _ => None,
        };

        match (column(left), literal(right)) {
            (Some(qualifier), Some(value)) => Some((qualifier, value)),
            _ => match (literal(left), column(right)) {
                (Some(value), Some(qualifier)) => Some((qualifier, value)),
                _ => None,
            },
        }
    }

    fn predicate(&self, qualifier: &[Ident]) -> Expr {
        let mut column = qualifier.to_vec();
        column.push(self.scope.column_ident());
        Expr::BinaryOp {
            left: Box::new(Expr::CompoundIdentifier(column)),
            op: BinaryOperator::Eq,
            right: Box::new(Expr::Value(Value::SingleQuotedString(
                self.tenant_id.to_string(),
            ))),
        }
    }
}

fn join_condition(operator: &mut JoinOperator) -> Option<&mut Expr> {
    let constraint = match operator {
        JoinOperator::Inner(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c)
        | JoinOperator::LeftSemi(c)
        | JoinOperator::RightSemi(c)
        | JoinOperator::LeftAnti(c)
        | JoinOperator::RightAnti(c) => c,
        _ => return None,
    };
    match constraint {
        JoinConstraint::On(expr) => Some(expr),
        _ => None,
    }
}

/// Top-level AND conjuncts; parenthesised AND chains are flattened.
fn conjuncts(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            let mut out = conjuncts(left);
            out.extend(conjuncts(right));
            out
        }
        Expr::Nested(inner) => match inner.as_ref() {
            Expr::BinaryOp {
                op: BinaryOperator::And,
                ..
            }
            | Expr::Nested(_) => conjuncts(inner),
            _ => vec![inner.as_ref()],
        },
        _ => vec![expr],
    }
}

/// AND `predicates` onto `existing`, parenthesising an OR/XOR predicate.
fn combine(existing: Option<Expr>, predicates: Vec<Expr>) -> Option<Expr> {
    let mut combined = match existing {
        Some(
            expr @ Expr::BinaryOp {
                op: BinaryOperator::Or | BinaryOperator::Xor,
                ..
            },
        ) if !predicates.is_empty() => Some(Expr::Nested(Box::new(expr))),
        other => other,
    };

    for predicate in predicates {
        combined = Some(match combined {
            Some(expr) => Expr::BinaryOp {
                left: Box::new(expr),
                op: BinaryOperator::And,
                right: Box::new(predicate),
            },
            None => predicate,
        });
    }
    combined
}

/// Identifier as PostgreSQL resolves it: unquoted names fold to lower case.
fn ident_key(ident: &Ident) -> String {
    match ident.quote_style {
        Some(_) => ident.value.clone(),
        None => ident.value.to_lowercase(),
    }
}

fn is_cte_reference(name: &ObjectName, ctes: &[String]) -> bool {
    match name.0.as_slice() {
        [ident] => ctes.contains(&ident_key(ident)),
        _ => false,
    }
}

/// Equal parts, or a single-part qualifier naming the last part of the other.
fn same_qualifier(a: &[Ident], b: &[Ident]) -> bool {
    let keys = |q: &[Ident]| q.iter().map(ident_key).collect::<Vec<_>>();
    let (a, b) = (keys(a), keys(b));
    if a == b {
        return true;
    }
    match (a.as_slice(), b.as_slice()) {
        ([single], [.., last]) | ([.., last], [single]) => single == last,
        _ => false,
    }
}

fn display_qualifier(qualifier: &[Ident]) -> String {
    qualifier
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TID: &str = "tid-42";

    fn secure(sql: &str) -> String {
        secure_query_for_tenant(sql, TID).unwrap()
    }

    #[test]
    fn filters_a_single_unaliased_table() {
        assert_eq!(
            secure("SELECT COUNT(*) FROM \"SalesOpportunity\" WHERE status = 'won'"),
            "SELECT COUNT(*) FROM \"SalesOpportunity\" WHERE status = 'won' AND \"SalesOpportunity\".\"tenantId\" = 'tid-42'"
        );
    }

    #[test]
    fn adds_a_where_clause_when_missing() {
        assert_eq!(
            secure("SELECT * FROM \"SalesLead\" l LIMIT 100"),
            "SELECT * FROM \"SalesLead\" AS l WHERE l.\"tenantId\" = 'tid-42' LIMIT 100"
        );
    }

    #[test]
    fn filters_every_joined_table_by_alias() {
        let sql = secure(
            "SELECT a.name, COUNT(o.id) FROM \"SalesAccount\" a \
             JOIN \"SalesOpportunity\" o ON o.\"accountId\" = a.id GROUP BY a.name",
        );
        assert!(sql.contains("WHERE a.\"tenantId\" = 'tid-42' AND o.\"tenantId\" = 'tid-42'"));
    }

    #[test]
    fn left_join_filter_goes_into_the_on_clause() {
        let sql = secure(
            "SELECT a.name, c.email FROM \"SalesAccount\" a \
             LEFT JOIN \"SalesContact\" c ON c.\"accountId\" = a.id",
        );
        assert_eq!(
            sql,
            "SELECT a.name, c.email FROM \"SalesAccount\" AS a \
             LEFT JOIN \"SalesContact\" AS c ON c.\"accountId\" = a.id AND c.\"tenantId\" = 'tid-42' \
             WHERE a.\"tenantId\" = 'tid-42'"
        );
    }

    #[test]
    fn wraps_an_existing_or_predicate() {
        let sql = secure("SELECT * FROM \"SalesLead\" WHERE status = 'new' OR status = 'open'");
        assert!(sql.ends_with(
            "WHERE (status = 'new' OR status = 'open') AND \"SalesLead\".\"tenantId\" = 'tid-42'"
        ));
    }

    #[test]
    fn filters_subqueries_at_every_level() {
        let sql = secure(
            "SELECT name FROM \"SalesAccount\" WHERE id IN \
             (SELECT \"accountId\" FROM \"SalesOpportunity\" WHERE amount > \
             (SELECT AVG(amount) FROM \"SalesOpportunity\" s))",
        );
        assert!(sql.contains("FROM \"SalesOpportunity\" AS s WHERE s.\"tenantId\" = 'tid-42'"));
        assert!(sql.contains("AND \"SalesOpportunity\".\"tenantId\" = 'tid-42')"));
        assert!(sql.ends_with("AND \"SalesAccount\".\"tenantId\" = 'tid-42'"));
    }

    #[test]
    fn filters_derived_tables_exists_and_scalar_subqueries() {
        let sql = secure(
            "SELECT t.stage, (SELECT COUNT(*) FROM \"SalesLead\") AS leads \
             FROM (SELECT stage FROM \"SalesOpportunity\") t \
             WHERE EXISTS (SELECT 1 FROM \"SalesContact\" c WHERE c.stage = t.stage)",
        );
        assert!(sql.contains("(SELECT COUNT(*) FROM \"SalesLead\" WHERE \"SalesLead\".\"tenantId\" = 'tid-42')"));
        assert!(sql.contains("(SELECT stage FROM \"SalesOpportunity\" WHERE \"SalesOpportunity\".\"tenantId\" = 'tid-42')"));
        assert!(sql.contains("c.stage = t.stage AND c.\"tenantId\" = 'tid-42'"));
    }

    #[test]
    fn filters_both_sides_of_a_union() {
        let sql = secure("SELECT name FROM \"SalesLead\" UNION ALL SELECT name FROM \"SalesContact\"");
        assert!(sql.contains("\"SalesLead\".\"tenantId\" = 'tid-42'"));
        assert!(sql.contains("\"SalesContact\".\"tenantId\" = 'tid-42'"));
    }

    #[test]
    fn filters_cte_bodies_not_cte_references() {
        let sql = secure(
            "WITH won AS (SELECT * FROM \"SalesOpportunity\" WHERE status = 'won') \
             SELECT COUNT(*) FROM won",
        );
        assert_eq!(
            sql,
            "WITH won AS (SELECT * FROM \"SalesOpportunity\" WHERE status = 'won' \
             AND \"SalesOpportunity\".\"tenantId\" = 'tid-42') SELECT COUNT(*) FROM won"
        );
    }

    #[test]
    fn a_cte_does_not_shadow_the_table_inside_its_own_body() {
        let sql = secure("WITH leads AS (SELECT * FROM leads) SELECT * FROM leads");
        assert!(sql.contains("(SELECT * FROM leads WHERE leads.\"tenantId\" = 'tid-42')"));
        assert!(sql.ends_with("SELECT * FROM leads"));
    }

    #[test]
    fn is_idempotent() {
        for sql in [
            "SELECT * FROM \"SalesLead\"",
            "SELECT * FROM \"SalesLead\" l WHERE l.status = 'a' OR l.status = 'b'",
            "SELECT a.name FROM \"SalesAccount\" a LEFT JOIN \"SalesContact\" c ON c.\"accountId\" = a.id",
            "SELECT name FROM \"SalesAccount\" WHERE id IN (SELECT \"accountId\" FROM \"SalesOpportunity\")",
        ] {
            let once = secure(sql);
            assert_eq!(secure(&once), once, "not idempotent for {sql}");
        }
    }

    #[test]
    fn keeps_a_matching_predicate_emitted_by_the_model() {
        let sql = "SELECT * FROM \"SalesLead\" WHERE \"tenantId\" = 'tid-42' AND status = 'new'";
        assert_eq!(secure(sql), sql);

        let qualified = "SELECT * FROM \"SalesLead\" AS l WHERE 'tid-42' = l.\"tenantId\"";
        assert_eq!(secure(qualified), qualified);
    }

    #[test]
    fn a_predicate_under_or_does_not_count() {
        let sql = secure("SELECT * FROM \"SalesLead\" WHERE \"tenantId\" = 'tid-42' OR 1 = 1");
        assert!(sql.ends_with(
            "WHERE (\"tenantId\" = 'tid-42' OR 1 = 1) AND \"SalesLead\".\"tenantId\" = 'tid-42'"
        ));
    }

    #[test]
    fn binds_the_placeholder_token() {
        let sql = secure("SELECT * FROM \"SalesLead\" WHERE \"tenantId\" = '{{TENANT_ID}}'");
        assert_eq!(sql, "SELECT * FROM \"SalesLead\" WHERE \"tenantId\" = 'tid-42'");
    }

    #[test]
    fn bind_substitutes_the_token_before_scoping() {
        let scope = TenantScope::default();
        let sql = scope
            .bind(
                "SELECT o.status FROM \"SalesOpportunity\" o WHERE o.\"tenantId\" = '{{TENANT_ID}}'",
                "o'neil",
            )
            .unwrap();
        assert_eq!(
            sql,
            "SELECT o.status FROM \"SalesOpportunity\" AS o WHERE o.\"tenantId\" = 'o''neil'"
        );

        assert!(scope
            .bind("SELECT * FROM t WHERE \"tenantId\" = {{TENANT_ID}}", "acme corp")
            .is_err());
    }

    #[test]
    fn escapes_the_tenant_literal() {
        let sql = secure_query_for_tenant("SELECT * FROM t", "x' OR '1'='1").unwrap();
        assert!(sql.ends_with("WHERE t.\"tenantId\" = 'x'' OR ''1''=''1'"));
    }

    #[test]
    fn global_tables_are_not_filtered() {
        let scope = TenantScope::new("tenantId", "{{TENANT_ID}}", &["Currency".to_string()]);
        let sql = scope
            .secure(
                "SELECT o.amount, c.code FROM \"SalesOpportunity\" o JOIN \"Currency\" c ON c.id = o.\"currencyId\"",
                TID,
            )
            .unwrap();
        assert!(sql.ends_with("WHERE o.\"tenantId\" = 'tid-42'"));
    }

    #[test]
    fn global_exemption_needs_the_same_qualified_name() {
        let scope = TenantScope::new(
            "tenantId",
            "{{TENANT_ID}}",
            &["Currency".to_string(), "ref.Rate".to_string()],
        );

        let sql = scope.secure("SELECT * FROM crm.\"Currency\"", TID).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM crm.\"Currency\" WHERE crm.\"Currency\".\"tenantId\" = 'tid-42'"
        );

        let sql = scope.secure("SELECT * FROM ref.\"Rate\"", TID).unwrap();
        assert_eq!(sql, "SELECT * FROM ref.\"Rate\"");

        let sql = scope.secure("SELECT * FROM \"Rate\"", TID).unwrap();
        assert!(sql.ends_with("WHERE \"Rate\".\"tenantId\" = 'tid-42'"));
    }

    #[test]
    fn uses_dialect_quoting() {
        let scope = TenantScope::default().with_dialect(Dialect::Mysql);
        let sql = scope.secure("SELECT * FROM `SalesLead` l", TID).unwrap();
        assert_eq!(sql, "SELECT * FROM `SalesLead` AS l WHERE l.`tenantId` = 'tid-42'");
    }

    #[test]
    fn fails_closed() {
        let err = |sql: &str| secure_query_for_tenant(sql, TID).unwrap_err();

        assert!(matches!(err("SELEC * FRM"), TenantFilterError::Parse(_)));
        assert!(matches!(
            err("SELECT 1; SELECT * FROM \"SalesLead\""),
            TenantFilterError::StatementCount(2)
        ));
        assert!(matches!(
            err("DELETE FROM \"SalesLead\""),
            TenantFilterError::NotAQuery
        ));
        assert!(matches!(
            err("SELECT * INTO lead_backup FROM \"SalesLead\""),
            TenantFilterError::SelectInto
        ));
        assert!(matches!(
            err("SELECT * FROM \"SalesLead\" WHERE \"tenantId\" = 'someone-else'"),
            TenantFilterError::ConflictingTenant { .. }
        ));
        assert!(matches!(
            secure_query_for_tenant("SELECT * FROM t", "  "),
            Err(TenantFilterError::EmptyTenantId)
        ));
    }

    #[test]
    fn unreachable_relations_are_rejected() {
        // A subquery inside GROUP BY is not walked; the relation count catches it
        let err = secure_query_for_tenant(
            "SELECT status FROM \"SalesLead\" GROUP BY status, (SELECT MAX(id) FROM \"SalesAccount\")",
            TID,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TenantFilterError::UnreachableRelation { found: 2, reached: 1 }
        ));
    }
}
