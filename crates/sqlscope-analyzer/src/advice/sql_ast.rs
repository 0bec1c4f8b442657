//! Shared sqlparser helpers for the AST-based rules

use sqlparser::ast::{Query, Select, SetExpr, Statement};
use sqlparser::dialect::{GenericDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::{Parser, ParserError};
use sqlscope_core::{DialectTag, placeholders};

/// Parse with the closest sqlparser dialect. PostgreSQL reads `?` as a JSON
/// operator, so statements are numbered first, as they are when explained.
pub(crate) fn parse(sql: &str, dialect: DialectTag) -> Result<Vec<Statement>, ParserError> {
    match dialect {
        DialectTag::MySql => Parser::parse_sql(&MySqlDialect {}, sql),
        DialectTag::PostgreSql => {
            Parser::parse_sql(&PostgreSqlDialect {}, &placeholders::to_numbered(sql))
        }
        DialectTag::Oracle | DialectTag::Unknown => Parser::parse_sql(&GenericDialect {}, sql),
    }
}

/// Every SELECT block reachable from the top of a query body, including
/// both sides of set operations
pub(crate) fn select_blocks(query: &Query) -> Vec<&Select> {
    let mut selects = Vec::new();
    collect_selects(&query.body, &mut selects);
    selects
}

fn collect_selects<'a>(body: &'a SetExpr, out: &mut Vec<&'a Select>) {
    match body {
        SetExpr::Select(select) => out.push(select),
        SetExpr::Query(query) => collect_selects(&query.body, out),
        SetExpr::SetOperation { left, right, .. } => {
            collect_selects(left, out);
            collect_selects(right, out);
        }
        _ => {}
    }
}
