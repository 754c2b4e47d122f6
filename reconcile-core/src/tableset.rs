//! Table set comparison and DDL for tables missing on one side.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Serialize;

use crate::db::{qualified, quote_ident};

/// Leading `CREATE TABLE [schema.]name`. Backticked parts may hold any
/// character, with embedded backticks doubled.
static CREATE_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^CREATE\s+TABLE\s+(?:(?:`(?:[^`]|``)+`|[\w$]+)\.)?(?:`(?:[^`]|``)+`|[\w$]+)").unwrap()
});

/// Partition of two schemas' table names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableSets {
    /// In both, in source order.
    pub common: Vec<String>,
    /// In the source only, in source order.
    pub missing_in_dst: Vec<String>,
    /// In the destination only, in destination order.
    pub missing_in_src: Vec<String>,
}

/// Split source and destination table names into common and one-sided sets.
pub fn compare_sets(src: &[String], dst: &[String]) -> TableSets {
    let src_set: HashSet<&str> = src.iter().map(String::as_str).collect();
    let dst_set: HashSet<&str> = dst.iter().map(String::as_str).collect();

    let (common, missing_in_dst): (Vec<String>, Vec<String>) = src
        .iter()
        .cloned()
        .partition(|t| dst_set.contains(t.as_str()));
    let missing_in_src = dst
        .iter()
        .filter(|t| !src_set.contains(t.as_str()))
        .cloned()
        .collect();

    TableSets {
        common,
        missing_in_dst,
        missing_in_src,
    }
}

/// A table present in the source and absent from the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingTable {
    pub table: String,
    pub source_schema: String,
    pub destination_schema: String,
}

/// Requalify the leading `CREATE TABLE` of `create_sql` as `dst_schema`.`table`.
///
/// Everything after the table name is returned byte-for-byte. Text that does
/// not start with `CREATE TABLE` is returned unchanged.
pub fn rewrite_create_statement(create_sql: &str, table: &str, dst_schema: &str) -> String {
    match CREATE_TABLE_RE.find(create_sql) {
        Some(head) => format!(
            "CREATE TABLE {}{}",
            qualified(dst_schema, table),
            &create_sql[head.end()..]
        ),
        None => {
            log::warn!(
                "Create statement does not start with CREATE TABLE, left unchanged; schema={}, table={}",
                dst_schema,
                table
            );
            create_sql.to_string()
        }
    }
}

/// DDL block creating a missing table in the destination.
pub fn missing_table_block(table: &str, src_schema: &str, dst_schema: &str, create_sql: &str) -> String {
    format!(
        "-- Command to create missing table {}\n-- From database: {} → To database: {}\n{};",
        quote_ident(table),
        quote_ident(src_schema),
        quote_ident(dst_schema),
        rewrite_create_statement(create_sql, table, dst_schema)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    // ── set comparison ──

    #[test]
    fn test_compare_sets() {
        let sets = compare_sets(&names(&["a", "b", "c"]), &names(&["b", "c", "d"]));
        assert_eq!(sets.common, names(&["b", "c"]));
        assert_eq!(sets.missing_in_dst, names(&["a"]));
        assert_eq!(sets.missing_in_src, names(&["d"]));
    }

    #[test]
    fn test_compare_sets_keeps_source_order() {
        let sets = compare_sets(&names(&["zeta", "alpha", "mid"]), &names(&["mid", "zeta"]));
        assert_eq!(sets.common, names(&["zeta", "mid"]));
        assert_eq!(sets.missing_in_dst, names(&["alpha"]));
        assert!(sets.missing_in_src.is_empty());
    }

    #[test]
    fn test_compare_sets_empty_sides() {
        let sets = compare_sets(&[], &names(&["a"]));
        assert!(sets.common.is_empty());
        assert!(sets.missing_in_dst.is_empty());
        assert_eq!(sets.missing_in_src, names(&["a"]));
    }

    // ── create statement rewrite ──

    #[test]
    fn test_rewrite_backticked_name() {
        let sql = "CREATE TABLE `orders` (\n  `id` int NOT NULL,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB";
        let rewritten = rewrite_create_statement(sql, "orders", "shop_eu");
        assert!(rewritten.starts_with("CREATE TABLE `shop_eu`.`orders` ("));
        assert_eq!(
            &rewritten["CREATE TABLE `shop_eu`.`orders`".len()..],
            &sql["CREATE TABLE `orders`".len()..]
        );
    }

    #[test]
    fn test_rewrite_bare_and_qualified_names() {
        assert_eq!(
            rewrite_create_statement("create table orders (id int)", "orders", "shop_eu"),
            "CREATE TABLE `shop_eu`.`orders` (id int)"
        );
        assert_eq!(
            rewrite_create_statement("CREATE TABLE `shop_staging`.`orders` (id int)", "orders", "shop_eu"),
            "CREATE TABLE `shop_eu`.`orders` (id int)"
        );
    }

    #[test]
    fn test_rewrite_leaves_other_text_unchanged() {
        let sql = "CREATE VIEW `v` AS SELECT 1";
        assert_eq!(rewrite_create_statement(sql, "v", "shop_eu"), sql);
    }

    #[test]
    fn test_rewrite_hyphenated_name() {
        let sql = "CREATE TABLE `order-items` (\n  `id` int NOT NULL\n) ENGINE=InnoDB";
        assert_eq!(
            rewrite_create_statement(sql, "order-items", "shop_eu"),
            "CREATE TABLE `shop_eu`.`order-items` (\n  `id` int NOT NULL\n) ENGINE=InnoDB"
        );
    }

    #[test]
    fn test_rewrite_non_ascii_and_spaced_names() {
        assert_eq!(
            rewrite_create_statement("CREATE TABLE `café` (`id` int)", "café", "shop_eu"),
            "CREATE TABLE `shop_eu`.`café` (`id` int)"
        );
        assert_eq!(
            rewrite_create_statement("CREATE TABLE `old shop`.`line item` (`id` int)", "line item", "shop_eu"),
            "CREATE TABLE `shop_eu`.`line item` (`id` int)"
        );
    }

    #[test]
    fn test_rewrite_escaped_backtick_name() {
        assert_eq!(
            rewrite_create_statement("CREATE TABLE `odd``name` (`id` int)", "odd`name", "shop_eu"),
            "CREATE TABLE `shop_eu`.`odd``name` (`id` int)"
        );
    }

    #[test]
    fn test_missing_table_block() {
        let block = missing_table_block("orders", "shop_staging", "shop_eu", "CREATE TABLE `orders` (`id` int)");
        assert_eq!(
            block,
            "-- Command to create missing table `orders`\n\
             -- From database: `shop_staging` → To database: `shop_eu`\n\
             CREATE TABLE `shop_eu`.`orders` (`id` int);"
        );
    }
}
