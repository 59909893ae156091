//! MySQL statement text used by the bulk loader
//!
//! All SQL the loader sends is built here so the quoting rules live in one
//! place. Identifiers are backtick-quoted with embedded backticks doubled.

use crate::types::Table;

/// Reads the server-wide `local_infile` permission
pub const LOCAL_INFILE_QUERY: &str = "SELECT @@GLOBAL.local_infile";

/// Enables `LOAD DATA LOCAL INFILE` server-wide
pub const ENABLE_LOCAL_INFILE: &str = "SET GLOBAL local_infile=1";

/// Disables `LOAD DATA LOCAL INFILE` server-wide
pub const DISABLE_LOCAL_INFILE: &str = "SET GLOBAL local_infile=0";

/// Per-transaction preamble; the pooled connection is reset on return
pub const DISABLE_FOREIGN_KEY_CHECKS: &str = "SET foreign_key_checks = 0;";

/// Prefix of the virtual file name handed to `LOAD DATA LOCAL INFILE`
pub const VIRTUAL_FILE_PREFIX: &str = "Reader::";

/// Quote an identifier with backticks
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Reverse [`quote_identifier`]. Returns `None` if `quoted` is not a
/// well-formed backtick-quoted identifier.
pub fn unquote_identifier(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('`')?.strip_suffix('`')?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '`' {
            // a lone backtick would have terminated the identifier
            if chars.next() != Some('`') {
                return None;
            }
        }
        out.push(c);
    }
    Some(out)
}

/// Escape a value for a single-quoted MySQL string literal.
///
/// Doubles `'` and escapes `\`, which MySQL treats as an escape character in
/// the default SQL mode.
pub fn escape_string_literal(value: &str) -> String {
    if !value.contains(['\'', '\\']) {
        return value.to_string();
    }
    value.replace('\\', "\\\\").replace('\'', "''")
}

/// Virtual file identifier for a table's streaming load
pub fn virtual_file_name(table: &str) -> String {
    format!("{}{}", VIRTUAL_FILE_PREFIX, table)
}

/// Build the `LOAD DATA` statement that consumes a table's CSV stream
pub fn load_data_statement(table: &Table) -> String {
    let columns: Vec<_> = table.columns.iter().map(|c| quote_identifier(c)).collect();

    format!(
        "LOAD DATA CONCURRENT LOCAL INFILE '{}' INTO TABLE {} FIELDS TERMINATED BY ',' ENCLOSED BY '\"' ESCAPED BY '\"' ({})",
        escape_string_literal(&virtual_file_name(&table.name)),
        quote_identifier(&table.name),
        columns.join(","),
    )
}

/// Head of the multi-row `replace into` statement.
///
/// The table name is emitted verbatim, the same way row values are.
pub fn replace_statement_prefix(table: &Table) -> String {
    format!("replace into {} values ", table.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "`users`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_unquote_identifier_roundtrip() {
        for name in ["users", "we`ird", "``", "a`b`c", "", "with space"] {
            assert_eq!(unquote_identifier(&quote_identifier(name)).as_deref(), Some(name));
        }
    }

    #[test]
    fn test_unquote_identifier_rejects_malformed() {
        assert!(unquote_identifier("users").is_none());
        assert!(unquote_identifier("`a`b`").is_none());
        assert!(unquote_identifier("`").is_none());
    }

    #[test]
    fn test_escape_string_literal() {
        assert_eq!(escape_string_literal("plain"), "plain");
        assert_eq!(escape_string_literal("o'neil"), "o''neil");
        assert_eq!(escape_string_literal(r"a\b"), r"a\\b");
    }

    #[test]
    fn test_load_data_statement() {
        let table = Table::new("users", vec!["id".into(), "na`me".into()]);
        assert_eq!(
            load_data_statement(&table),
            "LOAD DATA CONCURRENT LOCAL INFILE 'Reader::users' INTO TABLE `users` \
             FIELDS TERMINATED BY ',' ENCLOSED BY '\"' ESCAPED BY '\"' (`id`,`na``me`)"
        );
    }

    #[test]
    fn test_replace_statement_prefix() {
        let table = Table::new("users", vec!["id".into()]);
        assert_eq!(replace_statement_prefix(&table), "replace into users values ");
    }
}
