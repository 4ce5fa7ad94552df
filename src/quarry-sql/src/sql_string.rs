//! Low-level SQL text accumulation.

use common_config::SqlSettings;

/// SQL text under construction.
#[derive(Debug, Clone)]
pub struct SqlWriter {
    settings: SqlSettings,
    sql: String,
}

impl SqlWriter {
    pub fn new(settings: SqlSettings) -> Self {
        Self {
            settings,
            sql: String::new(),
        }
    }

    /// Append keywords, operators and punctuation verbatim.
    pub fn append_syntax(&mut self, syntax: &str) {
        self.sql.push_str(syntax);
    }

    /// Append an identifier wrapped in the configured quote character,
    /// doubling embedded quote characters.
    pub fn append_identifier(&mut self, identifier: &str) {
        let quote = self.settings.identifier_quote;
        self.sql.push(quote);
        for c in identifier.chars() {
            if c == quote {
                self.sql.push(quote);
            }
            self.sql.push(c);
        }
        self.sql.push(quote);
    }

    /// Append a string literal, doubling embedded single quotes.
    pub fn append_string_literal(&mut self, value: &str) {
        self.sql.push('\'');
        self.sql.push_str(&value.replace('\'', "''"));
        self.sql.push('\'');
    }

    /// Clause separator: a new line in pretty mode, a space otherwise.
    pub fn append_clause_break(&mut self) {
        if self.settings.pretty {
            self.sql.push('\n');
        } else {
            self.sql.push(' ');
        }
    }

    pub fn into_string(self) -> String {
        self.sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_quoting() {
        let mut sql = SqlWriter::new(SqlSettings::default());
        sql.append_identifier("a\"b");
        assert_eq!(sql.into_string(), "\"a\"\"b\"");

        let settings = SqlSettings {
            identifier_quote: '`',
            pretty: false,
        };
        let mut sql = SqlWriter::new(settings);
        sql.append_identifier("col1");
        assert_eq!(sql.into_string(), "`col1`");
    }

    #[test]
    fn test_string_literal_escaping() {
        let mut sql = SqlWriter::new(SqlSettings::default());
        sql.append_string_literal("it's");
        assert_eq!(sql.into_string(), "'it''s'");
    }

    #[test]
    fn test_clause_break() {
        let mut compact = SqlWriter::new(SqlSettings::default());
        compact.append_syntax("SELECT 1");
        compact.append_clause_break();
        compact.append_syntax("WHERE TRUE");
        assert_eq!(compact.into_string(), "SELECT 1 WHERE TRUE");

        let mut pretty = SqlWriter::new(SqlSettings {
            identifier_quote: '"',
            pretty: true,
        });
        pretty.append_syntax("SELECT 1");
        pretty.append_clause_break();
        pretty.append_syntax("WHERE TRUE");
        assert_eq!(pretty.into_string(), "SELECT 1\nWHERE TRUE");
    }
}
