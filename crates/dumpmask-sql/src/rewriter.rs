//! Per-line statement classification and masking.

use std::sync::Arc;

use sqlparser::ast::{Expr, Statement, UnaryOperator, Value};

use crate::error::MaskError;
use crate::escape;
use crate::parser::{insert_column_names, insert_rows_mut, insert_table_name, StatementParser};
use crate::rules::MaskingRules;
use crate::template::{CompiledTemplate, TemplateValue};

/// What the rewriter decided for one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewritten {
    /// Nothing is written for this line.
    Dropped,
    /// The original line is written back byte for byte.
    PassThrough,
    /// The statement was masked; this is its new text, terminator included.
    Masked(String),
}

/// Output for one raw input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOutput {
    /// Bytes to write, without the line terminator. `None` drops the line.
    pub bytes: Option<Vec<u8>>,
    /// Whether masking templates were applied.
    pub masked: bool,
}

/// Masks `INSERT` statements according to a compiled rule set.
#[derive(Clone)]
pub struct Rewriter {
    rules: Arc<MaskingRules>,
    parser: StatementParser,
}

impl Rewriter {
    pub fn new(rules: Arc<MaskingRules>) -> Self {
        Self {
            rules,
            parser: StatementParser::new(),
        }
    }

    /// Rewrite one line of text.
    ///
    /// Lines that are not `INSERT` statements, that fail to parse, or that
    /// target a table without rules are passed through untouched. Only a
    /// hashing failure is an error.
    pub fn rewrite(&self, line: &str) -> Result<Rewritten, MaskError> {
        if line.is_empty() {
            return Ok(Rewritten::Dropped);
        }

        let statement = line.trim_end();
        if !is_insert_candidate(statement) {
            return Ok(Rewritten::PassThrough);
        }
        let sql = statement.strip_suffix(';').unwrap_or(statement);

        let mut insert = match self.parser.parse_insert(sql) {
            Ok(insert) => insert,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unparsable INSERT; line passed through");
                return Ok(Rewritten::PassThrough);
            }
        };

        let Some(table_name) = insert_table_name(&insert).map(str::to_string) else {
            tracing::warn!("INSERT target is not a plain table name; line passed through");
            return Ok(Rewritten::PassThrough);
        };

        let Some(table_rules) = self.rules.table(&table_name) else {
            tracing::debug!(table = %table_name, "No masking rules for table");
            return Ok(Rewritten::PassThrough);
        };

        let columns: Vec<String> = insert_column_names(&insert)
            .into_iter()
            .map(str::to_string)
            .collect();
        if columns.is_empty() {
            tracing::warn!(
                table = %table_name,
                "INSERT has no column list; columns cannot be matched, line passed through"
            );
            return Ok(Rewritten::PassThrough);
        }

        let templates: Vec<Option<&CompiledTemplate>> =
            columns.iter().map(|c| table_rules.column(c)).collect();

        let Some(rows) = insert_rows_mut(&mut insert) else {
            tracing::warn!(
                table = %table_name,
                "INSERT source is not a VALUES list; line passed through"
            );
            return Ok(Rewritten::PassThrough);
        };

        let row_count = rows.len();
        let mut masked_cells = 0usize;
        for (row_index, row) in rows.iter_mut().enumerate() {
            for (column_index, cell) in row.iter_mut().enumerate() {
                // Cells past the column list have no name and are left alone.
                let Some(Some(template)) = templates.get(column_index) else {
                    continue;
                };

                match classify(cell) {
                    Cell::Literal { kind, payload } => {
                        match self.render(template, kind, payload)? {
                            Some(masked) => {
                                *payload = masked;
                                masked_cells += 1;
                            }
                            None => tracing::warn!(
                                table = %table_name,
                                column = %columns[column_index],
                                row = row_index,
                                "Masked column holds a malformed hex literal; value left unchanged"
                            ),
                        }
                    }
                    Cell::Keyword => {}
                    Cell::NonLiteral => {
                        tracing::warn!(
                            table = %table_name,
                            column = %columns[column_index],
                            row = row_index,
                            "Masked column holds a non-literal expression; value left unchanged"
                        );
                    }
                }
            }
        }

        tracing::debug!(
            table = %table_name,
            rows = row_count,
            cells = masked_cells,
            "Masked INSERT"
        );

        let mut out = Statement::Insert(insert).to_string();
        out.push(';');
        Ok(Rewritten::Masked(out))
    }

    /// Convenience form of [`rewrite`](Self::rewrite) returning the output
    /// text, or `None` when the line is dropped.
    pub fn rewrite_line(&self, line: &str) -> Result<Option<String>, MaskError> {
        Ok(match self.rewrite(line)? {
            Rewritten::Dropped => None,
            Rewritten::PassThrough => Some(line.to_string()),
            Rewritten::Masked(text) => Some(text),
        })
    }

    /// Rewrite one raw line. Lines that are not valid UTF-8 are passed
    /// through unchanged.
    pub fn rewrite_bytes(&self, line: Vec<u8>) -> Result<LineOutput, MaskError> {
        let rewritten = match std::str::from_utf8(&line) {
            Ok(text) => self.rewrite(text)?,
            Err(e) => {
                tracing::debug!(error = %e, "Line is not valid UTF-8; passed through");
                Rewritten::PassThrough
            }
        };

        Ok(match rewritten {
            Rewritten::Dropped => LineOutput {
                bytes: None,
                masked: false,
            },
            Rewritten::PassThrough => LineOutput {
                bytes: Some(line),
                masked: false,
            },
            Rewritten::Masked(text) => LineOutput {
                bytes: Some(text.into_bytes()),
                masked: true,
            },
        })
    }

    /// New payload for a literal cell, encoded the way its kind requires.
    /// `None` when the payload cannot be decoded.
    fn render(
        &self,
        template: &CompiledTemplate,
        kind: LiteralKind,
        payload: &str,
    ) -> Result<Option<String>, MaskError> {
        let cost = self.rules.cost();
        match kind {
            LiteralKind::Quoted(quote) => {
                let value = escape::unescape(payload, quote);
                let rendered = template.render(&TemplateValue::new(&value, cost))?;
                Ok(Some(escape::escape(&rendered)))
            }
            LiteralKind::Hex => {
                let Some(bytes) = escape::decode_hex(payload) else {
                    return Ok(None);
                };
                // Binary payloads that are not UTF-8 are masked lossily.
                let value = String::from_utf8_lossy(&bytes);
                let rendered = template.render(&TemplateValue::new(&value, cost))?;
                Ok(Some(escape::encode_hex(rendered.as_bytes())))
            }
            LiteralKind::Number => {
                Ok(Some(template.render(&TemplateValue::new(payload, cost))?))
            }
        }
    }
}

/// A line is a masking candidate when it starts with the `INSERT` keyword,
/// in any letter case, followed by whitespace.
pub fn is_insert_candidate(line: &str) -> bool {
    const KEYWORD: &str = "INSERT";
    match line.get(..KEYWORD.len()) {
        Some(head) if head.eq_ignore_ascii_case(KEYWORD) => line[KEYWORD.len()..]
            .chars()
            .next()
            .is_some_and(char::is_whitespace),
        _ => false,
    }
}

/// How a literal's payload is encoded inside the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiteralKind {
    /// Quoted string with MySQL escapes; carries the delimiter.
    Quoted(char),
    Number,
    /// Hex digits of `X'...'` or `0x...`; templates see the decoded bytes.
    Hex,
}

/// A `VALUES` cell as seen by the substitution loop.
///
/// The payload is borrowed from the parsed value, so replacing it keeps the
/// literal's variant and the serializer quotes the new text the same way.
enum Cell<'a> {
    Literal {
        kind: LiteralKind,
        payload: &'a mut String,
    },
    /// `NULL`, `TRUE`, `FALSE`: nothing to mask.
    Keyword,
    /// Function calls, sub-expressions, placeholders, ...
    NonLiteral,
}

fn classify(expr: &mut Expr) -> Cell<'_> {
    fold_negative_number(expr);

    match expr {
        Expr::Value(value) => classify_value(&mut value.value),
        // Charset introducer (`_binary '...'`, `_utf8mb4 0x...`): the literal
        // is masked and the introducer kept.
        Expr::Prefixed { prefix, value } if prefix.value.starts_with('_') => {
            match value.as_mut() {
                Expr::Value(value) => classify_value(&mut value.value),
                _ => Cell::NonLiteral,
            }
        }
        _ => Cell::NonLiteral,
    }
}

fn classify_value(value: &mut Value) -> Cell<'_> {
    match value {
        Value::SingleQuotedString(s) | Value::NationalStringLiteral(s) => Cell::Literal {
            kind: LiteralKind::Quoted('\''),
            payload: s,
        },
        Value::DoubleQuotedString(s) => Cell::Literal {
            kind: LiteralKind::Quoted('"'),
            payload: s,
        },
        Value::Number(n, _) => Cell::Literal {
            kind: LiteralKind::Number,
            payload: n,
        },
        Value::HexStringLiteral(h) => Cell::Literal {
            kind: LiteralKind::Hex,
            payload: h,
        },
        Value::Null | Value::Boolean(_) => Cell::Keyword,
        _ => Cell::NonLiteral,
    }
}

/// `-5` parses as a unary minus over `5`; fold it into one number literal so
/// the sign is part of the masked value.
fn fold_negative_number(expr: &mut Expr) {
    let folded = match expr {
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: inner,
        } => match inner.as_ref() {
            Expr::Value(v) => match &v.value {
                Value::Number(n, long) => {
                    let mut v = v.clone();
                    v.value = Value::Number(format!("-{}", n), *long);
                    Some(Expr::Value(v))
                }
                _ => None,
            },
            _ => None,
        },
        _ => None,
    };

    if let Some(folded) = folded {
        *expr = folded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dumpmask_core::{MaskRulesFile, MaskSettings};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn rewriter(entries: &[(&str, &str, &str)]) -> Rewriter {
        let mut tables: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for (table, column, source) in entries {
            tables
                .entry(table.to_string())
                .or_default()
                .insert(column.to_string(), source.to_string());
        }
        let rules = MaskingRules::compile(
            &MaskRulesFile::from_tables(tables),
            &MaskSettings::default().with_cost(4),
        )
        .unwrap();
        Rewriter::new(Arc::new(rules))
    }

    fn email_rewriter() -> Rewriter {
        rewriter(&[("users", "email", "{{ .First 3 }}***")])
    }

    fn masked(r: Rewritten) -> String {
        match r {
            Rewritten::Masked(text) => text,
            other => panic!("expected masked output, got {:?}", other),
        }
    }

    #[test]
    fn masks_configured_column() {
        let out = email_rewriter()
            .rewrite_line("INSERT INTO users (id, email) VALUES (1, 'alice@example.com');")
            .unwrap();
        assert_eq!(
            out.as_deref(),
            Some("INSERT INTO users (id, email) VALUES (1, 'ali***');")
        );
    }

    #[test]
    fn masks_every_row() {
        let out = masked(
            email_rewriter()
                .rewrite(
                    "INSERT INTO users (id, email) VALUES (1, 'alice@example.com'), (2, 'bob@example.com');",
                )
                .unwrap(),
        );
        assert_eq!(
            out,
            "INSERT INTO users (id, email) VALUES (1, 'ali***'), (2, 'bob***');"
        );
    }

    #[test]
    fn unmasked_table_is_byte_identical() {
        let line = "INSERT INTO orders (id, total) VALUES (1, 99.90);";
        assert_eq!(email_rewriter().rewrite(line).unwrap(), Rewritten::PassThrough);
        assert_eq!(
            email_rewriter().rewrite_line(line).unwrap().as_deref(),
            Some(line)
        );
    }

    #[test]
    fn non_insert_lines_pass_through() {
        let r = email_rewriter();
        for line in [
            "-- dump comment",
            "/*!40101 SET NAMES utf8mb4 */;",
            "CREATE TABLE users (id INT);",
            "LOCK TABLES `users` WRITE;",
            "INSERTED INTO users VALUES (1);",
            "  INSERT INTO users (id, email) VALUES (1, 'x');",
        ] {
            assert_eq!(r.rewrite(line).unwrap(), Rewritten::PassThrough, "{line}");
        }
    }

    #[test]
    fn empty_line_is_dropped() {
        assert_eq!(email_rewriter().rewrite("").unwrap(), Rewritten::Dropped);
        assert_eq!(email_rewriter().rewrite_line("").unwrap(), None);
    }

    #[test]
    fn keyword_case_is_ignored() {
        let out = masked(
            email_rewriter()
                .rewrite("insert into users (id, email) values (7, 'carol@example.com');")
                .unwrap(),
        );
        assert_eq!(out, "INSERT INTO users (id, email) VALUES (7, 'car***');");
    }

    #[test]
    fn trailing_whitespace_and_missing_terminator() {
        let r = email_rewriter();
        let with_ws = masked(
            r.rewrite("INSERT INTO users (id, email) VALUES (1, 'alice@x');   ")
                .unwrap(),
        );
        let without = masked(
            r.rewrite("INSERT INTO users (id, email) VALUES (1, 'alice@x')")
                .unwrap(),
        );
        assert_eq!(with_ws, without);
        assert!(with_ws.ends_with(';'));
    }

    #[test]
    fn malformed_insert_passes_through() {
        assert_eq!(
            email_rewriter()
                .rewrite("INSERT INTO users (id, email) VALUES (1, 'oops';")
                .unwrap(),
            Rewritten::PassThrough
        );
    }

    #[test]
    fn multiple_statements_on_one_line_pass_through() {
        assert_eq!(
            email_rewriter()
                .rewrite("INSERT INTO users (id, email) VALUES (1, 'a'); INSERT INTO users (id, email) VALUES (2, 'b');")
                .unwrap(),
            Rewritten::PassThrough
        );
    }

    #[test]
    fn missing_column_list_passes_through() {
        assert_eq!(
            email_rewriter()
                .rewrite("INSERT INTO `users` VALUES (1,'alice@example.com');")
                .unwrap(),
            Rewritten::PassThrough
        );
    }

    #[test]
    fn only_configured_columns_change() {
        let r = rewriter(&[("users", "email", "{{ .Last 4 }}")]);
        let out = masked(
            r.rewrite("INSERT INTO users (id, name, email) VALUES (1, 'Alice', 'alice@example.com');")
                .unwrap(),
        );
        assert_eq!(
            out,
            "INSERT INTO users (id, name, email) VALUES (1, 'Alice', '.com');"
        );
    }

    #[test]
    fn null_and_expressions_are_left_alone() {
        let r = email_rewriter();
        let out = masked(
            r.rewrite("INSERT INTO users (id, email) VALUES (1, NULL), (2, CONCAT('a', 'b'));")
                .unwrap(),
        );
        assert_eq!(
            out,
            "INSERT INTO users (id, email) VALUES (1, NULL), (2, CONCAT('a', 'b'));"
        );
    }

    #[test]
    fn numbers_keep_their_literal_kind() {
        let r = rewriter(&[("cards", "pin", "{{ .First 2 }}00")]);
        let out = masked(
            r.rewrite("INSERT INTO cards (id, pin) VALUES (1, 4821), (2, -37);")
                .unwrap(),
        );
        assert_eq!(
            out,
            "INSERT INTO cards (id, pin) VALUES (1, 4800), (2, -300);"
        );
    }

    #[test]
    fn escaped_quotes_are_unescaped_for_templates() {
        let r = rewriter(&[("people", "surname", "{{ .First 2 }}")]);
        let out = masked(
            r.rewrite(r"INSERT INTO people (id, surname, note) VALUES (1, 'O\'Brien', 'it\'s kept');")
                .unwrap(),
        );
        assert_eq!(
            out,
            r"INSERT INTO people (id, surname, note) VALUES (1, 'O\'', 'it\'s kept');"
        );
    }

    #[test]
    fn backticked_identifiers_are_matched() {
        let out = masked(
            email_rewriter()
                .rewrite("INSERT INTO `users` (`id`, `email`) VALUES (1,'dave@example.com');")
                .unwrap(),
        );
        assert_eq!(
            out,
            "INSERT INTO `users` (`id`, `email`) VALUES (1, 'dav***');"
        );
    }

    #[test]
    fn hashed_output_differs_and_verifies() {
        let r = rewriter(&[("users", "password", "{{ .Hashed }}")]);
        let line = "INSERT INTO users (id, password) VALUES (1, 'hunter2');";

        let first = masked(r.rewrite(line).unwrap());
        let second = masked(r.rewrite(line).unwrap());
        assert_ne!(first, second);

        for out in [&first, &second] {
            let start = out.find("'").unwrap() + 1;
            let end = out.rfind("'").unwrap();
            assert!(bcrypt::verify("hunter2", &out[start..end]).unwrap());
        }
    }

    #[test]
    fn invalid_utf8_passes_through() {
        let line = vec![b'I', b'N', 0xff, 0xfe];
        let out = email_rewriter().rewrite_bytes(line.clone()).unwrap();
        assert_eq!(
            out,
            LineOutput {
                bytes: Some(line),
                masked: false
            }
        );
    }

    #[test]
    fn candidate_detection() {
        assert!(is_insert_candidate("INSERT INTO t VALUES (1)"));
        assert!(is_insert_candidate("insert\tinto t values (1)"));
        assert!(is_insert_candidate("InSeRt INTO t VALUES (1)"));
        assert!(!is_insert_candidate("INSERT"));
        assert!(!is_insert_candidate("INSERTX INTO t"));
        assert!(!is_insert_candidate("REPLACE INTO t VALUES (1)"));
        assert!(!is_insert_candidate("é"));
    }

    #[test]
    fn charset_introduced_strings_are_masked() {
        let r = rewriter(&[("t", "m", "{{ .First 3 }}")]);
        let out = masked(
            r.rewrite("INSERT INTO t (id, k, m) VALUES (1, _binary 'zz', _binary 'secret');")
                .unwrap(),
        );
        assert_eq!(
            out,
            "INSERT INTO t (id, k, m) VALUES (1, _binary 'zz', _binary 'sec');"
        );

        let out = masked(
            r.rewrite("INSERT INTO t (id, m) VALUES (1, _binary 0x736563726574);")
                .unwrap(),
        );
        assert_eq!(out, "INSERT INTO t (id, m) VALUES (1, _binary X'736563');");
    }

    #[test]
    fn hex_literals_are_masked_on_their_bytes() {
        let r = rewriter(&[("t", "m", "{{ .First 3 }}")]);
        let out = masked(
            r.rewrite("INSERT INTO t (id, k, m) VALUES (1, 0xABCD, 0x414243444546);")
                .unwrap(),
        );
        assert_eq!(
            out,
            "INSERT INTO t (id, k, m) VALUES (1, X'ABCD', X'414243');"
        );
    }

    #[test]
    fn hashed_hex_literal_stays_valid_hex() {
        let r = rewriter(&[("t", "m", "{{ .Hashed }}")]);
        let out = masked(
            r.rewrite("INSERT INTO t (id, m) VALUES (1, 0x68756E74657232);")
                .unwrap(),
        );

        let start = out.find("X'").unwrap() + 2;
        let end = out.rfind('\'').unwrap();
        let hash = escape::decode_hex(&out[start..end]).unwrap();
        let hash = String::from_utf8(hash).unwrap();
        assert!(bcrypt::verify("hunter2", &hash).unwrap());
    }

    #[test]
    fn odd_length_hex_literal_is_left_alone() {
        let r = rewriter(&[("t", "m", "{{ .First 1 }}")]);
        let out = masked(
            r.rewrite("INSERT INTO t (id, m) VALUES (1, 0xABC);")
                .unwrap(),
        );
        assert_eq!(out, "INSERT INTO t (id, m) VALUES (1, X'ABC');");
    }
}
