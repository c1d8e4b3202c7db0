use crate::{Literal, Result, SqlWriter, Value};
use regex::Regex;
use std::{fmt, sync::Arc};

const LITERAL_MARK: char = '\u{0}';

/// Quoting surface shared by the adapter and the query builder: a dialect writer plus the auto-quote switch.
#[derive(Clone)]
pub struct Dialect {
    writer: Arc<dyn SqlWriter>,
    auto_quote: bool,
    literals: Arc<Regex>,
    splitters: Arc<Regex>,
    identifier: Arc<Regex>,
    skipped: Arc<Regex>,
}

impl fmt::Debug for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialect")
            .field("quote_symbol", &self.writer.quote_symbol())
            .field("auto_quote", &self.auto_quote)
            .finish()
    }
}

impl Dialect {
    pub fn new(writer: Arc<dyn SqlWriter>, auto_quote: bool) -> Result<Self> {
        let operators = writer
            .operator_splitters()
            .iter()
            .map(|v| regex::escape(v))
            .collect::<Vec<_>>()
            .join("|");
        let splitters = Regex::new(&format!(r"(?i)\s*,\s*|\s+(?:{})\s+", operators))?;
        Ok(Self {
            writer,
            auto_quote,
            literals: Regex::new(r"'(?:[^']|'')*'")?.into(),
            splitters: splitters.into(),
            identifier: Regex::new(
                r"^[\p{L}_][\p{L}\p{N}_$]*(?:\s*\.\s*(?:[\p{L}_][\p{L}\p{N}_$]*|\*))*$",
            )?
            .into(),
            skipped: Regex::new(r"^(?:[-+]?\d+(?:\.\d+)?|\?|\$\d+|:[\p{L}_][\p{L}\p{N}_]*)$")?
                .into(),
        })
    }

    pub fn writer(&self) -> &dyn SqlWriter {
        self.writer.as_dyn()
    }

    pub fn auto_quote(&self) -> bool {
        self.auto_quote
    }

    /// Quote an identifier expression: dotted names, allow-listed function calls, operator separated terms.
    pub fn quote_identifier(&self, identifier: &str) -> String {
        let mut literals = Vec::new();
        let protected = self.literals.replace_all(identifier, |c: &regex::Captures| {
            literals.push(c[0].to_string());
            format!("{LITERAL_MARK}{}{LITERAL_MARK}", literals.len() - 1)
        });
        let mut out = String::with_capacity(identifier.len() + 8);
        self.write_expression(&mut out, &protected);
        for (i, literal) in literals.iter().enumerate() {
            out = out.replace(&format!("{LITERAL_MARK}{i}{LITERAL_MARK}"), literal);
        }
        out
    }

    /// Same as [`Dialect::quote_identifier`], followed by ` AS alias` unless the alias repeats the last segment.
    pub fn quote_identifier_as(&self, identifier: &str, alias: Option<&str>) -> String {
        let mut out = self.quote_identifier(identifier);
        if let Some(alias) = alias.map(str::trim).filter(|v| !v.is_empty()) {
            let last = identifier.rsplit('.').next().unwrap_or_default().trim();
            if self.unquoted(last) != alias {
                out.push_str(" AS ");
                self.write_segment(&mut out, alias);
            }
        }
        out
    }

    pub fn quote_table_as(&self, table: &str, alias: Option<&str>, schema: Option<&str>) -> String {
        match schema.map(str::trim).filter(|v| !v.is_empty()) {
            Some(schema) => self.quote_identifier_as(&format!("{}.{}", schema, table), alias),
            None => self.quote_identifier_as(table, alias),
        }
    }

    pub fn quote_column_as(&self, column: &str, alias: Option<&str>) -> String {
        self.quote_identifier_as(column, alias)
    }

    pub fn quote_value(&self, value: &Value) -> String {
        let mut out = String::new();
        self.writer.write_value(&mut out, value);
        out
    }

    /// Render a literal for inline use in SQL text.
    pub fn quote(&self, literal: &Literal) -> String {
        match literal {
            Literal::Expression(v) => v.0.clone(),
            Literal::Scalar(v) => self.quote_value(v),
            Literal::Text(v) => {
                let mut out = String::new();
                self.writer.write_value_string(&mut out, v);
                out
            }
            Literal::Select(v) => format!("({})", v.inline()),
        }
    }

    /// Substitute the quoted `value` for the `?` markers of `text`, only the first `count` when given.
    pub fn quote_into(&self, text: &str, value: &Literal, count: Option<usize>) -> String {
        let quoted = self.quote(value);
        let mut out = String::with_capacity(text.len() + quoted.len());
        let mut remaining = count.unwrap_or(usize::MAX);
        let mut position = 0;
        for (i, _) in text.match_indices('?') {
            if remaining == 0 {
                break;
            }
            out.push_str(&text[position..i]);
            out.push_str(&quoted);
            position = i + 1;
            remaining -= 1;
        }
        out.push_str(&text[position..]);
        out
    }

    /// Rewrite every `?` marker outside quoted literals and identifiers with `replace`, called with the 0-based marker index.
    pub fn replace_markers(&self, sql: &str, mut replace: impl FnMut(&mut String, usize)) -> String {
        let symbol = self.writer.quote_symbol();
        let mut out = String::with_capacity(sql.len() + 8);
        let mut quote = None;
        let mut index = 0;
        for c in sql.chars() {
            match quote {
                Some(open) => {
                    if c == open {
                        quote = None;
                    }
                    out.push(c);
                }
                None if c == '\'' || c == symbol => {
                    quote = Some(c);
                    out.push(c);
                }
                None if c == '?' => {
                    replace(&mut out, index);
                    index += 1;
                }
                None => out.push(c),
            }
        }
        out
    }

    /// `?` markers written as the dialect's placeholders, numbered from 1.
    pub fn number_placeholders(&self, sql: &str) -> String {
        self.replace_markers(sql, |out, i| self.writer.write_placeholder(out, i + 1))
    }

    pub fn limit(&self, sql: &mut String, count: Option<u64>, offset: Option<u64>) {
        self.writer.write_limit(sql, count, offset);
    }

    fn write_expression(&self, out: &mut String, text: &str) {
        let text = text.trim();
        if let Some((name, inner)) = self.wrapping_call(text) {
            out.push_str(name);
            out.push('(');
            self.write_expression(out, inner);
            out.push(')');
            return;
        }
        if !self.splitters.is_match(text) {
            self.write_segments(out, text);
            return;
        }
        let mut position = 0;
        for found in self.splitters.find_iter(text) {
            self.write_term(out, &text[position..found.start()]);
            out.push_str(found.as_str());
            position = found.end();
        }
        self.write_term(out, &text[position..]);
    }

    fn write_term(&self, out: &mut String, term: &str) {
        let trimmed = term.trim();
        if self.wrapping_call(trimmed).is_some() {
            self.write_expression(out, trimmed);
        } else if self.is_skipped(trimmed) || !self.identifier.is_match(trimmed) {
            out.push_str(trimmed);
        } else {
            self.write_segments(out, trimmed);
        }
    }

    fn write_segments(&self, out: &mut String, text: &str) {
        let mut first = true;
        for segment in text.split('.') {
            if !first {
                out.push('.');
            }
            first = false;
            let segment = segment.trim();
            if segment == "*" || self.is_quoted(segment) || segment.contains(LITERAL_MARK) {
                out.push_str(segment);
            } else {
                self.write_segment(out, segment);
            }
        }
    }

    fn write_segment(&self, out: &mut String, segment: &str) {
        if self.auto_quote {
            self.writer.write_identifier_quoted(out, segment);
        } else {
            out.push_str(segment);
        }
    }

    fn is_quoted(&self, segment: &str) -> bool {
        let symbol = self.writer.quote_symbol();
        segment.len() >= 2 && segment.starts_with(symbol) && segment.ends_with(symbol)
    }

    fn unquoted<'a>(&self, segment: &'a str) -> &'a str {
        if self.is_quoted(segment) {
            let symbol = self.writer.quote_symbol().len_utf8();
            &segment[symbol..segment.len() - symbol]
        } else {
            segment
        }
    }

    fn is_skipped(&self, term: &str) -> bool {
        term.is_empty()
            || term.contains(LITERAL_MARK)
            || self.is_quoted(term)
            || self.skipped.is_match(term)
            || self
                .writer
                .unquoteable_tokens()
                .iter()
                .any(|v| v.eq_ignore_ascii_case(term))
    }

    /// `NAME(inner)` where the parenthesis opened after `NAME` closes at the very end and `NAME` is allow-listed.
    fn wrapping_call<'a>(&self, text: &'a str) -> Option<(&'a str, &'a str)> {
        let open = text.find('(')?;
        let name = text[..open].trim_end();
        if name.is_empty()
            || !name.chars().all(|c| c.is_alphanumeric() || c == '_')
            || !self
                .writer
                .bare_functions()
                .iter()
                .any(|v| v.eq_ignore_ascii_case(name))
        {
            return None;
        }
        let mut depth = 0usize;
        for (i, c) in text[open..].char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return (open + i == text.len() - 1).then(|| (name, &text[open + 1..open + i]));
                    }
                }
                _ => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Expr, GenericSqlWriter};

    fn dialect() -> Dialect {
        Dialect::new(Arc::new(GenericSqlWriter {}), true).unwrap()
    }

    #[test]
    fn dotted() {
        let d = dialect();
        assert_eq!(d.quote_identifier("users.id"), r#""users"."id""#);
        assert_eq!(d.quote_identifier("  users .  id "), r#""users"."id""#);
        assert_eq!(d.quote_identifier(r#""users"."id""#), r#""users"."id""#);
        assert_eq!(d.quote_identifier("u.*"), r#""u".*"#);
        assert_eq!(d.quote_identifier("*"), "*");
    }

    #[test]
    fn expressions() {
        let d = dialect();
        assert_eq!(d.quote_identifier("LOWER(u.name)"), r#"LOWER("u"."name")"#);
        assert_eq!(
            d.quote_identifier("price * 2 + tax"),
            r#""price" * 2 + "tax""#
        );
        assert_eq!(
            d.quote_identifier("first || ' - ' || last"),
            r#""first" || ' - ' || "last""#
        );
        assert_eq!(
            d.quote_identifier("COALESCE(nick, 'a.b')"),
            r#"COALESCE("nick", 'a.b')"#
        );
        assert_eq!(d.quote_identifier("amount = ?"), r#""amount" = ?"#);
        assert_eq!(d.quote_identifier("my column"), r#""my column""#);
    }

    #[test]
    fn aliases() {
        let d = dialect();
        assert_eq!(
            d.quote_identifier_as("u.name", Some("name")),
            r#""u"."name""#
        );
        assert_eq!(
            d.quote_identifier_as("u.name", Some("author")),
            r#""u"."name" AS "author""#
        );
        assert_eq!(
            d.quote_table_as("posts", Some("p"), Some("blog")),
            r#""blog"."posts" AS "p""#
        );
    }

    #[test]
    fn without_auto_quote() {
        let d = Dialect::new(Arc::new(GenericSqlWriter {}), false).unwrap();
        assert_eq!(d.quote_identifier(" users . id "), "users.id");
        assert_eq!(d.quote_identifier_as("id", Some("key")), "id AS key");
    }

    #[test]
    fn values_into_text() {
        let d = dialect();
        assert_eq!(
            d.quote_into("name = ? OR nick = ?", &"O'Hara".into(), None),
            "name = 'O''Hara' OR nick = 'O''Hara'"
        );
        assert_eq!(d.quote_into("a = ? AND b = ?", &7.into(), Some(1)), "a = 7 AND b = ?");
        assert_eq!(d.quote(&Expr::new("NOW()").into()), "NOW()");
        assert_eq!(d.quote(&Literal::Text("42".into())), "'42'");
    }

    #[test]
    fn markers_outside_quotes() {
        let d = dialect();
        let sql = r#"SELECT "a?" FROM t WHERE b = 'why?' AND c = ? AND d = 'it''s ?' AND e = ?"#;
        let mut seen = Vec::new();
        let out = d.replace_markers(sql, |out, i| {
            seen.push(i);
            out.push_str(&format!(":p{}", i));
        });
        assert_eq!(
            out,
            r#"SELECT "a?" FROM t WHERE b = 'why?' AND c = :p0 AND d = 'it''s ?' AND e = :p1"#
        );
        assert_eq!(seen, [0, 1]);
        assert_eq!(d.number_placeholders("a = ? OR b = ?"), "a = ? OR b = ?");
    }
}
