use tabula_core::{DbError, Result, SqlWriter};

#[derive(Default, Debug, Clone, Copy)]
pub struct MySqlSqlWriter {}

impl SqlWriter for MySqlSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn quote_symbol(&self) -> char {
        '`'
    }

    fn write_value_string(&self, out: &mut String, value: &str) {
        out.push('\'');
        let mut position = 0;
        for (i, c) in value.char_indices() {
            let replace = match c {
                '\'' => "''",
                '\\' => "\\\\",
                '\0' => "\\0",
                _ => continue,
            };
            out.push_str(&value[position..i]);
            out.push_str(replace);
            position = i + c.len_utf8();
        }
        out.push_str(&value[position..]);
        out.push('\'');
    }

    fn write_value_bool(&self, out: &mut String, value: bool) {
        out.push(['0', '1'][value as usize]);
    }

    fn write_default_values(&self, out: &mut String) {
        out.push_str(" () VALUES ()");
    }

    fn limit_sentinel(&self) -> u64 {
        u64::MAX
    }

    fn write_next_sequence_id(&self, _out: &mut String, name: &str) -> Result<()> {
        Err(DbError::Configuration(format!(
            "MySQL has no sequences, use an AUTO_INCREMENT column instead of `{}`",
            name
        ))
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_core::Value;

    #[test]
    fn quoting() {
        let writer = MySqlSqlWriter {};
        let mut out = String::new();
        writer.write_identifier_quoted(&mut out, "we`ird");
        assert_eq!(out, "`we``ird`");
        let mut out = String::new();
        writer.write_value(&mut out, &Value::Text(r"it's C:\temp".into()));
        assert_eq!(out, r"'it''s C:\\temp'");
        let mut out = String::new();
        writer.write_value(&mut out, &Value::Boolean(true));
        assert_eq!(out, "1");
    }

    #[test]
    fn statements() {
        let writer = MySqlSqlWriter {};
        let mut out = String::new();
        writer.write_limit(&mut out, None, Some(20));
        assert_eq!(out, " LIMIT 18446744073709551615 OFFSET 20");
        assert!(writer.write_next_sequence_id(&mut String::new(), "seq").is_err());
    }
}
