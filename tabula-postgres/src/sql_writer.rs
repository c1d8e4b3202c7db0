use tabula_core::{IdentityStrategy, Result, SqlWriter};

#[derive(Default, Debug, Clone, Copy)]
pub struct PostgresSqlWriter {}

impl SqlWriter for PostgresSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn write_placeholder(&self, out: &mut String, index: usize) {
        out.push('$');
        out.push_str(&index.to_string());
    }

    fn identity_strategy(&self) -> IdentityStrategy {
        IdentityStrategy::Returning
    }

    fn write_value_blob(&self, out: &mut String, value: &[u8]) {
        out.push_str("'\\x");
        for byte in value {
            out.push_str(&format!("{:02X}", byte));
        }
        out.push_str("'::bytea");
    }

    fn write_next_sequence_id(&self, out: &mut String, name: &str) -> Result<()> {
        out.push_str("SELECT nextval(");
        self.write_value_string(out, name);
        out.push(')');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_core::Value;

    #[test]
    fn writes() {
        let writer = PostgresSqlWriter {};
        let mut out = String::new();
        writer.write_placeholder(&mut out, 3);
        writer.write_returning(&mut out, "id");
        assert_eq!(out, r#"$3 RETURNING "id""#);
        let mut out = String::new();
        writer.write_value(&mut out, &Value::Blob(vec![0xca, 0xfe]));
        assert_eq!(out, r"'\xCAFE'::bytea");
        let mut out = String::new();
        writer.write_next_sequence_id(&mut out, "public.users_id_seq").unwrap();
        assert_eq!(out, "SELECT nextval('public.users_id_seq')");
    }
}
