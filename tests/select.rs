#[cfg(test)]
mod tests {
    use indoc::indoc;
    use std::sync::Arc;
    use tabula::{
        Dialect, Expr, GenericSqlWriter, Part, Select, Source, SqlWriter, UnionType, Value,
    };

    #[derive(Default)]
    struct BacktickWriter;

    impl SqlWriter for BacktickWriter {
        fn as_dyn(&self) -> &dyn SqlWriter {
            self
        }

        fn quote_symbol(&self) -> char {
            '`'
        }
    }

    fn dialects() -> [Dialect; 2] {
        [
            Dialect::new(Arc::new(GenericSqlWriter {}), true).unwrap(),
            Dialect::new(Arc::new(BacktickWriter), true).unwrap(),
        ]
    }

    #[test]
    fn dotted_identifiers_are_stable() {
        for dialect in dialects() {
            let q = dialect.writer().quote_symbol();
            let expected = format!("{q}sales{q}.{q}orders{q}");
            assert_eq!(dialect.quote_identifier("sales.orders"), expected);
            assert_eq!(dialect.quote_identifier(" sales .  orders "), expected);
            assert_eq!(dialect.quote_identifier(&expected), expected);
        }
    }

    #[test]
    fn assemble_is_pure() {
        for dialect in dialects() {
            let select = Select::new(dialect)
                .from(Source::aliased("orders", "o"), &["id", "total AS amount"])
                .join_left("customers", "customers.id = o.customer_id", &["name"])
                .where_value("o.total > ?", 100)
                .group(&["o.id", "customers.name"])
                .order(&["amount DESC"])
                .limit(Some(10), None);
            let first = select.assemble();
            assert_eq!(first, select.assemble());
            assert_eq!(first, select.clone().assemble());
        }
    }

    #[test]
    fn wheres_are_parenthesized_in_call_order() {
        let conditions = ["a = 1", "b > 2 OR b < 0", "c IS NULL", "d <> 'x'"];
        for n in 1..=conditions.len() {
            let select = conditions[..n]
                .iter()
                .fold(Select::new(dialects()[0].clone()).from("t", &[]), |s, c| {
                    s.where_(c)
                });
            let expected = conditions[..n]
                .iter()
                .map(|c| format!("({})", c))
                .collect::<Vec<_>>()
                .join(" AND ");
            assert_eq!(select.get_part(Part::Where), format!("WHERE {}", expected));
        }
    }

    #[test]
    fn complete_statement() {
        let [dialect, _] = dialects();
        let recent = Select::new(dialect.clone())
            .from("orders", &["customer_id"])
            .where_("created > NOW() - INTERVAL '7 days'");
        let select = Select::new(dialect)
            .distinct(true)
            .from("customers", &["id", "name"])
            .join_inner(recent, "t.customer_id = customers.id", &[])
            .column_expr(Expr::new("COUNT(*)"), Some("orders"))
            .where_value("customers.country = ?", "IT")
            .or_where("customers.vip = 1")
            .group(&["customers.id", "customers.name"])
            .having("COUNT(*) > 2")
            .order(&["orders DESC", "LOWER(customers.name)"])
            .limit_page(2, 25);
        assert_eq!(
            select.assemble(),
            indoc! {r#"
                SELECT DISTINCT "customers"."id", "customers"."name", COUNT(*) AS "orders" FROM "customers" INNER JOIN (SELECT "orders"."customer_id" FROM "orders" WHERE (created > NOW() - INTERVAL '7 days')) AS "t" ON t.customer_id = customers.id WHERE (customers.country = 'IT') OR (customers.vip = 1) GROUP BY "customers"."id", "customers"."name" HAVING (COUNT(*) > 2) ORDER BY "orders" DESC, LOWER(customers.name) ASC LIMIT 25 OFFSET 25
            "#}
            .trim()
        );
    }

    #[test]
    fn union_with_join_is_queued() {
        let [dialect, _] = dialects();
        let mut select = Select::new(dialect.clone())
            .from("a", &[])
            .join_inner("b", "a.id = b.id", &[])
            .union([Select::new(dialect).from("c", &[])], UnionType::Distinct);
        assert!(select.has_errors());
        assert!(select.err().is_some());
        assert!(!select.has_errors());
    }

    #[test]
    fn binds_follow_placeholder_order() {
        let [dialect, _] = dialects();
        let select = Select::new(dialect)
            .from("t", &[])
            .where_("a = ?")
            .bind("first")
            .having("SUM(b) > ?")
            .bind(2)
            .where_("c = ?")
            .bind(Value::Null);
        assert_eq!(
            select.assemble(),
            r#"SELECT * FROM "t" WHERE (a = ?) AND (c = ?) HAVING (SUM(b) > ?)"#
        );
        assert_eq!(
            select.binds(),
            [Value::Text("first".into()), Value::Null, Value::Integer(2)]
        );
    }
}
