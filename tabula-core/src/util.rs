/// Write `values` into `out` through `f`, putting `separator` between the items that produced output.
pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) where
    F: FnMut(&mut String, T),
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v);
    }
}

/// Split `schema.table` into its parts, a name without dot has no schema.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((schema, table)) => (Some(schema.trim()), table.trim()),
        None => (None, name.trim()),
    }
}

/// Shorten long SQL for error messages and logs.
pub fn truncate_long(query: &str) -> String {
    const LIMIT: usize = 497;
    if query.len() <= LIMIT {
        return query.trim_end().to_string();
    }
    let mut end = LIMIT;
    while !query.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", query[..end].trim_end())
}

/// Log the error and hand it back, used at the points where errors are produced.
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {{
        let error = $error;
        log::error!("{:#}", error);
        error
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separated() {
        let mut out = String::from("(");
        separated_by(&mut out, ["a", "", "b"], |out, v| out.push_str(v), ", ");
        assert_eq!(out, "(a, b");
    }

    #[test]
    fn qualified() {
        assert_eq!(split_qualified("blog.posts"), (Some("blog"), "posts"));
        assert_eq!(split_qualified("posts"), (None, "posts"));
    }

    #[test]
    fn truncate() {
        let long = "x".repeat(600);
        let out = truncate_long(&long);
        assert_eq!(out.len(), 500);
        assert!(out.ends_with("..."));
        assert_eq!(truncate_long("SELECT 1\n"), "SELECT 1");
    }
}
