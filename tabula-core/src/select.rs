use crate::{DbError, Dialect, Error, Expr, Literal, Value, separated_by, split_qualified};
use regex::Regex;
use std::{collections::VecDeque, fmt, str::FromStr, sync::LazyLock};

static COLUMN_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*(.+?)\s+AS\s+(.+?)\s*$").expect("Invalid column alias pattern")
});
static ORDER_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*(.+?)\s+(ASC|DESC)\s*$").expect("Invalid order term pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    From,
    Inner,
    Left,
    Right,
    Full,
    Cross,
    Natural,
}

impl JoinType {
    fn keyword(&self) -> &'static str {
        match self {
            JoinType::From => "FROM",
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
            JoinType::Cross => "CROSS JOIN",
            JoinType::Natural => "NATURAL JOIN",
        }
    }
}

impl FromStr for JoinType {
    type Err = Error;
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.trim().to_ascii_lowercase().as_str() {
            "inner" | "inner join" | "join" => JoinType::Inner,
            "left" | "left join" | "left outer join" => JoinType::Left,
            "right" | "right join" | "right outer join" => JoinType::Right,
            "full" | "full join" | "full outer join" => JoinType::Full,
            "cross" | "cross join" => JoinType::Cross,
            "natural" | "natural join" => JoinType::Natural,
            _ => {
                return Err(DbError::Build(format!("Invalid join type `{}`", value)).into());
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionType {
    Distinct,
    All,
}

/// Individually addressable parts of a [`Select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Distinct,
    Columns,
    From,
    Where,
    Group,
    Having,
    Union,
    Order,
    Limit,
    ForUpdate,
}

/// What a FROM or JOIN entry reads from.
#[derive(Debug, Clone)]
pub enum Source {
    /// Table name, optionally `schema.table`.
    Table(String),
    Aliased { table: String, alias: String },
    Expression(Expr),
    Select(Box<Select>),
}

impl Source {
    pub fn aliased(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Source::Aliased {
            table: table.into(),
            alias: alias.into(),
        }
    }
}

impl From<&str> for Source {
    fn from(value: &str) -> Self {
        Source::Table(value.into())
    }
}
impl From<String> for Source {
    fn from(value: String) -> Self {
        Source::Table(value)
    }
}
impl From<Expr> for Source {
    fn from(value: Expr) -> Self {
        Source::Expression(value)
    }
}
impl From<Select> for Source {
    fn from(value: Select) -> Self {
        Source::Select(value.into())
    }
}

#[derive(Debug, Clone)]
enum Target {
    Table { schema: Option<String>, name: String },
    Expression(Expr),
    Select(Box<Select>),
}

#[derive(Debug, Clone)]
struct FromPart {
    correlation: String,
    join: JoinType,
    target: Target,
    condition: Option<String>,
    binds: Vec<Value>,
}

#[derive(Debug, Clone)]
enum ColumnTerm {
    Name(String),
    Expression(Expr),
    Star,
}

#[derive(Debug, Clone)]
struct ColumnPart {
    correlation: Option<String>,
    term: ColumnTerm,
    alias: Option<String>,
    binds: Vec<Value>,
}

/// Condition already carrying its connective, with the values of its markers.
#[derive(Debug, Clone)]
struct Fragment {
    sql: String,
    binds: Vec<Value>,
}

/// Where the next [`Select::bind`] value goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Column,
    From,
    Where,
    Having,
}

#[derive(Debug, Clone)]
enum UnionPart {
    Select(Box<Select>),
    Expression(Expr),
}

/// Anything that can be combined with [`Select::union`].
pub enum Unionable {
    Select(Select),
    Expression(Expr),
}

impl From<Select> for Unionable {
    fn from(value: Select) -> Self {
        Unionable::Select(value)
    }
}
impl From<Expr> for Unionable {
    fn from(value: Expr) -> Self {
        Unionable::Expression(value)
    }
}
impl From<&str> for Unionable {
    fn from(value: &str) -> Self {
        Unionable::Expression(Expr::new(value))
    }
}

/// Single use SELECT builder.
///
/// Mistakes such as a duplicate correlation name are not returned immediately: they are queued and
/// must be drained with [`Select::err`] before the query runs, which [`crate::Session::query`] does.
///
/// Values given to [`Select::bind`] stay with the fragment they were bound after, so
/// [`Select::binds`] lists them in the order [`Select::assemble`] writes their placeholders.
#[derive(Debug, Clone)]
pub struct Select {
    dialect: Dialect,
    distinct: bool,
    columns: Vec<ColumnPart>,
    from: Vec<FromPart>,
    wheres: Vec<Fragment>,
    group: Vec<String>,
    having: Vec<Fragment>,
    union: Vec<(UnionPart, UnionType)>,
    order: Vec<String>,
    limit: (Option<u64>, Option<u64>),
    for_update: bool,
    bound: Option<Slot>,
    errors: VecDeque<DbError>,
}

impl Select {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            distinct: false,
            columns: Vec::new(),
            from: Vec::new(),
            wheres: Vec::new(),
            group: Vec::new(),
            having: Vec::new(),
            union: Vec::new(),
            order: Vec::new(),
            limit: (None, None),
            for_update: false,
            bound: None,
            errors: VecDeque::new(),
        }
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn distinct(mut self, flag: bool) -> Self {
        self.distinct = flag;
        self
    }

    /// FROM `source`, selecting `columns` from it (use `&["*"]` for every column).
    pub fn from(self, source: impl Into<Source>, columns: &[&str]) -> Self {
        self.join_part(JoinType::From, source.into(), None, columns)
    }

    pub fn join(
        self,
        join: JoinType,
        source: impl Into<Source>,
        condition: &str,
        columns: &[&str],
    ) -> Self {
        self.join_part(join, source.into(), Some(condition), columns)
    }

    pub fn join_inner(self, source: impl Into<Source>, condition: &str, columns: &[&str]) -> Self {
        self.join(JoinType::Inner, source, condition, columns)
    }

    pub fn join_left(self, source: impl Into<Source>, condition: &str, columns: &[&str]) -> Self {
        self.join(JoinType::Left, source, condition, columns)
    }

    pub fn join_right(self, source: impl Into<Source>, condition: &str, columns: &[&str]) -> Self {
        self.join(JoinType::Right, source, condition, columns)
    }

    pub fn join_full(self, source: impl Into<Source>, condition: &str, columns: &[&str]) -> Self {
        self.join(JoinType::Full, source, condition, columns)
    }

    pub fn join_cross(self, source: impl Into<Source>, columns: &[&str]) -> Self {
        self.join_part(JoinType::Cross, source.into(), None, columns)
    }

    pub fn join_natural(self, source: impl Into<Source>, columns: &[&str]) -> Self {
        self.join_part(JoinType::Natural, source.into(), None, columns)
    }

    /// Join with the type given by name (`"left"`, `"inner join"`, ...), an unknown name is queued as an error.
    pub fn join_named(
        mut self,
        join: &str,
        source: impl Into<Source>,
        condition: &str,
        columns: &[&str],
    ) -> Self {
        match join.parse::<JoinType>() {
            Ok(join) => self.join(join, source, condition, columns),
            Err(e) => {
                self.errors.push_back(
                    e.downcast::<DbError>()
                        .unwrap_or_else(|e| DbError::Build(format!("{:#}", e))),
                );
                self
            }
        }
    }

    fn join_part(
        mut self,
        join: JoinType,
        source: Source,
        condition: Option<&str>,
        columns: &[&str],
    ) -> Self {
        if !self.union.is_empty() {
            self.errors
                .push_back(DbError::Build("Cannot mix a set-union with joins".into()));
            return self;
        }
        let (target, explicit, default) = match source {
            Source::Table(table) => {
                let (schema, name) = split_qualified(&table);
                let target = Target::Table {
                    schema: schema.map(Into::into),
                    name: name.into(),
                };
                (target, None, name.to_string())
            }
            Source::Aliased { table, alias } => {
                let (schema, name) = split_qualified(&table);
                let target = Target::Table {
                    schema: schema.map(Into::into),
                    name: name.into(),
                };
                (target, Some(alias), String::new())
            }
            Source::Expression(expr) => (Target::Expression(expr), None, "t".to_string()),
            Source::Select(mut select) => {
                self.errors.extend(select.errors.drain(..));
                (Target::Select(select), None, "t".to_string())
            }
        };
        let correlation = match explicit {
            Some(alias) => {
                if self.has_correlation(&alias) {
                    self.errors.push_back(DbError::Build(format!(
                        "You cannot define a correlation name `{}` more than once",
                        alias
                    )));
                    return self;
                }
                alias
            }
            None => self.unique_correlation(&default),
        };
        let join = if join == JoinType::From && !self.from.is_empty() {
            JoinType::Cross
        } else {
            join
        };
        self.from.push(FromPart {
            correlation: correlation.clone(),
            join,
            target,
            condition: condition.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()),
            binds: Vec::new(),
        });
        self.push_columns(columns, Some(&correlation));
        self.bound = Some(Slot::From);
        self
    }

    fn has_correlation(&self, name: &str) -> bool {
        self.from.iter().any(|v| v.correlation == name)
    }

    fn unique_correlation(&self, name: &str) -> String {
        if !self.has_correlation(name) {
            return name.to_string();
        }
        let mut i = 2;
        loop {
            let candidate = format!("{}_{}", name, i);
            if !self.has_correlation(&candidate) {
                return candidate;
            }
            i += 1;
        }
    }

    /// Add columns to the entry named `correlation`, or the first FROM entry when `None`.
    pub fn columns(mut self, columns: &[&str], correlation: Option<&str>) -> Self {
        let correlation = correlation
            .map(str::to_string)
            .or_else(|| self.from.first().map(|v| v.correlation.clone()));
        self.push_columns(columns, correlation.as_deref());
        self.bound = Some(Slot::Column);
        self
    }

    pub fn column_expr(mut self, expr: Expr, alias: Option<&str>) -> Self {
        self.columns.push(ColumnPart {
            correlation: None,
            term: ColumnTerm::Expression(expr),
            alias: alias.map(Into::into),
            binds: Vec::new(),
        });
        self.bound = Some(Slot::Column);
        self
    }

    fn push_columns(&mut self, columns: &[&str], correlation: Option<&str>) {
        for column in columns {
            let (column, alias) = match COLUMN_ALIAS.captures(column) {
                Some(c) => (
                    c.get(1).map_or("", |m| m.as_str()).to_string(),
                    c.get(2).map(|m| m.as_str().to_string()),
                ),
                None => (column.trim().to_string(), None),
            };
            let (correlation, term) = if looks_like_call(&column) {
                (None, ColumnTerm::Expression(Expr(column)))
            } else if column == "*" {
                (correlation.map(Into::into), ColumnTerm::Star)
            } else if let Some((table, name)) = column.rsplit_once('.') {
                let term = if name.trim() == "*" {
                    ColumnTerm::Star
                } else {
                    ColumnTerm::Name(name.trim().into())
                };
                (Some(table.trim().to_string()), term)
            } else {
                (correlation.map(Into::into), ColumnTerm::Name(column))
            };
            self.columns.push(ColumnPart {
                correlation,
                term,
                alias,
                binds: Vec::new(),
            });
        }
    }

    /// Add an AND condition.
    pub fn where_(mut self, condition: &str) -> Self {
        let fragment = Self::fragment(&self.wheres, condition, "AND");
        self.wheres.push(fragment);
        self.bound = Some(Slot::Where);
        self
    }

    pub fn or_where(mut self, condition: &str) -> Self {
        let fragment = Self::fragment(&self.wheres, condition, "OR");
        self.wheres.push(fragment);
        self.bound = Some(Slot::Where);
        self
    }

    /// Add an AND condition with `value` quoted into its `?` markers.
    pub fn where_value(self, condition: &str, value: impl Into<Literal>) -> Self {
        let condition = self.dialect.quote_into(condition, &value.into(), None);
        self.where_(&condition)
    }

    pub fn or_where_value(self, condition: &str, value: impl Into<Literal>) -> Self {
        let condition = self.dialect.quote_into(condition, &value.into(), None);
        self.or_where(&condition)
    }

    fn fragment(existing: &[Fragment], condition: &str, connective: &str) -> Fragment {
        let sql = if existing.is_empty() {
            format!("({})", condition.trim())
        } else {
            format!("{} ({})", connective, condition.trim())
        };
        Fragment {
            sql,
            binds: Vec::new(),
        }
    }

    pub fn group(mut self, terms: &[&str]) -> Self {
        for term in terms {
            let term = if looks_like_call(term) {
                term.trim().to_string()
            } else {
                self.dialect.quote_identifier(term)
            };
            self.group.push(term);
        }
        self
    }

    pub fn having(mut self, condition: &str) -> Self {
        let fragment = Self::fragment(&self.having, condition, "AND");
        self.having.push(fragment);
        self.bound = Some(Slot::Having);
        self
    }

    pub fn or_having(mut self, condition: &str) -> Self {
        let fragment = Self::fragment(&self.having, condition, "OR");
        self.having.push(fragment);
        self.bound = Some(Slot::Having);
        self
    }

    pub fn having_value(self, condition: &str, value: impl Into<Literal>) -> Self {
        let condition = self.dialect.quote_into(condition, &value.into(), None);
        self.having(&condition)
    }

    /// Combine `parts` with UNION, only valid on a builder without FROM entries.
    pub fn union<I, U>(mut self, parts: I, union: UnionType) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<Unionable>,
    {
        if !self.from.is_empty() {
            self.errors
                .push_back(DbError::Build("Cannot mix a set-union with joins".into()));
            return self;
        }
        for part in parts {
            let part = match part.into() {
                Unionable::Select(mut v) => {
                    self.errors.extend(v.errors.drain(..));
                    UnionPart::Select(v.into())
                }
                Unionable::Expression(v) => UnionPart::Expression(v),
            };
            self.union.push((part, union));
        }
        self
    }

    /// Ordering terms, `"name DESC"` sets the direction.
    pub fn order(mut self, terms: &[&str]) -> Self {
        for term in terms {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            let (expression, direction) = match ORDER_TERM.captures(term) {
                Some(c) => (
                    c.get(1).map_or("", |m| m.as_str()),
                    c.get(2).map(|m| m.as_str().to_ascii_uppercase()),
                ),
                None => (term, None),
            };
            let mut rendered = if looks_like_call(expression)
                || expression.bytes().all(|b| b.is_ascii_digit())
            {
                expression.to_string()
            } else {
                self.dialect.quote_identifier(expression)
            };
            rendered.push(' ');
            rendered.push_str(direction.as_deref().unwrap_or("ASC"));
            self.order.push(rendered);
        }
        self
    }

    pub fn limit(mut self, count: Option<u64>, offset: Option<u64>) -> Self {
        self.limit = (count, offset);
        self
    }

    /// Page `page` (1-based) of `rows` rows each.
    pub fn limit_page(mut self, page: u64, rows: u64) -> Self {
        let page = page.max(1);
        let rows = rows.max(1);
        self.limit = (Some(rows), Some(rows.saturating_mul(page - 1)));
        self
    }

    pub fn for_update(mut self, flag: bool) -> Self {
        self.for_update = flag;
        self
    }

    /// Value for the next `?` marker of the fragment added last.
    ///
    /// After `from` or a join it belongs to that entry (its source, then its ON condition), after
    /// `columns` or `column_expr` to the last column, after a WHERE or HAVING condition to that condition.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        let binds = match self.bound {
            Some(Slot::Column) => self.columns.last_mut().map(|v| &mut v.binds),
            Some(Slot::From) => self.from.last_mut().map(|v| &mut v.binds),
            Some(Slot::Where) => self.wheres.last_mut().map(|v| &mut v.binds),
            Some(Slot::Having) => self.having.last_mut().map(|v| &mut v.binds),
            None => None,
        };
        match binds {
            Some(binds) => binds.push(value),
            None => self.errors.push_back(DbError::Build(format!(
                "There is no fragment to bind the value {:?} to",
                value
            ))),
        }
        self
    }

    /// Bound values, in the order [`Select::assemble`] writes their placeholders.
    pub fn binds(&self) -> Vec<Value> {
        let mut binds = Vec::new();
        self.collect_binds(&mut binds);
        binds
    }

    fn collect_binds(&self, out: &mut Vec<Value>) {
        if !self.union.is_empty() {
            for (part, _) in &self.union {
                if let UnionPart::Select(select) = part {
                    select.collect_binds(out);
                }
            }
            return;
        }
        for column in &self.columns {
            out.extend_from_slice(&column.binds);
        }
        for part in &self.from {
            if let Target::Select(select) = &part.target {
                select.collect_binds(out);
            }
            out.extend_from_slice(&part.binds);
        }
        for fragment in self.wheres.iter().chain(&self.having) {
            out.extend_from_slice(&fragment.binds);
        }
    }

    /// Pop the oldest queued build error.
    pub fn err(&mut self) -> Option<Error> {
        self.errors.pop_front().map(Into::into)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_from(&self) -> bool {
        !self.from.is_empty()
    }

    pub fn has_joins(&self) -> bool {
        self.from.iter().any(|v| v.join != JoinType::From)
    }

    pub fn current_limit(&self) -> (Option<u64>, Option<u64>) {
        self.limit
    }

    pub fn reset(mut self, part: Part) -> Self {
        match part {
            Part::Distinct => self.distinct = false,
            Part::Columns => self.columns.clear(),
            Part::From => {
                self.from.clear();
                self.columns.clear();
            }
            Part::Where => self.wheres.clear(),
            Part::Group => self.group.clear(),
            Part::Having => self.having.clear(),
            Part::Union => self.union.clear(),
            Part::Order => self.order.clear(),
            Part::Limit => self.limit = (None, None),
            Part::ForUpdate => self.for_update = false,
        }
        self
    }

    /// SQL of a single part, without its leading space. Placeholders are left as `?`.
    pub fn get_part(&self, part: Part) -> String {
        let mut out = String::new();
        match part {
            Part::Distinct => {
                if self.distinct {
                    out.push_str("DISTINCT");
                }
            }
            Part::Columns => self.write_columns(&mut out),
            Part::From => self.write_from(&mut out),
            Part::Where => Self::write_conditions(&mut out, "WHERE", &self.wheres),
            Part::Group => {
                if !self.group.is_empty() {
                    out.push_str("GROUP BY ");
                    out.push_str(&self.group.join(", "));
                }
            }
            Part::Having => Self::write_conditions(&mut out, "HAVING", &self.having),
            Part::Union => self.write_union(&mut out),
            Part::Order => {
                if !self.order.is_empty() {
                    out.push_str("ORDER BY ");
                    out.push_str(&self.order.join(", "));
                }
            }
            Part::Limit => self.dialect.limit(&mut out, self.limit.0, self.limit.1),
            Part::ForUpdate => {
                if self.for_update {
                    out.push_str("FOR UPDATE");
                }
            }
        }
        out.trim_start().to_string()
    }

    /// Render the SQL text with the dialect's placeholders. Pure function of the parts.
    pub fn assemble(&self) -> String {
        let mut sql = String::with_capacity(128);
        self.render(&mut sql);
        self.dialect.number_placeholders(&sql)
    }

    /// SQL text with the bound values quoted in place of their markers.
    pub fn inline(&self) -> String {
        let mut sql = String::with_capacity(128);
        self.render(&mut sql);
        let binds = self.binds();
        self.dialect.replace_markers(&sql, |out, i| match binds.get(i) {
            Some(value) => out.push_str(&self.dialect.quote_value(value)),
            None => out.push('?'),
        })
    }

    fn render(&self, out: &mut String) {
        if self.union.is_empty() {
            out.push_str("SELECT");
            if self.distinct {
                out.push_str(" DISTINCT");
            }
            out.push(' ');
            self.write_columns(out);
            if !self.from.is_empty() {
                out.push(' ');
                self.write_from(out);
            }
            self.write_clause(out, Part::Where);
            self.write_clause(out, Part::Group);
            self.write_clause(out, Part::Having);
        } else {
            self.write_union(out);
        }
        self.write_clause(out, Part::Order);
        self.dialect.limit(out, self.limit.0, self.limit.1);
        self.write_clause(out, Part::ForUpdate);
    }

    fn write_clause(&self, out: &mut String, part: Part) {
        let part = self.get_part(part);
        if !part.is_empty() {
            out.push(' ');
            out.push_str(&part);
        }
    }

    fn write_columns(&self, out: &mut String) {
        if self.columns.is_empty() {
            out.push('*');
            return;
        }
        separated_by(
            out,
            &self.columns,
            |out, column| {
                let qualifier = column
                    .correlation
                    .as_deref()
                    .map(|v| format!("{}.", self.dialect.quote_identifier(v)))
                    .unwrap_or_default();
                match &column.term {
                    ColumnTerm::Star => {
                        out.push_str(&qualifier);
                        out.push('*');
                    }
                    ColumnTerm::Name(name) => {
                        out.push_str(&qualifier);
                        out.push_str(&self.dialect.quote_column_as(name, column.alias.as_deref()));
                    }
                    ColumnTerm::Expression(expr) => {
                        out.push_str(expr.as_str());
                        if let Some(alias) = &column.alias {
                            out.push_str(" AS ");
                            out.push_str(&self.dialect.quote_identifier(alias));
                        }
                    }
                }
            },
            ", ",
        );
    }

    fn write_from(&self, out: &mut String) {
        separated_by(
            out,
            &self.from,
            |out, part| {
                out.push_str(part.join.keyword());
                out.push(' ');
                match &part.target {
                    Target::Table { schema, name } => out.push_str(&self.dialect.quote_table_as(
                        name,
                        Some(&part.correlation),
                        schema.as_deref(),
                    )),
                    Target::Expression(expr) => {
                        out.push('(');
                        out.push_str(expr.as_str());
                        out.push_str(") AS ");
                        out.push_str(&self.dialect.quote_identifier(&part.correlation));
                    }
                    Target::Select(select) => {
                        out.push('(');
                        select.render(out);
                        out.push_str(") AS ");
                        out.push_str(&self.dialect.quote_identifier(&part.correlation));
                    }
                }
                if let Some(condition) = &part.condition {
                    out.push_str(" ON ");
                    out.push_str(condition);
                }
            },
            " ",
        );
    }

    fn write_conditions(out: &mut String, keyword: &str, fragments: &[Fragment]) {
        if fragments.is_empty() {
            return;
        }
        out.push_str(keyword);
        for fragment in fragments {
            out.push(' ');
            out.push_str(&fragment.sql);
        }
    }

    fn write_union(&self, out: &mut String) {
        for (i, (part, union)) in self.union.iter().enumerate() {
            if i > 0 {
                out.push_str(match union {
                    UnionType::Distinct => " UNION ",
                    UnionType::All => " UNION ALL ",
                });
            }
            match part {
                UnionPart::Select(select) => {
                    out.push('(');
                    select.render(out);
                    out.push(')');
                }
                UnionPart::Expression(expr) => out.push_str(expr.as_str()),
            }
        }
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.assemble())
    }
}

/// `name(...)`, a raw SQL call rather than a column name.
fn looks_like_call(term: &str) -> bool {
    let term = term.trim();
    match term.find('(') {
        Some(open) => open > 0 && term.ends_with(')'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GenericSqlWriter, error_kind};
    use indoc::indoc;
    use std::sync::Arc;

    fn select() -> Select {
        Select::new(Dialect::new(Arc::new(GenericSqlWriter {}), true).unwrap())
    }

    #[test]
    fn simple() {
        let select = select()
            .from("users", &["id", "name AS author"])
            .where_("active = 1")
            .order(&["name DESC", "id"])
            .limit(Some(10), Some(20));
        assert_eq!(
            select.assemble(),
            indoc! {r#"
                SELECT "users"."id", "users"."name" AS "author" FROM "users" WHERE (active = 1) ORDER BY "name" DESC, "id" ASC LIMIT 10 OFFSET 20
            "#}
            .trim()
        );
    }

    #[test]
    fn joins() {
        let select = select()
            .from(Source::aliased("blog.posts", "p"), &["*"])
            .join_left("users", "users.id = p.author_id", &["name"])
            .join_cross("tags", &[])
            .columns(&["COUNT(*) AS total"], None);
        assert!(select.has_joins());
        assert_eq!(
            select.assemble(),
            concat!(
                r#"SELECT "p".*, "users"."name", COUNT(*) AS "total" "#,
                r#"FROM "blog"."posts" AS "p" LEFT JOIN "users" ON users.id = p.author_id CROSS JOIN "tags""#
            )
        );
    }

    #[test]
    fn correlation_names() {
        let select = select()
            .from("users", &[])
            .join_inner("users", "users_2.parent = users.id", &[]);
        assert!(select.assemble().contains(r#"INNER JOIN "users" AS "users_2" ON"#));
        let mut select = select.join_inner(Source::aliased("users", "users_2"), "1 = 1", &[]);
        let error = select.err().unwrap();
        assert!(matches!(error_kind(&error), Some(DbError::Build(..))));
        assert!(select.err().is_none());
    }

    #[test]
    fn queued_errors_fifo() {
        let mut select = select()
            .union([Expr::new("SELECT 1")], UnionType::All)
            .from("users", &[])
            .join_named("sideways", "posts", "1 = 1", &[]);
        assert!(format!("{:#}", select.err().unwrap()).contains("set-union"));
        assert!(format!("{:#}", select.err().unwrap()).contains("sideways"));
        assert!(!select.has_errors());
    }

    #[test]
    fn wheres_in_order() {
        let select = select()
            .from("t", &[])
            .where_("a = 1")
            .or_where("b = 2")
            .where_value("c = ?", "x");
        assert_eq!(
            select.get_part(Part::Where),
            "WHERE (a = 1) OR (b = 2) AND (c = 'x')"
        );
    }

    #[test]
    fn union_and_order() {
        let first = select().from("a", &["id"]);
        let second = select().from("b", &["id"]);
        let select = select()
            .union([first, second], UnionType::All)
            .order(&["1"])
            .limit(None, Some(5));
        assert_eq!(
            select.assemble(),
            r#"(SELECT "a"."id" FROM "a") UNION ALL (SELECT "b"."id" FROM "b") ORDER BY 1 ASC LIMIT 9223372036854775807 OFFSET 5"#
        );
    }

    #[test]
    fn group_having_distinct_for_update() {
        let select = select()
            .distinct(true)
            .from("orders", &["customer", "SUM(total) AS spent"])
            .group(&["customer"])
            .having("SUM(total) > 10")
            .limit_page(3, 10)
            .for_update(true);
        assert_eq!(
            select.assemble(),
            concat!(
                r#"SELECT DISTINCT "orders"."customer", SUM(total) AS "spent" FROM "orders" "#,
                r#"GROUP BY "customer" HAVING (SUM(total) > 10) LIMIT 10 OFFSET 20 FOR UPDATE"#
            )
        );
        let select = select.reset(Part::Limit).reset(Part::ForUpdate);
        assert!(select.assemble().ends_with(r#"HAVING (SUM(total) > 10)"#));
    }

    #[test]
    fn nested_binds() {
        let inner = select()
            .from("orders", &["customer_id"])
            .where_("total > ?")
            .bind(100);
        let select = select()
            .from(inner, &["*"])
            .join_left("notes", "notes.customer_id = t.customer_id AND notes.kind = ?", &[])
            .bind("late")
            .where_("t.customer_id <> ?")
            .bind(3);
        assert_eq!(
            select.assemble(),
            concat!(
                r#"SELECT "t".* FROM (SELECT "orders"."customer_id" FROM "orders" WHERE (total > ?)) AS "t" "#,
                r#"LEFT JOIN "notes" ON notes.customer_id = t.customer_id AND notes.kind = ? WHERE (t.customer_id <> ?)"#
            )
        );
        assert_eq!(
            select.binds(),
            [Value::Integer(100), Value::Text("late".into()), Value::Integer(3)]
        );

        let first = self::select().from("a", &["id"]).where_("x = ?").bind(1);
        let second = self::select().from("b", &["id"]).where_("y = ?").bind(2);
        let union = self::select()
            .union([first, second], UnionType::Distinct)
            .order(&["1"]);
        assert_eq!(union.binds(), [Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn inline_nested_select() {
        let inner = select().from("users", &["id"]).where_("name = ?").bind("O'Hara");
        let outer = select().from("posts", &[]).where_value("author_id IN ?", inner);
        assert_eq!(
            outer.get_part(Part::Where),
            r#"WHERE (author_id IN (SELECT "users"."id" FROM "users" WHERE (name = 'O''Hara')))"#
        );
        assert!(outer.binds().is_empty());
    }

    #[test]
    fn bind_without_fragment() {
        let mut select = select().bind(1);
        let error = select.err().unwrap();
        assert!(matches!(error_kind(&error), Some(DbError::Build(..))));
    }

    #[test]
    fn cloned_with_queued_errors() {
        let inner = select().join_named("sideways", "t", "1 = 1", &[]);
        let original = select().from(inner, &[]);
        let mut copy = original.clone();
        assert!(original.has_errors());
        assert!(format!("{:#}", copy.err().unwrap()).contains("sideways"));
        assert!(!copy.has_errors());
        assert!(original.has_errors());
    }

    #[test]
    fn huge_page() {
        let select = select().from("t", &[]).limit_page(u64::MAX, 100);
        assert_eq!(select.current_limit(), (Some(100), Some(u64::MAX)));
    }

    #[test]
    fn second_from_is_a_cross_join() {
        let select = select().from("a", &[]).from("b", &[]);
        assert_eq!(select.assemble(), r#"SELECT * FROM "a" CROSS JOIN "b""#);
    }
}
