use crate::{
    Adapter, AsValue, CallContext, Condition, DbError, DecodeHint, Driver, Expr, Identity,
    Literal, ReferentialAction, Registry, ResolvedTable, Result, Row, Rowset, Select, Sequence,
    Session, Source, TableDefinition, TableId, TableMetadata, TableReference, Value, cache_key,
    error_kind, log_error,
};
use anyhow::Context;
use futures::{FutureExt, future::BoxFuture};
use std::fmt;

/// One primary key column of a [`Table::find`] lookup: a single value or one value per row.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    One(Value),
    Many(Vec<Value>),
}

impl Key {
    pub fn many<T: AsValue>(values: impl IntoIterator<Item = T>) -> Self {
        Key::Many(values.into_iter().map(AsValue::as_value).collect())
    }

    fn len(&self) -> usize {
        match self {
            Key::One(..) => 1,
            Key::Many(v) => v.len(),
        }
    }

    fn get(&self, index: usize) -> &Value {
        match self {
            Key::One(v) => v,
            Key::Many(v) => &v[index],
        }
    }
}

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        Key::One(value)
    }
}
impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::One(value.into())
    }
}
impl From<Vec<Value>> for Key {
    fn from(value: Vec<Value>) -> Self {
        Key::Many(value)
    }
}
impl<T: AsValue> From<T> for Key {
    fn from(value: T) -> Self {
        Key::One(value.as_value())
    }
}

#[derive(Debug, Clone)]
pub enum Filter {
    Condition(Condition),
    /// Used as is, a FROM entry for the table is added when missing.
    Select(Select),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::Condition(Condition::None)
    }
}

/// What [`Table::fetch_all`] and [`Table::fetch_row`] read.
#[derive(Default, Debug, Clone)]
pub struct Criteria {
    pub filter: Filter,
    pub order: Vec<String>,
    pub count: Option<u64>,
    pub offset: Option<u64>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, condition: impl Into<Condition>) -> Self {
        self.filter = Filter::Condition(condition.into());
        self
    }

    pub fn select(mut self, select: Select) -> Self {
        self.filter = Filter::Select(select);
        self
    }

    pub fn order(mut self, terms: &[&str]) -> Self {
        self.order = terms.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn limit(mut self, count: Option<u64>, offset: Option<u64>) -> Self {
        self.count = count;
        self.offset = offset;
        self
    }
}

impl From<Condition> for Criteria {
    fn from(value: Condition) -> Self {
        Criteria::new().filter(value)
    }
}
impl From<&str> for Criteria {
    fn from(value: &str) -> Self {
        Criteria::new().filter(value)
    }
}
impl From<Select> for Criteria {
    fn from(value: Select) -> Self {
        Criteria::new().select(value)
    }
}

/// Summary returned by [`Table::info`].
#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub name: String,
    pub schema: Option<String>,
    pub columns: Vec<String>,
    pub primary: Vec<String>,
    pub identity: Option<String>,
    pub sequence: Sequence,
    pub metadata: TableMetadata,
    pub metadata_from_cache: bool,
}

/// Reference of a dependent table towards this one, with the referenced columns resolved.
struct Rule<'r, D: Driver> {
    table: Table<'r, D>,
    name: &'r str,
    reference: &'r TableReference,
    ref_columns: Vec<String>,
}

/// Gateway to one registered table.
///
/// Every operation exists in two flavors: `op` runs on the table adapter pool, `op_in` runs on
/// any [`Session`], typically a [`crate::Transaction`].
pub struct Table<'r, D: Driver> {
    registry: &'r Registry<D>,
    id: TableId,
}

impl<'r, D: Driver> Clone for Table<'r, D> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<'r, D: Driver> Copy for Table<'r, D> {}

impl<'r, D: Driver> fmt::Debug for Table<'r, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.id)
            .field("name", &self.qualified_name())
            .finish()
    }
}

impl<'r, D: Driver> Table<'r, D> {
    pub(crate) fn new(registry: &'r Registry<D>, id: TableId) -> Self {
        Self { registry, id }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn registry(&self) -> &'r Registry<D> {
        self.registry
    }

    pub fn definition(&self) -> &'r TableDefinition {
        &self.registry.slot(self.id).definition
    }

    pub fn adapter(&self) -> &'r Adapter<D> {
        &self.registry.slot(self.id).adapter
    }

    pub fn name(&self) -> &'r str {
        &self.definition().name
    }

    pub fn schema(&self) -> Option<&'r str> {
        self.definition().schema.as_deref()
    }

    /// `schema.table` or the bare name, also the registry name.
    pub fn qualified_name(&self) -> String {
        self.definition().key()
    }

    /// SELECT of every column of the table.
    pub fn select(&self) -> Select {
        self.adapter()
            .select()
            .from(Source::Table(self.qualified_name()), &["*"])
    }

    /// Metadata, primary key and identity column, computed once per table.
    pub async fn resolve(&self, ctx: &CallContext) -> Result<&'r ResolvedTable> {
        self.registry
            .slot(self.id)
            .resolved
            .get_or_try_init(|| self.load(ctx))
            .await
    }

    async fn load(&self, ctx: &CallContext) -> Result<ResolvedTable> {
        let definition = self.definition();
        let (metadata, metadata_from_cache) = self.load_metadata(ctx).await?;
        let primary = if definition.primary.is_empty() {
            metadata
                .primary_key()
                .into_iter()
                .map(|v| v.name.clone())
                .collect::<Vec<_>>()
        } else {
            if let Some(missing) = definition
                .primary
                .iter()
                .find(|v| metadata.column(v).is_none())
            {
                return Err(log_error!(anyhow::Error::from(DbError::Schema(format!(
                    "The primary key column `{}` is not a column of `{}`",
                    missing,
                    self.qualified_name()
                )))));
            }
            definition.primary.clone()
        };
        let identity = if primary.is_empty() {
            None
        } else if let Some(position) = definition.identity_position {
            let column = position
                .checked_sub(1)
                .and_then(|i| primary.get(i))
                .ok_or_else(|| {
                    log_error!(anyhow::Error::from(DbError::Schema(format!(
                        "The identity position {} is outside the primary key of `{}`",
                        position,
                        self.qualified_name()
                    ))))
                })?;
            Some(column.clone())
        } else {
            primary
                .iter()
                .find(|v| metadata.column(v).is_some_and(|c| c.identity))
                .or_else(|| match definition.sequence {
                    Sequence::Named(..) => primary.first(),
                    _ => None,
                })
                .cloned()
        };
        Ok(ResolvedTable {
            metadata,
            metadata_from_cache,
            primary,
            identity,
        })
    }

    async fn load_metadata(&self, ctx: &CallContext) -> Result<(TableMetadata, bool)> {
        let adapter = self.adapter();
        let definition = self.definition();
        let name = self.qualified_name();
        let cache = self.registry.metadata_cache();
        let key = cache_key(adapter.dsn(), definition.schema.as_deref(), &definition.name);
        if let Some(data) = cache.and_then(|v| v.load(&key)) {
            match TableMetadata::from_bytes(&data) {
                Ok(metadata) => {
                    log::trace!("Metadata of `{}` found in cache", name);
                    return Ok((metadata, true));
                }
                Err(e) => log::warn!(
                    "{:#}",
                    e.context(format!("Discarding the cached metadata of `{}`", name))
                ),
            }
        }
        let metadata = adapter
            .describe_table(ctx, &definition.name, definition.schema.as_deref())
            .await?;
        log::debug!("Metadata of `{}` read from the catalog", name);
        if let Some(cache) = cache {
            match metadata.to_bytes() {
                Ok(data) => {
                    if !cache.save(&data, &key, &["metadata", &name]) {
                        log::warn!("The metadata of `{}` could not be cached", name);
                    }
                }
                Err(e) => log::warn!("{:#}", e),
            }
        }
        Ok((metadata, false))
    }

    /// Primary key columns, a schema error when the table has none.
    pub async fn primary_key(&self, ctx: &CallContext) -> Result<&'r [String]> {
        let resolved = self.resolve(ctx).await?;
        self.require_primary(resolved)
    }

    fn require_primary(&self, resolved: &'r ResolvedTable) -> Result<&'r [String]> {
        if resolved.primary.is_empty() {
            return Err(log_error!(anyhow::Error::from(DbError::Schema(format!(
                "The table `{}` has no primary key",
                self.qualified_name()
            )))));
        }
        Ok(&resolved.primary)
    }

    pub async fn info(&self, ctx: &CallContext) -> Result<TableInfo> {
        let resolved = self.resolve(ctx).await?;
        let definition = self.definition();
        Ok(TableInfo {
            name: definition.name.clone(),
            schema: definition.schema.clone(),
            columns: resolved.metadata.names().map(Into::into).collect(),
            primary: resolved.primary.clone(),
            identity: resolved.identity.clone(),
            sequence: definition.sequence.clone(),
            metadata: resolved.metadata.clone(),
            metadata_from_cache: resolved.metadata_from_cache,
        })
    }

    /// New unstored row, persisted by [`Table::save`].
    pub fn create_row(&self, values: Vec<(String, Value)>) -> Row {
        Row::unstored(values, Some(self.id))
    }

    fn fetch_context(&self, ctx: &CallContext) -> CallContext {
        ctx.clone().with_hint(DecodeHint {
            table: Some(self.id),
            read_only: self.definition().read_only,
            stored: true,
        })
    }

    fn criteria_select(&self, criteria: Criteria) -> Select {
        let mut select = match criteria.filter {
            Filter::Select(select) if select.has_from() => select,
            Filter::Select(select) => select.from(Source::Table(self.qualified_name()), &[]),
            Filter::Condition(condition) => self.condition_select(&condition),
        };
        if !criteria.order.is_empty() {
            let order = criteria.order.iter().map(String::as_str).collect::<Vec<_>>();
            select = select.order(&order);
        }
        if criteria.count.is_some() || criteria.offset.is_some() {
            let (count, offset) = select.current_limit();
            select = select.limit(criteria.count.or(count), criteria.offset.or(offset));
        } else if select.current_limit() == (None, None) {
            if let Some(limit) = self.adapter().config().select.default_limit {
                select = select.limit(Some(limit), None);
            }
        }
        select
    }

    fn condition_select(&self, condition: &Condition) -> Select {
        condition
            .terms(self.adapter().dialect())
            .iter()
            .fold(self.select(), |select, term| select.where_(term))
    }

    pub async fn fetch_all(&self, ctx: &CallContext, criteria: impl Into<Criteria>) -> Result<Rowset> {
        self.fetch_all_in(self.adapter(), ctx, criteria).await
    }

    pub async fn fetch_all_in<S: Session<Driver = D>>(
        &self,
        session: &S,
        ctx: &CallContext,
        criteria: impl Into<Criteria>,
    ) -> Result<Rowset> {
        let select = self.criteria_select(criteria.into());
        session
            .query(&self.fetch_context(ctx), select)
            .await
            .with_context(|| format!("While fetching rows of `{}`", self.qualified_name()))
    }

    pub async fn fetch_row(&self, ctx: &CallContext, criteria: impl Into<Criteria>) -> Result<Option<Row>> {
        self.fetch_row_in(self.adapter(), ctx, criteria).await
    }

    pub async fn fetch_row_in<S: Session<Driver = D>>(
        &self,
        session: &S,
        ctx: &CallContext,
        criteria: impl Into<Criteria>,
    ) -> Result<Option<Row>> {
        let mut criteria = criteria.into();
        criteria.count = Some(1);
        Ok(self.fetch_all_in(session, ctx, criteria).await?.next())
    }

    /// Rows by primary key, one [`Key`] per primary key column.
    ///
    /// `Key::Many` arguments select several rows, all of them must have the same length.
    pub async fn find(&self, ctx: &CallContext, keys: &[Key]) -> Result<Rowset> {
        self.find_in(self.adapter(), ctx, keys).await
    }

    pub async fn find_in<S: Session<Driver = D>>(
        &self,
        session: &S,
        ctx: &CallContext,
        keys: &[Key],
    ) -> Result<Rowset> {
        let resolved = self.resolve(ctx).await?;
        let primary = self.require_primary(resolved)?;
        let Some(condition) = self.find_condition(primary, keys)? else {
            return Ok(Rowset::empty());
        };
        self.fetch_all_in(session, ctx, Condition::Raw(condition)).await
    }

    /// OR of one AND group per key tuple, `None` when there is no tuple.
    fn find_condition(&self, primary: &[String], keys: &[Key]) -> Result<Option<String>> {
        if keys.len() != primary.len() {
            return Err(log_error!(anyhow::Error::from(DbError::Build(format!(
                "The primary key of `{}` has {} columns, {} values were given",
                self.qualified_name(),
                primary.len(),
                keys.len()
            )))));
        }
        let rows = keys.first().map(Key::len).unwrap_or_default();
        if keys.iter().any(|v| v.len() != rows) {
            return Err(log_error!(anyhow::Error::from(DbError::Build(format!(
                "The key values of `{}` must all have the same length",
                self.qualified_name()
            )))));
        }
        if rows == 0 {
            return Ok(None);
        }
        let dialect = self.adapter().dialect();
        let columns = primary
            .iter()
            .map(|v| {
                format!(
                    "{} = ?",
                    dialect.quote_identifier(&format!("{}.{}", self.name(), v))
                )
            })
            .collect::<Vec<_>>();
        let groups = (0..rows)
            .map(|i| {
                let terms = columns
                    .iter()
                    .zip(keys)
                    .map(|(column, key)| {
                        dialect.quote_into(column, &Literal::Scalar(key.get(i).clone()), None)
                    })
                    .collect::<Vec<_>>();
                format!("({})", terms.join(" AND "))
            })
            .collect::<Vec<_>>();
        Ok(Some(groups.join(" OR ")))
    }

    /// Insert one row, returning the identity of the new row.
    ///
    /// A blank identity value is dropped so the database generates it, a named sequence is drawn first.
    pub async fn insert(&self, ctx: &CallContext, values: Vec<(String, Literal)>) -> Result<Identity> {
        self.insert_in(self.adapter(), ctx, values).await
    }

    pub async fn insert_in<S: Session<Driver = D>>(
        &self,
        session: &S,
        ctx: &CallContext,
        mut values: Vec<(String, Literal)>,
    ) -> Result<Identity> {
        let resolved = self.resolve(ctx).await?;
        self.require_primary(resolved)?;
        let identity = resolved.identity.as_deref();
        if let Some(column) = identity {
            values.retain(|(name, value)| {
                name != column
                    || match value {
                        Literal::Scalar(v) => !v.is_blank(),
                        Literal::Text(v) => !v.is_empty(),
                        _ => true,
                    }
            });
            let supplied = values.iter().any(|(name, _)| name == column);
            if let (false, Sequence::Named(sequence)) = (supplied, &self.definition().sequence) {
                let id = session.adapter().next_sequence_id(ctx, sequence).await?;
                values.push((column.to_string(), Literal::Scalar(id.as_value())));
            }
        }
        session
            .insert(ctx, &self.qualified_name(), values, identity)
            .await
            .with_context(|| format!("While inserting into `{}`", self.qualified_name()))
    }

    /// Update the rows matching `condition`, cascading referenced key changes to the dependent tables.
    pub async fn update(
        &self,
        ctx: &CallContext,
        values: Vec<(String, Literal)>,
        condition: impl Into<Condition>,
    ) -> Result<u64> {
        self.update_in(self.adapter(), ctx, values, condition).await
    }

    pub async fn update_in<S: Session<Driver = D>>(
        &self,
        session: &S,
        ctx: &CallContext,
        values: Vec<(String, Literal)>,
        condition: impl Into<Condition>,
    ) -> Result<u64> {
        self.update_boxed(session, ctx, values, condition.into()).await
    }

    fn update_boxed<'s, S: Session<Driver = D>>(
        &'s self,
        session: &'s S,
        ctx: &'s CallContext,
        values: Vec<(String, Literal)>,
        condition: Condition,
    ) -> BoxFuture<'s, Result<u64>> {
        async move {
            let resolved = self.resolve(ctx).await?;
            self.require_primary(resolved)?;
            let rules = self
                .dependent_rules(ctx)
                .await?
                .into_iter()
                .filter(|rule| {
                    rule.reference.on_update != ReferentialAction::NoAction
                        && rule
                            .ref_columns
                            .iter()
                            .any(|c| values.iter().any(|(name, _)| name == c))
                })
                .collect::<Vec<_>>();
            if !rules.is_empty() {
                let rows = session
                    .query(&self.fetch_context(ctx), self.condition_select(&condition))
                    .await?;
                for row in rows {
                    for rule in &rules {
                        let old = rule
                            .ref_columns
                            .iter()
                            .map(|c| row.value(c).cloned().unwrap_or_default())
                            .collect::<Vec<_>>();
                        let mut changed = false;
                        let mut new = Vec::with_capacity(old.len());
                        for (column, old) in rule.ref_columns.iter().zip(&old) {
                            match values.iter().find(|(name, _)| name == column) {
                                Some((_, Literal::Scalar(v))) => {
                                    changed |= v != old;
                                    new.push(Literal::Scalar(v.clone()));
                                }
                                Some((_, v)) => {
                                    changed = true;
                                    new.push(v.clone());
                                }
                                None => new.push(Literal::Scalar(old.clone())),
                            }
                        }
                        if changed {
                            self.apply_action(
                                session,
                                ctx,
                                rule,
                                rule.reference.on_update,
                                &old,
                                Some(new),
                            )
                            .await?;
                        }
                    }
                }
            }
            session
                .update(ctx, &self.qualified_name(), values, &condition)
                .await
                .with_context(|| format!("While updating `{}`", self.qualified_name()))
        }
        .boxed()
    }

    /// Delete the rows matching `condition`, after applying the delete rules of the dependent tables.
    pub async fn delete(&self, ctx: &CallContext, condition: impl Into<Condition>) -> Result<u64> {
        self.delete_in(self.adapter(), ctx, condition).await
    }

    pub async fn delete_in<S: Session<Driver = D>>(
        &self,
        session: &S,
        ctx: &CallContext,
        condition: impl Into<Condition>,
    ) -> Result<u64> {
        self.delete_boxed(session, ctx, condition.into()).await
    }

    fn delete_boxed<'s, S: Session<Driver = D>>(
        &'s self,
        session: &'s S,
        ctx: &'s CallContext,
        condition: Condition,
    ) -> BoxFuture<'s, Result<u64>> {
        async move {
            let resolved = self.resolve(ctx).await?;
            self.require_primary(resolved)?;
            let rules = self
                .dependent_rules(ctx)
                .await?
                .into_iter()
                .filter(|rule| rule.reference.on_delete != ReferentialAction::NoAction)
                .collect::<Vec<_>>();
            if !rules.is_empty() {
                let rows = session
                    .query(&self.fetch_context(ctx), self.condition_select(&condition))
                    .await?;
                for row in rows {
                    for rule in &rules {
                        let old = rule
                            .ref_columns
                            .iter()
                            .map(|c| row.value(c).cloned().unwrap_or_default())
                            .collect::<Vec<_>>();
                        self.apply_action(session, ctx, rule, rule.reference.on_delete, &old, None)
                            .await?;
                    }
                }
            }
            session
                .delete(ctx, &self.qualified_name(), &condition)
                .await
                .with_context(|| format!("While deleting from `{}`", self.qualified_name()))
        }
        .boxed()
    }

    /// References of the dependent tables pointing at this table.
    async fn dependent_rules(&self, ctx: &CallContext) -> Result<Vec<Rule<'r, D>>> {
        let definition = self.definition();
        if definition.dependents.is_empty() {
            return Ok(Vec::new());
        }
        let key = self.qualified_name();
        let resolved = self.resolve(ctx).await?;
        let mut rules = Vec::new();
        for dependent in &definition.dependents {
            let table = self.registry.table(dependent)?;
            let references = table
                .definition()
                .references
                .iter()
                .filter(|(_, reference)| reference.ref_table == key)
                .collect::<Vec<_>>();
            if references.is_empty() {
                continue;
            }
            let dependent_metadata = &table.resolve(ctx).await?.metadata;
            for (name, reference) in references {
                let ref_columns = if reference.ref_columns.is_empty() {
                    self.require_primary(resolved)?.to_vec()
                } else {
                    reference.ref_columns.clone()
                };
                let schema_error = |message: String| {
                    log_error!(anyhow::Error::from(DbError::Schema(format!(
                        "Rule `{}` of `{}`: {}",
                        name, dependent, message
                    ))))
                };
                if ref_columns.len() != reference.columns.len() {
                    return Err(schema_error(format!(
                        "{} referencing columns for {} referenced columns",
                        reference.columns.len(),
                        ref_columns.len()
                    )));
                }
                if let Some(missing) = ref_columns
                    .iter()
                    .find(|c| resolved.metadata.column(c).is_none())
                {
                    return Err(schema_error(format!(
                        "the referenced column `{}` is not a column of `{}`",
                        missing, key
                    )));
                }
                if let Some(missing) = reference
                    .columns
                    .iter()
                    .find(|c| dependent_metadata.column(c).is_none())
                {
                    return Err(schema_error(format!(
                        "the referencing column `{}` is not a column of `{}`",
                        missing, dependent
                    )));
                }
                rules.push(Rule {
                    table,
                    name,
                    reference,
                    ref_columns,
                });
            }
        }
        Ok(rules)
    }

    /// Apply `action` to the rows of the rule's table referencing `old`, `new` holds the new key on updates.
    async fn apply_action<S: Session<Driver = D>>(
        &self,
        session: &S,
        ctx: &CallContext,
        rule: &Rule<'r, D>,
        action: ReferentialAction,
        old: &[Value],
        new: Option<Vec<Literal>>,
    ) -> Result<()> {
        if action == ReferentialAction::NoAction || old.iter().any(Value::is_null) {
            return Ok(());
        }
        let dialect = session.dialect();
        let dependent = rule.table.qualified_name();
        let columns = &rule.reference.columns;
        let condition = Condition::Bound(
            columns
                .iter()
                .zip(old)
                .map(|(c, v)| {
                    (
                        format!("{} = ?", dialect.quote_identifier(c)),
                        Literal::Scalar(v.clone()),
                    )
                })
                .collect(),
        );
        log::debug!(
            "Applying {:?} of rule `{}` from `{}` to `{}`",
            action,
            rule.name,
            self.qualified_name(),
            dependent
        );
        let result = match (action, new) {
            (ReferentialAction::NoAction, _) => Ok(()),
            (ReferentialAction::Restrict, _) => {
                let count = rule.table.count_in(session, ctx, &condition).await?;
                if count > 0 {
                    Err(DbError::cascade(
                        dependent.clone(),
                        format!(
                            "{} rows still reference `{}` through rule `{}`",
                            count,
                            self.qualified_name(),
                            rule.name
                        ),
                    )
                    .into())
                } else {
                    Ok(())
                }
            }
            (ReferentialAction::SetNull, _) => {
                let values = columns
                    .iter()
                    .map(|c| (c.clone(), Literal::Scalar(Value::Null)))
                    .collect();
                session.update(ctx, &dependent, values, &condition).await.map(drop)
            }
            (ReferentialAction::Cascade, Some(new)) => {
                let values = columns.iter().cloned().zip(new).collect();
                session.update(ctx, &dependent, values, &condition).await.map(drop)
            }
            (ReferentialAction::Cascade, None) => {
                session.delete(ctx, &dependent, &condition).await.map(drop)
            }
            (ReferentialAction::CascadeRecurse, Some(new)) => {
                let values = columns.iter().cloned().zip(new).collect();
                rule.table
                    .update_boxed(session, ctx, values, condition)
                    .await
                    .map(drop)
            }
            (ReferentialAction::CascadeRecurse, None) => rule
                .table
                .delete_boxed(session, ctx, condition)
                .await
                .map(drop),
        };
        result.map_err(|e| {
            if matches!(error_kind(&e), Some(DbError::Cascade { .. })) {
                log_error!(e)
            } else {
                log_error!(e.context(DbError::cascade(
                    dependent,
                    format!("rule `{}` could not be applied", rule.name)
                )))
            }
        })
    }

    async fn count_in<S: Session<Driver = D>>(
        &self,
        session: &S,
        ctx: &CallContext,
        condition: &Condition,
    ) -> Result<i64> {
        let select = condition.terms(session.dialect()).iter().fold(
            session
                .select()
                .from(Source::Table(self.qualified_name()), &[])
                .column_expr(Expr::new("COUNT(*)"), Some("count")),
            |select, term| select.where_(term),
        );
        let ctx = ctx.clone().with_hint(DecodeHint::default());
        match session.query_row(&ctx, select).await? {
            Some(row) => row.get("count"),
            None => Ok(0),
        }
    }

    /// Persist `row`: insert when unstored, otherwise update its modified columns.
    pub async fn save(&self, ctx: &CallContext, row: &mut Row) -> Result<()> {
        self.save_in(self.adapter(), ctx, row).await
    }

    pub async fn save_in<S: Session<Driver = D>>(
        &self,
        session: &S,
        ctx: &CallContext,
        row: &mut Row,
    ) -> Result<()> {
        self.check_row(row, "save")?;
        if !row.is_stored() {
            let values = row
                .iter()
                .map(|(c, v)| (c.to_string(), Literal::Scalar(v.clone())))
                .collect();
            let identity = self.insert_in(session, ctx, values).await?;
            let resolved = self.resolve(ctx).await?;
            if let (Some(column), false) = (&resolved.identity, identity.is_none()) {
                row.set_stored_value(column, identity.as_value());
            }
            row.mark_stored();
            return Ok(());
        }
        if !row.is_modified() {
            return Ok(());
        }
        let condition = self.row_condition(ctx, row).await?;
        let values = row
            .modified()
            .map(|(c, v)| (c.to_string(), Literal::Scalar(v.clone())))
            .collect();
        self.update_in(session, ctx, values, condition).await?;
        row.mark_stored();
        Ok(())
    }

    /// Delete the record `row` was read from.
    pub async fn delete_row(&self, ctx: &CallContext, row: &Row) -> Result<u64> {
        self.delete_row_in(self.adapter(), ctx, row).await
    }

    pub async fn delete_row_in<S: Session<Driver = D>>(
        &self,
        session: &S,
        ctx: &CallContext,
        row: &Row,
    ) -> Result<u64> {
        self.check_row(row, "delete")?;
        if !row.is_stored() {
            return Err(log_error!(anyhow::Error::from(DbError::Schema(format!(
                "Cannot delete a row of `{}` that was never stored",
                self.qualified_name()
            )))));
        }
        let condition = self.row_condition(ctx, row).await?;
        self.delete_in(session, ctx, condition).await
    }

    fn check_row(&self, row: &Row, operation: &str) -> Result<()> {
        let message = if row.is_read_only() {
            "the row is read only"
        } else if row.table().is_some_and(|v| v != self.id) {
            "the row belongs to another table"
        } else {
            return Ok(());
        };
        Err(log_error!(anyhow::Error::from(DbError::Schema(format!(
            "Cannot {} the row of `{}`, {}",
            operation,
            self.qualified_name(),
            message
        )))))
    }

    /// Primary key equality on the values the row was read with.
    async fn row_condition(&self, ctx: &CallContext, row: &Row) -> Result<Condition> {
        let primary = self.primary_key(ctx).await?;
        let dialect = self.adapter().dialect();
        let terms = primary
            .iter()
            .map(|column| {
                let value = row.clean_value(column).ok_or_else(|| {
                    DbError::Schema(format!(
                        "The row lacks the primary key column `{}` of `{}`",
                        column,
                        self.qualified_name()
                    ))
                })?;
                Ok((
                    format!("{} = ?", dialect.quote_identifier(column)),
                    Literal::Scalar(value.clone()),
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Condition::Bound(terms))
    }
}
