use crate::{
    Adapter, DbError, Driver, Error, MetadataCache, Result, Row, Table, TableMetadata,
    split_qualified,
};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    str::FromStr,
    sync::Arc,
};
use tokio::sync::OnceCell;

/// Index of a table in its [`Registry`], carried by rows as their back reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub(crate) usize);

/// Action applied to dependent rows when the referenced row is updated or deleted.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    /// Apply the change to the dependent rows with a single statement.
    Cascade,
    /// Apply the change through the dependent table, which cascades to its own dependents.
    CascadeRecurse,
    /// Refuse the change while dependent rows exist.
    Restrict,
    /// Set the referencing columns to NULL.
    SetNull,
    #[default]
    NoAction,
}

impl FromStr for ReferentialAction {
    type Err = Error;
    fn from_str(value: &str) -> Result<Self> {
        Ok(match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "cascade" => ReferentialAction::Cascade,
            "cascade-recurse" => ReferentialAction::CascadeRecurse,
            "restrict" => ReferentialAction::Restrict,
            "set-null" | "set null" => ReferentialAction::SetNull,
            "no-action" | "no action" | "" => ReferentialAction::NoAction,
            _ => {
                return Err(DbError::Configuration(format!(
                    "Unknown referential action `{}`",
                    value
                ))
                .into());
            }
        })
    }
}

/// Relationship declared by a dependent table towards the table it references.
#[derive(Debug, Clone, PartialEq)]
pub struct TableReference {
    /// Referencing columns of the dependent table.
    pub columns: Vec<String>,
    /// Registry name of the referenced table.
    pub ref_table: String,
    /// Referenced columns, the primary key of `ref_table` when empty.
    pub ref_columns: Vec<String>,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

impl TableReference {
    pub fn new(columns: &[&str], ref_table: &str) -> Self {
        Self {
            columns: columns.iter().map(|v| v.to_string()).collect(),
            ref_table: ref_table.into(),
            ref_columns: Vec::new(),
            on_delete: Default::default(),
            on_update: Default::default(),
        }
    }

    pub fn ref_columns(mut self, columns: &[&str]) -> Self {
        self.ref_columns = columns.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = action;
        self
    }
}

/// Where insert keys come from.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub enum Sequence {
    /// Generated by the database (auto increment, identity column, serial default).
    #[default]
    Auto,
    /// Drawn from the named sequence before inserting.
    Named(String),
    /// Supplied by the caller.
    None,
}

/// Static description of a table gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub schema: Option<String>,
    /// Primary key columns, discovered from the catalog when empty.
    pub primary: Vec<String>,
    /// 1-based position of the identity column in the primary key.
    pub identity_position: Option<usize>,
    pub sequence: Sequence,
    /// Relationships keyed by rule name.
    pub references: BTreeMap<String, TableReference>,
    /// Registry names of the tables referencing this one.
    pub dependents: Vec<String>,
    /// Rows fetched through this table refuse modifications.
    pub read_only: bool,
    /// Adapter name, the registry default when absent.
    pub adapter: Option<String>,
}

impl TableDefinition {
    /// `name` may be qualified, `schema.table`.
    pub fn new(name: &str) -> Self {
        let (schema, name) = split_qualified(name);
        Self {
            name: name.into(),
            schema: schema.map(Into::into),
            primary: Vec::new(),
            identity_position: None,
            sequence: Sequence::Auto,
            references: BTreeMap::new(),
            dependents: Vec::new(),
            read_only: false,
            adapter: None,
        }
    }

    pub fn schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn primary(mut self, columns: &[&str]) -> Self {
        self.primary = columns.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn identity_position(mut self, position: usize) -> Self {
        self.identity_position = Some(position);
        self
    }

    pub fn sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn reference(mut self, rule: &str, reference: TableReference) -> Self {
        self.references.insert(rule.into(), reference);
        self
    }

    pub fn dependent(mut self, table: &str) -> Self {
        self.dependents.push(table.into());
        self
    }

    pub fn read_only(mut self, flag: bool) -> Self {
        self.read_only = flag;
        self
    }

    pub fn adapter(mut self, name: &str) -> Self {
        self.adapter = Some(name.into());
        self
    }

    /// Registry name: `schema.table`, or the bare name.
    pub fn key(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

/// Metadata and keys of a table, computed on first use.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTable {
    pub metadata: TableMetadata,
    pub metadata_from_cache: bool,
    /// Possibly empty, writes require it.
    pub primary: Vec<String>,
    pub identity: Option<String>,
}

pub(crate) struct TableSlot<D: Driver> {
    pub(crate) definition: TableDefinition,
    pub(crate) adapter: Arc<Adapter<D>>,
    pub(crate) resolved: OnceCell<ResolvedTable>,
}

/// Adapters and table gateways of the application, built once at startup.
pub struct Registry<D: Driver> {
    adapters: HashMap<String, Arc<Adapter<D>>>,
    default_adapter: Option<String>,
    tables: Vec<TableSlot<D>>,
    names: HashMap<String, TableId>,
    cache: Option<Arc<dyn MetadataCache>>,
}

impl<D: Driver> Registry<D> {
    pub fn builder() -> RegistryBuilder<D> {
        RegistryBuilder::default()
    }

    pub fn adapter(&self, name: &str) -> Option<&Arc<Adapter<D>>> {
        self.adapters.get(name)
    }

    pub fn default_adapter(&self) -> Option<&Arc<Adapter<D>>> {
        self.default_adapter
            .as_ref()
            .and_then(|v| self.adapters.get(v))
    }

    pub fn table(&self, name: &str) -> Result<Table<'_, D>> {
        self.names
            .get(name.trim())
            .map(|id| Table::new(self, *id))
            .ok_or_else(|| {
                DbError::Configuration(format!("The table `{}` is not registered", name)).into()
            })
    }

    pub fn table_by_id(&self, id: TableId) -> Option<Table<'_, D>> {
        (id.0 < self.tables.len()).then(|| Table::new(self, id))
    }

    /// Gateway the row was fetched through.
    pub fn table_of(&self, row: &Row) -> Option<Table<'_, D>> {
        row.table().and_then(|id| self.table_by_id(id))
    }

    pub fn metadata_cache(&self) -> Option<&dyn MetadataCache> {
        self.cache.as_deref()
    }

    pub(crate) fn slot(&self, id: TableId) -> &TableSlot<D> {
        &self.tables[id.0]
    }
}

impl<D: Driver> fmt::Debug for Registry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .field("default_adapter", &self.default_adapter)
            .field("tables", &self.names.keys().collect::<Vec<_>>())
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

pub struct RegistryBuilder<D: Driver> {
    adapters: Vec<(String, Arc<Adapter<D>>)>,
    default_adapter: Option<String>,
    tables: Vec<TableDefinition>,
    cache: Option<Arc<dyn MetadataCache>>,
}

impl<D: Driver> Default for RegistryBuilder<D> {
    fn default() -> Self {
        Self {
            adapters: Vec::new(),
            default_adapter: None,
            tables: Vec::new(),
            cache: None,
        }
    }
}

impl<D: Driver> RegistryBuilder<D> {
    /// Register an adapter, the first one becomes the default unless another is chosen.
    pub fn adapter(mut self, name: &str, adapter: impl Into<Arc<Adapter<D>>>) -> Self {
        self.adapters.push((name.into(), adapter.into()));
        self
    }

    pub fn default_adapter(mut self, name: &str) -> Self {
        self.default_adapter = Some(name.into());
        self
    }

    pub fn table(mut self, definition: TableDefinition) -> Self {
        self.tables.push(definition);
        self
    }

    pub fn metadata_cache(mut self, cache: Arc<dyn MetadataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<Registry<D>> {
        let configuration = |message: String| -> Error { DbError::Configuration(message).into() };
        let default_adapter = self
            .default_adapter
            .or_else(|| self.adapters.first().map(|(name, _)| name.clone()));
        let adapters: HashMap<_, _> = self.adapters.into_iter().collect();
        if let Some(name) = &default_adapter {
            if !adapters.contains_key(name) {
                return Err(configuration(format!(
                    "The default adapter `{}` is not registered",
                    name
                )));
            }
        }
        let mut names = HashMap::new();
        let mut tables = Vec::with_capacity(self.tables.len());
        for definition in self.tables {
            let key = definition.key();
            let adapter_name = definition
                .adapter
                .as_ref()
                .or(default_adapter.as_ref())
                .ok_or_else(|| {
                    configuration(format!("No adapter available for the table `{}`", key))
                })?;
            let adapter = adapters.get(adapter_name).cloned().ok_or_else(|| {
                configuration(format!(
                    "The adapter `{}` of the table `{}` is not registered",
                    adapter_name, key
                ))
            })?;
            if names.insert(key.clone(), TableId(tables.len())).is_some() {
                return Err(configuration(format!(
                    "The table `{}` is registered more than once",
                    key
                )));
            }
            tables.push(TableSlot {
                definition,
                adapter,
                resolved: OnceCell::new(),
            });
        }
        for slot in &tables {
            let key = slot.definition.key();
            for dependent in &slot.definition.dependents {
                if !names.contains_key(dependent) {
                    return Err(configuration(format!(
                        "The dependent table `{}` of `{}` is not registered",
                        dependent, key
                    )));
                }
            }
            for (rule, reference) in &slot.definition.references {
                if !names.contains_key(&reference.ref_table) {
                    return Err(configuration(format!(
                        "The rule `{}` of `{}` references the unregistered table `{}`",
                        rule, key, reference.ref_table
                    )));
                }
                if reference.columns.is_empty() {
                    return Err(configuration(format!(
                        "The rule `{}` of `{}` has no columns",
                        rule, key
                    )));
                }
            }
        }
        Ok(Registry {
            adapters,
            default_adapter,
            tables,
            names,
            cache: self.cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions() {
        let definition = TableDefinition::new("blog.posts")
            .primary(&["id"])
            .dependent("blog.comments");
        assert_eq!(definition.name, "posts");
        assert_eq!(definition.schema.as_deref(), Some("blog"));
        assert_eq!(definition.key(), "blog.posts");
        assert_eq!(TableDefinition::new("users").key(), "users");
    }

    #[test]
    fn actions() {
        assert_eq!(
            "cascade_recurse".parse::<ReferentialAction>().unwrap(),
            ReferentialAction::CascadeRecurse
        );
        assert_eq!(
            "SET NULL".parse::<ReferentialAction>().unwrap(),
            ReferentialAction::SetNull
        );
        assert!("explode".parse::<ReferentialAction>().is_err());
    }
}
