use crate::{ColumnKind, DbError, Result, Row, Rowset};
use anyhow::Context;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Description of one column as read from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub schema: Option<String>,
    pub table: String,
    pub name: String,
    /// 1-based ordinal position.
    pub position: u32,
    pub data_type: String,
    pub kind: ColumnKind,
    pub default: Option<String>,
    pub nullable: bool,
    pub length: Option<u64>,
    pub scale: Option<u64>,
    pub precision: Option<u64>,
    pub unsigned: bool,
    pub primary: bool,
    /// 1-based position inside the primary key.
    pub primary_position: Option<u32>,
    pub identity: bool,
}

impl ColumnMetadata {
    /// Read one row of a describe query.
    pub fn from_row(row: &Row) -> Result<Self> {
        let data_type: String = row.get("data_type")?;
        Ok(Self {
            schema: row.get("schema_name")?,
            table: row.get("table_name")?,
            name: row.get("column_name")?,
            position: row.get("position")?,
            kind: ColumnKind::from_type_name(&data_type),
            data_type,
            default: row.get("column_default")?,
            nullable: row.get("nullable")?,
            length: row.get("length")?,
            scale: row.get("scale")?,
            precision: row.get("precision")?,
            unsigned: row.get::<Option<bool>>("unsigned")?.unwrap_or_default(),
            primary: row.get::<Option<bool>>("primary")?.unwrap_or_default(),
            primary_position: row.get("primary_position")?,
            identity: row.get::<Option<bool>>("identity")?.unwrap_or_default(),
        })
    }
}

/// Columns of a table, ordered by position.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    columns: Vec<ColumnMetadata>,
}

impl TableMetadata {
    pub fn new(mut columns: Vec<ColumnMetadata>) -> Self {
        columns.sort_by_key(|v| v.position);
        Self { columns }
    }

    pub fn from_rows(rows: Rowset) -> Result<Self> {
        let columns = rows
            .enumerate()
            .map(|(i, row)| {
                ColumnMetadata::from_row(&row)
                    .with_context(|| format!("While reading the description of column {}", i + 1))
            })
            .collect::<Result<Vec<_>>>()?;
        if columns.is_empty() {
            return Err(
                DbError::Schema("The table has no columns or does not exist".into()).into(),
            );
        }
        Ok(Self::new(columns))
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|v| v.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|v| v.name.as_str())
    }

    /// Primary key columns, ordered by their position in the key.
    pub fn primary_key(&self) -> Vec<&ColumnMetadata> {
        let mut primary = self
            .columns
            .iter()
            .filter(|v| v.primary)
            .collect::<Vec<_>>();
        primary.sort_by_key(|v| (v.primary_position.unwrap_or(u32::MAX), v.position));
        primary
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("While serializing the table metadata")
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).context("While deserializing the table metadata")
    }
}

/// Key of the cached metadata of `schema.table` reached through `dsn`.
pub fn cache_key(dsn: &str, schema: Option<&str>, table: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(dsn.as_bytes());
    hasher.update([0]);
    hasher.update(schema.unwrap_or_default().as_bytes());
    hasher.update([0]);
    hasher.update(table.as_bytes());
    hex::encode(hasher.finalize())
}

/// Byte cache holding serialized table metadata. Implementations must be safe for concurrent use.
pub trait MetadataCache: Send + Sync {
    fn load(&self, id: &str) -> Option<Vec<u8>>;
    fn save(&self, data: &[u8], id: &str, tags: &[&str]) -> bool;
    fn test(&self, id: &str) -> bool {
        self.load(id).is_some()
    }
    fn remove(&self, id: &str) -> bool;
    /// Remove the entries carrying any of `tags`, every entry when `tags` is empty.
    fn clear(&self, tags: &[&str]);
}

/// In process [`MetadataCache`].
#[derive(Default, Debug)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (Vec<u8>, Vec<String>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl MetadataCache for MemoryCache {
    fn load(&self, id: &str) -> Option<Vec<u8>> {
        self.entries.read().get(id).map(|(data, _)| data.clone())
    }

    fn save(&self, data: &[u8], id: &str, tags: &[&str]) -> bool {
        self.entries.write().insert(
            id.to_string(),
            (data.to_vec(), tags.iter().map(|v| v.to_string()).collect()),
        );
        true
    }

    fn test(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    fn remove(&self, id: &str) -> bool {
        self.entries.write().remove(id).is_some()
    }

    fn clear(&self, tags: &[&str]) {
        let mut entries = self.entries.write();
        if tags.is_empty() {
            entries.clear();
        } else {
            entries.retain(|_, (_, own)| !own.iter().any(|v| tags.contains(&v.as_str())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, position: u32, primary_position: Option<u32>) -> ColumnMetadata {
        ColumnMetadata {
            schema: None,
            table: "orders".into(),
            name: name.into(),
            position,
            data_type: "int".into(),
            kind: ColumnKind::Integer,
            default: None,
            nullable: false,
            length: None,
            scale: None,
            precision: Some(10),
            unsigned: false,
            primary: primary_position.is_some(),
            primary_position,
            identity: false,
        }
    }

    #[test]
    fn primary_key_order() {
        let metadata = TableMetadata::new(vec![
            column("line", 2, Some(2)),
            column("order_id", 1, Some(1)),
            column("amount", 3, None),
        ]);
        assert_eq!(metadata.names().collect::<Vec<_>>(), ["order_id", "line", "amount"]);
        let primary = metadata.primary_key();
        assert_eq!(
            primary.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
            ["order_id", "line"]
        );
    }

    #[test]
    fn keys_differ_by_part() {
        let key = cache_key("mysql://db", None, "users");
        assert_eq!(key.len(), 64);
        assert_eq!(key, cache_key("mysql://db", None, "users"));
        assert_ne!(key, cache_key("mysql://db", Some("app"), "users"));
        assert_ne!(key, cache_key("mysql://other", None, "users"));
    }

    #[test]
    fn memory_cache() {
        let cache = MemoryCache::new();
        let metadata = TableMetadata::new(vec![column("id", 1, Some(1))]);
        let bytes = metadata.to_bytes().unwrap();
        assert!(cache.save(&bytes, "a", &["metadata", "orders"]));
        assert!(cache.save(b"x", "b", &["other"]));
        assert!(cache.test("a"));
        assert_eq!(
            TableMetadata::from_bytes(&cache.load("a").unwrap()).unwrap(),
            metadata
        );
        cache.clear(&["orders"]);
        assert!(!cache.test("a"));
        assert!(cache.remove("b"));
        assert!(cache.is_empty());
    }
}
