use crate::{AsValue, DbError, DecodeHint, RawRows, Result, ScanTarget, TableId, Value, log_error};
use anyhow::Context;
use std::{collections::BTreeSet, fmt, sync::Arc, vec};

/// One decoded record: labels shared with its rowset, values in column order.
///
/// A row remembers the values it was read with, so saving it only writes the columns that
/// changed and locates the record by its original primary key.
#[derive(Clone, PartialEq)]
pub struct Row {
    labels: Arc<[String]>,
    values: Vec<Value>,
    clean: Vec<Value>,
    modified: BTreeSet<usize>,
    table: Option<TableId>,
    stored: bool,
    read_only: bool,
}

impl Row {
    pub fn new(labels: Arc<[String]>, values: Vec<Value>, hint: DecodeHint) -> Self {
        Self {
            labels,
            clean: values.clone(),
            values,
            modified: Default::default(),
            table: hint.table,
            stored: hint.stored,
            read_only: hint.read_only,
        }
    }

    /// A row not read from the database, every value counts as modified.
    pub fn unstored(values: Vec<(String, Value)>, table: Option<TableId>) -> Self {
        let (labels, values): (Vec<_>, Vec<_>) = values.into_iter().unzip();
        let modified = (0..values.len()).collect();
        Self {
            labels: labels.into(),
            clean: vec![Value::Null; values.len()],
            values,
            modified,
            table,
            stored: false,
            read_only: false,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn table(&self) -> Option<TableId> {
        self.table
    }

    pub fn is_stored(&self) -> bool {
        self.stored
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_modified(&self) -> bool {
        !self.modified.is_empty()
    }

    fn index(&self, column: &str) -> Option<usize> {
        self.labels.iter().position(|v| v == column)
    }

    pub fn value(&self, column: &str) -> Option<&Value> {
        self.index(column).map(|i| &self.values[i])
    }

    /// Value the column had when the row was read or last saved.
    pub fn clean_value(&self, column: &str) -> Option<&Value> {
        self.index(column).map(|i| &self.clean[i])
    }

    pub fn get<T: AsValue>(&self, column: &str) -> Result<T> {
        let value = self
            .value(column)
            .ok_or_else(|| DbError::Schema(format!("The row has no column `{}`", column)))?;
        T::try_from_value(value.clone())
            .with_context(|| format!("While reading column `{}`", column))
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> Result<()> {
        if self.read_only {
            return Err(log_error!(anyhow::Error::from(DbError::Schema(format!(
                "Cannot set `{}`, the row is read only",
                column
            )))));
        }
        let Some(index) = self.index(column) else {
            return Err(DbError::Schema(format!("The row has no column `{}`", column)).into());
        };
        self.values[index] = value.into();
        if self.stored && self.values[index] == self.clean[index] {
            self.modified.remove(&index);
        } else {
            self.modified.insert(index);
        }
        Ok(())
    }

    /// Columns changed since the row was read or last saved.
    pub fn modified(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.modified
            .iter()
            .map(|&i| (self.labels[i].as_str(), &self.values[i]))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.labels.iter().map(String::as_str).zip(self.values.iter())
    }

    /// Record the current values as persisted.
    pub fn mark_stored(&mut self) {
        self.clean = self.values.clone();
        self.modified.clear();
        self.stored = true;
    }

    pub(crate) fn set_stored_value(&mut self, column: &str, value: Value) {
        match self.index(column) {
            Some(i) => {
                self.values[i] = value;
            }
            None => {
                let mut labels = self.labels.to_vec();
                labels.push(column.to_string());
                self.labels = labels.into();
                self.values.push(value);
                self.clean.push(Value::Null);
            }
        }
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Forward only cursor over decoded rows, consumed once.
#[derive(Debug)]
pub struct Rowset {
    labels: Arc<[String]>,
    rows: vec::IntoIter<Row>,
}

impl Rowset {
    pub fn empty() -> Self {
        Self {
            labels: Arc::new([]),
            rows: Vec::new().into_iter(),
        }
    }

    /// Decode every cell of `raw` through the scan target of its column.
    pub fn decode(raw: RawRows, hint: DecodeHint) -> Result<Self> {
        let targets = raw
            .columns
            .iter()
            .map(ScanTarget::reference)
            .collect::<Vec<_>>();
        let labels: Arc<[String]> = raw.columns.into_iter().map(|v| v.name).collect();
        let rows = raw
            .rows
            .into_iter()
            .map(|cells| {
                if cells.len() != targets.len() {
                    return Err(DbError::statement(
                        "scan",
                        format!(
                            "The row has {} values but the result has {} columns",
                            cells.len(),
                            targets.len()
                        ),
                    )
                    .into());
                }
                let values = targets
                    .iter()
                    .zip(cells)
                    .map(|(target, cell)| target.dereference(cell))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Row::new(labels.clone(), values, hint))
            })
            .collect::<Result<Vec<_>>>()
            .map_err(|e| log_error!(e))?;
        Ok(Self {
            labels,
            rows: rows.into_iter(),
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Iterator for Rowset {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for Rowset {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColumnKind, RawColumn, RawValue, error_kind};

    fn rowset(hint: DecodeHint) -> Rowset {
        Rowset::decode(
            RawRows {
                columns: vec![
                    RawColumn::new("id", ColumnKind::Integer, false),
                    RawColumn::new("name", ColumnKind::Text, true),
                ],
                rows: vec![
                    vec![RawValue::Bytes(b"1".to_vec()), RawValue::Null],
                    vec![RawValue::Typed(Value::Integer(2)), RawValue::Bytes(b"bob".to_vec())],
                ],
            },
            hint,
        )
        .unwrap()
    }

    #[test]
    fn single_pass() {
        let mut rows = rowset(DecodeHint::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.labels(), &["id".to_string(), "name".to_string()]);
        let first = rows.next().unwrap();
        assert_eq!(first.get::<i64>("id").unwrap(), 1);
        assert_eq!(first.get::<Option<String>>("name").unwrap(), None);
        let second = rows.next().unwrap();
        assert_eq!(second.get::<String>("name").unwrap(), "bob");
        assert!(rows.next().is_none());
    }

    #[test]
    fn modified_columns() {
        let hint = DecodeHint {
            stored: true,
            ..Default::default()
        };
        let mut row = rowset(hint).next().unwrap();
        assert!(!row.is_modified());
        row.set("name", "alice").unwrap();
        assert_eq!(row.modified().collect::<Vec<_>>(), [("name", &Value::Text("alice".into()))]);
        row.set("name", Value::Null).unwrap();
        assert!(!row.is_modified());
        let error = row.set("missing", 1).unwrap_err();
        assert!(matches!(error_kind(&error), Some(DbError::Schema(..))));
    }

    #[test]
    fn read_only() {
        let hint = DecodeHint {
            read_only: true,
            ..Default::default()
        };
        let mut row = rowset(hint).next().unwrap();
        assert!(row.set("name", "x").is_err());
    }

    #[test]
    fn null_in_strict_column() {
        let error = Rowset::decode(
            RawRows {
                columns: vec![RawColumn::new("id", ColumnKind::Integer, false)],
                rows: vec![vec![RawValue::Null]],
            },
            DecodeHint::default(),
        )
        .unwrap_err();
        assert!(matches!(error_kind(&error), Some(DbError::Statement { .. })));
    }
}
