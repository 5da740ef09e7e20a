//! Record sources.
//!
//! [`RecordSource`] stands in for the warehouse: it describes the table and
//! hands over its rows. [`NdjsonSource`] reads both from local files, one
//! JSON object per line.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use dxsync_transfer::{Record, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SyncError;

/// A source table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

/// Column metadata and key constraints of a source table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub primary_key: Vec<String>,
}

/// Supplies table metadata and rows.
pub trait RecordSource: Send + Sync {
    /// Describes the source table's columns.
    fn table_schema(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<TableSchema, SyncError>> + Send + '_>>;

    /// Reads every row, in source order.
    fn fetch_records(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Record>, SyncError>> + Send + '_>>;
}

/// Reads newline-delimited JSON rows and an optional JSON schema file.
///
/// Without a schema file, the schema lists the first row's keys as nullable
/// columns with no primary key.
#[derive(Debug, Clone)]
pub struct NdjsonSource {
    records_path: PathBuf,
    schema_path: Option<PathBuf>,
}

impl NdjsonSource {
    pub fn new(records_path: impl Into<PathBuf>) -> Self {
        Self {
            records_path: records_path.into(),
            schema_path: None,
        }
    }

    pub fn with_schema(mut self, schema_path: impl Into<PathBuf>) -> Self {
        self.schema_path = Some(schema_path.into());
        self
    }

    async fn read_records(&self) -> Result<Vec<Record>, SyncError> {
        let text = tokio::fs::read_to_string(&self.records_path).await?;
        let records = parse_ndjson(&text)?;
        info!(
            path = %self.records_path.display(),
            rows = records.len(),
            "fetched source rows"
        );
        Ok(records)
    }

    async fn read_schema(&self) -> Result<TableSchema, SyncError> {
        match &self.schema_path {
            Some(path) => {
                let text = tokio::fs::read_to_string(path).await?;
                let schema: TableSchema = serde_json::from_str(&text)?;
                debug!(
                    path = %path.display(),
                    fields = schema.fields.len(),
                    primary_key = ?schema.primary_key,
                    "loaded table schema"
                );
                Ok(schema)
            }
            None => {
                let records = self.read_records().await?;
                let fields = records
                    .first()
                    .map(|r| {
                        r.column_names()
                            .map(|name| FieldSchema {
                                name: name.to_string(),
                                nullable: true,
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(TableSchema {
                    fields,
                    primary_key: Vec::new(),
                })
            }
        }
    }
}

impl RecordSource for NdjsonSource {
    fn table_schema(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<TableSchema, SyncError>> + Send + '_>> {
        Box::pin(self.read_schema())
    }

    fn fetch_records(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Record>, SyncError>> + Send + '_>> {
        Box::pin(self.read_records())
    }
}

/// Parses one JSON object per non-blank line.
fn parse_ndjson(text: &str) -> Result<Vec<Record>, SyncError> {
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|e| SyncError::InvalidRecord {
                line: idx + 1,
                reason: e.to_string(),
            })?;
        let serde_json::Value::Object(map) = value else {
            return Err(SyncError::InvalidRecord {
                line: idx + 1,
                reason: "expected a JSON object".into(),
            });
        };
        records.push(
            map.into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect(),
        );
    }
    Ok(records)
}

fn json_to_value(v: serde_json::Value) -> Value {
    use serde_json::Value as J;
    match v {
        J::Null => Value::Null,
        J::Bool(b) => Value::Bool(b),
        J::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if n.is_u64() {
                // Beyond i64; keep the exact digits.
                Value::Text(n.to_string())
            } else {
                n.as_f64().map(Value::Float).unwrap_or(Value::Null)
            }
        }
        J::String(s) => Value::Text(s),
        nested @ (J::Array(_) | J::Object(_)) => Value::Text(nested.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_preserves_key_order() {
        let records = parse_ndjson(r#"{"z":1,"a":"x","m":true}"#).unwrap();
        let names: Vec<&str> = records[0].column_names().collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn parse_converts_scalars() {
        let records = parse_ndjson(
            r#"{"i":-3,"f":2.5,"b":false,"n":null,"s":"hi","big":18446744073709551615}"#,
        )
        .unwrap();
        let r = &records[0];
        assert_eq!(r.get("i"), Some(&Value::Int(-3)));
        assert_eq!(r.get("f"), Some(&Value::Float(2.5)));
        assert_eq!(r.get("b"), Some(&Value::Bool(false)));
        assert_eq!(r.get("n"), Some(&Value::Null));
        assert_eq!(r.get("s"), Some(&Value::Text("hi".into())));
        assert_eq!(
            r.get("big"),
            Some(&Value::Text("18446744073709551615".into()))
        );
    }

    #[test]
    fn nested_values_become_json_text() {
        let records = parse_ndjson(r#"{"tags":["a","b"],"meta":{"k":1}}"#).unwrap();
        assert_eq!(
            records[0].get("tags"),
            Some(&Value::Text(r#"["a","b"]"#.into()))
        );
        assert_eq!(
            records[0].get("meta"),
            Some(&Value::Text(r#"{"k":1}"#.into()))
        );
    }

    #[test]
    fn blank_lines_skipped() {
        let records = parse_ndjson("{\"a\":1}\n\n  \n{\"a\":2}\n").unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn non_object_line_is_rejected() {
        let err = parse_ndjson("{\"a\":1}\n[1,2]\n").unwrap_err();
        assert!(matches!(err, SyncError::InvalidRecord { line: 2, .. }));
    }

    #[test]
    fn invalid_json_reports_line() {
        let err = parse_ndjson("{\"a\":1}\n{\"a\":\n").unwrap_err();
        assert!(matches!(err, SyncError::InvalidRecord { line: 2, .. }));
    }

    #[tokio::test]
    async fn reads_records_and_schema_files() {
        let records = write_temp("{\"id\":1,\"name\":\"a\"}\n{\"id\":2,\"name\":\"b\"}\n");
        let schema = write_temp(
            r#"{"fields":[{"name":"id","nullable":false},{"name":"name"}],"primary_key":["id"]}"#,
        );

        let source = NdjsonSource::new(records.path()).with_schema(schema.path());
        let rows = source.fetch_records().await.unwrap();
        assert_eq!(rows.len(), 2);

        let table = source.table_schema().await.unwrap();
        assert_eq!(table.fields.len(), 2);
        assert!(!table.fields[0].nullable);
        assert!(table.fields[1].nullable);
        assert_eq!(table.primary_key, vec!["id"]);
    }

    #[tokio::test]
    async fn schema_inferred_without_file() {
        let records = write_temp("{\"b\":1,\"a\":2}\n");
        let source = NdjsonSource::new(records.path());

        let table = source.table_schema().await.unwrap();
        let names: Vec<&str> = table.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(table.fields.iter().all(|f| f.nullable));
        assert!(table.primary_key.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let source = NdjsonSource::new("/nonexistent/dxsync/records.ndjson");
        assert!(matches!(
            source.fetch_records().await,
            Err(SyncError::Io(_))
        ));
    }
}
