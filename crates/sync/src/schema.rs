use dxsync_protocol::{DatasetSchema, SchemaProperty};

use crate::source::TableSchema;

/// Maps a source table schema onto a dataset schema.
///
/// Every column is declared as `string`; the source type is not carried over.
/// Non-nullable columns become required and the primary key is copied as is.
pub fn dataset_schema(table: &TableSchema) -> DatasetSchema {
    DatasetSchema {
        properties: table
            .fields
            .iter()
            .map(|f| SchemaProperty::string(f.name.clone(), !f.nullable))
            .collect(),
        primary_key: table.primary_key.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FieldSchema;
    use dxsync_protocol::PropertyType;

    #[test]
    fn maps_nullability_and_key() {
        let table = TableSchema {
            fields: vec![
                FieldSchema {
                    name: "id".into(),
                    nullable: false,
                },
                FieldSchema {
                    name: "note".into(),
                    nullable: true,
                },
            ],
            primary_key: vec!["id".into()],
        };

        let schema = dataset_schema(&table);
        assert_eq!(schema.properties.len(), 2);
        assert!(schema.properties[0].required);
        assert!(!schema.properties[1].required);
        assert!(
            schema
                .properties
                .iter()
                .all(|p| p.property_type == PropertyType::String)
        );
        assert_eq!(schema.primary_key, vec!["id"]);
    }

    #[test]
    fn no_constraints_means_empty_key() {
        let table = TableSchema {
            fields: vec![FieldSchema {
                name: "a".into(),
                nullable: true,
            }],
            primary_key: Vec::new(),
        };
        assert!(dataset_schema(&table).primary_key.is_empty());
    }
}
