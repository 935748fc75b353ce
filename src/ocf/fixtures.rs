//! Shared container fixtures for unit tests

use super::{Codec, ContainerWriter};
use apache_avro::types::Value;
use apache_avro::Schema;

pub(crate) const ROW_SCHEMA: &str = r#"{
    "type": "record",
    "name": "Row",
    "fields": [
        {"name": "id", "type": "long"},
        {"name": "name", "type": "string"},
        {"name": "score", "type": ["null", "double"]}
    ]
}"#;

pub(crate) fn row_schema() -> Schema {
    Schema::parse_str(ROW_SCHEMA).unwrap()
}

/// Record `id`; odd ids carry a score
pub(crate) fn row(id: i64) -> Value {
    let score = if id % 2 == 0 {
        Value::Union(0, Box::new(Value::Null))
    } else {
        Value::Union(1, Box::new(Value::Double(id as f64 * 0.5)))
    };

    Value::Record(vec![
        ("id".to_string(), Value::Long(id)),
        ("name".to_string(), Value::String(format!("row-{id}"))),
        ("score".to_string(), score),
    ])
}

/// Encode `rows` records into a container with `block_size` records per block
pub(crate) fn container(rows: i64, block_size: usize, codec: Codec) -> Vec<u8> {
    let schema = row_schema();
    let mut writer = ContainerWriter::new(&schema, Vec::new())
        .codec(codec)
        .block_size(block_size);
    for id in 0..rows {
        writer.append(row(id)).unwrap();
    }
    writer.finish().unwrap()
}

/// Typed view of a decoded row
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Row {
    pub id: i64,
    pub name: String,
    pub score: Option<f64>,
}

impl Row {
    pub(crate) fn from_value(value: &Value) -> Self {
        let Value::Record(fields) = value else {
            panic!("not a record: {value:?}");
        };
        let mut row = Row {
            id: -1,
            name: String::new(),
            score: None,
        };
        for (name, field) in fields {
            match (name.as_str(), field) {
                ("id", Value::Long(id)) => row.id = *id,
                ("name", Value::String(s)) => row.name = s.clone(),
                ("score", Value::Union(_, inner)) => {
                    if let Value::Double(score) = inner.as_ref() {
                        row.score = Some(*score);
                    }
                }
                other => panic!("unexpected field {other:?}"),
            }
        }
        row
    }
}
