// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Rendering of values in the Avro JSON encoding.
//!
//! Unlike the plain conversion into [`serde_json::Value`], the Avro JSON encoding depends
//! on the schema: a non-null union value is wrapped in a single-entry object naming its
//! branch, and record fields left out of a value show up with their default.
//!
//! ```
//! # use avro_object::{Schema, types::Value, json::to_avro_json};
//! # use serde_json::json;
//! let schema = Schema::parse_str(r#"["null", "string"]"#)?;
//! assert_eq!(to_avro_json(&Value::from("a"), &schema)?, json!({"string": "a"}));
//! assert_eq!(to_avro_json(&Value::Null, &schema)?, json!(null));
//! # Ok::<(), avro_object::Error>(())
//! ```

use crate::{
    AvroResult,
    encode::{encode_with_names, float_to_long, select_branch},
    error::Details,
    schema::{Name, NamespaceRef, ResolvedSchema, Schema, lookup},
    types::Value,
};
use serde_json::{Map, Number, Value as JsonValue};
use std::{borrow::Borrow, collections::HashMap};

/// Renders `value` in the Avro JSON encoding of `schema`.
///
/// The value is validated against the schema first, so this fails exactly when encoding
/// it would, plus when a floating value is not finite.
pub fn to_avro_json(value: &Value, schema: &Schema) -> AvroResult<JsonValue> {
    let rs = ResolvedSchema::try_from(schema)?;
    encode_with_names(value, schema, rs.get_names(), &mut Vec::new())?;
    render(value, schema, rs.get_names(), None)
}

fn float(f: f64) -> AvroResult<JsonValue> {
    Number::from_f64(f)
        .map(JsonValue::Number)
        .ok_or_else(|| Details::ConvertF64ToJson(f).into())
}

fn render<S: Borrow<Schema>>(
    value: &Value,
    schema: &Schema,
    names: &HashMap<Name, S>,
    enclosing_namespace: NamespaceRef,
) -> AvroResult<JsonValue> {
    Ok(match (schema, value) {
        (Schema::Ref { name }, _) => {
            let resolved = lookup(names, name, enclosing_namespace)?;
            return render(value, resolved, names, enclosing_namespace);
        }
        (Schema::Long, Value::Floating(f)) => match float_to_long(*f) {
            Some(i) => i.into(),
            None => return float(*f),
        },
        (Schema::Float | Schema::Double, Value::Integer(i)) => return float(*i as f64),
        (Schema::Array(array), Value::Array(items)) => JsonValue::Array(
            items
                .iter()
                .map(|item| render(item, &array.items, names, enclosing_namespace))
                .collect::<AvroResult<_>>()?,
        ),
        (Schema::Map(map), Value::Map(entries)) => JsonValue::Object(
            entries
                .iter()
                .map(|(key, item)| {
                    render(item, &map.types, names, enclosing_namespace)
                        .map(|json| (key.clone(), json))
                })
                .collect::<AvroResult<_>>()?,
        ),
        (Schema::Record(record), Value::Map(fields)) => {
            let record_namespace = record.name.namespace();
            let mut object = Map::with_capacity(record.fields.len());
            for field in &record.fields {
                let given = fields.get(&field.name).or_else(|| {
                    field
                        .aliases
                        .iter()
                        .flatten()
                        .find_map(|alias| fields.get(alias))
                });
                let json = match (given, &field.default) {
                    (Some(v), _) => render(v, &field.schema, names, record_namespace)?,
                    (None, Some(default)) => render(
                        &Value::from(default.clone()),
                        &field.schema,
                        names,
                        record_namespace,
                    )?,
                    (None, None) => {
                        return Err(Details::MissingField {
                            path: "$".to_string(),
                            field: field.name.clone(),
                        }
                        .into());
                    }
                };
                object.insert(field.name.clone(), json);
            }
            JsonValue::Object(object)
        }
        (Schema::Union(union), _) => {
            let Some((_, branch, inner)) =
                select_branch(union, value, names, enclosing_namespace)
            else {
                return Err(Details::NoMatchingUnionBranch {
                    path: "$".to_string(),
                    value_kind: value.kind(),
                }
                .into());
            };
            if let Schema::Null = branch {
                JsonValue::Null
            } else {
                let mut object = Map::with_capacity(1);
                object.insert(
                    branch.branch_name().to_string(),
                    render(inner, branch, names, enclosing_namespace)?,
                );
                JsonValue::Object(object)
            }
        }
        (_, value) => JsonValue::try_from(value.clone())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    type TestResult<T = ()> = anyhow::Result<T>;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn record_with_unions_and_defaults() -> TestResult {
        let schema = Schema::parse_str(
            r#"{"type": "record", "name": "User", "namespace": "com.example", "fields": [
                {"name": "name", "type": "string"},
                {"name": "age", "type": ["null", "int"], "default": null},
                {"name": "tag", "type": ["null", {"type": "fixed", "name": "Tag", "size": 2}]},
                {"name": "friend", "type": ["null", "User"], "default": null}
            ]}"#,
        )?;
        let value = Value::from_json_str(
            r#"{"name": "a", "tag": "ÿ\u0000", "friend": {"name": "b", "age": 3, "tag": null}}"#,
        )?;
        assert_eq!(
            to_avro_json(&value, &schema)?,
            json!({
                "name": "a",
                "age": null,
                "tag": {"com.example.Tag": "\u{ff}\u{0}"},
                "friend": {"com.example.User": {
                    "name": "b",
                    "age": {"int": 3},
                    "tag": null,
                    "friend": null
                }}
            })
        );
        Ok(())
    }

    #[test]
    fn numbers_follow_the_schema() -> TestResult {
        assert_eq!(to_avro_json(&Value::Integer(2), &Schema::Double)?, json!(2.0));
        assert_eq!(to_avro_json(&Value::Floating(3.0), &Schema::Long)?, json!(3));
        let schema = Schema::parse_str(r#"["long", "double"]"#)?;
        assert_eq!(
            to_avro_json(&Value::Floating(1.5), &schema)?,
            json!({"double": 1.5})
        );
        Ok(())
    }

    #[test]
    fn collections() -> TestResult {
        let schema = Schema::parse_str(
            r#"{"type": "map", "values": {"type": "array", "items": ["string", "null"]}}"#,
        )?;
        let value = Value::from_json_str(r#"{"k": ["x", null]}"#)?;
        assert_eq!(
            to_avro_json(&value, &schema)?,
            json!({"k": [{"string": "x"}, null]})
        );
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() -> TestResult {
        let err = to_avro_json(&Value::from("x"), &Schema::Int).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
        let err = to_avro_json(&Value::Floating(f64::NAN), &Schema::Double).unwrap_err();
        assert!(matches!(err.details(), Details::ConvertF64ToJson(_)));
        Ok(())
    }
}
