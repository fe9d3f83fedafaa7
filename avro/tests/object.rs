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

type TestResult<T = ()> = anyhow::Result<T>;
use avro_object::{AvroObject, ErrorKind, Origin, Schema, Value, from_avro_datum};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

const USER_SCHEMA: &str = r#"
{
    "namespace": "avroobject.test",
    "type": "record",
    "name": "User",
    "fields": [
        {"name": "UserName", "type": "string"},
        {"name": "Age", "type": ["int", "null"], "default": 1},
        {"name": "Active", "type": "boolean", "default": false}
    ]
}
"#;

fn user() -> TestResult<Value> {
    Ok(Value::from_json_str(
        r#"{"UserName": "Guionardo", "Age": 42, "Active": true}"#,
    )?)
}

#[test]
fn serialize_a_value_with_a_schema() -> TestResult {
    let object = AvroObject::with_schema(user()?, USER_SCHEMA)?;
    assert_eq!(object.origin(), Origin::Value);
    assert_eq!(object.binary_payload()?, b"\x12Guionardo\x00T\x01");
    assert_eq!(
        object.to_json()?,
        json!({"UserName": "Guionardo", "Age": {"int": 42}, "Active": true})
    );

    let schema = object.schema()?;
    assert_eq!(from_avro_datum(schema, object.binary_payload()?)?, user()?);
    Ok(())
}

#[test]
fn avro_json_input_is_accepted() -> TestResult {
    let object = AvroObject::from_json_str(
        r#"{"UserName": "Guionardo", "Age": {"int": 42}, "Active": true}"#,
    )?;
    assert_eq!(object.origin(), Origin::Value);
    assert_eq!(object.schema().unwrap_err().kind(), ErrorKind::InvalidState);

    let encoded = AvroObject::with_schema(object.value().clone(), USER_SCHEMA)?;
    assert_eq!(encoded.binary_payload()?, b"\x12Guionardo\x00T\x01");
    Ok(())
}

#[test]
fn nonconforming_values_are_rejected() -> TestResult {
    let value = Value::from_json_str(r#"{"UserName": "Guionardo", "Age": "42"}"#)?;
    let err = AvroObject::with_schema(value, USER_SCHEMA).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encode);
    assert!(err.to_string().contains("$.Age"), "{err}");
    Ok(())
}

#[test]
fn container_round_trip() -> TestResult {
    let object = AvroObject::with_schema(user()?, USER_SCHEMA)?;
    let bytes = object.container_bytes()?;
    assert!(AvroObject::is_container(&bytes));
    assert!(!AvroObject::is_container(object.binary_payload()?));

    let read = AvroObject::from_container(&bytes)?;
    assert_eq!(read.origin(), Origin::Container);
    assert_eq!(read.schema()?, object.schema()?);
    assert_eq!(read.decoded_value()?, &user()?);
    assert_eq!(read.to_json()?, object.to_json()?);
    assert_eq!(read.container_bytes()?, bytes);
    assert_eq!(
        read.binary_payload().unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    Ok(())
}

#[test]
fn one_parsed_schema_for_many_objects() -> TestResult {
    let schema = Arc::new(Schema::parse_str(USER_SCHEMA)?);
    let payloads = ["Ann", "Bob"]
        .into_iter()
        .map(|name| {
            let value: Value = [("UserName", name)].into_iter().collect();
            AvroObject::with_schema(value, Arc::clone(&schema))
                .and_then(|object| object.binary_payload().map(<[u8]>::to_vec))
        })
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(payloads, [b"\x06Ann\x00\x02\x00".to_vec(), b"\x06Bob\x00\x02\x00".to_vec()]);
    Ok(())
}

#[test]
fn schema_failures_keep_their_kind() {
    let err = AvroObject::with_schema(Value::Null, r#"{"type": "record", "name": "R"}"#)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);

    let err = AvroObject::from_container(b"not a container").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Container);
}
