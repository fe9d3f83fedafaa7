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
use avro_object::{ErrorKind, Schema, Value, decode, from_avro_datum, to_avro_datum};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case::null(r#""null""#, "null")]
#[case::boolean(r#""boolean""#, "false")]
#[case::int_min(r#""int""#, "-2147483648")]
#[case::long_max(r#""long""#, "9223372036854775807")]
#[case::float(r#""float""#, "-0.25")]
#[case::double(r#""double""#, "3.141592653589793")]
#[case::unicode_string(r#""string""#, r#""Olá, ☃""#)]
#[case::bytes(r#""bytes""#, r#""\u0000ÿ\u007f""#)]
#[case::empty_array(r#"{"type": "array", "items": "int"}"#, "[]")]
#[case::nested_arrays(
    r#"{"type": "array", "items": {"type": "array", "items": "string"}}"#,
    r#"[["a"], [], ["b", "c"]]"#
)]
#[case::map_of_unions(
    r#"{"type": "map", "values": ["null", "long", "string"]}"#,
    r#"{"a": null, "b": 7, "c": "x"}"#
)]
#[case::enum_symbol(
    r#"{"type": "enum", "name": "Suit", "symbols": ["SPADES", "HEARTS"]}"#,
    r#""HEARTS""#
)]
#[case::fixed(r#"{"type": "fixed", "name": "Md5", "size": 4}"#, r#""abc\u0000""#)]
#[case::record_with_everything(
    r#"{
        "type": "record",
        "name": "Everything",
        "namespace": "test.types",
        "fields": [
            {"name": "id", "type": "long"},
            {"name": "tags", "type": {"type": "array", "items": "string"}},
            {"name": "scores", "type": {"type": "map", "values": "double"}},
            {"name": "kind", "type": {"type": "enum", "name": "Kind", "symbols": ["A", "B"]}},
            {"name": "hash", "type": {"type": "fixed", "name": "Hash", "size": 2}},
            {"name": "other", "type": ["null", "Kind", "Hash"]}
        ]
    }"#,
    r#"{"id": -1, "tags": ["x"], "scores": {"s": 0.5}, "kind": "B", "hash": "hi", "other": "A"}"#
)]
fn values_survive_a_round_trip(#[case] schema: &str, #[case] value: &str) -> TestResult {
    let schema = Schema::parse_str(schema)?;
    let value = Value::from_json_str(value)?;
    let datum = to_avro_datum(&schema, value.clone())?;
    assert_eq!(from_avro_datum(&schema, &datum)?, value);
    Ok(())
}

#[test]
fn linked_list() -> TestResult {
    let schema = Schema::parse_str(
        r#"{
            "type": "record",
            "name": "Node",
            "fields": [
                {"name": "value", "type": "int"},
                {"name": "next", "type": ["null", "Node"], "default": null}
            ]
        }"#,
    )?;
    let value = Value::from_json_str(
        r#"{"value": 1, "next": {"value": 2, "next": {"value": 3, "next": null}}}"#,
    )?;
    let datum = to_avro_datum(&schema, value.clone())?;
    assert_eq!(datum, [0x02, 0x02, 0x04, 0x02, 0x06, 0x00]);
    assert_eq!(from_avro_datum(&schema, &datum)?, value);
    Ok(())
}

#[test]
fn mutually_recursive_types() -> TestResult {
    let schema = Schema::parse_str(
        r#"{
            "type": "record",
            "name": "Tree",
            "namespace": "forest",
            "fields": [
                {"name": "children", "type": {"type": "array", "items": {
                    "type": "record",
                    "name": "Branch",
                    "fields": [{"name": "tree", "type": ["null", "forest.Tree"]}]
                }}}
            ]
        }"#,
    )?;
    let value = Value::from_json_str(
        r#"{"children": [{"tree": null}, {"tree": {"children": []}}]}"#,
    )?;
    let datum = to_avro_datum(&schema, value.clone())?;
    assert_eq!(from_avro_datum(&schema, &datum)?, value);
    Ok(())
}

#[test]
fn defaults_are_filled_in() -> TestResult {
    let schema = Schema::parse_str(
        r#"{
            "type": "record",
            "name": "User",
            "namespace": "avroobject.test",
            "fields": [
                {"name": "UserName", "type": "string"},
                {"name": "Age", "type": ["int", "null"], "default": 1},
                {"name": "Active", "type": "boolean", "default": false}
            ]
        }"#,
    )?;
    let datum = to_avro_datum(&schema, Value::from_json_str(r#"{"UserName": "Guionardo"}"#)?)?;
    assert_eq!(
        from_avro_datum(&schema, &datum)?,
        Value::from_json_str(r#"{"UserName": "Guionardo", "Age": 1, "Active": false}"#)?
    );
    Ok(())
}

#[test]
fn tagged_union_values_decode_to_the_branch_value() -> TestResult {
    let schema = Schema::parse_str(r#"["null", "string", "bytes"]"#)?;
    let datum = to_avro_datum(&schema, Value::from_json_str(r#"{"bytes": "ÿ"}"#)?)?;
    assert_eq!(datum, [0x04, 0x02, 0xff]);
    assert_eq!(from_avro_datum(&schema, &datum)?, Value::from_bytes(&[0xff]));
    Ok(())
}

#[test]
fn consecutive_datums() -> TestResult {
    let schema = Schema::parse_str(r#""string""#)?;
    let mut bytes = to_avro_datum(&schema, "first")?;
    bytes.extend(to_avro_datum(&schema, "second")?);

    let mut reader = bytes.as_slice();
    assert_eq!(decode(&schema, &mut reader)?, Value::from("first"));
    assert_eq!(decode(&schema, &mut reader)?, Value::from("second"));
    assert!(reader.is_empty());

    let err = from_avro_datum(&schema, &bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    Ok(())
}

#[test]
fn encode_errors_name_the_missing_field() -> TestResult {
    let schema = Schema::parse_str(
        r#"{"type": "record", "name": "R", "fields": [{"name": "b", "type": "int"}]}"#,
    )?;
    let err = to_avro_datum(&schema, Value::from_json_str(r#"{"a": 1}"#)?).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encode);
    assert!(err.to_string().contains(r#""b""#), "{err}");
    Ok(())
}

#[test]
fn every_truncation_is_a_decode_error() -> TestResult {
    let schema = Schema::parse_str(
        r#"{"type": "record", "name": "R", "fields": [
            {"name": "s", "type": "string"},
            {"name": "d", "type": "double"},
            {"name": "m", "type": {"type": "map", "values": "long"}}
        ]}"#,
    )?;
    let datum = to_avro_datum(
        &schema,
        Value::from_json_str(r#"{"s": "abc", "d": 2.5, "m": {"k": 300}}"#)?,
    )?;
    for len in 0..datum.len() {
        let err = from_avro_datum(&schema, &datum[..len]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode, "prefix of {len} bytes");
    }
    Ok(())
}
