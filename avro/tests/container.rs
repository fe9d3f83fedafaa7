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
use avro_object::{
    Codec, DeflateSettings, ErrorKind, Reader, Schema, Value, Writer, error::Details, open,
    util::zig_i64,
};
use hex_literal::hex;
use pretty_assertions::assert_eq;
use rstest::rstest;

const RECORD_SCHEMA: &str = r#"{"type":"record","name":"R","fields":[{"name":"x","type":"long"}]}"#;

const MARKER: [u8; 16] = hex!("e0a49244e58479890e307acec9a118e5");

fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    zig_i64(bytes.len() as i64, out);
    out.extend_from_slice(bytes);
}

/// Lays out a container by hand: the header with the given metadata, then one block per
/// entry of `blocks` as `(object count, block data)`.
fn synthesize(metadata: &[(&str, &[u8])], blocks: &[(i64, &[u8])]) -> Vec<u8> {
    let mut out = b"Obj\x01".to_vec();
    zig_i64(metadata.len() as i64, &mut out);
    for (key, value) in metadata {
        encode_bytes(key.as_bytes(), &mut out);
        encode_bytes(value, &mut out);
    }
    out.push(0);
    out.extend_from_slice(&MARKER);
    for (count, data) in blocks {
        zig_i64(*count, &mut out);
        encode_bytes(data, &mut out);
        out.extend_from_slice(&MARKER);
    }
    out
}

fn record(x: i64) -> Value {
    [("x", x)].into_iter().collect()
}

#[test]
fn open_recovers_schema_and_records() -> TestResult {
    let bytes = synthesize(
        &[("avro.schema", RECORD_SCHEMA.as_bytes())],
        &[(2, &[0x02, 0x04])],
    );
    let (schema, records) = open(&bytes)?;
    assert_eq!(schema, Schema::parse_str(RECORD_SCHEMA)?);
    assert_eq!(
        records.collect::<Result<Vec<_>, _>>()?,
        vec![record(1), record(2)]
    );
    Ok(())
}

#[test]
fn container_written_by_another_implementation() -> TestResult {
    // Header entries in the order another writer chose, codec first.
    let schema = r#"{"type": "record", "name": "User", "namespace": "avroobject.test", "fields": [{"type": "string", "name": "UserName"}, {"type": ["int", "null"], "name": "Age", "default": 1}, {"type": "boolean", "name": "Active", "default": false}]}"#;
    let bytes = synthesize(
        &[("avro.codec", b"null"), ("avro.schema", schema.as_bytes())],
        &[(1, b"\x12Guionardo\x00T\x01")],
    );
    let (schema, records) = open(&bytes)?;
    assert_eq!(schema.name().map(|name| name.fullname()), Some("avroobject.test.User"));
    assert_eq!(
        records.collect::<Result<Vec<_>, _>>()?,
        vec![Value::from_json_str(
            r#"{"UserName": "Guionardo", "Age": 42, "Active": true}"#
        )?]
    );
    Ok(())
}

#[test]
fn defaults_of_the_wrong_type_are_rejected() {
    let schema = r#"{"type": "record", "name": "User", "fields": [{"type": ["int", "null"], "name": "Age", "default": "1"}]}"#;
    let bytes = synthesize(&[("avro.schema", schema.as_bytes())], &[]);
    let err = open(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
}

#[rstest]
#[case::first_byte(0)]
#[case::last_byte(15)]
fn corrupted_sync_marker(#[case] offset: usize) -> TestResult {
    let mut bytes = synthesize(
        &[("avro.schema", RECORD_SCHEMA.as_bytes())],
        &[(1, &[0x02]), (1, &[0x04])],
    );
    // The marker after the first block ends where the second block starts.
    let second_block = bytes.len() - (1 + 1 + 1 + 16);
    bytes[second_block - 16 + offset] ^= 0x01;

    let mut reader = Reader::new(&bytes)?;
    let err = reader.next().and_then(Result::err).map(|e| e.into_details());
    assert!(matches!(err, Some(Details::SyncMismatch { block: 0 })), "{err:?}");
    assert!(reader.next().is_none());
    Ok(())
}

#[test]
fn truncation_anywhere_is_detected() -> TestResult {
    let bytes = synthesize(
        &[("avro.schema", RECORD_SCHEMA.as_bytes())],
        &[(2, &[0x02, 0x04])],
    );
    let header_len = bytes.len() - (1 + 1 + 2 + 16);
    for len in header_len + 1..bytes.len() {
        let result = Reader::new(&bytes[..len])?.collect::<Result<Vec<_>, _>>();
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Container, "prefix of {len} bytes");
    }
    for len in 4..header_len {
        let err = Reader::new(&bytes[..len]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Container, "prefix of {len} bytes");
    }
    Ok(())
}

#[test]
fn unknown_codecs_are_unsupported() {
    let bytes = synthesize(
        &[("avro.schema", RECORD_SCHEMA.as_bytes()), ("avro.codec", b"zstandard")],
        &[],
    );
    let err = Reader::new(&bytes).unwrap_err();
    assert_eq!(err.to_string(), "unsupported codec: zstandard");
    assert_eq!(err.kind(), ErrorKind::Container);
}

#[rstest]
#[case::null(Codec::Null)]
#[case::deflate(Codec::Deflate(DeflateSettings::default()))]
#[case::deflate_fastest(Codec::Deflate(DeflateSettings::new(1)))]
#[cfg_attr(feature = "snappy", case::snappy(Codec::Snappy))]
fn many_blocks_with_every_codec(#[case] codec: Codec) -> TestResult {
    let schema = Schema::parse_str(
        r#"{"type": "record", "name": "Line", "fields": [
            {"name": "n", "type": "long"},
            {"name": "text", "type": "string"}
        ]}"#,
    )?;
    let lines: Vec<Value> = (0..500)
        .map(|n| {
            [
                ("n", Value::from(n as i64)),
                ("text", Value::from(format!("line number {n}"))),
            ]
            .into_iter()
            .collect()
        })
        .collect();

    let mut writer = Writer::builder()
        .schema(&schema)
        .writer(Vec::new())
        .codec(codec)
        .block_size(512)
        .build()?;
    writer.extend(lines.iter().cloned())?;
    let bytes = writer.into_inner()?;

    let reader = Reader::new(&bytes)?;
    assert_eq!(reader.codec().name(), codec.name());
    assert_eq!(reader.collect::<Result<Vec<_>, _>>()?, lines);
    Ok(())
}
