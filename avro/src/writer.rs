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

//! Writing of Avro object container files.

use crate::{
    AvroResult, Codec,
    encode::{encode_bytes, encode_with_names},
    error::Details,
    reader::AVRO_OBJECT_HEADER,
    schema::{ResolvedSchema, Schema},
    types::Value,
    util::zig_i64,
};
use log::debug;
use std::{collections::BTreeMap, io::Write};

const DEFAULT_BLOCK_SIZE: usize = 16000;

/// Writes values of one schema as an object container file.
///
/// Values are buffered and written as a block once the buffer reaches `block_size`
/// bytes. The header is written together with the first block, or by [`Writer::flush`] /
/// [`Writer::into_inner`] when no value was appended. Call [`Writer::into_inner`] to make
/// sure everything reaches the underlying writer.
pub struct Writer<'a, W: Write> {
    writer: W,
    resolved_schema: ResolvedSchema<'a>,
    codec: Codec,
    block_size: usize,
    buffer: Vec<u8>,
    num_values: usize,
    marker: [u8; 16],
    has_header: bool,
    user_metadata: BTreeMap<String, Vec<u8>>,
}

#[bon::bon]
impl<'a, W: Write> Writer<'a, W> {
    #[builder(finish_fn = build)]
    pub fn builder(
        schema: &'a Schema,
        writer: W,
        #[builder(default = Codec::Null)] codec: Codec,
        #[builder(default = DEFAULT_BLOCK_SIZE)] block_size: usize,
        #[builder(default = generate_sync_marker())] marker: [u8; 16],
        #[builder(default)] user_metadata: BTreeMap<String, Vec<u8>>,
    ) -> AvroResult<Self> {
        if let Some(reserved) = user_metadata.keys().find(|key| key.starts_with("avro.")) {
            return Err(Details::InvalidMetadataKey(reserved.clone()).into());
        }
        Ok(Self {
            writer,
            resolved_schema: ResolvedSchema::try_from(schema)?,
            codec,
            block_size,
            buffer: Vec::with_capacity(block_size),
            num_values: 0,
            marker,
            has_header: false,
            user_metadata,
        })
    }
}

impl<'a, W: Write> Writer<'a, W> {
    /// Creates a `Writer` with the null codec and a random sync marker.
    pub fn new(schema: &'a Schema, writer: W) -> AvroResult<Self> {
        Self::builder().schema(schema).writer(writer).build()
    }

    /// Creates a `Writer` with the given codec and a random sync marker.
    pub fn with_codec(schema: &'a Schema, writer: W, codec: Codec) -> AvroResult<Self> {
        Self::builder()
            .schema(schema)
            .writer(writer)
            .codec(codec)
            .build()
    }

    pub fn schema(&self) -> &'a Schema {
        self.resolved_schema.get_root_schema()
    }

    /// Appends a value, writing a block if the buffer is full.
    ///
    /// Returns the number of bytes written to the underlying writer, which is zero
    /// while the value stays buffered. A value that does not conform to the schema is
    /// rejected and leaves the writer unchanged.
    pub fn append<T: Into<Value>>(&mut self, value: T) -> AvroResult<usize> {
        self.append_value_ref(&value.into())
    }

    pub fn append_value_ref(&mut self, value: &Value) -> AvroResult<usize> {
        encode_with_names(
            value,
            self.resolved_schema.get_root_schema(),
            self.resolved_schema.get_names(),
            &mut self.buffer,
        )?;
        self.num_values += 1;

        if self.buffer.len() >= self.block_size {
            return self.flush();
        }
        Ok(0)
    }

    /// Appends every value of `values`, stopping at the first that fails.
    pub fn extend<I, T: Into<Value>>(&mut self, values: I) -> AvroResult<usize>
    where
        I: IntoIterator<Item = T>,
    {
        let mut num_bytes = 0;
        for value in values {
            num_bytes += self.append(value)?;
        }
        Ok(num_bytes)
    }

    /// Adds a user metadata entry to the header. Must be called before the header is written.
    pub fn add_user_metadata<T: AsRef<[u8]>>(&mut self, key: String, value: T) -> AvroResult<()> {
        if self.has_header {
            return Err(Details::FileHeaderAlreadyWritten.into());
        }
        if key.starts_with("avro.") {
            return Err(Details::InvalidMetadataKey(key).into());
        }
        self.user_metadata.insert(key, value.as_ref().to_vec());
        Ok(())
    }

    /// Writes the header if needed and the buffered values as one block.
    ///
    /// Returns the number of bytes written.
    pub fn flush(&mut self) -> AvroResult<usize> {
        let mut num_bytes = self.maybe_write_header()?;
        if self.num_values == 0 {
            return Ok(num_bytes);
        }

        self.codec.compress(&mut self.buffer)?;

        let mut block = Vec::with_capacity(self.buffer.len() + 2 * 10 + self.marker.len());
        zig_i64(self.num_values as i64, &mut block);
        zig_i64(self.buffer.len() as i64, &mut block);
        block.extend_from_slice(&self.buffer);
        block.extend_from_slice(&self.marker);
        self.write_all(&block)?;
        num_bytes += block.len();

        debug!("Wrote a block of {} values", self.num_values);
        self.buffer.clear();
        self.num_values = 0;

        self.writer.flush().map_err(Details::FlushWriter)?;
        Ok(num_bytes)
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(mut self) -> AvroResult<W> {
        self.flush()?;
        Ok(self.writer)
    }

    fn write_all(&mut self, bytes: &[u8]) -> AvroResult<()> {
        self.writer
            .write_all(bytes)
            .map_err(|e| Details::WriteBytes(e).into())
    }

    fn header(&self) -> AvroResult<Vec<u8>> {
        let schema_text = self.schema().to_canonical_text()?;

        let mut header = Vec::new();
        header.extend_from_slice(AVRO_OBJECT_HEADER);
        zig_i64(2 + self.user_metadata.len() as i64, &mut header);
        encode_bytes(b"avro.schema", &mut header);
        encode_bytes(schema_text.as_bytes(), &mut header);
        encode_bytes(b"avro.codec", &mut header);
        encode_bytes(self.codec.name().as_bytes(), &mut header);
        for (key, value) in &self.user_metadata {
            encode_bytes(key.as_bytes(), &mut header);
            encode_bytes(value, &mut header);
        }
        header.push(0u8);
        header.extend_from_slice(&self.marker);
        Ok(header)
    }

    fn maybe_write_header(&mut self) -> AvroResult<usize> {
        if self.has_header {
            return Ok(0);
        }
        let header = self.header()?;
        self.write_all(&header)?;
        self.has_header = true;
        Ok(header.len())
    }
}

fn generate_sync_marker() -> [u8; 16] {
    rand::random()
}

/// Writes `values` of `schema` into an in-memory container with default settings.
pub fn to_container<I, T>(schema: &Schema, values: I) -> AvroResult<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: Into<Value>,
{
    let mut writer = Writer::new(schema, Vec::new())?;
    writer.extend(values)?;
    writer.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, Reader};
    type TestResult<T = ()> = anyhow::Result<T>;
    use pretty_assertions::assert_eq;

    const SCHEMA: &str =
        r#"{"type": "record", "name": "R", "fields": [{"name": "x", "type": "long"}]}"#;

    fn record(x: i64) -> Value {
        [("x", x)].into_iter().collect()
    }

    #[test]
    fn header_only_container() -> TestResult {
        let schema = Schema::parse_str(SCHEMA)?;
        let marker = [3u8; 16];
        let writer = Writer::builder()
            .schema(&schema)
            .writer(Vec::new())
            .marker(marker)
            .build()?;
        let bytes = writer.into_inner()?;
        assert!(bytes.starts_with(b"Obj\x01"));
        assert!(bytes.ends_with(&marker));

        let reader = Reader::new(&bytes)?;
        assert_eq!(reader.writer_schema(), &schema);
        assert_eq!(reader.count(), 0);
        Ok(())
    }

    #[test]
    fn one_block_layout() -> TestResult {
        let schema = Schema::parse_str(SCHEMA)?;
        let marker = [9u8; 16];
        let mut writer = Writer::builder()
            .schema(&schema)
            .writer(Vec::new())
            .marker(marker)
            .build()?;
        writer.extend([record(1), record(2)])?;
        let header_len = writer.flush()? - (2 + 2 + 16);
        let bytes = writer.into_inner()?;

        // count 2, size 2, the two longs, then the marker
        assert_eq!(&bytes[header_len..header_len + 4], &[0x04, 0x04, 0x02, 0x04]);
        assert_eq!(&bytes[header_len + 4..], &marker);
        Ok(())
    }

    #[test]
    fn invalid_value_is_rejected_without_side_effects() -> TestResult {
        let schema = Schema::parse_str(SCHEMA)?;
        let mut writer = Writer::new(&schema, Vec::new())?;
        assert!(std::ptr::eq(writer.schema(), &schema));
        writer.append(record(1))?;
        let err = writer.append(Value::from("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
        let bytes = writer.into_inner()?;
        let records = Reader::new(&bytes)?.collect::<AvroResult<Vec<_>>>()?;
        assert_eq!(records, vec![record(1)]);
        Ok(())
    }

    #[test]
    fn user_metadata() -> TestResult {
        let schema = Schema::parse_str(SCHEMA)?;
        let mut writer = Writer::new(&schema, Vec::new())?;
        writer.add_user_metadata("origin".to_string(), "test")?;
        assert!(matches!(
            writer
                .add_user_metadata("avro.custom".to_string(), "x")
                .unwrap_err()
                .details(),
            Details::InvalidMetadataKey(_)
        ));
        writer.append(record(5))?;
        let bytes = writer.into_inner()?;
        let reader = Reader::new(&bytes)?;
        assert_eq!(reader.user_metadata().get("origin"), Some(&b"test".to_vec()));
        Ok(())
    }

    #[test]
    fn metadata_after_header_is_rejected() -> TestResult {
        let schema = Schema::parse_str(SCHEMA)?;
        let mut writer = Writer::new(&schema, Vec::new())?;
        writer.flush()?;
        assert!(matches!(
            writer.add_user_metadata("late".to_string(), "x").unwrap_err().details(),
            Details::FileHeaderAlreadyWritten
        ));
        Ok(())
    }

    #[test]
    fn builder_rejects_reserved_metadata() -> TestResult {
        let schema = Schema::parse_str(SCHEMA)?;
        let result = Writer::builder()
            .schema(&schema)
            .writer(Vec::new())
            .user_metadata([("avro.schema".to_string(), b"x".to_vec())].into())
            .build();
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn small_blocks_split_values() -> TestResult {
        let schema = Schema::parse_str(SCHEMA)?;
        let mut writer = Writer::builder()
            .schema(&schema)
            .writer(Vec::new())
            .block_size(1)
            .build()?;
        let written = writer.append(record(1))?;
        assert!(written > 0, "a full buffer is flushed right away");
        let bytes = to_container(&schema, [record(1), record(2)])?;
        assert_eq!(Reader::new(&bytes)?.count(), 2);
        Ok(())
    }
}
