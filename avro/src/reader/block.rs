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

use crate::{
    AvroResult, Codec, Error,
    decode::decode_internal,
    error::Details,
    schema::{Names, Schema},
    types::Value,
    util::{read_array, read_bytes, read_len, safe_len, zag_i64},
};
use log::{debug, warn};
use std::{borrow::Cow, collections::HashMap, str::FromStr};

/// The 4 magic bytes every object container file starts with.
pub(crate) const AVRO_OBJECT_HEADER: &[u8] = b"Obj\x01";

/// Running out of input while reading the framing means the container was cut short.
fn framing<T>(result: AvroResult<T>) -> AvroResult<T> {
    result.map_err(|e| match e.details() {
        Details::Truncated { .. } => Details::TruncatedContainer.into(),
        Details::IntegerOverflow => Details::MalformedFraming.into(),
        _ => e,
    })
}

/// The parsed container header.
#[derive(Debug)]
pub(super) struct Header {
    pub(super) writer_schema: Schema,
    pub(super) codec: Codec,
    pub(super) marker: [u8; 16],
    pub(super) user_metadata: HashMap<String, Vec<u8>>,
}

impl Header {
    /// Reads the magic, the metadata map and the sync marker from the front of `input`.
    pub(super) fn read(input: &mut &[u8]) -> AvroResult<Self> {
        if !input.starts_with(AVRO_OBJECT_HEADER) {
            return Err(Details::HeaderMagic.into());
        }
        *input = &input[AVRO_OBJECT_HEADER.len()..];

        let metadata = framing(read_metadata(input))?;

        let schema_json = metadata
            .get("avro.schema")
            .ok_or(Details::GetAvroSchemaFromMap)?;
        let json: serde_json::Value =
            serde_json::from_slice(schema_json).map_err(Details::ParseSchemaJson)?;
        let writer_schema = Schema::parse(&json)?;

        let codec = match metadata.get("avro.codec") {
            None => Codec::Null,
            Some(name) => {
                let name = String::from_utf8_lossy(name);
                Codec::from_str(&name).map_err(|_: strum::ParseError| {
                    Details::CodecNotSupported(name.into_owned())
                })?
            }
        };

        let mut user_metadata = HashMap::new();
        for (key, value) in metadata {
            match key.as_str() {
                "avro.schema" | "avro.codec" => {}
                reserved if reserved.starts_with("avro.") => {
                    warn!("Ignoring unknown metadata key: {reserved}");
                }
                _ => {
                    user_metadata.insert(key, value);
                }
            }
        }

        let marker = framing(read_array::<16>(input))?;
        debug!("Read container header with codec {codec:?}");

        Ok(Header {
            writer_schema,
            codec,
            marker,
            user_metadata,
        })
    }
}

/// Reads the header metadata, a `map<bytes>` in the Avro encoding.
fn read_metadata(input: &mut &[u8]) -> AvroResult<HashMap<String, Vec<u8>>> {
    let mut metadata = HashMap::new();
    loop {
        let count = zag_i64(input)?;
        if count == 0 {
            return Ok(metadata);
        }
        if count < 0 {
            let _size = zag_i64(input)?;
        }
        for _ in 0..count.unsigned_abs() {
            let len = read_len(input)?;
            let key = String::from_utf8(read_bytes(input, len)?.to_vec())
                .map_err(Details::MetadataKeyUtf8)?;
            let len = read_len(input)?;
            let value = read_bytes(input, len)?.to_vec();
            if metadata.contains_key(&key) {
                return Err(Details::DuplicateMetadataKey(key).into());
            }
            metadata.insert(key, value);
        }
    }
}

/// One data block, possibly decompressed, and how far into it the reader is.
#[derive(Debug)]
pub(super) struct Block<'a> {
    data: Cow<'a, [u8]>,
    offset: usize,
    remaining: usize,
    index: usize,
}

impl<'a> Block<'a> {
    /// Reads the block at the front of `input` and checks the sync marker that closes it.
    pub(super) fn read(
        input: &mut &'a [u8],
        codec: Codec,
        marker: &[u8; 16],
        index: usize,
    ) -> AvroResult<Self> {
        let count = framing(zag_i64(input))?;
        let size = framing(zag_i64(input))?;
        let (Ok(remaining), Ok(byte_len)) = (usize::try_from(count), usize::try_from(size)) else {
            return Err(Details::InvalidBlockHeader { count, size }.into());
        };
        // Objects may take no bytes, so the count is bounded by the size of the decoded values.
        if safe_len(remaining.saturating_mul(size_of::<Value>())).is_err() {
            return Err(Details::InvalidBlockHeader { count, size }.into());
        }
        let data = framing(read_bytes(input, byte_len))?;
        let block_marker = framing(read_array::<16>(input))?;
        if &block_marker != marker {
            return Err(Details::SyncMismatch { block: index }.into());
        }
        Ok(Block {
            data: codec.decompress(data)?,
            offset: 0,
            remaining,
            index,
        })
    }

    pub(super) fn has_next(&self) -> bool {
        self.remaining > 0
    }

    pub(super) fn next_value(&mut self, schema: &Schema, names: &Names) -> AvroResult<Value> {
        let mut data = &self.data[self.offset..];
        let before = data.len();
        let value = decode_internal(schema, names, None, &mut data)?;
        self.offset += before - data.len();
        self.remaining -= 1;
        Ok(value)
    }

    /// Every byte of a block must belong to one of its objects.
    pub(super) fn finish(&self) -> AvroResult<()> {
        let left = self.data.len() - self.offset;
        if left == 0 {
            Ok(())
        } else {
            Err(Error::new(Details::BlockTrailingBytes {
                block: self.index,
                remaining: left,
            }))
        }
    }
}
