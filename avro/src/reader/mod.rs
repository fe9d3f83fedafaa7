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

//! Reading of Avro object container files held in memory.

mod block;

pub(crate) use block::AVRO_OBJECT_HEADER;

use crate::{
    AvroResult, Codec,
    schema::{Names, ResolvedSchema, Schema},
    types::Value,
};
use block::{Block, Header};
use std::collections::HashMap;

/// Whether `bytes` start like an object container file.
pub fn is_container(bytes: &[u8]) -> bool {
    bytes.starts_with(AVRO_OBJECT_HEADER)
}

/// Parses the container header of `bytes` and returns the writer schema with a
/// lazy stream of its records.
pub fn open(bytes: &[u8]) -> AvroResult<(Schema, Reader<'_>)> {
    let reader = Reader::new(bytes)?;
    Ok((reader.writer_schema().clone(), reader))
}

/// Iterates over the records of an object container file.
///
/// The header is parsed eagerly by [`Reader::new`]; blocks are read, checked against the
/// sync marker and decompressed one at a time as the iterator advances. The iterator
/// stops after the first error.
///
/// ```
/// # use avro_object::{Reader, Schema, Value, Writer};
/// let schema = Schema::parse_str(r#"{"type": "record", "name": "R", "fields": [{"name": "x", "type": "long"}]}"#)?;
/// let mut writer = Writer::new(&schema, Vec::new())?;
/// writer.append(Value::from_json_str(r#"{"x": 1}"#)?)?;
/// let bytes = writer.into_inner()?;
///
/// let reader = Reader::new(&bytes)?;
/// assert_eq!(reader.writer_schema(), &schema);
/// for record in reader {
///     println!("{:?}", record?);
/// }
/// # Ok::<(), avro_object::Error>(())
/// ```
#[derive(Debug)]
pub struct Reader<'a> {
    input: &'a [u8],
    header: Header,
    names: Names,
    block: Option<Block<'a>>,
    blocks_read: usize,
    errored: bool,
}

impl<'a> Reader<'a> {
    /// Reads the container header.
    pub fn new(bytes: &'a [u8]) -> AvroResult<Self> {
        let mut input = bytes;
        let header = Header::read(&mut input)?;
        let names = ResolvedSchema::try_from(&header.writer_schema)?.to_names();
        Ok(Reader {
            input,
            header,
            names,
            block: None,
            blocks_read: 0,
            errored: false,
        })
    }

    /// The schema the records were written with.
    pub fn writer_schema(&self) -> &Schema {
        &self.header.writer_schema
    }

    pub fn codec(&self) -> Codec {
        self.header.codec
    }

    pub fn sync_marker(&self) -> &[u8; 16] {
        &self.header.marker
    }

    /// The header metadata entries whose keys do not start with `avro.`.
    pub fn user_metadata(&self) -> &HashMap<String, Vec<u8>> {
        &self.header.user_metadata
    }

    fn read_next(&mut self) -> AvroResult<Option<Value>> {
        loop {
            if let Some(block) = &mut self.block {
                if block.has_next() {
                    return block
                        .next_value(&self.header.writer_schema, &self.names)
                        .map(Some);
                }
                block.finish()?;
                self.block = None;
            }
            // The end of the input right after a sync marker is the end of the container.
            if self.input.is_empty() {
                return Ok(None);
            }
            let block = Block::read(
                &mut self.input,
                self.header.codec,
                &self.header.marker,
                self.blocks_read,
            )?;
            self.blocks_read += 1;
            self.block = Some(block);
        }
    }
}

impl Iterator for Reader<'_> {
    type Item = AvroResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.errored {
            return None;
        }
        match self.read_next() {
            Ok(value) => value.map(Ok),
            Err(e) => {
                self.errored = true;
                Some(Err(e))
            }
        }
    }
}
