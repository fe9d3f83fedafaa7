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

//! Decoding of Avro binary data into dynamic values.

use crate::{
    AvroResult,
    error::Details,
    schema::{Name, NamespaceRef, ResolvedSchema, Schema, lookup},
    types::{Value, latin1_to_string},
    util::{read_array, read_bytes, read_len, safe_len, zag_i32, zag_i64},
};
use std::{borrow::Borrow, collections::HashMap, mem::size_of};

/// Decodes exactly one datum of `schema` from `bytes`.
///
/// Fails if the data is malformed or if bytes are left over after the datum.
pub fn from_avro_datum(schema: &Schema, bytes: &[u8]) -> AvroResult<Value> {
    let rs = ResolvedSchema::try_from(schema)?;
    let mut reader = bytes;
    let value = decode_internal(schema, rs.get_names(), None, &mut reader)?;
    if reader.is_empty() {
        Ok(value)
    } else {
        Err(Details::TrailingBytes(reader.len()).into())
    }
}

/// Decodes one datum of `schema` from the front of `reader`, advancing it past the datum.
pub fn decode(schema: &Schema, reader: &mut &[u8]) -> AvroResult<Value> {
    let rs = ResolvedSchema::try_from(schema)?;
    decode_internal(schema, rs.get_names(), None, reader)
}

fn decode_string(reader: &mut &[u8]) -> AvroResult<String> {
    let len = read_len(reader)?;
    let bytes = read_bytes(reader, len)?;
    String::from_utf8(bytes.to_vec()).map_err(|e| Details::ConvertToUtf8(e).into())
}

/// Reads the item count of the next block of an array or map.
///
/// A negative count is followed by the block size in bytes, which is skipped.
fn decode_block_len(reader: &mut &[u8]) -> AvroResult<usize> {
    let count = zag_i64(reader)?;
    let count = if count < 0 {
        let _size = zag_i64(reader)?;
        count.checked_neg().ok_or(Details::NegativeLength(count))?
    } else {
        count
    };
    let count = usize::try_from(count).map_err(|_| Details::NegativeLength(count))?;
    // Items may take no bytes at all, so the count is bounded by what the values would occupy.
    safe_len(count.saturating_mul(size_of::<Value>()))?;
    Ok(count)
}

pub(crate) fn decode_internal<S: Borrow<Schema>>(
    schema: &Schema,
    names: &HashMap<Name, S>,
    enclosing_namespace: NamespaceRef,
    reader: &mut &[u8],
) -> AvroResult<Value> {
    match schema {
        Schema::Ref { name } => {
            let resolved = lookup(names, name, enclosing_namespace)?;
            decode_internal(resolved, names, enclosing_namespace, reader)
        }
        Schema::Null => Ok(Value::Null),
        Schema::Boolean => match read_array::<1>(reader)? {
            [0] => Ok(Value::Boolean(false)),
            [1] => Ok(Value::Boolean(true)),
            [other] => Err(Details::BoolValue(other).into()),
        },
        Schema::Int => Ok(Value::Integer(i64::from(zag_i32(reader)?))),
        Schema::Long => Ok(Value::Integer(zag_i64(reader)?)),
        Schema::Float => Ok(Value::Floating(f64::from(f32::from_le_bytes(
            read_array(reader)?,
        )))),
        Schema::Double => Ok(Value::Floating(f64::from_le_bytes(read_array(reader)?))),
        Schema::Bytes => {
            let len = read_len(reader)?;
            Ok(Value::from_bytes(read_bytes(reader, len)?))
        }
        Schema::String => Ok(Value::String(decode_string(reader)?)),
        Schema::Fixed(fixed) => {
            let bytes = read_bytes(reader, safe_len(fixed.size)?)?;
            Ok(Value::String(latin1_to_string(bytes)))
        }
        Schema::Enum(enum_schema) => {
            let index = zag_i64(reader)?;
            usize::try_from(index)
                .ok()
                .and_then(|i| enum_schema.symbols.get(i))
                .map(|symbol| Value::String(symbol.clone()))
                .ok_or_else(|| {
                    Details::GetEnumValue {
                        index,
                        nsymbols: enum_schema.symbols.len(),
                    }
                    .into()
                })
        }
        Schema::Array(array) => {
            let mut items = Vec::new();
            loop {
                let len = decode_block_len(reader)?;
                if len == 0 {
                    break;
                }
                items.reserve(len.min(reader.len()));
                for _ in 0..len {
                    items.push(decode_internal(&array.items, names, enclosing_namespace, reader)?);
                }
            }
            Ok(Value::Array(items))
        }
        Schema::Map(map) => {
            let mut entries = HashMap::new();
            loop {
                let len = decode_block_len(reader)?;
                if len == 0 {
                    break;
                }
                entries.reserve(len.min(reader.len()));
                for _ in 0..len {
                    let key = decode_string(reader)?;
                    let value = decode_internal(&map.types, names, enclosing_namespace, reader)?;
                    entries.insert(key, value);
                }
            }
            Ok(Value::Map(entries))
        }
        Schema::Union(union) => {
            let index = zag_i64(reader)?;
            let variants = union.variants();
            let branch = usize::try_from(index)
                .ok()
                .and_then(|i| variants.get(i))
                .ok_or(Details::GetUnionVariant {
                    index,
                    num_variants: variants.len(),
                })?;
            decode_internal(branch, names, enclosing_namespace, reader)
        }
        Schema::Record(record) => {
            let record_namespace = record.name.namespace();
            let mut fields = HashMap::with_capacity(record.fields.len());
            for field in &record.fields {
                let value = decode_internal(&field.schema, names, record_namespace, reader)?;
                fields.insert(field.name.clone(), value);
            }
            Ok(Value::Map(fields))
        }
    }
}
