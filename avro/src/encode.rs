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

//! Encoding of dynamic values into the Avro binary format.

use crate::{
    AvroResult, Error,
    error::Details,
    schema::{
        Name, NamespaceRef, RecordField, ResolvedSchema, Schema, SchemaKind, UnionSchema, lookup,
    },
    types::{Value, string_to_latin1},
    util::{zig_i32, zig_i64},
};
use log::error;
use std::{
    borrow::Borrow,
    collections::HashMap,
    fmt::{self, Display, Formatter},
};

/// Encodes `value` as a single datum of `schema`, appending it to `buffer`.
///
/// Returns the number of bytes written. On failure `buffer` is left as it was.
pub fn encode(value: &Value, schema: &Schema, buffer: &mut Vec<u8>) -> AvroResult<usize> {
    let rs = ResolvedSchema::try_from(schema)?;
    encode_with_names(value, schema, rs.get_names(), buffer)
}

/// Encodes `value` as a single standalone datum of `schema`.
pub fn to_avro_datum<T: Into<Value>>(schema: &Schema, value: T) -> AvroResult<Vec<u8>> {
    let mut buffer = Vec::new();
    encode(&value.into(), schema, &mut buffer)?;
    Ok(buffer)
}

pub(crate) fn encode_with_names<S: Borrow<Schema>>(
    value: &Value,
    schema: &Schema,
    names: &HashMap<Name, S>,
    buffer: &mut Vec<u8>,
) -> AvroResult<usize> {
    let start = buffer.len();
    let mut path = Path::default();
    match encode_internal(value, schema, names, None, &mut path, buffer) {
        Ok(()) => Ok(buffer.len() - start),
        Err(e) => {
            buffer.truncate(start);
            Err(e)
        }
    }
}

pub(crate) fn encode_bytes(bytes: &[u8], buffer: &mut Vec<u8>) {
    zig_i64(bytes.len() as i64, buffer);
    buffer.extend_from_slice(bytes);
}

/// Location of a value inside the datum being encoded, rendered like `$.field[3]["key"]`.
#[derive(Debug, Default)]
struct Path(Vec<Segment>);

#[derive(Debug)]
enum Segment {
    Field(String),
    Index(usize),
    Key(String),
}

impl Path {
    fn scoped<T>(&mut self, segment: Segment, f: impl FnOnce(&mut Self) -> T) -> T {
        self.0.push(segment);
        let result = f(self);
        self.0.pop();
        result
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.0 {
            match segment {
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Index(i) => write!(f, "[{i}]")?,
                Segment::Key(key) => write!(f, "[{key:?}]")?,
            }
        }
        Ok(())
    }
}

fn mismatch(value: &Value, schema: &Schema, path: &Path) -> Error {
    let details = Details::EncodeValueAsSchema {
        path: path.to_string(),
        value_kind: value.kind(),
        schema_kind: SchemaKind::from(schema),
    };
    error!("{details}");
    details.into()
}

pub(crate) fn float_to_long(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

/// `i` as a double, if the double holds it exactly.
pub(crate) fn long_to_double(i: i64) -> Option<f64> {
    let f = i as f64;
    (float_to_long(f) == Some(i)).then_some(f)
}

/// `i` as a float, if the float holds it exactly.
pub(crate) fn long_to_float(i: i64) -> Option<f32> {
    let f = i as f32;
    (float_to_long(f64::from(f)) == Some(i)).then_some(f)
}

fn inexact(value: i64, schema: &Schema, path: &Path) -> Error {
    Details::InexactFloat {
        path: path.to_string(),
        value,
        schema_kind: SchemaKind::from(schema),
    }
    .into()
}

/// The value given for `field`, looked up by name and then by alias.
fn field_value<'v>(fields: &'v HashMap<String, Value>, field: &RecordField) -> Option<&'v Value> {
    fields.get(&field.name).or_else(|| {
        field
            .aliases
            .iter()
            .flatten()
            .find_map(|alias| fields.get(alias))
    })
}

fn encode_internal<S: Borrow<Schema>>(
    value: &Value,
    schema: &Schema,
    names: &HashMap<Name, S>,
    enclosing_namespace: NamespaceRef,
    path: &mut Path,
    buffer: &mut Vec<u8>,
) -> AvroResult<()> {
    match (schema, value) {
        (Schema::Ref { name }, _) => {
            let resolved = lookup(names, name, enclosing_namespace)?;
            encode_internal(value, resolved, names, enclosing_namespace, path, buffer)
        }
        (Schema::Null, Value::Null) => Ok(()),
        (Schema::Boolean, Value::Boolean(b)) => {
            buffer.push(u8::from(*b));
            Ok(())
        }
        (Schema::Int, Value::Integer(i)) => {
            let i = i32::try_from(*i).map_err(|_| Details::IntOutOfRange {
                path: path.to_string(),
                value: *i,
            })?;
            zig_i32(i, buffer);
            Ok(())
        }
        (Schema::Long, Value::Integer(i)) => {
            zig_i64(*i, buffer);
            Ok(())
        }
        (Schema::Long, Value::Floating(f)) => {
            let i = float_to_long(*f).ok_or_else(|| Details::LongNotIntegral {
                path: path.to_string(),
                value: *f,
            })?;
            zig_i64(i, buffer);
            Ok(())
        }
        (Schema::Float, Value::Integer(i)) => {
            let f = long_to_float(*i).ok_or_else(|| inexact(*i, schema, path))?;
            buffer.extend_from_slice(&f.to_le_bytes());
            Ok(())
        }
        (Schema::Float, Value::Floating(f)) => {
            buffer.extend_from_slice(&(*f as f32).to_le_bytes());
            Ok(())
        }
        (Schema::Double, Value::Integer(i)) => {
            let f = long_to_double(*i).ok_or_else(|| inexact(*i, schema, path))?;
            buffer.extend_from_slice(&f.to_le_bytes());
            Ok(())
        }
        (Schema::Double, Value::Floating(f)) => {
            buffer.extend_from_slice(&f.to_le_bytes());
            Ok(())
        }
        (Schema::String, Value::String(s)) => {
            encode_bytes(s.as_bytes(), buffer);
            Ok(())
        }
        (Schema::Bytes, Value::String(s)) => {
            let bytes = string_to_latin1(s).map_err(|ch| Details::ByteOutOfRange {
                path: path.to_string(),
                ch,
            })?;
            encode_bytes(&bytes, buffer);
            Ok(())
        }
        (Schema::Fixed(fixed), Value::String(s)) => {
            let bytes = string_to_latin1(s).map_err(|ch| Details::ByteOutOfRange {
                path: path.to_string(),
                ch,
            })?;
            if bytes.len() != fixed.size {
                return Err(Details::FixedSizeMismatch {
                    path: path.to_string(),
                    size: fixed.size,
                    n: bytes.len(),
                }
                .into());
            }
            buffer.extend_from_slice(&bytes);
            Ok(())
        }
        (Schema::Enum(enum_schema), Value::String(symbol)) => {
            let index = enum_schema
                .symbols
                .iter()
                .position(|s| s == symbol)
                .ok_or_else(|| Details::EnumSymbolNotFound {
                    path: path.to_string(),
                    symbol: symbol.clone(),
                    symbols: enum_schema.symbols.clone(),
                })?;
            zig_i64(index as i64, buffer);
            Ok(())
        }
        (Schema::Array(array), Value::Array(items)) => {
            if !items.is_empty() {
                zig_i64(items.len() as i64, buffer);
                for (i, item) in items.iter().enumerate() {
                    path.scoped(Segment::Index(i), |path| {
                        encode_internal(
                            item,
                            &array.items,
                            names,
                            enclosing_namespace,
                            path,
                            buffer,
                        )
                    })?;
                }
            }
            buffer.push(0u8);
            Ok(())
        }
        (Schema::Map(map), Value::Map(entries)) => {
            if !entries.is_empty() {
                zig_i64(entries.len() as i64, buffer);
                // Sorted so that equal maps always produce equal bytes.
                let mut entries: Vec<_> = entries.iter().collect();
                entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
                for (key, item) in entries {
                    encode_bytes(key.as_bytes(), buffer);
                    path.scoped(Segment::Key(key.clone()), |path| {
                        encode_internal(item, &map.types, names, enclosing_namespace, path, buffer)
                    })?;
                }
            }
            buffer.push(0u8);
            Ok(())
        }
        (Schema::Record(record), Value::Map(fields)) => {
            let record_namespace = record.name.namespace();
            for field in &record.fields {
                let default;
                let field_value = match (field_value(fields, field), &field.default) {
                    (Some(v), _) => v,
                    (None, Some(json)) => {
                        default = Value::from(json.clone());
                        &default
                    }
                    (None, None) => {
                        return Err(Details::MissingField {
                            path: path.to_string(),
                            field: field.name.clone(),
                        }
                        .into());
                    }
                };
                path.scoped(Segment::Field(field.name.clone()), |path| {
                    encode_internal(
                        field_value,
                        &field.schema,
                        names,
                        record_namespace,
                        path,
                        buffer,
                    )
                })?;
            }
            Ok(())
        }
        (Schema::Union(union), _) => {
            let (index, branch, inner) = select_branch(union, value, names, enclosing_namespace)
                .ok_or_else(|| Details::NoMatchingUnionBranch {
                    path: path.to_string(),
                    value_kind: value.kind(),
                })?;
            zig_i64(index as i64, buffer);
            encode_internal(inner, branch, names, enclosing_namespace, path, buffer)
        }
        _ => Err(mismatch(value, schema, path)),
    }
}

/// The unnamed schema kinds that hold `value` without conversion, best first.
fn natural_kinds(value: &Value) -> &'static [SchemaKind] {
    match value {
        Value::Null => &[SchemaKind::Null],
        Value::Boolean(_) => &[SchemaKind::Boolean],
        Value::Integer(i) if i32::try_from(*i).is_ok() => &[SchemaKind::Int, SchemaKind::Long],
        Value::Integer(_) => &[SchemaKind::Long],
        Value::Floating(_) => &[SchemaKind::Double, SchemaKind::Float],
        Value::String(_) => &[SchemaKind::String],
        Value::Array(_) => &[SchemaKind::Array],
        Value::Map(_) => &[SchemaKind::Map],
    }
}

/// Picks the union branch a value is encoded with.
///
/// A branch of the value's own kind wins (an integer goes to `int` or `long` before
/// `double`). Next comes the first branch the value matches after widening. Failing
/// that, a single-entry map whose key names a branch (`{"int": 3}`,
/// `{"com.example.User": {...}}`) selects that branch for the entry's value.
pub(crate) fn select_branch<'u, 'v, S: Borrow<Schema>>(
    union: &'u UnionSchema,
    value: &'v Value,
    names: &HashMap<Name, S>,
    enclosing_namespace: NamespaceRef,
) -> Option<(usize, &'u Schema, &'v Value)> {
    let variants = union.variants();
    if let Some(index) = natural_kinds(value)
        .iter()
        .filter_map(|kind| union.index_of_kind(*kind))
        .find(|&index| value_matches(value, &variants[index], names, enclosing_namespace))
    {
        return Some((index, &variants[index], value));
    }

    if let Some((index, branch)) = union
        .variants()
        .iter()
        .enumerate()
        .find(|(_, branch)| value_matches(value, branch, names, enclosing_namespace))
    {
        return Some((index, branch, value));
    }

    let Value::Map(map) = value else {
        return None;
    };
    let mut entries = map.iter();
    let (Some((tag, inner)), None) = (entries.next(), entries.next()) else {
        return None;
    };
    union
        .variants()
        .iter()
        .enumerate()
        .find(|(_, branch)| {
            (branch.branch_name() == tag || branch.name().is_some_and(|name| name.name() == tag))
                && value_matches(inner, branch, names, enclosing_namespace)
        })
        .map(|(index, branch)| (index, branch, inner))
}

/// Whether `value` can be encoded with `schema`, without encoding it.
pub(crate) fn value_matches<S: Borrow<Schema>>(
    value: &Value,
    schema: &Schema,
    names: &HashMap<Name, S>,
    enclosing_namespace: NamespaceRef,
) -> bool {
    match (schema, value) {
        (Schema::Ref { name }, _) => lookup(names, name, enclosing_namespace)
            .is_ok_and(|resolved| value_matches(value, resolved, names, enclosing_namespace)),
        (Schema::Null, Value::Null)
        | (Schema::Boolean, Value::Boolean(_))
        | (Schema::Long, Value::Integer(_))
        | (Schema::Float | Schema::Double, Value::Floating(_))
        | (Schema::String, Value::String(_)) => true,
        (Schema::Float, Value::Integer(i)) => long_to_float(*i).is_some(),
        (Schema::Double, Value::Integer(i)) => long_to_double(*i).is_some(),
        (Schema::Int, Value::Integer(i)) => i32::try_from(*i).is_ok(),
        (Schema::Long, Value::Floating(f)) => float_to_long(*f).is_some(),
        (Schema::Bytes, Value::String(s)) => string_to_latin1(s).is_ok(),
        (Schema::Fixed(fixed), Value::String(s)) => {
            string_to_latin1(s).is_ok_and(|bytes| bytes.len() == fixed.size)
        }
        (Schema::Enum(enum_schema), Value::String(s)) => enum_schema.symbols.contains(s),
        (Schema::Array(array), Value::Array(items)) => items
            .iter()
            .all(|item| value_matches(item, &array.items, names, enclosing_namespace)),
        (Schema::Map(map), Value::Map(entries)) => entries
            .values()
            .all(|item| value_matches(item, &map.types, names, enclosing_namespace)),
        (Schema::Record(record), Value::Map(fields)) => {
            let record_namespace = record.name.namespace();
            record
                .fields
                .iter()
                .all(|field| match field_value(fields, field) {
                    Some(v) => value_matches(v, &field.schema, names, record_namespace),
                    None => field.has_default(),
                })
        }
        (Schema::Union(union), _) => {
            select_branch(union, value, names, enclosing_namespace).is_some()
        }
        _ => false,
    }
}
