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

//! A single entry point over the schema model, the binary codec and the container format.
//!
//! An [`AvroObject`] is built once, from one of
//!
//! - the bytes of an object container file ([`AvroObject::from_container`]),
//! - a value alone ([`AvroObject::from_value`], [`AvroObject::from_json_str`]),
//! - a value and a schema ([`AvroObject::with_schema`]), which encodes the value right away,
//!
//! and is read-only afterwards. Accessors for data the object was never given fail with
//! an [`ErrorKind::InvalidState`](crate::ErrorKind::InvalidState) error.
//!
//! ```
//! use avro_object::{AvroObject, Origin, Value};
//!
//! let schema = r#"{"type": "record", "name": "R", "fields": [{"name": "x", "type": "long"}]}"#;
//! let object = AvroObject::with_schema(Value::from_json_str(r#"{"x": 1}"#)?, schema)?;
//! assert_eq!(object.binary_payload()?, &[0x02]);
//!
//! let container = object.container_bytes()?;
//! let read = AvroObject::from_container(&container)?;
//! assert_eq!(read.origin(), Origin::Container);
//! assert_eq!(read.schema()?, object.schema()?);
//! assert_eq!(read.decoded_value()?, object.value());
//! # Ok::<(), avro_object::Error>(())
//! ```

use crate::{
    AvroResult, Schema,
    encode::encode,
    error::Details,
    json::to_avro_json,
    reader::{self, open},
    types::Value,
    util::safe_len,
    writer::to_container,
};
use log::debug;
use serde_json::Value as JsonValue;
use std::{borrow::Cow, sync::Arc};

/// Where the schema of [`AvroObject::with_schema`] comes from.
#[derive(Clone, Debug)]
pub enum SchemaSource<'a> {
    /// JSON schema text.
    Text(&'a str),
    /// A schema description already parsed as JSON.
    Json(&'a JsonValue),
    /// A schema that was parsed before, possibly shared with other objects.
    Parsed(Arc<Schema>),
}

impl SchemaSource<'_> {
    fn into_schema(self) -> AvroResult<Arc<Schema>> {
        match self {
            SchemaSource::Text(text) => Schema::parse_str(text).map(Arc::new),
            SchemaSource::Json(json) => Schema::parse(json).map(Arc::new),
            SchemaSource::Parsed(schema) => Ok(schema),
        }
    }
}

impl<'a> From<&'a str> for SchemaSource<'a> {
    fn from(text: &'a str) -> Self {
        SchemaSource::Text(text)
    }
}

impl<'a> From<&'a String> for SchemaSource<'a> {
    fn from(text: &'a String) -> Self {
        SchemaSource::Text(text)
    }
}

impl<'a> From<&'a JsonValue> for SchemaSource<'a> {
    fn from(json: &'a JsonValue) -> Self {
        SchemaSource::Json(json)
    }
}

impl From<Arc<Schema>> for SchemaSource<'_> {
    fn from(schema: Arc<Schema>) -> Self {
        SchemaSource::Parsed(schema)
    }
}

impl From<Schema> for SchemaSource<'_> {
    fn from(schema: Schema) -> Self {
        SchemaSource::Parsed(Arc::new(schema))
    }
}

impl From<&Schema> for SchemaSource<'_> {
    fn from(schema: &Schema) -> Self {
        SchemaSource::Parsed(Arc::new(schema.clone()))
    }
}

/// How an [`AvroObject`] was constructed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Origin {
    /// Read from an object container file.
    Container,
    /// Built from a value, with or without a schema.
    Value,
}

#[derive(Clone, Debug)]
enum State {
    Container {
        bytes: Vec<u8>,
        schema: Arc<Schema>,
        /// All records when there are several or none, the record itself when there is one.
        decoded: Value,
        num_records: usize,
    },
    Pending {
        value: Value,
    },
    Encoded {
        value: Value,
        schema: Arc<Schema>,
        payload: Vec<u8>,
    },
}

/// Avro data together with the schema and the representations derived from it.
#[derive(Clone, Debug)]
pub struct AvroObject {
    state: State,
}

impl AvroObject {
    /// Whether `bytes` start like an object container file.
    pub fn is_container(bytes: &[u8]) -> bool {
        reader::is_container(bytes)
    }

    /// Reads every record of an object container file.
    pub fn from_container(bytes: &[u8]) -> AvroResult<Self> {
        let (schema, reader) = open(bytes)?;
        let mut records = Vec::new();
        for record in reader {
            safe_len((records.len() + 1).saturating_mul(size_of::<Value>()))?;
            records.push(record?);
        }
        let num_records = records.len();
        debug!("Read {num_records} records from a container of {} bytes", bytes.len());

        let decoded = match records.pop() {
            Some(record) if records.is_empty() => record,
            Some(last) => {
                records.push(last);
                Value::Array(records)
            }
            None => Value::Array(records),
        };
        Ok(AvroObject {
            state: State::Container {
                bytes: bytes.to_vec(),
                schema: Arc::new(schema),
                decoded,
                num_records,
            },
        })
    }

    /// Holds `value` without encoding it.
    pub fn from_value<T: Into<Value>>(value: T) -> Self {
        AvroObject {
            state: State::Pending {
                value: value.into(),
            },
        }
    }

    /// Holds the value of JSON `text` without encoding it.
    pub fn from_json_str(text: &str) -> AvroResult<Self> {
        Value::from_json_str(text).map(Self::from_value)
    }

    /// Encodes `value` with the schema from `schema`.
    ///
    /// Fails with the schema parsing error or the encoding error, in which case no
    /// object is built.
    pub fn with_schema<'s, T, S>(value: T, schema: S) -> AvroResult<Self>
    where
        T: Into<Value>,
        S: Into<SchemaSource<'s>>,
    {
        let source: SchemaSource = schema.into();
        let schema = source.into_schema()?;
        let value = value.into();
        let mut payload = Vec::new();
        encode(&value, &schema, &mut payload)?;
        debug!("Encoded a {:?} value into {} bytes", value.kind(), payload.len());
        Ok(AvroObject {
            state: State::Encoded {
                value,
                schema,
                payload,
            },
        })
    }

    pub fn origin(&self) -> Origin {
        match self.state {
            State::Container { .. } => Origin::Container,
            State::Pending { .. } | State::Encoded { .. } => Origin::Value,
        }
    }

    /// The binary encoding of the value given to [`AvroObject::with_schema`].
    pub fn binary_payload(&self) -> AvroResult<&[u8]> {
        match &self.state {
            State::Encoded { payload, .. } => Ok(payload),
            _ => Err(Details::Unpopulated("binary payload").into()),
        }
    }

    /// The schema the value was encoded with or the container was written with.
    pub fn schema(&self) -> AvroResult<&Arc<Schema>> {
        match &self.state {
            State::Container { schema, .. } | State::Encoded { schema, .. } => Ok(schema),
            State::Pending { .. } => Err(Details::Unpopulated("schema").into()),
        }
    }

    /// The records read from a container: the record itself when there is exactly one,
    /// an array of them otherwise.
    pub fn decoded_value(&self) -> AvroResult<&Value> {
        match &self.state {
            State::Container { decoded, .. } => Ok(decoded),
            _ => Err(Details::Unpopulated("decoded value").into()),
        }
    }

    /// The records read from a container, in block order.
    pub fn records(&self) -> AvroResult<&[Value]> {
        match &self.state {
            State::Container {
                decoded,
                num_records: 1,
                ..
            } => Ok(std::slice::from_ref(decoded)),
            State::Container {
                decoded: Value::Array(records),
                ..
            } => Ok(records),
            _ => Err(Details::Unpopulated("decoded value").into()),
        }
    }

    /// The value this object holds, whether given or decoded.
    pub fn value(&self) -> &Value {
        match &self.state {
            State::Container { decoded, .. } => decoded,
            State::Pending { value } | State::Encoded { value, .. } => value,
        }
    }

    /// The object as an object container file.
    ///
    /// This is the original input for objects read from a container, and a container
    /// holding the one encoded value otherwise.
    pub fn container_bytes(&self) -> AvroResult<Cow<'_, [u8]>> {
        match &self.state {
            State::Container { bytes, .. } => Ok(Cow::Borrowed(bytes)),
            State::Encoded { value, schema, .. } => {
                to_container(schema, [value.clone()]).map(Cow::Owned)
            }
            State::Pending { .. } => Err(Details::Unpopulated("schema").into()),
        }
    }

    /// The value as JSON.
    ///
    /// Objects with a schema render in the Avro JSON encoding, a container with several
    /// records as an array of them. Objects without a schema render as plain JSON.
    pub fn to_json(&self) -> AvroResult<JsonValue> {
        match &self.state {
            State::Container { schema, .. } => {
                let mut records = self
                    .records()?
                    .iter()
                    .map(|record| to_avro_json(record, schema))
                    .collect::<AvroResult<Vec<_>>>()?;
                match records.pop() {
                    Some(record) if records.is_empty() => Ok(record),
                    Some(last) => {
                        records.push(last);
                        Ok(JsonValue::Array(records))
                    }
                    None => Ok(JsonValue::Array(records)),
                }
            }
            State::Encoded { value, schema, .. } => to_avro_json(value, schema),
            State::Pending { value } => JsonValue::try_from(value.clone()),
        }
    }
}
