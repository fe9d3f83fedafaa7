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

//! The dynamic value model shared by the encoder, the decoder and the object facade.

use crate::{AvroResult, error::Details};
use serde_json::{Number, Value as JsonValue};
use std::collections::HashMap;
use strum_macros::EnumDiscriminants;

/// A dynamically typed datum.
///
/// This is the shape values have before they are checked against a schema, and the
/// shape decoded data is returned in. Records are represented as [`Value::Map`], enum
/// symbols as [`Value::String`], and `bytes`/`fixed` data as a [`Value::String`] whose
/// characters are all in `U+0000..=U+00FF`, one character per byte.
#[derive(Clone, Debug, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(ValueKind), derive(Hash, Ord, PartialOrd))]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Floating(f64),
    String(String),
    Array(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        ValueKind::from(self)
    }

    /// Parses JSON text into a value.
    ///
    /// Integral JSON numbers that fit in an `i64` become [`Value::Integer`], every other
    /// number becomes [`Value::Floating`].
    pub fn from_json_str(text: &str) -> AvroResult<Self> {
        let json: JsonValue = serde_json::from_str(text).map_err(Details::ParseValueJson)?;
        Ok(Self::from(json))
    }

    /// Builds a value whose characters each carry one byte of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Value::String(latin1_to_string(bytes))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Looks up `key` when this value is a map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }
}

/// Maps each byte to the character with the same code point.
pub(crate) fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

/// The inverse of [`latin1_to_string`], returning the first character that does not fit in a byte on failure.
pub(crate) fn string_to_latin1(s: &str) -> Result<Vec<u8>, char> {
    s.chars().map(|ch| u8::try_from(ch).map_err(|_| ch)).collect()
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::Null
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Floating(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Floating(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Self>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T> From<Vec<T>> for Value
where
    T: Into<Self>,
{
    fn from(value: Vec<T>) -> Self {
        Self::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<T> From<HashMap<String, T>> for Value
where
    T: Into<Self>,
{
    fn from(value: HashMap<String, T>) -> Self {
        Self::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Collects key/value pairs into a [`Value::Map`].
impl<K, V> FromIterator<(K, V)> for Value
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => b.into(),
            JsonValue::Number(ref n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Floating(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => s.into(),
            JsonValue::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            JsonValue::Object(items) => {
                Self::Map(items.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// Plain JSON rendering of a value, without any union wrapping.
impl TryFrom<Value> for JsonValue {
    type Error = crate::error::Error;

    fn try_from(value: Value) -> AvroResult<Self> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Boolean(b) => Ok(Self::Bool(b)),
            Value::Integer(i) => Ok(Self::Number(i.into())),
            Value::Floating(f) => Number::from_f64(f)
                .map(Self::Number)
                .ok_or_else(|| Details::ConvertF64ToJson(f).into()),
            Value::String(s) => Ok(Self::String(s)),
            Value::Array(items) => items
                .into_iter()
                .map(Self::try_from)
                .collect::<Result<_, _>>()
                .map(Self::Array),
            Value::Map(items) => items
                .into_iter()
                .map(|(key, value)| Self::try_from(value).map(|v| (key, v)))
                .collect::<Result<_, _>>()
                .map(Self::Object),
        }
    }
}
