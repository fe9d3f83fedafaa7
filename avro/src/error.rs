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

//! Errors returned by every fallible operation of the crate.
//!
//! All failures are reported as an [`Error`], a thin boxed wrapper around [`Details`].
//! Use [`Error::kind`] to tell a bad schema from bad data from a bad container.

use crate::{
    schema::{Name, SchemaKind},
    types::ValueKind,
};
use std::{error::Error as _, fmt};

/// Errors encountered while parsing schemas, encoding, decoding or reading containers.
///
/// To inspect the details of the error use [`details`](Self::details) or
/// [`into_details`](Self::into_details).
#[derive(thiserror::Error, Debug)]
#[repr(transparent)]
#[error(transparent)]
pub struct Error {
    details: Box<Details>,
}

impl Error {
    pub fn new(details: Details) -> Self {
        Self {
            details: Box::new(details),
        }
    }

    pub fn details(&self) -> &Details {
        &self.details
    }

    pub fn into_details(self) -> Details {
        *self.details
    }

    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        self.details.kind()
    }
}

impl From<Details> for Error {
    fn from(details: Details) -> Self {
        Self::new(details)
    }
}

/// The broad category of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The schema text is malformed or violates a structural rule.
    Schema,
    /// A value does not conform to the schema it is encoded with.
    Encode,
    /// Binary data is malformed, truncated or inconsistent with its schema.
    Decode,
    /// The container framing is broken: magic, codec, sync marker or truncation.
    Container,
    /// An accessor was called for data that was never populated.
    InvalidState,
    /// The input cannot be interpreted as a dynamic value at all.
    Value,
}

#[derive(thiserror::Error)]
pub enum Details {
    #[error("Failed to parse schema from JSON")]
    ParseSchemaJson(#[source] serde_json::Error),

    #[error("Must be a JSON string, object or array")]
    ParseSchemaFromValidJson,

    #[error("Unknown primitive type: {0}")]
    ParsePrimitive(String),

    #[error("Unknown type: {0}. Did you mean {1}?")]
    ParsePrimitiveSimilar(String, &'static str),

    #[error(
        "Invalid schema: There is no type called '{0}', if you meant to define a non-primitive schema, it should be defined inside `type` attribute."
    )]
    InvalidSchemaRecord(String),

    #[error("Unknown complex type: {0}")]
    GetComplexType(serde_json::Value),

    #[error("No `type` in complex type")]
    GetComplexTypeField,

    #[error("`logicalType` must be a string, got: {0}")]
    GetLogicalTypeFieldType(serde_json::Value),

    #[error("No `name` field")]
    GetNameField,

    #[error("No `name` in record field")]
    GetNameFieldFromRecord,

    #[error("No `type` in record field {0:?}")]
    GetRecordFieldTypeField(String),

    #[error("No `fields` in record, or `fields` is not an array of objects")]
    GetRecordFieldsJson,

    #[error("Duplicate field name {0}")]
    FieldNameDuplicate(String),

    #[error("Invalid field name {0}")]
    FieldName(String),

    #[error("Default value for field {0:?} of record {1:?} is not valid for its schema {2}")]
    GetDefaultRecordField(String, String, String),

    #[error("No `symbols` field in enum")]
    GetEnumSymbolsField,

    #[error("Unable to parse `symbols` in enum: all symbols must be strings")]
    GetEnumSymbols,

    #[error("Duplicate enum symbol {0}")]
    EnumSymbolDuplicate(String),

    #[error("Invalid enum symbol name {0}")]
    EnumSymbolName(String),

    #[error("Default value for an enum must be a string! Got: {0}")]
    EnumDefaultWrongType(serde_json::Value),

    #[error("Enum default {symbol:?} is not among allowed symbols {symbols:?}")]
    GetEnumDefault {
        symbol: String,
        symbols: Vec<String>,
    },

    #[error("No `items` in array")]
    GetArrayItemsField,

    #[error("No `values` in map")]
    GetMapValuesField,

    #[error("No `size` in fixed")]
    GetFixedSizeField,

    #[error("Fixed schema's size must be a non-negative integer, got: {0}")]
    GetFixedSizeFieldPositive(serde_json::Value),

    #[error("Unions cannot contain duplicate types, found at least two {0}")]
    GetUnionDuplicate(String),

    #[error("Unions may not directly contain a union")]
    GetNestedUnion,

    #[error("Invalid schema name {0}. It must match the regex '{1}'")]
    InvalidSchemaName(String, &'static str),

    #[error("Invalid namespace {0}. It must match the regex '{1}'")]
    InvalidNamespace(String, &'static str),

    #[error("Two named schemas defined for the same fullname: {0}")]
    NameCollision(String),

    #[error("Unresolved schema reference: {0}")]
    SchemaResolutionError(Name),

    #[error("Failed to convert JSON to string")]
    ConvertJsonToString(#[source] serde_json::Error),

    #[error("Value at {path} of kind {value_kind:?} cannot be encoded as {schema_kind:?}")]
    EncodeValueAsSchema {
        path: String,
        value_kind: ValueKind,
        schema_kind: SchemaKind,
    },

    #[error("Record field {field:?} is missing at {path} and has no default")]
    MissingField { path: String, field: String },

    #[error("Value {value} at {path} does not fit in a 32-bit int")]
    IntOutOfRange { path: String, value: i64 },

    #[error("Value {value} at {path} is not an integral number that fits in a long")]
    LongNotIntegral { path: String, value: f64 },

    #[error("Value {value} at {path} cannot be stored exactly as a {schema_kind:?}")]
    InexactFloat {
        path: String,
        value: i64,
        schema_kind: SchemaKind,
    },

    #[error("Symbol {symbol:?} at {path} is not one of {symbols:?}")]
    EnumSymbolNotFound {
        path: String,
        symbol: String,
        symbols: Vec<String>,
    },

    #[error("Fixed value at {path} has {n} bytes, the schema requires {size}")]
    FixedSizeMismatch { path: String, size: usize, n: usize },

    #[error("Character {ch:?} at {path} cannot be stored in a byte")]
    ByteOutOfRange { path: String, ch: char },

    #[error("Value at {path} of kind {value_kind:?} matches no branch of the union")]
    NoMatchingUnionBranch { path: String, value_kind: ValueKind },

    #[error("Unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Variable-length integer does not terminate within 10 bytes")]
    IntegerOverflow,

    #[error("Decoded long {1} does not fit in an int")]
    ZagI32(#[source] std::num::TryFromIntError, i64),

    #[error("Invalid u8 for bool: {0}")]
    BoolValue(u8),

    #[error("Negative length prefix: {0}")]
    NegativeLength(i64),

    #[error("Unable to allocate {desired} bytes (maximum allowed: {maximum})")]
    MemoryAllocation { desired: usize, maximum: usize },

    #[error("Invalid utf-8 string")]
    ConvertToUtf8(#[source] std::string::FromUtf8Error),

    #[error("Union index {index} out of bounds: {num_variants}")]
    GetUnionVariant { index: i64, num_variants: usize },

    #[error("Enum value index {index} is out of bounds {nsymbols}")]
    GetEnumValue { index: i64, nsymbols: usize },

    #[error("{0} bytes left over after decoding the datum")]
    TrailingBytes(usize),

    #[error("Wrong magic in header")]
    HeaderMagic,

    #[error("truncated container")]
    TruncatedContainer,

    #[error("malformed variable-length integer in the container framing")]
    MalformedFraming,

    #[error("sync mismatch after block {block}")]
    SyncMismatch { block: usize },

    #[error("unsupported codec: {0}")]
    CodecNotSupported(String),

    #[error("No `avro.schema` in the container metadata")]
    GetAvroSchemaFromMap,

    #[error("Metadata key {0:?} appears more than once in the container header")]
    DuplicateMetadataKey(String),

    #[error("Container metadata key is not valid utf-8")]
    MetadataKeyUtf8(#[source] std::string::FromUtf8Error),

    #[error("Invalid block header: {count} objects in {size} bytes")]
    InvalidBlockHeader { count: i64, size: i64 },

    #[error("Block {block} has {remaining} bytes left after its last object")]
    BlockTrailingBytes { block: usize, remaining: usize },

    #[error("Failed to decompress with deflate: {0}")]
    DeflateDecompress(String),

    #[cfg(feature = "snappy")]
    #[error("Failed to decompress with snappy")]
    SnappyDecompress(#[source] snap::Error),

    #[cfg(feature = "snappy")]
    #[error("Failed to compress with snappy")]
    SnappyCompress(#[source] snap::Error),

    #[cfg(feature = "snappy")]
    #[error("Bad Snappy CRC32; expected {expected:x} but got {actual:x}")]
    SnappyCrc32 { expected: u32, actual: u32 },

    #[error("Metadata keys starting with 'avro.' are reserved for internal usage: {0}.")]
    InvalidMetadataKey(String),

    #[error("The file metadata is already flushed.")]
    FileHeaderAlreadyWritten,

    #[error("Failed to write bytes")]
    WriteBytes(#[source] std::io::Error),

    #[error("Failed to flush the underlying writer")]
    FlushWriter(#[source] std::io::Error),

    #[error("The {0} of this object was never populated")]
    Unpopulated(&'static str),

    #[error("Failed to parse a value from JSON")]
    ParseValueJson(#[source] serde_json::Error),

    #[error("Failed to convert float {0} to JSON")]
    ConvertF64ToJson(f64),
}

impl Details {
    /// The category this failure belongs to.
    pub fn kind(&self) -> ErrorKind {
        use Details::*;
        match self {
            ParseSchemaJson(_)
            | ParseSchemaFromValidJson
            | ParsePrimitive(_)
            | ParsePrimitiveSimilar(..)
            | InvalidSchemaRecord(_)
            | GetComplexType(_)
            | GetComplexTypeField
            | GetLogicalTypeFieldType(_)
            | GetNameField
            | GetNameFieldFromRecord
            | GetRecordFieldTypeField(_)
            | GetRecordFieldsJson
            | FieldNameDuplicate(_)
            | FieldName(_)
            | GetDefaultRecordField(..)
            | GetEnumSymbolsField
            | GetEnumSymbols
            | EnumSymbolDuplicate(_)
            | EnumSymbolName(_)
            | EnumDefaultWrongType(_)
            | GetEnumDefault { .. }
            | GetArrayItemsField
            | GetMapValuesField
            | GetFixedSizeField
            | GetFixedSizeFieldPositive(_)
            | GetUnionDuplicate(_)
            | GetNestedUnion
            | InvalidSchemaName(..)
            | InvalidNamespace(..)
            | NameCollision(_)
            | SchemaResolutionError(_)
            | ConvertJsonToString(_) => ErrorKind::Schema,

            EncodeValueAsSchema { .. }
            | MissingField { .. }
            | IntOutOfRange { .. }
            | LongNotIntegral { .. }
            | InexactFloat { .. }
            | EnumSymbolNotFound { .. }
            | FixedSizeMismatch { .. }
            | ByteOutOfRange { .. }
            | NoMatchingUnionBranch { .. } => ErrorKind::Encode,

            Truncated { .. }
            | IntegerOverflow
            | ZagI32(..)
            | BoolValue(_)
            | NegativeLength(_)
            | MemoryAllocation { .. }
            | ConvertToUtf8(_)
            | GetUnionVariant { .. }
            | GetEnumValue { .. }
            | TrailingBytes(_) => ErrorKind::Decode,

            HeaderMagic
            | TruncatedContainer
            | MalformedFraming
            | SyncMismatch { .. }
            | CodecNotSupported(_)
            | GetAvroSchemaFromMap
            | DuplicateMetadataKey(_)
            | MetadataKeyUtf8(_)
            | InvalidBlockHeader { .. }
            | BlockTrailingBytes { .. }
            | DeflateDecompress(_)
            | InvalidMetadataKey(_)
            | FileHeaderAlreadyWritten
            | WriteBytes(_)
            | FlushWriter(_) => ErrorKind::Container,
            #[cfg(feature = "snappy")]
            SnappyDecompress(_) | SnappyCompress(_) | SnappyCrc32 { .. } => ErrorKind::Container,

            Unpopulated(_) => ErrorKind::InvalidState,

            ParseValueJson(_) | ConvertF64ToJson(_) => ErrorKind::Value,
        }
    }
}

impl fmt::Debug for Details {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut msg = self.to_string();
        if let Some(e) = self.source() {
            msg.extend([": ", &e.to_string()]);
        }
        write!(f, "{msg}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn kind_is_taken_from_details() {
        let err = Error::from(Details::SyncMismatch { block: 1 });
        assert_eq!(err.kind(), ErrorKind::Container);
        assert_eq!(err.to_string(), "sync mismatch after block 1");

        let err = Error::from(Details::Unpopulated("binary payload"));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn debug_includes_source() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let details = Details::ParseSchemaJson(source);
        let debug = format!("{details:?}");
        assert!(debug.starts_with("Failed to parse schema from JSON: "), "{debug}");
    }
}
