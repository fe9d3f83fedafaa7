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

//! Conversion between dynamic, JSON-like values and the **[Apache Avro](https://avro.apache.org/)**
//! binary format.
//!
//! The crate is built from four layers, each usable on its own:
//!
//! 1. The [`schema`] model: [`Schema::parse_str`] validates a JSON schema definition,
//!    [`Schema::to_canonical_text`] writes it back out.
//! 2. The binary codec: [`to_avro_datum`] / [`encode`] turn a [`Value`] into a datum of a
//!    schema, [`from_avro_datum`] / [`decode`] turn a datum back into a [`Value`].
//! 3. The object container format: [`Writer`] writes a self-describing container,
//!    [`open`] / [`Reader`] recover its schema and records.
//! 4. The [`AvroObject`] facade, which drives the other layers from container bytes or
//!    from a value and a schema.
//!
//! ```
//! use avro_object::{Schema, Value, from_avro_datum, to_avro_datum};
//!
//! let schema = Schema::parse_str(r#"
//!     {
//!         "type": "record",
//!         "name": "User",
//!         "fields": [
//!             {"name": "name", "type": "string"},
//!             {"name": "age", "type": ["null", "int"], "default": null}
//!         ]
//!     }
//! "#)?;
//! let value = Value::from_json_str(r#"{"name": "Ann", "age": 42}"#)?;
//!
//! let datum = to_avro_datum(&schema, value.clone())?;
//! assert_eq!(datum, [0x06, b'A', b'n', b'n', 0x02, 0x54]);
//! assert_eq!(from_avro_datum(&schema, &datum)?, value);
//! # Ok::<(), avro_object::Error>(())
//! ```
//!
//! # Features
//!
//! - `snappy`: enable support for the Snappy codec
//!
//! # MSRV
//!
//! The current MSRV is 1.88.0.

mod codec;
mod decode;
mod encode;
mod object;
mod reader;
mod writer;

pub mod error;
pub mod json;
pub mod schema;
pub mod types;
pub mod util;
mod validator;

pub use codec::{Codec, DeflateSettings};
pub use decode::{decode, from_avro_datum};
pub use encode::{encode, to_avro_datum};
pub use error::{Error, ErrorKind};
pub use object::{AvroObject, Origin, SchemaSource};
pub use reader::{Reader, is_container, open};
pub use schema::Schema;
pub use types::{Value, ValueKind};
pub use writer::{Writer, WriterBuilder, to_container};

/// A convenience type alias for `Result`s with `Error`s.
pub type AvroResult<T> = Result<T, Error>;
