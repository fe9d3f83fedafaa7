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

//! Name rules for schema names, namespaces, record fields and enum symbols.
//!
//! These follow the [Avro specification](https://avro.apache.org/docs/++version++/specification/#names):
//! every simple name starts with `[A-Za-z_]` and continues with `[A-Za-z0-9_]`, and a
//! namespace is a dot-separated sequence of such names.

use crate::{AvroResult, error::Details};
use regex_lite::Regex;
use std::sync::OnceLock;

fn schema_name_regex() -> &'static Regex {
    static SCHEMA_NAME_ONCE: OnceLock<Regex> = OnceLock::new();
    SCHEMA_NAME_ONCE.get_or_init(|| {
        // An optional namespace (with optional dots) followed by a name without any dots in it.
        Regex::new(
            r"^((?P<namespace>([A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*)?)\.)?(?P<name>[A-Za-z_][A-Za-z0-9_]*)$",
        )
        .unwrap_or_else(|e| unreachable!("the schema name regex is valid: {e}"))
    })
}

fn namespace_regex() -> &'static Regex {
    static NAMESPACE_ONCE: OnceLock<Regex> = OnceLock::new();
    NAMESPACE_ONCE.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*)?$")
            .unwrap_or_else(|e| unreachable!("the namespace regex is valid: {e}"))
    })
}

fn simple_name_regex() -> &'static Regex {
    static SIMPLE_NAME_ONCE: OnceLock<Regex> = OnceLock::new();
    SIMPLE_NAME_ONCE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .unwrap_or_else(|e| unreachable!("the simple name regex is valid: {e}"))
    })
}

/// Validates a possibly qualified schema name and returns the byte offset where the simple name starts.
pub(crate) fn validate_schema_name(schema_name: &str) -> AvroResult<usize> {
    let regex = schema_name_regex();
    regex
        .captures(schema_name)
        .and_then(|caps| caps.name("name"))
        .map(|name| name.start())
        .ok_or_else(|| Details::InvalidSchemaName(schema_name.to_string(), regex.as_str()).into())
}

pub(crate) fn validate_namespace(ns: &str) -> AvroResult<()> {
    let regex = namespace_regex();
    if regex.is_match(ns) {
        Ok(())
    } else {
        Err(Details::InvalidNamespace(ns.to_string(), regex.as_str()).into())
    }
}

pub(crate) fn validate_enum_symbol_name(symbol: &str) -> AvroResult<()> {
    if simple_name_regex().is_match(symbol) {
        Ok(())
    } else {
        Err(Details::EnumSymbolName(symbol.to_string()).into())
    }
}

pub(crate) fn validate_record_field_name(field_name: &str) -> AvroResult<()> {
    if simple_name_regex().is_match(field_name) {
        Ok(())
    } else {
        Err(Details::FieldName(field_name.to_string()).into())
    }
}
