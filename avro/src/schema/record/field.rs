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
    AvroResult,
    error::Details,
    schema::{Documentation, Name, Parser, Schema},
    util::MapHelper,
    validator::validate_record_field_name,
};
use log::warn;
use serde_json::{Map, Value as JsonValue};
use std::{collections::BTreeMap, str::FromStr};
use strum_macros::{EnumString, IntoStaticStr};

/// A `field` of a `record` schema.
#[derive(bon::Builder, Clone, Debug)]
pub struct RecordField {
    #[builder(into)]
    pub name: String,
    #[builder(default)]
    pub doc: Documentation,
    /// Alternative names of the field. They have no namespace.
    pub aliases: Option<Vec<String>>,
    /// JSON default used when a record value lacks this field.
    pub default: Option<JsonValue>,
    pub schema: Schema,
    /// Sort order of the field. Kept for round-tripping only.
    #[builder(default = RecordFieldOrder::Ascending)]
    pub order: RecordFieldOrder,
    /// Position of the field in the record's `fields`.
    #[builder(default)]
    pub position: usize,
    /// Attributes of the field that have no meaning for encoding.
    #[builder(default)]
    pub custom_attributes: BTreeMap<String, JsonValue>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum RecordFieldOrder {
    Ascending,
    Descending,
    Ignore,
}

impl RecordField {
    pub(crate) fn parse(
        field: &Map<String, JsonValue>,
        position: usize,
        parser: &mut Parser,
        enclosing_record: &Name,
    ) -> AvroResult<Self> {
        let name = field.name().ok_or(Details::GetNameFieldFromRecord)?;
        validate_record_field_name(&name)?;

        let field_type = field
            .get("type")
            .ok_or_else(|| Details::GetRecordFieldTypeField(name.clone()))?;
        let schema = parser.parse(field_type, enclosing_record.namespace())?;

        let order = match field.get("order").and_then(JsonValue::as_str) {
            Some(order) => RecordFieldOrder::from_str(order).unwrap_or_else(|_| {
                warn!("Ignoring unknown order {order:?} of field {name}");
                RecordFieldOrder::Ascending
            }),
            None => RecordFieldOrder::Ascending,
        };

        Ok(RecordField {
            doc: field.doc(),
            default: field.get("default").cloned(),
            aliases: field.aliases(),
            order,
            position,
            custom_attributes: Self::get_field_custom_attributes(field),
            schema,
            name,
        })
    }

    fn get_field_custom_attributes(field: &Map<String, JsonValue>) -> BTreeMap<String, JsonValue> {
        field
            .iter()
            .filter(|(key, _)| {
                !matches!(
                    key.as_str(),
                    "type" | "name" | "doc" | "default" | "order" | "aliases"
                )
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Whether a record value may omit this field.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}
