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

use crate::schema::{Aliases, Documentation, Name, RecordField};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// A `record` schema: a named, ordered list of fields.
#[derive(bon::Builder, Clone, Debug)]
pub struct RecordSchema {
    pub name: Name,
    #[builder(default)]
    pub aliases: Aliases,
    #[builder(default)]
    pub doc: Documentation,
    #[builder(default)]
    pub fields: Vec<RecordField>,
    /// Maps field names to their position in `fields`.
    #[builder(skip = calculate_lookup_table(&fields))]
    pub lookup: BTreeMap<String, usize>,
    #[builder(default)]
    pub attributes: BTreeMap<String, JsonValue>,
}

impl RecordSchema {
    /// Finds a field by its name or one of its aliases.
    pub fn field(&self, name: &str) -> Option<&RecordField> {
        self.lookup.get(name).map(|&i| &self.fields[i]).or_else(|| {
            self.fields.iter().find(|field| {
                field
                    .aliases
                    .as_ref()
                    .is_some_and(|aliases| aliases.iter().any(|alias| alias == name))
            })
        })
    }
}

impl<S: record_schema_builder::State> RecordSchemaBuilder<S> {
    /// Try to set a Name from the given string.
    pub fn try_name<T>(
        self,
        name: T,
    ) -> Result<RecordSchemaBuilder<record_schema_builder::SetName<S>>, <T as TryInto<Name>>::Error>
    where
        <S as record_schema_builder::State>::Name: record_schema_builder::IsUnset,
        T: TryInto<Name>,
    {
        let name = name.try_into()?;
        Ok(self.name(name))
    }
}

pub(crate) fn calculate_lookup_table(fields: &[RecordField]) -> BTreeMap<String, usize> {
    fields
        .iter()
        .enumerate()
        .map(|(i, field)| (field.name.clone(), i))
        .collect()
}
