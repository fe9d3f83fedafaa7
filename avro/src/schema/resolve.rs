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
    AvroResult, Error,
    error::Details,
    schema::{Name, Names, NamesRef, NamespaceRef, Schema},
};
use std::collections::HashMap;

/// A schema together with the lookup table of every named type it defines.
///
/// Resolving fails if a fullname is defined twice or if a reference names a type that
/// the schema does not define.
#[derive(Debug)]
pub struct ResolvedSchema<'s> {
    names_ref: NamesRef<'s>,
    root: &'s Schema,
}

impl<'s> TryFrom<&'s Schema> for ResolvedSchema<'s> {
    type Error = Error;

    fn try_from(schema: &'s Schema) -> AvroResult<Self> {
        let mut rs = ResolvedSchema {
            names_ref: HashMap::new(),
            root: schema,
        };
        rs.collect_definitions(schema, None)?;
        rs.check_references(schema, None)?;
        Ok(rs)
    }
}

impl<'s> ResolvedSchema<'s> {
    pub fn get_root_schema(&self) -> &'s Schema {
        self.root
    }

    pub fn get_names(&self) -> &NamesRef<'s> {
        &self.names_ref
    }

    /// Clones the definitions into an owned lookup table.
    pub fn to_names(&self) -> Names {
        self.names_ref
            .iter()
            .map(|(name, schema)| (name.clone(), (*schema).clone()))
            .collect()
    }

    fn collect_definitions(
        &mut self,
        schema: &'s Schema,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<()> {
        match schema {
            Schema::Array(array) => self.collect_definitions(&array.items, enclosing_namespace),
            Schema::Map(map) => self.collect_definitions(&map.types, enclosing_namespace),
            Schema::Union(union) => union
                .variants()
                .iter()
                .try_for_each(|branch| self.collect_definitions(branch, enclosing_namespace)),
            Schema::Enum(_) | Schema::Fixed(_) | Schema::Record(_) => {
                let Some(name) = schema.name() else {
                    return Ok(());
                };
                let fully_qualified_name = name.fully_qualified_name(enclosing_namespace);
                if self
                    .names_ref
                    .insert(fully_qualified_name.clone().into_owned(), schema)
                    .is_some()
                {
                    return Err(Details::NameCollision(fully_qualified_name.to_string()).into());
                }
                if let Schema::Record(record) = schema {
                    let record_namespace = fully_qualified_name.namespace();
                    for field in &record.fields {
                        self.collect_definitions(&field.schema, record_namespace)?;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn check_references(
        &self,
        schema: &'s Schema,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<()> {
        match schema {
            Schema::Array(array) => self.check_references(&array.items, enclosing_namespace),
            Schema::Map(map) => self.check_references(&map.types, enclosing_namespace),
            Schema::Union(union) => union
                .variants()
                .iter()
                .try_for_each(|branch| self.check_references(branch, enclosing_namespace)),
            Schema::Record(record) => {
                let fully_qualified_name = record.name.fully_qualified_name(enclosing_namespace);
                record.fields.iter().try_for_each(|field| {
                    self.check_references(&field.schema, fully_qualified_name.namespace())
                })
            }
            Schema::Ref { name } => {
                let fully_qualified_name = name.fully_qualified_name(enclosing_namespace);
                if self.names_ref.contains_key(fully_qualified_name.as_ref()) {
                    Ok(())
                } else {
                    Err(Details::SchemaResolutionError(fully_qualified_name.into_owned()).into())
                }
            }
            _ => Ok(()),
        }
    }
}

/// Looks up the definition a reference points to.
pub(crate) fn lookup<'n, S: std::borrow::Borrow<Schema>>(
    names: &'n HashMap<Name, S>,
    name: &Name,
    enclosing_namespace: NamespaceRef,
) -> AvroResult<&'n Schema> {
    let fully_qualified_name = name.fully_qualified_name(enclosing_namespace);
    names
        .get(fully_qualified_name.as_ref())
        .map(|schema| schema.borrow())
        .ok_or_else(|| Details::SchemaResolutionError(fully_qualified_name.into_owned()).into())
}
