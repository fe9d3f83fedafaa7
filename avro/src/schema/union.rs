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
    schema::{Name, Schema, SchemaKind},
};
use std::collections::{BTreeMap, HashSet};

/// A union of alternative schemas, called branches.
#[derive(Debug, Clone)]
pub struct UnionSchema {
    pub(crate) schemas: Vec<Schema>,
    /// Index of the branch of each unnamed kind.
    variant_index: BTreeMap<SchemaKind, usize>,
}

impl UnionSchema {
    /// Creates a new union from its branches.
    ///
    /// # Errors
    /// Will return an error if `schemas` contains a union, two branches of the same
    /// unnamed kind, or two named branches with the same fullname.
    pub fn new(schemas: Vec<Schema>) -> AvroResult<Self> {
        let mut vindex = BTreeMap::new();
        let mut named: HashSet<&Name> = HashSet::new();
        for (i, schema) in schemas.iter().enumerate() {
            if let Schema::Union(_) = schema {
                return Err(Details::GetNestedUnion.into());
            }
            match schema.name() {
                Some(name) => {
                    if !named.insert(name) {
                        return Err(Details::GetUnionDuplicate(name.to_string()).into());
                    }
                }
                None => {
                    let kind = SchemaKind::from(schema);
                    if vindex.insert(kind, i).is_some() {
                        return Err(Details::GetUnionDuplicate(format!("{kind:?}")).into());
                    }
                }
            }
        }
        Ok(UnionSchema {
            schemas,
            variant_index: vindex,
        })
    }

    /// Returns a slice to all variants of this schema.
    pub fn variants(&self) -> &[Schema] {
        &self.schemas
    }

    /// Returns true if any of the branches is `null`.
    pub fn is_nullable(&self) -> bool {
        self.variant_index.contains_key(&SchemaKind::Null)
    }

    /// The position of the branch of an unnamed kind.
    pub fn index_of_kind(&self, kind: SchemaKind) -> Option<usize> {
        self.variant_index.get(&kind).copied()
    }
}
