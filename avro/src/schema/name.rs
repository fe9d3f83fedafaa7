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

use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};
use std::{
    borrow::Cow,
    collections::HashMap,
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

use crate::{
    AvroResult, Error, Schema,
    error::Details,
    util::MapHelper,
    validator::{validate_namespace, validate_schema_name},
};

/// The fullname of a `record`, `enum` or `fixed` schema.
///
/// A fullname is an optional dot-separated namespace followed by a simple name,
/// e.g. `com.example.User`. Names written without a namespace inherit the namespace
/// of the nearest enclosing named type, see [`Name::new_with_enclosing_namespace`].
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Name {
    namespace_and_name: String,
    /// Byte offset of the simple name; zero when there is no namespace.
    index_of_name: usize,
}

/// Aliases of a named schema.
pub type Aliases = Option<Vec<Alias>>;
/// Named schemas by fullname, owning their definitions.
pub type Names = HashMap<Name, Schema>;
/// Named schemas by fullname, borrowed from a schema tree.
pub type NamesRef<'a> = HashMap<Name, &'a Schema>;
pub type Namespace = Option<String>;
pub type NamespaceRef<'a> = Option<&'a str>;

impl Name {
    /// Parses a possibly qualified name.
    pub fn new(name: impl Into<String> + AsRef<str>) -> AvroResult<Self> {
        Self::new_with_enclosing_namespace(name, None)
    }

    /// Parses `name`, qualifying it with `enclosing_namespace` when it has no namespace of its own.
    pub fn new_with_enclosing_namespace(
        name: impl Into<String> + AsRef<str>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Self> {
        let name_ref = name.as_ref();
        let index_of_name = validate_schema_name(name_ref)?;

        if index_of_name == 0
            && let Some(namespace) = enclosing_namespace
            && !namespace.is_empty()
        {
            validate_namespace(namespace)?;
            Ok(Self {
                namespace_and_name: format!("{namespace}.{name_ref}"),
                index_of_name: namespace.len() + 1,
            })
        } else if index_of_name == 1 {
            // ".Name" explicitly means the null namespace
            Ok(Self {
                namespace_and_name: name_ref[1..].to_string(),
                index_of_name: 0,
            })
        } else {
            Ok(Self {
                namespace_and_name: name.into(),
                index_of_name,
            })
        }
    }

    /// Reads `name` and `namespace` from a schema JSON object.
    pub(crate) fn parse(
        complex: &Map<String, JsonValue>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Self> {
        let name_field = complex.name().ok_or(Details::GetNameField)?;
        let namespace = complex.string("namespace");
        if let Some(ns) = &namespace {
            validate_namespace(ns)?;
        }
        Self::new_with_enclosing_namespace(
            name_field,
            namespace.as_deref().or(enclosing_namespace),
        )
    }

    pub fn name(&self) -> &str {
        &self.namespace_and_name[self.index_of_name..]
    }

    pub fn namespace(&self) -> NamespaceRef<'_> {
        if self.index_of_name == 0 {
            None
        } else {
            Some(&self.namespace_and_name[..(self.index_of_name - 1)])
        }
    }

    /// The dotted fullname of this name.
    pub fn fullname(&self) -> &str {
        &self.namespace_and_name
    }

    /// Qualifies this name with `enclosing_namespace` if it does not have a namespace yet.
    ///
    /// ```
    /// # use avro_object::{Error, schema::Name};
    /// assert_eq!(
    ///     Name::new("User")?.fully_qualified_name(Some("com.example")).into_owned(),
    ///     Name::new("com.example.User")?
    /// );
    /// assert_eq!(
    ///     Name::new("org.User")?.fully_qualified_name(Some("com.example")).into_owned(),
    ///     Name::new("org.User")?
    /// );
    /// # Ok::<(), Error>(())
    /// ```
    pub fn fully_qualified_name(&self, enclosing_namespace: NamespaceRef) -> Cow<'_, Name> {
        if self.index_of_name == 0
            && let Some(namespace) = enclosing_namespace
            && !namespace.is_empty()
        {
            Cow::Owned(Self {
                namespace_and_name: format!("{namespace}.{}", self.namespace_and_name),
                index_of_name: namespace.len() + 1,
            })
        } else {
            Cow::Borrowed(self)
        }
    }
}

impl TryFrom<&str> for Name {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Debug for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Name");
        debug.field("name", &self.name());
        match self.namespace() {
            Some(namespace) => debug.field("namespace", &namespace).finish(),
            None => debug.finish_non_exhaustive(),
        }
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.namespace_and_name)
    }
}

/// An alternative name of a named schema. Serialized as a plain fullname string.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Alias(Name);

impl Alias {
    pub fn new(name: &str) -> AvroResult<Self> {
        Name::new(name).map(Self)
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn namespace(&self) -> NamespaceRef<'_> {
        self.0.namespace()
    }

    pub fn fully_qualified_name(&self, enclosing_namespace: NamespaceRef) -> Cow<'_, Name> {
        self.0.fully_qualified_name(enclosing_namespace)
    }
}

impl TryFrom<&str> for Alias {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Serialize for Alias {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.fullname())
    }
}
