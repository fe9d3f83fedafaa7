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

//! Logic for parsing and interacting with schemas in Avro format.

mod name;
mod parser;
mod record;
mod resolve;
mod union;

pub(crate) use crate::schema::{parser::Parser, record::calculate_lookup_table, resolve::lookup};
pub use crate::schema::{
    name::{Alias, Aliases, Name, Names, NamesRef, Namespace, NamespaceRef},
    record::{RecordField, RecordFieldOrder, RecordSchema, RecordSchemaBuilder},
    resolve::ResolvedSchema,
    union::UnionSchema,
};
use crate::{AvroResult, error::Details};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};
use std::{
    collections::{BTreeMap, HashSet},
    fmt::Write as _,
};
use strum_macros::EnumDiscriminants;

/// Represents documentation for complex Avro schemas.
pub type Documentation = Option<String>;

/// Represents any valid Avro schema.
///
/// Named types (`record`, `enum` and `fixed`) are defined once, where they first appear.
/// Every later use of the same type is a [`Schema::Ref`] to its fullname.
///
/// Two schemas are equal when their [Parsing Canonical Forms](Schema::canonical_form) are equal.
///
/// More information about Avro schemas can be found in the
/// [Avro Specification](https://avro.apache.org/docs/++version++/specification/#schema-declaration)
#[derive(Clone, Debug, EnumDiscriminants)]
#[strum_discriminants(name(SchemaKind), derive(Hash, Ord, PartialOrd))]
pub enum Schema {
    Null,
    Boolean,
    /// A 32-bit signed integer.
    Int,
    /// A 64-bit signed integer.
    Long,
    /// A single precision IEEE 754 floating-point number.
    Float,
    /// A double precision IEEE 754 floating-point number.
    Double,
    /// A sequence of 8-bit unsigned bytes.
    Bytes,
    /// A unicode character sequence.
    String,
    /// All items have the same schema.
    Array(ArraySchema),
    /// Keys are always strings and all values have the same schema.
    Map(MapSchema),
    Union(UnionSchema),
    Record(RecordSchema),
    Enum(EnumSchema),
    Fixed(FixedSchema),
    /// A reference to a named schema defined elsewhere in the same tree.
    Ref { name: Name },
}

#[derive(Clone, Debug)]
pub struct ArraySchema {
    pub items: Box<Schema>,
    pub attributes: BTreeMap<String, JsonValue>,
}

#[derive(Clone, Debug)]
pub struct MapSchema {
    pub types: Box<Schema>,
    pub attributes: BTreeMap<String, JsonValue>,
}

/// A description of an Enum schema.
#[derive(bon::Builder, Debug, Clone)]
pub struct EnumSchema {
    pub name: Name,
    #[builder(default)]
    pub aliases: Aliases,
    #[builder(default)]
    pub doc: Documentation,
    /// The symbols, in the order of their encoded index.
    pub symbols: Vec<String>,
    /// A symbol of `symbols` used by readers for unknown symbols.
    pub default: Option<String>,
    #[builder(default)]
    pub attributes: BTreeMap<String, JsonValue>,
}

/// A description of a Fixed schema.
#[derive(bon::Builder, Debug, Clone)]
pub struct FixedSchema {
    pub name: Name,
    #[builder(default)]
    pub aliases: Aliases,
    #[builder(default)]
    pub doc: Documentation,
    /// The exact number of bytes of every value.
    pub size: usize,
    #[builder(default)]
    pub attributes: BTreeMap<String, JsonValue>,
}

impl<S: enum_schema_builder::State> EnumSchemaBuilder<S> {
    /// Try to set a Name from the given string.
    pub fn try_name<T>(
        self,
        name: T,
    ) -> Result<EnumSchemaBuilder<enum_schema_builder::SetName<S>>, <T as TryInto<Name>>::Error>
    where
        <S as enum_schema_builder::State>::Name: enum_schema_builder::IsUnset,
        T: TryInto<Name>,
    {
        Ok(self.name(name.try_into()?))
    }
}

impl<S: fixed_schema_builder::State> FixedSchemaBuilder<S> {
    /// Try to set a Name from the given string.
    pub fn try_name<T>(
        self,
        name: T,
    ) -> Result<FixedSchemaBuilder<fixed_schema_builder::SetName<S>>, <T as TryInto<Name>>::Error>
    where
        <S as fixed_schema_builder::State>::Name: fixed_schema_builder::IsUnset,
        T: TryInto<Name>,
    {
        Ok(self.name(name.try_into()?))
    }
}

impl PartialEq for Schema {
    /// Assess equality of two `Schema` based on [Parsing Canonical Form].
    ///
    /// [Parsing Canonical Form]:
    /// https://avro.apache.org/docs/++version++/specification/#parsing-canonical-form-for-schemas
    fn eq(&self, other: &Self) -> bool {
        self.canonical_form() == other.canonical_form()
    }
}

impl SchemaKind {
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            SchemaKind::Null
                | SchemaKind::Boolean
                | SchemaKind::Int
                | SchemaKind::Long
                | SchemaKind::Double
                | SchemaKind::Float
                | SchemaKind::Bytes
                | SchemaKind::String,
        )
    }
}

impl Schema {
    /// Create a `Schema` from a string representing a JSON Avro schema.
    pub fn parse_str(input: &str) -> AvroResult<Schema> {
        Parser::default().parse_str(input)
    }

    /// Create a `Schema` from an already parsed JSON document.
    pub fn parse(value: &JsonValue) -> AvroResult<Schema> {
        Parser::default().parse_root(value)
    }

    /// An array schema with the given items and no attributes.
    pub fn array(items: Schema) -> Self {
        Schema::Array(ArraySchema {
            items: Box::new(items),
            attributes: BTreeMap::new(),
        })
    }

    /// A map schema with the given values and no attributes.
    pub fn map(types: Schema) -> Self {
        Schema::Map(MapSchema {
            types: Box::new(types),
            attributes: BTreeMap::new(),
        })
    }

    /// Returns the [Parsing Canonical Form] of `self`.
    ///
    /// It strips everything that does not affect the binary encoding: docs, aliases,
    /// defaults, order and custom attributes. Names are fully qualified and every
    /// named type after its first occurrence is written as its fullname.
    ///
    /// [Parsing Canonical Form]:
    /// https://avro.apache.org/docs/++version++/specification/#parsing-canonical-form-for-schemas
    pub fn canonical_form(&self) -> String {
        let mut out = String::new();
        write_canonical_form(self, None, &mut HashSet::new(), &mut out);
        out
    }

    /// Returns the full JSON text of this schema, including docs, aliases, defaults and
    /// custom attributes. Parsing the result yields an equivalent schema.
    pub fn to_canonical_text(&self) -> AvroResult<String> {
        serde_json::to_string(&self.to_json()).map_err(|e| Details::ConvertJsonToString(e).into())
    }

    /// Renders this schema as a JSON document.
    pub fn to_json(&self) -> JsonValue {
        schema_to_json(self, None)
    }

    /// Returns the custom attributes (metadata) if the schema supports them.
    pub fn custom_attributes(&self) -> Option<&BTreeMap<String, JsonValue>> {
        match self {
            Schema::Record(RecordSchema { attributes, .. })
            | Schema::Enum(EnumSchema { attributes, .. })
            | Schema::Fixed(FixedSchema { attributes, .. })
            | Schema::Array(ArraySchema { attributes, .. })
            | Schema::Map(MapSchema { attributes, .. }) => Some(attributes),
            _ => None,
        }
    }

    /// Returns whether the schema represents a named type according to the avro specification
    pub fn is_named(&self) -> bool {
        matches!(
            self,
            Schema::Ref { .. } | Schema::Record(_) | Schema::Enum(_) | Schema::Fixed(_)
        )
    }

    /// Returns the name of the schema if it has one.
    pub fn name(&self) -> Option<&Name> {
        match self {
            Schema::Ref { name, .. }
            | Schema::Record(RecordSchema { name, .. })
            | Schema::Enum(EnumSchema { name, .. })
            | Schema::Fixed(FixedSchema { name, .. }) => Some(name),
            _ => None,
        }
    }

    /// Returns the namespace of the schema if it has one.
    pub fn namespace(&self) -> NamespaceRef<'_> {
        self.name().and_then(Name::namespace)
    }

    /// Returns the aliases of the schema if it has ones.
    pub fn aliases(&self) -> Option<&Vec<Alias>> {
        match self {
            Schema::Record(RecordSchema { aliases, .. })
            | Schema::Enum(EnumSchema { aliases, .. })
            | Schema::Fixed(FixedSchema { aliases, .. }) => aliases.as_ref(),
            _ => None,
        }
    }

    /// Returns the doc of the schema if it has one.
    pub fn doc(&self) -> Option<&String> {
        match self {
            Schema::Record(RecordSchema { doc, .. })
            | Schema::Enum(EnumSchema { doc, .. })
            | Schema::Fixed(FixedSchema { doc, .. }) => doc.as_ref(),
            _ => None,
        }
    }

    /// The name a union uses for this branch: the primitive type name, `array`, `map`,
    /// or the fullname of a named type.
    pub fn branch_name(&self) -> &str {
        match self {
            Schema::Null => "null",
            Schema::Boolean => "boolean",
            Schema::Int => "int",
            Schema::Long => "long",
            Schema::Float => "float",
            Schema::Double => "double",
            Schema::Bytes => "bytes",
            Schema::String => "string",
            Schema::Array(_) => "array",
            Schema::Map(_) => "map",
            Schema::Union(_) => "union",
            Schema::Record(RecordSchema { name, .. })
            | Schema::Enum(EnumSchema { name, .. })
            | Schema::Fixed(FixedSchema { name, .. })
            | Schema::Ref { name } => name.fullname(),
        }
    }
}

impl Serialize for Schema {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

/// Writes the name of a named type relative to its enclosing namespace.
fn insert_name(
    map: &mut Map<String, JsonValue>,
    name: &Name,
    enclosing_namespace: NamespaceRef,
) {
    map.insert("name".into(), name.name().into());
    if name.namespace() != enclosing_namespace.filter(|ns| !ns.is_empty()) {
        map.insert("namespace".into(), name.namespace().unwrap_or_default().into());
    }
}

fn insert_named_extras(
    map: &mut Map<String, JsonValue>,
    aliases: &Aliases,
    doc: &Documentation,
    attributes: &BTreeMap<String, JsonValue>,
) {
    if let Some(doc) = doc {
        map.insert("doc".into(), doc.clone().into());
    }
    if let Some(aliases) = aliases {
        map.insert(
            "aliases".into(),
            aliases
                .iter()
                .map(|alias| JsonValue::from(alias.fully_qualified_name(None).fullname()))
                .collect(),
        );
    }
    for (key, value) in attributes {
        map.insert(key.clone(), value.clone());
    }
}

fn schema_to_json(schema: &Schema, enclosing_namespace: NamespaceRef) -> JsonValue {
    match schema {
        Schema::Ref { name } => name.fullname().into(),
        Schema::Union(union) => union
            .variants()
            .iter()
            .map(|branch| schema_to_json(branch, enclosing_namespace))
            .collect(),
        Schema::Array(ArraySchema { items, attributes }) => {
            let mut map = Map::new();
            map.insert("type".into(), "array".into());
            map.insert("items".into(), schema_to_json(items, enclosing_namespace));
            map.extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
            JsonValue::Object(map)
        }
        Schema::Map(MapSchema { types, attributes }) => {
            let mut map = Map::new();
            map.insert("type".into(), "map".into());
            map.insert("values".into(), schema_to_json(types, enclosing_namespace));
            map.extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
            JsonValue::Object(map)
        }
        Schema::Record(record) => {
            let mut map = Map::new();
            map.insert("type".into(), "record".into());
            insert_name(&mut map, &record.name, enclosing_namespace);
            insert_named_extras(&mut map, &record.aliases, &record.doc, &record.attributes);
            let fields = record
                .fields
                .iter()
                .map(|field| field.to_json(record.name.namespace()))
                .collect();
            map.insert("fields".into(), fields);
            JsonValue::Object(map)
        }
        Schema::Enum(enum_schema) => {
            let mut map = Map::new();
            map.insert("type".into(), "enum".into());
            insert_name(&mut map, &enum_schema.name, enclosing_namespace);
            insert_named_extras(
                &mut map,
                &enum_schema.aliases,
                &enum_schema.doc,
                &enum_schema.attributes,
            );
            map.insert("symbols".into(), enum_schema.symbols.clone().into());
            if let Some(default) = &enum_schema.default {
                map.insert("default".into(), default.clone().into());
            }
            JsonValue::Object(map)
        }
        Schema::Fixed(fixed) => {
            let mut map = Map::new();
            map.insert("type".into(), "fixed".into());
            insert_name(&mut map, &fixed.name, enclosing_namespace);
            insert_named_extras(&mut map, &fixed.aliases, &fixed.doc, &fixed.attributes);
            map.insert("size".into(), fixed.size.into());
            JsonValue::Object(map)
        }
        primitive => primitive.branch_name().into(),
    }
}

impl RecordField {
    pub(crate) fn to_json(&self, record_namespace: NamespaceRef) -> JsonValue {
        let mut map = Map::new();
        map.insert("name".into(), self.name.clone().into());
        map.insert("type".into(), schema_to_json(&self.schema, record_namespace));
        if let Some(doc) = &self.doc {
            map.insert("doc".into(), doc.clone().into());
        }
        if let Some(default) = &self.default {
            map.insert("default".into(), default.clone());
        }
        if let Some(aliases) = &self.aliases {
            map.insert("aliases".into(), aliases.clone().into());
        }
        if self.order != RecordFieldOrder::Ascending {
            map.insert("order".into(), <&'static str>::from(self.order).into());
        }
        for (key, value) in &self.custom_attributes {
            map.insert(key.clone(), value.clone());
        }
        JsonValue::Object(map)
    }
}

fn write_canonical_form(
    schema: &Schema,
    enclosing_namespace: NamespaceRef,
    defined_names: &mut HashSet<String>,
    out: &mut String,
) {
    // Names, symbols and field names are validated identifiers, so none of them needs escaping.
    match schema {
        Schema::Ref { name } => {
            let _ = write!(out, "\"{}\"", name.fully_qualified_name(enclosing_namespace));
        }
        Schema::Union(union) => {
            out.push('[');
            for (i, branch) in union.variants().iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical_form(branch, enclosing_namespace, defined_names, out);
            }
            out.push(']');
        }
        Schema::Array(array) => {
            out.push_str(r#"{"type":"array","items":"#);
            write_canonical_form(&array.items, enclosing_namespace, defined_names, out);
            out.push('}');
        }
        Schema::Map(map) => {
            out.push_str(r#"{"type":"map","values":"#);
            write_canonical_form(&map.types, enclosing_namespace, defined_names, out);
            out.push('}');
        }
        Schema::Record(_) | Schema::Enum(_) | Schema::Fixed(_) => {
            let Some(name) = schema.name() else {
                return;
            };
            let fullname = name.fully_qualified_name(enclosing_namespace);
            if !defined_names.insert(fullname.to_string()) {
                let _ = write!(out, "\"{fullname}\"");
                return;
            }
            let _ = write!(out, r#"{{"name":"{fullname}","type":"#);
            match schema {
                Schema::Record(record) => {
                    out.push_str(r#""record","fields":["#);
                    for (i, field) in record.fields.iter().enumerate() {
                        if i > 0 {
                            out.push(',');
                        }
                        let _ = write!(out, r#"{{"name":"{}","type":"#, field.name);
                        write_canonical_form(
                            &field.schema,
                            fullname.namespace(),
                            defined_names,
                            out,
                        );
                        out.push('}');
                    }
                    out.push(']');
                }
                Schema::Enum(enum_schema) => {
                    out.push_str(r#""enum","symbols":["#);
                    let symbols: Vec<String> = enum_schema
                        .symbols
                        .iter()
                        .map(|symbol| format!("\"{symbol}\""))
                        .collect();
                    out.push_str(&symbols.join(","));
                    out.push(']');
                }
                Schema::Fixed(fixed) => {
                    let _ = write!(out, r#""fixed","size":{}"#, fixed.size);
                }
                _ => {}
            }
            out.push('}');
        }
        primitive => {
            let _ = write!(out, "\"{}\"", primitive.branch_name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    type TestResult<T = ()> = anyhow::Result<T>;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const USER: &str = r#"{
        "type": "record",
        "name": "User",
        "namespace": "com.example",
        "doc": "A user of the system",
        "fields": [
            {"name": "UserName", "type": "string"},
            {"name": "Age", "type": ["int", "null"], "default": 1},
            {"name": "Active", "type": "boolean", "default": false, "order": "ignore"},
            {"name": "Kind", "type": {"type": "enum", "name": "Kind", "symbols": ["ADMIN", "GUEST"]}},
            {"name": "Previous", "type": ["null", "Kind"], "default": null},
            {"name": "Tags", "type": {"type": "map", "values": "string"}, "default": {}}
        ]
    }"#;

    #[test]
    fn test_primitive_canonical_forms() -> TestResult {
        for primitive in ["null", "boolean", "int", "long", "float", "double", "bytes", "string"] {
            let schema = Schema::parse_str(&format!("\"{primitive}\""))?;
            assert_eq!(schema.canonical_form(), format!("\"{primitive}\""));
            let wrapped = Schema::parse(&json!({"type": primitive}))?;
            assert_eq!(wrapped, schema);
        }
        Ok(())
    }

    #[test]
    fn test_record_canonical_form() -> TestResult {
        let schema = Schema::parse_str(USER)?;
        assert_eq!(
            schema.canonical_form(),
            concat!(
                r#"{"name":"com.example.User","type":"record","fields":["#,
                r#"{"name":"UserName","type":"string"},"#,
                r#"{"name":"Age","type":["int","null"]},"#,
                r#"{"name":"Active","type":"boolean"},"#,
                r#"{"name":"Kind","type":{"name":"com.example.Kind","type":"enum","symbols":["ADMIN","GUEST"]}},"#,
                r#"{"name":"Previous","type":["null","com.example.Kind"]},"#,
                r#"{"name":"Tags","type":{"type":"map","values":"string"}}]}"#
            )
        );
        Ok(())
    }

    #[test]
    fn test_canonical_text_round_trips() -> TestResult {
        let schema = Schema::parse_str(USER)?;
        let text = schema.to_canonical_text()?;
        let reparsed = Schema::parse_str(&text)?;
        assert_eq!(reparsed, schema);
        assert_eq!(reparsed.to_canonical_text()?, text);
        assert_eq!(reparsed.doc().map(String::as_str), Some("A user of the system"));
        Ok(())
    }

    #[test]
    fn test_null_namespace_inside_namespaced_record() -> TestResult {
        let schema = Schema::parse_str(
            r#"{"type": "record", "name": "Outer", "namespace": "ns", "fields": [
                {"name": "f", "type": {"type": "fixed", "name": "Raw", "namespace": "", "size": 2}}
            ]}"#,
        )?;
        let reparsed = Schema::parse_str(&schema.to_canonical_text()?)?;
        let Schema::Record(record) = &reparsed else {
            panic!("Expected a record");
        };
        assert_eq!(record.fields[0].schema.name().map(Name::fullname), Some("Raw"));
        Ok(())
    }

    #[test]
    fn test_equality_ignores_docs_and_attributes() -> TestResult {
        let a = Schema::parse_str(
            r#"{"type": "fixed", "name": "F", "size": 4, "doc": "four bytes", "custom": 1}"#,
        )?;
        let b = Schema::parse_str(r#"{"type": "fixed", "name": "F", "size": 4}"#)?;
        let c = Schema::parse_str(r#"{"type": "fixed", "name": "F", "size": 5}"#)?;
        assert_eq!(a, b);
        assert_ne!(a, c);
        Ok(())
    }

    #[test]
    fn test_custom_attributes_are_preserved() -> TestResult {
        let schema = Schema::parse_str(
            r#"{"type": "array", "items": "long", "logicalType": "positions", "min": 0}"#,
        )?;
        let attributes = schema.custom_attributes().unwrap();
        assert_eq!(attributes["logicalType"], "positions");
        assert_eq!(
            schema.to_json(),
            json!({"type": "array", "items": "long", "logicalType": "positions", "min": 0})
        );
        Ok(())
    }

    #[test]
    fn test_accessors() -> TestResult {
        let schema = Schema::parse_str(USER)?;
        assert!(schema.is_named());
        assert_eq!(schema.namespace(), Some("com.example"));
        assert_eq!(schema.branch_name(), "com.example.User");
        assert!(Schema::map(Schema::Int).name().is_none());
        assert_eq!(Schema::array(Schema::Null).branch_name(), "array");
        assert!(SchemaKind::Bytes.is_primitive());
        assert!(!SchemaKind::Record.is_primitive());
        Ok(())
    }
}
