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
    encode::value_matches,
    error::Details,
    schema::{
        Alias, Aliases, ArraySchema, EnumSchema, FixedSchema, MapSchema, Name, NamespaceRef,
        RecordField, RecordSchema, ResolvedSchema, Schema, UnionSchema, calculate_lookup_table,
    },
    types::Value,
    util::MapHelper,
    validator::validate_enum_symbol_name,
};
use log::{debug, error, warn};
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Turns schema JSON into a [`Schema`] tree.
///
/// Every named type is defined once, at its first occurrence; later occurrences and
/// self references become [`Schema::Ref`]s carrying the canonical fullname.
#[derive(Default)]
pub(crate) struct Parser {
    /// Fullnames and alias fullnames of every named type seen so far, mapped to the
    /// canonical fullname of the type. A type is registered before its body is parsed
    /// so that fields may refer back to their record.
    known_names: HashMap<Name, Name>,
}

impl Parser {
    pub(crate) fn parse_str(&mut self, input: &str) -> AvroResult<Schema> {
        let value: JsonValue = serde_json::from_str(input).map_err(Details::ParseSchemaJson)?;
        self.parse_root(&value)
    }

    /// Parses a whole schema and validates the record field defaults in it.
    pub(crate) fn parse_root(&mut self, value: &JsonValue) -> AvroResult<Schema> {
        let schema = self.parse(value, None)?;
        let resolved = ResolvedSchema::try_from(&schema)?;
        validate_defaults(&schema, resolved.get_names(), None)?;
        Ok(schema)
    }

    pub(crate) fn parse(
        &mut self,
        value: &JsonValue,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        match value {
            JsonValue::String(t) => self.parse_known_schema(t, enclosing_namespace),
            JsonValue::Object(data) => self.parse_complex(data, enclosing_namespace),
            JsonValue::Array(data) => self.parse_union(data, enclosing_namespace),
            _ => Err(Details::ParseSchemaFromValidJson.into()),
        }
    }

    /// Parse a string as a primitive type or a reference to an already seen named type.
    fn parse_known_schema(
        &mut self,
        name: &str,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        match name {
            "null" => Ok(Schema::Null),
            "boolean" => Ok(Schema::Boolean),
            "int" => Ok(Schema::Int),
            "long" => Ok(Schema::Long),
            "double" => Ok(Schema::Double),
            "float" => Ok(Schema::Float),
            "bytes" => Ok(Schema::Bytes),
            "string" => Ok(Schema::String),
            "record" | "enum" | "fixed" | "array" | "map" => {
                Err(Details::InvalidSchemaRecord(name.to_string()).into())
            }
            _ => self.fetch_schema_ref(name, enclosing_namespace),
        }
    }

    fn fetch_schema_ref(
        &mut self,
        name: &str,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let fully_qualified_name = Name::new_with_enclosing_namespace(name, enclosing_namespace)
            .map_err(|_| unknown_type(name))?;
        if let Some(canonical) = self.known_names.get(&fully_qualified_name) {
            return Ok(Schema::Ref {
                name: canonical.clone(),
            });
        }
        // A name written without namespace may still refer to a type in the null namespace.
        if let Ok(bare) = Name::new(name)
            && let Some(canonical) = self.known_names.get(&bare)
        {
            return Ok(Schema::Ref {
                name: canonical.clone(),
            });
        }
        Err(unknown_type(name).into())
    }

    /// Parse a JSON object representing a complex Avro type.
    ///
    /// Avro allows wrapping any type in an object, e.g. `{"type": {"type": "string"}}`.
    pub(crate) fn parse_complex(
        &mut self,
        complex: &Map<String, JsonValue>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        match complex.get("logicalType") {
            Some(JsonValue::String(logical_type)) => {
                debug!("Keeping logical type '{logical_type}' as a plain attribute");
            }
            Some(value) => return Err(Details::GetLogicalTypeFieldType(value.clone()).into()),
            None => {}
        }
        match complex.get("type") {
            Some(JsonValue::String(t)) => match t.as_str() {
                "record" => self.parse_record(complex, enclosing_namespace),
                "enum" => self.parse_enum(complex, enclosing_namespace),
                "array" => self.parse_array(complex, enclosing_namespace),
                "map" => self.parse_map(complex, enclosing_namespace),
                "fixed" => self.parse_fixed(complex, enclosing_namespace),
                other => self.parse_known_schema(other, enclosing_namespace),
            },
            Some(JsonValue::Object(data)) => self.parse_complex(data, enclosing_namespace),
            Some(JsonValue::Array(variants)) => self.parse_union(variants, enclosing_namespace),
            Some(unknown) => Err(Details::GetComplexType(unknown.clone()).into()),
            None => Err(Details::GetComplexTypeField.into()),
        }
    }

    fn register_name(&mut self, name: &Name, aliases: &Aliases) -> AvroResult<()> {
        let all_names = std::iter::once(name.clone()).chain(
            aliases
                .iter()
                .flatten()
                .map(|alias| alias.fully_qualified_name(name.namespace()).into_owned()),
        );
        for registered in all_names {
            if self
                .known_names
                .insert(registered.clone(), name.clone())
                .is_some()
            {
                return Err(Details::NameCollision(registered.to_string()).into());
            }
        }
        Ok(())
    }

    fn parse_record(
        &mut self,
        complex: &Map<String, JsonValue>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let fully_qualified_name = Name::parse(complex, enclosing_namespace)?;
        let aliases = fix_aliases_namespace(complex.aliases(), fully_qualified_name.namespace())?;
        self.register_name(&fully_qualified_name, &aliases)?;

        debug!("Going to parse record schema: {fully_qualified_name:?}");

        let fields_json = complex
            .get("fields")
            .and_then(JsonValue::as_array)
            .ok_or(Details::GetRecordFieldsJson)?;

        let mut fields = Vec::with_capacity(fields_json.len());
        let mut seen = HashSet::with_capacity(fields_json.len());
        for (position, field) in fields_json.iter().enumerate() {
            let field = field.as_object().ok_or(Details::GetRecordFieldsJson)?;
            let field = RecordField::parse(field, position, self, &fully_qualified_name)?;
            if !seen.insert(field.name.clone()) {
                return Err(Details::FieldNameDuplicate(field.name).into());
            }
            fields.push(field);
        }

        Ok(Schema::Record(RecordSchema {
            name: fully_qualified_name,
            aliases,
            doc: complex.doc(),
            lookup: calculate_lookup_table(&fields),
            fields,
            attributes: get_custom_attributes(complex, &["fields"]),
        }))
    }

    fn parse_enum(
        &mut self,
        complex: &Map<String, JsonValue>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let fully_qualified_name = Name::parse(complex, enclosing_namespace)?;
        let aliases = fix_aliases_namespace(complex.aliases(), fully_qualified_name.namespace())?;

        let symbols: Vec<String> = complex
            .get("symbols")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| Error::from(Details::GetEnumSymbolsField))
            .and_then(|symbols| {
                symbols
                    .iter()
                    .map(|symbol| symbol.as_str().map(str::to_string))
                    .collect::<Option<_>>()
                    .ok_or_else(|| Error::from(Details::GetEnumSymbols))
            })?;

        let mut existing_symbols: HashSet<&str> = HashSet::with_capacity(symbols.len());
        for symbol in &symbols {
            validate_enum_symbol_name(symbol)?;
            if !existing_symbols.insert(symbol) {
                return Err(Details::EnumSymbolDuplicate(symbol.clone()).into());
            }
        }

        let default = match complex.get("default") {
            Some(JsonValue::String(s)) if existing_symbols.contains(s.as_str()) => Some(s.clone()),
            Some(JsonValue::String(s)) => {
                return Err(Details::GetEnumDefault {
                    symbol: s.clone(),
                    symbols,
                }
                .into());
            }
            Some(value) => return Err(Details::EnumDefaultWrongType(value.clone()).into()),
            None => None,
        };

        self.register_name(&fully_qualified_name, &aliases)?;

        Ok(Schema::Enum(EnumSchema {
            name: fully_qualified_name,
            aliases,
            doc: complex.doc(),
            symbols,
            default,
            attributes: get_custom_attributes(complex, &["symbols", "default"]),
        }))
    }

    fn parse_array(
        &mut self,
        complex: &Map<String, JsonValue>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let items = complex
            .get("items")
            .ok_or_else(|| Details::GetArrayItemsField.into())
            .and_then(|items| self.parse(items, enclosing_namespace))?;
        Ok(Schema::Array(ArraySchema {
            items: Box::new(items),
            attributes: get_custom_attributes(complex, &["items"]),
        }))
    }

    fn parse_map(
        &mut self,
        complex: &Map<String, JsonValue>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let types = complex
            .get("values")
            .ok_or_else(|| Details::GetMapValuesField.into())
            .and_then(|types| self.parse(types, enclosing_namespace))?;
        Ok(Schema::Map(MapSchema {
            types: Box::new(types),
            attributes: get_custom_attributes(complex, &["values"]),
        }))
    }

    fn parse_union(
        &mut self,
        items: &[JsonValue],
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let schemas = items
            .iter()
            .map(|v| self.parse(v, enclosing_namespace))
            .collect::<Result<Vec<_>, _>>()?;
        if schemas.is_empty() {
            error!("Union schemas should have at least two members! No value can be encoded with this one.");
        } else if schemas.len() == 1 {
            warn!("Union schema with just one member! Consider dropping the union!");
        }
        Ok(Schema::Union(UnionSchema::new(schemas)?))
    }

    fn parse_fixed(
        &mut self,
        complex: &Map<String, JsonValue>,
        enclosing_namespace: NamespaceRef,
    ) -> AvroResult<Schema> {
        let size = match complex.get("size") {
            Some(size) => size
                .as_u64()
                .and_then(|size| usize::try_from(size).ok())
                .ok_or_else(|| Details::GetFixedSizeFieldPositive(size.clone())),
            None => Err(Details::GetFixedSizeField),
        }?;

        let fully_qualified_name = Name::parse(complex, enclosing_namespace)?;
        let aliases = fix_aliases_namespace(complex.aliases(), fully_qualified_name.namespace())?;
        self.register_name(&fully_qualified_name, &aliases)?;

        Ok(Schema::Fixed(FixedSchema {
            name: fully_qualified_name,
            aliases,
            doc: complex.doc(),
            size,
            attributes: get_custom_attributes(complex, &["size"]),
        }))
    }
}

fn unknown_type(name: &str) -> Details {
    if name == "bool" {
        Details::ParsePrimitiveSimilar(name.to_string(), "boolean")
    } else {
        Details::ParsePrimitive(name.to_string())
    }
}

/// Collects every attribute not interpreted by the parser, `logicalType` included.
fn get_custom_attributes(
    complex: &Map<String, JsonValue>,
    excluded: &[&'static str],
) -> BTreeMap<String, JsonValue> {
    complex
        .iter()
        .filter(|(key, _)| {
            !matches!(
                key.as_str(),
                "type" | "name" | "namespace" | "doc" | "aliases"
            ) && !excluded.contains(&key.as_str())
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

// An alias may be fully qualified or relative to the namespace of the type it names:
// for a type "a.b" the aliases "c" and "x.y" stand for "a.c" and "x.y".
fn fix_aliases_namespace(
    aliases: Option<Vec<String>>,
    namespace: NamespaceRef,
) -> AvroResult<Aliases> {
    aliases
        .map(|aliases| {
            aliases
                .iter()
                .map(|alias| match namespace {
                    Some(ns) if !alias.contains('.') => Alias::new(&format!("{ns}.{alias}")),
                    _ => Alias::new(alias),
                })
                .collect::<AvroResult<Vec<_>>>()
        })
        .transpose()
}

/// Checks that every field default is a valid value of the field's schema.
fn validate_defaults(
    schema: &Schema,
    names: &HashMap<Name, &Schema>,
    enclosing_namespace: NamespaceRef,
) -> AvroResult<()> {
    match schema {
        Schema::Array(array) => validate_defaults(&array.items, names, enclosing_namespace),
        Schema::Map(map) => validate_defaults(&map.types, names, enclosing_namespace),
        Schema::Union(union) => union
            .variants()
            .iter()
            .try_for_each(|branch| validate_defaults(branch, names, enclosing_namespace)),
        Schema::Record(record) => {
            let record_namespace = record.name.namespace();
            for field in &record.fields {
                if let Some(default) = &field.default {
                    let value = Value::from(default.clone());
                    if !value_matches(&value, &field.schema, names, record_namespace) {
                        return Err(Details::GetDefaultRecordField(
                            field.name.clone(),
                            record.name.to_string(),
                            field.schema.canonical_form(),
                        )
                        .into());
                    }
                    if let Schema::Union(union) = &field.schema
                        && let Some(index) = default_branch(union, &value, names, record_namespace)
                        && index > 0
                    {
                        warn!(
                            "Default of field {} in {} matches union branch {index}, not the first",
                            field.name, record.name
                        );
                    }
                }
                validate_defaults(&field.schema, names, record_namespace)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// The first branch of `union` that `default` is a valid value of.
fn default_branch(
    union: &UnionSchema,
    default: &Value,
    names: &HashMap<Name, &Schema>,
    enclosing_namespace: NamespaceRef,
) -> Option<usize> {
    union
        .variants()
        .iter()
        .position(|branch| value_matches(default, branch, names, enclosing_namespace))
}
