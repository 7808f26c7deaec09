//! Type registry
//!
//! Maps type names and ids to reference types and parses type
//! descriptors. Schemas are persisted as ordinary records in two tables
//! under the registry directory:
//!
//! - `type_names/<id>`: `{ name: string, type_id: long }`
//! - `type_reps/<id>`: one string field per schema field, holding its descriptor
//!
//! The universal type `lxp` (id 0) is always present and never persisted.

use std::collections::HashMap;
use std::path::Path;

use super::declaration::{derive_schema_from_declaration, FieldMarker, SchemaDefinition};
use super::errors::{TypeError, TypeResult};
use super::variant::{TypeVariant, ANY_TYPE_ID, ANY_TYPE_NAME};
use crate::observability::{log_event_with_fields, Event};
use crate::record::{codec, Record, ScalarKind};
use crate::store::{LocalBackend, StorageBackend};

const NAMES_TABLE: &str = "type_names";
const REPS_TABLE: &str = "type_reps";
const NAME_FIELD: &str = "name";
const TYPE_ID_FIELD: &str = "type_id";

/// One declared field of a reference type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldType {
    name: String,
    descriptor: String,
    variant: TypeVariant,
}

impl FieldType {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The descriptor text as declared
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn variant(&self) -> &TypeVariant {
        &self.variant
    }
}

/// A registered schema: a name, a stable id, and required fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceType {
    id: u64,
    name: String,
    fields: Vec<FieldType>,
}

impl ReferenceType {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Required fields, in declaration order
    pub fn fields(&self) -> &[FieldType] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldType> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Whether this is the universal type every record satisfies
    pub fn is_any(&self) -> bool {
        self.id == ANY_TYPE_ID
    }

    pub fn definition(&self) -> SchemaDefinition {
        let mut definition = SchemaDefinition::new();
        for field in &self.fields {
            definition.insert(field.name.as_str(), field.descriptor.as_str());
        }
        definition
    }

    /// The schema as a record, identified by the type id
    pub fn to_record(&self) -> TypeResult<Record> {
        let mut record = Record::with_id(self.id);
        for field in &self.fields {
            record
                .put(field.name.as_str(), field.descriptor.as_str())
                .map_err(|e| TypeError::declaration(field.name.as_str(), e.to_string()))?;
        }
        Ok(record)
    }

    /// Field-by-field comparison of two schemas, ignoring names and ids.
    pub fn is_equivalent_to(&self, other: &ReferenceType) -> bool {
        self.fields.len() == other.fields.len()
            && self.fields.iter().all(|field| {
                other
                    .field(&field.name)
                    .is_some_and(|o| o.variant == field.variant)
            })
    }
}

#[derive(Debug)]
struct TypeTables {
    names: Box<dyn StorageBackend>,
    reps: Box<dyn StorageBackend>,
}

/// Registry of reference types owned by one store
#[derive(Debug)]
pub struct TypeRegistry {
    tables: Option<TypeTables>,
    by_name: HashMap<String, u64>,
    by_id: HashMap<u64, ReferenceType>,
    next_id: u64,
}

impl TypeRegistry {
    /// A registry that persists nothing
    pub fn in_memory() -> Self {
        let mut registry = Self {
            tables: None,
            by_name: HashMap::new(),
            by_id: HashMap::new(),
            next_id: ANY_TYPE_ID + 1,
        };
        registry.by_name.insert(ANY_TYPE_NAME.to_string(), ANY_TYPE_ID);
        registry.by_id.insert(
            ANY_TYPE_ID,
            ReferenceType {
                id: ANY_TYPE_ID,
                name: ANY_TYPE_NAME.to_string(),
                fields: Vec::new(),
            },
        );
        registry
    }

    /// Opens the registry persisted under `dir`, loading every stored type.
    pub fn open(dir: &Path, sync: bool) -> TypeResult<Self> {
        let mut registry = Self::in_memory();
        let tables = TypeTables {
            names: Box::new(LocalBackend::new(dir.join(NAMES_TABLE), sync)),
            reps: Box::new(LocalBackend::new(dir.join(REPS_TABLE), sync)),
        };

        // Names first, so descriptors can refer to any stored type,
        // including types registered after the one being parsed.
        let mut stored = Vec::new();
        for key in tables.names.list().map_err(persistence)? {
            let record = read_table_record(tables.names.as_ref(), &key)?;
            let name = record.get_string(NAME_FIELD).map_err(persistence)?.to_string();
            let id = u64::try_from(record.get_long(TYPE_ID_FIELD).map_err(persistence)?)
                .map_err(persistence)?;
            if registry.by_name.insert(name.clone(), id).is_some() {
                return Err(TypeError::Persistence(format!(
                    "type name '{}' stored more than once",
                    name
                )));
            }
            let after = id.checked_add(1).ok_or_else(|| {
                TypeError::Persistence(format!("type '{}' has out of range id {}", name, id))
            })?;
            registry.next_id = registry.next_id.max(after);
            stored.push((name, id));
        }

        for (name, id) in stored {
            let rep = read_table_record(tables.reps.as_ref(), &id.to_string())?;
            let definition = SchemaDefinition::from_record(&rep)?;
            let reference_type = registry.build(id, &name, &definition);
            registry.by_id.insert(id, reference_type);
        }

        registry.tables = Some(tables);
        Ok(registry)
    }

    /// Registers a new type and returns its id.
    ///
    /// The type's own name is visible while its descriptors are parsed, so
    /// a type may refer to itself. Fields of earlier types that named this
    /// type before it existed are resolved once it is registered.
    pub fn register(&mut self, name: &str, definition: &SchemaDefinition) -> TypeResult<u64> {
        check_type_name(name)?;
        if self.by_name.contains_key(name) {
            return Err(TypeError::AlreadyRegistered(name.to_string()));
        }
        // Every field name must be storable in the schema record.
        definition.to_record()?;

        let id = self.next_id;
        let next_id = id
            .checked_add(1)
            .ok_or_else(|| TypeError::Persistence("type id space exhausted".into()))?;
        self.by_name.insert(name.to_string(), id);
        let reference_type = self.build(id, name, definition);

        if let Some(tables) = &self.tables {
            if let Err(e) = persist(tables, &reference_type) {
                self.by_name.remove(name);
                return Err(e);
            }
        }

        self.by_id.insert(id, reference_type);
        self.next_id = next_id;
        self.resolve_pending();

        log_event_with_fields(
            Event::TypeRegistered,
            &[("type", name), ("type_id", &id.to_string())],
        );
        Ok(id)
    }

    /// Derives a schema from a declaration table and registers it.
    pub fn register_declaration(
        &mut self,
        name: &str,
        declaration: &[(&str, FieldMarker)],
    ) -> TypeResult<u64> {
        let definition = derive_schema_from_declaration(declaration)?;
        self.register(name, &definition)
    }

    pub fn by_name(&self, name: &str) -> Option<&ReferenceType> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn by_id(&self, id: u64) -> Option<&ReferenceType> {
        self.by_id.get(&id)
    }

    pub fn id_of(&self, name: &str) -> Option<u64> {
        self.by_name.get(name).copied()
    }

    /// Registered type names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered types, including `lxp`
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Parses a type descriptor.
    ///
    /// Scalar names match case-insensitively; registered type names match
    /// exactly. An unresolvable descriptor is logged and yields
    /// `TypeVariant::Unknown`.
    pub fn parse_type_descriptor(&self, descriptor: &str) -> TypeVariant {
        self.resolve_descriptor(descriptor).unwrap_or_else(|| {
            log_event_with_fields(Event::UnknownTypeDescriptor, &[("descriptor", descriptor)]);
            TypeVariant::Unknown(descriptor.to_string())
        })
    }

    fn resolve_descriptor(&self, descriptor: &str) -> Option<TypeVariant> {
        let trimmed = descriptor.trim();

        if let Some(kind) = ScalarKind::from_name(trimmed) {
            return Some(TypeVariant::Scalar(kind));
        }

        if let Some(contents) = trimmed.strip_prefix('[').and_then(|d| d.strip_suffix(']')) {
            let contents = contents.trim();
            if let Some(kind) = ScalarKind::from_name(contents) {
                return Some(TypeVariant::ScalarList(kind));
            }
            self.id_of(contents).map(TypeVariant::ReferenceList)
        } else {
            self.id_of(trimmed).map(TypeVariant::Reference)
        }
    }

    /// Re-parses field descriptors that did not resolve when their type
    /// was registered.
    fn resolve_pending(&mut self) {
        let mut resolved = Vec::new();
        for reference_type in self.by_id.values() {
            for (index, field) in reference_type.fields.iter().enumerate() {
                if !field.variant.is_unknown() {
                    continue;
                }
                if let Some(variant) = self.resolve_descriptor(&field.descriptor) {
                    resolved.push((reference_type.id, index, variant));
                }
            }
        }
        for (id, index, variant) in resolved {
            if let Some(field) = self.by_id.get_mut(&id).and_then(|t| t.fields.get_mut(index)) {
                field.variant = variant;
            }
        }
    }

    fn build(&self, id: u64, name: &str, definition: &SchemaDefinition) -> ReferenceType {
        let fields = definition
            .iter()
            .map(|(field, descriptor)| FieldType {
                name: field.to_string(),
                descriptor: descriptor.to_string(),
                variant: self.parse_type_descriptor(descriptor),
            })
            .collect();
        ReferenceType {
            id,
            name: name.to_string(),
            fields,
        }
    }
}

fn check_type_name(name: &str) -> TypeResult<()> {
    let illegal = name.trim().is_empty()
        || name.trim() != name
        || name.contains('[')
        || name.contains(']')
        || ScalarKind::from_name(name).is_some();
    if illegal {
        return Err(TypeError::IllegalTypeName(name.to_string()));
    }
    Ok(())
}

fn persist(tables: &TypeTables, reference_type: &ReferenceType) -> TypeResult<()> {
    let id = reference_type.id();
    let key = id.to_string();

    let mut name_record = Record::new();
    name_record
        .put(NAME_FIELD, reference_type.name())
        .map_err(persistence)?;
    let stored_id = i64::try_from(id).map_err(|_| {
        TypeError::Persistence(format!("type id {} cannot be stored", id))
    })?;
    name_record
        .put(TYPE_ID_FIELD, stored_id)
        .map_err(persistence)?;

    // The rep goes first: a name without a rep would fail the next open.
    let rep = codec::encode(&reference_type.to_record()?, id).map_err(persistence)?;
    tables.reps.write(&key, &rep).map_err(persistence)?;
    let name = codec::encode(&name_record, id).map_err(persistence)?;
    tables.names.write(&key, &name).map_err(persistence)?;
    Ok(())
}

fn read_table_record(table: &dyn StorageBackend, key: &str) -> TypeResult<Record> {
    let data = table
        .read(key)
        .map_err(persistence)?
        .ok_or_else(|| TypeError::Persistence(format!("missing type table entry {}", key)))?;
    codec::decode(&data).map_err(persistence)
}

fn persistence(e: impl std::fmt::Display) -> TypeError {
    TypeError::Persistence(e.to_string())
}
