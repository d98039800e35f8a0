use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{EngineError, ValidationError};

/// Root directory of all collections inside the target repository.
pub const COLLECTIONS_ROOT: &str = "collections";

/// Marker written into each collection directory on initialization.
pub const PLACEHOLDER_FILE: &str = ".gitkeep";

pub type IdFunction = Arc<dyn Fn() -> String + Send + Sync>;
pub type Validator = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// A typed record stored in a collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Checks beyond the shape enforced by deserialization.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionNames {
    pub singular: String,
    pub plural: String,
    /// Directory segment under `collections/`.
    pub path: String,
}

impl CollectionNames {
    pub fn new(
        singular: impl Into<String>,
        plural: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            singular: singular.into(),
            plural: plural.into(),
            path: path.into(),
        }
    }
}

/// `{prefix}_{uuid}` with a time-ordered UUIDv7, so ids sort by creation.
pub fn prefixed_id(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::now_v7().simple())
}

fn accept_any(value: Value) -> Result<Value, String> {
    Ok(value)
}

/// A named, schema-validated record type persisted as one file per item.
#[derive(Clone)]
pub struct Collection {
    id: String,
    names: CollectionNames,
    id_function: IdFunction,
    validator: Validator,
}

impl Collection {
    /// A collection accepting any JSON object, with ids prefixed by the
    /// lowercased singular name.
    pub fn new(id: impl Into<String>, names: CollectionNames) -> Self {
        let prefix = names.singular.to_lowercase().replace(' ', "_");
        Self {
            id: id.into(),
            names,
            id_function: Arc::new(move || prefixed_id(&prefix)),
            validator: Arc::new(accept_any),
        }
    }

    pub fn with_id_function(
        mut self,
        id_function: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.id_function = Arc::new(id_function);
        self
    }

    pub fn with_validator(
        mut self,
        validator: impl Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Validate items by round-tripping them through `T`.
    pub fn with_schema<T: Record>(self) -> Self {
        self.with_validator(|value| {
            let record: T = serde_json::from_value(value).map_err(|e| e.to_string())?;
            record.validate()?;
            serde_json::to_value(&record).map_err(|e| e.to_string())
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn names(&self) -> &CollectionNames {
        &self.names
    }

    /// A fresh item id. Only called when creating an item.
    pub fn generate_id(&self) -> String {
        (self.id_function)()
    }

    /// Run the schema and check the result is an object carrying a string `id`.
    pub fn validate(&self, value: Value) -> Result<Value, ValidationError> {
        if !value.is_object() {
            return Err(self.invalid("expected a JSON object"));
        }

        let validated = (self.validator)(value).map_err(|message| self.invalid(message))?;

        match validated.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Ok(validated),
            _ => Err(self.invalid("missing string field `id`")),
        }
    }

    pub fn directory(&self) -> String {
        format!("{COLLECTIONS_ROOT}/{}", self.names.path)
    }

    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{id}.json", self.directory())
    }

    pub fn placeholder_path(&self) -> String {
        format!("{}/{PLACEHOLDER_FILE}", self.directory())
    }

    fn invalid(&self, message: impl Into<String>) -> ValidationError {
        ValidationError::new(&self.id, message)
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("id", &self.id)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

/// Id of an item value, if it has one.
pub fn item_id(item: &Value) -> Option<&str> {
    item.get("id").and_then(Value::as_str)
}

/// The collections of an engine with their lookup aliases resolved once.
pub(crate) struct CollectionSet {
    collections: Vec<Collection>,
    aliases: HashMap<String, usize>,
}

impl CollectionSet {
    pub(crate) fn new(collections: Vec<Collection>) -> Result<Self, EngineError> {
        let mut aliases: HashMap<String, usize> = HashMap::new();

        for (index, collection) in collections.iter().enumerate() {
            let names = collection.names();
            let mut keys = vec![
                collection.id().to_lowercase(),
                names.singular.to_lowercase(),
                names.plural.to_lowercase(),
                names.path.to_lowercase(),
            ];
            keys.sort();
            keys.dedup();

            for key in keys {
                if let Some(&other) = aliases.get(&key) {
                    return Err(EngineError::Registry(format!(
                        "`{key}` names both {} and {}",
                        collections[other].id(),
                        collection.id()
                    )));
                }
                aliases.insert(key, index);
            }
        }

        Ok(Self {
            collections,
            aliases,
        })
    }

    pub(crate) fn all(&self) -> &[Collection] {
        &self.collections
    }

    /// Resolve an id, singular, plural or path, ignoring case.
    pub(crate) fn get(&self, key: &str) -> Result<&Collection, EngineError> {
        self.aliases
            .get(&key.to_lowercase())
            .map(|&index| &self.collections[index])
            .ok_or_else(|| EngineError::UnknownCollection(key.to_owned()))
    }
}
