//! Index configuration.
//!
//! An [`IndexConfig`] describes which fields of one entity type are indexed,
//! into which index type, and with which value kind. It also carries the
//! engine settings used when an index of a given type is opened.

use crate::engine::{Analyzer, TokenizerConfig};
use crate::error::{CoreError, CoreResult};
use crate::types::{EntityKind, IndexType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Declared kind of a field's values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Numbers, indexed in a range-queryable form.
    Numeric,
    /// Anything else.
    #[default]
    Text,
}

/// Index declaration for a single field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSpec {
    /// Index the field goes into.
    #[serde(rename = "type")]
    pub index_type: IndexType,
    /// Kind of the field's values.
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Creates a field declaration.
    #[must_use]
    pub const fn new(index_type: IndexType, kind: FieldKind) -> Self {
        Self { index_type, kind }
    }

    /// Exact index, text values.
    #[must_use]
    pub const fn exact() -> Self {
        Self::new(IndexType::Exact, FieldKind::Text)
    }

    /// Exact index, numeric values.
    #[must_use]
    pub const fn numeric() -> Self {
        Self::new(IndexType::Exact, FieldKind::Numeric)
    }

    /// Fulltext index, text values.
    #[must_use]
    pub const fn fulltext() -> Self {
        Self::new(IndexType::Fulltext, FieldKind::Text)
    }
}

/// Engine tuning for one index type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// How values are split into terms.
    pub analyzer: Analyzer,
    /// Tokenizer parameters.
    pub tokenizer: TokenizerConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::exact()
    }
}

impl EngineSettings {
    /// Settings for exact indexes: keyword analyzer, case sensitive.
    #[must_use]
    pub fn exact() -> Self {
        Self {
            analyzer: Analyzer::Keyword,
            tokenizer: TokenizerConfig::new().case_sensitive(),
        }
    }

    /// Settings for fulltext indexes: standard analyzer, lower-cased.
    #[must_use]
    pub fn fulltext() -> Self {
        Self {
            analyzer: Analyzer::Standard,
            tokenizer: TokenizerConfig::default(),
        }
    }

    /// Sets the tokenizer configuration.
    #[must_use]
    pub fn with_tokenizer(mut self, tokenizer: TokenizerConfig) -> Self {
        self.tokenizer = tokenizer;
        self
    }
}

fn default_engine_settings() -> BTreeMap<IndexType, EngineSettings> {
    BTreeMap::from([
        (IndexType::Exact, EngineSettings::exact()),
        (IndexType::Fulltext, EngineSettings::fulltext()),
    ])
}

/// Field-to-index configuration for one entity type.
///
/// # Example
///
/// ```rust
/// use nodex_core::{EntityKind, FieldSpec, IndexConfig, IndexType};
///
/// let config = IndexConfig::new(EntityKind::Node, "Person")
///     .field("name", FieldSpec::exact())
///     .field("age", FieldSpec::numeric())
///     .field("bio", FieldSpec::fulltext());
///
/// assert!(config.is_indexed("age"));
/// assert_eq!(config.index_name_for_type(IndexType::Fulltext), "Person_fulltext");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Kind of entity the indexes hold.
    entity_kind: EntityKind,
    /// Base name from which index names are derived.
    base_name: String,
    /// Declared fields.
    #[serde(default)]
    fields: BTreeMap<String, FieldSpec>,
    /// Engine settings per index type.
    #[serde(default = "default_engine_settings")]
    engine: BTreeMap<IndexType, EngineSettings>,
}

impl IndexConfig {
    /// Creates a configuration with no fields and default engine settings
    /// for every index type.
    #[must_use]
    pub fn new(entity_kind: EntityKind, base_name: impl Into<String>) -> Self {
        Self {
            entity_kind,
            base_name: base_name.into(),
            fields: BTreeMap::new(),
            engine: default_engine_settings(),
        }
    }

    /// Declares an indexed field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    /// Replaces the engine settings for an index type.
    #[must_use]
    pub fn engine_settings_for(mut self, index_type: IndexType, settings: EngineSettings) -> Self {
        self.engine.insert(index_type, settings);
        self
    }

    /// Removes the engine settings for an index type.
    #[must_use]
    pub fn without_engine_settings(mut self, index_type: IndexType) -> Self {
        self.engine.remove(&index_type);
        self
    }

    /// Parses a configuration from JSON and validates it.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration from a JSON file and validates it.
    pub fn from_json_file(path: &Path) -> CoreResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serializes the configuration to pretty-printed JSON.
    pub fn to_json_string(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks that the configuration can be used to name indexes.
    pub fn validate(&self) -> CoreResult<()> {
        if self.base_name.trim().is_empty() {
            return Err(CoreError::invalid_config("base name must not be empty"));
        }
        if self.base_name.chars().any(char::is_whitespace) {
            return Err(CoreError::invalid_config(format!(
                "base name '{}' must not contain whitespace",
                self.base_name
            )));
        }
        if let Some(field) = self.fields.keys().find(|f| f.is_empty()) {
            return Err(CoreError::invalid_config(format!(
                "field name '{field}' must not be empty"
            )));
        }
        Ok(())
    }

    /// Returns the kind of entity indexed.
    #[must_use]
    pub fn entity_kind(&self) -> EntityKind {
        self.entity_kind
    }

    /// Returns the base index name.
    #[must_use]
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Returns the names of all declared fields, sorted.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Returns the declaration of a field.
    #[must_use]
    pub fn field_spec(&self, field: &str) -> Option<FieldSpec> {
        self.fields.get(field).copied()
    }

    /// Returns true if the field is indexed.
    #[must_use]
    pub fn is_indexed(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns the index type a field is declared on.
    #[must_use]
    pub fn index_type(&self, field: &str) -> Option<IndexType> {
        self.fields.get(field).map(|spec| spec.index_type)
    }

    /// Returns true if the field is declared numeric.
    #[must_use]
    pub fn is_numeric(&self, field: &str) -> bool {
        matches!(
            self.fields.get(field),
            Some(FieldSpec {
                kind: FieldKind::Numeric,
                ..
            })
        )
    }

    /// Returns true if any field is declared on the index type.
    #[must_use]
    pub fn has_index_type(&self, index_type: IndexType) -> bool {
        self.fields.values().any(|spec| spec.index_type == index_type)
    }

    /// Derives the index name for an index type.
    #[must_use]
    pub fn index_name_for_type(&self, index_type: IndexType) -> String {
        format!("{}_{}", self.base_name, index_type)
    }

    /// Returns the engine settings for an index type.
    ///
    /// A missing entry is a configuration error; there is no fallback.
    pub fn engine_settings(&self, index_type: IndexType) -> CoreResult<&EngineSettings> {
        self.engine
            .get(&index_type)
            .ok_or_else(|| CoreError::missing_engine_config(index_type))
    }

    /// Declares or redeclares a field.
    pub fn declare(&mut self, field: impl Into<String>, spec: FieldSpec) {
        self.fields.insert(field.into(), spec);
    }

    /// Removes every field declaration. Engine settings are kept.
    pub fn clear_fields(&mut self) {
        self.fields.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn person() -> IndexConfig {
        IndexConfig::new(EntityKind::Node, "Person")
            .field("name", FieldSpec::exact())
            .field("age", FieldSpec::numeric())
            .field("bio", FieldSpec::fulltext())
    }

    #[test]
    fn field_lookups() {
        let config = person();
        assert!(config.is_indexed("name"));
        assert!(!config.is_indexed("email"));
        assert_eq!(config.index_type("bio"), Some(IndexType::Fulltext));
        assert_eq!(config.index_type("email"), None);
        assert!(config.is_numeric("age"));
        assert!(!config.is_numeric("name"));
        assert_eq!(config.fields().collect::<Vec<_>>(), vec!["age", "bio", "name"]);
    }

    #[test]
    fn index_names() {
        let config = person();
        assert_eq!(config.index_name_for_type(IndexType::Exact), "Person_exact");
        assert_eq!(
            config.index_name_for_type(IndexType::Fulltext),
            "Person_fulltext"
        );
    }

    #[test]
    fn missing_engine_settings_is_an_error() {
        let config = person().without_engine_settings(IndexType::Fulltext);
        assert!(config.engine_settings(IndexType::Exact).is_ok());
        let err = config.engine_settings(IndexType::Fulltext).unwrap_err();
        assert!(matches!(err, CoreError::MissingEngineConfig { .. }));
    }

    #[test]
    fn clear_fields_keeps_engine() {
        let mut config = person();
        config.clear_fields();
        assert_eq!(config.fields().count(), 0);
        assert!(config.engine_settings(IndexType::Fulltext).is_ok());
    }

    #[test]
    fn json_roundtrip_with_defaults() {
        let json = r#"{
            "entity_kind": "relationship",
            "base_name": "Knows",
            "fields": {
                "since": { "type": "exact", "kind": "numeric" },
                "note": { "type": "fulltext" }
            }
        }"#;
        let config = IndexConfig::from_json_str(json).unwrap();
        assert_eq!(config.entity_kind(), EntityKind::Relationship);
        assert!(config.is_numeric("since"));
        assert_eq!(config.index_type("note"), Some(IndexType::Fulltext));
        assert_eq!(
            config.engine_settings(IndexType::Fulltext).unwrap(),
            &EngineSettings::fulltext()
        );

        let again = IndexConfig::from_json_str(&config.to_json_string().unwrap()).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn rejects_bad_base_name() {
        let json = r#"{ "entity_kind": "node", "base_name": "  " }"#;
        let err = IndexConfig::from_json_str(json).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "entity_kind": "node", "base_name": "City" }}"#).unwrap();
        let config = IndexConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.base_name(), "City");
    }
}
