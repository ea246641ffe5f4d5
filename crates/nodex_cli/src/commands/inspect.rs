//! Inspect command implementation.

use nodex_core::{FieldKind, IndexConfig, IndexType};
use serde::Serialize;
use std::path::Path;

/// Configuration inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Configuration path.
    pub path: String,
    /// Entity kind indexed.
    pub entity_kind: String,
    /// Base index name.
    pub base_name: String,
    /// Declared fields.
    pub fields: Vec<FieldInfo>,
    /// Index names the configuration uses.
    pub indexes: Vec<String>,
    /// Index types with engine settings.
    pub configured_types: Vec<String>,
}

/// One declared field.
#[derive(Debug, Serialize)]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// Index type.
    pub index_type: String,
    /// Value kind.
    pub kind: String,
}

/// Builds the inspection result for a configuration.
pub fn inspect(path: &Path, config: &IndexConfig) -> InspectResult {
    let fields = config
        .fields()
        .filter_map(|name| {
            config.field_spec(name).map(|spec| FieldInfo {
                name: name.to_string(),
                index_type: spec.index_type.to_string(),
                kind: match spec.kind {
                    FieldKind::Numeric => "numeric".to_string(),
                    FieldKind::Text => "text".to_string(),
                },
            })
        })
        .collect();

    InspectResult {
        path: path.display().to_string(),
        entity_kind: config.entity_kind().to_string(),
        base_name: config.base_name().to_string(),
        fields,
        indexes: IndexType::ALL
            .into_iter()
            .filter(|t| config.has_index_type(*t))
            .map(|t| config.index_name_for_type(t))
            .collect(),
        configured_types: IndexType::ALL
            .into_iter()
            .filter(|t| config.engine_settings(*t).is_ok())
            .map(|t| t.to_string())
            .collect(),
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = IndexConfig::from_json_file(path)?;
    let result = inspect(path, &config);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Nodex Index Configuration");
    println!("=========================");
    println!();
    println!("Path:        {}", result.path);
    println!("Entity kind: {}", result.entity_kind);
    println!("Base name:   {}", result.base_name);
    println!();
    println!("Fields:");
    if result.fields.is_empty() {
        println!("  (none)");
    }
    for field in &result.fields {
        println!("  {:<20} {:<9} {}", field.name, field.index_type, field.kind);
    }
    println!();
    println!("Indexes:");
    for name in &result.indexes {
        println!("  {name}");
    }
    println!();
    println!("Engine settings: {}", result.configured_types.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodex_core::{EntityKind, FieldSpec};

    #[test]
    fn lists_fields_and_used_indexes() {
        let config = IndexConfig::new(EntityKind::Relationship, "Knows")
            .field("since", FieldSpec::numeric())
            .without_engine_settings(IndexType::Fulltext);
        let result = inspect(Path::new("knows.json"), &config);

        assert_eq!(result.entity_kind, "relationship");
        assert_eq!(result.fields.len(), 1);
        assert_eq!(result.fields[0].kind, "numeric");
        assert_eq!(result.indexes, vec!["Knows_exact".to_string()]);
        assert_eq!(result.configured_types, vec!["exact".to_string()]);
    }
}
