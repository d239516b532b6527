//! Warehouse schema catalog and the fragments indexed for retrieval.
//!
//! The catalog is the source of truth for what tables and columns exist.
//! It is flattened into one fragment per table and per column; fragments are
//! immutable once indexed and regenerated wholesale when the schema changes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Bundled default catalog: the event-enrollment mart this service was first
/// built against. Overridable with a catalog file of the same shape.
const DEFAULT_CATALOG_JSON: &str = include_str!("schema_catalog.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
  pub name: String,
  #[serde(rename = "type")]
  pub ty: String,
  #[serde(default)]
  pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
  pub table_name: String,
  #[serde(default)]
  pub description: String,
  /// Fully qualified name used in generated SQL, e.g.
  /// `project.dataset.table`. Falls back to `table_name` when unset.
  #[serde(default)]
  pub qualified_name: Option<String>,
  pub columns: Vec<ColumnSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaCatalog {
  pub tables: Vec<TableSchema>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
  Table,
  Column,
}

/// One indexed unit of schema metadata: a table or column description.
#[derive(Debug, Clone)]
pub struct SchemaFragment {
  /// Stable identifier, e.g. `table_mrt_events` or
  /// `table_mrt_events_col_profession`.
  pub id: String,
  pub table: String,
  pub column: Option<String>,
  pub kind: FragmentKind,
  /// Human-readable text, which is both what gets embedded and what is
  /// handed to the synthesizer as context.
  pub text: String,
}

impl SchemaCatalog {
  /// Load a catalog from a JSON file, or fall back to the bundled one.
  pub fn load(path: Option<&Path>) -> Result<Self> {
    match path {
      Some(p) => {
        let raw = std::fs::read_to_string(p)
          .with_context(|| format!("failed to read schema catalog {}", p.display()))?;
        serde_json::from_str(&raw)
          .with_context(|| format!("failed to parse schema catalog {}", p.display()))
      }
      None => {
        serde_json::from_str(DEFAULT_CATALOG_JSON).context("bundled schema catalog is invalid")
      }
    }
  }

  /// Flatten the catalog into retrievable fragments: one per table
  /// description, one per column.
  pub fn fragments(&self) -> Vec<SchemaFragment> {
    let mut fragments = Vec::new();

    for table in &self.tables {
      if !table.description.is_empty() {
        let mut text =
          format!("Table: {}. Description: {}", table.table_name, table.description);
        if let Some(qualified) = &table.qualified_name {
          text.push_str(&format!(" Fully qualified name: `{qualified}`."));
        }
        fragments.push(SchemaFragment {
          id: format!("table_{}", table.table_name),
          table: table.table_name.clone(),
          column: None,
          kind: FragmentKind::Table,
          text,
        });
      }

      for column in &table.columns {
        let mut text =
          format!("Table: {}. Column: {} (Type: {}).", table.table_name, column.name, column.ty);
        if !column.description.is_empty() {
          text.push_str(&format!(" Description: {}", column.description));
        }
        fragments.push(SchemaFragment {
          id: format!("table_{}_col_{}", table.table_name, column.name),
          table: table.table_name.clone(),
          column: Some(column.name.clone()),
          kind: FragmentKind::Column,
          text,
        });
      }
    }

    fragments
  }

  /// Fingerprint of the catalog's rendered fragments. Used to skip index
  /// rebuilds when the schema has not changed.
  pub fn fingerprint(&self) -> u64 {
    let mut hasher = DefaultHasher::new();
    for fragment in self.fragments() {
      fragment.id.hash(&mut hasher);
      fragment.text.hash(&mut hasher);
    }
    hasher.finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bundled_catalog_parses() {
    let catalog = SchemaCatalog::load(None).unwrap();
    assert_eq!(catalog.tables.len(), 1);
    assert_eq!(catalog.tables[0].table_name, "mrt_events");
    assert!(catalog.tables[0].columns.iter().any(|c| c.name == "profession"));
  }

  #[test]
  fn fragments_cover_table_and_columns() {
    let catalog = SchemaCatalog::load(None).unwrap();
    let fragments = catalog.fragments();

    // one table fragment plus one per column
    assert_eq!(fragments.len(), 1 + catalog.tables[0].columns.len());
    assert_eq!(fragments[0].kind, FragmentKind::Table);
    assert!(fragments[0].text.starts_with("Table: mrt_events."));
    assert!(fragments[0].text.contains("Fully qualified name:"));

    let profession = fragments.iter().find(|f| f.column.as_deref() == Some("profession")).unwrap();
    assert_eq!(profession.id, "table_mrt_events_col_profession");
    assert!(profession.text.contains("Column: profession (Type: STRING)"));
  }

  #[test]
  fn fingerprint_is_stable_and_change_sensitive() {
    let a = SchemaCatalog::load(None).unwrap();
    let b = SchemaCatalog::load(None).unwrap();
    assert_eq!(a.fingerprint(), b.fingerprint());

    let mut c = SchemaCatalog::load(None).unwrap();
    c.tables[0].columns.pop();
    assert_ne!(a.fingerprint(), c.fingerprint());
  }

  #[test]
  fn catalog_file_overrides_bundled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    std::fs::write(
      &path,
      r#"{"tables":[{"table_name":"orders","description":"Sales orders","columns":[{"name":"total","type":"FLOAT","description":"Order total"}]}]}"#,
    )
    .unwrap();

    let catalog = SchemaCatalog::load(Some(&path)).unwrap();
    assert_eq!(catalog.tables[0].table_name, "orders");
    assert_eq!(catalog.fragments().len(), 2);
  }
}
