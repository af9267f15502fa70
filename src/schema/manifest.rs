//! Target table manifest
//!
//! Target schemas are declared in a TOML manifest and deserialized into a
//! statically-typed list of `TargetTable` descriptors. Which models exist
//! is the caller's concern; the manifest is the resolved form the rest of
//! the crate consumes.

use serde::Deserialize;
use std::fs;

use crate::error::{Error, Result};
use crate::schema::types::TargetTable;

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(rename = "table", default)]
    tables: Vec<TargetTable>,
}

/// Load target table definitions from a TOML manifest file
pub fn load_manifest(path: &str) -> Result<Vec<TargetTable>> {
    let manifest_str = fs::read_to_string(path)
        .map_err(|e| Error::ManifestError(format!("Failed to read manifest file: {}", e)))?;

    parse_manifest(&manifest_str)
}

/// Parse target table definitions from TOML text
pub fn parse_manifest(manifest_str: &str) -> Result<Vec<TargetTable>> {
    let manifest: Manifest = toml::from_str(manifest_str)
        .map_err(|e| Error::ManifestError(format!("Failed to parse manifest: {}", e)))?;

    for table in &manifest.tables {
        if table.columns.is_empty() {
            return Err(Error::ManifestError(format!(
                "Table '{}' declares no columns",
                table.name
            )));
        }
    }

    Ok(manifest.tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn test_manifest_str() -> &'static str {
        r#"
        [[table]]
        name = "User"

          [[table.column]]
          name = "Id"
          data_type = "INTEGER"
          primary_key = true
          auto_increment = true

          [[table.column]]
          name = "UserName"
          data_type = "VARCHAR(10)"

          [[table.column]]
          name = "Email"
          data_type = "VARCHAR(30)"
          nullable = true

        [[table]]
        name = "Post"

          [[table.column]]
          name = "Id"
          data_type = "INTEGER"
          primary_key = true
          auto_increment = true

          [[table.column]]
          name = "AuthorId"
          data_type = "INTEGER"

          [[table.foreign_key]]
          name = "fk_post_author_id"
          columns = ["AuthorId"]
          ref_table = "User"
          ref_columns = ["Id"]
          on_delete = "CASCADE"
        "#
    }

    #[test]
    fn test_manifest_parsing() {
        let tables = parse_manifest(test_manifest_str()).unwrap();

        assert_eq!(tables.len(), 2);

        let user = &tables[0];
        assert_eq!(user.name, "User");
        assert_eq!(
            user.column_names(),
            vec!["Id".to_string(), "UserName".to_string(), "Email".to_string()]
        );
        assert!(user.columns[0].primary_key);
        assert!(user.columns[0].auto_increment);
        assert!(user.columns[2].nullable);
        assert!(user.foreign_keys.is_empty());

        let post = &tables[1];
        assert_eq!(post.foreign_keys.len(), 1);
        assert_eq!(post.foreign_keys[0].ref_table, "User");
        assert_eq!(post.foreign_keys[0].on_delete.as_deref(), Some("CASCADE"));
    }

    #[test]
    fn test_manifest_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(test_manifest_str().as_bytes()).unwrap();

        let tables = load_manifest(path.to_str().unwrap()).unwrap();
        assert_eq!(tables.len(), 2);
    }

    #[test]
    fn test_empty_column_list_rejected() {
        let manifest = r#"
        [[table]]
        name = "Empty"
        "#;

        let result = parse_manifest(manifest);
        assert!(matches!(result, Err(Error::ManifestError(_))));
    }

    #[test]
    fn test_missing_manifest_file() {
        let result = load_manifest("/nonexistent/tables.toml");
        assert!(matches!(result, Err(Error::ManifestError(_))));
    }
}
