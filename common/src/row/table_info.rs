use serde::{Deserialize, Serialize};

/// Schema description for a table, independent of which backend serves it.
/// Invariants (enforced by `TableInfo::validate`): column names are unique
/// within the table; primary-key columns are not nullable; a generated
/// column has non-empty dependencies; a vector column carries non-empty
/// type metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub schema: Option<String>,
    pub temporary: bool,
    pub columns: Vec<ColumnInfo>,
    pub attributes: std::collections::HashMap<String, String>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            temporary: false,
            columns,
            attributes: Default::default(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(format!("duplicate column name: {}", col.name));
            }
            if col.primary_key && col.nullable {
                return Err(format!("primary key column '{}' must not be nullable", col.name));
            }
            if let Some(deps) = &col.generated_dependencies {
                if deps.is_empty() {
                    return Err(format!("generated column '{}' has no dependencies", col.name));
                }
            }
            if let Some(vec_info) = &col.vector_type {
                if vec_info.algo.is_empty() {
                    return Err(format!("vector column '{}' has empty algo tag", col.name));
                }
            }
        }
        Ok(())
    }

    pub fn primary_key_columns(&self) -> Vec<&ColumnInfo> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub auto_increment: bool,
    pub default_expr: Option<String>,
    pub foreign_key: Option<ForeignKeyRef>,
    pub generated_dependencies: Option<Vec<String>>,
    pub vector_type: Option<VectorTypeInfo>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable: true,
            primary_key: false,
            unique: false,
            auto_increment: false,
            default_expr: None,
            foreign_key: None,
            generated_dependencies: None,
            vector_type: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorTypeInfo {
    pub dim: u32,
    pub algo: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn primary_key_must_not_be_nullable() {
        let mut col = ColumnInfo::new("id", "bigint");
        col.primary_key = true;
        col.nullable = true;
        let table = TableInfo::new("t", vec![col]);
        assert!(table.validate().is_err());
    }

    #[test]
    fn duplicate_column_names_rejected() {
        let table = TableInfo::new(
            "t",
            vec![ColumnInfo::new("a", "int"), ColumnInfo::new("a", "int")],
        );
        assert!(table.validate().is_err());
    }
}
