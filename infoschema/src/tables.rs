use common::row::{Row, Value};
use datasource::contract::DataSource;
use datasource::factory::FactoryRegistry;
use session::{QueryRegistry, QueryStatus};

use crate::acl::AclAdapter;

fn row(pairs: &[(&str, Value)]) -> Row {
    let mut row = Row::new();
    for (name, value) in pairs {
        row.set(*name, value.clone());
    }
    row
}

fn text(s: impl Into<String>) -> Value {
    Value::String(s.into())
}

/// One distinct schema name per registered data-source instance (the
/// instance name doubles as its schema in this server, since each backend
/// owns exactly one namespace of tables).
pub fn schemata(instance_names: &[String]) -> Vec<Row> {
    let mut seen = std::collections::HashSet::new();
    instance_names
        .iter()
        .filter(|name| seen.insert((*name).clone()))
        .map(|name| row(&[("SCHEMA_NAME", text(name.clone())), ("DEFAULT_CHARACTER_SET_NAME", text("utf8mb4"))]))
        .collect()
}

/// Per-source table metadata: one row per table name the source reports.
pub async fn tables(instance_name: &str, source: &dyn DataSource) -> common::err::CResult<Vec<Row>> {
    let names = source.get_tables().await?;
    Ok(names
        .into_iter()
        .map(|name| {
            row(&[
                ("TABLE_SCHEMA", text(instance_name.to_string())),
                ("TABLE_NAME", text(name)),
                ("TABLE_TYPE", text("BASE TABLE")),
                ("ENGINE", text(source.get_config().backend_type.to_string())),
            ])
        })
        .collect())
}

/// Per-column metadata for one table, sourced from its `TableInfo`.
pub async fn columns(instance_name: &str, source: &dyn DataSource, table: &str) -> common::err::CResult<Vec<Row>> {
    let info = source.get_table_info(table).await?;
    Ok(info
        .columns
        .iter()
        .enumerate()
        .map(|(position, col)| {
            row(&[
                ("TABLE_SCHEMA", text(instance_name.to_string())),
                ("TABLE_NAME", text(table.to_string())),
                ("COLUMN_NAME", text(col.name.clone())),
                ("ORDINAL_POSITION", Value::Int(position as i64 + 1)),
                ("DATA_TYPE", text(col.type_name.clone())),
                ("IS_NULLABLE", text(if col.nullable { "YES" } else { "NO" })),
                ("COLUMN_KEY", text(if col.primary_key { "PRI" } else if col.unique { "UNI" } else { "" })),
                ("EXTRA", text(if col.auto_increment { "auto_increment" } else { "" })),
            ])
        })
        .collect())
}

/// One row per primary/unique-key column, mirroring
/// `information_schema.KEY_COLUMN_USAGE`.
pub async fn key_column_usage(instance_name: &str, source: &dyn DataSource, table: &str) -> common::err::CResult<Vec<Row>> {
    let info = source.get_table_info(table).await?;
    Ok(info
        .columns
        .iter()
        .filter(|col| col.primary_key || col.unique)
        .map(|col| {
            row(&[
                ("TABLE_SCHEMA", text(instance_name.to_string())),
                ("TABLE_NAME", text(table.to_string())),
                ("COLUMN_NAME", text(col.name.clone())),
                (
                    "CONSTRAINT_NAME",
                    text(if col.primary_key { "PRIMARY".to_string() } else { format!("{}_unique", col.name) }),
                ),
            ])
        })
        .collect())
}

/// One row per table-level constraint: a single `PRIMARY KEY` row when any
/// column is a primary key, plus one `UNIQUE` row per unique column.
pub async fn table_constraints(instance_name: &str, source: &dyn DataSource, table: &str) -> common::err::CResult<Vec<Row>> {
    let info = source.get_table_info(table).await?;
    let mut rows = Vec::new();
    if info.columns.iter().any(|c| c.primary_key) {
        rows.push(row(&[
            ("TABLE_SCHEMA", text(instance_name.to_string())),
            ("TABLE_NAME", text(table.to_string())),
            ("CONSTRAINT_NAME", text("PRIMARY")),
            ("CONSTRAINT_TYPE", text("PRIMARY KEY")),
        ]));
    }
    for col in info.columns.iter().filter(|c| c.unique && !c.primary_key) {
        rows.push(row(&[
            ("TABLE_SCHEMA", text(instance_name.to_string())),
            ("TABLE_NAME", text(table.to_string())),
            ("CONSTRAINT_NAME", text(format!("{}_unique", col.name))),
            ("CONSTRAINT_TYPE", text("UNIQUE")),
        ]));
    }
    Ok(rows)
}

/// Engine metadata surfaced from the process-wide `FactoryRegistry`.
pub fn engines(registry: &FactoryRegistry) -> Vec<Row> {
    registry
        .registered_types()
        .into_iter()
        .map(|backend_type| {
            let meta = registry
                .metadata_for(&backend_type)
                .expect("registered_types only lists types with metadata");
            row(&[
                ("ENGINE", text(backend_type.to_string())),
                ("SUPPORT", text("YES")),
                ("COMMENT", text(meta.comment)),
                ("TRANSACTIONS", text(if meta.supports_transactions { "YES" } else { "NO" })),
                ("XA", text(if meta.supports_xa { "YES" } else { "NO" })),
                ("SAVEPOINTS", text(if meta.supports_savepoints { "YES" } else { "NO" })),
            ])
        })
        .collect()
}

/// Snapshot of every in-flight query, mirroring `SHOW PROCESSLIST`.
pub fn processlist(registry: &QueryRegistry) -> Vec<Row> {
    registry
        .list()
        .into_iter()
        .map(|ctx| {
            let status = match ctx.status() {
                QueryStatus::Running => "Running",
                QueryStatus::Canceled => "Killed",
                QueryStatus::Timeout => "Timeout",
                QueryStatus::Done => "Done",
            };
            row(&[
                ("ID", Value::Int(ctx.thread_id() as i64)),
                ("INFO", text(ctx.sql().to_string())),
                ("TIME", Value::DateTime(ctx.started_at())),
                ("STATE", text(status)),
            ])
        })
        .collect()
}

/// `information_schema.USER_PRIVILEGES`. Empty whenever the ACL adapter
/// reports `is_loaded() == false`.
pub fn user_privileges(acl: &dyn AclAdapter) -> Vec<Row> {
    if !acl.is_loaded() {
        return Vec::new();
    }
    acl.get_users()
        .into_iter()
        .flat_map(|user| {
            user.privileges.into_iter().map(move |privilege| {
                row(&[
                    ("GRANTEE", text(format!("'{}'@'{}'", user.user, user.host))),
                    ("PRIVILEGE_TYPE", text(privilege)),
                    ("IS_GRANTABLE", text(if user.grant_option { "YES" } else { "NO" })),
                ])
            })
        })
        .collect()
}

/// `information_schema.SCHEMA_PRIVILEGES` — same shape as
/// `user_privileges`, scoped to one schema.
pub fn schema_privileges(acl: &dyn AclAdapter, schema: &str) -> Vec<Row> {
    if !acl.is_loaded() {
        return Vec::new();
    }
    acl.get_users()
        .into_iter()
        .flat_map(|user| {
            let schema = schema.to_string();
            user.privileges.into_iter().map(move |privilege| {
                row(&[
                    ("GRANTEE", text(format!("'{}'@'{}'", user.user, user.host))),
                    ("TABLE_SCHEMA", text(schema.clone())),
                    ("PRIVILEGE_TYPE", text(privilege)),
                ])
            })
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::acl::{AclUser, NoAcl};
    use common::err::CResult;
    use common::row::{ColumnInfo, TableInfo};
    use datasource::config::DataSourceConfig;
    use datasource::contract::ExecResult;
    use datasource::filter::FilterExpr;

    struct FakeSource {
        config: DataSourceConfig,
        table: TableInfo,
    }

    #[async_trait::async_trait]
    impl DataSource for FakeSource {
        async fn connect(&mut self) -> CResult<()> {
            Ok(())
        }
        async fn close(&mut self) -> CResult<()> {
            Ok(())
        }
        fn is_connected(&self) -> bool {
            true
        }
        fn is_writable(&self) -> bool {
            true
        }
        fn get_config(&self) -> &DataSourceConfig {
            &self.config
        }
        async fn get_tables(&self) -> CResult<Vec<String>> {
            Ok(vec![self.table.name.clone()])
        }
        async fn get_table_info(&self, _table: &str) -> CResult<TableInfo> {
            Ok(self.table.clone())
        }
        async fn query(&self, _table: &str, _filter: Option<&FilterExpr>) -> CResult<Vec<Row>> {
            Ok(vec![])
        }
        async fn insert(&self, _table: &str, rows: Vec<Row>) -> CResult<u64> {
            Ok(rows.len() as u64)
        }
        async fn update(&self, _table: &str, _filter: Option<&FilterExpr>, _changes: Row) -> CResult<u64> {
            Ok(0)
        }
        async fn delete(&self, _table: &str, _filter: Option<&FilterExpr>) -> CResult<u64> {
            Ok(0)
        }
        async fn create_table(&self, _info: &TableInfo) -> CResult<()> {
            Ok(())
        }
        async fn drop_table(&self, _table: &str) -> CResult<()> {
            Ok(())
        }
        async fn truncate_table(&self, _table: &str) -> CResult<()> {
            Ok(())
        }
        async fn execute(&self, _sql: &str) -> CResult<ExecResult> {
            Err(common::err::ReError::Unsupported("raw SQL".into()))
        }
    }

    fn fake_source() -> FakeSource {
        FakeSource {
            config: DataSourceConfig::new("mvcc", "primary"),
            table: TableInfo::new(
                "users",
                vec![
                    ColumnInfo::new("id", "bigint").primary_key(),
                    ColumnInfo::new("email", "varchar").not_null(),
                ],
            ),
        }
    }

    #[tokio::test]
    async fn columns_reports_ordinal_position_and_keys() {
        let source = fake_source();
        let rows = columns("primary", &source, "users").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("COLUMN_KEY"), Some(&text("PRI")));
        assert_eq!(rows[0].get("ORDINAL_POSITION"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn table_constraints_emits_one_primary_key_row() {
        let source = fake_source();
        let rows = table_constraints("primary", &source, "users").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("CONSTRAINT_TYPE"), Some(&text("PRIMARY KEY")));
    }

    #[test]
    fn schemata_deduplicates_instance_names() {
        let names = vec!["primary".to_string(), "primary".to_string(), "files".to_string()];
        let rows = schemata(&names);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn user_privileges_empty_when_acl_not_loaded() {
        assert!(user_privileges(&NoAcl).is_empty());
    }

    struct LoadedAcl;
    impl AclAdapter for LoadedAcl {
        fn get_users(&self) -> Vec<AclUser> {
            vec![AclUser {
                user: "root".to_string(),
                host: "%".to_string(),
                privileges: vec!["SELECT".to_string(), "INSERT".to_string()],
                grant_option: true,
            }]
        }
        fn check_permission(&self, _: &str, _: &str, _: &str, _: Option<&str>, _: Option<&str>, _: Option<&str>) -> bool {
            true
        }
        fn has_grant_option(&self, _: &str, _: &str) -> bool {
            true
        }
        fn is_loaded(&self) -> bool {
            true
        }
    }

    #[test]
    fn user_privileges_expands_one_row_per_privilege() {
        let rows = user_privileges(&LoadedAcl);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("GRANTEE"), Some(&text("'root'@'%'")));
    }
}
