use common::err::{CResult, ReError};
use common::row::{Row, Value};
use session::Session;

use super::SqlOutcome;
use crate::state::AppState;

/// `USE <database>` binds this session to the data source instance of the
/// same name, the way a single-schema-per-instance layout maps database
/// names onto backend instances. Errors rather than silently falling back
/// to the default instance if the name isn't registered.
pub async fn use_database(session: &Session, sql: &str) -> CResult<SqlOutcome> {
    let rest = sql[3..].trim();
    let name = rest.trim_matches(|c| c == '`' || c == '\'' || c == '"').to_string();
    if name.is_empty() {
        return Err(ReError::ParseError("USE requires a database name".to_string()));
    }
    session.use_database(name.clone());
    session.bind_data_source(name);
    Ok(SqlOutcome::Empty)
}

/// Handles the handful of `SHOW` forms this server understands: table and
/// database listing, session variables, and a pass-through to
/// `information_schema` for anything that already has a virtual table.
pub async fn show(state: &AppState, session: &Session, sql: &str) -> CResult<SqlOutcome> {
    let rest = sql[4..].trim();
    let upper = rest.to_ascii_uppercase();

    if upper.starts_with("DATABASES") {
        let rows = state
            .data_sources
            .names()
            .into_iter()
            .map(|name| {
                let mut row = Row::new();
                row.set("Database", Value::String(name));
                row
            })
            .collect();
        return Ok(SqlOutcome::ResultSet {
            columns: vec!["Database".to_string()],
            rows,
        });
    }

    if upper.starts_with("TABLES") {
        let instance = current_instance(state, session)?;
        let rows = state.info_schema.query("TABLES", &instance, None).await?;
        let column = format!("Tables_in_{instance}");
        let rows = rows
            .into_iter()
            .map(|r| {
                let mut row = Row::new();
                row.set(column.clone(), r.get("TABLE_NAME").cloned().unwrap_or(Value::Null));
                row
            })
            .collect();
        return Ok(SqlOutcome::ResultSet {
            columns: vec![column],
            rows,
        });
    }

    if upper.starts_with("VARIABLES") {
        let vars = session.get_all_variables();
        let rows = vars
            .into_iter()
            .map(|(name, value)| {
                let mut row = Row::new();
                row.set("Variable_name", Value::String(name));
                row.set("Value", Value::String(value.to_text()));
                row
            })
            .collect();
        return Ok(SqlOutcome::ResultSet {
            columns: vec!["Variable_name".to_string(), "Value".to_string()],
            rows,
        });
    }

    Err(ReError::Unsupported(format!("unsupported SHOW statement: {sql}")))
}

fn current_instance(state: &AppState, session: &Session) -> CResult<String> {
    match session.bound_data_source() {
        Some(name) => Ok(name),
        None => state
            .data_sources
            .names()
            .into_iter()
            .next()
            .ok_or_else(|| ReError::DataSourceNotFound("no data source registered".to_string())),
    }
}

/// Hand-rolled `SET [GLOBAL|SESSION] name = value` / `SET @user_var = value`.
/// Only ever affects this session's variable bag; there is no cross-session
/// global state to mutate.
pub async fn set(session: &Session, sql: &str) -> CResult<SqlOutcome> {
    let rest = sql[3..].trim();
    let rest = rest
        .strip_prefix("GLOBAL")
        .or_else(|| rest.strip_prefix("global"))
        .or_else(|| rest.strip_prefix("SESSION"))
        .or_else(|| rest.strip_prefix("session"))
        .unwrap_or(rest)
        .trim();

    let (name, value_text) = rest
        .split_once('=')
        .ok_or_else(|| ReError::ParseError("SET requires name = value".to_string()))?;
    let name = name.trim();
    let value_text = value_text.trim();
    let value = parse_set_value(value_text);
    session.set_variable(name, value);
    Ok(SqlOutcome::Empty)
}

fn parse_set_value(text: &str) -> Value {
    let trimmed = text.trim_matches(|c| c == '\'' || c == '"');
    if trimmed.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Value::Float(f);
    }
    Value::String(trimmed.to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_quoted_and_numeric_set_values() {
        assert_eq!(parse_set_value("'utf8mb4'"), Value::String("utf8mb4".to_string()));
        assert_eq!(parse_set_value("1"), Value::Int(1));
        assert_eq!(parse_set_value("3.5"), Value::Float(3.5));
        assert_eq!(parse_set_value("true"), Value::Bool(true));
    }

    #[tokio::test]
    async fn use_database_binds_session() {
        let session = Session::new(1, "root", "localhost");
        use_database(&session, "USE analytics").await.unwrap();
        assert_eq!(session.current_database(), Some("analytics".to_string()));
        assert_eq!(session.bound_data_source(), Some("analytics".to_string()));
    }
}
