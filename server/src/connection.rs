use std::sync::Arc;

use common::err::{CResult, ReError};
use protocol::channel::PacketChannel;
use protocol::command::Command;
use protocol::packets::{column_type, encode_eof, encode_err_from, encode_ok, ColumnDefinition};
use protocol::prepared::{count_parameters, decode_execute_params};
use protocol::status::StatusFlags;
use session::{QueryContext, Session};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::auth;
use crate::prepared_response::{encode_stmt_param_defs, encode_stmt_prepare_ok, substitute_placeholders};
use crate::resultset::{column_definitions, write_result_set};
use crate::sql::{self, SqlOutcome};
use crate::state::AppState;

/// Drives one client connection end to end: handshake, then a command loop
/// that reads frames, dispatches them, and writes the matching response.
/// Every loop iteration derives its reply sequence id fresh from the
/// request frame's own sequence (`seq + 1`) rather than carrying a
/// connection-wide counter, since the client resets its sequence to zero
/// at the start of every new command.
pub async fn handle<S: AsyncRead + AsyncWrite + Unpin>(
    mut stream: S,
    peer: String,
    state: Arc<AppState>,
) -> CResult<()> {
    let session = state.sessions.create_session("unauthenticated", peer.clone());
    info!(thread_id = session.thread_id(), peer = %peer, "accepted connection");

    if let Err(err) = auth::handshake(
        &mut stream,
        &session,
        &state.config.server_version,
        state.config.max_packet_size,
    )
    .await
    {
        warn!(thread_id = session.thread_id(), error = %err, "handshake failed");
        state.sessions.remove(session.thread_id());
        return Err(err);
    }

    let mut channel = PacketChannel::new(stream, state.config.max_packet_size);
    if session.compression_enabled() {
        channel.enable_compression();
    }

    let result = command_loop(&mut channel, &session, &state).await;
    if let Some(txn) = session.take_transaction().await {
        if let Err(err) = txn.rollback().await {
            warn!(thread_id = session.thread_id(), error = %err, "rollback of abandoned transaction failed");
        }
    }
    state.sessions.remove(session.thread_id());
    info!(thread_id = session.thread_id(), "connection closed");
    result
}

async fn command_loop<S: AsyncRead + AsyncWrite + Unpin>(
    channel: &mut PacketChannel<S>,
    session: &Session,
    state: &Arc<AppState>,
) -> CResult<()> {
    loop {
        let frame = match channel.read_packet().await {
            Ok(frame) => frame,
            Err(ReError::ConnectionClosed) => return Ok(()),
            Err(ReError::IoError(io_err)) if io_err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err),
        };
        let mut seq = frame.seq.wrapping_add(1);

        let command = match Command::parse(&frame.payload) {
            Ok(cmd) => cmd,
            Err(err) => {
                channel.write_packet(&encode_err_from(&err), &mut seq).await?;
                continue;
            }
        };

        if matches!(command, Command::Quit) {
            return Ok(());
        }

        if let Err(err) = dispatch(channel, session, state, command, &mut seq).await {
            channel.write_packet(&encode_err_from(&err), &mut seq).await?;
        }
    }
}

async fn dispatch<S: AsyncRead + AsyncWrite + Unpin>(
    channel: &mut PacketChannel<S>,
    session: &Session,
    state: &Arc<AppState>,
    command: Command,
    seq: &mut u8,
) -> CResult<()> {
    match command {
        Command::Quit => Ok(()),
        Command::InitDb(db) => {
            session.use_database(db.clone());
            session.bind_data_source(db);
            write_ok(channel, seq).await
        }
        Command::Query(sql_text) => run_query(channel, session, state, &sql_text, seq).await,
        Command::Ping | Command::Debug | Command::SetOption(_) => write_ok(channel, seq).await,
        Command::Statistics => {
            let text = format!("Threads: {}", state.sessions.list().len());
            channel.write_packet(text.as_bytes(), seq).await
        }
        Command::ProcessInfo => {
            let rows = infoschema::tables::processlist(&state.queries);
            let columns = vec!["ID".to_string(), "INFO".to_string(), "TIME".to_string(), "STATE".to_string()];
            let column_defs = column_definitions(&columns, &rows);
            write_result_set(channel, seq, &column_defs, &rows, StatusFlags::default().bits()).await
        }
        Command::ProcessKill(thread_id) => match state.queries.kill_by_thread_id(thread_id) {
            Ok(()) => write_ok(channel, seq).await,
            Err(err) => Err(err),
        },
        Command::FieldList { table, .. } => {
            let handle = sql::resolve_source(state, session)?;
            let source = handle.read().await;
            let info = source.get_table_info(&table).await?;
            drop(source);
            for col in &info.columns {
                let def = ColumnDefinition::new(col.name.clone(), column_type::MYSQL_TYPE_VAR_STRING);
                channel.write_packet(&def.encode(), seq).await?;
            }
            channel.write_packet(&encode_eof(0, 0), seq).await
        }
        Command::Shutdown => write_ok(channel, seq).await,
        Command::StmtPrepare(sql_text) => {
            let param_count = count_parameters(&sql_text) as u16;
            let statement_id = session.with_statements(|t| t.prepare(sql_text, vec![]));
            channel.write_packet(&encode_stmt_prepare_ok(statement_id, param_count, 0), seq).await?;
            for frame in encode_stmt_param_defs(param_count) {
                channel.write_packet(&frame, seq).await?;
            }
            Ok(())
        }
        Command::StmtExecute { statement_id, payload } => {
            let prepared = session
                .with_statements(|t| t.get(statement_id).cloned())
                .ok_or_else(|| ReError::QueryNotFound(statement_id.to_string()))?;
            let params = decode_execute_params(&payload, prepared.param_count)?;
            let rendered = substitute_placeholders(&prepared.sql, &params);
            run_query(channel, session, state, &rendered, seq).await
        }
        Command::StmtClose(statement_id) => {
            session.with_statements(|t| t.close(statement_id));
            Ok(())
        }
    }
}

async fn run_query<S: AsyncRead + AsyncWrite + Unpin>(
    channel: &mut PacketChannel<S>,
    session: &Session,
    state: &Arc<AppState>,
    sql_text: &str,
    seq: &mut u8,
) -> CResult<()> {
    let ctx = QueryContext::new(session.thread_id(), sql_text);
    state.queries.register(ctx.clone());
    debug!(thread_id = session.thread_id(), sql = sql_text, "executing query");

    let outcome = sql::execute(state, session, &ctx, sql_text).await;
    ctx.mark_done();
    state.queries.unregister(ctx.query_id());

    match outcome? {
        SqlOutcome::ResultSet { columns, rows } => {
            let column_defs = column_definitions(&columns, &rows);
            write_result_set(channel, seq, &column_defs, &rows, StatusFlags::default().bits()).await
        }
        SqlOutcome::Affected { rows_affected, last_insert_id } => {
            channel
                .write_packet(&encode_ok(rows_affected, last_insert_id, StatusFlags::default().bits(), 0), seq)
                .await
        }
        SqlOutcome::Empty => write_ok(channel, seq).await,
    }
}

async fn write_ok<S: AsyncRead + AsyncWrite + Unpin>(channel: &mut PacketChannel<S>, seq: &mut u8) -> CResult<()> {
    channel.write_packet(&encode_ok(0, 0, StatusFlags::default().bits(), 0), seq).await
}
