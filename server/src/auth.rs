use common::err::CResult;
use protocol::capability::CapabilityFlags;
use protocol::constants::{auth_plugin_names, UTF8_MB4_GENERAL_CI};
use protocol::frame::{read_packet, write_packet};
use protocol::handshake::{generate_scramble, HandshakeResponse41, HandshakeV10};
use protocol::packets::{encode_err_from, encode_ok};
use protocol::status::StatusFlags;
use session::Session;
use tokio::io::{AsyncRead, AsyncWrite};

/// Runs the connection's initial handshake: sends `HandshakeV10`, reads and
/// validates the client's response, and replies with OK or ERR. This
/// server trusts any username with any password — there's no account
/// store behind it — so the only way this fails is a malformed response
/// packet.
pub async fn handshake<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    session: &Session,
    server_version: &str,
    max_packet_size: u32,
) -> CResult<()> {
    let initial = HandshakeV10 {
        server_version: server_version.to_string(),
        connection_id: session.thread_id(),
        scramble: generate_scramble(),
        capability_flags: CapabilityFlags::server_default(),
        charset: UTF8_MB4_GENERAL_CI,
        status_flags: StatusFlags::default().bits(),
        auth_plugin_name: auth_plugin_names::MY_SQL_NATIVE_PASSWORD.to_string(),
    };

    let mut seq = 0u8;
    write_packet(stream, &initial.encode(), &mut seq).await?;

    let frame = read_packet(stream, max_packet_size).await?;
    let mut response_seq = frame.seq.wrapping_add(1);

    match HandshakeResponse41::parse(&frame.payload) {
        Ok(response) => {
            session.set_user(response.username);
            session.set_client_capabilities(response.capability_flags);
            if let Some(db) = response.database {
                session.use_database(db.clone());
                session.bind_data_source(db);
            }
            write_packet(
                stream,
                &encode_ok(0, 0, StatusFlags::default().bits(), 0),
                &mut response_seq,
            )
            .await?;
        }
        Err(err) => {
            write_packet(stream, &encode_err_from(&err), &mut response_seq).await?;
            return Err(err);
        }
    }
    Ok(())
}
