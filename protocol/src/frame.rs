use byteorder::{ByteOrder, LittleEndian};
use common::err::{CResult, ReError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::{MAX_PAYLOAD_LEN, PACKET_HEADER_SIZE};

/// A single logical message's payload plus the sequence id its *first*
/// physical frame carried (callers that need every continuation frame's
/// sequence id track it themselves; in practice the reassembled payload and
/// first sequence id are what every command handler needs).
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub payload: Vec<u8>,
    pub seq: u8,
}

/// Reads one logical message, following the large-packet split protocol:
/// a payload length of `0x00FFFFFF` means "more data follows in the next
/// frame with sequence id + 1", repeated until a frame shorter than the
/// max length terminates the message.
pub async fn read_packet<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_packet_size: u32,
) -> CResult<Frame> {
    let mut payload = Vec::new();
    let mut first_seq: Option<u8> = None;
    let mut expected_seq: u8 = 0;

    loop {
        let mut header = [0u8; PACKET_HEADER_SIZE];
        reader.read_exact(&mut header).await?;
        let len = LittleEndian::read_u24(&header[0..3]);
        let seq = header[3];

        if len > max_packet_size {
            return Err(ReError::PacketTooLarge(len));
        }

        match first_seq {
            None => {
                first_seq = Some(seq);
                expected_seq = seq;
            }
            Some(_) => {
                if seq != expected_seq {
                    return Err(ReError::PacketSequence {
                        expected: expected_seq,
                        got: seq,
                    });
                }
            }
        }
        expected_seq = expected_seq.wrapping_add(1);

        let mut chunk = vec![0u8; len as usize];
        reader.read_exact(&mut chunk).await?;
        let is_final = len < MAX_PAYLOAD_LEN;
        payload.extend_from_slice(&chunk);

        if is_final {
            break;
        }
    }

    Ok(Frame {
        payload,
        seq: first_seq.unwrap_or(0),
    })
}

/// Writes `payload` as one or more physical frames, starting at sequence
/// `*seq`, and leaves `*seq` one past the last frame written (mod 256).
pub async fn write_packet<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
    seq: &mut u8,
) -> CResult<()> {
    let bytes = encode_packet_bytes(payload, seq);
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Builds the raw wire bytes `write_packet` would send for `payload`
/// (header-plus-body per physical frame) without touching any stream.
/// Used by the compressed transport, which needs the plain packet bytes as
/// the payload it wraps rather than writing them straight to the socket.
pub fn encode_packet_bytes(payload: &[u8], seq: &mut u8) -> Vec<u8> {
    let mut out = Vec::new();
    for frame in split(payload, MAX_PAYLOAD_LEN as usize) {
        let mut header = [0u8; PACKET_HEADER_SIZE];
        LittleEndian::write_u24(&mut header[0..3], frame.len() as u32);
        header[3] = *seq;
        out.extend_from_slice(&header);
        out.extend_from_slice(&frame);
        *seq = seq.wrapping_add(1);
    }
    out
}

/// The buffer-based counterpart of `read_packet`: parses one logical
/// message out of `buf` following the same large-packet split protocol,
/// returning the frame and how many leading bytes it consumed. Returns
/// `Ok(None)` rather than erroring when `buf` doesn't yet hold a complete
/// message, so a caller can keep accumulating bytes (e.g. from decompressed
/// compressed-packet frames) and retry.
pub fn decode_packet_bytes(buf: &[u8]) -> CResult<Option<(Frame, usize)>> {
    let mut offset = 0usize;
    let mut payload = Vec::new();
    let mut first_seq: Option<u8> = None;
    let mut expected_seq: u8 = 0;

    loop {
        if buf.len() < offset + PACKET_HEADER_SIZE {
            return Ok(None);
        }
        let header = &buf[offset..offset + PACKET_HEADER_SIZE];
        let len = LittleEndian::read_u24(&header[0..3]) as usize;
        let seq = header[3];
        if buf.len() < offset + PACKET_HEADER_SIZE + len {
            return Ok(None);
        }

        match first_seq {
            None => {
                first_seq = Some(seq);
                expected_seq = seq;
            }
            Some(_) => {
                if seq != expected_seq {
                    return Err(ReError::PacketSequence {
                        expected: expected_seq,
                        got: seq,
                    });
                }
            }
        }
        expected_seq = expected_seq.wrapping_add(1);

        let chunk_start = offset + PACKET_HEADER_SIZE;
        let chunk_end = chunk_start + len;
        payload.extend_from_slice(&buf[chunk_start..chunk_end]);
        offset = chunk_end;

        if (len as u32) < MAX_PAYLOAD_LEN {
            break;
        }
    }

    Ok(Some((
        Frame {
            payload,
            seq: first_seq.unwrap_or(0),
        },
        offset,
    )))
}

/// Carves `payload` into frames of at most `max` bytes. If `payload`'s
/// length is an exact multiple of `max` (including zero), an empty
/// terminator slice is appended so the final frame's length is always
/// strictly less than `max` — the wire-level signal that the message is
/// complete.
pub fn split(payload: &[u8], max: usize) -> Vec<Vec<u8>> {
    if payload.is_empty() {
        return vec![Vec::new()];
    }
    let mut frames = Vec::new();
    let mut offset = 0;
    while offset < payload.len() {
        let end = (offset + max).min(payload.len());
        frames.push(payload[offset..end].to_vec());
        offset = end;
    }
    if payload.len() % max == 0 {
        frames.push(Vec::new());
    }
    frames
}

/// Inverse of `split`: concatenates frame payloads back into one buffer.
pub fn assemble(frames: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for frame in frames {
        out.extend_from_slice(frame);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn split_assemble_round_trip() {
        let payload = vec![7u8; 37];
        let frames = split(&payload, 10);
        assert_eq!(assemble(&frames), payload);
        assert!(frames.last().unwrap().len() < 10);
    }

    #[test]
    fn split_appends_empty_terminator_on_exact_multiple() {
        let payload = vec![1u8; 20];
        let frames = split(&payload, 10);
        assert_eq!(frames.len(), 3);
        assert!(frames.last().unwrap().is_empty());
    }

    #[test]
    fn split_of_empty_payload_is_single_empty_frame() {
        let frames = split(&[], 10);
        assert_eq!(frames, vec![Vec::<u8>::new()]);
    }

    #[tokio::test]
    async fn read_packet_round_trips_small_payload() {
        let payload = b"select 1".to_vec();
        let mut buf = Vec::new();
        let mut seq = 0u8;
        write_packet(&mut buf, &payload, &mut seq).await.unwrap();
        assert_eq!(seq, 1);

        let mut cursor = Cursor::new(buf);
        let frame = read_packet(&mut cursor, 16 * 1024 * 1024).await.unwrap();
        assert_eq!(frame.payload, payload);
        assert_eq!(frame.seq, 0);
    }

    #[tokio::test]
    async fn read_packet_rejects_oversized_frame() {
        let mut header = [0u8; PACKET_HEADER_SIZE];
        LittleEndian::write_u24(&mut header[0..3], 100);
        let mut cursor = Cursor::new(header.to_vec());
        let err = read_packet(&mut cursor, 50).await.unwrap_err();
        assert!(matches!(err, ReError::PacketTooLarge(100)));
    }

    #[test]
    fn decode_packet_bytes_returns_none_until_complete() {
        let payload = b"select 1".to_vec();
        let mut seq = 5u8;
        let bytes = encode_packet_bytes(&payload, &mut seq);
        assert!(decode_packet_bytes(&bytes[..3]).unwrap().is_none());
        let (frame, consumed) = decode_packet_bytes(&bytes).unwrap().unwrap();
        assert_eq!(frame.payload, payload);
        assert_eq!(frame.seq, 5);
        assert_eq!(consumed, bytes.len());
    }

    #[tokio::test]
    async fn read_packet_detects_out_of_order_continuation() {
        let mut buf = Vec::new();
        // First frame: full-size marker (would normally be MAX_PAYLOAD_LEN,
        // but we use a smaller max_packet_size in this test to keep it cheap).
        let mut header = [0u8; PACKET_HEADER_SIZE];
        LittleEndian::write_u24(&mut header[0..3], 5);
        header[3] = 0;
        buf.extend_from_slice(&header);
        buf.extend_from_slice(&[0u8; 5]);
        // Second frame arrives with the wrong sequence id.
        let mut header2 = [0u8; PACKET_HEADER_SIZE];
        LittleEndian::write_u24(&mut header2[0..3], 5);
        header2[3] = 5; // should have been 1
        buf.extend_from_slice(&header2);
        buf.extend_from_slice(&[0u8; 5]);

        // Force large-packet continuation by reading with a max equal to 5
        // and payload len equal to MAX_PAYLOAD_LEN sentinel isn't hit here;
        // this test instead exercises the generic sequence check path by
        // constructing two frames of the max sentinel length.
        let mut buf2 = Vec::new();
        let mut h = [0u8; PACKET_HEADER_SIZE];
        LittleEndian::write_u24(&mut h[0..3], MAX_PAYLOAD_LEN);
        h[3] = 0;
        buf2.extend_from_slice(&h);
        buf2.extend_from_slice(&vec![0u8; MAX_PAYLOAD_LEN as usize]);
        let mut h2 = [0u8; PACKET_HEADER_SIZE];
        LittleEndian::write_u24(&mut h2[0..3], 1);
        h2[3] = 9; // wrong, expected 1
        buf2.extend_from_slice(&h2);
        buf2.extend_from_slice(&[0u8]);

        let mut cursor = Cursor::new(buf2);
        let err = read_packet(&mut cursor, MAX_PAYLOAD_LEN + 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ReError::PacketSequence { .. }));
    }
}
