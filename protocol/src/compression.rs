use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian};
use common::err::{CResult, ReError};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// 7-byte header of a compressed packet: 3-byte compressed length, 3-byte
/// uncompressed length, 1-byte sequence.
pub const COMPRESSED_HEADER_SIZE: usize = 7;

/// Threshold under which a payload is sent uncompressed inside a
/// compressed frame (uncompressed length 0 in the header marks this case).
pub const COMPRESSION_MIN_LEN: usize = 50;

pub fn compress(data: &[u8]) -> CResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub fn decompress(data: &[u8]) -> CResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| ReError::InvalidPacket(format!("zlib decompress failed: {e}")))?;
    Ok(out)
}

/// Wraps an already-framed payload (the output of `frame::split`'s header+
/// body) into a compressed-packet frame. When the payload is shorter than
/// `COMPRESSION_MIN_LEN`, it is stored as-is and the header's uncompressed
/// length is written as 0, per §4.1.
pub fn encode_compressed_frame(payload: &[u8], seq: u8) -> CResult<Vec<u8>> {
    let mut out = vec![0u8; COMPRESSED_HEADER_SIZE];
    let (body, uncompressed_len) = if payload.len() < COMPRESSION_MIN_LEN {
        (payload.to_vec(), 0u32)
    } else {
        (compress(payload)?, payload.len() as u32)
    };
    LittleEndian::write_u24(&mut out[0..3], body.len() as u32);
    LittleEndian::write_u24(&mut out[3..6], uncompressed_len);
    out[6] = seq;
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decodes a compressed-packet frame's 7-byte header plus body. Returns the
/// (possibly decompressed) payload and its sequence id.
pub fn decode_compressed_frame(frame: &[u8]) -> CResult<(Vec<u8>, u8)> {
    if frame.len() < COMPRESSED_HEADER_SIZE {
        return Err(ReError::InvalidPacket(
            "compressed frame shorter than header".into(),
        ));
    }
    let compressed_len = LittleEndian::read_u24(&frame[0..3]) as usize;
    let uncompressed_len = LittleEndian::read_u24(&frame[3..6]);
    let seq = frame[6];
    let body = &frame[COMPRESSED_HEADER_SIZE..];
    if body.len() < compressed_len {
        return Err(ReError::InvalidPacket("compressed frame truncated".into()));
    }
    let body = &body[..compressed_len];

    let payload = if uncompressed_len == 0 {
        body.to_vec()
    } else {
        decompress(body)?
    };
    Ok((payload, seq))
}

/// Writes `packet_bytes` (already-framed plain packet data, e.g. from
/// `frame::encode_packet_bytes`) as one compressed-packet frame and
/// advances `comp_seq`, the compressed layer's own sequence counter
/// (independent of the plain packet sequence it's wrapping).
pub async fn write_compressed_packet<W: AsyncWrite + Unpin>(
    writer: &mut W,
    packet_bytes: &[u8],
    comp_seq: &mut u8,
) -> CResult<()> {
    let frame = encode_compressed_frame(packet_bytes, *comp_seq)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    *comp_seq = comp_seq.wrapping_add(1);
    Ok(())
}

/// Reads one compressed-packet frame off the wire and returns its
/// (possibly decompressed) body; the caller is responsible for parsing
/// plain packets back out of that body, since one compressed frame can
/// carry more than one of them.
pub async fn read_compressed_packet<R: AsyncRead + Unpin>(reader: &mut R) -> CResult<Vec<u8>> {
    let mut header = [0u8; COMPRESSED_HEADER_SIZE];
    reader.read_exact(&mut header).await?;
    let compressed_len = LittleEndian::read_u24(&header[0..3]) as usize;
    let mut body = vec![0u8; compressed_len];
    reader.read_exact(&mut body).await?;
    let mut frame = Vec::with_capacity(header.len() + body.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(&body);
    let (payload, _seq) = decode_compressed_frame(&frame)?;
    Ok(payload)
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn write_then_read_compressed_packet_round_trips() {
        let mut buf = Vec::new();
        let mut seq = 0u8;
        let packet = vec![b'z'; 200];
        write_compressed_packet(&mut buf, &packet, &mut seq).await.unwrap();
        assert_eq!(seq, 1);
        let mut cursor = std::io::Cursor::new(buf);
        let decoded = read_compressed_packet(&mut cursor).await.unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn compress_decompress_round_trip() {
        let data = b"hello hello hello hello hello hello hello hello".to_vec();
        let compressed = compress(&data).unwrap();
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn short_payload_is_stored_uncompressed() {
        let payload = b"short";
        let frame = encode_compressed_frame(payload, 3).unwrap();
        let (decoded, seq) = decode_compressed_frame(&frame).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(seq, 3);
    }

    #[test]
    fn long_payload_round_trips_through_compression() {
        let payload = vec![b'x'; 500];
        let frame = encode_compressed_frame(&payload, 7).unwrap();
        let (decoded, seq) = decode_compressed_frame(&frame).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(seq, 7);
    }

    #[test]
    fn garbage_body_fails_as_invalid_packet() {
        let mut frame = vec![0u8; COMPRESSED_HEADER_SIZE];
        LittleEndian::write_u24(&mut frame[0..3], 4);
        LittleEndian::write_u24(&mut frame[3..6], 100);
        frame.extend_from_slice(&[1, 2, 3, 4]);
        assert!(decode_compressed_frame(&frame).is_err());
    }
}
