use peerbridge_core::{Error, InboundMessage, OutboundEnvelope, Result};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Hard cap on a frame payload, shared by the framed and legacy paths.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

#[derive(Debug)]
pub enum ReadOutcome {
    Message(InboundMessage),
    /// Payload was malformed but the stream is still frame-aligned; the
    /// caller keeps reading.
    Skipped,
    Disconnected,
}

/// Serializes the envelope and writes one frame. Fails closed before any
/// byte reaches the stream when the payload exceeds [`MAX_FRAME_BYTES`];
/// the caller holds the stream lock, so prefix and payload cannot be
/// interleaved with another writer.
pub async fn send_envelope<W>(writer: &mut W, envelope: &OutboundEnvelope) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(envelope)?;
    write_frame(writer, &payload).await
}

pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_BYTES {
        return Err(Error::Frame(format!(
            "payload too large: {} bytes",
            payload.len()
        )));
    }
    let prefix = (payload.len() as u32).to_le_bytes();
    writer.write_all(&prefix).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the next inbound message.
///
/// The 4 bytes ahead are either a little-endian length prefix or, when the
/// first byte is `{`, the start of an unframed raw-JSON object from a
/// legacy sender. A length outside `0..=MAX_FRAME_BYTES` is fatal: frame
/// alignment is lost and there is no resynchronization point, so the
/// error propagates and the read loop stops. A bad payload inside a valid
/// frame only yields [`ReadOutcome::Skipped`].
pub async fn read_message<R>(reader: &mut R) -> Result<ReadOutcome>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(ReadOutcome::Disconnected),
        Err(e) => return Err(e.into()),
    }

    if prefix[0] == b'{' {
        return read_legacy(reader, prefix).await;
    }

    let length = i32::from_le_bytes(prefix);
    if length < 0 || length as usize > MAX_FRAME_BYTES {
        return Err(Error::Frame(format!("invalid frame length: {}", length)));
    }

    let mut payload = vec![0u8; length as usize];
    match reader.read_exact(&mut payload).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(ReadOutcome::Disconnected),
        Err(e) => return Err(e.into()),
    }

    Ok(parse_payload(&payload))
}

/// Brace-balancing scanner for senders that emit raw JSON with no length
/// prefix. The 4 bytes already consumed seed the scan; reading continues
/// one byte at a time until the depth returns to zero or the shared size
/// cap is hit.
async fn read_legacy<R>(reader: &mut R, head: [u8; 4]) -> Result<ReadOutcome>
where
    R: AsyncRead + Unpin,
{
    let mut payload = Vec::with_capacity(256);
    let mut depth = 0i32;
    let mut complete = false;

    for byte in head {
        payload.push(byte);
        if track_depth(byte, &mut depth) {
            complete = true;
            break;
        }
    }

    while !complete && payload.len() < MAX_FRAME_BYTES {
        let byte = match reader.read_u8().await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Ok(ReadOutcome::Disconnected)
            }
            Err(e) => return Err(e.into()),
        };
        payload.push(byte);
        if track_depth(byte, &mut depth) {
            complete = true;
        }
    }

    if !complete {
        warn!(bytes = payload.len(), "unterminated legacy payload, skipping");
        return Ok(ReadOutcome::Skipped);
    }

    debug!(bytes = payload.len(), "read unframed legacy payload");
    Ok(parse_payload(&payload))
}

/// Returns true when the closing brace of the outermost object was seen.
fn track_depth(byte: u8, depth: &mut i32) -> bool {
    match byte {
        b'{' => *depth += 1,
        b'}' => {
            *depth -= 1;
            if *depth == 0 {
                return true;
            }
        }
        _ => {}
    }
    false
}

fn parse_payload(payload: &[u8]) -> ReadOutcome {
    let text = match std::str::from_utf8(payload) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "frame payload is not valid UTF-8, skipping");
            return ReadOutcome::Skipped;
        }
    };
    if text.trim().is_empty() {
        warn!("empty frame payload, skipping");
        return ReadOutcome::Skipped;
    }
    match serde_json::from_str::<InboundMessage>(text) {
        Ok(message) => ReadOutcome::Message(message),
        Err(e) => {
            warn!(error = %e, "unparsable frame payload, skipping");
            ReadOutcome::Skipped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_envelope() -> OutboundEnvelope {
        let mut envelope = OutboundEnvelope::new("run the report", "2026-08-06 12:00:00");
        envelope.push_file(
            "/tmp/data.csv".into(),
            "data.csv".into(),
            "YSxiLGMK".into(),
        );
        envelope
    }

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut buf = (payload.len() as u32).to_le_bytes().to_vec();
        buf.extend_from_slice(payload);
        buf
    }

    #[tokio::test]
    async fn envelope_round_trips_through_a_frame() {
        let envelope = sample_envelope();
        let mut buf = Vec::new();
        send_envelope(&mut buf, &envelope).await.unwrap();

        let length = u32::from_le_bytes(buf[..4].try_into().unwrap()) as usize;
        assert_eq!(length, buf.len() - 4);

        let decoded: OutboundEnvelope = serde_json::from_slice(&buf[4..]).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[tokio::test]
    async fn length_prefix_is_exact_little_endian_byte_length() {
        let payload = br#"{"type":"shutdown"}"#;
        let mut buf = Vec::new();
        write_frame(&mut buf, payload).await.unwrap();

        let prefix = (payload.len() as u32).to_le_bytes();
        assert_eq!(&buf[..4], &prefix[..]);
        assert_eq!(&buf[4..], &payload[..]);
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected_before_any_byte_is_written() {
        let mut envelope = sample_envelope();
        envelope.message = "a".repeat(MAX_FRAME_BYTES + 1);

        let mut buf = Vec::new();
        let err = send_envelope(&mut buf, &envelope).await.unwrap_err();
        assert!(matches!(err, Error::Frame(_)));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn framed_response_text_is_parsed() {
        let data = framed(br#"{"type":"response_text","text":"hi"}"#);
        let outcome = read_message(&mut &data[..]).await.unwrap();
        match outcome {
            ReadOutcome::Message(InboundMessage::ResponseText { text }) => {
                assert_eq!(text, "hi")
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unframed_raw_json_routes_identically() {
        let data = br#"{"type":"response_text","text":"hi"}"#.to_vec();
        let outcome = read_message(&mut &data[..]).await.unwrap();
        match outcome {
            ReadOutcome::Message(InboundMessage::ResponseText { text }) => {
                assert_eq!(text, "hi")
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn legacy_scanner_balances_nested_objects() {
        let data = br#"{"type":"status_update","detail":{"phase":{"name":"idle"}}}"#.to_vec();
        let outcome = read_message(&mut &data[..]).await.unwrap();
        assert!(matches!(
            outcome,
            ReadOutcome::Message(InboundMessage::Unknown)
        ));
    }

    #[tokio::test]
    async fn legacy_payload_is_bounded_by_the_frame_cap() {
        // An opening object that never closes: the scanner must stop at the
        // cap and skip instead of reading forever.
        let mut data = br#"{"type":"response_text","text":""#.to_vec();
        data.resize(MAX_FRAME_BYTES + 16, b'a');
        let outcome = read_message(&mut &data[..]).await.unwrap();
        assert!(matches!(outcome, ReadOutcome::Skipped));
    }

    #[tokio::test]
    async fn negative_length_is_fatal() {
        let data = (-1i32).to_le_bytes();
        let err = read_message(&mut &data[..]).await.unwrap_err();
        assert!(matches!(err, Error::Frame(_)));
    }

    #[tokio::test]
    async fn oversized_length_is_fatal() {
        let data = 2_000_000u32.to_le_bytes();
        let err = read_message(&mut &data[..]).await.unwrap_err();
        assert!(matches!(err, Error::Frame(_)));
    }

    #[tokio::test]
    async fn bad_json_in_a_valid_frame_is_skipped_not_fatal() {
        let mut data = framed(b"not json");
        data.extend_from_slice(&framed(br#"{"type":"shutdown"}"#));

        let mut reader = &data[..];
        assert!(matches!(
            read_message(&mut reader).await.unwrap(),
            ReadOutcome::Skipped
        ));
        // The stream stays aligned: the next frame still parses.
        assert!(matches!(
            read_message(&mut reader).await.unwrap(),
            ReadOutcome::Message(InboundMessage::Shutdown)
        ));
    }

    #[tokio::test]
    async fn blank_payload_is_skipped() {
        let data = framed(b"   ");
        assert!(matches!(
            read_message(&mut &data[..]).await.unwrap(),
            ReadOutcome::Skipped
        ));

        let data = framed(b"");
        assert!(matches!(
            read_message(&mut &data[..]).await.unwrap(),
            ReadOutcome::Skipped
        ));
    }

    #[tokio::test]
    async fn closed_stream_reports_disconnected() {
        let data: &[u8] = &[];
        assert!(matches!(
            read_message(&mut &data[..]).await.unwrap(),
            ReadOutcome::Disconnected
        ));

        // Mid-prefix close is a disconnect too, not an error.
        let data: &[u8] = &[0x10, 0x00];
        assert!(matches!(
            read_message(&mut &data[..]).await.unwrap(),
            ReadOutcome::Disconnected
        ));
    }
}
