//! Protobuf decoding for the realtime feed.

use anyhow::Result;
use prost::Message;

use crate::gtfs_rt::FeedMessage;
use crate::snapshot::Snapshot;

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid protobuf for a `FeedMessage`.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage> {
    Ok(FeedMessage::decode(bytes)?)
}

/// Decodes raw feed bytes and normalizes them into a [`Snapshot`] stamped
/// with the given fetch time.
pub fn decode_snapshot(bytes: &[u8], fetched_at_ms: i64) -> Result<Snapshot> {
    let feed = parse_feed(bytes)?;
    Ok(Snapshot::from_feed(&feed, fetched_at_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_bytes_returns_default_feed() {
        // An empty byte array decodes to a FeedMessage with default values,
        // which is valid protobuf behavior
        let feed = parse_feed(&[]).unwrap();
        assert_eq!(feed.header.gtfs_realtime_version, "");
        assert!(feed.entity.is_empty());
    }

    #[test]
    fn test_parse_invalid_bytes() {
        let invalid_bytes = vec![0xFF, 0xFE, 0x00, 0x01];
        assert!(parse_feed(&invalid_bytes).is_err());
    }

    #[test]
    fn test_decode_snapshot_roundtrip() {
        use crate::gtfs_rt::{FeedHeader, FeedMessage};

        let feed = FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                timestamp: Some(1_700_000_000),
                incrementality: None,
                feed_version: None,
            },
            entity: vec![],
        };
        let snap = decode_snapshot(&feed.encode_to_vec(), 1_700_000_001_000).unwrap();

        assert_eq!(snap.header_epoch_sec, Some(1_700_000_000));
        assert_eq!(snap.fetched_at_ms, 1_700_000_001_000);
        assert!(snap.entities.is_empty());
    }

    #[test]
    fn test_decode_snapshot_garbage_is_error() {
        assert!(decode_snapshot(&[0xFF, 0xFE], 0).is_err());
    }
}
