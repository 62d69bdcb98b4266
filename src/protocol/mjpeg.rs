//! Downstream motion-JPEG framing
//!
//! Every frame sent to a viewer is wrapped as:
//!
//! ```text
//! --myboundary\r\n
//! Content-Type: image/jpeg\r\n
//! \r\n
//! <payload>\r\n
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::constants::DOWNSTREAM_BOUNDARY;

const PART_HEADER: &[u8] = b"Content-Type: image/jpeg\r\n\r\n";

/// Wrap one JPEG payload as a downstream multipart part
pub fn encode_part(payload: &[u8]) -> Bytes {
    let mut buf =
        BytesMut::with_capacity(DOWNSTREAM_BOUNDARY.len() + 2 + PART_HEADER.len() + payload.len() + 2);
    buf.put_slice(DOWNSTREAM_BOUNDARY.as_bytes());
    buf.put_slice(b"\r\n");
    buf.put_slice(PART_HEADER);
    buf.put_slice(payload);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_part_layout() {
        let part = encode_part(b"\xFF\xD8jpeg\xFF\xD9");

        let mut expected = b"--myboundary\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        expected.extend_from_slice(b"\xFF\xD8jpeg\xFF\xD9");
        expected.extend_from_slice(b"\r\n");
        assert_eq!(part.as_ref(), expected.as_slice());
    }

    #[test]
    fn test_encoded_parts_demux_back() {
        use crate::protocol::multipart::MultipartDemuxer;

        let mut stream = Vec::new();
        stream.extend_from_slice(&encode_part(b"one"));
        stream.extend_from_slice(&encode_part(b"two"));
        stream.extend_from_slice(b"--myboundary--");

        // The delimiter written is "--myboundary", i.e. boundary "myboundary"
        let mut demuxer = MultipartDemuxer::new("myboundary");
        demuxer.feed(&stream);

        let first = demuxer.next_part().unwrap().unwrap();
        let second = demuxer.next_part().unwrap().unwrap();
        assert_eq!(first.body().as_ref(), b"one");
        assert_eq!(second.body().as_ref(), b"two");
        assert_eq!(first.header("Content-Type"), Some("image/jpeg"));
    }
}
