//! The canonical block envelope.
//!
//! Merged bundles and one-block files store blocks in this envelope: the
//! addressing header (refs, finality, time) readable without any chain
//! knowledge, followed by the chain-specific payload which stays opaque.

use bytes::{BufMut, Bytes, BytesMut};
use firehose_types::{Block, BlockDecoder, BlockRef, DecodeError};

/// Encodes a block into its stored envelope form.
pub fn encode_envelope(block: &Block) -> Bytes {
    let mut out = BytesMut::new();
    out.put_u64(block.reference.num);
    out.put_u64(block.parent.num);
    out.put_u64(block.last_final.num);
    out.put_u64(block.timestamp_nanos);
    put_str(&mut out, &block.reference.id);
    put_str(&mut out, &block.parent.id);
    put_str(&mut out, &block.last_final.id);
    put_str(&mut out, &block.payload_type);
    out.put_u32(block.payload.len() as u32);
    out.put_slice(&block.payload);
    out.freeze()
}

fn put_str(out: &mut BytesMut, value: &str) {
    out.put_u16(value.len() as u16);
    out.put_slice(value.as_bytes());
}

/// Decoder for the canonical envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCodec;

impl BlockDecoder for EnvelopeCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Block, DecodeError> {
        let mut reader = Reader { bytes, at: 0 };
        let num = reader.u64()?;
        let parent_num = reader.u64()?;
        let final_num = reader.u64()?;
        let timestamp_nanos = reader.u64()?;
        let id = reader.str()?;
        let parent_id = reader.str()?;
        let final_id = reader.str()?;
        let payload_type = reader.str()?;
        let payload = reader.payload()?;

        let block = Block {
            reference: BlockRef::new(num, id),
            parent: BlockRef::new(parent_num, parent_id),
            last_final: BlockRef::new(final_num, final_id),
            timestamp_nanos,
            payload_type,
            payload,
        };
        block.validate()?;
        Ok(block)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl Reader<'_> {
    fn take(&mut self, len: usize) -> Result<&[u8], DecodeError> {
        let end = self
            .at
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| DecodeError::Malformed("envelope truncated".to_string()))?;
        let slice = &self.bytes[self.at..end];
        self.at = end;
        Ok(slice)
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        let raw: [u8; 8] = self.take(8)?.try_into().expect("exact slice");
        Ok(u64::from_be_bytes(raw))
    }

    fn str(&mut self) -> Result<String, DecodeError> {
        let raw: [u8; 2] = self.take(2)?.try_into().expect("exact slice");
        let len = u16::from_be_bytes(raw) as usize;
        let value = std::str::from_utf8(self.take(len)?)
            .map_err(|_| DecodeError::Malformed("envelope string is not utf-8".to_string()))?;
        Ok(value.to_string())
    }

    fn payload(&mut self) -> Result<Bytes, DecodeError> {
        let raw: [u8; 4] = self.take(4)?.try_into().expect("exact slice");
        let len = u32::from_be_bytes(raw) as usize;
        let payload = Bytes::copy_from_slice(self.take(len)?);
        if self.at != self.bytes.len() {
            return Err(DecodeError::Malformed("trailing bytes after envelope".to_string()));
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Block {
        Block {
            reference: BlockRef::new(7, "7abc"),
            parent: BlockRef::new(6, "6abc"),
            last_final: BlockRef::new(5, "5abc"),
            timestamp_nanos: 1_700_000_000_000_000_000,
            payload_type: "type.chain/acme.Block".to_string(),
            payload: Bytes::from_static(b"opaque chain bytes"),
        }
    }

    #[test]
    fn round_trips() {
        let block = sample();
        let decoded = EnvelopeCodec.decode(&encode_envelope(&block)).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn truncation_is_malformed() {
        let encoded = encode_envelope(&sample());
        for cut in [0, 7, 33, encoded.len() - 1] {
            assert!(EnvelopeCodec.decode(&encoded[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn trailing_garbage_is_malformed() {
        let mut encoded = encode_envelope(&sample()).to_vec();
        encoded.push(0);
        assert!(EnvelopeCodec.decode(&encoded).is_err());
    }
}
