//! MessagePack codec using `rmp-serde`.
//!
//! Values are encoded with `to_vec_named` (struct-as-map format), so payload
//! structs can gain fields without breaking an older peer's decoder.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// MessagePack codec for structured payload data.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MessagePack bytes.
    #[inline]
    pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MessagePack bytes to a value.
    ///
    /// Returns the raw `rmp-serde` error; callers that know the command type
    /// wrap it into [`RemoteError::PayloadDecode`](crate::RemoteError).
    #[inline]
    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> std::result::Result<T, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Record {
        id: u32,
        name: String,
        live: bool,
    }

    #[test]
    fn test_encode_decode_struct() {
        let original = Record {
            id: 42,
            name: "coroutine.lua".to_string(),
            live: true,
        };

        let encoded = MsgPackCodec::encode(&original).unwrap();
        let decoded: Record = MsgPackCodec::decode(&encoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_struct_encodes_as_map() {
        let rec = Record {
            id: 1,
            name: "x".to_string(),
            live: false,
        };
        let encoded = MsgPackCodec::encode(&rec).unwrap();

        // fixmap marker (0x8X), not fixarray (0x9X).
        assert_eq!(encoded[0] & 0xF0, 0x80);
    }

    #[test]
    fn test_decode_error_on_garbage() {
        let result: std::result::Result<Record, _> = MsgPackCodec::decode(b"not msgpack");
        assert!(result.is_err());
    }

    #[test]
    fn test_collections_roundtrip() {
        let list = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let encoded = MsgPackCodec::encode(&list).unwrap();
        let decoded: Vec<String> = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, list);
    }
}
