use crate::common::document::{Document, DOC_ID};
use crate::common::Value;
use crate::errors::{DolomiteError, DolomiteResult, ErrorKind};
use crate::store::DocumentCodec;

/// Binary document codec over bincode's serde integration.
#[derive(Default, Clone, Copy)]
pub struct BincodeCodec;

impl BincodeCodec {
    pub fn new() -> Self {
        BincodeCodec
    }
}

impl DocumentCodec for BincodeCodec {
    fn serialize(&self, doc: &Document) -> DolomiteResult<Vec<u8>> {
        bincode::serde::encode_to_vec(doc, bincode::config::legacy()).map_err(|err| {
            log::error!("Failed to serialize document: {}", err);
            DolomiteError::new_with_cause(
                "failed to serialize document",
                ErrorKind::Encoding,
                DolomiteError::new(&err.to_string(), ErrorKind::Encoding),
            )
        })
    }

    fn deserialize(&self, bytes: &[u8]) -> DolomiteResult<Document> {
        bincode::serde::decode_from_slice(bytes, bincode::config::legacy())
            .map(|(doc, _)| doc)
            .map_err(|err| {
                log::error!("Failed to deserialize document: {}", err);
                DolomiteError::new_with_cause(
                    "failed to deserialize document",
                    ErrorKind::Encoding,
                    DolomiteError::new(&err.to_string(), ErrorKind::Encoding),
                )
            })
    }

    fn serialize_id(&self, id: &Value) -> DolomiteResult<Vec<u8>> {
        // The identifier travels inside a one-field document so that every
        // value variant shares one key encoding.
        let mut wrapper = Document::new();
        wrapper.put(DOC_ID, id.clone());
        self.serialize(&wrapper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ObjectId;
    use crate::doc;

    #[test]
    fn document_round_trip() {
        let codec = BincodeCodec::new();
        let doc = doc! {
            "_id": 1,
            "name": "fox",
            "tags": ["quick", "brown"],
            "nested": { "depth": 2.5, "flag": true }
        };
        let bytes = codec.serialize(&doc).unwrap();
        assert_eq!(codec.deserialize(&bytes).unwrap(), doc);
    }

    #[test]
    fn id_encoding_is_stable_and_distinct() {
        let codec = BincodeCodec::new();
        let a = codec.serialize_id(&Value::Int32(1)).unwrap();
        let b = codec.serialize_id(&Value::Int32(1)).unwrap();
        let c = codec.serialize_id(&Value::Int32(2)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        let oid = Value::ObjectId(ObjectId::new());
        assert!(!codec.serialize_id(&oid).unwrap().is_empty());
    }

    #[test]
    fn garbage_bytes_fail_with_encoding_kind() {
        let codec = BincodeCodec::new();
        let err = codec.deserialize(&[0xff, 0x01, 0x02]).unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::Encoding);
    }
}
