//! JSON form of an in-memory object
//!
//! ```json
//! {
//!   "object": {"hi": 0, "lo": 1},
//!   "records": [
//!     {"dkey": "alice", "akeys": {"age": {"integer": 31}, "name": {"string": "Alice"}}}
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::store::{MemRecord, MemoryStore};
use crate::executor::ObjectId;
use crate::pipeline::ValueBytes;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub dkey: String,
    #[serde(default)]
    pub akeys: BTreeMap<String, ValueBytes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub object: ObjectId,
    #[serde(default)]
    pub records: Vec<DatasetRecord>,
}

impl Dataset {
    /// Builds a store holding the records in document order
    pub fn into_store(self) -> MemoryStore {
        let records = self
            .records
            .into_iter()
            .map(|r| {
                let mut record = MemRecord::new(r.dkey);
                for (name, value) in r.akeys {
                    record.set_akey(name, value.bytes());
                }
                record
            })
            .collect();
        MemoryStore::from_records(self.object, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Record;

    #[test]
    fn test_parse_and_build() {
        let json = r#"{
            "object": {"hi": 0, "lo": 9},
            "records": [
                {"dkey": "a", "akeys": {"age": {"integer": 31}, "tag": {"binary": "AQI="}}},
                {"dkey": "b"}
            ]
        }"#;
        let dataset: Dataset = serde_json::from_str(json).unwrap();
        let store = dataset.into_store();

        assert_eq!(store.len(), 2);
        let first = &store.records()[0];
        assert_eq!(first.dkey(), b"a");
        assert_eq!(first.akey(b"age"), Some(&31i64.to_le_bytes()[..]));
        assert_eq!(first.akey(b"tag"), Some(&[1u8, 2][..]));
        assert_eq!(store.records()[1].akey_count(), 0);
    }

    #[test]
    fn test_object_defaults() {
        let dataset: Dataset = serde_json::from_str(r#"{"records": []}"#).unwrap();
        assert_eq!(dataset.object, ObjectId::default());
    }
}
