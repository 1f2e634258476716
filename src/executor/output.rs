//! Matching-output layout
//!
//! Keys buffer: for each matching key, the key bytes followed by a
//! 4-byte little-endian CRC32 of the key.
//!
//! Records buffer: for each matching record, for each I/O descriptor in
//! order, a 4-byte little-endian length followed by the value bytes.
//!
//! Output is staged in owned buffers during a run and copied into the
//! caller's buffers only once the run succeeds.

use crc32fast::Hasher;
use thiserror::Error;

use super::errors::RequiredSize;
use super::request::{IoDescriptor, KeyDescriptor, RunArgs, CSUM_CRC32, CSUM_NONE};
use super::source::Record;

const CSUM_LEN: usize = 4;
const LEN_PREFIX: usize = 4;

/// CRC32 (IEEE) over `data`
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Decoding failures for the output layouts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("Output truncated at byte {0}")]
    Truncated(usize),

    #[error("Checksum mismatch for key {0}")]
    Checksum(usize),

    #[error("Unsupported checksum type {0}")]
    UnsupportedChecksum(u32),
}

/// Splits a keys buffer into its keys, verifying each checksum
pub fn split_keys<'b>(
    keys: &'b [u8],
    kds: &[KeyDescriptor],
) -> Result<Vec<&'b [u8]>, LayoutError> {
    let mut out = Vec::with_capacity(kds.len());
    let mut pos = 0usize;

    for (index, kd) in kds.iter().enumerate() {
        let key = take(keys, &mut pos, kd.key_len)?;
        let csum = take(keys, &mut pos, u64::from(kd.csum_len))?;

        match kd.csum_type {
            CSUM_NONE => {}
            CSUM_CRC32 => {
                let stored = match csum {
                    [a, b, c, d] => u32::from_le_bytes([*a, *b, *c, *d]),
                    _ => return Err(LayoutError::Checksum(index)),
                };
                if stored != compute_checksum(key) {
                    return Err(LayoutError::Checksum(index));
                }
            }
            other => return Err(LayoutError::UnsupportedChecksum(other)),
        }
        out.push(key);
    }

    Ok(out)
}

/// Splits a records buffer into per-record, per-descriptor values
pub fn split_records(
    records: &[u8],
    nr_records: usize,
    nr_iods: usize,
) -> Result<Vec<Vec<&[u8]>>, LayoutError> {
    let mut out = Vec::new();
    let mut pos = 0usize;

    for _ in 0..nr_records {
        let mut values = Vec::with_capacity(nr_iods.min(records.len()));
        for _ in 0..nr_iods {
            let raw = take(records, &mut pos, LEN_PREFIX as u64)?;
            let len = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
            values.push(take(records, &mut pos, u64::from(len))?);
        }
        out.push(values);
    }

    Ok(out)
}

/// Next `len` bytes at `pos`; fails without panicking on any overflow
fn take<'b>(buf: &'b [u8], pos: &mut usize, len: u64) -> Result<&'b [u8], LayoutError> {
    let end = usize::try_from(len)
        .ok()
        .and_then(|len| pos.checked_add(len))
        .ok_or(LayoutError::Truncated(*pos))?;
    let bytes = buf.get(*pos..end).ok_or(LayoutError::Truncated(*pos))?;
    *pos = end;
    Ok(bytes)
}

/// Result of staging one qualifying record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Staged {
    Fit,
    /// Record does not fit; sizes needed to hold it alone
    Full(RequiredSize),
}

/// Owned output accumulated during a run
#[derive(Debug)]
pub(crate) struct OutputStage {
    max_kds: usize,
    keys_cap: Option<usize>,
    records_cap: Option<usize>,
    kds: Vec<KeyDescriptor>,
    keys: Vec<u8>,
    records: Vec<u8>,
    iod_sizes: Vec<u64>,
}

impl OutputStage {
    pub(crate) fn for_args(args: &RunArgs<'_>) -> Self {
        Self {
            max_kds: args.key_descriptors.len(),
            keys_cap: args.keys.as_ref().map(|b| b.len()),
            records_cap: args.records.as_ref().map(|b| b.len()),
            kds: Vec::new(),
            keys: Vec::new(),
            records: Vec::new(),
            iod_sizes: vec![0; args.iods.len()],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.kds.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.kds.is_empty()
    }

    /// Stages `record` if the caller's buffers can still hold it
    pub(crate) fn try_push<R: Record>(&mut self, record: &R, iods: &[IoDescriptor]) -> Staged {
        let dkey = record.dkey();
        let values: Vec<&[u8]> = iods.iter().map(|iod| select_value(record, iod)).collect();

        let need = RequiredSize {
            key_descriptors: 1,
            keys_bytes: self.keys_cap.map_or(0, |_| dkey.len() + CSUM_LEN),
            records_bytes: self
                .records_cap
                .map_or(0, |_| values.iter().map(|v| LEN_PREFIX + v.len()).sum()),
        };

        let fits = self.kds.len() < self.max_kds
            && self
                .keys_cap
                .map_or(true, |cap| self.keys.len() + need.keys_bytes <= cap)
            && self
                .records_cap
                .map_or(true, |cap| self.records.len() + need.records_bytes <= cap);
        if !fits {
            return Staged::Full(need);
        }

        self.kds.push(KeyDescriptor {
            key_len: dkey.len() as u64,
            csum_type: CSUM_CRC32,
            csum_len: CSUM_LEN as u32,
        });
        if self.keys_cap.is_some() {
            self.keys.extend_from_slice(dkey);
            self.keys
                .extend_from_slice(&compute_checksum(dkey).to_le_bytes());
        }
        for (size, value) in self.iod_sizes.iter_mut().zip(&values) {
            *size = (*size).max(value.len() as u64);
        }
        if self.records_cap.is_some() {
            for value in &values {
                self.records
                    .extend_from_slice(&(value.len() as u32).to_le_bytes());
                self.records.extend_from_slice(value);
            }
        }
        Staged::Fit
    }

    /// Copies staged output into the caller's buffers.
    ///
    /// Returns (key descriptors, key bytes, record bytes) written.
    pub(crate) fn commit(self, args: &mut RunArgs<'_>) -> (usize, usize, usize) {
        let nr_kds = self.kds.len();
        args.key_descriptors[..nr_kds].copy_from_slice(&self.kds);

        if let Some(keys) = args.keys.as_deref_mut() {
            keys[..self.keys.len()].copy_from_slice(&self.keys);
        }
        if let Some(records) = args.records.as_deref_mut() {
            records[..self.records.len()].copy_from_slice(&self.records);
        }
        for (iod, size) in args.iods.iter_mut().zip(&self.iod_sizes) {
            iod.size = *size;
        }

        (nr_kds, self.keys.len(), self.records.len())
    }
}

/// Attribute value for one descriptor; ranges are clamped to the value
fn select_value<'v, R: Record>(record: &'v R, iod: &IoDescriptor) -> &'v [u8] {
    let value = record.akey(&iod.akey).unwrap_or(&[]);
    match iod.range {
        Some(range) => {
            let start = range.offset.min(value.len());
            let end = range.end().unwrap_or(usize::MAX).min(value.len());
            &value[start..end]
        }
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::anchor::Anchor;
    use crate::executor::handle::ContainerHandle;
    use crate::memstore::MemRecord;

    fn record(dkey: &str, name: &str) -> MemRecord {
        MemRecord::new(dkey.as_bytes().to_vec()).with_akey("name", name.as_bytes().to_vec())
    }

    #[test]
    fn test_checksum_deterministic() {
        assert_eq!(compute_checksum(b"k1"), compute_checksum(b"k1"));
        assert_ne!(compute_checksum(b"k1"), compute_checksum(b"k2"));
    }

    #[test]
    fn test_stage_and_split() {
        let mut anchor = Anchor::new();
        let mut kds = vec![KeyDescriptor::default(); 4];
        let mut keys = vec![0u8; 64];
        let mut records = vec![0u8; 64];
        let mut iods = vec![IoDescriptor::new("name"), IoDescriptor::new("missing")];
        let mut args = RunArgs::new(ContainerHandle::new(), &mut anchor)
            .with_iods(&mut iods)
            .with_key_descriptors(&mut kds)
            .with_keys(&mut keys)
            .with_records(&mut records);

        let mut stage = OutputStage::for_args(&args);
        assert_eq!(stage.try_push(&record("a", "alice"), args.iods), Staged::Fit);
        assert_eq!(stage.try_push(&record("bb", "bo"), args.iods), Staged::Fit);
        assert_eq!(stage.len(), 2);

        let (nr_kds, keys_written, records_written) = stage.commit(&mut args);
        assert_eq!(nr_kds, 2);
        assert_eq!(keys_written, 1 + 4 + 2 + 4);
        assert_eq!(records_written, (4 + 5 + 4) + (4 + 2 + 4));
        assert_eq!(args.iods[0].size, 5);
        assert_eq!(args.iods[1].size, 0);

        let split = split_keys(&keys[..keys_written], &kds[..nr_kds]).unwrap();
        assert_eq!(split, vec![&b"a"[..], &b"bb"[..]]);

        let values = split_records(&records[..records_written], 2, 2).unwrap();
        assert_eq!(values[0], vec![&b"alice"[..], &b""[..]]);
        assert_eq!(values[1], vec![&b"bo"[..], &b""[..]]);
    }

    #[test]
    fn test_full_reports_single_record_size() {
        let mut anchor = Anchor::new();
        let mut kds = vec![KeyDescriptor::default(); 4];
        let mut keys = vec![0u8; 6];
        let mut args = RunArgs::new(ContainerHandle::new(), &mut anchor)
            .with_key_descriptors(&mut kds)
            .with_keys(&mut keys);

        let mut stage = OutputStage::for_args(&args);
        assert_eq!(stage.try_push(&record("a", "x"), args.iods), Staged::Fit);
        match stage.try_push(&record("key", "x"), args.iods) {
            Staged::Full(need) => {
                assert_eq!(need.key_descriptors, 1);
                assert_eq!(need.keys_bytes, 7);
                assert_eq!(need.records_bytes, 0);
            }
            Staged::Fit => panic!("expected full"),
        }
        assert_eq!(stage.commit(&mut args).0, 1);
    }

    #[test]
    fn test_descriptor_count_limits() {
        let mut anchor = Anchor::new();
        let mut kds = vec![KeyDescriptor::default(); 1];
        let args = RunArgs::new(ContainerHandle::new(), &mut anchor).with_key_descriptors(&mut kds);

        let mut stage = OutputStage::for_args(&args);
        assert_eq!(stage.try_push(&record("a", "x"), args.iods), Staged::Fit);
        assert!(matches!(
            stage.try_push(&record("b", "x"), args.iods),
            Staged::Full(_)
        ));
    }

    #[test]
    fn test_range_clamped() {
        let rec = record("k", "abcdef");
        assert_eq!(select_value(&rec, &IoDescriptor::new("name").with_range(2, 3)), b"cde");
        assert_eq!(select_value(&rec, &IoDescriptor::new("name").with_range(4, 10)), b"ef");
        assert_eq!(select_value(&rec, &IoDescriptor::new("name").with_range(9, 1)), b"");
    }

    #[test]
    fn test_corrupt_key_detected() {
        let kd = KeyDescriptor {
            key_len: 2,
            csum_type: CSUM_CRC32,
            csum_len: 4,
        };
        let mut buf = b"ab".to_vec();
        buf.extend_from_slice(&compute_checksum(b"ab").to_le_bytes());
        buf[0] = b'x';
        assert_eq!(split_keys(&buf, &[kd]), Err(LayoutError::Checksum(0)));
        assert_eq!(split_keys(&buf[..3], &[kd]), Err(LayoutError::Truncated(2)));
    }

    #[test]
    fn test_oversized_descriptors_are_truncation() {
        let plain = |key_len, csum_len| KeyDescriptor {
            key_len,
            csum_type: CSUM_NONE,
            csum_len,
        };
        assert_eq!(
            split_keys(b"ab", &[plain(1, 0), plain(u64::MAX, 0)]),
            Err(LayoutError::Truncated(1))
        );
        assert_eq!(
            split_keys(b"ab", &[plain(1, u32::MAX)]),
            Err(LayoutError::Truncated(1))
        );
        assert_eq!(split_keys(b"ab", &[plain(1, 1)]), Ok(vec![&b"a"[..]]));
    }

    #[test]
    fn test_short_checksum_rejected() {
        let kd = KeyDescriptor {
            key_len: 1,
            csum_type: CSUM_CRC32,
            csum_len: 2,
        };
        assert_eq!(split_keys(b"abc", &[kd]), Err(LayoutError::Checksum(0)));
    }

    #[test]
    fn test_oversized_record_length_is_truncation() {
        let mut buf = u32::MAX.to_le_bytes().to_vec();
        buf.push(7);
        assert_eq!(split_records(&buf, 1, 1), Err(LayoutError::Truncated(4)));
        assert_eq!(
            split_records(&[], usize::MAX, usize::MAX),
            Err(LayoutError::Truncated(0))
        );
    }
}
