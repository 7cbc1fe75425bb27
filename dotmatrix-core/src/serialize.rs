use serde::de::{DeserializeOwned, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Formatter;
use std::marker::PhantomData;
use thiserror::Error;

pub const SAVE_STATE_MAGIC: [u8; 4] = *b"WBSS";
pub const SAVE_STATE_VERSION: u32 = 1;

/// Bumped whenever a subsystem's snapshot layout changes. Recorded in the
/// header for diagnostics; loading does not reject on mismatch.
pub const CORE_REVISION: u32 = 1;

const HEADER_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("save state header is not present or has bad magic")]
    BadMagic,
    #[error("unsupported save state version: {version}")]
    UnsupportedVersion { version: u32 },
    #[error("save state truncated while reading slot {slot}")]
    TruncatedSlot { slot: u8 },
    #[error("error decoding save state slot {slot}: {source}")]
    SlotDecode {
        slot: u8,
        #[source]
        source: bincode::Error,
    },
}

/// Builds a save-state payload: a `{magic, version, core revision}` header
/// followed by length-prefixed bincode slots in a fixed order.
pub struct SlotWriter {
    buffer: Vec<u8>,
}

impl SlotWriter {
    pub fn new() -> Self {
        let mut buffer = Vec::with_capacity(HEADER_LEN);
        buffer.extend_from_slice(&SAVE_STATE_MAGIC);
        buffer.extend_from_slice(&SAVE_STATE_VERSION.to_le_bytes());
        buffer.extend_from_slice(&CORE_REVISION.to_le_bytes());
        Self { buffer }
    }

    pub fn write_slot<T: Serialize>(&mut self, value: &T) {
        let payload =
            bincode::serialize(value).expect("in-memory state serialization should never fail");
        self.buffer.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.buffer.extend_from_slice(&payload);
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for SlotWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads a save-state payload written by `SlotWriter`, validating the header
/// up front. Slots must be read in the order they were written; the slot
/// number passed to `read_slot` is only used in error reporting.
pub struct SlotReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> SlotReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, SaveStateError> {
        if bytes.len() < HEADER_LEN || bytes[..4] != SAVE_STATE_MAGIC {
            return Err(SaveStateError::BadMagic);
        }

        let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        if version != SAVE_STATE_VERSION {
            return Err(SaveStateError::UnsupportedVersion { version });
        }

        Ok(Self { bytes, position: HEADER_LEN })
    }

    pub fn read_slot<T: DeserializeOwned>(&mut self, slot: u8) -> Result<T, SaveStateError> {
        let length_end = self.position + 4;
        if self.bytes.len() < length_end {
            return Err(SaveStateError::TruncatedSlot { slot });
        }
        let length =
            u32::from_le_bytes(self.bytes[self.position..length_end].try_into().unwrap()) as usize;

        let payload_end = length_end + length;
        if self.bytes.len() < payload_end {
            return Err(SaveStateError::TruncatedSlot { slot });
        }

        let value = bincode::deserialize(&self.bytes[length_end..payload_end])
            .map_err(|source| SaveStateError::SlotDecode { slot, source })?;
        self.position = payload_end;

        Ok(value)
    }
}

pub fn serialize_array<S, T, const N: usize>(
    array: &[T; N],
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let mut state = serializer.serialize_tuple(N)?;
    for value in array {
        state.serialize_element(value)?;
    }
    state.end()
}

struct DeserializeArrayVisitor<T, const N: usize> {
    marker: PhantomData<T>,
}

impl<'de, T, const N: usize> Visitor<'de> for DeserializeArrayVisitor<T, N>
where
    T: Deserialize<'de> + Default + Copy,
{
    type Value = [T; N];

    fn expecting(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "an array of size {N}")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut array = [T::default(); N];

        for (i, value) in array.iter_mut().enumerate() {
            let Some(elem) = seq.next_element()? else {
                return Err(de::Error::custom(format!(
                    "expected array to have {N} elements, only got {i}",
                )));
            };

            *value = elem;
        }

        if seq.next_element::<T>()?.is_some() {
            return Err(de::Error::custom(format!("array has more than {N} elements")));
        }

        Ok(array)
    }
}

pub fn deserialize_array<'de, D, T, const N: usize>(deserializer: D) -> Result<[T; N], D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default + Copy,
{
    deserializer.deserialize_tuple(N, DeserializeArrayVisitor { marker: PhantomData })
}

pub fn serialize_boxed_array<S, T, const N: usize>(
    array: &Box<[T; N]>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    serialize_array(array, serializer)
}

pub fn deserialize_boxed_array<'de, D, T, const N: usize>(
    deserializer: D,
) -> Result<Box<[T; N]>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default + Copy,
{
    deserialize_array(deserializer).map(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_round_trip() {
        let mut writer = SlotWriter::new();
        writer.write_slot(&[1_u8, 2, 3]);
        writer.write_slot(&0xDEADBEEF_u32);
        let bytes = writer.finish();

        let mut reader = SlotReader::new(&bytes).unwrap();
        let first: [u8; 3] = reader.read_slot(0).unwrap();
        let second: u32 = reader.read_slot(1).unwrap();

        assert_eq!([1, 2, 3], first);
        assert_eq!(0xDEADBEEF, second);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = SlotWriter::new().finish();
        bytes[0] = b'X';

        assert!(matches!(SlotReader::new(&bytes), Err(SaveStateError::BadMagic)));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = SlotWriter::new().finish();
        bytes[4..8].copy_from_slice(&99_u32.to_le_bytes());

        assert!(matches!(
            SlotReader::new(&bytes),
            Err(SaveStateError::UnsupportedVersion { version: 99 })
        ));
    }

    #[test]
    fn rejects_truncated_slot() {
        let mut writer = SlotWriter::new();
        writer.write_slot(&vec![1_u8; 64]);
        let mut bytes = writer.finish();
        bytes.truncate(bytes.len() - 8);

        let mut reader = SlotReader::new(&bytes).unwrap();
        assert!(matches!(
            reader.read_slot::<Vec<u8>>(3),
            Err(SaveStateError::TruncatedSlot { slot: 3 })
        ));
    }

    #[test]
    fn array_helpers_round_trip() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Wrapper {
            #[serde(
                serialize_with = "serialize_array",
                deserialize_with = "deserialize_array"
            )]
            data: [u8; 300],
        }

        let wrapper = Wrapper { data: [0xA7; 300] };
        let bytes = bincode::serialize(&wrapper).unwrap();
        let decoded: Wrapper = bincode::deserialize(&bytes).unwrap();

        assert!(wrapper == decoded);
    }
}
