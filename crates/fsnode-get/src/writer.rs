//! Sinks for retrieved objects.

use fsnode_common::{Object, Result};

/// Receives a header at most once, then payload chunks in offset order
pub trait ObjectWriter: Send {
    fn write_header(&mut self, header: &Object) -> Result<()>;
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()>;
}

/// Collects everything into memory
#[derive(Debug, Default)]
pub struct SimpleObjectWriter {
    header: Option<Object>,
    payload: Vec<u8>,
    chunks: usize,
}

impl SimpleObjectWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn header(&self) -> Option<&Object> {
        self.header.as_ref()
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of chunk writes received
    #[must_use]
    pub const fn chunks(&self) -> usize {
        self.chunks
    }

    /// The header with the collected payload attached; `None` when no
    /// header was written
    #[must_use]
    pub fn into_object(self) -> Option<Object> {
        let mut obj = self.header?;
        obj.payload = Some(self.payload);
        Some(obj)
    }

    /// Collected payload bytes
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

impl ObjectWriter for SimpleObjectWriter {
    fn write_header(&mut self, header: &Object) -> Result<()> {
        self.header = Some(header.cut_payload());
        Ok(())
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.payload.extend_from_slice(chunk);
        self.chunks += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsnode_common::{ContainerId, ObjectType, OwnerId};

    #[test]
    fn test_simple_writer_collects() {
        let obj = Object::new(ContainerId::new([3; 32]), OwnerId::new([4; 25]), ObjectType::Regular)
            .with_payload(b"abcdef".to_vec());
        let mut writer = SimpleObjectWriter::new();
        writer.write_header(&obj).unwrap();
        writer.write_chunk(b"abc").unwrap();
        writer.write_chunk(b"def").unwrap();

        assert_eq!(writer.chunks(), 2);
        assert_eq!(writer.header().unwrap().payload, None);
        assert_eq!(writer.into_object().unwrap(), obj);
    }

    #[test]
    fn test_payload_only() {
        let mut writer = SimpleObjectWriter::new();
        writer.write_chunk(b"xy").unwrap();
        assert_eq!(writer.header(), None);
        assert_eq!(writer.into_payload(), b"xy");
    }
}
