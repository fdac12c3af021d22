use crate::error::{RemuxError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Size and type fields preceding every box body.
pub const BOX_HEADER_SIZE: usize = 8;

/// One ISO BMFF box: a four character type, raw payload bytes and nested
/// child boxes written after the payload.
///
/// Sizes are computed bottom-up when the tree is serialized, so offsets
/// derived from [`Mp4Box::size`] always match the written bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mp4Box {
    kind: [u8; 4],
    payload: Bytes,
    children: Vec<Mp4Box>,
}

impl Mp4Box {
    pub fn new(kind: &[u8; 4]) -> Self {
        Self {
            kind: *kind,
            payload: Bytes::new(),
            children: Vec::new(),
        }
    }

    /// A box holding only raw bytes.
    pub fn leaf(kind: &[u8; 4], payload: impl Into<Bytes>) -> Self {
        Self::new(kind).with_payload(payload)
    }

    /// A box holding only child boxes.
    pub fn container(kind: &[u8; 4], children: Vec<Mp4Box>) -> Self {
        Self {
            children,
            ..Self::new(kind)
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn with_child(mut self, child: Mp4Box) -> Self {
        self.children.push(child);
        self
    }

    pub fn push(&mut self, child: Mp4Box) {
        self.children.push(child);
    }

    pub fn kind(&self) -> &[u8; 4] {
        &self.kind
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn children(&self) -> &[Mp4Box] {
        &self.children
    }

    /// Depth-first search for the first descendant of type `kind`.
    pub fn find(&self, kind: &[u8; 4]) -> Option<&Mp4Box> {
        self.children.iter().find_map(|child| {
            if &child.kind == kind {
                Some(child)
            } else {
                child.find(kind)
            }
        })
    }

    /// Total serialized length, header included.
    pub fn size(&self) -> usize {
        BOX_HEADER_SIZE + self.payload.len() + self.children.iter().map(Mp4Box::size).sum::<usize>()
    }

    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        let size = u32::try_from(self.size()).map_err(|_| {
            RemuxError::InvalidData(format!(
                "{} box exceeds 32-bit size",
                String::from_utf8_lossy(&self.kind)
            ))
        })?;

        buf.reserve(size as usize);
        buf.put_u32(size);
        buf.put_slice(&self.kind);
        buf.put_slice(&self.payload);
        for child in &self.children {
            child.write_to(buf)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.size());
        self.write_to(&mut buf)?;
        Ok(buf.freeze())
    }
}
