//! Fixed-size byte containers shared by the codec, the link layer and the
//! dispatcher. Nothing here allocates: every buffer is a plain array plus a
//! length, sized from the wire format limits.

/// Bytes covered by the Length field besides the payload (source, dest, type, seq).
pub const HEADER_LEN: usize = 2 + 2 + 1 + 1;

/// Largest payload the one-byte Length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - HEADER_LEN;

/// Largest frame on the wire: Length byte + 255 covered bytes + checksum.
pub const MAX_FRAME_LEN: usize = 1 + u8::MAX as usize + 2;

/// Owned copy of a frame payload.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    len: usize,
    data: [u8; MAX_PAYLOAD_LEN],
}

impl Default for Payload {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Payload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Payload {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=[u8]:x}", self.as_slice())
    }
}

impl Payload {
    /// Create an empty payload.
    pub const fn new() -> Self {
        Self {
            len: 0,
            data: [0; MAX_PAYLOAD_LEN],
        }
    }

    /// Copy `bytes` into a new payload, or `None` when they exceed [`MAX_PAYLOAD_LEN`].
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_PAYLOAD_LEN {
            return None;
        }
        let mut payload = Self::new();
        payload.data[..bytes.len()].copy_from_slice(bytes);
        payload.len = bytes.len();
        Some(payload)
    }

    /// Copy bytes into the payload and update `len`, clamped to capacity.
    #[inline]
    pub fn copy_from_slice(&mut self, slice: &[u8]) {
        let clamped = slice.len().min(MAX_PAYLOAD_LEN);
        self.data[..clamped].copy_from_slice(&slice[..clamped]);
        self.len = clamped;
    }

    /// Number of valid bytes stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks whether the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reset the payload.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Immutable view over the populated bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// A serialized frame ready to be written to the transport.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EncodedFrame {
    len: usize,
    data: [u8; MAX_FRAME_LEN],
}

impl core::fmt::Debug for EncodedFrame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.as_bytes()).finish()
    }
}

impl EncodedFrame {
    pub(crate) const fn empty() -> Self {
        Self {
            len: 0,
            data: [0; MAX_FRAME_LEN],
        }
    }

    pub(crate) fn push(&mut self, byte: u8) {
        self.data[self.len] = byte;
        self.len += 1;
    }

    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    /// Total number of bytes on the wire, Length through Checksum.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false for a frame produced by the encoder.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Wire bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }
}
