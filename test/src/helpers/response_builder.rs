use depot_shared::{BLOCK_LENGTH, CONTINUATION_MARKER, RESPONSE_HEADER_LENGTH};

/// Builds one wire response the way the peer would send it: an 8-byte header
/// followed by the body split into 512-byte blocks with a continuation
/// marker after every full block, optionally XOR-encrypted.
pub struct ResponseBuilder {
    archive: u8,
    file: u16,
    compression: u8,
    body: Vec<u8>,
    cipher: u8,
}

impl ResponseBuilder {
    pub fn new(archive: u8, file: u16, body: Vec<u8>) -> Self {
        Self {
            archive,
            file,
            compression: 0,
            body,
            cipher: 0,
        }
    }

    /// Mark the body as compressed with `method`. The body must already carry
    /// the trailing 4-byte uncompressed-size field the wire format appends
    /// for compressed files; the header's size field excludes it.
    pub fn compression(mut self, method: u8) -> Self {
        self.compression = method;
        self
    }

    pub fn cipher(mut self, key: u8) -> Self {
        self.cipher = key;
        self
    }

    fn size_field(&self) -> u32 {
        let trailer = if self.compression == 0 { 0 } else { 4 };
        (self.body.len() - trailer) as u32
    }

    /// The checksum the requesting side must have supplied for this response
    /// to verify: CRC32 over the assembly prefix (compression method + size)
    /// and the body.
    pub fn expected_crc(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&[self.compression]);
        hasher.update(&self.size_field().to_be_bytes());
        hasher.update(&self.body);
        hasher.finalize()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut stream = Vec::with_capacity(RESPONSE_HEADER_LENGTH + self.body.len());
        stream.push(self.archive);
        stream.extend_from_slice(&self.file.to_be_bytes());
        stream.push(self.compression);
        stream.extend_from_slice(&self.size_field().to_be_bytes());

        // first block shares its 512 bytes with the header; each following
        // block gives one slot to the marker
        let mut remaining = &self.body[..];
        let mut capacity = BLOCK_LENGTH - RESPONSE_HEADER_LENGTH;
        loop {
            let take = capacity.min(remaining.len());
            stream.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
            if remaining.is_empty() {
                break;
            }
            stream.push(CONTINUATION_MARKER);
            capacity = BLOCK_LENGTH - 1;
        }

        if self.cipher != 0 {
            for byte in stream.iter_mut() {
                *byte ^= self.cipher;
            }
        }
        stream
    }
}

/// Body of a checksum-table response: one big-endian checksum per archive
/// index, starting at index 0.
pub fn checksum_table_body(checksums: &[u32]) -> Vec<u8> {
    let mut body = Vec::with_capacity(checksums.len() * 4);
    for checksum in checksums {
        body.extend_from_slice(&checksum.to_be_bytes());
    }
    body
}
