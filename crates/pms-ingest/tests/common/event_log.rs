//! Minimal `.evtx` writer
//!
//! Produces a file header and one chunk of records. Each record is a plain
//! BinXML fragment with inline element names and no templates:
//!
//! ```xml
//! <Event><System><EventID>41</EventID><Level>1</Level></System></Event>
//! ```
//!
//! Checksums are left zero; readers only verify them when asked to.

const FILE_HEADER_SIZE: usize = 4096;
const CHUNK_SIZE: usize = 65536;
const CHUNK_HEADER_SIZE: usize = 512;
const RECORD_HEADER_SIZE: usize = 24;

/// 2025-01-15T00:00:00Z as a Windows FILETIME
const TIMESTAMP: u64 = 133_813_728_000_000_000;

const TOKEN_END_OF_STREAM: u8 = 0x00;
const TOKEN_OPEN_START_ELEMENT: u8 = 0x01;
const TOKEN_CLOSE_START_ELEMENT: u8 = 0x02;
const TOKEN_CLOSE_ELEMENT: u8 = 0x04;
const TOKEN_VALUE: u8 = 0x05;
const TOKEN_FRAGMENT_HEADER: u8 = 0x0f;

const VALUE_UINT8: u8 = 0x04;
const VALUE_UINT16: u8 = 0x06;

#[derive(Debug, Default, Clone)]
pub struct EventLogBuilder {
    records: Vec<(u8, u16)>,
}

impl EventLogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record with the given `Level` and `EventID`
    pub fn record(mut self, level: u8, event_id: u16) -> Self {
        self.records.push((level, event_id));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut offset = CHUNK_HEADER_SIZE;
        let mut last_record_offset = 0;

        for (index, &(level, event_id)) in self.records.iter().enumerate() {
            let record = encode_record(index as u64 + 1, offset, level, event_id);
            chunk[offset..offset + record.len()].copy_from_slice(&record);
            last_record_offset = offset;
            offset += record.len();
        }
        assert!(offset <= CHUNK_SIZE, "too many records for one chunk");

        let count = self.records.len() as u64;
        let mut header = Vec::with_capacity(CHUNK_HEADER_SIZE);
        header.extend_from_slice(b"ElfChnk\0");
        header.extend_from_slice(&1u64.to_le_bytes()); // first record number
        header.extend_from_slice(&count.to_le_bytes()); // last record number
        header.extend_from_slice(&1u64.to_le_bytes()); // first record id
        header.extend_from_slice(&count.to_le_bytes()); // last record id
        header.extend_from_slice(&128u32.to_le_bytes());
        header.extend_from_slice(&(last_record_offset as u32).to_le_bytes());
        header.extend_from_slice(&(offset as u32).to_le_bytes()); // free space
        chunk[..header.len()].copy_from_slice(&header);

        let mut file = vec![0u8; FILE_HEADER_SIZE];
        let mut file_header = Vec::with_capacity(128);
        file_header.extend_from_slice(b"ElfFile\0");
        file_header.extend_from_slice(&0u64.to_le_bytes()); // first chunk
        file_header.extend_from_slice(&0u64.to_le_bytes()); // last chunk
        file_header.extend_from_slice(&(count + 1).to_le_bytes()); // next record id
        file_header.extend_from_slice(&128u32.to_le_bytes());
        file_header.extend_from_slice(&1u16.to_le_bytes()); // minor version
        file_header.extend_from_slice(&3u16.to_le_bytes()); // major version
        file_header.extend_from_slice(&(FILE_HEADER_SIZE as u16).to_le_bytes());
        file_header.extend_from_slice(&1u16.to_le_bytes()); // chunk count
        file[..file_header.len()].copy_from_slice(&file_header);

        file.extend_from_slice(&chunk);
        file
    }
}

fn encode_record(record_id: u64, chunk_offset: usize, level: u8, event_id: u16) -> Vec<u8> {
    let mut xml = Fragment::new(chunk_offset + RECORD_HEADER_SIZE);
    xml.open("Event");
    xml.open("System");
    xml.open("EventID");
    xml.bytes.extend_from_slice(&[TOKEN_VALUE, VALUE_UINT16]);
    xml.bytes.extend_from_slice(&event_id.to_le_bytes());
    xml.close();
    xml.open("Level");
    xml.bytes.extend_from_slice(&[TOKEN_VALUE, VALUE_UINT8, level]);
    xml.close();
    xml.close();
    xml.close();
    xml.bytes.push(TOKEN_END_OF_STREAM);

    let size = (RECORD_HEADER_SIZE + xml.bytes.len() + 4) as u32;
    let mut record = Vec::with_capacity(size as usize);
    record.extend_from_slice(b"\x2a\x2a\x00\x00");
    record.extend_from_slice(&size.to_le_bytes());
    record.extend_from_slice(&record_id.to_le_bytes());
    record.extend_from_slice(&TIMESTAMP.to_le_bytes());
    record.extend_from_slice(&xml.bytes);
    record.extend_from_slice(&size.to_le_bytes());
    record
}

/// BinXML token stream positioned at a known chunk offset
struct Fragment {
    base: usize,
    bytes: Vec<u8>,
}

impl Fragment {
    fn new(base: usize) -> Self {
        Self {
            base,
            bytes: vec![TOKEN_FRAGMENT_HEADER, 1, 1, 0],
        }
    }

    /// Open start element followed by its name, stored inline
    fn open(&mut self, name: &str) {
        let units: Vec<u16> = name.encode_utf16().collect();

        self.bytes.push(TOKEN_OPEN_START_ELEMENT);
        self.bytes.extend_from_slice(&0xffffu16.to_le_bytes()); // dependency id
        self.bytes.extend_from_slice(&0u32.to_le_bytes()); // data size
        // An inline name starts right after its own offset field
        let name_offset = (self.base + self.bytes.len() + 4) as u32;
        self.bytes.extend_from_slice(&name_offset.to_le_bytes());
        self.bytes.extend_from_slice(&0u32.to_le_bytes()); // next string
        self.bytes.extend_from_slice(&0u16.to_le_bytes()); // hash
        self.bytes.extend_from_slice(&(units.len() as u16).to_le_bytes());
        for unit in units {
            self.bytes.extend_from_slice(&unit.to_le_bytes());
        }
        self.bytes.extend_from_slice(&0u16.to_le_bytes());
        self.bytes.push(TOKEN_CLOSE_START_ELEMENT);
    }

    fn close(&mut self) {
        self.bytes.push(TOKEN_CLOSE_ELEMENT);
    }
}
