//! Firmware file format: Intel HEX records compiled into 16-bit memory words.
use std::path::Path;

use anyhow::{Context, Result};
use scroll::{BE, Pread};
use thiserror::Error;

pub mod record_type {
    pub const DATA: u8 = 0x00;
    pub const END_OF_FILE: u8 = 0x01;
    pub const EXTENDED_SEGMENT_ADDRESS: u8 = 0x02;
    pub const START_SEGMENT_ADDRESS: u8 = 0x03;
    pub const EXTENDED_LINEAR_ADDRESS: u8 = 0x04;
    pub const START_LINEAR_ADDRESS: u8 = 0x05;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    #[error("line {line}: record does not start with ':'")]
    MissingStartCode { line: usize },
    #[error("line {line}: malformed record")]
    Malformed { line: usize },
    #[error("line {line}: extended linear address record needs exactly 2 data bytes")]
    BadExtendedAddress { line: usize },
}

impl HexError {
    /// 1-based number of the offending line
    pub fn line(&self) -> usize {
        match *self {
            HexError::MissingStartCode { line }
            | HexError::Malformed { line }
            | HexError::BadExtendedAddress { line } => line,
        }
    }

    /// The negated line number, for callers that report parse results as a
    /// single signed count
    pub fn status(&self) -> i64 {
        -(self.line() as i64)
    }
}

/// One line of a hex file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexRecord {
    pub byte_count: u8,
    /// Byte address of the first data byte, relative to the current upper address
    pub offset: u16,
    pub record_type: u8,
    pub data: Vec<u8>,
    /// Kept as read, never validated
    pub checksum: u8,
}

impl HexRecord {
    fn parse(line: &str) -> Option<Self> {
        let body = line.strip_prefix(':')?;
        let byte_count = *hex::decode(body.get(..2)?).ok()?.first()?;
        let n = byte_count as usize;
        // count, offset, type, data, checksum
        let raw = hex::decode(body.get(..2 * (5 + n))?).ok()?;

        Some(HexRecord {
            byte_count,
            offset: raw.pread_with::<u16>(1, BE).ok()?,
            record_type: raw[3],
            data: raw[4..4 + n].to_vec(),
            checksum: raw[4 + n],
        })
    }

    /// Upper 16 bits of the byte address set by an extended linear address record
    pub fn extended_address(&self) -> Option<u32> {
        if self.record_type != record_type::EXTENDED_LINEAR_ADDRESS {
            return None;
        }
        self.data
            .as_slice()
            .pread_with::<u16>(0, BE)
            .ok()
            .map(|upper| upper as u32)
    }
}

/// A 16-bit word of device memory at a word address (byte address / 2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemoryWord {
    pub address: u32,
    pub data: u16,
}

impl MemoryWord {
    pub const fn new(address: u32, data: u16) -> Self {
        MemoryWord { address, data }
    }
}

#[derive(Debug, Default)]
pub struct HexFile {
    records: Vec<HexRecord>,
}

impl HexFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[HexRecord] {
        &self.records
    }

    /// Parses hex text and returns the total number of records held.
    ///
    /// Empty lines are skipped. On the first bad line nothing of `input` is
    /// kept and the error carries that line's number.
    pub fn parse(&mut self, input: &str) -> Result<usize, HexError> {
        let mut records = vec![];
        for (idx, line) in input.lines().enumerate() {
            let lineno = idx + 1;
            if !line.starts_with(':') {
                if line.is_empty() {
                    continue;
                }
                return Err(HexError::MissingStartCode { line: lineno });
            }
            let record = HexRecord::parse(line).ok_or(HexError::Malformed { line: lineno })?;
            if record.record_type == record_type::EXTENDED_LINEAR_ADDRESS && record.byte_count != 2
            {
                return Err(HexError::BadExtendedAddress { line: lineno });
            }
            log::trace!(
                "record type {} @ 0x{:04x}: {}",
                record.record_type,
                record.offset,
                hex::encode(&record.data)
            );
            records.push(record);
        }
        self.records.extend(records);
        Ok(self.records.len())
    }

    /// Compiles data records into memory words, sorted by address.
    ///
    /// Words at the same address are kept in file order.
    pub fn compile_to_words(&self) -> Vec<MemoryWord> {
        let mut upper = 0u32;
        let mut words = vec![];
        for record in &self.records {
            match record.record_type {
                record_type::EXTENDED_LINEAR_ADDRESS => {
                    if let Some(address) = record.extended_address() {
                        upper = address;
                    }
                }
                record_type::DATA => {
                    let base = (((upper & 0xffff) << 16) | record.offset as u32) >> 1;
                    for (i, pair) in record.data.chunks(2).enumerate() {
                        let low = pair[0] as u16;
                        let high = pair.get(1).copied().unwrap_or(0) as u16;
                        words.push(MemoryWord::new(base + i as u32, (high << 8) | low));
                    }
                }
                _ => (),
            }
        }
        words.sort_by_key(|w| w.address);
        words
    }
}

pub fn read_firmware_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<MemoryWord>> {
    let p = path.as_ref();
    let text = std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;

    let mut file = HexFile::new();
    let records = file
        .parse(&text)
        .with_context(|| format!("parsing {}", p.display()))?;
    let words = file.compile_to_words();
    log::info!(
        "Read {}: {} records, {} memory words",
        p.display(),
        records,
        words.len()
    );
    Ok(words)
}
