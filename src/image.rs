//! Splitting compiled memory words into row-programmable code and config words.
use crate::device::DeviceProfile;
use crate::format::MemoryWord;
use crate::instruction::NOP;

/// A config word to be written on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigWord {
    pub address: u32,
    pub data: u32,
}

/// What gets written to the device
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgramImage {
    /// Dense code memory from word address 0, gaps are NOP
    pub code: Vec<u32>,
    /// One entry per config word of the device, ascending
    pub config: Vec<ConfigWord>,
    /// Words that could not be placed, one per warning logged
    pub skipped: Vec<MemoryWord>,
}

impl ProgramImage {
    /// Splits `memory` into code and config words for `device`.
    ///
    /// Rows are 128 words, so code cannot be programmed in the row that
    /// holds the config words. Anything there is reported and dropped.
    pub fn prepare(memory: &[MemoryWord], device: &DeviceProfile) -> Self {
        let row_limit = device.row_limit();
        let config_start = device.config_words_start;
        let config_end = device.config_words_end();

        let mut config: Vec<ConfigWord> = (0..device.config_words as u32)
            .map(|i| ConfigWord {
                address: config_start + i * 2,
                data: 0,
            })
            .collect();

        let code_len = memory
            .iter()
            .filter(|w| w.address < row_limit)
            .map(|w| w.address as usize + 1)
            .max()
            .unwrap_or(0);
        let mut code = vec![NOP; code_len];
        let mut skipped = vec![];

        for word in memory {
            let address = word.address;
            let data = word.data as u32;
            if address < row_limit {
                code[address as usize] = data;
            } else if address < config_start {
                log::warn!(
                    "Cannot program at 0x{:06x}! This is within less than 128 words of the config words, verification will most probably fail.",
                    address
                );
                skipped.push(*word);
            } else if address <= config_end {
                let offset = address - config_start;
                match config.get_mut((offset >> 1) as usize) {
                    Some(cw) if offset % 2 == 0 => cw.data |= data & 0xffff,
                    // the config words only use the lower 16 bits, this is most probably unused
                    Some(cw) => cw.data |= (data & 0xffff) << 16,
                    None => {
                        log::warn!("0x{:06x} is past the last config word, ignored", address);
                        skipped.push(*word);
                    }
                }
            } else {
                log::warn!("0x{:06x} is outside of program memory, ignored", address);
                skipped.push(*word);
            }
        }

        ProgramImage {
            code,
            config,
            skipped,
        }
    }

    /// Number of rows the code image occupies
    pub fn rows(&self) -> usize {
        self.code.len().div_ceil(crate::constants::ROW_SIZE as usize)
    }
}
