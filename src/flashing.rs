//! Chip flashing logic.
use std::fmt;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::channel::BitChannel;
use crate::constants::{BATCHES_PER_ROW, NVMCON_WR_BIT, ROW_SIZE, WORDS_PER_BATCH};
use crate::device::DeviceProfile;
use crate::format::MemoryWord;
use crate::icsp::IcspSession;
use crate::image::ProgramImage;
use crate::instruction::Mode::{Direct, Indirect, IndirectPostInc, IndirectPreInc};
use crate::instruction::Reg::{W0, W1, W2, W3, W4, W5, W6, W7, W10};
use crate::instruction::{Instruction as Insn, NOP, Reg, lower16, upper8};

/// The two words read from the device id address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId {
    pub id: u16,
    pub revision: u16,
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x} (rev 0x{:04x})", self.id, self.revision)
    }
}

pub struct Flashing<C: BitChannel> {
    icsp: IcspSession<C>,
    device: DeviceProfile,
    /// Upper bound of completion polls, unbounded when `None`
    poll_limit: Option<u32>,
}

impl<C: BitChannel> Flashing<C> {
    /// Puts the device into ICSP mode and anchors its program counter.
    pub fn new(channel: C, device: DeviceProfile, period_us: u32) -> Result<Self> {
        let icsp = IcspSession::enter(channel, device.icsp_key, device.icsp_key_bits, period_us)?;
        let mut f = Flashing {
            icsp,
            device,
            poll_limit: None,
        };
        f.reset_pc()?;
        Ok(f)
    }

    /// Give up waiting for a flash operation after `limit` status polls
    pub fn with_poll_limit(mut self, limit: Option<u32>) -> Self {
        self.poll_limit = limit;
        self
    }

    /// Leaves ICSP mode, the device is reset into normal execution
    pub fn finish(self) -> Result<()> {
        self.icsp.exit()
    }

    fn reset_pc(&mut self) -> Result<()> {
        self.icsp
            .six_all(&[Insn::Nop, Insn::jmp(self.device.start_addr), Insn::Nop])
    }

    /// Loads TBLPAG and the given pointer register with a program memory address
    fn load_table_pointer(&mut self, addr: u32, pointer: Reg) -> Result<()> {
        self.icsp.six_all(&[
            Insn::ldi(upper8(addr), W0),
            Insn::sto(W0, self.device.tblpag_addr),
            Insn::ldi(lower16(addr), pointer),
        ])
    }

    pub fn read_device_id(&mut self) -> Result<DeviceId> {
        self.reset_pc()?;
        self.load_table_pointer(self.device.device_id_addr, W6)?;
        self.icsp.six_all(&[
            Insn::ldi(self.device.visi_addr, W7),
            Insn::Nop,
            Insn::tblrdl(W6, IndirectPostInc, W7, Indirect),
            Insn::Nop,
            Insn::Nop,
        ])?;
        let id = self.icsp.regout()?;
        self.icsp.six_all(&[
            Insn::Nop,
            Insn::tblrdl(W6, Indirect, W7, Indirect),
            Insn::Nop,
            Insn::Nop,
        ])?;
        let revision = self.icsp.regout()?;
        self.icsp.six(Insn::Nop)?;

        Ok(DeviceId { id, revision })
    }

    /// Reads the 24-bit program memory word at `addr`
    pub fn read_word(&mut self, addr: u32) -> Result<u32> {
        self.reset_pc()?;
        self.load_table_pointer(addr, W6)?;
        self.icsp.six_all(&[
            Insn::ldi(self.device.visi_addr, W7),
            Insn::Nop,
            Insn::tblrdl(W6, Indirect, W7, Indirect),
            Insn::Nop,
            Insn::Nop,
        ])?;
        let low = self.icsp.regout()?;
        self.icsp.six_all(&[
            Insn::Nop,
            Insn::tblrdh(W6, Indirect, W7, Indirect),
            Insn::Nop,
            Insn::Nop,
        ])?;
        let high = self.icsp.regout()?;
        self.icsp.six(Insn::Nop)?;

        Ok((((high as u32) & 0xff) << 16) | (low as u32))
    }

    /// Polls NVMCON until the WR operation has completed
    fn wait_for_write(&mut self) -> Result<()> {
        let mut polls = 0u32;
        loop {
            self.icsp.six_all(&[
                Insn::jmp(self.device.start_addr),
                Insn::Nop,
                Insn::ret(self.device.nvmcon_addr, W2),
                Insn::sto(W2, self.device.visi_addr),
                Insn::Nop,
            ])?;
            let nvmcon = self.icsp.regout()?;
            self.icsp.six(Insn::Nop)?;

            if (nvmcon as u32) & self.device.nvmcon_writing == 0 {
                log::trace!("flash operation done after {} polls", polls + 1);
                return Ok(());
            }
            polls += 1;
            if let Some(limit) = self.poll_limit {
                anyhow::ensure!(
                    polls < limit,
                    "flash operation still in progress after {} polls (NVMCON=0x{:04x})",
                    polls,
                    nvmcon
                );
            }
        }
    }

    /// Starts the operation selected in NVMCON and waits for it
    fn start_write(&mut self) -> Result<()> {
        self.icsp.six_all(&[
            Insn::bset(self.device.nvmcon_addr, NVMCON_WR_BIT),
            Insn::Nop,
            Insn::Nop,
        ])?;
        self.wait_for_write()
    }

    fn set_nvmcon(&mut self, pattern: u32) -> Result<()> {
        self.icsp.six_all(&[
            Insn::ldi(pattern, W10),
            Insn::sto(W10, self.device.nvmcon_addr),
        ])
    }

    /// Erases all program memory, including the config words
    pub fn erase_chip(&mut self) -> Result<()> {
        self.reset_pc()?;
        self.set_nvmcon(self.device.nvmcon_erase_all)?;
        self.icsp.six_all(&[
            Insn::ldi(0x0, W0),
            Insn::sto(W0, self.device.tblpag_addr),
            Insn::ldi(0x0, W0),
            Insn::tblwtl(W0, Direct, W0, Indirect),
            Insn::Nop,
            Insn::Nop,
        ])?;
        self.start_write()?;

        log::info!("Program memory erased");
        Ok(())
    }

    /// Writes the code image row by row, starting at address 0
    pub fn write_code_words(&mut self, code: &[u32]) -> Result<()> {
        let bar = ProgressBar::new(code.len().div_ceil(ROW_SIZE as usize) as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} rows")?
                .progress_chars("=> "),
        );
        bar.set_message("Programming");

        let mut cursor = code.iter();
        let mut addr = 0;
        while !cursor.as_slice().is_empty() {
            addr = self.write_128words(addr, &mut cursor)?;
            bar.inc(1);
        }
        bar.finish_and_clear();
        Ok(())
    }

    /// Writes one row of 128 words at `addr` from `cursor`, padding with NOP
    /// once the cursor runs dry. Returns the address of the next row.
    pub fn write_128words(
        &mut self,
        addr: u32,
        cursor: &mut std::slice::Iter<'_, u32>,
    ) -> Result<u32> {
        self.reset_pc()?;
        self.set_nvmcon(self.device.nvmcon_write_row)?;
        self.load_table_pointer(addr, W7)?;

        for i in 0..BATCHES_PER_ROW {
            let mut d = [NOP; WORDS_PER_BATCH];
            for slot in d.iter_mut() {
                *slot = cursor.next().copied().unwrap_or(NOP);
            }
            log::trace!(
                "Writing {:06x?} to 0x{:06x}",
                d,
                addr + (i * WORDS_PER_BATCH) as u32
            );

            // 8 words in 6: low words whole, upper bytes packed in pairs
            let words = [
                d[0],
                ((d[3] & 0xff) << 8) | (d[1] & 0xff),
                d[2],
                d[4],
                ((d[7] & 0xff) << 8) | (d[5] & 0xff),
                d[6],
            ];

            self.reset_pc()?;
            self.icsp.six(Insn::ldi(0, W6))?;
            for (word, reg) in words.into_iter().zip([W0, W1, W2, W3, W4, W5]) {
                self.icsp.six(Insn::ldi(word, reg))?;
            }
            for insn in [
                Insn::tblwtl(W6, IndirectPostInc, W7, Indirect),
                Insn::tblwthb(W6, IndirectPostInc, W7, IndirectPostInc),
                Insn::tblwthb(W6, IndirectPostInc, W7, IndirectPreInc),
                Insn::tblwtl(W6, IndirectPostInc, W7, IndirectPostInc),
                Insn::tblwtl(W6, IndirectPostInc, W7, Indirect),
                Insn::tblwthb(W6, IndirectPostInc, W7, IndirectPostInc),
                Insn::tblwthb(W6, IndirectPostInc, W7, IndirectPreInc),
                Insn::tblwtl(W6, IndirectPostInc, W7, IndirectPostInc),
            ] {
                self.icsp.six_all(&[insn, Insn::Nop, Insn::Nop])?;
            }
        }

        self.start_write()?;
        self.icsp
            .six_all(&[Insn::jmp(self.device.start_addr), Insn::Nop])?;

        Ok(addr + ROW_SIZE)
    }

    /// Writes a single config word, only its lower 16 bits are used
    pub fn write_config_word(&mut self, addr: u32, data: u32) -> Result<()> {
        self.reset_pc()?;
        self.icsp.six(Insn::ldi(lower16(addr), W7))?;
        self.set_nvmcon(self.device.nvmcon_write_word)?;
        self.icsp.six_all(&[
            Insn::ldi(upper8(addr), W0),
            Insn::sto(W0, self.device.tblpag_addr),
            Insn::ldi(data & 0xffff, W6),
            Insn::Nop,
            Insn::tblwtl(W6, Direct, W7, IndirectPostInc),
            Insn::Nop,
            Insn::Nop,
        ])?;
        self.start_write()?;
        self.icsp
            .six_all(&[Insn::jmp(self.device.start_addr), Insn::Nop])
    }

    /// Splits memory words into the code image and the config words of this device
    pub fn prepare_program(&self, memory: &[MemoryWord]) -> ProgramImage {
        ProgramImage::prepare(memory, &self.device)
    }

    /// Writes the given memory words to the device. Expects erased flash.
    pub fn program(&mut self, memory: &[MemoryWord]) -> Result<ProgramImage> {
        let image = self.prepare_program(memory);

        log::info!(
            "Programming device ({} code words and {} config words)...",
            image.code.len(),
            image.config.len()
        );
        self.write_code_words(&image.code)?;

        for cw in &image.config {
            log::info!("Config word 0x{:06x}: 0x{:06x}", cw.address, cw.data);
            self.write_config_word(cw.address, cw.data)?;
        }
        Ok(image)
    }

    /// Reads back every memory word and compares it.
    ///
    /// Mismatches are logged, never fatal. Returns how many words differed.
    pub fn verify(&mut self, memory: &[MemoryWord]) -> Result<usize> {
        log::info!("Verifying {} words of memory...", memory.len());

        let bar = ProgressBar::new(memory.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} words")?
                .progress_chars("=> "),
        );
        bar.set_message("Verifying");

        let mut mismatches = 0;
        // last even address read, with its full 24-bit word
        let mut last: Option<(u32, u32)> = None;
        for word in memory {
            let data = if word.address % 2 == 1 {
                match last {
                    Some((addr, value)) if addr + 1 == word.address => upper8(value),
                    _ => upper8(self.read_word(word.address - 1)?),
                }
            } else {
                let value = self.read_word(word.address)?;
                last = Some((word.address, value));
                value
            };

            if data & 0xffff != word.data as u32 {
                log::warn!(
                    "Memory does not match expected value! Address: 0x{:06x}, Expected: 0x{:04x}, Read: 0x{:04x}",
                    word.address,
                    word.data,
                    data & 0xffff
                );
                mismatches += 1;
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        log::info!("Verification completed");
        Ok(mismatches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{DummyChannel, Frame};
    use crate::device::DeviceDB;

    fn device() -> DeviceProfile {
        DeviceDB::load().unwrap().find("PIC24FJ64GB0XX").unwrap()
    }

    fn count(ops: &[u32], insn: Insn) -> usize {
        ops.iter().filter(|&&op| op == insn.opcode()).count()
    }

    /// Opcodes sent after the constructor's preamble
    fn after_preamble(ch: &DummyChannel) -> Vec<u32> {
        ch.opcodes()[3..].to_vec()
    }

    #[test]
    fn test_new_enters_and_anchors_pc() {
        let mut ch = DummyChannel::recording();
        let f = Flashing::new(&mut ch, device(), 1).unwrap();
        f.finish().unwrap();

        assert_eq!(
            ch.frames(),
            vec![
                Frame::Enter {
                    key: 0x4D434851,
                    bits: 32
                },
                Frame::Six(0),
                Frame::Six(0x040200),
                Frame::Six(0),
                Frame::Exit,
            ]
        );
    }

    #[test]
    fn test_read_device_id() {
        let mut ch = DummyChannel::recording();
        ch.push_response(0x4205);
        ch.push_response(0x0003);
        let mut f = Flashing::new(&mut ch, device(), 1).unwrap();
        let id = f.read_device_id().unwrap();
        f.finish().unwrap();

        assert_eq!(
            id,
            DeviceId {
                id: 0x4205,
                revision: 0x0003
            }
        );
        let expected: Vec<u32> = [
            Insn::Nop,
            Insn::jmp(0x200),
            Insn::Nop,
            Insn::ldi(0xFF, W0),
            Insn::sto(W0, 0x32),
            Insn::ldi(0x0000, W6),
            Insn::ldi(0x784, W7),
            Insn::Nop,
            Insn::tblrdl(W6, IndirectPostInc, W7, Indirect),
            Insn::Nop,
            Insn::Nop,
            Insn::Nop,
            Insn::tblrdl(W6, Indirect, W7, Indirect),
            Insn::Nop,
            Insn::Nop,
            Insn::Nop,
        ]
        .iter()
        .map(Insn::opcode)
        .collect();
        assert_eq!(after_preamble(&ch), expected);
        assert_eq!(
            ch.frames()
                .iter()
                .filter(|f| matches!(f, Frame::RegOut(_)))
                .count(),
            2
        );
    }

    #[test]
    fn test_read_word_combines_halves() {
        let mut ch = DummyChannel::new();
        ch.push_response(0x1234);
        ch.push_response(0xFFAB);
        let mut f = Flashing::new(&mut ch, device(), 1).unwrap();
        assert_eq!(f.read_word(0x100).unwrap(), 0xAB1234);
    }

    #[test]
    fn test_erase_polls_until_done() {
        let mut ch = DummyChannel::recording();
        ch.push_response(0x8000);
        ch.push_response(0xC04F);
        ch.push_response(0x404F);
        let mut f = Flashing::new(&mut ch, device(), 1).unwrap();
        f.erase_chip().unwrap();
        f.finish().unwrap();

        let ops = after_preamble(&ch);
        assert_eq!(ops[3], Insn::ldi(0x404F, W10).opcode());
        assert_eq!(ops[4], Insn::sto(W10, 0x760).opcode());
        assert_eq!(count(&ops, Insn::tblwtl(W0, Direct, W0, Indirect)), 1);
        assert_eq!(count(&ops, Insn::bset(0x760, 15)), 1);
        assert_eq!(count(&ops, Insn::ret(0x760, W2)), 3);
    }

    #[test]
    fn test_poll_limit_is_opt_in() {
        let mut ch = DummyChannel::recording();
        for _ in 0..10 {
            ch.push_response(0x8000);
        }
        {
            let mut f = Flashing::new(&mut ch, device(), 1)
                .unwrap()
                .with_poll_limit(Some(3));
            let err = f.erase_chip().unwrap_err();
            assert!(err.to_string().contains("after 3 polls"));
        }
        assert_eq!(count(&ch.opcodes(), Insn::ret(0x760, W2)), 3);
        // the device is still released from reset
        assert_eq!(ch.frames().last(), Some(&Frame::Exit));
    }

    #[test]
    fn test_write_128words_packs_and_advances() {
        let mut ch = DummyChannel::recording();
        let code = [
            0x1111, 0x0022, 0x3333, 0x0044, 0x5555, 0x0066, 0x7777, 0x0088, 0x9999,
        ];
        let mut f = Flashing::new(&mut ch, device(), 1).unwrap();
        let mut cursor = code.iter();
        assert_eq!(f.write_128words(0x80, &mut cursor).unwrap(), 0x100);
        assert!(cursor.as_slice().is_empty());
        // reading past the end yields another full, empty row
        assert_eq!(f.write_128words(0x100, &mut cursor).unwrap(), 0x180);
        f.finish().unwrap();

        let ops = after_preamble(&ch);
        assert_eq!(ops[3], Insn::ldi(0x4001, W10).opcode());
        assert_eq!(ops[5], Insn::ldi(0x00, W0).opcode());
        assert_eq!(ops[7], Insn::ldi(0x80, W7).opcode());
        let batch: Vec<u32> = ops[8..18].to_vec();
        assert_eq!(
            batch,
            [
                Insn::Nop,
                Insn::jmp(0x200),
                Insn::Nop,
                Insn::ldi(0, W6),
                Insn::ldi(0x1111, W0),
                Insn::ldi(0x4422, W1),
                Insn::ldi(0x3333, W2),
                Insn::ldi(0x5555, W3),
                Insn::ldi(0x8866, W4),
                Insn::ldi(0x7777, W5),
            ]
            .iter()
            .map(Insn::opcode)
            .collect::<Vec<_>>()
        );
        assert_eq!(ops[18], 0xBB0BB6);
        assert_eq!(ops[21], 0xBBDBB6);
        assert_eq!(ops[24], 0xBBEBB6);
        assert_eq!(ops[27], 0xBB1BB6);
        assert_eq!(&ops[19..21], &[0, 0]);
        // the ninth word starts the second batch, the rest reads as zero
        let zeros = |first: Insn| -> Vec<u32> {
            [first, Insn::ldi(0, W1), Insn::ldi(0, W2), Insn::ldi(0, W3)]
                .into_iter()
                .chain([Insn::ldi(0, W4), Insn::ldi(0, W5)])
                .map(|insn| insn.opcode())
                .collect()
        };
        assert_eq!(ops[8 + 34 + 3], Insn::ldi(0, W6).opcode());
        assert_eq!(ops[8 + 34 + 4..8 + 34 + 10], zeros(Insn::ldi(0x9999, W0))[..]);
        for batch in 2..BATCHES_PER_ROW {
            let at = 8 + 34 * batch + 4;
            assert_eq!(ops[at..at + 6], zeros(Insn::ldi(0, W0))[..], "batch {}", batch);
        }

        // every load of the second row is padding
        let row = ops
            .iter()
            .position(|&op| op == Insn::ldi(0x100, W7).opcode())
            .unwrap();
        for batch in 0..BATCHES_PER_ROW {
            let at = row + 1 + 34 * batch;
            assert_eq!(ops[at + 3], Insn::ldi(0, W6).opcode());
            assert_eq!(ops[at + 4..at + 10], zeros(Insn::ldi(0, W0))[..], "batch {}", batch);
        }

        assert_eq!(count(&ops, Insn::ldi(0x100, W7)), 1);
        assert_eq!(count(&ops, Insn::bset(0x760, 15)), 2);
        assert_eq!(count(&ops, Insn::ldi(0, W6)), 32);
    }

    #[test]
    fn test_write_code_words_row_count() {
        let mut ch = DummyChannel::recording();
        let code = vec![0x0004; 130];
        let mut f = Flashing::new(&mut ch, device(), 1).unwrap();
        f.write_code_words(&code).unwrap();
        f.write_code_words(&[]).unwrap();
        f.finish().unwrap();

        let ops = ch.opcodes();
        assert_eq!(count(&ops, Insn::bset(0x760, 15)), 2);
        assert_eq!(count(&ops, Insn::ldi(0, W7)), 1);
        assert_eq!(count(&ops, Insn::ldi(128, W7)), 1);
    }

    #[test]
    fn test_write_config_word() {
        let mut ch = DummyChannel::recording();
        let mut f = Flashing::new(&mut ch, device(), 1).unwrap();
        f.write_config_word(0xABF8, 0x0012_7FFF).unwrap();
        f.finish().unwrap();

        let ops = after_preamble(&ch);
        let expected: Vec<u32> = [
            Insn::Nop,
            Insn::jmp(0x200),
            Insn::Nop,
            Insn::ldi(0xABF8, W7),
            Insn::ldi(0x4003, W10),
            Insn::sto(W10, 0x760),
            Insn::ldi(0x00, W0),
            Insn::sto(W0, 0x32),
            Insn::ldi(0x7FFF, W6),
            Insn::Nop,
            Insn::tblwtl(W6, Direct, W7, IndirectPostInc),
            Insn::Nop,
            Insn::Nop,
            Insn::bset(0x760, 15),
            Insn::Nop,
            Insn::Nop,
            Insn::jmp(0x200),
            Insn::Nop,
            Insn::ret(0x760, W2),
            Insn::sto(W2, 0x784),
            Insn::Nop,
            Insn::Nop,
            Insn::jmp(0x200),
            Insn::Nop,
        ]
        .iter()
        .map(Insn::opcode)
        .collect();
        assert_eq!(ops, expected);
    }

    #[test]
    fn test_program_writes_rows_then_config() {
        let mut ch = DummyChannel::recording();
        let memory = [
            MemoryWord::new(0, 0x0004),
            MemoryWord::new(1, 0x0004),
            MemoryWord::new(0xABF8, 0x7FFF),
        ];
        let mut f = Flashing::new(&mut ch, device(), 1).unwrap();
        let image = f.program(&memory).unwrap();
        f.finish().unwrap();

        assert_eq!(image.code, vec![4, 4]);
        let ops = ch.opcodes();
        // one row and four config words
        assert_eq!(count(&ops, Insn::bset(0x760, 15)), 5);
        assert_eq!(count(&ops, Insn::ldi(0x4001, W10)), 1);
        assert_eq!(count(&ops, Insn::ldi(0x4003, W10)), 4);
        assert_eq!(count(&ops, Insn::ldi(0x7FFF, W6)), 1);
        let row = ops
            .iter()
            .position(|&op| op == Insn::ldi(0x4001, W10).opcode())
            .unwrap();
        let first_config = ops
            .iter()
            .position(|&op| op == Insn::ldi(0x4003, W10).opcode())
            .unwrap();
        assert!(row < first_config);
    }

    fn reads(ch: &DummyChannel) -> usize {
        count(&ch.opcodes(), Insn::tblrdh(W6, Indirect, W7, Indirect))
    }

    #[test]
    fn test_verify_reuses_even_read_for_odd_neighbour() {
        let mut ch = DummyChannel::recording();
        ch.push_response(0x1234);
        ch.push_response(0x00AB);
        let memory = [MemoryWord::new(0x10, 0x1234), MemoryWord::new(0x11, 0x00AB)];
        let mut f = Flashing::new(&mut ch, device(), 1).unwrap();
        assert_eq!(f.verify(&memory).unwrap(), 0);
        f.finish().unwrap();
        assert_eq!(reads(&ch), 1);
    }

    #[test]
    fn test_verify_reads_lone_odd_address() {
        let mut ch = DummyChannel::recording();
        // 0x10 reads 0x1234 / 0x00AB, then 0x21 reads its even partner 0x20
        for visi in [0x1234, 0x00AB, 0x5555, 0x00CD] {
            ch.push_response(visi);
        }
        let memory = [MemoryWord::new(0x10, 0x1234), MemoryWord::new(0x21, 0x00CD)];
        let mut f = Flashing::new(&mut ch, device(), 1).unwrap();
        assert_eq!(f.verify(&memory).unwrap(), 0);
        f.finish().unwrap();
        assert_eq!(reads(&ch), 2);
        assert_eq!(count(&ch.opcodes(), Insn::ldi(0x20, W6)), 1);
    }

    #[test]
    fn test_verify_counts_mismatches_without_failing() {
        let mut ch = DummyChannel::new();
        ch.push_response(0x1234);
        ch.push_response(0x00AB);
        let memory = [
            MemoryWord::new(0, 0x1235),
            MemoryWord::new(1, 0x00AB),
            MemoryWord::new(2, 0x0000),
            MemoryWord::new(3, 0x0001),
        ];
        let mut f = Flashing::new(&mut ch, device(), 1).unwrap();
        assert_eq!(f.verify(&memory).unwrap(), 2);
    }

    #[test]
    fn test_load_table_pointer_register() {
        let mut ch = DummyChannel::recording();
        let mut f = Flashing::new(&mut ch, device(), 1).unwrap();
        f.load_table_pointer(0x01ABCD, Reg::W3).unwrap();
        f.finish().unwrap();
        assert_eq!(
            after_preamble(&ch),
            vec![
                Insn::ldi(0x01, W0).opcode(),
                Insn::sto(W0, 0x32).opcode(),
                Insn::ldi(0xABCD, W3).opcode(),
            ]
        );
    }
}
