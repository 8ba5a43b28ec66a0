//! ICSP session: entering programming mode and the SIX / REGOUT frames.
use anyhow::Result;

use crate::channel::BitChannel;
use crate::constants::{control, timing};
use crate::instruction::Instruction;

/// An active ICSP session.
///
/// The target stays in programming mode for as long as the session lives.
/// [`IcspSession::exit`] resets it back to run mode; if the session is dropped
/// without calling it (early return, error propagation) the reset is issued
/// from `Drop` instead. Either way it happens exactly once.
pub struct IcspSession<C: BitChannel> {
    channel: C,
    period_us: u32,
    active: bool,
}

impl<C: BitChannel> IcspSession<C> {
    /// Enters ICSP mode by clocking `key` (MSB first) while MCLR is held low.
    pub fn enter(channel: C, key: u32, key_bits: u8, period_us: u32) -> Result<Self> {
        anyhow::ensure!(
            (1..=32).contains(&key_bits),
            "invalid ICSP key length: {} bits",
            key_bits
        );
        let mut session = IcspSession {
            channel,
            period_us,
            active: false,
        };

        log::info!("Entering ICSP mode");
        log::trace!("ICSP key 0x{:08x} ({} bits)", key, key_bits);

        let ch = &mut session.channel;
        ch.set_mclr(false)?;
        ch.delay_us(timing::MCLR_PULSE_US);
        ch.set_mclr(true)?;
        ch.delay_us(timing::MCLR_PULSE_US);
        ch.set_mclr(false)?;
        ch.delay_us(timing::MCLR_PULSE_US);
        // from here on the device is held in reset, make sure it is released
        session.active = true;

        for i in (0..key_bits).rev() {
            session.write_bit(key & (1 << i) != 0)?;
        }

        session.channel.delay_us(timing::KEY_HOLD_US);
        session.channel.set_mclr(true)?;
        session.channel.delay_us(timing::ENTRY_HOLD_US);

        for _ in 0..control::ENTRY_FLUSH_BITS {
            session.write_bit(false)?;
        }
        Ok(session)
    }

    fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.channel.clock_out(bit, self.period_us)
    }

    fn read_bit(&mut self) -> Result<bool> {
        self.channel.clock_in(self.period_us)
    }

    /// Sends a SIX frame: four zero control bits, then the 24-bit opcode LSB first.
    pub fn six(&mut self, insn: Instruction) -> Result<()> {
        anyhow::ensure!(self.active, "ICSP session already closed");
        let opcode = insn.opcode();
        log::trace!("<< 0x{:06x}  {}", opcode, insn);

        for bit in control::SIX {
            self.write_bit(bit)?;
        }
        for i in 0..24 {
            self.write_bit(opcode & (1 << i) != 0)?;
        }
        Ok(())
    }

    /// Sends a batch of instructions, in order
    pub fn six_all(&mut self, insns: &[Instruction]) -> Result<()> {
        for insn in insns {
            self.six(*insn)?;
        }
        Ok(())
    }

    /// Sends a REGOUT frame and shifts out the VISI register, LSB first.
    pub fn regout(&mut self) -> Result<u16> {
        anyhow::ensure!(self.active, "ICSP session already closed");
        for bit in control::REGOUT {
            self.write_bit(bit)?;
        }
        for _ in 0..control::REGOUT_IDLE_BITS {
            self.write_bit(false)?;
        }

        self.channel.pgd_input()?;
        let mut visi = 0u16;
        for i in 0..16 {
            if self.read_bit()? {
                visi |= 1 << i;
            }
        }
        self.channel.pgd_output()?;

        log::trace!(">> 0x{:04x}", visi);
        Ok(visi)
    }

    /// Leaves ICSP mode by pulsing MCLR, the device resumes normal execution.
    pub fn exit(mut self) -> Result<()> {
        self.reset()
    }

    fn reset(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        log::debug!("Leaving ICSP mode");
        self.channel.set_mclr(false)?;
        self.channel.delay_us(timing::EXIT_RESET_US);
        self.channel.set_mclr(true)
    }
}

impl<C: BitChannel> Drop for IcspSession<C> {
    fn drop(&mut self) {
        if let Err(e) = self.reset() {
            log::error!("Failed to reset device: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{DummyChannel, Frame, WireEvent};
    use crate::instruction::Reg;

    const KEY: u32 = 0x4D434851;

    #[test]
    fn test_entry_sequence() {
        let mut ch = DummyChannel::recording();
        let session = IcspSession::enter(&mut ch, KEY, 32, 1).unwrap();
        drop(session);

        let events = ch.events();
        assert_eq!(
            &events[..3],
            &[
                WireEvent::Mclr(false),
                WireEvent::Mclr(true),
                WireEvent::Mclr(false)
            ]
        );
        // key MSB first, 0x4D = 0b0100_1101
        let key_bits: Vec<bool> = events[3..11]
            .iter()
            .map(|e| matches!(e, WireEvent::BitOut(true)))
            .collect();
        assert_eq!(
            key_bits,
            vec![false, true, false, false, true, true, false, true]
        );
        assert_eq!(events[3 + 32], WireEvent::Mclr(true));
        assert_eq!(&events[36..41], &[WireEvent::BitOut(false); 5]);

        assert_eq!(
            ch.frames(),
            vec![Frame::Enter { key: KEY, bits: 32 }, Frame::Exit]
        );
    }

    #[test]
    fn test_six_is_lsb_first() {
        let mut ch = DummyChannel::recording();
        let mut session = IcspSession::enter(&mut ch, KEY, 32, 1).unwrap();
        session.six(Instruction::jmp(0x200)).unwrap();
        session.exit().unwrap();

        let events = ch.events();
        let start = 3 + 32 + 1 + 5;
        let bits: Vec<bool> = events[start..start + 28]
            .iter()
            .map(|e| matches!(e, WireEvent::BitOut(true)))
            .collect();
        assert_eq!(&bits[..4], &[false; 4]);
        // 0x040200: bit 9 and bit 18
        for (i, bit) in bits[4..].iter().enumerate() {
            assert_eq!(*bit, i == 9 || i == 18, "bit {}", i);
        }
        assert_eq!(ch.opcodes(), vec![0x040200]);
    }

    #[test]
    fn test_regout_frame() {
        let mut ch = DummyChannel::recording();
        ch.push_response(0xBEEF);
        let mut session = IcspSession::enter(&mut ch, KEY, 32, 1).unwrap();
        session.six(Instruction::Nop).unwrap();
        assert_eq!(session.regout().unwrap(), 0xBEEF);
        session.exit().unwrap();

        let events = ch.events();
        let start = 3 + 32 + 1 + 5 + 28;
        let control_bits: Vec<WireEvent> = events[start..start + 12].to_vec();
        let mut expected = vec![
            WireEvent::BitOut(true),
            WireEvent::BitOut(false),
            WireEvent::BitOut(false),
            WireEvent::BitOut(false),
        ];
        expected.extend([WireEvent::BitOut(false); 8]);
        assert_eq!(control_bits, expected);
        assert_eq!(events[start + 12], WireEvent::PgdInput);
        assert_eq!(events[start + 12 + 17], WireEvent::PgdOutput);

        assert_eq!(
            ch.frames(),
            vec![
                Frame::Enter { key: KEY, bits: 32 },
                Frame::Six(0),
                Frame::RegOut(0xBEEF),
                Frame::Exit
            ]
        );
    }

    #[test]
    fn test_reset_runs_once() {
        let mut ch = DummyChannel::recording();
        {
            let mut session = IcspSession::enter(&mut ch, KEY, 32, 1).unwrap();
            session.six(Instruction::ldi(1, Reg::W0)).unwrap();
            // dropped without exit()
        }
        let resets = ch
            .frames()
            .into_iter()
            .filter(|f| *f == Frame::Exit)
            .count();
        assert_eq!(resets, 1);
        assert_eq!(ch.events().last(), Some(&WireEvent::Mclr(true)));

        let mut ch = DummyChannel::recording();
        let session = IcspSession::enter(&mut ch, KEY, 32, 1).unwrap();
        session.exit().unwrap();
        let mclr = ch
            .events()
            .iter()
            .filter(|e| matches!(e, WireEvent::Mclr(_)))
            .count();
        // 3 entry pulses, release, exit low and high
        assert_eq!(mclr, 6);
    }

    #[test]
    fn test_rejects_bad_key_length() {
        let mut ch = DummyChannel::recording();
        assert!(IcspSession::enter(&mut ch, KEY, 0, 1).is_err());
        assert!(IcspSession::enter(&mut ch, KEY, 33, 1).is_err());
        assert!(ch.events().is_empty());
    }
}
