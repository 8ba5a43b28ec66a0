//! PIC24 instruction encoding, for the instructions the programming executive needs.
//!
//! Every instruction is fed to the target through a SIX frame as a 24-bit opcode.
use std::fmt;

use bitfield::bitfield;

/// `NOP` is the all-zero opcode. Unprogrammed code image gaps are filled with it.
pub const NOP: u32 = 0x000000;

/// Returns the upper 8 bits of a 24-bit word
pub const fn upper8(data: u32) -> u32 {
    (data >> 16) & 0xff
}

/// Returns the lower 16 bits of a 24-bit word
pub const fn lower16(data: u32) -> u32 {
    data & 0xffff
}

/// Working registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Reg {
    W0 = 0,
    W1,
    W2,
    W3,
    W4,
    W5,
    W6,
    W7,
    W8,
    W9,
    W10,
    W11,
    W12,
    W13,
    W14,
    W15,
}

/// Addressing mode of the TBLRD / TBLWT operands.
///
/// The order is fixed, it is encoded as-is into 3 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Mode {
    Direct = 0,
    Indirect = 1,
    IndirectPostDec = 2,
    IndirectPostInc = 3,
    IndirectPreDec = 4,
    IndirectPreInc = 5,
}

/// The table instruction family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableOp {
    /// Program memory low word to register
    ReadLow,
    /// Program memory high byte to register
    ReadHigh,
    /// Register to program memory low word
    WriteLow,
    /// Register to program memory high byte
    WriteHigh,
    /// Register to program memory high byte, byte mode
    WriteHighByte,
}

impl TableOp {
    const fn base(self) -> u32 {
        match self {
            TableOp::ReadLow => 0xBA0000,
            TableOp::ReadHigh => 0xBA8000,
            TableOp::WriteLow => 0xBB0000,
            TableOp::WriteHigh => 0xBB8000,
            TableOp::WriteHighByte => 0xBBC000,
        }
    }

    const fn mnemonic(self) -> &'static str {
        match self {
            TableOp::ReadLow => "TBLRDL",
            TableOp::ReadHigh => "TBLRDH",
            TableOp::WriteLow => "TBLWTL",
            TableOp::WriteHigh => "TBLWTH",
            TableOp::WriteHighByte => "TBLWTH.B",
        }
    }
}

bitfield! {
    /// Operand field layout shared by all table instructions
    struct TableOperands(u32);
    u8, _, set_src: 3, 0;
    u8, _, set_src_mode: 6, 4;
    u8, _, set_dst: 10, 7;
    u8, _, set_dst_mode: 13, 11;
}

/// An instruction to be executed by the target through ICSP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    Nop,
    /// `MOV #lit16, Wn`, load an immediate into a register
    Ldi { data: u32, reg: Reg },
    /// `MOV Wn, f`, store a register to a data memory address
    Sto { reg: Reg, addr: u32 },
    /// `MOV f, Wn`, retrieve a data memory address into a register
    Ret { addr: u32, reg: Reg },
    /// `GOTO addr`, resets the program counter
    Jmp { addr: u32 },
    /// `BSET f, #bit`
    Bset { addr: u32, bit: u8 },
    Table {
        op: TableOp,
        src: Reg,
        src_mode: Mode,
        dst: Reg,
        dst_mode: Mode,
    },
}

impl Instruction {
    pub fn ldi(data: u32, reg: Reg) -> Self {
        Instruction::Ldi { data, reg }
    }

    pub fn sto(reg: Reg, addr: u32) -> Self {
        Instruction::Sto { reg, addr }
    }

    pub fn ret(addr: u32, reg: Reg) -> Self {
        Instruction::Ret { addr, reg }
    }

    pub fn jmp(addr: u32) -> Self {
        Instruction::Jmp { addr }
    }

    pub fn bset(addr: u32, bit: u8) -> Self {
        Instruction::Bset { addr, bit }
    }

    pub fn table(op: TableOp, src: Reg, src_mode: Mode, dst: Reg, dst_mode: Mode) -> Self {
        Instruction::Table {
            op,
            src,
            src_mode,
            dst,
            dst_mode,
        }
    }

    pub fn tblrdl(src: Reg, src_mode: Mode, dst: Reg, dst_mode: Mode) -> Self {
        Self::table(TableOp::ReadLow, src, src_mode, dst, dst_mode)
    }

    pub fn tblrdh(src: Reg, src_mode: Mode, dst: Reg, dst_mode: Mode) -> Self {
        Self::table(TableOp::ReadHigh, src, src_mode, dst, dst_mode)
    }

    pub fn tblwtl(src: Reg, src_mode: Mode, dst: Reg, dst_mode: Mode) -> Self {
        Self::table(TableOp::WriteLow, src, src_mode, dst, dst_mode)
    }

    pub fn tblwth(src: Reg, src_mode: Mode, dst: Reg, dst_mode: Mode) -> Self {
        Self::table(TableOp::WriteHigh, src, src_mode, dst, dst_mode)
    }

    pub fn tblwthb(src: Reg, src_mode: Mode, dst: Reg, dst_mode: Mode) -> Self {
        Self::table(TableOp::WriteHighByte, src, src_mode, dst, dst_mode)
    }

    /// The 24-bit opcode sent in a SIX frame
    pub fn opcode(&self) -> u32 {
        match *self {
            Instruction::Nop => NOP,
            Instruction::Ldi { data, reg } => 0x200000 | (data << 4) | reg as u32,
            Instruction::Sto { reg, addr } => 0x880000 | ((addr & 0xfffe) << 3) | reg as u32,
            Instruction::Ret { addr, reg } => 0x800000 | ((addr & 0xfffe) << 3) | reg as u32,
            Instruction::Jmp { addr } => 0x040000 | addr,
            Instruction::Bset { addr, bit } => {
                let bit = bit as u32;
                0xA80000 | (addr & 0x1ffe) | ((bit & 0xe) << 12) | (bit & 0x1)
            }
            Instruction::Table {
                op,
                src,
                src_mode,
                dst,
                dst_mode,
            } => {
                let mut operands = TableOperands(0);
                operands.set_src(src as u8);
                operands.set_src_mode(src_mode as u8);
                operands.set_dst(dst as u8);
                operands.set_dst_mode(dst_mode as u8);
                op.base() | operands.0
            }
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W{}", *self as u8)
    }
}

struct Operand(Reg, Mode);

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Operand(reg, mode) = self;
        match mode {
            Mode::Direct => write!(f, "{}", reg),
            Mode::Indirect => write!(f, "[{}]", reg),
            Mode::IndirectPostDec => write!(f, "[{}--]", reg),
            Mode::IndirectPostInc => write!(f, "[{}++]", reg),
            Mode::IndirectPreDec => write!(f, "[--{}]", reg),
            Mode::IndirectPreInc => write!(f, "[++{}]", reg),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::Nop => write!(f, "NOP"),
            Instruction::Ldi { data, reg } => write!(f, "MOV #0x{:04x}, {}", data, reg),
            Instruction::Sto { reg, addr } => write!(f, "MOV {}, 0x{:04x}", reg, addr),
            Instruction::Ret { addr, reg } => write!(f, "MOV 0x{:04x}, {}", addr, reg),
            Instruction::Jmp { addr } => write!(f, "GOTO 0x{:06x}", addr),
            Instruction::Bset { addr, bit } => write!(f, "BSET 0x{:04x}, #{}", addr, bit),
            Instruction::Table {
                op,
                src,
                src_mode,
                dst,
                dst_mode,
            } => write!(
                f,
                "{} {}, {}",
                op.mnemonic(),
                Operand(src, src_mode),
                Operand(dst, dst_mode)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers() {
        assert_eq!(upper8(0xFF0000), 0xFF);
        assert_eq!(upper8(0x12345678), 0x34);
        assert_eq!(lower16(0xFF0002), 0x0002);
    }

    #[test]
    fn test_jmp_and_ldi() {
        assert_eq!(Instruction::jmp(0x1234).opcode(), 0x040000 | 0x1234);
        assert_eq!(Instruction::jmp(0x200).opcode(), 0x040200);
        assert_eq!(Instruction::ldi(5, Reg::W0).opcode(), 0x200000 | (5 << 4));
        assert_eq!(Instruction::ldi(0x404F, Reg::W10).opcode(), 0x2404FA);
        assert_eq!(Instruction::Nop.opcode(), NOP);
    }

    #[test]
    fn test_register_moves() {
        // MOV W0, TBLPAG
        assert_eq!(Instruction::sto(Reg::W0, 0x32).opcode(), 0x880190);
        // MOV W2, VISI
        assert_eq!(Instruction::sto(Reg::W2, 0x784).opcode(), 0x883C22);
        // MOV NVMCON, W2
        assert_eq!(Instruction::ret(0x760, Reg::W2).opcode(), 0x803B02);
        // bit 0 of the address is dropped
        assert_eq!(
            Instruction::sto(Reg::W1, 0x33).opcode(),
            Instruction::sto(Reg::W1, 0x32).opcode()
        );
    }

    #[test]
    fn test_bset() {
        // BSET NVMCON, #WR
        assert_eq!(Instruction::bset(0x760, 15).opcode(), 0xA8E761);
        assert_eq!(Instruction::bset(0x760, 0).opcode(), 0xA80760);
        assert_eq!(Instruction::bset(0x760, 1).opcode(), 0xA80761);
        assert_eq!(Instruction::bset(0x760, 2).opcode(), 0xA82760);
    }

    #[test]
    fn test_table_instructions() {
        use Mode::*;
        use Reg::*;

        assert_eq!(
            Instruction::tblrdl(W6, IndirectPostInc, W7, Indirect).opcode(),
            0xBA0BB6
        );
        assert_eq!(Instruction::tblrdl(W6, Indirect, W7, Indirect).opcode(), 0xBA0B96);
        assert_eq!(Instruction::tblrdh(W6, Indirect, W7, Indirect).opcode(), 0xBA8B96);
        assert_eq!(Instruction::tblwtl(W0, Direct, W0, Indirect).opcode(), 0xBB0800);
        assert_eq!(
            Instruction::tblwtl(W6, IndirectPostInc, W7, Indirect).opcode(),
            0xBB0BB6
        );
        assert_eq!(
            Instruction::tblwtl(W6, IndirectPostInc, W7, IndirectPostInc).opcode(),
            0xBB1BB6
        );
        assert_eq!(
            Instruction::tblwthb(W6, IndirectPostInc, W7, IndirectPostInc).opcode(),
            0xBBDBB6
        );
        assert_eq!(
            Instruction::tblwthb(W6, IndirectPostInc, W7, IndirectPreInc).opcode(),
            0xBBEBB6
        );
        assert_eq!(
            Instruction::tblwth(W6, IndirectPostInc, W7, IndirectPostInc).opcode(),
            0xBB9BB6
        );
        assert_eq!(
            Instruction::tblwtl(W6, Direct, W7, IndirectPostInc).opcode(),
            0xBB1B86
        );
    }

    #[test]
    fn test_display() {
        use Mode::*;
        use Reg::*;

        assert_eq!(Instruction::Nop.to_string(), "NOP");
        assert_eq!(Instruction::jmp(0x200).to_string(), "GOTO 0x000200");
        assert_eq!(
            Instruction::tblwthb(W6, IndirectPostInc, W7, IndirectPreInc).to_string(),
            "TBLWTH.B [W6++], [++W7]"
        );
        assert_eq!(
            Instruction::ldi(0x784, W7).to_string(),
            "MOV #0x0784, W7"
        );
    }
}
