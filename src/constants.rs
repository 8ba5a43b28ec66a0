
/// Flash rows are programmed 128 words at a time
pub const ROW_SIZE: u32 = 128;

/// Code words fetched per row-write iteration, packed into 6 transfer words
pub const WORDS_PER_BATCH: usize = 8;

pub const BATCHES_PER_ROW: usize = ROW_SIZE as usize / WORDS_PER_BATCH;

/// WR bit of NVMCON, set to start a flash operation
pub const NVMCON_WR_BIT: u8 = 15;

pub mod timing {
    /// Default delay around each PGC edge, in microseconds
    pub const PERIOD_US: u32 = 1;

    pub const MCLR_PULSE_US: u32 = 100;
    pub const KEY_HOLD_US: u32 = 20_000;
    pub const ENTRY_HOLD_US: u32 = 50_000;
    pub const EXIT_RESET_US: u32 = 5_000;
}

pub mod control {
    /// SIX: execute the following 24-bit instruction
    pub const SIX: [bool; 4] = [false, false, false, false];
    /// REGOUT: shift out the VISI register
    pub const REGOUT: [bool; 4] = [true, false, false, false];

    /// Zero bits clocked after the ICSP key
    pub const ENTRY_FLUSH_BITS: usize = 5;
    /// Zero bits clocked between REGOUT and the VISI data
    pub const REGOUT_IDLE_BITS: usize = 8;
}
