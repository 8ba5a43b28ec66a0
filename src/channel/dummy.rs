//! A channel without hardware behind it.
//!
//! Used for `--dry-run`, and by the tests to record what would go over the
//! wire. Reads replay scripted VISI values, or zero when the script runs dry,
//! so completion polls end after their first read.
use std::collections::VecDeque;

use anyhow::Result;

use super::BitChannel;
use crate::constants::control;

/// A single observable change on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireEvent {
    Mclr(bool),
    /// A bit clocked out, sampled at the rising PGC edge
    BitOut(bool),
    /// A bit clocked in
    BitIn(bool),
    PgdInput,
    PgdOutput,
}

/// Wire events decoded back into protocol frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// ICSP entry with the key and its length in bits
    Enter { key: u32, bits: usize },
    Six(u32),
    RegOut(u16),
    Exit,
}

#[derive(Debug, Default)]
pub struct DummyChannel {
    record: bool,
    events: Vec<WireEvent>,
    responses: VecDeque<bool>,
    pgd: bool,
    pgd_input: bool,
}

impl DummyChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dummy channel that keeps every wire event
    pub fn recording() -> Self {
        DummyChannel {
            record: true,
            ..Default::default()
        }
    }

    /// Queue a value to be shifted out by the next REGOUT
    pub fn push_response(&mut self, visi: u16) {
        self.responses
            .extend((0..16).map(|i| visi & (1 << i) != 0));
    }

    pub fn events(&self) -> &[WireEvent] {
        &self.events
    }

    fn push(&mut self, event: WireEvent) {
        if self.record {
            self.events.push(event);
        }
    }

    /// Decodes the recorded events into frames
    pub fn frames(&self) -> Vec<Frame> {
        let mut frames = vec![];
        let mut mclr_low = false;
        let mut active = false;
        let mut key: Vec<bool> = vec![];
        let mut flush = 0;
        let mut out: Vec<bool> = vec![];
        let mut read = 0u16;
        let mut nread = 0;

        for event in &self.events {
            match *event {
                WireEvent::Mclr(false) => {
                    mclr_low = true;
                    key.clear();
                }
                WireEvent::Mclr(true) => {
                    mclr_low = false;
                    if !key.is_empty() {
                        let value = key.iter().fold(0u32, |acc, &b| (acc << 1) | b as u32);
                        frames.push(Frame::Enter {
                            key: value,
                            bits: key.len(),
                        });
                        key.clear();
                        active = true;
                        flush = control::ENTRY_FLUSH_BITS;
                        out.clear();
                    } else if active {
                        frames.push(Frame::Exit);
                        active = false;
                    }
                }
                WireEvent::BitOut(bit) if mclr_low => key.push(bit),
                WireEvent::BitOut(bit) if active => {
                    if flush > 0 {
                        flush -= 1;
                        continue;
                    }
                    out.push(bit);
                    if out.len() == 28 && out[..4] == control::SIX {
                        let opcode = out[4..]
                            .iter()
                            .enumerate()
                            .fold(0u32, |acc, (i, &b)| acc | (b as u32) << i);
                        frames.push(Frame::Six(opcode));
                        out.clear();
                    }
                }
                WireEvent::BitIn(bit) if active => {
                    read |= (bit as u16) << nread;
                    nread += 1;
                    if nread == 16 {
                        frames.push(Frame::RegOut(read));
                        read = 0;
                        nread = 0;
                        out.clear();
                    }
                }
                _ => (),
            }
        }
        frames
    }

    /// Opcodes of all SIX frames, in order
    pub fn opcodes(&self) -> Vec<u32> {
        self.frames()
            .into_iter()
            .filter_map(|f| match f {
                Frame::Six(op) => Some(op),
                _ => None,
            })
            .collect()
    }
}

impl BitChannel for DummyChannel {
    fn set_mclr(&mut self, high: bool) -> Result<()> {
        self.push(WireEvent::Mclr(high));
        Ok(())
    }

    fn set_pgc(&mut self, high: bool) -> Result<()> {
        if high && !self.pgd_input {
            self.push(WireEvent::BitOut(self.pgd));
        }
        Ok(())
    }

    fn set_pgd(&mut self, high: bool) -> Result<()> {
        self.pgd = high;
        Ok(())
    }

    fn get_pgd(&mut self) -> Result<bool> {
        let bit = self.responses.pop_front().unwrap_or(false);
        self.push(WireEvent::BitIn(bit));
        Ok(bit)
    }

    fn pgd_input(&mut self) -> Result<()> {
        self.pgd_input = true;
        self.push(WireEvent::PgdInput);
        Ok(())
    }

    fn pgd_output(&mut self) -> Result<()> {
        self.pgd_input = false;
        self.push(WireEvent::PgdOutput);
        Ok(())
    }

    fn delay_us(&mut self, _us: u32) {}
}
