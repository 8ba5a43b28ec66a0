//! Abstract pin-level interface to the target.
use anyhow::Result;

pub use self::dummy::{DummyChannel, Frame, WireEvent};
pub use self::gpio::{GpioChannel, GpioChannelConfig};

mod dummy;
mod gpio;

/// Abstraction of the three ICSP lines.
/// MCLR is the reset line, PGC the clock, PGD the bidirectional data line.
///
/// Implementations own the hardware exclusively. Nothing here is thread safe,
/// the protocol is strictly sequential.
pub trait BitChannel {
    fn set_mclr(&mut self, high: bool) -> Result<()>;
    fn set_pgc(&mut self, high: bool) -> Result<()>;
    fn set_pgd(&mut self, high: bool) -> Result<()>;
    fn get_pgd(&mut self) -> Result<bool>;
    /// Switch PGD to sense mode
    fn pgd_input(&mut self) -> Result<()>;
    /// Switch PGD back to drive mode
    fn pgd_output(&mut self) -> Result<()>;
    fn delay_us(&mut self, us: u32);

    /// Clocks one bit out: data is set up before the rising edge and
    /// latched by the target on the falling edge.
    fn clock_out(&mut self, bit: bool, period_us: u32) -> Result<()> {
        self.set_pgd(bit)?;
        self.delay_us(period_us);
        self.set_pgc(true)?;
        self.delay_us(period_us);
        self.set_pgc(false)
    }

    /// Clocks one bit in, sampling PGD while the clock is high.
    fn clock_in(&mut self, period_us: u32) -> Result<bool> {
        self.set_pgc(true)?;
        self.delay_us(period_us);
        let bit = self.get_pgd()?;
        self.set_pgc(false)?;
        self.delay_us(period_us);
        Ok(bit)
    }
}

impl<C: BitChannel + ?Sized> BitChannel for &mut C {
    fn set_mclr(&mut self, high: bool) -> Result<()> {
        (**self).set_mclr(high)
    }

    fn set_pgc(&mut self, high: bool) -> Result<()> {
        (**self).set_pgc(high)
    }

    fn set_pgd(&mut self, high: bool) -> Result<()> {
        (**self).set_pgd(high)
    }

    fn get_pgd(&mut self) -> Result<bool> {
        (**self).get_pgd()
    }

    fn pgd_input(&mut self) -> Result<()> {
        (**self).pgd_input()
    }

    fn pgd_output(&mut self) -> Result<()> {
        (**self).pgd_output()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}
