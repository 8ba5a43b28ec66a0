//! Linux GPIO character device channel.
use std::time::{Duration, Instant};

use anyhow::Result;
use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};
use thiserror::Error;

use super::BitChannel;

/// Delays at or above this are slept, shorter ones are spun
const SPIN_LIMIT_US: u32 = 1000;

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("no GPIO chip specified")]
    NoDevice,

    #[error("failed to request GPIO lines on '{chip}': {source}")]
    LineRequestFailed {
        chip: String,
        #[source]
        source: gpiocdev::Error,
    },

    #[error("failed to set {line}: {source}")]
    SetValueFailed {
        line: &'static str,
        #[source]
        source: gpiocdev::Error,
    },

    #[error("failed to read PGD: {0}")]
    GetValueFailed(#[source] gpiocdev::Error),

    #[error("failed to switch PGD direction: {0}")]
    ReconfigureFailed(#[source] gpiocdev::Error),
}

/// Which lines drive MCLR, PGC and PGD
#[derive(Debug, Clone)]
pub struct GpioChannelConfig {
    /// Device path, e.g. "/dev/gpiochip0"
    pub chip: String,
    pub mclr: Offset,
    pub pgc: Offset,
    pub pgd: Offset,
}

impl Default for GpioChannelConfig {
    fn default() -> Self {
        Self {
            chip: "/dev/gpiochip0".to_string(),
            mclr: 2,
            pgc: 3,
            pgd: 4,
        }
    }
}

fn level(high: bool) -> Value {
    if high { Value::Active } else { Value::Inactive }
}

pub struct GpioChannel {
    request: Request,
    config: GpioChannelConfig,
    mclr: bool,
    pgc: bool,
}

impl GpioChannel {
    /// Requests all three lines as outputs, driven low.
    pub fn open(config: &GpioChannelConfig) -> Result<Self> {
        if config.chip.is_empty() {
            return Err(GpioError::NoDevice.into());
        }
        log::info!(
            "Opening {} on lines {} (MCLR), {} (PGC) and {} (PGD)",
            config.chip,
            config.mclr,
            config.pgc,
            config.pgd
        );

        let request = Request::from_config(Self::line_config(config, false, false))
            .on_chip(&config.chip)
            .with_consumer("pic24isp")
            .request()
            .map_err(|source| GpioError::LineRequestFailed {
                chip: config.chip.clone(),
                source,
            })?;

        Ok(GpioChannel {
            request,
            config: config.clone(),
            mclr: false,
            pgc: false,
        })
    }

    fn line_config(config: &GpioChannelConfig, mclr: bool, pgd_input: bool) -> Config {
        let mut cfg = Config::default();
        cfg.with_line(config.mclr).as_output(level(mclr));
        cfg.with_line(config.pgc).as_output(Value::Inactive);
        if pgd_input {
            cfg.with_line(config.pgd).as_input();
        } else {
            cfg.with_line(config.pgd).as_output(Value::Inactive);
        }
        cfg
    }

    fn set(&mut self, line: &'static str, offset: Offset, high: bool) -> Result<()> {
        self.request
            .set_value(offset, level(high))
            .map_err(|source| GpioError::SetValueFailed { line, source })?;
        Ok(())
    }

    fn reconfigure(&mut self, pgd_input: bool) -> Result<()> {
        if self.pgc {
            log::warn!("PGD direction changed while PGC is high");
        }
        let cfg = Self::line_config(&self.config, self.mclr, pgd_input);
        self.request
            .reconfigure(&cfg)
            .map_err(GpioError::ReconfigureFailed)?;
        Ok(())
    }
}

impl BitChannel for GpioChannel {
    fn set_mclr(&mut self, high: bool) -> Result<()> {
        self.set("MCLR", self.config.mclr, high)?;
        self.mclr = high;
        Ok(())
    }

    fn set_pgc(&mut self, high: bool) -> Result<()> {
        self.set("PGC", self.config.pgc, high)?;
        self.pgc = high;
        Ok(())
    }

    fn set_pgd(&mut self, high: bool) -> Result<()> {
        self.set("PGD", self.config.pgd, high)
    }

    fn get_pgd(&mut self) -> Result<bool> {
        let value = self
            .request
            .value(self.config.pgd)
            .map_err(GpioError::GetValueFailed)?;
        Ok(value == Value::Active)
    }

    fn pgd_input(&mut self) -> Result<()> {
        self.reconfigure(true)
    }

    fn pgd_output(&mut self) -> Result<()> {
        self.reconfigure(false)
    }

    // thread::sleep overshoots by tens of microseconds, so short delays busy-wait
    fn delay_us(&mut self, us: u32) {
        let duration = Duration::from_micros(us as u64);
        if us >= SPIN_LIMIT_US {
            std::thread::sleep(duration);
            return;
        }
        let start = Instant::now();
        while start.elapsed() < duration {
            std::hint::spin_loop();
        }
    }
}
