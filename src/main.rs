use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use pic24isp::constants::timing;
use pic24isp::format::read_firmware_from_file;
use pic24isp::{
    BitChannel, DeviceDB, DeviceProfile, DummyChannel, Flashing, GpioChannel, GpioChannelConfig,
    MemoryWord,
};

#[derive(Parser)]
#[command(
    name = "pic24isp",
    version,
    about = "Flash PIC24 MCUs over ICSP, bit-banged on Linux GPIO lines"
)]
struct Cli {
    #[command(flatten)]
    opts: Options,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Options {
    /// GPIO character device the ICSP lines are on
    #[arg(long, global = true, default_value = "/dev/gpiochip0")]
    gpiochip: String,

    /// Line offset of MCLR
    #[arg(long, global = true, default_value_t = 2)]
    mclr: u32,

    /// Line offset of PGC
    #[arg(long, global = true, default_value_t = 3)]
    pgc: u32,

    /// Line offset of PGD
    #[arg(long, global = true, default_value_t = 4)]
    pgd: u32,

    /// Delay around each clock edge, in microseconds
    #[arg(long, global = true, default_value_t = timing::PERIOD_US)]
    period_us: u32,

    /// Give up on a flash operation after this many status polls
    #[arg(long, global = true)]
    poll_limit: Option<u32>,

    /// Do not touch any hardware, run the protocol against a dummy channel
    #[arg(long, global = true)]
    dry_run: bool,

    /// Increase log verbosity, -vv for every wire frame
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// List supported devices
    List,
    /// Read the device id of the connected chip
    Info {
        /// Device name, see `list`
        device: String,
    },
    /// Erase all program memory
    Erase { device: String },
    /// Erase, program and verify a hex file
    Flash { device: String, path: PathBuf },
    /// Verify memory against a hex file
    Verify { device: String, path: PathBuf },
}

impl Command {
    fn device(&self) -> Option<&str> {
        match self {
            Command::List => None,
            Command::Info { device }
            | Command::Erase { device }
            | Command::Flash { device, .. }
            | Command::Verify { device, .. } => Some(device),
        }
    }

    fn firmware(&self) -> Option<&PathBuf> {
        match self {
            Command::Flash { path, .. } | Command::Verify { path, .. } => Some(path),
            _ => None,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.opts.verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let _ = simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let db = DeviceDB::load()?;
    let Some(name) = cli.command.device() else {
        for family in db.families() {
            println!("{}: {}", family.name, family.description);
            for variant in &family.variants {
                println!(" * {}", db.find(&variant.name)?);
            }
        }
        return Ok(());
    };
    let device = db.find(name)?;

    // parse failures must never reach the hardware
    let firmware = cli
        .command
        .firmware()
        .map(read_firmware_from_file)
        .transpose()?
        .unwrap_or_default();

    if cli.opts.dry_run {
        log::info!("Dry run, no hardware is accessed");
        run(DummyChannel::new(), device, &cli.opts, &cli.command, &firmware)
    } else {
        let config = GpioChannelConfig {
            chip: cli.opts.gpiochip.clone(),
            mclr: cli.opts.mclr,
            pgc: cli.opts.pgc,
            pgd: cli.opts.pgd,
        };
        run(
            GpioChannel::open(&config)?,
            device,
            &cli.opts,
            &cli.command,
            &firmware,
        )
    }
}

fn run<C: BitChannel>(
    channel: C,
    device: DeviceProfile,
    opts: &Options,
    command: &Command,
    firmware: &[MemoryWord],
) -> Result<()> {
    log::info!("Target: {}", device);
    let mut flashing =
        Flashing::new(channel, device, opts.period_us)?.with_poll_limit(opts.poll_limit);

    match command {
        Command::List => (),
        Command::Info { .. } => {
            let id = flashing.read_device_id()?;
            log::info!("Device ID: {}", id);
        }
        Command::Erase { .. } => {
            flashing.erase_chip()?;
        }
        Command::Flash { .. } => {
            let id = flashing.read_device_id()?;
            log::info!("Device ID: {}", id);
            flashing.erase_chip()?;
            flashing.program(firmware)?;
            report(flashing.verify(firmware)?);
        }
        Command::Verify { .. } => {
            report(flashing.verify(firmware)?);
        }
    }

    flashing.finish()
}

fn report(mismatches: usize) {
    if mismatches == 0 {
        log::info!("Verified!");
    } else {
        log::warn!("{} words differ from the firmware", mismatches);
    }
}
