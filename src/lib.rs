//! PIC24 ICSP programmer over bit-banged GPIO lines.

pub mod channel;
pub mod constants;
pub mod device;
pub mod flashing;
pub mod format;
pub mod icsp;
pub mod image;
pub mod instruction;

pub use self::channel::{BitChannel, DummyChannel, GpioChannel, GpioChannelConfig};
pub use self::device::{DeviceDB, DeviceProfile};
pub use self::flashing::{DeviceId, Flashing};
pub use self::format::{HexError, HexFile, MemoryWord};
pub use self::icsp::IcspSession;
pub use self::image::{ConfigWord, ProgramImage};
pub use self::instruction::Instruction;
