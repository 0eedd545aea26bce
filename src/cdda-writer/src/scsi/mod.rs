pub mod command;
pub mod ready;
pub mod sense;
#[cfg(target_os = "linux")]
pub mod sg;
#[cfg(test)]
pub(crate) mod tests;

use std::time::Duration;

use num_enum::TryFromPrimitive;

use self::command::CommandDescriptor;
use crate::error::Result;

/// Data-in responses never exceed this many bytes.
pub const RESPONSE_CAPACITY: usize = 96;
pub const SENSE_CAPACITY: usize = 32;
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(20);

pub const STATUS_GOOD: u8 = 0x00;
pub const STATUS_CHECK_CONDITION: u8 = 0x02;

/// Outcome of a command that completed with GOOD status.
#[derive(Debug, PartialEq, Eq)]
pub struct CommandResult {
    pub status: u8,
    /// Exactly `response_len()` bytes of the descriptor that produced it.
    pub response: Vec<u8>,
    pub sense: Vec<u8>,
}

impl CommandResult {
    pub const fn good(response: Vec<u8>) -> Self {
        Self {
            status: STATUS_GOOD,
            response,
            sense: Vec::new(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, TryFromPrimitive)]
#[repr(u8)] // actually 5 bits
#[allow(dead_code)]
pub enum DeviceType {
    DirectAccessBlock = 0x0,
    SequentialAccess = 0x1,
    Processor = 0x3,
    WriteOnce = 0x4,
    CdDvd = 0x5,
    OpticalMemory = 0x7,
    MediaChanger = 0x8,
    StorageArrayController = 0xc,
    EnclosureServices = 0xd,
    SimplifiedDirectAccess = 0xe,
    OpticalCardReaderWriter = 0xf,
    ObjectBasedStorage = 0x11,
}

/// A synchronous command channel to one SCSI device.
///
/// Implementations must not keep the device open between calls, so at most
/// one command is ever in flight.
pub trait Transport {
    /// Issue `cmd`. `data_out` is only looked at for commands that move data
    /// to the device.
    ///
    /// A command that completes with anything but GOOD status comes back as
    /// [`Error::CommandFailed`](crate::error::Error::CommandFailed), carrying
    /// whatever sense data the device returned.
    fn send(&mut self, cmd: &CommandDescriptor, data_out: &[u8]) -> Result<CommandResult>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, cmd: &CommandDescriptor, data_out: &[u8]) -> Result<CommandResult> {
        (**self).send(cmd, data_out)
    }
}
