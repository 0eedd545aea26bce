use std::{io, path::PathBuf};

use thiserror::Error;
use vmm_sys_util::errno;

use crate::scsi::sense::SenseKey;

pub type Result<T> = std::result::Result<T, Error>;

/// Raw device-error codes. These double as the process exit code.
pub const DEVICE_UNAVAILABLE: i32 = -1;
pub const TRANSPORT_FAILURE: i32 = -2;
pub const COMMAND_FAILED: i32 = -3;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot open device {}: {source}", .path.display())]
    DeviceUnavailable { path: PathBuf, source: io::Error },

    /// The SG_IO ioctl itself failed, or the command timed out.
    #[error("{command}: SCSI transport failure: {errno}")]
    TransportFailure {
        command: &'static str,
        errno: errno::Error,
    },

    #[error(
        "{command} failed: status {status:#04x}, host status {host_status:#06x}, \
         driver status {driver_status:#06x}, info {info:#x}"
    )]
    CommandFailed {
        command: &'static str,
        status: u8,
        host_status: u16,
        driver_status: u16,
        info: u32,
        sense: Vec<u8>,
    },

    #[error("{}: {description} ({key:x}/{asc:02x}/{ascq:02x})", key_name(.key))]
    SenseDecoded {
        key: u8,
        asc: u8,
        ascq: u8,
        description: &'static str,
    },

    #[error("drive did not become ready after {polls} polls")]
    NotReady { polls: u32 },

    #[error("Device is not a CD/DVD drive (peripheral device type {device_type:#04x}).")]
    NotACdDrive { device_type: u8 },

    #[error("drive cannot write CD-R media")]
    NoWriteSupport,

    #[error("disc in drive is not blank (disc status {status})")]
    MediumNotBlank { status: u8 },

    #[error("drive reports no writable address for the next track")]
    NoWritableAddress,

    #[error("cannot read {}: {source}", .path.display())]
    TocRead { path: PathBuf, source: io::Error },

    #[error("{}:{line}: {reason}", .path.display())]
    TocParseFailure {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("No tracks found in CUE file.")]
    NoTracks,

    #[error("track {track:02}: transcoding failed: {reason}")]
    TranscodeFailure { track: usize, reason: String },

    #[error("cannot read PCM data from {}: {source}", .path.display())]
    Pcm { path: PathBuf, source: io::Error },

    #[error("cannot create temporary work directory: {0}")]
    WorkDir(errno::Error),
}

fn key_name(key: &u8) -> &'static str {
    SenseKey::name(*key)
}

impl Error {
    /// The raw device-error code, if this error came from talking to the
    /// device.
    pub const fn device_code(&self) -> Option<i32> {
        match self {
            Self::DeviceUnavailable { .. } => Some(DEVICE_UNAVAILABLE),
            Self::TransportFailure { .. } => Some(TRANSPORT_FAILURE),
            Self::CommandFailed { .. } | Self::SenseDecoded { .. } | Self::NotReady { .. } => {
                Some(COMMAND_FAILED)
            }
            _ => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.device_code().unwrap_or(1)
    }
}

/// Explanation printed by `--get-error`.
///
/// Positive codes are taken as the byte a shell reports after we exited with
/// a negative code, so 255 reads as -1.
pub fn describe_error_code(code: i32) -> &'static str {
    let code = if code > 0 {
        i32::from(code as u8 as i8)
    } else {
        code
    };
    match code {
        DEVICE_UNAVAILABLE => "Error opening device. This could mean that the device does not exist, or that you do not have permission to access it.",
        TRANSPORT_FAILURE => "Error sending SCSI command. This could mean that the device does not support the command, or that the command is invalid.",
        COMMAND_FAILED => "Error getting SCSI response. This could mean that the device did not respond, or that the response is invalid.",
        _ => "Unknown error code.",
    }
}
