use std::{convert::TryFrom, fmt};

use num_enum::TryFromPrimitive;

/// Sense key, ASC and ASCQ as reported in fixed-format sense data.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub struct SenseTriple(pub u8, pub u8, pub u8);

/// Fixed-format sense data needs at least this many bytes for the ASC/ASCQ
/// pair to be present.
pub const MIN_SENSE_LEN: usize = 14;

#[derive(Debug, Eq, PartialEq, Clone, Copy, TryFromPrimitive)]
#[repr(u8)]
pub enum SenseKey {
    NoSense = 0x0,
    RecoveredError = 0x1,
    NotReady = 0x2,
    MediumError = 0x3,
    HardwareError = 0x4,
    IllegalRequest = 0x5,
    UnitAttention = 0x6,
    DataProtect = 0x7,
    BlankCheck = 0x8,
    VendorSpecific = 0x9,
    CopyAborted = 0xa,
    AbortedCommand = 0xb,
    VolumeOverflow = 0xd,
    Miscompare = 0xe,
}

impl SenseTriple {
    /// Pull the triple out of a fixed-format sense buffer. Only offsets 2,
    /// 12 and 13 are looked at.
    pub fn from_fixed_sense(buf: &[u8]) -> Option<Self> {
        if buf.len() < MIN_SENSE_LEN {
            return None;
        }
        Some(Self(buf[2] & 0x0f, buf[12], buf[13]))
    }

    #[cfg(test)]
    pub fn to_fixed_sense(self) -> Vec<u8> {
        vec![
            0x70,   // response code (fixed, current); valid bit (0)
            0x0,    // reserved
            self.0, // sk; various upper bits 0
            0x0, 0x0, 0x0, 0x0, // information
            0xa, // add'l sense length
            0x0, 0x0, 0x0, 0x0,    // cmd-specific information
            self.1, // asc
            self.2, // ascq
            0x0,    // field-replacable unit code
            0x0, 0x0, 0x0, // sense-key-sepcific information
        ]
    }

    /// `key << 16 | asc << 8 | ascq`; zero means no error.
    pub const fn code(self) -> u32 {
        ((self.0 as u32 & 0x0f) << 16) | ((self.1 as u32) << 8) | self.2 as u32
    }

    pub const fn key(self) -> u8 {
        self.0
    }

    pub const fn asc(self) -> u8 {
        self.1
    }

    pub const fn ascq(self) -> u8 {
        self.2
    }
}

impl fmt::Display for SenseTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}/{:02x}/{:02x}", self.0, self.1, self.2)
    }
}

impl SenseKey {
    pub fn name(key: u8) -> &'static str {
        match Self::try_from(key) {
            Ok(Self::NoSense) => "NO SENSE",
            Ok(Self::RecoveredError) => "RECOVERED ERROR",
            Ok(Self::NotReady) => "NOT READY",
            Ok(Self::MediumError) => "MEDIUM ERROR",
            Ok(Self::HardwareError) => "HARDWARE ERROR",
            Ok(Self::IllegalRequest) => "ILLEGAL REQUEST",
            Ok(Self::UnitAttention) => "UNIT ATTENTION",
            Ok(Self::DataProtect) => "DATA PROTECT",
            Ok(Self::BlankCheck) => "BLANK CHECK",
            Ok(Self::VendorSpecific) => "VENDOR SPECIFIC",
            Ok(Self::CopyAborted) => "COPY ABORTED",
            Ok(Self::AbortedCommand) => "ABORTED COMMAND",
            Ok(Self::VolumeOverflow) => "VOLUME OVERFLOW",
            Ok(Self::Miscompare) => "MISCOMPARE",
            Err(_) => "RESERVED",
        }
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum Retry {
    /// The unit is on its way to ready, or busy with a command it
    /// accepted in immediate mode; keep polling.
    Poll,
    Fatal,
}

#[derive(Debug)]
pub struct SenseEntry {
    pub code: u32,
    pub description: &'static str,
    pub retry: Retry,
}

const fn entry(key: u8, asc: u8, ascq: u8, description: &'static str, retry: Retry) -> SenseEntry {
    SenseEntry {
        code: SenseTriple(key, asc, ascq).code(),
        description,
        retry,
    }
}

const NOT_READY: u8 = SenseKey::NotReady as u8;
const MEDIUM_ERROR: u8 = SenseKey::MediumError as u8;
const HARDWARE_ERROR: u8 = SenseKey::HardwareError as u8;
const ILLEGAL_REQUEST: u8 = SenseKey::IllegalRequest as u8;
const UNIT_ATTENTION: u8 = SenseKey::UnitAttention as u8;
const DATA_PROTECT: u8 = SenseKey::DataProtect as u8;
const BLANK_CHECK: u8 = SenseKey::BlankCheck as u8;
const ABORTED_COMMAND: u8 = SenseKey::AbortedCommand as u8;

// Sorted by combined code; `lookup` binary searches it.
static SENSE_TABLE: &[SenseEntry] = &[
    entry(NOT_READY, 0x04, 0x00, "logical unit not ready, cause not reportable", Retry::Fatal),
    entry(NOT_READY, 0x04, 0x01, "logical unit is in process of becoming ready", Retry::Poll),
    entry(NOT_READY, 0x04, 0x02, "logical unit not ready, initializing command required", Retry::Fatal),
    entry(NOT_READY, 0x04, 0x03, "logical unit not ready, manual intervention required", Retry::Fatal),
    entry(NOT_READY, 0x04, 0x04, "logical unit not ready, format in progress", Retry::Fatal),
    entry(NOT_READY, 0x04, 0x07, "logical unit not ready, operation in progress", Retry::Poll),
    entry(NOT_READY, 0x04, 0x08, "logical unit not ready, long write in progress", Retry::Poll),
    entry(NOT_READY, 0x30, 0x00, "incompatible medium installed", Retry::Fatal),
    entry(NOT_READY, 0x3a, 0x00, "medium not present", Retry::Fatal),
    entry(NOT_READY, 0x3a, 0x01, "medium not present, tray closed", Retry::Fatal),
    entry(NOT_READY, 0x3a, 0x02, "medium not present, tray open", Retry::Fatal),
    entry(MEDIUM_ERROR, 0x0c, 0x00, "write error", Retry::Fatal),
    entry(MEDIUM_ERROR, 0x11, 0x00, "unrecovered read error", Retry::Fatal),
    entry(MEDIUM_ERROR, 0x73, 0x03, "power calibration area error", Retry::Fatal),
    entry(HARDWARE_ERROR, 0x08, 0x00, "logical unit communication failure", Retry::Fatal),
    entry(HARDWARE_ERROR, 0x44, 0x00, "internal target failure", Retry::Fatal),
    entry(ILLEGAL_REQUEST, 0x1a, 0x00, "parameter list length error", Retry::Fatal),
    entry(ILLEGAL_REQUEST, 0x20, 0x00, "invalid command operation code", Retry::Fatal),
    entry(ILLEGAL_REQUEST, 0x21, 0x00, "logical block address out of range", Retry::Fatal),
    entry(ILLEGAL_REQUEST, 0x21, 0x02, "invalid address for write", Retry::Fatal),
    entry(ILLEGAL_REQUEST, 0x24, 0x00, "invalid field in cdb", Retry::Fatal),
    entry(ILLEGAL_REQUEST, 0x26, 0x00, "invalid field in parameter list", Retry::Fatal),
    entry(ILLEGAL_REQUEST, 0x2c, 0x00, "command sequence error", Retry::Fatal),
    entry(ILLEGAL_REQUEST, 0x30, 0x05, "cannot write medium, incompatible format", Retry::Fatal),
    entry(ILLEGAL_REQUEST, 0x64, 0x00, "illegal mode for this track", Retry::Fatal),
    entry(UNIT_ATTENTION, 0x28, 0x00, "not ready to ready change, medium may have changed", Retry::Poll),
    entry(UNIT_ATTENTION, 0x29, 0x00, "power on, reset, or bus device reset occurred", Retry::Poll),
    entry(DATA_PROTECT, 0x27, 0x00, "write protected", Retry::Fatal),
    entry(BLANK_CHECK, 0x00, 0x00, "blank check", Retry::Fatal),
    entry(ABORTED_COMMAND, 0x00, 0x00, "command aborted", Retry::Fatal),
];

pub const UNSPECIFIED: &str = "unspecified";

pub fn lookup(code: u32) -> Option<&'static SenseEntry> {
    SENSE_TABLE
        .binary_search_by_key(&code, |e| e.code)
        .ok()
        .map(|i| &SENSE_TABLE[i])
}

/// What a sense buffer says about the command it was returned for.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum Interpretation {
    Good,
    Condition {
        triple: SenseTriple,
        description: &'static str,
        retry: Retry,
    },
}

impl Interpretation {
    pub const fn code(&self) -> u32 {
        match self {
            Self::Good => 0,
            Self::Condition { triple, .. } => (*triple).code(),
        }
    }
}

/// Decode fixed-format sense data. Returns `None` if the buffer is too short
/// to hold ASC/ASCQ.
pub fn interpret(buf: &[u8]) -> Option<Interpretation> {
    let triple = SenseTriple::from_fixed_sense(buf)?;
    if triple.key() == SenseKey::NoSense as u8 {
        return Some(Interpretation::Good);
    }
    Some(match lookup(triple.code()) {
        Some(e) => Interpretation::Condition {
            triple,
            description: e.description,
            retry: e.retry,
        },
        None => Interpretation::Condition {
            triple,
            description: UNSPECIFIED,
            retry: Retry::Fatal,
        },
    })
}
