use std::cmp::min;

use num_enum::TryFromPrimitive;

use super::RESPONSE_CAPACITY;

pub const MAX_CDB_LEN: usize = 12;

#[derive(PartialEq, Eq, Hash, TryFromPrimitive, Debug, Copy, Clone)]
#[repr(u8)]
pub enum Opcode {
    TestUnitReady = 0x00,
    RequestSense = 0x03,
    Inquiry = 0x12,
    ModeSense6 = 0x1a,
    StartStopUnit = 0x1b,
    ReadCapacity10 = 0x25,
    Write10 = 0x2a,
    SynchronizeCache10 = 0x35,
    ReadDiscInformation = 0x51,
    ReadTrackInformation = 0x52,
    ModeSelect10 = 0x55,
    CloseTrackSession = 0x5b,
    SetCdSpeed = 0xbb,
}

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum Direction {
    None,
    FromDevice,
    ToDevice,
}

/// How a command is shaped on the wire.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct CommandInfo {
    pub name: &'static str,
    pub cdb_len: usize,
    pub direction: Direction,
    /// Allocation length asked for by data-in commands.
    pub response_len: usize,
}

const fn info(
    name: &'static str,
    cdb_len: usize,
    direction: Direction,
    response_len: usize,
) -> CommandInfo {
    CommandInfo {
        name,
        cdb_len,
        direction,
        response_len,
    }
}

impl Opcode {
    pub const fn info(self) -> CommandInfo {
        match self {
            Self::TestUnitReady => info("TEST UNIT READY", 6, Direction::None, 0),
            Self::RequestSense => info("REQUEST SENSE", 6, Direction::FromDevice, 18),
            Self::Inquiry => info("INQUIRY", 6, Direction::FromDevice, 36),
            Self::ModeSense6 => info("MODE SENSE(6)", 6, Direction::FromDevice, RESPONSE_CAPACITY),
            Self::StartStopUnit => info("START STOP UNIT", 6, Direction::None, 0),
            Self::ReadCapacity10 => info("READ CAPACITY(10)", 10, Direction::FromDevice, 8),
            Self::Write10 => info("WRITE(10)", 10, Direction::ToDevice, 0),
            Self::SynchronizeCache10 => info("SYNCHRONIZE CACHE(10)", 10, Direction::None, 0),
            Self::ReadDiscInformation => info("READ DISC INFORMATION", 10, Direction::FromDevice, 34),
            Self::ReadTrackInformation => {
                info("READ TRACK INFORMATION", 10, Direction::FromDevice, 36)
            }
            Self::ModeSelect10 => info("MODE SELECT(10)", 10, Direction::ToDevice, 0),
            Self::CloseTrackSession => info("CLOSE TRACK/SESSION", 10, Direction::None, 0),
            Self::SetCdSpeed => info("SET CD SPEED", 12, Direction::None, 0),
        }
    }
}

/// Display name for a raw opcode byte, for logging commands we didn't build.
pub fn opcode_name(opcode: u8) -> &'static str {
    Opcode::try_from_primitive(opcode).map_or("UNKNOWN", |op| op.info().name)
}

/// One fully-formed CDB, ready to hand to a [`Transport`](super::Transport).
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct CommandDescriptor {
    opcode: Opcode,
    cdb: [u8; MAX_CDB_LEN],
}

// Values for the CLOSE TRACK/SESSION close function field.
const CLOSE_TRACK: u8 = 0b001;
const CLOSE_SESSION: u8 = 0b010;
// IMMED sits in bit 0 of byte 1 for CLOSE TRACK/SESSION, bit 1 for
// SYNCHRONIZE CACHE.
const CLOSE_IMMED: u8 = 0b01;
const SYNC_IMMED: u8 = 0b10;

impl CommandDescriptor {
    fn new(opcode: Opcode) -> Self {
        let mut cdb = [0; MAX_CDB_LEN];
        cdb[0] = opcode as u8;
        Self { opcode, cdb }
    }

    #[cfg(test)]
    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn cdb(&self) -> &[u8] {
        &self.cdb[..self.opcode.info().cdb_len]
    }

    pub const fn name(&self) -> &'static str {
        self.opcode.info().name
    }

    pub const fn direction(&self) -> Direction {
        self.opcode.info().direction
    }

    /// Bytes the device is expected to return; never more than
    /// [`RESPONSE_CAPACITY`].
    pub fn response_len(&self) -> usize {
        min(self.opcode.info().response_len, RESPONSE_CAPACITY)
    }

    pub fn test_unit_ready() -> Self {
        Self::new(Opcode::TestUnitReady)
    }

    /// Fixed-format sense, 18 bytes.
    pub fn request_sense() -> Self {
        let mut ret = Self::new(Opcode::RequestSense);
        ret.cdb[4] = ret.alloc_len_u8();
        ret
    }

    /// Standard INQUIRY data (no VPD page).
    pub fn inquiry() -> Self {
        let mut ret = Self::new(Opcode::Inquiry);
        let len = ret.alloc_len_u16();
        ret.cdb[3..5].copy_from_slice(&len.to_be_bytes());
        ret
    }

    /// MODE SENSE(6) of the current values of `page`, without block
    /// descriptors.
    pub fn mode_sense6(page: u8) -> Self {
        let mut ret = Self::new(Opcode::ModeSense6);
        ret.cdb[1] = 0b0000_1000; // DBD
        ret.cdb[2] = page & 0b0011_1111; // PC = current
        ret.cdb[4] = ret.alloc_len_u8();
        ret
    }

    pub fn start_stop_unit(start: bool, load_eject: bool) -> Self {
        let mut ret = Self::new(Opcode::StartStopUnit);
        ret.cdb[4] = u8::from(load_eject) << 1 | u8::from(start);
        ret
    }

    pub fn read_disc_information() -> Self {
        let mut ret = Self::new(Opcode::ReadDiscInformation);
        let len = ret.alloc_len_u16();
        ret.cdb[7..9].copy_from_slice(&len.to_be_bytes());
        ret
    }

    /// READ TRACK INFORMATION addressed by logical track number. 0xff names
    /// the invisible (next to be written) track.
    pub fn read_track_information(track: u32) -> Self {
        let mut ret = Self::new(Opcode::ReadTrackInformation);
        ret.cdb[1] = 0b01; // address/number type: track number
        ret.cdb[2..6].copy_from_slice(&track.to_be_bytes());
        let len = ret.alloc_len_u16();
        ret.cdb[7..9].copy_from_slice(&len.to_be_bytes());
        ret
    }

    /// MODE SELECT(10) with the page format bit set; the parameter list goes
    /// in the data-out phase.
    pub fn mode_select10(parameter_list_len: u16) -> Self {
        let mut ret = Self::new(Opcode::ModeSelect10);
        ret.cdb[1] = 0b0001_0000; // PF
        ret.cdb[7..9].copy_from_slice(&parameter_list_len.to_be_bytes());
        ret
    }

    pub fn write10(lba: u32, blocks: u16) -> Self {
        let mut ret = Self::new(Opcode::Write10);
        ret.cdb[2..6].copy_from_slice(&lba.to_be_bytes());
        ret.cdb[7..9].copy_from_slice(&blocks.to_be_bytes());
        ret
    }

    /// Last recorded LBA and block length of the medium.
    pub fn read_capacity10() -> Self {
        Self::new(Opcode::ReadCapacity10)
    }

    /// Flush the whole drive cache to the medium. IMMED is set: the drive
    /// answers at once and reports "long write in progress" until done.
    pub fn synchronize_cache() -> Self {
        let mut ret = Self::new(Opcode::SynchronizeCache10);
        ret.cdb[1] = SYNC_IMMED;
        ret
    }

    /// Also sent with IMMED set; poll for completion afterwards.
    pub fn close_track(track: u16) -> Self {
        let mut ret = Self::new(Opcode::CloseTrackSession);
        ret.cdb[1] = CLOSE_IMMED;
        ret.cdb[2] = CLOSE_TRACK;
        ret.cdb[4..6].copy_from_slice(&track.to_be_bytes());
        ret
    }

    /// Writes lead-in and lead-out, which can take minutes; IMMED is set.
    pub fn close_session() -> Self {
        let mut ret = Self::new(Opcode::CloseTrackSession);
        ret.cdb[1] = CLOSE_IMMED;
        ret.cdb[2] = CLOSE_SESSION;
        ret
    }

    /// Read speed is left at the drive maximum.
    pub fn set_cd_speed(write_kbps: u16) -> Self {
        let mut ret = Self::new(Opcode::SetCdSpeed);
        ret.cdb[2..4].copy_from_slice(&0xffff_u16.to_be_bytes());
        ret.cdb[4..6].copy_from_slice(&write_kbps.to_be_bytes());
        ret
    }

    // response_len() is capped at RESPONSE_CAPACITY, which fits in a byte
    fn alloc_len_u8(&self) -> u8 {
        self.response_len() as u8
    }

    fn alloc_len_u16(&self) -> u16 {
        self.response_len() as u16
    }
}
