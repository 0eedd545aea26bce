//! Linux SCSI generic (`/dev/sg*`) transport.
//!
//! See the sg3_utils HOWTO for the `sg_io_hdr` layout and semantics:
//! <https://tldp.org/HOWTO/SCSI-Generic-HOWTO/sg_io_hdr_t.html>

use std::{
    convert::TryFrom,
    fs::{File, OpenOptions},
    os::raw::{c_int, c_uchar, c_uint, c_ulong, c_ushort, c_void},
    path::{Path, PathBuf},
    ptr,
};

use log::debug;
use vmm_sys_util::{errno, ioctl::ioctl_with_mut_ref};

use super::{
    command::{opcode_name, CommandDescriptor, Direction},
    CommandResult, Transport, COMMAND_TIMEOUT, RESPONSE_CAPACITY, SENSE_CAPACITY,
};
use crate::error::{Error, Result};

const SG_IO: c_ulong = 0x2285;

const SG_DXFER_NONE: c_int = -1;
const SG_DXFER_TO_DEV: c_int = -2;
const SG_DXFER_FROM_DEV: c_int = -3;

const SG_INFO_OK_MASK: c_uint = 0x1;
const SG_INFO_OK: c_uint = 0x0;

// host_status / driver_status values that mean the command timed out
const DID_TIME_OUT: c_ushort = 0x03;
const DRIVER_TIMEOUT: c_ushort = 0x06;
const DRIVER_STATUS_MASK: c_ushort = 0x0f;

const ETIMEDOUT: c_int = 110;

#[repr(C)]
struct SgIoHdr {
    interface_id: c_int,
    dxfer_direction: c_int,
    cmd_len: c_uchar,
    mx_sb_len: c_uchar,
    iovec_count: c_ushort,
    dxfer_len: c_uint,
    dxferp: *mut c_void,
    cmdp: *mut c_uchar,
    sbp: *mut c_uchar,
    timeout: c_uint,
    flags: c_uint,
    pack_id: c_int,
    usr_ptr: *mut c_void,
    status: c_uchar,
    masked_status: c_uchar,
    msg_status: c_uchar,
    sb_len_wr: c_uchar,
    host_status: c_ushort,
    driver_status: c_ushort,
    resid: c_int,
    duration: c_uint,
    info: c_uint,
}

/// Talks to one SCSI generic node. The node is opened and closed around every
/// command; nothing is held between calls.
#[derive(Debug)]
pub struct SgTransport {
    path: PathBuf,
}

impl SgTransport {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_owned(),
        }
    }

    fn open(&self) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|source| Error::DeviceUnavailable {
                path: self.path.clone(),
                source,
            })
    }
}

impl Transport for SgTransport {
    fn send(&mut self, cmd: &CommandDescriptor, data_out: &[u8]) -> Result<CommandResult> {
        let mut cdb = cmd.cdb().to_vec();
        let mut response = [0_u8; RESPONSE_CAPACITY];
        let mut sense = [0_u8; SENSE_CAPACITY];

        let (dxfer_direction, dxferp, dxfer_len) = match cmd.direction() {
            Direction::None => (SG_DXFER_NONE, ptr::null_mut(), 0),
            Direction::FromDevice => (
                SG_DXFER_FROM_DEV,
                response.as_mut_ptr().cast::<c_void>(),
                cmd.response_len(),
            ),
            // the kernel only reads from dxferp in this direction
            Direction::ToDevice => (
                SG_DXFER_TO_DEV,
                data_out.as_ptr() as *mut c_void,
                data_out.len(),
            ),
        };

        let mut hdr = SgIoHdr {
            interface_id: c_int::from(b'S'),
            dxfer_direction,
            cmd_len: cdb.len() as c_uchar,
            mx_sb_len: SENSE_CAPACITY as c_uchar,
            iovec_count: 0,
            dxfer_len: c_uint::try_from(dxfer_len).unwrap_or(c_uint::MAX),
            dxferp,
            cmdp: cdb.as_mut_ptr(),
            sbp: sense.as_mut_ptr(),
            timeout: COMMAND_TIMEOUT.as_millis() as c_uint,
            flags: 0,
            pack_id: 0,
            usr_ptr: ptr::null_mut(),
            status: 0,
            masked_status: 0,
            msg_status: 0,
            sb_len_wr: 0,
            host_status: 0,
            driver_status: 0,
            resid: 0,
            duration: 0,
            info: 0,
        };

        debug!(
            "{}: cdb {:02x?}, {} bytes out",
            opcode_name(cdb[0]),
            &cdb,
            if cmd.direction() == Direction::ToDevice {
                data_out.len()
            } else {
                0
            }
        );

        let file = self.open()?;
        // SAFETY: every pointer in `hdr` refers to a live buffer of at least
        // the length recorded next to it, and all of them outlive the call.
        let ret = unsafe { ioctl_with_mut_ref(&file, SG_IO, &mut hdr) };
        let last_error = errno::Error::last();
        drop(file);

        if ret < 0 {
            return Err(Error::TransportFailure {
                command: cmd.name(),
                errno: last_error,
            });
        }

        debug!(
            "{}: status {:#04x}, host {:#06x}, driver {:#06x}, {} ms",
            cmd.name(),
            hdr.status,
            hdr.host_status,
            hdr.driver_status,
            hdr.duration
        );

        if hdr.host_status == DID_TIME_OUT
            || hdr.driver_status & DRIVER_STATUS_MASK == DRIVER_TIMEOUT
        {
            return Err(Error::TransportFailure {
                command: cmd.name(),
                errno: errno::Error::new(ETIMEDOUT),
            });
        }

        if hdr.info & SG_INFO_OK_MASK != SG_INFO_OK {
            let sense_len = usize::from(hdr.sb_len_wr).min(SENSE_CAPACITY);
            return Err(Error::CommandFailed {
                command: cmd.name(),
                status: hdr.status,
                host_status: hdr.host_status,
                driver_status: hdr.driver_status,
                info: hdr.info,
                sense: sense[..sense_len].to_vec(),
            });
        }

        Ok(CommandResult::good(
            response[..cmd.response_len()].to_vec(),
        ))
    }
}
