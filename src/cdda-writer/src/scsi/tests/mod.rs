#![cfg(test)]

mod sense;

use std::{
    collections::{HashMap, VecDeque},
    io,
    path::PathBuf,
};

use super::{
    command::{CommandDescriptor, Direction, Opcode},
    sense::SenseTriple,
    CommandResult, Transport, STATUS_CHECK_CONDITION,
};
use crate::error::{Error, Result};

pub(crate) const BECOMING_READY: SenseTriple = SenseTriple(0x2, 0x04, 0x01);
pub(crate) const MEDIUM_NOT_PRESENT: SenseTriple = SenseTriple(0x2, 0x3a, 0x00);
pub(crate) const POWER_ON_RESET: SenseTriple = SenseTriple(0x6, 0x29, 0x00);
pub(crate) const OPERATION_IN_PROGRESS: SenseTriple = SenseTriple(0x2, 0x04, 0x07);
pub(crate) const LONG_WRITE_IN_PROGRESS: SenseTriple = SenseTriple(0x2, 0x04, 0x08);
pub(crate) const INVALID_FIELD_IN_CDB: SenseTriple = SenseTriple(0x5, 0x24, 0x00);
pub(crate) const WRITE_ERROR: SenseTriple = SenseTriple(0x3, 0x0c, 0x00);

/// What the stub does with the next command of a given opcode.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    /// GOOD status with this data-in (zero-extended or cut to the requested
    /// length).
    Data(Vec<u8>),
    /// CHECK CONDITION with fixed-format sense.
    Check(SenseTriple),
    /// CHECK CONDITION, but the kernel delivered no usable sense bytes.
    ShortCheck,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Issued {
    pub cdb: Vec<u8>,
    pub data_out: Vec<u8>,
}

impl Issued {
    pub fn opcode(&self) -> u8 {
        self.cdb[0]
    }
}

/// A scripted device. Each opcode has a queue of replies; once it runs dry
/// the opcode's standing response is used, or an all-zero GOOD response.
/// Replies registered with `after` join the queue only once their trigger
/// CDB has been sent.
#[derive(Debug, Default)]
pub(crate) struct StubTransport {
    replies: HashMap<Opcode, VecDeque<Reply>>,
    standing: HashMap<Opcode, Vec<u8>>,
    armed: Vec<(Vec<u8>, Opcode, Reply)>,
    issued: Vec<Issued>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self, opcode: Opcode, reply: Reply) -> &mut Self {
        self.replies.entry(opcode).or_default().push_back(reply);
        self
    }

    pub fn after(
        &mut self,
        trigger: &CommandDescriptor,
        opcode: Opcode,
        reply: Reply,
    ) -> &mut Self {
        self.armed.push((trigger.cdb().to_vec(), opcode, reply));
        self
    }

    pub fn respond(&mut self, opcode: Opcode, data: Vec<u8>) -> &mut Self {
        self.standing.insert(opcode, data);
        self
    }

    pub fn issued(&self) -> &[Issued] {
        &self.issued
    }

    pub fn opcodes(&self) -> Vec<u8> {
        self.issued.iter().map(Issued::opcode).collect()
    }

    pub fn count(&self, opcode: Opcode) -> usize {
        self.issued
            .iter()
            .filter(|i| i.opcode() == opcode as u8)
            .count()
    }

    pub fn of(&self, opcode: Opcode) -> Vec<&Issued> {
        self.issued
            .iter()
            .filter(|i| i.opcode() == opcode as u8)
            .collect()
    }
}

fn check_condition(cmd: &CommandDescriptor, sense: Vec<u8>) -> Error {
    Error::CommandFailed {
        command: cmd.name(),
        status: STATUS_CHECK_CONDITION,
        host_status: 0,
        driver_status: 0x08, // DRIVER_SENSE
        info: 1,
        sense,
    }
}

fn fit(mut data: Vec<u8>, len: usize) -> Vec<u8> {
    data.resize(len, 0);
    data
}

impl Transport for StubTransport {
    fn send(&mut self, cmd: &CommandDescriptor, data_out: &[u8]) -> Result<CommandResult> {
        self.issued.push(Issued {
            cdb: cmd.cdb().to_vec(),
            data_out: if cmd.direction() == Direction::ToDevice {
                data_out.to_vec()
            } else {
                Vec::new()
            },
        });

        let reply = self
            .replies
            .get_mut(&cmd.opcode())
            .and_then(VecDeque::pop_front);

        let (fired, armed): (Vec<_>, Vec<_>) = self
            .armed
            .drain(..)
            .partition(|(trigger, _, _)| trigger.as_slice() == cmd.cdb());
        self.armed = armed;
        for (_, opcode, reply) in fired {
            self.queue(opcode, reply);
        }

        match reply {
            Some(Reply::Data(data)) => Ok(CommandResult::good(fit(data, cmd.response_len()))),
            Some(Reply::Check(triple)) => Err(check_condition(cmd, triple.to_fixed_sense())),
            Some(Reply::ShortCheck) => Err(check_condition(cmd, Vec::new())),
            Some(Reply::Unavailable) => Err(Error::DeviceUnavailable {
                path: PathBuf::from("/dev/sg-stub"),
                source: io::Error::from(io::ErrorKind::NotFound),
            }),
            None => {
                let data = self
                    .standing
                    .get(&cmd.opcode())
                    .cloned()
                    .unwrap_or_default();
                Ok(CommandResult::good(fit(data, cmd.response_len())))
            }
        }
    }
}

#[test]
fn test_stub_response_length() {
    let mut stub = StubTransport::new();
    stub.respond(Opcode::Inquiry, vec![0x05; 100]);

    let inquiry = stub.send(&CommandDescriptor::inquiry(), &[]).unwrap();
    assert_eq!(inquiry.response.len(), 36);
    let disc = stub
        .send(&CommandDescriptor::read_disc_information(), &[])
        .unwrap();
    assert_eq!(disc.response, vec![0; 34]);
    let tur = stub.send(&CommandDescriptor::test_unit_ready(), &[]).unwrap();
    assert!(tur.response.is_empty());
}

#[test]
fn test_stub_records_data_out() {
    let mut stub = StubTransport::new();
    stub.send(&CommandDescriptor::write10(7, 1), &[0xaa; 2352])
        .unwrap();
    // data-out handed to a no-data command is not sent
    stub.send(&CommandDescriptor::synchronize_cache(), &[1, 2, 3])
        .unwrap();

    assert_eq!(stub.issued()[0].data_out.len(), 2352);
    assert!(stub.issued()[1].data_out.is_empty());
    assert_eq!(stub.opcodes(), vec![0x2a, 0x35]);
}

#[test]
fn test_stub_arms_after_trigger() {
    let mut stub = StubTransport::new();
    stub.after(
        &CommandDescriptor::close_session(),
        Opcode::TestUnitReady,
        Reply::Check(BECOMING_READY),
    );
    let tur = CommandDescriptor::test_unit_ready();

    assert!(stub.send(&tur, &[]).is_ok());
    assert!(stub.send(&CommandDescriptor::close_track(1), &[]).is_ok());
    assert!(stub.send(&tur, &[]).is_ok());
    assert!(stub.send(&CommandDescriptor::close_session(), &[]).is_ok());
    assert!(stub.send(&tur, &[]).is_err());
    assert!(stub.send(&tur, &[]).is_ok());
}
