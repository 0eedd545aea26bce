use std::{thread, time::Duration};

use log::{debug, info};

use super::{
    command::CommandDescriptor,
    sense::{self, Interpretation, Retry, SenseTriple},
    Transport, STATUS_CHECK_CONDITION,
};
use crate::error::{Error, Result};

/// Bounds on how long we wait for a drive that reports it is becoming ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_polls: 120,
        }
    }
}

impl PollPolicy {
    /// Bounds for waiting out a cache flush or a track/session close. Closing
    /// a session writes the lead-in and lead-out and can take minutes.
    pub const fn completion() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_polls: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready {
    /// TEST UNIT READY commands issued after the first one.
    pub polls: u32,
}

fn fatal(triple: SenseTriple, description: &'static str) -> Error {
    Error::SenseDecoded {
        key: triple.key(),
        asc: triple.asc(),
        ascq: triple.ascq(),
        description,
    }
}

/// Turn a failed command into a sense interpretation. If the kernel handed
/// back too little sense data, ask the drive for it with REQUEST SENSE.
fn sense_of<T: Transport + ?Sized>(transport: &mut T, err: Error) -> Result<Interpretation> {
    let sense = match &err {
        Error::CommandFailed { status, sense, .. } if *status == STATUS_CHECK_CONDITION => sense,
        _ => return Err(err),
    };
    if let Some(interpretation) = sense::interpret(sense) {
        return Ok(interpretation);
    }

    debug!("only {} sense bytes returned; issuing REQUEST SENSE", sense.len());
    let result = transport.send(&CommandDescriptor::request_sense(), &[])?;
    sense::interpret(&result.response).ok_or(err)
}

fn test_unit_ready<T: Transport + ?Sized>(transport: &mut T) -> Result<Interpretation> {
    let interpretation = match transport.send(&CommandDescriptor::test_unit_ready(), &[]) {
        Ok(_) => Interpretation::Good,
        Err(err) => sense_of(transport, err)?,
    };
    debug!("TEST UNIT READY: sense code {:#07x}", interpretation.code());
    Ok(interpretation)
}

/// Wait for the drive to report ready.
///
/// A transient "becoming ready" condition gets one START UNIT and then up to
/// `policy.max_polls` further TEST UNIT READYs, `policy.interval` apart. Any
/// other condition is fatal.
pub fn negotiate<T: Transport + ?Sized>(transport: &mut T, policy: &PollPolicy) -> Result<Ready> {
    let (mut current, description) = match test_unit_ready(transport)? {
        Interpretation::Good => return Ok(Ready { polls: 0 }),
        Interpretation::Condition {
            triple,
            description,
            retry: Retry::Fatal,
        } => return Err(fatal(triple, description)),
        Interpretation::Condition {
            triple,
            description,
            retry: Retry::Poll,
        } => (triple, description),
    };

    info!("Drive not ready ({}); starting unit", description);
    transport.send(&CommandDescriptor::start_stop_unit(true, false), &[])?;

    for poll in 1..=policy.max_polls {
        thread::sleep(policy.interval);
        match test_unit_ready(transport)? {
            Interpretation::Good => {
                info!("Drive ready after {} polls", poll);
                return Ok(Ready { polls: poll });
            }
            Interpretation::Condition {
                triple,
                description,
                retry: Retry::Fatal,
            } => return Err(fatal(triple, description)),
            Interpretation::Condition {
                triple,
                description,
                retry: Retry::Poll,
            } => {
                if triple != current {
                    debug!("sense changed {} -> {} ({})", current, triple, description);
                    current = triple;
                }
                debug!("poll {}/{}: {}", poll, policy.max_polls, description);
            }
        }
    }

    Err(Error::NotReady {
        polls: policy.max_polls,
    })
}

/// Wait for a command sent with IMMED set to finish. Until it does, the
/// drive answers TEST UNIT READY with "operation in progress" or "long write
/// in progress".
pub fn wait_for_completion<T: Transport + ?Sized>(
    transport: &mut T,
    policy: &PollPolicy,
) -> Result<Ready> {
    for poll in 0..=policy.max_polls {
        if poll > 0 {
            thread::sleep(policy.interval);
        }
        match test_unit_ready(transport)? {
            Interpretation::Good => return Ok(Ready { polls: poll }),
            Interpretation::Condition {
                triple,
                description,
                retry: Retry::Fatal,
            } => return Err(fatal(triple, description)),
            Interpretation::Condition {
                description,
                retry: Retry::Poll,
                ..
            } => debug!("busy {}/{}: {}", poll, policy.max_polls, description),
        }
    }

    Err(Error::NotReady {
        polls: policy.max_polls,
    })
}
