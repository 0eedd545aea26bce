//! Drives a whole disc: drive checks, readiness, then transcode, frame and
//! write each track in order.
//!
//! Once the first WRITE(10) has gone out there is no way back. A failure
//! after that point aborts the session and leaves whatever was already
//! written on the disc as it is.


use std::{
    convert::TryFrom,
    env,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use vmm_sys_util::tempdir::TempDir;

use crate::{
    disc::{Disc, Track, Warning},
    error::{Error, Result},
    pcm::{PcmImage, FRAME_SIZE, HEADER_LEN},
    scsi::{
        command::CommandDescriptor,
        ready::{self, PollPolicy},
        CommandResult, DeviceType, Transport,
    },
    transcode::Transcoder,
};

/// Frames per WRITE(10); 26 frames keeps a transfer under 64 KiB.
pub const FRAMES_PER_WRITE: usize = 26;
/// 1x CD-DA in kB/s.
const KBPS_PER_X: f64 = 176.4;
/// Tracks shorter than four seconds are outside the Red Book.
const MIN_TRACK_FRAMES: u64 = 4 * 75;
const INVISIBLE_TRACK: u32 = 0xff;

const CAPABILITIES_PAGE: u8 = 0x2a;
const WRITE_PARAMETERS_PAGE: u8 = 0x05;
const WRITE_PARAMETERS_PAGE_LEN: u8 = 0x32;
const MODE_HEADER_LEN: usize = 8;
pub const WRITE_PARAMETERS_LEN: usize = MODE_HEADER_LEN + 2 + WRITE_PARAMETERS_PAGE_LEN as usize;

const WRITE_TYPE_TAO: u8 = 0x01;
const TEST_WRITE: u8 = 0b0001_0000;
const BUFE: u8 = 0b0100_0000;
const AUDIO_PAUSE_FRAMES: u16 = 150;

#[derive(Debug, Clone)]
pub struct Config {
    pub device: PathBuf,
    /// Run the drive in test-write mode: everything happens, the laser stays
    /// at read power.
    pub dummy: bool,
    /// Write speed as a multiple of 1x; zero or less means drive maximum.
    pub speed: f64,
    pub transcoder: PathBuf,
    pub poll: PollPolicy,
    /// How long to wait for a cache flush or a track/session close.
    pub completion: PollPolicy,
    /// The per-run work directory is created under here.
    pub work_root: PathBuf,
}

impl Config {
    pub fn new(device: &Path) -> Self {
        Self {
            device: device.to_owned(),
            dummy: false,
            speed: 4.0,
            transcoder: PathBuf::from("ffmpeg"),
            poll: PollPolicy::default(),
            completion: PollPolicy::completion(),
            work_root: env::temp_dir(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ValidateDrive,
    NegotiateReadiness,
    Extract(usize),
    Encode(usize),
    Write(usize),
    Done,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackReport {
    pub index: usize,
    pub frames: u64,
    /// Bytes of audio in a padded last frame.
    pub tail: Option<usize>,
}

#[derive(Debug, Default)]
pub struct Summary {
    pub tracks: Vec<TrackReport>,
    pub warnings: Vec<Warning>,
    /// Last LBA of the finished disc, if the drive would say.
    pub last_lba: Option<u32>,
}

impl Summary {
    pub fn frames(&self) -> u64 {
        self.tracks.iter().map(|t| t.frames).sum()
    }
}

/// SET CD SPEED value for a speed multiplier.
pub fn write_speed_kbps(speed: f64) -> u16 {
    if speed.is_nan() || speed <= 0.0 {
        return u16::MAX;
    }
    let kbps = (speed * KBPS_PER_X).round();
    if kbps >= f64::from(u16::MAX) {
        u16::MAX
    } else {
        kbps as u16
    }
}

/// MODE SELECT(10) parameter list carrying the write parameters page, set up
/// for track-at-once raw audio.
pub fn write_parameters(dummy: bool, burnfree: bool) -> [u8; WRITE_PARAMETERS_LEN] {
    let mut params = [0; WRITE_PARAMETERS_LEN];
    // the mode parameter header stays zeroed: no block descriptors
    let page = &mut params[MODE_HEADER_LEN..];
    page[0] = WRITE_PARAMETERS_PAGE;
    page[1] = WRITE_PARAMETERS_PAGE_LEN;
    page[2] = WRITE_TYPE_TAO;
    if burnfree {
        page[2] |= BUFE;
    }
    if dummy {
        page[2] |= TEST_WRITE;
    }
    // byte 3: track mode 0 (2 channel audio), no multisession
    // byte 4: data block type 0 (raw 2352)
    // byte 8: session format 0 (CD-DA)
    page[14..16].copy_from_slice(&AUDIO_PAUSE_FRAMES.to_be_bytes());
    params
}

#[derive(Debug)]
pub struct Session<'a, T, X> {
    config: &'a Config,
    transport: T,
    transcoder: X,
    stage: Stage,
    speed_applied: bool,
    burnfree: bool,
}

impl<'a, T: Transport, X: Transcoder> Session<'a, T, X> {
    pub fn new(config: &'a Config, transport: T, transcoder: X) -> Self {
        Self {
            config,
            transport,
            transcoder,
            stage: Stage::Idle,
            speed_applied: false,
            burnfree: false,
        }
    }

    pub const fn stage(&self) -> Stage {
        self.stage
    }

    pub fn run(&mut self, disc: &Disc) -> Result<Summary> {
        let result = self.run_stages(disc);
        self.stage = match result {
            Ok(_) => Stage::Done,
            Err(_) => {
                debug!("aborted during {:?}", self.stage);
                Stage::Fatal
            }
        };
        result
    }

    fn run_stages(&mut self, disc: &Disc) -> Result<Summary> {
        // Removed when dropped, whichever way we leave this function.
        let workdir = TempDir::new_with_prefix(self.config.work_root.join("cdda-writer-"))
            .map_err(Error::WorkDir)?;
        debug!("work directory {}", workdir.as_path().display());

        if self.config.dummy {
            info!("Dummy mode is enabled. No data will be written to the disk.");
        }

        self.stage = Stage::ValidateDrive;
        self.validate_drive()?;

        self.stage = Stage::NegotiateReadiness;
        ready::negotiate(&mut self.transport, &self.config.poll)?;

        self.check_capabilities()?;
        self.check_medium()?;
        self.select_write_parameters()?;

        info!(
            "Writing {} by {} to {}",
            disc.title().unwrap_or("(untitled)"),
            disc.performer().unwrap_or("(unknown artist)"),
            self.config.device.display()
        );
        if let Some(catalog) = disc.catalog() {
            debug!("catalog number {}", catalog);
        }

        let mut summary = Summary {
            warnings: disc.warnings().to_vec(),
            ..Summary::default()
        };
        for track in disc.tracks() {
            let report = self.burn_track(track, workdir.as_path())?;
            summary.tracks.push(report);
        }

        info!("Closing session; this can take a few minutes");
        self.finish(&CommandDescriptor::close_session())?;
        summary.last_lba = self.last_recorded_lba();

        Ok(summary)
    }

    fn send(&mut self, cmd: &CommandDescriptor) -> Result<CommandResult> {
        self.transport.send(cmd, &[])
    }

    /// Send an IMMED command and poll until the drive has carried it out.
    fn finish(&mut self, cmd: &CommandDescriptor) -> Result<()> {
        self.send(cmd)?;
        let done = ready::wait_for_completion(&mut self.transport, &self.config.completion)?;
        debug!("{} finished after {} polls", cmd.name(), done.polls);
        Ok(())
    }

    /// Only informational: a disc written in test mode has nothing recorded.
    fn last_recorded_lba(&mut self) -> Option<u32> {
        match self.send(&CommandDescriptor::read_capacity10()) {
            Ok(capacity) => {
                let r = &capacity.response;
                let lba = u32::from_be_bytes([r[0], r[1], r[2], r[3]]);
                info!("Disc ends at LBA {}", lba);
                Some(lba)
            }
            Err(err) => {
                debug!("no capacity reported: {}", err);
                None
            }
        }
    }

    fn validate_drive(&mut self) -> Result<()> {
        let inquiry = self.send(&CommandDescriptor::inquiry())?;
        // 0x7f: no device on this LUN
        let peripheral = inquiry.response.first().copied().unwrap_or(0x7f);
        let qualifier = peripheral >> 5;
        let device_type = peripheral & 0b0001_1111;
        if qualifier != 0 || !matches!(DeviceType::try_from(device_type), Ok(DeviceType::CdDvd)) {
            return Err(Error::NotACdDrive { device_type });
        }

        if let Some(id) = inquiry.response.get(8..36) {
            let text = |b: &[u8]| String::from_utf8_lossy(b).trim().to_owned();
            info!(
                "Drive: {} {} {}",
                text(&id[0..8]),
                text(&id[8..24]),
                text(&id[24..28])
            );
        }
        Ok(())
    }

    fn check_capabilities(&mut self) -> Result<()> {
        let mode = self.send(&CommandDescriptor::mode_sense6(CAPABILITIES_PAGE))?;
        let data = &mode.response;
        // 4 byte header, then however many block descriptor bytes it says
        let page = data
            .get(3)
            .and_then(|&bd_len| data.get(4 + usize::from(bd_len)..))
            .filter(|page| page.len() > 4 && page[0] & 0b0011_1111 == CAPABILITIES_PAGE);

        match page {
            Some(page) => {
                if page[3] & 0b0000_0001 == 0 {
                    return Err(Error::NoWriteSupport);
                }
                if self.config.dummy && page[3] & 0b0000_0100 == 0 {
                    warn!("Drive does not advertise test writing; dummy mode may not be honoured");
                }
                self.burnfree = page[4] & 0b1000_0000 != 0;
                debug!("buffer underrun protection: {}", self.burnfree);
            }
            None => warn!("Drive returned no capabilities page; assuming it can write CD-R"),
        }
        Ok(())
    }

    fn check_medium(&mut self) -> Result<()> {
        let info = self.send(&CommandDescriptor::read_disc_information())?;
        let status = info.response.get(2).map_or(0, |b| b & 0b11);
        match status {
            0 => debug!("disc is blank"),
            1 => info!("Disc is appendable; tracks go after the existing ones"),
            2 => return Err(Error::MediumNotBlank { status }),
            _ => warn!("Unexpected disc status {}", status),
        }
        Ok(())
    }

    fn select_write_parameters(&mut self) -> Result<()> {
        let params = write_parameters(self.config.dummy, self.burnfree);
        self.transport.send(
            &CommandDescriptor::mode_select10(WRITE_PARAMETERS_LEN as u16),
            &params,
        )?;
        Ok(())
    }

    fn apply_speed(&mut self) -> Result<()> {
        if self.speed_applied {
            return Ok(());
        }
        let kbps = write_speed_kbps(self.config.speed);
        if kbps == u16::MAX {
            info!("Writing at maximum speed");
        } else {
            info!("Writing at {}x ({} kB/s)", self.config.speed, kbps);
        }
        self.send(&CommandDescriptor::set_cd_speed(kbps))?;
        self.speed_applied = true;
        Ok(())
    }

    /// Track number and LBA the next track will be written at.
    fn next_writable_address(&mut self) -> Result<(u16, u32)> {
        let info = self.send(&CommandDescriptor::read_track_information(INVISIBLE_TRACK))?;
        let r = &info.response;
        // byte 7 bit 0: NWA_V
        if r.len() < 33 || r[7] & 0b1 == 0 {
            return Err(Error::NoWritableAddress);
        }
        let number = u16::from_be_bytes([r[32], r[2]]);
        let nwa = u32::from_be_bytes([r[12], r[13], r[14], r[15]]);
        debug!("track {}: next writable address {}", number, nwa);
        Ok((number, nwa))
    }

    fn write_frames(&mut self, lba: u32, bytes: &[u8]) -> Result<u32> {
        let blocks = (bytes.len() / FRAME_SIZE) as u16;
        self.transport
            .send(&CommandDescriptor::write10(lba, blocks), bytes)?;
        Ok(lba + u32::from(blocks))
    }

    fn burn_track(&mut self, track: &Track, workdir: &Path) -> Result<TrackReport> {
        let index = track.index;
        match (&track.title, &track.performer) {
            (Some(title), Some(performer)) => {
                info!("Writing track {:02}: {} ({})", index, title, performer)
            }
            (Some(title), None) => info!("Writing track {:02}: {}", index, title),
            _ => info!("Writing track {:02}", index),
        }
        if let Some(isrc) = &track.isrc {
            debug!("track {:02}: ISRC {}", index, isrc);
        }
        let transcode_failure = |reason: String| Error::TranscodeFailure {
            track: index,
            reason,
        };

        self.stage = Stage::Extract(index);
        let wav = workdir.join(format!("track{:02}.wav", index));
        self.transcoder
            .transcode(&track.source, &wav)
            .map_err(|e| transcode_failure(e.to_string()))?;

        self.stage = Stage::Encode(index);
        let image = PcmImage::open(&wav).map_err(|e| transcode_failure(e.to_string()))?;
        if !image.has_canonical_header() {
            warn!(
                "Track {:02}: transcoder output has an unusual header; skipping {} bytes anyway",
                index, HEADER_LEN
            );
        }
        let frames = image.frame_count();
        debug!(
            "track {:02}: {} bytes of audio, {} frames",
            index,
            image.payload_len(),
            frames
        );
        if frames == 0 {
            return Err(transcode_failure("no audio samples".to_owned()));
        }
        if frames < MIN_TRACK_FRAMES {
            warn!(
                "Track {:02}: {} frames is shorter than the 4 second minimum",
                index, frames
            );
        }
        if let Some(tail) = image.tail_len() {
            warn!(
                "Track {:02}: partial last frame ({} of {} bytes), padding with silence",
                index, tail, FRAME_SIZE
            );
        }

        self.stage = Stage::Write(index);
        self.apply_speed()?;
        let (number, mut lba) = self.next_writable_address()?;

        let batch_len = FRAMES_PER_WRITE * FRAME_SIZE;
        let mut batch = Vec::with_capacity(batch_len);
        let mut written = 0_u64;
        for frame in image.frames() {
            let frame = frame.map_err(|source| Error::Pcm {
                path: wav.clone(),
                source,
            })?;
            if frame.is_partial() {
                debug!(
                    "track {:02}: last frame carries {} bytes of audio",
                    index,
                    frame.payload_len()
                );
            }
            batch.extend_from_slice(frame.as_bytes());
            if batch.len() == batch_len {
                lba = self.write_frames(lba, &batch)?;
                written += FRAMES_PER_WRITE as u64;
                batch.clear();
                debug!("track {:02}: {}/{} frames", index, written, frames);
            }
        }
        if !batch.is_empty() {
            self.write_frames(lba, &batch)?;
        }

        self.finish(&CommandDescriptor::synchronize_cache())?;
        self.finish(&CommandDescriptor::close_track(number))?;
        info!("Track {:02} done, {} frames", index, frames);

        Ok(TrackReport {
            index,
            frames,
            tail: image.tail_len(),
        })
    }
}

/// Read the CUE sheet, then open the device with `open` and burn the disc.
/// The device is not touched unless the CUE sheet yields at least one track.
pub fn burn_disc<T, X, F>(toc: &Path, config: &Config, open: F, transcoder: X) -> Result<Summary>
where
    T: Transport,
    X: Transcoder,
    F: FnOnce(&Path) -> T,
{
    let disc = Disc::load(toc)?;
    let transport = open(&config.device);
    let mut session = Session::new(config, transport, transcoder);
    let result = session.run(&disc);
    debug!("session ended {:?}", session.stage());
    result
}
