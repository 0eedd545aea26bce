use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use log::debug;

/// Turns arbitrary source media into canonical PCM: a 44-byte WAV header
/// followed by 16-bit little-endian stereo samples at 44.1 kHz.
pub trait Transcoder {
    fn transcode(&self, source: &Path, destination: &Path) -> io::Result<()>;
}

impl<X: Transcoder + ?Sized> Transcoder for &X {
    fn transcode(&self, source: &Path, destination: &Path) -> io::Result<()> {
        (**self).transcode(source, destination)
    }
}

/// Runs an external `ffmpeg` and waits for it.
#[derive(Debug)]
pub struct Ffmpeg {
    program: PathBuf,
}

impl Ffmpeg {
    pub fn new(program: &Path) -> Self {
        Self {
            program: program.to_owned(),
        }
    }

    fn command(&self, source: &Path, destination: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&["-nostdin", "-y", "-loglevel", "error", "-i"])
            .arg(source)
            // bitexact and no metadata keeps the header at exactly 44 bytes
            .args(&["-vn", "-map_metadata", "-1", "-fflags", "+bitexact"])
            .args(&["-flags:a", "+bitexact"])
            .args(&["-ar", "44100", "-ac", "2", "-sample_fmt", "s16"])
            .args(&["-c:a", "pcm_s16le", "-f", "wav"])
            .arg(destination)
            .stdin(Stdio::null());
        cmd
    }
}

impl Transcoder for Ffmpeg {
    fn transcode(&self, source: &Path, destination: &Path) -> io::Result<()> {
        debug!(
            "{} {} -> {}",
            self.program.display(),
            source.display(),
            destination.display()
        );
        let output = self.command(source, destination).output().map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("cannot run {}: {}", self.program.display(), e),
            )
        })?;
        if !output.status.success() {
            return Err(io::Error::new(
                ErrorKind::Other,
                format!(
                    "{} {}: {}",
                    self.program.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(())
    }
}
