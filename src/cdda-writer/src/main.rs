#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_debug_implementations)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
mod burn;
mod cue;
mod disc;
mod error;
mod pcm;
mod scsi;
mod transcode;

use std::{path::PathBuf, process};

use log::{error, info};
use structopt::StructOpt;

use crate::{
    burn::Config,
    error::describe_error_code,
    transcode::Ffmpeg,
};

#[derive(StructOpt, Debug)]
#[structopt(name = "cdda-writer", about = "Write an audio CD described by a CUE sheet")]
struct Opt {
    /// Go through the whole burn with the drive in test-write mode
    #[structopt(long)]
    dummy: bool,
    /// Write speed as a multiple of 1x; 0 lets the drive pick its fastest
    #[structopt(long, default_value = "4")]
    speed: f64,
    /// ffmpeg executable used to decode the tracks
    #[structopt(long, parse(from_os_str), default_value = "ffmpeg")]
    ffmpeg_path: PathBuf,
    /// Explain an exit code and quit
    #[structopt(long, allow_hyphen_values = true)]
    get_error: Option<i32>,
    #[structopt(parse(from_os_str))]
    toc: Option<PathBuf>,
    /// Generic SCSI node of the writer, e.g. /dev/sg0
    #[structopt(parse(from_os_str))]
    device: Option<PathBuf>,
}

#[cfg(target_os = "linux")]
fn open_device(path: &std::path::Path) -> scsi::sg::SgTransport {
    scsi::sg::SgTransport::new(path)
}

#[cfg(not(target_os = "linux"))]
fn open_device(path: &std::path::Path) -> unsupported::NoTransport {
    unsupported::NoTransport(path.to_owned())
}

#[cfg(not(target_os = "linux"))]
mod unsupported {
    use std::{io, path::PathBuf};

    use crate::{
        error::{Error, Result},
        scsi::{command::CommandDescriptor, CommandResult, Transport},
    };

    #[derive(Debug)]
    pub struct NoTransport(pub PathBuf);

    impl Transport for NoTransport {
        fn send(&mut self, _cmd: &CommandDescriptor, _data_out: &[u8]) -> Result<CommandResult> {
            Err(Error::DeviceUnavailable {
                path: self.0.clone(),
                source: io::Error::new(io::ErrorKind::Other, "SCSI generic needs Linux"),
            })
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opt = Opt::from_args();

    if let Some(code) = opt.get_error {
        println!("Error code {} means: {}", code, describe_error_code(code));
        return;
    }

    let (toc, device) = match (&opt.toc, &opt.device) {
        (Some(toc), Some(device)) => (toc, device),
        _ => {
            // nothing to burn; show how to ask for it
            let _ = Opt::clap().print_help();
            println!();
            return;
        }
    };

    println!("cdda-writer {}", env!("CARGO_PKG_VERSION"));

    let config = Config {
        dummy: opt.dummy,
        speed: opt.speed,
        transcoder: opt.ffmpeg_path.clone(),
        ..Config::new(device)
    };
    let ffmpeg = Ffmpeg::new(&config.transcoder);

    match burn::burn_disc(toc, &config, open_device, &ffmpeg) {
        Ok(summary) => info!(
            "Done: {} tracks, {} frames, {} warnings",
            summary.tracks.len(),
            summary.frames(),
            summary.warnings.len()
        ),
        Err(err) => {
            error!("{}", err);
            process::exit(err.exit_code());
        }
    }
}
