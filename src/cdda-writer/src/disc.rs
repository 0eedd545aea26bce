#[cfg(test)]
pub(crate) mod tests;

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use log::warn;

use crate::{
    cue::{self, CueSheet},
    error::{Error, Result},
};

/// The Red Book limit. More tracks are written anyway, but many drives and
/// players will not cope.
pub const MAX_TRACKS: usize = 99;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    TooManyTracks(usize),
    /// Consecutive tracks name the same source file. Each of them is burned
    /// from the whole file.
    SharedFile { source: PathBuf, tracks: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyTracks(count) => write!(
                f,
                "Warning: {} tracks found in CUE file, more than {}. This may not be supported by all drives.",
                count, MAX_TRACKS
            ),
            Self::SharedFile { source, tracks } => write!(
                f,
                "{} consecutive tracks read {}; each is written from the whole file",
                tracks,
                source.display()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// 1-based position on the disc.
    pub index: usize,
    pub source: PathBuf,
    pub title: Option<String>,
    pub performer: Option<String>,
    pub isrc: Option<String>,
}

#[derive(Debug)]
pub struct Disc {
    title: Option<String>,
    performer: Option<String>,
    catalog: Option<String>,
    tracks: Vec<Track>,
    warnings: Vec<Warning>,
}

/// Where a track's file lives. Backslashes are taken as path separators and
/// relative names are relative to the directory holding the CUE sheet.
pub fn resolve_source(file: &str, toc_dir: &Path) -> PathBuf {
    let file = PathBuf::from(file.replace('\\', "/"));
    if file.is_absolute() {
        file
    } else {
        toc_dir.join(file)
    }
}

impl Disc {
    pub fn load(toc_path: &Path) -> Result<Self> {
        let bytes = fs::read(toc_path).map_err(|source| Error::TocRead {
            path: toc_path.to_owned(),
            source,
        })?;
        let sheet = cue::parse(&bytes).map_err(|e| Error::TocParseFailure {
            path: toc_path.to_owned(),
            line: e.line,
            reason: e.reason,
        })?;
        Self::from_cue(sheet, toc_path)
    }

    pub fn from_cue(sheet: CueSheet, toc_path: &Path) -> Result<Self> {
        if sheet.tracks.is_empty() {
            return Err(Error::NoTracks);
        }

        let toc_dir = toc_path.parent().unwrap_or_else(|| Path::new(""));
        let tracks: Vec<Track> = sheet
            .tracks
            .into_iter()
            .enumerate()
            .map(|(i, t)| Track {
                index: i + 1,
                source: resolve_source(&t.file, toc_dir),
                title: t.title,
                performer: t.performer,
                isrc: t.isrc,
            })
            .collect();

        let mut warnings = Vec::new();
        if tracks.len() > MAX_TRACKS {
            warnings.push(Warning::TooManyTracks(tracks.len()));
        }
        let mut start = 0;
        while start < tracks.len() {
            let source = &tracks[start].source;
            let len = tracks[start..]
                .iter()
                .take_while(|t| &t.source == source)
                .count();
            if len > 1 {
                warnings.push(Warning::SharedFile {
                    source: source.clone(),
                    tracks: len,
                });
            }
            start += len;
        }
        for warning in &warnings {
            warn!("{}", warning);
        }

        Ok(Self {
            title: sheet.title,
            performer: sheet.performer,
            catalog: sheet.catalog,
            tracks,
            warnings,
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn performer(&self) -> Option<&str> {
        self.performer.as_deref()
    }

    /// Media catalog number (UPC/EAN).
    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}
