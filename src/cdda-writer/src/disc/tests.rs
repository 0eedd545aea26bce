use std::{
    fmt::Write,
    fs,
    path::{Path, PathBuf},
};

use super::{resolve_source, Disc, Warning, MAX_TRACKS};
use crate::{cue, error::Error, pcm::tests::scratch};

pub(crate) fn sheet_with_tracks(count: usize) -> String {
    let mut sheet = String::from("TITLE \"Many\"\nPERFORMER \"Someone\"\n");
    for n in 1..=count {
        writeln!(sheet, "FILE \"audio\\{:03}.flac\" WAVE", n).unwrap();
        writeln!(sheet, "  TRACK {:02} AUDIO", n).unwrap();
        writeln!(sheet, "    INDEX 01 00:00:00").unwrap();
    }
    sheet
}

#[test]
fn test_resolve_source() {
    let dir = Path::new("/music/album");
    assert_eq!(
        resolve_source("01.flac", dir),
        PathBuf::from("/music/album/01.flac")
    );
    assert_eq!(
        resolve_source("disc 1\\01.flac", dir),
        PathBuf::from("/music/album/disc 1/01.flac")
    );
    assert_eq!(
        resolve_source("/elsewhere/01.flac", dir),
        PathBuf::from("/elsewhere/01.flac")
    );
    assert_eq!(resolve_source("01.flac", Path::new("")), PathBuf::from("01.flac"));
}

#[test]
fn test_load() {
    let dir = scratch();
    let toc = dir.as_path().join("album.cue");
    fs::write(&toc, sheet_with_tracks(3)).unwrap();

    let disc = Disc::load(&toc).unwrap();
    assert_eq!(disc.title(), Some("Many"));
    assert_eq!(disc.performer(), Some("Someone"));
    assert!(disc.warnings().is_empty());

    let tracks = disc.tracks();
    assert_eq!(tracks.len(), 3);
    assert_eq!(tracks[0].index, 1);
    assert_eq!(tracks[2].index, 3);
    assert_eq!(tracks[1].source, dir.as_path().join("audio/002.flac"));
    assert!(tracks.iter().all(|t| t.source.is_absolute()));
}

#[test]
fn test_no_tracks() {
    let sheet = cue::parse(b"TITLE \"Empty\"\n").unwrap();
    let err = Disc::from_cue(sheet, Path::new("/x/empty.cue")).unwrap_err();
    assert!(matches!(err, Error::NoTracks));
    assert_eq!(err.to_string(), "No tracks found in CUE file.");
}

#[test]
fn test_too_many_tracks_warns_once() {
    let sheet = cue::parse(sheet_with_tracks(150).as_bytes()).unwrap();
    let disc = Disc::from_cue(sheet, Path::new("/x/big.cue")).unwrap();

    assert_eq!(disc.tracks().len(), 150);
    assert_eq!(disc.warnings(), &[Warning::TooManyTracks(150)]);
    assert_eq!(disc.tracks()[149].index, 150);
}

#[test]
fn test_exactly_the_limit() {
    let sheet = cue::parse(sheet_with_tracks(MAX_TRACKS).as_bytes()).unwrap();
    let disc = Disc::from_cue(sheet, Path::new("/x/full.cue")).unwrap();
    assert!(disc.warnings().is_empty());
}

#[test]
fn test_load_errors() {
    let dir = scratch();
    let missing = dir.as_path().join("missing.cue");
    assert!(matches!(
        Disc::load(&missing).unwrap_err(),
        Error::TocRead { .. }
    ));

    let bad = dir.as_path().join("bad.cue");
    fs::write(&bad, "FILE a.wav WAVE\nTRACK 01 MODE1/2352\n").unwrap();
    match Disc::load(&bad).unwrap_err() {
        Error::TocParseFailure { path, line, .. } => {
            assert_eq!(path, bad);
            assert_eq!(line, 2);
        }
        other => panic!("{:?}", other),
    }
}

#[test]
fn test_shared_file_warns_per_run() {
    let sheet = cue::parse(
        b"CATALOG 0724383476122\n\
          FILE album.wav WAVE\nTRACK 01 AUDIO\nTRACK 02 AUDIO\nTRACK 03 AUDIO\n\
          FILE bonus.wav WAVE\nTRACK 04 AUDIO\n\
          FILE album.wav WAVE\nTRACK 05 AUDIO\n",
    )
    .unwrap();
    let disc = Disc::from_cue(sheet, Path::new("/x/album.cue")).unwrap();

    assert_eq!(disc.catalog(), Some("0724383476122"));
    assert_eq!(
        disc.warnings(),
        &[Warning::SharedFile {
            source: PathBuf::from("/x/album.wav"),
            tracks: 3,
        }]
    );
    assert_eq!(
        disc.warnings()[0].to_string(),
        "3 consecutive tracks read /x/album.wav; each is written from the whole file"
    );
}

#[test]
fn test_track_metadata_is_kept() {
    let sheet = cue::parse(
        b"FILE a.wav WAVE\nTRACK 01 AUDIO\nTITLE \"One\"\nPERFORMER \"Guest\"\nISRC GBAYE9400001\n",
    )
    .unwrap();
    let disc = Disc::from_cue(sheet, Path::new("/x/a.cue")).unwrap();

    let track = &disc.tracks()[0];
    assert_eq!(track.title.as_deref(), Some("One"));
    assert_eq!(track.performer.as_deref(), Some("Guest"));
    assert_eq!(track.isrc.as_deref(), Some("GBAYE9400001"));
    assert_eq!(disc.catalog(), None);
}
