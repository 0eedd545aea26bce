//! Reader for CUE sheets, the table-of-contents format we take as input.
//!
//! Only what an audio disc needs is kept: disc and track titles/performers,
//! the catalog number, ISRCs, and which file each track comes from. Timing
//! (INDEX, PREGAP, POSTGAP) and SONGWRITER are accepted and ignored; every
//! track becomes its own file on the disc.


use log::warn;
use thiserror::Error;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CueSheet {
    pub title: Option<String>,
    pub performer: Option<String>,
    pub catalog: Option<String>,
    pub tracks: Vec<CueTrack>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueTrack {
    pub number: u32,
    /// As written in the sheet; not yet resolved against anything.
    pub file: String,
    pub title: Option<String>,
    pub performer: Option<String>,
    pub isrc: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    pub line: usize,
    pub reason: String,
}

fn tokenize(line: &str) -> Result<Vec<String>, &'static str> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.peek().map_or(false, |c| c.is_whitespace()) {
            chars.next();
        }
        match chars.peek() {
            None => break,
            Some('"') => {
                chars.next();
                let mut token = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => token.push(c),
                        None => return Err("unterminated quoted string"),
                    }
                }
                tokens.push(token);
            }
            Some(_) => {
                let mut token = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    token.push(c);
                    chars.next();
                }
                tokens.push(token);
            }
        }
    }
    Ok(tokens)
}

/// Parse CUE sheet bytes. Anything that isn't UTF-8 is decoded lossily.
pub fn parse(bytes: &[u8]) -> Result<CueSheet, ParseError> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');

    let mut sheet = CueSheet::default();
    let mut file: Option<String> = None;

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let fail = |reason: &str| ParseError {
            line: line_no,
            reason: reason.to_owned(),
        };

        let tokens = tokenize(line).map_err(fail)?;
        let (command, args) = match tokens.split_first() {
            Some((command, args)) => (command.to_ascii_uppercase(), args),
            None => continue,
        };
        let arg = |n: usize| {
            args.get(n)
                .cloned()
                .ok_or_else(|| fail(&format!("{} is missing an argument", command)))
        };

        let track = sheet.tracks.last_mut();
        match command.as_str() {
            "REM" => {}
            "CATALOG" => sheet.catalog = Some(arg(0)?),
            "TITLE" => {
                let value = Some(arg(0)?);
                match track {
                    Some(t) => t.title = value,
                    None => sheet.title = value,
                }
            }
            "PERFORMER" => {
                let value = Some(arg(0)?);
                match track {
                    Some(t) => t.performer = value,
                    None => sheet.performer = value,
                }
            }
            "FILE" => file = Some(arg(0)?),
            "TRACK" => {
                let number = arg(0)?
                    .parse::<u32>()
                    .map_err(|_| fail("track number is not a number"))?;
                let mode = arg(1)?.to_ascii_uppercase();
                if mode != "AUDIO" {
                    return Err(fail(&format!(
                        "track {} is {}; only AUDIO tracks can be written",
                        number, mode
                    )));
                }
                let file = file
                    .clone()
                    .ok_or_else(|| fail("TRACK before any FILE"))?;
                sheet.tracks.push(CueTrack {
                    number,
                    file,
                    title: None,
                    performer: None,
                    isrc: None,
                });
            }
            "ISRC" => match track {
                Some(t) => t.isrc = Some(arg(0)?),
                None => return Err(fail("ISRC outside of a TRACK")),
            },
            "INDEX" | "PREGAP" | "POSTGAP" | "FLAGS" => {
                if track.is_none() {
                    return Err(fail(&format!("{} outside of a TRACK", command)));
                }
            }
            "SONGWRITER" | "CDTEXTFILE" => {}
            _ => warn!("line {}: ignoring unknown CUE command {}", line_no, command),
        }
    }

    Ok(sheet)
}
