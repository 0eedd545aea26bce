//! Slicing canonical PCM (16-bit, 44.1 kHz, stereo, interleaved) into CD-DA
//! frames.


use std::{
    cmp::min,
    convert::TryFrom,
    fs::File,
    io::{self, ErrorKind},
    os::unix::prelude::*,
    path::Path,
};

/// Bytes in one CD-DA sector: 588 stereo sample pairs of 16 bits each.
pub const FRAME_SIZE: usize = 2352;
/// Leading WAV header written by the transcoder.
pub const HEADER_LEN: u64 = 44;

const FRAME_SIZE_U64: u64 = FRAME_SIZE as u64;

/// One write block. Always `FRAME_SIZE` bytes; a short tail is padded with
/// silence.
#[derive(Clone)]
pub struct Frame {
    data: [u8; FRAME_SIZE],
    payload: usize,
}

impl Frame {
    pub const fn as_bytes(&self) -> &[u8; FRAME_SIZE] {
        &self.data
    }

    /// How many leading bytes came from the source; the rest is padding.
    pub const fn payload_len(&self) -> usize {
        self.payload
    }

    pub const fn is_partial(&self) -> bool {
        self.payload < FRAME_SIZE
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("payload", &self.payload)
            .finish()
    }
}

/// A transcoded track on disk. Frames are read lazily and can be walked any
/// number of times.
#[derive(Debug)]
pub struct PcmImage {
    file: File,
    payload_len: u64,
}

impl PcmImage {
    /// Open a transcoder output file. It must at least carry a RIFF/WAVE
    /// header.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < HEADER_LEN {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("{} bytes is shorter than a WAV header", len),
            ));
        }

        let mut header = [0; HEADER_LEN as usize];
        file.read_exact_at(&mut header, 0)?;
        if &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
            return Err(io::Error::new(ErrorKind::InvalidData, "not a RIFF/WAVE file"));
        }

        Ok(Self {
            file,
            payload_len: len - HEADER_LEN,
        })
    }

    /// Whether the header ends with the `data` chunk tag, i.e. the sample
    /// data really starts at `HEADER_LEN`.
    pub fn has_canonical_header(&self) -> bool {
        let mut tag = [0; 4];
        self.file.read_exact_at(&mut tag, 36).is_ok() && &tag == b"data"
    }

    pub const fn payload_len(&self) -> u64 {
        self.payload_len
    }

    pub const fn frame_count(&self) -> u64 {
        (self.payload_len + FRAME_SIZE_U64 - 1) / FRAME_SIZE_U64
    }

    /// Bytes of real audio in the last frame, if it isn't a whole one.
    pub const fn tail_len(&self) -> Option<usize> {
        match (self.payload_len % FRAME_SIZE_U64) as usize {
            0 => None,
            n => Some(n),
        }
    }

    pub fn read_frame(&self, index: u64) -> io::Result<Frame> {
        let offset = index * FRAME_SIZE_U64;
        if offset >= self.payload_len {
            return Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("frame {} is past the end of the track", index),
            ));
        }
        let payload = usize::try_from(min(self.payload_len - offset, FRAME_SIZE_U64))
            .unwrap_or(FRAME_SIZE);

        let mut data = [0; FRAME_SIZE];
        self.file
            .read_exact_at(&mut data[..payload], HEADER_LEN + offset)?;

        Ok(Frame { data, payload })
    }

    pub const fn frames(&self) -> Frames<'_> {
        Frames {
            image: self,
            next: 0,
        }
    }
}

#[derive(Debug)]
pub struct Frames<'a> {
    image: &'a PcmImage,
    next: u64,
}

impl Iterator for Frames<'_> {
    type Item = io::Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.image.frame_count() {
            return None;
        }
        let frame = self.image.read_frame(self.next);
        self.next += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = usize::try_from(self.image.frame_count() - self.next).unwrap_or(usize::MAX);
        (left, Some(left))
    }
}
