//! The chunked container around track bodies: header parsing and encoding,
//! tolerant and strict file reading, file writing, and the wall-clock walk
//! over a parsed track.

use std::io::{Read, Write};

use tracing::{debug, trace};

use crate::error::{Error, ErrorKind, Result};
use crate::event::{encode_track_body, Event, DEFAULT_MICROS_PER_BEAT};
use crate::primitive::{expect_literal, read_exact, read_i16, read_u16, read_u32, read_u8, try_read_varlen};
use crate::reader::{ContextReader, LimitReader};
use crate::stream::EventParser;

/// The fields of an `MThd` chunk.
///
/// `format` and `division` are stored exactly as they appear on the wire so
/// that uncommon values (format 2, SMPTE divisions) survive a round-trip
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// SMF format: 0, 1 or 2.
    pub format: u16,
    /// How many track chunks the file claims to contain.
    pub track_count: u16,
    /// Positive: ticks per quarter-note. Negative: SMPTE timecode.
    pub division: i16,
}

impl Header {
    /// The division as ticks per quarter-note, or `None` for SMPTE
    /// timecode divisions.
    pub fn ticks_per_beat(&self) -> Option<u16> {
        if self.division >= 0 {
            Some(self.division as u16)
        } else {
            None
        }
    }

    /// Read the `MThd` chunk, including its tag. Header bodies longer than
    /// the 6 defined bytes have the excess skipped.
    fn read(r: &mut impl Read) -> Result<Header> {
        expect_literal(r, "MThd")?;
        let length = read_u32(r)?;
        let mut body = LimitReader::new(r, length as u64);
        let header = Header {
            format: read_u16(&mut body)?,
            track_count: read_u16(&mut body)?,
            division: read_i16(&mut body)?,
        };
        body.skip_remaining()?;
        Ok(header)
    }

    fn encode(&self, track_count: u16) -> [u8; 6] {
        let mut bytes = [0; 6];
        bytes[0..2].copy_from_slice(&self.format.to_be_bytes());
        bytes[2..4].copy_from_slice(&track_count.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.division.to_be_bytes());
        bytes
    }
}

/// A single track: an ordered list of events.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Track {
    pub events: Vec<Event>,
}

impl Track {
    pub fn new(events: Vec<Event>) -> Track {
        Track { events }
    }
}

impl IntoIterator for Track {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;
    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a Track {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;
    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// A parsed Standard MIDI File: a header and its tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub header: Header,
    pub tracks: Vec<Track>,
}

impl File {
    /// Parse a Standard MIDI File from any byte source.
    ///
    /// Unknown chunk kinds between tracks are skipped; the file is rejected
    /// only if it yields no `MTrk` chunk at all. Errors are decorated with
    /// the byte offset and a tail of the most recently read bytes.
    pub fn parse<R: Read>(source: R) -> Result<File> {
        let mut reader = ContextReader::new(source);
        match parse(&mut reader, false) {
            Ok(file) => Ok(file),
            Err(err) => Err(reader.wrap(err)),
        }
    }

    /// Encode the file to any byte sink.
    ///
    /// The emitted track count is taken from `tracks`, not from the header.
    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        let track_count = u16::try_from(self.tracks.len()).map_err(|_| {
            ErrorKind::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "track count exceeds 16-bit range",
            ))
        })?;

        out.write_all(b"MThd")?;
        out.write_all(&6u32.to_be_bytes())?;
        out.write_all(&self.header.encode(track_count))?;

        for track in &self.tracks {
            let body = encode_track_body(&track.events)?;
            let length = u32::try_from(body.len()).map_err(|_| {
                ErrorKind::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "track body exceeds 32-bit chunk length",
                ))
            })?;
            out.write_all(b"MTrk")?;
            out.write_all(&length.to_be_bytes())?;
            out.write_all(&body)?;
        }
        Ok(())
    }

    /// Walk one track in order, reporting each event's wall-clock offset in
    /// seconds to `callback`.
    ///
    /// Time advances with every `TimeDelta` according to the header's
    /// ticks-per-beat and the most recent tempo meta event (120 bpm until
    /// one is seen). Fails with
    /// [`SmpteUnsupported`](ErrorKind::SmpteUnsupported) on files with an
    /// SMPTE division.
    pub fn walk_track<F>(&self, index: usize, mut callback: F) -> Result<()>
    where
        F: FnMut(f64, &Event) -> Result<()>,
    {
        let ticks_per_beat = self
            .header
            .ticks_per_beat()
            .ok_or(ErrorKind::SmpteUnsupported(self.header.division))?;
        let track = self.tracks.get(index).ok_or(ErrorKind::NoSuchTrack {
            index,
            count: self.tracks.len(),
        })?;

        let mut seconds = 0.0f64;
        let mut micros_per_beat = DEFAULT_MICROS_PER_BEAT;
        for event in &track.events {
            callback(seconds, event)?;
            match event {
                Event::TimeDelta(ticks) => {
                    let beats = *ticks as f64 / ticks_per_beat as f64;
                    seconds += beats * micros_per_beat as f64 / 1e6;
                }
                Event::Meta(meta) => {
                    if let Some(tempo) = meta.tempo() {
                        micros_per_beat = tempo;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// What a chunk in track position turned out to be.
enum TrackChunk {
    Midi(Track),
    Skipped(Error),
}

/// Parse a full file. In strict mode any non-`MTrk` chunk after the header
/// is an error; in tolerant mode such chunks are skipped and the first
/// skip reason is kept for the `NoMidiTracks` diagnostic.
pub(crate) fn parse(r: &mut impl Read, strict: bool) -> Result<File> {
    let header = Header::read(r)?;

    let mut tracks = Vec::with_capacity(header.track_count as usize);
    let mut first_skip: Option<Error> = None;
    for _ in 0..header.track_count {
        match parse_track_chunk(r, strict)? {
            TrackChunk::Midi(track) => tracks.push(track),
            TrackChunk::Skipped(err) => {
                debug!(%err, "skipped non-MIDI chunk");
                if first_skip.is_none() {
                    first_skip = Some(err);
                }
            }
        }
    }

    if tracks.is_empty() {
        let diagnostic = match first_skip {
            Some(err) => format!("first chunk error: {err}"),
            None => "header declared no tracks".to_string(),
        };
        return Err(ErrorKind::NoMidiTracks(diagnostic).into());
    }

    Ok(File { header, tracks })
}

/// Read one chunk in track position. Errors inside a recognized `MTrk`
/// always propagate; anything that prevents recognizing the chunk as a
/// track is a skip in tolerant mode and an error in strict mode.
fn parse_track_chunk(r: &mut impl Read, strict: bool) -> Result<TrackChunk> {
    let mut tag = [0u8; 4];
    if let Err(err) = read_exact(r, &mut tag) {
        if strict {
            return Err(err);
        }
        return Ok(TrackChunk::Skipped(err));
    }

    if &tag != b"MTrk" {
        let err = Error::from(ErrorKind::UnknownChunk { tag });
        if strict {
            return Err(err);
        }
        // Skip the sized chunk body so the stream stays aligned.
        if let Err(skip_err) = skip_sized_chunk(r) {
            return Ok(TrackChunk::Skipped(skip_err));
        }
        return Ok(TrackChunk::Skipped(err));
    }

    let length = read_u32(r)?;
    let mut body = LimitReader::new(r, length as u64);
    let events = parse_track_body(&mut body)?;
    Ok(TrackChunk::Midi(Track::new(events)))
}

fn skip_sized_chunk(r: &mut impl Read) -> Result<()> {
    let length = read_u32(r)?;
    let skipped = LimitReader::new(r, length as u64).skip_remaining()?;
    if skipped < length as u64 {
        return Err(ErrorKind::ShortRead {
            want: length as u64,
            got: skipped,
        }
        .into());
    }
    Ok(())
}

/// Parse one track body: alternating varint time-deltas and events, until
/// the body's read window is exhausted.
pub(crate) fn parse_track_body(r: &mut impl Read) -> Result<Vec<Event>> {
    let mut parser = EventParser::new();
    let mut events = Vec::new();
    loop {
        let delta = match try_read_varlen(r)? {
            None => break,
            Some(delta) => delta,
        };
        trace!(delta, "time delta");
        if delta > 0 {
            events.push(Event::TimeDelta(delta));
        }

        loop {
            let byte = read_u8(r)?;
            if let Some(raw) = parser.feed_byte(byte)? {
                let event = Event::from_raw(raw)?;
                trace!(%event, "parsed event");
                events.push(event);
                break;
            }
        }
    }
    parser.finish()?;
    Ok(events)
}
