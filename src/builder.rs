//! A small convenience façade for producing single-track files without
//! touching the event model directly.

use std::io::Write;

use crate::error::Result;
use crate::event::{Event, MidiEvent};
use crate::smf::{File, Header, Track};

/// Builds a format-0, single-track file from chords and rests.
///
/// Useful for generating simple sequences programmatically:
///
/// ```
/// use midifile::SimpleWriter;
///
/// let mut writer = SimpleWriter::new(96);
/// writer.play(&[60, 64, 67], 0x60, 96); // a C major chord, one beat
/// writer.time_delta(48);
/// writer.play(&[62], 0x60, 96);
///
/// let mut bytes = Vec::new();
/// writer.write(&mut bytes).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct SimpleWriter {
    division: i16,
    events: Vec<Event>,
}

impl SimpleWriter {
    /// Create a writer with the given ticks-per-quarter-note division.
    pub fn new(division: i16) -> SimpleWriter {
        SimpleWriter {
            division,
            events: Vec::new(),
        }
    }

    /// Sound `keys` together at `velocity` for `duration` ticks, releasing
    /// them all afterwards.
    pub fn play(&mut self, keys: &[u8], velocity: u8, duration: u64) {
        for &key in keys {
            self.events
                .push(Event::Midi(MidiEvent::note_on(0, key, velocity)));
        }
        self.time_delta(duration);
        for &key in keys {
            self.events
                .push(Event::Midi(MidiEvent::note_off(0, key, velocity)));
        }
    }

    /// Insert a rest of `duration` ticks before the next event.
    pub fn time_delta(&mut self, duration: u64) {
        self.events.push(Event::TimeDelta(duration));
    }

    /// Assemble and encode the file to `out`.
    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        let file = File {
            header: Header {
                format: 0,
                track_count: 1,
                division: self.division,
            },
            tracks: vec![Track::new(self.events.clone())],
        };
        file.write(out)
    }
}
