//! The typed event model, the presenter that builds it from raw parser
//! output, and the encoder that turns it back into wire bytes.

use std::fmt;

use crate::error::{ErrorKind, Result};
use crate::primitive::write_varlen;
use crate::stream::RawEvent;

/// Micros per quarter-note assumed until a tempo meta event says otherwise
/// (120 bpm, i.e. half a second per quarter-note).
pub const DEFAULT_MICROS_PER_BEAT: u32 = 500_000;

/// The kind of a channel-voice event, i.e. the high nibble of its status
/// byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MidiEventKind {
    #[default]
    NoteOff,
    NoteOn,
    Aftertouch,
    ControllerChange,
    ProgramChange,
    ChannelPressure,
    PitchBend,
}

impl MidiEventKind {
    /// The kind encoded by a status byte's high nibble, if any.
    pub fn from_status(status: u8) -> Option<MidiEventKind> {
        Some(match status & 0xF0 {
            0x80 => MidiEventKind::NoteOff,
            0x90 => MidiEventKind::NoteOn,
            0xA0 => MidiEventKind::Aftertouch,
            0xB0 => MidiEventKind::ControllerChange,
            0xC0 => MidiEventKind::ProgramChange,
            0xD0 => MidiEventKind::ChannelPressure,
            0xE0 => MidiEventKind::PitchBend,
            _ => return None,
        })
    }

    /// The status byte for this kind on channel 0.
    pub fn status_nibble(&self) -> u8 {
        match self {
            MidiEventKind::NoteOff => 0x80,
            MidiEventKind::NoteOn => 0x90,
            MidiEventKind::Aftertouch => 0xA0,
            MidiEventKind::ControllerChange => 0xB0,
            MidiEventKind::ProgramChange => 0xC0,
            MidiEventKind::ChannelPressure => 0xD0,
            MidiEventKind::PitchBend => 0xE0,
        }
    }

    /// How many data bytes an event of this kind carries.
    pub fn payload_len(&self) -> usize {
        match self {
            MidiEventKind::ProgramChange | MidiEventKind::ChannelPressure => 1,
            _ => 2,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            MidiEventKind::NoteOff => "NoteOff",
            MidiEventKind::NoteOn => "NoteOn",
            MidiEventKind::Aftertouch => "Aftertouch",
            MidiEventKind::ControllerChange => "ControllerChange",
            MidiEventKind::ProgramChange => "ProgramChange",
            MidiEventKind::ChannelPressure => "ChannelPressure",
            MidiEventKind::PitchBend => "PitchBend",
        }
    }
}

/// A channel-voice event.
///
/// Only the fields relevant to `kind` are meaningful; the rest are zero.
/// `raw_bytes` holds the original payload when the event came from the
/// parser, and may be `None` for events built by hand, in which case the
/// encoder derives the payload for note events and refuses everything else.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MidiEvent {
    pub kind: MidiEventKind,
    /// Channel number, `0..=15`.
    pub channel: u8,
    pub key: u8,
    pub velocity: u8,
    pub controller_number: u8,
    pub controller_value: u8,
    pub program_number: u8,
    pub raw_bytes: Option<Vec<u8>>,
}

impl MidiEvent {
    /// A NoteOn with no raw payload; the encoder derives `[key, velocity]`.
    pub fn note_on(channel: u8, key: u8, velocity: u8) -> MidiEvent {
        MidiEvent {
            kind: MidiEventKind::NoteOn,
            channel,
            key,
            velocity,
            ..MidiEvent::default()
        }
    }

    /// A NoteOff with no raw payload; the encoder derives `[key, velocity]`.
    pub fn note_off(channel: u8, key: u8, velocity: u8) -> MidiEvent {
        MidiEvent {
            kind: MidiEventKind::NoteOff,
            channel,
            key,
            velocity,
            ..MidiEvent::default()
        }
    }
}

/// A `0xFF`-prefixed meta event, stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaEvent {
    pub type_byte: u8,
    pub data: Vec<u8>,
}

impl MetaEvent {
    /// Meta type marking the end of a track.
    pub const END_OF_TRACK: u8 = 0x2F;
    /// Meta type carrying a tempo change.
    pub const TEMPO_SETTING: u8 = 0x51;

    /// The tempo in micros per quarter-note, if this is a well-formed
    /// tempo-change event.
    pub fn tempo(&self) -> Option<u32> {
        if self.type_byte != Self::TEMPO_SETTING || self.data.len() != 3 {
            return None;
        }
        Some(u32::from_be_bytes([
            0,
            self.data[0],
            self.data[1],
            self.data[2],
        ]))
    }

    /// The conventional name of this meta type, for the types the format
    /// defines.
    pub fn name(&self) -> Option<&'static str> {
        Some(match self.type_byte {
            0x00 => "SequenceNumber",
            0x01 => "TextEvent",
            0x02 => "CopyrightNotice",
            0x03 => "TrackName",
            0x04 => "InstrumentName",
            0x05 => "LyricText",
            0x06 => "MarkerText",
            0x07 => "CuePoint",
            0x20 => "ChannelPrefixAssignment",
            0x2F => "EndOfTrack",
            0x51 => "TempoSetting",
            0x54 => "SMPTEOffset",
            0x58 => "TimeSignature",
            0x59 => "KeySignature",
            0x7F => "SequencerSpecificEvent",
            _ => return None,
        })
    }
}

/// A system-exclusive event. `data` holds the payload exactly as stored in
/// the file, trailing `0xF7` terminator included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysexEvent {
    /// The framing status byte, `0xF0` or `0xF7`.
    pub framing: u8,
    pub data: Vec<u8>,
}

/// A single event in a track.
///
/// Time is carried in-band: a `TimeDelta` delays every later event in the
/// track. The parser elides zero-valued deltas; producers may include them
/// and the encoder will fold them away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// An inter-event delay in ticks.
    TimeDelta(u64),
    Midi(MidiEvent),
    Meta(MetaEvent),
    Sysex(SysexEvent),
}

impl Event {
    /// Present a raw parser event in typed form.
    ///
    /// Channel-voice payloads are validated against the length their kind
    /// implies, and the NoteOn-with-velocity-0 convention is normalized to a
    /// NoteOff with velocity `0x40` (the original payload stays available in
    /// `raw_bytes`).
    pub fn from_raw(raw: RawEvent) -> Result<Event> {
        match raw {
            RawEvent::Meta { type_byte, data } => Ok(Event::Meta(MetaEvent { type_byte, data })),
            RawEvent::Sysex { framing, data } => Ok(Event::Sysex(SysexEvent { framing, data })),
            RawEvent::Midi { status, data } => {
                let kind = MidiEventKind::from_status(status)
                    .ok_or(ErrorKind::UnknownRunningStatus { status })?;
                let mut event = MidiEvent {
                    kind,
                    channel: status & 0x0F,
                    ..MidiEvent::default()
                };

                let want = kind.payload_len();
                if data.len() != want {
                    return Err(ErrorKind::MidiPayloadLengthMismatch {
                        status,
                        want,
                        got: data.len(),
                    }
                    .into());
                }

                match kind {
                    MidiEventKind::NoteOn => {
                        event.key = data[0];
                        event.velocity = data[1];
                        // NoteOn with velocity 0 means release.
                        if event.velocity == 0 {
                            event.kind = MidiEventKind::NoteOff;
                            event.velocity = 0x40;
                        }
                    }
                    MidiEventKind::NoteOff | MidiEventKind::Aftertouch => {
                        event.key = data[0];
                        event.velocity = data[1];
                    }
                    MidiEventKind::ControllerChange => {
                        event.controller_number = data[0];
                        event.controller_value = data[1];
                    }
                    MidiEventKind::ProgramChange => {
                        event.program_number = data[0];
                    }
                    MidiEventKind::ChannelPressure => {
                        event.velocity = data[0];
                    }
                    MidiEventKind::PitchBend => {}
                }

                event.raw_bytes = Some(data);
                Ok(Event::Midi(event))
            }
        }
    }

    /// Append this event's wire bytes to `out`, without any preceding
    /// time-delta. `TimeDelta` itself encodes to nothing; deltas are handled
    /// by [`encode_track_body`].
    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Event::TimeDelta(_) => {}
            Event::Midi(event) => {
                out.push(event.kind.status_nibble() | (event.channel & 0x0F));
                match &event.raw_bytes {
                    Some(raw) => out.extend_from_slice(raw),
                    None => match event.kind {
                        MidiEventKind::NoteOn | MidiEventKind::NoteOff => {
                            out.extend_from_slice(&[event.key, event.velocity]);
                        }
                        kind => return Err(ErrorKind::EncodingUnsupported { kind }.into()),
                    },
                }
            }
            Event::Meta(event) => {
                out.push(0xFF);
                out.push(event.type_byte);
                write_varlen(out, event.data.len() as u64);
                out.extend_from_slice(&event.data);
            }
            Event::Sysex(event) => {
                out.push(event.framing);
                write_varlen(out, event.data.len() as u64);
                out.extend_from_slice(&event.data);
            }
        }
        Ok(())
    }
}

/// Encode a track's events as a track-body byte sequence.
///
/// Consecutive time-deltas merge into a single varint and zero deltas
/// disappear; a trailing delay with no event after it is dropped.
pub(crate) fn encode_track_body(events: &[Event]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut pending_delay: u64 = 0;
    for event in events {
        if let Event::TimeDelta(ticks) = event {
            pending_delay = pending_delay.saturating_add(*ticks);
            continue;
        }
        write_varlen(&mut out, pending_delay);
        pending_delay = 0;
        event.encode(&mut out)?;
    }
    Ok(out)
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::TimeDelta(ticks) => write!(f, "TimeDelta {ticks}"),
            Event::Midi(event) => event.fmt(f),
            Event::Meta(event) => event.fmt(f),
            Event::Sysex(event) => event.fmt(f),
        }
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MIDI ch={} ", self.channel)?;
        match self.kind {
            MidiEventKind::NoteOn | MidiEventKind::NoteOff => {
                write!(f, "{} k={:02x} v={:02x}", self.kind.name(), self.key, self.velocity)
            }
            kind => {
                write!(f, "{}", kind.name())?;
                if let Some(raw) = &self.raw_bytes {
                    for byte in raw {
                        write!(f, " {byte:02x}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for MetaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => {
                write!(f, "Meta {name}")?;
                let text_like = name.ends_with("Text")
                    || name.ends_with("Name")
                    || name.starts_with("Text");
                if text_like {
                    return write!(f, " {:?}", String::from_utf8_lossy(&self.data));
                }
            }
            None => write!(f, "Meta Unknown:{:02x}", self.type_byte)?,
        }
        for byte in &self.data {
            write!(f, " {byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for SysexEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SysEx {:02x}", self.framing)?;
        for byte in &self.data {
            write!(f, " {byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::RawEvent;

    fn present_midi(status: u8, data: &[u8]) -> MidiEvent {
        match Event::from_raw(RawEvent::Midi {
            status,
            data: data.to_vec(),
        })
        .unwrap()
        {
            Event::Midi(event) => event,
            other => panic!("presented as {other:?}"),
        }
    }

    #[test]
    fn note_on_fields() {
        let event = present_midi(0x93, &[0x3C, 0x7F]);
        assert_eq!(event.kind, MidiEventKind::NoteOn);
        assert_eq!(event.channel, 3);
        assert_eq!(event.key, 0x3C);
        assert_eq!(event.velocity, 0x7F);
        assert_eq!(event.raw_bytes.as_deref(), Some(&[0x3C, 0x7F][..]));
    }

    #[test]
    fn note_on_velocity_zero_presents_as_note_off() {
        let event = present_midi(0x9C, &[0x45, 0x00]);
        assert_eq!(event.kind, MidiEventKind::NoteOff);
        assert_eq!(event.channel, 0x0C);
        assert_eq!(event.key, 0x45);
        assert_eq!(event.velocity, 0x40);
        // The wire payload is kept as-is.
        assert_eq!(event.raw_bytes.as_deref(), Some(&[0x45, 0x00][..]));
    }

    #[test]
    fn controller_and_program_fields() {
        let event = present_midi(0xB1, &[0x07, 0x64]);
        assert_eq!(event.kind, MidiEventKind::ControllerChange);
        assert_eq!(event.controller_number, 0x07);
        assert_eq!(event.controller_value, 0x64);

        let event = present_midi(0xC9, &[0x12]);
        assert_eq!(event.kind, MidiEventKind::ProgramChange);
        assert_eq!(event.program_number, 0x12);

        let event = present_midi(0xD0, &[0x33]);
        assert_eq!(event.kind, MidiEventKind::ChannelPressure);
        assert_eq!(event.velocity, 0x33);
    }

    #[test]
    fn pitch_bend_keeps_only_raw_bytes() {
        let event = present_midi(0xE2, &[0x00, 0x40]);
        assert_eq!(event.kind, MidiEventKind::PitchBend);
        assert_eq!(event.raw_bytes.as_deref(), Some(&[0x00, 0x40][..]));
    }

    #[test]
    fn wrong_payload_length_is_rejected() {
        let err = Event::from_raw(RawEvent::Midi {
            status: 0x90,
            data: vec![0x3C],
        })
        .unwrap_err();
        assert!(matches!(
            err.kind(),
            crate::ErrorKind::MidiPayloadLengthMismatch {
                status: 0x90,
                want: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn tempo_accessor() {
        let tempo = MetaEvent {
            type_byte: 0x51,
            data: vec![0x05, 0xE3, 0x8B],
        };
        assert_eq!(tempo.tempo(), Some(386_443));

        let wrong_type = MetaEvent {
            type_byte: 0x2F,
            data: vec![0x05, 0xE3, 0x8B],
        };
        assert_eq!(wrong_type.tempo(), None);

        let wrong_len = MetaEvent {
            type_byte: 0x51,
            data: vec![0x05, 0xE3],
        };
        assert_eq!(wrong_len.tempo(), None);
    }

    #[test]
    fn encoder_derives_note_payloads() {
        let mut out = Vec::new();
        Event::Midi(MidiEvent::note_on(2, 0x3C, 0x7F))
            .encode(&mut out)
            .unwrap();
        Event::Midi(MidiEvent::note_off(2, 0x3C, 0x40))
            .encode(&mut out)
            .unwrap();
        assert_eq!(out, [0x92, 0x3C, 0x7F, 0x82, 0x3C, 0x40]);
    }

    #[test]
    fn encoder_refuses_underivable_kinds() {
        let event = Event::Midi(MidiEvent {
            kind: MidiEventKind::PitchBend,
            channel: 1,
            ..MidiEvent::default()
        });
        let err = event.encode(&mut Vec::new()).unwrap_err();
        assert!(matches!(
            err.kind(),
            crate::ErrorKind::EncodingUnsupported {
                kind: MidiEventKind::PitchBend
            }
        ));
    }

    #[test]
    fn track_body_encoder_merges_and_elides_deltas() {
        let events = vec![
            Event::TimeDelta(3),
            Event::TimeDelta(7),
            Event::Midi(MidiEvent::note_on(0, 0x3C, 0x7F)),
            Event::TimeDelta(0),
            Event::Midi(MidiEvent::note_off(0, 0x3C, 0x40)),
            Event::TimeDelta(99), // trailing delay is dropped
        ];
        let body = encode_track_body(&events).unwrap();
        assert_eq!(
            body,
            [0x0A, 0x90, 0x3C, 0x7F, 0x00, 0x80, 0x3C, 0x40]
        );
    }

    #[test]
    fn display_rendering() {
        let note = Event::Midi(MidiEvent::note_on(0, 0x3C, 0x7F));
        assert_eq!(note.to_string(), "MIDI ch=0 NoteOn k=3c v=7f");

        let name = Event::Meta(MetaEvent {
            type_byte: 0x03,
            data: b"piano".to_vec(),
        });
        assert_eq!(name.to_string(), "Meta TrackName \"piano\"");

        let tempo = Event::Meta(MetaEvent {
            type_byte: 0x51,
            data: vec![0x05, 0xE3, 0x8B],
        });
        assert_eq!(tempo.to_string(), "Meta TempoSetting 05 e3 8b");

        let unknown = Event::Meta(MetaEvent {
            type_byte: 0x42,
            data: vec![0x01],
        });
        assert_eq!(unknown.to_string(), "Meta Unknown:42 01");

        assert_eq!(Event::TimeDelta(10).to_string(), "TimeDelta 10");
    }
}
