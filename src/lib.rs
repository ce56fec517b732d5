//! # Overview
//!
//! `midifile` is a parser and writer for the Standard MIDI File format
//! (`.mid` files), built around a streaming, byte-fed event core.
//!
//! Parsing works from any [`std::io::Read`] source and produces a [`File`]
//! holding owned, typed events:
//!
//! ```
//! use midifile::File;
//!
//! let bytes: &[u8] = &[
//!     0x4D, 0x54, 0x68, 0x64, 0x00, 0x00, 0x00, 0x06, // MThd
//!     0x00, 0x00, 0x00, 0x01, 0x00, 0xC0,             // format 0, 1 track
//!     0x4D, 0x54, 0x72, 0x6B, 0x00, 0x00, 0x00, 0x04, // MTrk
//!     0x00, 0xFF, 0x2F, 0x00,                         // EndOfTrack
//! ];
//! let file = File::parse(bytes).unwrap();
//!
//! for (i, track) in file.tracks.iter().enumerate() {
//!     println!("track {} has {} events", i, track.events.len());
//! }
//! ```
//!
//! Writing is the inverse: [`File::write`] encodes to any
//! [`std::io::Write`] sink, emitting well-formed chunked output. Time
//! inside a track is carried by
//! [`Event::TimeDelta`] events; [`File::walk_track`] converts those ticks
//! to wall-clock seconds, honoring tempo changes:
//!
//! ```
//! # use midifile::File;
//! # let bytes: &[u8] = &[
//! #     0x4D, 0x54, 0x68, 0x64, 0x00, 0x00, 0x00, 0x06,
//! #     0x00, 0x00, 0x00, 0x01, 0x00, 0xC0,
//! #     0x4D, 0x54, 0x72, 0x6B, 0x00, 0x00, 0x00, 0x04,
//! #     0x00, 0xFF, 0x2F, 0x00,
//! # ];
//! # let file = File::parse(bytes).unwrap();
//! file.walk_track(0, |seconds, event| {
//!     println!("{seconds:8.3}s {event}");
//!     Ok(())
//! })
//! .unwrap();
//! ```
//!
//! # Streaming
//!
//! The event layer is usable on its own: [`stream::EventParser`] accepts
//! track-body bytes one at a time and emits raw events as soon as they are
//! complete, which suits sources that are not seekable or not fully
//! buffered. [`Event::from_raw`] lifts raw events into the typed model.
//!
//! # Errors
//!
//! Everything fallible returns [`Result`]. Errors surfaced by
//! [`File::parse`] are decorated with the byte offset where parsing stopped
//! and a short hex tail of the stream, which is usually enough to find the
//! offending bytes in a hex dump.

mod builder;
mod error;
mod event;
mod primitive;
mod smf;

pub mod reader;
pub mod stream;

pub use crate::builder::SimpleWriter;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::event::{
    Event, MetaEvent, MidiEvent, MidiEventKind, SysexEvent, DEFAULT_MICROS_PER_BEAT,
};
pub use crate::smf::{File, Header, Track};
