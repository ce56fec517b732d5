use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::event::MidiEventKind;

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// What exactly went wrong while reading or writing MIDI data.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A chunk tag or other fixed literal was not where it should be.
    #[error("expected {expected:?}, read {:?}", String::from_utf8_lossy(.found))]
    UnexpectedLiteral {
        expected: &'static str,
        found: Vec<u8>,
    },

    /// The underlying source ended in the middle of a fixed-size field.
    #[error("source ended after {got} of {want} byte(s)")]
    ShortRead { want: u64, got: u64 },

    /// The stream ended on a varint continuation byte.
    #[error("stream ended in the middle of a varint")]
    TruncatedVarint,

    /// A varint ran past the 5 bytes the encoding allows.
    #[error("varint longer than 5 bytes")]
    VarintOverflow,

    /// A new status byte arrived while a channel-voice payload was pending.
    #[error("status changed from {from:#04x} to {to:#04x} in the middle of an event")]
    RunningStatusInterrupted { from: u8, to: u8 },

    /// A data byte arrived with no usable running status.
    #[error("no channel-voice spec for running status {status:#04x}")]
    UnknownRunningStatus { status: u8 },

    /// The parser's payload buffer grew past the length the status implies.
    #[error("payload for status {status:#04x} already longer than {expected} byte(s)")]
    MidiPayloadOverflow { status: u8, expected: usize },

    /// A channel-voice payload had the wrong size for its event kind.
    #[error("{status:#04x}: want payload length {want}, got {got}")]
    MidiPayloadLengthMismatch { status: u8, want: usize, got: usize },

    /// The track body ended while the parser was mid-event.
    #[error("track ended in the middle of an event (parser in {state})")]
    TruncatedEvent { state: &'static str },

    /// Strict mode only: a chunk after the header was not an `MTrk`.
    #[error("unknown chunk tag {:?}", String::from_utf8_lossy(.tag))]
    UnknownChunk { tag: [u8; 4] },

    /// The header promised tracks but no `MTrk` chunk was found.
    #[error("no MIDI tracks found: {0}")]
    NoMidiTracks(String),

    /// The time walker was asked for a track that does not exist.
    #[error("no such track: {index} (there are {count})")]
    NoSuchTrack { index: usize, count: usize },

    /// The time walker does not interpret SMPTE timecode divisions.
    #[error("SMPTE timecode division ({0}) is unsupported")]
    SmpteUnsupported(i16),

    /// The encoder cannot derive wire bytes for this event kind.
    #[error("encoding not implemented for {kind:?} events without raw bytes")]
    EncodingUnsupported { kind: MidiEventKind },

    /// An error bubbled up from the byte source or sink.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An error, optionally decorated with where in the stream it happened.
///
/// Errors surfaced by [`File::parse`](crate::File::parse) carry the total
/// byte offset and a rolling tail of the last bytes read, so a corrupt file
/// can be diagnosed without opening it in a hex editor:
///
/// ```text
/// after 22 bytes (last: 4d 54 72 6b 00 00 00 04 00 ff 2f): track ended in the middle of an event
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    context: Option<ReadContext>,
}

#[derive(Debug, Clone)]
pub(crate) struct ReadContext {
    pub(crate) offset: u64,
    pub(crate) tail: Vec<u8>,
}

impl Error {
    /// The kind of failure this error represents.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The total number of bytes consumed before the failure, if this error
    /// was decorated by a public entry point.
    pub fn offset(&self) -> Option<u64> {
        self.context.as_ref().map(|ctx| ctx.offset)
    }

    // Decoration happens once: an error that already carries context keeps it.
    pub(crate) fn with_context(mut self, ctx: ReadContext) -> Error {
        if self.context.is_none() {
            self.context = Some(ctx);
        }
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(ctx) => {
                write!(f, "after {} bytes (last:", ctx.offset)?;
                for byte in &ctx.tail {
                    write!(f, " {byte:02x}")?;
                }
                write!(f, "): {}", self.kind)
            }
            None => fmt::Display::fmt(&self.kind, f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.kind.source()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            kind,
            context: None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::from(ErrorKind::Io(err))
    }
}
