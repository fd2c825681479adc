//! Error types for Cadenza.

use thiserror::Error;

/// Result type alias using Cadenza's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure error type (configuration, IO, execution contexts).
///
/// Playback failures surfaced to observers use [`PlayerError`] instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Execution context error: {0}")]
    Dispatch(String),
}

/// Failures reported to player observers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    #[error("Couldn't parse the bytes from the stream. Status: {0}")]
    StreamParse(FileStreamError),

    #[error("{0}")]
    AudioSystem(AudioSystemError),

    #[error("Codec error while parsing data packets")]
    Codec,

    #[error("No data supplied from network stream")]
    DataNotFound,

    #[error("{0}")]
    Network(NetworkError),

    #[error("Audio Player error")]
    Other,
}

impl PlayerError {
    /// Returns true if this error originated in the network layer.
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Returns true if retrying the same entry may succeed.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DataNotFound
                | Self::Network(NetworkError::Timeout | NetworkError::Failure(_))
                | Self::AudioSystem(AudioSystemError::SessionActivation)
        )
    }
}

impl From<NetworkError> for PlayerError {
    fn from(err: NetworkError) -> Self {
        Self::Network(err)
    }
}

impl From<AudioSystemError> for PlayerError {
    fn from(err: AudioSystemError) -> Self {
        Self::AudioSystem(err)
    }
}

/// Failures of the audio engine, session, and conversion stages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioSystemError {
    #[error("Audio engine couldn't start")]
    EngineFailure,

    #[error("Player not found")]
    PlayerNotFound,

    #[error("Player couldn't start")]
    PlayerStartError,

    #[error("Audio file stream error'd: {0}")]
    FileStream(FileStreamError),

    #[error("Audio converter error'd: {0}")]
    Converter(ConverterError),

    #[error("Audio session couldn't be activated")]
    SessionActivation,

    #[error("Audio session setup failed")]
    SessionSetupFailed,
}

/// Network layer failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Network failure: {0}")]
    Failure(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Request timeout")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,
}

/// Packs a four-character code into the big-endian status value the host
/// audio APIs report.
const fn fourcc(code: &[u8; 4]) -> i32 {
    i32::from_be_bytes(*code)
}

/// Bitstream parser failure kinds.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStreamError {
    #[error("the size of the buffer provided for property data was not correct")]
    BadPropertySize,
    #[error("insufficient data provided to the parser to produce any result")]
    DataUnavailable,
    #[error("a discontinuity occurred in the audio data and cannot be recovered")]
    DiscontinuityCantRecover,
    #[error("an illegal operation was attempted")]
    IllegalOperation,
    #[error("the file is malformed or not recognized as an audio file")]
    InvalidFile,
    #[error("a packet offset was out of range or a packet size was corrupt")]
    InvalidPacketOffset,
    #[error("packet table information is missing or appears after the audio data")]
    NotOptimized,
    #[error("an unspecified error has occurred")]
    Unspecified,
    #[error("the data format is not supported by the file type")]
    UnsupportedDataFormat,
    #[error("the file type is not supported")]
    UnsupportedFileType,
    #[error("the property is not supported")]
    UnsupportedProperty,
    #[error("the property value is not present before the audio data")]
    ValueUnknown,
    #[error("an unknown error occurred")]
    Unknown,
    #[error("no error")]
    NoError,
}

impl FileStreamError {
    /// Map a parser status code to its failure kind.
    pub const fn from_status(status: i32) -> Self {
        match status {
            0 => Self::NoError,
            s if s == fourcc(b"typ?") => Self::UnsupportedFileType,
            s if s == fourcc(b"fmt?") => Self::UnsupportedDataFormat,
            s if s == fourcc(b"pty?") => Self::UnsupportedProperty,
            s if s == fourcc(b"!siz") => Self::BadPropertySize,
            s if s == fourcc(b"optm") => Self::NotOptimized,
            s if s == fourcc(b"pck?") => Self::InvalidPacketOffset,
            s if s == fourcc(b"dta?") => Self::InvalidFile,
            s if s == fourcc(b"unk?") => Self::ValueUnknown,
            s if s == fourcc(b"more") => Self::DataUnavailable,
            s if s == fourcc(b"nope") => Self::IllegalOperation,
            s if s == fourcc(b"wht?") => Self::Unspecified,
            s if s == fourcc(b"dsc!") => Self::DiscontinuityCantRecover,
            _ => Self::Unknown,
        }
    }
}

/// Sample format converter failure kinds.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConverterError {
    #[error("Bad property size")]
    BadPropertySize,
    #[error("Format not supported")]
    FormatNotSupported,
    #[error("Input sample rate is out of range")]
    InputSampleRateOutOfRange,
    #[error("Invalid input size")]
    InvalidInputSize,
    #[error("The byte size is not an integer multiple of the frame size")]
    InvalidOutputSize,
    #[error("Operation not supported")]
    OperationNotSupported,
    #[error("Output sample rate out of range")]
    OutputSampleRateOutOfRange,
    #[error("Property not supported")]
    PropertyNotSupported,
    #[error("Required packet descriptions")]
    RequiresPacketDescriptions,
    #[error("Unspecified error")]
    Unspecified,
}

impl ConverterError {
    /// Map a converter status code to its failure kind.
    ///
    /// Unrecognised codes collapse into [`ConverterError::Unspecified`].
    pub const fn from_status(status: i32) -> Self {
        match status {
            s if s == fourcc(b"!siz") => Self::BadPropertySize,
            s if s == fourcc(b"fmt?") => Self::FormatNotSupported,
            s if s == fourcc(b"!isr") => Self::InputSampleRateOutOfRange,
            s if s == fourcc(b"insz") => Self::InvalidInputSize,
            s if s == fourcc(b"otsz") => Self::InvalidOutputSize,
            s if s == fourcc(b"op??") => Self::OperationNotSupported,
            s if s == fourcc(b"!osr") => Self::OutputSampleRateOutOfRange,
            s if s == fourcc(b"prop") => Self::PropertyNotSupported,
            s if s == fourcc(b"!pkd") => Self::RequiresPacketDescriptions,
            _ => Self::Unspecified,
        }
    }
}

/// Cursor buffer contract violations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    #[error("Buffer overflow: {requested} bytes requested, {remaining} bytes of capacity left")]
    Overflow { requested: usize, remaining: usize },

    #[error("Buffer underflow: {requested} bytes requested, {available} bytes available")]
    Underflow { requested: usize, available: usize },
}
