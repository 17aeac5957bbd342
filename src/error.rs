use thiserror::Error;

use crate::tls::alert::AlertDescription;

/// Record-layer and framing violations. Always fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// Content type byte outside 20..=23.
    UnknownContentType(u8),
    /// Record version major byte is not 3.
    BadRecordVersion(u16),
    /// Length field exceeds the maximum record payload.
    RecordOverflow { length: usize },
    /// AEAD authentication failed, or the fragment is too short to carry a tag.
    BadRecordMac,
    /// The 64-bit sequence number space is used up; the connection must not continue.
    SequenceExhausted,
    /// A record arrived whose content type is not valid in the current state.
    UnexpectedMessage,
    /// A record body could not be decoded (empty handshake fragment, bad alert, bad CCS).
    DecodeError,
}

/// Reasons a handshake can fail before reaching Established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeFailureReason {
    /// The acceptable suite lists of the two peers do not intersect.
    NoCommonCipherSuite,
    /// The peer offered a protocol version below TLS 1.2.
    UnsupportedVersion,
    /// The peer's certificate chain was refused by the policy.
    CertificateRejected,
    /// The peer sent an empty chain where one is required.
    NoCertificate,
    /// The certificate carries a key type this engine cannot use.
    UnsupportedCertificate,
    /// Our credentials provider has nothing for any negotiable key type.
    CredentialsNotFound,
    /// A key exchange or CertificateVerify signature did not verify.
    BadSignature,
    /// The peer's Finished verify_data did not match.
    BadFinished,
    /// The peer's key share is invalid or produced a non-contributory secret.
    BadKeyShare,
    /// A handshake message could not be decoded.
    Malformed,
    /// A handshake message exceeded the reassembly limit.
    MessageTooLarge,
    /// A handshake message arrived out of order.
    UnexpectedMessage,
    /// A mandatory extension was not offered by the peer.
    MissingExtension,
    /// The server resumed a session with parameters that differ from the cached ones.
    ResumptionMismatch,
    /// The embedder refused the completed handshake.
    Vetoed,
}

/// Top-level crate error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Fatal record-layer error; the channel is closed.
    #[error("protocol error: {0:?}")]
    Protocol(ProtocolViolation),
    /// Fatal handshake error; the channel never reaches Established.
    #[error("handshake failure: {0:?}")]
    HandshakeFailure(HandshakeFailureReason),
    /// The peer sent a fatal alert.
    #[error("peer sent fatal alert: {0:?}")]
    PeerAlert(AlertDescription),
    /// Invalid state for the requested operation. The channel stays open.
    #[error("operation not valid in the current channel state")]
    InvalidState,
    /// The channel is closed.
    #[error("channel closed")]
    Closed,
    /// The credentials provider has no chain or key for the request.
    #[error("no credentials for the requested key type")]
    CredentialsNotFound,
    /// The primitive does not implement the requested operation.
    #[error("operation not supported")]
    UnsupportedOperation,
    /// The primitive does not accept this IV.
    #[error("invalid IV length {length}")]
    InvalidIv { length: usize },
    /// The primitive does not accept a key of this length.
    #[error("invalid key length {length}")]
    InvalidKeyLength { length: usize },
    /// A cryptographic operation failed.
    #[error("cryptographic error")]
    Crypto,
    /// A known-answer self test failed during `init()`.
    #[error("self test failed: {0}")]
    SelfTestFailed(&'static str),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

impl From<ProtocolViolation> for Error {
    fn from(v: ProtocolViolation) -> Self {
        Error::Protocol(v)
    }
}

impl From<HandshakeFailureReason> for Error {
    fn from(r: HandshakeFailureReason) -> Self {
        Error::HandshakeFailure(r)
    }
}

impl Error {
    /// Whether this error terminates the channel.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::InvalidState)
    }

    /// The fatal alert to send the peer for this error, if any.
    ///
    /// `PeerAlert` and `Closed` map to `None`: the peer already knows.
    pub fn alert(&self) -> Option<AlertDescription> {
        use HandshakeFailureReason as H;
        use ProtocolViolation as P;

        let desc = match self {
            Error::Protocol(P::BadRecordMac) => AlertDescription::BadRecordMac,
            Error::Protocol(P::RecordOverflow { .. }) => AlertDescription::RecordOverflow,
            Error::Protocol(P::UnexpectedMessage) => AlertDescription::UnexpectedMessage,
            Error::Protocol(P::SequenceExhausted) => AlertDescription::InternalError,
            Error::Protocol(P::UnknownContentType(_) | P::BadRecordVersion(_) | P::DecodeError) => {
                AlertDescription::DecodeError
            }
            Error::HandshakeFailure(reason) => match reason {
                H::UnsupportedVersion => AlertDescription::ProtocolVersion,
                H::CertificateRejected | H::NoCertificate => AlertDescription::BadCertificate,
                H::UnsupportedCertificate => AlertDescription::UnsupportedCertificate,
                H::BadSignature | H::BadFinished => AlertDescription::DecryptError,
                H::BadKeyShare => AlertDescription::IllegalParameter,
                H::Malformed | H::MessageTooLarge => AlertDescription::DecodeError,
                H::UnexpectedMessage => AlertDescription::UnexpectedMessage,
                H::ResumptionMismatch => AlertDescription::IllegalParameter,
                H::Vetoed => AlertDescription::UserCanceled,
                H::NoCommonCipherSuite | H::CredentialsNotFound | H::MissingExtension => {
                    AlertDescription::HandshakeFailure
                }
            },
            Error::CredentialsNotFound => AlertDescription::HandshakeFailure,
            Error::Crypto | Error::SelfTestFailed(_) => AlertDescription::InternalError,
            Error::UnsupportedOperation | Error::InvalidIv { .. } | Error::InvalidKeyLength { .. } => {
                AlertDescription::InternalError
            }
            Error::PeerAlert(_) | Error::Closed | Error::InvalidState => return None,
        };
        Some(desc)
    }
}
