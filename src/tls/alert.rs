//! TLS 1.2 alert protocol (RFC 5246 section 7.2).

use crate::error::{Error, ProtocolViolation, Result};

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertLevel {
    Warning = 1,
    Fatal = 2,
}

/// TLS alert description codes.
///
/// Descriptions this engine does not know are kept as `Unknown` so a fatal
/// alert from a newer peer still closes the channel with its raw code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDescription {
    CloseNotify,
    UnexpectedMessage,
    BadRecordMac,
    RecordOverflow,
    HandshakeFailure,
    BadCertificate,
    UnsupportedCertificate,
    CertificateExpired,
    CertificateUnknown,
    IllegalParameter,
    UnknownCa,
    AccessDenied,
    DecodeError,
    DecryptError,
    ProtocolVersion,
    InsufficientSecurity,
    InternalError,
    UserCanceled,
    NoRenegotiation,
    UnsupportedExtension,
    Unknown(u8),
}

impl AlertDescription {
    /// Convert from a raw u8 byte.
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::CloseNotify,
            10 => Self::UnexpectedMessage,
            20 => Self::BadRecordMac,
            22 => Self::RecordOverflow,
            40 => Self::HandshakeFailure,
            42 => Self::BadCertificate,
            43 => Self::UnsupportedCertificate,
            45 => Self::CertificateExpired,
            46 => Self::CertificateUnknown,
            47 => Self::IllegalParameter,
            48 => Self::UnknownCa,
            49 => Self::AccessDenied,
            50 => Self::DecodeError,
            51 => Self::DecryptError,
            70 => Self::ProtocolVersion,
            71 => Self::InsufficientSecurity,
            80 => Self::InternalError,
            90 => Self::UserCanceled,
            100 => Self::NoRenegotiation,
            110 => Self::UnsupportedExtension,
            other => Self::Unknown(other),
        }
    }

    /// Convert to raw u8 byte.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::CloseNotify => 0,
            Self::UnexpectedMessage => 10,
            Self::BadRecordMac => 20,
            Self::RecordOverflow => 22,
            Self::HandshakeFailure => 40,
            Self::BadCertificate => 42,
            Self::UnsupportedCertificate => 43,
            Self::CertificateExpired => 45,
            Self::CertificateUnknown => 46,
            Self::IllegalParameter => 47,
            Self::UnknownCa => 48,
            Self::AccessDenied => 49,
            Self::DecodeError => 50,
            Self::DecryptError => 51,
            Self::ProtocolVersion => 70,
            Self::InsufficientSecurity => 71,
            Self::InternalError => 80,
            Self::UserCanceled => 90,
            Self::NoRenegotiation => 100,
            Self::UnsupportedExtension => 110,
            Self::Unknown(v) => v,
        }
    }
}

/// A single alert message: two bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Alert {
    pub const fn fatal(description: AlertDescription) -> Self {
        Self { level: AlertLevel::Fatal, description }
    }

    pub const fn warning(description: AlertDescription) -> Self {
        Self { level: AlertLevel::Warning, description }
    }

    pub const fn close_notify() -> Self {
        Self::warning(AlertDescription::CloseNotify)
    }

    pub fn encode(&self) -> [u8; 2] {
        [self.level as u8, self.description.to_u8()]
    }

    /// Decode an alert record body. Exactly two bytes, known level.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let [level, desc] = data else {
            return Err(Error::Protocol(ProtocolViolation::DecodeError));
        };
        let level = match level {
            1 => AlertLevel::Warning,
            2 => AlertLevel::Fatal,
            _ => return Err(Error::Protocol(ProtocolViolation::DecodeError)),
        };
        Ok(Self { level, description: AlertDescription::from_u8(*desc) })
    }

    /// Fatal alerts and every alert other than `close_notify` /
    /// `no_renegotiation` / `user_canceled` end the connection.
    pub fn is_fatal(&self) -> bool {
        self.level == AlertLevel::Fatal
            || !matches!(
                self.description,
                AlertDescription::CloseNotify
                    | AlertDescription::NoRenegotiation
                    | AlertDescription::UserCanceled
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_known_codes() {
        for v in [0u8, 10, 20, 22, 40, 42, 43, 46, 47, 50, 51, 70, 80, 90, 100, 110] {
            let desc = AlertDescription::from_u8(v);
            assert!(!matches!(desc, AlertDescription::Unknown(_)), "code {v}");
            assert_eq!(desc.to_u8(), v);
        }
    }

    #[test]
    fn unknown_code_is_preserved() {
        assert_eq!(AlertDescription::from_u8(255), AlertDescription::Unknown(255));
        assert_eq!(AlertDescription::Unknown(255).to_u8(), 255);
    }

    #[test]
    fn parse_alert() {
        let alert = Alert::parse(&[2, 20]).unwrap();
        assert_eq!(alert, Alert::fatal(AlertDescription::BadRecordMac));
        assert!(alert.is_fatal());

        let close = Alert::parse(&Alert::close_notify().encode()).unwrap();
        assert!(!close.is_fatal());
    }

    #[test]
    fn parse_rejects_bad_length_and_level() {
        assert!(Alert::parse(&[2]).is_err());
        assert!(Alert::parse(&[2, 0, 0]).is_err());
        assert!(Alert::parse(&[3, 0]).is_err());
    }

    #[test]
    fn warning_with_unexpected_description_is_fatal() {
        assert!(Alert::warning(AlertDescription::BadCertificate).is_fatal());
        assert!(!Alert::warning(AlertDescription::NoRenegotiation).is_fatal());
    }
}
