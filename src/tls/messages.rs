//! TLS 1.2 handshake message encoding and decoding.
//!
//! Handshake message format:
//!   HandshakeType (1 byte)
//!   Length (3 bytes, big-endian)
//!   Body (Length bytes)

use crate::credentials::Certificate;
use crate::error::{Error, HandshakeFailureReason};
use crate::session::SessionId;
use crate::tls::cipher_suite::{ProtocolVersion, CURVE_TYPE_NAMED_CURVE};
use crate::tls::codec::{nested16, nested24, put_u16, put_u8, put_vec16, put_vec24, put_vec8, Reader};
use crate::tls::extensions::{ClientExtensions, ServerExtensions};

/// Handshake header: type + 24-bit length.
pub const HANDSHAKE_HEADER_LEN: usize = 4;

/// Largest handshake message body accepted for reassembly.
pub const MAX_HANDSHAKE_MESSAGE_LEN: usize = 64 * 1024;

/// Finished verify_data length.
pub const VERIFY_DATA_LEN: usize = 12;

/// TLS_EMPTY_RENEGOTIATION_INFO_SCSV (RFC 5746).
pub const EMPTY_RENEGOTIATION_INFO_SCSV: u16 = 0x00ff;

/// `CompressionMethod.null`
pub const COMPRESSION_NULL: u8 = 0;

fn malformed() -> Error {
    Error::HandshakeFailure(HandshakeFailureReason::Malformed)
}

/// TLS handshake message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
}

impl HandshakeType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::HelloRequest),
            1 => Some(Self::ClientHello),
            2 => Some(Self::ServerHello),
            11 => Some(Self::Certificate),
            12 => Some(Self::ServerKeyExchange),
            13 => Some(Self::CertificateRequest),
            14 => Some(Self::ServerHelloDone),
            15 => Some(Self::CertificateVerify),
            16 => Some(Self::ClientKeyExchange),
            20 => Some(Self::Finished),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub version: ProtocolVersion,
    pub random: [u8; 32],
    pub session_id: SessionId,
    pub cipher_suites: Vec<u16>,
    pub compression_methods: Vec<u8>,
    pub extensions: ClientExtensions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub version: ProtocolVersion,
    pub random: [u8; 32],
    pub session_id: SessionId,
    pub cipher_suite: u16,
    pub compression_method: u8,
    pub extensions: ServerExtensions,
}

/// Certificate message: end-entity first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePayload {
    pub chain: Vec<Certificate>,
}

/// ECDHE ServerKeyExchange with a named curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKeyExchange {
    pub named_group: u16,
    pub public: Vec<u8>,
    pub scheme: u16,
    pub signature: Vec<u8>,
}

impl ServerKeyExchange {
    /// Encoded `ServerECDHParams`: curve type, group, public point.
    pub fn params(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.public.len());
        put_u8(&mut out, CURVE_TYPE_NAMED_CURVE);
        put_u16(&mut out, self.named_group);
        put_vec8(&mut out, &self.public);
        out
    }

    /// The bytes covered by the signature.
    pub fn signed_content(client_random: &[u8; 32], server_random: &[u8; 32], params: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + params.len());
        out.extend_from_slice(client_random);
        out.extend_from_slice(server_random);
        out.extend_from_slice(params);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub certificate_types: Vec<u8>,
    pub signature_algorithms: Vec<u16>,
    /// DER-encoded distinguished names, usually empty.
    pub authorities: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKeyExchange {
    pub public: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerify {
    pub scheme: u16,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: [u8; VERIFY_DATA_LEN],
}

/// Any handshake message this engine sends or understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeMessage {
    HelloRequest,
    ClientHello(ClientHello),
    ServerHello(ServerHello),
    Certificate(CertificatePayload),
    ServerKeyExchange(ServerKeyExchange),
    CertificateRequest(CertificateRequest),
    ServerHelloDone,
    ClientKeyExchange(ClientKeyExchange),
    CertificateVerify(CertificateVerify),
    Finished(Finished),
}

impl HandshakeMessage {
    pub fn handshake_type(&self) -> HandshakeType {
        match self {
            Self::HelloRequest => HandshakeType::HelloRequest,
            Self::ClientHello(_) => HandshakeType::ClientHello,
            Self::ServerHello(_) => HandshakeType::ServerHello,
            Self::Certificate(_) => HandshakeType::Certificate,
            Self::ServerKeyExchange(_) => HandshakeType::ServerKeyExchange,
            Self::CertificateRequest(_) => HandshakeType::CertificateRequest,
            Self::ServerHelloDone => HandshakeType::ServerHelloDone,
            Self::ClientKeyExchange(_) => HandshakeType::ClientKeyExchange,
            Self::CertificateVerify(_) => HandshakeType::CertificateVerify,
            Self::Finished(_) => HandshakeType::Finished,
        }
    }

    /// Encode with the 4-byte handshake header.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        put_u8(&mut out, self.handshake_type() as u8);
        nested24(&mut out, |out| self.encode_body(out));
        out
    }

    fn encode_body(&self, out: &mut Vec<u8>) {
        match self {
            Self::HelloRequest | Self::ServerHelloDone => {}
            Self::ClientHello(ch) => {
                out.extend_from_slice(&ch.version.to_bytes());
                out.extend_from_slice(&ch.random);
                put_vec8(out, ch.session_id.as_bytes());
                nested16(out, |out| ch.cipher_suites.iter().for_each(|s| put_u16(out, *s)));
                put_vec8(out, &ch.compression_methods);
                ch.extensions.encode(out);
            }
            Self::ServerHello(sh) => {
                out.extend_from_slice(&sh.version.to_bytes());
                out.extend_from_slice(&sh.random);
                put_vec8(out, sh.session_id.as_bytes());
                put_u16(out, sh.cipher_suite);
                put_u8(out, sh.compression_method);
                sh.extensions.encode(out);
            }
            Self::Certificate(cert) => {
                nested24(out, |out| {
                    for c in &cert.chain {
                        put_vec24(out, c.as_der());
                    }
                });
            }
            Self::ServerKeyExchange(ske) => {
                out.extend_from_slice(&ske.params());
                put_u16(out, ske.scheme);
                put_vec16(out, &ske.signature);
            }
            Self::CertificateRequest(cr) => {
                put_vec8(out, &cr.certificate_types);
                nested16(out, |out| cr.signature_algorithms.iter().for_each(|s| put_u16(out, *s)));
                nested16(out, |out| cr.authorities.iter().for_each(|dn| put_vec16(out, dn)));
            }
            Self::ClientKeyExchange(cke) => put_vec8(out, &cke.public),
            Self::CertificateVerify(cv) => {
                put_u16(out, cv.scheme);
                put_vec16(out, &cv.signature);
            }
            Self::Finished(fin) => out.extend_from_slice(&fin.verify_data),
        }
    }

    /// Parse a message body (after the 4-byte handshake header).
    pub fn parse(msg_type: u8, body: &[u8]) -> Result<Self, Error> {
        let ty = HandshakeType::from_u8(msg_type)
            .ok_or(Error::HandshakeFailure(HandshakeFailureReason::UnexpectedMessage))?;
        let mut r = Reader::new(body);
        let msg = match ty {
            HandshakeType::HelloRequest => Self::HelloRequest,
            HandshakeType::ServerHelloDone => Self::ServerHelloDone,
            HandshakeType::ClientHello => Self::ClientHello(parse_client_hello(&mut r)?),
            HandshakeType::ServerHello => Self::ServerHello(parse_server_hello(&mut r)?),
            HandshakeType::Certificate => {
                let mut list = Reader::new(r.vec24()?);
                let mut chain = Vec::new();
                while !list.is_empty() {
                    let der = list.vec24()?;
                    if der.is_empty() {
                        return Err(malformed());
                    }
                    chain.push(Certificate::from_der(der.to_vec()));
                }
                Self::Certificate(CertificatePayload { chain })
            }
            HandshakeType::ServerKeyExchange => {
                if r.u8()? != CURVE_TYPE_NAMED_CURVE {
                    return Err(malformed());
                }
                let named_group = r.u16()?;
                let public = r.vec8()?.to_vec();
                let scheme = r.u16()?;
                let signature = r.vec16()?.to_vec();
                Self::ServerKeyExchange(ServerKeyExchange { named_group, public, scheme, signature })
            }
            HandshakeType::CertificateRequest => {
                let certificate_types = r.vec8()?.to_vec();
                let signature_algorithms = r.u16_list()?;
                let mut list = Reader::new(r.vec16()?);
                let mut authorities = Vec::new();
                while !list.is_empty() {
                    authorities.push(list.vec16()?.to_vec());
                }
                Self::CertificateRequest(CertificateRequest {
                    certificate_types,
                    signature_algorithms,
                    authorities,
                })
            }
            HandshakeType::ClientKeyExchange => {
                Self::ClientKeyExchange(ClientKeyExchange { public: r.vec8()?.to_vec() })
            }
            HandshakeType::CertificateVerify => Self::CertificateVerify(CertificateVerify {
                scheme: r.u16()?,
                signature: r.vec16()?.to_vec(),
            }),
            HandshakeType::Finished => Self::Finished(Finished { verify_data: r.array()? }),
        };
        r.finish()?;
        Ok(msg)
    }
}

fn parse_session_id(r: &mut Reader<'_>) -> Result<SessionId, Error> {
    SessionId::from_slice(r.vec8()?).ok_or_else(malformed)
}

fn parse_client_hello(r: &mut Reader<'_>) -> Result<ClientHello, Error> {
    let version = ProtocolVersion(r.u16()?);
    let random = r.array()?;
    let session_id = parse_session_id(r)?;
    let cipher_suites = r.u16_list()?;
    if cipher_suites.is_empty() {
        return Err(malformed());
    }
    let compression_methods = r.vec8()?.to_vec();
    if compression_methods.is_empty() {
        return Err(malformed());
    }
    let mut extensions = ClientExtensions::parse(r)?;
    if cipher_suites.contains(&EMPTY_RENEGOTIATION_INFO_SCSV) {
        extensions.renegotiation_info = true;
    }
    Ok(ClientHello { version, random, session_id, cipher_suites, compression_methods, extensions })
}

fn parse_server_hello(r: &mut Reader<'_>) -> Result<ServerHello, Error> {
    Ok(ServerHello {
        version: ProtocolVersion(r.u16()?),
        random: r.array()?,
        session_id: parse_session_id(r)?,
        cipher_suite: r.u16()?,
        compression_method: r.u8()?,
        extensions: ServerExtensions::parse(r)?,
    })
}

/// Read the handshake header: returns `(type_byte, body_length)`, or `None`
/// if fewer than four bytes are available.
pub fn read_handshake_header(data: &[u8]) -> Option<(u8, usize)> {
    if data.len() < HANDSHAKE_HEADER_LEN {
        return None;
    }
    let length = ((data[1] as usize) << 16) | ((data[2] as usize) << 8) | (data[3] as usize);
    Some((data[0], length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::cipher_suite::{CipherSuite, NAMED_GROUP_X25519};

    fn reparse(msg: &HandshakeMessage) -> HandshakeMessage {
        let encoded = msg.encode();
        let (ty, len) = read_handshake_header(&encoded).unwrap();
        assert_eq!(len, encoded.len() - HANDSHAKE_HEADER_LEN);
        HandshakeMessage::parse(ty, &encoded[HANDSHAKE_HEADER_LEN..]).unwrap()
    }

    fn client_hello() -> ClientHello {
        ClientHello {
            version: ProtocolVersion::TLS12,
            random: [0x11; 32],
            session_id: SessionId::from_slice(&[0x22; 32]).unwrap(),
            cipher_suites: CipherSuite::ALL.iter().map(|s| s.to_u16()).collect(),
            compression_methods: vec![COMPRESSION_NULL],
            extensions: ClientExtensions::offer(Some("localhost"), vec![0x0807, 0x0403]),
        }
    }

    #[test]
    fn client_hello_roundtrip() {
        let msg = HandshakeMessage::ClientHello(client_hello());
        assert_eq!(reparse(&msg), msg);
    }

    #[test]
    fn client_hello_wire_layout() {
        let encoded = HandshakeMessage::ClientHello(client_hello()).encode();
        assert_eq!(encoded[0], HandshakeType::ClientHello as u8);
        assert_eq!(&encoded[4..6], &[0x03, 0x03]);
        assert_eq!(&encoded[6..38], &[0x11; 32]);
        assert_eq!(encoded[38], 32);
    }

    #[test]
    fn scsv_marks_secure_renegotiation() {
        let mut ch = client_hello();
        ch.extensions.renegotiation_info = false;
        ch.cipher_suites.push(EMPTY_RENEGOTIATION_INFO_SCSV);
        let HandshakeMessage::ClientHello(parsed) = reparse(&HandshakeMessage::ClientHello(ch)) else {
            panic!("expected ClientHello");
        };
        assert!(parsed.extensions.renegotiation_info);
    }

    #[test]
    fn client_hello_without_suites_is_malformed() {
        let mut ch = client_hello();
        ch.cipher_suites.clear();
        let encoded = HandshakeMessage::ClientHello(ch).encode();
        assert_eq!(
            HandshakeMessage::parse(1, &encoded[4..]),
            Err(Error::HandshakeFailure(HandshakeFailureReason::Malformed))
        );
    }

    #[test]
    fn server_key_exchange_roundtrip() {
        let ske = ServerKeyExchange {
            named_group: NAMED_GROUP_X25519,
            public: vec![9; 32],
            scheme: 0x0807,
            signature: vec![7; 64],
        };
        let params = ske.params();
        assert_eq!(&params[..4], &[3, 0x00, 0x1d, 32]);
        let msg = HandshakeMessage::ServerKeyExchange(ske);
        assert_eq!(reparse(&msg), msg);
    }

    #[test]
    fn certificate_and_request_roundtrip() {
        let cert = HandshakeMessage::Certificate(CertificatePayload {
            chain: vec![Certificate::from_der(vec![0x30, 0x00]), Certificate::from_der(vec![1, 2, 3])],
        });
        assert_eq!(reparse(&cert), cert);

        let empty = HandshakeMessage::Certificate(CertificatePayload { chain: vec![] });
        assert_eq!(reparse(&empty), empty);

        let req = HandshakeMessage::CertificateRequest(CertificateRequest {
            certificate_types: vec![64],
            signature_algorithms: vec![0x0807, 0x0403],
            authorities: vec![],
        });
        assert_eq!(reparse(&req), req);
    }

    #[test]
    fn small_messages_roundtrip() {
        for msg in [
            HandshakeMessage::ServerHelloDone,
            HandshakeMessage::ClientKeyExchange(ClientKeyExchange { public: vec![5; 32] }),
            HandshakeMessage::CertificateVerify(CertificateVerify { scheme: 0x0403, signature: vec![1; 70] }),
            HandshakeMessage::Finished(Finished { verify_data: [3; 12] }),
        ] {
            assert_eq!(reparse(&msg), msg);
        }
    }

    #[test]
    fn trailing_bytes_are_malformed() {
        assert!(HandshakeMessage::parse(HandshakeType::Finished as u8, &[0; 13]).is_err());
        assert!(HandshakeMessage::parse(HandshakeType::ServerHelloDone as u8, &[0]).is_err());
    }

    #[test]
    fn unknown_type_is_unexpected() {
        assert_eq!(
            HandshakeMessage::parse(99, &[]),
            Err(Error::HandshakeFailure(HandshakeFailureReason::UnexpectedMessage))
        );
    }

    #[test]
    fn oversized_session_id_is_malformed() {
        let mut body = vec![0x03, 0x03];
        body.extend_from_slice(&[0; 32]);
        body.push(33);
        body.extend_from_slice(&[0; 33]);
        body.extend_from_slice(&[0xc0, 0x2b, 0x00]);
        assert!(HandshakeMessage::parse(HandshakeType::ServerHello as u8, &body).is_err());
    }
}
