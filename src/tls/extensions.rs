//! Hello extension encoding and decoding.
//!
//! Extension format: type (2 bytes) + length (2 bytes) + data. Unknown
//! extensions are skipped; a repeated extension type is malformed.

use crate::error::{Error, HandshakeFailureReason};
use crate::tls::cipher_suite::{NAMED_GROUP_X25519, POINT_FORMAT_UNCOMPRESSED};
use crate::tls::codec::{nested16, put_u16, put_u8, put_vec16, put_vec8, Reader};

// Extension type codes
pub const EXT_SERVER_NAME: u16 = 0x0000;
pub const EXT_SUPPORTED_GROUPS: u16 = 0x000a;
pub const EXT_EC_POINT_FORMATS: u16 = 0x000b;
pub const EXT_SIGNATURE_ALGORITHMS: u16 = 0x000d;
pub const EXT_EXTENDED_MASTER_SECRET: u16 = 0x0017;
pub const EXT_RENEGOTIATION_INFO: u16 = 0xff01;

/// `NameType.host_name`
const SNI_HOST_NAME: u8 = 0;

fn malformed() -> Error {
    Error::HandshakeFailure(HandshakeFailureReason::Malformed)
}

/// Extensions carried by a ClientHello.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientExtensions {
    pub server_name: Option<String>,
    pub supported_groups: Option<Vec<u16>>,
    pub ec_point_formats: Option<Vec<u8>>,
    pub signature_algorithms: Option<Vec<u16>>,
    pub extended_master_secret: bool,
    /// Secure renegotiation signalled (extension or SCSV); the engine never renegotiates.
    pub renegotiation_info: bool,
}

impl ClientExtensions {
    /// What this engine offers as a client.
    pub fn offer(server_name: Option<&str>, signature_algorithms: Vec<u16>) -> Self {
        Self {
            server_name: server_name.map(str::to_owned),
            supported_groups: Some(vec![NAMED_GROUP_X25519]),
            ec_point_formats: Some(vec![POINT_FORMAT_UNCOMPRESSED]),
            signature_algorithms: Some(signature_algorithms),
            extended_master_secret: true,
            renegotiation_info: true,
        }
    }

    /// Whether the client can do X25519 ECDHE with uncompressed points.
    ///
    /// Absent lists mean the client did not restrict the choice.
    pub fn supports_x25519(&self) -> bool {
        let group_ok = self
            .supported_groups
            .as_ref()
            .map_or(true, |groups| groups.contains(&NAMED_GROUP_X25519));
        let format_ok = self
            .ec_point_formats
            .as_ref()
            .map_or(true, |formats| formats.contains(&POINT_FORMAT_UNCOMPRESSED));
        group_ok && format_ok
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        nested16(out, |out| {
            if let Some(name) = &self.server_name {
                put_u16(out, EXT_SERVER_NAME);
                nested16(out, |out| {
                    nested16(out, |out| {
                        put_u8(out, SNI_HOST_NAME);
                        put_vec16(out, name.as_bytes());
                    })
                });
            }
            if let Some(groups) = &self.supported_groups {
                put_u16(out, EXT_SUPPORTED_GROUPS);
                nested16(out, |out| nested16(out, |out| groups.iter().for_each(|g| put_u16(out, *g))));
            }
            if let Some(formats) = &self.ec_point_formats {
                put_u16(out, EXT_EC_POINT_FORMATS);
                nested16(out, |out| put_vec8(out, formats));
            }
            if let Some(schemes) = &self.signature_algorithms {
                put_u16(out, EXT_SIGNATURE_ALGORITHMS);
                nested16(out, |out| {
                    nested16(out, |out| schemes.iter().for_each(|s| put_u16(out, *s)))
                });
            }
            if self.extended_master_secret {
                put_u16(out, EXT_EXTENDED_MASTER_SECRET);
                put_u16(out, 0);
            }
            if self.renegotiation_info {
                put_u16(out, EXT_RENEGOTIATION_INFO);
                nested16(out, |out| put_vec8(out, &[]));
            }
        });
    }

    /// Parse the extensions block. An absent block (end of ClientHello) is empty.
    pub fn parse(r: &mut Reader<'_>) -> Result<Self, Error> {
        let mut ext = Self::default();
        if r.is_empty() {
            return Ok(ext);
        }
        let mut seen: Vec<u16> = Vec::new();
        let mut block = Reader::new(r.vec16()?);
        while !block.is_empty() {
            let ty = block.u16()?;
            let mut data = Reader::new(block.vec16()?);
            if seen.contains(&ty) {
                return Err(malformed());
            }
            seen.push(ty);

            match ty {
                EXT_SERVER_NAME => ext.server_name = parse_server_name(&mut data)?,
                EXT_SUPPORTED_GROUPS => ext.supported_groups = Some(data.u16_list()?),
                EXT_EC_POINT_FORMATS => ext.ec_point_formats = Some(data.vec8()?.to_vec()),
                EXT_SIGNATURE_ALGORITHMS => ext.signature_algorithms = Some(data.u16_list()?),
                EXT_EXTENDED_MASTER_SECRET => ext.extended_master_secret = true,
                EXT_RENEGOTIATION_INFO => {
                    // An initial handshake carries an empty renegotiated_connection.
                    if !data.vec8()?.is_empty() {
                        return Err(malformed());
                    }
                    ext.renegotiation_info = true;
                }
                _ => continue,
            }
            data.finish()?;
        }
        Ok(ext)
    }
}

fn parse_server_name(data: &mut Reader<'_>) -> Result<Option<String>, Error> {
    let mut list = Reader::new(data.vec16()?);
    let mut host = None;
    while !list.is_empty() {
        let name_type = list.u8()?;
        let name = list.vec16()?;
        if name_type == SNI_HOST_NAME && host.is_none() {
            let name = core::str::from_utf8(name).map_err(|_| malformed())?;
            if name.is_empty() {
                return Err(malformed());
            }
            host = Some(name.to_owned());
        }
    }
    Ok(host)
}

/// Extensions carried by a ServerHello.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerExtensions {
    pub extended_master_secret: bool,
    pub renegotiation_info: bool,
    pub ec_point_formats: Option<Vec<u8>>,
}

impl ServerExtensions {
    /// Echo what the client offered, limited to what this engine supports.
    pub fn answer(client: &ClientExtensions) -> Self {
        Self {
            extended_master_secret: client.extended_master_secret,
            renegotiation_info: client.renegotiation_info,
            ec_point_formats: client
                .ec_point_formats
                .as_ref()
                .map(|_| vec![POINT_FORMAT_UNCOMPRESSED]),
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        nested16(out, |out| {
            if self.renegotiation_info {
                put_u16(out, EXT_RENEGOTIATION_INFO);
                nested16(out, |out| put_vec8(out, &[]));
            }
            if let Some(formats) = &self.ec_point_formats {
                put_u16(out, EXT_EC_POINT_FORMATS);
                nested16(out, |out| put_vec8(out, formats));
            }
            if self.extended_master_secret {
                put_u16(out, EXT_EXTENDED_MASTER_SECRET);
                put_u16(out, 0);
            }
        });
    }

    /// Parse; only extensions we offered are allowed back.
    pub fn parse(r: &mut Reader<'_>) -> Result<Self, Error> {
        let mut ext = Self::default();
        if r.is_empty() {
            return Ok(ext);
        }
        let mut seen: Vec<u16> = Vec::new();
        let mut block = Reader::new(r.vec16()?);
        while !block.is_empty() {
            let ty = block.u16()?;
            let mut data = Reader::new(block.vec16()?);
            if seen.contains(&ty) {
                return Err(malformed());
            }
            seen.push(ty);

            match ty {
                EXT_EXTENDED_MASTER_SECRET => ext.extended_master_secret = true,
                EXT_RENEGOTIATION_INFO => {
                    if !data.vec8()?.is_empty() {
                        return Err(malformed());
                    }
                    ext.renegotiation_info = true;
                }
                EXT_EC_POINT_FORMATS => ext.ec_point_formats = Some(data.vec8()?.to_vec()),
                // A server acknowledging SNI sends it back empty.
                EXT_SERVER_NAME => {}
                _ => return Err(Error::HandshakeFailure(HandshakeFailureReason::UnexpectedMessage)),
            }
            data.finish()?;
        }
        Ok(ext)
    }
}
