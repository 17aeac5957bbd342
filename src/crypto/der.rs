//! Minimal DER reading and writing for end-entity certificates.
//!
//! Only what the handshake needs: pull the SubjectPublicKeyInfo and the
//! subject common name out of a certificate, and build small self-signed
//! certificates for Ed25519 and P-256 keys. This is not an X.509 validator.

pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_BIT_STRING: u8 = 0x03;
pub const TAG_OID: u8 = 0x06;
pub const TAG_UTF8_STRING: u8 = 0x0c;
pub const TAG_PRINTABLE_STRING: u8 = 0x13;
pub const TAG_UTC_TIME: u8 = 0x17;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_SET: u8 = 0x31;
pub const TAG_CONTEXT_0: u8 = 0xa0;

/// 1.3.101.112
pub const OID_ED25519: &[u8] = &[0x2b, 0x65, 0x70];
/// 1.2.840.10045.2.1
pub const OID_EC_PUBLIC_KEY: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];
/// 1.2.840.10045.3.1.7
pub const OID_PRIME256V1: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];
/// 1.2.840.10045.4.3.2
pub const OID_ECDSA_WITH_SHA256: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02];
/// 2.5.4.3
pub const OID_COMMON_NAME: &[u8] = &[0x55, 0x04, 0x03];

// ---- Writing ----

fn write_len(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xff {
        out.extend_from_slice(&[0x81, len as u8]);
    } else if len <= 0xffff {
        out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]);
    } else {
        out.extend_from_slice(&[0x83, (len >> 16) as u8, (len >> 8) as u8, len as u8]);
    }
}

/// Append one tag-length-value element.
pub fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    write_len(out, content.len());
    out.extend_from_slice(content);
}

/// Encode one tag-length-value element.
pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    write_tlv(&mut out, tag, content);
    out
}

/// Encode a SEQUENCE of already-encoded elements.
pub fn sequence(parts: &[&[u8]]) -> Vec<u8> {
    tlv(TAG_SEQUENCE, &parts.concat())
}

/// BIT STRING with zero unused bits.
pub fn bit_string(bits: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(bits.len() + 1);
    content.push(0);
    content.extend_from_slice(bits);
    tlv(TAG_BIT_STRING, &content)
}

/// `Name ::= SEQUENCE { SET { SEQUENCE { OID cn, UTF8String } } }`
pub fn common_name(cn: &str) -> Vec<u8> {
    let attr = sequence(&[&tlv(TAG_OID, OID_COMMON_NAME), &tlv(TAG_UTF8_STRING, cn.as_bytes())]);
    sequence(&[&tlv(TAG_SET, &attr)])
}

/// Build a self-signed certificate around `spki`.
///
/// `sign` receives the encoded TBSCertificate and returns the raw signature
/// value for `signature_algorithm`.
pub fn build_self_signed<E>(
    spki: &[u8],
    signature_algorithm: &[u8],
    cn: &str,
    sign: impl FnOnce(&[u8]) -> Result<Vec<u8>, E>,
) -> Result<Vec<u8>, E> {
    let alg = sequence(&[&tlv(TAG_OID, signature_algorithm)]);
    let name = common_name(cn);
    let validity = sequence(&[
        &tlv(TAG_UTC_TIME, b"250101000000Z"),
        &tlv(TAG_UTC_TIME, b"450101000000Z"),
    ]);
    let version = tlv(TAG_CONTEXT_0, &tlv(TAG_INTEGER, &[0x02]));
    let serial = tlv(TAG_INTEGER, &[0x01]);

    let tbs = sequence(&[&version, &serial, &alg, &name, &validity, &name, spki]);
    let signature = sign(&tbs)?;
    Ok(sequence(&[&tbs, &alg, &bit_string(&signature)]))
}

// ---- Reading ----

/// Cursor over a run of DER elements.
pub struct DerReader<'a> {
    data: &'a [u8],
}

impl<'a> DerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read the next element as `(tag, content)`.
    pub fn read(&mut self) -> Option<(u8, &'a [u8])> {
        let (&tag, rest) = self.data.split_first()?;
        let (&first, rest) = rest.split_first()?;
        let (len, rest) = if first < 0x80 {
            (first as usize, rest)
        } else {
            let n = (first & 0x7f) as usize;
            if n == 0 || n > 3 || rest.len() < n {
                return None;
            }
            let len = rest[..n].iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
            (len, &rest[n..])
        };
        if rest.len() < len {
            return None;
        }
        let (content, rest) = rest.split_at(len);
        self.data = rest;
        Some((tag, content))
    }

    /// Read the next element, requiring `tag`.
    pub fn expect(&mut self, tag: u8) -> Option<&'a [u8]> {
        match self.read()? {
            (t, content) if t == tag => Some(content),
            _ => None,
        }
    }
}

/// The fields of a certificate the handshake looks at.
#[derive(Debug, Clone, Copy)]
pub struct CertificateFields<'a> {
    /// Content of the SPKI algorithm OID.
    pub key_algorithm: &'a [u8],
    /// Content of the SPKI parameters OID, if present (the named curve for EC keys).
    pub key_parameters: Option<&'a [u8]>,
    /// The subject public key with the unused-bits byte stripped.
    pub public_key: &'a [u8],
    /// The first common name in the subject, raw bytes.
    pub subject_cn: Option<&'a [u8]>,
}

/// Walk Certificate → TBSCertificate and extract the subject and key.
pub fn parse_certificate(der: &[u8]) -> Option<CertificateFields<'_>> {
    let mut outer = DerReader::new(der);
    let cert = outer.expect(TAG_SEQUENCE)?;
    let tbs = DerReader::new(cert).expect(TAG_SEQUENCE)?;

    let mut tbs = DerReader::new(tbs);
    let (mut tag, mut content) = tbs.read()?;
    if tag == TAG_CONTEXT_0 {
        (tag, content) = tbs.read()?;
    }
    if tag != TAG_INTEGER || content.is_empty() {
        return None;
    }
    tbs.expect(TAG_SEQUENCE)?; // signature
    tbs.expect(TAG_SEQUENCE)?; // issuer
    tbs.expect(TAG_SEQUENCE)?; // validity
    let subject = tbs.expect(TAG_SEQUENCE)?;
    let spki = tbs.expect(TAG_SEQUENCE)?;

    let mut spki = DerReader::new(spki);
    let mut alg = DerReader::new(spki.expect(TAG_SEQUENCE)?);
    let key_algorithm = alg.expect(TAG_OID)?;
    let key_parameters = match alg.read() {
        Some((TAG_OID, params)) => Some(params),
        _ => None,
    };
    let bits = spki.expect(TAG_BIT_STRING)?;
    let (&unused, public_key) = bits.split_first()?;
    if unused != 0 {
        return None;
    }

    Some(CertificateFields {
        key_algorithm,
        key_parameters,
        public_key,
        subject_cn: find_common_name(subject),
    })
}

fn find_common_name(name: &[u8]) -> Option<&[u8]> {
    let mut rdns = DerReader::new(name);
    while let Some((TAG_SET, set)) = rdns.read() {
        let mut attrs = DerReader::new(set);
        while let Some(attr) = attrs.expect(TAG_SEQUENCE) {
            let mut attr = DerReader::new(attr);
            if attr.expect(TAG_OID)? == OID_COMMON_NAME {
                return match attr.read()? {
                    (TAG_UTF8_STRING | TAG_PRINTABLE_STRING, value) => Some(value),
                    _ => None,
                };
            }
        }
    }
    None
}
