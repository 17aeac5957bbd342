//! Negotiable parameters: cipher suites, signature schemes, groups, versions.

use crate::credentials::KeyType;

/// TLS cipher suites we support.
///
/// Both are ECDHE key exchange authenticated with an ECDSA/EdDSA
/// certificate, an AEAD bulk cipher and the SHA-256 PRF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    /// TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 (RFC 5289)
    EcdheEcdsaWithAes128GcmSha256,
    /// TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256 (RFC 7905)
    EcdheEcdsaWithChacha20Poly1305Sha256,
}

impl CipherSuite {
    /// Every suite, in default preference order.
    pub const ALL: [CipherSuite; 2] = [
        CipherSuite::EcdheEcdsaWithAes128GcmSha256,
        CipherSuite::EcdheEcdsaWithChacha20Poly1305Sha256,
    ];

    pub fn to_u16(self) -> u16 {
        match self {
            Self::EcdheEcdsaWithAes128GcmSha256 => 0xc02b,
            Self::EcdheEcdsaWithChacha20Poly1305Sha256 => 0xcca9,
        }
    }

    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0xc02b => Some(Self::EcdheEcdsaWithAes128GcmSha256),
            0xcca9 => Some(Self::EcdheEcdsaWithChacha20Poly1305Sha256),
            _ => None,
        }
    }

    /// IANA name.
    pub fn name(self) -> &'static str {
        match self {
            Self::EcdheEcdsaWithAes128GcmSha256 => "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
            Self::EcdheEcdsaWithChacha20Poly1305Sha256 => {
                "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256"
            }
        }
    }

    /// Bulk cipher key length.
    pub fn key_len(self) -> usize {
        match self {
            Self::EcdheEcdsaWithAes128GcmSha256 => 16,
            Self::EcdheEcdsaWithChacha20Poly1305Sha256 => 32,
        }
    }

    /// Implicit IV taken from the key block.
    pub fn fixed_iv_len(self) -> usize {
        match self {
            Self::EcdheEcdsaWithAes128GcmSha256 => 4,
            Self::EcdheEcdsaWithChacha20Poly1305Sha256 => 12,
        }
    }

    /// Per-record nonce bytes carried in front of the ciphertext.
    pub fn explicit_nonce_len(self) -> usize {
        match self {
            Self::EcdheEcdsaWithAes128GcmSha256 => 8,
            Self::EcdheEcdsaWithChacha20Poly1305Sha256 => 0,
        }
    }

    /// AEAD tag length.
    pub fn tag_len(self) -> usize {
        16
    }

    /// Bytes of `key_block` this suite consumes (no MAC keys for AEAD suites).
    pub fn key_block_len(self) -> usize {
        2 * self.key_len() + 2 * self.fixed_iv_len()
    }

    /// Bytes a record grows by when protected.
    pub fn record_overhead(self) -> usize {
        self.explicit_nonce_len() + self.tag_len()
    }
}

impl core::fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Signature schemes (RFC 8446 numbering, used in TLS 1.2 via RFC 8422).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureScheme {
    Ed25519,
    EcdsaSecp256r1Sha256,
}

impl SignatureScheme {
    pub const ALL: [SignatureScheme; 2] =
        [SignatureScheme::Ed25519, SignatureScheme::EcdsaSecp256r1Sha256];

    pub fn to_u16(self) -> u16 {
        match self {
            Self::Ed25519 => crate::crypto::ed25519::ED25519_ALGORITHM,
            Self::EcdsaSecp256r1Sha256 => crate::crypto::ecdsa_p256::ECDSA_P256_SHA256_ALGORITHM,
        }
    }

    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0x0807 => Some(Self::Ed25519),
            0x0403 => Some(Self::EcdsaSecp256r1Sha256),
            _ => None,
        }
    }

    /// The key type that produces this scheme's signatures.
    pub fn key_type(self) -> KeyType {
        match self {
            Self::Ed25519 => KeyType::Ed25519,
            Self::EcdsaSecp256r1Sha256 => KeyType::EcdsaP256,
        }
    }
}

/// Named group for X25519 (RFC 8422).
pub const NAMED_GROUP_X25519: u16 = 0x001d;

/// `ECCurveType.named_curve`.
pub const CURVE_TYPE_NAMED_CURVE: u8 = 3;

/// `ECPointFormat.uncompressed`.
pub const POINT_FORMAT_UNCOMPRESSED: u8 = 0;

/// `ClientCertificateType.ecdsa_sign`.
pub const CLIENT_CERT_TYPE_ECDSA_SIGN: u8 = 64;

/// Protocol version on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion(pub u16);

impl ProtocolVersion {
    pub const TLS10: ProtocolVersion = ProtocolVersion(0x0301);
    pub const TLS11: ProtocolVersion = ProtocolVersion(0x0302);
    pub const TLS12: ProtocolVersion = ProtocolVersion(0x0303);

    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}
