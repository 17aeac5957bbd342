//! Certificates, private keys and the credentials provider capability.
//!
//! A [`CredentialsProvider`] answers two questions during a handshake:
//! which chain to present for a key type and usage, and which private key
//! signs for that chain's end-entity certificate. [`InMemoryCredentials`]
//! is the stock implementation, keyed by the certificate's DER encoding.

use std::collections::HashMap;
use std::sync::Arc;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::der::{self, TAG_OID};
use crate::crypto::{ecdsa_p256, ed25519};
use crate::error::{Error, HandshakeFailureReason};
use crate::tls::cipher_suite::SignatureScheme;
use crate::transport::Rng;

/// Signing key algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Ed25519,
    EcdsaP256,
}

impl KeyType {
    /// The signature scheme this key type signs with.
    pub fn signature_scheme(self) -> SignatureScheme {
        match self {
            KeyType::Ed25519 => SignatureScheme::Ed25519,
            KeyType::EcdsaP256 => SignatureScheme::EcdsaSecp256r1Sha256,
        }
    }
}

/// What a chain is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Usage {
    TlsServer,
    TlsClient,
}

/// A DER-encoded X.509 certificate.
///
/// Equality and hashing use the encoded bytes, so a certificate can key a
/// lookup table directly. Cloning is cheap.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Certificate {
    der: Arc<[u8]>,
}

impl Certificate {
    pub fn from_der(der: Vec<u8>) -> Self {
        Self { der: der.into() }
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// The subject public key, if it is one this engine can verify with.
    pub fn public_key(&self) -> Result<PublicKey, Error> {
        let unsupported = Error::HandshakeFailure(HandshakeFailureReason::UnsupportedCertificate);
        let fields = der::parse_certificate(&self.der).ok_or(unsupported.clone())?;

        if fields.key_algorithm == der::OID_ED25519 {
            let key: [u8; ed25519::PUBLIC_KEY_LEN] =
                fields.public_key.try_into().map_err(|_| unsupported.clone())?;
            return Ok(PublicKey::Ed25519(key));
        }
        if fields.key_algorithm == der::OID_EC_PUBLIC_KEY
            && fields.key_parameters == Some(der::OID_PRIME256V1)
            && fields.public_key.len() == ecdsa_p256::PUBLIC_KEY_LEN
            && fields.public_key[0] == 0x04
        {
            let mut key = heapless::Vec::new();
            key.extend_from_slice(fields.public_key).map_err(|_| unsupported.clone())?;
            return Ok(PublicKey::EcdsaP256(key));
        }
        Err(unsupported)
    }

    /// Key type of the subject public key.
    pub fn key_type(&self) -> Option<KeyType> {
        self.public_key().ok().map(|k| k.key_type())
    }

    /// The subject common name, if present and valid UTF-8.
    pub fn common_name(&self) -> Option<String> {
        let fields = der::parse_certificate(&self.der)?;
        let cn = core::str::from_utf8(fields.subject_cn?).ok()?;
        Some(cn.to_owned())
    }

    /// Build a self-signed certificate for `key` with subject `CN=common_name`.
    pub fn self_signed(key: &PrivateKey, common_name: &str) -> Result<Self, Error> {
        let (spki, signature_algorithm) = match key.public_key()? {
            PublicKey::Ed25519(public) => (
                der::sequence(&[
                    &der::sequence(&[&der::tlv(TAG_OID, der::OID_ED25519)]),
                    &der::bit_string(&public),
                ]),
                der::OID_ED25519,
            ),
            PublicKey::EcdsaP256(public) => (
                der::sequence(&[
                    &der::sequence(&[
                        &der::tlv(TAG_OID, der::OID_EC_PUBLIC_KEY),
                        &der::tlv(TAG_OID, der::OID_PRIME256V1),
                    ]),
                    &der::bit_string(&public),
                ]),
                der::OID_ECDSA_WITH_SHA256,
            ),
        };
        let encoded = der::build_self_signed(&spki, signature_algorithm, common_name, |tbs| key.sign(tbs))?;
        Ok(Self::from_der(encoded))
    }
}

impl core::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Certificate")
            .field("common_name", &self.common_name())
            .field("len", &self.der.len())
            .finish()
    }
}

/// A public key taken from a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Ed25519([u8; ed25519::PUBLIC_KEY_LEN]),
    /// SEC1 uncompressed point.
    EcdsaP256(heapless::Vec<u8, { ecdsa_p256::PUBLIC_KEY_LEN }>),
}

impl PublicKey {
    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::Ed25519(_) => KeyType::Ed25519,
            PublicKey::EcdsaP256(_) => KeyType::EcdsaP256,
        }
    }

    /// Verify `signature` over `message` under `scheme`.
    ///
    /// The scheme must match the key type.
    pub fn verify(&self, scheme: SignatureScheme, message: &[u8], signature: &[u8]) -> Result<(), Error> {
        match (self, scheme) {
            (PublicKey::Ed25519(key), SignatureScheme::Ed25519) => ed25519::verify(key, message, signature),
            (PublicKey::EcdsaP256(key), SignatureScheme::EcdsaSecp256r1Sha256) => {
                ecdsa_p256::verify(key, message, signature)
            }
            _ => Err(Error::Crypto),
        }
    }
}

/// A signing key. The secret is wiped on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    #[zeroize(skip)]
    key_type: KeyType,
    secret: [u8; 32],
}

impl PrivateKey {
    /// An Ed25519 key from its 32-byte seed.
    pub fn ed25519_from_seed(seed: [u8; 32]) -> Self {
        Self { key_type: KeyType::Ed25519, secret: seed }
    }

    /// A P-256 key from its 32-byte big-endian scalar.
    pub fn ecdsa_p256_from_scalar(scalar: [u8; 32]) -> Result<Self, Error> {
        ecdsa_p256::public_key_from_scalar(&scalar)?;
        Ok(Self { key_type: KeyType::EcdsaP256, secret: scalar })
    }

    /// A fresh key drawn from `rng`.
    pub fn generate<R: Rng + ?Sized>(key_type: KeyType, rng: &mut R) -> Result<Self, Error> {
        let mut secret = [0u8; 32];
        match key_type {
            KeyType::Ed25519 => {
                rng.fill(&mut secret);
                let key = Self::ed25519_from_seed(secret);
                secret.zeroize();
                Ok(key)
            }
            KeyType::EcdsaP256 => {
                // Out-of-range scalars are vanishingly rare; retry a bounded number of times.
                for _ in 0..16 {
                    rng.fill(&mut secret);
                    if let Ok(key) = Self::ecdsa_p256_from_scalar(secret) {
                        secret.zeroize();
                        return Ok(key);
                    }
                }
                secret.zeroize();
                Err(Error::Crypto)
            }
        }
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn public_key(&self) -> Result<PublicKey, Error> {
        match self.key_type {
            KeyType::Ed25519 => Ok(PublicKey::Ed25519(ed25519::public_key_from_seed(&self.secret))),
            KeyType::EcdsaP256 => Ok(PublicKey::EcdsaP256(ecdsa_p256::public_key_from_scalar(&self.secret)?)),
        }
    }

    /// Sign `message` with this key's native scheme.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, Error> {
        match self.key_type {
            KeyType::Ed25519 => Ok(ed25519::sign(&self.secret, message).to_vec()),
            KeyType::EcdsaP256 => ecdsa_p256::sign(&self.secret, message),
        }
    }
}

impl core::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PrivateKey").field("key_type", &self.key_type).finish_non_exhaustive()
    }
}

/// Source of local certificate chains and their private keys.
///
/// Implementations are shared between channels and may be called
/// concurrently; they should be read-mostly.
pub trait CredentialsProvider: Send + Sync {
    /// The chain (end-entity first) to present for `key_type` and `usage`.
    ///
    /// `context` is the requested server name, when known.
    fn cert_chain(&self, key_type: KeyType, usage: Usage, context: Option<&str>) -> Result<Vec<Certificate>, Error>;

    /// The private key matching the end-entity certificate `cert`.
    fn private_key_for(
        &self,
        cert: &Certificate,
        key_type: KeyType,
        context: Option<&str>,
    ) -> Result<Arc<PrivateKey>, Error>;
}

struct Identity {
    chain: Vec<Certificate>,
    key_type: KeyType,
    usage: Usage,
    name: Option<String>,
}

/// Credentials held in memory, immutable once shared.
#[derive(Default)]
pub struct InMemoryCredentials {
    identities: Vec<Identity>,
    keys: HashMap<Certificate, Arc<PrivateKey>>,
}

impl InMemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chain and the key for its end-entity certificate.
    ///
    /// Fails if the chain is empty or the key does not match the certificate.
    pub fn add(&mut self, usage: Usage, chain: Vec<Certificate>, key: PrivateKey) -> Result<(), Error> {
        let leaf = chain.first().ok_or(Error::CredentialsNotFound)?;
        if leaf.public_key()? != key.public_key()? {
            return Err(Error::Crypto);
        }
        self.keys.insert(leaf.clone(), Arc::new(key.clone()));
        self.identities.push(Identity {
            name: leaf.common_name(),
            key_type: key.key_type(),
            usage,
            chain,
        });
        Ok(())
    }

    /// Builder form of [`add`](Self::add).
    pub fn with_identity(mut self, usage: Usage, chain: Vec<Certificate>, key: PrivateKey) -> Result<Self, Error> {
        self.add(usage, chain, key)?;
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

impl CredentialsProvider for InMemoryCredentials {
    fn cert_chain(&self, key_type: KeyType, usage: Usage, context: Option<&str>) -> Result<Vec<Certificate>, Error> {
        let mut candidates = self
            .identities
            .iter()
            .filter(|id| id.key_type == key_type && id.usage == usage);

        let first = candidates.next().ok_or(Error::CredentialsNotFound)?;
        let chosen = match context {
            Some(host) => core::iter::once(first)
                .chain(candidates)
                .find(|id| id.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(host)))
                .unwrap_or(first),
            None => first,
        };
        Ok(chosen.chain.clone())
    }

    fn private_key_for(
        &self,
        cert: &Certificate,
        key_type: KeyType,
        _context: Option<&str>,
    ) -> Result<Arc<PrivateKey>, Error> {
        match self.keys.get(cert) {
            Some(key) if key.key_type() == key_type => Ok(Arc::clone(key)),
            _ => Err(Error::CredentialsNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ed25519_identity(seed: u8, cn: &str) -> (Certificate, PrivateKey) {
        let key = PrivateKey::ed25519_from_seed([seed; 32]);
        (Certificate::self_signed(&key, cn).unwrap(), key)
    }

    #[test]
    fn self_signed_ed25519_certificate() {
        let (cert, key) = ed25519_identity(1, "localhost");
        assert_eq!(cert.key_type(), Some(KeyType::Ed25519));
        assert_eq!(cert.common_name().as_deref(), Some("localhost"));
        assert_eq!(cert.public_key().unwrap(), key.public_key().unwrap());
    }

    #[test]
    fn self_signed_p256_certificate() {
        let key = PrivateKey::ecdsa_p256_from_scalar([0x11; 32]).unwrap();
        let cert = Certificate::self_signed(&key, "p256.test").unwrap();
        assert_eq!(cert.key_type(), Some(KeyType::EcdsaP256));
        assert_eq!(cert.common_name().as_deref(), Some("p256.test"));
    }

    #[test]
    fn signatures_verify_with_certificate_key() {
        for key in [
            PrivateKey::ed25519_from_seed([7; 32]),
            PrivateKey::ecdsa_p256_from_scalar([7; 32]).unwrap(),
        ] {
            let cert = Certificate::self_signed(&key, "signer").unwrap();
            let scheme = key.key_type().signature_scheme();
            let sig = key.sign(b"params").unwrap();
            cert.public_key().unwrap().verify(scheme, b"params", &sig).unwrap();
            assert!(cert.public_key().unwrap().verify(scheme, b"other", &sig).is_err());
        }
    }

    #[test]
    fn scheme_must_match_key() {
        let key = PrivateKey::ed25519_from_seed([7; 32]);
        let sig = key.sign(b"m").unwrap();
        let public = key.public_key().unwrap();
        assert!(public.verify(SignatureScheme::EcdsaSecp256r1Sha256, b"m", &sig).is_err());
    }

    #[test]
    fn garbage_certificate_is_unsupported() {
        let cert = Certificate::from_der(vec![0x30, 0x03, 0x02, 0x01, 0x01]);
        assert_eq!(
            cert.public_key(),
            Err(Error::HandshakeFailure(HandshakeFailureReason::UnsupportedCertificate))
        );
        assert_eq!(cert.key_type(), None);
    }

    #[test]
    fn equality_is_by_der() {
        let (a, _) = ed25519_identity(1, "a");
        let b = Certificate::from_der(a.as_der().to_vec());
        assert_eq!(a, b);
        let (c, _) = ed25519_identity(2, "a");
        assert_ne!(a, c);
    }

    #[test]
    fn lookup_by_key_type_usage_and_name() {
        let (alpha, alpha_key) = ed25519_identity(1, "alpha.test");
        let (beta, beta_key) = ed25519_identity(2, "beta.test");
        let creds = InMemoryCredentials::new()
            .with_identity(Usage::TlsServer, vec![alpha.clone()], alpha_key)
            .unwrap()
            .with_identity(Usage::TlsServer, vec![beta.clone()], beta_key)
            .unwrap();

        assert_eq!(creds.cert_chain(KeyType::Ed25519, Usage::TlsServer, None).unwrap(), vec![alpha.clone()]);
        assert_eq!(
            creds.cert_chain(KeyType::Ed25519, Usage::TlsServer, Some("BETA.test")).unwrap(),
            vec![beta.clone()]
        );
        // Unknown names fall back to the first matching identity.
        assert_eq!(
            creds.cert_chain(KeyType::Ed25519, Usage::TlsServer, Some("gamma.test")).unwrap(),
            vec![alpha.clone()]
        );

        let key = creds.private_key_for(&beta, KeyType::Ed25519, None).unwrap();
        assert_eq!(key.public_key().unwrap(), beta.public_key().unwrap());
    }

    #[test]
    fn misses_are_credentials_not_found() {
        let (cert, key) = ed25519_identity(1, "server");
        let creds = InMemoryCredentials::new().with_identity(Usage::TlsServer, vec![cert.clone()], key).unwrap();

        assert_eq!(
            creds.cert_chain(KeyType::EcdsaP256, Usage::TlsServer, None),
            Err(Error::CredentialsNotFound)
        );
        assert_eq!(
            creds.cert_chain(KeyType::Ed25519, Usage::TlsClient, None),
            Err(Error::CredentialsNotFound)
        );
        assert_eq!(
            creds.private_key_for(&cert, KeyType::EcdsaP256, None).err(),
            Some(Error::CredentialsNotFound)
        );
    }

    #[test]
    fn mismatched_key_is_refused() {
        let (cert, _) = ed25519_identity(1, "server");
        let other = PrivateKey::ed25519_from_seed([9; 32]);
        let mut creds = InMemoryCredentials::new();
        assert_eq!(creds.add(Usage::TlsServer, vec![cert], other), Err(Error::Crypto));
        assert!(creds.is_empty());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let key = PrivateKey::ed25519_from_seed([0xab; 32]);
        let shown = format!("{key:?}");
        assert!(shown.contains("Ed25519"));
        assert!(!shown.contains("171"));
    }
}
