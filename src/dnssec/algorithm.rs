use super::{DnsSecError, errors::Result};
use ring::signature;
use std::fmt;

/// DNSSEC Algorithm numbers (RFC 4034, 5155, 5702, 6605, 8080, 8624)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DnsSecAlgorithm {
    /// RSA/MD5 (deprecated)
    RsaMd5 = 1,
    /// DSA/SHA1 (RFC 2536)
    Dsa = 3,
    /// RSA/SHA-1 (RFC 3110)
    RsaSha1 = 5,
    /// DSA-NSEC3-SHA1 (RFC 5155)
    DsaNsec3Sha1 = 6,
    /// RSASHA1-NSEC3-SHA1 (RFC 5155)
    RsaSha1Nsec3Sha1 = 7,
    /// RSA/SHA-256 (RFC 5702)
    RsaSha256 = 8,
    /// RSA/SHA-512 (RFC 5702)
    RsaSha512 = 10,
    /// GOST R 34.10-2001 (RFC 5933)
    EccGost = 12,
    /// ECDSA Curve P-256 with SHA-256 (RFC 6605)
    EcdsaP256Sha256 = 13,
    /// ECDSA Curve P-384 with SHA-384 (RFC 6605)
    EcdsaP384Sha384 = 14,
    /// Ed25519 (RFC 8080)
    Ed25519 = 15,
    /// Ed448 (RFC 8080)
    Ed448 = 16,
}

impl DnsSecAlgorithm {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::RsaMd5),
            3 => Some(Self::Dsa),
            5 => Some(Self::RsaSha1),
            6 => Some(Self::DsaNsec3Sha1),
            7 => Some(Self::RsaSha1Nsec3Sha1),
            8 => Some(Self::RsaSha256),
            10 => Some(Self::RsaSha512),
            12 => Some(Self::EccGost),
            13 => Some(Self::EcdsaP256Sha256),
            14 => Some(Self::EcdsaP384Sha384),
            15 => Some(Self::Ed25519),
            16 => Some(Self::Ed448),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Algorithms this crate can verify signatures for
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            Self::RsaSha1
                | Self::RsaSha1Nsec3Sha1
                | Self::RsaSha256
                | Self::RsaSha512
                | Self::EcdsaP256Sha256
                | Self::EcdsaP384Sha384
                | Self::Ed25519
        )
    }

    /// Verify `sig` over `message` with a key in DNSKEY public key format
    #[allow(deprecated)]
    pub fn verify(&self, public_key: &[u8], message: &[u8], sig: &[u8]) -> Result<()> {
        match self {
            Self::RsaSha1 | Self::RsaSha1Nsec3Sha1 => verify_rsa(
                &signature::RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY,
                public_key,
                message,
                sig,
            ),
            Self::RsaSha256 => verify_rsa(
                &signature::RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY,
                public_key,
                message,
                sig,
            ),
            Self::RsaSha512 => verify_rsa(
                &signature::RSA_PKCS1_1024_8192_SHA512_FOR_LEGACY_USE_ONLY,
                public_key,
                message,
                sig,
            ),
            Self::EcdsaP256Sha256 => {
                verify_ecdsa(&signature::ECDSA_P256_SHA256_FIXED, 64, public_key, message, sig)
            }
            Self::EcdsaP384Sha384 => {
                verify_ecdsa(&signature::ECDSA_P384_SHA384_FIXED, 96, public_key, message, sig)
            }
            Self::Ed25519 => {
                if public_key.len() != 32 {
                    return Err(DnsSecError::InvalidPublicKey);
                }
                signature::UnparsedPublicKey::new(&signature::ED25519, public_key)
                    .verify(message, sig)
                    .map_err(|_| DnsSecError::SignatureVerificationFailed)
            }
            _ => Err(DnsSecError::UnsupportedAlgorithm(self.to_u8())),
        }
    }
}

/// RFC 3110 key layout: exponent length (1 or 3 octets), exponent, modulus
fn verify_rsa(
    params: &'static signature::RsaParameters,
    public_key: &[u8],
    message: &[u8],
    sig: &[u8],
) -> Result<()> {
    let (exp_len, offset) = match public_key.first() {
        Some(0) if public_key.len() >= 3 => {
            (u16::from_be_bytes([public_key[1], public_key[2]]) as usize, 3)
        }
        Some(&len) if len != 0 => (len as usize, 1),
        _ => return Err(DnsSecError::InvalidPublicKey),
    };
    if public_key.len() <= offset + exp_len {
        return Err(DnsSecError::InvalidPublicKey);
    }
    let e = &public_key[offset..offset + exp_len];
    let n = &public_key[offset + exp_len..];
    signature::RsaPublicKeyComponents { n, e }
        .verify(params, message, sig)
        .map_err(|_| DnsSecError::SignatureVerificationFailed)
}

/// DNSKEY stores the bare X || Y point; ring wants it uncompressed-prefixed
fn verify_ecdsa(
    alg: &'static signature::EcdsaVerificationAlgorithm,
    key_len: usize,
    public_key: &[u8],
    message: &[u8],
    sig: &[u8],
) -> Result<()> {
    if public_key.len() != key_len {
        return Err(DnsSecError::InvalidPublicKey);
    }
    let mut point = Vec::with_capacity(key_len + 1);
    point.push(0x04);
    point.extend_from_slice(public_key);
    signature::UnparsedPublicKey::new(alg, &point)
        .verify(message, sig)
        .map_err(|_| DnsSecError::SignatureVerificationFailed)
}

impl fmt::Display for DnsSecAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = match self {
            Self::RsaMd5 => "RSAMD5",
            Self::Dsa => "DSA",
            Self::RsaSha1 => "RSASHA1",
            Self::DsaNsec3Sha1 => "DSA-NSEC3-SHA1",
            Self::RsaSha1Nsec3Sha1 => "RSASHA1-NSEC3-SHA1",
            Self::RsaSha256 => "RSASHA256",
            Self::RsaSha512 => "RSASHA512",
            Self::EccGost => "ECC-GOST",
            Self::EcdsaP256Sha256 => "ECDSAP256SHA256",
            Self::EcdsaP384Sha384 => "ECDSAP384SHA384",
            Self::Ed25519 => "ED25519",
            Self::Ed448 => "ED448",
        };
        f.write_str(mnemonic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::signature::{Ed25519KeyPair, KeyPair};

    #[test]
    fn test_supported_algorithms() {
        assert!(DnsSecAlgorithm::from_u8(8).unwrap().is_supported());
        assert!(DnsSecAlgorithm::from_u8(15).unwrap().is_supported());
        assert!(!DnsSecAlgorithm::from_u8(16).unwrap().is_supported());
        assert!(!DnsSecAlgorithm::RsaMd5.is_supported());
        assert!(DnsSecAlgorithm::from_u8(200).is_none());
    }

    #[test]
    fn test_ed25519_verify() {
        let pair = Ed25519KeyPair::from_seed_unchecked(&[7u8; 32]).unwrap();
        let sig = pair.sign(b"signed data");
        let alg = DnsSecAlgorithm::Ed25519;
        assert!(alg.verify(pair.public_key().as_ref(), b"signed data", sig.as_ref()).is_ok());
        assert_eq!(
            alg.verify(pair.public_key().as_ref(), b"other data", sig.as_ref()),
            Err(DnsSecError::SignatureVerificationFailed)
        );
    }

    #[test]
    fn test_malformed_keys() {
        assert_eq!(
            DnsSecAlgorithm::RsaSha256.verify(&[], b"x", b"y"),
            Err(DnsSecError::InvalidPublicKey)
        );
        assert_eq!(
            DnsSecAlgorithm::EcdsaP256Sha256.verify(&[0; 10], b"x", b"y"),
            Err(DnsSecError::InvalidPublicKey)
        );
        assert_eq!(
            DnsSecAlgorithm::Ed448.verify(&[0; 57], b"x", b"y"),
            Err(DnsSecError::UnsupportedAlgorithm(16))
        );
    }
}
