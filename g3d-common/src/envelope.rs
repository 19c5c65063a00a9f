//! Asset cache envelope.
//!
//! Every compiled payload is wrapped in a small fixed header carrying a
//! checksum of the originating source asset. The orchestrator reads it back
//! before recompiling to decide whether the work can be skipped.
//!
//! # Layout (60 bytes, little-endian)
//! ```text
//! 0x00: signature [u8; 8]        - b"G3DCache"
//! 0x08: format_version u16       - envelope layout version (currently 1)
//! 0x0A: flags u16                - reserved bits, written as declared
//! 0x0C: cache_type [u8; 4]       - payload kind tag ("MODL"/"TEXR"/"ANMT")
//! 0x10: cache_type_version u16   - payload layout version
//! 0x12: reserved u16             - must be 0
//! 0x14: checksum_algo [u8; 8]    - NUL-padded algorithm name ("sha-256")
//! 0x1C: digest [u8; 32]          - checksum of the source asset bytes
//! ```

use sha2::{Digest, Sha256};

use crate::error::{CodecError, Result};

/// Envelope signature, first 8 bytes of every compiled cache file.
pub const SIGNATURE: [u8; 8] = *b"G3DCache";

/// Current envelope layout version.
pub const FORMAT_VERSION: u16 = 1;

/// The only checksum algorithm this toolchain writes.
pub const CHECKSUM_ALGO: &[u8; 8] = b"sha-256\0";

/// Payload kind carried behind an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Model,
    Texture,
    Animation,
}

impl CacheKind {
    /// 4-byte tag written in the envelope.
    pub const fn tag(self) -> [u8; 4] {
        match self {
            CacheKind::Model => *b"MODL",
            CacheKind::Texture => *b"TEXR",
            CacheKind::Animation => *b"ANMT",
        }
    }

    /// Parse a 4-byte tag.
    pub fn from_tag(tag: [u8; 4]) -> Result<Self> {
        match &tag {
            b"MODL" => Ok(CacheKind::Model),
            b"TEXR" => Ok(CacheKind::Texture),
            b"ANMT" => Ok(CacheKind::Animation),
            other => Err(CodecError::format(format!(
                "unknown cache type tag: {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

/// Fixed-layout header wrapping every codec payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEnvelope {
    pub format_version: u16,
    pub flags: u16,
    pub kind: CacheKind,
    pub kind_version: u16,
    pub digest: [u8; 32],
}

impl CacheEnvelope {
    pub const SIZE: usize = 60;

    /// Build an envelope for `kind`, digesting the source asset bytes.
    pub fn for_source(kind: CacheKind, kind_version: u16, source: &[u8]) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            flags: 0,
            kind,
            kind_version,
            digest: Sha256::digest(source).into(),
        }
    }

    /// True when `source` hashes to the digest recorded at compile time.
    /// An unchanged source asset means recompilation can be skipped.
    pub fn matches_source(&self, source: &[u8]) -> bool {
        let digest: [u8; 32] = Sha256::digest(source).into();
        digest == self.digest
    }

    /// Digest as lowercase hex, for diagnostics.
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Write the envelope to bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0x00..0x08].copy_from_slice(&SIGNATURE);
        bytes[0x08..0x0A].copy_from_slice(&self.format_version.to_le_bytes());
        bytes[0x0A..0x0C].copy_from_slice(&self.flags.to_le_bytes());
        bytes[0x0C..0x10].copy_from_slice(&self.kind.tag());
        bytes[0x10..0x12].copy_from_slice(&self.kind_version.to_le_bytes());
        // 0x12..0x14 reserved, stays 0
        bytes[0x14..0x1C].copy_from_slice(CHECKSUM_ALGO);
        bytes[0x1C..0x3C].copy_from_slice(&self.digest);
        bytes
    }

    /// Read an envelope from the head of a cache file.
    ///
    /// Signature, version, and checksum-algorithm mismatches are fatal to
    /// the asset; the caller never gets a half-parsed envelope.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(CodecError::truncated(Self::SIZE, bytes.len()));
        }
        if bytes[0x00..0x08] != SIGNATURE {
            return Err(CodecError::BadEnvelope {
                expected: String::from_utf8_lossy(&SIGNATURE).into_owned(),
                actual: String::from_utf8_lossy(&bytes[0x00..0x08]).into_owned(),
            });
        }
        let format_version = u16::from_le_bytes([bytes[0x08], bytes[0x09]]);
        if format_version != FORMAT_VERSION {
            return Err(CodecError::BadEnvelope {
                expected: format!("version {FORMAT_VERSION}"),
                actual: format!("version {format_version}"),
            });
        }
        if &bytes[0x14..0x1C] != CHECKSUM_ALGO {
            return Err(CodecError::format(format!(
                "unsupported checksum algorithm: {:?}",
                String::from_utf8_lossy(&bytes[0x14..0x1C])
            )));
        }
        let kind = CacheKind::from_tag([bytes[0x0C], bytes[0x0D], bytes[0x0E], bytes[0x0F]])?;
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes[0x1C..0x3C]);
        Ok(Self {
            format_version,
            flags: u16::from_le_bytes([bytes[0x0A], bytes[0x0B]]),
            kind,
            kind_version: u16::from_le_bytes([bytes[0x10], bytes[0x11]]),
            digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_size() {
        let env = CacheEnvelope::for_source(CacheKind::Model, 2, b"source");
        assert_eq!(env.to_bytes().len(), CacheEnvelope::SIZE);
    }

    #[test]
    fn test_envelope_roundtrip() {
        let env = CacheEnvelope::for_source(CacheKind::Texture, 3, b"pixels");
        let parsed = CacheEnvelope::from_bytes(&env.to_bytes()).unwrap();
        assert_eq!(parsed, env);
    }

    #[test]
    fn test_checksum_gating() {
        let source = b"v mesh data".to_vec();
        let env = CacheEnvelope::for_source(CacheKind::Model, 1, &source);
        assert!(env.matches_source(&source));

        // one changed byte invalidates the cache
        let mut changed = source.clone();
        changed[0] ^= 0x01;
        assert!(!env.matches_source(&changed));
    }

    #[test]
    fn test_bad_signature_rejected() {
        let mut bytes = CacheEnvelope::for_source(CacheKind::Model, 1, b"x").to_bytes();
        bytes[0] = b'g';
        assert!(matches!(
            CacheEnvelope::from_bytes(&bytes),
            Err(CodecError::BadEnvelope { .. })
        ));
    }

    #[test]
    fn test_bad_version_rejected() {
        let mut bytes = CacheEnvelope::for_source(CacheKind::Model, 1, b"x").to_bytes();
        bytes[0x08] = 99;
        assert!(CacheEnvelope::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_short_buffer_rejected() {
        assert!(matches!(
            CacheEnvelope::from_bytes(&[0u8; 10]),
            Err(CodecError::Truncated { .. })
        ));
    }
}
