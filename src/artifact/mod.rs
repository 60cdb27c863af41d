//=====================================================
// File: artifact.rs
//=====================================================
// Author: AML Contributors
// License: MIT
// Goal: Compiled-artifact codec for AML programs
// Objective: Encode parsed programs into versioned .caml containers and
//            decode them back, rejecting incompatible or corrupt inputs
//=====================================================

use crate::ast::Program;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Container magic, first bytes of every artifact.
pub const ARTIFACT_MAGIC: [u8; 4] = *b"CAML";
/// Current container format version. Bump on any AST-incompatible change.
pub const ARTIFACT_VERSION: u32 = 1;

/// File extension used by the compiler and recognized by the runtime loader.
pub const ARTIFACT_EXTENSION: &str = "caml";

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("not an AML artifact (bad magic)")]
    BadMagic,
    #[error("unsupported artifact format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("artifact truncated: {0}")]
    Truncated(String),
    #[error("artifact payload corrupt: {0}")]
    Corrupt(String),
    #[error("artifact encode failed: {0}")]
    Encode(String),
}

/// Versioned on-disk representation of a parsed program.
///
/// Decoding an artifact and evaluating its program is observably equivalent
/// to parsing and evaluating the original source; exact source snippets are
/// not retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub format_version: u32,
    pub source_name: String,
    pub source_fingerprint: u64,
    /// Unix timestamp (seconds, UTC) of the encode call.
    pub built_at: i64,
    pub program: Program,
}

impl CompiledArtifact {
    pub fn new(program: Program, source_name: &str, source: &str) -> Self {
        Self {
            format_version: ARTIFACT_VERSION,
            source_name: source_name.to_string(),
            source_fingerprint: fingerprint(source.as_bytes()),
            built_at: chrono::Utc::now().timestamp(),
            program,
        }
    }
}

/// FNV-1a over the source bytes; cheap identity check, not a security digest.
pub fn fingerprint(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Serialize a program into the versioned container layout:
/// 4 magic bytes, little-endian u32 version, bincode payload.
pub fn encode(program: &Program, source_name: &str, source: &str) -> Result<Vec<u8>, CodecError> {
    let artifact = CompiledArtifact::new(program.clone(), source_name, source);
    let payload =
        bincode::serialize(&artifact).map_err(|err| CodecError::Encode(err.to_string()))?;
    let mut bytes = Vec::with_capacity(payload.len() + 8);
    bytes.extend_from_slice(&ARTIFACT_MAGIC);
    bytes.extend_from_slice(&ARTIFACT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode a container produced by [`encode`].
///
/// The header is validated before the payload is touched, so version
/// mismatches surface as [`CodecError::UnsupportedVersion`] rather than as
/// deserialization noise.
pub fn decode(bytes: &[u8]) -> Result<CompiledArtifact, CodecError> {
    if bytes.len() < 8 {
        return Err(CodecError::Truncated("missing header".into()));
    }
    if bytes[0..4] != ARTIFACT_MAGIC {
        return Err(CodecError::BadMagic);
    }
    let version = u32::from_le_bytes(
        bytes[4..8]
            .try_into()
            .expect("slice length checked above"),
    );
    if version != ARTIFACT_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: version,
            supported: ARTIFACT_VERSION,
        });
    }
    let artifact: CompiledArtifact =
        bincode::deserialize(&bytes[8..]).map_err(|err| CodecError::Corrupt(err.to_string()))?;
    if artifact.format_version != version {
        return Err(CodecError::Corrupt(
            "header and payload versions disagree".into(),
        ));
    }
    Ok(artifact)
}
