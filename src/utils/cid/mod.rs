// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Sanity checks applied to identifiers before they reach a store or an
//! exchange.

use cid::Cid;
use multihash_codetable::Code;

/// Multihash code of the identity "hash".
pub const IDENTITY: u64 = 0x00;

/// Shortest digest accepted for a cryptographic hash function.
pub const MINIMUM_DIGEST_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidCid {
    #[error("cid is undefined")]
    Undefined,
    #[error("multihash code {0:#x} is not an accepted hash function")]
    UnsupportedHash(u64),
    #[error("digest of {0} bytes is too short")]
    DigestTooShort(usize),
}

/// Returns `true` for hash functions considered secure enough to address
/// content with. Every accepted function other than identity can be
/// recomputed by [`crate::blocks::Block::verify`].
pub fn is_accepted_hash(code: u64) -> bool {
    code == IDENTITY
        || matches!(
            Code::try_from(code),
            Ok(Code::Sha2_256
                | Code::Sha2_512
                | Code::Sha3_224
                | Code::Sha3_256
                | Code::Sha3_384
                | Code::Sha3_512
                | Code::Keccak224
                | Code::Keccak256
                | Code::Keccak384
                | Code::Keccak512
                | Code::Blake2b256
                | Code::Blake2b512
                | Code::Blake2s256
                | Code::Blake3_256)
        )
}

/// Rejects identifiers that are undefined, use a weak or unknown hash
/// function, or carry a truncated digest.
pub fn validate_cid(cid: &Cid) -> Result<(), InvalidCid> {
    let hash = cid.hash();
    let len = hash.size() as usize;
    if len == 0 {
        return Err(InvalidCid::Undefined);
    }
    let code = hash.code();
    if !is_accepted_hash(code) {
        return Err(InvalidCid::UnsupportedHash(code));
    }
    // Identity digests are bounded by the 64 byte multihash of `Cid`.
    if code != IDENTITY && len < MINIMUM_DIGEST_LEN {
        return Err(InvalidCid::DigestTooShort(len));
    }
    Ok(())
}
