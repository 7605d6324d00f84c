// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::hash::{Hash, Hasher};

use bytes::Bytes;
use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};

use crate::utils::cid::IDENTITY;

/// `dag-pb` codec, the only codec a version 0 [`Cid`] can carry.
pub const DAG_PB: u64 = 0x70;
/// `raw` codec for opaque payloads.
pub const RAW: u64 = 0x55;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error("data does not match the digest of {0}")]
    HashMismatch(Cid),
    #[error("unsupported multihash code {0:#x}")]
    UnsupportedHash(u64),
}

/// An immutable chunk of content-addressed data.
///
/// Two blocks are equal when their [`Cid`]s are equal, the payload is never
/// compared.
#[derive(Clone, Debug)]
pub struct Block {
    cid: Cid,
    data: Bytes,
}

impl Block {
    /// Creates a block identified by the version 0 [`Cid`] (`sha2-256`,
    /// `dag-pb`) of `data`.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let cid = Cid::new_v0(Code::Sha2_256.digest(&data))
            .expect("Infallible: sha2-256 digests are always valid CIDv0 hashes");
        Self { cid, data }
    }

    /// Creates a version 1 `raw` block hashed with `code`.
    pub fn new_raw(code: Code, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            cid: Cid::new_v1(RAW, code.digest(&data)),
            data,
        }
    }

    /// Creates a block from a claimed identifier, checking that `data`
    /// actually hashes to it.
    pub fn new_with_cid(cid: Cid, data: impl Into<Bytes>) -> Result<Self, BlockError> {
        let block = Self::new_unchecked(cid, data);
        block.verify()?;
        Ok(block)
    }

    /// Creates a block without checking `data` against `cid`. Meant for data
    /// coming from a trusted store.
    pub fn new_unchecked(cid: Cid, data: impl Into<Bytes>) -> Self {
        Self {
            cid,
            data: data.into(),
        }
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_parts(self) -> (Cid, Bytes) {
        (self.cid, self.data)
    }

    /// Re-hashes the payload with the hash function named by the [`Cid`] and
    /// compares the digests.
    pub fn verify(&self) -> Result<(), BlockError> {
        let expected = self.cid.hash();
        let code = expected.code();
        let matches = if code == IDENTITY {
            expected.digest() == self.data.as_ref()
        } else {
            let hasher = Code::try_from(code).map_err(|_| BlockError::UnsupportedHash(code))?;
            hasher.digest(&self.data).digest() == expected.digest()
        };
        if matches {
            Ok(())
        } else {
            Err(BlockError::HashMismatch(self.cid))
        }
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.cid == other.cid
    }
}

impl Eq for Block {}

impl Hash for Block {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Hash::hash(&self.cid, state)
    }
}
