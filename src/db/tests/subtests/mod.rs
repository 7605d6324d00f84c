// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Behaviour every [`Blockstore`] implementation is expected to share.

use ahash::HashSet;
use cid::{Cid, multihash::Multihash};
use multihash_codetable::Code;

use crate::blocks::{Block, RAW};
use crate::db::{Blockstore, BlockstoreError};
use crate::utils::context::Context;

pub fn put_get<DB>(db: &DB)
where
    DB: Blockstore,
{
    let block = Block::new(&b"beep boop"[..]);
    db.put(&block).unwrap();
    let res = db.get(block.cid()).unwrap();
    assert_eq!(res.cid(), block.cid());
    assert_eq!(res.data(), block.data());
    assert!(db.has(block.cid()).unwrap());
    assert_eq!(db.get_size(block.cid()).unwrap(), b"beep boop".len());

    // a second write of the same content leaves the data intact
    db.put(&block).unwrap();
    assert_eq!(db.get(block.cid()).unwrap().data(), block.data());
}

pub fn put_many<DB>(db: &DB)
where
    DB: Blockstore,
{
    let blocks: Vec<_> = (0..10)
        .map(|i| Block::new_raw(Code::Blake2b256, format!("block {i}").into_bytes()))
        .collect();
    db.put_many(&blocks).unwrap();
    for block in &blocks {
        assert_eq!(db.get(block.cid()).unwrap().data(), block.data());
    }
}

pub fn missing_block<DB>(db: &DB)
where
    DB: Blockstore,
{
    let cid = *Block::new(&b"Azathoth"[..]).cid();
    assert!(!db.has(&cid).unwrap());
    assert!(matches!(db.get(&cid), Err(BlockstoreError::NotFound(c)) if c == cid));
    assert!(matches!(db.get_size(&cid), Err(BlockstoreError::NotFound(c)) if c == cid));
}

pub fn delete<DB>(db: &DB)
where
    DB: Blockstore,
{
    let block = Block::new(&b"Cthulhu"[..]);
    db.put(&block).unwrap();
    db.delete_block(block.cid()).unwrap();
    assert!(!db.has(block.cid()).unwrap());
    // deleting twice is fine
    db.delete_block(block.cid()).unwrap();
}

pub fn hash_on_read<DB>(db: &DB)
where
    DB: Blockstore,
{
    let genuine = Block::new(&b"genuine"[..]);
    let corrupted = Block::new_unchecked(*genuine.cid(), &b"corrupted"[..]);
    db.put(&corrupted).unwrap();

    assert!(db.get(genuine.cid()).is_ok());
    db.hash_on_read(true);
    assert!(matches!(
        db.get(genuine.cid()),
        Err(BlockstoreError::HashMismatch(c)) if c == *genuine.cid()
    ));
    db.hash_on_read(false);
    assert!(db.get(genuine.cid()).is_ok());
}

pub fn hash_on_read_unknown_hash<DB>(db: &DB)
where
    DB: Blockstore,
{
    // blake2b-160 has no hasher to check the data against
    let mh = Multihash::<64>::wrap(0xb214, &[7; 20]).unwrap();
    let cid = Cid::new_v1(RAW, mh);
    db.put(&Block::new_unchecked(cid, &b"data"[..])).unwrap();

    db.hash_on_read(true);
    assert!(matches!(
        db.get(&cid),
        Err(BlockstoreError::UnsupportedHash { cid: c, code: 0xb214 }) if c == cid
    ));
}

pub async fn all_keys<DB>(db: &DB)
where
    DB: Blockstore,
{
    let expected: HashSet<_> = (0..200)
        .map(|i| {
            let block = Block::new(format!("object {i}").into_bytes());
            db.put(&block).unwrap();
            *block.cid()
        })
        .collect();
    let keys = db.all_keys(&Context::background()).unwrap();
    let mut actual = HashSet::default();
    while let Ok(cid) = keys.recv_async().await {
        assert!(actual.insert(cid), "duplicate key {cid}");
    }
    assert_eq!(actual, expected);
}

pub async fn all_keys_cancelled<DB>(db: &DB)
where
    DB: Blockstore,
{
    for i in 0..200 {
        db.put(&Block::new(format!("object {i}").into_bytes()))
            .unwrap();
    }
    let (ctx, cancel) = Context::background().with_cancel();
    cancel.cancel();
    let keys = db.all_keys(&ctx).unwrap();
    assert!(keys.recv_async().await.is_err());
}
