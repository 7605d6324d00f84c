// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cid::multihash::Multihash;
use futures::StreamExt as _;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use super::*;
use crate::blocks::RAW;
use crate::db::{MemoryDB, PutTrackingStore};
use crate::utils::cid::InvalidCid;
use crate::utils::context::ContextError;

#[derive(Default)]
struct MockExchange {
    source: MemoryDB,
    get_block_calls: AtomicUsize,
    get_blocks_calls: AtomicUsize,
    close_calls: AtomicUsize,
    notified: Mutex<Vec<Cid>>,
    fail_notify: bool,
    refuse_batches: bool,
    hang: bool,
    /// Keeps the channels returned by `get_blocks` open instead of closing
    /// them after the available blocks.
    hold_open: bool,
    held: Mutex<Vec<flume::Sender<Block>>>,
    substitute: Option<Block>,
}

impl MockExchange {
    fn with_blocks<'a>(blocks: impl IntoIterator<Item = &'a Block>) -> Self {
        let exchange = Self::default();
        for block in blocks {
            exchange.source.put(block).unwrap();
        }
        exchange
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn get_block(&self, ctx: &Context, cid: &Cid) -> Result<Block, ExchangeError> {
        self.get_block_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            return Err(ctx.done().await.into());
        }
        if let Some(block) = &self.substitute {
            return Ok(block.clone());
        }
        self.source
            .get(cid)
            .map_err(|_| ExchangeError::NotFound(*cid))
    }

    async fn get_blocks(
        &self,
        _ctx: &Context,
        cids: Vec<Cid>,
    ) -> Result<flume::Receiver<Block>, ExchangeError> {
        self.get_blocks_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_batches {
            return Err(ExchangeError::Other(anyhow::anyhow!("batch refused")));
        }
        let (tx, rx) = flume::unbounded();
        for cid in cids {
            if let Ok(block) = self.source.get(&cid) {
                tx.send(block).unwrap();
            }
        }
        if self.hold_open {
            self.held.lock().push(tx);
        }
        Ok(rx)
    }

    async fn notify_new_blocks(&self, blocks: &[Block]) -> Result<(), ExchangeError> {
        self.notified
            .lock()
            .extend(blocks.iter().map(|block| *block.cid()));
        if self.fail_notify {
            Err(ExchangeError::Other(anyhow::anyhow!("announce failed")))
        } else {
            Ok(())
        }
    }

    async fn close(&self) -> Result<(), ExchangeError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Accepts reads but fails every write.
#[derive(Default)]
struct ReadOnlyStore(MemoryDB);

impl Blockstore for ReadOnlyStore {
    fn put(&self, _block: &Block) -> Result<(), BlockstoreError> {
        Err(anyhow::anyhow!("read-only").into())
    }

    fn get(&self, cid: &Cid) -> Result<Block, BlockstoreError> {
        self.0.get(cid)
    }

    fn has(&self, cid: &Cid) -> Result<bool, BlockstoreError> {
        self.0.has(cid)
    }

    fn get_size(&self, cid: &Cid) -> Result<usize, BlockstoreError> {
        self.0.get_size(cid)
    }

    fn delete_block(&self, cid: &Cid) -> Result<(), BlockstoreError> {
        self.0.delete_block(cid)
    }

    fn all_keys(&self, ctx: &Context) -> Result<flume::Receiver<Cid>, BlockstoreError> {
        self.0.all_keys(ctx)
    }

    fn hash_on_read(&self, enabled: bool) {
        self.0.hash_on_read(enabled)
    }
}

fn objects(n: usize) -> Vec<Block> {
    (0..n)
        .map(|i| Block::new(format!("object {i}").into_bytes()))
        .collect()
}

fn tracking_service(
    exchange: Arc<MockExchange>,
) -> BlockService<PutTrackingStore<MemoryDB>, Arc<MockExchange>> {
    BlockService::new(Arc::new(PutTrackingStore::new(MemoryDB::default())), exchange)
}

#[tokio::test]
async fn local_hits_skip_the_exchange() {
    let exchange = Arc::new(MockExchange::default());
    let service = tracking_service(exchange.clone());
    let block = Block::new(&b"beep boop"[..]);

    service.add_block(&block).await.unwrap();
    let fetched = service
        .get_block(&Context::background(), block.cid())
        .await
        .unwrap();
    assert_eq!(fetched.data(), block.data());
    assert_eq!(exchange.get_block_calls.load(Ordering::SeqCst), 0);
    assert_eq!(*exchange.notified.lock(), vec![*block.cid()]);
}

#[tokio::test]
async fn fetched_blocks_are_cached_and_announced() {
    let block = Block::new(&b"remote"[..]);
    let exchange = Arc::new(MockExchange::with_blocks([&block]));
    let service = tracking_service(exchange.clone());
    let ctx = Context::background();

    assert_eq!(service.get_block(&ctx, block.cid()).await.unwrap(), block);
    assert_eq!(service.get_block(&ctx, block.cid()).await.unwrap(), block);
    assert_eq!(exchange.get_block_calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.blockstore().put_count(block.cid()), 1);
    assert_eq!(*exchange.notified.lock(), vec![*block.cid()]);
}

#[tokio::test]
async fn missing_everywhere_is_not_found() {
    let service = tracking_service(Arc::new(MockExchange::default()));
    let cid = *Block::new(&b"nowhere"[..]).cid();
    assert!(matches!(
        service.get_block(&Context::background(), &cid).await,
        Err(BlockServiceError::NotFound(c)) if c == cid
    ));
}

#[tokio::test]
async fn failed_announcements_do_not_fail_adds() {
    let exchange = Arc::new(MockExchange {
        fail_notify: true,
        ..Default::default()
    });
    let service = tracking_service(exchange.clone());
    let block = Block::new(&b"announce me"[..]);

    let failures = metrics::NOTIFY_FAILURE.get();
    service.add_block(&block).await.unwrap();
    assert!(metrics::NOTIFY_FAILURE.get() > failures);
    assert_eq!(service.blockstore().put_count(block.cid()), 1);
}

#[tokio::test]
async fn abandoned_fetches_write_nothing() {
    let exchange = Arc::new(MockExchange {
        hang: true,
        ..Default::default()
    });
    let service = tracking_service(exchange.clone());
    let cid = *Block::new(&b"slow"[..]).cid();

    let ctx = Context::background().with_timeout(Duration::from_millis(20));
    assert!(matches!(
        service.get_block(&ctx, &cid).await,
        Err(BlockServiceError::Context(ContextError::DeadlineExceeded))
    ));
    assert_eq!(service.blockstore().total_puts(), 0);
}

#[tokio::test]
async fn mismatching_exchange_answers_are_rejected() {
    let exchange = Arc::new(MockExchange {
        substitute: Some(Block::new(&b"impostor"[..])),
        ..Default::default()
    });
    let service = tracking_service(exchange);
    let cid = *Block::new(&b"wanted"[..]).cid();
    assert!(matches!(
        service.get_block(&Context::background(), &cid).await,
        Err(BlockServiceError::Exchange(ExchangeError::Other(_)))
    ));
    assert_eq!(service.blockstore().total_puts(), 0);
}

#[tokio::test]
async fn malformed_identifiers_fail_fast() {
    let exchange = Arc::new(MockExchange::default());
    let service = tracking_service(exchange.clone());
    let ctx = Context::background();

    let sha1 = Cid::new_v1(RAW, Multihash::wrap(0x11, &[0; 20]).unwrap());
    assert!(matches!(
        service.get_block(&ctx, &sha1).await,
        Err(BlockServiceError::InvalidArgument(InvalidCid::UnsupportedHash(0x11)))
    ));
    // blake2b-160 is a real hash, but not one blocks can be verified with
    let blake2b_160 = Cid::new_v1(RAW, Multihash::wrap(0xb214, &[0; 20]).unwrap());
    assert!(matches!(
        service.get_block(&ctx, &blake2b_160).await,
        Err(BlockServiceError::InvalidArgument(InvalidCid::UnsupportedHash(0xb214)))
    ));
    let short = Cid::new_v1(RAW, Multihash::wrap(0x12, &[0; 4]).unwrap());
    assert!(matches!(
        service.get_block(&ctx, &short).await,
        Err(BlockServiceError::InvalidArgument(InvalidCid::DigestTooShort(4)))
    ));
    let undefined = Cid::new_v1(RAW, Multihash::wrap(0x12, &[]).unwrap());
    assert!(matches!(
        service
            .add_block(&Block::new_unchecked(undefined, &b""[..]))
            .await,
        Err(BlockServiceError::InvalidArgument(InvalidCid::Undefined))
    ));
    assert_eq!(exchange.get_block_calls.load(Ordering::SeqCst), 0);
    assert_eq!(service.blockstore().total_puts(), 0);
}

#[tokio::test]
async fn check_first_skips_stored_blocks() {
    let block = Block::new(&b"once"[..]);

    let write_through = tracking_service(Arc::new(MockExchange::default()));
    write_through.add_block(&block).await.unwrap();
    write_through.add_block(&block).await.unwrap();
    assert_eq!(write_through.blockstore().put_count(block.cid()), 2);

    let exchange = Arc::new(MockExchange::default());
    let checking = BlockService::with_config(
        Arc::new(PutTrackingStore::new(MemoryDB::default())),
        exchange.clone(),
        BlockServiceConfig {
            check_first: true,
            ..Default::default()
        },
    );
    checking.add_block(&block).await.unwrap();
    checking.add_block(&block).await.unwrap();
    checking.add_blocks(&[block.clone()]).await.unwrap();
    assert_eq!(checking.blockstore().put_count(block.cid()), 1);
    assert_eq!(exchange.notified.lock().len(), 1);
}

#[tokio::test]
async fn add_blocks_writes_each_block_once() {
    let exchange = Arc::new(MockExchange::default());
    let service = tracking_service(exchange.clone());
    let mut blocks = objects(5);
    blocks.extend(objects(5));

    service.add_blocks(&blocks).await.unwrap();
    for block in &blocks[..5] {
        assert_eq!(service.blockstore().put_count(block.cid()), 1);
    }
    assert_eq!(service.blockstore().total_puts(), 5);
    assert_eq!(exchange.notified.lock().len(), 5);
}

#[tokio::test]
async fn get_blocks_mixes_local_and_remote() {
    let blocks = objects(10);
    let exchange = Arc::new(MockExchange::with_blocks(&blocks[5..]));
    let service = tracking_service(exchange.clone());
    service.add_blocks(&blocks[..5]).await.unwrap();

    let mut cids = blocks.iter().map(|b| *b.cid()).collect_vec();
    cids.extend(cids.clone());
    let received: Vec<_> = service
        .get_blocks(&Context::background(), cids)
        .map(Result::unwrap)
        .collect()
        .await;

    assert_eq!(
        received.iter().map(|b| *b.cid()).sorted().collect_vec(),
        blocks.iter().map(|b| *b.cid()).sorted().collect_vec()
    );
    assert_eq!(exchange.get_blocks_calls.load(Ordering::SeqCst), 1);
    for block in &blocks {
        assert_eq!(service.blockstore().put_count(block.cid()), 1);
    }
}

#[tokio::test]
async fn unavailable_blocks_are_omitted() {
    let blocks = objects(3);
    let exchange = Arc::new(MockExchange::with_blocks(&blocks[..2]));
    let service = tracking_service(exchange);

    let received: Vec<_> = service
        .get_blocks(&Context::background(), blocks.iter().map(|b| *b.cid()))
        .collect()
        .await;
    assert_eq!(received.len(), 2);
    assert!(received.iter().all(Result::is_ok));
}

#[tokio::test]
async fn dropped_streams_release_the_exchange_request() {
    let exchange = Arc::new(MockExchange {
        hold_open: true,
        ..Default::default()
    });
    let service = tracking_service(exchange.clone());
    let cid = *Block::new(&b"never arrives"[..]).cid();

    let stream = service.get_blocks(&Context::background(), [cid]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(exchange.get_blocks_calls.load(Ordering::SeqCst), 1);
    assert!(!exchange.held.lock()[0].is_disconnected());
    drop(stream);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(exchange.held.lock()[0].is_disconnected());
    assert_eq!(service.blockstore().total_puts(), 0);
}

#[tokio::test]
async fn refused_batches_end_the_stream_with_an_error() {
    let local = Block::new(&b"local"[..]);
    let remote = Block::new(&b"remote"[..]);
    let exchange = Arc::new(MockExchange {
        refuse_batches: true,
        ..Default::default()
    });
    let service = tracking_service(exchange);
    service.add_block(&local).await.unwrap();

    let received: Vec<_> = service
        .get_blocks(&Context::background(), [*local.cid(), *remote.cid()])
        .collect()
        .await;
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].as_ref().unwrap(), &local);
    assert!(matches!(
        received[1],
        Err(BlockServiceError::Exchange(ExchangeError::Other(_)))
    ));
}

#[tokio::test]
async fn store_failures_end_the_stream_with_an_error() {
    let block = Block::new(&b"unstorable"[..]);
    let service = BlockService::new(
        Arc::new(ReadOnlyStore::default()),
        Arc::new(MockExchange::with_blocks([&block])),
    );
    let received: Vec<_> = service
        .get_blocks(&Context::background(), [*block.cid()])
        .collect()
        .await;
    assert_eq!(received.len(), 1);
    assert!(matches!(
        received[0],
        Err(BlockServiceError::Store(BlockstoreError::Other(_)))
    ));
}

#[tokio::test]
async fn cancelled_batches_emit_nothing() {
    let blocks = objects(3);
    let service = tracking_service(Arc::new(MockExchange::with_blocks(&blocks)));
    let (ctx, cancel) = Context::background().with_cancel();
    cancel.cancel();

    let received: Vec<_> = service
        .get_blocks(&ctx, blocks.iter().map(|b| *b.cid()))
        .collect()
        .await;
    assert!(received.is_empty());
    assert_eq!(service.blockstore().total_puts(), 0);
}

#[tokio::test]
async fn empty_batches_finish_immediately() {
    let exchange = Arc::new(MockExchange::default());
    let service = tracking_service(exchange.clone());
    let received: Vec<_> = service
        .get_blocks(&Context::background(), [])
        .collect()
        .await;
    assert!(received.is_empty());
    assert_eq!(exchange.get_blocks_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn close_is_idempotent_and_final() {
    let exchange = Arc::new(MockExchange::default());
    let service = tracking_service(exchange.clone());
    let block = Block::new(&b"late"[..]);
    let stored = Block::new(&b"stored before close"[..]);
    service.add_block(&stored).await.unwrap();

    service.close().await.unwrap();
    service.close().await.unwrap();
    assert_eq!(exchange.close_calls.load(Ordering::SeqCst), 1);
    assert!(service.exchange().is_none());

    assert!(matches!(
        service.add_block(&block).await,
        Err(BlockServiceError::Closed)
    ));
    assert!(matches!(
        service.get_block(&Context::background(), block.cid()).await,
        Err(BlockServiceError::Closed)
    ));
    // local hits are refused too
    assert!(matches!(
        service.get_block(&Context::background(), stored.cid()).await,
        Err(BlockServiceError::Closed)
    ));
    assert!(service.blockstore().has(stored.cid()).unwrap());
    let received: Vec<_> = service
        .get_blocks(&Context::background(), [*block.cid()])
        .collect()
        .await;
    assert!(matches!(received[..], [Err(BlockServiceError::Closed)]));
}

#[test]
fn config_from_toml() {
    let config: BlockServiceConfig =
        crate::utils::io::read_toml("check_first = true\nfetch_batch_size = 8").unwrap();
    assert_eq!(
        config,
        BlockServiceConfig {
            check_first: true,
            fetch_batch_size: 8,
            output_buffer: 64,
        }
    );
}
