use crate::block::{Block, BlockChain};
use crate::config::ChainConfig;
use crate::error::{Error, Result};
use crate::pow::DIGEST_LEN;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

#[derive(Debug)]
struct Inner {
    // Held across "read tail, solve, push"; only appends take it.
    writer: Mutex<()>,
    published: RwLock<BlockChain>,
}

/// Cloneable handle to one chain shared between threads.
///
/// Appends are serialized, so two appends can never extend the same tail.
/// Mining happens outside the published chain's lock: readers only wait for
/// the final push and always see a complete, linked prefix.
#[derive(Clone, Debug)]
pub struct SharedChain {
    inner: Arc<Inner>,
}

impl SharedChain {
    pub fn initialize(config: &ChainConfig) -> Result<Self> {
        Ok(Self::from_chain(BlockChain::initialize(config)?))
    }

    pub fn from_chain(chain: BlockChain) -> Self {
        Self {
            inner: Arc::new(Inner {
                writer: Mutex::new(()),
                published: RwLock::new(chain),
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BlockChain>> {
        self.inner.published.read().map_err(|_| Error::Poisoned)
    }

    /// Mine and append `payload`, returning a copy of the new block.
    pub fn append(&self, payload: impl Into<Vec<u8>>, config: &ChainConfig) -> Result<Block> {
        let _writer = self.inner.writer.lock().map_err(|_| Error::Poisoned)?;
        let tail_digest = self.tail_digest()?;
        let block = BlockChain::mine_after(&tail_digest, payload.into(), config)?;

        let mut chain = self.inner.published.write().map_err(|_| Error::Poisoned)?;
        Ok(chain.push_mined(block).clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn tail_digest(&self) -> Result<[u8; DIGEST_LEN]> {
        Ok(*self.read()?.tail().digest())
    }

    /// Copy of the blocks appended so far.
    pub fn snapshot(&self) -> Result<Vec<Block>> {
        Ok(self.read()?.blocks().to_vec())
    }

    /// Run `f` against the published chain under a read lock.
    pub fn with_chain<R>(&self, f: impl FnOnce(&BlockChain) -> R) -> Result<R> {
        let chain = self.read()?;
        Ok(f(&chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn concurrent_appends_stay_linear() {
        let cfg = ChainConfig::new(8, 2).unwrap();
        let chain = SharedChain::initialize(&cfg).unwrap();

        let joins: Vec<_> = (0..4)
            .map(|i| {
                let chain = chain.clone();
                let cfg = cfg.clone();
                thread::spawn(move || chain.append(format!("writer-{i}"), &cfg).unwrap())
            })
            .collect();
        for j in joins {
            j.join().unwrap();
        }

        let blocks = chain.snapshot().unwrap();
        assert_eq!(blocks.len(), 5);
        for pair in blocks.windows(2) {
            assert_eq!(pair[1].previous_digest(), pair[0].digest());
        }
        chain
            .with_chain(|c| c.audit(cfg.target_difficulty().unwrap()))
            .unwrap()
            .unwrap();
        assert_eq!(chain.tail_digest().unwrap(), *blocks[4].digest());
    }

    #[test]
    fn failed_append_keeps_length() {
        let cfg = ChainConfig::new(8, 1).unwrap();
        let chain = SharedChain::initialize(&cfg).unwrap();
        let bad = ChainConfig {
            difficulty: 256,
            workers: 1,
        };
        assert!(matches!(chain.append("x", &bad), Err(Error::InvalidConfig(_))));
        assert_eq!(chain.len().unwrap(), 1);
    }

    #[test]
    fn readers_do_not_wait_for_the_writer() {
        let chain = SharedChain::initialize(&ChainConfig::new(8, 1).unwrap()).unwrap();
        let _writer = chain.inner.writer.lock().unwrap();
        assert_eq!(chain.len().unwrap(), 1);
        assert_eq!(chain.snapshot().unwrap().len(), 1);
        assert_eq!(chain.with_chain(|c| c.len()).unwrap(), 1);
    }

    #[test]
    fn reads_stay_fast_during_a_slow_append() {
        let chain = SharedChain::initialize(&ChainConfig::new(8, 1).unwrap()).unwrap();
        let slow = ChainConfig::new(22, 2).unwrap();

        let writer = {
            let chain = chain.clone();
            thread::spawn(move || chain.append("slow", &slow).unwrap())
        };
        thread::sleep(Duration::from_millis(20));

        for _ in 0..10 {
            let started = Instant::now();
            let blocks = chain.snapshot().unwrap();
            assert!(started.elapsed() < Duration::from_millis(200));
            assert!(!blocks.is_empty() && blocks.len() <= 2);
            thread::sleep(Duration::from_millis(5));
        }

        let block = writer.join().unwrap();
        assert_eq!(chain.len().unwrap(), 2);
        assert_eq!(chain.tail_digest().unwrap(), *block.digest());
    }
}
