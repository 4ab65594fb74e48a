//! The proof-of-work puzzle: canonical byte layout, difficulty target, and the
//! single-threaded and distributed nonce searches.
use crate::error::{Error, Result};
use crate::work::{BestNonce, ResidueNonces, StopFlag};
use flume::Sender;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace, warn};

/// Bit width of the digest function (SHA-256).
pub const DIGEST_BITS: u32 = 256;

/// Digest length in bytes.
pub const DIGEST_LEN: usize = 32;

/// Largest nonce a search will try. Nonces are encoded as signed 64-bit
/// integers, so the search never goes past `i64::MAX`.
pub const MAX_NONCE: u64 = i64::MAX as u64;

/// A difficulty in `[1, DIGEST_BITS - 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Difficulty(u32);

impl Difficulty {
    pub fn new(bits: u32) -> Result<Self> {
        if bits == 0 || bits >= DIGEST_BITS {
            return Err(Error::InvalidConfig(format!(
                "difficulty must be in [1, {}], got {bits}",
                DIGEST_BITS - 1
            )));
        }
        Ok(Self(bits))
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Difficulty {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self> {
        Self::new(bits)
    }
}

impl From<Difficulty> for u32 {
    fn from(d: Difficulty) -> u32 {
        d.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `2^(DIGEST_BITS - difficulty)` as a big-endian 256-bit integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Target([u8; DIGEST_LEN]);

impl Target {
    pub fn from_difficulty(difficulty: Difficulty) -> Self {
        let bit = DIGEST_BITS - difficulty.get();
        let mut bytes = [0u8; DIGEST_LEN];
        bytes[DIGEST_LEN - 1 - (bit / 8) as usize] = 1 << (bit % 8);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Whether `digest`, read as an unsigned big-endian integer, is strictly
    /// below the target.
    #[inline]
    pub fn is_met_by(&self, digest: &[u8; DIGEST_LEN]) -> bool {
        // Equal-length byte arrays order lexicographically, which is the
        // big-endian unsigned order.
        digest < &self.0
    }
}

/// A solved puzzle: the winning nonce and the digest it produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PowResult {
    pub nonce: u64,
    #[serde(with = "hex::serde")]
    pub digest: [u8; DIGEST_LEN],
}

impl PowResult {
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

/// Puzzle binding `payload` to `previous_digest` at a given difficulty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofOfWork {
    previous_digest: Vec<u8>,
    payload: Vec<u8>,
    difficulty: Difficulty,
    target: Target,
}

impl ProofOfWork {
    /// Build a puzzle. Fails with `Error::InvalidConfig` when `difficulty` is
    /// outside `[1, 255]`; nothing is hashed in that case.
    pub fn new(
        previous_digest: impl Into<Vec<u8>>,
        payload: impl Into<Vec<u8>>,
        difficulty: u32,
    ) -> Result<Self> {
        Ok(Self::with_difficulty(
            previous_digest,
            payload,
            Difficulty::new(difficulty)?,
        ))
    }

    pub fn with_difficulty(
        previous_digest: impl Into<Vec<u8>>,
        payload: impl Into<Vec<u8>>,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            previous_digest: previous_digest.into(),
            payload: payload.into(),
            difficulty,
            target: Target::from_difficulty(difficulty),
        }
    }

    pub fn previous_digest(&self) -> &[u8] {
        &self.previous_digest
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Hand back `(previous_digest, payload)`.
    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.previous_digest, self.payload)
    }

    /// Canonical layout: `previous_digest || payload || BE64(nonce) || BE64(difficulty)`.
    pub fn bytes_for_nonce(&self, nonce: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.previous_digest.len() + self.payload.len() + 16);
        out.extend_from_slice(&self.previous_digest);
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&nonce.to_be_bytes());
        out.extend_from_slice(&u64::from(self.difficulty.get()).to_be_bytes());
        out
    }

    /// SHA-256 of `bytes_for_nonce(nonce)`, streamed without building the buffer.
    pub fn digest_for_nonce(&self, nonce: u64) -> [u8; DIGEST_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(&self.previous_digest);
        hasher.update(&self.payload);
        hasher.update(nonce.to_be_bytes());
        hasher.update(u64::from(self.difficulty.get()).to_be_bytes());
        hasher.finalize().into()
    }

    /// Whether `nonce` solves this puzzle. Pure; safe to call from many threads.
    pub fn validate(&self, nonce: u64) -> bool {
        self.target.is_met_by(&self.digest_for_nonce(nonce))
    }

    /// `validate` plus a check that the claimed digest is the one `nonce` produces.
    pub fn verify(&self, result: &PowResult) -> bool {
        let digest = self.digest_for_nonce(result.nonce);
        digest == result.digest && self.target.is_met_by(&digest)
    }

    /// Try nonces `0, 1, 2, ...` and return the first one below the target.
    pub fn solve(&self) -> Result<PowResult> {
        self.solve_up_to(MAX_NONCE, &StopFlag::new())
    }

    /// Search with `workers` threads, worker `i` taking nonces `i, i + workers, ...`.
    ///
    /// Returns the lowest solving nonce, so the result is identical to
    /// `solve()` for any worker count. `workers == 1` runs the sequential search inline.
    pub fn solve_distributed(&self, workers: usize) -> Result<PowResult> {
        self.solve_distributed_up_to(workers, MAX_NONCE, Arc::new(StopFlag::new()))
    }

    /// Like `solve_distributed`, but aborts with `Error::Cancelled` once `stop`
    /// is raised by the caller, for any worker count.
    ///
    /// A solution delivered before the stop is still returned; it is valid but
    /// may not be the lowest one.
    pub fn solve_distributed_cancellable(
        &self,
        workers: usize,
        stop: Arc<StopFlag>,
    ) -> Result<PowResult> {
        self.solve_distributed_up_to(workers, MAX_NONCE, stop)
    }

    fn solve_up_to(&self, limit: u64, stop: &StopFlag) -> Result<PowResult> {
        for nonce in 0..=limit {
            if stop.should_stop() {
                debug!(nonce, difficulty = %self.difficulty, "search cancelled");
                return Err(Error::Cancelled);
            }
            let digest = self.digest_for_nonce(nonce);
            if self.target.is_met_by(&digest) {
                debug!(nonce, difficulty = %self.difficulty, "puzzle solved");
                return Ok(PowResult { nonce, digest });
            }
        }
        warn!(difficulty = %self.difficulty, limit, "nonce space exhausted");
        Err(Error::SearchExhausted {
            difficulty: self.difficulty.get(),
        })
    }

    fn solve_distributed_up_to(
        &self,
        workers: usize,
        limit: u64,
        stop: Arc<StopFlag>,
    ) -> Result<PowResult> {
        if workers == 0 {
            return Err(Error::InvalidConfig("workers must be >= 1".into()));
        }
        if stop.should_stop() {
            return Err(Error::Cancelled);
        }
        if workers == 1 {
            return self.solve_up_to(limit, &stop);
        }
        debug!(workers, difficulty = %self.difficulty, "starting distributed solve");

        let stride = workers as u64;
        let puzzle = Arc::new(self.clone());
        let best = Arc::new(BestNonce::new());
        // Each worker delivers at most once, so sends never block.
        let (tx, rx) = flume::bounded::<PowResult>(workers);
        let mut joins = Vec::with_capacity(workers);

        let streams = (0..stride)
            .map(|offset| ResidueNonces::new(offset, stride, limit).map(|n| (offset, n)))
            .collect::<std::result::Result<Vec<_>, String>>()
            .map_err(Error::InvalidConfig)?;

        for (offset, nonces) in streams {
            let worker_puzzle = puzzle.clone();
            let worker_best = best.clone();
            let worker_stop = stop.clone();
            let worker_tx = tx.clone();
            let join = thread::Builder::new()
                .name(format!("pow-worker-{offset}"))
                .spawn(move || {
                    worker_loop(
                        offset,
                        worker_puzzle,
                        nonces,
                        worker_best,
                        worker_stop,
                        worker_tx,
                    );
                });
            match join {
                Ok(join) => joins.push(join),
                Err(err) => {
                    stop.force_stop();
                    join_handles(joins)?;
                    return Err(Error::Spawn(err.to_string()));
                }
            }
        }
        drop(tx);

        // Hits arrive in any order; keep the lowest. The channel closes once
        // every worker has either won, been beaten, or been cancelled.
        let mut winner: Option<PowResult> = None;
        while let Ok(hit) = rx.recv() {
            if winner.map_or(true, |w| hit.nonce < w.nonce) {
                winner = Some(hit);
            }
        }
        let cancelled = stop.should_stop();
        stop.force_stop();
        join_handles(joins)?;
        self.settle(winner, cancelled, limit, workers)
    }

    /// A delivered hit always wins; otherwise the stop flag decides between
    /// cancellation and exhaustion.
    fn settle(
        &self,
        winner: Option<PowResult>,
        cancelled: bool,
        limit: u64,
        workers: usize,
    ) -> Result<PowResult> {
        match winner {
            Some(result) => {
                debug!(
                    nonce = result.nonce,
                    workers,
                    difficulty = %self.difficulty,
                    "puzzle solved"
                );
                Ok(result)
            }
            None if cancelled => Err(Error::Cancelled),
            None => {
                warn!(difficulty = %self.difficulty, limit, workers, "nonce space exhausted");
                Err(Error::SearchExhausted {
                    difficulty: self.difficulty.get(),
                })
            }
        }
    }
}

fn worker_loop(
    offset: u64,
    puzzle: Arc<ProofOfWork>,
    nonces: ResidueNonces,
    best: Arc<BestNonce>,
    stop: Arc<StopFlag>,
    tx: Sender<PowResult>,
) {
    for nonce in nonces {
        // Nonces only grow within a worker, so once beaten it stays beaten.
        if stop.should_stop() || best.is_beaten(nonce) {
            trace!(offset, nonce, "worker stopping");
            return;
        }
        let digest = puzzle.digest_for_nonce(nonce);
        if puzzle.target.is_met_by(&digest) {
            // The caller holds the receiver until every worker has exited,
            // so a failed send means the caller itself is gone.
            if !stop.should_stop()
                && best.publish(nonce)
                && tx.send(PowResult { nonce, digest }).is_err()
            {
                trace!(offset, nonce, "receiver dropped before delivery");
            }
            trace!(offset, nonce, "worker found solution");
            return;
        }
    }
}

fn join_handles(joins: Vec<thread::JoinHandle<()>>) -> Result<()> {
    let mut panicked = false;
    for handle in joins {
        panicked |= handle.join().is_err();
    }
    if panicked {
        return Err(Error::WorkerPanicked);
    }
    Ok(())
}

/// Audit a claimed nonce without re-mining.
pub fn validate(
    previous_digest: &[u8],
    payload: &[u8],
    difficulty: u32,
    nonce: u64,
) -> Result<bool> {
    let pow = ProofOfWork::new(previous_digest, payload, difficulty)?;
    Ok(pow.validate(nonce))
}
