//! Shared helpers for the parallel nonce search: residue-class nonce streams,
//! the lowest-winner slot and the early-stop flag.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Nonces `offset, offset + stride, offset + 2 * stride, ...` up to and
/// including `limit`.
///
/// For a fixed `stride`, the streams for offsets `0..stride` partition
/// `0..=limit`: every nonce is yielded by exactly one of them.
#[derive(Debug, Clone)]
pub struct ResidueNonces {
    next: Option<u64>,
    stride: u64,
    limit: u64,
}

impl ResidueNonces {
    /// Build the stream for worker `offset` of `stride` workers.
    pub fn new(offset: u64, stride: u64, limit: u64) -> Result<Self, String> {
        if stride == 0 {
            return Err("stride must be >= 1".to_owned());
        }
        if offset >= stride {
            return Err("offset must be < stride".to_owned());
        }
        Ok(Self {
            next: (offset <= limit).then_some(offset),
            stride,
            limit,
        })
    }

    /// The nonce the next call to `next` will yield, if any.
    #[inline]
    pub fn peek(&self) -> Option<u64> {
        self.next
    }
}

impl Iterator for ResidueNonces {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let current = self.next?;
        self.next = current
            .checked_add(self.stride)
            .filter(|n| *n <= self.limit);
        Some(current)
    }
}

/// Lowest nonce published by any worker so far.
///
/// A published nonce `n` makes every candidate above `n` pointless, so workers
/// consult `is_beaten` before hashing.
#[derive(Debug)]
pub struct BestNonce {
    best: AtomicU64,
}

const UNSET: u64 = u64::MAX;

impl BestNonce {
    pub const fn new() -> Self {
        Self {
            best: AtomicU64::new(UNSET),
        }
    }

    /// Offer a winning nonce; returns `true` if it became the new lowest.
    pub fn publish(&self, nonce: u64) -> bool {
        self.best.fetch_min(nonce, Ordering::SeqCst) > nonce
    }

    /// Whether `nonce` can no longer win.
    #[inline]
    pub fn is_beaten(&self, nonce: u64) -> bool {
        nonce > self.best.load(Ordering::Acquire)
    }

    pub fn get(&self) -> Option<u64> {
        match self.best.load(Ordering::Acquire) {
            UNSET => None,
            n => Some(n),
        }
    }
}

impl Default for BestNonce {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct StopFlag {
    stop: AtomicBool,
}

impl StopFlag {
    pub const fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn force_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Default for StopFlag {
    fn default() -> Self {
        Self::new()
    }
}
