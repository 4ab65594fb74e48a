//! Hash-linked blocks and the append-only chain that owns them.
use crate::config::ChainConfig;
use crate::error::VerifyError;
use crate::pow::{Difficulty, PowResult, ProofOfWork, DIGEST_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Payload of the first block in every chain.
pub const GENESIS_PAYLOAD: &[u8] = b"Genesis";

/// One record. Only built from a solved puzzle over its own inputs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    #[serde(with = "hex::serde")]
    digest: [u8; DIGEST_LEN],
    #[serde(with = "hex::serde")]
    payload: Vec<u8>,
    #[serde(with = "hex::serde")]
    previous_digest: Vec<u8>,
    nonce: u64,
}

impl Block {
    fn mine(
        previous_digest: Vec<u8>,
        payload: Vec<u8>,
        difficulty: Difficulty,
        workers: usize,
    ) -> crate::Result<Self> {
        let pow = ProofOfWork::with_difficulty(previous_digest, payload, difficulty);
        let PowResult { nonce, digest } = if workers == 1 {
            pow.solve()?
        } else {
            pow.solve_distributed(workers)?
        };
        let (previous_digest, payload) = pow.into_parts();
        Ok(Self {
            digest,
            payload,
            previous_digest,
            nonce,
        })
    }

    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn previous_digest(&self) -> &[u8] {
        &self.previous_digest
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_digest.is_empty()
    }

    /// The puzzle this block claims to solve at `difficulty`.
    pub fn puzzle(&self, difficulty: Difficulty) -> ProofOfWork {
        ProofOfWork::with_difficulty(
            self.previous_digest.clone(),
            self.payload.clone(),
            difficulty,
        )
    }

    /// Whether the stored nonce meets `difficulty` for this block's inputs.
    pub fn validate(&self, difficulty: Difficulty) -> bool {
        self.puzzle(difficulty).validate(self.nonce)
    }

    fn check(&self, index: usize, difficulty: Difficulty) -> Result<(), VerifyError> {
        let pow = self.puzzle(difficulty);
        if pow.digest_for_nonce(self.nonce) != self.digest {
            return Err(VerifyError::DigestMismatch { index });
        }
        if !pow.target().is_met_by(&self.digest) {
            return Err(VerifyError::InsufficientWork { index });
        }
        Ok(())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Data: {}", String::from_utf8_lossy(&self.payload))?;
        writeln!(f, "\tPrevHash: {}", hex::encode(&self.previous_digest))?;
        writeln!(f, "\tHash: {}", hex::encode(self.digest))?;
        write!(f, "\tNonce: {}", self.nonce)
    }
}

/// Append-only, never-empty sequence of blocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BlockChain {
    blocks: Vec<Block>,
}

impl BlockChain {
    /// Mine the genesis block and start a chain with it.
    pub fn initialize(config: &ChainConfig) -> crate::Result<Self> {
        config.validate()?;
        let genesis = Block::mine(
            Vec::new(),
            GENESIS_PAYLOAD.to_vec(),
            config.target_difficulty()?,
            config.workers,
        )?;
        info!(
            digest = %hex::encode(genesis.digest),
            nonce = genesis.nonce,
            difficulty = config.difficulty,
            "genesis block mined"
        );
        Ok(Self {
            blocks: vec![genesis],
        })
    }

    /// Mine `payload` onto the tail using `config`. On error the chain is unchanged.
    pub fn append(
        &mut self,
        payload: impl Into<Vec<u8>>,
        config: &ChainConfig,
    ) -> crate::Result<&Block> {
        config.validate()?;
        self.append_with_workers(payload, config.target_difficulty()?, config.workers)
    }

    pub fn append_with_workers(
        &mut self,
        payload: impl Into<Vec<u8>>,
        difficulty: Difficulty,
        workers: usize,
    ) -> crate::Result<&Block> {
        let previous_digest = self.tail().digest.to_vec();
        let block = Block::mine(previous_digest, payload.into(), difficulty, workers)?;
        Ok(self.push_mined(block))
    }

    /// Link a block mined on top of `tail_digest` without touching the chain.
    pub(crate) fn mine_after(
        tail_digest: &[u8; DIGEST_LEN],
        payload: Vec<u8>,
        config: &ChainConfig,
    ) -> crate::Result<Block> {
        config.validate()?;
        Block::mine(
            tail_digest.to_vec(),
            payload,
            config.target_difficulty()?,
            config.workers,
        )
    }

    /// Caller guarantees `block` was mined on the current tail.
    pub(crate) fn push_mined(&mut self, block: Block) -> &Block {
        debug_assert_eq!(block.previous_digest, self.tail().digest);
        info!(
            index = self.blocks.len(),
            digest = %hex::encode(block.digest),
            nonce = block.nonce,
            "block appended"
        );
        self.blocks.push(block);
        self.tail()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always `false`; kept for the `len`/`is_empty` pairing.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn genesis(&self) -> &Block {
        // `initialize` is the only constructor and nothing removes blocks.
        self.blocks
            .first()
            .expect("chain always holds its genesis block")
    }

    pub fn tail(&self) -> &Block {
        self.blocks
            .last()
            .expect("chain always holds its genesis block")
    }

    /// Check every block's link, digest and proof at a uniform `difficulty`.
    pub fn audit(&self, difficulty: Difficulty) -> Result<(), VerifyError> {
        audit_blocks(&self.blocks, difficulty)
    }
}

impl<'a> IntoIterator for &'a BlockChain {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

/// Audit an arbitrary block sequence (for example a deserialized one).
pub fn audit_blocks(blocks: &[Block], difficulty: Difficulty) -> Result<(), VerifyError> {
    let genesis = blocks.first().ok_or(VerifyError::EmptyChain)?;
    if !genesis.is_genesis() {
        return Err(VerifyError::GenesisHasParent);
    }
    genesis.check(0, difficulty)?;
    for (index, pair) in blocks.windows(2).enumerate() {
        let (prev, block) = (&pair[0], &pair[1]);
        let index = index + 1;
        if block.previous_digest != prev.digest {
            return Err(VerifyError::BrokenLink { index });
        }
        block.check(index, difficulty)?;
    }
    Ok(())
}
