use thiserror::Error;

/// Why a chain failed an audit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("chain has no genesis block")]
    EmptyChain,
    #[error("genesis block carries a previous digest")]
    GenesisHasParent,
    #[error("block {index} does not link to its predecessor")]
    BrokenLink { index: usize },
    #[error("block {index} digest does not match its contents")]
    DigestMismatch { index: usize },
    #[error("block {index} does not meet the difficulty target")]
    InsufficientWork { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("nonce space exhausted at difficulty {difficulty}")]
    SearchExhausted { difficulty: u32 },
    #[error("search cancelled")]
    Cancelled,
    #[error("failed to spawn solver worker: {0}")]
    Spawn(String),
    #[error("solver worker panicked")]
    WorkerPanicked,
    #[error("chain lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, Error>;
