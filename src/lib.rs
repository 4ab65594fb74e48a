//! An append-only hash chain whose blocks are admitted by proof of work.
//!
//! Each block stores the digest of its predecessor and a nonce such that
//! `SHA-256(previous_digest || payload || BE64(nonce) || BE64(difficulty))`
//! is below `2^(256 - difficulty)`. The nonce search can run on one thread or
//! be split across workers by residue class; both return the same, lowest
//! solving nonce.
//!
//! ```no_run
//! use hashchain::{BlockChain, ChainConfigBuilder};
//!
//! let config = ChainConfigBuilder::default()
//!     .difficulty(16)
//!     .workers(4)
//!     .build_validated()?;
//! let mut chain = BlockChain::initialize(&config)?;
//! chain.append("hello", &config)?;
//! chain.audit(config.target_difficulty()?).expect("freshly mined chain verifies");
//! # Ok::<(), hashchain::Error>(())
//! ```

pub mod block;
pub mod config;
pub mod error;
pub mod pow;
pub mod shared;
pub mod work;

pub use block::{audit_blocks, Block, BlockChain, GENESIS_PAYLOAD};
pub use config::{ChainConfig, ChainConfigBuilder};
pub use error::{Error, Result, VerifyError};
pub use pow::{
    validate, Difficulty, PowResult, ProofOfWork, Target, DIGEST_BITS, DIGEST_LEN, MAX_NONCE,
};
pub use shared::SharedChain;
pub use work::StopFlag;
