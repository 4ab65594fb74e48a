use hashchain::config::DIFFICULTY_ENV;
use hashchain::{BlockChain, ChainConfig, ProofOfWork};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const QUOTES: [&str; 4] = [
    "Hello, world.",
    "I can eat glass and it doesn't hurt me.",
    "If a program is too slow, it must have a loop.",
    "Don't communicate by sharing memory, share memory by communicating.",
];

fn main() -> Result<(), hashchain::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(true)
        .init();

    // HASHCHAIN_DIFFICULTY / HASHCHAIN_WORKERS override the demo defaults.
    let config = if std::env::var_os(DIFFICULTY_ENV).is_some() {
        ChainConfig::from_env()?
    } else {
        let workers = std::thread::available_parallelism()
            .map(|nz| nz.get())
            .unwrap_or(1);
        ChainConfig::new(16, workers)?
    };
    println!(
        "Running with {} workers at difficulty {}",
        config.workers, config.difficulty
    );

    let start = Instant::now();
    let mut chain = BlockChain::initialize(&config)?;
    for quote in QUOTES {
        chain.append(quote, &config)?;
    }

    println!();
    for (i, block) in chain.iter().enumerate() {
        let pow = ProofOfWork::new(block.previous_digest(), block.payload(), config.difficulty)?;
        println!("Block {i}: {block}");
        println!("\tPoW: {}", pow.validate(block.nonce()));
    }
    println!("audit: {:?}", chain.audit(config.target_difficulty()?));
    println!("took {:?}", start.elapsed());

    Ok(())
}
