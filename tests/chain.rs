use hashchain::{
    validate, BlockChain, ChainConfig, ChainConfigBuilder, Error, ProofOfWork, VerifyError,
};

#[test]
fn append_scenario_difficulty_8() {
    let config = ChainConfig::new(8, 1).unwrap();
    let mut chain = BlockChain::initialize(&config).unwrap();
    chain.append("a", &config).unwrap();

    assert_eq!(chain.len(), 2);
    let (genesis, block) = (&chain.blocks()[0], &chain.blocks()[1]);
    assert_eq!(block.previous_digest(), genesis.digest());
    assert_eq!(
        validate(block.previous_digest(), block.payload(), 8, block.nonce()),
        Ok(true)
    );
}

#[test]
fn single_and_distributed_solve_agree() {
    let tail = [0x5au8; 32];
    let single = ProofOfWork::new(tail, b"payload".to_vec(), 14)
        .unwrap()
        .solve()
        .unwrap();
    let multi_pow = ProofOfWork::new(tail, b"payload".to_vec(), 14).unwrap();
    let multi = multi_pow.solve_distributed(4).unwrap();

    assert_eq!(single, multi);
    assert!(multi_pow.validate(multi.nonce));
    assert!(multi_pow.verify(&single));
    assert_eq!(multi_pow.solve_distributed(1).unwrap(), single);
}

#[test]
fn bad_difficulty_is_rejected_before_hashing() {
    for difficulty in [0u32, 256, 1000] {
        assert!(matches!(
            ProofOfWork::new(Vec::new(), b"x".to_vec(), difficulty),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            ChainConfig::new(difficulty, 1),
            Err(Error::InvalidConfig(_))
        ));
    }
    let bad = ChainConfig {
        difficulty: 0,
        workers: 4,
    };
    assert!(matches!(
        BlockChain::initialize(&bad),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn every_block_validates_and_links() {
    let config = ChainConfigBuilder::default()
        .difficulty(10)
        .workers(3)
        .build_validated()
        .unwrap();
    let difficulty = config.target_difficulty().unwrap();
    let mut chain = BlockChain::initialize(&config).unwrap();
    for payload in ["alpha", "beta", "gamma", "delta"] {
        chain.append(payload, &config).unwrap();
    }

    assert_eq!(chain.len(), 5);
    assert!(chain.genesis().is_genesis());
    for (i, block) in chain.iter().enumerate() {
        assert!(block.validate(difficulty), "block {i}");
        if i > 0 {
            assert_eq!(block.previous_digest(), chain.blocks()[i - 1].digest());
        }
    }
    assert_eq!(chain.audit(difficulty), Ok(()));
}

#[test]
fn chains_are_independent() {
    let config = ChainConfig::new(8, 2).unwrap();
    let mut first = BlockChain::initialize(&config).unwrap();
    let second = BlockChain::initialize(&config).unwrap();
    first.append("only here", &config).unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 1);
    assert_eq!(first.genesis(), second.genesis());
}

#[test]
fn difficulty_can_change_between_appends() {
    let easy = ChainConfig::new(6, 1).unwrap();
    let hard = ChainConfig::new(12, 2).unwrap();
    let mut chain = BlockChain::initialize(&easy).unwrap();
    chain.append("hard block", &hard).unwrap();

    let block = chain.tail();
    assert!(block.validate(hard.target_difficulty().unwrap()));
    assert_eq!(
        chain.audit(hard.target_difficulty().unwrap()),
        Err(VerifyError::DigestMismatch { index: 0 })
    );
}
