use hashchain::{ChainConfig, SharedChain};
use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn appends_from_many_tasks_form_one_chain() {
    let config = ChainConfig::new(10, 2).unwrap();
    let chain = SharedChain::initialize(&config).unwrap();

    let mut tasks = Vec::new();
    for i in 0..6 {
        let chain = chain.clone();
        let config = config.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            chain.append(format!("task-{i}"), &config)
        }));
    }
    for task in tasks {
        task.await.expect("task join").expect("append");
    }

    let blocks = chain.snapshot().unwrap();
    assert_eq!(blocks.len(), 7);
    let mut payloads: Vec<_> = blocks[1..]
        .iter()
        .map(|b| String::from_utf8(b.payload().to_vec()).unwrap())
        .collect();
    payloads.sort();
    assert_eq!(
        payloads,
        (0..6).map(|i| format!("task-{i}")).collect::<Vec<_>>()
    );
    chain
        .with_chain(|c| c.audit(config.target_difficulty().unwrap()))
        .unwrap()
        .expect("chain audits");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn readers_see_completed_blocks_only() {
    let config = ChainConfig::new(16, 2).unwrap();
    let difficulty = config.target_difficulty().unwrap();
    let chain = SharedChain::initialize(&config).unwrap();
    let writer = {
        let chain = chain.clone();
        let config = config.clone();
        tokio::task::spawn_blocking(move || {
            for i in 0..3 {
                chain.append(vec![i as u8], &config).expect("append");
            }
        })
    };

    // Every snapshot taken mid-flight is a valid, linked prefix, and taking
    // one never waits for the block being mined.
    let reader = {
        let chain = chain.clone();
        tokio::task::spawn_blocking(move || {
            let mut lengths = Vec::new();
            for _ in 0..20 {
                let started = Instant::now();
                let blocks = chain.snapshot().expect("snapshot");
                assert!(started.elapsed() < Duration::from_millis(200));
                hashchain::audit_blocks(&blocks, difficulty).expect("prefix audits");
                lengths.push(blocks.len());
                std::thread::sleep(Duration::from_millis(2));
            }
            lengths
        })
    };

    let lengths = reader.await.expect("reader join");
    writer.await.expect("writer join");
    assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
    assert!(lengths.iter().all(|&n| (1..=4).contains(&n)));
    assert_eq!(chain.len().unwrap(), 4);
}
