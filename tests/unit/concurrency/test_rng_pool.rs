//! Generator-pool behavior under concurrent borrowers

use std::sync::Arc;
use std::thread;

use creditscout::math::rng::RngPool;

#[test]
fn concurrent_borrowers_never_block_or_share_state() {
    let pool = Arc::new(RngPool::with_seed(4, 2025));
    let mut handles = Vec::new();

    for _ in 0..8 {
        let pool = Arc::clone(&pool);
        handles.push(thread::spawn(move || {
            let mut sums = Vec::new();
            for _ in 0..50 {
                let mut borrowed = pool.acquire();
                let rng = borrowed.rng();
                let sum: f64 = (0..100).map(|_| rng.next_uniform()).sum();
                sums.push(sum);
            }
            sums
        }));
    }

    for handle in handles {
        let sums = handle.join().expect("worker finished");
        for sum in sums {
            // 100 uniforms: mean 50, wildly loose band just proves the
            // stream was healthy
            assert!(sum > 20.0 && sum < 80.0, "suspicious stream sum {}", sum);
        }
    }
}

#[test]
fn deterministic_seed_gives_deterministic_streams() {
    let draws = |seed: u64| -> Vec<u64> {
        let pool = RngPool::with_seed(2, seed);
        let mut borrowed = pool.acquire();
        let rng = borrowed.rng();
        (0..32).map(|_| rng.next_u64()).collect()
    };
    assert_eq!(draws(7), draws(7));
    assert_ne!(draws(7), draws(8));
}

#[test]
fn rapid_acquire_release_cycles_are_stable() {
    let pool = RngPool::with_seed(1, 3);
    for _ in 0..10_000 {
        let mut borrowed = pool.acquire();
        borrowed.rng().next_u64();
    }
}
