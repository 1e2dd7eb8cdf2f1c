use flood_pipe::{generate, Limits};
use rand::thread_rng;
use std::hint::black_box;
use std::time::{Duration, Instant};

fn gen_boards(size: usize, wall_percent: u8, overflow: bool, num_iters: u128) {
    println!(
        "generating boards of size {}x{} with up to {}% walls{}...",
        size,
        size,
        wall_percent,
        if overflow { " (overflow)" } else { "" }
    );
    let mut rng = thread_rng();
    let limits = Limits::default();
    let mut total_time = 0;
    let mut failures = 0;
    for _ in 0..num_iters {
        let start = Instant::now();
        let board = black_box(generate(size, size, overflow, wall_percent, &limits, &mut rng));
        total_time += start.elapsed().as_nanos();
        if let Err(e) = board {
            println!("{e}");
            failures += 1;
        }
    }
    println!(
        "average of {:?}/iter, {} failed",
        Duration::from_nanos((total_time / num_iters).try_into().unwrap_or(u64::MAX)),
        failures
    );
}

fn main() {
    gen_boards(10, 20, false, 200);
    gen_boards(20, 20, true, 100);
    gen_boards(30, 50, false, 20);
}
