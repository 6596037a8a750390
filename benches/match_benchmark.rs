//! Performance benchmarks for the match engine
//!
//! Three measurements, all RandomController vs RandomController on the
//! built-in starter deck:
//!
//! 1. **Fresh** - build, start and play a new match each iteration
//! 2. **Snapshot** - resume each iteration from a snapshot taken after the mulligan
//! 3. **Replay** - rebuild a finished match by applying its event log to a replica

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tileduel::{
    core::PlayerId,
    game::{
        play_out, Match, MatchConfig, MatchSnapshot, MatchState, PlayerAction, PlayerController,
        RandomController, Replica, VerbosityLevel,
    },
    loader::{starter_catalog, starter_deck, CardCatalog},
    Result,
};

const MAX_TURNS: u32 = 30;

fn controllers(seed: u64) -> [Box<dyn PlayerController>; 2] {
    [
        Box::new(RandomController::with_seed(PlayerId::FIRST, seed)),
        Box::new(RandomController::with_seed(PlayerId::SECOND, seed + 1)),
    ]
}

fn new_match(catalog: &Arc<dyn CardCatalog>, seed: u64) -> Match {
    let mut game = Match::new(
        MatchConfig::default(),
        catalog.clone(),
        [starter_deck(), starter_deck()],
        seed,
        PlayerId::FIRST,
    );
    game.logger_mut().set_verbosity(VerbosityLevel::Silent);
    game
}

fn run_fresh(catalog: &Arc<dyn CardCatalog>, seed: u64) -> Result<Match> {
    let mut game = new_match(catalog, seed);
    game.start()?;
    play_out(&mut game, &mut controllers(seed), MAX_TURNS)?;
    Ok(game)
}

/// Snapshot taken once both players have kept their hands
fn post_mulligan_snapshot(catalog: &Arc<dyn CardCatalog>, seed: u64) -> Result<MatchSnapshot> {
    let mut game = new_match(catalog, seed);
    game.start()?;
    for player in PlayerId::both() {
        game.submit(player, &PlayerAction::Mulligan { replace: Vec::new() })?;
    }
    game.snapshot()
}

fn bench_match_fresh(c: &mut Criterion) {
    let catalog: Arc<dyn CardCatalog> = Arc::new(starter_catalog());
    let mut group = c.benchmark_group("match_execution");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));

    let seed = 42u64;
    {
        println!("\nWarmup match (seed {}):", seed);
        let start = Instant::now();
        if let Ok(game) = run_fresh(&catalog, seed) {
            let duration = start.elapsed();
            let events = game.log().len();
            println!("  Turns: {}", game.state().turn);
            println!("  Events: {}", events);
            println!("  Duration: {:?}", duration);
            println!("  Events/sec: {:.2}", events as f64 / duration.as_secs_f64());
        }

        group.bench_with_input(BenchmarkId::new("fresh", seed), &seed, |b, &seed| {
            b.iter(|| run_fresh(&catalog, black_box(seed)).expect("match should complete"));
        });
    }

    group.finish();
}

fn bench_match_snapshot(c: &mut Criterion) {
    let catalog: Arc<dyn CardCatalog> = Arc::new(starter_catalog());
    let mut group = c.benchmark_group("match_execution");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));

    let seed = 42u64;
    let snapshot = post_mulligan_snapshot(&catalog, seed).expect("snapshot should be taken");

    group.bench_function(BenchmarkId::new("snapshot", seed), |b| {
        b.iter(|| {
            let mut game = Match::from_snapshot(&snapshot, catalog.clone()).expect("snapshot should verify");
            game.logger_mut().set_verbosity(VerbosityLevel::Silent);
            play_out(&mut game, &mut controllers(seed), MAX_TURNS).expect("match should complete")
        });
    });

    group.finish();
}

fn bench_event_replay(c: &mut Criterion) {
    let catalog: Arc<dyn CardCatalog> = Arc::new(starter_catalog());
    let mut group = c.benchmark_group("replication");

    let seed = 42u64;
    let game = run_fresh(&catalog, seed).expect("match should complete");
    let initial = MatchState::new(
        MatchConfig::default(),
        seed,
        PlayerId::FIRST,
        [starter_deck(), starter_deck()],
    );

    group.bench_function(BenchmarkId::new("replay_log", game.log().len()), |b| {
        b.iter(|| {
            let mut replica = Replica::new(initial.clone());
            replica
                .apply_records(black_box(game.log().records()))
                .expect("log should replay");
            replica
        });
    });

    group.bench_function("checksum", |b| {
        b.iter(|| game.checksum().expect("state should serialize"));
    });

    group.finish();
}

criterion_group!(benches, bench_match_fresh, bench_match_snapshot, bench_event_replay);
criterion_main!(benches);
