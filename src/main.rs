//! Tile Duel - Main Binary
//!
//! Seeded self-play, replay verification and loopback network matches

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tileduel::{
    core::{PlayerId, TemplateId},
    game::{
        checksum::short, play_out, replay_actions, Match, MatchConfig, MatchResult, MatchSnapshot, MatchState,
        PlayerController, RandomController, Replica, VerbosityLevel,
    },
    loader::{starter_catalog, starter_deck_list, validate_deck, CardCatalog, CardDatabase, DeckList, DeckRules},
    net::{play_remote, ClientSession, HostConfig, HostSession, LoopbackHub},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Verbosity level for game output (custom parser supporting both names and numbers)
#[derive(Debug, Clone, Copy)]
struct VerbosityArg(VerbosityLevel);

impl std::str::FromStr for VerbosityArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" | "0" => Ok(VerbosityArg(VerbosityLevel::Silent)),
            "minimal" | "1" => Ok(VerbosityArg(VerbosityLevel::Minimal)),
            "normal" | "2" => Ok(VerbosityArg(VerbosityLevel::Normal)),
            "verbose" | "3" => Ok(VerbosityArg(VerbosityLevel::Verbose)),
            _ => Err(format!(
                "invalid verbosity level '{s}' (expected: silent/0, minimal/1, normal/2, verbose/3)"
            )),
        }
    }
}

impl From<VerbosityArg> for VerbosityLevel {
    fn from(arg: VerbosityArg) -> Self {
        arg.0
    }
}

#[derive(Parser)]
#[command(name = "duel")]
#[command(about = "Tile Duel - deterministic two-player card battle simulator", long_about = None)]
struct Cli {
    /// Diagnostic log filter (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one seeded match between two random controllers
    Simulate {
        #[arg(long, default_value_t = 1)]
        seed: u64,

        /// Verbosity level for game output (0=silent, 1=minimal, 2=normal, 3=verbose)
        #[arg(long, default_value = "normal", short = 'v')]
        verbosity: VerbosityArg,

        /// Card definitions: a JSON file or a directory of JSON files (default: built-in starter set)
        #[arg(long, value_name = "PATH")]
        cards: Option<PathBuf>,

        /// Deck list used by both players (default: built-in starter deck)
        #[arg(long, value_name = "FILE")]
        deck: Option<PathBuf>,

        #[arg(long, default_value_t = 30)]
        max_turns: u32,

        /// Write the final snapshot as JSON
        #[arg(long, value_name = "FILE")]
        snapshot: Option<PathBuf>,
    },

    /// Run a match, rebuild it from its event log and its action list, compare checksums
    VerifyReplay {
        #[arg(long, default_value_t = 1)]
        seed: u64,

        #[arg(long, default_value_t = 30)]
        max_turns: u32,
    },

    /// Run many seeded matches in parallel, each twice, and check they agree
    Batch {
        #[arg(long, default_value_t = 100)]
        games: u64,

        #[arg(long, default_value_t = 0)]
        start_seed: u64,

        #[arg(long, default_value_t = 30)]
        max_turns: u32,
    },

    /// Play a match through an in-process host and two clients
    Loopback {
        #[arg(long, default_value_t = 1)]
        seed: u64,

        #[arg(long, default_value_t = 30)]
        max_turns: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match cli.command {
        Commands::Simulate {
            seed,
            verbosity,
            cards,
            deck,
            max_turns,
            snapshot,
        } => run_simulate(seed, verbosity.into(), cards, deck, max_turns, snapshot),
        Commands::VerifyReplay { seed, max_turns } => run_verify_replay(seed, max_turns),
        Commands::Batch {
            games,
            start_seed,
            max_turns,
        } => run_batch(games, start_seed, max_turns),
        Commands::Loopback { seed, max_turns } => run_loopback(seed, max_turns).await,
    }
}

fn load_catalog(path: Option<&Path>) -> anyhow::Result<Arc<dyn CardCatalog>> {
    let Some(path) = path else {
        return Ok(Arc::new(starter_catalog()));
    };
    let db = if path.is_dir() {
        CardDatabase::load_from_dir(path).with_context(|| format!("loading cards from {}", path.display()))?
    } else {
        let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        CardDatabase::from_json_str(&json).with_context(|| format!("parsing {}", path.display()))?
    };
    println!("Loaded {} card definitions", db.len());
    Ok(Arc::new(db))
}

fn load_deck(path: Option<&Path>) -> anyhow::Result<DeckList> {
    let Some(path) = path else {
        return Ok(starter_deck_list());
    };
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "deck".to_string());
    Ok(DeckList::parse(&name, &content)?)
}

fn controllers(seed: u64) -> [Box<dyn PlayerController>; 2] {
    [
        Box::new(RandomController::with_seed(PlayerId::FIRST, seed.wrapping_mul(2))),
        Box::new(RandomController::with_seed(PlayerId::SECOND, seed.wrapping_mul(2).wrapping_add(1))),
    ]
}

fn first_player(seed: u64) -> PlayerId {
    PlayerId::new((seed % 2) as u8)
}

/// Start a seeded self-play match and drive it to the end
fn self_play(
    catalog: Arc<dyn CardCatalog>,
    decks: [Vec<TemplateId>; 2],
    seed: u64,
    verbosity: VerbosityLevel,
    max_turns: u32,
) -> anyhow::Result<(Match, MatchResult)> {
    let mut game = Match::new(MatchConfig::default(), catalog, decks, seed, first_player(seed));
    game.logger_mut().set_verbosity(verbosity);
    game.start()?;
    let result = play_out(&mut game, &mut controllers(seed), max_turns)?;
    Ok((game, result))
}

fn describe_result(result: &MatchResult) -> String {
    match (result.winner, result.reason) {
        (Some(winner), Some(reason)) => format!("{winner} wins ({reason:?}) on turn {}", result.turns),
        (None, Some(reason)) => format!("draw ({reason:?}) on turn {}", result.turns),
        _ => format!("unfinished after turn {}", result.turns),
    }
}

fn run_simulate(
    seed: u64,
    verbosity: VerbosityLevel,
    cards: Option<PathBuf>,
    deck: Option<PathBuf>,
    max_turns: u32,
    snapshot: Option<PathBuf>,
) -> anyhow::Result<()> {
    let catalog = load_catalog(cards.as_deref())?;
    let deck = load_deck(deck.as_deref())?;
    let cards = validate_deck(&deck, catalog.as_ref(), &DeckRules::default())
        .with_context(|| format!("deck '{}' is not legal", deck.name))?;

    let start = Instant::now();
    let (game, result) = self_play(catalog, [cards.clone(), cards], seed, verbosity, max_turns)?;
    let elapsed = start.elapsed();

    let state = game.state();
    println!("=== Match Over (seed {seed}) ===");
    println!("Result: {}", describe_result(&result));
    println!(
        "Leaders: P1 {} / P2 {}",
        state.players[0].health, state.players[1].health
    );
    println!(
        "Actions: {}  Events: {}  Time: {:.2?}",
        result.actions.len(),
        game.log().len(),
        elapsed
    );
    println!("Checksum: {}", game.checksum()?);

    if let Some(path) = snapshot {
        game.snapshot()?
            .save_to_file(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Snapshot written to {}", path.display());
    }
    Ok(())
}

fn run_verify_replay(seed: u64, max_turns: u32) -> anyhow::Result<()> {
    let catalog: Arc<dyn CardCatalog> = Arc::new(starter_catalog());
    let deck = validate_deck(&starter_deck_list(), catalog.as_ref(), &DeckRules::default())?;
    let decks = [deck.clone(), deck];

    let (game, result) = self_play(catalog.clone(), decks.clone(), seed, VerbosityLevel::Silent, max_turns)?;
    let host = game.checksum()?;

    let mut replica = Replica::new(MatchState::new(
        MatchConfig::default(),
        seed,
        first_player(seed),
        decks.clone(),
    ));
    let applied = replica.apply_records(game.log().records())?;
    let from_log = replica.checksum()?;

    let rebuilt = replay_actions(
        MatchConfig::default(),
        catalog,
        decks,
        seed,
        first_player(seed),
        &result.actions,
    )?;
    let from_actions = rebuilt.checksum()?;

    println!("Match: {}", describe_result(&result));
    println!("Host checksum:         {}", short(&host));
    println!("Event replay ({applied:>5}):  {}", short(&from_log));
    println!("Action replay ({:>4}):  {}", result.actions.len(), short(&from_actions));
    if host != from_log || host != from_actions {
        bail!("replay diverged from the original match");
    }
    println!("✓ Replays match");
    Ok(())
}

fn run_batch(games: u64, start_seed: u64, max_turns: u32) -> anyhow::Result<()> {
    let catalog: Arc<dyn CardCatalog> = Arc::new(starter_catalog());
    let deck = validate_deck(&starter_deck_list(), catalog.as_ref(), &DeckRules::default())?;
    let start = Instant::now();

    let outcomes: Vec<(u64, MatchResult, bool)> = (start_seed..start_seed + games)
        .into_par_iter()
        .map(|seed| -> anyhow::Result<(u64, MatchResult, bool)> {
            let decks = [deck.clone(), deck.clone()];
            let (a, result_a) = self_play(catalog.clone(), decks.clone(), seed, VerbosityLevel::Silent, max_turns)?;
            let (b, result_b) = self_play(catalog.clone(), decks, seed, VerbosityLevel::Silent, max_turns)?;
            let agrees = result_a == result_b && a.checksum()? == b.checksum()?;
            Ok((seed, result_a, agrees))
        })
        .collect::<anyhow::Result<_>>()?;

    let mut wins = [0u64; 2];
    let mut draws = 0u64;
    let mut turns = 0u64;
    for (_, result, _) in &outcomes {
        match result.winner {
            Some(winner) => wins[winner.index()] += 1,
            None => draws += 1,
        }
        turns += u64::from(result.turns);
    }
    let diverged: Vec<u64> = outcomes
        .iter()
        .filter(|(_, _, agrees)| !agrees)
        .map(|(seed, _, _)| *seed)
        .collect();

    println!("=== Batch: {games} games in {:.2?} ===", start.elapsed());
    println!("P1 wins: {}  P2 wins: {}  Draws: {draws}", wins[0], wins[1]);
    if games > 0 {
        println!("Average turns: {:.1}", turns as f64 / games as f64);
    }
    if !diverged.is_empty() {
        bail!("non-deterministic seeds: {diverged:?}");
    }
    println!("✓ All {games} seeds deterministic");
    Ok(())
}

async fn run_loopback(seed: u64, max_turns: u32) -> anyhow::Result<()> {
    let catalog: Arc<dyn CardCatalog> = Arc::new(starter_catalog());
    let hub = LoopbackHub::new();
    let (host_net, host_queue) = hub.host()?;
    let config = HostConfig {
        seed,
        first_player: first_player(seed),
        ..HostConfig::default()
    };
    let host = HostSession::new(host_net, config, catalog.clone());
    let server = tokio::spawn(host.serve(host_queue, Duration::from_millis(250)));

    let deck = starter_deck_list();
    let (_, net_a, queue_a) = hub.connect()?;
    let (_, net_b, queue_b) = hub.connect()?;
    // seats are granted in connection order
    let mut first = RandomController::with_seed(PlayerId::FIRST, seed.wrapping_mul(2));
    let mut second = RandomController::with_seed(PlayerId::SECOND, seed.wrapping_mul(2).wrapping_add(1));
    let (a, b) = tokio::join!(
        play_remote(ClientSession::new(net_a), queue_a, &mut first, catalog.as_ref(), &deck, max_turns),
        play_remote(ClientSession::new(net_b), queue_b, &mut second, catalog.as_ref(), &deck, max_turns),
    );
    let (a, b) = (a?, b?);

    let final_snapshot: MatchSnapshot = server
        .await
        .context("host task panicked")??
        .context("host finished without a match")?;

    println!("=== Loopback match (seed {seed}) ===");
    if let Some(outcome) = final_snapshot.state.outcome {
        match outcome.winner {
            Some(winner) => println!("Result: {winner} wins ({:?})", outcome.reason),
            None => println!("Result: draw ({:?})", outcome.reason),
        }
    }
    println!("Host:     {}", short(&final_snapshot.checksum));
    let mut agree = true;
    for (label, client) in [("Client 1", &a), ("Client 2", &b)] {
        let checksum = client
            .replica()
            .map(|r| r.checksum())
            .transpose()?
            .unwrap_or_default();
        println!(
            "{label}: {}  (resyncs: {})",
            short(&checksum),
            client.desync_count()
        );
        agree &= checksum == final_snapshot.checksum;
    }
    if !agree {
        bail!("client replicas disagree with the host");
    }
    println!("✓ All peers agree");
    Ok(())
}
