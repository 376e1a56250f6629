use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arena::betting::{BetRequest, BetStatus, Stake};
use arena::clock::{Clock, ManualClock};
use arena::history::InMemoryHistory;
use arena::ledger::{InMemoryLedger, Ledger, Purse};
use arena::room::Room;
use arena::{Address, Arena, ArenaConfig, ArenaError, RoomId};
use clap::Parser;
use duel_engine::cards::{catalog_card, CATALOG};
use duel_engine::types::{ActionKind, Card, Phase, Side, DECK_SIZE};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Upper bound on intents per match; a healthy match needs far fewer.
const MAX_STEPS: usize = 500;
const SPECTATOR_FUNDS: u64 = 1_000;

#[derive(Parser, Debug)]
#[command(name = "arena-sim")]
#[command(about = "Play bot matches through the arena and report the results")]
struct Cli {
    #[arg(short, long)]
    #[arg(help = "JSON arena config; missing fields fall back to defaults")]
    config: Option<PathBuf>,

    #[arg(short, long, default_value_t = 5)]
    matches: u32,

    #[arg(short, long, default_value_t = 2)]
    #[arg(help = "Betting spectators per match")]
    spectators: u32,

    #[arg(long, default_value_t = 100)]
    ante: u64,

    #[arg(long)]
    #[arg(help = "RNG seed for reproducible runs")]
    seed: Option<u64>,

    #[arg(long, default_value_t = 0.1)]
    #[arg(help = "Chance a player sits out a phase and lets the deadline expire")]
    idle_rate: f64,

    #[arg(long, value_delimiter = ',', default_value = "pass,boost,shield,double")]
    #[arg(help = "Modifiers the bots may buy; pass is always available")]
    actions: Vec<ActionKind>,

    #[arg(long)]
    #[arg(help = "Print match records as JSON lines")]
    json: bool,
}

struct Sim {
    arena: Arena,
    ledger: Arc<InMemoryLedger>,
    clock: ManualClock,
    rng: StdRng,
    ante: u64,
    spectators: u32,
    idle_rate: f64,
    actions: Vec<ActionKind>,
}

impl Sim {
    fn random_deck(&mut self) -> Vec<Card> {
        let mut ids: Vec<u64> = CATALOG.iter().map(|t| t.token_id).collect();
        ids.shuffle(&mut self.rng);
        ids.truncate(DECK_SIZE);
        ids.into_iter().filter_map(catalog_card).collect()
    }

    fn idle(&mut self) -> bool {
        self.rng.random_bool(self.idle_rate)
    }

    /// Let a little time pass between intents.
    fn think(&mut self) -> u64 {
        let pause = self.rng.random_range(200..3_000);
        self.clock.advance(pause)
    }

    fn play_match(&mut self, n: u32) -> Result<RoomId> {
        let room_id = RoomId::new(format!("match-{n}"));
        let host = Address::new(format!("host-{n}"));
        let guest = Address::new(format!("guest-{n}"));
        self.ledger.mint(&host, self.ante);
        self.ledger.mint(&guest, self.ante);

        let now = self.clock.now_ms();
        self.arena
            .create_room(room_id.clone(), host.clone(), self.ante, "gold", now)?;
        let now = self.think();
        self.arena.join_room(&room_id, &guest, now)?;

        let fans: Vec<Address> = (0..self.spectators)
            .map(|i| Address::new(format!("fan-{n}-{i}")))
            .collect();
        for fan in &fans {
            self.ledger.mint(fan, SPECTATOR_FUNDS);
            self.arena.deposit_credits(fan, SPECTATOR_FUNDS)?;
            self.arena
                .spectate(&room_id, fan, fan.as_str(), self.clock.now_ms())?;
        }

        for player in [&host, &guest] {
            let deck = self.random_deck();
            let now = self.think();
            self.arena.commit_deck(&room_id, player, deck, now)?;
        }

        for _ in 0..MAX_STEPS {
            let Ok(room) = self.arena.snapshot(&room_id) else {
                return Ok(room_id);
            };
            match room.game.phase {
                Phase::CardSelection => {
                    self.place_bets(&room, &fans)?;
                    self.select_cards(&room)?;
                }
                Phase::Reveal => self.buy_actions(&room)?,
                Phase::GameOver => {
                    self.arena.finalize(&room_id, self.clock.now_ms())?;
                }
                phase => bail!("room {room_id} stuck in {phase}"),
            }
            self.expire_if_stalled(&room_id, room.version)?;
        }
        bail!("room {room_id} did not finish within {MAX_STEPS} steps")
    }

    fn place_bets(&mut self, room: &Room, fans: &[Address]) -> Result<()> {
        for fan in fans {
            let already_bet = self.arena.bet(&room.id, room.game.round, fan).is_some();
            if already_bet || self.rng.random_bool(0.5) {
                continue;
            }
            let side = if self.rng.random_bool(0.5) {
                Side::Host
            } else {
                Side::Guest
            };
            let Some(target) = room.player(side).cloned() else {
                continue;
            };
            let request = BetRequest {
                room_id: room.id.clone(),
                round: room.game.round,
                bettor: fan.clone(),
                target,
                stake: Stake::Default,
            };
            let now = self.think();
            match self.arena.place_bet(request, now) {
                Ok(_) => {}
                // Broke fans and races with the deadline just skip the round.
                Err(
                    err @ (ArenaError::InvalidAmount
                    | ArenaError::InsufficientCredits { .. }
                    | ArenaError::InvalidPhase { .. }
                    | ArenaError::StaleWrite { .. }),
                ) => debug!(bettor = %fan, %err, "bet skipped"),
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn select_cards(&mut self, room: &Room) -> Result<()> {
        for side in Side::BOTH {
            let seat = room.game.seat(side);
            if seat.selected.is_some() || seat.hand().is_empty() || self.idle() {
                continue;
            }
            let Some(actor) = room.player(side) else {
                continue;
            };
            let pick = seat.hand()[self.rng.random_range(0..seat.hand().len())].token_id;
            let now = self.think();
            skip_if_moved_on(self.arena.select_card(&room.id, actor, pick, now))?;
        }
        Ok(())
    }

    fn buy_actions(&mut self, room: &Room) -> Result<()> {
        let costs = self.arena.config().action_costs;
        for side in Side::BOTH {
            let seat = room.game.seat(side);
            if seat.action.is_some() || self.idle() {
                continue;
            }
            let Some(actor) = room.player(side) else {
                continue;
            };
            let mut affordable: Vec<ActionKind> = self
                .actions
                .iter()
                .copied()
                .filter(|kind| costs.cost(*kind) <= seat.boost_balance)
                .collect();
            if affordable.is_empty() {
                affordable.push(ActionKind::Pass);
            }
            let kind = affordable[self.rng.random_range(0..affordable.len())];
            let now = self.think();
            let outcome = skip_if_moved_on(self.arena.buy_action(&room.id, actor, kind, now))?;
            if let Some(resolved) = outcome.and_then(|o| o.resolved) {
                let round = resolved.into_inner();
                info!(
                    room_id = %room.id,
                    round = round.record.round,
                    winner = %round.record.winner,
                    bets_won = round.settlement.won,
                    bets_lost = round.settlement.lost,
                    "round played"
                );
            }
        }
        Ok(())
    }

    /// If no bot moved the room this step, jump to its deadline and let
    /// the timeout path act for the idle players.
    fn expire_if_stalled(&mut self, room_id: &RoomId, seen_version: u64) -> Result<()> {
        let room = match self.arena.snapshot(room_id) {
            Ok(room) => room,
            Err(ArenaError::RoomNotFound(_)) => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        if room.version != seen_version {
            return Ok(());
        }
        if let Some(deadline) = room.game.deadline_ms {
            self.clock.set(deadline.max(self.clock.now_ms()));
            let forced = self.arena.tick(room_id, self.clock.now_ms())?;
            debug!(%room_id, ?forced, "deadline expired");
        }
        Ok(())
    }
}

/// A deadline can fire between the snapshot a bot acted on and its intent.
/// The room has then already moved on without it, which is not a failure.
fn skip_if_moved_on<T>(result: Result<T, ArenaError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(
            err @ (ArenaError::InvalidPhase { .. }
            | ArenaError::InvalidStatus { .. }
            | ArenaError::RoomNotFound(_)),
        ) => {
            debug!(%err, "intent overtaken by the room");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if !(0.0..=1.0).contains(&cli.idle_rate) {
        bail!("--idle-rate must be within [0, 1], got {}", cli.idle_rate);
    }

    let mut config = match &cli.config {
        Some(path) => ArenaConfig::from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ArenaConfig::default(),
    };
    let seed = cli.seed.or(config.rng_seed).unwrap_or_else(rand::random);
    config.rng_seed = Some(seed);
    info!(seed, matches = cli.matches, spectators = cli.spectators, "starting simulation");

    let ledger = Arc::new(InMemoryLedger::new());
    let history = Arc::new(InMemoryHistory::new());
    let arena = Arena::new(config, ledger.clone(), history.clone())?;
    let mut sim = Sim {
        arena,
        ledger,
        clock: ManualClock::new(1_700_000_000_000),
        rng: StdRng::seed_from_u64(seed),
        ante: cli.ante,
        spectators: cli.spectators,
        idle_rate: cli.idle_rate,
        actions: cli.actions.clone(),
    };

    let mut played = Vec::new();
    for n in 0..cli.matches {
        played.push(sim.play_match(n)?);
    }

    for record in history.records() {
        if cli.json {
            println!("{}", serde_json::to_string(&record)?);
            continue;
        }
        let winner = record
            .winner
            .as_ref()
            .map(|w| w.to_string())
            .unwrap_or_else(|| "draw".to_string());
        println!(
            "{}: {} ({}-{}) in {} rounds, pot {} {}",
            record.room_id,
            winner,
            record.host_score,
            record.guest_score,
            record.rounds.len(),
            record.pot,
            record.currency,
        );
    }

    if !cli.json {
        let bets: Vec<_> = played
            .iter()
            .flat_map(|room_id| sim.arena.bets_for_room(room_id))
            .collect();
        let won = bets.iter().filter(|b| b.status == BetStatus::Won).count();
        let refunded = bets.iter().filter(|b| b.status == BetStatus::Refunded).count();
        let paid: u64 = bets.iter().filter_map(|b| b.payout).sum();
        println!(
            "bets: {} placed, {} won, {} refunded, {} credits paid out",
            bets.len(),
            won,
            refunded,
            paid
        );
        for n in 0..cli.matches {
            for i in 0..cli.spectators {
                let fan = Address::new(format!("fan-{n}-{i}"));
                println!(
                    "{fan}: {} currency after conversion",
                    sim.ledger.balance(&fan, Purse::Currency)
                );
            }
        }
    }
    Ok(())
}
