//! The game aggregate: one state machine fed by commands and tagged ticks.

use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::death::{DeathAnimation, ParticleSettings};
use crate::engine::{Board, Snake};
use crate::error::MoveError;
use crate::grid::{Cell, Direction};
use crate::input::{Command, DetectionResult, Steering, VisionInbox};
use crate::replay::{GameFrame, ReplayCursor, ReplayLog, ReplaySpeed};
use crate::schedule::{Scheduler, TickKind};
use crate::store::HighScoreStore;

/// Seed used when the config does not provide one.
pub const DEFAULT_SEED: u64 = 0x5EED_5A4E;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GameState {
    Menu,
    Playing,
    Paused,
    DeathAnimation,
    GameOver,
    Replay,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Command(Command),
    Tick(TickKind),
}

/// Where playback stands, for the HUD.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReplayStatus {
    /// 1-based frame number.
    pub position: usize,
    pub len: usize,
    pub speed: ReplaySpeed,
}

pub struct Game<S: HighScoreStore> {
    board: Board,
    particle_settings: ParticleSettings,
    food_reward: u32,
    tick_period: Duration,
    replay_base: Duration,

    state: GameState,
    snake: Snake,
    food: Cell,
    score: u32,
    high_score: u32,
    new_high_score: bool,
    steering: Steering,
    vision: VisionInbox,

    log: ReplayLog,
    cursor: ReplayCursor,
    speed: ReplaySpeed,
    death: Option<DeathAnimation>,

    scheduler: Scheduler,
    session_ms: u64,
    rng: StdRng,
    store: S,
}

impl<S: HighScoreStore> Game<S> {
    pub fn new(config: &GameConfig, store: S) -> Self {
        let board = config.board();
        let high_score = store.load().unwrap_or_else(|e| {
            warn!(error = %e, "could not read high score, starting from 0");
            0
        });
        let speed = ReplaySpeed::default();
        let mut game = Self {
            board,
            particle_settings: config.particles(),
            food_reward: config.food_reward,
            tick_period: config.tick(),
            replay_base: config.replay_base(),
            state: GameState::Menu,
            snake: Snake::new(board.grid.center()),
            food: Cell::new(0, 0),
            score: 0,
            high_score,
            new_high_score: false,
            steering: Steering::new(Direction::Right),
            vision: VisionInbox::default(),
            log: ReplayLog::default(),
            cursor: ReplayCursor::default(),
            speed,
            death: None,
            scheduler: Scheduler::new(config.tick(), config.animation_tick(), speed.period(config.replay_base())),
            session_ms: 0,
            rng: StdRng::seed_from_u64(config.seed.unwrap_or(DEFAULT_SEED)),
            store,
        };
        game.food = game.fresh_food();
        game
    }

    pub fn dispatch(&mut self, event: Event) {
        match event {
            Event::Command(command) => self.apply(command),
            Event::Tick(kind) => self.tick(kind),
        }
    }

    /// Applies a command; commands that do not fit the current state are
    /// dropped.
    pub fn apply(&mut self, command: Command) {
        use GameState::*;
        match (self.state, command) {
            (Menu, Command::Start) => self.start(),
            (Playing, Command::Turn(d)) => self.steering.push(d),
            (Playing, Command::Pause | Command::TogglePause) => self.set_state(Paused),
            (Paused, Command::Resume | Command::TogglePause) => self.set_state(Playing),
            (GameOver, Command::Replay) if !self.log.is_empty() => {
                self.cursor.rewind();
                self.set_state(Replay);
            }
            (Replay, Command::ExitReplay) => self.set_state(GameOver),
            (Replay, Command::StepReplay(delta)) => self.cursor.step(delta, self.log.len()),
            (_, Command::SetReplaySpeed(speed)) => self.set_replay_speed(speed),
            (_, Command::Reset) => self.reset(),
            (state, command) => debug!(?state, ?command, "command ignored"),
        }
    }

    /// Starts a session from a custom opening instead of the default one.
    /// Only valid from the menu, like [`Command::Start`]. An opening with
    /// cells off the board, repeated cells, or no room left for food is
    /// rejected and the game stays in the menu.
    pub fn start_from(&mut self, snake: Snake, heading: Direction, food: Option<Cell>) {
        if self.state != GameState::Menu {
            debug!(state = ?self.state, "start ignored");
            return;
        }
        if !snake.fits(self.board.grid) {
            debug!(snake = ?snake.to_vec(), "opening rejected");
            return;
        }
        self.begin_session(snake, heading);
        if let Some(food) = food.filter(|f| self.board.grid.contains(*f) && !self.snake.contains(*f)) {
            self.food = food;
        }
    }

    /// Lets wall-clock time pass on whichever driver is armed.
    pub fn update(&mut self, dt: Duration) {
        let Some((kind, due)) = self.scheduler.advance(dt) else {
            return;
        };
        for _ in 0..due {
            if self.scheduler.armed() != Some(kind) {
                break;
            }
            self.tick(kind);
        }
    }

    /// Queues a vision result for the next game tick. Results outside of
    /// play are dropped.
    pub fn ingest_detection(&mut self, result: DetectionResult) {
        if self.state != GameState::Playing {
            return;
        }
        self.vision.push(result);
    }

    pub fn set_vision_enabled(&mut self, enabled: bool) {
        info!(enabled, "vision control");
        self.vision.set_enabled(enabled);
    }

    pub fn vision_enabled(&self) -> bool { self.vision.is_enabled() }

    pub fn set_replay_speed(&mut self, speed: ReplaySpeed) {
        self.speed = speed;
        self.scheduler.set_replay_period(speed.period(self.replay_base));
    }

    fn tick(&mut self, kind: TickKind) {
        if TickKind::for_state(self.state) != Some(kind) {
            debug!(?kind, state = ?self.state, "stale tick");
            return;
        }
        match kind {
            TickKind::Game => self.game_tick(),
            TickKind::Animation => self.animation_tick(),
            TickKind::Replay => self.cursor.tick(self.log.len()),
        }
    }

    fn game_tick(&mut self) {
        for command in self.vision.drain() {
            self.apply(command);
            if self.state != GameState::Playing {
                return;
            }
        }

        let direction = self.steering.resolve();
        self.session_ms += self.tick_period.as_millis() as u64;
        match self.board.advance(&self.snake, direction, self.food, &mut self.rng) {
            Ok(step) => {
                if step.ate_food {
                    self.score = self.score.saturating_add(self.food_reward);
                    debug!(score = self.score, len = step.snake.len(), "food eaten");
                }
                self.snake = step.snake;
                self.food = step.food;
                self.log.record(GameFrame {
                    snake: self.snake.to_vec(),
                    food: self.food,
                    score: self.score,
                    direction,
                    timestamp_ms: self.session_ms,
                });
            }
            Err(reason) => self.die(reason),
        }
    }

    fn die(&mut self, reason: MoveError) {
        info!(%reason, score = self.score, frames = self.log.len(), "session over");
        self.log.stop_recording();
        self.death = Some(DeathAnimation::new(self.snake.head(), self.particle_settings, &mut self.rng));
        self.set_state(GameState::DeathAnimation);
    }

    fn animation_tick(&mut self) {
        let finished = self.death.as_mut().is_none_or(|anim| anim.advance());
        if finished {
            self.death = None;
            self.commit_high_score();
            self.set_state(GameState::GameOver);
        }
    }

    fn commit_high_score(&mut self) {
        if self.score <= self.high_score {
            return;
        }
        info!(previous = self.high_score, score = self.score, "new high score");
        self.high_score = self.score;
        self.new_high_score = true;
        if let Err(e) = self.store.save(self.score) {
            warn!(error = %e, "could not persist high score");
        }
    }

    fn start(&mut self) {
        self.begin_session(Snake::new(self.board.grid.center()), Direction::Right);
    }

    fn begin_session(&mut self, snake: Snake, heading: Direction) {
        self.snake = snake;
        self.steering = Steering::new(heading);
        self.score = 0;
        self.new_high_score = false;
        // A new log each session; nothing carries over from the last one.
        self.log = ReplayLog::recording();
        self.cursor.rewind();
        self.death = None;
        self.session_ms = 0;
        self.food = self.fresh_food();
        self.set_state(GameState::Playing);
        info!(head = ?self.snake.head(), food = ?self.food, "session started");
    }

    fn reset(&mut self) {
        self.snake = Snake::new(self.board.grid.center());
        self.steering = Steering::new(Direction::Right);
        self.score = 0;
        self.new_high_score = false;
        self.log = ReplayLog::default();
        self.cursor.rewind();
        self.death = None;
        self.session_ms = 0;
        self.food = self.fresh_food();
        self.set_state(GameState::Menu);
    }

    /// Food for a new opening.
    ///
    /// Openings are either a single cell on a board of at least 2x2 or a
    /// snake [`Snake::fits`] accepted, so a free cell always exists and
    /// `spawn_food` cannot report `BoardFull` here. Food eaten mid-session
    /// goes through [`Board::advance`], which ends the session instead.
    fn fresh_food(&mut self) -> Cell {
        match self.board.spawn_food(&self.snake, &mut self.rng) {
            Ok(food) => food,
            Err(e) => {
                warn!(error = %e, "no room for food");
                self.snake.head()
            }
        }
    }

    fn set_state(&mut self, next: GameState) {
        let previous = self.state;
        self.state = next;
        if previous == GameState::Playing && next != GameState::Playing {
            self.vision.clear();
        }
        self.scheduler.arm(TickKind::for_state(next));
        debug!(from = ?previous, to = ?next, "state change");
    }

    pub fn state(&self) -> GameState { self.state }

    pub fn snake(&self) -> &Snake { &self.snake }

    pub fn food(&self) -> Cell { self.food }

    pub fn direction(&self) -> Direction { self.steering.heading() }

    pub fn score(&self) -> u32 { self.score }

    pub fn high_score(&self) -> u32 { self.high_score }

    /// True once this session's score has been committed as the new best.
    pub fn is_new_high_score(&self) -> bool { self.new_high_score }

    pub fn board(&self) -> &Board { &self.board }

    pub fn death(&self) -> Option<&DeathAnimation> { self.death.as_ref() }

    pub fn log(&self) -> &ReplayLog { &self.log }

    pub fn replay_speed(&self) -> ReplaySpeed { self.speed }

    pub fn scheduler(&self) -> &Scheduler { &self.scheduler }

    /// The frame under the cursor, only while replaying.
    pub fn replay_frame(&self) -> Option<&GameFrame> {
        if self.state != GameState::Replay {
            return None;
        }
        self.cursor.frame(&self.log)
    }

    pub fn replay_status(&self) -> Option<ReplayStatus> {
        if self.state != GameState::Replay {
            return None;
        }
        Some(ReplayStatus { position: self.cursor.index() + 1, len: self.log.len(), speed: self.speed })
    }

    /// Score to show: the replayed frame's while replaying, the live one otherwise.
    pub fn displayed_score(&self) -> u32 {
        self.replay_frame().map_or(self.score, |f| f.score)
    }

    pub fn store(&self) -> &S { &self.store }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use proptest::prelude::*;

    fn game() -> Game<MemoryStore> {
        let config = GameConfig { seed: Some(7), ..GameConfig::default() };
        Game::new(&config, MemoryStore::default())
    }

    fn cells(list: &[(i32, i32)]) -> Snake {
        Snake::from_cells(list.iter().map(|&(x, y)| Cell::new(x, y))).unwrap()
    }

    fn run_to_game_over(g: &mut Game<MemoryStore>) {
        while g.state() == GameState::Playing {
            g.dispatch(Event::Tick(TickKind::Game));
        }
        while g.state() == GameState::DeathAnimation {
            g.dispatch(Event::Tick(TickKind::Animation));
        }
    }

    #[test]
    fn starts_in_the_menu_with_nothing_armed() {
        let g = game();
        assert_eq!(g.state(), GameState::Menu);
        assert_eq!(g.scheduler().armed(), None);
        assert!(!g.snake().contains(g.food()));
    }

    #[test]
    fn start_arms_the_game_tick() {
        let mut g = game();
        g.apply(Command::Start);
        assert_eq!(g.state(), GameState::Playing);
        assert_eq!(g.snake().to_vec(), vec![Cell::new(10, 10)]);
        assert_eq!(g.direction(), Direction::Right);
        assert!(g.log().is_recording());
        assert_eq!(g.scheduler().armed(), Some(TickKind::Game));
    }

    #[test]
    fn pause_and_resume() {
        let mut g = game();
        g.apply(Command::Start);
        g.apply(Command::Pause);
        assert_eq!(g.state(), GameState::Paused);
        assert_eq!(g.scheduler().armed(), None);
        let before = g.snake().clone();
        g.dispatch(Event::Tick(TickKind::Game));
        assert_eq!(g.snake(), &before);
        g.apply(Command::TogglePause);
        assert_eq!(g.state(), GameState::Playing);
    }

    #[test]
    fn inapplicable_commands_are_no_ops() {
        let mut g = game();
        g.apply(Command::Pause);
        g.apply(Command::Replay);
        g.apply(Command::ExitReplay);
        g.apply(Command::StepReplay(3));
        assert_eq!(g.state(), GameState::Menu);
        g.apply(Command::Start);
        g.apply(Command::Start);
        g.apply(Command::Resume);
        assert_eq!(g.state(), GameState::Playing);
    }

    #[test]
    fn each_move_is_recorded() {
        let mut g = game();
        g.start_from(cells(&[(5, 5)]), Direction::Right, Some(Cell::new(0, 0)));
        for _ in 0..3 {
            g.dispatch(Event::Tick(TickKind::Game));
        }
        let frames = g.log().frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].snake, vec![Cell::new(8, 5)]);
        assert_eq!(frames[2].timestamp_ms, 450);
        assert_eq!(frames[0].direction, Direction::Right);
    }

    #[test]
    fn collision_freezes_the_log_and_starts_the_animation() {
        let mut g = game();
        g.start_from(cells(&[(18, 5)]), Direction::Right, Some(Cell::new(0, 0)));
        g.dispatch(Event::Tick(TickKind::Game));
        g.dispatch(Event::Tick(TickKind::Game));
        assert_eq!(g.state(), GameState::DeathAnimation);
        assert!(!g.log().is_recording());
        assert_eq!(g.log().len(), 1);
        let anim = g.death().unwrap();
        assert_eq!(anim.impact, Cell::new(19, 5));
        assert_eq!(g.scheduler().armed(), Some(TickKind::Animation));
        // A game tick that arrives late does nothing.
        g.dispatch(Event::Tick(TickKind::Game));
        assert_eq!(g.death().unwrap().frame, 0);
    }

    #[test]
    fn game_over_commits_a_better_score_once() {
        let mut g = game();
        g.start_from(cells(&[(5, 5)]), Direction::Right, Some(Cell::new(6, 5)));
        run_to_game_over(&mut g);
        assert_eq!(g.state(), GameState::GameOver);
        assert_eq!(g.score(), g.high_score());
        assert!(g.score() >= 10);
        assert!(g.is_new_high_score());
        assert_eq!(g.store().writes(), 1);
        assert!(g.death().is_none());
    }

    #[test]
    fn lower_score_leaves_the_high_score_alone() {
        let config = GameConfig { seed: Some(7), ..GameConfig::default() };
        let mut g = Game::new(&config, MemoryStore::with_best(500));
        g.apply(Command::Start);
        run_to_game_over(&mut g);
        assert_eq!(g.high_score(), 500);
        assert!(!g.is_new_high_score());
        assert_eq!(g.store().writes(), 0);
    }

    #[test]
    fn replay_needs_frames() {
        let mut g = game();
        // Dies on the very first tick, so nothing was recorded.
        g.start_from(cells(&[(0, 5)]), Direction::Left, None);
        run_to_game_over(&mut g);
        assert!(g.log().is_empty());
        g.apply(Command::Replay);
        assert_eq!(g.state(), GameState::GameOver);
    }

    #[test]
    fn replay_navigation_and_exit() {
        let mut g = game();
        g.start_from(cells(&[(15, 5)]), Direction::Right, Some(Cell::new(0, 0)));
        run_to_game_over(&mut g);
        assert_eq!(g.log().len(), 4);

        g.apply(Command::Replay);
        assert_eq!(g.state(), GameState::Replay);
        assert_eq!(g.replay_status().unwrap().position, 1);
        g.apply(Command::StepReplay(10));
        assert_eq!(g.replay_frame().unwrap().snake, vec![Cell::new(19, 5)]);
        g.apply(Command::StepReplay(-10));
        assert_eq!(g.replay_status().unwrap().position, 1);
        g.dispatch(Event::Tick(TickKind::Replay));
        assert_eq!(g.replay_status().unwrap().position, 2);

        g.apply(Command::ExitReplay);
        assert_eq!(g.state(), GameState::GameOver);
        assert!(g.replay_frame().is_none());
    }

    #[test]
    fn reset_clears_the_session() {
        let mut g = game();
        g.start_from(cells(&[(5, 5)]), Direction::Right, Some(Cell::new(6, 5)));
        g.dispatch(Event::Tick(TickKind::Game));
        assert_eq!(g.score(), 10);
        g.apply(Command::Reset);
        assert_eq!(g.state(), GameState::Menu);
        assert_eq!(g.score(), 0);
        assert!(g.log().is_empty());
        assert_eq!(g.snake().len(), 1);
        assert_eq!(g.scheduler().armed(), None);
    }

    #[test]
    fn new_session_discards_the_old_log() {
        let mut g = game();
        g.start_from(cells(&[(15, 5)]), Direction::Right, Some(Cell::new(0, 0)));
        run_to_game_over(&mut g);
        assert!(!g.log().is_empty());
        g.apply(Command::Reset);
        g.apply(Command::Start);
        assert!(g.log().is_empty());
        assert!(g.log().is_recording());
    }

    #[test]
    fn vision_results_steer_pause_and_reset() {
        let mut g = game();
        g.start_from(cells(&[(5, 5)]), Direction::Right, Some(Cell::new(0, 0)));
        g.ingest_detection(DetectionResult { direction: Some("DOWN".into()), ..Default::default() });
        g.dispatch(Event::Tick(TickKind::Game));
        assert_eq!(g.snake().head(), Cell::new(5, 6));

        g.ingest_detection(DetectionResult { blink: true, ..Default::default() });
        g.dispatch(Event::Tick(TickKind::Game));
        assert_eq!(g.state(), GameState::Paused);
        assert_eq!(g.snake().head(), Cell::new(5, 6));

        // Ignored outside of play.
        g.ingest_detection(DetectionResult { gesture: Some("RESET".into()), ..Default::default() });
        g.apply(Command::Resume);
        g.dispatch(Event::Tick(TickKind::Game));
        assert_eq!(g.state(), GameState::Playing);

        g.ingest_detection(DetectionResult { gesture: Some("RESET".into()), timestamp: 2.0, ..Default::default() });
        g.dispatch(Event::Tick(TickKind::Game));
        assert_eq!(g.state(), GameState::Menu);
    }

    #[test]
    fn disabled_vision_is_ignored() {
        let mut g = game();
        g.set_vision_enabled(false);
        g.start_from(cells(&[(5, 5)]), Direction::Right, Some(Cell::new(0, 0)));
        g.ingest_detection(DetectionResult { blink: true, ..Default::default() });
        g.dispatch(Event::Tick(TickKind::Game));
        assert_eq!(g.state(), GameState::Playing);
    }

    #[test]
    fn invalid_openings_stay_in_the_menu() {
        let mut g = game();
        g.start_from(cells(&[(50, 50), (50, 50)]), Direction::Right, None);
        assert_eq!(g.state(), GameState::Menu);
        g.start_from(cells(&[(5, 5), (5, 5)]), Direction::Right, None);
        assert_eq!(g.state(), GameState::Menu);
        g.start_from(cells(&[(0, 0), (-1, 0)]), Direction::Right, None);
        assert_eq!(g.state(), GameState::Menu);
        assert_eq!(g.snake().to_vec(), vec![Cell::new(10, 10)]);
        assert_eq!(g.scheduler().armed(), None);
    }

    #[test]
    fn opening_that_fills_the_board_is_rejected() {
        let config = GameConfig { grid_width: 2, grid_height: 2, seed: Some(7), ..GameConfig::default() };
        let mut g = Game::new(&config, MemoryStore::default());
        g.start_from(cells(&[(0, 0), (1, 0), (1, 1), (0, 1)]), Direction::Up, None);
        assert_eq!(g.state(), GameState::Menu);
        g.start_from(cells(&[(0, 0), (1, 0), (1, 1)]), Direction::Up, None);
        assert_eq!(g.state(), GameState::Playing);
        assert_eq!(g.food(), Cell::new(0, 1));
    }

    #[test]
    fn huge_rewards_saturate() {
        let config = GameConfig {
            grid_width: 2,
            grid_height: 2,
            food_reward: u32::MAX,
            seed: Some(7),
            ..GameConfig::default()
        };
        let mut g = Game::new(&config, MemoryStore::default());
        g.start_from(cells(&[(0, 0)]), Direction::Right, Some(Cell::new(1, 0)));
        g.dispatch(Event::Tick(TickKind::Game));
        assert_eq!(g.score(), u32::MAX);

        // The second food is at (1,1) or (0,1); both are reached going down
        // then left.
        g.apply(Command::Turn(Direction::Down));
        g.dispatch(Event::Tick(TickKind::Game));
        if g.snake().len() == 2 {
            g.apply(Command::Turn(Direction::Left));
            g.dispatch(Event::Tick(TickKind::Game));
        }
        assert_eq!(g.state(), GameState::Playing);
        assert_eq!(g.snake().len(), 3);
        assert_eq!(g.score(), u32::MAX);
    }

    #[test]
    fn replay_speed_sets_the_replay_period() {
        let mut g = game();
        g.apply(Command::SetReplaySpeed(ReplaySpeed::Double));
        assert_eq!(g.replay_speed(), ReplaySpeed::Double);
        assert_eq!(g.scheduler().ticker(TickKind::Replay).period(), Duration::from_millis(75));
    }

    proptest! {
        #[test]
        fn high_score_never_drops(
            seed in any::<u64>(),
            sessions in proptest::collection::vec((0usize..4, proptest::collection::vec(0usize..4, 0..40)), 1..6),
        ) {
            let config = GameConfig { seed: Some(seed), ..GameConfig::default() };
            let mut g = Game::new(&config, MemoryStore::default());
            let mut best = 0;
            for (heading, turns) in sessions {
                g.apply(Command::Reset);
                g.start_from(Snake::new(Cell::new(10, 10)), Direction::ALL[heading], None);
                for turn in turns {
                    if g.state() != GameState::Playing {
                        break;
                    }
                    g.apply(Command::Turn(Direction::ALL[turn]));
                    g.dispatch(Event::Tick(TickKind::Game));
                }
                run_to_game_over(&mut g);
                prop_assert_eq!(g.state(), GameState::GameOver);
                best = best.max(g.score());
                prop_assert!(g.high_score() >= g.score());
                prop_assert_eq!(g.high_score(), best);
                prop_assert_eq!(g.store().best(), best);
            }
        }
    }
}
