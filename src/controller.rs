//! Game-loop controller: the clock, the book-vs-search decision, and the
//! cooperative search-abort flag. Mirrors the split in `search::search::search`
//! between "the search thread does the work" and "an external clock thread
//! asks it to stop" — here that external thread is this struct's `update`.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::board::{Board, Color};
use crate::book::OpeningBook;
use crate::moves::execute::{generate_legal, make_move_basic, undo_move_basic};
use crate::moves::magic::MagicTables;
use crate::moves::types::{Move, Undo};
use crate::search::search::search_with_tt;
use crate::search::tt::TranspositionTable;

/// Megabyte size of the persistent transposition table each `Controller`
/// keeps for the lifetime of a game.
const TT_SIZE_MB: usize = 512;

/// A fixed 300-move budgeting assumption: each move gets roughly
/// `remaining / 300` of the clock.
const MOVE_BUDGET_DIVISOR: u64 = 300;

/// Small pause before returning a book move, so the UI doesn't flash an
/// instant reply on every book hit.
const BOOK_MOVE_DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameState {
    pub white_won: bool,
    pub black_won: bool,
    pub stalemate: bool,
    pub draw: bool,
}

impl GameState {
    pub fn is_over(&self) -> bool {
        self.white_won || self.black_won || self.stalemate || self.draw
    }
}

/// Drives a single game: owns the clock, the book-following flag, and the
/// board. The search itself runs on a worker thread spawned per move;
/// `update` is the clock-tick side that can request its abort.
pub struct Controller {
    board: Board,
    tables: Arc<MagicTables>,
    history: Vec<Undo>,

    master_book: Option<OpeningBook>,
    lichess_book: Option<OpeningBook>,
    following_book: bool,

    computer_side: Option<Color>,
    time_control_ms: u64,
    remaining_ms: [u64; 2],

    game_state: GameState,

    /// Persists across moves within a game; only `new_game`/`load_fen`
    /// clear it, matching the persistence-with-explicit-reset contract
    /// the search's caching layer is expected to honor.
    tt: Arc<Mutex<TranspositionTable>>,

    pending_search: Option<PendingSearch>,
    pending_book_move: Option<(Move, Duration)>,
}

struct PendingSearch {
    handle: JoinHandle<(i32, Option<Move>)>,
    abort: Arc<AtomicBool>,
    budget: Duration,
    elapsed: Duration,
}

impl Controller {
    pub fn new(tables: Arc<MagicTables>) -> Self {
        Self {
            board: Board::new(),
            tables,
            history: Vec::with_capacity(256),
            master_book: None,
            lichess_book: None,
            following_book: true,
            computer_side: None,
            time_control_ms: 0,
            remaining_ms: [0, 0],
            game_state: GameState::default(),
            tt: Arc::new(Mutex::new(TranspositionTable::new(TT_SIZE_MB))),
            pending_search: None,
            pending_book_move: None,
        }
    }

    pub fn with_books(mut self, master: Option<OpeningBook>, lichess: Option<OpeningBook>) -> Self {
        self.master_book = master;
        self.lichess_book = lichess;
        self
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn game_state(&self) -> GameState {
        self.game_state
    }

    /// Resets to the starting position, clears history and book-following
    /// state, and clamps the clock to the configured time control.
    pub fn new_game(&mut self) {
        self.board = Board::new();
        self.history.clear();
        self.following_book = true;
        self.game_state = GameState::default();
        self.remaining_ms = [self.time_control_ms, self.time_control_ms];
        self.reset_tt();
    }

    /// Loads a FEN position. On a malformed FEN the board is left unchanged
    /// and a structured error is returned.
    pub fn load_fen(&mut self, fen: &str) -> Result<(), String> {
        let candidate = Board::from_str(fen)?;
        self.board = candidate;
        self.history.clear();
        self.following_book = true;
        self.game_state = GameState::default();
        self.reset_tt();
        Ok(())
    }

    /// Explicitly clears the persistent transposition table. Called whenever
    /// the position changes outside the normal make/unmake sequence, since a
    /// stale entry from an unrelated game could otherwise be probed and
    /// returned as if it applied to the new position.
    fn reset_tt(&mut self) {
        self.tt.lock().unwrap().clear();
    }

    /// Applies an externally supplied move (e.g. from the UI). The
    /// controller never mutates the position outside this call and
    /// `process_move`/`undo`.
    pub fn process_move(&mut self, mv: Move) {
        let undo = make_move_basic(&mut self.board, mv);
        self.history.push(undo);
        self.refresh_game_state();
    }

    /// Unmakes the most recent move. No-op on an empty stack.
    pub fn undo(&mut self) {
        if let Some(undo) = self.history.pop() {
            undo_move_basic(&mut self.board, undo);
            self.game_state = GameState::default();
        }
    }

    pub fn set_computer_side(&mut self, white: bool) {
        self.computer_side = Some(if white { Color::White } else { Color::Black });
    }

    pub fn set_time_control(&mut self, ms: u64) {
        self.time_control_ms = ms;
        self.remaining_ms = [ms, ms];
    }

    /// Advances the clock by `elapsed_ms` and, if the current move's search
    /// budget has been exhausted, requests the worker thread to abort.
    /// Called at roughly 60 Hz by the front-end's event loop.
    pub fn update(&mut self, elapsed_ms: u64) {
        let elapsed = Duration::from_millis(elapsed_ms);
        let side = self.board.side_to_move as usize;
        self.remaining_ms[side] = self.remaining_ms[side].saturating_sub(elapsed_ms);

        if self.remaining_ms[side] == 0 {
            match self.board.side_to_move {
                Color::White => self.game_state.black_won = true,
                Color::Black => self.game_state.white_won = true,
            }
            if let Some(pending) = &self.pending_search {
                pending.abort.store(true, Ordering::Relaxed);
            }
            return;
        }

        if let Some(pending) = &mut self.pending_search {
            pending.elapsed += elapsed;
            if pending.elapsed >= pending.budget {
                pending.abort.store(true, Ordering::Relaxed);
            }
        }
    }

    /// Book lookup, honoring the "stop consulting books after the first null"
    /// rule: once either book yields no move, book-following ends for the
    /// rest of the game.
    fn book_move(&mut self) -> Option<Move> {
        if !self.following_book {
            return None;
        }

        let key = self.board.zobrist;

        if let Some(book) = &self.master_book
            && let Some(mv) = book.weighted(key, &self.board)
        {
            return Some(mv);
        }

        if let Some(book) = &self.lichess_book
            && let Some(mv) = book.weighted(key, &self.board)
        {
            return Some(mv);
        }

        self.following_book = false;
        None
    }

    /// Starts deciding the best move for the current position: either a book
    /// move (queued behind a debounce) or a background search thread. Poll
    /// with `poll_best_move` from the same event loop that drives `update`.
    pub fn request_best_move(&mut self) {
        if let Some(mv) = self.book_move() {
            self.pending_book_move = Some((mv, Duration::ZERO));
            return;
        }

        let side = self.board.side_to_move as usize;
        let search_time_ms = self.remaining_ms[side] / MOVE_BUDGET_DIVISOR;
        let budget = Duration::from_millis(search_time_ms.max(1));

        let abort = Arc::new(AtomicBool::new(false));
        let mut board = self.board.clone();
        let tables = Arc::clone(&self.tables);
        let abort_for_thread = Arc::clone(&abort);
        let tt = Arc::clone(&self.tt);

        let handle = thread::spawn(move || {
            let mut tt = tt.lock().unwrap();
            search_with_tt(
                &mut board,
                &tables,
                64,
                Some(budget),
                Some(abort_for_thread),
                &mut tt,
            )
        });

        self.pending_search = Some(PendingSearch {
            handle,
            abort,
            budget,
            elapsed: Duration::ZERO,
        });
    }

    /// Returns the decided move once ready, or `None` if search/debounce is
    /// still in progress. `elapsed_ms` is the time since the last poll, used
    /// to drive the book-move debounce the same way `update` drives the clock.
    pub fn poll_best_move(&mut self, elapsed_ms: u64) -> Option<Move> {
        if let Some((mv, waited)) = &mut self.pending_book_move {
            *waited += Duration::from_millis(elapsed_ms);
            if *waited >= BOOK_MOVE_DEBOUNCE {
                let mv = *mv;
                self.pending_book_move = None;
                return Some(mv);
            }
            return None;
        }

        if let Some(pending) = &self.pending_search
            && pending.handle.is_finished()
        {
            let pending = self.pending_search.take().unwrap();
            let (_score, best) = pending.handle.join().unwrap_or((0, None));
            return best;
        }

        None
    }

    /// Blocking convenience wrapper for non-interactive callers (tests, the
    /// EPD/perft harness): runs the book/search decision to completion on
    /// the calling thread.
    pub fn best_move(&mut self) -> Option<Move> {
        self.request_best_move();
        loop {
            if let Some(mv) = self.poll_best_move(1) {
                return Some(mv);
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn refresh_game_state(&mut self) {
        let mut legal = Vec::with_capacity(64);
        let mut scratch = Vec::with_capacity(256);
        generate_legal(&mut self.board, &self.tables, &mut legal, &mut scratch);

        if legal.is_empty() {
            use crate::moves::square_control::in_check;
            if in_check(&self.board, self.board.side_to_move, &self.tables) {
                match self.board.side_to_move {
                    Color::White => self.game_state.black_won = true,
                    Color::Black => self.game_state.white_won = true,
                }
            } else {
                self.game_state.stalemate = true;
            }
            return;
        }

        if self.board.is_threefold() || crate::status::is_insufficient_material(&self.board) {
            self.game_state.draw = true;
        }
    }
}
