use log::{info, warn};
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::{
    board::{Board, Position},
    config::{Settings, SettingsError},
    flood,
    generate::{generate, GenerateError},
    pipe::{Direction, InvalidPipeCode, Pipe, PipeKind, Rotation},
    save::{self, LoadError, SaveError},
    Pcg,
};

/// Where a game draws itself.
pub trait GameView {
    /// A cell changed (or needs redrawing).
    fn display_pipe(&mut self, pos: Position, pipe: Pipe, is_source: bool);
    /// The puzzle was solved after `turns` rotations.
    fn game_end(&mut self, turns: u32);
    /// The field now has a different size; cell displays follow.
    fn resize(&mut self, columns: usize, rows: usize);
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// A running game: the active board, the turn counter and whatever view it
/// reports to.
///
/// Positions handed to the methods must lie on the board; anything else
/// panics.
pub struct Game<V: GameView> {
    view: V,
    board: Board,
    settings: Settings,
    rng: Pcg,
    turns: u32,
    editor_mode: bool,
    finished: bool,
}

impl<V: GameView> Game<V> {
    /// Generates, shuffles and shows a fresh puzzle.
    pub fn new(view: V, settings: Settings) -> Result<Self, GameError> {
        settings.validate()?;
        let rng = settings
            .seed
            .map_or_else(Pcg::from_entropy, Pcg::seed_from_u64);
        let mut game = Self {
            view,
            board: Board::new(settings.columns, settings.rows, settings.overflow),
            settings,
            rng,
            turns: 0,
            editor_mode: false,
            finished: false,
        };
        game.new_game()?;
        Ok(game)
    }

    /// Wraps an existing board as is: nothing is generated, shuffled or filled.
    pub fn with_board(mut view: V, board: Board) -> Self {
        view.resize(board.columns(), board.rows());
        let settings = Settings {
            columns: board.columns(),
            rows: board.rows(),
            overflow: board.overflow(),
            ..Settings::default()
        };
        let mut game = Self {
            view,
            board,
            settings,
            rng: Pcg::from_entropy(),
            turns: 0,
            editor_mode: false,
            finished: false,
        };
        game.display_all();
        game
    }

    /// Replaces the board with a newly generated one using the current settings.
    pub fn new_game(&mut self) -> Result<(), GenerateError> {
        let Settings {
            columns,
            rows,
            wall_percent,
            overflow,
            ..
        } = self.settings;
        let board = generate(
            columns,
            rows,
            overflow,
            wall_percent,
            &self.settings.limits,
            &mut self.rng,
        )?;
        info!("new {columns}x{rows} game with up to {wall_percent}% walls");
        self.view.resize(columns, rows);
        self.board = board;
        self.turns = 0;
        self.finished = false;
        self.shuffle_rotations();
        self.fill_all_connected();
        self.check_win();
        self.display_all();
        Ok(())
    }

    pub fn board(&self) -> &Board {
        &self.board
    }
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
    /// Settings for the next [`new_game`](Game::new_game); the current board
    /// stays as it is.
    pub fn set_settings(&mut self, settings: Settings) -> Result<(), SettingsError> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }
    pub fn view(&self) -> &V {
        &self.view
    }
    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }
    pub fn turns(&self) -> u32 {
        self.turns
    }
    pub fn is_finished(&self) -> bool {
        self.finished
    }
    pub fn editor_mode(&self) -> bool {
        self.editor_mode
    }
    /// While editing, a solved board still floods but does not end the game.
    pub fn set_editor_mode(&mut self, editor_mode: bool) {
        self.editor_mode = editor_mode;
    }

    /// A player move: turns one pipe, drains whatever lost its connection and
    /// checks for a win.
    pub fn rotate(&mut self, pos: Position, clockwise: bool) {
        self.turns += 1;
        let pipe = self.board.get_mut(pos);
        if clockwise {
            pipe.rotate_clockwise();
        } else {
            pipe.rotate_counterclockwise();
        }
        self.retract_disconnected();
        self.check_win();
        self.display(pos);
    }

    /// Floods a solved board and reports the win the first time it happens in
    /// this game. Returns whether the board is solved.
    pub fn check_win(&mut self) -> bool {
        if !flood::is_solved(&self.board) {
            return false;
        }
        for pos in flood::fill_to_fixed_point(&mut self.board) {
            self.display(pos);
        }
        if !self.finished && !self.editor_mode {
            self.finished = true;
            info!("solved in {} turns", self.turns);
            self.view.game_end(self.turns);
        }
        true
    }

    /// One animation tick of the water.
    pub fn fill_next_pipe(&mut self) -> Option<Position> {
        let filled = flood::step_fill(&mut self.board);
        if let Some(pos) = filled {
            self.display(pos);
        }
        self.check_win();
        filled
    }

    /// Keeps the overlapping top-left part of the field; the source survives
    /// only if it still fits.
    pub fn resize(&mut self, columns: usize, rows: usize) {
        info!(
            "resizing {}x{} board to {columns}x{rows}",
            self.board.columns(),
            self.board.rows()
        );
        self.view.resize(columns, rows);
        self.board = self.board.resized(columns, rows);
        self.settings.columns = columns;
        self.settings.rows = rows;
        self.display_all();
    }

    /// Gives every pipe a random rotation.
    pub fn mix(&mut self) {
        self.shuffle_rotations();
        self.fill_all_connected();
        self.display_all();
    }

    fn shuffle_rotations(&mut self) {
        for pos in self.board.positions() {
            let rotation = Rotation::ALL[self.rng.gen_range(0..4)];
            self.board.get_mut(pos).set_rotation(rotation);
        }
    }

    /// Brings the water up to date after pipes changed outside of [`rotate`]:
    /// floods everything the source reaches and drains the rest.
    ///
    /// [`rotate`]: Game::rotate
    pub fn fill_all_connected(&mut self) {
        if self.board.source().is_some() {
            for pos in flood::fill_to_fixed_point(&mut self.board) {
                self.display(pos);
            }
            self.retract_disconnected();
        } else {
            self.board.clear_all_filled();
            self.display_all();
        }
    }

    fn retract_disconnected(&mut self) {
        for pos in flood::retract_to_fixed_point(&mut self.board) {
            self.display(pos);
        }
    }

    /// Editor placement of a fresh, unrotated pipe. A wall on the source
    /// removes the source.
    pub fn set_pipe(&mut self, pos: Position, kind: PipeKind) {
        self.board.set(pos, Pipe::new(kind, Rotation::Zero));
        if kind == PipeKind::Wall && self.board.source() == Some(pos) {
            self.board.set_source(None);
        }
        self.display(pos);
        self.fill_all_connected();
    }

    /// Moves (or removes) the source. Walls cannot hold it; returns false and
    /// changes nothing then.
    pub fn update_source(&mut self, source: Option<Position>) -> bool {
        if source.is_some_and(|pos| self.board.get(pos).is_wall()) {
            warn!("refusing to put the source on a wall");
            return false;
        }
        let old = self.board.source();
        self.board.set_source(source);
        for pos in old.into_iter().chain(source) {
            self.display(pos);
        }
        self.fill_all_connected();
        true
    }

    /// Opens one more side of a pipe, changing its kind as needed.
    pub fn add_open_direction(
        &mut self,
        pos: Position,
        dir: Direction,
    ) -> Result<(), InvalidPipeCode> {
        self.board.get_mut(pos).add_open_direction(dir)?;
        self.display(pos);
        self.fill_all_connected();
        Ok(())
    }

    /// Empties the field: all walls, no source.
    pub fn new_play_field(&mut self) {
        self.board.fill_all_walls();
        self.turns = 0;
        self.finished = false;
        self.display_all();
    }

    pub fn set_overflow(&mut self, overflow: bool) {
        self.board.set_overflow(overflow);
        self.settings.overflow = overflow;
        self.fill_all_connected();
        self.display_all();
    }

    pub fn save_json(&self) -> Result<String, SaveError> {
        save::to_json(&self.board)
    }

    /// Replaces the board with a saved one. On error the current game is kept.
    pub fn load_json(&mut self, json: &str) -> Result<(), LoadError> {
        let board = save::from_json(json).inspect_err(|e| warn!("load failed: {e}"))?;
        self.install(board);
        Ok(())
    }

    pub fn save_png(&self) -> Result<Vec<u8>, SaveError> {
        save::to_png(&self.board)
    }

    pub fn load_png(&mut self, bytes: &[u8]) -> Result<(), LoadError> {
        let board = save::from_png(bytes).inspect_err(|e| warn!("png load failed: {e}"))?;
        self.install(board);
        Ok(())
    }

    fn install(&mut self, board: Board) {
        let (columns, rows) = (board.columns(), board.rows());
        self.board = board;
        self.settings.overflow = self.board.overflow();
        self.turns = 0;
        self.finished = false;
        self.resize(columns, rows);
        self.fill_all_connected();
    }

    fn display(&mut self, pos: Position) {
        let is_source = self.board.source() == Some(pos);
        self.view.display_pipe(pos, *self.board.get(pos), is_source);
    }

    fn display_all(&mut self) {
        let source = self.board.source();
        for pos in self.board.positions() {
            self.view
                .display_pipe(pos, *self.board.get(pos), source == Some(pos));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingView {
        displayed: Vec<(Position, Pipe, bool)>,
        ends: Vec<u32>,
        resizes: Vec<(usize, usize)>,
    }

    impl GameView for RecordingView {
        fn display_pipe(&mut self, pos: Position, pipe: Pipe, is_source: bool) {
            self.displayed.push((pos, pipe, is_source));
        }
        fn game_end(&mut self, turns: u32) {
            self.ends.push(turns);
        }
        fn resize(&mut self, columns: usize, rows: usize) {
            self.resizes.push((columns, rows));
        }
    }

    fn game(layout: &str, source: Position) -> Game<RecordingView> {
        let mut board: Board = layout.parse().unwrap();
        board.set_source(Some(source));
        Game::with_board(RecordingView::default(), board)
    }

    fn rotate_every_cell(layout: &str, clockwise: bool) -> String {
        let mut game = game(layout, Position::new(0, 0));
        for pos in game.board().positions() {
            game.rotate(pos, clockwise);
        }
        game.board().to_string()
    }

    #[test]
    fn rotating_each_kind() {
        assert_eq!(rotate_every_cell("╸╹\n╺╻\n", true), "╹╺\n╻╸\n");
        assert_eq!(rotate_every_cell("╹╺\n╻╸\n", false), "╸╹\n╺╻\n");
        assert_eq!(rotate_every_cell("━┃\n", true), "┃━\n");
        assert_eq!(rotate_every_cell("━┃\n", false), "┃━\n");
        assert_eq!(rotate_every_cell("┏┓\n┗┛\n", true), "┓┛\n┏┗\n");
        assert_eq!(rotate_every_cell("┓┛\n┏┗\n", false), "┏┓\n┗┛\n");
        assert_eq!(rotate_every_cell("┣┫\n┳┻\n", true), "┳┻\n┫┣\n");
        assert_eq!(rotate_every_cell("┳┻\n┫┣\n", false), "┣┫\n┳┻\n");
    }

    #[test]
    fn rotations_count_as_turns() {
        let mut game = game("┏┓\n┗┛\n", Position::new(0, 0));
        game.rotate(Position::new(1, 1), true);
        game.rotate(Position::new(1, 1), false);
        assert_eq!(game.turns(), 2);
        assert_eq!(game.view().displayed.last().unwrap().0, Position::new(1, 1));
    }

    #[test]
    fn ticks_fill_one_pipe_at_a_time() {
        let mut game = game("╺┓\n╺┛\n", Position::new(0, 0));
        assert_eq!(game.board().count_filled(), 0);
        assert_eq!(game.fill_next_pipe(), Some(Position::new(0, 0)));
        assert!(game.board().get(Position::new(0, 0)).filled);
        game.fill_next_pipe();
        assert!(game.board().get(Position::new(1, 0)).filled);
        game.fill_next_pipe();
        assert!(game.board().get(Position::new(1, 1)).filled);
        game.fill_next_pipe();
        assert!(game.board().get(Position::new(0, 1)).filled);
    }

    #[test]
    fn the_win_is_reported_once() {
        let mut game = game("╹┓\n╺┛\n", Position::new(1, 0));
        game.rotate(Position::new(1, 1), true);
        game.rotate(Position::new(1, 1), false);
        assert!(game.view().ends.is_empty());

        game.rotate(Position::new(0, 0), true);
        assert_eq!(game.view().ends, vec![3]);
        assert!(game.is_finished());
        assert_eq!(game.board().count_filled(), 4);

        game.rotate(Position::new(0, 0), true);
        game.rotate(Position::new(0, 0), true);
        game.rotate(Position::new(0, 0), true);
        game.rotate(Position::new(0, 0), true);
        assert_eq!(game.view().ends, vec![3]);
    }

    #[test]
    fn editing_a_solved_board_does_not_end_the_game() {
        let mut game = game("╹┓\n╺┛\n", Position::new(1, 0));
        game.set_editor_mode(true);
        game.rotate(Position::new(0, 0), true);
        assert!(game.view().ends.is_empty());
        assert!(!game.is_finished());
        assert_eq!(game.board().count_filled(), 4);
    }

    #[test]
    fn rotating_drains_cut_off_pipes() {
        let mut game = game("╺┓┏┓\n ┗┛┃\n╺━━┛\n", Position::new(0, 0));
        game.fill_all_connected();
        assert_eq!(game.board().count_filled(), 11);
        game.rotate(Position::new(1, 1), true);
        assert_eq!(game.board().count_filled(), 2);
    }

    #[test]
    fn resizing_keeps_the_overlap() {
        const LAYOUT: &str = "┏━┳╸\n┃╻┗┓\n┗┻━┛\n";
        let original: Board = LAYOUT.parse().unwrap();
        let mut game = game(LAYOUT, Position::new(0, 0));

        game.resize(10, 10);
        assert_eq!(game.view().resizes, vec![(4, 3), (10, 10)]);
        assert_eq!((game.board().columns(), game.board().rows()), (10, 10));
        for pos in original.positions() {
            assert_eq!(game.board().get(pos), original.get(pos));
        }

        game.resize(2, 2);
        assert_eq!(game.board().source(), Some(Position::new(0, 0)));
        for pos in game.board().positions() {
            assert_eq!(game.board().get(pos), original.get(pos));
        }

        let mut game = self::game(LAYOUT, Position::new(3, 2));
        game.resize(3, 3);
        assert_eq!(game.board().source(), None);
    }

    #[test]
    fn mixing_keeps_the_pipe_kinds() {
        let mut game = game("┏━┳╸\n┃╻┗┓\n┗┻━┛\n", Position::new(0, 0));
        let kinds: Vec<_> = game
            .board()
            .positions()
            .map(|pos| game.board().get(pos).kind())
            .collect();
        game.mix();
        let mixed: Vec<_> = game
            .board()
            .positions()
            .map(|pos| game.board().get(pos).kind())
            .collect();
        assert_eq!(kinds, mixed);
        assert!(game.board().get(Position::new(0, 0)).filled);
    }

    #[test]
    fn new_games_come_shuffled_and_sized() {
        let settings = Settings {
            columns: 7,
            rows: 5,
            wall_percent: 30,
            seed: Some(17),
            ..Settings::default()
        };
        let game = Game::new(RecordingView::default(), settings).unwrap();
        assert_eq!(game.view().resizes, vec![(7, 5)]);
        assert_eq!((game.board().columns(), game.board().rows()), (7, 5));
        assert!(game.board().count_walls() <= 7 * 5 * 30 / 100);
        assert!(game.board().source().is_some());
        assert_eq!(game.turns(), 0);
        // every cell was drawn at least once
        for pos in game.board().positions() {
            assert!(game.view().displayed.iter().any(|(p, ..)| *p == pos));
        }
    }

    #[test]
    fn bad_settings_fail_the_new_game() {
        let settings = Settings {
            wall_percent: 150,
            ..Settings::default()
        };
        assert!(matches!(
            Game::new(RecordingView::default(), settings.clone()),
            Err(GameError::Settings(SettingsError::WallPercent(150)))
        ));

        let mut game = game("╺╸\n", Position::new(0, 0));
        assert!(game.set_settings(settings).is_err());
        assert_eq!(game.settings().wall_percent, 20);
    }

    #[test]
    fn placing_a_wall_on_the_source_clears_it() {
        let mut game = game("╺┓\n╺┛\n", Position::new(0, 0));
        game.fill_all_connected();
        game.set_pipe(Position::new(1, 1), PipeKind::Curve);
        // a fresh curve faces up into the source's water
        let placed = game.board().get(Position::new(1, 1));
        assert_eq!(placed.code(), 3);
        assert!(placed.filled);

        game.set_pipe(Position::new(0, 0), PipeKind::Wall);
        assert_eq!(game.board().source(), None);
        assert_eq!(game.board().count_filled(), 0);
    }

    #[test]
    fn the_source_cannot_sit_on_a_wall() {
        let mut game = game("╺ \n╺┛\n", Position::new(0, 0));
        assert!(!game.update_source(Some(Position::new(1, 0))));
        assert_eq!(game.board().source(), Some(Position::new(0, 0)));

        assert!(game.update_source(Some(Position::new(1, 1))));
        assert_eq!(game.board().source(), Some(Position::new(1, 1)));
        assert!(game.board().get(Position::new(1, 1)).filled);
        assert!(!game.board().get(Position::new(0, 0)).filled);

        assert!(game.update_source(None));
        assert_eq!(game.board().count_filled(), 0);
    }

    #[test]
    fn opening_more_sides() {
        let mut game = game("╺╸\n", Position::new(0, 0));
        game.add_open_direction(Position::new(0, 0), Direction::Bottom).unwrap();
        assert_eq!(game.board().to_string(), "┏╸\n");
        game.add_open_direction(Position::new(0, 0), Direction::Left).unwrap();
        assert_eq!(game.board().to_string(), "┳╸\n");
        assert_eq!(
            game.add_open_direction(Position::new(0, 0), Direction::Top),
            Err(InvalidPipeCode(15))
        );
        assert_eq!(game.board().to_string(), "┳╸\n");
    }

    #[test]
    fn a_new_play_field_is_all_walls() {
        let mut game = game("╺┓\n╺┛\n", Position::new(0, 0));
        game.rotate(Position::new(0, 0), true);
        game.new_play_field();
        assert_eq!(game.board().count_walls(), 4);
        assert_eq!(game.board().source(), None);
        assert_eq!(game.turns(), 0);
    }

    #[test]
    fn overflow_can_complete_a_board() {
        let mut game = game("━━\n", Position::new(0, 0));
        assert_eq!(game.board().count_filled(), 0);
        game.set_overflow(true);
        assert!(game.board().overflow());
        assert_eq!(game.board().count_filled(), 2);
    }

    #[test]
    fn saved_games_load_back() {
        let mut game = game("╺┓\n╺┛\n", Position::new(0, 0));
        let json = game.save_json().unwrap();

        let mut other = self::game("┏━┳╸\n┃╻┗┓\n┗┻━┛\n", Position::new(0, 0));
        other.rotate(Position::new(1, 1), true);
        other.load_json(&json).unwrap();
        assert_eq!(other.board().to_string(), "╺┓\n╺┛\n");
        assert_eq!(other.board().source(), Some(Position::new(0, 0)));
        assert_eq!(other.view().resizes, vec![(4, 3), (2, 2)]);
        assert_eq!(other.turns(), 0);
        assert_eq!(other.board().count_filled(), 4);

        game.rotate(Position::new(1, 0), true);
        let png = game.save_png().unwrap();
        other.load_png(&png).unwrap();
        assert_eq!(other.board().to_string(), game.board().to_string());
    }

    #[test]
    fn failed_loads_keep_the_current_board() {
        let mut game = game("╺┓\n╺┛\n", Position::new(0, 0));
        let before = game.board().clone();
        assert!(matches!(game.load_json(""), Err(LoadError::Empty)));
        assert!(matches!(
            game.load_json("{\"board\": 3}"),
            Err(LoadError::Format(_))
        ));
        assert!(game.load_png(b"nope").is_err());
        assert_eq!(*game.board(), before);
    }
}
