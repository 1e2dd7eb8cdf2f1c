mod utils;

pub mod board;
pub mod config;
pub mod flood;
pub mod game;
pub mod generate;
pub mod pipe;
pub mod save;

pub use board::{Board, Position};
pub use config::Settings;
pub use game::{Game, GameView};
pub use generate::{generate, Limits};
pub use pipe::{Direction, Pipe, PipeKind, Rotation};

use wasm_bindgen::prelude::*;

pub type Pcg = rand_pcg::Pcg32;

/// Cell byte handed to JS: pipe code in the low nibble plus these flags.
pub const CELL_SOURCE: u8 = 0x10;
pub const CELL_FILLED: u8 = 0x20;

#[wasm_bindgen]
extern "C" {
    // Use `js_namespace` here to bind `console.log(..)` instead of just
    // `log(..)`
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }
    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            log(&format!("[{}] {}", record.level(), record.args()));
        }
    }
    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

fn init_logging() {
    // a second game keeps the logger installed by the first
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Info);
    }
}

/// Mirror of the board for the page to draw from, one byte per cell, row by row.
#[derive(Default)]
struct CellBuffer {
    columns: usize,
    cells: Vec<u8>,
    solved_in: Option<u32>,
}

impl GameView for CellBuffer {
    fn display_pipe(&mut self, pos: Position, pipe: Pipe, is_source: bool) {
        let mut cell = pipe.code();
        if is_source {
            cell |= CELL_SOURCE;
        }
        if pipe.filled {
            cell |= CELL_FILLED;
        }
        self.cells[pos.y * self.columns + pos.x] = cell;
    }
    fn game_end(&mut self, turns: u32) {
        self.solved_in = Some(turns);
    }
    fn resize(&mut self, columns: usize, rows: usize) {
        self.columns = columns;
        self.cells = vec![0; columns * rows];
    }
}

#[wasm_bindgen]
pub struct PipeGame {
    game: Game<CellBuffer>,
}

#[wasm_bindgen]
impl PipeGame {
    /// Starts a game from JSON settings; an empty string uses the defaults.
    pub fn new(settings_json: &str) -> Result<PipeGame, JsError> {
        utils::set_panic_hook();
        init_logging();
        let settings = if settings_json.trim().is_empty() {
            Settings::default()
        } else {
            Settings::from_json(settings_json)?
        };
        Ok(Self {
            game: Game::new(CellBuffer::default(), settings)?,
        })
    }

    fn position(&self, x: usize, y: usize) -> Option<Position> {
        let pos = Position::new(x, y);
        self.game.board().contains(pos).then_some(pos)
    }

    pub fn width(&self) -> usize {
        self.game.board().columns()
    }

    pub fn height(&self) -> usize {
        self.game.board().rows()
    }

    pub fn cells(&self) -> Vec<u8> {
        self.game.view().cells.clone()
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<u8> {
        let pos = self.position(x, y)?;
        Some(self.game.view().cells[pos.y * self.width() + pos.x])
    }

    pub fn turns(&self) -> u32 {
        self.game.turns()
    }

    pub fn game_won(&self) -> bool {
        self.game.view().solved_in.is_some()
    }

    pub fn rotate(&mut self, x: usize, y: usize, clockwise: bool) -> bool {
        let Some(pos) = self.position(x, y) else {
            return false;
        };
        self.game.rotate(pos, clockwise);
        true
    }

    /// One step of the fill animation; false once the water stands still.
    pub fn tick(&mut self) -> bool {
        self.game.fill_next_pipe().is_some()
    }

    pub fn mix(&mut self) {
        self.game.mix();
    }

    pub fn new_game(&mut self) -> Result<(), JsError> {
        Ok(self.regenerate()?)
    }

    pub fn resize(&mut self, width: usize, height: usize) -> Result<(), JsError> {
        if width == 0 || height == 0 {
            return Err(JsError::new("board must be at least 1x1"));
        }
        self.game.resize(width, height);
        Ok(())
    }

    pub fn set_editor_mode(&mut self, editor_mode: bool) {
        self.game.set_editor_mode(editor_mode);
    }

    /// Places an unrotated pipe; `kind` counts wall, end, curve, straight, tee
    /// from 0.
    pub fn set_pipe(&mut self, x: usize, y: usize, kind: usize) -> bool {
        match (self.position(x, y), PipeKind::ALL.get(kind)) {
            (Some(pos), Some(&kind)) => {
                self.game.set_pipe(pos, kind);
                true
            }
            _ => false,
        }
    }

    /// `dir` is a single pipe-code bit: top 1, right 2, bottom 4, left 8.
    pub fn add_open_direction(&mut self, x: usize, y: usize, dir: u8) -> Result<(), JsError> {
        let pos = self
            .position(x, y)
            .ok_or_else(|| JsError::new("position outside of the board"))?;
        let dir = Direction::ALL
            .into_iter()
            .find(|d| d.mask() == dir)
            .ok_or_else(|| JsError::new("not a direction"))?;
        self.game.add_open_direction(pos, dir)?;
        Ok(())
    }

    pub fn set_source(&mut self, x: usize, y: usize) -> bool {
        self.position(x, y)
            .is_some_and(|pos| self.game.update_source(Some(pos)))
    }

    pub fn clear_source(&mut self) {
        self.game.update_source(None);
    }

    pub fn new_play_field(&mut self) {
        self.game.view_mut().solved_in = None;
        self.game.new_play_field();
    }

    pub fn set_overflow(&mut self, overflow: bool) {
        self.game.set_overflow(overflow);
    }

    pub fn save(&self) -> Result<String, JsError> {
        Ok(self.game.save_json()?)
    }

    pub fn load(&mut self, json: &str) -> Result<(), JsError> {
        self.game.load_json(json)?;
        self.game.view_mut().solved_in = None;
        Ok(())
    }

    pub fn to_png(&self) -> Result<Vec<u8>, JsError> {
        Ok(self.game.save_png()?)
    }

    pub fn from_png(&mut self, png: &[u8]) -> Result<(), JsError> {
        self.game.load_png(png)?;
        self.game.view_mut().solved_in = None;
        Ok(())
    }
}

impl PipeGame {
    /// A failed generation keeps the current board, and with it its win.
    fn regenerate(&mut self) -> Result<(), generate::GenerateError> {
        let solved_in = self.game.view_mut().solved_in.take();
        self.game.new_game().inspect_err(|_| {
            self.game.view_mut().solved_in = solved_in;
        })
    }
}
