use std::{
    fmt::{Display, Formatter, Write},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipe::{Direction, Pipe};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{},{}", self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("layout has no rows")]
    Empty,
    #[error("row {row} is {found} cells wide, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unknown pipe character {0:?}")]
    UnknownChar(char),
}

/// The play field: `columns` x `rows` pipes, addressed by `Position { x, y }`.
///
/// Accessing a position outside the field panics; callers own bounds checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    columns: usize,
    rows: usize,
    pipes: Vec<Pipe>,
    source: Option<Position>,
    overflow: bool,
}

impl Board {
    pub fn new(columns: usize, rows: usize, overflow: bool) -> Self {
        if columns == 0 || rows == 0 {
            panic!("board too small")
        }
        Self {
            columns,
            rows,
            pipes: vec![Pipe::WALL; columns * rows],
            source: None,
            overflow,
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }
    pub fn rows(&self) -> usize {
        self.rows
    }
    pub fn len(&self) -> usize {
        self.pipes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }
    pub fn overflow(&self) -> bool {
        self.overflow
    }
    pub fn set_overflow(&mut self, overflow: bool) {
        self.overflow = overflow;
    }
    pub fn source(&self) -> Option<Position> {
        self.source
    }
    pub fn set_source(&mut self, source: Option<Position>) {
        if let Some(pos) = source {
            self.check_bounds(pos);
        }
        self.source = source;
    }
    pub fn contains(&self, pos: Position) -> bool {
        pos.x < self.columns && pos.y < self.rows
    }

    fn check_bounds(&self, pos: Position) {
        assert!(
            self.contains(pos),
            "position {pos} outside of {}x{} board",
            self.columns,
            self.rows
        );
    }
    pub(crate) fn index(&self, pos: Position) -> usize {
        self.check_bounds(pos);
        pos.y * self.columns + pos.x
    }

    pub fn get(&self, pos: Position) -> &Pipe {
        &self.pipes[self.index(pos)]
    }
    pub fn get_mut(&mut self, pos: Position) -> &mut Pipe {
        let idx = self.index(pos);
        &mut self.pipes[idx]
    }
    pub fn set(&mut self, pos: Position, pipe: Pipe) {
        let idx = self.index(pos);
        self.pipes[idx] = pipe;
    }

    /// Every position, column by column (x outer, y inner).
    pub fn positions(&self) -> impl Iterator<Item = Position> {
        let rows = self.rows;
        (0..self.columns).flat_map(move |x| (0..rows).map(move |y| Position::new(x, y)))
    }

    /// The cell next to `pos` in `dir`. Off the edge there is nothing, unless
    /// the board overflows, in which case it wraps to the opposite edge.
    pub fn neighbor(&self, pos: Position, dir: Direction) -> Option<Position> {
        self.check_bounds(pos);
        let Position { x, y } = pos;
        let (x, y) = match dir {
            Direction::Top if y == 0 => (x, self.wrap(self.rows - 1)?),
            Direction::Top => (x, y - 1),
            Direction::Bottom if y == self.rows - 1 => (x, self.wrap(0)?),
            Direction::Bottom => (x, y + 1),
            Direction::Left if x == 0 => (self.wrap(self.columns - 1)?, y),
            Direction::Left => (x - 1, y),
            Direction::Right if x == self.columns - 1 => (self.wrap(0)?, y),
            Direction::Right => (x + 1, y),
        };
        Some(Position::new(x, y))
    }
    fn wrap(&self, coord: usize) -> Option<usize> {
        self.overflow.then_some(coord)
    }

    /// `pos` opens towards `dir` and the neighbor there opens back.
    pub fn is_connected(&self, pos: Position, dir: Direction) -> bool {
        self.get(pos).opens(dir)
            && self
                .neighbor(pos, dir)
                .is_some_and(|nbr| self.get(nbr).opens(dir.rev()))
    }

    /// Turns every cell into a wall and drops the source.
    pub fn fill_all_walls(&mut self) {
        self.pipes.fill(Pipe::WALL);
        self.source = None;
    }
    pub fn count_walls(&self) -> usize {
        self.pipes.iter().filter(|pipe| pipe.is_wall()).count()
    }
    pub fn clear_all_filled(&mut self) {
        for pipe in self.pipes.iter_mut() {
            pipe.filled = false;
        }
    }
    pub fn count_filled(&self) -> usize {
        self.pipes.iter().filter(|pipe| pipe.filled).count()
    }

    /// A new board of the given size holding the overlapping top-left part of
    /// this one. The source survives only if it still fits.
    pub fn resized(&self, columns: usize, rows: usize) -> Self {
        let mut board = Self::new(columns, rows, self.overflow);
        for x in 0..self.columns.min(columns) {
            for y in 0..self.rows.min(rows) {
                let pos = Position::new(x, y);
                board.set(pos, *self.get(pos));
            }
        }
        board.source = self.source.filter(|pos| board.contains(*pos));
        board
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        for (i, pipe) in self.pipes.iter().enumerate() {
            pipe.fmt(f)?;
            if i % self.columns == self.columns - 1 {
                f.write_char('\n')?;
            }
        }
        Ok(())
    }
}

/// Parses rows of box-drawing characters (space for a wall), one line per row.
impl FromStr for Board {
    type Err = LayoutError;
    fn from_str(layout: &str) -> Result<Self, Self::Err> {
        let lines: Vec<Vec<char>> = layout
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| line.chars().collect())
            .collect();
        let columns = lines.first().map(Vec::len).ok_or(LayoutError::Empty)?;
        if columns == 0 {
            return Err(LayoutError::Empty);
        }
        let mut board = Board::new(columns, lines.len(), false);
        for (y, line) in lines.iter().enumerate() {
            if line.len() != columns {
                return Err(LayoutError::Ragged {
                    row: y,
                    expected: columns,
                    found: line.len(),
                });
            }
            for (x, &c) in line.iter().enumerate() {
                let pipe = Pipe::try_from(c).map_err(LayoutError::UnknownChar)?;
                board.set(Position::new(x, y), pipe);
            }
        }
        Ok(board)
    }
}
