use bitvec::{bitvec, vec::BitVec};
use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    board::{Board, Position},
    flood,
    pipe::{Direction, Pipe, PipeKind, Rotation},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("no valid board found after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Bounds on the randomized search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// whole-board restarts before giving up
    pub max_restarts: u32,
    /// random pipes tried on one cell before keeping the last one regardless
    pub max_draws: u32,
    /// attach-and-grow passes within a single restart
    pub max_grow_passes: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_restarts: 10_000,
            max_draws: 1_000,
            max_grow_passes: 10_000,
        }
    }
}

/// Builds a solvable field: every non-wall cell is reachable from the source,
/// no opening is left unanswered and at most `max_wall_percent` percent of the
/// cells are walls.
pub fn generate(
    columns: usize,
    rows: usize,
    overflow: bool,
    max_wall_percent: u8,
    limits: &Limits,
    rng: &mut impl Rng,
) -> Result<Board, GenerateError> {
    let mut board = Board::new(columns, rows, overflow);
    let max_walls = columns * rows * usize::from(max_wall_percent) / 100;
    let source = Position::new(rng.gen_range(0..columns), rng.gen_range(0..rows));

    for attempt in 0..limits.max_restarts {
        board.fill_all_walls();
        board.set_source(Some(source));
        let mut visited = bitvec![0; board.len()];

        for _ in 0..limits.max_grow_passes {
            let Some(pos) = attachable_position(&board) else {
                break;
            };
            visited.set(board.index(pos), false);
            grow(&mut board, &mut visited, pos, max_wall_percent, limits, rng);
            if board.count_walls() <= max_walls {
                break;
            }
        }

        if board.count_walls() <= max_walls
            && !flood::has_open_end(&board)
            && flood::all_reachable_from_source(&board)
        {
            debug!("generated {columns}x{rows} board after {attempt} restarts");
            return Ok(board);
        }
    }
    warn!(
        "giving up on a {columns}x{rows} board with {max_wall_percent}% walls after {} restarts",
        limits.max_restarts
    );
    Err(GenerateError::Exhausted {
        attempts: limits.max_restarts,
    })
}

/// Where the next branch may sprout: the source while it is still a wall,
/// otherwise the first non-wall, non-tee cell (column by column) next to a wall.
fn attachable_position(board: &Board) -> Option<Position> {
    if let Some(source) = board.source().filter(|pos| board.get(*pos).is_wall()) {
        return Some(source);
    }
    board.positions().find(|&pos| {
        let pipe = board.get(pos);
        !pipe.is_wall()
            && pipe.kind() != PipeKind::Tee
            && Direction::ALL.iter().any(|&dir| {
                board
                    .neighbor(pos, dir)
                    .is_some_and(|nbr| board.get(nbr).is_wall())
            })
    })
}

/// Randomized depth-first fill starting at `start`. Each unvisited cell gets
/// random pipes until one agrees with its visited neighbors, then the walk
/// continues through every side that pipe opens.
pub(crate) fn grow(
    board: &mut Board,
    visited: &mut BitVec,
    start: Position,
    max_wall_percent: u8,
    limits: &Limits,
    rng: &mut impl Rng,
) {
    let mut to_visit = vec![start];
    while let Some(pos) = to_visit.pop() {
        let idx = board.index(pos);
        if visited[idx] {
            continue;
        }
        visited.set(idx, true);

        let solvable = fit_possible(board, pos);
        for _ in 0..limits.max_draws {
            board.set(pos, random_pipe(max_wall_percent, rng));
            if fits(board, visited, pos) || !solvable {
                break;
            }
        }

        // reversed so the top branch is explored first
        let pipe = *board.get(pos);
        to_visit.extend(
            Direction::ALL
                .iter()
                .rev()
                .filter(|&&dir| pipe.opens(dir))
                .filter_map(|&dir| board.neighbor(pos, dir))
                .filter(|nbr| !visited[board.index(*nbr)]),
        );
    }
}

/// An end most of the time when walls are common, otherwise a curve,
/// straight or tee; the rotation is uniform.
fn random_pipe(max_wall_percent: u8, rng: &mut impl Rng) -> Pipe {
    const BRANCHING: [PipeKind; 3] = [PipeKind::Curve, PipeKind::Straight, PipeKind::Tee];
    let kind = if rng.gen_range(0..100u8) > max_wall_percent {
        BRANCHING[rng.gen_range(0..BRANCHING.len())]
    } else {
        PipeKind::End
    };
    Pipe::new(kind, Rotation::ALL[rng.gen_range(0..4)])
}

/// The pipe at `pos` answers every visited neighbor both ways and never opens
/// off a closed edge.
fn fits(board: &Board, visited: &BitVec, pos: Position) -> bool {
    let pipe = board.get(pos);
    Direction::ALL
        .iter()
        .all(|&dir| match board.neighbor(pos, dir) {
            None => !pipe.opens(dir),
            Some(nbr) if visited[board.index(nbr)] => {
                (!pipe.opens(dir) || board.is_connected(pos, dir))
                    && (!board.get(nbr).opens(dir.rev()) || board.is_connected(nbr, dir.rev()))
            }
            Some(_) => true,
        })
}

/// False when all four neighbors already point at `pos`; no pipe opens four ways.
fn fit_possible(board: &Board, pos: Position) -> bool {
    !Direction::ALL.iter().all(|&dir| {
        board
            .neighbor(pos, dir)
            .is_some_and(|nbr| board.get(nbr).opens(dir.rev()))
    })
}
