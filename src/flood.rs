//! Reachability over a [`Board`]: win detection, the one-cell-per-tick fill
//! animation and clearing water from cells that lost their connection.

use bitvec::{bitvec, vec::BitVec};
use log::debug;

use crate::{
    board::{Board, Position},
    pipe::Direction,
};

/// Every cell reachable from `start` through reciprocated openings, indexed
/// like the board's cells.
pub fn connected_from(board: &Board, start: Position) -> BitVec {
    let mut explored = bitvec![0; board.len()];
    let mut to_explore = vec![start];
    while let Some(pos) = to_explore.pop() {
        let idx = board.index(pos);
        if explored[idx] {
            continue;
        }
        explored.set(idx, true);
        to_explore.extend(Direction::ALL.iter().filter_map(|&dir| {
            board
                .neighbor(pos, dir)
                .filter(|nbr| board.is_connected(pos, dir) && !explored[board.index(*nbr)])
        }));
    }
    explored
}

/// The cells the source currently reaches; `None` without a source.
pub fn reachable(board: &Board) -> Option<BitVec> {
    board.source().map(|source| connected_from(board, source))
}

/// True when a source exists and every non-wall cell hangs off it.
pub fn all_reachable_from_source(board: &Board) -> bool {
    let Some(reached) = reachable(board) else {
        return false;
    };
    board
        .positions()
        .all(|pos| board.get(pos).is_wall() || reached[board.index(pos)])
}

/// True when some cell opens towards a side that nothing answers: an edge of a
/// closed board, or a neighbor not opening back.
pub fn has_open_end(board: &Board) -> bool {
    board.positions().any(|pos| {
        board
            .get(pos)
            .open_directions()
            .any(|dir| !board.is_connected(pos, dir))
    })
}

/// The puzzle is solved: everything is fed by the source and nothing leaks.
pub fn is_solved(board: &Board) -> bool {
    all_reachable_from_source(board) && !has_open_end(board)
}

/// Lets the water advance by one cell. The source fills first, after that the
/// first filled cell (column by column) with a connected dry neighbor passes
/// it on, trying top, right, bottom, left in turn.
pub fn step_fill(board: &mut Board) -> Option<Position> {
    let source = board.source()?;
    if !board.get(source).filled {
        board.get_mut(source).filled = true;
        return Some(source);
    }
    let next = board
        .positions()
        .filter(|pos| board.get(*pos).filled)
        .find_map(|pos| {
            Direction::ALL.iter().find_map(|&dir| {
                board
                    .neighbor(pos, dir)
                    .filter(|nbr| board.is_connected(pos, dir) && !board.get(*nbr).filled)
            })
        })?;
    board.get_mut(next).filled = true;
    Some(next)
}

/// Drains the first filled cell (column by column) that the source no longer
/// reaches. `None` once every filled cell is connected, or without a source.
pub fn retract_one_disconnected(board: &mut Board) -> Option<Position> {
    let reached = reachable(board)?;
    let dry = board
        .positions()
        .find(|pos| board.get(*pos).filled && !reached[board.index(*pos)])?;
    board.get_mut(dry).filled = false;
    Some(dry)
}

/// Runs [`step_fill`] until nothing more fills, returning the cells in the
/// order they were filled.
pub fn fill_to_fixed_point(board: &mut Board) -> Vec<Position> {
    let filled: Vec<Position> = std::iter::from_fn(|| step_fill(board)).collect();
    debug!("filled {} cells", filled.len());
    filled
}

/// Runs [`retract_one_disconnected`] until every filled cell is connected.
pub fn retract_to_fixed_point(board: &mut Board) -> Vec<Position> {
    let drained: Vec<Position> = std::iter::from_fn(|| retract_one_disconnected(board)).collect();
    if !drained.is_empty() {
        debug!("drained {} disconnected cells", drained.len());
    }
    drained
}
