//! Saved games: the JSON document format and a one-pixel-per-cell PNG snapshot.
//!
//! The JSON document holds `source` as `{x, y}`, the `overflow` flag and
//! `board`, one array per column where `board[x][y]` is that cell's pipe code.

use std::io::Cursor;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    board::{Board, Position},
    pipe::Pipe,
};

const CODE_MASK: u8 = 0x0f;
const SOURCE_BIT: u8 = 0x10;
const OVERFLOW_BIT: u8 = 0x20;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("nothing to load")]
    Empty,
    #[error("malformed saved game: {0}")]
    Format(String),
    #[error("unreadable png: {0}")]
    Png(#[from] png::DecodingError),
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("a board without a source cannot be saved")]
    NoSource,
    #[error("could not write saved game: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not write png: {0}")]
    Png(#[from] png::EncodingError),
}

#[derive(Serialize, Deserialize)]
struct SavedGame {
    source: Position,
    overflow: bool,
    board: Vec<Vec<u8>>,
}

fn format_error(msg: impl Into<String>) -> LoadError {
    LoadError::Format(msg.into())
}

pub fn to_json(board: &Board) -> Result<String, SaveError> {
    let source = board.source().ok_or(SaveError::NoSource)?;
    let codes = (0..board.columns())
        .map(|x| {
            (0..board.rows())
                .map(|y| board.get(Position::new(x, y)).code())
                .collect()
        })
        .collect();
    let saved = SavedGame {
        source,
        overflow: board.overflow(),
        board: codes,
    };
    Ok(serde_json::to_string(&saved)?)
}

/// Reads a saved game. The board comes back dry; callers refill it.
pub fn from_json(json: &str) -> Result<Board, LoadError> {
    if json.trim().is_empty() {
        return Err(LoadError::Empty);
    }
    let saved: Option<SavedGame> =
        serde_json::from_str(json).map_err(|e| format_error(e.to_string()))?;
    let SavedGame {
        source,
        overflow,
        board: codes,
    } = saved.ok_or(LoadError::Empty)?;

    let columns = codes.len();
    let rows = codes.first().map_or(0, Vec::len);
    if columns == 0 || rows == 0 {
        return Err(format_error("board has no cells"));
    }
    let mut board = Board::new(columns, rows, overflow);
    for (x, column) in codes.iter().enumerate() {
        if column.len() != rows {
            return Err(format_error(format!(
                "column {x} has {} cells, expected {rows}",
                column.len()
            )));
        }
        for (y, &code) in column.iter().enumerate() {
            let pipe = Pipe::try_from(code).map_err(|e| format_error(e.to_string()))?;
            board.set(Position::new(x, y), pipe);
        }
    }
    place_source(&mut board, source)?;
    Ok(board)
}

fn place_source(board: &mut Board, source: Position) -> Result<(), LoadError> {
    if !board.contains(source) {
        return Err(format_error(format!(
            "source {source} outside of {}x{} board",
            board.columns(),
            board.rows()
        )));
    }
    if board.get(source).is_wall() {
        return Err(format_error(format!("source {source} is a wall")));
    }
    board.set_source(Some(source));
    Ok(())
}

/// An 8-bit grayscale image, one pixel per cell: the low nibble is the pipe
/// code, 0x10 marks the source and 0x20 is set everywhere on overflowing boards.
pub fn to_png(board: &Board) -> Result<Vec<u8>, SaveError> {
    let overflow = if board.overflow() { OVERFLOW_BIT } else { 0 };
    let mut pixels = Vec::with_capacity(board.len());
    for y in 0..board.rows() {
        for x in 0..board.columns() {
            let pos = Position::new(x, y);
            let source = if board.source() == Some(pos) {
                SOURCE_BIT
            } else {
                0
            };
            pixels.push(board.get(pos).code() | source | overflow);
        }
    }

    let mut bytes = Vec::new();
    let mut encoder = png::Encoder::new(
        Cursor::new(&mut bytes),
        board.columns() as u32,
        board.rows() as u32,
    );
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Best);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&pixels)?;
    writer.finish()?;
    Ok(bytes)
}

pub fn from_png(bytes: &[u8]) -> Result<Board, LoadError> {
    if bytes.is_empty() {
        return Err(LoadError::Empty);
    }
    let decoder = png::Decoder::new(Cursor::new(bytes));
    let mut reader = decoder.read_info()?;
    let mut pixels = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut pixels)?;
    if info.color_type != png::ColorType::Grayscale || info.bit_depth != png::BitDepth::Eight {
        return Err(format_error(format!(
            "expected 8-bit grayscale, got {:?} at {:?}",
            info.color_type, info.bit_depth
        )));
    }
    let (columns, rows) = (info.width as usize, info.height as usize);
    if columns == 0 || rows == 0 {
        return Err(format_error("board has no cells"));
    }
    pixels.truncate(info.buffer_size());

    let overflow = pixels[0] & OVERFLOW_BIT != 0;
    let mut board = Board::new(columns, rows, overflow);
    let mut source = None;
    for (i, &pixel) in pixels.iter().enumerate() {
        let pos = Position::new(i % columns, i / columns);
        if pixel & !(CODE_MASK | SOURCE_BIT | OVERFLOW_BIT) != 0
            || (pixel & OVERFLOW_BIT != 0) != overflow
        {
            return Err(format_error(format!("bad pixel {pixel:#04x} at {pos}")));
        }
        let pipe = Pipe::try_from(pixel & CODE_MASK).map_err(|e| format_error(e.to_string()))?;
        board.set(pos, pipe);
        if pixel & SOURCE_BIT != 0 {
            if source.is_some() {
                return Err(format_error("more than one source"));
            }
            source = Some(pos);
        }
    }
    if let Some(source) = source {
        place_source(&mut board, source)?;
    }
    Ok(board)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with_source(layout: &str, source: Position) -> Board {
        let mut board: Board = layout.parse().unwrap();
        board.set_source(Some(source));
        board
    }

    fn gray_png(width: u32, height: u32, pixels: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut encoder = png::Encoder::new(Cursor::new(&mut bytes), width, height);
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(pixels).unwrap();
        writer.finish().unwrap();
        bytes
    }

    #[test]
    fn json_is_column_major_codes() {
        let board = board_with_source("╺┓\n╺┛\n", Position::new(0, 0));
        assert_eq!(
            to_json(&board).unwrap(),
            r#"{"source":{"x":0,"y":0},"overflow":false,"board":[[2,2],[12,9]]}"#
        );
    }

    #[test]
    fn json_loads_back() {
        let mut board = board_with_source("┏━┳╸\n┃╻┗┓\n┗┻━┛\n", Position::new(2, 1));
        board.set_overflow(true);
        board.get_mut(Position::new(1, 1)).filled = true;

        let loaded = from_json(&to_json(&board).unwrap()).unwrap();
        board.clear_all_filled();
        assert_eq!(loaded, board);
    }

    #[test]
    fn saving_needs_a_source() {
        let board: Board = "╺╸\n".parse().unwrap();
        assert!(matches!(to_json(&board), Err(SaveError::NoSource)));
    }

    #[test]
    fn empty_input_is_its_own_error() {
        assert!(matches!(from_json(""), Err(LoadError::Empty)));
        assert!(matches!(from_json("  \n"), Err(LoadError::Empty)));
        assert!(matches!(from_json("null"), Err(LoadError::Empty)));
        assert!(matches!(from_png(&[]), Err(LoadError::Empty)));
    }

    #[test]
    fn malformed_documents_are_format_errors() {
        for json in [
            "{",
            "[1, 2, 3]",
            r#"{"source":{"x":0,"y":0},"overflow":false}"#,
            r#"{"source":{"x":0,"y":0},"overflow":false,"board":[]}"#,
            r#"{"source":{"x":0,"y":0},"overflow":false,"board":[[]]}"#,
            r#"{"source":{"x":0,"y":0},"overflow":false,"board":[[2,2],[12]]}"#,
            r#"{"source":{"x":0,"y":0},"overflow":false,"board":[[15]]}"#,
            r#"{"source":{"x":0,"y":0},"overflow":false,"board":[[-1]]}"#,
            r#"{"source":{"x":3,"y":0},"overflow":false,"board":[[2,2],[12,9]]}"#,
            r#"{"source":{"x":0,"y":0},"overflow":false,"board":[[0,2],[12,9]]}"#,
        ] {
            assert!(
                matches!(from_json(json), Err(LoadError::Format(_))),
                "{json}"
            );
        }
    }

    #[test]
    fn png_snapshot_loads_back() {
        let mut board = board_with_source("╺┓\n ┃\n╺┛\n", Position::new(1, 2));
        assert_eq!(from_png(&to_png(&board).unwrap()).unwrap(), board);

        board.set_overflow(true);
        board.set_source(None);
        assert_eq!(from_png(&to_png(&board).unwrap()).unwrap(), board);
    }

    #[test]
    fn png_pixels_carry_flags() {
        let png = gray_png(2, 1, &[0x22, 0x38]);
        let board = from_png(&png).unwrap();
        assert!(board.overflow());
        assert_eq!(board.source(), Some(Position::new(1, 0)));
        assert_eq!(board.to_string(), "╺╸\n");
    }

    #[test]
    fn bad_png_snapshots_are_rejected() {
        assert!(matches!(from_png(b"not a png"), Err(LoadError::Png(_))));
        // two sources
        let png = gray_png(2, 1, &[0x12, 0x18]);
        assert!(matches!(from_png(&png), Err(LoadError::Format(_))));
        // overflow on only one pixel
        let png = gray_png(2, 1, &[0x22, 0x08]);
        assert!(matches!(from_png(&png), Err(LoadError::Format(_))));
        // source on a wall
        let png = gray_png(2, 1, &[0x10, 0x08]);
        assert!(matches!(from_png(&png), Err(LoadError::Format(_))));
        // code 15
        let png = gray_png(1, 1, &[0x0f]);
        assert!(matches!(from_png(&png), Err(LoadError::Format(_))));
    }
}
