use std::fmt::{Display, Formatter, Write};

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    Top = 0b0001,
    Right = 0b0010,
    Bottom = 0b0100,
    Left = 0b1000,
}

impl Direction {
    /// Clockwise from the top; also the order neighbors are tried while filling.
    pub const ALL: [Direction; 4] = [
        Direction::Top,
        Direction::Right,
        Direction::Bottom,
        Direction::Left,
    ];

    pub const fn mask(self) -> u8 {
        self as u8
    }
    pub const fn ordinal(self) -> usize {
        match self {
            Direction::Top => 0,
            Direction::Right => 1,
            Direction::Bottom => 2,
            Direction::Left => 3,
        }
    }
    pub const fn rev(self) -> Self {
        match self {
            Direction::Top => Direction::Bottom,
            Direction::Right => Direction::Left,
            Direction::Bottom => Direction::Top,
            Direction::Left => Direction::Right,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PipeKind {
    #[default]
    Wall,
    End,
    Curve,
    Straight,
    Tee,
}

impl PipeKind {
    pub const ALL: [PipeKind; 5] = [
        PipeKind::Wall,
        PipeKind::End,
        PipeKind::Curve,
        PipeKind::Straight,
        PipeKind::Tee,
    ];

    /// openings at 0°, in pipe-code bits
    const fn base_mask(self) -> u8 {
        match self {
            PipeKind::Wall => 0b0000,
            PipeKind::End => 0b0001,
            PipeKind::Curve => 0b0011,
            PipeKind::Straight => 0b0101,
            PipeKind::Tee => 0b0111,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Zero,
    Ninety,
    OneEighty,
    TwoSeventy,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::Zero,
        Rotation::Ninety,
        Rotation::OneEighty,
        Rotation::TwoSeventy,
    ];

    pub const fn quarter_turns(self) -> u32 {
        match self {
            Rotation::Zero => 0,
            Rotation::Ninety => 1,
            Rotation::OneEighty => 2,
            Rotation::TwoSeventy => 3,
        }
    }
    pub const fn from_quarter_turns(turns: u32) -> Self {
        Self::ALL[(turns % 4) as usize]
    }
    pub const fn clockwise(self) -> Self {
        Self::from_quarter_turns(self.quarter_turns() + 1)
    }
    pub const fn counterclockwise(self) -> Self {
        Self::from_quarter_turns(self.quarter_turns() + 3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("pipe code {0} does not name a pipe (expected 0..=14)")]
pub struct InvalidPipeCode(pub u8);

/// A single cell of the play field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pipe {
    kind: PipeKind,
    rotation: Rotation,
    pub filled: bool,
}

impl Pipe {
    pub const WALL: Pipe = Pipe {
        kind: PipeKind::Wall,
        rotation: Rotation::Zero,
        filled: false,
    };

    pub fn new(kind: PipeKind, rotation: Rotation) -> Self {
        let mut pipe = Self {
            kind,
            rotation: Rotation::Zero,
            filled: false,
        };
        pipe.set_rotation(rotation);
        pipe
    }

    pub fn kind(&self) -> PipeKind {
        self.kind
    }
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }
    pub fn is_wall(&self) -> bool {
        self.kind == PipeKind::Wall
    }

    /// Walls always sit at 0° and straights only ever take 0° or 90°.
    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = match self.kind {
            PipeKind::Wall => Rotation::Zero,
            PipeKind::Straight => Rotation::from_quarter_turns(rotation.quarter_turns() % 2),
            PipeKind::End | PipeKind::Curve | PipeKind::Tee => rotation,
        };
    }

    pub fn rotate_clockwise(&mut self) {
        self.set_rotation(self.rotation.clockwise());
    }
    pub fn rotate_counterclockwise(&mut self) {
        self.set_rotation(self.rotation.counterclockwise());
    }

    /// The pipe code: one bit per open side (top 1, right 2, bottom 4, left 8).
    pub fn code(&self) -> u8 {
        let base = self.kind.base_mask();
        let turns = self.rotation.quarter_turns();
        ((base << turns) | (base >> (4 - turns))) & 0b1111
    }

    pub fn opens(&self, dir: Direction) -> bool {
        self.code() & dir.mask() != 0
    }
    pub fn open_directions(&self) -> impl Iterator<Item = Direction> {
        let code = self.code();
        Direction::ALL
            .into_iter()
            .filter(move |dir| code & dir.mask() != 0)
    }
    pub fn num_openings(&self) -> usize {
        self.code().count_ones() as usize
    }

    /// Opens one more side, reshaping the pipe to whatever kind that takes.
    /// A tee cannot open its fourth side; the pipe is left untouched then.
    pub fn add_open_direction(&mut self, dir: Direction) -> Result<(), InvalidPipeCode> {
        let reshaped = Pipe::try_from(self.code() | dir.mask())?;
        self.kind = reshaped.kind;
        self.rotation = reshaped.rotation;
        Ok(())
    }
}

impl TryFrom<u8> for Pipe {
    type Error = InvalidPipeCode;
    fn try_from(code: u8) -> Result<Self, Self::Error> {
        use PipeKind::*;
        use Rotation::*;
        #[rustfmt::skip]
        let (kind, rotation) = match code {
            0 => (Wall, Zero),
            1 => (End, Zero),        2 => (End, Ninety),
            3 => (Curve, Zero),      4 => (End, OneEighty),
            5 => (Straight, Zero),   6 => (Curve, Ninety),
            7 => (Tee, Zero),        8 => (End, TwoSeventy),
            9 => (Curve, TwoSeventy), 10 => (Straight, Ninety),
            11 => (Tee, TwoSeventy), 12 => (Curve, OneEighty),
            13 => (Tee, OneEighty),  14 => (Tee, Ninety),
            _ => return Err(InvalidPipeCode(code)),
        };
        Ok(Pipe::new(kind, rotation))
    }
}

impl Display for Pipe {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        f.write_char(match self.code() {
            1 => '╹',
            2 => '╺',
            4 => '╻',
            8 => '╸',
            3 => '┗',
            6 => '┏',
            12 => '┓',
            9 => '┛',
            5 => '┃',
            10 => '━',
            7 => '┣',
            14 => '┳',
            13 => '┫',
            11 => '┻',
            _ => ' ',
        })
    }
}

impl TryFrom<char> for Pipe {
    type Error = char;
    fn try_from(c: char) -> Result<Self, Self::Error> {
        let code = match c {
            ' ' => 0u8,
            '╹' => 1,
            '╺' => 2,
            '╻' => 4,
            '╸' => 8,
            '┗' => 3,
            '┏' => 6,
            '┓' => 12,
            '┛' => 9,
            '┃' => 5,
            '━' => 10,
            '┣' => 7,
            '┳' => 14,
            '┫' => 13,
            '┻' => 11,
            other => return Err(other),
        };
        Pipe::try_from(code).map_err(|_| c)
    }
}
