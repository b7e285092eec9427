// Static board geometry: tiles, walls, fixed lasers, starts and checkpoints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Compass direction on the board. `Up` decreases `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    /// Grid offset of a single step in this direction.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
        }
    }

    pub const fn rotate_cw(self) -> Self {
        match self {
            Direction::Up => Direction::Right,
            Direction::Right => Direction::Down,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
        }
    }

    pub const fn rotate_ccw(self) -> Self {
        match self {
            Direction::Up => Direction::Left,
            Direction::Right => Direction::Up,
            Direction::Down => Direction::Right,
            Direction::Left => Direction::Down,
        }
    }

    pub const fn rotate(self, rotation: Rotation) -> Self {
        match rotation {
            Rotation::Clockwise => self.rotate_cw(),
            Rotation::CounterClockwise => self.rotate_ccw(),
        }
    }
}

/// Turning sense for gears and rotation cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

/// Tile coordinate. Signed so that a step off the board is still representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Chebyshev distance: diagonal neighbours are one step away.
    pub fn king_distance(self, other: Position) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Board element occupying a tile.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TileKind {
    #[default]
    Empty,
    Pit,
    Repair,
    Option,
    Conveyor {
        direction: Direction,
    },
    ExpressConveyor {
        direction: Direction,
    },
    Gear {
        rotation: Rotation,
    },
    Pusher {
        direction: Direction,
        /// Registers (1-based) on which this pusher fires.
        registers: Vec<u8>,
    },
}

impl TileKind {
    /// Belt direction for either kind of conveyor.
    pub fn conveyor_direction(&self) -> Option<Direction> {
        match self {
            TileKind::Conveyor { direction } | TileKind::ExpressConveyor { direction } => {
                Some(*direction)
            }
            _ => None,
        }
    }
}

/// Walls on the four sides of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Walls {
    pub up: bool,
    pub right: bool,
    pub down: bool,
    pub left: bool,
}

impl Walls {
    pub const fn has(&self, side: Direction) -> bool {
        match side {
            Direction::Up => self.up,
            Direction::Right => self.right,
            Direction::Down => self.down,
            Direction::Left => self.left,
        }
    }

    pub fn set(&mut self, side: Direction) {
        match side {
            Direction::Up => self.up = true,
            Direction::Right => self.right = true,
            Direction::Down => self.down = true,
            Direction::Left => self.left = true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tile {
    #[serde(default)]
    pub kind: TileKind,
    #[serde(default)]
    pub walls: Walls,
}

/// Laser bolted to the board; fires every register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardLaser {
    pub position: Position,
    pub direction: Direction,
    pub damage: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingPosition {
    pub number: u8,
    pub position: Position,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub number: u8,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    ZeroSize,
    TileCountMismatch { expected: usize, actual: usize },
    OutOfBounds(Position),
    CheckpointSequence { expected: u8, found: u8 },
    DuplicateStart(u8),
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::ZeroSize => write!(f, "board must be at least 1x1"),
            BoardError::TileCountMismatch { expected, actual } => {
                write!(f, "expected {expected} tiles, found {actual}")
            }
            BoardError::OutOfBounds(position) => write!(f, "position {position} is off the board"),
            BoardError::CheckpointSequence { expected, found } => {
                write!(f, "checkpoint {found} found where {expected} was expected")
            }
            BoardError::DuplicateStart(number) => write!(f, "starting position {number} declared twice"),
        }
    }
}

impl std::error::Error for BoardError {}

/// Read-only board geometry once a session starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub name: String,
    width: i32,
    height: i32,
    /// Tiles stored in row-major order.
    tiles: Vec<Tile>,
    #[serde(default)]
    lasers: Vec<BoardLaser>,
    #[serde(default)]
    starts: Vec<StartingPosition>,
    #[serde(default)]
    checkpoints: Vec<Checkpoint>,
}

impl Board {
    /// Creates an empty board with no walls or elements.
    pub fn new(name: impl Into<String>, width: i32, height: i32) -> Result<Self, BoardError> {
        if width <= 0 || height <= 0 {
            return Err(BoardError::ZeroSize);
        }
        let size = (width as usize) * (height as usize);
        Ok(Self {
            name: name.into(),
            width,
            height,
            tiles: vec![Tile::default(); size],
            lasers: Vec::new(),
            starts: Vec::new(),
            checkpoints: Vec::new(),
        })
    }

    pub const fn width(&self) -> i32 {
        self.width
    }

    pub const fn height(&self) -> i32 {
        self.height
    }

    pub const fn in_bounds(&self, position: Position) -> bool {
        position.x >= 0 && position.y >= 0 && position.x < self.width && position.y < self.height
    }

    fn index(&self, position: Position) -> Option<usize> {
        if self.in_bounds(position) {
            Some(position.y as usize * self.width as usize + position.x as usize)
        } else {
            None
        }
    }

    pub fn tile_at(&self, position: Position) -> Option<&Tile> {
        self.index(position).map(|idx| &self.tiles[idx])
    }

    /// Walls declared on the tile itself; off-board positions have none.
    pub fn walls_at(&self, position: Position) -> Walls {
        self.tile_at(position).map(|tile| tile.walls).unwrap_or_default()
    }

    pub fn fixed_laser_at(&self, position: Position) -> Option<&BoardLaser> {
        self.lasers.iter().find(|laser| laser.position == position)
    }

    pub fn checkpoint_at(&self, position: Position) -> Option<u8> {
        self.checkpoints
            .iter()
            .find(|checkpoint| checkpoint.position == position)
            .map(|checkpoint| checkpoint.number)
    }

    pub fn is_pit(&self, position: Position) -> bool {
        matches!(self.tile_at(position).map(|tile| &tile.kind), Some(TileKind::Pit))
    }

    /// True when a wall separates `from` and its neighbour in `direction`.
    /// Either tile declaring the wall is enough to block.
    pub fn wall_between(&self, from: Position, direction: Direction) -> bool {
        self.walls_at(from).has(direction) || self.walls_at(from.step(direction)).has(direction.opposite())
    }

    pub fn lasers(&self) -> &[BoardLaser] {
        &self.lasers
    }

    pub fn starts(&self) -> &[StartingPosition] {
        &self.starts
    }

    pub fn start(&self, number: u8) -> Option<&StartingPosition> {
        self.starts.iter().find(|start| start.number == number)
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn checkpoint_count(&self) -> u8 {
        self.checkpoints.len() as u8
    }

    pub fn set_kind(&mut self, position: Position, kind: TileKind) -> Result<(), BoardError> {
        let idx = self.index(position).ok_or(BoardError::OutOfBounds(position))?;
        self.tiles[idx].kind = kind;
        Ok(())
    }

    /// Places a wall on `side` of `position`, mirrored onto the neighbour when it exists.
    pub fn add_wall(&mut self, position: Position, side: Direction) -> Result<(), BoardError> {
        let idx = self.index(position).ok_or(BoardError::OutOfBounds(position))?;
        self.tiles[idx].walls.set(side);
        if let Some(neighbour) = self.index(position.step(side)) {
            self.tiles[neighbour].walls.set(side.opposite());
        }
        Ok(())
    }

    pub fn add_laser(&mut self, laser: BoardLaser) -> Result<(), BoardError> {
        if !self.in_bounds(laser.position) {
            return Err(BoardError::OutOfBounds(laser.position));
        }
        self.lasers.push(laser);
        Ok(())
    }

    pub fn add_start(
        &mut self,
        number: u8,
        position: Position,
        direction: Direction,
    ) -> Result<(), BoardError> {
        if !self.in_bounds(position) {
            return Err(BoardError::OutOfBounds(position));
        }
        if self.start(number).is_some() {
            return Err(BoardError::DuplicateStart(number));
        }
        self.starts.push(StartingPosition {
            number,
            position,
            direction,
        });
        Ok(())
    }

    /// Appends the next checkpoint in sequence.
    pub fn add_checkpoint(&mut self, position: Position) -> Result<u8, BoardError> {
        if !self.in_bounds(position) {
            return Err(BoardError::OutOfBounds(position));
        }
        let number = self.checkpoint_count() + 1;
        self.checkpoints.push(Checkpoint { number, position });
        Ok(number)
    }

    /// Structural checks for boards that arrive from outside (course files).
    pub fn validate(&self) -> Result<(), BoardError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(BoardError::ZeroSize);
        }
        let expected = (self.width as usize) * (self.height as usize);
        if self.tiles.len() != expected {
            return Err(BoardError::TileCountMismatch {
                expected,
                actual: self.tiles.len(),
            });
        }
        for laser in &self.lasers {
            if !self.in_bounds(laser.position) {
                return Err(BoardError::OutOfBounds(laser.position));
            }
        }
        for (i, start) in self.starts.iter().enumerate() {
            if !self.in_bounds(start.position) {
                return Err(BoardError::OutOfBounds(start.position));
            }
            if self.starts[..i].iter().any(|s| s.number == start.number) {
                return Err(BoardError::DuplicateStart(start.number));
            }
        }
        let mut sorted: Vec<&Checkpoint> = self.checkpoints.iter().collect();
        sorted.sort_by_key(|checkpoint| checkpoint.number);
        for (i, checkpoint) in sorted.into_iter().enumerate() {
            let expected = i as u8 + 1;
            if checkpoint.number != expected {
                return Err(BoardError::CheckpointSequence {
                    expected,
                    found: checkpoint.number,
                });
            }
            if !self.in_bounds(checkpoint.position) {
                return Err(BoardError::OutOfBounds(checkpoint.position));
            }
        }
        Ok(())
    }
}
