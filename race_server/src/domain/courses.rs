// Named courses: built-in boards plus boards parsed from JSON course files.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::board::{Board, BoardError, BoardLaser, Direction, Position, Rotation, TileKind};

pub const DEFAULT_COURSE: &str = "proving-grounds";

#[derive(Debug)]
pub enum CourseError {
    UnknownCourse(String),
    Io { path: String, source: std::io::Error },
    Parse { course: String, source: serde_json::Error },
    Invalid { course: String, source: BoardError },
}

impl fmt::Display for CourseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourseError::UnknownCourse(id) => write!(f, "unknown course '{id}'"),
            CourseError::Io { path, source } => write!(f, "failed to read {path}: {source}"),
            CourseError::Parse { course, source } => write!(f, "course '{course}' is malformed: {source}"),
            CourseError::Invalid { course, source } => write!(f, "course '{course}' is invalid: {source}"),
        }
    }
}

impl std::error::Error for CourseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CourseError::UnknownCourse(_) => None,
            CourseError::Io { source, .. } => Some(source),
            CourseError::Parse { source, .. } => Some(source),
            CourseError::Invalid { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CourseCatalog {
    courses: BTreeMap<String, Board>,
}

impl CourseCatalog {
    pub fn builtin() -> Result<Self, CourseError> {
        let mut catalog = Self::default();
        for (id, build) in [
            (DEFAULT_COURSE, proving_grounds as fn() -> Result<Board, BoardError>),
            ("test-arena", test_arena),
        ] {
            let board = build().map_err(|source| CourseError::Invalid {
                course: id.to_string(),
                source,
            })?;
            catalog.courses.insert(id.to_string(), board);
        }
        Ok(catalog)
    }

    /// Parses and validates one course. A course with an existing id replaces it.
    pub fn insert_json(&mut self, id: &str, json: &str) -> Result<(), CourseError> {
        let board: Board = serde_json::from_str(json).map_err(|source| CourseError::Parse {
            course: id.to_string(),
            source,
        })?;
        self.insert(id, board)
    }

    pub fn insert(&mut self, id: &str, board: Board) -> Result<(), CourseError> {
        board.validate().map_err(|source| CourseError::Invalid {
            course: id.to_string(),
            source,
        })?;
        self.courses.insert(id.to_string(), board);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&Board, CourseError> {
        self.courses
            .get(id)
            .ok_or_else(|| CourseError::UnknownCourse(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.courses.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

fn proving_grounds() -> Result<Board, BoardError> {
    let mut board = Board::new("Proving Grounds", 12, 12)?;

    for (number, x) in (1..=8).zip([1, 3, 5, 7, 2, 4, 6, 8]) {
        let y = if number <= 4 { 11 } else { 10 };
        board.add_start(number, Position::new(x, y), Direction::Up)?;
    }

    // Belt along row 5 bending south into column 6.
    for x in 0..6 {
        board.set_kind(Position::new(x, 5), TileKind::Conveyor { direction: Direction::Right })?;
    }
    board.set_kind(Position::new(6, 5), TileKind::Conveyor { direction: Direction::Down })?;
    board.set_kind(Position::new(6, 6), TileKind::Conveyor { direction: Direction::Down })?;

    for y in 3..=9 {
        board.set_kind(Position::new(10, y), TileKind::ExpressConveyor { direction: Direction::Up })?;
    }

    board.set_kind(Position::new(3, 8), TileKind::Gear { rotation: Rotation::Clockwise })?;
    board.set_kind(Position::new(8, 3), TileKind::Gear { rotation: Rotation::CounterClockwise })?;
    board.set_kind(
        Position::new(9, 6),
        TileKind::Pusher {
            direction: Direction::Left,
            registers: vec![1, 3, 5],
        },
    )?;
    board.set_kind(Position::new(5, 2), TileKind::Pit)?;
    board.set_kind(Position::new(1, 1), TileKind::Pit)?;
    board.set_kind(Position::new(0, 0), TileKind::Repair)?;
    board.set_kind(Position::new(11, 0), TileKind::Repair)?;
    board.set_kind(Position::new(4, 9), TileKind::Option)?;
    board.set_kind(Position::new(7, 1), TileKind::Option)?;

    board.add_wall(Position::new(4, 4), Direction::Right)?;
    board.add_wall(Position::new(7, 8), Direction::Up)?;
    board.add_wall(Position::new(11, 4), Direction::Right)?;
    board.add_wall(Position::new(2, 6), Direction::Down)?;

    board.add_laser(BoardLaser {
        position: Position::new(11, 4),
        direction: Direction::Left,
        damage: 1,
    })?;
    board.add_laser(BoardLaser {
        position: Position::new(2, 6),
        direction: Direction::Up,
        damage: 1,
    })?;

    board.add_checkpoint(Position::new(9, 2))?;
    board.add_checkpoint(Position::new(2, 3))?;
    board.add_checkpoint(Position::new(6, 8))?;
    Ok(board)
}

fn test_arena() -> Result<Board, BoardError> {
    let mut board = Board::new("Test Arena", 8, 8)?;
    for (number, x) in (1..=4).zip([1, 3, 5, 7]) {
        board.add_start(number, Position::new(x, 7), Direction::Up)?;
    }
    board.add_checkpoint(Position::new(4, 1))?;
    board.add_checkpoint(Position::new(1, 4))?;
    Ok(board)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_courses_are_valid() {
        let catalog = CourseCatalog::builtin().unwrap();
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["proving-grounds", "test-arena"]);
        for id in ["proving-grounds", "test-arena"] {
            catalog.get(id).unwrap().validate().unwrap();
        }
        assert_eq!(catalog.get(DEFAULT_COURSE).unwrap().starts().len(), 8);
    }

    #[test]
    fn unknown_course_is_an_error() {
        let catalog = CourseCatalog::builtin().unwrap();
        assert!(matches!(catalog.get("moon-base"), Err(CourseError::UnknownCourse(_))));
    }

    #[test]
    fn json_course_round_trips_through_the_catalog() {
        let mut catalog = CourseCatalog::builtin().unwrap();
        let json = serde_json::to_string(catalog.get("test-arena").unwrap()).unwrap();
        catalog.insert_json("copy", &json).unwrap();
        assert_eq!(catalog.get("copy").unwrap().checkpoint_count(), 2);
    }

    #[test]
    fn malformed_course_files_are_rejected() {
        let mut catalog = CourseCatalog::default();
        assert!(matches!(catalog.insert_json("bad", "{"), Err(CourseError::Parse { .. })));

        let json = r#"{"name":"Short","width":2,"height":2,"tiles":[{"kind":{"type":"empty"},"walls":{"up":false,"right":false,"down":false,"left":false}}]}"#;
        assert!(matches!(catalog.insert_json("short", json), Err(CourseError::Invalid { .. })));
        assert!(catalog.is_empty());
    }
}
