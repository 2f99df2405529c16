//! Static world model: the arcade-center tile grid and its fixed machines.
//!
//! Everything in this module is immutable after construction. The grid is a
//! 20x15 row-major array of tile kinds; machines are stationary fixtures with
//! a scripted message each. Occupancy by moving entities is a concern of the
//! engine state, not of the map itself.

use serde::{Deserialize, Serialize};

pub const MAP_WIDTH: i32 = 20;
pub const MAP_HEIGHT: i32 = 15;

/// Where the player stands when the world loads.
pub const PLAYER_START: Position = Position { x: 10, y: 12 };

/// Floor cell just inside the exit doorway; customers enter the arcade here.
pub const ENTRANCE: Position = Position { x: 18, y: 7 };

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Floor,
    Wall,
    CarpetVertical,
    CarpetHorizontal,
    Exit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Position { x, y }
    }

    /// Orthogonal (Manhattan distance 1) adjacency.
    pub fn is_adjacent(&self, other: Position) -> bool {
        (self.x - other.x).abs() + (self.y - other.y).abs() == 1
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// The cell one step from `from` in this direction.
    pub fn step(&self, from: Position) -> Position {
        let (dx, dy) = self.delta();
        Position::new(from.x + dx, from.y + dy)
    }
}

/// A stationary arcade machine: position fixed for the lifetime of the world,
/// never mutated, never removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    pub id: u32,
    pub position: Position,
    pub glyph: &'static str,
    pub script: Vec<&'static str>,
}

/// The immutable arcade floor: tile grid plus machine roster.
#[derive(Debug, Clone)]
pub struct ArcadeMap {
    tiles: Vec<TileKind>, // row-major MAP_HEIGHT * MAP_WIDTH
    machines: Vec<Machine>,
}

// 0: Floor, 1: Wall, 2: Vertical Carpet, 3: Horizontal Carpet, 4: Exit
const MAP_LAYOUT: [[u8; MAP_WIDTH as usize]; MAP_HEIGHT as usize] = [
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 1, 1, 0, 0, 1, 1, 2, 1, 1, 0, 0, 1, 1, 0, 0, 0, 1],
    [1, 0, 0, 1, 1, 0, 0, 1, 1, 2, 1, 1, 0, 0, 1, 1, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 3, 3, 3, 3, 3, 3, 3, 3, 2, 3, 3, 3, 3, 3, 3, 3, 3, 3, 4],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 1, 1, 0, 0, 1, 1, 2, 1, 1, 0, 0, 1, 1, 0, 0, 0, 1],
    [1, 0, 0, 1, 1, 0, 0, 1, 1, 2, 1, 1, 0, 0, 1, 1, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
];

fn machine_roster() -> Vec<Machine> {
    vec![
        Machine {
            id: 1,
            position: Position::new(3, 3),
            glyph: "👾",
            script: vec![
                "'Pixel Racer 3D'へようこそ！",
                "ハイスコア: 999,999... おっと、故障中のようだ。",
            ],
        },
        Machine {
            id: 2,
            position: Position::new(7, 3),
            glyph: "🚀",
            script: vec![
                "'Starship Guardian' が起動！",
                "地球を守る最後の希望は君だ！",
            ],
        },
        Machine {
            id: 3,
            position: Position::new(12, 3),
            glyph: "🧸",
            script: vec![
                "ここはクレーンゲームコーナーです。",
                "景品: ふわふわのアルパカ人形。取れそうで取れない絶妙なバランス。",
            ],
        },
        Machine {
            id: 4,
            position: Position::new(16, 3),
            glyph: "🎵",
            script: vec![
                "音楽ゲーム 'Beat Master'！",
                "新曲が追加されました！全国ランキングに挑戦しよう！",
            ],
        },
        Machine {
            id: 5,
            position: Position::new(3, 10),
            glyph: "🕹️",
            script: vec![
                "レトロゲームコーナー。",
                "'Galactic Invaders' は今でも名作だ。",
            ],
        },
        Machine {
            id: 6,
            position: Position::new(7, 10),
            glyph: "💰",
            script: vec!["これは両替機です。", "ガチャン！コインの音が鳴り響く。"],
        },
        Machine {
            id: 7,
            position: Position::new(12, 10),
            glyph: "📸",
            script: vec![
                "プリクラ機 'KiraKira Eyes'。",
                "最新の美肌モードとデカ目効果を搭載！",
            ],
        },
        Machine {
            id: 8,
            position: Position::new(16, 10),
            glyph: "🥤",
            script: vec!["自動販売機だ。", "冷たい飲み物で一息つこう。"],
        },
        Machine {
            id: 9,
            position: Position::new(9, 6),
            glyph: "ℹ️",
            script: vec![
                "インフォメーションデスク。",
                "何かお困りですか？...誰もいないようだ。",
            ],
        },
    ]
}

impl ArcadeMap {
    pub fn new() -> Self {
        let mut tiles = Vec::with_capacity((MAP_WIDTH * MAP_HEIGHT) as usize);
        for row in MAP_LAYOUT.iter() {
            for cell in row.iter() {
                tiles.push(match cell {
                    0 => TileKind::Floor,
                    1 => TileKind::Wall,
                    2 => TileKind::CarpetVertical,
                    3 => TileKind::CarpetHorizontal,
                    _ => TileKind::Exit,
                });
            }
        }
        ArcadeMap {
            tiles,
            machines: machine_roster(),
        }
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.x < MAP_WIDTH && pos.y >= 0 && pos.y < MAP_HEIGHT
    }

    /// Tile at `pos`, or None when out of bounds. Callers treat None as
    /// blocked terrain, never as an error.
    pub fn tile(&self, pos: Position) -> Option<TileKind> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some(self.tiles[(pos.y * MAP_WIDTH + pos.x) as usize])
    }

    /// Tile-kind-only predicate; ignores occupancy.
    pub fn is_exit_tile(&self, pos: Position) -> bool {
        matches!(self.tile(pos), Some(TileKind::Exit))
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn machine_at(&self, pos: Position) -> Option<&Machine> {
        self.machines.iter().find(|m| m.position == pos)
    }

    /// First machine orthogonally adjacent to `pos`, in roster order.
    pub fn machine_adjacent_to(&self, pos: Position) -> Option<&Machine> {
        self.machines
            .iter()
            .find(|m| m.position.is_adjacent(pos))
    }
}

impl Default for ArcadeMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_dimensions_fixed() {
        let map = ArcadeMap::new();
        assert_eq!(map.tile(Position::new(0, 0)), Some(TileKind::Wall));
        assert_eq!(
            map.tile(Position::new(MAP_WIDTH - 1, MAP_HEIGHT - 1)),
            Some(TileKind::Wall)
        );
        assert_eq!(map.tile(Position::new(MAP_WIDTH, 0)), None);
        assert_eq!(map.tile(Position::new(-1, 5)), None);
    }

    #[test]
    fn exit_tile_is_on_east_wall() {
        let map = ArcadeMap::new();
        assert!(map.is_exit_tile(Position::new(19, 7)));
        assert!(!map.is_exit_tile(Position::new(18, 7)));
    }

    #[test]
    fn entrance_is_walkable_floor_family() {
        let map = ArcadeMap::new();
        // Entrance sits on the horizontal carpet leading to the exit.
        assert_eq!(map.tile(ENTRANCE), Some(TileKind::CarpetHorizontal));
        assert!(map.machine_at(ENTRANCE).is_none());
    }

    #[test]
    fn machine_roster_matches_floor_plan() {
        let map = ArcadeMap::new();
        assert_eq!(map.machines().len(), 9);
        let crane = map.machine_at(Position::new(12, 3)).expect("crane game");
        assert_eq!(crane.glyph, "🧸");
        // Machines all sit on floor tiles.
        for m in map.machines() {
            assert_eq!(map.tile(m.position), Some(TileKind::Floor));
        }
    }

    #[test]
    fn adjacency_is_orthogonal_only() {
        let p = Position::new(5, 5);
        assert!(p.is_adjacent(Position::new(5, 4)));
        assert!(p.is_adjacent(Position::new(6, 5)));
        assert!(!p.is_adjacent(Position::new(6, 6)));
        assert!(!p.is_adjacent(p));
    }
}
