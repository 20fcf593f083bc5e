// ====================================================================================
// src/maze.rs - 迷宫生成
// ====================================================================================
use crate::error::AppError;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

pub const MIN_MAZE_SIZE: usize = 5;

// 格子类型，线上格式沿用字符表示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    #[serde(rename = "#")]
    Wall,
    #[serde(rename = ".")]
    Open,
    #[serde(rename = "S")]
    Start,
    #[serde(rename = "E")]
    Exit,
}

// 线上格式为 [row, col]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "[usize; 2]", from = "[usize; 2]")]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl From<Position> for [usize; 2] {
    fn from(p: Position) -> Self {
        [p.row, p.col]
    }
}

impl From<[usize; 2]> for Position {
    fn from([row, col]: [usize; 2]) -> Self {
        Self { row, col }
    }
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    // 按偏移量移动，越过左/上边界返回 None
    pub fn offset(self, dy: i32, dx: i32) -> Option<Position> {
        let row = self.row.checked_add_signed(dy as isize)?;
        let col = self.col.checked_add_signed(dx as isize)?;
        Some(Position { row, col })
    }
}

// 难度预设
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn size(self) -> usize {
        match self {
            Difficulty::Easy => 11,
            Difficulty::Medium => 15,
            Difficulty::Hard => 19,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Maze {
    size: usize,
    grid: Vec<Vec<Cell>>,
    start: Position,
    exit: Position,
}

impl Maze {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn exit(&self) -> Position {
        self.exit
    }

    pub fn grid(&self) -> &[Vec<Cell>] {
        &self.grid
    }

    pub fn cell(&self, pos: Position) -> Option<Cell> {
        self.grid.get(pos.row).and_then(|row| row.get(pos.col)).copied()
    }

    pub fn is_walkable(&self, pos: Position) -> bool {
        matches!(self.cell(pos), Some(cell) if cell != Cell::Wall)
    }

    // 由现成网格构造，Start/Exit 取网格中标记的位置
    pub fn from_grid(grid: Vec<Vec<Cell>>) -> Result<Self, AppError> {
        let size = grid.len();
        if size < MIN_MAZE_SIZE || grid.iter().any(|row| row.len() != size) {
            return Err(AppError::InvalidSize(size as i64));
        }
        let find = |target: Cell| {
            grid.iter().enumerate().find_map(|(r, row)| {
                row.iter().position(|c| *c == target).map(|c| Position::new(r, c))
            })
        };
        let start = find(Cell::Start).ok_or_else(|| AppError::BadRequest("maze has no start".into()))?;
        let exit = find(Cell::Exit).ok_or_else(|| AppError::BadRequest("maze has no exit".into()))?;
        Ok(Self { size, grid, start, exit })
    }
}

// 校验尺寸：奇数且不小于 5，不超过上限
pub fn validate_size(size: i64, max_size: usize) -> Result<usize, AppError> {
    if size < MIN_MAZE_SIZE as i64 || size % 2 == 0 || size > max_size as i64 {
        return Err(AppError::InvalidSize(size));
    }
    Ok(size as usize)
}

pub fn generate(size: usize) -> Result<Maze, AppError> {
    generate_with_rng(size, &mut rand::thread_rng())
}

// 在奇数坐标格点上做随机深度优先挖掘，得到一棵生成树
pub fn generate_with_rng<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Result<Maze, AppError> {
    if size < MIN_MAZE_SIZE || size % 2 == 0 {
        return Err(AppError::InvalidSize(size as i64));
    }

    let mut grid = vec![vec![Cell::Wall; size]; size];
    let start = Position::new(1, 1);
    let exit = Position::new(size - 2, size - 2);

    grid[start.row][start.col] = Cell::Open;
    let mut stack = vec![start];
    let mut candidates = Vec::with_capacity(4);

    while let Some(&current) = stack.last() {
        candidates.clear();
        for (dy, dx) in [(-2i32, 0i32), (0, 2), (2, 0), (0, -2)] {
            let Some(next) = current.offset(dy, dx) else { continue };
            let inside = (1..size - 1).contains(&next.row) && (1..size - 1).contains(&next.col);
            if inside && grid[next.row][next.col] == Cell::Wall {
                candidates.push((next, dy / 2, dx / 2));
            }
        }

        match candidates.choose(rng) {
            Some(&(next, dy, dx)) => {
                // 打通中间墙和目标格
                if let Some(between) = current.offset(dy, dx) {
                    grid[between.row][between.col] = Cell::Open;
                }
                grid[next.row][next.col] = Cell::Open;
                stack.push(next);
            }
            None => {
                stack.pop();
            }
        }
    }

    grid[start.row][start.col] = Cell::Start;
    grid[exit.row][exit.col] = Cell::Exit;

    Ok(Maze { size, grid, start, exit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::{HashSet, VecDeque};

    fn reachable_from_start(maze: &Maze) -> HashSet<Position> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([maze.start()]);
        seen.insert(maze.start());
        while let Some(pos) = queue.pop_front() {
            for (dy, dx) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                if let Some(next) = pos.offset(dy, dx) {
                    if maze.is_walkable(next) && seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }
        seen
    }

    #[test]
    fn every_open_cell_is_reachable_from_start() {
        let mut rng = StdRng::seed_from_u64(7);
        for size in (5..=31).step_by(2) {
            for _ in 0..5 {
                let maze = generate_with_rng(size, &mut rng).unwrap();
                let reachable = reachable_from_start(&maze);
                let walkable: HashSet<Position> = (0..size)
                    .flat_map(|r| (0..size).map(move |c| Position::new(r, c)))
                    .filter(|p| maze.is_walkable(*p))
                    .collect();
                assert_eq!(reachable, walkable, "size {size}");
                assert!(reachable.contains(&maze.exit()));
            }
        }
    }

    #[test]
    fn carving_produces_a_tree() {
        // 无环：开放格数 = 边数 + 1
        let mut rng = StdRng::seed_from_u64(42);
        let maze = generate_with_rng(21, &mut rng).unwrap();
        let open: Vec<Position> = (0..21)
            .flat_map(|r| (0..21).map(move |c| Position::new(r, c)))
            .filter(|p| maze.is_walkable(*p))
            .collect();
        let edges: usize = open
            .iter()
            .map(|p| {
                [(1, 0), (0, 1)]
                    .iter()
                    .filter(|(dy, dx)| p.offset(*dy, *dx).is_some_and(|n| maze.is_walkable(n)))
                    .count()
            })
            .sum();
        assert_eq!(open.len(), edges + 1);
    }

    #[test]
    fn start_and_exit_are_marked_and_border_is_wall() {
        let mut rng = StdRng::seed_from_u64(1);
        let maze = generate_with_rng(5, &mut rng).unwrap();
        assert_eq!(maze.start(), Position::new(1, 1));
        assert_eq!(maze.exit(), Position::new(3, 3));
        assert_eq!(maze.cell(maze.start()), Some(Cell::Start));
        assert_eq!(maze.cell(maze.exit()), Some(Cell::Exit));
        assert_ne!(maze.start(), maze.exit());
        for i in 0..5 {
            for pos in [Position::new(0, i), Position::new(4, i), Position::new(i, 0), Position::new(i, 4)] {
                assert_eq!(maze.cell(pos), Some(Cell::Wall));
            }
        }
    }

    #[test]
    fn rejects_even_or_small_sizes() {
        for size in [0, 1, 3, 4, 6, 16] {
            assert!(matches!(generate(size), Err(AppError::InvalidSize(_))), "size {size}");
        }
        assert!(validate_size(15, 101).is_ok());
        assert!(validate_size(-15, 101).is_err());
        assert!(validate_size(103, 101).is_err());
    }

    #[test]
    fn grid_serializes_as_characters() {
        let mut rng = StdRng::seed_from_u64(3);
        let maze = generate_with_rng(5, &mut rng).unwrap();
        let json = serde_json::to_value(maze.grid()).unwrap();
        assert_eq!(json[1][1], "S");
        assert_eq!(json[3][3], "E");
        assert_eq!(json[0][0], "#");
    }

    #[test]
    fn position_is_a_row_col_pair_on_the_wire() {
        let json = serde_json::to_value(Position::new(1, 2)).unwrap();
        assert_eq!(json, serde_json::json!([1, 2]));
        let back: Position = serde_json::from_value(json).unwrap();
        assert_eq!(back, Position::new(1, 2));
    }
}
