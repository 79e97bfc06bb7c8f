use rand::rngs::StdRng;
use rand::Rng;

use crate::error::EngineError;

/// Board edge length.
pub const GRID_SIZE: usize = 4;
/// Total number of cells.
pub const CELL_COUNT: usize = GRID_SIZE * GRID_SIZE;
/// Largest representable tile exponent (2^17 = 131072).
pub const MAX_EXPONENT: u32 = 17;

/// Probability that a spawned tile is a 4 rather than a 2.
const FOUR_SPAWN_RATE: f64 = 0.1;

/// One of the four tilt directions, each a unit vector with exactly one
/// non-zero component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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

    /// Unit vector (dx, dy). The y axis grows downward.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Action index used by the networks and the search (0..4).
    pub fn index(self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }

    pub fn from_index(index: usize) -> Result<Direction, EngineError> {
        Direction::ALL
            .get(index)
            .copied()
            .ok_or(EngineError::InvalidAction(index))
    }
}

/// A single tile. A tile with `merged_into` set is a ghost: logically
/// removed from the board, retained for one tilt so a renderer can animate
/// the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub id: u32,
    pub x: u8,
    pub y: u8,
    /// Power of two.
    pub value: u32,
    /// Id of the tile that consumed this one, if any.
    pub merged_into: Option<u32>,
}

impl Tile {
    pub fn is_ghost(&self) -> bool {
        self.merged_into.is_some()
    }

    /// log2 of the tile value.
    pub fn exponent(&self) -> u32 {
        self.value.trailing_zeros()
    }
}

/// The 4x4 board: an unordered collection of tiles plus the monotonic id
/// counter. At most one non-ghost tile occupies any cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    tiles: Vec<Tile>,
    next_id: u32,
}

impl Board {
    pub fn new() -> Self {
        Board {
            tiles: Vec::new(),
            next_id: 0,
        }
    }

    /// All tiles, ghosts included (for rendering).
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn active_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter().filter(|t| !t.is_ghost())
    }

    pub fn ghost_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter().filter(|t| t.is_ghost())
    }

    pub fn tile_at(&self, x: u8, y: u8) -> Option<&Tile> {
        self.active_tiles().find(|t| t.x == x && t.y == y)
    }

    pub fn empty_cells(&self) -> Vec<(u8, u8)> {
        let mut cells = Vec::with_capacity(CELL_COUNT);
        for y in 0..GRID_SIZE as u8 {
            for x in 0..GRID_SIZE as u8 {
                if self.tile_at(x, y).is_none() {
                    cells.push((x, y));
                }
            }
        }
        cells
    }

    pub fn empty_count(&self) -> usize {
        CELL_COUNT - self.active_tiles().count()
    }

    /// Highest tile value on the board, 0 when empty.
    pub fn max_tile(&self) -> u32 {
        self.active_tiles().map(|t| t.value).max().unwrap_or(0)
    }

    pub fn max_tile_pos(&self) -> Option<(u8, u8)> {
        self.active_tiles()
            .max_by_key(|t| t.value)
            .map(|t| (t.x, t.y))
    }

    /// Active tile values as a `[y][x]` grid, 0 for empty cells.
    pub fn value_grid(&self) -> [[u32; GRID_SIZE]; GRID_SIZE] {
        let mut grid = [[0u32; GRID_SIZE]; GRID_SIZE];
        for tile in self.active_tiles() {
            grid[tile.y as usize][tile.x as usize] = tile.value;
        }
        grid
    }

    /// Sorted `(x, y, value)` set over non-ghost tiles. Two boards with
    /// equal signatures are observationally equal; a tilt whose result has
    /// the input's signature is a no-op.
    pub fn signature(&self) -> Vec<(u8, u8, u32)> {
        let mut sig: Vec<(u8, u8, u32)> = self
            .active_tiles()
            .map(|t| (t.x, t.y, t.value))
            .collect();
        sig.sort_unstable();
        sig
    }

    /// Place a tile on a known-empty cell. Returns the new tile's id.
    pub fn place_tile(&mut self, x: u8, y: u8, value: u32) -> u32 {
        debug_assert!(self.tile_at(x, y).is_none(), "cell ({x},{y}) occupied");
        let id = self.next_id;
        self.next_id += 1;
        self.tiles.push(Tile {
            id,
            x,
            y,
            value,
            merged_into: None,
        });
        id
    }

    /// Spawn a 2 (or, rarely, a 4) on a uniformly random empty cell.
    pub fn spawn_random_tile(&mut self, rng: &mut StdRng) -> Result<u32, EngineError> {
        let empty = self.empty_cells();
        if empty.is_empty() {
            return Err(EngineError::BoardFull);
        }
        let (x, y) = empty[rng.random_range(0..empty.len())];
        let value = if rng.random_range(0.0..1.0) < FOUR_SPAWN_RATE {
            4
        } else {
            2
        };
        Ok(self.place_tile(x, y, value))
    }

    /// Tilt the board one step in a direction. Pure: the input board is
    /// untouched. Ghosts from the previous tilt are dropped; tiles slide
    /// toward the wall, equal neighbors merge (at most once per tile), the
    /// gaps re-close, and freshly consumed tiles remain as ghosts pinned
    /// to their consumer's final cell.
    pub fn tilt(&self, direction: Direction) -> Board {
        let (dx, dy) = direction.offset();
        let mut tiles: Vec<Tile> = self.active_tiles().copied().collect();

        // Tiles nearest the destination wall resolve first so nothing is
        // overtaken.
        let mut order: Vec<usize> = (0..tiles.len()).collect();
        order.sort_by_key(|&i| -(tiles[i].x as i32 * dx + tiles[i].y as i32 * dy));

        slide(&mut tiles, &order, dx, dy);

        // Merge pass, same order. `has_merged` excludes a tile's own merge
        // target from further consumption.
        let mut has_merged = vec![false; tiles.len()];
        for &i in &order {
            if tiles[i].is_ghost() {
                continue;
            }
            let nx = tiles[i].x as i32 + dx;
            let ny = tiles[i].y as i32 + dy;
            if !in_bounds(nx, ny) {
                continue;
            }
            let neighbor = tiles.iter().position(|t| {
                !t.is_ghost() && t.x as i32 == nx && t.y as i32 == ny && t.id != tiles[i].id
            });
            if let Some(j) = neighbor {
                if tiles[j].value == tiles[i].value && !has_merged[j] {
                    tiles[j].merged_into = Some(tiles[i].id);
                    tiles[i].value *= 2;
                    tiles[i].x = nx as u8;
                    tiles[i].y = ny as u8;
                    has_merged[i] = true;
                }
            }
        }

        // Close the gaps the merges opened.
        slide(&mut tiles, &order, dx, dy);

        // Pin each ghost to its consumer's final cell; render-only.
        for i in 0..tiles.len() {
            if let Some(consumer_id) = tiles[i].merged_into {
                if let Some(consumer) = tiles.iter().find(|t| t.id == consumer_id) {
                    let (cx, cy) = (consumer.x, consumer.y);
                    tiles[i].x = cx;
                    tiles[i].y = cy;
                }
            }
        }

        Board {
            tiles,
            next_id: self.next_id,
        }
    }

    /// Score gained by the most recent tilt: every consumed tile's value
    /// doubled (the consumer's resulting value).
    pub fn merge_gain(&self) -> u32 {
        self.ghost_tiles().map(|t| t.value * 2).sum()
    }

    /// False while any cell is empty; on a full board, true iff no two
    /// orthogonally adjacent tiles share a value.
    pub fn is_game_over(&self) -> bool {
        if self.empty_count() > 0 {
            return false;
        }
        let grid = self.value_grid();
        for y in 0..GRID_SIZE {
            for x in 0..GRID_SIZE {
                if x + 1 < GRID_SIZE && grid[y][x] == grid[y][x + 1] {
                    return false;
                }
                if y + 1 < GRID_SIZE && grid[y][x] == grid[y + 1][x] {
                    return false;
                }
            }
        }
        true
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

fn in_bounds(x: i32, y: i32) -> bool {
    x >= 0 && y >= 0 && (x as usize) < GRID_SIZE && (y as usize) < GRID_SIZE
}

/// Slide every active tile as far as possible toward the wall, in the
/// given processing order.
fn slide(tiles: &mut [Tile], order: &[usize], dx: i32, dy: i32) {
    for &i in order {
        if tiles[i].is_ghost() {
            continue;
        }
        let (mut x, mut y) = (tiles[i].x as i32, tiles[i].y as i32);
        loop {
            let (nx, ny) = (x + dx, y + dy);
            if !in_bounds(nx, ny) {
                break;
            }
            let occupied = tiles
                .iter()
                .any(|t| !t.is_ghost() && t.x as i32 == nx && t.y as i32 == ny);
            if occupied {
                break;
            }
            x = nx;
            y = ny;
        }
        tiles[i].x = x as u8;
        tiles[i].y = y as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn board_from(cells: &[(u8, u8, u32)]) -> Board {
        let mut board = Board::new();
        for &(x, y, value) in cells {
            board.place_tile(x, y, value);
        }
        board
    }

    fn active_sorted(board: &Board) -> Vec<(u8, u8, u32)> {
        board.signature()
    }

    #[test]
    fn test_tilt_left_single_wall_tile_is_noop() {
        let board = board_from(&[(0, 0, 2)]);
        let tilted = board.tilt(Direction::Left);
        assert_eq!(board.signature(), tilted.signature());
    }

    #[test]
    fn test_tilt_slides_to_wall() {
        let board = board_from(&[(3, 2, 2)]);
        let tilted = board.tilt(Direction::Left);
        assert_eq!(active_sorted(&tilted), vec![(0, 2, 2)]);

        let tilted = board.tilt(Direction::Up);
        assert_eq!(active_sorted(&tilted), vec![(3, 0, 2)]);

        let tilted = board.tilt(Direction::Down);
        assert_eq!(active_sorted(&tilted), vec![(3, 3, 2)]);
    }

    #[test]
    fn test_equal_pair_merges_at_wallward_cell() {
        let board = board_from(&[(0, 0, 2), (1, 0, 2)]);
        let tilted = board.tilt(Direction::Left);
        assert_eq!(active_sorted(&tilted), vec![(0, 0, 4)]);

        let ghosts: Vec<&Tile> = tilted.ghost_tiles().collect();
        assert_eq!(ghosts.len(), 1);
        assert_eq!(ghosts[0].value, 2);
    }

    #[test]
    fn test_chain_of_four_produces_two_pairs() {
        let board = board_from(&[(0, 1, 2), (1, 1, 2), (2, 1, 2), (3, 1, 2)]);
        let tilted = board.tilt(Direction::Left);
        assert_eq!(active_sorted(&tilted), vec![(0, 1, 4), (1, 1, 4)]);
        assert_eq!(tilted.ghost_tiles().count(), 2);
    }

    #[test]
    fn test_merged_tile_not_consumed_again() {
        // [2, 2, 4] must become [4, 4], never [8].
        let board = board_from(&[(0, 0, 2), (1, 0, 2), (2, 0, 4)]);
        let tilted = board.tilt(Direction::Left);
        assert_eq!(active_sorted(&tilted), vec![(0, 0, 4), (1, 0, 4)]);
    }

    #[test]
    fn test_two_pairs_in_one_row() {
        let board = board_from(&[(0, 3, 2), (1, 3, 2), (2, 3, 4), (3, 3, 4)]);
        let tilted = board.tilt(Direction::Left);
        assert_eq!(active_sorted(&tilted), vec![(0, 3, 4), (1, 3, 8)]);
        assert_eq!(tilted.merge_gain(), 4 + 8);
    }

    #[test]
    fn test_merge_after_slide_across_gap() {
        let board = board_from(&[(0, 0, 2), (3, 0, 2)]);
        let tilted = board.tilt(Direction::Left);
        assert_eq!(active_sorted(&tilted), vec![(0, 0, 4)]);
    }

    #[test]
    fn test_ghost_resyncs_to_consumer_position() {
        let board = board_from(&[(0, 0, 2), (3, 0, 2)]);
        let tilted = board.tilt(Direction::Left);
        let ghost = tilted.ghost_tiles().next().expect("one ghost");
        let consumer = tilted
            .active_tiles()
            .find(|t| Some(t.id) == ghost.merged_into)
            .unwrap();
        assert_eq!((ghost.x, ghost.y), (consumer.x, consumer.y));
    }

    #[test]
    fn test_ghosts_dropped_on_next_tilt() {
        let board = board_from(&[(0, 0, 2), (1, 0, 2)]);
        let once = board.tilt(Direction::Left);
        assert_eq!(once.ghost_tiles().count(), 1);
        let twice = once.tilt(Direction::Right);
        assert_eq!(twice.ghost_tiles().count(), 0);
        assert_eq!(active_sorted(&twice), vec![(3, 0, 4)]);
    }

    #[test]
    fn test_vertical_merge_direction_up() {
        let board = board_from(&[(2, 1, 8), (2, 3, 8)]);
        let tilted = board.tilt(Direction::Up);
        assert_eq!(active_sorted(&tilted), vec![(2, 0, 16)]);
    }

    #[test]
    fn test_noop_detectable_by_signature() {
        // Fully resolved against the left wall; tilting left changes nothing.
        let board = board_from(&[(0, 0, 2), (1, 0, 4), (0, 1, 8)]);
        let tilted = board.tilt(Direction::Left);
        assert_eq!(board.signature(), tilted.signature());

        // But tilting right does.
        let tilted = board.tilt(Direction::Right);
        assert_ne!(board.signature(), tilted.signature());
    }

    #[test]
    fn test_spawn_fills_an_empty_cell() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut board = board_from(&[(0, 0, 2)]);
        let id = board.spawn_random_tile(&mut rng).unwrap();
        assert_eq!(board.active_tiles().count(), 2);
        let spawned = board.tiles().iter().find(|t| t.id == id).unwrap();
        assert!(spawned.value == 2 || spawned.value == 4);
        assert!(!(spawned.x == 0 && spawned.y == 0));
    }

    #[test]
    fn test_spawn_on_full_board_errors() {
        let mut board = Board::new();
        for y in 0..GRID_SIZE as u8 {
            for x in 0..GRID_SIZE as u8 {
                board.place_tile(x, y, 2);
            }
        }
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(
            board.spawn_random_tile(&mut rng),
            Err(EngineError::BoardFull)
        );
    }

    #[test]
    fn test_game_over_false_with_empty_cell() {
        let board = board_from(&[(0, 0, 2), (1, 0, 4)]);
        assert!(!board.is_game_over());
    }

    #[test]
    fn test_game_over_checkerboard() {
        let mut board = Board::new();
        for y in 0..GRID_SIZE as u8 {
            for x in 0..GRID_SIZE as u8 {
                let value = if (x + y) % 2 == 0 { 2 } else { 4 };
                board.place_tile(x, y, value);
            }
        }
        assert!(board.is_game_over());
    }

    #[test]
    fn test_full_board_of_twos_is_not_over() {
        let mut board = Board::new();
        for y in 0..GRID_SIZE as u8 {
            for x in 0..GRID_SIZE as u8 {
                board.place_tile(x, y, 2);
            }
        }
        assert!(!board.is_game_over());
    }

    #[test]
    fn test_direction_index_round_trip() {
        for dir in Direction::ALL {
            assert_eq!(Direction::from_index(dir.index()).unwrap(), dir);
        }
        assert_eq!(
            Direction::from_index(4),
            Err(EngineError::InvalidAction(4))
        );
    }

    #[test]
    fn test_tile_ids_are_unique_and_monotonic() {
        let mut board = Board::new();
        let a = board.place_tile(0, 0, 2);
        let b = board.place_tile(1, 0, 2);
        assert!(b > a);
        let tilted = board.tilt(Direction::Left);
        let mut next = tilted.clone();
        let c = next.place_tile(3, 3, 2);
        assert!(c > b, "id counter survives tilts");
    }

    #[test]
    fn test_max_tile_and_empty_count() {
        let board = board_from(&[(0, 0, 2), (1, 2, 64)]);
        assert_eq!(board.max_tile(), 64);
        assert_eq!(board.max_tile_pos(), Some((1, 2)));
        assert_eq!(board.empty_count(), CELL_COUNT - 2);
        assert_eq!(Board::new().max_tile(), 0);
    }
}
