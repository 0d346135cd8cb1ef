//! Movement and collision rules for one snake on a fixed grid.

use std::collections::{HashSet, VecDeque};

use rand::Rng;

use crate::error::MoveError;
use crate::grid::{Cell, Direction, Grid};

/// Head-first, never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snake {
    body: VecDeque<Cell>,
}

impl Snake {
    pub fn new(head: Cell) -> Self {
        Self { body: VecDeque::from([head]) }
    }

    /// Builds a snake from head-first cells; `None` when `cells` is empty.
    pub fn from_cells(cells: impl IntoIterator<Item = Cell>) -> Option<Self> {
        let body: VecDeque<Cell> = cells.into_iter().collect();
        if body.is_empty() { None } else { Some(Self { body }) }
    }

    pub fn head(&self) -> Cell { self.body[0] }

    pub fn len(&self) -> usize { self.body.len() }

    pub fn contains(&self, c: Cell) -> bool { self.body.contains(&c) }

    pub fn iter(&self) -> impl Iterator<Item = &Cell> { self.body.iter() }

    pub fn to_vec(&self) -> Vec<Cell> { self.body.iter().copied().collect() }

    /// True when every cell is on `grid`, no cell repeats and at least one
    /// cell is left over for food.
    pub fn fits(&self, grid: Grid) -> bool {
        if self.len() >= grid.area() {
            return false;
        }
        let mut seen = HashSet::with_capacity(self.len());
        self.body.iter().all(|c| grid.contains(*c) && seen.insert(*c))
    }
}

/// Result of a move that did not collide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub snake: Snake,
    pub food: Cell,
    pub ate_food: bool,
}

#[derive(Copy, Clone, Debug)]
pub struct Board {
    pub grid: Grid,
    /// Random draws tried before falling back to a scan of the free cells.
    pub food_retry_cap: usize,
}

impl Board {
    pub fn new(grid: Grid, food_retry_cap: usize) -> Self {
        Self { grid, food_retry_cap }
    }

    /// Moves the snake one cell towards `direction`.
    ///
    /// The tail cell is treated as free when no food is eaten, since it is
    /// vacated on the same tick the head moves.
    pub fn advance<R: Rng + ?Sized>(
        &self,
        snake: &Snake,
        direction: Direction,
        food: Cell,
        rng: &mut R,
    ) -> Result<Step, MoveError> {
        let new_head = snake.head().step(direction);
        if !self.grid.contains(new_head) {
            return Err(MoveError::WallCollision);
        }

        let ate_food = new_head == food;
        let occupied = if ate_food { snake.len() } else { snake.len() - 1 };
        if snake.body.iter().take(occupied).any(|c| *c == new_head) {
            return Err(MoveError::SelfCollision);
        }

        let mut body = snake.body.clone();
        body.push_front(new_head);
        if !ate_food {
            body.pop_back();
        }
        let snake = Snake { body };

        let food = if ate_food { self.spawn_food(&snake, rng)? } else { food };
        Ok(Step { snake, food, ate_food })
    }

    /// Picks a cell not covered by `snake`.
    pub fn spawn_food<R: Rng + ?Sized>(&self, snake: &Snake, rng: &mut R) -> Result<Cell, MoveError> {
        for _ in 0..self.food_retry_cap {
            let cell = Cell::new(rng.gen_range(0..self.grid.width), rng.gen_range(0..self.grid.height));
            if !snake.contains(cell) {
                return Ok(cell);
            }
        }
        // Crowded board: choose among what is left.
        let free: Vec<Cell> = self.grid.cells().filter(|c| !snake.contains(*c)).collect();
        if free.is_empty() {
            return Err(MoveError::BoardFull);
        }
        Ok(free[rng.gen_range(0..free.len())])
    }
}
