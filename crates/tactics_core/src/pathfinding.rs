//! TU-optimal route search over the tile grid.
//!
//! Two searches share one node arena sized to the grid:
//! - [`Pathfinding::calculate_path`] is A* towards a single goal, with a
//!   horizontal straight-line heuristic in fixed-point.
//! - [`Pathfinding::find_reachable`] is a Dijkstra sweep bounded by a TU
//!   budget, used by the AI to bound candidate tiles.
//!
//! The frontier is a binary heap. Entries are never removed when a node
//! improves; the stale entry is skipped when it is popped. Ties in the
//! estimated total are broken by insertion order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::battlefield::Battlefield;
use crate::config::PathfindingConfig;
use crate::data::{Crossing, DoorKind, PartSlot, TilePart};
use crate::geometry::{Direction, Fixed, Position};
use crate::grid::{TileGrid, STAIR_TERRAIN_LEVEL};
use crate::unit::{MovementType, Unit, UnitId};

/// Cost of crossing a tile that has no floor part to price it.
pub const OPEN_GROUND_COST: u32 = 4;

/// Search variations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathOptions {
    /// Give up on routes dearer than this.
    pub tu_cap: Option<u32>,
    /// Price burning and danger-marked tiles up.
    pub avoid_hazards: bool,
    /// Route a guided projectile: always flies and may end on an occupied
    /// tile.
    pub missile: bool,
}

impl PathOptions {
    /// Cap the route cost.
    #[must_use]
    pub const fn capped(tu: u32) -> Self {
        Self {
            tu_cap: Some(tu),
            avoid_hazards: false,
            missile: false,
        }
    }

    /// Options for a guided projectile.
    #[must_use]
    pub const fn missile() -> Self {
        Self {
            tu_cap: None,
            avoid_hazards: false,
            missile: true,
        }
    }
}

/// A single legal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    /// Direction of the step.
    pub direction: Direction,
    /// Where the mover ends up, after any stair lift or fall.
    pub position: Position,
    /// TU spent on this step.
    pub tu: u32,
}

/// A complete route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Starting tile.
    pub start: Position,
    /// Steps in order.
    pub steps: Vec<PathStep>,
    /// Total TU.
    pub tu_cost: u32,
}

impl Route {
    /// Final tile.
    #[must_use]
    pub fn destination(&self) -> Position {
        self.steps.last().map_or(self.start, |s| s.position)
    }

    /// Step directions in order.
    #[must_use]
    pub fn directions(&self) -> Vec<Direction> {
        self.steps.iter().map(|s| s.direction).collect()
    }

    /// Every tile visited, start included.
    #[must_use]
    pub fn positions(&self) -> Vec<Position> {
        std::iter::once(self.start)
            .chain(self.steps.iter().map(|s| s.position))
            .collect()
    }
}

/// Per-tile search state.
#[derive(Debug, Clone, Copy)]
struct PathNode {
    visited: bool,
    cost: u32,
    heuristic: Fixed,
    prev: Option<usize>,
    prev_dir: Option<Direction>,
}

impl PathNode {
    const UNREACHED: Self = Self {
        visited: false,
        cost: u32::MAX,
        heuristic: Fixed::ZERO,
        prev: None,
        prev_dir: None,
    };
}

/// A node in the open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct FrontierEntry {
    node: usize,
    cost: u32,
    /// Cost so far plus heuristic.
    estimate: Fixed,
    /// Insertion sequence; lower pops first on equal estimates.
    tie_breaker: u64,
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse both keys for min-first FIFO.
        match other.estimate.cmp(&self.estimate) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Everything a step evaluation needs to know about the mover.
struct Mover<'a> {
    grid: &'a TileGrid,
    config: &'a PathfindingConfig,
    id: UnitId,
    movement: MovementType,
    size: i32,
    options: PathOptions,
    goal: Option<Position>,
}

impl<'a> Mover<'a> {
    fn new(battlefield: &'a Battlefield, unit: &Unit, options: PathOptions) -> Self {
        let (movement, size) = if options.missile {
            (MovementType::Fly, 1)
        } else {
            (unit.movement, unit.size.max(1))
        };
        Self {
            grid: &battlefield.grid,
            config: &battlefield.config.pathfinding,
            id: unit.id,
            movement,
            size,
            options,
            goal: None,
        }
    }

    fn footprint(&self, origin: Position) -> impl Iterator<Item = Position> {
        let size = self.size;
        (0..size).flat_map(move |dy| {
            (0..size).map(move |dx| Position::new(origin.x + dx, origin.y + dy, origin.z))
        })
    }

    fn impassable(&self, part: &TilePart) -> bool {
        part.is_impassable(self.movement, self.config.impassable_cost)
    }

    /// Whether the mover's body fits in a tile: in the grid, no solid
    /// object, no other unit.
    fn fits(&self, pos: Position, final_tile: bool) -> bool {
        let Some(tile) = self.grid.tile(pos) else {
            return false;
        };
        if let Some(object) = self.grid.part(pos, PartSlot::Object) {
            if object.big_wall.fills_tile() || self.impassable(object) {
                return false;
            }
        }
        match tile.unit {
            Some(other) if other != self.id => self.options.missile && final_tile,
            _ => true,
        }
    }

    /// Extra cost of crossing an edge wall; `None` when it cannot be crossed.
    fn wall_cost(&self, part: Option<&TilePart>) -> Option<u32> {
        let Some(part) = part else {
            return Some(0);
        };
        if part.door != DoorKind::None {
            return (!self.options.missile).then_some(self.config.door_cost);
        }
        if self.impassable(part) {
            None
        } else {
            Some(part.tu.get(self.movement))
        }
    }

    /// Wall and big-wall cost of one orthogonal step, ignoring units.
    fn orthogonal_passage(&self, from: Position, direction: Direction) -> Option<u32> {
        let to = from.step(direction);
        if !self.grid.in_bounds(to) {
            return None;
        }
        let leaving = self.grid.big_wall(from);
        let entering = self.grid.big_wall(to);
        if leaving.obstructs(direction, Crossing::Leaving)
            || entering.obstructs(direction, Crossing::Entering)
        {
            return None;
        }
        if let Some(object) = self.grid.part(to, PartSlot::Object) {
            if self.impassable(object) {
                return None;
            }
        }
        self.wall_cost(self.grid.wall_between(from, direction))
    }

    /// Price of standing in a tile.
    fn tile_cost(&self, pos: Position) -> u32 {
        let floor = self
            .grid
            .part(pos, PartSlot::Floor)
            .map_or(OPEN_GROUND_COST, |p| p.tu.get(self.movement));
        let object = self
            .grid
            .part(pos, PartSlot::Object)
            .map_or(0, |p| p.tu.get(self.movement));
        let mut cost = floor + object;
        if self.options.avoid_hazards {
            if let Some(tile) = self.grid.tile(pos) {
                if tile.fire > 0 || tile.is_dangerous() {
                    cost += self.config.hazard_penalty;
                }
            }
        }
        cost
    }

    fn falls(&self) -> bool {
        self.movement != MovementType::Fly
    }

    /// Evaluate one step from a footprint origin.
    fn step(&self, from: Position, direction: Direction) -> Option<PathStep> {
        let (to, tu) = if direction.is_vertical() {
            self.vertical_step(from, direction)?
        } else {
            self.horizontal_step(from, direction)?
        };
        Some(PathStep {
            direction,
            position: to,
            tu,
        })
    }

    fn horizontal_step(&self, from: Position, direction: Direction) -> Option<(Position, u32)> {
        let origin = from.step(direction);
        let mut extra = 0;
        let mut worst_tile = 0;

        for tile in self.footprint(from) {
            let target = tile.step(direction);
            let final_tile = self.goal == Some(origin);
            if !self.fits(target, final_tile) {
                return None;
            }
            let crossing = if direction.is_diagonal() {
                self.diagonal_passage(tile, direction)?
            } else {
                self.orthogonal_passage(tile, direction)?
            };
            extra = extra.max(crossing);
            worst_tile = worst_tile.max(self.tile_cost(target));
        }

        let mut tu = worst_tile + extra;
        if direction.is_diagonal() {
            tu = tu * self.config.diagonal_numerator / 2;
        }
        if tu >= self.config.impassable_cost {
            return None;
        }

        let landing = self.settle(origin)?;
        Some((landing, tu))
    }

    /// A diagonal step is allowed only when both orthogonal detours around
    /// the corner are open and door-free.
    fn diagonal_passage(&self, from: Position, direction: Direction) -> Option<u32> {
        let (a, b) = direction.components();
        let mid_a = from.step(a);
        let mid_b = from.step(b);
        let legs = [
            self.orthogonal_passage(from, a)?,
            self.orthogonal_passage(mid_a, b)?,
            self.orthogonal_passage(from, b)?,
            self.orthogonal_passage(mid_b, a)?,
        ];
        let leaving = self.grid.big_wall(from);
        let entering = self.grid.big_wall(from.step(direction));
        if leaving.obstructs(direction, Crossing::Leaving)
            || entering.obstructs(direction, Crossing::Entering)
        {
            return None;
        }
        let door = self.config.door_cost;
        if door > 0 && legs.iter().any(|&c| c >= door) {
            return None;
        }
        Some(legs.into_iter().max().unwrap_or(0))
    }

    /// Apply stairs and gravity to a tile the mover stepped into.
    fn settle(&self, origin: Position) -> Option<Position> {
        if !self.falls() {
            return Some(origin);
        }
        if self.size == 1 && self.grid.terrain_level(origin) <= STAIR_TERRAIN_LEVEL {
            let above = origin.step(Direction::Up);
            if self.grid.in_bounds(above)
                && self.grid.part(above, PartSlot::Floor).is_none()
                && self.fits(above, self.goal == Some(above))
            {
                return Some(above);
            }
            return Some(origin);
        }
        let mut landing = origin;
        while landing.z > 0 && self.footprint(landing).all(|p| !self.grid.has_support(p)) {
            let below = landing.step(Direction::Down);
            if !self.footprint(below).all(|p| self.fits(p, self.goal == Some(below))) {
                return None;
            }
            landing = below;
        }
        Some(landing)
    }

    fn vertical_step(&self, from: Position, direction: Direction) -> Option<(Position, u32)> {
        let to = from.step(direction);
        for tile in self.footprint(from) {
            let target = tile.step(direction);
            if !self.grid.in_bounds(target) || !self.fits(target, self.goal == Some(to)) {
                return None;
            }
            let floor = self.grid.floor_between(tile, direction);
            let allowed = match self.movement {
                MovementType::Fly => floor.map_or(true, |f| f.grav_lift),
                MovementType::Walk | MovementType::Slide => {
                    let here = self.grid.part(tile, PartSlot::Floor);
                    let there = self.grid.part(target, PartSlot::Floor);
                    self.size == 1
                        && here.is_some_and(|f| f.grav_lift)
                        && there.is_some_and(|f| f.grav_lift)
                }
            };
            if !allowed {
                return None;
            }
        }
        Some((to, self.config.vertical_cost))
    }

    fn heuristic(&self, from: Position) -> Fixed {
        self.goal.map_or(Fixed::ZERO, |goal| {
            from.distance_fixed(goal) * Fixed::from_num(self.config.heuristic_scale)
        })
    }
}

/// Route search state, reused across searches.
#[derive(Debug, Clone, Default)]
pub struct Pathfinding {
    nodes: Vec<PathNode>,
    route: VecDeque<PathStep>,
    route_start: Position,
    expanded: usize,
}

impl Pathfinding {
    /// Create an empty pathfinder; the node arena grows on first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, tile_count: usize) {
        self.nodes.clear();
        self.nodes.resize(tile_count, PathNode::UNREACHED);
        self.expanded = 0;
    }

    /// Evaluate a single step for a unit, as the searches do.
    #[must_use]
    pub fn step_cost(
        battlefield: &Battlefield,
        unit: &Unit,
        from: Position,
        direction: Direction,
        options: PathOptions,
    ) -> Option<PathStep> {
        Mover::new(battlefield, unit, options).step(from, direction)
    }

    /// Find the cheapest route for `unit` to `goal`.
    ///
    /// Returns `None` when the goal is outside the grid, occupied or
    /// blocked, unreachable, or dearer than the cap. On success the route
    /// is also kept for [`Pathfinding::dequeue_step`].
    pub fn calculate_path(
        &mut self,
        battlefield: &Battlefield,
        unit: &Unit,
        goal: Position,
        options: PathOptions,
    ) -> Option<Route> {
        self.abort_path();
        let mut mover = Mover::new(battlefield, unit, options);
        mover.goal = Some(goal);
        let grid = &battlefield.grid;
        let start = unit.position;
        self.route_start = start;

        let goal_index = grid.index_of(goal)?;
        let start_index = grid.index_of(start)?;
        if !mover.footprint(goal).all(|p| mover.fits(p, true)) {
            debug!("Path {} -> {}: goal blocked", start, goal);
            return None;
        }

        self.reset(grid.tile_count());
        if !self.search(&mover, start_index, Some(goal_index), options.tu_cap) {
            debug!(
                "Path {} -> {}: no route ({} nodes expanded)",
                start, goal, self.expanded
            );
            return None;
        }

        let steps = self.trace_back(&mover, start_index, goal_index);
        let tu_cost = self.nodes[goal_index].cost;
        debug!(
            "Path {} -> {}: {} steps, {} TU, {} nodes expanded",
            start,
            goal,
            steps.len(),
            tu_cost,
            self.expanded
        );
        self.route = steps.iter().copied().collect();
        Some(Route {
            start,
            steps,
            tu_cost,
        })
    }

    /// Every tile `unit` can reach within `budget` TU, in the order the
    /// search settled them (start first).
    pub fn find_reachable(
        &mut self,
        battlefield: &Battlefield,
        unit: &Unit,
        budget: u32,
        options: PathOptions,
    ) -> Vec<usize> {
        let mover = Mover::new(battlefield, unit, options);
        let grid = &battlefield.grid;
        let Some(start_index) = grid.index_of(unit.position) else {
            return Vec::new();
        };
        self.reset(grid.tile_count());
        self.search(&mover, start_index, None, Some(budget));

        let mut settled: Vec<(u32, usize)> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.visited)
            .map(|(i, n)| (n.cost, i))
            .collect();
        settled.sort_unstable();
        trace!(
            "Reachable from {} within {} TU: {} tiles",
            unit.position,
            budget,
            settled.len()
        );
        settled.into_iter().map(|(_, i)| i).collect()
    }

    /// TU cost to a tile found by the last search, if it was reached.
    #[must_use]
    pub fn cost_to(&self, index: usize) -> Option<u32> {
        self.nodes
            .get(index)
            .filter(|n| n.visited)
            .map(|n| n.cost)
    }

    /// Nodes expanded by the last search.
    #[must_use]
    pub const fn nodes_expanded(&self) -> usize {
        self.expanded
    }

    /// Core best-first loop. Returns whether the goal was settled.
    fn search(
        &mut self,
        mover: &Mover<'_>,
        start: usize,
        goal: Option<usize>,
        cap: Option<u32>,
    ) -> bool {
        let grid = mover.grid;
        let mut open: BinaryHeap<FrontierEntry> = BinaryHeap::new();
        let mut sequence: u64 = 0;

        let start_pos = grid.position_of(start);
        self.nodes[start].cost = 0;
        self.nodes[start].heuristic = mover.heuristic(start_pos);
        open.push(FrontierEntry {
            node: start,
            cost: 0,
            estimate: self.nodes[start].heuristic,
            tie_breaker: sequence,
        });

        while let Some(entry) = open.pop() {
            let node = self.nodes[entry.node];
            if entry.cost != node.cost {
                // Stale: the node was improved after this entry was pushed.
                continue;
            }
            self.nodes[entry.node].visited = true;
            self.expanded += 1;
            if goal == Some(entry.node) {
                return true;
            }

            let here = grid.position_of(entry.node);
            for direction in Direction::ALL {
                let Some(step) = mover.step(here, direction) else {
                    continue;
                };
                let cost = node.cost + step.tu;
                if cap.is_some_and(|cap| cost > cap) {
                    continue;
                }
                let Some(next) = grid.index_of(step.position) else {
                    continue;
                };
                if cost >= self.nodes[next].cost {
                    continue;
                }
                let heuristic = mover.heuristic(step.position);
                self.nodes[next] = PathNode {
                    visited: false,
                    cost,
                    heuristic,
                    prev: Some(entry.node),
                    prev_dir: Some(direction),
                };
                sequence += 1;
                open.push(FrontierEntry {
                    node: next,
                    cost,
                    estimate: Fixed::from_num(cost) + heuristic,
                    tie_breaker: sequence,
                });
            }
        }
        false
    }

    fn trace_back(&self, mover: &Mover<'_>, start: usize, goal: usize) -> Vec<PathStep> {
        let mut steps = Vec::new();
        let mut current = goal;
        while current != start {
            let node = self.nodes[current];
            let (Some(prev), Some(direction)) = (node.prev, node.prev_dir) else {
                break;
            };
            steps.push(PathStep {
                direction,
                position: mover.grid.position_of(current),
                tu: node.cost - self.nodes[prev].cost,
            });
            current = prev;
        }
        steps.reverse();
        steps
    }

    /// Pop the next step of the stored route.
    pub fn dequeue_step(&mut self) -> Option<Direction> {
        self.route.pop_front().map(|s| s.direction)
    }

    /// Forget the stored route.
    pub fn abort_path(&mut self) {
        self.route.clear();
    }

    /// Remaining stored steps.
    #[must_use]
    pub fn remaining_steps(&self) -> usize {
        self.route.len()
    }

    /// Tiles the remaining stored route passes through, in order.
    #[must_use]
    pub fn route_positions(&self) -> Vec<Position> {
        self.route.iter().map(|s| s.position).collect()
    }

    /// Start tile of the last path search.
    #[must_use]
    pub const fn route_start(&self) -> Position {
        self.route_start
    }
}
