//! # Incremental A* Search
//!
//! Grid A* over an [`OccupancyGrid`], 6-connected with unit edge cost.
//!
//! The search is a resumable state object: each call to
//! [`AStarSearch::step`] performs a bounded number of expansions and then
//! hands control back, so a scheduler can spread one search over several
//! ticks. Every search owns its own node arena; nothing is shared between
//! searches except the read-only grid.
//!
//! The heuristic is Manhattan distance minus a uniform random value in
//! `[0, 10)`, drawn again on every evaluation. The noise diversifies paths
//! across agents at the cost of strict admissibility, so returned paths are
//! not guaranteed to be shortest. It can be switched off for deterministic
//! results.

use crate::{config, OccupancyGrid, Vec3i};
use log::debug;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Upper bound (exclusive) of the random value subtracted from the heuristic.
pub const HEURISTIC_NOISE: f32 = 10.0;

/// Per-cell bookkeeping for one search.
#[derive(Debug, Clone)]
pub struct SearchNode {
    pub coord: Vec3i,
    pub passable: bool,
    /// Cost from the start cell
    pub g: i32,
    /// Heuristic estimate to the goal
    pub h: f32,
    /// Arena index of the predecessor on the best known path
    pub parent: Option<usize>,
    pub open: bool,
    pub closed: bool,
}

impl SearchNode {
    fn new(coord: Vec3i, passable: bool) -> Self {
        Self {
            coord,
            passable,
            g: i32::MAX / 2,
            h: 0.0,
            parent: None,
            open: false,
            closed: false,
        }
    }

    /// Total estimated cost through this node.
    pub fn f(&self) -> f32 {
        self.g as f32 + self.h
    }
}

/// Why a search gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFailure {
    /// The open set ran dry before the goal was reached
    Unreachable,
    /// Too many expansions
    ExpansionLimit,
    /// The open set grew past its cap
    OpenSetLimit,
    /// `step` was called again after the search had already finished
    AlreadyFinished,
}

/// Result of one [`AStarSearch::step`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchProgress {
    /// Budget for this tick used up; call `step` again later
    Pending,
    /// Cells from start to goal, both inclusive
    Found(Vec<Vec3i>),
    /// No path; the caller should idle or retry later
    Failed(SearchFailure),
}

/// Open-set entry ordered so that `BinaryHeap` pops the lowest F first.
#[derive(Debug, Clone)]
struct OpenEntry {
    node: usize,
    f: f32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior in BinaryHeap
        other.f.partial_cmp(&self.f).unwrap_or(Ordering::Equal)
    }
}

/// A single in-flight A* search.
#[derive(Debug, Clone)]
pub struct AStarSearch {
    start: Vec3i,
    goal: Vec3i,
    /// Expansions per `step` call
    speed: u32,
    perturbation: bool,
    nodes: Vec<SearchNode>,
    index: HashMap<Vec3i, usize>,
    open: BinaryHeap<OpenEntry>,
    /// Nodes currently open; the heap may also hold stale entries
    open_count: usize,
    expansions: u32,
    finished: bool,
}

impl AStarSearch {
    /// Prepares a search from `start` to `goal`.
    ///
    /// The start cell is always treated as passable. `speed` is clamped to at least 1.
    pub fn new(start: Vec3i, goal: Vec3i, speed: u32, perturbation: bool) -> Self {
        Self {
            start,
            goal,
            speed: speed.max(1),
            perturbation,
            nodes: Vec::new(),
            index: HashMap::new(),
            open: BinaryHeap::new(),
            open_count: 0,
            expansions: 0,
            finished: false,
        }
    }

    pub fn start(&self) -> Vec3i {
        self.start
    }

    pub fn goal(&self) -> Vec3i {
        self.goal
    }

    /// Total expansions performed so far.
    pub fn expansions(&self) -> u32 {
        self.expansions
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of nodes currently in the open set.
    pub fn open_len(&self) -> usize {
        self.open_count
    }

    fn heuristic<R: Rng + ?Sized>(&self, coord: Vec3i, rng: &mut R) -> f32 {
        let distance = coord.manhattan_distance(self.goal) as f32;
        if self.perturbation {
            distance - rng.gen_range(0.0..HEURISTIC_NOISE)
        } else {
            distance
        }
    }

    fn node_at(&mut self, coord: Vec3i, grid: &OccupancyGrid) -> usize {
        if let Some(&index) = self.index.get(&coord) {
            return index;
        }
        let index = self.nodes.len();
        self.nodes.push(SearchNode::new(coord, !grid.is_obstructed(coord)));
        self.index.insert(coord, index);
        index
    }

    fn seed<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let h = self.heuristic(self.start, rng);
        let mut node = SearchNode::new(self.start, true);
        node.g = 0;
        node.h = h;
        node.open = true;

        self.open.push(OpenEntry { node: 0, f: node.f() });
        self.open_count = 1;
        self.nodes.push(node);
        self.index.insert(self.start, 0);
    }

    fn finish(&mut self, progress: SearchProgress) -> SearchProgress {
        self.finished = true;
        self.nodes.clear();
        self.index.clear();
        self.open.clear();
        self.open_count = 0;
        progress
    }

    fn reconstruct(&self, mut node: usize) -> Vec<Vec3i> {
        let mut path = vec![self.nodes[node].coord];
        while let Some(parent) = self.nodes[node].parent {
            path.push(self.nodes[parent].coord);
            node = parent;
        }
        path.reverse();
        path
    }

    /// Runs up to `speed` expansions.
    pub fn step<R: Rng + ?Sized>(&mut self, grid: &OccupancyGrid, rng: &mut R) -> SearchProgress {
        if self.finished {
            return SearchProgress::Failed(SearchFailure::AlreadyFinished);
        }
        if self.nodes.is_empty() {
            self.seed(rng);
        }

        for _ in 0..self.speed {
            if self.expansions >= config::ASTAR_EXPANSION_LIMIT {
                debug!("A* {:?} -> {:?} hit the expansion limit", self.start, self.goal);
                return self.finish(SearchProgress::Failed(SearchFailure::ExpansionLimit));
            }
            if self.open_count > config::ASTAR_OPEN_SET_LIMIT {
                debug!("A* {:?} -> {:?} hit the open set limit", self.start, self.goal);
                return self.finish(SearchProgress::Failed(SearchFailure::OpenSetLimit));
            }

            let Some(entry) = self.pop_open() else {
                debug!("A* {:?} -> {:?}: goal unreachable", self.start, self.goal);
                return self.finish(SearchProgress::Failed(SearchFailure::Unreachable));
            };
            self.expansions += 1;

            let current = entry.node;
            self.nodes[current].open = false;
            self.nodes[current].closed = true;
            self.open_count -= 1;

            if self.nodes[current].coord == self.goal {
                let path = self.reconstruct(current);
                debug!(
                    "A* {:?} -> {:?}: {} cells after {} expansions",
                    self.start,
                    self.goal,
                    path.len(),
                    self.expansions
                );
                return self.finish(SearchProgress::Found(path));
            }

            let coord = self.nodes[current].coord;
            let tentative_g = self.nodes[current].g + 1;

            for neighbor_coord in coord.face_neighbors() {
                if !grid.is_in_bounds(neighbor_coord) {
                    continue;
                }
                let neighbor = self.node_at(neighbor_coord, grid);
                if self.nodes[neighbor].closed || !self.nodes[neighbor].passable {
                    continue;
                }

                if !self.nodes[neighbor].open {
                    let h = self.heuristic(neighbor_coord, rng);
                    let node = &mut self.nodes[neighbor];
                    node.parent = Some(current);
                    node.g = tentative_g;
                    node.h = h;
                    node.open = true;
                    let f = node.f();
                    self.open.push(OpenEntry { node: neighbor, f });
                    self.open_count += 1;
                } else if tentative_g < self.nodes[neighbor].g {
                    let h = self.heuristic(neighbor_coord, rng);
                    let node = &mut self.nodes[neighbor];
                    node.parent = Some(current);
                    node.g = tentative_g;
                    node.h = h;
                    let f = node.f();
                    self.open.push(OpenEntry { node: neighbor, f });
                }
            }
        }

        SearchProgress::Pending
    }

    /// Pops the best open entry, skipping stale duplicates of closed nodes.
    fn pop_open(&mut self) -> Option<OpenEntry> {
        while let Some(entry) = self.open.pop() {
            if !self.nodes[entry.node].closed {
                return Some(entry);
            }
        }
        None
    }

    /// Steps until the search finishes.
    pub fn run<R: Rng + ?Sized>(&mut self, grid: &OccupancyGrid, rng: &mut R) -> Option<Vec<Vec3i>> {
        loop {
            match self.step(grid, rng) {
                SearchProgress::Pending => continue,
                SearchProgress::Found(path) => return Some(path),
                SearchProgress::Failed(_) => return None,
            }
        }
    }
}
