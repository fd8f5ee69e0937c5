//! # Navigator
//!
//! Per-agent path following.
//!
//! The navigator never moves anything itself: each tick it advances its own
//! pending search, consumes waypoints the agent has reached and reports a
//! velocity. Applying that velocity, and telling the navigator where the
//! agent ended up, is the caller's job.

use crate::{CollisionWorld, NavigatorConfig, PathPoll, PathRequest, Pathfinder, Vec3};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Distance under which an agent closing in on its goal snaps onto it.
const ARRIVAL_EPSILON: f32 = 0.01;

/// What the navigator is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavState {
    /// No usable path and nothing in flight
    NeedsPath,
    /// A path search is in flight
    Requesting,
    /// Steering along a path
    Following,
}

/// Notifications published by a navigator, drained by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavEvent {
    /// A new path arrived
    PathUpdated { waypoints: usize },
    /// The look-ahead waypoint was reached and consumed
    ReachedNode { remaining: usize },
    /// The last request finished without a path
    PathFailed,
}

/// Path-following state for one agent.
#[derive(Debug, Clone)]
pub struct Navigator {
    config: NavigatorConfig,
    position: Vec3,
    /// Last goal a path was found for
    goal: Vec3,
    pending_goal: Option<Vec3>,
    path: Option<Vec<Vec3>>,
    /// Closing in on `goal` directly rather than following a path
    requesting: bool,
    request: Option<PathRequest>,
    velocity: Vec3,
    events: VecDeque<NavEvent>,
}

impl Navigator {
    /// Creates an idle navigator for an agent at `position`.
    pub fn new(position: Vec3, config: NavigatorConfig) -> Self {
        Self {
            config,
            position,
            goal: position,
            pending_goal: None,
            path: None,
            requesting: false,
            request: None,
            velocity: Vec3::zero(),
            events: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Updates the agent position after the caller has integrated movement.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn goal(&self) -> Vec3 {
        self.goal
    }

    /// Velocity computed on the last tick.
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Remaining waypoints, if any.
    pub fn path(&self) -> Option<&[Vec3]> {
        self.path.as_deref()
    }

    /// True when there is no path or it is too short to reach the look-ahead index.
    pub fn needs_path(&self) -> bool {
        self.path
            .as_ref()
            .map_or(true, |path| path.len() <= self.config.look_ahead)
    }

    pub fn state(&self) -> NavState {
        if self.request.is_some() {
            NavState::Requesting
        } else if !self.needs_path() && !self.requesting {
            NavState::Following
        } else {
            NavState::NeedsPath
        }
    }

    /// Starts planning toward `goal`, cancelling any search already in flight.
    ///
    /// The current path is dropped; until the new one arrives the agent closes
    /// in on its previous goal.
    pub fn navigate_to(&mut self, goal: Vec3, pathfinder: &Pathfinder) {
        self.end_navigation();
        self.path = None;
        self.requesting = true;

        let start = self.position.round();
        info!("Navigating from {start:?} to {goal:?}");
        self.request = Some(pathfinder.find_path(start, goal));
        self.pending_goal = Some(goal);
    }

    /// Installs a path computed elsewhere.
    pub fn return_path(&mut self, path: Vec<Vec3>) {
        self.events.push_back(NavEvent::PathUpdated {
            waypoints: path.len(),
        });
        self.path = Some(path);
    }

    /// Cancels the in-flight search, if any. The current path is left as it is.
    pub fn end_navigation(&mut self) {
        if self.request.take().is_some() {
            debug!("Cancelled in-flight path request");
        }
        self.pending_goal = None;
    }

    /// Runs one scheduler tick and returns the new velocity.
    pub fn tick<R: Rng + ?Sized>(&mut self, pathfinder: &Pathfinder, rng: &mut R) -> Vec3 {
        self.poll_request(pathfinder, rng);
        self.update_path();
        self.update_vector();
        self.velocity
    }

    /// Advances the pending search by one poll.
    pub fn poll_request<R: Rng + ?Sized>(&mut self, pathfinder: &Pathfinder, rng: &mut R) {
        let Some(request) = self.request.as_mut() else {
            return;
        };

        match request.poll(pathfinder, rng) {
            PathPoll::Pending => {}
            PathPoll::Ready(Some(path)) => {
                self.request = None;
                self.return_path(path);
                if let Some(goal) = self.pending_goal.take() {
                    self.goal = goal;
                }
                self.requesting = false;
            }
            PathPoll::Ready(None) => {
                self.request = None;
                self.pending_goal = None;
                info!("Pathfinding failed");
                self.events.push_back(NavEvent::PathFailed);
            }
        }
    }

    /// Consumes the path prefix once the look-ahead waypoint is within leeway.
    pub fn update_path(&mut self) {
        if self.needs_path() {
            return;
        }
        let look_ahead = self.config.look_ahead;
        let Some(path) = self.path.as_mut() else {
            return;
        };

        if self.position.distance(path[look_ahead]) < self.config.leeway {
            let consumed = (look_ahead + 1).min(path.len().saturating_sub(1)).max(1);
            path.drain(..consumed);
            let remaining = path.len();
            self.events.push_back(NavEvent::ReachedNode { remaining });
        }
    }

    /// Recomputes the velocity from the current state.
    pub fn update_vector(&mut self) {
        let inertia = self.config.inertia;

        let target = if !self.needs_path() && !self.requesting {
            match self.path.as_ref() {
                Some(path) => (path[self.config.look_ahead] - self.position).normalized(),
                None => Vec3::zero(),
            }
        } else if self.requesting {
            let to_goal = self.goal - self.position;
            let distance = to_goal.length();
            if distance > inertia {
                to_goal.normalized()
            } else if distance < ARRIVAL_EPSILON {
                self.position = self.goal;
                Vec3::zero()
            } else {
                to_goal
            }
        } else {
            Vec3::zero()
        };

        self.velocity = target * inertia;
    }

    /// Takes every event published since the last drain.
    pub fn drain_events(&mut self) -> Vec<NavEvent> {
        self.events.drain(..).collect()
    }

    /// Checks for an unobstructed line from the agent to `target`.
    pub fn has_line_of_sight_on<W: CollisionWorld + ?Sized>(&self, target: Vec3, world: &W) -> bool {
        let direction = target - self.position;
        let distance = direction.length();
        !world.raycast(self.position, direction, distance)
    }

    /// Line segments along the remaining path, for debug drawing.
    pub fn debug_segments(&self) -> Vec<(Vec3, Vec3)> {
        match &self.path {
            Some(path) if !self.needs_path() => {
                path.windows(2).map(|pair| (pair[0], pair[1])).collect()
            }
            _ => Vec::new(),
        }
    }
}
