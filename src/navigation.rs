use serde::{Deserialize, Serialize};

use crate::config::NavigationConfig;
use crate::geo_utils::GeoPoint;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub text: String,
    pub distance_m: f64,
    pub location: GeoPoint,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Announcement {
    Instruction(Instruction),
    /// Preview of the step after the one just announced.
    LookAhead(Instruction),
    Arrived,
}

/// Follows a route's instructions as the user moves.
///
/// `next_index` always points at the instruction to announce next; it only
/// moves forward, and it stays within `0..=instructions.len()`.
pub struct NavigationTracker {
    config: NavigationConfig,
    instructions: Vec<Instruction>,
    next_index: usize,
    active: bool,
}

impl NavigationTracker {
    pub fn new(config: NavigationConfig) -> Self {
        NavigationTracker {
            config,
            instructions: Vec::new(),
            next_index: 0,
            active: false,
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Starts following a new route. The first instruction is returned for
    /// immediate announcement and is never announced again by `on_position`.
    pub fn reset(&mut self, instructions: Vec<Instruction>) -> Option<Announcement> {
        self.instructions = instructions;
        self.next_index = 0;
        self.active = true;
        let first = self.instructions.first().cloned()?;
        self.next_index = 1;
        Some(Announcement::Instruction(first))
    }

    pub fn clear(&mut self) {
        self.instructions.clear();
        self.next_index = 0;
        self.active = false;
    }

    /// Checks the user's position against the route. Arrival is declared
    /// once the final instruction's location is within the arrival radius,
    /// either in the same update that announces it or in a later one.
    pub fn on_position(&mut self, position: &GeoPoint) -> Vec<Announcement> {
        let mut announcements = Vec::new();
        if !self.active || self.instructions.is_empty() {
            return announcements;
        }
        let last_index = self.instructions.len() - 1;

        if self.next_index > last_index {
            let distance = position.distance_m(&self.instructions[last_index].location);
            if distance < self.config.arrival_radius_m {
                self.arrive(&mut announcements);
            }
            return announcements;
        }

        let current = &self.instructions[self.next_index];
        let distance = position.distance_m(&current.location);

        if distance < self.config.announce_radius_m {
            announcements.push(Announcement::Instruction(current.clone()));
            self.next_index += 1;

            match self.instructions.get(self.next_index) {
                Some(upcoming) => {
                    if position.distance_m(&upcoming.location) < self.config.look_ahead_radius_m {
                        announcements.push(Announcement::LookAhead(upcoming.clone()));
                    }
                }
                None => {
                    if distance < self.config.arrival_radius_m {
                        self.arrive(&mut announcements);
                    }
                }
            }
        } else if self.next_index == last_index && distance < self.config.arrival_radius_m {
            // only reachable when the arrival radius is the larger one
            self.arrive(&mut announcements);
        }
        announcements
    }

    fn arrive(&mut self, announcements: &mut Vec<Announcement>) {
        info!("destination reached");
        announcements.push(Announcement::Arrived);
        self.active = false;
    }
}
