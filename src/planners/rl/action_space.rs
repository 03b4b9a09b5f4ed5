//! The eight compass headings a robot can be nudged in, and which of them are safe.

use crate::infra::Point;
use crate::state::{Facility, Robot, RobotSnapshot};

pub const ACTION_COUNT: usize = 8;

/// Screen-style headings: y grows towards the floor, so North is `(0, -1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Heading {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Heading {
    pub const ALL: [Heading; ACTION_COUNT] = [
        Heading::North,
        Heading::NorthEast,
        Heading::East,
        Heading::SouthEast,
        Heading::South,
        Heading::SouthWest,
        Heading::West,
        Heading::NorthWest,
    ];

    pub fn from_index(index: usize) -> Option<Heading> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn unit(self) -> (f64, f64) {
        match self {
            Heading::North => (0.0, -1.0),
            Heading::NorthEast => (1.0, -1.0),
            Heading::East => (1.0, 0.0),
            Heading::SouthEast => (1.0, 1.0),
            Heading::South => (0.0, 1.0),
            Heading::SouthWest => (-1.0, 1.0),
            Heading::West => (-1.0, 0.0),
            Heading::NorthWest => (-1.0, -1.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionSpace {
    /// Multiplier applied to the heading's unit components
    pub step: f64,
}

impl Default for ActionSpace {
    fn default() -> Self {
        Self { step: 2.0 }
    }
}

impl ActionSpace {
    pub fn displacement(&self, heading: Heading) -> (f64, f64) {
        let (dx, dy) = heading.unit();
        (dx * self.step, dy * self.step)
    }

    pub fn apply(&self, position: Point, heading: Heading) -> Point {
        let (dx, dy) = self.displacement(heading);
        Point::new(position.x + dx, position.y + dy)
    }

    /// Headings that keep the robot inside the world, out of obstacles and
    /// clear of other robots. All eight when none qualifies.
    pub fn valid_actions(&self, robot: &Robot, facility: &Facility, others: &[RobotSnapshot]) -> Vec<usize> {
        let valid: Vec<usize> = Heading::ALL
            .iter()
            .filter(|&&heading| {
                let next = self.apply(robot.position, heading);
                facility.in_bounds(&next)
                    && !facility.hits_obstacle(&next)
                    && others
                        .iter()
                        .filter(|other| other.id != robot.id)
                        .all(|other| next.distance(&other.position) >= 2.0 * robot.radius)
            })
            .map(|heading| heading.index())
            .collect();

        if valid.is_empty() {
            (0..ACTION_COUNT).collect()
        } else {
            valid
        }
    }
}
