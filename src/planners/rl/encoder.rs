//! Coarse, hashable view of a robot's surroundings used as the Q-table key.

use std::fmt;
use std::str::FromStr;

use crate::infra::Point;
use crate::state::{Facility, Robot, RobotSnapshot, RobotState};

#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Coarse cells per world axis
    pub coarse_cells: f64,
    /// Obstacles and robots further away than this are ignored
    pub sensing_radius: f64,
    pub max_obstacles: usize,
    pub max_neighbors: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            coarse_cells: 10.0,
            sensing_radius: 100.0,
            max_obstacles: 3,
            max_neighbors: 2,
        }
    }
}

/// Discretised state. Offsets are relative to the robot's own coarse cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiscreteState {
    pub cell: (i32, i32),
    pub target: (i32, i32),
    pub mode: RobotState,
    pub obstacles: Vec<(i32, i32)>,
    pub neighbors: Vec<(i32, i32)>,
}

fn write_pair(f: &mut fmt::Formatter<'_>, (x, y): (i32, i32)) -> fmt::Result {
    write!(f, "({},{})", x, y)
}

fn write_pairs(f: &mut fmt::Formatter<'_>, pairs: &[(i32, i32)]) -> fmt::Result {
    f.write_str("(")?;
    for (i, pair) in pairs.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write_pair(f, *pair)?;
    }
    f.write_str(")")
}

impl fmt::Display for DiscreteState {
    /// `((3,4),(1,0),collecting,((0,1),(2,-1)),((1,1)))`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        write_pair(f, self.cell)?;
        f.write_str(",")?;
        write_pair(f, self.target)?;
        write!(f, ",{},", self.mode)?;
        write_pairs(f, &self.obstacles)?;
        f.write_str(",")?;
        write_pairs(f, &self.neighbors)?;
        f.write_str(")")
    }
}

/// Strip one pair of enclosing parentheses.
fn unwrap_parens(s: &str) -> Result<&str, String> {
    s.trim()
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| format!("expected parenthesised group, got '{}'", s.trim()))
}

/// Split on commas that are not nested inside parentheses.
fn split_top_level(s: &str) -> Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(format!("unbalanced ')' in '{}'", s));
                }
            }
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(format!("unbalanced '(' in '{}'", s));
    }

    let last = &s[start..];
    if !last.trim().is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    Ok(parts)
}

fn parse_pair(s: &str) -> Result<(i32, i32), String> {
    let inner = unwrap_parens(s)?;
    let (x, y) = inner
        .split_once(',')
        .ok_or_else(|| format!("expected 'x,y', got '{}'", inner))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<i32>()
            .map_err(|e| format!("bad coordinate '{}': {}", v.trim(), e))
    };
    Ok((parse(x)?, parse(y)?))
}

fn parse_pairs(s: &str) -> Result<Vec<(i32, i32)>, String> {
    split_top_level(unwrap_parens(s)?)?
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .map(parse_pair)
        .collect()
}

impl FromStr for DiscreteState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = split_top_level(unwrap_parens(s)?)?;
        let [cell, target, mode, obstacles, neighbors] = fields.as_slice() else {
            return Err(format!("expected 5 state fields, got {}", fields.len()));
        };

        Ok(DiscreteState {
            cell: parse_pair(cell)?,
            target: parse_pair(target)?,
            mode: mode.parse()?,
            obstacles: parse_pairs(obstacles)?,
            neighbors: parse_pairs(neighbors)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct StateEncoder {
    config: EncoderConfig,
}

impl StateEncoder {
    fn coarse(&self, point: &Point, facility: &Facility) -> (i32, i32) {
        let cells = self.config.coarse_cells;
        (
            (point.x / facility.width * cells) as i32,
            (point.y / facility.height * cells) as i32,
        )
    }

    fn offset(&self, from: (i32, i32), point: &Point, facility: &Facility) -> (i32, i32) {
        let (x, y) = self.coarse(point, facility);
        (x - from.0, y - from.1)
    }

    /// Coarse offsets of the `limit` nearest points within sensing range, sorted.
    fn nearest(
        &self,
        robot: &Robot,
        cell: (i32, i32),
        points: impl Iterator<Item = Point>,
        limit: usize,
        facility: &Facility,
    ) -> Vec<(i32, i32)> {
        let mut in_range: Vec<(f64, Point)> = points
            .map(|p| (robot.position.distance(&p), p))
            .filter(|(d, _)| *d < self.config.sensing_radius)
            .collect();
        in_range.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut offsets: Vec<(i32, i32)> = in_range
            .iter()
            .take(limit)
            .map(|(_, p)| self.offset(cell, p, facility))
            .collect();
        offsets.sort();
        offsets
    }

    pub fn encode(&self, robot: &Robot, facility: &Facility, others: &[RobotSnapshot]) -> DiscreteState {
        let cell = self.coarse(&robot.position, facility);

        let target = robot
            .current_target()
            .map(|t| self.offset(cell, &t, facility))
            .unwrap_or((0, 0));

        let obstacles = self.nearest(
            robot,
            cell,
            facility.obstacles.iter().map(|o| o.center()),
            self.config.max_obstacles,
            facility,
        );
        let neighbors = self.nearest(
            robot,
            cell,
            others
                .iter()
                .filter(|other| other.id != robot.id)
                .map(|other| other.position),
            self.config.max_neighbors,
            facility,
        );

        DiscreteState {
            cell,
            target,
            mode: robot.state(),
            obstacles,
            neighbors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Rect;

    fn sample_state() -> DiscreteState {
        DiscreteState {
            cell: (3, 4),
            target: (1, 0),
            mode: RobotState::Collecting,
            obstacles: vec![(0, 1), (2, -1)],
            neighbors: vec![(1, 1)],
        }
    }

    #[test]
    fn test_display_format() {
        assert_eq!(
            sample_state().to_string(),
            "((3,4),(1,0),collecting,((0,1),(2,-1)),((1,1)))"
        );
    }

    #[test]
    fn test_parse_accepts_spacing_and_empty_groups() {
        let state: DiscreteState = "((3, 4), (1, 0), 'collecting', ((0, 1), (2, -1)), ((1, 1)))"
            .parse()
            .unwrap();
        assert_eq!(state, sample_state());

        let state: DiscreteState = "((0,0),(0,0),idle,(),())".parse().unwrap();
        assert!(state.obstacles.is_empty());
        assert!(state.neighbors.is_empty());
        assert_eq!(state.to_string().parse::<DiscreteState>(), Ok(state));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("((3,4),(1,0),collecting)".parse::<DiscreteState>().is_err());
        assert!("((3,4),(1,0),flying,(),())".parse::<DiscreteState>().is_err());
        assert!("((3,4),(1,x),idle,(),())".parse::<DiscreteState>().is_err());
        assert!("((3,4),(1,0),idle,((1,1),())".parse::<DiscreteState>().is_err());
    }

    #[test]
    fn test_encode_uses_nearest_features() {
        let mut facility = Facility::open(80, 60, 10.0);
        for x in [300.0, 330.0, 360.0, 480.0] {
            facility.add_obstacle(Rect::new(x, 280.0, 20.0, 20.0));
        }
        let mut robot = Robot::new(1, Point::new(405.0, 305.0), 10.0, 0);
        robot.install_path(vec![Point::new(505.0, 305.0)]);
        let others = [
            robot.snapshot(),
            RobotSnapshot {
                id: 2,
                position: Point::new(300.0, 200.0),
                radius: 10.0,
            },
            RobotSnapshot {
                id: 3,
                position: Point::new(700.0, 300.0),
                radius: 10.0,
            },
        ];

        let state = StateEncoder::default().encode(&robot, &facility, &others);

        assert_eq!(state.cell, (5, 5));
        assert_eq!(state.target, (1, 0));
        assert_eq!(state.mode, RobotState::Idle);
        // All four are in range; the one at 300 is the furthest and is dropped
        assert_eq!(state.obstacles, vec![(-1, -1), (-1, -1), (1, -1)]);
        assert!(state.neighbors.is_empty());
    }
}
