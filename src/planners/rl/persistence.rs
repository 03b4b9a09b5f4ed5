//! Flat text dump of the learned Q-tables.
//!
//! ```text
//! # Robot Q-Tables
//! # Format: robot_id,state,action,q_value
//! 1,((3;4);(1;0);collecting;((0;1));()),2,10
//! ```
//! Commas inside the state are written as `;` so a line always splits into four fields.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use time::{OffsetDateTime, format_description};
use tracing::{info, warn};

use super::action_space::ACTION_COUNT;
use super::encoder::DiscreteState;
use super::policy::{QLearningPolicy, QTable};
use crate::state::RobotId;

#[derive(Debug)]
pub enum QTableError {
    Io(io::Error),
    MalformedLine { line: usize, reason: String },
}

impl fmt::Display for QTableError {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QTableError::Io(err) => write!(formatter, "Q-table I/O failed: {}", err),
            QTableError::MalformedLine { line, reason } => {
                write!(formatter, "Could not parse Q-table line {}: {}", line, reason)
            }
        }
    }
}

impl Error for QTableError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            QTableError::Io(err) => Some(err),
            QTableError::MalformedLine { .. } => None,
        }
    }
}

impl From<io::Error> for QTableError {
    fn from(err: io::Error) -> Self {
        QTableError::Io(err)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
}

fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]")
        .ok()
        .and_then(|format| now.format(&format).ok())
        .unwrap_or_else(|| now.unix_timestamp().to_string())
}

pub fn write_q_tables<W: Write>(
    writer: &mut W,
    tables: &BTreeMap<RobotId, QTable>,
) -> Result<usize, QTableError> {
    writeln!(writer, "# Robot Q-Tables")?;
    writeln!(writer, "# Format: robot_id,state,action,q_value")?;
    writeln!(writer, "# Saved {}", timestamp())?;
    writeln!(writer)?;

    let mut written = 0;
    for (robot, table) in tables {
        writeln!(writer, "# Robot {}", robot)?;
        for (state, action, value) in table.nonzero_entries() {
            let state = state.to_string().replace(',', ";");
            writeln!(writer, "{},{},{},{}", robot, state, action, value)?;
            written += 1;
        }
        writeln!(writer)?;
    }
    Ok(written)
}

fn parse_line(line: &str) -> Result<(RobotId, DiscreteState, usize, f64), String> {
    let parts: Vec<&str> = line.splitn(4, ',').collect();
    let [robot, state, action, value] = parts.as_slice() else {
        return Err(format!("expected 4 fields, got {}", parts.len()));
    };

    let robot = robot
        .trim()
        .parse::<RobotId>()
        .map_err(|e| format!("bad robot id '{}': {}", robot.trim(), e))?;
    let state = state.replace(';', ",").parse::<DiscreteState>()?;
    let action = action
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("bad action '{}': {}", action.trim(), e))?;
    if action >= ACTION_COUNT {
        return Err(format!("action {} out of range", action));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad value '{}': {}", value.trim(), e))?;

    Ok((robot, state, action, value))
}

/// Parse a dump, skipping (and logging) lines that do not parse.
pub fn read_q_tables<R: BufRead>(
    reader: R,
) -> Result<(BTreeMap<RobotId, QTable>, LoadReport), QTableError> {
    let mut tables: BTreeMap<RobotId, QTable> = BTreeMap::new();
    let mut report = LoadReport::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_line(line) {
            Ok((robot, state, action, value)) => {
                tables.entry(robot).or_default().set(&state, action, value);
                report.loaded += 1;
            }
            Err(reason) => {
                let err = QTableError::MalformedLine {
                    line: index + 1,
                    reason,
                };
                warn!("{}, skipping", err);
                report.skipped += 1;
            }
        }
    }

    Ok((tables, report))
}

impl QLearningPolicy {
    pub fn save_q_tables<P: AsRef<Path>>(&self, path: P) -> Result<usize, QTableError> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        let written = write_q_tables(&mut writer, self.tables())?;
        writer.flush()?;
        info!("Saved {} Q-values for {} robots to {}", written, self.tables().len(), path.display());
        Ok(written)
    }

    /// Replace the current tables with the contents of `path`.
    pub fn load_q_tables<P: AsRef<Path>>(&mut self, path: P) -> Result<LoadReport, QTableError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let (tables, report) = read_q_tables(reader)?;
        info!(
            "Loaded {} Q-values for {} robots from {} ({} lines skipped)",
            report.loaded,
            tables.len(),
            path.display(),
            report.skipped
        );
        self.replace_tables(tables);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planners::rl::QLearningConfig;
    use crate::state::RobotState;

    fn state(x: i32, obstacles: Vec<(i32, i32)>) -> DiscreteState {
        DiscreteState {
            cell: (x, 4),
            target: (1, -1),
            mode: RobotState::Checkout,
            obstacles,
            neighbors: vec![(0, 1)],
        }
    }

    fn sample_tables() -> BTreeMap<RobotId, QTable> {
        let mut first = QTable::new();
        first.set(&state(3, vec![(0, 1), (2, -1)]), 2, 10.0);
        first.set(&state(3, vec![(0, 1), (2, -1)]), 7, -0.1234567890123);
        first.set(&state(5, Vec::new()), 0, 1e-9);
        let mut second = QTable::new();
        second.set(&state(1, Vec::new()), 4, -100.0);

        BTreeMap::from([(1, first), (2, second)])
    }

    #[test]
    fn test_save_then_load_reproduces_tables() {
        let tables = sample_tables();
        let mut buffer = Vec::new();
        let written = write_q_tables(&mut buffer, &tables).unwrap();
        assert_eq!(written, 4);

        let (loaded, report) = read_q_tables(buffer.as_slice()).unwrap();
        assert_eq!(report, LoadReport { loaded: 4, skipped: 0 });
        assert_eq!(loaded, tables);
    }

    #[test]
    fn test_state_commas_are_escaped() {
        let mut buffer = Vec::new();
        write_q_tables(&mut buffer, &sample_tables()).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let line = text
            .lines()
            .find(|l| l.starts_with("2,"))
            .unwrap();
        assert_eq!(line, "2,((1;4);(1;-1);checkout;();((0;1))),4,-100");
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let text = "\
# Robot Q-Tables
1,((3;4);(1;0);idle;();()),2,10

1,((3;4);(1;0);idle;();()),2
x,((3;4);(1;0);idle;();()),2,10
1,((3;4);(1;0);sleeping;();()),2,10
1,((3;4);(1;0);idle;();()),9,10
1,((3;4);(1;0);idle;();()),3,ten
2,((0;0);(0;0);collecting;((1;1));()),5,-2.5
";
        let (tables, report) = read_q_tables(text.as_bytes()).unwrap();

        assert_eq!(report, LoadReport { loaded: 2, skipped: 5 });
        assert_eq!(tables.len(), 2);
        let state: DiscreteState = "((0,0),(0,0),collecting,((1,1)),())".parse().unwrap();
        assert_eq!(tables[&2].value(&state, 5), -2.5);
    }

    #[test]
    fn test_policy_file_round_trip() {
        let path = std::env::temp_dir().join(format!("pickbot-qtables-{}.txt", std::process::id()));
        let mut policy = QLearningPolicy::new(QLearningConfig::default(), 1);
        policy.replace_tables(sample_tables());
        policy.save_q_tables(&path).unwrap();

        let mut restored = QLearningPolicy::new(QLearningConfig::default(), 2);
        let report = restored.load_q_tables(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(report.loaded, 4);
        assert_eq!(restored.tables(), policy.tables());
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let mut policy = QLearningPolicy::new(QLearningConfig::default(), 1);
        let err = policy
            .load_q_tables("/nonexistent/pickbot/q_tables.txt")
            .unwrap_err();
        assert!(matches!(err, QTableError::Io(_)));
    }
}
