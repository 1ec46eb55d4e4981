//! Mission CSV logs: append-only records of commanded versus achieved motion.
//!
//! One record is written per mission step, immediately after the step completes and never
//! batched, so a crash mid-mission preserves every prior step on disk. The header is written
//! once when the log is created; each append reopens the file in append mode, which keeps the
//! sink robust against the process dying between steps.
//!
//! Two column layouts exist, one per harness preset:
//!
//! - [`LogLayout::Jittered`] records the requested target and the post-jitter commanded
//!   position side by side, with the colliding object's name in the last column.
//! - [`LogLayout::Compact`] records the achieved pose sampled after the settle pause, with a
//!   plain `OK`/`COLLISION` status (the object name goes to diagnostics, not the row).
//!
//! All numeric fields carry two decimal places; the fault flag is a literal `true`/`false`.

use crate::MoveOutcome;
use chrono::Local;
use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Column layout of a mission log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLayout {
    /// Target and post-jitter commanded position, collision object name in the last column.
    Jittered,
    /// Achieved pose only, `OK`/`COLLISION` status column.
    Compact,
}

impl LogLayout {
    /// The CSV header row for this layout.
    pub fn header(&self) -> &'static str {
        match self {
            LogLayout::Jittered => {
                "ElapsedTime(s),FaultActive,Delay(s),Target_X,Target_Y,Target_Z,Jittered_X,Jittered_Y,Jittered_Z,Collision"
            }
            LogLayout::Compact => "ElapsedTime(s),FaultActive,Delay(s),X,Y,Z,Status",
        }
    }

    /// File-name prefix used by [`MissionLog::create_timestamped`].
    pub fn file_prefix(&self) -> &'static str {
        match self {
            LogLayout::Jittered => "waypoint_log",
            LogLayout::Compact => "fault_log",
        }
    }
}

/// An open mission log: a CSV file with its header already written.
#[derive(Debug)]
pub struct MissionLog {
    path: PathBuf,
    layout: LogLayout,
}

impl MissionLog {
    /// Create a log at `path`, truncating any existing file and writing the header row.
    pub fn create<P: AsRef<Path>>(path: P, layout: LogLayout) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::create(&path)?;
        writeln!(file, "{}", layout.header())?;
        Ok(MissionLog { path, layout })
    }

    /// Create a log in `dir` with a collision-resistant timestamped name,
    /// e.g. `waypoint_log_20250807_143052.csv`, so successive runs never overwrite
    /// each other.
    pub fn create_timestamped<P: AsRef<Path>>(dir: P, layout: LogLayout) -> io::Result<Self> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let filename = format!("{}_{}.csv", layout.file_prefix(), timestamp);
        Self::create(dir.as_ref().join(filename), layout)
    }

    /// The file this log writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The layout rows are written in.
    pub fn layout(&self) -> LogLayout {
        self.layout
    }

    /// Append one record for a completed step. Reopens the file in append mode so the row is
    /// durable as soon as this returns.
    pub fn append(&self, outcome: &MoveOutcome) -> io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{}", self.format_row(outcome))
    }

    fn format_row(&self, outcome: &MoveOutcome) -> String {
        match self.layout {
            LogLayout::Jittered => format!(
                "{:.2},{},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{}",
                outcome.elapsed_s,
                outcome.fault_active,
                outcome.delay_s,
                outcome.target.x,
                outcome.target.y,
                outcome.target.z,
                outcome.commanded.x,
                outcome.commanded.y,
                outcome.commanded.z,
                outcome.collision.as_deref().unwrap_or("OK"),
            ),
            LogLayout::Compact => format!(
                "{:.2},{},{:.2},{:.2},{:.2},{:.2},{}",
                outcome.elapsed_s,
                outcome.fault_active,
                outcome.delay_s,
                outcome.achieved.x,
                outcome.achieved.y,
                outcome.achieved.z,
                if outcome.collision.is_some() {
                    "COLLISION"
                } else {
                    "OK"
                },
            ),
        }
    }
}

/// One parsed row of a mission log, for analysis and tests.
///
/// `position` holds the `Target_*` columns of the jittered layout or the achieved `X,Y,Z` of
/// the compact layout; `jittered` is populated only for the jittered layout.
#[derive(Clone, Debug, PartialEq)]
pub struct LoggedStep {
    /// Elapsed mission time of the step, seconds.
    pub elapsed_s: f64,
    /// Whether a fault was active.
    pub fault_active: bool,
    /// Delay recorded for the step, seconds.
    pub delay_s: f64,
    /// Target position (jittered layout) or achieved pose (compact layout).
    pub position: [f64; 3],
    /// Post-jitter commanded position, jittered layout only.
    pub jittered: Option<[f64; 3]>,
    /// `OK`, `COLLISION`, or the colliding object's name.
    pub status: String,
}

/// Parse a mission log back into step records, inferring the layout from the column count.
///
/// # Arguments
/// * `path` - Path to a CSV file written by [`MissionLog`].
///
/// # Returns
/// * `Ok(Vec<LoggedStep>)` in row order if successful.
/// * `Err` if the file cannot be read or a row has an unexpected shape.
pub fn read_rows<P: AsRef<Path>>(path: P) -> Result<Vec<LoggedStep>, Box<dyn Error>> {
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(file);

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let (jittered, status_index) = match record.len() {
            10 => (
                Some([
                    record[6].parse::<f64>()?,
                    record[7].parse::<f64>()?,
                    record[8].parse::<f64>()?,
                ]),
                9,
            ),
            7 => (None, 6),
            n => return Err(format!("unexpected mission log row with {} fields", n).into()),
        };
        rows.push(LoggedStep {
            elapsed_s: record[0].parse::<f64>()?,
            fault_active: record[1].parse::<bool>()?,
            delay_s: record[2].parse::<f64>()?,
            position: [
                record[3].parse::<f64>()?,
                record[4].parse::<f64>()?,
                record[5].parse::<f64>()?,
            ],
            jittered,
            status: record[status_index].to_string(),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Waypoint;
    use nalgebra::Vector3;

    fn sample_outcome() -> MoveOutcome {
        MoveOutcome {
            elapsed_s: 12.3456,
            fault_active: true,
            delay_s: 2.117,
            target: Waypoint::new(30.0, 20.0, -100.0),
            commanded: Vector3::new(30.4, 19.6, -100.0),
            achieved: Vector3::new(30.41, 19.58, -99.97),
            collision: None,
        }
    }

    #[test]
    fn test_jittered_header() {
        assert_eq!(
            LogLayout::Jittered.header(),
            "ElapsedTime(s),FaultActive,Delay(s),Target_X,Target_Y,Target_Z,Jittered_X,Jittered_Y,Jittered_Z,Collision"
        );
    }

    #[test]
    fn test_compact_header() {
        assert_eq!(
            LogLayout::Compact.header(),
            "ElapsedTime(s),FaultActive,Delay(s),X,Y,Z,Status"
        );
    }

    #[test]
    fn test_jittered_row_formatting() {
        let dir = tempfile::tempdir().unwrap();
        let log = MissionLog::create(dir.path().join("m.csv"), LogLayout::Jittered).unwrap();
        let row = log.format_row(&sample_outcome());
        assert_eq!(
            row,
            "12.35,true,2.12,30.00,20.00,-100.00,30.40,19.60,-100.00,OK"
        );
    }

    #[test]
    fn test_compact_row_formatting_collision() {
        let dir = tempfile::tempdir().unwrap();
        let log = MissionLog::create(dir.path().join("m.csv"), LogLayout::Compact).unwrap();
        let mut outcome = sample_outcome();
        outcome.collision = Some("tower_ne".to_string());
        let row = log.format_row(&outcome);
        assert_eq!(row, "12.35,true,2.12,30.41,19.58,-99.97,COLLISION");
    }

    #[test]
    fn test_jittered_row_carries_object_name() {
        let dir = tempfile::tempdir().unwrap();
        let log = MissionLog::create(dir.path().join("m.csv"), LogLayout::Jittered).unwrap();
        let mut outcome = sample_outcome();
        outcome.collision = Some("tower_ne".to_string());
        assert!(log.format_row(&outcome).ends_with(",tower_ne"));
    }

    #[test]
    fn test_each_append_is_durable() {
        let dir = tempfile::tempdir().unwrap();
        let log = MissionLog::create(dir.path().join("m.csv"), LogLayout::Jittered).unwrap();

        log.append(&sample_outcome()).unwrap();
        assert_eq!(read_rows(log.path()).unwrap().len(), 1);

        log.append(&sample_outcome()).unwrap();
        assert_eq!(read_rows(log.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_roundtrip_both_layouts() {
        let dir = tempfile::tempdir().unwrap();
        for layout in [LogLayout::Jittered, LogLayout::Compact] {
            let log = MissionLog::create(dir.path().join("m.csv"), layout).unwrap();
            log.append(&sample_outcome()).unwrap();
            let rows = read_rows(log.path()).unwrap();
            assert_eq!(rows.len(), 1);
            let row = &rows[0];
            assert!(row.fault_active);
            assert_eq!(row.delay_s, 2.12);
            assert_eq!(row.status, "OK");
            match layout {
                LogLayout::Jittered => {
                    assert_eq!(row.position, [30.0, 20.0, -100.0]);
                    assert_eq!(row.jittered, Some([30.4, 19.6, -100.0]));
                }
                LogLayout::Compact => {
                    assert_eq!(row.position, [30.41, 19.58, -99.97]);
                    assert_eq!(row.jittered, None);
                }
            }
        }
    }

    #[test]
    fn test_timestamped_name() {
        let dir = tempfile::tempdir().unwrap();
        let log = MissionLog::create_timestamped(dir.path(), LogLayout::Compact).unwrap();
        let name = log.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("fault_log_"));
        assert!(name.ends_with(".csv"));
        assert_eq!(log.layout(), LogLayout::Compact);
    }
}
