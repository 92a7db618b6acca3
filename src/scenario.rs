//! Input model for one assignment run: drivers with speeds and pickup/drop tasks.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::traits::Location;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    /// Current position as `[lat, lng]`.
    pub location: Location,
    pub speed_kmh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub pickup: Location,
    pub drop: Location,
}

/// Drivers and tasks for one run. Indices into `drivers` and `tasks` are the
/// worker and task identities used by the solver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub drivers: Vec<Driver>,
    pub tasks: Vec<Task>,
}

#[derive(Debug)]
pub enum ScenarioError {
    Io(io::Error),
    Json(serde_json::Error),
    OutOfRange {
        what: &'static str,
        index: usize,
        location: Location,
    },
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioError::Io(err) => write!(f, "cannot read scenario: {}", err),
            ScenarioError::Json(err) => write!(f, "malformed scenario: {}", err),
            ScenarioError::OutOfRange {
                what,
                index,
                location,
            } => write!(
                f,
                "{} {} has out-of-range coordinates {:?}",
                what, index, location
            ),
        }
    }
}

impl std::error::Error for ScenarioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScenarioError::Io(err) => Some(err),
            ScenarioError::Json(err) => Some(err),
            ScenarioError::OutOfRange { .. } => None,
        }
    }
}

impl From<io::Error> for ScenarioError {
    fn from(err: io::Error) -> Self {
        ScenarioError::Io(err)
    }
}

impl From<serde_json::Error> for ScenarioError {
    fn from(err: serde_json::Error) -> Self {
        ScenarioError::Json(err)
    }
}

impl Scenario {
    pub fn from_json_str(json: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = serde_json::from_str(json)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Checks that every coordinate is a plausible WGS84 position.
    ///
    /// Speeds are validated by the cost matrix builder.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        for (what, points) in [
            ("driver", self.driver_locations()),
            ("pickup", self.pickups()),
            ("drop", self.drops()),
        ] {
            if let Some(index) = points.iter().position(|l| !in_range(*l)) {
                return Err(ScenarioError::OutOfRange {
                    what,
                    index,
                    location: points[index],
                });
            }
        }
        Ok(())
    }

    pub fn driver_locations(&self) -> Vec<Location> {
        self.drivers.iter().map(|d| d.location).collect()
    }

    pub fn speeds(&self) -> Vec<f64> {
        self.drivers.iter().map(|d| d.speed_kmh).collect()
    }

    pub fn pickups(&self) -> Vec<Location> {
        self.tasks.iter().map(|t| t.pickup).collect()
    }

    pub fn drops(&self) -> Vec<Location> {
        self.tasks.iter().map(|t| t.drop).collect()
    }
}

fn in_range((lat, lng): Location) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BENGALURU: &str = r#"{
        "drivers": [
            {"location": [12.914368, 77.666922], "speed_kmh": 18.0},
            {"location": [12.921383, 77.666319], "speed_kmh": 25.0},
            {"location": [12.922742, 77.675514], "speed_kmh": 15.0}
        ],
        "tasks": [
            {"pickup": [12.912831, 77.681145], "drop": [12.922923, 77.673605]},
            {"pickup": [12.925258, 77.671648], "drop": [12.915595, 77.677188]}
        ]
    }"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::from_json_str(BENGALURU).expect("scenario");
        assert_eq!(scenario.drivers.len(), 3);
        assert_eq!(scenario.tasks.len(), 2);
        assert_eq!(scenario.speeds(), vec![18.0, 25.0, 15.0]);
        assert_eq!(scenario.pickups()[1], (12.925258, 77.671648));
        assert_eq!(scenario.drops()[0], (12.922923, 77.673605));
        assert_eq!(scenario.driver_locations()[2], (12.922742, 77.675514));
    }

    #[test]
    fn test_rejects_out_of_range_drop() {
        let json = r#"{"drivers": [], "tasks": [{"pickup": [0.0, 0.0], "drop": [95.0, 0.0]}]}"#;
        match Scenario::from_json_str(json) {
            Err(ScenarioError::OutOfRange { what, index, .. }) => {
                assert_eq!(what, "drop");
                assert_eq!(index, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rejects_malformed_json() {
        let json = r#"{"drivers": [{"location": [1.0], "speed_kmh": 10.0}], "tasks": []}"#;
        assert!(matches!(Scenario::from_json_str(json), Err(ScenarioError::Json(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = Scenario::from_json_file("/nonexistent/scenario.json").unwrap_err();
        assert!(matches!(err, ScenarioError::Io(_)));
        let source = std::error::Error::source(&err).expect("io source");
        assert!(source.downcast_ref::<io::Error>().is_some());
    }
}
