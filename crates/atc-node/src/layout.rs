//! Sector layout and engine configuration files.
//!
//! Layout files describe sectors in meters. Every entry goes through
//! `Sector::new`, so an inverted box or a duplicate id is rejected when the
//! engine is built rather than deserialized straight into domain types.

use std::path::Path;

use serde::{Deserialize, Serialize};

use atc_core::spatial::{from_meters, to_meters};
use atc_core::{AtcResult, EngineConfig, Sector, SectorId};

use crate::error::{NodeError, NodeResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorSpec {
    pub id: SectorId,
    pub min_x_m: f64,
    pub min_y_m: f64,
    pub max_x_m: f64,
    pub max_y_m: f64,
    pub min_altitude_m: f64,
    pub max_altitude_m: f64,
}

impl SectorSpec {
    pub fn to_sector(&self) -> AtcResult<Sector> {
        Sector::new(
            self.id,
            from_meters(self.min_x_m),
            from_meters(self.min_y_m),
            from_meters(self.max_x_m),
            from_meters(self.max_y_m),
            from_meters(self.min_altitude_m),
            from_meters(self.max_altitude_m),
        )
    }
}

impl From<&Sector> for SectorSpec {
    fn from(sector: &Sector) -> Self {
        let [(min_x, max_x), (min_y, max_y), (min_alt, max_alt)] = sector.bounds();
        Self {
            id: sector.id(),
            min_x_m: to_meters(min_x),
            min_y_m: to_meters(min_y),
            max_x_m: to_meters(max_x),
            max_y_m: to_meters(max_y),
            min_altitude_m: to_meters(min_alt),
            max_altitude_m: to_meters(max_alt),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorLayout {
    pub sectors: Vec<SectorSpec>,
}

impl SectorLayout {
    /// `columns` x `rows` square cells from the origin, numbered row by row
    /// starting at 1.
    pub fn grid(columns: u32, rows: u32, cell_m: f64, ceiling_m: f64) -> Self {
        let mut sectors = Vec::with_capacity((columns * rows) as usize);
        for row in 0..rows {
            for col in 0..columns {
                sectors.push(SectorSpec {
                    id: row * columns + col + 1,
                    min_x_m: col as f64 * cell_m,
                    min_y_m: row as f64 * cell_m,
                    max_x_m: (col + 1) as f64 * cell_m,
                    max_y_m: (row + 1) as f64 * cell_m,
                    min_altitude_m: 0.0,
                    max_altitude_m: ceiling_m,
                });
            }
        }
        Self { sectors }
    }

    /// Four 50 km cells up to 15 km.
    pub fn default_grid() -> Self {
        Self::grid(2, 2, 50_000.0, 15_000.0)
    }

    pub fn to_sectors(&self) -> AtcResult<Vec<Sector>> {
        self.sectors.iter().map(SectorSpec::to_sector).collect()
    }

    /// Horizontal extent covered by all sectors: (min_x, min_y, max_x, max_y).
    pub fn extent_m(&self) -> Option<(f64, f64, f64, f64)> {
        self.sectors.iter().fold(None, |acc, s| {
            Some(match acc {
                None => (s.min_x_m, s.min_y_m, s.max_x_m, s.max_y_m),
                Some((x0, y0, x1, y1)) => (
                    x0.min(s.min_x_m),
                    y0.min(s.min_y_m),
                    x1.max(s.max_x_m),
                    y1.max(s.max_y_m),
                ),
            })
        })
    }

    pub fn load(path: &Path) -> NodeResult<Self> {
        read_json(path)
    }
}

pub fn load_engine_config(path: &Path) -> NodeResult<EngineConfig> {
    let config: EngineConfig = read_json(path)?;
    config.validate()?;
    Ok(config)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> NodeResult<T> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| NodeError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| NodeError::Json {
        path: display,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_builds_four_sectors() {
        let layout = SectorLayout::default_grid();
        let sectors = layout.to_sectors().unwrap();
        assert_eq!(sectors.iter().map(Sector::id).collect::<Vec<_>>(), [1, 2, 3, 4]);
        assert_eq!(sectors[3].bounds()[0], (5_000_000, 10_000_000));
        assert_eq!(layout.extent_m(), Some((0.0, 0.0, 100_000.0, 100_000.0)));
    }

    #[test]
    fn layout_entry_round_trips_through_sector() {
        let entry = SectorSpec {
            id: 7,
            min_x_m: -500.0,
            min_y_m: 0.0,
            max_x_m: 1500.25,
            max_y_m: 2000.0,
            min_altitude_m: 100.0,
            max_altitude_m: 9000.0,
        };
        assert_eq!(SectorSpec::from(&entry.to_sector().unwrap()), entry);
    }

    #[test]
    fn inverted_box_is_rejected() {
        let layout = SectorLayout {
            sectors: vec![SectorSpec {
                id: 1,
                min_x_m: 10.0,
                min_y_m: 0.0,
                max_x_m: 0.0,
                max_y_m: 10.0,
                min_altitude_m: 0.0,
                max_altitude_m: 10.0,
            }],
        };
        assert!(layout.to_sectors().is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = SectorLayout::load(Path::new("/nonexistent/sectors.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/sectors.json"));
    }
}
