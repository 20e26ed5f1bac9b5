//! Points of interest, grouped by region
//!
//! A registry is loaded once per region and stays read-only for the whole run.

use log::{info, warn};
use rand::seq::{index, IndexedRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use super::error::{SimError, SimResult};
use super::types::GeoPoint;

const FILE_PREFIX: &str = "pois_";
const FILE_SUFFIX: &str = ".json";

/// A named location usable as a trip origin or destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Poi {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }

    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// The points of interest of one region
#[derive(Debug, Clone)]
pub struct PoiRegistry {
    region: String,
    pois: Vec<Poi>,
}

impl PoiRegistry {
    /// Build a registry from already parsed POIs; an empty list is allowed
    pub fn new(region: impl Into<String>, pois: Vec<Poi>) -> SimResult<Self> {
        let region = region.into();
        let mut names = HashSet::new();
        for poi in &pois {
            if !names.insert(poi.name.as_str()) {
                return Err(SimError::config(format!(
                    "duplicate point of interest '{}' in region '{}'",
                    poi.name, region
                )));
            }
            if !poi.location().is_valid() {
                return Err(SimError::config(format!(
                    "point of interest '{}' in region '{}' has invalid coordinates ({}, {})",
                    poi.name, region, poi.latitude, poi.longitude
                )));
            }
        }
        Ok(Self { region, pois })
    }

    /// Parse a JSON array of `{name, latitude, longitude}` objects
    pub fn from_json(region: impl Into<String>, text: &str) -> SimResult<Self> {
        let region = region.into();
        let pois: Vec<Poi> = serde_json::from_str(text).map_err(|err| {
            SimError::config(format!("malformed POI data for region '{}': {}", region, err))
        })?;
        if pois.is_empty() {
            return Err(SimError::config(format!(
                "POI data for region '{}' is empty",
                region
            )));
        }
        Self::new(region, pois)
    }

    pub fn load(region: impl Into<String>, path: &Path) -> SimResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(region, &text)
    }

    /// Load every `pois_<region>.json` file of a folder, keyed by region
    pub fn load_dir(dir: &Path) -> SimResult<BTreeMap<String, PoiRegistry>> {
        let entries = std::fs::read_dir(dir).map_err(|source| SimError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut registries = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|source| SimError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let file_name = entry.file_name();
            let Some(region) = file_name
                .to_str()
                .and_then(|name| name.strip_prefix(FILE_PREFIX))
                .and_then(|name| name.strip_suffix(FILE_SUFFIX))
            else {
                continue;
            };
            if region.is_empty() {
                warn!("Ignoring POI file without a region name: {:?}", file_name);
                continue;
            }

            let registry = Self::load(region, &entry.path())?;
            info!(
                "Loaded {} POIs for region: {}",
                registry.len(),
                registry.region()
            );
            registries.insert(region.to_string(), registry);
        }
        Ok(registries)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn len(&self) -> usize {
        self.pois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pois.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Poi> {
        self.pois.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Poi> {
        self.pois.iter().find(|poi| poi.name == name)
    }

    /// Fails unless trips can be formed, i.e. at least two POIs exist
    pub fn ensure_routable(&self) -> SimResult<()> {
        if self.pois.len() < 2 {
            Err(SimError::InsufficientData {
                region: self.region.clone(),
                found: self.pois.len(),
            })
        } else {
            Ok(())
        }
    }

    /// Any POI, uniformly at random
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> SimResult<&Poi> {
        self.pois.choose(rng).ok_or_else(|| SimError::InsufficientData {
            region: self.region.clone(),
            found: 0,
        })
    }

    /// Two different POIs, uniformly at random
    pub fn pick_two_distinct<R: Rng + ?Sized>(&self, rng: &mut R) -> SimResult<(&Poi, &Poi)> {
        self.ensure_routable()?;
        let picked = index::sample(rng, self.pois.len(), 2);
        Ok((&self.pois[picked.index(0)], &self.pois[picked.index(1)]))
    }

    /// A destination other than `origin`, at least `min_distance_km` away
    ///
    /// Returns `Ok(None)` when every other POI is too close.
    pub fn pick_destination<R: Rng + ?Sized>(
        &self,
        origin: &Poi,
        min_distance_km: f64,
        rng: &mut R,
    ) -> SimResult<Option<&Poi>> {
        self.ensure_routable()?;
        let from = origin.location();
        let candidates: Vec<&Poi> = self
            .pois
            .iter()
            .filter(|poi| poi.name != origin.name)
            .filter(|poi| {
                let distance = from.distance_km(&poi.location());
                distance > 0.0 && distance >= min_distance_km
            })
            .collect();

        Ok(candidates.choose(rng).copied())
    }

    /// The POI closest to a point
    pub fn nearest(&self, point: &GeoPoint) -> Option<&Poi> {
        self.pois.iter().min_by(|a, b| {
            point
                .distance_km(&a.location())
                .total_cmp(&point.distance_km(&b.location()))
        })
    }
}
