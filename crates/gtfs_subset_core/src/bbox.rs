use crate::error::{Result, SubsetError};

/// Axis-aligned lon/lat rectangle. No validity check on ordering is performed;
/// callers are trusted to pass `min <= max` on each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl Bbox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Parses `"min_lon,min_lat,max_lon,max_lat"`.
    pub fn parse(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(SubsetError::BadBbox(value.to_string()));
        }
        let mut coords = [0.0_f64; 4];
        for (slot, part) in coords.iter_mut().zip(parts.iter()) {
            *slot = part
                .parse::<f64>()
                .map_err(|_| SubsetError::BadBbox(value.to_string()))?;
        }
        Ok(Self::new(coords[0], coords[1], coords[2], coords[3]))
    }

    /// Inclusive on all edges.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}
