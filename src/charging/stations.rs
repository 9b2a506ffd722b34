//! Nearby charging station catalogue (mock data)

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Plug standards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    Tesla,
    Ccs,
    Chademo,
    J1772,
}

impl FromStr for ConnectorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tesla" => Ok(ConnectorType::Tesla),
            "ccs" => Ok(ConnectorType::Ccs),
            "chademo" => Ok(ConnectorType::Chademo),
            "j1772" => Ok(ConnectorType::J1772),
            other => Err(format!("Invalid connector type: {}", other)),
        }
    }
}

impl fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectorType::Tesla => "tesla",
            ConnectorType::Ccs => "ccs",
            ConnectorType::Chademo => "chademo",
            ConnectorType::J1772 => "j1772",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingStation {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub connector_types: Vec<ConnectorType>,
    pub power_levels_kw: Vec<u32>,
    pub available_stalls: u32,
    pub total_stalls: u32,
    pub is_operational: bool,
    pub cost_per_kwh: f64,
    pub distance_km: f64,
}

impl ChargingStation {
    pub fn max_power_kw(&self) -> u32 {
        self.power_levels_kw.iter().copied().max().unwrap_or(0)
    }

    pub fn availability_percentage(&self) -> f64 {
        if self.total_stalls == 0 {
            return 0.0;
        }
        self.available_stalls as f64 / self.total_stalls as f64 * 100.0
    }

    pub fn supports_any(&self, connectors: &[ConnectorType]) -> bool {
        connectors.iter().any(|c| self.connector_types.contains(c))
    }
}

struct StationSeed {
    name: &'static str,
    latitude: f64,
    longitude: f64,
    connectors: &'static [ConnectorType],
    power_levels_kw: &'static [u32],
    total_stalls: u32,
    min_available: u32,
    cost_per_kwh: f64,
    distance_km: f64,
}

const CATALOGUE: [StationSeed; 5] = [
    StationSeed {
        name: "Supercharger Downtown",
        latitude: 37.7749,
        longitude: -122.4194,
        connectors: &[ConnectorType::Tesla, ConnectorType::Ccs],
        power_levels_kw: &[150, 250],
        total_stalls: 12,
        min_available: 6,
        cost_per_kwh: 0.35,
        distance_km: 0.5,
    },
    StationSeed {
        name: "DC Fast Charger Main St",
        latitude: 37.7750,
        longitude: -122.4200,
        connectors: &[ConnectorType::Ccs, ConnectorType::Chademo],
        power_levels_kw: &[50, 150],
        total_stalls: 4,
        min_available: 2,
        cost_per_kwh: 0.40,
        distance_km: 1.2,
    },
    StationSeed {
        name: "Tesla Supercharger Highway",
        latitude: 37.7760,
        longitude: -122.4100,
        connectors: &[ConnectorType::Tesla],
        power_levels_kw: &[250],
        total_stalls: 16,
        min_available: 10,
        cost_per_kwh: 0.30,
        distance_km: 2.8,
    },
    StationSeed {
        name: "Shopping Mall L2 Chargers",
        latitude: 37.7730,
        longitude: -122.4220,
        connectors: &[ConnectorType::J1772],
        power_levels_kw: &[11],
        total_stalls: 8,
        min_available: 4,
        cost_per_kwh: 0.25,
        distance_km: 3.5,
    },
    StationSeed {
        name: "Fast Charge Plaza",
        latitude: 37.7800,
        longitude: -122.4150,
        connectors: &[ConnectorType::Ccs, ConnectorType::Chademo, ConnectorType::Tesla],
        power_levels_kw: &[50, 150, 250],
        total_stalls: 20,
        min_available: 12,
        cost_per_kwh: 0.38,
        distance_km: 4.2,
    },
];

/// The mock catalogue with freshly randomized stall availability
pub fn mock_stations<R: Rng + ?Sized>(rng: &mut R) -> Vec<ChargingStation> {
    CATALOGUE
        .iter()
        .map(|seed| ChargingStation {
            id: uuid::Uuid::new_v4().to_string(),
            name: seed.name.to_string(),
            latitude: seed.latitude,
            longitude: seed.longitude,
            connector_types: seed.connectors.to_vec(),
            power_levels_kw: seed.power_levels_kw.to_vec(),
            available_stalls: rng.gen_range(seed.min_available..=seed.total_stalls),
            total_stalls: seed.total_stalls,
            is_operational: true,
            cost_per_kwh: seed.cost_per_kwh,
            distance_km: seed.distance_km,
        })
        .collect()
}

/// Stations within `max_distance_km`, optionally restricted to the given
/// connectors (any match) and a minimum peak power, nearest first
pub fn nearby_stations<R: Rng + ?Sized>(
    rng: &mut R,
    max_distance_km: f64,
    connectors: &[ConnectorType],
    min_power_kw: Option<u32>,
) -> Vec<ChargingStation> {
    let mut stations: Vec<ChargingStation> = mock_stations(rng)
        .into_iter()
        .filter(|s| s.distance_km <= max_distance_km)
        .filter(|s| connectors.is_empty() || s.supports_any(connectors))
        .filter(|s| min_power_kw.is_none_or(|p| s.max_power_kw() >= p))
        .collect();
    stations.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    stations
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn availability_stays_within_stalls() {
        for station in mock_stations(&mut rng()) {
            assert!(station.available_stalls <= station.total_stalls);
            assert!(station.availability_percentage() > 0.0);
        }
    }

    #[test]
    fn distance_filter_and_order() {
        let stations = nearby_stations(&mut rng(), 3.0, &[], None);
        let names: Vec<&str> = stations.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Supercharger Downtown",
                "DC Fast Charger Main St",
                "Tesla Supercharger Highway"
            ]
        );
    }

    #[test]
    fn connector_and_power_filters() {
        let stations = nearby_stations(&mut rng(), 10.0, &[ConnectorType::Chademo], None);
        assert_eq!(stations.len(), 2);

        let stations = nearby_stations(&mut rng(), 10.0, &[], Some(200));
        assert!(stations.iter().all(|s| s.max_power_kw() >= 200));
        assert_eq!(stations.len(), 3);

        let stations = nearby_stations(&mut rng(), 10.0, &[ConnectorType::J1772], Some(50));
        assert!(stations.is_empty());
    }

    #[test]
    fn parses_connector_names() {
        assert_eq!("CCS".parse::<ConnectorType>(), Ok(ConnectorType::Ccs));
        assert!("type2".parse::<ConnectorType>().is_err());
    }
}
