//! Static port configuration.
//!
//! Every record is a plain serde struct with a `Default`, so a partial
//! JSON document fills in the rest. Enumerated fields (berth type,
//! equipment type, truck type, location kind) are kept as strings and
//! checked by [`PortConfig::validate`], which names the offending field.
//!
//! # Example
//!
//! ```
//! use u_portsim::config::{BerthConfig, PortConfig};
//!
//! let mut config = PortConfig::default();
//! config.berths.push(BerthConfig::new("B9", "tanker", 10_000, 2));
//! let err = config.validate().unwrap_err();
//! assert!(err.to_string().contains("berths[B9].berth_type"));
//! ```

use serde::{Deserialize, Serialize};

use crate::disruption::{builtin_strategies, builtin_templates, DisruptionTemplate, RecoveryStrategy};
use crate::error::{PortError, PortResult};
use crate::models::WearModel;
use crate::validation;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    pub simulation: SimulationParams,
    pub berths: Vec<BerthConfig>,
    pub equipment: Vec<EquipmentGroupConfig>,
    pub trucks: Vec<TruckGroupConfig>,
    pub crews: Vec<CrewConfig>,
    pub spare_parts: Vec<SparePartConfig>,
    pub locations: Vec<LocationConfig>,
    pub yard: YardConfig,
    pub optimizer: OptimizerConfig,
    pub maintenance: MaintenanceConfig,
    pub dispatch: DispatchConfig,
    pub disruption: DisruptionConfig,
}

impl PortConfig {
    /// Returns the first problem found, as [`PortError::Configuration`].
    ///
    /// Use [`validation::validate_config`] to collect every problem.
    pub fn validate(&self) -> PortResult<()> {
        validation::validate_config(self).map_err(|errors| {
            errors
                .into_iter()
                .next()
                .map(|e| PortError::config(e.field, e.message))
                .unwrap_or_else(|| PortError::config("config", "invalid"))
        })
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.simulation.seed = seed;
        self
    }

    /// A configuration with no stochastic arrivals, breakdowns or disruptions.
    ///
    /// Useful for scripted scenarios.
    pub fn scripted() -> Self {
        let mut config = Self::default();
        config.simulation.generate_arrivals = false;
        config.maintenance.wear.base_failure_probability = 0.0;
        config.disruption.sampling_enabled = false;
        config.disruption.cascade_base_probability = 0.0;
        config.disruption.complication_probability = 0.0;
        config.dispatch.background_jobs_per_hour = 0.0;
        config
    }

    /// Total quay cranes installed across berths.
    pub fn total_cranes(&self) -> u32 {
        self.berths.iter().map(|b| b.crane_count).sum()
    }
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationParams::default(),
            berths: vec![
                BerthConfig::new("B1", "container", 20_000, 4).with_name("Container Terminal North"),
                BerthConfig::new("B2", "container", 15_000, 3).with_name("Container Terminal South"),
                BerthConfig::new("B3", "bulk", 30_000, 2).with_name("Bulk Quay"),
                BerthConfig::new("B4", "mixed", 25_000, 3).with_name("Multipurpose Quay"),
            ],
            equipment: vec![
                EquipmentGroupConfig::new("quay_crane", 12, 8.0),
                EquipmentGroupConfig::new("rtg", 10, 6.0),
                EquipmentGroupConfig::new("reach_stacker", 4, 5.0),
                EquipmentGroupConfig::new("tractor", 20, 4.0),
                EquipmentGroupConfig::new("straddle_carrier", 4, 3.0),
            ],
            trucks: vec![
                TruckGroupConfig::new("standard", 20, "PORT_YARD"),
                TruckGroupConfig::new("reefer", 5, "PORT_YARD"),
                TruckGroupConfig::new("hazmat", 2, "DEPOT_EAST"),
            ],
            crews: vec![
                CrewConfig::new("CREW-A", 3, &["mechanical", "electrical"], 85.0),
                CrewConfig::new("CREW-B", 2, &["mechanical", "hydraulic"], 75.0),
                CrewConfig::new("CREW-C", 4, &["mechanical", "electrical", "hydraulic"], 95.0),
            ],
            spare_parts: vec![
                SparePartConfig::new("filter_set", 20, 5, 20, 48.0, 120.0),
                SparePartConfig::new("hydraulic_kit", 10, 3, 10, 72.0, 850.0),
                SparePartConfig::new("electrical_kit", 8, 2, 8, 72.0, 640.0),
                SparePartConfig::new("sensor_pack", 10, 3, 10, 48.0, 300.0),
                SparePartConfig::new("overhaul_kit", 2, 0, 2, 168.0, 5_000.0),
            ],
            locations: vec![
                LocationConfig::new("PORT_YARD", "port", 51.9500, 4.0500),
                LocationConfig::new("PORT_GATE", "port", 51.9480, 4.0800),
                LocationConfig::new("RAIL_HUB", "rail", 51.8800, 4.3000),
                LocationConfig::new("DC_CITY", "warehouse", 51.9000, 4.4800),
                LocationConfig::new("DEPOT_EAST", "depot", 51.9200, 4.5500),
                LocationConfig::new("BORDER_EAST", "border", 51.8500, 6.1000),
                LocationConfig::new("DC_INLAND", "warehouse", 51.4500, 7.0000),
            ],
            yard: YardConfig::default(),
            optimizer: OptimizerConfig::default(),
            maintenance: MaintenanceConfig::default(),
            dispatch: DispatchConfig::default(),
            disruption: DisruptionConfig::default(),
        }
    }
}

/// Run-level parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// Random seed.
    pub seed: u64,
    /// Default horizon for `run` when none is given (hours).
    pub duration_hours: f64,
    /// Generate stochastic ship arrivals.
    pub generate_arrivals: bool,
    /// Mean hours between arrivals (exponential).
    pub mean_interarrival_hours: f64,
    /// Share of container ships among generated arrivals.
    pub container_ship_share: f64,
    /// Share of bulk ships (the rest are mixed).
    pub bulk_ship_share: f64,
    pub min_ship_teu: u32,
    pub max_ship_teu: u32,
    /// Container moves per TEU of vessel size, each direction, drawn in this range.
    pub min_moves_per_teu: f64,
    pub max_moves_per_teu: f64,
    /// Peak-season mode (GA optimizer, congestion).
    pub peak_season: bool,
    /// Retry interval of a waiting ship polling for its berth.
    pub ship_poll_interval_hours: f64,
    /// Hours between berth allocation rounds.
    pub allocation_interval_hours: f64,
    pub docking_hours: f64,
    pub departing_hours: f64,
    /// Record a resume trace (used for determinism checks).
    pub trace: bool,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            seed: 42,
            duration_hours: 168.0,
            generate_arrivals: true,
            mean_interarrival_hours: 6.0,
            container_ship_share: 0.6,
            bulk_ship_share: 0.25,
            min_ship_teu: 2_000,
            max_ship_teu: 20_000,
            min_moves_per_teu: 0.02,
            max_moves_per_teu: 0.05,
            peak_season: false,
            ship_poll_interval_hours: 0.5,
            allocation_interval_hours: 1.0,
            docking_hours: 1.0,
            departing_hours: 0.5,
            trace: false,
        }
    }
}

/// One berth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BerthConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// `container`, `bulk` or `mixed`.
    pub berth_type: String,
    /// Largest ship accepted (TEU).
    pub capacity: u32,
    pub crane_count: u32,
}

impl BerthConfig {
    pub fn new(id: impl Into<String>, berth_type: impl Into<String>, capacity: u32, crane_count: u32) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            berth_type: berth_type.into(),
            capacity,
            crane_count,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// A group of identical equipment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentGroupConfig {
    /// `quay_crane`, `rtg`, `reach_stacker`, `tractor` or `straddle_carrier`.
    pub equipment_type: String,
    pub count: u32,
    #[serde(default)]
    pub age_years: f64,
}

impl EquipmentGroupConfig {
    pub fn new(equipment_type: impl Into<String>, count: u32, age_years: f64) -> Self {
        Self {
            equipment_type: equipment_type.into(),
            count,
            age_years,
        }
    }
}

/// A group of identical trucks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruckGroupConfig {
    /// `standard`, `reefer` or `hazmat`.
    pub truck_type: String,
    pub count: u32,
    /// Location id where the trucks start.
    pub home_location: String,
    #[serde(default = "default_speed")]
    pub average_speed_kmh: f64,
}

fn default_speed() -> f64 {
    50.0
}

impl TruckGroupConfig {
    pub fn new(truck_type: impl Into<String>, count: u32, home_location: impl Into<String>) -> Self {
        Self {
            truck_type: truck_type.into(),
            count,
            home_location: home_location.into(),
            average_speed_kmh: default_speed(),
        }
    }
}

/// A maintenance crew.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewConfig {
    pub id: String,
    pub size: u32,
    pub skills: Vec<String>,
    pub hourly_rate: f64,
}

impl CrewConfig {
    pub fn new(id: impl Into<String>, size: u32, skills: &[&str], hourly_rate: f64) -> Self {
        Self {
            id: id.into(),
            size,
            skills: skills.iter().map(|s| s.to_string()).collect(),
            hourly_rate,
        }
    }
}

/// A spare-part inventory line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparePartConfig {
    pub id: String,
    pub stock: u32,
    pub reorder_point: u32,
    pub reorder_quantity: u32,
    pub lead_time_hours: f64,
    pub unit_cost: f64,
}

impl SparePartConfig {
    pub fn new(
        id: impl Into<String>,
        stock: u32,
        reorder_point: u32,
        reorder_quantity: u32,
        lead_time_hours: f64,
        unit_cost: f64,
    ) -> Self {
        Self {
            id: id.into(),
            stock,
            reorder_point,
            reorder_quantity,
            lead_time_hours,
            unit_cost,
        }
    }
}

/// A truck origin/destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    pub id: String,
    /// `port`, `terminal`, `depot`, `warehouse`, `rail` or `border`.
    pub kind: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationConfig {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            latitude,
            longitude,
        }
    }
}

/// Yard layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YardConfig {
    pub blocks: u32,
    pub rows: u32,
    pub bays: u32,
    pub tiers: u32,
    /// Hours after which unclaimed containers leave by rail/barge.
    pub dwell_hours: f64,
    /// Crane hours per relocation move.
    pub relocation_hours: f64,
}

impl Default for YardConfig {
    fn default() -> Self {
        Self {
            blocks: 6,
            rows: 10,
            bays: 20,
            tiers: 5,
            dwell_hours: 36.0,
            relocation_hours: 0.05,
        }
    }
}

/// Berth allocation optimizer parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub population_size: usize,
    pub max_generations: usize,
    pub elitism_rate: f64,
    pub tournament_size: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    /// `best − mean` below which a generation counts as stalled.
    pub convergence_threshold: f64,
    /// Stalled generations tolerated before stopping.
    pub stall_generations: usize,
    /// Heuristic weight of ship priority.
    pub priority_weight: f64,
    /// GA weight of average waiting time.
    pub efficiency_weight: f64,
    /// Fitness penalty per unsuitable gene.
    pub infeasibility_penalty: f64,
    pub moves_per_crane_hour: f64,
    /// Efficiency of the i-th crane on a ship is `decay^i`.
    pub crane_efficiency_decay: f64,
    pub peak_congestion_factor: f64,
    pub docking_overhead_hours: f64,
    pub revenue_per_container: f64,
    /// Use the GA from this many waiting ships on.
    pub ga_ship_threshold: usize,
    /// Longest acceptable wait, used as the on-time deadline.
    pub max_wait_hours: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            max_generations: 100,
            elitism_rate: 0.1,
            tournament_size: 3,
            crossover_rate: 0.8,
            mutation_rate: 0.1,
            convergence_threshold: 1e-3,
            stall_generations: 10,
            priority_weight: 2.0,
            efficiency_weight: 1.0,
            infeasibility_penalty: 1.0e7,
            moves_per_crane_hour: 25.0,
            crane_efficiency_decay: 0.9,
            peak_congestion_factor: 1.3,
            docking_overhead_hours: 1.0,
            revenue_per_container: 150.0,
            ga_ship_threshold: 8,
            max_wait_hours: 24.0,
        }
    }
}

/// Maintenance scheduler parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub window_start_hour: f64,
    pub window_end_hour: f64,
    pub max_concurrent_tasks: usize,
    /// Score reduction per hour a task waits.
    pub aging_rate: f64,
    pub monitoring_interval_hours: f64,
    pub dispatch_interval_hours: f64,
    /// Hours between preventive services.
    pub preventive_interval_hours: f64,
    pub wear: WearModel,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            window_start_hour: 22.0,
            window_end_hour: 6.0,
            max_concurrent_tasks: 3,
            aging_rate: 0.05,
            monitoring_interval_hours: 4.0,
            dispatch_interval_hours: 1.0,
            preventive_interval_hours: 720.0,
            wear: WearModel::default(),
        }
    }
}

/// Truck dispatcher parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Score reduction per hour a job waits.
    pub aging_rate: f64,
    pub dispatch_interval_hours: f64,
    pub traffic_update_interval_hours: f64,
    pub pickup_hours: f64,
    pub delivery_hours: f64,
    /// Trucks below this fuel share are not assigned.
    pub min_fuel_level: f64,
    /// Trucks below this fuel share refuel after a job.
    pub refuel_threshold: f64,
    pub refuel_hours: f64,
    /// Tank share burned per km.
    pub fuel_per_km: f64,
    /// Score penalty per unit of missing fuel.
    pub fuel_penalty_weight: f64,
    /// Km between truck services.
    pub service_interval_km: f64,
    /// Score penalty once a service is due.
    pub maintenance_due_penalty: f64,
    /// Hours a job has before its deadline.
    pub default_deadline_hours: f64,
    /// Truck jobs spawned per 100 discharged containers.
    pub jobs_per_hundred_containers: f64,
    /// Background (non-ship) jobs per hour.
    pub background_jobs_per_hour: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            aging_rate: 0.5,
            dispatch_interval_hours: 0.25,
            traffic_update_interval_hours: 1.0,
            pickup_hours: 0.25,
            delivery_hours: 0.25,
            min_fuel_level: 0.10,
            refuel_threshold: 0.20,
            refuel_hours: 0.5,
            fuel_per_km: 0.002,
            fuel_penalty_weight: 20.0,
            service_interval_km: 15_000.0,
            maintenance_due_penalty: 25.0,
            default_deadline_hours: 8.0,
            jobs_per_hundred_containers: 2.0,
            background_jobs_per_hour: 0.5,
        }
    }
}

/// A supply-chain node declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    /// `port`, `terminal`, `yard`, `land_transport`, `rail`, `customs` or `warehouse`.
    pub kind: String,
    pub region: String,
    pub baseline_capacity: f64,
    /// Resource pool (`quay_cranes`, `rtg_units`, `truck_slots`) that follows this node.
    #[serde(default)]
    pub bound_pool: Option<String>,
}

impl NodeConfig {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, baseline_capacity: f64) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            region: "local".into(),
            baseline_capacity,
            bound_pool: None,
        }
    }

    pub fn with_pool(mut self, pool: impl Into<String>) -> Self {
        self.bound_pool = Some(pool.into());
        self
    }
}

/// Disruption modeler parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisruptionConfig {
    /// Sample templates every hour.
    pub sampling_enabled: bool,
    pub complication_probability: f64,
    pub cascade_base_probability: f64,
    pub templates: Vec<DisruptionTemplate>,
    pub strategies: Vec<RecoveryStrategy>,
    pub nodes: Vec<NodeConfig>,
}

impl Default for DisruptionConfig {
    fn default() -> Self {
        Self {
            sampling_enabled: true,
            complication_probability: 0.1,
            cascade_base_probability: 0.02,
            templates: builtin_templates(),
            strategies: builtin_strategies(),
            nodes: vec![
                NodeConfig::new("port_operations", "port", 100.0).with_pool("quay_cranes"),
                NodeConfig::new("yard_operations", "yard", 100.0).with_pool("rtg_units"),
                NodeConfig::new("land_transport", "land_transport", 100.0).with_pool("truck_slots"),
                NodeConfig::new("customs", "customs", 100.0),
                NodeConfig::new("rail", "rail", 100.0),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        PortConfig::default().validate().unwrap();
        PortConfig::scripted().validate().unwrap();
        assert_eq!(PortConfig::default().total_cranes(), 12);
    }

    #[test]
    fn test_json_round_trip_with_partial_document() {
        let json = r#"{ "simulation": { "seed": 7 }, "berths": [
            { "id": "X", "berth_type": "bulk", "capacity": 5000, "crane_count": 1 } ] }"#;
        let config: PortConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.simulation.seed, 7);
        assert_eq!(config.berths.len(), 1);
        assert!((config.simulation.mean_interarrival_hours - 6.0).abs() < 1e-12);
        assert_eq!(config.disruption.templates.len(), 8);

        let text = serde_json::to_string(&config).unwrap();
        let back: PortConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.berths[0].id, "X");
    }

    #[test]
    fn test_zero_crane_count_named() {
        let mut config = PortConfig::default();
        config.berths[0].crane_count = 0;
        match config.validate() {
            Err(PortError::Configuration { field, .. }) => assert_eq!(field, "berths[B1].crane_count"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
