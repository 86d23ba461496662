use crate::loading::{TrajectorySample, VehicleClass};

/// Sliding-window and occupancy-model parameters of one aggregation run.
///
/// The three windows are independent so each metric can match its own time
/// constant: speed reacts instantly, flow needs enough vehicles to smooth
/// random fluctuation, occupancy sits in between.
#[derive(Debug, Clone)]
pub struct AggregationConfig {
    /// Speed window width in seconds.
    pub speed_window: f64,
    /// Flow window width in seconds.
    pub flow_window: f64,
    /// Occupancy window width in seconds.
    pub occupancy_window: f64,
    /// Where a vehicle's occupied length comes from.
    pub vehicle_length: VehicleLengthSource,
    /// How occupied length is split across a node boundary.
    pub spillover: SpilloverPolicy,
    /// Base `k` of the `log(1 + n) / log(k)` flow compression applied at
    /// export; `None` keeps raw counts.
    pub flow_scale_base: Option<f64>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            speed_window: 2.0,
            flow_window: 10.0,
            occupancy_window: 4.0,
            vehicle_length: VehicleLengthSource::ClassTable(VehicleLengthTable::default()),
            spillover: SpilloverPolicy::BoundarySplit {
                current_share: 0.75,
            },
            flow_scale_base: None,
        }
    }
}

impl AggregationConfig {
    /// Largest of the three windows; bounds the usable output time range.
    pub fn max_window(&self) -> f64 {
        self.speed_window
            .max(self.flow_window)
            .max(self.occupancy_window)
    }
}

/// Where a vehicle's physical length comes from.
#[derive(Debug, Clone)]
pub enum VehicleLengthSource {
    /// Fixed per-class lengths; unknown classes fall back to a car.
    ClassTable(VehicleLengthTable),
    /// The observed length field of each sample, with a fallback for samples
    /// missing one.
    Observed { default_length: f64 },
}

impl VehicleLengthSource {
    pub fn length_of(&self, sample: &TrajectorySample) -> f64 {
        match self {
            Self::ClassTable(table) => table.length_of(sample.class),
            Self::Observed { default_length } => sample.length.unwrap_or(*default_length),
        }
    }
}

/// Occupied length per vehicle class, in meters.
#[derive(Debug, Clone)]
pub struct VehicleLengthTable {
    pub car: f64,
    pub medium: f64,
    pub heavy: f64,
    pub motorcycle: f64,
}

impl Default for VehicleLengthTable {
    fn default() -> Self {
        Self {
            car: 4.0,
            medium: 6.0,
            heavy: 10.0,
            motorcycle: 2.0,
        }
    }
}

impl VehicleLengthTable {
    pub fn length_of(&self, class: Option<VehicleClass>) -> f64 {
        match class {
            Some(VehicleClass::Car) | None => self.car,
            Some(VehicleClass::Medium) => self.medium,
            Some(VehicleClass::Heavy) => self.heavy,
            Some(VehicleClass::Motorcycle) => self.motorcycle,
        }
    }
}

/// How a vehicle's occupied length is allocated when it sits at a node
/// boundary. The exact split is a policy parameter, not a constant the
/// sources agree on.
#[derive(Debug, Clone, Copy)]
pub enum SpilloverPolicy {
    /// A vehicle always occupies its own node in full.
    Disabled,
    /// When the vehicle's very next sample lies in a direct-successor node,
    /// `current_share` of its length stays on the current node and the rest
    /// spills into that successor. Avoids a discontinuity when a long
    /// vehicle straddles two nodes.
    BoundarySplit { current_share: f64 },
}
