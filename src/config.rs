//! Simulation settings: stochastic parameters, capacities, staffing costs.
//!
//! Settings load from a JSON file or start from the built-in defaults and are
//! adjusted with the `with_*` builders. `validate` runs before any event is
//! scheduled; a rejected configuration never starts a replication.

use std::fs;
use std::path::Path;

use rand::Rng;
use rand_distr::{Distribution, Exp, Normal};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::patient::Priority;

/// Slack allowed when checking that a percentage table sums to 100.
const TABLE_SUM_TOLERANCE: f64 = 0.01;

/// A service or inter-arrival time distribution, in minutes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceDistribution {
    Exponential { mean: f64 },
    Normal { mean: f64, std_dev: f64 },
}

impl ServiceDistribution {
    pub fn validate(&self, context: &str) -> Result<(), ConfigError> {
        match *self {
            ServiceDistribution::Exponential { mean } => {
                if !mean.is_finite() || mean <= 0.0 {
                    return Err(ConfigError::InvalidMean {
                        context: context.to_string(),
                        mean,
                    });
                }
            }
            ServiceDistribution::Normal { mean, std_dev } => {
                if !mean.is_finite() || mean <= 0.0 {
                    return Err(ConfigError::InvalidMean {
                        context: context.to_string(),
                        mean,
                    });
                }
                if !std_dev.is_finite() || std_dev < 0.0 {
                    return Err(ConfigError::InvalidStdDev {
                        context: context.to_string(),
                        std_dev,
                    });
                }
            }
        }
        Ok(())
    }

    /// Pre-build the sampler so the hot path draws without re-validating.
    pub fn build(&self, context: &str) -> Result<BuiltDistribution, ConfigError> {
        self.validate(context)?;
        match *self {
            ServiceDistribution::Exponential { mean } => {
                let dist = Exp::new(1.0 / mean).map_err(|_| ConfigError::InvalidMean {
                    context: context.to_string(),
                    mean,
                })?;
                Ok(BuiltDistribution::Exponential(dist))
            }
            ServiceDistribution::Normal { mean, std_dev } => {
                let dist = Normal::new(mean, std_dev).map_err(|_| ConfigError::InvalidStdDev {
                    context: context.to_string(),
                    std_dev,
                })?;
                Ok(BuiltDistribution::Normal(dist))
            }
        }
    }
}

/// A validated, ready-to-sample distribution. Samples clamp at zero:
/// a normal draw below zero counts as an instantaneous service.
#[derive(Debug, Clone, Copy)]
pub enum BuiltDistribution {
    Exponential(Exp<f64>),
    Normal(Normal<f64>),
}

impl BuiltDistribution {
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        let value = match self {
            BuiltDistribution::Exponential(dist) => dist.sample(rng),
            BuiltDistribution::Normal(dist) => dist.sample(rng),
        };
        value.max(0.0)
    }
}

/// Categorical distribution over the five priorities, in percent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriorityTable {
    pub critical: f64,
    pub urgent: f64,
    pub moderate: f64,
    pub low: f64,
    pub non_urgent: f64,
}

impl PriorityTable {
    /// A degenerate table assigning the whole mass to one priority.
    pub fn certain(priority: Priority) -> Self {
        let mut table = Self {
            critical: 0.0,
            urgent: 0.0,
            moderate: 0.0,
            low: 0.0,
            non_urgent: 0.0,
        };
        *table.share_mut(priority) = 100.0;
        table
    }

    pub fn share(&self, priority: Priority) -> f64 {
        match priority {
            Priority::Critical => self.critical,
            Priority::Urgent => self.urgent,
            Priority::Moderate => self.moderate,
            Priority::Low => self.low,
            Priority::NonUrgent => self.non_urgent,
        }
    }

    fn share_mut(&mut self, priority: Priority) -> &mut f64 {
        match priority {
            Priority::Critical => &mut self.critical,
            Priority::Urgent => &mut self.urgent,
            Priority::Moderate => &mut self.moderate,
            Priority::Low => &mut self.low,
            Priority::NonUrgent => &mut self.non_urgent,
        }
    }

    pub fn sum(&self) -> f64 {
        Priority::ALL.iter().map(|p| self.share(*p)).sum()
    }

    pub fn validate(&self, table: &str) -> Result<(), ConfigError> {
        for priority in Priority::ALL {
            let value = self.share(priority);
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::PercentageRange {
                    table: table.to_string(),
                    value,
                });
            }
        }
        let sum = self.sum();
        if (sum - 100.0).abs() > TABLE_SUM_TOLERANCE {
            return Err(ConfigError::TableSum {
                table: table.to_string(),
                sum,
            });
        }
        Ok(())
    }

    /// Categorical draw over the table's shares.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Priority {
        let roll = rng.gen::<f64>() * self.sum();
        let mut cumulative = 0.0;
        for priority in Priority::ALL {
            cumulative += self.share(priority);
            if roll < cumulative {
                return priority;
            }
        }
        Priority::NonUrgent
    }
}

/// Probability, in percent, that the Doctor admits a patient, per priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdmissionTable {
    pub critical: f64,
    pub urgent: f64,
    pub moderate: f64,
    pub low: f64,
}

impl AdmissionTable {
    pub fn uniform(percentage: f64) -> Self {
        Self {
            critical: percentage,
            urgent: percentage,
            moderate: percentage,
            low: percentage,
        }
    }

    pub fn percentage_for(&self, priority: Priority) -> Option<f64> {
        match priority {
            Priority::Critical => Some(self.critical),
            Priority::Urgent => Some(self.urgent),
            Priority::Moderate => Some(self.moderate),
            Priority::Low => Some(self.low),
            Priority::NonUrgent => None,
        }
    }

    pub fn validate(&self, table: &str) -> Result<(), ConfigError> {
        for value in [self.critical, self.urgent, self.moderate, self.low] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::PercentageRange {
                    table: table.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Run length: a fixed number of generated patients (queue drains naturally)
/// or a fixed span of simulated minutes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    Patients(u64),
    Minutes(f64),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeneralSettings {
    pub number_of_runs: usize,
    pub seed: u64,
    pub warm_up_minutes: f64,
    pub horizon: Horizon,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            number_of_runs: 50,
            seed: 2024,
            warm_up_minutes: 1140.0,
            horizon: Horizon::Minutes(10080.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceCapacities {
    pub receptionist: u32,
    pub nurse: u32,
    pub doctor: u32,
    /// Seats in front of Reception. An arrival finding them all taken is
    /// declined at the door. Zero means everyone is declined.
    pub waiting_room: u32,
}

impl Default for ResourceCapacities {
    fn default() -> Self {
        Self {
            receptionist: 1,
            nurse: 2,
            doctor: 4,
            waiting_room: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArrivalSettings {
    pub interarrival: ServiceDistribution,
}

impl Default for ArrivalSettings {
    fn default() -> Self {
        Self {
            interarrival: ServiceDistribution::Exponential { mean: 10.0 },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReceptionSettings {
    pub service: ServiceDistribution,
    /// Categorical assessment over all five priorities.
    pub assessment: PriorityTable,
}

impl Default for ReceptionSettings {
    fn default() -> Self {
        Self {
            service: ServiceDistribution::Exponential { mean: 7.0 },
            assessment: PriorityTable {
                critical: 5.0,
                urgent: 15.0,
                moderate: 30.0,
                low: 30.0,
                non_urgent: 20.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NurseSettings {
    pub service: ServiceDistribution,
    /// Re-assessment of patients arriving as Moderate.
    pub reassessment_moderate: PriorityTable,
    /// Re-assessment of patients arriving as Low.
    pub reassessment_low: PriorityTable,
}

impl Default for NurseSettings {
    fn default() -> Self {
        Self {
            service: ServiceDistribution::Exponential { mean: 25.0 },
            reassessment_moderate: PriorityTable {
                critical: 10.0,
                urgent: 20.0,
                moderate: 50.0,
                low: 15.0,
                non_urgent: 5.0,
            },
            reassessment_low: PriorityTable {
                critical: 2.0,
                urgent: 8.0,
                moderate: 15.0,
                low: 55.0,
                non_urgent: 20.0,
            },
        }
    }
}

/// Doctor consultation times per priority. NonUrgent never reaches the
/// Doctor, so it has no entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DoctorServiceTimes {
    pub critical: ServiceDistribution,
    pub urgent: ServiceDistribution,
    pub moderate: ServiceDistribution,
    pub low: ServiceDistribution,
}

impl DoctorServiceTimes {
    pub fn uniform(distribution: ServiceDistribution) -> Self {
        Self {
            critical: distribution,
            urgent: distribution,
            moderate: distribution,
            low: distribution,
        }
    }
}

impl Default for DoctorServiceTimes {
    fn default() -> Self {
        Self {
            critical: ServiceDistribution::Exponential { mean: 90.0 },
            urgent: ServiceDistribution::Exponential { mean: 70.0 },
            moderate: ServiceDistribution::Exponential { mean: 60.0 },
            low: ServiceDistribution::Exponential { mean: 45.0 },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DoctorSettings {
    pub service: DoctorServiceTimes,
    pub admission: AdmissionTable,
}

impl Default for DoctorSettings {
    fn default() -> Self {
        Self {
            service: DoctorServiceTimes::default(),
            admission: AdmissionTable {
                critical: 90.0,
                urgent: 70.0,
                moderate: 40.0,
                low: 15.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PatienceSettings {
    /// Cumulative queue wait beyond which a patient considers leaving.
    pub threshold_minutes: f64,
    /// Chance the patient actually leaves at a checkpoint, in percent.
    pub abandonment_percentage: f64,
}

impl Default for PatienceSettings {
    fn default() -> Self {
        Self {
            threshold_minutes: 60.0,
            abandonment_percentage: 25.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdmissionFees {
    pub critical: f64,
    pub urgent: f64,
    pub moderate: f64,
    pub low: f64,
}

impl AdmissionFees {
    pub fn fee_for(&self, priority: Priority) -> Option<f64> {
        match priority {
            Priority::Critical => Some(self.critical),
            Priority::Urgent => Some(self.urgent),
            Priority::Moderate => Some(self.moderate),
            Priority::Low => Some(self.low),
            Priority::NonUrgent => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SalarySettings {
    pub receptionist: f64,
    pub nurse: f64,
    pub doctor: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FinancialSettings {
    /// Flat fee billed for every counted patient.
    pub base_fee: f64,
    /// Extra fee billed when the Doctor admits, by priority at admission.
    pub admission_fees: AdmissionFees,
    /// Staff cost per simulated minute, per head.
    pub salaries_per_minute: SalarySettings,
}

impl Default for FinancialSettings {
    fn default() -> Self {
        Self {
            base_fee: 2500.0,
            admission_fees: AdmissionFees {
                critical: 12000.0,
                urgent: 8000.0,
                moderate: 5000.0,
                low: 3000.0,
            },
            salaries_per_minute: SalarySettings {
                receptionist: 2.25,
                nurse: 3.50,
                doctor: 4.00,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SimulationConfig {
    pub general: GeneralSettings,
    pub resources: ResourceCapacities,
    pub arrivals: ArrivalSettings,
    pub reception: ReceptionSettings,
    pub nurse: NurseSettings,
    pub doctor: DoctorSettings,
    pub patience: PatienceSettings,
    pub financials: FinancialSettings,
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate settings from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_runs(mut self, number_of_runs: usize) -> Self {
        self.general.number_of_runs = number_of_runs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.general.seed = seed;
        self
    }

    pub fn with_warm_up(mut self, minutes: f64) -> Self {
        self.general.warm_up_minutes = minutes;
        self
    }

    pub fn with_horizon(mut self, horizon: Horizon) -> Self {
        self.general.horizon = horizon;
        self
    }

    pub fn with_capacities(mut self, receptionist: u32, nurse: u32, doctor: u32) -> Self {
        self.resources.receptionist = receptionist;
        self.resources.nurse = nurse;
        self.resources.doctor = doctor;
        self
    }

    pub fn with_waiting_room(mut self, seats: u32) -> Self {
        self.resources.waiting_room = seats;
        self
    }

    pub fn with_interarrival(mut self, distribution: ServiceDistribution) -> Self {
        self.arrivals.interarrival = distribution;
        self
    }

    pub fn with_reception_service(mut self, distribution: ServiceDistribution) -> Self {
        self.reception.service = distribution;
        self
    }

    pub fn with_assessment(mut self, table: PriorityTable) -> Self {
        self.reception.assessment = table;
        self
    }

    pub fn with_nurse_service(mut self, distribution: ServiceDistribution) -> Self {
        self.nurse.service = distribution;
        self
    }

    pub fn with_nurse_reassessment(mut self, moderate: PriorityTable, low: PriorityTable) -> Self {
        self.nurse.reassessment_moderate = moderate;
        self.nurse.reassessment_low = low;
        self
    }

    pub fn with_doctor_services(mut self, service: DoctorServiceTimes) -> Self {
        self.doctor.service = service;
        self
    }

    pub fn with_admission(mut self, table: AdmissionTable) -> Self {
        self.doctor.admission = table;
        self
    }

    pub fn with_patience(mut self, threshold_minutes: f64, abandonment_percentage: f64) -> Self {
        self.patience.threshold_minutes = threshold_minutes;
        self.patience.abandonment_percentage = abandonment_percentage;
        self
    }

    pub fn with_financials(mut self, financials: FinancialSettings) -> Self {
        self.financials = financials;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.number_of_runs == 0 {
            return Err(ConfigError::NoRuns);
        }
        if !self.general.warm_up_minutes.is_finite() || self.general.warm_up_minutes < 0.0 {
            return Err(ConfigError::InvalidTime {
                field: "warm-up",
                value: self.general.warm_up_minutes,
            });
        }
        match self.general.horizon {
            Horizon::Patients(count) if count == 0 => return Err(ConfigError::EmptyHorizon),
            Horizon::Minutes(minutes) if !minutes.is_finite() || minutes <= 0.0 => {
                return Err(ConfigError::EmptyHorizon)
            }
            _ => {}
        }

        if self.resources.receptionist == 0 {
            return Err(ConfigError::ZeroCapacity {
                role: "receptionist",
            });
        }
        if self.resources.nurse == 0 {
            return Err(ConfigError::ZeroCapacity { role: "nurse" });
        }
        if self.resources.doctor == 0 {
            return Err(ConfigError::ZeroCapacity { role: "doctor" });
        }

        self.arrivals.interarrival.validate("inter-arrival time")?;
        self.reception.service.validate("reception service time")?;
        self.nurse.service.validate("nurse service time")?;
        self.doctor
            .service
            .critical
            .validate("doctor service time (critical)")?;
        self.doctor
            .service
            .urgent
            .validate("doctor service time (urgent)")?;
        self.doctor
            .service
            .moderate
            .validate("doctor service time (moderate)")?;
        self.doctor
            .service
            .low
            .validate("doctor service time (low)")?;

        self.reception.assessment.validate("reception assessment")?;
        self.nurse
            .reassessment_moderate
            .validate("nurse reassessment (moderate)")?;
        self.nurse
            .reassessment_low
            .validate("nurse reassessment (low)")?;
        self.doctor.admission.validate("doctor admission")?;

        if !self.patience.threshold_minutes.is_finite() || self.patience.threshold_minutes < 0.0 {
            return Err(ConfigError::InvalidTime {
                field: "patience threshold",
                value: self.patience.threshold_minutes,
            });
        }
        let abandonment = self.patience.abandonment_percentage;
        if !abandonment.is_finite() || !(0.0..=100.0).contains(&abandonment) {
            return Err(ConfigError::PercentageRange {
                table: "abandonment percentage".to_string(),
                value: abandonment,
            });
        }

        let amounts = [
            ("base fee", self.financials.base_fee),
            ("admission fee (critical)", self.financials.admission_fees.critical),
            ("admission fee (urgent)", self.financials.admission_fees.urgent),
            ("admission fee (moderate)", self.financials.admission_fees.moderate),
            ("admission fee (low)", self.financials.admission_fees.low),
            ("receptionist salary", self.financials.salaries_per_minute.receptionist),
            ("nurse salary", self.financials.salaries_per_minute.nurse),
            ("doctor salary", self.financials.salaries_per_minute.doctor),
        ];
        for (field, value) in amounts {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidAmount { field, value });
            }
        }

        Ok(())
    }
}
