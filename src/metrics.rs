//! Warm-up-aware metrics: raw counters while the run executes, a derived
//! summary computed once at run end.
//!
//! Every `record_*` call carries the event's timestamp; events before the
//! warm-up cutoff leave the counters untouched. Averages and proportions are
//! derived with zero-guards, so a category with no observations reports a
//! defined zero instead of faulting.

use std::ops::{Index, IndexMut};

use crate::config::SimulationConfig;
use crate::core::types::SimTime;
use crate::patient::{Disposition, Priority, Stage};

/// Fixed-size table with one slot per priority.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerPriority<T>([T; 5]);

impl<T: Default + Copy> Default for PerPriority<T> {
    fn default() -> Self {
        Self([T::default(); 5])
    }
}

impl<T> Index<Priority> for PerPriority<T> {
    type Output = T;

    fn index(&self, priority: Priority) -> &T {
        &self.0[priority.index()]
    }
}

impl<T> IndexMut<Priority> for PerPriority<T> {
    fn index_mut(&mut self, priority: Priority) -> &mut T {
        &mut self.0[priority.index()]
    }
}

/// Fixed-size table with one slot per stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerStage<T>([T; 3]);

impl<T: Default + Copy> Default for PerStage<T> {
    fn default() -> Self {
        Self([T::default(); 3])
    }
}

impl<T> Index<Stage> for PerStage<T> {
    type Output = T;

    fn index(&self, stage: Stage) -> &T {
        &self.0[stage.index()]
    }
}

impl<T> IndexMut<Stage> for PerStage<T> {
    fn index_mut(&mut self, stage: Stage) -> &mut T {
        &mut self.0[stage.index()]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StageCounters {
    /// Grants observed, immediate or after queueing.
    pub queue_observations: u64,
    pub queue_wait_total: f64,
    /// Completed services.
    pub served: u64,
    pub service_time_total: f64,
}

/// Raw counter layer, reset-free: one instance lives exactly one replication.
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    warm_up: SimTime,
    arrival_gap_total: f64,
    arrival_gap_count: u64,
    stages: PerStage<StageCounters>,
    classified: PerPriority<u64>,
    nurse_intake: PerPriority<u64>,
    nurse_reassigned_from_moderate: PerPriority<u64>,
    nurse_reassigned_from_low: PerPriority<u64>,
    doctor_admitted: PerPriority<u64>,
    doctor_discharged: PerPriority<u64>,
    admitted: u64,
    discharged: u64,
    abandoned: u64,
    declined: u64,
    end_clock: SimTime,
}

impl RunMetrics {
    pub fn new(warm_up: SimTime) -> Self {
        Self {
            warm_up,
            ..Self::default()
        }
    }

    /// Events stamped exactly at the warm-up cutoff are counted.
    fn counted(&self, at: SimTime) -> bool {
        at >= self.warm_up
    }

    pub fn record_arrival_gap(&mut self, gap: f64, at: SimTime) {
        if self.counted(at) {
            self.arrival_gap_total += gap;
            self.arrival_gap_count += 1;
        }
    }

    pub fn record_queue_wait(&mut self, stage: Stage, wait: f64, at: SimTime) {
        if self.counted(at) {
            let counters = &mut self.stages[stage];
            counters.queue_observations += 1;
            counters.queue_wait_total += wait;
        }
    }

    pub fn record_service(&mut self, stage: Stage, duration: f64, at: SimTime) {
        if self.counted(at) {
            let counters = &mut self.stages[stage];
            counters.served += 1;
            counters.service_time_total += duration;
        }
    }

    pub fn record_classification(&mut self, priority: Priority, at: SimTime) {
        if self.counted(at) {
            self.classified[priority] += 1;
        }
    }

    pub fn record_nurse_intake(&mut self, priority: Priority, at: SimTime) {
        if self.counted(at) {
            self.nurse_intake[priority] += 1;
        }
    }

    pub fn record_nurse_reassignment(&mut self, from: Priority, to: Priority, at: SimTime) {
        if self.counted(at) {
            match from {
                Priority::Moderate => self.nurse_reassigned_from_moderate[to] += 1,
                Priority::Low => self.nurse_reassigned_from_low[to] += 1,
                // Only Moderate and Low ever visit the Nurse
                _ => {}
            }
        }
    }

    pub fn record_doctor_outcome(&mut self, priority: Priority, admitted: bool, at: SimTime) {
        if self.counted(at) {
            if admitted {
                self.doctor_admitted[priority] += 1;
            } else {
                self.doctor_discharged[priority] += 1;
            }
        }
    }

    pub fn record_disposition(&mut self, disposition: Disposition, at: SimTime) {
        if !self.counted(at) {
            return;
        }
        match disposition {
            Disposition::Admitted => self.admitted += 1,
            Disposition::Discharged => self.discharged += 1,
            Disposition::Abandoned => self.abandoned += 1,
            Disposition::Declined => self.declined += 1,
            Disposition::Pending => {}
        }
    }

    /// Clock reading at the end of the run, for the expense window.
    pub fn set_end_clock(&mut self, clock: SimTime) {
        self.end_clock = clock;
    }

    /// Terminal events counted inside the measurement window.
    pub fn total_patients(&self) -> u64 {
        self.admitted + self.discharged + self.abandoned + self.declined
    }

    pub fn stage_counters(&self, stage: Stage) -> &StageCounters {
        &self.stages[stage]
    }

    pub fn classified(&self, priority: Priority) -> u64 {
        self.classified[priority]
    }

    /// Compute the derived layer. Call once, at replication end.
    pub fn summarize(&self, config: &SimulationConfig) -> RunSummary {
        let total = self.total_patients();

        let mut priority_proportions = PerPriority::default();
        for priority in Priority::ALL {
            priority_proportions[priority] = proportion(self.classified[priority], total);
        }

        let mut stages = PerStage::default();
        for stage in Stage::ALL {
            let raw = &self.stages[stage];
            stages[stage] = StageSummary {
                served: raw.served,
                queue_wait_total: raw.queue_wait_total,
                queue_wait_average: ratio(raw.queue_wait_total, raw.queue_observations),
                service_time_total: raw.service_time_total,
                service_time_average: ratio(raw.service_time_total, raw.served),
            };
        }

        let nurse_total = Priority::ALL
            .iter()
            .map(|p| self.nurse_intake[*p])
            .sum::<u64>();
        let nurse_moderate_share = proportion(self.nurse_intake[Priority::Moderate], nurse_total);
        let nurse_low_share = proportion(self.nurse_intake[Priority::Low], nurse_total);

        let nurse_reassignment_moderate = normalize_row(&self.nurse_reassigned_from_moderate);
        let nurse_reassignment_low = normalize_row(&self.nurse_reassigned_from_low);

        let mut admission_ratios = PerPriority::default();
        for priority in Priority::ALL {
            let seen = self.doctor_admitted[priority] + self.doctor_discharged[priority];
            admission_ratios[priority] = proportion(self.doctor_admitted[priority], seen);
        }

        let fees = &config.financials;
        let mut revenue = fees.base_fee * total as f64;
        for priority in Priority::ALL {
            if let Some(fee) = fees.admission_fees.fee_for(priority) {
                revenue += fee * self.doctor_admitted[priority] as f64;
            }
        }

        let salaries = &fees.salaries_per_minute;
        let capacities = &config.resources;
        let payroll_per_minute = capacities.receptionist as f64 * salaries.receptionist
            + capacities.nurse as f64 * salaries.nurse
            + capacities.doctor as f64 * salaries.doctor;
        let expenses = self.end_clock * payroll_per_minute;
        let profit = revenue - expenses;

        RunSummary {
            total_patients: total,
            admitted: self.admitted,
            discharged: self.discharged,
            abandoned: self.abandoned,
            declined: self.declined,
            total_time_minutes: self.end_clock,
            priority_proportions,
            declined_proportion: proportion(self.declined, total),
            arrival_wait_total: self.arrival_gap_total,
            arrival_wait_average: ratio(self.arrival_gap_total, self.arrival_gap_count),
            stages,
            nurse_moderate_share,
            nurse_low_share,
            nurse_reassignment_moderate,
            nurse_reassignment_low,
            admission_ratios,
            revenue,
            expenses,
            profit,
            revenue_per_patient: if total == 0 { 0.0 } else { revenue / total as f64 },
            profit_per_patient: if total == 0 { 0.0 } else { profit / total as f64 },
        }
    }
}

fn ratio(total: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

fn proportion(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn normalize_row(row: &PerPriority<u64>) -> PerPriority<f64> {
    let total = Priority::ALL.iter().map(|p| row[*p]).sum::<u64>();
    let mut normalized = PerPriority::default();
    for priority in Priority::ALL {
        normalized[priority] = proportion(row[priority], total);
    }
    normalized
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageSummary {
    pub served: u64,
    pub queue_wait_total: f64,
    pub queue_wait_average: f64,
    pub service_time_total: f64,
    pub service_time_average: f64,
}

/// Derived metrics of one replication: the fields of one output row.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub total_patients: u64,
    pub admitted: u64,
    pub discharged: u64,
    pub abandoned: u64,
    pub declined: u64,
    pub total_time_minutes: f64,
    /// Share of counted patients classified into each priority at Reception.
    pub priority_proportions: PerPriority<f64>,
    pub declined_proportion: f64,
    pub arrival_wait_total: f64,
    pub arrival_wait_average: f64,
    pub stages: PerStage<StageSummary>,
    pub nurse_moderate_share: f64,
    pub nurse_low_share: f64,
    /// Observed reassignment probabilities for patients arriving Moderate.
    pub nurse_reassignment_moderate: PerPriority<f64>,
    /// Observed reassignment probabilities for patients arriving Low.
    pub nurse_reassignment_low: PerPriority<f64>,
    /// Admitted share of each priority's doctor consultations.
    pub admission_ratios: PerPriority<f64>,
    pub revenue: f64,
    pub expenses: f64,
    pub profit: f64,
    pub revenue_per_patient: f64,
    pub profit_per_patient: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_before_warm_up_are_not_counted() {
        let mut metrics = RunMetrics::new(10.0);

        metrics.record_queue_wait(Stage::Reception, 3.0, 9.99);
        metrics.record_service(Stage::Reception, 5.0, 9.0);
        metrics.record_disposition(Disposition::Discharged, 5.0);

        assert_eq!(metrics.stage_counters(Stage::Reception).queue_observations, 0);
        assert_eq!(metrics.stage_counters(Stage::Reception).served, 0);
        assert_eq!(metrics.total_patients(), 0);
    }

    #[test]
    fn test_events_at_or_after_warm_up_are_counted() {
        let mut metrics = RunMetrics::new(10.0);

        // Exactly at the cutoff counts
        metrics.record_queue_wait(Stage::Reception, 3.0, 10.0);
        metrics.record_service(Stage::Reception, 5.0, 15.0);
        metrics.record_disposition(Disposition::Admitted, 20.0);

        assert_eq!(metrics.stage_counters(Stage::Reception).queue_observations, 1);
        assert_eq!(metrics.stage_counters(Stage::Reception).queue_wait_total, 3.0);
        assert_eq!(metrics.stage_counters(Stage::Reception).served, 1);
        assert_eq!(metrics.total_patients(), 1);
    }

    #[test]
    fn test_classification_counts_respect_warm_up() {
        let mut metrics = RunMetrics::new(10.0);
        metrics.record_classification(Priority::Critical, 5.0);
        metrics.record_classification(Priority::Critical, 10.0);
        metrics.record_classification(Priority::Urgent, 12.0);

        assert_eq!(metrics.classified(Priority::Critical), 1);
        assert_eq!(metrics.classified(Priority::Urgent), 1);
        assert_eq!(metrics.classified(Priority::Low), 0);
    }

    #[test]
    fn test_empty_run_summarizes_to_defined_zeros() {
        let metrics = RunMetrics::new(0.0);
        let summary = metrics.summarize(&SimulationConfig::default());

        assert_eq!(summary.total_patients, 0);
        assert_eq!(summary.arrival_wait_average, 0.0);
        assert_eq!(summary.stages[Stage::Doctor].queue_wait_average, 0.0);
        assert_eq!(summary.nurse_moderate_share, 0.0);
        assert_eq!(summary.admission_ratios[Priority::Critical], 0.0);
        assert_eq!(summary.revenue_per_patient, 0.0);
        assert!(summary.profit_per_patient.is_finite());
    }

    #[test]
    fn test_terminal_dispositions_sum_to_total() {
        let mut metrics = RunMetrics::new(0.0);
        metrics.record_disposition(Disposition::Admitted, 1.0);
        metrics.record_disposition(Disposition::Admitted, 2.0);
        metrics.record_disposition(Disposition::Discharged, 3.0);
        metrics.record_disposition(Disposition::Abandoned, 4.0);
        metrics.record_disposition(Disposition::Declined, 5.0);

        assert_eq!(metrics.total_patients(), 5);
    }

    #[test]
    fn test_nurse_reassignment_matrix_normalizes_per_row() {
        let mut metrics = RunMetrics::new(0.0);
        for _ in 0..3 {
            metrics.record_nurse_reassignment(Priority::Moderate, Priority::Critical, 1.0);
        }
        metrics.record_nurse_reassignment(Priority::Moderate, Priority::Low, 1.0);

        let summary = metrics.summarize(&SimulationConfig::default());
        assert_eq!(summary.nurse_reassignment_moderate[Priority::Critical], 0.75);
        assert_eq!(summary.nurse_reassignment_moderate[Priority::Low], 0.25);
        // The untouched row stays all zero
        assert_eq!(summary.nurse_reassignment_low[Priority::Critical], 0.0);
    }

    #[test]
    fn test_admission_ratio_per_priority() {
        let mut metrics = RunMetrics::new(0.0);
        metrics.record_doctor_outcome(Priority::Urgent, true, 1.0);
        metrics.record_doctor_outcome(Priority::Urgent, true, 2.0);
        metrics.record_doctor_outcome(Priority::Urgent, false, 3.0);

        let summary = metrics.summarize(&SimulationConfig::default());
        let ratio = summary.admission_ratios[Priority::Urgent];
        assert!((ratio - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_financial_derivation() {
        let config = SimulationConfig::default().with_capacities(1, 1, 1);
        let salaries = config.financials.salaries_per_minute;
        let payroll = salaries.receptionist + salaries.nurse + salaries.doctor;

        let mut metrics = RunMetrics::new(0.0);
        metrics.record_doctor_outcome(Priority::Critical, true, 1.0);
        metrics.record_disposition(Disposition::Admitted, 1.0);
        metrics.record_disposition(Disposition::Discharged, 2.0);
        metrics.set_end_clock(100.0);

        let summary = metrics.summarize(&config);

        let expected_revenue =
            config.financials.base_fee * 2.0 + config.financials.admission_fees.critical;
        let expected_expenses = 100.0 * payroll;
        assert!((summary.revenue - expected_revenue).abs() < 1e-9);
        assert!((summary.expenses - expected_expenses).abs() < 1e-9);
        assert!((summary.profit - (expected_revenue - expected_expenses)).abs() < 1e-9);
        assert!((summary.revenue_per_patient - expected_revenue / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_priority_proportions_use_counted_total() {
        let mut metrics = RunMetrics::new(0.0);
        metrics.record_classification(Priority::Critical, 1.0);
        metrics.record_classification(Priority::Moderate, 2.0);
        metrics.record_disposition(Disposition::Admitted, 3.0);
        metrics.record_disposition(Disposition::Discharged, 4.0);
        metrics.record_disposition(Disposition::Declined, 5.0);
        metrics.record_disposition(Disposition::Abandoned, 6.0);

        let summary = metrics.summarize(&SimulationConfig::default());
        assert_eq!(summary.priority_proportions[Priority::Critical], 0.25);
        assert_eq!(summary.priority_proportions[Priority::Moderate], 0.25);
        assert_eq!(summary.declined_proportion, 0.25);
    }
}
