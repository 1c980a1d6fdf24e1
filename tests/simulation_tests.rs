//! End-to-end scenarios driven through the public API.
//!
//! Deterministic fabrics use zero-variance normal distributions and
//! degenerate assessment tables, so exact timings and counts can be
//! asserted without tolerance games.

use std::fs;

use edsim::config::{
    AdmissionTable, DoctorServiceTimes, Horizon, PriorityTable, ServiceDistribution,
    SimulationConfig,
};
use edsim::patient::{Priority, Stage};
use edsim::replication::Replication;
use edsim::{report, run_batch};

fn fixed(mean: f64) -> ServiceDistribution {
    ServiceDistribution::Normal { mean, std_dev: 0.0 }
}

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-9
}

#[test]
fn test_second_arrival_waits_for_the_residual_service() {
    // Two arrivals 0.1 min apart, one receptionist, a fixed 5-minute
    // registration: the second patient must wait exactly 4.9 minutes.
    let config = SimulationConfig::default()
        .with_warm_up(0.0)
        .with_horizon(Horizon::Patients(2))
        .with_interarrival(fixed(0.1))
        .with_reception_service(fixed(5.0))
        .with_assessment(PriorityTable::certain(Priority::NonUrgent));

    let report = Replication::new(config, 0).unwrap().run().unwrap();
    let reception = &report.summary.stages[Stage::Reception];

    assert_eq!(reception.served, 2);
    assert!(close(reception.queue_wait_total, 4.9));
    assert!(close(reception.queue_wait_average, 2.45));
    assert!(close(reception.service_time_total, 10.0));
    assert_eq!(report.summary.discharged, 2);
    assert!(close(report.summary.total_time_minutes, 10.0));
}

#[test]
fn test_full_waiting_room_turns_every_arrival_away() {
    let config = SimulationConfig::default()
        .with_warm_up(0.0)
        .with_horizon(Horizon::Minutes(100.0))
        .with_waiting_room(0);

    let report = Replication::new(config.clone(), 0).unwrap().run().unwrap();
    let summary = &report.summary;

    assert!(report.generated > 0);
    assert_eq!(summary.declined, report.generated);
    assert_eq!(summary.declined_proportion, 1.0);
    for stage in Stage::ALL {
        assert_eq!(summary.stages[stage].served, 0);
    }
    // Declined patients still owe the base fee; staff are paid regardless.
    let base = config.financials.base_fee;
    assert!(close(summary.revenue, base * summary.declined as f64));
    let payroll = config.financials.salaries_per_minute.receptionist
        * config.resources.receptionist as f64
        + config.financials.salaries_per_minute.nurse * config.resources.nurse as f64
        + config.financials.salaries_per_minute.doctor * config.resources.doctor as f64;
    assert!(close(summary.expenses, summary.total_time_minutes * payroll));
}

#[test]
fn test_every_generated_patient_reaches_a_terminal_state() {
    let config = SimulationConfig::default()
        .with_warm_up(0.0)
        .with_horizon(Horizon::Patients(40));

    let report = Replication::new(config, 0).unwrap().run().unwrap();
    let summary = &report.summary;

    assert_eq!(report.generated, 40);
    assert_eq!(
        summary.admitted + summary.discharged + summary.abandoned + summary.declined,
        40
    );
}

#[test]
fn test_warm_up_cutoff_is_inclusive() {
    // Arrivals every 10 min, fixed 5-min registration, everyone non-urgent:
    // exits land at 5, 15, 25, 35, 45. A warm-up of 25 keeps exactly the
    // last three, including the one on the boundary.
    let config = SimulationConfig::default()
        .with_warm_up(25.0)
        .with_horizon(Horizon::Patients(5))
        .with_interarrival(fixed(10.0))
        .with_reception_service(fixed(5.0))
        .with_assessment(PriorityTable::certain(Priority::NonUrgent));

    let report = Replication::new(config, 0).unwrap().run().unwrap();
    let summary = &report.summary;

    assert_eq!(report.generated, 5);
    assert_eq!(summary.total_patients, 3);
    assert_eq!(summary.discharged, 3);
    assert_eq!(summary.priority_proportions[Priority::NonUrgent], 1.0);

    let reception = &summary.stages[Stage::Reception];
    assert_eq!(reception.served, 3);
    assert!(close(reception.service_time_total, 15.0));
    assert!(close(reception.queue_wait_total, 0.0));

    assert!(close(summary.arrival_wait_total, 20.0));
    assert!(close(summary.arrival_wait_average, 10.0));

    // Clock runs 45 min; payroll is 1*2.25 + 2*3.50 + 4*4.00 = 25.25/min.
    assert!(close(summary.total_time_minutes, 45.0));
    assert!(close(summary.revenue, 2500.0 * 3.0));
    assert!(close(summary.expenses, 45.0 * 25.25));
    assert!(close(summary.profit, 7500.0 - 1136.25));
}

#[test]
fn test_admissions_bill_priority_fees() {
    // Three critical patients, everyone admitted: revenue carries the
    // critical admission fee three times on top of the base fees.
    let config = SimulationConfig::default()
        .with_warm_up(0.0)
        .with_horizon(Horizon::Patients(3))
        .with_interarrival(fixed(10.0))
        .with_reception_service(fixed(2.0))
        .with_assessment(PriorityTable::certain(Priority::Critical))
        .with_doctor_services(DoctorServiceTimes::uniform(fixed(3.0)))
        .with_admission(AdmissionTable::uniform(100.0));

    let report = Replication::new(config, 0).unwrap().run().unwrap();
    let summary = &report.summary;

    assert_eq!(summary.admitted, 3);
    assert_eq!(summary.stages[Stage::Nurse].served, 0);
    assert_eq!(summary.admission_ratios[Priority::Critical], 1.0);
    assert!(close(summary.total_time_minutes, 25.0));
    assert!(close(summary.revenue, 2500.0 * 3.0 + 12_000.0 * 3.0));
    assert!(close(summary.expenses, 25.0 * 25.25));
    assert!(close(summary.profit, 43_500.0 - 631.25));
}

#[test]
fn test_patience_walkouts_withdraw_queued_tickets() {
    // One of each resource, 1-min arrivals and registrations, an 8-min
    // nurse and a 30-min doctor. Patients 2 and 3 accumulate more than the
    // 5-minute patience budget in the nurse queue and walk out of the
    // doctor queue; the doctor's release must skip their withdrawn tickets.
    let config = SimulationConfig::default()
        .with_warm_up(0.0)
        .with_horizon(Horizon::Patients(3))
        .with_capacities(1, 1, 1)
        .with_interarrival(fixed(1.0))
        .with_reception_service(fixed(1.0))
        .with_assessment(PriorityTable::certain(Priority::Moderate))
        .with_nurse_service(fixed(8.0))
        .with_nurse_reassessment(
            PriorityTable::certain(Priority::Moderate),
            PriorityTable::certain(Priority::Low),
        )
        .with_doctor_services(DoctorServiceTimes::uniform(fixed(30.0)))
        .with_admission(AdmissionTable::uniform(0.0))
        .with_patience(5.0, 100.0);

    let report = Replication::new(config, 0).unwrap().run().unwrap();
    let summary = &report.summary;

    assert_eq!(summary.discharged, 1);
    assert_eq!(summary.abandoned, 2);
    assert_eq!(summary.stages[Stage::Reception].served, 3);
    assert_eq!(summary.stages[Stage::Nurse].served, 3);
    assert_eq!(summary.stages[Stage::Doctor].served, 1);
    assert!(close(summary.stages[Stage::Nurse].queue_wait_total, 21.0));
    assert!(close(summary.stages[Stage::Doctor].queue_wait_total, 0.0));
    assert_eq!(summary.nurse_moderate_share, 1.0);
    assert!(close(summary.total_time_minutes, 39.0));
}

#[test]
fn test_critical_patients_never_abandon() {
    // Same congested fabric, but critical triage: impatience never fires.
    let config = SimulationConfig::default()
        .with_warm_up(0.0)
        .with_horizon(Horizon::Patients(3))
        .with_capacities(1, 1, 1)
        .with_interarrival(fixed(1.0))
        .with_reception_service(fixed(1.0))
        .with_assessment(PriorityTable::certain(Priority::Critical))
        .with_doctor_services(DoctorServiceTimes::uniform(fixed(30.0)))
        .with_admission(AdmissionTable::uniform(0.0))
        .with_patience(0.0, 100.0);

    let report = Replication::new(config, 0).unwrap().run().unwrap();
    let summary = &report.summary;

    assert_eq!(summary.abandoned, 0);
    assert_eq!(summary.discharged, 3);
    assert_eq!(summary.stages[Stage::Doctor].served, 3);
}

#[test]
fn test_distinct_runs_use_distinct_streams() {
    let config = SimulationConfig::default()
        .with_warm_up(0.0)
        .with_horizon(Horizon::Patients(50));

    let first = Replication::new(config.clone(), 0).unwrap().run().unwrap();
    let second = Replication::new(config, 1).unwrap().run().unwrap();

    assert_ne!(first.seed, second.seed);
    assert_ne!(
        first.summary.total_time_minutes,
        second.summary.total_time_minutes
    );
}

#[test]
fn test_batch_runs_match_standalone_replications() {
    // Replications share nothing but the configuration, so run 2 of a
    // batch must reproduce a standalone replication with the same index
    // exactly, regardless of what runs 0 and 1 did before it.
    let config = SimulationConfig::default()
        .with_runs(4)
        .with_warm_up(0.0)
        .with_horizon(Horizon::Patients(50));

    let batch = run_batch(&config).unwrap();
    let standalone = Replication::new(config, 2).unwrap().run().unwrap();
    let embedded = &batch.runs[2];

    assert_eq!(embedded.run_index, standalone.run_index);
    assert_eq!(embedded.seed, standalone.seed);
    assert_eq!(embedded.generated, standalone.generated);
    assert_eq!(embedded.summary, standalone.summary);
}

#[test]
fn test_identical_batches_write_identical_files() {
    let config = SimulationConfig::default()
        .with_runs(3)
        .with_warm_up(0.0)
        .with_horizon(Horizon::Patients(60));

    let path_a = std::env::temp_dir().join(format!("edsim_batch_a_{}.csv", std::process::id()));
    let path_b = std::env::temp_dir().join(format!("edsim_batch_b_{}.csv", std::process::id()));

    report::write_results(&path_a, &run_batch(&config).unwrap()).unwrap();
    report::write_results(&path_b, &run_batch(&config).unwrap()).unwrap();

    let bytes_a = fs::read(&path_a).unwrap();
    let bytes_b = fs::read(&path_b).unwrap();
    let _ = fs::remove_file(&path_a);
    let _ = fs::remove_file(&path_b);

    assert!(!bytes_a.is_empty());
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn test_sample_settings_file_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("parameters.json");
    let config = SimulationConfig::from_path(&path).unwrap();

    assert_eq!(config.general.number_of_runs, 50);
    assert_eq!(config.general.seed, 2024);
    assert_eq!(config.general.warm_up_minutes, 1140.0);
    assert_eq!(config.general.horizon, Horizon::Minutes(10080.0));
    assert_eq!(config.resources.receptionist, 1);
    assert_eq!(config.resources.nurse, 2);
    assert_eq!(config.resources.doctor, 4);
    assert_eq!(config.resources.waiting_room, 20);
}
