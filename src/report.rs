//! Result rows: one CSV line per replication, plus a batch summary.
//!
//! Column names follow a `section_metric_qualifier` grammar so downstream
//! analysis can split on underscores and group by level. Values use fixed
//! formatting: counts as integers, durations and money with two decimals,
//! proportions with four. Two runs with the same seed produce identical
//! bytes.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::orchestrator::BatchReport;
use crate::patient::{Priority, Stage};
use crate::replication::RunReport;

pub const COLUMNS: [&str; 53] = [
    "run",
    "seed",
    "general_generatedPatients",
    "general_totalPatients",
    "general_admittedPatients",
    "general_dischargedPatients",
    "general_abandonedPatients",
    "general_declinedPatients",
    "general_totalTime",
    "proportion_CriticalPatients",
    "proportion_UrgentPatients",
    "proportion_ModeratePatients",
    "proportion_LowPatients",
    "proportion_NonUrgentPatients",
    "proportion_totalPatientsDeclinedAccess",
    "arrival_waitingTime_total",
    "arrival_waitingTime_average",
    "reception_patientsServed",
    "reception_waitingInQueue_duration_total",
    "reception_waitingInQueue_duration_average",
    "reception_serviceTime_duration_total",
    "reception_serviceTime_duration_average",
    "nurse_patientsServed",
    "nurse_waitingInQueue_duration_total",
    "nurse_waitingInQueue_duration_average",
    "nurse_serviceTime_duration_total",
    "nurse_serviceTime_duration_average",
    "doctor_patientsServed",
    "doctor_waitingInQueue_duration_total",
    "doctor_waitingInQueue_duration_average",
    "doctor_serviceTime_duration_total",
    "doctor_serviceTime_duration_average",
    "nurse_proportion_moderatePatients",
    "nurse_proportion_lowPatients",
    "nurse_reassessment_moderateToCritical",
    "nurse_reassessment_moderateToUrgent",
    "nurse_reassessment_moderateToModerate",
    "nurse_reassessment_moderateToLow",
    "nurse_reassessment_moderateToNonUrgent",
    "nurse_reassessment_lowToCritical",
    "nurse_reassessment_lowToUrgent",
    "nurse_reassessment_lowToModerate",
    "nurse_reassessment_lowToLow",
    "nurse_reassessment_lowToNonUrgent",
    "doctor_admissionRatio_CriticalPatients",
    "doctor_admissionRatio_UrgentPatients",
    "doctor_admissionRatio_ModeratePatients",
    "doctor_admissionRatio_LowPatients",
    "totalFinancials",
    "totalExpenses",
    "totalProfit",
    "financials_perPatient_revenue",
    "financials_perPatient_profit",
];

pub fn write_header<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", COLUMNS.join(","))
}

pub fn write_row<W: Write>(out: &mut W, report: &RunReport) -> io::Result<()> {
    writeln!(out, "{}", row_fields(report).join(","))
}

/// Write the header and every run's row to `path`.
pub fn write_results(path: &Path, batch: &BatchReport) -> io::Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    write_header(&mut out)?;
    for report in &batch.runs {
        write_row(&mut out, report)?;
    }
    out.flush()
}

fn row_fields(report: &RunReport) -> Vec<String> {
    let summary = &report.summary;
    let mut fields = Vec::with_capacity(COLUMNS.len());

    fields.push(report.run_index.to_string());
    fields.push(report.seed.to_string());
    fields.push(report.generated.to_string());
    fields.push(summary.total_patients.to_string());
    fields.push(summary.admitted.to_string());
    fields.push(summary.discharged.to_string());
    fields.push(summary.abandoned.to_string());
    fields.push(summary.declined.to_string());
    fields.push(format!("{:.2}", summary.total_time_minutes));

    for priority in Priority::ALL {
        fields.push(format!("{:.4}", summary.priority_proportions[priority]));
    }
    fields.push(format!("{:.4}", summary.declined_proportion));

    fields.push(format!("{:.2}", summary.arrival_wait_total));
    fields.push(format!("{:.2}", summary.arrival_wait_average));

    for stage in Stage::ALL {
        let counters = &summary.stages[stage];
        fields.push(counters.served.to_string());
        fields.push(format!("{:.2}", counters.queue_wait_total));
        fields.push(format!("{:.2}", counters.queue_wait_average));
        fields.push(format!("{:.2}", counters.service_time_total));
        fields.push(format!("{:.2}", counters.service_time_average));
    }

    fields.push(format!("{:.4}", summary.nurse_moderate_share));
    fields.push(format!("{:.4}", summary.nurse_low_share));
    for priority in Priority::ALL {
        fields.push(format!("{:.4}", summary.nurse_reassignment_moderate[priority]));
    }
    for priority in Priority::ALL {
        fields.push(format!("{:.4}", summary.nurse_reassignment_low[priority]));
    }

    for priority in [
        Priority::Critical,
        Priority::Urgent,
        Priority::Moderate,
        Priority::Low,
    ] {
        fields.push(format!("{:.4}", summary.admission_ratios[priority]));
    }

    fields.push(format!("{:.2}", summary.revenue));
    fields.push(format!("{:.2}", summary.expenses));
    fields.push(format!("{:.2}", summary.profit));
    fields.push(format!("{:.2}", summary.revenue_per_patient));
    fields.push(format!("{:.2}", summary.profit_per_patient));

    fields
}

/// Print per-batch means to `out`, one line per headline number.
pub fn print_batch_summary<W: Write>(out: &mut W, batch: &BatchReport) -> io::Result<()> {
    writeln!(
        out,
        "Batch {} summary over {} runs:",
        batch.batch_id,
        batch.runs.len()
    )?;
    let lines: [(&str, f64); 10] = [
        ("generated patients", batch.mean_of(|run| run.generated as f64)),
        (
            "counted patients",
            batch.mean_of(|run| run.summary.total_patients as f64),
        ),
        ("admitted", batch.mean_of(|run| run.summary.admitted as f64)),
        (
            "discharged",
            batch.mean_of(|run| run.summary.discharged as f64),
        ),
        (
            "abandoned",
            batch.mean_of(|run| run.summary.abandoned as f64),
        ),
        ("declined", batch.mean_of(|run| run.summary.declined as f64)),
        (
            "end clock (min)",
            batch.mean_of(|run| run.summary.total_time_minutes),
        ),
        ("revenue", batch.mean_of(|run| run.summary.revenue)),
        ("expenses", batch.mean_of(|run| run.summary.expenses)),
        ("profit", batch.mean_of(|run| run.summary.profit)),
    ];
    for (label, mean) in lines {
        writeln!(out, "  {:<18} {:>14.2} (mean)", label, mean)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Horizon, SimulationConfig};
    use crate::orchestrator::run_batch;
    use crate::replication::Replication;

    fn sample_report() -> RunReport {
        let config = SimulationConfig::default()
            .with_warm_up(0.0)
            .with_horizon(Horizon::Patients(8));
        Replication::new(config, 0).unwrap().run().unwrap()
    }

    #[test]
    fn test_row_matches_header_width() {
        let report = sample_report();
        assert_eq!(row_fields(&report).len(), COLUMNS.len());
    }

    #[test]
    fn test_header_line_is_the_column_list() {
        let mut buffer = Vec::new();
        write_header(&mut buffer).unwrap();
        let line = String::from_utf8(buffer).unwrap();
        assert_eq!(line.trim_end(), COLUMNS.join(","));
    }

    #[test]
    fn test_counts_are_written_without_decimals() {
        let report = sample_report();
        let fields = row_fields(&report);
        // run, seed and the six patient counts are plain integers
        for field in &fields[..8] {
            assert!(
                !field.contains('.'),
                "expected integer field, got {field}"
            );
        }
    }

    #[test]
    fn test_rows_are_byte_identical_across_batches() {
        let config = SimulationConfig::default()
            .with_runs(2)
            .with_warm_up(0.0)
            .with_horizon(Horizon::Patients(12));
        let first = run_batch(&config).unwrap();
        let second = run_batch(&config).unwrap();

        let render = |batch: &BatchReport| {
            let mut buffer = Vec::new();
            write_header(&mut buffer).unwrap();
            for report in &batch.runs {
                write_row(&mut buffer, report).unwrap();
            }
            buffer
        };
        assert_eq!(render(&first), render(&second));
    }

    #[test]
    fn test_batch_summary_mentions_every_headline() {
        let config = SimulationConfig::default()
            .with_runs(2)
            .with_warm_up(0.0)
            .with_horizon(Horizon::Patients(6));
        let batch = run_batch(&config).unwrap();
        let mut buffer = Vec::new();
        print_batch_summary(&mut buffer, &batch).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        for label in ["generated", "admitted", "declined", "revenue", "profit"] {
            assert!(text.contains(label), "summary missing {label}");
        }
    }
}
