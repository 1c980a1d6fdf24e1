//! Per-patient trace lines emitted through the `log` facade.
//!
//! Every patient milestone produces one line under the `edsim::trace`
//! target, indented by pipeline depth so a filtered log reads as a
//! timeline. Enable with `RUST_LOG=edsim::trace=debug`.

use log::debug;

use crate::core::types::{PatientId, SimTime};
use crate::patient::Stage;

/// Milestones a patient can hit, ordered by pipeline depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracePoint {
    Arrival,
    Reception,
    Nurse,
    Doctor,
    Exit,
}

impl TracePoint {
    pub fn label(&self) -> &'static str {
        match self {
            TracePoint::Arrival => "ARRIVAL",
            TracePoint::Reception => "RECEPTION",
            TracePoint::Nurse => "NURSE",
            TracePoint::Doctor => "DOCTOR",
            TracePoint::Exit => "EXIT",
        }
    }

    /// Indentation depth, one tab per level.
    pub fn depth(&self) -> usize {
        match self {
            TracePoint::Arrival => 0,
            TracePoint::Reception => 1,
            TracePoint::Nurse => 2,
            TracePoint::Doctor => 3,
            TracePoint::Exit => 4,
        }
    }

    pub fn from_stage(stage: Stage) -> Self {
        match stage {
            Stage::Reception => TracePoint::Reception,
            Stage::Nurse => TracePoint::Nurse,
            Stage::Doctor => TracePoint::Doctor,
        }
    }
}

/// A patient enters the given milestone.
pub fn event_start(point: TracePoint, patient: PatientId, at: SimTime, note: Option<&str>) {
    emit("START", point, patient, at, "entered", note);
}

/// A patient leaves the given milestone.
pub fn event_end(point: TracePoint, patient: PatientId, at: SimTime, note: Option<&str>) {
    emit("END", point, patient, at, "finished", note);
}

fn emit(
    phase: &str,
    point: TracePoint,
    patient: PatientId,
    at: SimTime,
    verb: &str,
    note: Option<&str>,
) {
    let indent = "\t".repeat(point.depth());
    match note {
        Some(note) => debug!(
            target: "edsim::trace",
            "{}PATIENT {} -- {} {} -- {}: {} at {:.2} (clock)",
            indent,
            patient,
            phase,
            point.label(),
            note,
            verb,
            at
        ),
        None => debug!(
            target: "edsim::trace",
            "{}PATIENT {} -- {} {}: {} at {:.2} (clock)",
            indent,
            patient,
            phase,
            point.label(),
            verb,
            at
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_follows_pipeline_order() {
        let points = [
            TracePoint::Arrival,
            TracePoint::Reception,
            TracePoint::Nurse,
            TracePoint::Doctor,
            TracePoint::Exit,
        ];
        for (expected, point) in points.iter().enumerate() {
            assert_eq!(point.depth(), expected);
        }
    }

    #[test]
    fn test_stage_mapping() {
        assert_eq!(TracePoint::from_stage(Stage::Reception), TracePoint::Reception);
        assert_eq!(TracePoint::from_stage(Stage::Nurse), TracePoint::Nurse);
        assert_eq!(TracePoint::from_stage(Stage::Doctor), TracePoint::Doctor);
    }
}
