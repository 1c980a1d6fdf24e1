//! Patient entity and the triage priority state machine.

use std::fmt;

use crate::core::resource::Ticket;
use crate::core::types::{PatientId, SimTime};
use crate::error::EngineError;

/// Triage priority assigned at Reception and possibly revised at the Nurse.
///
/// The numeric rank doubles as the queue order for priority resources:
/// lower rank is served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Critical,
    Urgent,
    Moderate,
    Low,
    NonUrgent,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Critical,
        Priority::Urgent,
        Priority::Moderate,
        Priority::Low,
        Priority::NonUrgent,
    ];

    pub fn rank(&self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::Urgent => 1,
            Priority::Moderate => 2,
            Priority::Low => 3,
            Priority::NonUrgent => 4,
        }
    }

    pub fn index(&self) -> usize {
        self.rank() as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::Urgent => "urgent",
            Priority::Moderate => "moderate",
            Priority::Low => "low",
            Priority::NonUrgent => "non-urgent",
        }
    }

    /// Moderate and Low must pass the Nurse before the Doctor;
    /// Critical and Urgent go straight to the Doctor.
    pub fn needs_nurse(&self) -> bool {
        matches!(self, Priority::Moderate | Priority::Low)
    }

    /// Critical and Urgent patients never abandon, regardless of wait.
    pub fn exempt_from_impatience(&self) -> bool {
        matches!(self, Priority::Critical | Priority::Urgent)
    }

    /// Position in doctor-side tables (service times, admission rates).
    /// NonUrgent never reaches the Doctor.
    pub fn doctor_index(&self) -> Option<usize> {
        match self {
            Priority::Critical => Some(0),
            Priority::Urgent => Some(1),
            Priority::Moderate => Some(2),
            Priority::Low => Some(3),
            Priority::NonUrgent => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal (or not-yet-terminal) outcome of a patient's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Pending,
    Admitted,
    Discharged,
    Abandoned,
    Declined,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Pending => "pending",
            Disposition::Admitted => "admitted",
            Disposition::Discharged => "discharged",
            Disposition::Abandoned => "abandoned",
            Disposition::Declined => "declined",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Disposition::Pending)
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three service stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Reception,
    Nurse,
    Doctor,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Reception, Stage::Nurse, Stage::Doctor];

    pub fn index(&self) -> usize {
        match self {
            Stage::Reception => 0,
            Stage::Nurse => 1,
            Stage::Doctor => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Reception => "reception",
            Stage::Nurse => "nurse",
            Stage::Doctor => "doctor",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timestamps of one pass through a stage.
#[derive(Debug, Clone, Copy)]
pub struct StageVisit {
    /// When the patient joined the stage (resource requested).
    pub entered: SimTime,
    /// When the resource was granted and service began.
    pub started: Option<SimTime>,
    /// When service finished and the resource was released.
    pub exited: Option<SimTime>,
}

/// One patient's in-flight state.
///
/// Mutated only by the stage activity currently driving it; the event loop
/// hands out exclusive access per dispatched event.
#[derive(Debug)]
pub struct Patient {
    pub id: PatientId,
    pub priority: Option<Priority>,
    pub disposition: Disposition,
    pub arrival_time: SimTime,
    /// Cumulative time spent waiting in queues, for the patience checks.
    pub total_queue_wait: SimTime,
    /// Claim on the resource of the stage currently being visited.
    pub ticket: Option<Ticket>,
    visits: [Option<StageVisit>; 3],
}

impl Patient {
    pub fn new(id: PatientId, arrival_time: SimTime) -> Self {
        Self {
            id,
            priority: None,
            disposition: Disposition::Pending,
            arrival_time,
            total_queue_wait: 0.0,
            ticket: None,
            visits: [None; 3],
        }
    }

    /// The assigned priority, or the invariant fault for routing without one.
    pub fn priority(&self) -> Result<Priority, EngineError> {
        self.priority
            .ok_or(EngineError::PriorityUnset { patient: self.id })
    }

    pub fn begin_visit(&mut self, stage: Stage, at: SimTime) {
        self.visits[stage.index()] = Some(StageVisit {
            entered: at,
            started: None,
            exited: None,
        });
    }

    pub fn visit(&self, stage: Stage) -> Option<&StageVisit> {
        self.visits[stage.index()].as_ref()
    }

    pub fn visit_mut(&mut self, stage: Stage) -> Option<&mut StageVisit> {
        self.visits[stage.index()].as_mut()
    }

    pub fn visited(&self, stage: Stage) -> bool {
        self.visits[stage.index()].is_some()
    }
}
