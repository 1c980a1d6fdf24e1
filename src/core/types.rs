/// Simulation time in minutes since the start of a replication.
pub type SimTime = f64;

/// Per-replication patient identifier, assigned in arrival order starting at 1.
pub type PatientId = u64;

/// Identifier of a claim on one unit of a resource's capacity.
pub type TicketId = u64;
