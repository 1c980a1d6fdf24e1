//! A single replication of the emergency department model.
//!
//! [`Replication`] owns everything one run touches: the event queue, the
//! three staffed resources, the patients currently in the building, a
//! seeded random stream and the warm-up-gated counters. Events pop in
//! (time, insertion) order; each one is dispatched to a stage handler in
//! `pipeline.rs`, which may schedule follow-up events. The run ends when
//! the horizon cuts it off or the queue drains.

use std::collections::HashMap;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{BuiltDistribution, Horizon, SimulationConfig};
use crate::core::resource::{Grant, Resource, Ticket};
use crate::core::scheduler::EventQueue;
use crate::core::types::{PatientId, SimTime};
use crate::error::{ConfigError, EngineError};
use crate::metrics::{RunMetrics, RunSummary};
use crate::patient::{Patient, Priority, Stage};

/// Events that drive the patient pipelines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum SimEvent {
    /// The next patient walks through the door.
    Arrival,
    /// A queued request took over a unit of capacity; service can begin.
    Granted { patient: PatientId, stage: Stage },
    /// A stage's service completed; assessment and routing follow.
    ServiceDone { patient: PatientId, stage: Stage },
}

/// Ready-to-sample distributions for every random draw in a run.
///
/// Built once up front so parameter faults surface before any event is
/// dispatched.
pub(crate) struct Samplers {
    pub interarrival: BuiltDistribution,
    pub reception: BuiltDistribution,
    pub nurse: BuiltDistribution,
    /// Indexed by [`Priority::doctor_index`].
    pub doctor: [BuiltDistribution; 4],
}

impl Samplers {
    fn build(config: &SimulationConfig) -> Result<Self, ConfigError> {
        let doctor = &config.doctor.service;
        Ok(Samplers {
            interarrival: config.arrivals.interarrival.build("arrivals.interarrival")?,
            reception: config.reception.service.build("reception.service")?,
            nurse: config.nurse.service.build("nurse.service")?,
            doctor: [
                doctor.critical.build("doctor.service.critical")?,
                doctor.urgent.build("doctor.service.urgent")?,
                doctor.moderate.build("doctor.service.moderate")?,
                doctor.low.build("doctor.service.low")?,
            ],
        })
    }
}

/// Outcome of one finished replication.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_index: usize,
    pub seed: u64,
    /// Patients generated, including declined ones.
    pub generated: u64,
    pub summary: RunSummary,
}

/// One self-contained run of the model.
pub struct Replication {
    pub(crate) run_index: usize,
    pub(crate) seed: u64,
    pub(crate) config: SimulationConfig,
    pub(crate) samplers: Samplers,
    pub(crate) queue: EventQueue<SimEvent>,
    pub(crate) rng: StdRng,
    pub(crate) reception: Resource,
    pub(crate) nurse: Resource,
    pub(crate) doctor: Resource,
    /// Patients currently inside the department, by id.
    pub(crate) patients: HashMap<PatientId, Patient>,
    pub(crate) next_patient_id: PatientId,
    pub(crate) generated: u64,
    pub(crate) last_arrival: Option<SimTime>,
    pub(crate) metrics: RunMetrics,
}

impl Replication {
    /// Build a run context from a validated configuration.
    ///
    /// The random stream is seeded with `master seed + run index`, so a
    /// batch of runs is reproducible per run, not just as a whole.
    pub fn new(config: SimulationConfig, run_index: usize) -> Result<Self, ConfigError> {
        config.validate()?;
        let samplers = Samplers::build(&config)?;
        let seed = config.general.seed.wrapping_add(run_index as u64);
        let capacities = &config.resources;
        let reception = Resource::fifo("receptionist", capacities.receptionist);
        let nurse = Resource::priority("nurse", capacities.nurse);
        let doctor = Resource::priority("doctor", capacities.doctor);
        let metrics = RunMetrics::new(config.general.warm_up_minutes);
        Ok(Replication {
            run_index,
            seed,
            config,
            samplers,
            queue: EventQueue::new(),
            rng: StdRng::seed_from_u64(seed),
            reception,
            nurse,
            doctor,
            patients: HashMap::new(),
            next_patient_id: 1,
            generated: 0,
            last_arrival: None,
            metrics,
        })
    }

    /// Drive the run to completion and summarize it.
    pub fn run(mut self) -> Result<RunReport, EngineError> {
        debug!(
            "[Replication {}] starting, seed {}",
            self.run_index, self.seed
        );
        self.queue.schedule(0.0, SimEvent::Arrival)?;

        let time_limit = match self.config.general.horizon {
            Horizon::Minutes(minutes) => Some(minutes),
            Horizon::Patients(_) => None,
        };

        while let Some(next_at) = self.queue.peek_time() {
            if let Some(limit) = time_limit {
                if next_at > limit {
                    break;
                }
            }
            let (now, event) = match self.queue.pop() {
                Some(popped) => popped,
                None => break,
            };
            self.dispatch(now, event)?;
        }

        self.metrics.set_end_clock(self.queue.now());
        info!(
            "[Replication {}] done at {:.2} min: {} generated, {} still in department",
            self.run_index,
            self.queue.now(),
            self.generated,
            self.patients.len()
        );

        let summary = self.metrics.summarize(&self.config);
        Ok(RunReport {
            run_index: self.run_index,
            seed: self.seed,
            generated: self.generated,
            summary,
        })
    }

    fn dispatch(&mut self, now: SimTime, event: SimEvent) -> Result<(), EngineError> {
        match event {
            SimEvent::Arrival => self.handle_arrival(now),
            SimEvent::Granted { patient, stage } => self.handle_granted(patient, stage, now),
            SimEvent::ServiceDone { patient, stage } => {
                self.handle_service_done(patient, stage, now)
            }
        }
    }

    pub(crate) fn resource_mut(&mut self, stage: Stage) -> &mut Resource {
        match stage {
            Stage::Reception => &mut self.reception,
            Stage::Nurse => &mut self.nurse,
            Stage::Doctor => &mut self.doctor,
        }
    }

    pub(crate) fn patient_mut(&mut self, id: PatientId) -> Result<&mut Patient, EngineError> {
        self.patients
            .get_mut(&id)
            .ok_or(EngineError::UnknownPatient { patient: id })
    }

    pub(crate) fn remove_patient(&mut self, id: PatientId) -> Result<Patient, EngineError> {
        self.patients
            .remove(&id)
            .ok_or(EngineError::UnknownPatient { patient: id })
    }

    /// Draw a service duration for `stage`, using the patient's current
    /// priority to pick the doctor-side sampler.
    pub(crate) fn sample_service(
        &mut self,
        id: PatientId,
        stage: Stage,
        priority: Option<Priority>,
    ) -> Result<f64, EngineError> {
        let sampler = match stage {
            Stage::Reception => self.samplers.reception,
            Stage::Nurse => self.samplers.nurse,
            Stage::Doctor => {
                let priority = priority.ok_or(EngineError::PriorityUnset { patient: id })?;
                let index = priority
                    .doctor_index()
                    .ok_or(EngineError::InvalidRoute {
                        patient: id,
                        priority: priority.as_str(),
                        stage: stage.as_str(),
                    })?;
                self.samplers.doctor[index]
            }
        };
        Ok(sampler.sample(&mut self.rng))
    }

    /// Return a stage's capacity unit. If a waiter takes it over, schedule
    /// its wakeup at the current clock.
    pub(crate) fn release_stage(
        &mut self,
        stage: Stage,
        ticket: Ticket,
        now: SimTime,
    ) -> Result<(), EngineError> {
        let handover: Option<Grant> = self.resource_mut(stage).release(ticket)?;
        if let Some(grant) = handover {
            let next = grant.owner;
            let station = self.resource_mut(stage).name();
            debug!(
                "[Replication {}] {} hands over to patient {}",
                self.run_index, station, next
            );
            self.patient_mut(next)?.ticket = Some(grant.ticket);
            self.queue.schedule(
                now,
                SimEvent::Granted {
                    patient: next,
                    stage,
                },
            )?;
        }
        Ok(())
    }
}
