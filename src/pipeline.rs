//! Stage activities: what happens to a patient at each event.
//!
//! Handlers here are the event-side half of [`Replication`]; the loop in
//! `replication.rs` dispatches into them. Each handler mutates the patient,
//! touches the stage resource, records what the counters need and schedules
//! the follow-up events. Routing after every completed stage follows the
//! current triage priority.

use log::debug;
use rand::Rng;

use crate::config::Horizon;
use crate::core::resource::{Acquired, Ticket};
use crate::core::types::{PatientId, SimTime};
use crate::error::EngineError;
use crate::patient::{Disposition, Patient, Priority, Stage};
use crate::replication::{Replication, SimEvent};
use crate::trace::{self, TracePoint};

impl Replication {
    /// A patient walks in. Generates the next arrival, then either turns
    /// the patient away at the door or sends them to Reception.
    pub(crate) fn handle_arrival(&mut self, now: SimTime) -> Result<(), EngineError> {
        let id = self.next_patient_id;
        self.next_patient_id += 1;
        self.generated += 1;

        if let Some(last) = self.last_arrival {
            self.metrics.record_arrival_gap(now - last, now);
        }
        self.last_arrival = Some(now);

        let keep_generating = match self.config.general.horizon {
            Horizon::Patients(limit) => self.generated < limit,
            Horizon::Minutes(_) => true,
        };
        if keep_generating {
            let gap = self.samplers.interarrival.sample(&mut self.rng);
            self.queue.schedule(now + gap, SimEvent::Arrival)?;
        }

        trace::event_start(TracePoint::Arrival, id, now, None);

        // The waiting room only has so many seats. A full reception queue
        // turns the arrival away before any triage happens.
        let waiting = self.reception.queue_len();
        if waiting >= self.config.resources.waiting_room as usize {
            debug!(
                "[Replication {}] patient {} turned away, waiting room full ({} waiting)",
                self.run_index, id, waiting
            );
            self.metrics.record_disposition(Disposition::Declined, now);
            trace::event_end(TracePoint::Exit, id, now, Some("declined access"));
            return Ok(());
        }

        self.patients.insert(id, Patient::new(id, now));
        self.enter_stage(id, Stage::Reception, now)
    }

    /// Join a stage: open the visit, request the resource, and either start
    /// service at once or sit down in the queue.
    pub(crate) fn enter_stage(
        &mut self,
        id: PatientId,
        stage: Stage,
        now: SimTime,
    ) -> Result<(), EngineError> {
        trace::event_start(TracePoint::from_stage(stage), id, now, None);

        // Reception is first-come-first-served; the clinical queues order
        // by triage priority.
        let rank = match stage {
            Stage::Reception => 0,
            Stage::Nurse | Stage::Doctor => self.patient_mut(id)?.priority()?.rank(),
        };
        if stage == Stage::Nurse {
            let priority = self.patient_mut(id)?.priority()?;
            self.metrics.record_nurse_intake(priority, now);
        }
        self.patient_mut(id)?.begin_visit(stage, now);

        match self.resource_mut(stage).request(id, rank) {
            Acquired::Granted(ticket) => {
                {
                    let patient = self.patient_mut(id)?;
                    patient.ticket = Some(ticket);
                    let visit = patient.visit_mut(stage).ok_or(EngineError::VisitMissing {
                        patient: id,
                        stage: stage.as_str(),
                    })?;
                    visit.started = Some(now);
                }
                self.metrics.record_queue_wait(stage, 0.0, now);
                self.begin_service(id, stage, now)
            }
            Acquired::Queued(ticket) => {
                self.patient_mut(id)?.ticket = Some(ticket);
                let queued_behind = self.resource_mut(stage).queue_len();
                debug!(
                    "[Replication {}] patient {} queued for {} ({} waiting)",
                    self.run_index, id, stage, queued_behind
                );
                if stage != Stage::Reception {
                    self.patience_checkpoint(id, Some(stage), now)?;
                }
                Ok(())
            }
        }
    }

    /// A queued request now holds capacity: close out the queueing delay
    /// and start service.
    pub(crate) fn handle_granted(
        &mut self,
        id: PatientId,
        stage: Stage,
        now: SimTime,
    ) -> Result<(), EngineError> {
        let wait = {
            let patient = self.patient_mut(id)?;
            let visit = patient.visit_mut(stage).ok_or(EngineError::VisitMissing {
                patient: id,
                stage: stage.as_str(),
            })?;
            let wait = now - visit.entered;
            visit.started = Some(now);
            patient.total_queue_wait += wait;
            wait
        };
        self.metrics.record_queue_wait(stage, wait, now);
        debug!(
            "[Replication {}] patient {} granted {} after {:.2} min in queue",
            self.run_index, id, stage, wait
        );
        self.begin_service(id, stage, now)
    }

    /// Draw the service duration and schedule its completion.
    pub(crate) fn begin_service(
        &mut self,
        id: PatientId,
        stage: Stage,
        now: SimTime,
    ) -> Result<(), EngineError> {
        let priority = self.patient_mut(id)?.priority;
        let duration = self.sample_service(id, stage, priority)?;
        self.queue.schedule(
            now + duration,
            SimEvent::ServiceDone { patient: id, stage },
        )?;
        debug!(
            "[Replication {}] patient {} starts {} service, {:.2} min",
            self.run_index, id, stage, duration
        );
        Ok(())
    }

    /// Service finished: close the visit, then assess and route.
    pub(crate) fn handle_service_done(
        &mut self,
        id: PatientId,
        stage: Stage,
        now: SimTime,
    ) -> Result<(), EngineError> {
        let (duration, ticket) = {
            let patient = self.patient_mut(id)?;
            let ticket = patient.ticket.take().ok_or(EngineError::TicketMissing {
                patient: id,
                stage: stage.as_str(),
            })?;
            let visit = patient.visit_mut(stage).ok_or(EngineError::VisitMissing {
                patient: id,
                stage: stage.as_str(),
            })?;
            let started = visit.started.ok_or(EngineError::VisitMissing {
                patient: id,
                stage: stage.as_str(),
            })?;
            visit.exited = Some(now);
            (now - started, ticket)
        };
        self.metrics.record_service(stage, duration, now);

        match stage {
            Stage::Reception => self.complete_reception(id, ticket, now),
            Stage::Nurse => self.complete_nurse(id, ticket, now),
            Stage::Doctor => self.complete_doctor(id, ticket, now),
        }
    }

    /// Registration done: triage the patient, free the desk, route.
    fn complete_reception(
        &mut self,
        id: PatientId,
        ticket: Ticket,
        now: SimTime,
    ) -> Result<(), EngineError> {
        let priority = self.config.reception.assessment.draw(&mut self.rng);
        self.patient_mut(id)?.priority = Some(priority);
        self.metrics.record_classification(priority, now);
        let note = format!("assessed {priority}");
        trace::event_end(TracePoint::Reception, id, now, Some(&note));
        self.release_stage(Stage::Reception, ticket, now)?;

        match priority {
            Priority::NonUrgent => {
                self.exit_patient(id, Disposition::Discharged, now, "non-urgent, sent home")
            }
            priority if priority.needs_nurse() => {
                if self.patience_checkpoint(id, None, now)? {
                    return Ok(());
                }
                self.enter_stage(id, Stage::Nurse, now)
            }
            _ => self.enter_stage(id, Stage::Doctor, now),
        }
    }

    /// Nurse done: re-triage with the priority-specific table, free the
    /// nurse, route on the new priority.
    fn complete_nurse(
        &mut self,
        id: PatientId,
        ticket: Ticket,
        now: SimTime,
    ) -> Result<(), EngineError> {
        let from = self.patient_mut(id)?.priority()?;
        let reassessed = match from {
            Priority::Moderate => self.config.nurse.reassessment_moderate.draw(&mut self.rng),
            Priority::Low => self.config.nurse.reassessment_low.draw(&mut self.rng),
            other => {
                return Err(EngineError::InvalidRoute {
                    patient: id,
                    priority: other.as_str(),
                    stage: Stage::Nurse.as_str(),
                })
            }
        };
        self.patient_mut(id)?.priority = Some(reassessed);
        self.metrics.record_nurse_reassignment(from, reassessed, now);
        let note = format!("reassessed {from} to {reassessed}");
        trace::event_end(TracePoint::Nurse, id, now, Some(&note));
        self.release_stage(Stage::Nurse, ticket, now)?;

        if reassessed == Priority::NonUrgent {
            return self.exit_patient(
                id,
                Disposition::Discharged,
                now,
                "reassessed non-urgent, sent home",
            );
        }
        self.enter_stage(id, Stage::Doctor, now)
    }

    /// Consultation done: draw the admission outcome, free the doctor,
    /// and send the patient out.
    fn complete_doctor(
        &mut self,
        id: PatientId,
        ticket: Ticket,
        now: SimTime,
    ) -> Result<(), EngineError> {
        let priority = self.patient_mut(id)?.priority()?;
        let percentage = self
            .config
            .doctor
            .admission
            .percentage_for(priority)
            .ok_or(EngineError::InvalidRoute {
                patient: id,
                priority: priority.as_str(),
                stage: Stage::Doctor.as_str(),
            })?;
        let admitted = self.rng.gen_bool(percentage / 100.0);
        self.metrics.record_doctor_outcome(priority, admitted, now);

        let (disposition, note) = if admitted {
            (Disposition::Admitted, "admitted to a ward")
        } else {
            (Disposition::Discharged, "treated and discharged")
        };
        trace::event_end(TracePoint::Doctor, id, now, Some(note));
        self.release_stage(Stage::Doctor, ticket, now)?;
        self.exit_patient(id, disposition, now, note)
    }

    /// One of the three impatience checkpoints. Returns true when the
    /// patient gave up and left.
    ///
    /// Critical and Urgent patients never abandon. Everyone else risks a
    /// walk-out once their cumulative queueing time exceeds the patience
    /// threshold; `queued` names the stage holding a still-waiting ticket
    /// to withdraw.
    pub(crate) fn patience_checkpoint(
        &mut self,
        id: PatientId,
        queued: Option<Stage>,
        now: SimTime,
    ) -> Result<bool, EngineError> {
        let (priority, waited) = {
            let patient = self.patient_mut(id)?;
            (patient.priority()?, patient.total_queue_wait)
        };
        if priority.exempt_from_impatience() {
            return Ok(false);
        }
        if waited <= self.config.patience.threshold_minutes {
            return Ok(false);
        }
        if !self
            .rng
            .gen_bool(self.config.patience.abandonment_percentage / 100.0)
        {
            return Ok(false);
        }

        if let Some(stage) = queued {
            let ticket = self
                .patient_mut(id)?
                .ticket
                .take()
                .ok_or(EngineError::TicketMissing {
                    patient: id,
                    stage: stage.as_str(),
                })?;
            self.resource_mut(stage).withdraw(ticket)?;
            debug!(
                "[Replication {}] patient {} walked out of the {} queue",
                self.run_index, id, stage
            );
        }
        self.exit_patient(id, Disposition::Abandoned, now, "patience exhausted")?;
        Ok(true)
    }

    /// Remove the patient from the department and record the outcome.
    fn exit_patient(
        &mut self,
        id: PatientId,
        disposition: Disposition,
        now: SimTime,
        note: &str,
    ) -> Result<(), EngineError> {
        let mut patient = self.remove_patient(id)?;
        patient.disposition = disposition;
        self.metrics.record_disposition(disposition, now);
        trace::event_end(TracePoint::Exit, id, now, Some(note));
        debug!(
            "[Replication {}] patient {} left as {} after {:.2} min ({:.2} of it queueing)",
            self.run_index,
            id,
            patient.disposition,
            now - patient.arrival_time,
            patient.total_queue_wait
        );
        Ok(())
    }
}
