//! Visit lifecycle: appointment check-in, walk-in registration, in-clinic
//! status updates.
//!
//! Check-in and walk-in are the two paths that create a visit, and both run
//! as a single transaction combining slot allocation, identity resolution
//! and the visit insert. A failure at any step — including `NoCapacity` from
//! the allocator — rolls the whole attempt back, so a claimed slot unit
//! never outlives a failed check-in.

use crate::allocator::reserve_in;
use crate::config::CoreConfig;
use crate::domain::{
    AppointmentId, AppointmentStatus, DepartmentId, Visit, VisitId, VisitStatus,
};
use crate::error::{ClinicError, ClinicResult};
use crate::identity::resolve_or_create_in;
use crate::store::{ClinicStore, Tables};
use chrono::NaiveDateTime;
use clinic_types::{Gender, NationalId, NonEmptyText, PhoneNumber};
use std::sync::Arc;

/// A walk-in registration request: the person at the desk, the department
/// they want, and optionally when (defaults to right now).
#[derive(Debug, Clone)]
pub struct WalkInRequest {
    pub name: NonEmptyText,
    pub phone: PhoneNumber,
    pub dept_id: DepartmentId,
    pub gender: Option<Gender>,
    pub national_id: Option<NationalId>,
    pub expected_time: Option<NaiveDateTime>,
}

/// Service for creating and transitioning visits.
#[derive(Clone)]
pub struct VisitService {
    store: Arc<ClinicStore>,
    cfg: Arc<CoreConfig>,
}

impl VisitService {
    /// Creates a new visit service over the shared store.
    pub fn new(store: Arc<ClinicStore>, cfg: Arc<CoreConfig>) -> Self {
        Self { store, cfg }
    }

    /// Checks a booked appointment in, converting it to a `Waiting` visit.
    ///
    /// One transaction covering, in order: the phone verification, the
    /// slot-capacity claim for the appointment's department and expected
    /// time, patient resolution (attaching a patient to the appointment if
    /// it arrived without one), the visit insert, and marking the
    /// appointment `Completed`.
    ///
    /// # Arguments
    ///
    /// * `appt_id` - the appointment being checked in
    /// * `phone` - if supplied, must match the phone the appointment was
    ///   booked with
    /// * `national_id` - if supplied, strengthens identity resolution and is
    ///   backfilled onto the patient record when previously unset
    /// * `now` - current server time, recorded as the check-in time
    ///
    /// # Errors
    ///
    /// * `ClinicError::NotFound` - unknown appointment
    /// * `ClinicError::Conflict` - the appointment already has a visit
    /// * `ClinicError::Validation` - phone or national id mismatch
    /// * `ClinicError::InvalidState` - the appointment is cancelled or
    ///   otherwise terminal
    /// * `ClinicError::NoCapacity` - no slot has room; nothing is written
    pub fn check_in(
        &self,
        appt_id: AppointmentId,
        phone: Option<&PhoneNumber>,
        national_id: Option<&NationalId>,
        now: NaiveDateTime,
    ) -> ClinicResult<Visit> {
        self.store.transaction(|tables| {
            let appt = tables
                .appointment(appt_id)
                .ok_or(ClinicError::NotFound("appointment"))?
                .clone();

            if tables.visit_by_appointment(appt_id).is_some() {
                return Err(ClinicError::Conflict(format!(
                    "appointment {appt_id} is already checked in"
                )));
            }
            if let Some(phone) = phone {
                if phone != &appt.phone {
                    return Err(ClinicError::validation(
                        "phone",
                        "does not match the appointment",
                    ));
                }
            }
            if appt.status.is_terminal() {
                return Err(ClinicError::InvalidState(format!(
                    "appointment status is {}",
                    appt.status
                )));
            }

            let claim = reserve_in(tables, &self.cfg, appt.dept_id, appt.expected_time)?;

            let patient_id = match appt.patient_id {
                Some(id) => {
                    let patient = tables
                        .patient_mut(id)
                        .ok_or(ClinicError::NotFound("patient"))?;
                    if let Some(nid) = national_id {
                        match &patient.national_id {
                            Some(recorded) if recorded != nid => {
                                return Err(ClinicError::validation(
                                    "national_id",
                                    "does not match the appointment's patient",
                                ));
                            }
                            Some(_) => {}
                            None => patient.national_id = Some(nid.clone()),
                        }
                    }
                    id
                }
                None => {
                    let id = resolve_or_create_in(
                        tables,
                        &appt.patient_name,
                        &appt.phone,
                        None,
                        national_id,
                        now,
                    )?;
                    let appt = tables
                        .appointment_mut(appt_id)
                        .ok_or(ClinicError::NotFound("appointment"))?;
                    appt.patient_id = Some(id);
                    id
                }
            };

            let visit_id = tables.insert_visit(
                patient_id,
                claim.room_id,
                claim.doctor_id,
                Some(appt_id),
                now,
            )?;
            let appt = tables
                .appointment_mut(appt_id)
                .ok_or(ClinicError::NotFound("appointment"))?;
            appt.status = AppointmentStatus::Completed;

            tracing::info!(
                visit_id = visit_id.0,
                appointment_id = appt_id.0,
                patient_id = patient_id.0,
                schedule_id = claim.schedule_id.0,
                "appointment checked in"
            );
            visit_snapshot(tables, visit_id)
        })
    }

    /// Registers a walk-in patient: no prior appointment, visit created
    /// directly.
    ///
    /// The target time defaults to `now` when the request leaves it unset.
    /// Like check-in, slot allocation, identity resolution and the visit
    /// insert commit or roll back together.
    ///
    /// # Errors
    ///
    /// * `ClinicError::Validation` - unknown department, or an expected time
    ///   further in the past than the configured tolerance
    /// * `ClinicError::NoCapacity` - no slot has room; no patient record is
    ///   created either
    pub fn walk_in(&self, request: WalkInRequest, now: NaiveDateTime) -> ClinicResult<Visit> {
        let target = request.expected_time.unwrap_or(now);
        if target < now - self.cfg.past_time_tolerance() {
            return Err(ClinicError::validation(
                "expected_time",
                "cannot register for a time in the past",
            ));
        }

        self.store.transaction(|tables| {
            if tables.department(request.dept_id).is_none() {
                return Err(ClinicError::validation("dept_id", "unknown department"));
            }

            let claim = reserve_in(tables, &self.cfg, request.dept_id, target)?;
            let patient_id = resolve_or_create_in(
                tables,
                &request.name,
                &request.phone,
                request.gender,
                request.national_id.as_ref(),
                now,
            )?;
            let visit_id =
                tables.insert_visit(patient_id, claim.room_id, claim.doctor_id, None, now)?;

            tracing::info!(
                visit_id = visit_id.0,
                patient_id = patient_id.0,
                schedule_id = claim.schedule_id.0,
                "walk-in registered"
            );
            visit_snapshot(tables, visit_id)
        })
    }

    /// Applies a front-desk status update to a visit.
    ///
    /// Only `Waiting -> InConsultation` and
    /// `InConsultation -> AwaitingPayment` are manual moves; discharge
    /// happens exclusively through settlement (see [`crate::billing`]).
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::NotFound` for an unknown visit and
    /// `ClinicError::InvalidTransition` for a move the table forbids.
    pub fn transition(&self, visit_id: VisitId, new_status: VisitStatus) -> ClinicResult<Visit> {
        self.store.transaction(|tables| {
            let visit = tables
                .visit_mut(visit_id)
                .ok_or(ClinicError::NotFound("visit"))?;
            if !visit.status.can_transition_to(new_status) {
                return Err(ClinicError::invalid_transition(
                    visit.status,
                    new_status,
                    visit.status.allowed_transitions(),
                ));
            }
            visit.status = new_status;
            tracing::info!(
                visit_id = visit_id.0,
                status = %new_status,
                "visit status updated"
            );
            visit_snapshot(tables, visit_id)
        })
    }
}

fn visit_snapshot(tables: &Tables, id: VisitId) -> ClinicResult<Visit> {
    tables
        .visit(id)
        .cloned()
        .ok_or_else(|| ClinicError::Internal("visit vanished".into()))
}
