//! Appointment lifecycle: creation, front-desk status updates, owner
//! cancellation.
//!
//! An appointment is an advance booking against a department, not against a
//! concrete slot — capacity is only claimed at check-in (see
//! [`crate::visit`]). The state machine lives in
//! [`AppointmentStatus::allowed_transitions`]; this module enforces it and
//! reports violations with the full allowed-target set.

use crate::config::CoreConfig;
use crate::domain::{Appointment, AppointmentId, AppointmentStatus, DepartmentId, PatientId};
use crate::error::{ClinicError, ClinicResult};
use crate::store::ClinicStore;
use chrono::NaiveDateTime;
use std::sync::Arc;

/// Service for creating and transitioning appointments.
#[derive(Clone)]
pub struct AppointmentService {
    store: Arc<ClinicStore>,
    cfg: Arc<CoreConfig>,
}

impl AppointmentService {
    /// Creates a new appointment service over the shared store.
    pub fn new(store: Arc<ClinicStore>, cfg: Arc<CoreConfig>) -> Self {
        Self { store, cfg }
    }

    /// Creates a `Pending` appointment for an already-resolved patient.
    ///
    /// The patient's name and phone are snapshotted onto the appointment so
    /// the front desk can work from it even before the identity link is
    /// needed again at check-in.
    ///
    /// # Arguments
    ///
    /// * `patient_id` - the caller's resolved identity (ambient
    ///   authentication is the serve layer's job; the engine only takes
    ///   explicit identities)
    /// * `dept_id` - the department being booked
    /// * `expected_time` - the requested date-time
    /// * `now` - current server time, for the past-time check
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Validation` if the expected time lies further
    /// in the past than the configured clock-skew tolerance or the
    /// department is unknown, and `ClinicError::NotFound` if the patient
    /// does not exist.
    pub fn create(
        &self,
        patient_id: PatientId,
        dept_id: DepartmentId,
        expected_time: NaiveDateTime,
        now: NaiveDateTime,
    ) -> ClinicResult<Appointment> {
        if expected_time < now - self.cfg.past_time_tolerance() {
            return Err(ClinicError::validation(
                "expected_time",
                "cannot book a time in the past",
            ));
        }

        self.store.transaction(|tables| {
            if tables.department(dept_id).is_none() {
                return Err(ClinicError::validation("dept_id", "unknown department"));
            }
            let patient = tables.patient(patient_id).ok_or(ClinicError::NotFound("patient"))?;

            let (name, phone) = (patient.name.clone(), patient.phone.clone());
            let id = tables.insert_appointment(
                name,
                phone,
                dept_id,
                expected_time,
                Some(patient_id),
                now,
            );
            tracing::info!(
                appointment_id = id.0,
                patient_id = patient_id.0,
                dept_id = dept_id.0,
                expected_time = %expected_time,
                "appointment created"
            );
            appointment_snapshot(tables, id)
        })
    }

    /// Applies a front-desk status update.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::NotFound` for an unknown appointment, and
    /// `ClinicError::InvalidTransition` — carrying the source state, the
    /// attempted target and the allowed targets — when the transition table
    /// forbids the move. The appointment is unchanged on failure.
    pub fn transition(
        &self,
        appt_id: AppointmentId,
        new_status: AppointmentStatus,
    ) -> ClinicResult<Appointment> {
        self.store.transaction(|tables| {
            let appt = tables
                .appointment_mut(appt_id)
                .ok_or(ClinicError::NotFound("appointment"))?;
            if !appt.status.can_transition_to(new_status) {
                return Err(ClinicError::invalid_transition(
                    appt.status,
                    new_status,
                    appt.status.allowed_transitions(),
                ));
            }
            appt.status = new_status;
            tracing::info!(
                appointment_id = appt_id.0,
                status = %new_status,
                "appointment status updated"
            );
            appointment_snapshot(tables, appt_id)
        })
    }

    /// Cancels an appointment on behalf of its owning patient.
    ///
    /// Cancelling an appointment that is already `Completed` or `Cancelled`
    /// is a no-op returning the current record rather than an error — from
    /// the patient's point of view there is nothing left to cancel.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::NotFound` if the appointment does not exist or
    /// is not owned by `owner` (absence and foreign ownership are
    /// deliberately indistinguishable).
    pub fn cancel(&self, appt_id: AppointmentId, owner: PatientId) -> ClinicResult<Appointment> {
        self.store.transaction(|tables| {
            let appt = tables
                .appointment_mut(appt_id)
                .ok_or(ClinicError::NotFound("appointment"))?;
            if appt.patient_id != Some(owner) {
                return Err(ClinicError::NotFound("appointment"));
            }
            if appt.status.is_terminal() {
                return appointment_snapshot(tables, appt_id);
            }
            appt.status = AppointmentStatus::Cancelled;
            tracing::info!(appointment_id = appt_id.0, "appointment cancelled by patient");
            appointment_snapshot(tables, appt_id)
        })
    }
}

fn appointment_snapshot(
    tables: &crate::store::Tables,
    id: AppointmentId,
) -> ClinicResult<Appointment> {
    tables
        .appointment(id)
        .cloned()
        .ok_or_else(|| ClinicError::Internal("appointment vanished".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::resolve_or_create_in;
    use crate::testutil::{name, now, phone, seed_clinic, SeededClinic};

    fn setup() -> (Arc<ClinicStore>, SeededClinic, AppointmentService, PatientId) {
        let store = Arc::new(ClinicStore::new());
        let seeded = seed_clinic(&store, 5);
        let service = AppointmentService::new(store.clone(), Arc::new(CoreConfig::default()));
        let patient_id = store
            .transaction(|t| {
                resolve_or_create_in(t, &name("Zhang Wei"), &phone("13800138000"), None, None, now())
            })
            .expect("seed patient");
        (store, seeded, service, patient_id)
    }

    fn future_time() -> NaiveDateTime {
        now() + chrono::Duration::hours(2)
    }

    #[test]
    fn test_create_starts_pending_with_patient_snapshot() {
        let (_store, seeded, service, patient_id) = setup();

        let appt = service
            .create(patient_id, seeded.dept_id, future_time(), now())
            .expect("create should succeed");
        assert_eq!(appt.status, AppointmentStatus::Pending);
        assert_eq!(appt.patient_id, Some(patient_id));
        assert_eq!(appt.patient_name.as_str(), "Zhang Wei");
        assert_eq!(appt.phone.as_str(), "13800138000");
    }

    #[test]
    fn test_create_tolerates_small_clock_skew_only() {
        let (_store, seeded, service, patient_id) = setup();

        // 29 seconds in the past: inside the tolerance.
        service
            .create(
                patient_id,
                seeded.dept_id,
                now() - chrono::Duration::seconds(29),
                now(),
            )
            .expect("within tolerance should succeed");

        // 31 seconds in the past: rejected.
        let err = service
            .create(
                patient_id,
                seeded.dept_id,
                now() - chrono::Duration::seconds(31),
                now(),
            )
            .expect_err("beyond tolerance should fail");
        assert!(
            matches!(err, ClinicError::Validation { field: "expected_time", .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn test_create_rejects_unknown_department_and_patient() {
        let (_store, seeded, service, patient_id) = setup();

        let err = service
            .create(patient_id, DepartmentId(99), future_time(), now())
            .expect_err("unknown department should fail");
        assert!(matches!(err, ClinicError::Validation { field: "dept_id", .. }));

        let err = service
            .create(PatientId(99), seeded.dept_id, future_time(), now())
            .expect_err("unknown patient should fail");
        assert!(matches!(err, ClinicError::NotFound("patient")));
    }

    #[test]
    fn test_legal_transitions_succeed() {
        let (_store, seeded, service, patient_id) = setup();
        let appt = service
            .create(patient_id, seeded.dept_id, future_time(), now())
            .unwrap();

        let confirmed = service
            .transition(appt.id, AppointmentStatus::Confirmed)
            .expect("pending -> confirmed is legal");
        assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

        let cancelled = service
            .transition(appt.id, AppointmentStatus::Cancelled)
            .expect("confirmed -> cancelled is legal");
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    }

    #[test]
    fn test_illegal_transition_reports_allowed_set_and_leaves_state() {
        let (store, seeded, service, patient_id) = setup();
        let appt = service
            .create(patient_id, seeded.dept_id, future_time(), now())
            .unwrap();

        let err = service
            .transition(appt.id, AppointmentStatus::Completed)
            .expect_err("completed is never a manual target");
        match err {
            ClinicError::InvalidTransition { from, to, allowed } => {
                assert_eq!(from, "pending");
                assert_eq!(to, "completed");
                assert_eq!(allowed, vec!["confirmed", "cancelled"]);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }

        let status = store
            .read(|t| t.appointment(appt.id).map(|a| a.status))
            .unwrap();
        assert_eq!(status, Some(AppointmentStatus::Pending), "state unchanged");
    }

    #[test]
    fn test_cancel_on_terminal_appointment_is_a_no_op() {
        let (_store, seeded, service, patient_id) = setup();
        let appt = service
            .create(patient_id, seeded.dept_id, future_time(), now())
            .unwrap();
        service.cancel(appt.id, patient_id).expect("first cancel");

        let again = service
            .cancel(appt.id, patient_id)
            .expect("cancelling a cancelled appointment is a no-op");
        assert_eq!(again.status, AppointmentStatus::Cancelled);
    }

    #[test]
    fn test_cancel_by_non_owner_looks_like_not_found() {
        let (store, seeded, service, patient_id) = setup();
        let appt = service
            .create(patient_id, seeded.dept_id, future_time(), now())
            .unwrap();

        let stranger = store
            .transaction(|t| {
                resolve_or_create_in(t, &name("Li Na"), &phone("13900139000"), None, None, now())
            })
            .unwrap();
        let err = service
            .cancel(appt.id, stranger)
            .expect_err("foreign cancellation should fail");
        assert!(matches!(err, ClinicError::NotFound("appointment")));
    }
}
