//! Patient identity resolution.
//!
//! Every path that brings a person into the system — self-service
//! registration, appointment check-in, walk-in registration — funnels
//! through this module, which is the sole writer of patient identity-merge
//! logic. Lookup order: national id first (the strongest key), then the
//! exact (phone, name) pair preferring the most recently created match,
//! then create. Existing records are only ever backfilled: a gender or
//! national id that was recorded once is never overwritten.

use crate::domain::{Patient, PatientId};
use crate::error::{ClinicError, ClinicResult};
use crate::store::{ClinicStore, Tables};
use chrono::NaiveDateTime;
use clinic_types::{Gender, NationalId, NonEmptyText, PhoneNumber};
use std::sync::Arc;

/// Finds or creates a patient within an already-open transaction.
///
/// Returns the id of the matched or newly created patient. On a match,
/// backfills `national_id` and `gender` only when the existing record has
/// them unset.
pub(crate) fn resolve_or_create_in(
    tables: &mut Tables,
    name: &NonEmptyText,
    phone: &PhoneNumber,
    gender: Option<Gender>,
    national_id: Option<&NationalId>,
    now: NaiveDateTime,
) -> ClinicResult<PatientId> {
    let existing = national_id
        .and_then(|nid| tables.patient_by_national_id(nid))
        .map(|p| p.id)
        .or_else(|| {
            tables
                .latest_patient_by_phone_and_name(phone, name)
                .map(|p| p.id)
        });

    match existing {
        Some(id) => {
            let patient = tables
                .patient_mut(id)
                .ok_or_else(|| ClinicError::Internal("matched patient vanished".into()))?;
            if patient.national_id.is_none() {
                if let Some(nid) = national_id {
                    patient.national_id = Some(nid.clone());
                }
            }
            if patient.gender.is_none() {
                patient.gender = gender;
            }
            Ok(id)
        }
        None => {
            let id = tables.insert_patient(
                name.clone(),
                gender,
                national_id.cloned(),
                phone.clone(),
                now,
            )?;
            tracing::info!(patient_id = id.0, "new patient record created");
            Ok(id)
        }
    }
}

/// Service exposing identity resolution to the serve layer.
#[derive(Clone)]
pub struct PatientService {
    store: Arc<ClinicStore>,
}

impl PatientService {
    /// Creates a new patient service over the shared store.
    pub fn new(store: Arc<ClinicStore>) -> Self {
        Self { store }
    }

    /// Finds an existing patient or creates a new record.
    ///
    /// Shared by self-service registration, appointment check-in and
    /// walk-in registration; calling it twice with the same national id
    /// always yields the same patient.
    ///
    /// # Arguments
    ///
    /// * `name` / `phone` - the secondary de-duplication key
    /// * `gender` / `national_id` - optional identity fields, backfilled
    ///   onto an existing match only when previously unset
    /// * `now` - current server time, recorded on newly created patients
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Conflict` if creation would duplicate a
    /// national id (cannot happen through normal resolution order, but the
    /// store constraint is enforced regardless).
    pub fn resolve_or_create(
        &self,
        name: &NonEmptyText,
        phone: &PhoneNumber,
        gender: Option<Gender>,
        national_id: Option<&NationalId>,
        now: NaiveDateTime,
    ) -> ClinicResult<Patient> {
        self.store.transaction(|tables| {
            let id = resolve_or_create_in(tables, name, phone, gender, national_id, now)?;
            tables
                .patient(id)
                .cloned()
                .ok_or_else(|| ClinicError::Internal("resolved patient vanished".into()))
        })
    }
}
