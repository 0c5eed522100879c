//! Shared fixtures for the engine's unit tests.

use crate::domain::{DepartmentId, DoctorId, Period, RoomId, ScheduleId};
use crate::store::ClinicStore;
use chrono::{NaiveDate, NaiveDateTime};
use clinic_types::{NonEmptyText, PhoneNumber};

/// Handles to the reference data one test clinic is seeded with.
pub(crate) struct SeededClinic {
    pub dept_id: DepartmentId,
    pub room_id: RoomId,
    pub doctor_id: DoctorId,
    pub slot_id: ScheduleId,
}

/// The fixed working day used across tests.
pub(crate) fn work_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 9, 1).expect("valid date")
}

/// A fixed "server now" on the morning of [`work_date`].
pub(crate) fn now() -> NaiveDateTime {
    work_date()
        .and_hms_opt(9, 0, 0)
        .expect("valid time of day")
}

pub(crate) fn name(s: &str) -> NonEmptyText {
    NonEmptyText::new(s).expect("valid test name")
}

pub(crate) fn phone(s: &str) -> PhoneNumber {
    PhoneNumber::new(s).expect("valid test phone")
}

/// Seeds one department with one active room, one doctor and one morning
/// slot of the given capacity on [`work_date`].
pub(crate) fn seed_clinic(store: &ClinicStore, capacity: u32) -> SeededClinic {
    let dept_id = store
        .add_department(name("Internal Medicine"))
        .expect("seed department");
    let doctor_id = DoctorId("D001".into());
    store
        .add_doctor(doctor_id.clone(), name("Dr. Chen"))
        .expect("seed doctor");
    let room_id = store
        .add_room(name("A-101"), dept_id, true)
        .expect("seed room");
    let slot_id = store
        .add_schedule_slot(
            room_id,
            doctor_id.clone(),
            work_date(),
            Period::Morning,
            capacity,
        )
        .expect("seed slot");

    SeededClinic {
        dept_id,
        room_id,
        doctor_id,
        slot_id,
    }
}
