//! Shared clinic store with transactional mutation.
//!
//! `ClinicStore` stands in for the clinic's relational database: one shared
//! set of tables behind a lock, mutated only through all-or-nothing
//! transactions. Request handlers hold the store behind an `Arc` and every
//! multi-row operation (check-in, settlement) runs inside one
//! [`ClinicStore::transaction`] call, so no caller can ever observe a
//! half-completed mutation.
//!
//! The one genuinely contended resource is a schedule slot's occupied
//! counter. [`Tables::claim_slot_capacity`] is the single conditional
//! store-layer operation that increments it — a compare-and-increment, not
//! a read-then-write — and nothing else in the crate touches the counter.

use crate::domain::{
    Appointment, AppointmentId, AppointmentStatus, Bill, BillId, Department, DepartmentId, Doctor,
    DoctorId, IncomeRecord, IncomeRecordId, Patient, PatientId, PayStatus, Period, Room, RoomId,
    ScheduleId, ScheduleSlot, Visit, VisitId, VisitStatus,
};
use crate::error::{ClinicError, ClinicResult};
use chrono::{NaiveDate, NaiveDateTime};
use clinic_types::{Gender, Money, NationalId, NonEmptyText, PhoneNumber};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// The clinic's tables, as seen inside a read closure or a transaction.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    departments: BTreeMap<DepartmentId, Department>,
    doctors: BTreeMap<DoctorId, Doctor>,
    rooms: BTreeMap<RoomId, Room>,
    patients: BTreeMap<PatientId, Patient>,
    slots: BTreeMap<ScheduleId, ScheduleSlot>,
    appointments: BTreeMap<AppointmentId, Appointment>,
    visits: BTreeMap<VisitId, Visit>,
    bills: BTreeMap<BillId, Bill>,
    income: Vec<IncomeRecord>,
    next_id: NextIds,
}

#[derive(Debug, Clone)]
struct NextIds {
    department: u32,
    room: u32,
    patient: u32,
    slot: u32,
    appointment: u32,
    visit: u32,
    bill: u32,
    income: u32,
}

impl Default for NextIds {
    fn default() -> Self {
        Self {
            department: 1,
            room: 1,
            patient: 1,
            slot: 1,
            appointment: 1,
            visit: 1,
            bill: 1,
            income: 1,
        }
    }
}

impl Tables {
    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn department(&self, id: DepartmentId) -> Option<&Department> {
        self.departments.get(&id)
    }

    pub fn doctor(&self, id: &DoctorId) -> Option<&Doctor> {
        self.doctors.get(id)
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn patient(&self, id: PatientId) -> Option<&Patient> {
        self.patients.get(&id)
    }

    pub fn slot(&self, id: ScheduleId) -> Option<&ScheduleSlot> {
        self.slots.get(&id)
    }

    /// Iterates schedule slots in ascending id order.
    pub fn slots(&self) -> impl Iterator<Item = &ScheduleSlot> {
        self.slots.values()
    }

    /// Iterates patients in ascending id order (creation order).
    pub fn patients(&self) -> impl Iterator<Item = &Patient> {
        self.patients.values()
    }

    pub fn appointment(&self, id: AppointmentId) -> Option<&Appointment> {
        self.appointments.get(&id)
    }

    pub fn visit(&self, id: VisitId) -> Option<&Visit> {
        self.visits.get(&id)
    }

    /// The visit linked to an appointment, if the appointment has been
    /// checked in.
    pub fn visit_by_appointment(&self, appt_id: AppointmentId) -> Option<&Visit> {
        self.visits
            .values()
            .find(|v| v.appointment_id == Some(appt_id))
    }

    pub fn bill(&self, id: BillId) -> Option<&Bill> {
        self.bills.get(&id)
    }

    /// The bill for a visit (bills are 1:1 with visits).
    pub fn bill_for_visit(&self, visit_id: VisitId) -> Option<&Bill> {
        self.bills.values().find(|b| b.visit_id == visit_id)
    }

    /// The income ledger, in append order.
    pub fn income_records(&self) -> &[IncomeRecord] {
        &self.income
    }

    pub fn patient_by_national_id(&self, national_id: &NationalId) -> Option<&Patient> {
        self.patients
            .values()
            .find(|p| p.national_id.as_ref() == Some(national_id))
    }

    /// The most recently created patient with this exact (phone, name)
    /// pair. Creation order is id order, so the scan walks ids descending.
    pub fn latest_patient_by_phone_and_name(
        &self,
        phone: &PhoneNumber,
        name: &NonEmptyText,
    ) -> Option<&Patient> {
        self.patients
            .values()
            .rev()
            .find(|p| &p.phone == phone && &p.name == name)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    pub(crate) fn patient_mut(&mut self, id: PatientId) -> Option<&mut Patient> {
        self.patients.get_mut(&id)
    }

    pub(crate) fn appointment_mut(&mut self, id: AppointmentId) -> Option<&mut Appointment> {
        self.appointments.get_mut(&id)
    }

    pub(crate) fn visit_mut(&mut self, id: VisitId) -> Option<&mut Visit> {
        self.visits.get_mut(&id)
    }

    pub(crate) fn bill_for_visit_mut(&mut self, visit_id: VisitId) -> Option<&mut Bill> {
        self.bills.values_mut().find(|b| b.visit_id == visit_id)
    }

    /// Claims one unit of capacity from a slot, if any remains.
    ///
    /// This is the conditional increment the whole allocator rests on: the
    /// `occupied < max_capacity` check and the increment happen as one
    /// store operation, so two claims can never both take a slot's last
    /// unit. Returns `false` when the slot is unknown or already full.
    pub(crate) fn claim_slot_capacity(&mut self, id: ScheduleId) -> bool {
        match self.slots.get_mut(&id) {
            Some(slot) if slot.occupied < slot.max_capacity => {
                slot.occupied += 1;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn insert_department(&mut self, name: NonEmptyText) -> DepartmentId {
        let id = DepartmentId(self.next_id.department);
        self.next_id.department += 1;
        self.departments.insert(id, Department { id, name });
        id
    }

    pub(crate) fn insert_doctor(&mut self, id: DoctorId, name: NonEmptyText) -> ClinicResult<()> {
        if self.doctors.contains_key(&id) {
            return Err(ClinicError::Conflict(format!(
                "doctor '{id}' already exists"
            )));
        }
        self.doctors.insert(id.clone(), Doctor { id, name });
        Ok(())
    }

    pub(crate) fn insert_room(
        &mut self,
        number: NonEmptyText,
        dept_id: DepartmentId,
        active: bool,
    ) -> ClinicResult<RoomId> {
        if self.department(dept_id).is_none() {
            return Err(ClinicError::NotFound("department"));
        }
        if self.rooms.values().any(|r| r.number == number) {
            return Err(ClinicError::Conflict(format!(
                "room number '{number}' already exists"
            )));
        }
        let id = RoomId(self.next_id.room);
        self.next_id.room += 1;
        self.rooms.insert(
            id,
            Room {
                id,
                number,
                dept_id,
                active,
            },
        );
        Ok(id)
    }

    pub(crate) fn insert_slot(
        &mut self,
        room_id: RoomId,
        doctor_id: DoctorId,
        work_date: NaiveDate,
        period: Period,
        max_capacity: u32,
    ) -> ClinicResult<ScheduleId> {
        if self.room(room_id).is_none() {
            return Err(ClinicError::NotFound("room"));
        }
        if self.doctor(&doctor_id).is_none() {
            return Err(ClinicError::NotFound("doctor"));
        }
        if max_capacity == 0 {
            return Err(ClinicError::validation(
                "max_capacity",
                "must be at least 1",
            ));
        }
        let duplicate = self
            .slots
            .values()
            .any(|s| s.room_id == room_id && s.work_date == work_date && s.period == period);
        if duplicate {
            return Err(ClinicError::Conflict(format!(
                "schedule slot for room {room_id} on {work_date} ({period}) already exists"
            )));
        }

        let id = ScheduleId(self.next_id.slot);
        self.next_id.slot += 1;
        self.slots.insert(
            id,
            ScheduleSlot {
                id,
                room_id,
                doctor_id,
                work_date,
                period,
                max_capacity,
                occupied: 0,
            },
        );
        Ok(id)
    }

    pub(crate) fn insert_patient(
        &mut self,
        name: NonEmptyText,
        gender: Option<Gender>,
        national_id: Option<NationalId>,
        phone: PhoneNumber,
        created_at: NaiveDateTime,
    ) -> ClinicResult<PatientId> {
        if let Some(nid) = &national_id {
            if self.patient_by_national_id(nid).is_some() {
                return Err(ClinicError::Conflict(format!(
                    "national id '{nid}' is already registered"
                )));
            }
        }
        let id = PatientId(self.next_id.patient);
        self.next_id.patient += 1;
        self.patients.insert(
            id,
            Patient {
                id,
                name,
                gender,
                national_id,
                phone,
                created_at,
            },
        );
        Ok(id)
    }

    pub(crate) fn insert_appointment(
        &mut self,
        patient_name: NonEmptyText,
        phone: PhoneNumber,
        dept_id: DepartmentId,
        expected_time: NaiveDateTime,
        patient_id: Option<PatientId>,
        created_at: NaiveDateTime,
    ) -> AppointmentId {
        let id = AppointmentId(self.next_id.appointment);
        self.next_id.appointment += 1;
        self.appointments.insert(
            id,
            Appointment {
                id,
                patient_name,
                phone,
                dept_id,
                expected_time,
                status: AppointmentStatus::Pending,
                patient_id,
                created_at,
            },
        );
        id
    }

    pub(crate) fn insert_visit(
        &mut self,
        patient_id: PatientId,
        room_id: RoomId,
        doctor_id: DoctorId,
        appointment_id: Option<AppointmentId>,
        check_in_time: NaiveDateTime,
    ) -> ClinicResult<VisitId> {
        if let Some(appt_id) = appointment_id {
            // Mirrors the unique constraint on the appointment link.
            if self.visit_by_appointment(appt_id).is_some() {
                return Err(ClinicError::Conflict(format!(
                    "appointment {appt_id} already has a visit"
                )));
            }
        }
        let id = VisitId(self.next_id.visit);
        self.next_id.visit += 1;
        self.visits.insert(
            id,
            Visit {
                id,
                patient_id,
                room_id,
                doctor_id,
                appointment_id,
                status: VisitStatus::Waiting,
                check_in_time,
                checkout_time: None,
            },
        );
        Ok(id)
    }

    pub(crate) fn insert_bill(
        &mut self,
        visit_id: VisitId,
        created_at: NaiveDateTime,
    ) -> ClinicResult<BillId> {
        if self.bill_for_visit(visit_id).is_some() {
            return Err(ClinicError::Conflict(format!(
                "visit {visit_id} already has a bill"
            )));
        }
        let id = BillId(self.next_id.bill);
        self.next_id.bill += 1;
        self.bills.insert(
            id,
            Bill {
                id,
                visit_id,
                total: Money::ZERO,
                insurance: Money::ZERO,
                self_pay: Money::ZERO,
                pay_status: PayStatus::Unpaid,
                pay_time: None,
                created_at,
            },
        );
        Ok(id)
    }

    pub(crate) fn append_income(
        &mut self,
        bill_id: BillId,
        dept_id: DepartmentId,
        doctor_id: DoctorId,
        amount: Money,
        record_date: NaiveDate,
    ) -> IncomeRecordId {
        let id = IncomeRecordId(self.next_id.income);
        self.next_id.income += 1;
        self.income.push(IncomeRecord {
            id,
            bill_id,
            dept_id,
            doctor_id,
            amount,
            record_date,
        });
        id
    }
}

/// The shared clinic store.
///
/// Cheap to share via `Arc`; every public engine operation goes through
/// [`ClinicStore::read`] or [`ClinicStore::transaction`].
#[derive(Debug, Default)]
pub struct ClinicStore {
    inner: RwLock<Tables>,
}

impl ClinicStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs a read-only closure against the current tables.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Internal` if the store lock is poisoned.
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> ClinicResult<T> {
        let guard = self.inner.read().map_err(|_| poisoned())?;
        Ok(f(&guard))
    }

    /// Runs a closure against a staged copy of the tables and commits the
    /// result only if the closure succeeds.
    ///
    /// This is the all-or-nothing boundary for every multi-row operation:
    /// an `Err` from the closure discards the staged tables wholesale, so a
    /// check-in that claims a slot and then fails identity validation rolls
    /// the claim back along with everything else. The write lock is held
    /// for the duration, serialising transactions against each other.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error, or returns `ClinicError::Internal`
    /// if the store lock is poisoned.
    pub fn transaction<T>(&self, f: impl FnOnce(&mut Tables) -> ClinicResult<T>) -> ClinicResult<T> {
        let mut guard = self.inner.write().map_err(|_| poisoned())?;
        let mut staged = guard.clone();
        let value = f(&mut staged)?;
        *guard = staged;
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Directory writes (administrative scheduling and reference data).
    // The generic admin CRUD surface lives outside the core; these are the
    // minimal creation paths the engine and its collaborators need.
    // ------------------------------------------------------------------

    /// Registers a department.
    pub fn add_department(&self, name: NonEmptyText) -> ClinicResult<DepartmentId> {
        self.transaction(|t| Ok(t.insert_department(name)))
    }

    /// Registers a doctor under an externally assigned employee code.
    pub fn add_doctor(&self, id: DoctorId, name: NonEmptyText) -> ClinicResult<()> {
        self.transaction(|t| t.insert_doctor(id.clone(), name))
    }

    /// Registers a room within a department.
    pub fn add_room(
        &self,
        number: NonEmptyText,
        dept_id: DepartmentId,
        active: bool,
    ) -> ClinicResult<RoomId> {
        self.transaction(|t| t.insert_room(number, dept_id, active))
    }

    /// Creates a schedule slot: one doctor, one room, one half-day of
    /// capacity. Unique per (room, date, period).
    pub fn add_schedule_slot(
        &self,
        room_id: RoomId,
        doctor_id: DoctorId,
        work_date: NaiveDate,
        period: Period,
        max_capacity: u32,
    ) -> ClinicResult<ScheduleId> {
        self.transaction(|t| {
            t.insert_slot(room_id, doctor_id.clone(), work_date, period, max_capacity)
        })
    }
}

fn poisoned() -> ClinicError {
    tracing::error!("clinic store lock poisoned");
    ClinicError::Internal("store lock poisoned".into())
}
