//! Domain entities and state machines.
//!
//! Entities mirror the clinic's relational schema: a department owns rooms,
//! a schedule slot grants one doctor a half-day of bookable capacity in a
//! room, a visit records one physical attendance, and a bill plus an income
//! record close a visit out. Identifiers are store-assigned sequential
//! newtypes; ascending id order doubles as creation order, which both the
//! slot allocator (deterministic tie-break) and the identity resolver
//! (most-recently-created match) rely on.
//!
//! Status fields are closed enums with their transition tables expressed as
//! exhaustive matches, so a new state cannot be added without revisiting
//! every transition site.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clinic_types::{Gender, Money, NationalId, NonEmptyText, PhoneNumber};
use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a clinical department.
    DepartmentId
);
entity_id!(
    /// Identifier of a consultation room.
    RoomId
);
entity_id!(
    /// Identifier of a patient record.
    PatientId
);
entity_id!(
    /// Identifier of a schedule slot.
    ScheduleId
);
entity_id!(
    /// Identifier of an appointment.
    AppointmentId
);
entity_id!(
    /// Identifier of a visit.
    VisitId
);
entity_id!(
    /// Identifier of a bill.
    BillId
);
entity_id!(
    /// Identifier of an income ledger record.
    IncomeRecordId
);

/// A doctor's employee code (assigned by HR, not by this system).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoctorId(pub String);

impl std::fmt::Display for DoctorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// DIRECTORY ENTITIES
// ============================================================================

/// A clinical department.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: NonEmptyText,
}

/// A doctor who can be scheduled into rooms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: DoctorId,
    pub name: NonEmptyText,
}

/// A consultation room belonging to a department.
///
/// Inactive rooms are never considered by the slot allocator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub number: NonEmptyText,
    pub dept_id: DepartmentId,
    pub active: bool,
}

// ============================================================================
// SCHEDULING
// ============================================================================

/// The half-day period a schedule slot covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Morning,
    Afternoon,
    /// Covers both halves of the day.
    FullDay,
}

impl Period {
    /// Derives the half-day period from a target time of day.
    ///
    /// Before noon is morning, noon onwards is afternoon. This never
    /// returns [`Period::FullDay`]; full-day slots match either half via
    /// [`Period::covers`].
    pub fn from_time(time: NaiveTime) -> Self {
        use chrono::Timelike;
        if time.hour() < 12 {
            Period::Morning
        } else {
            Period::Afternoon
        }
    }

    /// Whether a slot with this period accepts a booking in `wanted`.
    pub fn covers(self, wanted: Period) -> bool {
        self == wanted || self == Period::FullDay
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Period::Morning => write!(f, "morning"),
            Period::Afternoon => write!(f, "afternoon"),
            Period::FullDay => write!(f, "full_day"),
        }
    }
}

/// One unit of bookable capacity: a doctor in a room for a half-day.
///
/// Unique on (room, date, period). The invariant
/// `occupied <= max_capacity` is upheld by the store's conditional claim
/// operation; nothing else writes `occupied`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub id: ScheduleId,
    pub room_id: RoomId,
    pub doctor_id: DoctorId,
    pub work_date: NaiveDate,
    pub period: Period,
    pub max_capacity: u32,
    pub occupied: u32,
}

// ============================================================================
// PATIENT
// ============================================================================

/// A patient identity record.
///
/// Created only by the identity resolver. `gender` and `national_id` are
/// backfilled when previously unset and never overwritten once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub name: NonEmptyText,
    pub gender: Option<Gender>,
    pub national_id: Option<NationalId>,
    pub phone: PhoneNumber,
    pub created_at: NaiveDateTime,
}

// ============================================================================
// APPOINTMENT
// ============================================================================

/// Lifecycle states of an advance booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// The targets a front-desk status update may move this state to.
    ///
    /// `Completed` never appears as a target: it is reached only as a side
    /// effect of a successful check-in.
    pub fn allowed_transitions(self) -> &'static [AppointmentStatus] {
        match self {
            AppointmentStatus::Pending => {
                &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Confirmed => &[AppointmentStatus::Cancelled],
            AppointmentStatus::Completed => &[],
            AppointmentStatus::Cancelled => &[],
        }
    }

    /// Whether a manual transition to `target` is legal.
    pub fn can_transition_to(self, target: AppointmentStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }

    /// Whether this state has no outgoing transitions at all.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A patient's advance booking.
///
/// Carries a snapshot of the patient's name and phone taken at creation
/// time; the optional `patient_id` link is attached at creation (patient
/// self-service) or resolved during check-in. Appointments are never
/// physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub patient_name: NonEmptyText,
    pub phone: PhoneNumber,
    pub dept_id: DepartmentId,
    pub expected_time: NaiveDateTime,
    pub status: AppointmentStatus,
    pub patient_id: Option<PatientId>,
    pub created_at: NaiveDateTime,
}

// ============================================================================
// VISIT
// ============================================================================

/// Lifecycle states of a physical clinic visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Waiting,
    InConsultation,
    AwaitingPayment,
    Discharged,
}

impl VisitStatus {
    /// The targets a front-desk status update may move this state to.
    ///
    /// `AwaitingPayment` has no manual successor: a visit leaves it only
    /// through the billing engine, which performs the transition to
    /// `Discharged` as part of settlement.
    pub fn allowed_transitions(self) -> &'static [VisitStatus] {
        match self {
            VisitStatus::Waiting => &[VisitStatus::InConsultation],
            VisitStatus::InConsultation => &[VisitStatus::AwaitingPayment],
            VisitStatus::AwaitingPayment => &[],
            VisitStatus::Discharged => &[],
        }
    }

    /// Whether a manual transition to `target` is legal.
    pub fn can_transition_to(self, target: VisitStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }
}

impl std::fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisitStatus::Waiting => write!(f, "waiting"),
            VisitStatus::InConsultation => write!(f, "in_consultation"),
            VisitStatus::AwaitingPayment => write!(f, "awaiting_payment"),
            VisitStatus::Discharged => write!(f, "discharged"),
        }
    }
}

/// One physical presence at the clinic.
///
/// `appointment_id` is unique when present (an appointment can be checked
/// in at most once). Immutable once `Discharged`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    pub patient_id: PatientId,
    pub room_id: RoomId,
    pub doctor_id: DoctorId,
    pub appointment_id: Option<AppointmentId>,
    pub status: VisitStatus,
    pub check_in_time: NaiveDateTime,
    pub checkout_time: Option<NaiveDateTime>,
}

// ============================================================================
// BILLING
// ============================================================================

/// Payment state of a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayStatus {
    Unpaid,
    Paid,
}

impl std::fmt::Display for PayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayStatus::Unpaid => write!(f, "unpaid"),
            PayStatus::Paid => write!(f, "paid"),
        }
    }
}

/// The monetary settlement of a visit (1:1 with the visit).
///
/// Invariant, enforced by the billing engine before any write:
/// `insurance + self_pay == total` and all three amounts non-negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub visit_id: VisitId,
    pub total: Money,
    pub insurance: Money,
    pub self_pay: Money,
    pub pay_status: PayStatus,
    pub pay_time: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

/// An append-only ledger entry recording realised revenue per settlement.
///
/// Never mutated or deleted after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeRecord {
    pub id: IncomeRecordId,
    pub bill_id: BillId,
    pub dept_id: DepartmentId,
    pub doctor_id: DoctorId,
    pub amount: Money,
    pub record_date: NaiveDate,
}
