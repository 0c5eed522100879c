//! # Clinic Core
//!
//! The scheduling-and-visit lifecycle engine for the clinic front desk.
//!
//! This crate contains the parts of the system with real consistency
//! requirements under contention:
//! - Slot allocation: claiming doctor/room capacity without overbooking
//! - The appointment and visit state machines
//! - Billing and the derived income ledger
//! - Patient identity resolution (find-or-create without duplicates)
//!
//! **No API concerns**: authentication, HTTP routing, request parsing and
//! the administrative list/filter surfaces belong to the serve layer, which
//! calls into this crate through the services below and passes in the
//! current server time as boundary data.

pub mod allocator;
pub mod appointment;
pub mod billing;
pub mod config;
pub mod domain;
pub mod error;
pub mod identity;
pub mod store;
pub mod visit;

#[cfg(test)]
pub(crate) mod testutil;

pub use allocator::{SlotAllocator, SlotClaim};
pub use appointment::AppointmentService;
pub use billing::{BillingService, Settlement, SettlementAmounts};
pub use config::CoreConfig;
pub use error::{ClinicError, ClinicResult};
pub use identity::PatientService;
pub use store::ClinicStore;
pub use visit::{VisitService, WalkInRequest};

use std::sync::Arc;

/// Bundles every front-desk service over one shared store.
///
/// Convenience for the serve layer (and tests): construct once at startup
/// with a resolved [`CoreConfig`], then hand out clones of the individual
/// services to request handlers.
#[derive(Clone)]
pub struct FrontDesk {
    store: Arc<ClinicStore>,
    pub allocator: SlotAllocator,
    pub patients: PatientService,
    pub appointments: AppointmentService,
    pub visits: VisitService,
    pub billing: BillingService,
}

impl FrontDesk {
    /// Creates a front desk over a fresh, empty store.
    pub fn new(cfg: CoreConfig) -> Self {
        Self::with_store(Arc::new(ClinicStore::new()), cfg)
    }

    /// Creates a front desk over an existing store.
    pub fn with_store(store: Arc<ClinicStore>, cfg: CoreConfig) -> Self {
        let cfg = Arc::new(cfg);
        Self {
            allocator: SlotAllocator::new(store.clone(), cfg.clone()),
            patients: PatientService::new(store.clone()),
            appointments: AppointmentService::new(store.clone(), cfg.clone()),
            visits: VisitService::new(store.clone(), cfg.clone()),
            billing: BillingService::new(store.clone()),
            store,
        }
    }

    /// The shared store behind all services.
    pub fn store(&self) -> &Arc<ClinicStore> {
        &self.store
    }
}
