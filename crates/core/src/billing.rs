//! Billing: settling a visit and recording realised revenue.
//!
//! Settlement is the financial close of a visit and the only path to the
//! `Discharged` state. One transaction marks the bill paid, discharges the
//! visit, and appends exactly one income ledger record; a failure anywhere
//! leaves bill, visit and ledger all untouched.
//!
//! Amounts arrive as strings (money never travels as floating point) and
//! are validated before any write: non-negative, insurance within total,
//! and `insurance + self_pay == total` exactly.

use crate::domain::{Bill, PayStatus, Visit, VisitId, VisitStatus};
use crate::error::{ClinicError, ClinicResult};
use crate::store::ClinicStore;
use chrono::NaiveDateTime;
use clinic_types::Money;
use std::sync::Arc;

/// The validated monetary breakdown of a settlement request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementAmounts {
    pub total: Money,
    pub insurance: Money,
    /// Left unset by callers who want it derived as `total - insurance`.
    pub self_pay: Option<Money>,
}

impl SettlementAmounts {
    /// Parses settlement amounts from their string form.
    ///
    /// `insurance` defaults to zero when absent; `self_pay` may be omitted
    /// to have settlement derive it.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Validation` naming the field that failed to
    /// parse.
    pub fn parse(
        total: &str,
        insurance: Option<&str>,
        self_pay: Option<&str>,
    ) -> ClinicResult<Self> {
        let total = Money::parse(total)
            .map_err(|e| ClinicError::validation("total", e.to_string()))?;
        let insurance = Money::parse(insurance.unwrap_or("0"))
            .map_err(|e| ClinicError::validation("insurance", e.to_string()))?;
        let self_pay = self_pay
            .map(|s| Money::parse(s).map_err(|e| ClinicError::validation("self_pay", e.to_string())))
            .transpose()?;
        Ok(Self {
            total,
            insurance,
            self_pay,
        })
    }
}

/// The outcome of a successful settlement.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub visit: Visit,
    pub bill: Bill,
}

/// Service that settles visits and maintains the income ledger.
#[derive(Clone)]
pub struct BillingService {
    store: Arc<ClinicStore>,
}

impl BillingService {
    /// Creates a new billing service over the shared store.
    pub fn new(store: Arc<ClinicStore>) -> Self {
        Self { store }
    }

    /// Settles a visit: pays its bill, discharges it and records the
    /// revenue.
    ///
    /// When `self_pay` is unset it is derived as `total - insurance`. The
    /// amounts must satisfy: all non-negative, `insurance <= total`, and
    /// `insurance + self_pay == total` exactly. The visit must be in
    /// `AwaitingPayment`.
    ///
    /// On success the visit's bill (created now if check-in did not leave
    /// one behind) carries the breakdown with `pay_status = Paid` and
    /// `pay_time = now`, the visit is `Discharged` with `checkout_time =
    /// now`, and one income record for the full `total` is appended under
    /// the visit's department and doctor, dated `now`.
    ///
    /// # Errors
    ///
    /// * `ClinicError::Validation` - amounts are negative, exceed the
    ///   total, or fail to sum to it
    /// * `ClinicError::NotFound` - unknown visit
    /// * `ClinicError::InvalidState` - the visit is not awaiting payment
    ///   (reports the status observed)
    /// * `ClinicError::Internal` - the visit's room no longer resolves to a
    ///   department
    pub fn settle(
        &self,
        visit_id: VisitId,
        amounts: SettlementAmounts,
        now: NaiveDateTime,
    ) -> ClinicResult<Settlement> {
        let SettlementAmounts {
            total,
            insurance,
            self_pay,
        } = amounts;

        if total.is_negative() {
            return Err(ClinicError::validation("total", "must not be negative"));
        }
        if insurance.is_negative() {
            return Err(ClinicError::validation("insurance", "must not be negative"));
        }
        if self_pay.map_or(false, |amount| amount.is_negative()) {
            return Err(ClinicError::validation("self_pay", "must not be negative"));
        }
        if insurance > total {
            return Err(ClinicError::validation(
                "insurance",
                "must not exceed the total",
            ));
        }
        let self_pay = self_pay.unwrap_or(total - insurance);
        if insurance + self_pay != total {
            return Err(ClinicError::validation(
                "self_pay",
                format!("{insurance} + {self_pay} does not equal the total {total}"),
            ));
        }

        self.store.transaction(|tables| {
            let visit = tables
                .visit(visit_id)
                .ok_or(ClinicError::NotFound("visit"))?
                .clone();
            if visit.status != VisitStatus::AwaitingPayment {
                return Err(ClinicError::InvalidState(format!(
                    "visit status is {}",
                    visit.status
                )));
            }

            // The ledger attributes revenue to the department the visit's
            // room belongs to; reference data should never lose that link.
            let dept_id = tables
                .room(visit.room_id)
                .map(|room| room.dept_id)
                .ok_or_else(|| {
                    tracing::error!(
                        visit_id = visit_id.0,
                        room_id = visit.room_id.0,
                        "settlement found a visit whose room is missing"
                    );
                    ClinicError::Internal("visit room missing".into())
                })?;

            if tables.bill_for_visit(visit_id).is_none() {
                tables.insert_bill(visit_id, now)?;
            }
            let bill = tables
                .bill_for_visit_mut(visit_id)
                .ok_or_else(|| ClinicError::Internal("bill vanished".into()))?;
            bill.total = total;
            bill.insurance = insurance;
            bill.self_pay = self_pay;
            bill.pay_status = PayStatus::Paid;
            bill.pay_time = Some(now);
            let bill_id = bill.id;

            let visit = tables
                .visit_mut(visit_id)
                .ok_or(ClinicError::NotFound("visit"))?;
            visit.status = VisitStatus::Discharged;
            visit.checkout_time = Some(now);
            let doctor_id = visit.doctor_id.clone();

            tables.append_income(bill_id, dept_id, doctor_id, total, now.date());

            tracing::info!(
                visit_id = visit_id.0,
                bill_id = bill_id.0,
                total = %total,
                insurance = %insurance,
                self_pay = %self_pay,
                "visit settled and discharged"
            );

            let visit = tables
                .visit(visit_id)
                .cloned()
                .ok_or_else(|| ClinicError::Internal("visit vanished".into()))?;
            let bill = tables
                .bill(bill_id)
                .cloned()
                .ok_or_else(|| ClinicError::Internal("bill vanished".into()))?;
            Ok(Settlement { visit, bill })
        })
    }
}
