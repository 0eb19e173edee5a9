use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ReconError;
use super::money::Money;
use super::period::Period;

/// Display order of transaction columns handed over by the ingestion side.
pub const TRANSACTION_COLUMNS: &[&str] = &[
    "uid",
    "company",
    "counterparty",
    "period_month",
    "period_year",
    "date",
    "particulars",
    "voucher_type",
    "voucher_no",
    "debit",
    "credit",
    "entered_by",
    "upload_pair_id",
];

/// Which side of an inter-company transfer a ledger row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Debit side: the company that lent the money.
    Lender,
    /// Credit side: the company that received it.
    Borrower,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Lender => write!(f, "lender"),
            Role::Borrower => write!(f, "borrower"),
        }
    }
}

/// One normalized row from a company's inter-unit loan ledger.
///
/// `company` owns the ledger the row came from; `counterparty` is the other
/// company that ledger tracks the loan account against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub uid: String,
    pub company: String,
    pub counterparty: String,
    pub date: NaiveDate,
    pub particulars: String,
    pub voucher_type: Option<String>,
    pub voucher_no: Option<String>,
    pub debit: Money,
    pub credit: Money,
    pub period: Period,
    pub entered_by: Option<String>,
    pub upload_pair_id: Option<String>,
}

impl Transaction {
    /// Role of this row in a transfer.
    ///
    /// `Ok(None)` means the row carries no amount at all and is simply not
    /// eligible for matching. Rows with both sides set, or with a negative
    /// amount, are integrity failures.
    pub fn role(&self) -> Result<Option<Role>, ReconError> {
        if self.debit.is_negative() || self.credit.is_negative() {
            return Err(ReconError::DataIntegrity {
                uid: self.uid.clone(),
                reason: format!("negative amount (debit={}, credit={})", self.debit, self.credit),
            });
        }
        match (self.debit.is_zero(), self.credit.is_zero()) {
            (false, true) => Ok(Some(Role::Lender)),
            (true, false) => Ok(Some(Role::Borrower)),
            (true, true) => Ok(None),
            (false, false) => Err(ReconError::DataIntegrity {
                uid: self.uid.clone(),
                reason: format!("both debit ({}) and credit ({}) are set", self.debit, self.credit),
            }),
        }
    }

    /// The non-zero side of the row.
    pub fn amount(&self) -> Money {
        if self.debit.is_zero() {
            self.credit
        } else {
            self.debit
        }
    }

    /// True when `other` is the mirror row: recorded in the counterparty's
    /// ledger against this row's company.
    pub fn mirrors(&self, other: &Transaction) -> bool {
        self.company == other.counterparty && self.counterparty == other.company
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn row(uid: &str, company: &str, counterparty: &str, debit: i64, credit: i64) -> Transaction {
        let date = date(2024, 1, 10);
        Transaction {
            uid: uid.to_string(),
            company: company.to_string(),
            counterparty: counterparty.to_string(),
            date,
            particulars: "loan transfer".to_string(),
            voucher_type: Some("Payment".to_string()),
            voucher_no: None,
            debit: Money::from_cents(debit),
            credit: Money::from_cents(credit),
            period: Period::of(date),
            entered_by: None,
            upload_pair_id: None,
        }
    }
}
