//! Shared fixtures for the accumulation integration tests

#![allow(dead_code)]

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use core_kernel::{Cents, ReimbursementClaimId};
use domain_accumulation::memory::{InMemoryAccumulationStore, InMemoryTransfer, StaticClaimSource};
use domain_accumulation::{
    AccumulationClaimRecord, DataSourcer, MemberDemographics, Payer, PayerCode, PayerRegistry,
    ResponseProcessor,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn code(value: &str) -> PayerCode {
    PayerCode::new(value).unwrap()
}

/// Claim record with deterministic claim id `n`
pub fn record(payer: &Payer, n: u128) -> AccumulationClaimRecord {
    AccumulationClaimRecord {
        claim: ReimbursementClaimId::from_uuid(Uuid::from_u128(n)).into(),
        payer_id: payer.id,
        member_plan_id: format!("MBR{n:04}"),
        date_of_service: date(2024, 12, 15),
        deductible_applied: Some(Cents::new(2500 * n as i64)),
        oop_applied: Some(Cents::new(1000)),
        member: Some(MemberDemographics {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            date_of_birth: date(1980, 5, 17),
        }),
        resend: false,
        published_at: Utc::now(),
    }
}

/// A wired pipeline over in-memory adapters
pub struct Harness {
    pub payer: Payer,
    pub store: InMemoryAccumulationStore,
    pub claims: StaticClaimSource,
    pub transfer: InMemoryTransfer,
    pub registry: Arc<PayerRegistry>,
}

impl Harness {
    pub async fn new(payer_code: &str) -> Self {
        let payer = Payer::new(format!("{payer_code} payer"), code(payer_code));
        Self {
            store: InMemoryAccumulationStore::with_payers(vec![payer.clone()]).await,
            payer,
            claims: StaticClaimSource::default(),
            transfer: InMemoryTransfer::new(),
            registry: Arc::new(PayerRegistry::with_defaults().unwrap()),
        }
    }

    pub fn sourcer(&self) -> DataSourcer {
        DataSourcer::new(
            Arc::new(self.store.clone()),
            Arc::new(self.claims.clone()),
            Arc::new(self.transfer.clone()),
            Arc::clone(&self.registry),
        )
    }

    pub fn processor(&self) -> ResponseProcessor {
        ResponseProcessor::new(
            Arc::new(self.store.clone()),
            Arc::new(self.transfer.clone()),
            Arc::clone(&self.registry),
        )
    }
}
