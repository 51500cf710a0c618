use crate::core::allocate::{self as core_allocate, AllocationError};
use crate::core::finance::Money;
use crate::core::installment::Installment;
use crate::core::interval;
use crate::core::manual::{DEFAULT_INTERVAL_MONTHS, ManualEntry, ValidationError};
use crate::core::policy::{self, DistributionPolicy, IntervalPolicy, PolicyDraft, ScheduleLength};
use crate::core::reconcile::Reconciliation;
use crate::core::redistribute::{
    Redistribution, RedistributeError, ScheduleContext, TotalChanged, TotalTracker,
};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use std::fmt::Display;
use std::ops::Deref;

pub use crate::core::manual::{auto_fill_dates, build_manual, renormalize, validate};
pub use crate::core::reconcile::reconcile;
pub use crate::core::redistribute::{on_total_changed, redistribute_after_removal};

#[derive(Debug, Error)]
pub enum Error {
    #[error("contract {0} not found")]
    UnknownContract(ContractId),
    #[error("contract has no start date")]
    NoStartDate,
    #[error("schedule is not interval driven")]
    NotInterval,
    #[error("invalid policy: {0}")]
    Policy(#[from] policy::Error),
    #[error("invalid allocation: {0}")]
    Allocation(#[from] AllocationError),
    #[error("invalid manual distribution: {0}")]
    Manual(#[from] ValidationError),
    #[error(transparent)]
    Redistribute(#[from] RedistributeError),
    #[error("installments are off by {difference}")]
    Unbalanced { difference: Money },
    #[error("cant save schedule")]
    CantSaveSchedule,
}

pub type ContractId = String;

/// Условия оплаты договора, из которых строится график
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractTerms {
    pub total: Money,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub policy: PolicyDraft,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manual: Vec<ManualEntry>,
}

/// График вместе с политикой, по которой он построен
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSchedule {
    pub id: ContractId,
    pub total: Money,
    pub start_date: Option<NaiveDate>,
    pub policy: PolicyDraft,
    pub installments: Vec<Installment>,
}

impl ContractSchedule {
    pub fn reconcile(&self) -> Reconciliation {
        reconcile(&self.installments, self.total)
    }

    /// # Errors
    /// Сохранённая политика не проходит проверку
    pub fn policy(&self) -> Result<DistributionPolicy, policy::Error> {
        DistributionPolicy::try_from(self.policy.clone())
    }
}

impl Display for ContractSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "График платежей по договору {}:", self.id)?;
        writeln!(f, "├── 💰 Сумма: {}", self.total)?;
        if let Some(start) = self.start_date {
            writeln!(f, "├── 📅 Начало: {start}")?;
        }
        if let Ok(policy) = self.policy() {
            writeln!(f, "├── 📐 Политика: {policy}")?;
        }
        writeln!(f, "│")?;
        let len = self.installments.len();
        for (i, installment) in self.installments.iter().enumerate() {
            let prefix = if i + 1 == len { "└──" } else { "├──" };
            writeln!(f, "{prefix} {:>2}. {installment}", i + 1)?;
        }
        Ok(())
    }
}

pub trait ScheduleRepo {
    fn location(&self) -> &str;
    fn contract_terms(&self, id: &ContractId) -> Option<ContractTerms>;
    fn save_schedule(&self, schedule: &ContractSchedule) -> Result<(), Error>;
    fn schedule_ids<'r>(
        &'r self,
        from: Option<Cursor>,
        limit: usize,
    ) -> Box<dyn Iterator<Item = ContractId> + 'r>;
    fn schedule_by_id(&self, id: &ContractId) -> Option<ContractSchedule>;
}

/// Распределение для нетипизированных вызывающих
///
/// # Errors
/// `NonFinite` - сумма или вес не являются конечными числами,
/// остальные ошибки - как у `core::allocate::allocate`
pub fn allocate(total: f64, weights: &[f64]) -> Result<Vec<Money>, AllocationError> {
    let total = Money::try_from_f64(total).map_err(|_| AllocationError::NonFinite)?;
    let weights = weights
        .iter()
        .map(|w| Decimal::from_f64(*w).ok_or(AllocationError::NonFinite))
        .collect::<Result<Vec<_>, _>>()?;
    core_allocate::allocate(total, &weights)
}

/// Без даты начала договора график не строится
pub fn distribute_evenly(
    total: Money,
    start: Option<NaiveDate>,
    count: u32,
) -> Option<Vec<Installment>> {
    start.map(|s| interval::distribute_evenly(total, s, count))
}

/// Без даты начала договора график не строится
pub fn distribute_with_interval(
    total: Money,
    start: Option<NaiveDate>,
    policy: &IntervalPolicy,
) -> Option<Vec<Installment>> {
    start.map(|s| interval::distribute_with_interval(total, s, policy))
}

/// Строит график по условиям договора
///
/// # Arguments
///
/// * `id`: Идентификатор договора
/// * `terms`: Условия оплаты
///
/// # Errors
/// - `Policy` - политика не проходит проверку
/// - `NoStartDate` - для расчётного графика нужна дата начала
/// - `Manual` - в ручных строках нет даты или сумма отрицательная
///
/// returns: Result<ContractSchedule, Error>
///
pub fn plan_schedule(id: &ContractId, terms: &ContractTerms) -> Result<ContractSchedule, Error> {
    let policy = DistributionPolicy::try_from(terms.policy.clone())?;

    let installments = match &policy {
        DistributionPolicy::ManualUnequal => {
            let entries = match terms.start_date {
                Some(start) => auto_fill_dates(&terms.manual, start, DEFAULT_INTERVAL_MONTHS),
                None => terms.manual.clone(),
            };
            build_manual(&entries)?
        }
        _ => {
            let start = terms.start_date.ok_or(Error::NoStartDate)?;
            interval::distribute(terms.total, start, &policy).unwrap_or_default()
        }
    };
    debug!(%id, count = installments.len(), "график построен");

    Ok(ContractSchedule {
        id: id.clone(),
        total: terms.total,
        start_date: terms.start_date,
        policy: PolicyDraft::from(&policy),
        installments,
    })
}

/// Удаляет платёж, сумма договора сохраняется
///
/// # Errors
/// `Redistribute` - нет платежа с таким индексом
pub fn remove_installment(
    schedule: &ContractSchedule,
    index: usize,
) -> Result<ContractSchedule, Error> {
    let installments = redistribute_after_removal(&schedule.installments, index, schedule.total)?;
    Ok(ContractSchedule {
        installments,
        ..schedule.clone()
    })
}

/// Применяет событие изменения суммы договора
///
/// Если пересчёт пропущен (ручной график, нет даты начала), платежи остаются
/// прежними, и сверка покажет расхождение
///
/// # Errors
/// `Policy` - сохранённая политика не проходит проверку
pub fn apply_total_change(
    schedule: &ContractSchedule,
    event: &TotalChanged,
) -> Result<ContractSchedule, Error> {
    let policy = schedule.policy()?;
    let ctx = ScheduleContext {
        installments: &schedule.installments,
        start_date: schedule.start_date,
        policy: &policy,
    };
    let installments = match on_total_changed(event, &ctx) {
        Redistribution::Redistributed(installments) => installments,
        Redistribution::Skipped(reason) => {
            info!(?reason, "платежи не пересчитаны");
            schedule.installments.clone()
        }
    };
    Ok(ContractSchedule {
        total: event.current,
        installments,
        ..schedule.clone()
    })
}

/// Новая сумма договора, введённая пользователем
///
/// Сумма сохраняется всегда. Платежи пересчитываются, только если сумма
/// изменилась больше чем на единицу
///
/// # Errors
/// `Policy` - сохранённая политика не проходит проверку
pub fn change_total(schedule: &ContractSchedule, total: Money) -> Result<ContractSchedule, Error> {
    let mut tracker = TotalTracker::new(schedule.total);
    match tracker.observe(total) {
        Some(event) => apply_total_change(schedule, &event),
        None => {
            info!(id = %schedule.id, %total, "сумма почти не изменилась, платежи прежние");
            Ok(ContractSchedule {
                total,
                ..schedule.clone()
            })
        }
    }
}

/// Пересчёт при изменении числа платежей
///
/// # Errors
/// - `Policy` - сохранённая политика не проходит проверку или платежей слишком много
/// - `NotInterval` - число платежей задаётся только у интервального графика
/// - `NoStartDate` - нет даты начала
pub fn change_count(schedule: &ContractSchedule, count: u32) -> Result<ContractSchedule, Error> {
    let count = policy::checked_count(count)?;
    let DistributionPolicy::IntervalDriven(policy) = schedule.policy()? else {
        return Err(Error::NotInterval);
    };
    let start = schedule.start_date.ok_or(Error::NoStartDate)?;
    let installments =
        crate::core::redistribute::redistribute_count(schedule.total, start, &policy, count);
    let policy = DistributionPolicy::IntervalDriven(IntervalPolicy {
        length: ScheduleLength::Count(count),
        ..policy
    });
    Ok(ContractSchedule {
        policy: PolicyDraft::from(&policy),
        installments,
        ..schedule.clone()
    })
}

/// Пропорционально подгоняет платежи под сумму договора
pub fn renormalize_schedule(schedule: &ContractSchedule) -> ContractSchedule {
    ContractSchedule {
        installments: renormalize(&schedule.installments, schedule.total),
        ..schedule.clone()
    }
}

/// Сохраняет график, только если он сходится с суммой договора
///
/// # Errors
/// - `Unbalanced` - сумма платежей расходится с суммой договора
/// - `CantSaveSchedule` - ошибка хранилища
pub fn save_schedule<R: ScheduleRepo>(
    repo: &R,
    schedule: &ContractSchedule,
) -> Result<Reconciliation, Error> {
    let reconciliation = schedule.reconcile();
    if !reconciliation.is_balanced() {
        warn!(id = %schedule.id, difference = %reconciliation.difference, "график не сходится");
        return Err(Error::Unbalanced {
            difference: reconciliation.difference,
        });
    }
    repo.save_schedule(schedule)
        .map_err(|_| Error::CantSaveSchedule)?;
    info!(id = %schedule.id, location = repo.location(), "график сохранён");
    Ok(reconciliation)
}

/// # Errors
/// `UnknownContract` - в хранилище нет условий договора
pub fn contract_terms<R: ScheduleRepo>(repo: &R, id: &ContractId) -> Result<ContractTerms, Error> {
    repo.contract_terms(id)
        .ok_or_else(|| Error::UnknownContract(id.clone()))
}

/// # Errors
/// `UnknownContract` - в хранилище нет графика договора
pub fn schedule_by_id<R: ScheduleRepo>(
    repo: &R,
    id: &ContractId,
) -> Result<ContractSchedule, Error> {
    repo.schedule_by_id(id)
        .ok_or_else(|| Error::UnknownContract(id.clone()))
}

pub type Cursor = String;
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
}

impl<T> Deref for Page<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<Cursor>) -> Self {
        Self { items, next_cursor }
    }
}

pub fn schedule_list<R: ScheduleRepo>(
    repo: &R,
    from: Option<Cursor>,
    limit: usize,
) -> Page<ContractSchedule> {
    let ids = schedule_ids(repo, from, limit);
    let items: Vec<ContractSchedule> = ids
        .iter()
        .filter_map(|id| repo.schedule_by_id(id))
        .collect();
    Page::new(items, ids.next_cursor)
}

pub fn schedule_ids<R: ScheduleRepo>(
    repo: &R,
    from: Option<Cursor>,
    limit: usize,
) -> Page<ContractId> {
    let mut iter = repo.schedule_ids(from, limit + 1);
    let items: Vec<ContractId> = iter.by_ref().take(limit).collect();
    // Курсор - последний отданный id, следующая страница начинается после него
    let next_cursor = iter.next().and_then(|_| items.last().cloned());
    let page = Page::new(items, next_cursor);
    debug!(?page);
    page
}
