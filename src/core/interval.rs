use crate::core::allocate::allocate_evenly;
use crate::core::finance::Money;
use crate::core::installment::{Installment, PaymentType};
use crate::core::policy::{DistributionPolicy, IntervalPolicy, ScheduleLength};

use chrono::{Datelike, Months, NaiveDate};
use tracing::debug;

/// Сдвиг на целое число месяцев. 31 января + 1 месяц = последний день февраля.
/// За пределами календаря chrono дата насыщается
pub fn shift(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// Сколько дат `start + offset + k * interval` месяцев помещается до `end`
/// включительно, минимум одна
fn steps_until(start: NaiveDate, offset: u32, interval: u32, end: NaiveDate) -> u32 {
    let first = shift(start, offset);
    if end <= first {
        return 1;
    }
    let months = (end.year() - first.year()) * 12 + end.month() as i32 - first.month() as i32;
    let mut k = u32::try_from(months).unwrap_or(0) / interval;
    if k > 0 && shift(start, offset.saturating_add(k.saturating_mul(interval))) > end {
        k -= 1;
    }
    k + 1
}

fn tail_payment_type(interval: u32) -> PaymentType {
    if interval == 1 {
        PaymentType::new(PaymentType::MONTHLY)
    } else {
        PaymentType::default()
    }
}

/// Весь договор одним платежом в дату начала
pub fn distribute_single(total: Money, start: NaiveDate) -> Vec<Installment> {
    vec![Installment::new(total, start, PaymentType::on_signing())]
}

/// Функция строит график платежей с заданным шагом
///
/// # Arguments
///
/// * `total`: Сумма договора
/// * `start`: Дата начала договора
/// * `policy`: Шаг, длина графика и особый первый платёж
///
/// Первый платёж, если он задан отдельно, идёт в дату начала (или через
/// интервал), остальное делится поровну, последний платёж забирает
/// погрешность округления. Нулевая длина хвоста сводит график к одному
/// платежу на всю сумму.
///
/// returns: Vec<Installment>
///
pub fn distribute_with_interval(
    total: Money,
    start: NaiveDate,
    policy: &IntervalPolicy,
) -> Vec<Installment> {
    let interval = policy.interval_months.get();

    // Все даты считаются от даты начала, чтобы 31-е не съезжало после февраля
    let first_offset = if policy.first_at_signing { 0 } else { interval };
    let first = policy
        .first_payment
        .map(|fp| (fp.resolve(total), shift(start, first_offset)));
    let tail_offset = if first.is_some() {
        first_offset.saturating_add(interval)
    } else {
        0
    };

    let tail_count = match policy.length {
        ScheduleLength::Count(count) => count,
        ScheduleLength::Until(end) => steps_until(start, tail_offset, interval, end),
    };
    if tail_count == 0 {
        debug!(%total, "пустой хвост графика, один платёж");
        return distribute_single(total, start);
    }

    let first_amount = first.map_or(Money::ZERO, |(amount, _)| amount);
    let remaining = total - first_amount;
    let Ok(amounts) = allocate_evenly(remaining, tail_count as usize) else {
        return distribute_single(total, start);
    };

    let mut installments = Vec::with_capacity(amounts.len() + 1);
    if let Some((amount, date)) = first {
        let payment_type = if policy.first_at_signing {
            PaymentType::on_signing()
        } else {
            PaymentType::default()
        };
        installments.push(
            Installment::new(amount, date, payment_type)
                .with_description("Первый платёж")
                .pinned(),
        );
    }

    let payment_type = tail_payment_type(interval);
    for (k, amount) in (0u32..).zip(amounts) {
        let date = shift(start, tail_offset.saturating_add(k.saturating_mul(interval)));
        installments.push(
            Installment::new(amount, date, payment_type.clone())
                .with_description(format!("Платёж {} из {tail_count}", k + 1)),
        );
    }

    debug!(%total, count = installments.len(), "построен график");
    installments
}

/// Равные ежемесячные платежи начиная с даты начала
pub fn distribute_evenly(total: Money, start: NaiveDate, count: u32) -> Vec<Installment> {
    distribute_with_interval(total, start, &IntervalPolicy::monthly(count.max(1)))
}

/// Построение графика по политике договора
///
/// returns: `None` для ручного распределения - суммы задаёт пользователь
pub fn distribute(
    total: Money,
    start: NaiveDate,
    policy: &DistributionPolicy,
) -> Option<Vec<Installment>> {
    match policy {
        DistributionPolicy::Single => Some(distribute_single(total, start)),
        DistributionPolicy::IntervalDriven(p) => Some(distribute_with_interval(total, start, p)),
        DistributionPolicy::ManualUnequal => None,
    }
}
