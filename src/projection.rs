//! Derived analytics over the current collection views.
//!
//! Everything here is pure and synchronous: callers pass `today` explicitly,
//! no clock or I/O is touched, and results are recomputed wholesale on every
//! input change. Empty inputs mean zero totals, never errors, and every
//! divisor is floored so a fresh period or an empty history cannot blow up
//! the arithmetic.

use std::cmp::Ordering;

use chrono::{Datelike, Duration, NaiveDate};

use crate::model::{
    Budget, Cadence, Category, Debt, Expense, Income, PaymentType, Person, RecurringExpense,
    SavingsGoal,
};

fn parse_day(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = (date.year(), date.month());
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

/// The current budget evaluation window, computed from today and never
/// stored. Weekly runs Sunday through Saturday; biweekly splits the month at
/// the 15th; monthly covers the calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl PeriodWindow {
    pub fn contains(&self, day: &str) -> bool {
        parse_day(day).is_some_and(|date| date >= self.from && date <= self.to)
    }

    pub fn period_days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    /// Days elapsed since the window opened, floored at one so a period
    /// that just started cannot zero the divisor.
    pub fn elapsed_days(&self, today: NaiveDate) -> f64 {
        (today - self.from).num_days().max(1) as f64
    }

    pub fn elapsed_fraction(&self, today: NaiveDate) -> f64 {
        self.elapsed_days(today) / self.period_days() as f64
    }
}

pub fn period_window(period: Cadence, today: NaiveDate) -> PeriodWindow {
    match period {
        Cadence::Weekly => {
            let since_sunday = today.weekday().num_days_from_sunday() as i64;
            let from = today - Duration::days(since_sunday);
            PeriodWindow {
                from,
                to: from + Duration::days(6),
            }
        }
        Cadence::Biweekly => {
            if today.day() <= 15 {
                PeriodWindow {
                    from: today.with_day(1).unwrap_or(today),
                    to: today.with_day(15).unwrap_or(today),
                }
            } else {
                PeriodWindow {
                    from: today.with_day(16).unwrap_or(today),
                    to: last_day_of_month(today),
                }
            }
        }
        Cadence::Monthly => PeriodWindow {
            from: today.with_day(1).unwrap_or(today),
            to: last_day_of_month(today),
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetProjection {
    pub budget: Budget,
    pub spent_to_date: f64,
    pub spent_percent: f64,
    pub projected_total: f64,
    pub projected_percent: f64,
    /// Linear extrapolation of the spend so far lands above the limit.
    pub will_exceed: bool,
    /// The pace alone predicts an overrun before the plain percentage has
    /// crossed the limit.
    pub trend_alert: bool,
}

pub fn project_budget(budget: &Budget, expenses: &[Expense], today: NaiveDate) -> BudgetProjection {
    let window = period_window(budget.period, today);
    let spent_to_date: f64 = expenses
        .iter()
        .filter(|e| {
            window.contains(&e.date)
                && budget.category.matches(e.category)
                && budget.person.matches(e.paid_by)
        })
        .map(|e| e.amount)
        .sum();

    let elapsed_fraction = window.elapsed_fraction(today);
    let projected_total = spent_to_date / elapsed_fraction;
    let will_exceed = projected_total > budget.limit_amount;
    let spent_percent = if budget.limit_amount > 0.0 {
        spent_to_date / budget.limit_amount * 100.0
    } else {
        0.0
    };
    let projected_percent = if budget.limit_amount > 0.0 {
        projected_total / budget.limit_amount * 100.0
    } else {
        0.0
    };
    let trend_alert = spent_percent / elapsed_fraction > 100.0 && spent_percent < 100.0;

    BudgetProjection {
        budget: budget.clone(),
        spent_to_date,
        spent_percent,
        projected_total,
        projected_percent,
        will_exceed,
        trend_alert,
    }
}

pub fn project_budgets(
    budgets: &[Budget],
    expenses: &[Expense],
    today: NaiveDate,
) -> Vec<BudgetProjection> {
    budgets
        .iter()
        .map(|b| project_budget(b, expenses, today))
        .collect()
}

/// Active recurring charges converted to a monthly obligation: monthly
/// amounts count once, biweekly twice, weekly 4.33 times.
pub fn monthly_recurring_total(recurring: &[RecurringExpense]) -> f64 {
    recurring
        .iter()
        .filter(|r| r.active)
        .map(|r| match r.frequency {
            Cadence::Monthly => r.amount,
            Cadence::Biweekly => r.amount * 2.0,
            Cadence::Weekly => r.amount * 4.33,
        })
        .sum()
}

fn in_trailing_month(day: &str, today: NaiveDate) -> bool {
    let from = today - Duration::days(29);
    parse_day(day).is_some_and(|date| date >= from && date <= today)
}

/// Net monthly savings rate: trailing-30-day income minus trailing-30-day
/// spend minus the monthly recurring obligation.
pub fn monthly_savings_rate(
    incomes: &[Income],
    expenses: &[Expense],
    recurring: &[RecurringExpense],
    today: NaiveDate,
) -> f64 {
    let income: f64 = incomes
        .iter()
        .filter(|i| in_trailing_month(&i.date, today))
        .map(|i| i.amount)
        .sum();
    let spent: f64 = expenses
        .iter()
        .filter(|e| in_trailing_month(&e.date, today))
        .map(|e| e.amount)
        .sum();
    income - spent - monthly_recurring_total(recurring)
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalProjection {
    pub goal: SavingsGoal,
    pub remaining: f64,
    pub monthly_savings_rate: f64,
    pub months_to_complete: Option<f64>,
    pub achievable: bool,
    pub completion_date: Option<NaiveDate>,
}

pub fn project_goal(
    goal: &SavingsGoal,
    incomes: &[Income],
    expenses: &[Expense],
    recurring: &[RecurringExpense],
    today: NaiveDate,
) -> GoalProjection {
    let rate = monthly_savings_rate(incomes, expenses, recurring, today);
    let remaining = (goal.target_amount - goal.current_amount).max(0.0);

    if rate > 0.0 {
        let months = remaining / rate;
        let completion_date = Duration::try_days((months * 30.0).ceil() as i64)
            .and_then(|d| today.checked_add_signed(d));
        GoalProjection {
            goal: goal.clone(),
            remaining,
            monthly_savings_rate: rate,
            months_to_complete: Some(months),
            achievable: true,
            completion_date,
        }
    } else {
        GoalProjection {
            goal: goal.clone(),
            remaining,
            monthly_savings_rate: rate,
            months_to_complete: None,
            achievable: false,
            completion_date: None,
        }
    }
}

pub fn project_goals(
    goals: &[SavingsGoal],
    incomes: &[Income],
    expenses: &[Expense],
    recurring: &[RecurringExpense],
    today: NaiveDate,
) -> Vec<GoalProjection> {
    goals
        .iter()
        .map(|g| project_goal(g, incomes, expenses, recurring, today))
        .collect()
}

/// Ordinal spend-to-income bands driving the household temperature gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RatioStatus {
    Ok,
    Warm,
    Hot,
    Danger,
}

impl RatioStatus {
    pub fn classify(ratio: f64) -> RatioStatus {
        if ratio <= 0.5 {
            RatioStatus::Ok
        } else if ratio <= 0.8 {
            RatioStatus::Warm
        } else if ratio <= 1.0 {
            RatioStatus::Hot
        } else {
            RatioStatus::Danger
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RatioStatus::Ok => "ok",
            RatioStatus::Warm => "warm",
            RatioStatus::Hot => "hot",
            RatioStatus::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatioReading {
    pub total_income: f64,
    pub total_expense: f64,
    pub ratio: f64,
    pub status: RatioStatus,
}

fn ratio_reading(total_income: f64, total_expense: f64) -> RatioReading {
    let ratio = if total_income > 0.0 {
        total_expense / total_income
    } else {
        0.0
    };
    RatioReading {
        total_income,
        total_expense,
        ratio,
        status: RatioStatus::classify(ratio),
    }
}

pub fn spend_ratio(expenses: &[Expense], incomes: &[Income]) -> RatioReading {
    ratio_reading(
        incomes.iter().map(|i| i.amount).sum(),
        expenses.iter().map(|e| e.amount).sum(),
    )
}

/// Same classification restricted to one household member, for the
/// side-by-side comparison.
pub fn spend_ratio_for(person: Person, expenses: &[Expense], incomes: &[Income]) -> RatioReading {
    ratio_reading(
        incomes
            .iter()
            .filter(|i| i.person == person)
            .map(|i| i.amount)
            .sum(),
        expenses
            .iter()
            .filter(|e| e.paid_by == person)
            .map(|e| e.amount)
            .sum(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersonSummary {
    pub person: Person,
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

pub fn person_summary(person: Person, incomes: &[Income], expenses: &[Expense]) -> PersonSummary {
    let income: f64 = incomes
        .iter()
        .filter(|i| i.person == person)
        .map(|i| i.amount)
        .sum();
    let expense: f64 = expenses
        .iter()
        .filter(|e| e.paid_by == person)
        .map(|e| e.amount)
        .sum();
    PersonSummary {
        person,
        income,
        expense,
        balance: income - expense,
    }
}

/// Dashboard expense filter; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub person: Option<Person>,
    pub payment_method: Option<String>,
    pub category: Option<Category>,
    pub payment_type: Option<PaymentType>,
}

impl ExpenseFilter {
    pub fn matches(&self, expense: &Expense) -> bool {
        if self.from.is_some() || self.to.is_some() {
            let Some(date) = parse_day(&expense.date) else {
                return false;
            };
            if self.from.is_some_and(|from| date < from) {
                return false;
            }
            if self.to.is_some_and(|to| date > to) {
                return false;
            }
        }
        if self.person.is_some_and(|p| expense.paid_by != p) {
            return false;
        }
        if let Some(method) = &self.payment_method {
            if &expense.payment_method != method {
                return false;
            }
        }
        if self.category.is_some_and(|c| expense.category != c) {
            return false;
        }
        if self
            .payment_type
            .is_some_and(|pt| expense.payment_type != Some(pt))
        {
            return false;
        }
        true
    }
}

pub fn filter_expenses<'a>(expenses: &'a [Expense], filter: &ExpenseFilter) -> Vec<&'a Expense> {
    expenses.iter().filter(|e| filter.matches(e)).collect()
}

pub fn total_spent<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> f64 {
    expenses.into_iter().map(|e| e.amount).sum()
}

/// Per-category totals, largest first.
pub fn category_totals(expenses: &[Expense]) -> Vec<(Category, f64)> {
    let mut totals: Vec<(Category, f64)> = Vec::new();
    for expense in expenses {
        match totals.iter_mut().find(|(c, _)| *c == expense.category) {
            Some(entry) => entry.1 += expense.amount,
            None => totals.push((expense.category, expense.amount)),
        }
    }
    totals.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    totals
}

/// Per-month totals keyed `YYYY-MM`, chronological. Records with dates too
/// short to carry a month prefix are skipped.
pub fn month_totals(expenses: &[Expense]) -> Vec<(String, f64)> {
    let mut totals = std::collections::BTreeMap::new();
    for expense in expenses {
        if let Some(month) = expense.date.get(..7) {
            *totals.entry(month.to_string()).or_insert(0.0) += expense.amount;
        }
    }
    totals.into_iter().collect()
}

/// Remaining balance with the defensive clamp: `amountPaid` exceeding the
/// total is a data-entry artefact, not a credit.
pub fn debt_remaining(debt: &Debt) -> f64 {
    (debt.total_amount - debt.amount_paid).max(0.0)
}

pub fn total_debt_remaining(debts: &[Debt]) -> f64 {
    debts.iter().map(debt_remaining).sum()
}
