//! Achievement rules evaluated over the current data.
//!
//! Pure checks only; badge art and copy live in the UI layer. Rules that
//! mention "this month" compare against the calendar month containing
//! `today`, the same way the dashboard aggregations do.

use chrono::{Datelike, NaiveDate};

use crate::model::{Budget, Expense, Income, SavingsGoal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AchievementTier {
    Common,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Achievement {
    FirstExpense,
    TenExpenses,
    FirstIncome,
    FirstBudget,
    FirstGoal,
    FiftyExpenses,
    MonthUnderBudget,
    GoalHalfway,
    BigIncomeMonth,
    LeanSpendMonth,
    GoalCompleted,
    HundredExpenses,
    SpendCutMonth,
    ThreeGoals,
    HighSavingsMonth,
    CoreCollection,
    TwoGoalsCompleted,
}

#[derive(Debug, Clone, Copy)]
pub struct AchievementData<'a> {
    pub expenses: &'a [Expense],
    pub incomes: &'a [Income],
    pub goals: &'a [SavingsGoal],
    pub budgets: &'a [Budget],
}

fn month_start(today: NaiveDate) -> String {
    format!("{:04}-{:02}-01", today.year(), today.month())
}

fn month_prefix(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

fn previous_month(today: NaiveDate) -> NaiveDate {
    let first = today.with_day(1).unwrap_or(today);
    first.pred_opt().unwrap_or(first)
}

fn month_income(data: &AchievementData<'_>, today: NaiveDate) -> f64 {
    let start = month_start(today);
    data.incomes
        .iter()
        .filter(|i| i.date >= start)
        .map(|i| i.amount)
        .sum()
}

fn month_spend(data: &AchievementData<'_>, today: NaiveDate) -> f64 {
    let start = month_start(today);
    data.expenses
        .iter()
        .filter(|e| e.date >= start)
        .map(|e| e.amount)
        .sum()
}

impl Achievement {
    pub const ALL: [Achievement; 17] = [
        Achievement::FirstExpense,
        Achievement::TenExpenses,
        Achievement::FirstIncome,
        Achievement::FirstBudget,
        Achievement::FirstGoal,
        Achievement::FiftyExpenses,
        Achievement::MonthUnderBudget,
        Achievement::GoalHalfway,
        Achievement::BigIncomeMonth,
        Achievement::LeanSpendMonth,
        Achievement::GoalCompleted,
        Achievement::HundredExpenses,
        Achievement::SpendCutMonth,
        Achievement::ThreeGoals,
        Achievement::HighSavingsMonth,
        Achievement::CoreCollection,
        Achievement::TwoGoalsCompleted,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Achievement::FirstExpense => "first_expense",
            Achievement::TenExpenses => "ten_expenses",
            Achievement::FirstIncome => "first_income",
            Achievement::FirstBudget => "first_budget",
            Achievement::FirstGoal => "first_goal",
            Achievement::FiftyExpenses => "fifty_expenses",
            Achievement::MonthUnderBudget => "month_under_budget",
            Achievement::GoalHalfway => "goal_halfway",
            Achievement::BigIncomeMonth => "big_income_month",
            Achievement::LeanSpendMonth => "lean_spend_month",
            Achievement::GoalCompleted => "goal_completed",
            Achievement::HundredExpenses => "hundred_expenses",
            Achievement::SpendCutMonth => "spend_cut_month",
            Achievement::ThreeGoals => "three_goals",
            Achievement::HighSavingsMonth => "high_savings_month",
            Achievement::CoreCollection => "core_collection",
            Achievement::TwoGoalsCompleted => "two_goals_completed",
        }
    }

    pub fn tier(&self) -> AchievementTier {
        match self {
            Achievement::FirstExpense
            | Achievement::TenExpenses
            | Achievement::FirstIncome
            | Achievement::FirstBudget
            | Achievement::FirstGoal => AchievementTier::Common,
            Achievement::FiftyExpenses
            | Achievement::MonthUnderBudget
            | Achievement::GoalHalfway
            | Achievement::BigIncomeMonth
            | Achievement::LeanSpendMonth => AchievementTier::Rare,
            Achievement::GoalCompleted
            | Achievement::HundredExpenses
            | Achievement::SpendCutMonth
            | Achievement::ThreeGoals => AchievementTier::Epic,
            Achievement::HighSavingsMonth
            | Achievement::CoreCollection
            | Achievement::TwoGoalsCompleted => AchievementTier::Legendary,
        }
    }

    pub fn earned(&self, data: &AchievementData<'_>, today: NaiveDate) -> bool {
        match self {
            Achievement::FirstExpense => !data.expenses.is_empty(),
            Achievement::TenExpenses => data.expenses.len() >= 10,
            Achievement::FirstIncome => !data.incomes.is_empty(),
            Achievement::FirstBudget => !data.budgets.is_empty(),
            Achievement::FirstGoal => !data.goals.is_empty(),
            Achievement::FiftyExpenses => data.expenses.len() >= 50,
            Achievement::MonthUnderBudget => {
                let start = month_start(today);
                !data.budgets.is_empty()
                    && data.budgets.iter().all(|b| {
                        let spent: f64 = data
                            .expenses
                            .iter()
                            .filter(|e| {
                                e.date >= start
                                    && b.category.matches(e.category)
                                    && b.person.matches(e.paid_by)
                            })
                            .map(|e| e.amount)
                            .sum();
                        spent <= b.limit_amount
                    })
            }
            Achievement::GoalHalfway => data
                .goals
                .iter()
                .any(|g| g.target_amount > 0.0 && g.current_amount / g.target_amount >= 0.5),
            Achievement::BigIncomeMonth => month_income(data, today) >= 10_000.0,
            Achievement::LeanSpendMonth => {
                let income = month_income(data, today);
                income > 0.0 && month_spend(data, today) / income <= 0.6
            }
            Achievement::GoalCompleted => data
                .goals
                .iter()
                .any(|g| g.current_amount >= g.target_amount),
            Achievement::HundredExpenses => data.expenses.len() >= 100,
            Achievement::SpendCutMonth => {
                let this_prefix = month_prefix(today);
                let last_prefix = month_prefix(previous_month(today));
                let sum_for = |prefix: &str| -> f64 {
                    data.expenses
                        .iter()
                        .filter(|e| e.date.starts_with(prefix))
                        .map(|e| e.amount)
                        .sum()
                };
                let last_total = sum_for(&last_prefix);
                last_total > 0.0 && sum_for(&this_prefix) <= last_total * 0.8
            }
            Achievement::ThreeGoals => data.goals.len() >= 3,
            Achievement::HighSavingsMonth => {
                let income = month_income(data, today);
                income > 0.0 && (income - month_spend(data, today)) / income >= 0.4
            }
            Achievement::CoreCollection => Achievement::ALL
                .iter()
                .filter(|a| {
                    matches!(a.tier(), AchievementTier::Common | AchievementTier::Rare)
                })
                .all(|a| a.earned(data, today)),
            Achievement::TwoGoalsCompleted => {
                data.goals
                    .iter()
                    .filter(|g| g.current_amount >= g.target_amount)
                    .count()
                    >= 2
            }
        }
    }
}

pub fn earned_achievements(data: &AchievementData<'_>, today: NaiveDate) -> Vec<Achievement> {
    Achievement::ALL
        .iter()
        .copied()
        .filter(|a| a.earned(data, today))
        .collect()
}

pub fn earned_count(data: &AchievementData<'_>, today: NaiveDate) -> usize {
    earned_achievements(data, today).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cadence, Category, CategoryFilter, Person, PersonFilter};

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("test date")
    }

    fn expense(amount: f64, date: &str) -> Expense {
        Expense {
            id: "e".into(),
            amount,
            description: String::new(),
            category: Category::Food,
            payment_method: "cash".into(),
            brand: String::new(),
            paid_by: Person::Primary,
            date: date.into(),
            created_at: String::new(),
            payment_type: None,
            third_party_name: None,
        }
    }

    fn income(amount: f64, date: &str) -> Income {
        Income {
            id: "i".into(),
            amount,
            description: String::new(),
            person: Person::Primary,
            date: date.into(),
            created_at: String::new(),
        }
    }

    fn goal(target: f64, current: f64) -> SavingsGoal {
        SavingsGoal {
            id: "g".into(),
            name: String::new(),
            target_amount: target,
            current_amount: current,
            icon: "target".into(),
            created_at: String::new(),
        }
    }

    fn budget(limit: f64) -> Budget {
        Budget {
            id: "b".into(),
            name: String::new(),
            category: CategoryFilter::All,
            person: PersonFilter::All,
            limit_amount: limit,
            period: Cadence::Monthly,
            created_at: String::new(),
        }
    }

    #[test]
    fn empty_data_earns_nothing() {
        let data = AchievementData {
            expenses: &[],
            incomes: &[],
            goals: &[],
            budgets: &[],
        };
        assert!(earned_achievements(&data, day("2026-04-11")).is_empty());
    }

    #[test]
    fn first_records_unlock_the_common_tier() {
        let expenses = [expense(1.0, "2026-04-01")];
        let incomes = [income(1.0, "2026-04-01")];
        let goals = [goal(100.0, 0.0)];
        let budgets = [budget(100.0)];
        let data = AchievementData {
            expenses: &expenses,
            incomes: &incomes,
            goals: &goals,
            budgets: &budgets,
        };
        let earned = earned_achievements(&data, day("2026-04-11"));
        assert!(earned.contains(&Achievement::FirstExpense));
        assert!(earned.contains(&Achievement::FirstIncome));
        assert!(earned.contains(&Achievement::FirstGoal));
        assert!(earned.contains(&Achievement::FirstBudget));
        assert!(!earned.contains(&Achievement::TenExpenses));
    }

    #[test]
    fn month_under_budget_requires_every_budget_to_hold() {
        let today = day("2026-04-11");
        let expenses = [expense(80.0, "2026-04-05")];
        let budgets = [budget(100.0), budget(50.0)];
        let data = AchievementData {
            expenses: &expenses,
            incomes: &[],
            goals: &[],
            budgets: &budgets,
        };
        assert!(!Achievement::MonthUnderBudget.earned(&data, today));

        let budgets = [budget(100.0), budget(80.0)];
        let data = AchievementData {
            budgets: &budgets,
            ..data
        };
        assert!(Achievement::MonthUnderBudget.earned(&data, today));
    }

    #[test]
    fn spend_cut_compares_against_the_previous_month() {
        let today = day("2026-04-11");
        let expenses = [expense(100.0, "2026-03-10"), expense(70.0, "2026-04-05")];
        let data = AchievementData {
            expenses: &expenses,
            incomes: &[],
            goals: &[],
            budgets: &[],
        };
        assert!(Achievement::SpendCutMonth.earned(&data, today));

        let expenses = [expense(100.0, "2026-03-10"), expense(90.0, "2026-04-05")];
        let data = AchievementData {
            expenses: &expenses,
            ..data
        };
        assert!(!Achievement::SpendCutMonth.earned(&data, today));
    }

    #[test]
    fn goal_progress_tiers() {
        let goals = [goal(100.0, 55.0), goal(200.0, 200.0), goal(50.0, 50.0)];
        let data = AchievementData {
            expenses: &[],
            incomes: &[],
            goals: &goals,
            budgets: &[],
        };
        let today = day("2026-04-11");
        assert!(Achievement::GoalHalfway.earned(&data, today));
        assert!(Achievement::GoalCompleted.earned(&data, today));
        assert!(Achievement::TwoGoalsCompleted.earned(&data, today));
        assert!(Achievement::ThreeGoals.earned(&data, today));
    }

    #[test]
    fn savings_thresholds_use_month_income() {
        let today = day("2026-04-11");
        let incomes = [income(10_000.0, "2026-04-01")];
        let expenses = [expense(5_500.0, "2026-04-05")];
        let data = AchievementData {
            expenses: &expenses,
            incomes: &incomes,
            goals: &[],
            budgets: &[],
        };
        assert!(Achievement::BigIncomeMonth.earned(&data, today));
        assert!(Achievement::LeanSpendMonth.earned(&data, today));
        assert!(Achievement::HighSavingsMonth.earned(&data, today));
    }

    #[test]
    fn core_collection_needs_all_common_and_rare_rules() {
        let expenses: Vec<Expense> = (0..50)
            .map(|_| expense(10.0, "2026-04-05"))
            .collect();
        let incomes = [income(12_000.0, "2026-04-01")];
        let goals = [goal(100.0, 60.0)];
        let budgets = [budget(100_000.0)];
        let data = AchievementData {
            expenses: &expenses,
            incomes: &incomes,
            goals: &goals,
            budgets: &budgets,
        };
        assert!(Achievement::CoreCollection.earned(&data, day("2026-04-11")));
    }
}
