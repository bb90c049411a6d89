//! Normalizes raw remote documents to the current app schema.
//!
//! Documents may have been written by older app versions: fields can be
//! missing, carry legacy names, or hold store-native timestamp objects
//! instead of strings. Every function here is total and idempotent, and
//! never drops data: a mis-typed amount becomes 0 instead of disappearing,
//! so corrupted-looking records stay visible for manual correction.

use serde_json::{Map, Value};

use crate::model::{
    Budget, Cadence, Category, CategoryFilter, CollectionKind, Debt, Expense, Income,
    PaymentType, Person, PersonFilter, Record, RecurringExpense, SavingsGoal, DEFAULT_GOAL_ICON,
    DEFAULT_PAYMENT_METHOD, GOAL_ICONS,
};
use crate::time;

/// First non-null value among the given keys. Key order encodes alias
/// preference: the current field name always precedes its legacy names.
fn first_present<'a>(raw: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| raw.get(*key).filter(|v| !v.is_null()))
}

fn num_field(raw: &Map<String, Value>, keys: &[&str]) -> f64 {
    match first_present(raw, keys) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Lenient text: numbers and booleans are stringified rather than dropped.
fn text_field(raw: &Map<String, Value>, keys: &[&str]) -> String {
    match first_present(raw, keys) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Strict text: only a string survives, anything else falls to the default.
fn str_field(raw: &Map<String, Value>, keys: &[&str], default: &str) -> String {
    match first_present(raw, keys) {
        Some(Value::String(s)) => s.clone(),
        _ => default.to_string(),
    }
}

/// Optional strict text; an empty string counts as absent.
fn opt_str_field(raw: &Map<String, Value>, key: &str) -> Option<String> {
    match raw.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Calendar day from a wire value: an ISO day string is kept verbatim, a
/// store-native timestamp (`{"seconds": …}` object or epoch millis) is
/// converted.
fn day_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => n.as_i64().and_then(time::ms_to_day),
        Value::Object(map) => map
            .get("seconds")
            .and_then(Value::as_i64)
            .and_then(time::secs_to_day),
        _ => None,
    }
}

fn day_field(raw: &Map<String, Value>, keys: &[&str]) -> String {
    first_present(raw, keys)
        .and_then(day_value)
        .unwrap_or_else(time::today_string)
}

fn opt_day_field(raw: &Map<String, Value>, key: &str) -> Option<String> {
    raw.get(key).and_then(day_value)
}

fn iso_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => n.as_i64().and_then(time::ms_to_iso),
        Value::Object(map) => map
            .get("seconds")
            .and_then(Value::as_i64)
            .and_then(time::secs_to_iso),
        _ => None,
    }
}

fn created_at_field(raw: &Map<String, Value>) -> String {
    raw.get("createdAt")
        .and_then(iso_value)
        .unwrap_or_else(time::now_iso)
}

/// Mandatory person fields fall back to the first household member; the
/// field is not optional on expenses and incomes, so this is a forced
/// choice.
fn person_field(raw: &Map<String, Value>, key: &str) -> Person {
    raw.get(key)
        .and_then(Value::as_str)
        .and_then(Person::parse)
        .unwrap_or(Person::Primary)
}

fn person_filter_field(raw: &Map<String, Value>, key: &str) -> PersonFilter {
    raw.get(key)
        .and_then(Value::as_str)
        .and_then(PersonFilter::parse)
        .unwrap_or(PersonFilter::All)
}

fn category_field(raw: &Map<String, Value>, key: &str) -> Category {
    raw.get(key)
        .and_then(Value::as_str)
        .and_then(Category::parse)
        .unwrap_or(Category::Other)
}

fn category_filter_field(raw: &Map<String, Value>, key: &str) -> CategoryFilter {
    raw.get(key)
        .and_then(Value::as_str)
        .and_then(CategoryFilter::parse)
        .unwrap_or(CategoryFilter::All)
}

fn cadence_field(raw: &Map<String, Value>, key: &str) -> Cadence {
    raw.get(key)
        .and_then(Value::as_str)
        .and_then(Cadence::parse)
        .unwrap_or(Cadence::Monthly)
}

fn payment_type_field(raw: &Map<String, Value>) -> Option<PaymentType> {
    raw.get("paymentType")
        .and_then(Value::as_str)
        .and_then(PaymentType::parse)
}

fn bool_field(raw: &Map<String, Value>, key: &str, default: bool) -> bool {
    match raw.get(key) {
        Some(Value::Bool(b)) => *b,
        _ => default,
    }
}

fn icon_field(raw: &Map<String, Value>) -> String {
    match raw.get("icon").and_then(Value::as_str) {
        Some(icon) if GOAL_ICONS.contains(&icon) => icon.to_string(),
        _ => DEFAULT_GOAL_ICON.to_string(),
    }
}

// Legacy field names: expenses and incomes once stored `value`, `day` and
// `note`; expenses stored the payment method as `card`; goals stored
// `target` and `current`. The current name wins when both are present.

pub fn normalize_expense(raw: &Map<String, Value>, id: &str) -> Expense {
    Expense {
        id: id.to_string(),
        amount: num_field(raw, &["amount", "value"]),
        description: text_field(raw, &["description", "note"]),
        category: category_field(raw, "category"),
        payment_method: str_field(raw, &["paymentMethod", "card"], DEFAULT_PAYMENT_METHOD),
        brand: str_field(raw, &["brand"], ""),
        paid_by: person_field(raw, "paidBy"),
        date: day_field(raw, &["date", "day"]),
        created_at: created_at_field(raw),
        payment_type: payment_type_field(raw),
        third_party_name: opt_str_field(raw, "thirdPartyName"),
    }
}

pub fn normalize_income(raw: &Map<String, Value>, id: &str) -> Income {
    Income {
        id: id.to_string(),
        amount: num_field(raw, &["amount", "value"]),
        description: text_field(raw, &["description", "note"]),
        person: person_field(raw, "person"),
        date: day_field(raw, &["date", "day"]),
        created_at: created_at_field(raw),
    }
}

pub fn normalize_budget(raw: &Map<String, Value>, id: &str) -> Budget {
    Budget {
        id: id.to_string(),
        name: text_field(raw, &["name"]),
        category: category_filter_field(raw, "category"),
        person: person_filter_field(raw, "person"),
        limit_amount: num_field(raw, &["limitAmount"]),
        period: cadence_field(raw, "period"),
        created_at: created_at_field(raw),
    }
}

pub fn normalize_debt(raw: &Map<String, Value>, id: &str) -> Debt {
    Debt {
        id: id.to_string(),
        name: text_field(raw, &["name"]),
        total_amount: num_field(raw, &["totalAmount"]),
        amount_paid: num_field(raw, &["amountPaid"]),
        person: person_filter_field(raw, "person"),
        due_date: opt_day_field(raw, "dueDate"),
        notes: opt_str_field(raw, "notes"),
        created_at: created_at_field(raw),
    }
}

pub fn normalize_recurring(raw: &Map<String, Value>, id: &str) -> RecurringExpense {
    RecurringExpense {
        id: id.to_string(),
        name: text_field(raw, &["name"]),
        amount: num_field(raw, &["amount"]),
        category: category_field(raw, "category"),
        person: person_filter_field(raw, "person"),
        frequency: cadence_field(raw, "frequency"),
        start_date: day_field(raw, &["startDate"]),
        active: bool_field(raw, "active", true),
        created_at: created_at_field(raw),
    }
}

pub fn normalize_goal(raw: &Map<String, Value>, id: &str) -> SavingsGoal {
    SavingsGoal {
        id: id.to_string(),
        name: text_field(raw, &["name"]),
        target_amount: num_field(raw, &["targetAmount", "target"]),
        current_amount: num_field(raw, &["currentAmount", "current"]),
        icon: icon_field(raw),
        created_at: created_at_field(raw),
    }
}

fn merged_with_id(raw: &Map<String, Value>, id: &str) -> Value {
    let mut map = raw.clone();
    map.insert("id".to_string(), Value::String(id.to_string()));
    Value::Object(map)
}

fn to_wire<T: serde::Serialize>(record: &T, raw: &Map<String, Value>, id: &str) -> Value {
    match serde_json::to_value(record) {
        Ok(value) => value,
        Err(_) => merged_with_id(raw, id),
    }
}

/// Normalize a raw document by collection name. Unknown collections pass
/// the payload through with only the identifier merged in; the identifier
/// always comes from the storage key, never from the payload.
pub fn normalize_document(collection: &str, raw: &Map<String, Value>, id: &str) -> Value {
    match CollectionKind::parse(collection) {
        Some(CollectionKind::Expenses) => to_wire(&normalize_expense(raw, id), raw, id),
        Some(CollectionKind::Goals) => to_wire(&normalize_goal(raw, id), raw, id),
        Some(CollectionKind::Incomes) => to_wire(&normalize_income(raw, id), raw, id),
        Some(CollectionKind::Budgets) => to_wire(&normalize_budget(raw, id), raw, id),
        Some(CollectionKind::Debts) => to_wire(&normalize_debt(raw, id), raw, id),
        Some(CollectionKind::Recurring) => to_wire(&normalize_recurring(raw, id), raw, id),
        None => merged_with_id(raw, id),
    }
}

impl Record for Expense {
    const KIND: CollectionKind = CollectionKind::Expenses;

    fn from_raw(raw: &Map<String, Value>, id: &str) -> Self {
        normalize_expense(raw, id)
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Income {
    const KIND: CollectionKind = CollectionKind::Incomes;

    fn from_raw(raw: &Map<String, Value>, id: &str) -> Self {
        normalize_income(raw, id)
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Budget {
    const KIND: CollectionKind = CollectionKind::Budgets;

    fn from_raw(raw: &Map<String, Value>, id: &str) -> Self {
        normalize_budget(raw, id)
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Debt {
    const KIND: CollectionKind = CollectionKind::Debts;

    fn from_raw(raw: &Map<String, Value>, id: &str) -> Self {
        normalize_debt(raw, id)
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for RecurringExpense {
    const KIND: CollectionKind = CollectionKind::Recurring;

    fn from_raw(raw: &Map<String, Value>, id: &str) -> Self {
        normalize_recurring(raw, id)
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for SavingsGoal {
    const KIND: CollectionKind = CollectionKind::Goals;

    fn from_raw(raw: &Map<String, Value>, id: &str) -> Self {
        normalize_goal(raw, id)
    }

    fn id(&self) -> &str {
        &self.id
    }
}
