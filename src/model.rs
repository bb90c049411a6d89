use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema-version tag written with every new record and every snapshot, so
/// future normalization logic can tell which shape a document was written
/// under.
pub const SCHEMA_VERSION: &str = "1.0";

/// The two fixed household members. There is no third; records created on
/// behalf of an outsider carry `third_party_name` on the expense instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Person {
    Primary,
    Partner,
}

impl Person {
    pub const ALL: [Person; 2] = [Person::Primary, Person::Partner];

    pub fn as_str(&self) -> &'static str {
        match self {
            Person::Primary => "primary",
            Person::Partner => "partner",
        }
    }

    pub fn parse(value: &str) -> Option<Person> {
        match value {
            "primary" => Some(Person::Primary),
            "partner" => Some(Person::Partner),
            _ => None,
        }
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed expense category set. Unrecognized values normalize to `Other`
/// rather than being dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Transport,
    Entertainment,
    Clothing,
    Health,
    Home,
    Education,
    Gifts,
    Subscriptions,
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Food,
        Category::Transport,
        Category::Entertainment,
        Category::Clothing,
        Category::Health,
        Category::Home,
        Category::Education,
        Category::Gifts,
        Category::Subscriptions,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Transport => "transport",
            Category::Entertainment => "entertainment",
            Category::Clothing => "clothing",
            Category::Health => "health",
            Category::Home => "home",
            Category::Education => "education",
            Category::Gifts => "gifts",
            Category::Subscriptions => "subscriptions",
            Category::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.as_str() == value)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recurrence cadence shared by budget periods and recurring-expense
/// frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Weekly,
    Biweekly,
    Monthly,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Weekly => "weekly",
            Cadence::Biweekly => "biweekly",
            Cadence::Monthly => "monthly",
        }
    }

    pub fn parse(value: &str) -> Option<Cadence> {
        match value {
            "weekly" => Some(Cadence::Weekly),
            "biweekly" => Some(Cadence::Biweekly),
            "monthly" => Some(Cadence::Monthly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Credit,
    Debit,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Credit => "credit",
            PaymentType::Debit => "debit",
        }
    }

    pub fn parse(value: &str) -> Option<PaymentType> {
        match value {
            "credit" => Some(PaymentType::Credit),
            "debit" => Some(PaymentType::Debit),
            _ => None,
        }
    }
}

/// Person scope on budgets, debts and recurring charges: either the whole
/// household or one member. Wire value is `all` or the person tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersonFilter {
    All,
    Only(Person),
}

impl PersonFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonFilter::All => "all",
            PersonFilter::Only(p) => p.as_str(),
        }
    }

    pub fn parse(value: &str) -> Option<PersonFilter> {
        if value == "all" {
            Some(PersonFilter::All)
        } else {
            Person::parse(value).map(PersonFilter::Only)
        }
    }

    pub fn matches(&self, person: Person) -> bool {
        match self {
            PersonFilter::All => true,
            PersonFilter::Only(p) => *p == person,
        }
    }
}

impl Serialize for PersonFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PersonFilter {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PersonFilter::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown person filter: {raw}")))
    }
}

/// Category scope on budgets: every category or one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryFilter {
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryFilter::All => "all",
            CategoryFilter::Only(c) => c.as_str(),
        }
    }

    pub fn parse(value: &str) -> Option<CategoryFilter> {
        if value == "all" {
            Some(CategoryFilter::All)
        } else {
            Category::parse(value).map(CategoryFilter::Only)
        }
    }

    pub fn matches(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => *c == category,
        }
    }
}

impl Serialize for CategoryFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CategoryFilter {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CategoryFilter::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown category filter: {raw}")))
    }
}

/// Suggested savings-goal icon tags; the field stays an open string but
/// normalization falls back to `target` for anything unknown.
pub const GOAL_ICONS: [&str; 10] = [
    "car",
    "home",
    "plane",
    "laptop",
    "phone",
    "graduation",
    "gem",
    "guitar",
    "beach",
    "target",
];

pub const DEFAULT_GOAL_ICON: &str = "target";

/// Suggested payment-method tags. The field is an open string; these are
/// only what the UI offers, and `cash` is the normalization default.
pub const PAYMENT_METHODS: [&str; 4] = ["cash", "card", "transfer", "other"];

pub const DEFAULT_PAYMENT_METHOD: &str = "cash";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub amount: f64,
    pub description: String,
    pub category: Category,
    pub payment_method: String,
    #[serde(default)]
    pub brand: String,
    pub paid_by: Person,
    pub date: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<PaymentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub third_party_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Income {
    pub id: String,
    pub amount: f64,
    pub description: String,
    pub person: Person,
    pub date: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: String,
    pub name: String,
    pub category: CategoryFilter,
    pub person: PersonFilter,
    pub limit_amount: f64,
    pub period: Cadence,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    pub id: String,
    pub name: String,
    pub total_amount: f64,
    pub amount_paid: f64,
    pub person: PersonFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringExpense {
    pub id: String,
    pub name: String,
    pub amount: f64,
    pub category: Category,
    pub person: PersonFilter,
    pub frequency: Cadence,
    pub start_date: String,
    pub active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsGoal {
    pub id: String,
    pub name: String,
    pub target_amount: f64,
    pub current_amount: f64,
    pub icon: String,
    pub created_at: String,
}

/// The six remote collections. Collection names are wire identifiers and
/// must never change without a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Expenses,
    Goals,
    Incomes,
    Budgets,
    Debts,
    Recurring,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 6] = [
        CollectionKind::Expenses,
        CollectionKind::Goals,
        CollectionKind::Incomes,
        CollectionKind::Budgets,
        CollectionKind::Debts,
        CollectionKind::Recurring,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CollectionKind::Expenses => "expenses",
            CollectionKind::Goals => "goals",
            CollectionKind::Incomes => "incomes",
            CollectionKind::Budgets => "budgets",
            CollectionKind::Debts => "debts",
            CollectionKind::Recurring => "recurring",
        }
    }

    pub fn parse(name: &str) -> Option<CollectionKind> {
        CollectionKind::ALL.iter().copied().find(|k| k.name() == name)
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed record that can be rebuilt from an arbitrary raw wire document.
/// `from_raw` is total: whatever the payload looks like, it yields a record
/// in the current schema (see the `normalize` module).
pub trait Record: Clone + Send + Sync + Serialize + 'static {
    const KIND: CollectionKind;

    fn from_raw(raw: &Map<String, Value>, id: &str) -> Self;

    fn id(&self) -> &str;
}
