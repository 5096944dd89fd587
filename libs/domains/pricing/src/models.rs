use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

use crate::condition::{self, ModifierCondition};

/// Lowest level a range may start at
pub const MIN_LEVEL: u32 = 1;
/// Highest level a range may end at
pub const MAX_LEVEL: u32 = 99;

/// Caller-supplied custom fields consulted by modifier conditions
pub type CallerContext = BTreeMap<String, serde_json::Value>;

fn default_true() -> bool {
    true
}

/// Quantity basis a method's rate is multiplied against
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingUnit {
    #[default]
    Fixed,
    PerLevel,
    PerKill,
    PerItem,
    PerHour,
    /// Any unit this build does not know; priced as a flat rate
    #[serde(other)]
    Unknown,
}

/// How a modifier (or payment surcharge) changes a price
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ModifierKind {
    #[default]
    Percentage,
    Fixed,
    /// Unrecognised kind; leaves the price unchanged
    #[serde(other)]
    Unknown,
}

/// Half-open level window `[start, end)` a method is valid for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValidityWindow {
    /// Valid for the whole domain, `[MIN_LEVEL, MAX_LEVEL)`
    #[default]
    Full,
    Bounded { start: u32, end: u32 },
}

impl ValidityWindow {
    /// Build a window from nullable catalog bounds.
    ///
    /// A missing start means `MIN_LEVEL`, a missing end means `MAX_LEVEL`.
    pub fn from_bounds(start: Option<u32>, end: Option<u32>) -> Self {
        match (start, end) {
            (None, None) => Self::Full,
            (start, end) => Self::Bounded {
                start: start.unwrap_or(MIN_LEVEL),
                end: end.unwrap_or(MAX_LEVEL),
            },
        }
    }

    pub fn start(&self) -> u32 {
        match self {
            Self::Full => MIN_LEVEL,
            Self::Bounded { start, .. } => *start,
        }
    }

    pub fn end(&self) -> u32 {
        match self {
            Self::Full => MAX_LEVEL,
            Self::Bounded { end, .. } => *end,
        }
    }

    /// Whether `level` falls inside the window
    pub fn contains(&self, level: u32) -> bool {
        self.start() <= level && level < self.end()
    }

    /// Whether the window spans all of `[start, end)`
    pub fn covers(&self, start: u32, end: u32) -> bool {
        self.start() < self.end() && self.start() <= start && self.end() >= end
    }

    /// Non-empty intersection with `[start, end)`
    pub fn intersect(&self, start: u32, end: u32) -> Option<(u32, u32)> {
        let lo = self.start().max(start);
        let hi = self.end().min(end);
        (lo < hi).then_some((lo, hi))
    }

    fn bounds(&self) -> (Option<u32>, Option<u32>) {
        match self {
            Self::Full => (None, None),
            Self::Bounded { start, end } => (Some(*start), Some(*end)),
        }
    }
}

/// Conditional price adjustment, shared by service and method levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub id: Uuid,
    pub name: String,
    pub kind: ModifierKind,
    /// Signed: negative is a discount, positive an upcharge
    pub value: Decimal,
    /// Ascending application order within a level
    #[serde(default)]
    pub priority: i32,
    #[serde(
        default,
        deserialize_with = "condition::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub condition: Option<ModifierCondition>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// One way to deliver the service, with its own rate and validity window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MethodRecord", into = "MethodRecord")]
pub struct PricingMethod {
    pub id: Uuid,
    pub name: String,
    /// Logical family, e.g. "GOTR"
    pub group_name: Option<String>,
    /// Rate per unit of `pricing_unit`
    pub base_price: Decimal,
    pub pricing_unit: PricingUnit,
    pub window: ValidityWindow,
    pub modifiers: Vec<Modifier>,
    pub active: bool,
}

/// Catalog wire shape of a method: nullable range bounds instead of a window
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MethodRecord {
    id: Uuid,
    name: String,
    #[serde(default)]
    group_name: Option<String>,
    base_price: Decimal,
    #[serde(default)]
    pricing_unit: PricingUnit,
    #[serde(default)]
    range_start: Option<u32>,
    #[serde(default)]
    range_end: Option<u32>,
    #[serde(default)]
    modifiers: Vec<Modifier>,
    #[serde(default = "default_true")]
    active: bool,
}

impl From<MethodRecord> for PricingMethod {
    fn from(record: MethodRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            group_name: record.group_name,
            base_price: record.base_price,
            pricing_unit: record.pricing_unit,
            window: ValidityWindow::from_bounds(record.range_start, record.range_end),
            modifiers: record.modifiers,
            active: record.active,
        }
    }
}

impl From<PricingMethod> for MethodRecord {
    fn from(method: PricingMethod) -> Self {
        let (range_start, range_end) = method.window.bounds();
        Self {
            id: method.id,
            name: method.name,
            group_name: method.group_name,
            base_price: method.base_price,
            pricing_unit: method.pricing_unit,
            range_start,
            range_end,
            modifiers: method.modifiers,
            active: method.active,
        }
    }
}

/// A priced service: its own modifiers plus the methods that deliver it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    #[serde(default)]
    pub methods: Vec<PricingMethod>,
}

/// Payment method carrying a surcharge applied after all modifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub surcharge_kind: ModifierKind,
    #[serde(default)]
    pub surcharge_value: Decimal,
}

/// Which family a candidate was generated by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OptionKind {
    /// Cheapest switch-at-boundaries combination over every method
    Optimal,
    /// One method covering the whole range
    Single,
    /// Cheapest combination restricted to one named group
    Group,
    /// One method priced over its overlap with the range only
    Segment,
}

impl OptionKind {
    /// Whether candidates of this kind price the entire requested range
    pub fn covers_full_range(&self) -> bool {
        !matches!(self, Self::Segment)
    }
}

/// Where a modifier came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModifierLevel {
    Service,
    Method,
}

/// Outcome of evaluating one modifier against a candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedModifier {
    pub id: Uuid,
    pub name: String,
    pub kind: ModifierKind,
    pub value: Decimal,
    pub level: ModifierLevel,
    pub applied: bool,
    /// Price after minus price before; zero when not applied
    pub amount: Decimal,
}

/// One contiguous sub-range of a candidate, attributed to a single method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelRange {
    pub start: u32,
    pub end: u32,
    pub progress: Decimal,
    pub method_id: Uuid,
    pub method_name: String,
    pub rate: Decimal,
    pub cost: Decimal,
}

/// One fully-priced way to satisfy a requested range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodOption {
    /// Method UUID for single methods, a composite id for other kinds
    pub method_id: String,
    pub method_name: String,
    pub kind: OptionKind,
    pub level_ranges: Vec<LevelRange>,
    pub modifiers: Vec<AppliedModifier>,
    pub subtotal: Decimal,
    pub modifiers_total: Decimal,
    pub final_price: Decimal,
    pub is_cheapest: bool,
}

impl MethodOption {
    /// Starting boundary of the first covered sub-range
    pub fn first_start(&self) -> u32 {
        self.level_ranges.first().map_or(u32::MAX, |r| r.start)
    }
}

/// Requested range summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub start: u32,
    pub end: u32,
    pub total_progress: Decimal,
}

/// Result of a level-range calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelRangeQuote {
    pub levels: LevelSummary,
    pub method_options: Vec<MethodOption>,
}

impl LevelRangeQuote {
    /// The single candidate flagged cheapest
    pub fn cheapest(&self) -> Option<&MethodOption> {
        self.method_options.iter().find(|o| o.is_cheapest)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub service_modifiers_total: Decimal,
    pub method_modifiers_total: Decimal,
    pub total_modifiers: Decimal,
    pub payment_surcharge: Decimal,
    pub final_price: Decimal,
}

/// Result of a single-method price calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinglePriceQuote {
    pub method_id: Uuid,
    pub method_name: String,
    pub base_price: Decimal,
    pub final_price: Decimal,
    pub service_modifiers: Vec<AppliedModifier>,
    pub method_modifiers: Vec<AppliedModifier>,
    pub breakdown: PriceBreakdown,
}

/// Request to price one method for a quantity
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MethodQuoteRequest {
    pub method_id: Uuid,
    #[serde(default)]
    pub payment_method_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub quantity: u32,
    /// Service modifiers the caller opted into
    #[serde(default)]
    pub service_modifier_ids: Vec<Uuid>,
    #[serde(default)]
    pub context: CallerContext,
}

/// Request to price a level range for a service
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LevelRangeRequest {
    pub service_id: Uuid,
    #[validate(range(min = 1, max = 99))]
    pub start: u32,
    #[validate(range(min = 1, max = 99))]
    pub end: u32,
    /// Restrict to one method group (matched case-insensitively)
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default = "default_true")]
    pub apply_modifiers: bool,
    #[serde(default)]
    pub context: CallerContext,
}
