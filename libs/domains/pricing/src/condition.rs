//! Modifier conditions.
//!
//! Catalog records carry a condition either as a JSON-encoded string or as an
//! inline object. It is decoded once, when the record is loaded, into a closed
//! set of variants; evaluation is then a plain `match`.
//!
//! Decoding never fails: a payload that cannot be read becomes
//! [`ModifierCondition::Malformed`], which never applies.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::models::CallerContext;

/// Context key read by quantity-range conditions
pub const QUANTITY_FIELD: &str = "quantity";

#[derive(Debug, Clone, PartialEq)]
pub enum ModifierCondition {
    /// Current accumulated price within `[min, max]`; a missing bound is open
    PriceRange {
        min: Option<Decimal>,
        max: Option<Decimal>,
    },
    /// `context[field]` equals `value`
    CustomField { field: String, value: Value },
    /// `context["quantity"]` within `[min, max]`; a missing bound is open
    QuantityRange {
        min: Option<Decimal>,
        max: Option<Decimal>,
    },
    /// Condition type this build does not know; always applies
    Unknown { kind: Option<String> },
    /// Payload that could not be read; never applies
    Malformed { raw: String },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ConditionPayload {
    PriceRange {
        #[serde(default)]
        min: Option<Decimal>,
        #[serde(default)]
        max: Option<Decimal>,
    },
    CustomField {
        field: String,
        value: Value,
    },
    QuantityRange {
        #[serde(default)]
        min: Option<Decimal>,
        #[serde(default)]
        max: Option<Decimal>,
    },
}

const KNOWN_TYPES: [&str; 3] = ["price_range", "custom_field", "quantity_range"];

impl ModifierCondition {
    /// Decode a raw catalog value. `None` means "no condition".
    pub fn decode(raw: Value) -> Option<Self> {
        match raw {
            Value::Null => None,
            Value::String(text) if text.trim().is_empty() => None,
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(object)) => Some(Self::decode_object(object)),
                Ok(Value::Null) => None,
                Ok(_) | Err(_) => Some(Self::malformed(text)),
            },
            Value::Object(object) => Some(Self::decode_object(object)),
            other => Some(Self::malformed(other.to_string())),
        }
    }

    fn decode_object(object: Map<String, Value>) -> Self {
        let kind = object.get("type").and_then(Value::as_str).map(str::to_string);

        match kind.as_deref() {
            Some(kind) if KNOWN_TYPES.contains(&kind) => {
                let raw = Value::Object(object);
                match serde_json::from_value::<ConditionPayload>(raw.clone()) {
                    Ok(payload) => payload.into(),
                    Err(_) => Self::malformed(raw.to_string()),
                }
            }
            _ => Self::Unknown { kind },
        }
    }

    fn malformed(raw: String) -> Self {
        tracing::warn!(condition = %raw, "Malformed modifier condition; modifier will not apply");
        Self::Malformed { raw }
    }

    /// Whether the condition holds for `context` at `current_price`
    pub fn is_satisfied(&self, context: &CallerContext, current_price: Decimal) -> bool {
        match self {
            Self::PriceRange { min, max } => within(current_price, *min, *max),
            Self::CustomField { field, value } => context
                .get(field)
                .is_some_and(|actual| values_match(actual, value)),
            Self::QuantityRange { min, max } => context
                .get(QUANTITY_FIELD)
                .and_then(as_decimal)
                .is_some_and(|quantity| within(quantity, *min, *max)),
            Self::Unknown { .. } => true,
            Self::Malformed { .. } => false,
        }
    }

    fn to_value(&self) -> Value {
        let mut object = Map::new();
        match self {
            Self::PriceRange { min, max } | Self::QuantityRange { min, max } => {
                let kind = if matches!(self, Self::PriceRange { .. }) {
                    "price_range"
                } else {
                    "quantity_range"
                };
                object.insert("type".into(), json!(kind));
                if let Some(min) = min {
                    object.insert("min".into(), json!(min));
                }
                if let Some(max) = max {
                    object.insert("max".into(), json!(max));
                }
            }
            Self::CustomField { field, value } => {
                object.insert("type".into(), json!("custom_field"));
                object.insert("field".into(), json!(field));
                object.insert("value".into(), value.clone());
            }
            Self::Unknown { kind } => {
                if let Some(kind) = kind {
                    object.insert("type".into(), json!(kind));
                }
            }
            Self::Malformed { raw } => return Value::String(raw.clone()),
        }
        Value::Object(object)
    }
}

impl From<ConditionPayload> for ModifierCondition {
    fn from(payload: ConditionPayload) -> Self {
        match payload {
            ConditionPayload::PriceRange { min, max } => Self::PriceRange { min, max },
            ConditionPayload::CustomField { field, value } => Self::CustomField { field, value },
            ConditionPayload::QuantityRange { min, max } => Self::QuantityRange { min, max },
        }
    }
}

impl Serialize for ModifierCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// `deserialize_with` helper for `Option<ModifierCondition>` fields
pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<ModifierCondition>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(ModifierCondition::decode))
}

fn within(value: Decimal, min: Option<Decimal>, max: Option<Decimal>) -> bool {
    min.is_none_or(|min| value >= min) && max.is_none_or(|max| value <= max)
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .map(Decimal::from)
            .or_else(|| number.as_u64().map(Decimal::from))
            .or_else(|| number.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

// "5" in the context matches 5 in the catalog and vice versa
fn values_match(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (scalar_text(actual), scalar_text(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(pairs: &[(&str, Value)]) -> CallerContext {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_absent_and_blank_conditions_decode_to_none() {
        assert_eq!(ModifierCondition::decode(Value::Null), None);
        assert_eq!(ModifierCondition::decode(json!("   ")), None);
        assert_eq!(ModifierCondition::decode(json!("null")), None);
    }

    #[test]
    fn test_string_payload_is_parsed() {
        let condition =
            ModifierCondition::decode(json!(r#"{"type":"price_range","min":10,"max":100}"#))
                .unwrap();
        assert_eq!(
            condition,
            ModifierCondition::PriceRange {
                min: Some(Decimal::from(10)),
                max: Some(Decimal::from(100)),
            }
        );
    }

    #[test]
    fn test_unparseable_payload_is_malformed_and_never_applies() {
        let condition = ModifierCondition::decode(json!("{not json")).unwrap();
        assert!(matches!(condition, ModifierCondition::Malformed { .. }));
        assert!(!condition.is_satisfied(&CallerContext::new(), Decimal::from(50)));
    }

    #[test]
    fn test_known_type_with_bad_fields_is_malformed() {
        let condition =
            ModifierCondition::decode(json!({"type": "price_range", "min": "lots"})).unwrap();
        assert!(matches!(condition, ModifierCondition::Malformed { .. }));

        let condition = ModifierCondition::decode(json!({"type": "custom_field"})).unwrap();
        assert!(matches!(condition, ModifierCondition::Malformed { .. }));
    }

    #[test]
    fn test_unknown_or_missing_type_applies() {
        let condition = ModifierCondition::decode(json!({"type": "moon_phase"})).unwrap();
        assert_eq!(
            condition,
            ModifierCondition::Unknown {
                kind: Some("moon_phase".to_string())
            }
        );
        assert!(condition.is_satisfied(&CallerContext::new(), Decimal::ZERO));

        let condition = ModifierCondition::decode(json!({"min": 5})).unwrap();
        assert!(condition.is_satisfied(&CallerContext::new(), Decimal::ZERO));
    }

    #[test]
    fn test_price_range_is_inclusive() {
        let condition = ModifierCondition::PriceRange {
            min: Some(Decimal::from(10)),
            max: Some(Decimal::from(100)),
        };
        let ctx = CallerContext::new();
        assert!(condition.is_satisfied(&ctx, Decimal::from(10)));
        assert!(condition.is_satisfied(&ctx, Decimal::from(100)));
        assert!(!condition.is_satisfied(&ctx, Decimal::new(999, 1)));
        assert!(!condition.is_satisfied(&ctx, Decimal::new(10001, 2)));
    }

    #[test]
    fn test_open_ended_range() {
        let condition = ModifierCondition::PriceRange {
            min: Some(Decimal::from(500)),
            max: None,
        };
        assert!(condition.is_satisfied(&CallerContext::new(), Decimal::from(10_000)));
    }

    #[test]
    fn test_custom_field_equality() {
        let condition = ModifierCondition::CustomField {
            field: "account_type".to_string(),
            value: json!("ironman"),
        };
        assert!(condition.is_satisfied(
            &context(&[("account_type", json!("ironman"))]),
            Decimal::ZERO
        ));
        assert!(!condition.is_satisfied(
            &context(&[("account_type", json!("main"))]),
            Decimal::ZERO
        ));
        assert!(!condition.is_satisfied(&CallerContext::new(), Decimal::ZERO));
    }

    #[test]
    fn test_custom_field_compares_scalars_by_text() {
        let condition = ModifierCondition::CustomField {
            field: "world".to_string(),
            value: json!(302),
        };
        assert!(condition.is_satisfied(&context(&[("world", json!("302"))]), Decimal::ZERO));
    }

    #[test]
    fn test_quantity_range_reads_context() {
        let condition = ModifierCondition::QuantityRange {
            min: Some(Decimal::from(5)),
            max: Some(Decimal::from(10)),
        };
        assert!(condition.is_satisfied(&context(&[("quantity", json!(5))]), Decimal::ZERO));
        assert!(condition.is_satisfied(&context(&[("quantity", json!("7"))]), Decimal::ZERO));
        assert!(!condition.is_satisfied(&context(&[("quantity", json!(11))]), Decimal::ZERO));
        assert!(!condition.is_satisfied(&CallerContext::new(), Decimal::ZERO));
    }

    #[test]
    fn test_serialized_form_decodes_to_same_condition() {
        let condition = ModifierCondition::QuantityRange {
            min: Some(Decimal::from(2)),
            max: None,
        };
        let value = serde_json::to_value(&condition).unwrap();
        assert_eq!(value["type"], "quantity_range");
        assert_eq!(ModifierCondition::decode(value), Some(condition));
    }
}
