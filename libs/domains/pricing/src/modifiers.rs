//! Modifier evaluation and the ordered modifier pipeline.

use rust_decimal::Decimal;

use crate::base_price::{money_add, money_mul, money_sub};
use crate::models::{AppliedModifier, CallerContext, Modifier, ModifierKind, ModifierLevel};

/// Whether `modifier` applies at `current_price` for this caller
pub fn should_apply(modifier: &Modifier, context: &CallerContext, current_price: Decimal) -> bool {
    modifier
        .condition
        .as_ref()
        .is_none_or(|condition| condition.is_satisfied(context, current_price))
}

/// Price after applying `modifier` to `price`
pub fn apply(price: Decimal, modifier: &Modifier) -> Decimal {
    apply_adjustment(price, modifier.kind, modifier.value)
}

/// Apply a percentage or fixed adjustment; unknown kinds are the identity
pub fn apply_adjustment(price: Decimal, kind: ModifierKind, value: Decimal) -> Decimal {
    match kind {
        ModifierKind::Percentage => money_mul(
            price,
            money_add(Decimal::ONE, value / Decimal::ONE_HUNDRED),
        ),
        ModifierKind::Fixed => money_add(price, value),
        ModifierKind::Unknown => price,
    }
}

/// Result of running a subtotal through the pipeline, at full precision
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub final_price: Decimal,
    pub service_total: Decimal,
    pub method_total: Decimal,
    pub modifiers: Vec<AppliedModifier>,
}

impl PipelineOutcome {
    pub fn modifiers_total(&self) -> Decimal {
        money_add(self.service_total, self.method_total)
    }

    pub fn at_level(&self, level: ModifierLevel) -> impl Iterator<Item = &AppliedModifier> {
        self.modifiers.iter().filter(move |m| m.level == level)
    }
}

/// Service modifiers then method modifiers, each level in ascending priority.
///
/// Inactive modifiers are dropped on construction. Equal priorities keep their
/// input order.
#[derive(Debug, Clone, Default)]
pub struct ModifierPipeline<'a> {
    service: Vec<&'a Modifier>,
    method: Vec<&'a Modifier>,
}

impl<'a> ModifierPipeline<'a> {
    pub fn new(
        service: impl IntoIterator<Item = &'a Modifier>,
        method: impl IntoIterator<Item = &'a Modifier>,
    ) -> Self {
        Self {
            service: ordered(service),
            method: ordered(method),
        }
    }

    /// A pipeline that leaves every price untouched
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn run(&self, subtotal: Decimal, context: &CallerContext) -> PipelineOutcome {
        let start = PipelineOutcome {
            final_price: subtotal,
            service_total: Decimal::ZERO,
            method_total: Decimal::ZERO,
            modifiers: Vec::with_capacity(self.service.len() + self.method.len()),
        };

        let staged = self
            .service
            .iter()
            .map(|m| (ModifierLevel::Service, *m))
            .chain(self.method.iter().map(|m| (ModifierLevel::Method, *m)));

        staged.fold(start, |mut outcome, (level, modifier)| {
            let before = outcome.final_price;
            let applied = should_apply(modifier, context, before);
            let after = if applied { apply(before, modifier) } else { before };
            let amount = money_sub(after, before);

            match level {
                ModifierLevel::Service => {
                    outcome.service_total = money_add(outcome.service_total, amount)
                }
                ModifierLevel::Method => {
                    outcome.method_total = money_add(outcome.method_total, amount)
                }
            }
            outcome.final_price = after;
            outcome.modifiers.push(AppliedModifier {
                id: modifier.id,
                name: modifier.name.clone(),
                kind: modifier.kind,
                value: modifier.value,
                level,
                applied,
                amount,
            });
            outcome
        })
    }
}

fn ordered<'a>(modifiers: impl IntoIterator<Item = &'a Modifier>) -> Vec<&'a Modifier> {
    let mut active: Vec<&Modifier> = modifiers.into_iter().filter(|m| m.active).collect();
    active.sort_by_key(|m| m.priority);
    active
}
