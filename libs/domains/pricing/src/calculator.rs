//! Pure pricing entry points.
//!
//! Both functions are synchronous and work only on data handed to them; they
//! never touch the catalog or the cache.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::base_price::{compute_subtotal, money_sub, round_money};
use crate::condition::QUANTITY_FIELD;
use crate::error::{PricingError, PricingResult};
use crate::models::{
    AppliedModifier, CallerContext, LevelRangeQuote, LevelSummary, Modifier, ModifierLevel,
    PaymentMethod, PriceBreakdown, PricingMethod, SinglePriceQuote, MAX_LEVEL, MIN_LEVEL,
};
use crate::modifiers::{apply_adjustment, ModifierPipeline};
use crate::options::{generate_options, CheapestScope};
use crate::progress::ProgressCurve;
use crate::ranking::rank;

/// Inputs for pricing one method at a quantity
#[derive(Clone, Copy)]
pub struct SinglePriceInput<'a> {
    pub method: &'a PricingMethod,
    pub service_modifiers: &'a [Modifier],
    pub payment_method: Option<&'a PaymentMethod>,
    pub quantity: u32,
    /// Only these service modifiers take part
    pub selected_service_modifier_ids: &'a [Uuid],
    pub context: &'a CallerContext,
}

/// Inputs for pricing a level range over a set of methods
#[derive(Clone, Copy)]
pub struct LevelRangeInput<'a> {
    pub methods: &'a [PricingMethod],
    pub service_modifiers: &'a [Modifier],
    pub start: u32,
    pub end: u32,
    /// When false, no modifier of any level is evaluated
    pub apply_modifiers: bool,
    pub context: &'a CallerContext,
    pub curve: &'a dyn ProgressCurve,
    pub cheapest_scope: CheapestScope,
}

impl<'a> LevelRangeInput<'a> {
    /// Pipeline of the service modifiers followed by `method_modifiers`
    pub fn pipeline<'m>(
        &self,
        method_modifiers: impl IntoIterator<Item = &'m Modifier>,
    ) -> ModifierPipeline<'m>
    where
        'a: 'm,
    {
        if self.apply_modifiers {
            ModifierPipeline::new(self.service_modifiers, method_modifiers)
        } else {
            ModifierPipeline::empty()
        }
    }
}

/// Reject ranges outside `[MIN_LEVEL, MAX_LEVEL]` or with `start >= end`
pub fn validate_range(start: u32, end: u32) -> PricingResult<()> {
    let domain = MIN_LEVEL..=MAX_LEVEL;
    if domain.contains(&start) && domain.contains(&end) && start < end {
        Ok(())
    } else {
        Err(PricingError::InvalidRange { start, end })
    }
}

/// Price one method for `quantity` units.
///
/// Selected service modifiers run first, then the method's own modifiers, then
/// the payment surcharge. The quantity is visible to quantity-range conditions
/// unless the caller's context already sets one.
pub fn calculate_single_price(input: SinglePriceInput<'_>) -> SinglePriceQuote {
    let method = input.method;
    let subtotal = compute_subtotal(
        method.base_price,
        method.pricing_unit,
        Decimal::from(input.quantity),
    );

    let mut context = input.context.clone();
    context
        .entry(QUANTITY_FIELD.to_string())
        .or_insert_with(|| input.quantity.into());

    let selected = input
        .service_modifiers
        .iter()
        .filter(|m| input.selected_service_modifier_ids.contains(&m.id));
    let outcome = ModifierPipeline::new(selected, &method.modifiers).run(subtotal, &context);

    let final_price = input.payment_method.map_or(outcome.final_price, |payment| {
        apply_adjustment(outcome.final_price, payment.surcharge_kind, payment.surcharge_value)
    });
    let payment_surcharge = money_sub(final_price, outcome.final_price);

    let surfaced = |level: ModifierLevel| -> Vec<AppliedModifier> {
        outcome
            .at_level(level)
            .map(|m| AppliedModifier {
                amount: round_money(m.amount),
                ..m.clone()
            })
            .collect()
    };

    SinglePriceQuote {
        method_id: method.id,
        method_name: method.name.clone(),
        base_price: method.base_price,
        final_price: round_money(final_price),
        service_modifiers: surfaced(ModifierLevel::Service),
        method_modifiers: surfaced(ModifierLevel::Method),
        breakdown: PriceBreakdown {
            subtotal: round_money(subtotal),
            service_modifiers_total: round_money(outcome.service_total),
            method_modifiers_total: round_money(outcome.method_total),
            total_modifiers: round_money(outcome.modifiers_total()),
            payment_surcharge: round_money(payment_surcharge),
            final_price: round_money(final_price),
        },
    }
}

/// Price a level range: every candidate family, ranked, exactly one cheapest.
pub fn calculate_level_range_options(
    input: LevelRangeInput<'_>,
) -> PricingResult<LevelRangeQuote> {
    validate_range(input.start, input.end)?;

    let options = generate_options(&input)?;

    Ok(LevelRangeQuote {
        levels: LevelSummary {
            start: input.start,
            end: input.end,
            total_progress: input.curve.progress_between(input.start, input.end),
        },
        method_options: rank(options),
    })
}
