//! Candidate generation for a level range.
//!
//! Four independent families are built from the same immutable method list:
//! the optimal combination, single full-range methods, group-only
//! combinations, and per-method overlap segments. Each candidate runs its own
//! modifier pipeline over its own subtotal.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::base_price::{money_sub, round_money};
use crate::calculator::LevelRangeInput;
use crate::error::{PricingError, PricingResult};
use crate::models::{
    AppliedModifier, LevelRange, MethodOption, Modifier, OptionKind, PricingMethod,
};
use crate::modifiers::{ModifierPipeline, PipelineOutcome};
use crate::naming::normalize_base_name;
use crate::solver::{price_segment, solve, total_cost, Segment};

pub const OPTIMAL_COMBINATION: &str = "Optimal Combination";
pub const OPTIMAL_ID: &str = "optimal";

/// Which candidates compete for the cheapest flag
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CheapestScope {
    /// Every candidate, per-method overlap segments included
    #[default]
    All,
    /// Only candidates pricing the whole range (optimal, single, group)
    FullRange,
}

impl CheapestScope {
    pub fn includes(&self, kind: OptionKind) -> bool {
        match self {
            Self::FullRange => kind.covers_full_range(),
            Self::All => true,
        }
    }
}

/// Generate every candidate for the range, in generation order, with exactly
/// one flagged cheapest. Amounts are rounded for display.
///
/// Fails with [`PricingError::NoCoverage`] when no candidate prices the whole
/// range; overlap segments alone do not count.
pub fn generate_options(input: &LevelRangeInput<'_>) -> PricingResult<Vec<MethodOption>> {
    let all: Vec<&PricingMethod> = input.methods.iter().collect();

    let candidates: Vec<MethodOption> = optimal_candidate(input, &all)
        .into_iter()
        .chain(single_candidates(input))
        .chain(group_candidates(input))
        .chain(segment_candidates(input))
        .collect();

    if !candidates.iter().any(|c| c.kind.covers_full_range()) {
        debug!(
            start = input.start,
            end = input.end,
            methods = input.methods.len(),
            "No candidate covers the requested range"
        );
        return Err(PricingError::NoCoverage {
            start: input.start,
            end: input.end,
        });
    }

    let cheapest = cheapest_index(&candidates, input.cheapest_scope);

    Ok(candidates
        .into_iter()
        .enumerate()
        .map(|(index, candidate)| MethodOption {
            is_cheapest: Some(index) == cheapest,
            ..rounded(candidate)
        })
        .collect())
}

/// Group key of a method: its display name with range patterns stripped
pub fn group_key(method: &PricingMethod) -> String {
    normalize_base_name(&method.name)
}

fn optimal_candidate(input: &LevelRangeInput<'_>, all: &[&PricingMethod]) -> Option<MethodOption> {
    let segments = solve(all, input.start, input.end, input.curve)?;
    Some(combined(
        input,
        &segments,
        OPTIMAL_ID.to_string(),
        OPTIMAL_COMBINATION.to_string(),
        OptionKind::Optimal,
    ))
}

fn single_candidates(input: &LevelRangeInput<'_>) -> Vec<MethodOption> {
    input
        .methods
        .iter()
        .filter(|m| m.window.covers(input.start, input.end))
        .map(|method| {
            let segment = price_segment(method, input.start, input.end, input.curve);
            let pipeline = input.pipeline(&method.modifiers);
            assemble(
                input,
                method.id.to_string(),
                method.name.clone(),
                OptionKind::Single,
                vec![segment.to_level_range()],
                segment.cost,
                &pipeline,
            )
        })
        .collect()
}

fn group_candidates(input: &LevelRangeInput<'_>) -> Vec<MethodOption> {
    let groups = input.methods.iter().fold(
        Vec::<(String, Vec<&PricingMethod>)>::new(),
        |mut groups, method| {
            let key = group_key(method);
            match groups.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, members)) => members.push(method),
                None => groups.push((key, vec![method])),
            }
            groups
        },
    );

    groups
        .into_iter()
        .filter(|(_, members)| {
            members.len() > 1 || !members[0].window.covers(input.start, input.end)
        })
        .filter_map(|(name, members)| {
            let segments = solve(&members, input.start, input.end, input.curve)?;
            Some(combined(
                input,
                &segments,
                format!("group:{name}"),
                format!("{name} Only"),
                OptionKind::Group,
            ))
        })
        .collect()
}

fn segment_candidates(input: &LevelRangeInput<'_>) -> Vec<MethodOption> {
    input
        .methods
        .iter()
        .filter_map(|method| {
            let (start, end) = method.window.intersect(input.start, input.end)?;
            let segment = price_segment(method, start, end, input.curve);
            let pipeline = input.pipeline([]);
            Some(assemble(
                input,
                format!("{}:{start}-{end}", method.id),
                format!("{} ({start}-{end})", method.name),
                OptionKind::Segment,
                vec![segment.to_level_range()],
                segment.cost,
                &pipeline,
            ))
        })
        .collect()
}

// Modifiers apply once, to the summed subtotal of all segments.
fn combined(
    input: &LevelRangeInput<'_>,
    segments: &[Segment<'_>],
    method_id: String,
    method_name: String,
    kind: OptionKind,
) -> MethodOption {
    let method_modifiers = segments
        .iter()
        .flat_map(|s| s.method.modifiers.iter())
        .fold(Vec::<&Modifier>::new(), |mut distinct, modifier| {
            if !distinct.iter().any(|m| m.id == modifier.id) {
                distinct.push(modifier);
            }
            distinct
        });
    let pipeline = input.pipeline(method_modifiers);

    assemble(
        input,
        method_id,
        method_name,
        kind,
        segments.iter().map(Segment::to_level_range).collect(),
        total_cost(segments),
        &pipeline,
    )
}

fn assemble(
    input: &LevelRangeInput<'_>,
    method_id: String,
    method_name: String,
    kind: OptionKind,
    level_ranges: Vec<LevelRange>,
    subtotal: Decimal,
    pipeline: &ModifierPipeline<'_>,
) -> MethodOption {
    let PipelineOutcome {
        final_price,
        modifiers,
        ..
    } = pipeline.run(subtotal, input.context);

    MethodOption {
        method_id,
        method_name,
        kind,
        level_ranges,
        modifiers_total: money_sub(final_price, subtotal),
        modifiers,
        subtotal,
        final_price,
        is_cheapest: false,
    }
}

// First minimum wins; comparison is on full-precision prices.
fn cheapest_index(candidates: &[MethodOption], scope: CheapestScope) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| scope.includes(c.kind))
        .fold(None::<(usize, Decimal)>, |best, (index, candidate)| match best {
            Some((_, price)) if price <= candidate.final_price => best,
            _ => Some((index, candidate.final_price)),
        })
        .map(|(index, _)| index)
}

fn rounded(option: MethodOption) -> MethodOption {
    MethodOption {
        level_ranges: option
            .level_ranges
            .into_iter()
            .map(|r| LevelRange {
                cost: round_money(r.cost),
                ..r
            })
            .collect(),
        modifiers: option
            .modifiers
            .into_iter()
            .map(|m| AppliedModifier {
                amount: round_money(m.amount),
                ..m
            })
            .collect(),
        subtotal: round_money(option.subtotal),
        modifiers_total: round_money(option.modifiers_total),
        final_price: round_money(option.final_price),
        ..option
    }
}
