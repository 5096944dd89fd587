//! Segment coverage solver.
//!
//! Greedy interval sweep: at each cursor position take the cheapest method
//! whose window contains the cursor and ride it to the end of its window (or
//! the end of the request). Windows are contiguous and cost is linear in the
//! progress covered, so the cheapest method at the frontier is never beaten by
//! deferring to it.

use rust_decimal::Decimal;
use tracing::debug;

use crate::base_price::{compute_subtotal, money_add};
use crate::models::{LevelRange, PricingMethod};
use crate::progress::ProgressCurve;

/// A contiguous `[start, end)` piece of a solution assigned to one method
#[derive(Debug, Clone, PartialEq)]
pub struct Segment<'a> {
    pub start: u32,
    pub end: u32,
    pub method: &'a PricingMethod,
    pub progress: Decimal,
    pub cost: Decimal,
}

impl Segment<'_> {
    pub fn to_level_range(&self) -> LevelRange {
        LevelRange {
            start: self.start,
            end: self.end,
            progress: self.progress,
            method_id: self.method.id,
            method_name: self.method.name.clone(),
            rate: self.method.base_price,
            cost: self.cost,
        }
    }
}

/// Price `method` over `[start, end)` as a single segment
pub fn price_segment<'a>(
    method: &'a PricingMethod,
    start: u32,
    end: u32,
    curve: &dyn ProgressCurve,
) -> Segment<'a> {
    let progress = curve.progress_between(start, end);
    Segment {
        start,
        end,
        method,
        progress,
        cost: compute_subtotal(method.base_price, method.pricing_unit, progress),
    }
}

/// Cover `[start, end)` with the cheapest sequence of methods.
///
/// Returns `None` when some level in the range has no covering method. Ties on
/// rate go to the method listed first.
pub fn solve<'a>(
    methods: &[&'a PricingMethod],
    start: u32,
    end: u32,
    curve: &dyn ProgressCurve,
) -> Option<Vec<Segment<'a>>> {
    let mut segments = Vec::new();
    let mut cursor = start;

    while cursor < end {
        let Some(method) = cheapest_covering(methods, cursor) else {
            debug!(start, end, gap_at = cursor, "Range is not coverable");
            return None;
        };

        let segment_end = end.min(method.window.end());
        segments.push(price_segment(method, cursor, segment_end, curve));
        cursor = segment_end;
    }

    Some(segments)
}

/// Sum of segment costs
pub fn total_cost(segments: &[Segment<'_>]) -> Decimal {
    segments
        .iter()
        .fold(Decimal::ZERO, |total, s| money_add(total, s.cost))
}

fn cheapest_covering<'a>(methods: &[&'a PricingMethod], level: u32) -> Option<&'a PricingMethod> {
    methods
        .iter()
        .copied()
        .filter(|m| m.window.contains(level))
        .reduce(|best, m| if m.base_price < best.base_price { m } else { best })
}
