use std::sync::Arc;
use tracing::{debug, info, instrument};
use validator::Validate;

use crate::cache::{CachedQuote, QuoteCache, QuoteCacheKey};
use crate::calculator::{
    calculate_level_range_options, calculate_single_price, validate_range, LevelRangeInput,
    SinglePriceInput,
};
use crate::config::PricingConfig;
use crate::error::{PricingError, PricingResult};
use crate::models::{
    LevelRangeQuote, LevelRangeRequest, MethodQuoteRequest, PricingMethod, SinglePriceQuote,
};
use crate::options::group_key;
use crate::progress::{ExperienceTable, ProgressCurve};
use crate::repository::PricingCatalog;

/// Service layer: resolves catalog records, then runs the pure calculator
#[derive(Clone)]
pub struct PricingService<C: PricingCatalog> {
    catalog: Arc<C>,
    cache: Option<Arc<dyn QuoteCache>>,
    curve: Arc<dyn ProgressCurve>,
    config: PricingConfig,
}

impl<C: PricingCatalog> PricingService<C> {
    pub fn new(catalog: C) -> Self {
        Self {
            catalog: Arc::new(catalog),
            cache: None,
            curve: Arc::new(ExperienceTable::new()),
            config: PricingConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PricingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cache(mut self, cache: impl QuoteCache + 'static) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    pub fn with_progress_curve(mut self, curve: impl ProgressCurve + 'static) -> Self {
        self.curve = Arc::new(curve);
        self
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Price one method for a quantity
    #[instrument(
        skip(self, request),
        fields(method_id = %request.method_id, quantity = request.quantity)
    )]
    pub async fn quote_method(
        &self,
        request: MethodQuoteRequest,
    ) -> PricingResult<SinglePriceQuote> {
        request
            .validate()
            .map_err(|e| PricingError::InvalidInput(e.to_string()))?;

        let key = QuoteCacheKey::single(&request);
        if let Some(CachedQuote::Single(quote)) = self.cached(&key).await {
            return Ok(quote);
        }

        let service = self
            .catalog
            .get_service_for_method(request.method_id)
            .await?
            .ok_or_else(|| PricingError::not_found("Pricing method", request.method_id))?;
        let method = service
            .methods
            .iter()
            .find(|m| m.id == request.method_id && m.active)
            .ok_or_else(|| PricingError::not_found("Pricing method", request.method_id))?;

        let payment_method = match request.payment_method_id {
            Some(id) => Some(
                self.catalog
                    .get_payment_method(id)
                    .await?
                    .ok_or_else(|| PricingError::not_found("Payment method", id))?,
            ),
            None => None,
        };

        let quote = calculate_single_price(SinglePriceInput {
            method,
            service_modifiers: &service.modifiers,
            payment_method: payment_method.as_ref(),
            quantity: request.quantity,
            selected_service_modifier_ids: &request.service_modifier_ids,
            context: &request.context,
        });

        info!(final_price = %quote.final_price, "Quoted pricing method");
        self.store(key, CachedQuote::Single(quote.clone())).await;
        Ok(quote)
    }

    /// Price a level range for a service, optionally restricted to one group
    #[instrument(
        skip(self, request),
        fields(service_id = %request.service_id, start = request.start, end = request.end)
    )]
    pub async fn quote_level_range(
        &self,
        request: LevelRangeRequest,
    ) -> PricingResult<LevelRangeQuote> {
        let invalid = || PricingError::InvalidRange {
            start: request.start,
            end: request.end,
        };
        request.validate().map_err(|_| invalid())?;
        validate_range(request.start, request.end)?;

        let key = QuoteCacheKey::range(&request);
        if let Some(CachedQuote::Range(quote)) = self.cached(&key).await {
            return Ok(quote);
        }

        let service = self
            .catalog
            .get_service(request.service_id)
            .await?
            .ok_or_else(|| PricingError::not_found("Service", request.service_id))?;

        let methods: Vec<PricingMethod> = service
            .methods
            .iter()
            .filter(|m| m.active)
            .filter(|m| request.group.as_deref().is_none_or(|g| in_group(m, g)))
            .cloned()
            .collect();
        debug!(
            methods = methods.len(),
            group = request.group.as_deref(),
            "Resolved candidate methods"
        );

        let quote = calculate_level_range_options(LevelRangeInput {
            methods: &methods,
            service_modifiers: &service.modifiers,
            start: request.start,
            end: request.end,
            apply_modifiers: request.apply_modifiers,
            context: &request.context,
            curve: self.curve.as_ref(),
            cheapest_scope: self.config.cheapest_scope,
        })?;

        info!(
            options = quote.method_options.len(),
            cheapest = quote.cheapest().map(|o| o.method_name.as_str()),
            "Quoted level range"
        );
        self.store(key, CachedQuote::Range(quote.clone())).await;
        Ok(quote)
    }

    /// Drop every cached quote
    pub async fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all().await;
        }
    }

    fn active_cache(&self) -> Option<&Arc<dyn QuoteCache>> {
        self.cache.as_ref().filter(|_| self.config.cache_enabled)
    }

    async fn cached(&self, key: &QuoteCacheKey) -> Option<CachedQuote> {
        let hit = self.active_cache()?.get(key).await;
        if hit.is_some() {
            debug!("Quote cache hit");
        }
        hit
    }

    async fn store(&self, key: QuoteCacheKey, quote: CachedQuote) {
        if let Some(cache) = self.active_cache() {
            cache.put(key, quote).await;
        }
    }
}

// Matches the catalog group name or the normalized base name, ignoring case
fn in_group(method: &PricingMethod, group: &str) -> bool {
    let wanted = group.trim().to_lowercase();
    method
        .group_name
        .as_deref()
        .is_some_and(|g| g.trim().to_lowercase() == wanted)
        || group_key(method).to_lowercase() == wanted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryQuoteCache;
    use crate::condition::ModifierCondition;
    use crate::models::{
        CallerContext, Modifier, ModifierKind, OptionKind, PaymentMethod, PricingUnit, Service,
        ValidityWindow,
    };
    use crate::options::CheapestScope;
    use crate::progress::LinearProgress;
    use crate::repository::MockPricingCatalog;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::str::FromStr;
    use std::time::Duration;
    use uuid::Uuid;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn method(name: &str, group: Option<&str>, rate: &str, window: ValidityWindow) -> PricingMethod {
        PricingMethod {
            id: Uuid::now_v7(),
            name: name.to_string(),
            group_name: group.map(str::to_string),
            base_price: dec(rate),
            pricing_unit: PricingUnit::PerLevel,
            window,
            modifiers: vec![],
            active: true,
        }
    }

    fn runecrafting() -> Service {
        Service {
            id: Uuid::now_v7(),
            name: "Runecrafting".to_string(),
            active: true,
            modifiers: vec![],
            methods: vec![
                method(
                    "Rift (1-50)",
                    Some("GOTR"),
                    "1.0",
                    ValidityWindow::Bounded { start: 1, end: 50 },
                ),
                method(
                    "Rift (50-99)",
                    Some("GOTR"),
                    "0.5",
                    ValidityWindow::Bounded { start: 50, end: 99 },
                ),
                method("Altar", None, "3", ValidityWindow::Full),
            ],
        }
    }

    fn range_request(service_id: Uuid, start: u32, end: u32) -> LevelRangeRequest {
        LevelRangeRequest {
            service_id,
            start,
            end,
            group: None,
            apply_modifiers: true,
            context: CallerContext::new(),
        }
    }

    fn catalog_with(service: Service) -> MockPricingCatalog {
        let mut catalog = MockPricingCatalog::new();
        let id = service.id;
        catalog
            .expect_get_service()
            .with(mockall::predicate::eq(id))
            .returning(move |_| Ok(Some(service.clone())));
        catalog
    }

    #[tokio::test]
    async fn test_quote_level_range_uses_catalog_methods() {
        let service = runecrafting();
        let id = service.id;
        let pricing = PricingService::new(catalog_with(service)).with_progress_curve(LinearProgress);

        let quote = pricing.quote_level_range(range_request(id, 1, 99)).await.unwrap();

        assert_eq!(quote.levels.total_progress, dec("98"));
        let optimal = quote
            .method_options
            .iter()
            .find(|o| o.kind == OptionKind::Optimal)
            .unwrap();
        // 49 levels at 1.0 + 49 levels at 0.5
        assert_eq!(optimal.final_price, dec("73.50"));

        // global minimum: the 50-99 segment, 49 levels at 0.5
        let cheapest = quote.cheapest().unwrap();
        assert_eq!(cheapest.kind, OptionKind::Segment);
        assert_eq!(cheapest.final_price, dec("24.50"));
    }

    #[tokio::test]
    async fn test_quote_level_range_group_filter_is_case_insensitive() {
        let service = runecrafting();
        let id = service.id;
        let pricing = PricingService::new(catalog_with(service)).with_progress_curve(LinearProgress);

        let mut request = range_request(id, 1, 99);
        request.group = Some("gotr".to_string());
        let quote = pricing.quote_level_range(request).await.unwrap();

        assert!(quote.method_options.iter().all(|o| !o.method_name.starts_with("Altar")));
        assert!(quote.method_options.iter().any(|o| o.method_name == "Rift Only"));
    }

    #[tokio::test]
    async fn test_quote_level_range_group_matches_base_name() {
        let service = runecrafting();
        let id = service.id;
        let pricing = PricingService::new(catalog_with(service)).with_progress_curve(LinearProgress);

        let mut request = range_request(id, 1, 99);
        request.group = Some("rift".to_string());
        let quote = pricing.quote_level_range(request).await.unwrap();
        assert!(quote.method_options.iter().all(|o| !o.method_name.starts_with("Altar")));
    }

    #[tokio::test]
    async fn test_quote_level_range_unknown_group_has_no_coverage() {
        let service = runecrafting();
        let id = service.id;
        let pricing = PricingService::new(catalog_with(service));

        let mut request = range_request(id, 1, 99);
        request.group = Some("Blood".to_string());
        let err = pricing.quote_level_range(request).await.unwrap_err();
        assert_eq!(err, PricingError::NoCoverage { start: 1, end: 99 });
    }

    #[tokio::test]
    async fn test_quote_level_range_invalid_range_skips_catalog() {
        // no expectations: any catalog call panics
        let pricing = PricingService::new(MockPricingCatalog::new());

        let err = pricing
            .quote_level_range(range_request(Uuid::nil(), 0, 50))
            .await
            .unwrap_err();
        assert_eq!(err, PricingError::InvalidRange { start: 0, end: 50 });

        let err = pricing
            .quote_level_range(range_request(Uuid::nil(), 60, 60))
            .await
            .unwrap_err();
        assert_eq!(err, PricingError::InvalidRange { start: 60, end: 60 });
    }

    #[tokio::test]
    async fn test_quote_level_range_missing_service() {
        let mut catalog = MockPricingCatalog::new();
        catalog.expect_get_service().returning(|_| Ok(None));
        let pricing = PricingService::new(catalog);

        let err = pricing
            .quote_level_range(range_request(Uuid::nil(), 1, 99))
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cached_and_uncached_quotes_match() {
        let service = runecrafting();
        let id = service.id;

        let mut catalog = MockPricingCatalog::new();
        catalog
            .expect_get_service()
            .times(1)
            .returning(move |_| Ok(Some(service.clone())));
        let cached = PricingService::new(catalog)
            .with_cache(InMemoryQuoteCache::new(Duration::from_secs(60)));

        let cold = cached.quote_level_range(range_request(id, 20, 80)).await.unwrap();
        let warm = cached.quote_level_range(range_request(id, 20, 80)).await.unwrap();
        assert_eq!(cold, warm);

        let uncached = PricingService::new(catalog_with(runecrafting_with_id(id)));
        let fresh = uncached.quote_level_range(range_request(id, 20, 80)).await.unwrap();
        assert_eq!(
            fresh.method_options.iter().map(|o| o.final_price).collect::<Vec<_>>(),
            cold.method_options.iter().map(|o| o.final_price).collect::<Vec<_>>()
        );
    }

    fn runecrafting_with_id(id: Uuid) -> Service {
        Service {
            id,
            ..runecrafting()
        }
    }

    #[tokio::test]
    async fn test_disabled_cache_is_bypassed() {
        let service = runecrafting();
        let id = service.id;

        let mut catalog = MockPricingCatalog::new();
        catalog
            .expect_get_service()
            .times(2)
            .returning(move |_| Ok(Some(service.clone())));
        let cache = InMemoryQuoteCache::new(Duration::from_secs(60));
        let pricing = PricingService::new(catalog)
            .with_cache(cache.clone())
            .with_config(PricingConfig::without_cache());

        pricing.quote_level_range(range_request(id, 1, 99)).await.unwrap();
        pricing.quote_level_range(range_request(id, 1, 99)).await.unwrap();
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_full_range_scope_from_config() {
        let service = runecrafting();
        let id = service.id;
        let pricing = PricingService::new(catalog_with(service))
            .with_progress_curve(LinearProgress)
            .with_config(PricingConfig {
                cheapest_scope: CheapestScope::FullRange,
                ..PricingConfig::without_cache()
            });

        let quote = pricing.quote_level_range(range_request(id, 1, 99)).await.unwrap();
        let cheapest = quote.cheapest().unwrap();
        assert_eq!(cheapest.kind, OptionKind::Optimal);
        assert_eq!(cheapest.final_price, dec("73.50"));
    }

    fn quest_service() -> (Service, Modifier) {
        let mut quest = method("Quest", None, "100", ValidityWindow::Full);
        quest.pricing_unit = PricingUnit::Fixed;
        quest.modifiers = vec![Modifier {
            id: Uuid::now_v7(),
            name: "rush".to_string(),
            kind: ModifierKind::Fixed,
            value: dec("5"),
            priority: 0,
            condition: None,
            active: true,
        }];
        let promo = Modifier {
            id: Uuid::now_v7(),
            name: "promo".to_string(),
            kind: ModifierKind::Percentage,
            value: dec("-10"),
            priority: 0,
            condition: Some(ModifierCondition::CustomField {
                field: "membership".to_string(),
                value: json!("gold"),
            }),
            active: true,
        };
        let service = Service {
            id: Uuid::now_v7(),
            name: "Quests".to_string(),
            active: true,
            modifiers: vec![promo.clone()],
            methods: vec![quest],
        };
        (service, promo)
    }

    fn method_request(method_id: Uuid, modifier_ids: Vec<Uuid>) -> MethodQuoteRequest {
        MethodQuoteRequest {
            method_id,
            payment_method_id: None,
            quantity: 1,
            service_modifier_ids: modifier_ids,
            context: CallerContext::new(),
        }
    }

    #[tokio::test]
    async fn test_quote_method_with_selected_service_modifier() {
        let (service, promo) = quest_service();
        let method_id = service.methods[0].id;
        let mut catalog = MockPricingCatalog::new();
        catalog
            .expect_get_service_for_method()
            .with(mockall::predicate::eq(method_id))
            .returning(move |_| Ok(Some(service.clone())));
        let pricing = PricingService::new(catalog);

        let mut request = method_request(method_id, vec![promo.id]);
        request.context.insert("membership".to_string(), json!("gold"));
        let quote = pricing.quote_method(request).await.unwrap();
        assert_eq!(quote.final_price, dec("95.00"));

        let plain = pricing
            .quote_method(method_request(method_id, vec![promo.id]))
            .await
            .unwrap();
        assert_eq!(plain.final_price, dec("105.00"));
        assert!(!plain.service_modifiers[0].applied);
    }

    #[tokio::test]
    async fn test_quote_method_with_payment_surcharge() {
        let (service, _) = quest_service();
        let method_id = service.methods[0].id;
        let payment = PaymentMethod {
            id: Uuid::now_v7(),
            name: "Wallet".to_string(),
            active: true,
            surcharge_kind: ModifierKind::Fixed,
            surcharge_value: dec("1.25"),
        };
        let payment_id = payment.id;

        let mut catalog = MockPricingCatalog::new();
        catalog
            .expect_get_service_for_method()
            .returning(move |_| Ok(Some(service.clone())));
        catalog
            .expect_get_payment_method()
            .with(mockall::predicate::eq(payment_id))
            .returning(move |_| Ok(Some(payment.clone())));
        let pricing = PricingService::new(catalog);

        let mut request = method_request(method_id, vec![]);
        request.payment_method_id = Some(payment_id);
        let quote = pricing.quote_method(request).await.unwrap();

        assert_eq!(quote.breakdown.payment_surcharge, dec("1.25"));
        assert_eq!(quote.final_price, dec("106.25"));
    }

    #[tokio::test]
    async fn test_quote_method_missing_payment_method() {
        let (service, _) = quest_service();
        let method_id = service.methods[0].id;
        let mut catalog = MockPricingCatalog::new();
        catalog
            .expect_get_service_for_method()
            .returning(move |_| Ok(Some(service.clone())));
        catalog.expect_get_payment_method().returning(|_| Ok(None));
        let pricing = PricingService::new(catalog);

        let mut request = method_request(method_id, vec![]);
        request.payment_method_id = Some(Uuid::now_v7());
        let err = pricing.quote_method(request).await.unwrap_err();
        assert!(matches!(err, PricingError::NotFound(msg) if msg.starts_with("Payment method")));
    }

    #[tokio::test]
    async fn test_quote_method_unknown_method() {
        let mut catalog = MockPricingCatalog::new();
        catalog
            .expect_get_service_for_method()
            .returning(|_| Ok(None));
        let pricing = PricingService::new(catalog);

        let err = pricing
            .quote_method(method_request(Uuid::now_v7(), vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_quote_method_rejects_zero_quantity() {
        let pricing = PricingService::new(MockPricingCatalog::new());
        let mut request = method_request(Uuid::now_v7(), vec![]);
        request.quantity = 0;

        let err = pricing.quote_method(request).await.unwrap_err();
        assert!(matches!(err, PricingError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_quote_method_huge_quantity_does_not_panic() {
        let (mut service, _) = quest_service();
        service.methods[0].pricing_unit = PricingUnit::PerKill;
        service.methods[0].base_price = dec("100000000000000000000");
        let method_id = service.methods[0].id;
        let mut catalog = MockPricingCatalog::new();
        catalog
            .expect_get_service_for_method()
            .returning(move |_| Ok(Some(service.clone())));
        let pricing = PricingService::new(catalog);

        let mut request = method_request(method_id, vec![]);
        request.quantity = u32::MAX;
        let quote = pricing.quote_method(request).await.unwrap();
        assert_eq!(quote.final_price, Decimal::MAX);
    }

    #[tokio::test]
    async fn test_invalidate_cache_forces_recompute() {
        let (service, _) = quest_service();
        let method_id = service.methods[0].id;
        let mut catalog = MockPricingCatalog::new();
        catalog
            .expect_get_service_for_method()
            .times(2)
            .returning(move |_| Ok(Some(service.clone())));
        let pricing = PricingService::new(catalog)
            .with_cache(InMemoryQuoteCache::new(Duration::from_secs(60)));

        pricing.quote_method(method_request(method_id, vec![])).await.unwrap();
        pricing.quote_method(method_request(method_id, vec![])).await.unwrap();
        pricing.invalidate_cache().await;
        pricing.quote_method(method_request(method_id, vec![])).await.unwrap();
    }
}
