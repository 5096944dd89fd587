//! Pricing Domain
//!
//! Quotes a service either for one pricing method at a quantity, or for a
//! level range covered by one or more methods whose validity windows may
//! overlap, leave gaps, or tie on rate.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Service   │  ← Catalog lookup, validation, quote cache
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Calculator  │  ← Pure entry points: single price, level range options
//! └──────┬──────┘
//!        │
//! ┌──────▼──────────────────────────────────┐
//! │ Solver · Options · Ranking · Modifiers  │  ← Synchronous engine
//! └──────┬──────────────────────────────────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Catalog records, quotes, requests
//! └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_pricing::{InMemoryCatalog, LevelRangeRequest, PricingService};
//!
//! let catalog = InMemoryCatalog::from_snapshot(snapshot).await;
//! let service = PricingService::new(catalog);
//! let quote = service.quote_level_range(request).await?;
//! println!("cheapest: {:?}", quote.cheapest());
//! ```

pub mod base_price;
pub mod cache;
pub mod calculator;
pub mod condition;
pub mod config;
pub mod error;
pub mod models;
pub mod modifiers;
pub mod naming;
pub mod options;
pub mod progress;
pub mod ranking;
pub mod repository;
pub mod service;
pub mod solver;

// Re-export commonly used types
pub use cache::{CachedQuote, InMemoryQuoteCache, QuoteCache, QuoteCacheKey};
pub use calculator::{
    calculate_level_range_options, calculate_single_price, LevelRangeInput, SinglePriceInput,
};
pub use condition::ModifierCondition;
pub use config::PricingConfig;
pub use error::{PricingError, PricingResult};
pub use models::{
    CallerContext, LevelRangeQuote, LevelRangeRequest, MethodOption, MethodQuoteRequest,
    Modifier, ModifierKind, OptionKind, PaymentMethod, PricingMethod, PricingUnit, Service,
    SinglePriceQuote, ValidityWindow,
};
pub use options::CheapestScope;
pub use progress::{ExperienceTable, LinearProgress, ProgressCurve};
pub use repository::{CatalogSnapshot, InMemoryCatalog, PricingCatalog};
pub use service::PricingService;
