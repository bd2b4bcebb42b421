//! 工具层：目录、数据源、单工具拉取器、归一化、并行采集

pub mod collector;
pub mod fetcher;
pub mod fixtures;
pub mod normalize;
pub mod registry;
pub mod source;

pub use collector::{Collection, ParallelCollector};
pub use fetcher::{FetchOutcome, Fetcher};
pub use fixtures::{FulfillmentData, MockMarketplace, PricingData, SearchRanking, SellerMetrics};
pub use registry::{ToolCatalog, ToolDescriptor, ToolKind};
pub use source::{DataSource, HttpDataSource};
