//! Collaborators the core talks to through traits (§6): persistence, the
//! scraping transport, and the analysis backend. Concrete adapters are swapped
//! for in-memory/scripted doubles in tests, following the same pattern the
//! teacher used for its `Base*` traits.

pub mod analysis_backend;
pub mod claude_backend;
pub mod firecrawl_scrape_driver;
pub mod in_memory_store;
pub mod object_store;
pub mod postgres_store;
pub mod scrape_driver;
pub mod scripted_analysis_backend;
pub mod scripted_scrape_driver;
pub mod simple_scrape_driver;

pub use analysis_backend::{AnalysisBackend, AnalysisBackendError, Message, Role};
pub use claude_backend::ClaudeAnalysisBackend;
pub use firecrawl_scrape_driver::FirecrawlScrapeDriver;
pub use in_memory_store::InMemoryObjectStore;
pub use object_store::{ObjectStore, ObjectStoreError};
pub use postgres_store::PostgresObjectStore;
pub use scrape_driver::{ScrapeDriver, ScrapeError, ScrapeOptions};
pub use scripted_analysis_backend::ScriptedAnalysisBackend;
pub use scripted_scrape_driver::ScriptedScrapeDriver;
pub use simple_scrape_driver::SimpleScrapeDriver;
