pub mod backend; // Query execution adapters over both data sources
pub mod charts; // Visualization recommendation engine
pub mod fallback; // Pure template-query strategy
pub mod orchestrator; // Question-to-response pipeline
pub mod session; // Process-wide session/connection state
pub mod shaping; // Result-table shaping for visualization
pub mod summary; // Insight-summary collaborator boundary
pub mod translator; // NL-to-SQL collaborator boundary

pub use orchestrator::AskService;
pub use session::Session;
pub use summary::SummaryService;
pub use translator::TranslationService;
