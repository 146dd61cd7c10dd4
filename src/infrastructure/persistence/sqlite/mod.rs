//! SQLite 持久化实现

mod database;
mod job_repo;
mod manuscript_repo;
mod report_repo;
mod review_pass_repo;
mod world_model_repo;

pub use database::{create_pool, run_migrations, DatabaseConfig, DbPool};
pub use job_repo::SqliteJobRepository;
pub use manuscript_repo::SqliteManuscriptRepository;
pub use report_repo::SqliteAnalysisReportRepository;
pub use review_pass_repo::SqliteReviewPassRepository;
pub use world_model_repo::SqliteWorldModelRepository;
