pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod storage;

pub use models::*;
pub use services::LedgerService;
pub use storage::{InMemoryPackageStore, PackageStore, SupabasePackageStore};
pub use router::{package_routes, PackageState};
