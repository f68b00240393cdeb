pub mod analytics;
pub mod optimizer;
pub mod projector;
pub mod share_manager;

pub use share_manager::ShareManager;
