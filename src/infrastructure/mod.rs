pub mod lookup_repo;
pub mod memory;
pub mod models;
pub mod order_repo;

pub use lookup_repo::{DieselTaskRepository, DieselUserRepository, DieselWorkerRepository};
pub use memory::InMemoryStore;
pub use order_repo::DieselOrderRepository;
