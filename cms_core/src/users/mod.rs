pub mod models;
pub mod repository;
pub mod service;

pub use models::{User, UserType};
pub use repository::{UserRepository, UserRepositoryTrait};
pub use service::UserService;
