pub mod models;
pub mod repository;
pub mod service;
pub mod validation;

pub use models::File;
pub use repository::{FileRepository, FileRepositoryTrait, PageRepository};
pub use service::FileService;
pub use validation::{is_allowed_type, validate_file_type, ALLOWED_FILE_TYPES};
