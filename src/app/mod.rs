pub mod cinemas;
pub mod error;
pub mod imaging;
pub mod movies;
pub mod sessions;
pub mod users;

pub use error::{ServiceError, ServiceResult};
