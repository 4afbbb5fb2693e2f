pub mod cinema;
pub mod movie;
pub mod pagination;
pub mod task;
pub mod user;
pub mod validation;
