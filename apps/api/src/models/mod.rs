pub mod interpretation;
pub mod task;
pub mod user;
