// Item staging, editing and approval into downstream resources.

pub mod approval;
pub mod handlers;
pub mod models;
pub mod staging;
