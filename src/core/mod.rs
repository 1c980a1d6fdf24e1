pub mod resource;
pub mod scheduler;
pub mod types;
