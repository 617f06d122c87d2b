pub mod payloads;
pub mod repository;
