pub mod medication;
pub mod user;
