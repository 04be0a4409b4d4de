pub mod configuration;
pub mod domain;
pub mod handlers;
pub mod startup;
