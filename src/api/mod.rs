mod client;

pub use client::{HttpValidationClient, ValidationClient};
