pub mod commands;
pub mod config;
pub mod converter;
pub mod error;
pub mod gateway;
pub mod interaction;
pub mod listener;
pub mod text;

#[cfg(test)]
mod test_support;
