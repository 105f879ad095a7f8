pub mod app_state;
pub mod config;
pub mod entitlements;
pub mod events;
pub mod handlers;
pub mod models;
pub mod server;
pub mod sessions;
pub mod tokens;
pub mod unlocks;
pub mod wallet;

#[cfg(test)]
pub(crate) mod test_util;
