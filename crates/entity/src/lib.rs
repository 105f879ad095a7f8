pub mod user;
pub mod wallet;
pub mod wallet_transaction;
pub mod refresh_token;
pub mod minigame_session;
pub mod entitlement;
pub mod unlocked_content;
pub mod login_history;
pub mod processed_event;

pub use user::Entity as User;
