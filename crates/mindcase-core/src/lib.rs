pub mod limits;
pub mod oauth;
pub mod password;
pub mod pricing;
pub mod stripe;
pub mod token;
