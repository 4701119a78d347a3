pub mod client;
pub mod record;
pub mod search;
