pub mod cart;
pub mod chat;
pub mod checkout;
pub mod listing;
pub mod moderation;
pub mod stock;
