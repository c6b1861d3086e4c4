pub mod auth;
pub mod htmx;
pub mod logging;
pub mod session;
