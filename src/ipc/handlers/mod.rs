pub mod auth;
pub mod backup;
pub mod calc;
pub mod core;
pub mod submissions;
