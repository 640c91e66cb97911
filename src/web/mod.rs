pub mod admin;
pub mod auth;
pub mod data;
pub mod landing;
pub mod models;
pub mod responses;
pub mod router;
pub mod session;
pub mod state;
pub mod storage;
pub mod templates;
pub mod uploads;

pub use state::AppState;
