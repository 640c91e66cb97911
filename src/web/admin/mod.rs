mod auth;
mod catalog;
mod dashboard;
mod materials;
mod types;

pub use auth::{login_page, logout, process_login};
pub use catalog::{courses_page, create_course, create_focus, focuses_page};
pub use dashboard::dashboard;
pub use materials::{upload_material, upload_page};
