//! Administrator pages and endpoints for managing users.
//!
//! Every route in this module must be layered behind the admin guard.

mod core;
mod delete_user_endpoint;
mod set_password_endpoint;
mod user_summary_page;
mod users_page;

pub use core::delete_user;
pub use delete_user_endpoint::delete_user_endpoint;
pub use set_password_endpoint::set_password_endpoint;
pub use user_summary_page::get_user_summary_page;
pub use users_page::get_users_page;
