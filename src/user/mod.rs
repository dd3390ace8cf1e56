//! Users of the finance tracker and their running balance.
//!
//! This module contains:
//! - The `User` model and the database functions for storing and fetching users
//! - The endpoints for registering a user and fetching a user by ID

mod core;
mod create_endpoint;
mod get_endpoint;

pub use core::{Email, User, UserID, adjust_balance, create_user, create_user_table, get_user_by_id};
pub use create_endpoint::create_user_endpoint;
pub use get_endpoint::get_user_endpoint;
