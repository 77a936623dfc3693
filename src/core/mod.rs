//! Core types shared by every shpm component.
//!
//! At the moment this is the error taxonomy ([`ShpmError`]) and its
//! user-facing rendering ([`ErrorContext`], [`user_friendly_error`]).

pub mod error;

pub use error::{ErrorContext, ShpmError, user_friendly_error};
