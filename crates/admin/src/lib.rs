//! DDH Masale Admin library.
//!
//! Product, quote request and brand settings management, on top of the
//! storefront's state container and repositories.
//!
//! # Security
//!
//! Access is decided by the role on the signed-in account. Row-level
//! policies on the backend remain the real gate; the console only refuses
//! early.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod console;
pub mod forms;

pub use console::AdminConsole;
pub use forms::ProductForm;
