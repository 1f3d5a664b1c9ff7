//! # Authors Heaven (Content Platform API)
//!
//! `authors-heaven` is the backend for a collaborative writing platform. It
//! handles account registration with email verification, local and social
//! authentication, password resets, user profiles, and article publishing.
//!
//! ## Accounts & Authentication
//!
//! Local accounts register with email + password and stay inactive until the
//! verification link sent by email is consumed. Login accepts either the
//! username or the email address and returns a JWT access/refresh pair.
//!
//! Social login (Google, Facebook, Twitter) validates the provider token
//! server-side and links accounts by email address. A user created through a
//! social provider is active immediately and carries no local password; local
//! login for such accounts is rejected with a hint naming the provider.
//!
//! Email verification and password-reset links carry signed, time-limited
//! tokens that are additionally recorded server-side and consumed exactly
//! once.
//!
//! ## Articles
//!
//! Articles belong to their author and carry free-form tags. Slugs are
//! derived from the title, normalized to lowercase `[a-z0-9-]`, and made
//! unique with a random suffix when a title collides. Non-admin users only
//! ever see their own articles; admins see everything.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
