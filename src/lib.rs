//! # Guardpost
//!
//! `guardpost` is the sign-in front door for a multi-user server: it verifies
//! local account credentials through a PAM helper, issues HMAC-signed session
//! cookies, and keeps a durable revocation list so signing out kills a cookie
//! everywhere, not just in the browser that held it.
//!
//! ## Session model
//!
//! A session is a signed `username|expiration|signature` cookie. Nothing is
//! stored server-side per session; the only shared state is the revocation
//! list, a flat file guarded by an advisory lock so several server processes
//! on one host can append to it safely.
//!
//! - **Sliding window:** authenticated requests re-issue the cookie, so an
//!   active user never hits the idle timeout.
//! - **Revocation:** sign-out appends the raw cookie value to the list; the
//!   entry expires with the cookie it blocks, keeping the file bounded.
//! - **Throttling:** one sign-in attempt per user per throttle window, and a
//!   denied attempt never extends the window.

pub mod api;
pub mod auth;
pub mod cli;
pub mod monitor;
