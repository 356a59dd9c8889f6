//! Ticket fetching from the upstream ticketing API.
//!
//! `client` talks HTTP with bounded retry; `normalize` maps the two field
//! casings the API may return onto the canonical [`Ticket`](crate::models::Ticket).

pub mod client;
pub mod normalize;

pub use client::{FetchError, TicketClient, TicketSource};
pub use normalize::normalize_records;
