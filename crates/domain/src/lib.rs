//! Booking lifecycle for the marketplace.
//!
//! This crate provides:
//! - the status transition table (who may move a booking where)
//! - the provider directory seam and an in-memory directory
//! - the assignment engine that binds providers to bookings
//! - the lifecycle service that orchestrates customer, provider and admin actions

pub mod assignment;
pub mod commands;
pub mod directory;
pub mod error;
pub mod service;
pub mod transitions;

pub use assignment::{AssignmentEngine, AssignmentOutcome, AssignmentResult, EXHAUSTED_REASON};
pub use commands::{Actor, CreateBooking, NoShowType};
pub use directory::{InMemoryProviderDirectory, Provider, ProviderDirectory};
pub use error::{BookingError, Result};
pub use service::{BookingHistory, BookingService, CommandResult};
pub use transitions::{allowed_transitions, is_valid_transition, sources_for};
