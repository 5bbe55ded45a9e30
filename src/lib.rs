//! Background automation for a Discord guild.
//!
//! Two independent subsystems do the actual work:
//!
//! * [`schedule::ScheduleEngine`] dispatches configured recurring
//!   messages off its own polling timer, at most once per occurrence.
//! * [`handlers`] reacts to platform events (thread created,
//!   member joined) by silently enrolling users into threads through
//!   batched mention edits of a single marker post per thread.
//!
//! They share no mutable state; the engine is driven purely by its
//! timer and the handlers purely by events fed into
//! [`handlers::handle`].

pub mod config;
pub mod discord;
pub mod handlers;
pub mod interval;
pub mod schedule;

#[cfg(test)]
mod tests;
