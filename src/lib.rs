//! Autopilot — a multi-agent work orchestrator that drives tasks through a
//! fixed ten-phase lifecycle (Strategize through Monitor), gated by
//! deterministic critics and a quality graph, with a Scheduler, Model
//! Router, Agent Pool, and Operations Manager coordinating throughput under
//! a work-in-progress cap.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
pub mod supervisor;
