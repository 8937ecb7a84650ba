//! Adminctl library - device administration orchestration
//!
//! `backend` abstracts the device-management service behind one contract
//! with a simulated and a live implementation. `orchestrator` sequences
//! multi-step workflows on top of whichever backend it is handed.

pub mod backend;
pub mod orchestrator;
pub mod output;
