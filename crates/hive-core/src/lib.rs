//! # hive-core
//!
//! Foundation types shared by every crate in the swarm orchestrator:
//!
//! - **Branded IDs**: [`ids::AgentId`] (validated, caller-chosen) and the
//!   daemon-generated correlation IDs ([`ids::DeliveryId`],
//!   [`ids::ScheduleId`], [`ids::BatchId`]).
//! - **Data model**: [`model::AgentDescriptor`], [`model::ConversationEntry`],
//!   [`model::RuntimeSessionEvent`], [`model::Schedule`].
//! - **Collaborator interfaces**: [`collab::CwdPolicy`],
//!   [`collab::ArchetypePromptRegistry`].
//! - **Validation errors**: [`errors::ValidationError`].

#![deny(unsafe_code)]

pub mod collab;
pub mod constants;
pub mod errors;
pub mod ids;
pub mod model;
