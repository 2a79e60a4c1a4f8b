//! Infrastructure layer: event store, command dispatch, projections and the
//! ledger service that ties them together.

pub mod command_dispatcher;
pub mod event_store;
pub mod ledger_service;
pub mod projections;
pub mod read_model;
pub mod workers;
