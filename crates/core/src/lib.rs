//! Core of the soundpanel audio configuration panel
//!
//! Holds the audio module snapshot model, the command client, the config
//! change bus and the controller keeping the panel view in sync with the
//! backend. Transports and backends live in `soundpanel-infra`.

pub mod domain;
