//! Core types for relaybot: the normalized message model, reaction settings,
//! the markdown to mrkdwn transformer, and layered configuration loading.

pub mod config;
pub mod domain;
pub mod mrkdwn;

pub use domain::message::{
    BlockKind, DataType, IncomingMessage, MessageData, OutgoingMessage, ParseKindError, Reactions,
};
pub use mrkdwn::to_mrkdwn;
