//! Link Runtime Module
//!
//! Ties the serial protocol together at run time.
//!
//! # Overview
//!
//! A [`LinkRuntime`] owns the transport, the line framer and the command
//! engine, and drives them from a single task:
//!
//! - Transport bytes are framed into lines and dispatched; each line produces
//!   exactly one terminated reply.
//! - Providers report progress as [`NetEvent`]s over an embassy channel; the
//!   loop applies them between commands.
//!
//! # Publishing Pattern
//!
//! Providers never touch the engine directly. They hold an [`EventHandle`]
//! (a copyable channel sender) and send owned events; the runtime applies
//! them on its own task, so the engine needs no locking.

pub(crate) mod event_loop;
pub(crate) mod events;

pub use event_loop::{LINE_CAP, LinkRuntime};
pub use events::{
    EventHandle, NetEvent, NetEventChannel, NetEventReceiver, NetEventSender, OwnedHttpEvent,
};
