//! In-process engine tests. Everything runs against the in-memory
//! state backend and a static membership fixture, so no MongoDB or
//! Redis instance is needed.

pub mod fixtures;

#[cfg(test)]
mod code_editor_tests;
#[cfg(test)]
mod presence_tests;
#[cfg(test)]
mod registry_tests;
#[cfg(test)]
mod video_tests;
#[cfg(test)]
mod whiteboard_tests;
