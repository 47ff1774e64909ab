//! Runtime scaffolding for the producer/consumer driver threads.
//!
//! - `pipeline`: spawns and joins the driver threads around one channel.

pub mod pipeline;
