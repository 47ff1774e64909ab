//! Core MPMC (Multi-Producer Multi-Consumer) buffer primitives.
//!
//! This module contains the fixed-capacity FIFO ring used by
//! [`crate::sync::mpmc`], the blocking channel built on top of it.

pub(crate) mod ring;
