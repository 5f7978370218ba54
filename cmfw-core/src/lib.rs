//! Board-agnostic core logic for the Command Module firmware
//!
//! This crate contains all sequencing logic that does not depend on a
//! specific microcontroller:
//!
//! - Signal groups (named bundles of pins with polarity and edge policy)
//! - Power domain controller (ordered sequencing, interlocks, read-back)
//! - SM-CM power request handshake and its request mailbox

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod handshake;
pub mod power;
pub mod signal;
