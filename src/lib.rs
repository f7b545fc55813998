// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

mod codec;
mod error;
mod frame;

#[cfg(feature = "std")]
pub mod discovery;
#[cfg(feature = "std")]
pub mod driver;
#[cfg(feature = "serialport")]
pub mod serial;

pub use codec::*;
pub use error::*;
pub use frame::*;
