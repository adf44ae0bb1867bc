// SPDX-License-Identifier: GPL-3.0-only
//! Monitor identification, resolution and open sessions
//!
//! A [`DisplayIdentifier`] names a monitor by some criterion, resolving it
//! yields a [`DisplayRef`], and opening a reference yields a
//! [`DisplayHandle`] through which VCP features are read and written. Each of
//! the three is released independently of the others.
//!
//! The library does not document thread safety across handles that address
//! the same monitor, so none of these types are `Send`.

mod enumerate;
mod handle;
mod identifier;
mod reference;

pub use enumerate::DisplayInfo;
pub use handle::DisplayHandle;
pub use identifier::{Criterion, DisplayIdentifier};
pub use reference::{AsDisplayRef, DisplayRef, DisplayRefToken};
