// SPDX-License-Identifier: GPL-3.0-only

//! Production collaborators for the unlockd control core
//!
//! [`UdisksSource`] resolves the currently attached disks and partitions
//! through UDisks2 and turns ObjectManager signals into device hot-plug
//! events. [`SysfsFlagStore`] reads and writes the vendor write-protection
//! attribute under /sys/block.

mod bytestring;
pub mod source;
pub mod sysfs;

pub use source::UdisksSource;
pub use sysfs::SysfsFlagStore;
