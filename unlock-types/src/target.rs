//! Storage target identity
//!
//! A `BlockTarget` names either a whole disk or one numbered partition of a
//! disk. It is the key under which control endpoints are registered and the
//! identity the flag store dispatches on.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a write-protection target: a whole disk or one of its
/// partitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockTarget {
    /// A whole block device (e.g. "sda", "nvme0n1")
    Disk {
        /// Kernel disk name without the /dev prefix
        disk: String,
    },

    /// A numbered partition of a disk
    Partition {
        /// Kernel name of the parent disk
        disk: String,

        /// Partition number (1-based)
        number: u32,
    },
}

impl BlockTarget {
    /// Target for a whole disk.
    pub fn disk(disk: impl Into<String>) -> Self {
        Self::Disk { disk: disk.into() }
    }

    /// Target for partition `number` of `disk`.
    pub fn partition(disk: impl Into<String>, number: u32) -> Self {
        Self::Partition {
            disk: disk.into(),
            number,
        }
    }

    /// Name of the disk this target lives on (the disk itself, or the parent
    /// disk of a partition).
    pub fn disk_name(&self) -> &str {
        match self {
            Self::Disk { disk } | Self::Partition { disk, .. } => disk,
        }
    }

    /// Partition number, present iff this target is a partition.
    pub fn partition_number(&self) -> Option<u32> {
        match self {
            Self::Disk { .. } => None,
            Self::Partition { number, .. } => Some(*number),
        }
    }

    pub fn is_partition(&self) -> bool {
        matches!(self, Self::Partition { .. })
    }

    /// Kernel device node name: "sda" for a disk, "sda1" for its first
    /// partition. Disks whose name ends in a digit take a `p` separator
    /// ("nvme0n1p2", "mmcblk0p3").
    pub fn node_name(&self) -> String {
        match self {
            Self::Disk { disk } => disk.clone(),
            Self::Partition { disk, number } => {
                if disk.ends_with(|c: char| c.is_ascii_digit()) {
                    format!("{disk}p{number}")
                } else {
                    format!("{disk}{number}")
                }
            }
        }
    }

    /// Resolve a kernel device node name back into a target.
    ///
    /// `<base-ending-in-digit>p<digits>` is a partition of `<base>`, as is
    /// `sd|vd|xvd|hd<letters><digits>`. Every other name is a whole disk;
    /// the mapping is total.
    pub fn from_node_name(name: &str) -> Self {
        if let Some((base, digits)) = name.rsplit_once('p')
            && base.ends_with(|c: char| c.is_ascii_digit())
            && !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
            && let Ok(number) = digits.parse()
        {
            return Self::partition(base, number);
        }

        let digits_at = name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        let (base, digits) = name.split_at(digits_at);
        if !digits.is_empty()
            && is_lettered_disk_name(base)
            && let Ok(number) = digits.parse()
        {
            return Self::partition(base, number);
        }

        Self::disk(name)
    }
}

impl fmt::Display for BlockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.node_name())
    }
}

/// Disk names of the `sda`/`vdb` family, whose partitions are suffixed
/// without a separator.
fn is_lettered_disk_name(base: &str) -> bool {
    for prefix in ["xvd", "sd", "vd", "hd"] {
        if let Some(rest) = base.strip_prefix(prefix) {
            return !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_lowercase());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_name_uses_p_separator_after_trailing_digit() {
        assert_eq!(BlockTarget::disk("sda").node_name(), "sda");
        assert_eq!(BlockTarget::partition("sda", 1).node_name(), "sda1");
        assert_eq!(BlockTarget::partition("nvme0n1", 2).node_name(), "nvme0n1p2");
        assert_eq!(BlockTarget::partition("mmcblk0", 3).node_name(), "mmcblk0p3");
    }

    #[test]
    fn from_node_name_resolves_partitions() {
        assert_eq!(
            BlockTarget::from_node_name("sda1"),
            BlockTarget::partition("sda", 1)
        );
        assert_eq!(
            BlockTarget::from_node_name("nvme0n1p2"),
            BlockTarget::partition("nvme0n1", 2)
        );
        assert_eq!(
            BlockTarget::from_node_name("mmcblk0p12"),
            BlockTarget::partition("mmcblk0", 12)
        );
        assert_eq!(
            BlockTarget::from_node_name("xvda3"),
            BlockTarget::partition("xvda", 3)
        );
    }

    #[test]
    fn from_node_name_resolves_disks() {
        assert_eq!(BlockTarget::from_node_name("sda"), BlockTarget::disk("sda"));
        assert_eq!(
            BlockTarget::from_node_name("nvme0n1"),
            BlockTarget::disk("nvme0n1")
        );
        assert_eq!(
            BlockTarget::from_node_name("loop0"),
            BlockTarget::disk("loop0")
        );
        assert_eq!(
            BlockTarget::from_node_name("md127"),
            BlockTarget::disk("md127")
        );
        assert_eq!(
            BlockTarget::from_node_name("dm-0"),
            BlockTarget::disk("dm-0")
        );
    }

    #[test]
    fn node_name_roundtrips_through_resolver() {
        for target in [
            BlockTarget::disk("sda"),
            BlockTarget::partition("sdb", 9),
            BlockTarget::disk("nvme0n1"),
            BlockTarget::partition("nvme0n1", 2),
            BlockTarget::partition("loop0", 1),
        ] {
            assert_eq!(BlockTarget::from_node_name(&target.node_name()), target);
        }
    }

    #[test]
    fn target_serde_roundtrips() {
        let target = BlockTarget::partition("sda", 1);
        let json = serde_json::to_string(&target).expect("serialize target");
        let parsed: BlockTarget = serde_json::from_str(&json).expect("deserialize target");
        assert_eq!(parsed, target);
    }
}
