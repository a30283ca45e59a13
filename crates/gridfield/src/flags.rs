//! Bit-flag sets for loading, compatibility checks, value fetches and status.

use std::ops::{BitAnd, BitOr, BitOrAssign};

macro_rules! flag_set {
    ($(#[$doc:meta])* $name:ident { $($(#[$fdoc:meta])* $flag:ident = $bits:expr),+ $(,)? }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            pub const NONE: Self = Self(0);
            $($(#[$fdoc])* pub const $flag: Self = Self($bits);)+

            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> u32 {
                self.0
            }

            /// True if every bit of `other` is set.
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// True if any bit of `other` is set.
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }
    };
}

flag_set! {
    /// Flags accepted by axis and grid `load` operations.
    LoadFlags {
        /// Force the longitude axis to wrap.
        WRAP = 0x01,
        /// Forbid the longitude axis from wrapping.
        NOWRAP = 0x02,
        /// Fill a dataless load with the fill value.
        PREFILL = 0x04,
    }
}

flag_set! {
    /// Which aspects `compatible` compares.
    CompatFlags {
        HORIZ = 0x01,
        VERT = 0x02,
        TIME = 0x04,
        STRICT = 0x07,
    }
}

flag_set! {
    /// Flags for `gridpoints` fetches.
    FetchFlags {
        /// Read from the local buffer even when distributed.
        LOCAL = 0x01,
        /// Tell the owner this requester is finished after the fetch.
        DONE = 0x02,
    }
}

flag_set! {
    /// Structural status of a grid; empty means the grid is consistent.
    GridStatus {
        /// An axis has no values.
        NO_DIMS = 0x01,
        /// The data buffer length disagrees with the axes.
        GRID_ERR = 0x02,
    }
}

flag_set! {
    /// Completeness of a grid's descriptive metadata.
    MetaStatus {
        /// Quantity or units were never set.
        NO_QUANT = 0x01,
        /// Calendar time label was never set.
        NO_TIME = 0x02,
    }
}
