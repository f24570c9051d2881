// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A macro to define compact flag sets (tile orientation, texture usage...).

/// Declares a `Copy` flag-set newtype over an unsigned integer.
///
/// The generated type offers `EMPTY`, `bits`, `from_bits_truncate`, `contains`,
/// `intersects`, `insert`, `remove`, `with`, `without` and the usual bitwise
/// operators. Unknown bits are preserved so flags read from disk round-trip.
#[macro_export]
#[doc(hidden)]
macro_rules! umbra_bitflags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag_name:ident = $flag_value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            /// An empty set of flags.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*

            /// Creates a flag set from raw bits, keeping unknown bits.
            pub const fn from_bits_truncate(bits: $ty) -> Self {
                Self { bits }
            }

            /// Returns the raw value of the flag set.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// Returns `true` if no flag is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// Returns `true` if all flags in `other` are set in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Returns `true` if any flag in `other` is set in `self`.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Sets the flags in `other`.
            pub fn insert(&mut self, other: Self) {
                self.bits |= other.bits;
            }

            /// Clears the flags in `other`.
            pub fn remove(&mut self, other: Self) {
                self.bits &= !other.bits;
            }

            /// Returns a copy with `other` set.
            #[must_use]
            pub const fn with(mut self, other: Self) -> Self {
                self.bits |= other.bits;
                self
            }

            /// Returns a copy with `other` cleared.
            #[must_use]
            pub const fn without(mut self, other: Self) -> Self {
                self.bits &= !other.bits;
                self
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }
        }

        impl core::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, other: Self) -> Self {
                Self { bits: self.bits & other.bits }
            }
        }

        impl core::ops::BitXor for $name {
            type Output = Self;
            fn bitxor(self, other: Self) -> Self {
                Self { bits: self.bits ^ other.bits }
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, other: Self) {
                self.bits |= other.bits;
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut rest = self.bits;
                let mut first = true;
                write!(f, "{}(", stringify!($name))?;
                $(
                    if ($flag_value != 0) && (rest & $flag_value) == $flag_value {
                        if !first {
                            write!(f, " | ")?;
                        }
                        write!(f, "{}", stringify!($flag_name))?;
                        rest &= !$flag_value;
                        first = false;
                    }
                )*
                if rest != 0 {
                    if !first {
                        write!(f, " | ")?;
                    }
                    write!(f, "{:#x}", rest)?;
                    first = false;
                }
                if first {
                    write!(f, "EMPTY")?;
                }
                write!(f, ")")
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::umbra_bitflags;

    umbra_bitflags! {
        /// Orientation flags used to exercise the macro.
        pub struct Orientation: u8 {
            const ROTATE_90 = 1 << 0;
            const ROTATE_180 = 1 << 1;
            const FLIP_X = 1 << 2;
            const FLIP_Y = 1 << 3;
        }
    }

    #[test]
    fn empty_by_default() {
        let flags = Orientation::default();
        assert!(flags.is_empty());
        assert!(flags.contains(Orientation::EMPTY));
        assert_eq!(format!("{flags:?}"), "Orientation(EMPTY)");
    }

    #[test]
    fn insert_remove_and_contains() {
        let mut flags = Orientation::ROTATE_90 | Orientation::FLIP_Y;
        assert!(flags.contains(Orientation::ROTATE_90));
        assert!(!flags.contains(Orientation::FLIP_X));
        assert!(flags.intersects(Orientation::FLIP_X | Orientation::FLIP_Y));

        flags.remove(Orientation::ROTATE_90);
        flags.insert(Orientation::ROTATE_180);
        assert_eq!(flags, Orientation::ROTATE_180 | Orientation::FLIP_Y);
        assert_eq!(format!("{flags:?}"), "Orientation(ROTATE_180 | FLIP_Y)");
    }

    #[test]
    fn unknown_bits_survive_round_trip() {
        let flags = Orientation::from_bits_truncate(0b1_0001);
        assert_eq!(flags.bits(), 0b1_0001);
        assert_eq!(format!("{flags:?}"), "Orientation(ROTATE_90 | 0x10)");
        assert_eq!(flags.without(Orientation::ROTATE_90).bits(), 0b1_0000);
    }
}
