/// Single-bit access on plain integer masks.
pub trait BitSlice {
    fn bit(&self, idx: usize) -> bool;
}

macro_rules! impl_bit_slice {
    ($($t:ty),*) => {
        $(
            impl BitSlice for $t {
                fn bit(&self, idx: usize) -> bool {
                    assert!(idx < <$t>::BITS as usize, "bit index {} out of range", idx);
                    (*self >> idx) & 1 == 1
                }
            }
        )*
    };
}

impl_bit_slice!(u8, u32);

/// Inclusive bit-range extraction, `sel(hi, lo)` returns `self[hi:lo]`.
pub trait BitField {
    fn sel(&self, hi: usize, lo: usize) -> u64;
}

impl BitField for u64 {
    fn sel(&self, hi: usize, lo: usize) -> u64 {
        assert!(hi >= lo && hi < 64, "bad field [{}:{}]", hi, lo);
        let width = hi - lo + 1;
        let mask = if width == 64 { u64::MAX } else { (1u64 << width) - 1 };
        (*self >> lo) & mask
    }
}

/// Packs a slice of flags into an integer mask, element 0 at bit 0.
pub trait BitMask {
    fn to_u32(&self) -> u32;
}

impl BitMask for [bool] {
    fn to_u32(&self) -> u32 {
        assert!(self.len() <= 32, "mask wider than 32 bits");
        self.iter()
            .enumerate()
            .fold(0u32, |acc, (i, &b)| acc | ((b as u32) << i))
    }
}

/// Mask with the low `n` bits set.
pub fn low_mask(n: usize) -> u32 {
    if n >= 32 {
        u32::MAX
    } else {
        (1u32 << n) - 1
    }
}
