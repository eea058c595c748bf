//! Fixed-width values that can travel through the log.
//!
//! The codec never looks at what a value means, only at how many bytes
//! it occupies. Everything is little-endian.

use retrace_core::Uid;

/// A plain fixed-width value: the atomic unit of the log.
pub trait Event: Copy {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Write the encoding into `out[..WIDTH]`.
    fn write_le(self, out: &mut [u8]);

    /// Decode from `bytes[..WIDTH]`.
    ///
    /// Returns `None` if the bytes are too short or are not a valid
    /// encoding of `Self`.
    fn read_le(bytes: &[u8]) -> Option<Self>;
}

macro_rules! impl_event_for_primitive {
    ($($t:ty),* $(,)?) => {$(
        impl Event for $t {
            const WIDTH: usize = std::mem::size_of::<$t>();

            #[inline]
            fn write_le(self, out: &mut [u8]) {
                out[..Self::WIDTH].copy_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn read_le(bytes: &[u8]) -> Option<Self> {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes.get(..Self::WIDTH)?);
                Some(<$t>::from_le_bytes(raw))
            }
        }
    )*};
}

impl_event_for_primitive!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64);

impl Event for bool {
    const WIDTH: usize = 1;

    #[inline]
    fn write_le(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }

    #[inline]
    fn read_le(bytes: &[u8]) -> Option<Self> {
        match bytes.first()? {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }
    }
}

impl Event for Uid {
    const WIDTH: usize = 8;

    #[inline]
    fn write_le(self, out: &mut [u8]) {
        self.0.write_le(out);
    }

    #[inline]
    fn read_le(bytes: &[u8]) -> Option<Self> {
        u64::read_le(bytes).map(Uid)
    }
}
