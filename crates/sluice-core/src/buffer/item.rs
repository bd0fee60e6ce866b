//! Typed views over raw item bytes.
//!
//! Buffers store items as native-endian bytes. [`Item`] converts between those
//! bytes and plain numeric samples so blocks never need pointer casts.

/// A fixed-size, plain-old-data stream item.
pub trait Item: Copy + Default + Send + 'static {
    /// Size of one item in bytes.
    const SIZE: usize;

    /// Decodes one item from the first [`SIZE`](Self::SIZE) bytes of `bytes`.
    fn read_from(bytes: &[u8]) -> Self;

    /// Encodes this item into the first [`SIZE`](Self::SIZE) bytes of `bytes`.
    fn write_to(self, bytes: &mut [u8]);
}

macro_rules! impl_item {
    ($($t:ty),* $(,)?) => {
        $(
            impl Item for $t {
                const SIZE: usize = core::mem::size_of::<$t>();

                #[inline]
                fn read_from(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; core::mem::size_of::<$t>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$t>::from_ne_bytes(raw)
                }

                #[inline]
                fn write_to(self, bytes: &mut [u8]) {
                    bytes[..Self::SIZE].copy_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_item!(u8, i8, i16, u16, i32, u32, i64, u64, f32, f64);

/// Decodes every whole item in `bytes`.
pub fn decode_items<T: Item>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(T::SIZE).map(T::read_from).collect()
}

/// Encodes `items` into the front of `bytes`. Returns the number of items written,
/// which is limited by the space in `bytes`.
pub fn encode_items<T: Item>(items: &[T], bytes: &mut [u8]) -> usize {
    let mut written = 0;
    for (item, chunk) in items.iter().zip(bytes.chunks_exact_mut(T::SIZE)) {
        item.write_to(chunk);
        written += 1;
    }
    written
}
