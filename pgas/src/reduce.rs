//! Element-wise reduction primitives behind the built-in reducers.

use crate::error::{PgasError, Result};
use crate::types::{DataType, ReduceOp};

/// Trait for types that support the four reduction operations.
trait Reducible: Copy + 'static {
    fn reduce(a: Self, b: Self, op: ReduceOp) -> Self;
}

macro_rules! impl_reducible {
    (int: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => a.wrapping_add(b),
                        ReduceOp::Prod => a.wrapping_mul(b),
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                    }
                }
            }
        )*
    };
    (float: $($ty:ty),*) => {
        $(
            impl Reducible for $ty {
                #[inline]
                fn reduce(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => a + b,
                        ReduceOp::Prod => a * b,
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                    }
                }
            }
        )*
    };
}

impl_reducible!(int: i8, i32, i64, u8, u32, u64);
impl_reducible!(float: f32, f64);

/// Read a value from a little-endian byte slice (alignment-safe).
trait LeBytes: Sized {
    const SIZE: usize;
    fn read_le(bytes: &[u8]) -> Self;
    fn write_le(self, bytes: &mut [u8]);
}

macro_rules! impl_le_bytes {
    ($($ty:ty),*) => {
        $(
            impl LeBytes for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut arr = [0u8; std::mem::size_of::<$ty>()];
                    arr.copy_from_slice(bytes);
                    Self::from_le_bytes(arr)
                }

                #[inline]
                fn write_le(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_le_bytes!(i8, i32, i64, u8, u32, u64, f32, f64);

/// Element-wise `dst = op(dst, src)` on byte buffers interpreted as `dtype`
/// elements.
///
/// Both buffers must have the same length, and that length must be a
/// multiple of the element size.
pub(crate) fn reduce_bytes(
    dst: &mut [u8],
    src: &[u8],
    dtype: DataType,
    op: ReduceOp,
) -> Result<()> {
    if dst.len() != src.len() {
        return Err(PgasError::BufferSizeMismatch {
            expected: dst.len(),
            actual: src.len(),
        });
    }
    if dst.len() % dtype.size_in_bytes() != 0 {
        return Err(PgasError::BufferSizeMismatch {
            expected: dst.len().next_multiple_of(dtype.size_in_bytes()),
            actual: dst.len(),
        });
    }
    match dtype {
        DataType::F32 => reduce_typed::<f32>(dst, src, op),
        DataType::F64 => reduce_typed::<f64>(dst, src, op),
        DataType::I8 => reduce_typed::<i8>(dst, src, op),
        DataType::I32 => reduce_typed::<i32>(dst, src, op),
        DataType::I64 => reduce_typed::<i64>(dst, src, op),
        DataType::U8 => reduce_typed::<u8>(dst, src, op),
        DataType::U32 => reduce_typed::<u32>(dst, src, op),
        DataType::U64 => reduce_typed::<u64>(dst, src, op),
    }
    Ok(())
}

fn reduce_typed<T: Reducible + LeBytes>(dst: &mut [u8], src: &[u8], op: ReduceOp) {
    for (d, s) in dst.chunks_exact_mut(T::SIZE).zip(src.chunks_exact(T::SIZE)) {
        let r = T::reduce(T::read_le(d), T::read_le(s), op);
        r.write_le(d);
    }
}
