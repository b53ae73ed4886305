//! Conversion between typed values and the byte buffers kept in storage
//! and carried by collective messages.

use crate::error::{PgasError, Result};
use crate::types::DataType;

/// A value that can live in a shared variable.
///
/// Scalars and vectors of scalars are packed little-endian without any
/// framing, so the built-in reducers can combine them element-wise.
pub trait Element: Sized + Send + 'static {
    fn to_bytes(&self) -> Vec<u8>;

    fn from_bytes(bytes: &[u8]) -> Result<Self>;

    /// Element type for the built-in reducers. `None` means only custom
    /// reducers apply.
    fn dtype() -> Option<DataType> {
        None
    }
}

macro_rules! impl_scalar_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                fn to_bytes(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }

                fn from_bytes(bytes: &[u8]) -> Result<Self> {
                    let arr = bytes.try_into().map_err(|_| PgasError::BufferSizeMismatch {
                        expected: std::mem::size_of::<$ty>(),
                        actual: bytes.len(),
                    })?;
                    Ok(<$ty>::from_le_bytes(arr))
                }

                fn dtype() -> Option<DataType> {
                    Some(DataType::$dtype)
                }
            }

            impl Element for Vec<$ty> {
                fn to_bytes(&self) -> Vec<u8> {
                    let mut out = Vec::with_capacity(self.len() * std::mem::size_of::<$ty>());
                    for v in self {
                        out.extend_from_slice(&v.to_le_bytes());
                    }
                    out
                }

                fn from_bytes(bytes: &[u8]) -> Result<Self> {
                    let size = std::mem::size_of::<$ty>();
                    if bytes.len() % size != 0 {
                        return Err(PgasError::BufferSizeMismatch {
                            expected: (bytes.len() / size + 1) * size,
                            actual: bytes.len(),
                        });
                    }
                    bytes
                        .chunks_exact(size)
                        .map(<$ty as Element>::from_bytes)
                        .collect()
                }

                fn dtype() -> Option<DataType> {
                    Some(DataType::$dtype)
                }
            }
        )*
    };
}

impl_scalar_element!(
    i8 => I8,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

impl Element for bool {
    fn to_bytes(&self) -> Vec<u8> {
        vec![u8::from(*self)]
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [0] => Ok(false),
            [1] => Ok(true),
            [b] => Err(PgasError::DecodeFailed(format!("invalid bool byte {b}"))),
            _ => Err(PgasError::BufferSizeMismatch {
                expected: 1,
                actual: bytes.len(),
            }),
        }
    }
}

impl Element for String {
    fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        String::from_utf8(bytes.to_vec()).map_err(|e| PgasError::DecodeFailed(e.to_string()))
    }
}
