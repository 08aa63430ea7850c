use crate::error::MemoryError;
use crate::instance::SharedStore;
use crate::types::MemoryType;
use std::marker::PhantomData;

/// Size of a WebAssembly page in bytes.
pub const PAGE_SIZE: usize = 65536;

/// An exported linear memory.
#[derive(Clone)]
pub struct Memory {
    memory: wasmtime::Memory,
    ty: MemoryType,
    store: SharedStore,
}

impl Memory {
    pub(crate) fn new(memory: wasmtime::Memory, ty: MemoryType, store: SharedStore) -> Self {
        Self { memory, ty, store }
    }

    /// The declared type; growth does not change it.
    pub fn ty(&self) -> MemoryType {
        self.ty
    }

    /// Current size in pages.
    pub fn size(&self) -> Result<u64, MemoryError> {
        let store = self.store.lock()?;
        Ok(self.memory.size(&*store))
    }

    /// Current size in bytes.
    pub fn data_size(&self) -> Result<usize, MemoryError> {
        let store = self.store.lock()?;
        Ok(self.memory.data_size(&*store))
    }

    /// Grows the memory by `delta` pages and returns the previous size in pages.
    pub fn grow(&self, delta: u64) -> Result<u64, MemoryError> {
        let mut store = self.store.lock()?;
        self.memory
            .grow(&mut *store, delta)
            .map_err(|e| MemoryError::Grow {
                delta,
                message: e.to_string(),
            })
    }

    pub fn read(&self, offset: usize, buffer: &mut [u8]) -> Result<(), MemoryError> {
        let store = self.store.lock()?;
        self.memory
            .read(&*store, offset, buffer)
            .map_err(|_| MemoryError::OutOfBounds {
                offset,
                len: buffer.len(),
            })
    }

    pub fn write(&self, offset: usize, data: &[u8]) -> Result<(), MemoryError> {
        let mut store = self.store.lock()?;
        self.memory
            .write(&mut *store, offset, data)
            .map_err(|_| MemoryError::OutOfBounds {
                offset,
                len: data.len(),
            })
    }

    /// A view of the memory as `T` elements starting at byte `offset`.
    pub fn view<T: ViewElement>(&self, offset: usize) -> MemoryView<T> {
        MemoryView {
            memory: self.clone(),
            offset,
            _marker: PhantomData,
        }
    }

    pub fn uint8_view(&self, offset: usize) -> Uint8Array {
        self.view(offset)
    }

    pub fn int8_view(&self, offset: usize) -> Int8Array {
        self.view(offset)
    }

    pub fn uint16_view(&self, offset: usize) -> Uint16Array {
        self.view(offset)
    }

    pub fn int16_view(&self, offset: usize) -> Int16Array {
        self.view(offset)
    }

    pub fn uint32_view(&self, offset: usize) -> Uint32Array {
        self.view(offset)
    }

    pub fn int32_view(&self, offset: usize) -> Int32Array {
        self.view(offset)
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory").field("ty", &self.ty).finish_non_exhaustive()
    }
}

/// An integer type that can be read from and written to memory.
pub trait ViewElement: Copy {
    const BYTES_PER_ELEMENT: usize;

    fn read_le(bytes: &[u8]) -> Self;

    fn write_le(self, out: &mut [u8]);
}

macro_rules! view_element {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ViewElement for $ty {
                const BYTES_PER_ELEMENT: usize = std::mem::size_of::<$ty>();

                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(buf)
                }

                fn write_le(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

view_element!(u8, i8, u16, i16, u32, i32);

/// A typed window over a memory. Indexes are in elements, not bytes.
///
/// The view reads the memory live, so it sees growth and guest writes.
#[derive(Clone)]
pub struct MemoryView<T> {
    memory: Memory,
    offset: usize,
    _marker: PhantomData<T>,
}

pub type Uint8Array = MemoryView<u8>;
pub type Int8Array = MemoryView<i8>;
pub type Uint16Array = MemoryView<u16>;
pub type Int16Array = MemoryView<i16>;
pub type Uint32Array = MemoryView<u32>;
pub type Int32Array = MemoryView<i32>;

impl<T: ViewElement> MemoryView<T> {
    pub const BYTES_PER_ELEMENT: usize = T::BYTES_PER_ELEMENT;

    /// Number of whole elements between the offset and the end of memory.
    pub fn len(&self) -> Result<usize, MemoryError> {
        Ok(self.memory.data_size()?.saturating_sub(self.offset) / T::BYTES_PER_ELEMENT)
    }

    pub fn is_empty(&self) -> Result<bool, MemoryError> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, index: usize) -> Result<T, MemoryError> {
        let start = self.byte_offset(index)?;
        let mut buf = vec![0u8; T::BYTES_PER_ELEMENT];
        self.memory.read(start, &mut buf)?;
        Ok(T::read_le(&buf))
    }

    pub fn set(&self, index: usize, value: T) -> Result<(), MemoryError> {
        let start = self.byte_offset(index)?;
        let mut buf = vec![0u8; T::BYTES_PER_ELEMENT];
        value.write_le(&mut buf);
        self.memory.write(start, &buf)
    }

    /// Copies every element of the view out of memory.
    pub fn to_vec(&self) -> Result<Vec<T>, MemoryError> {
        let store = self.memory.store.lock()?;
        let data = self.memory.memory.data(&*store);
        Ok(data
            .get(self.offset..)
            .unwrap_or_default()
            .chunks_exact(T::BYTES_PER_ELEMENT)
            .map(T::read_le)
            .collect())
    }

    fn byte_offset(&self, index: usize) -> Result<usize, MemoryError> {
        index
            .checked_mul(T::BYTES_PER_ELEMENT)
            .and_then(|bytes| bytes.checked_add(self.offset))
            .ok_or(MemoryError::OutOfBounds {
                offset: self.offset,
                len: T::BYTES_PER_ELEMENT,
            })
    }
}
