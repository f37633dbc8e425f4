// This module provides the stream side of the thread binding. StreamBinding is what the
// replacement engine consumes for one declared stream: a base address and one extent per
// dimension. ThreadBinding collects a worker thread's stream bindings together with its
// thread/group metadata, iteration count and per-iteration byte volume. StreamBuffer is
// a single generic allocator for stream storage parameterized by the element DataType: it
// allocates a 64-byte aligned buffer sized from the element size and the extents (sizes
// that overflow are an error), and initializes or reads elements through one codec per
// element type instead of one duplicated code path per element type.

//! Stream bindings and generic stream buffers.

use crate::core::error::ConfigError;
use crate::core::template::DataType;

/// Alignment of every stream buffer, one cache line.
pub const STREAM_ALIGNMENT: usize = 64;

/// Concrete location and shape of one stream for one thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamBinding {
    pub pointer: usize,
    /// Element count per dimension, in declaration order.
    pub extents: Vec<u64>,
}

impl StreamBinding {
    pub fn new(pointer: usize, extents: &[u64]) -> Self {
        Self {
            pointer,
            extents: extents.to_vec(),
        }
    }
}

/// Everything a worker thread contributes to its specialized routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadBinding {
    pub thread_id: usize,
    pub group_id: usize,
    pub num_threads: usize,
    pub iterations: u64,
    pub bytes_per_iteration: u64,
    pub streams: Vec<StreamBinding>,
}

impl ThreadBinding {
    /// Binding for a single-thread group with one iteration.
    pub fn new(thread_id: usize, streams: Vec<StreamBinding>) -> Self {
        Self {
            thread_id,
            group_id: 0,
            num_threads: 1,
            iterations: 1,
            bytes_per_iteration: 0,
            streams,
        }
    }

    pub fn with_group(mut self, group_id: usize, num_threads: usize) -> Self {
        self.group_id = group_id;
        self.num_threads = num_threads;
        self
    }

    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_bytes_per_iteration(mut self, bytes: u64) -> Self {
        self.bytes_per_iteration = bytes;
        self
    }
}

/// Per-type element access.
struct ElementCodec {
    write: fn(&mut [u8], f64),
    read: fn(&[u8]) -> f64,
}

macro_rules! codec {
    ($ty:ty) => {
        ElementCodec {
            write: |slot, value| slot.copy_from_slice(&(value as $ty).to_ne_bytes()),
            read: |slot| {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(slot);
                <$ty>::from_ne_bytes(raw) as f64
            },
        }
    };
}

static INT: ElementCodec = codec!(i32);
static INT64: ElementCodec = codec!(i64);
static FLOAT: ElementCodec = codec!(f32);
static DOUBLE: ElementCodec = codec!(f64);

fn codec(dtype: DataType) -> &'static ElementCodec {
    match dtype {
        DataType::Int => &INT,
        DataType::Int64 => &INT64,
        DataType::Float => &FLOAT,
        DataType::Double => &DOUBLE,
    }
}

/// Aligned storage for one stream.
#[derive(Debug)]
pub struct StreamBuffer {
    storage: Vec<u8>,
    offset: usize,
    len: usize,
    dtype: DataType,
    extents: Vec<u64>,
}

impl StreamBuffer {
    /// Allocate a zeroed buffer of `product(extents)` elements of `dtype`.
    ///
    /// Fails when the byte size does not fit in the address space.
    pub fn allocate(dtype: DataType, extents: &[u64]) -> Result<Self, ConfigError> {
        let too_large = || ConfigError::StreamTooLarge {
            dtype: dtype.name(),
            extents: extents.to_vec(),
        };
        let elements = extents
            .iter()
            .try_fold(1u64, |acc, &e| acc.checked_mul(e))
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(too_large)?;
        let bytes = elements.checked_mul(dtype.size()).ok_or_else(too_large)?;
        let padded = bytes.checked_add(STREAM_ALIGNMENT).ok_or_else(too_large)?;

        let storage = vec![0u8; padded];
        let offset = storage.as_ptr().align_offset(STREAM_ALIGNMENT);
        log::trace!(
            "allocated {} stream of {:?} ({} bytes, offset {})",
            dtype,
            extents,
            bytes,
            offset
        );
        Ok(Self {
            storage,
            offset,
            len: elements,
            dtype,
            extents: extents.to_vec(),
        })
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn extents(&self) -> &[u64] {
        &self.extents
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> &[u8] {
        let size = self.len() * self.dtype.size();
        &self.storage[self.offset..self.offset + size]
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        let size = self.len() * self.dtype.size();
        &mut self.storage[self.offset..self.offset + size]
    }

    /// Set every element to `value`, converted to the element type.
    pub fn fill(&mut self, value: f64) {
        let codec = codec(self.dtype);
        let size = self.dtype.size();
        for slot in self.bytes_mut().chunks_exact_mut(size) {
            (codec.write)(slot, value);
        }
    }

    /// Set element `index` (flat, row-major) to `value`.
    pub fn set(&mut self, index: usize, value: f64) {
        let codec = codec(self.dtype);
        let size = self.dtype.size();
        (codec.write)(&mut self.bytes_mut()[index * size..(index + 1) * size], value);
    }

    /// Read element `index` (flat, row-major) as `f64`.
    pub fn get(&self, index: usize) -> f64 {
        let codec = codec(self.dtype);
        let size = self.dtype.size();
        (codec.read)(&self.bytes()[index * size..(index + 1) * size])
    }

    /// Base address and extents for the replacement engine.
    ///
    /// Routines compiled against this binding write through the address, so
    /// it is taken from a mutable borrow.
    pub fn binding(&mut self) -> StreamBinding {
        let offset = self.offset;
        StreamBinding {
            pointer: self.storage[offset..].as_mut_ptr() as usize,
            extents: self.extents.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_are_aligned() {
        for dtype in [DataType::Int, DataType::Int64, DataType::Float, DataType::Double] {
            let mut buf = StreamBuffer::allocate(dtype, &[3, 5]).unwrap();
            assert_eq!(buf.len(), 15);
            assert_eq!(buf.bytes().len(), 15 * dtype.size());
            assert_eq!(buf.binding().pointer % STREAM_ALIGNMENT, 0);
        }
    }

    #[test]
    fn fill_converts_per_type() {
        let mut ints = StreamBuffer::allocate(DataType::Int, &[4]).unwrap();
        ints.fill(2.75);
        assert_eq!(ints.get(3), 2.0);

        let mut doubles = StreamBuffer::allocate(DataType::Double, &[4]).unwrap();
        doubles.fill(2.75);
        assert_eq!(doubles.get(0), 2.75);
        doubles.set(1, -1.5);
        assert_eq!(doubles.get(1), -1.5);
        assert_eq!(doubles.get(2), 2.75);
    }

    #[test]
    fn each_type_round_trips_its_own_width() {
        for dtype in [DataType::Int, DataType::Int64, DataType::Float, DataType::Double] {
            let mut buf = StreamBuffer::allocate(dtype, &[2]).unwrap();
            buf.set(1, -3.0);
            assert_eq!(buf.get(0), 0.0, "{dtype}");
            assert_eq!(buf.get(1), -3.0, "{dtype}");
        }
    }

    #[test]
    fn oversized_streams_are_rejected() {
        let err = StreamBuffer::allocate(DataType::Double, &[u64::MAX, 2]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::StreamTooLarge {
                dtype: "double",
                extents: vec![u64::MAX, 2],
            }
        );
        assert!(StreamBuffer::allocate(DataType::Double, &[1 << 62]).is_err());
        assert!(StreamBuffer::allocate(DataType::Int, &[0, 7]).unwrap().is_empty());
    }

    #[test]
    fn binding_reports_extents() {
        let mut buf = StreamBuffer::allocate(DataType::Float, &[8, 2]).unwrap();
        let binding = buf.binding();
        assert_eq!(binding.extents, vec![8, 2]);
        assert_eq!(ThreadBinding::new(3, vec![binding]).thread_id, 3);
    }
}
