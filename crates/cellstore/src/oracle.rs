use std::num::NonZeroU32;

/// Maps a cell id to the partition that owns it.
///
/// Must be a pure function for at least the duration of one image save.
pub trait PartitionOracle: Send + Sync {
    fn partition_of(&self, id: i64) -> u32;
}

impl<F> PartitionOracle for F
where
    F: Fn(i64) -> u32 + Send + Sync,
{
    fn partition_of(&self, id: i64) -> u32 {
        self(id)
    }
}

/// Assigns ids to `partitions` buckets by Euclidean remainder, so negative
/// ids land in `0..partitions` as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuloPartitioner {
    partitions: NonZeroU32,
}

impl ModuloPartitioner {
    pub fn new(partitions: NonZeroU32) -> Self {
        Self { partitions }
    }

    /// Everything in partition 0.
    pub fn single() -> Self {
        Self::new(NonZeroU32::MIN)
    }

    pub fn partitions(&self) -> u32 {
        self.partitions.get()
    }
}

impl PartitionOracle for ModuloPartitioner {
    fn partition_of(&self, id: i64) -> u32 {
        id.rem_euclid(i64::from(self.partitions.get())) as u32
    }
}
