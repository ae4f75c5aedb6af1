use crate::MAX_PARTS;

/// Byte range of one planned part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartSpec {
    /// 1-based part number.
    pub number: u32,
    pub offset: u64,
    pub size: u64,
}

impl PartSpec {
    /// Offset one past the last byte of this part.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Part size to use for a source of `total` bytes.
///
/// Grows past `part_size` only when the source would otherwise need more than
/// [`MAX_PARTS`] parts.
pub fn effective_part_size(total: u64, part_size: u64) -> u64 {
    part_size.max(1).max(total.div_ceil(MAX_PARTS))
}

/// Splits `total` bytes into contiguous parts of `part_size` bytes.
///
/// The last part holds the remainder. An empty source still yields one empty
/// part, since a multipart upload cannot be completed without parts.
pub fn plan_parts(total: u64, part_size: u64) -> Vec<PartSpec> {
    if total == 0 {
        return vec![PartSpec {
            number: 1,
            offset: 0,
            size: 0,
        }];
    }

    let part_size = effective_part_size(total, part_size);
    let count = total.div_ceil(part_size);
    (0..count)
        .map(|i| {
            let offset = i * part_size;
            PartSpec {
                // Bounded by MAX_PARTS.
                number: (i + 1) as u32,
                offset,
                size: part_size.min(total - offset),
            }
        })
        .collect()
}
