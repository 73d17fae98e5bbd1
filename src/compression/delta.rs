use crate::compression::vbyte::VByteEncoder;
use crate::core::error::Result;

/// Delta + varint encoding for a strictly increasing run of `u32`s:
/// segment-local document ordinals, or a posting's token positions. Both
/// are strictly increasing by construction, so every delta is
/// representable as a non-negative varint.
pub struct DeltaEncoder;

impl DeltaEncoder {
    pub fn encode(nums: &[u32]) -> Vec<u8> {
        let mut deltas = Vec::with_capacity(nums.len());
        let mut prev = 0u32;
        for &n in nums {
            deltas.push(n - prev);
            prev = n;
        }
        VByteEncoder::encode_u32_list(&deltas)
    }

    pub fn decode(data: &[u8]) -> Result<Vec<u32>> {
        let deltas = VByteEncoder::decode_u32_list(data)?;
        let mut nums = Vec::with_capacity(deltas.len());
        let mut running = 0u32;
        for d in deltas {
            running += d;
            nums.push(running);
        }
        Ok(nums)
    }
}
