use gto_core::*;
use gto_kernel::InfoSetKey;
use gto_kernel::InfoSetNode;
use std::collections::BTreeMap;

use crate::Variant;

/// Version stamp leading every checkpoint blob.
pub const CHECKPOINT_SCHEMA: u32 = 1;

/// A frozen copy of one simulation's solver state.
///
/// Binary layout, little-endian throughout:
/// header `{schema: u32, iteration: u32, variant_tag: u8, node_count: u64}`,
/// then per node `{key_len: u32, key_bytes, arity: u32, regret_sum: f64[],
/// strategy_sum: f64[]}`, then a trailer `{len: u32, bytes}` carrying the
/// sampling seed for Monte Carlo variants and nothing otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub iteration: Epoch,
    pub variant: Variant,
    pub nodes: BTreeMap<InfoSetKey, InfoSetNode>,
    pub rng_seed: Option<u64>,
}

impl Checkpoint {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(CHECKPOINT_SCHEMA.to_le_bytes());
        out.extend(self.iteration.to_le_bytes());
        out.push(self.variant.tag());
        out.extend((self.nodes.len() as u64).to_le_bytes());
        for (key, node) in self.nodes.iter() {
            let key_bytes = key.to_bytes();
            out.extend((key_bytes.len() as u32).to_le_bytes());
            out.extend(key_bytes);
            out.extend((node.arity() as u32).to_le_bytes());
            for r in node.regret_sum.iter() {
                out.extend(r.to_le_bytes());
            }
            for w in node.strategy_sum.iter() {
                out.extend(w.to_le_bytes());
            }
        }
        match self.rng_seed {
            Some(seed) => {
                out.extend(8u32.to_le_bytes());
                out.extend(seed.to_le_bytes());
            }
            None => out.extend(0u32.to_le_bytes()),
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(bytes);
        let schema = r.u32()?;
        if schema != CHECKPOINT_SCHEMA {
            return Err(CodecError::Schema(schema));
        }
        let iteration = r.u32()?;
        let tag = r.u8()?;
        let variant = Variant::from_tag(tag).ok_or(CodecError::VariantTag(tag))?;
        let count = r.u64()?;
        let mut nodes = BTreeMap::new();
        for _ in 0..count {
            let key_len = r.u32()? as usize;
            let key = InfoSetKey::from_bytes(r.take(key_len)?)
                .map_err(|e| CodecError::Key(e.to_string()))?;
            let arity = r.u32()? as usize;
            let mut node = InfoSetNode::new(arity);
            for i in 0..arity {
                node.regret_sum[i] = r.f64()?;
            }
            for i in 0..arity {
                node.strategy_sum[i] = r.f64()?;
            }
            nodes.insert(key, node);
        }
        let trailer_len = r.u32()? as usize;
        let rng_seed = match trailer_len {
            0 => None,
            8 => Some(u64::from_le_bytes(
                r.take(8)?.try_into().expect("eight bytes"),
            )),
            n => return Err(CodecError::Trailer(n)),
        };
        Ok(Self {
            iteration,
            variant,
            nodes,
            rng_seed,
        })
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CodecError {
    #[error("unsupported checkpoint schema {0}")]
    Schema(u32),
    #[error("unknown variant tag {0}")]
    VariantTag(u8),
    #[error("malformed checkpoint key: {0}")]
    Key(String),
    #[error("unexpected trailer length {0}")]
    Trailer(usize),
    #[error("truncated checkpoint at byte {0}")]
    Truncated(usize),
}

struct Reader<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, at: 0 }
    }
    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        match self.bytes.get(self.at..self.at + n) {
            Some(slice) => {
                self.at += n;
                Ok(slice)
            }
            None => Err(CodecError::Truncated(self.at)),
        }
    }
    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }
    fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().expect("four bytes")))
    }
    fn u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().expect("eight bytes")))
    }
    fn f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().expect("eight bytes")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gto_cards::Street;

    fn checkpoint() -> Checkpoint {
        let mut nodes = BTreeMap::new();
        for bucket in 0..20u16 {
            let key = InfoSetKey::new(
                (bucket % 2) as usize,
                Street::Pref,
                0,
                format!("C500.R{}", bucket),
                bucket,
            );
            let mut node = InfoSetNode::new(3);
            node.accumulate(
                &[bucket as f64, -1.5, 0.25],
                &[0.1 * bucket as f64, 1.0, 2.0],
            )
            .unwrap();
            nodes.insert(key, node);
        }
        Checkpoint {
            iteration: 50,
            variant: Variant::ChanceSampling,
            nodes,
            rng_seed: Some(0xDEADBEEF),
        }
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let original = checkpoint();
        let bytes = original.encode();
        let decoded = Checkpoint::decode(&bytes).unwrap();
        assert_eq!(original, decoded);
        assert_eq!(bytes, decoded.encode());
    }

    #[test]
    fn vanilla_omits_the_trailer_seed() {
        let mut cp = checkpoint();
        cp.variant = Variant::Vanilla;
        cp.rng_seed = None;
        let decoded = Checkpoint::decode(&cp.encode()).unwrap();
        assert_eq!(decoded.rng_seed, None);
    }

    #[test]
    fn header_begins_with_the_schema_version() {
        let bytes = checkpoint().encode();
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 50);
        assert_eq!(bytes[8], Variant::ChanceSampling.tag());
    }

    #[test]
    fn rejects_bad_schema_and_truncation() {
        let mut bytes = checkpoint().encode();
        assert!(matches!(
            Checkpoint::decode(&bytes[..bytes.len() - 4]),
            Err(CodecError::Truncated(_))
        ));
        bytes[0] = 99;
        assert!(matches!(
            Checkpoint::decode(&bytes),
            Err(CodecError::Schema(99))
        ));
    }
}
