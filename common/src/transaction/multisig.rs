use serde::{Deserialize, Serialize};

use crate::{
    config::MAX_MULTISIG_PARTICIPANTS,
    crypto::Signature,
    serializer::{Reader, ReaderError, Serializer, Writer},
};

/// Fixed-length bitmap, one bit per configured multisig sub-key. Wire-only
/// representation; bit i set means sub-key i contributed a signature.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BitArray {
    bits: usize,
    #[serde(with = "hex::serde")]
    bytes: Vec<u8>,
}

impl BitArray {
    pub fn new(bits: usize) -> Self {
        BitArray {
            bits,
            bytes: vec![0; bits.div_ceil(8)],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bits
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn get(&self, index: usize) -> bool {
        if index >= self.bits {
            return false;
        }
        self.bytes[index / 8] & (1 << (index % 8)) != 0
    }

    pub fn set(&mut self, index: usize) {
        if index < self.bits {
            self.bytes[index / 8] |= 1 << (index % 8);
        }
    }

    pub fn count_ones(&self) -> usize {
        self.bytes.iter().map(|byte| byte.count_ones() as usize).sum()
    }
}

impl Serializer for BitArray {
    fn write(&self, writer: &mut Writer) {
        writer.write_u16(self.bits as u16);
        writer.write_bytes(&self.bytes);
    }

    fn read(reader: &mut Reader) -> Result<BitArray, ReaderError> {
        let bits = reader.read_u16()? as usize;
        if bits == 0 || bits > MAX_MULTISIG_PARTICIPANTS {
            return Err(ReaderError::InvalidSize);
        }
        let bytes = reader.read_bytes(bits.div_ceil(8))?.to_vec();
        // Bits past `bits` must be zero so every bitmap has one encoding
        if bits % 8 != 0 {
            let last = bytes[bytes.len() - 1];
            if last >> (bits % 8) != 0 {
                return Err(ReaderError::InvalidValue);
            }
        }
        Ok(BitArray { bits, bytes })
    }

    fn size(&self) -> usize {
        2 + self.bytes.len()
    }
}

/// Threshold signature set in its internal form: one optional signature per
/// configured sub-key, indexed by sub-key position. The sparse bitmap plus
/// dense signature list exists only on the wire; decoding normalizes into
/// this positional layout.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MultiSigData {
    signatures: Vec<Option<Signature>>,
}

impl MultiSigData {
    pub fn new(signatures: Vec<Option<Signature>>) -> Self {
        MultiSigData { signatures }
    }

    /// Rebuild the positional form from the wire encoding. The bitmap
    /// population must equal the dense list length exactly.
    pub fn from_wire(bitarray: &BitArray, dense: Vec<Signature>) -> Result<Self, ReaderError> {
        let population = bitarray.count_ones();
        if population != dense.len() {
            return Err(ReaderError::MultisigBitmapMismatch {
                population,
                signatures: dense.len(),
            });
        }
        let mut signatures = vec![None; bitarray.len()];
        let mut cursor = dense.into_iter();
        for (index, slot) in signatures.iter_mut().enumerate() {
            if bitarray.get(index) {
                // cursor length was checked against the population above
                *slot = cursor.next();
            }
        }
        Ok(MultiSigData { signatures })
    }

    pub fn to_wire(&self) -> (BitArray, Vec<Signature>) {
        let mut bitarray = BitArray::new(self.signatures.len());
        let mut dense = Vec::with_capacity(self.count());
        for (index, slot) in self.signatures.iter().enumerate() {
            if let Some(signature) = slot {
                bitarray.set(index);
                dense.push(signature.clone());
            }
        }
        (bitarray, dense)
    }

    /// Number of configured sub-key positions.
    #[inline]
    pub fn positions(&self) -> usize {
        self.signatures.len()
    }

    /// Number of sub-signatures actually present.
    pub fn count(&self) -> usize {
        self.signatures.iter().filter(|slot| slot.is_some()).count()
    }

    /// Iterate present sub-signatures with their sub-key position.
    pub fn iter_set(&self) -> impl Iterator<Item = (usize, &Signature)> {
        self.signatures
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|sig| (index, sig)))
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Signature> {
        self.signatures.get(index).and_then(Option::as_ref)
    }
}

impl Serializer for MultiSigData {
    fn write(&self, writer: &mut Writer) {
        let (bitarray, dense) = self.to_wire();
        bitarray.write(writer);
        writer.write_u8(dense.len() as u8);
        for signature in &dense {
            signature.write(writer);
        }
    }

    fn read(reader: &mut Reader) -> Result<MultiSigData, ReaderError> {
        let bitarray = BitArray::read(reader)?;
        let count = reader.read_u8()? as usize;
        let mut dense = Vec::with_capacity(count);
        for _ in 0..count {
            dense.push(Signature::read(reader)?);
        }
        MultiSigData::from_wire(&bitarray, dense)
    }
}
