use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderError {
    #[error("Not enough bytes or invalid size")]
    InvalidSize,
    #[error("Invalid value")]
    InvalidValue,
    #[error("Invalid UTF-8 string")]
    InvalidString,
    #[error("Multisig bitmap population {population} does not match signature count {signatures}")]
    MultisigBitmapMismatch { population: usize, signatures: usize },
}

/// Reader to deserialize bytes written by a [`super::Writer`].
pub struct Reader<'a> {
    bytes: &'a [u8],
    total: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, total: 0 }
    }

    pub fn read_u8(&mut self) -> Result<u8, ReaderError> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ReaderError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ReaderError> {
        let bytes: [u8; 4] = self.read_array()?;
        Ok(u32::from_be_bytes(bytes))
    }

    pub fn read_u64(&mut self) -> Result<u64, ReaderError> {
        let bytes: [u8; 8] = self.read_array()?;
        Ok(u64::from_be_bytes(bytes))
    }

    pub fn read_bool(&mut self) -> Result<bool, ReaderError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ReaderError::InvalidValue),
        }
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ReaderError> {
        if self.bytes.len() < n {
            return Err(ReaderError::InvalidSize);
        }
        let (read, rest) = self.bytes.split_at(n);
        self.bytes = rest;
        self.total += n;
        Ok(read)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ReaderError> {
        let bytes = self.read_bytes(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(bytes);
        Ok(array)
    }

    /// Read a length-prefixed (u32) byte slice, bounded by `max` to prevent
    /// allocation attacks on decode.
    pub fn read_var_bytes(&mut self, max: usize) -> Result<Vec<u8>, ReaderError> {
        let len = self.read_u32()? as usize;
        if len > max {
            return Err(ReaderError::InvalidSize);
        }
        Ok(self.read_bytes(len)?.to_vec())
    }

    pub fn read_string(&mut self, max: usize) -> Result<String, ReaderError> {
        let bytes = self.read_var_bytes(max)?;
        String::from_utf8(bytes).map_err(|_| ReaderError::InvalidString)
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn total_read(&self) -> usize {
        self.total
    }
}
