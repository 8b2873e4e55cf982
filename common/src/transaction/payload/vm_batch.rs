use serde::{Deserialize, Serialize};

use crate::{
    config::{
        MAX_VM_ACCOUNTS, MAX_VM_COMPUTE_BUDGET, MAX_VM_INSTRUCTIONS, MAX_VM_INSTRUCTION_DATA,
    },
    crypto::Address,
    link::ForeignPubkey,
    serializer::{Reader, ReaderError, Serializer, Writer},
};

/// Reference from an instruction into the batch account table.
/// `caller_index` addresses `VmBatchPayload::accounts`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct VmAccountMeta {
    pub caller_index: u16,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl Serializer for VmAccountMeta {
    fn write(&self, writer: &mut Writer) {
        self.caller_index.write(writer);
        self.is_signer.write(writer);
        self.is_writable.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<VmAccountMeta, ReaderError> {
        Ok(VmAccountMeta {
            caller_index: u16::read(reader)?,
            is_signer: reader.read_bool()?,
            is_writable: reader.read_bool()?,
        })
    }

    fn size(&self) -> usize {
        4
    }
}

/// One instruction of the embedded batch. The program is itself an entry of
/// the account table, addressed by `program_index`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VmInstruction {
    pub program_index: u16,
    pub accounts: Vec<VmAccountMeta>,
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
}

impl Serializer for VmInstruction {
    fn write(&self, writer: &mut Writer) {
        self.program_index.write(writer);
        writer.write_u16(self.accounts.len() as u16);
        for account in &self.accounts {
            account.write(writer);
        }
        writer.write_var_bytes(&self.data);
    }

    fn read(reader: &mut Reader) -> Result<VmInstruction, ReaderError> {
        let program_index = u16::read(reader)?;
        let accounts_len = reader.read_u16()? as usize;
        if accounts_len > MAX_VM_ACCOUNTS {
            return Err(ReaderError::InvalidSize);
        }
        let mut accounts = Vec::with_capacity(accounts_len);
        for _ in 0..accounts_len {
            accounts.push(VmAccountMeta::read(reader)?);
        }
        let data = reader.read_var_bytes(MAX_VM_INSTRUCTION_DATA)?;
        Ok(VmInstruction {
            program_index,
            accounts,
            data,
        })
    }
}

// VmBatchPayload carries a batch of instructions expressed in the embedded
// VM's address space, executed atomically under this single native
// transaction. `signers` are the native accounts claiming authority over the
// batch; `accounts` is the foreign-VM account table the instructions index
// into. The admission pipeline proves every foreign account flagged as signer
// links back to a verified native signer before execution is ever attempted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VmBatchPayload {
    sender: Address,
    signers: Vec<Address>,
    accounts: Vec<ForeignPubkey>,
    instructions: Vec<VmInstruction>,
    compute_budget: u64,
}

impl VmBatchPayload {
    pub fn new(
        sender: Address,
        signers: Vec<Address>,
        accounts: Vec<ForeignPubkey>,
        instructions: Vec<VmInstruction>,
        compute_budget: u64,
    ) -> Self {
        VmBatchPayload {
            sender,
            signers,
            accounts,
            instructions,
            compute_budget,
        }
    }

    #[inline]
    pub fn get_sender(&self) -> &Address {
        &self.sender
    }

    #[inline]
    pub fn get_signers(&self) -> &[Address] {
        &self.signers
    }

    #[inline]
    pub fn get_accounts(&self) -> &[ForeignPubkey] {
        &self.accounts
    }

    #[inline]
    pub fn get_instructions(&self) -> &[VmInstruction] {
        &self.instructions
    }

    #[inline]
    pub fn get_compute_budget(&self) -> u64 {
        self.compute_budget
    }

    /// Structural validity, independent of any chain state: limits, a
    /// non-empty signer list containing the sender, and every account-table
    /// index in range.
    pub fn has_valid_format(&self) -> bool {
        if self.signers.is_empty() || !self.signers.contains(&self.sender) {
            return false;
        }
        if self.accounts.len() > MAX_VM_ACCOUNTS
            || self.instructions.is_empty()
            || self.instructions.len() > MAX_VM_INSTRUCTIONS
            || self.compute_budget == 0
            || self.compute_budget > MAX_VM_COMPUTE_BUDGET
        {
            return false;
        }
        self.instructions.iter().all(|instruction| {
            (instruction.program_index as usize) < self.accounts.len()
                && instruction
                    .accounts
                    .iter()
                    .all(|meta| (meta.caller_index as usize) < self.accounts.len())
        })
    }
}

impl Serializer for VmBatchPayload {
    fn write(&self, writer: &mut Writer) {
        self.sender.write(writer);
        writer.write_u8(self.signers.len() as u8);
        for signer in &self.signers {
            signer.write(writer);
        }
        writer.write_u16(self.accounts.len() as u16);
        for account in &self.accounts {
            account.write(writer);
        }
        writer.write_u16(self.instructions.len() as u16);
        for instruction in &self.instructions {
            instruction.write(writer);
        }
        self.compute_budget.write(writer);
    }

    fn read(reader: &mut Reader) -> Result<VmBatchPayload, ReaderError> {
        let sender = Address::read(reader)?;
        let signers_len = reader.read_u8()? as usize;
        let mut signers = Vec::with_capacity(signers_len);
        for _ in 0..signers_len {
            signers.push(Address::read(reader)?);
        }
        let accounts_len = reader.read_u16()? as usize;
        if accounts_len > MAX_VM_ACCOUNTS {
            return Err(ReaderError::InvalidSize);
        }
        let mut accounts = Vec::with_capacity(accounts_len);
        for _ in 0..accounts_len {
            accounts.push(ForeignPubkey::read(reader)?);
        }
        let instructions_len = reader.read_u16()? as usize;
        if instructions_len > MAX_VM_INSTRUCTIONS {
            return Err(ReaderError::InvalidSize);
        }
        let mut instructions = Vec::with_capacity(instructions_len);
        for _ in 0..instructions_len {
            instructions.push(VmInstruction::read(reader)?);
        }
        let compute_budget = u64::read(reader)?;
        Ok(VmBatchPayload {
            sender,
            signers,
            accounts,
            instructions,
            compute_budget,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch() -> VmBatchPayload {
        let sender = Address::new([1; 32]);
        VmBatchPayload::new(
            sender,
            vec![sender],
            vec![ForeignPubkey::new([2; 32]), ForeignPubkey::new([3; 32])],
            vec![VmInstruction {
                program_index: 1,
                accounts: vec![VmAccountMeta {
                    caller_index: 0,
                    is_signer: true,
                    is_writable: false,
                }],
                data: vec![0xde, 0xad],
            }],
            10_000,
        )
    }

    #[test]
    fn test_batch_wire_roundtrip() {
        let batch = sample_batch();
        let decoded = VmBatchPayload::from_bytes(&batch.to_bytes()).expect("decode");
        assert_eq!(batch, decoded);
    }

    #[test]
    fn test_batch_format_checks_indices() {
        let mut batch = sample_batch();
        assert!(batch.has_valid_format());

        batch.instructions[0].accounts[0].caller_index = 9;
        assert!(!batch.has_valid_format());
    }

    #[test]
    fn test_batch_sender_must_sign() {
        let mut batch = sample_batch();
        batch.signers = vec![Address::new([9; 32])];
        assert!(!batch.has_valid_format());
    }
}
