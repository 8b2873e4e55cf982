use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{SignerData, Transaction};
use crate::serializer::{Reader, ReaderError, Serializer, Writer};

/// Canonical signing conventions understood by the chain. `Direct` signs the
/// binary wire encoding; `Legacy` signs a deterministic JSON document and is
/// the one mode the typed-data chain re-derives its structured document from.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignMode {
    Direct,
    Legacy,
}

impl Serializer for SignMode {
    fn write(&self, writer: &mut Writer) {
        match self {
            SignMode::Direct => writer.write_u8(0),
            SignMode::Legacy => writer.write_u8(1),
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        match reader.read_u8()? {
            0 => Ok(SignMode::Direct),
            1 => Ok(SignMode::Legacy),
            _ => Err(ReaderError::InvalidValue),
        }
    }

    fn size(&self) -> usize {
        1
    }
}

/// Derive the canonical bytes a signer commits to under the given mode.
/// Deterministic: identical (mode, signer data, transaction) inputs yield
/// byte-identical output.
pub fn sign_bytes(
    mode: SignMode,
    signer_data: &SignerData,
    tx: &Transaction,
) -> Result<Vec<u8>, serde_json::Error> {
    match mode {
        SignMode::Direct => {
            let mut bytes = Vec::new();
            let mut writer = Writer::new(&mut bytes);
            writer.write_var_bytes(signer_data.chain_id.as_bytes());
            signer_data.account_number.write(&mut writer);
            signer_data.sequence.write(&mut writer);
            tx.write_sign_payload(&mut writer);
            Ok(bytes)
        }
        SignMode::Legacy => {
            // Delegated fees put the payer in the extension; otherwise the
            // explicit fee payer, if any, is part of the signed document.
            let payer = tx
                .get_typed_data_extension()
                .map(|ext| ext.get_fee_payer().to_hex())
                .or_else(|| tx.get_fee().get_payer().as_ref().map(|addr| addr.to_hex()));
            let msgs = serde_json::to_value(tx.get_messages())?;
            // serde_json maps are sorted by key, so the rendered document is
            // canonical without further normalization.
            let doc = json!({
                "account_number": signer_data.account_number.to_string(),
                "chain_id": signer_data.chain_id,
                "fee": {
                    "amount": tx.get_fee().get_amount().to_string(),
                    "gas": tx.get_fee().get_gas_limit().to_string(),
                    "payer": payer,
                },
                "memo": tx.get_memo(),
                "msgs": msgs,
                "sequence": signer_data.sequence.to_string(),
                "timeout_height": tx.get_timeout_height().to_string(),
            });
            Ok(doc.to_string().into_bytes())
        }
    }
}
