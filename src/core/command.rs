//! Ledger commands carried by a transaction
//!
//! Amounts are integers in minor units with two implied decimal places,
//! so `14.00` coins is `1400`.

use serde::{Deserialize, Serialize};

/// A single ledger operation executed on behalf of the transaction creator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Register a new account with one signatory and quorum 1
    CreateAccount {
        account_id: String,
        public_key: String,
    },
    /// Mint an asset into the creator's account
    AddAssetQuantity { asset_id: String, amount: u64 },
    /// Move an asset between accounts
    TransferAsset {
        src_account_id: String,
        dest_account_id: String,
        asset_id: String,
        description: String,
        amount: u64,
    },
    /// Change the number of signatures the account requires
    SetAccountQuorum { account_id: String, quorum: u32 },
    /// Authorize another key to sign for the account
    AddSignatory {
        account_id: String,
        public_key: String,
    },
    /// Revoke a key's authority over the account
    RemoveSignatory {
        account_id: String,
        public_key: String,
    },
}

impl Command {
    pub fn create_account(account_id: &str, public_key: &str) -> Self {
        Command::CreateAccount {
            account_id: account_id.to_string(),
            public_key: public_key.to_string(),
        }
    }

    pub fn add_asset_quantity(asset_id: &str, amount: u64) -> Self {
        Command::AddAssetQuantity {
            asset_id: asset_id.to_string(),
            amount,
        }
    }

    pub fn transfer(src: &str, dest: &str, asset_id: &str, description: &str, amount: u64) -> Self {
        Command::TransferAsset {
            src_account_id: src.to_string(),
            dest_account_id: dest.to_string(),
            asset_id: asset_id.to_string(),
            description: description.to_string(),
            amount,
        }
    }

    pub fn set_quorum(account_id: &str, quorum: u32) -> Self {
        Command::SetAccountQuorum {
            account_id: account_id.to_string(),
            quorum,
        }
    }

    pub fn add_signatory(account_id: &str, public_key: &str) -> Self {
        Command::AddSignatory {
            account_id: account_id.to_string(),
            public_key: public_key.to_string(),
        }
    }

    pub fn remove_signatory(account_id: &str, public_key: &str) -> Self {
        Command::RemoveSignatory {
            account_id: account_id.to_string(),
            public_key: public_key.to_string(),
        }
    }

    /// Short name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateAccount { .. } => "CreateAccount",
            Command::AddAssetQuantity { .. } => "AddAssetQuantity",
            Command::TransferAsset { .. } => "TransferAsset",
            Command::SetAccountQuorum { .. } => "SetAccountQuorum",
            Command::AddSignatory { .. } => "AddSignatory",
            Command::RemoveSignatory { .. } => "RemoveSignatory",
        }
    }

    /// Append the canonical encoding: a tag byte followed by length-prefixed
    /// fields in declaration order.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Command::CreateAccount {
                account_id,
                public_key,
            } => {
                out.push(0x01);
                put_str(out, account_id);
                put_str(out, public_key);
            }
            Command::AddAssetQuantity { asset_id, amount } => {
                out.push(0x02);
                put_str(out, asset_id);
                out.extend_from_slice(&amount.to_be_bytes());
            }
            Command::TransferAsset {
                src_account_id,
                dest_account_id,
                asset_id,
                description,
                amount,
            } => {
                out.push(0x03);
                put_str(out, src_account_id);
                put_str(out, dest_account_id);
                put_str(out, asset_id);
                put_str(out, description);
                out.extend_from_slice(&amount.to_be_bytes());
            }
            Command::SetAccountQuorum { account_id, quorum } => {
                out.push(0x04);
                put_str(out, account_id);
                out.extend_from_slice(&quorum.to_be_bytes());
            }
            Command::AddSignatory {
                account_id,
                public_key,
            } => {
                out.push(0x05);
                put_str(out, account_id);
                put_str(out, public_key);
            }
            Command::RemoveSignatory {
                account_id,
                public_key,
            } => {
                out.push(0x06);
                put_str(out, account_id);
                put_str(out, public_key);
            }
        }
    }
}

pub(crate) fn put_str(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
    out.extend_from_slice(value.as_bytes());
}
