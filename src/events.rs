use crate::network::Network;
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;
use alloy_primitives::{Address, B256, U256};
use anyhow::Context;

sol! {
    event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
}

/// A decoded ERC-721 transfer on one of the watched networks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub token_id: U256,
    pub from_address: Address,
    pub to_address: Address,
    pub transaction_hash: B256,
    pub network: Network,
}

pub fn decode_transfer_event(log: &Log, network: Network) -> anyhow::Result<TransferEvent> {
    let log_data = log.data();
    let decoded = Transfer::decode_raw_log(log.topics(), &log_data.data)?;
    let transaction_hash = log
        .transaction_hash
        .context("Transfer log has no transaction hash")?;

    Ok(TransferEvent {
        token_id: decoded.tokenId,
        from_address: decoded.from,
        to_address: decoded.to,
        transaction_hash,
        network,
    })
}
