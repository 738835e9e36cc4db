//! Read and write seams over the chain

use alloy::primitives::Address;
use async_trait::async_trait;
use rust_decimal::Decimal;
use crate::{
    errors::BotResult,
    types::{SwapParams, Venue},
};

/// Read-only chain access used by pricing, validation and balance checks.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Raw `(reserve0, reserve1)` of the venue's pair, in token units.
    async fn get_reserves(&self, venue: &Venue) -> BotResult<(Decimal, Decimal)>;

    async fn get_pair_tokens(&self, venue: &Venue) -> BotResult<(Address, Address)>;

    async fn get_block_number(&self) -> BotResult<u64>;

    /// Balance of the signing account. `None` reads the native asset.
    async fn get_balance(&self, token: Option<Address>) -> BotResult<Decimal>;
}

/// Router quoting and swap submission.
#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// `getAmountsOut` along the two-hop path; the last element is the output.
    async fn quote_swap(
        &self,
        venue: &Venue,
        token_in: Address,
        token_out: Address,
        amount_in: Decimal,
    ) -> BotResult<Vec<Decimal>>;

    /// Submits the swap and waits for a successful receipt. Returns the hash.
    async fn execute_swap(&self, params: &SwapParams) -> BotResult<String>;
}
