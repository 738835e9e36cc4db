//! Alloy-backed chain client: reserves, balances, router quotes and swaps

use alloy::{
    network::{EthereumWallet, ReceiptResponse, TransactionBuilder},
    primitives::{keccak256, Address, Bytes, U256},
    providers::Provider,
    rpc::types::eth::TransactionRequest,
    signers::local::PrivateKeySigner,
    sol_types::{SolCall, SolValue},
};
use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use crate::{
    chain::{
        abi::{IERC20, IJoeRouter, IUniswapV2Router},
        ChainReader, ChainWriter,
    },
    config::Config,
    errors::{BotError, BotResult},
    types::{AssetPair, RouterFlavor, SwapParams, Venue},
    utils::{decimal_to_u256, u256_to_decimal},
    ConcreteProvider,
};

pub struct AlloyChainClient {
    provider: Arc<ConcreteProvider>,
    wallet: EthereumWallet,
    account: Address,
    pair: AssetPair,
    routers: HashMap<String, (Address, RouterFlavor)>,
    deadline_secs: u64,
    gas_buffer_pct: u64,
}

impl AlloyChainClient {
    pub fn new(
        provider: Arc<ConcreteProvider>,
        signer: PrivateKeySigner,
        config: &Config,
    ) -> BotResult<Self> {
        let routers = config
            .venue_set()?
            .into_iter()
            .map(|v| (v.id, (v.router, v.flavor)))
            .collect();

        Ok(Self {
            provider,
            account: signer.address(),
            wallet: EthereumWallet::from(signer),
            pair: config.asset_pair(),
            routers,
            deadline_secs: config.swap_deadline_secs,
            gas_buffer_pct: config.gas_limit_buffer_pct,
        })
    }

    pub fn account(&self) -> Address {
        self.account
    }

    fn decimals_of(&self, token: Address) -> u8 {
        if token == self.pair.quote.address {
            self.pair.quote.decimals
        } else {
            self.pair.base.decimals
        }
    }

    fn router_for(&self, venue: &str) -> BotResult<(Address, RouterFlavor)> {
        self.routers
            .get(venue)
            .copied()
            .ok_or_else(|| BotError::config("VENUES", format!("unknown venue '{}'", venue)))
    }

    async fn call_raw(&self, to: Address, input: Vec<u8>) -> anyhow::Result<Bytes> {
        let tx = TransactionRequest::default().to(to).input(input.into());
        self.provider.call(&tx).await.context("eth_call failed")
    }

    /// Fills, signs and sends `tx`, then waits for a successful receipt
    /// without a local deadline.
    async fn send_and_confirm(&self, tx: TransactionRequest) -> anyhow::Result<String> {
        let nonce = self.provider.get_transaction_count(self.account).await
            .context("Failed to get nonce")?;
        let chain_id = self.provider.get_chain_id().await
            .context("Failed to get chain id")?;

        let tx = tx.with_from(self.account).with_nonce(nonce).with_chain_id(chain_id);

        // Reverts surface here with the router's reason string
        let estimate = self.provider.estimate_gas(&tx).await?;
        let gas_limit = estimate + estimate * self.gas_buffer_pct / 100;
        let fees = self.provider.estimate_eip1559_fees(None).await
            .context("Failed to estimate fees")?;

        let tx = tx
            .with_gas_limit(gas_limit)
            .with_max_fee_per_gas(fees.max_fee_per_gas)
            .with_max_priority_fee_per_gas(fees.max_priority_fee_per_gas);

        let envelope = tx.build(&self.wallet).await
            .context("Failed to sign transaction")?;
        let pending = self.provider.send_tx_envelope(envelope).await
            .context("Failed to send transaction")?;
        let tx_hash = format!("{:?}", pending.tx_hash());
        debug!("📡 Transaction sent: {}", tx_hash);

        // A pending swap is awaited, never replaced under its nonce
        let receipt = pending
            .get_receipt()
            .await
            .with_context(|| format!("No receipt for {}", tx_hash))?;

        if !receipt.status() {
            anyhow::bail!("transaction {} reverted", tx_hash);
        }
        Ok(tx_hash)
    }

    async fn ensure_allowance(&self, token: Address, spender: Address, amount: U256) -> anyhow::Result<()> {
        let allowance_call = IERC20::allowanceCall { owner: self.account, spender };
        let raw = self.call_raw(token, allowance_call.abi_encode()).await?;
        let current = IERC20::allowanceCall::abi_decode_returns(&raw, true)
            .context("Failed to decode allowance")?
            ._0;
        if current >= amount {
            return Ok(());
        }

        let approve = IERC20::approveCall { spender, amount };
        let tx = TransactionRequest::default().to(token).input(approve.abi_encode().into());
        let hash = self.send_and_confirm(tx).await.context("Approval failed")?;
        info!("🔓 Approved router {} for {} (tx {})", spender, token, hash);
        Ok(())
    }

    fn encode_swap(
        &self,
        flavor: RouterFlavor,
        params: &SwapParams,
        amount_in: U256,
        amount_out_min: U256,
        deadline: U256,
    ) -> (Vec<u8>, U256) {
        let path = vec![params.token_in, params.token_out];
        let to = self.account;

        match (params.is_native_in, params.is_native_out, flavor) {
            (true, _, RouterFlavor::Eth) => (
                IUniswapV2Router::swapExactETHForTokensCall { amountOutMin: amount_out_min, path, to, deadline }
                    .abi_encode(),
                amount_in,
            ),
            (true, _, RouterFlavor::Avax) => (
                IJoeRouter::swapExactAVAXForTokensCall { amountOutMin: amount_out_min, path, to, deadline }
                    .abi_encode(),
                amount_in,
            ),
            (false, true, RouterFlavor::Eth) => (
                IUniswapV2Router::swapExactTokensForETHCall { amountIn: amount_in, amountOutMin: amount_out_min, path, to, deadline }
                    .abi_encode(),
                U256::ZERO,
            ),
            (false, true, RouterFlavor::Avax) => (
                IJoeRouter::swapExactTokensForAVAXCall { amountIn: amount_in, amountOutMin: amount_out_min, path, to, deadline }
                    .abi_encode(),
                U256::ZERO,
            ),
            (false, false, _) => (
                IUniswapV2Router::swapExactTokensForTokensCall { amountIn: amount_in, amountOutMin: amount_out_min, path, to, deadline }
                    .abi_encode(),
                U256::ZERO,
            ),
        }
    }
}

fn contract_error(contract: Address, message: &str, source: anyhow::Error) -> BotError {
    BotError::Contract {
        contract,
        message: message.to_string(),
        source,
    }
}

#[async_trait]
impl ChainReader for AlloyChainClient {
    async fn get_reserves(&self, venue: &Venue) -> BotResult<(Decimal, Decimal)> {
        let data = keccak256("getReserves()")[..4].to_vec();
        let raw = self.call_raw(venue.pair, data).await
            .map_err(|e| contract_error(venue.pair, "Failed to call getReserves", e))?;
        let (r0, r1, _) = <(U256, U256, U256)>::abi_decode(&raw, true)
            .map_err(|e| contract_error(venue.pair, "Failed to decode reserves", e.into()))?;

        let (d0, d1) = if venue.base_is_token0 {
            (self.pair.base.decimals, self.pair.quote.decimals)
        } else {
            (self.pair.quote.decimals, self.pair.base.decimals)
        };
        let parse = |raw: U256, decimals: u8| {
            u256_to_decimal(raw, decimals).map_err(|e| BotError::DataParsing {
                context: format!("reserves of {}", venue.id),
                source: e,
            })
        };
        Ok((parse(r0, d0)?, parse(r1, d1)?))
    }

    async fn get_pair_tokens(&self, venue: &Venue) -> BotResult<(Address, Address)> {
        let token0_data = keccak256("token0()")[..4].to_vec();
        let token1_data = keccak256("token1()")[..4].to_vec();

        let raw0 = self.call_raw(venue.pair, token0_data).await
            .map_err(|e| contract_error(venue.pair, "Failed to get token0", e))?;
        let raw1 = self.call_raw(venue.pair, token1_data).await
            .map_err(|e| contract_error(venue.pair, "Failed to get token1", e))?;

        let token0 = Address::abi_decode(&raw0, true)
            .map_err(|e| contract_error(venue.pair, "Failed to decode token0", e.into()))?;
        let token1 = Address::abi_decode(&raw1, true)
            .map_err(|e| contract_error(venue.pair, "Failed to decode token1", e.into()))?;
        Ok((token0, token1))
    }

    async fn get_block_number(&self) -> BotResult<u64> {
        self.provider.get_block_number().await.map_err(|e| BotError::Network {
            message: "Failed to get block number".to_string(),
            source: Some(e.into()),
            retry_count: 0,
        })
    }

    async fn get_balance(&self, token: Option<Address>) -> BotResult<Decimal> {
        let (raw, decimals) = match token {
            None => {
                let raw = self.provider.get_balance(self.account).await.map_err(|e| BotError::Network {
                    message: "Failed to get native balance".to_string(),
                    source: Some(e.into()),
                    retry_count: 0,
                })?;
                (raw, self.pair.base.decimals)
            }
            Some(token) => {
                let call = IERC20::balanceOfCall { owner: self.account };
                let bytes = self.call_raw(token, call.abi_encode()).await
                    .map_err(|e| contract_error(token, "Failed to call balanceOf", e))?;
                let raw = IERC20::balanceOfCall::abi_decode_returns(&bytes, true)
                    .map_err(|e| contract_error(token, "Failed to decode balance", e.into()))?
                    ._0;
                (raw, self.decimals_of(token))
            }
        };

        u256_to_decimal(raw, decimals).map_err(|e| BotError::DataParsing {
            context: "account balance".to_string(),
            source: e,
        })
    }
}

#[async_trait]
impl ChainWriter for AlloyChainClient {
    async fn quote_swap(
        &self,
        venue: &Venue,
        token_in: Address,
        token_out: Address,
        amount_in: Decimal,
    ) -> BotResult<Vec<Decimal>> {
        let quote_err = |reason: String| BotError::Quote {
            venue: venue.id.clone(),
            reason,
        };

        let raw_in = decimal_to_u256(amount_in, self.decimals_of(token_in))
            .map_err(|e| quote_err(e.to_string()))?;
        let call = IUniswapV2Router::getAmountsOutCall {
            amountIn: raw_in,
            path: vec![token_in, token_out],
        };
        let bytes = self.call_raw(venue.router, call.abi_encode()).await
            .map_err(|e| quote_err(format!("{:#}", e)))?;
        let amounts = IUniswapV2Router::getAmountsOutCall::abi_decode_returns(&bytes, true)
            .map_err(|e| quote_err(e.to_string()))?
            .amounts;

        let decimals = [self.decimals_of(token_in), self.decimals_of(token_out)];
        amounts
            .into_iter()
            .enumerate()
            .map(|(i, raw)| {
                u256_to_decimal(raw, decimals[i.min(1)]).map_err(|e| quote_err(e.to_string()))
            })
            .collect()
    }

    async fn execute_swap(&self, params: &SwapParams) -> BotResult<String> {
        let swap_err = |reason: String| BotError::Swap {
            venue: params.venue.clone(),
            slippage: params.slippage,
            reason,
            tx_hash: None,
        };

        let (router, flavor) = self.router_for(&params.venue)?;
        let amount_in = decimal_to_u256(params.amount_in, self.decimals_of(params.token_in))
            .map_err(|e| swap_err(e.to_string()))?;
        let amount_out_min = decimal_to_u256(params.amount_out_min, self.decimals_of(params.token_out))
            .map_err(|e| swap_err(e.to_string()))?;
        let deadline = U256::from(chrono::Utc::now().timestamp().max(0) as u64 + self.deadline_secs);

        if !params.is_native_in {
            self.ensure_allowance(params.token_in, router, amount_in).await
                .map_err(|e| swap_err(format!("{:#}", e)))?;
        }

        let (input, value) = self.encode_swap(flavor, params, amount_in, amount_out_min, deadline);
        let tx = TransactionRequest::default()
            .to(router)
            .value(value)
            .input(input.into());

        info!(
            "📤 Submitting swap on {}: {} → {} amount_in={} min_out={} slippage={}%",
            params.venue, params.token_in, params.token_out,
            params.amount_in, params.amount_out_min, params.slippage
        );

        self.send_and_confirm(tx).await.map_err(|e| swap_err(format!("{:#}", e)))
    }
}
