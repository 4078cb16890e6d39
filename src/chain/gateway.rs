//! Typed wrapper over the blockchain RPC.
//!
//! The gateway never retries internally; callers wrap calls in the retry
//! executor where appropriate.

use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::Filter;
use alloy::sol_types::SolEvent;
use anyhow::{anyhow, bail, Context, Result};
use url::Url;

use crate::abis::state_view::IStateView;
use crate::abis::{Initialize, IERC20};
use crate::config::ChainSettings;

/// Timeout for individual RPC calls (30 seconds)
const RPC_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// A decoded pool-initialization event log.
///
/// `currency0 < currency1` as emitted by the pool manager.
#[derive(Debug, Clone)]
pub struct PoolInitLog {
    pub currency0: Address,
    pub currency1: Address,
    pub fee: u32,
    pub tick_spacing: i32,
    pub hooks: Address,
    pub block_number: u64,
}

/// Current on-chain state of a pool.
#[derive(Debug, Clone)]
pub struct PoolState {
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub liquidity: u128,
}

/// ERC-20 metadata read from the chain.
#[derive(Debug, Clone)]
pub struct FungibleMeta {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Typed JSON-RPC access for one chain: event logs, block headers and
/// contract reads against the PoolManager / StateView deployment.
pub struct ChainGateway {
    provider: DynProvider,
    chain_id: u64,
    pool_manager: Address,
    state_view: Address,
}

impl ChainGateway {
    pub fn new(settings: &ChainSettings) -> Result<Self> {
        let url = Url::parse(&settings.rpc_url).context("Invalid RPC URL")?;
        let client = ProviderBuilder::new().connect_http(url);
        let provider = DynProvider::new(client);

        let pool_manager = settings
            .pool_manager_address
            .parse()
            .context("Invalid pool manager address")?;
        let state_view = settings
            .state_view_address
            .parse()
            .context("Invalid state view address")?;

        Ok(Self {
            provider,
            chain_id: settings.chain_id,
            pool_manager,
            state_view,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Pool-initialization logs emitted by the pool manager in
    /// `[from_block, to_block]`, decoded to [`PoolInitLog`].
    pub async fn initialize_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<PoolInitLog>> {
        let filter = Filter::new()
            .address(self.pool_manager)
            .event_signature(Initialize::SIGNATURE_HASH)
            .from_block(from_block)
            .to_block(to_block);

        let logs = tokio::time::timeout(RPC_CALL_TIMEOUT, self.provider.get_logs(&filter))
            .await
            .context("get_logs timed out")?
            .context("get_logs failed")?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            let block_number = log
                .block_number
                .context("Initialize log missing block number")?;
            let decoded = log
                .log_decode::<Initialize>()
                .context("Failed to decode Initialize log")?;
            let event = decoded.inner.data;

            events.push(PoolInitLog {
                currency0: event.currency0,
                currency1: event.currency1,
                fee: event.fee.to::<u32>(),
                tick_spacing: event.tickSpacing.as_i32(),
                hooks: event.hooks,
                block_number,
            });
        }

        Ok(events)
    }

    pub async fn latest_block_number(&self) -> Result<u64> {
        tokio::time::timeout(RPC_CALL_TIMEOUT, self.provider.get_block_number())
            .await
            .context("get_block_number timed out")?
            .context("get_block_number failed")
    }

    /// Timestamp of the block header at `number`.
    pub async fn block_timestamp(&self, number: u64) -> Result<u64> {
        let block = tokio::time::timeout(
            RPC_CALL_TIMEOUT,
            self.provider.get_block_by_number(number.into()),
        )
        .await
        .context("get_block timed out")?
        .context("get_block failed")?;

        let block = block.with_context(|| format!("block {number} not found"))?;
        Ok(block.header.timestamp)
    }

    /// Slot0 + liquidity for a pool, composed from two StateView reads
    /// issued concurrently. Callers see one logical read.
    pub async fn pool_state(&self, pool_id: &str) -> Result<PoolState> {
        let id: B256 = pool_id.parse().context("Invalid pool id")?;
        let view = IStateView::new(self.state_view, &self.provider);

        let slot0_call = view.getSlot0(id);
        let liquidity_call = view.getLiquidity(id);

        let (slot0, liquidity) = tokio::try_join!(
            async {
                tokio::time::timeout(RPC_CALL_TIMEOUT, slot0_call.call())
                    .await
                    .context("getSlot0 timed out")?
                    .context("getSlot0 failed")
            },
            async {
                tokio::time::timeout(RPC_CALL_TIMEOUT, liquidity_call.call())
                    .await
                    .context("getLiquidity timed out")?
                    .context("getLiquidity failed")
            },
        )?;

        Ok(PoolState {
            sqrt_price_x96: U256::from(slot0.sqrtPriceX96),
            tick: slot0.tick.as_i32(),
            liquidity,
        })
    }

    /// ERC-20 name/symbol/decimals, issued concurrently.
    ///
    /// Decimals is required; name and symbol default to empty strings when
    /// a contract does not implement them.
    pub async fn fungible_meta(&self, address: Address) -> Result<FungibleMeta> {
        let token = IERC20::new(address, &self.provider);

        let name_builder = token.name();
        let symbol_builder = token.symbol();
        let decimals_builder = token.decimals();

        let (name_res, symbol_res, decimals_res) = tokio::join!(
            tokio::time::timeout(RPC_CALL_TIMEOUT, name_builder.call()),
            tokio::time::timeout(RPC_CALL_TIMEOUT, symbol_builder.call()),
            tokio::time::timeout(RPC_CALL_TIMEOUT, decimals_builder.call()),
        );

        let decimals = match decimals_res {
            Ok(Ok(decimals)) => decimals,
            Ok(Err(err)) => {
                return Err(anyhow!(err).context(format!("decimals() failed for {address}")))
            }
            Err(_) => bail!("decimals() timed out for {address}"),
        };

        if decimals > 24 {
            bail!("token {address} reports unsupported decimals {decimals}");
        }

        let name = name_res.ok().and_then(|r| r.ok()).unwrap_or_default();
        let symbol = symbol_res.ok().and_then(|r| r.ok()).unwrap_or_default();

        Ok(FungibleMeta {
            name,
            symbol,
            decimals,
        })
    }
}
