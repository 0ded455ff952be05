//! Common contract interfaces shared across chains.
//!
//! ERC20 balances for the locked-value statistic, Uniswap V2 pairs for
//! reserve-ratio pricing, and the Uniswap V3 QuoterV2 for simulated swaps.

use alloy::sol;

sol! {
    /// Standard ERC20 interface (subset for balance reads)
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
    }
}

sol! {
    /// Uniswap V2 pair
    #[sol(rpc)]
    interface IUniswapV2Pair {
        function getReserves() external view returns (
            uint112 reserve0,
            uint112 reserve1,
            uint32 blockTimestampLast
        );
        function token0() external view returns (address);
        function token1() external view returns (address);
    }
}

sol! {
    /// Uniswap V3 QuoterV2 (non-view, invoked through eth_call)
    #[sol(rpc)]
    interface IQuoterV2 {
        struct QuoteExactOutputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amount;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactOutputSingle(QuoteExactOutputSingleParams memory params)
            external
            returns (
                uint256 amountIn,
                uint160 sqrtPriceX96After,
                uint32 initializedTicksCrossed,
                uint256 gasEstimate
            );
    }
}
