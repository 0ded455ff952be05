//! Contract bindings for the XenBox contract family.
//!
//! Only the functions the engine calls are declared. The legacy box keeps
//! its mint data on the XEN token keyed by a derived proxy address, the
//! upgradeable box mirrors it per token id.
//!
//! # Usage
//!
//! ```rust,ignore
//! use boxkeeper_chain::contracts::bindings::IXenBoxHelper;
//!
//! let helper = IXenBoxHelper::new(address, &provider);
//! let ids = helper.getOwnedTokenIdList(box_address, owner, U256::ZERO, total).call().await?._0;
//! ```

use alloy::sol;

// ============================================================================
// Box contracts
// ============================================================================

sol! {
    /// V0 XenBox (Ethereum mainnet)
    #[sol(rpc)]
    #[derive(Debug)]
    interface IXenBox {
        function totalToken() external view returns (uint256);
        function fee() external view returns (uint256);
        function tokenMap(uint256 tokenId) external view returns (uint256 start, uint256 end);
        function getProxyAddress(uint256 index) external view returns (address);

        function claim(uint256 tokenId, uint256 term) external;
    }
}

sol! {
    /// V1 XenBoxUpgradeable
    #[sol(rpc)]
    #[derive(Debug)]
    interface IXenBoxUpgradeable {
        function totalToken() external view returns (uint256);

        function fee10() external view returns (uint256);
        function fee20() external view returns (uint256);
        function fee50() external view returns (uint256);
        function fee100() external view returns (uint256);

        function referFeePercent() external view returns (uint256);
        function rewardMap(address account) external view returns (uint256);
        function isRefer(address account) external view returns (bool);

        function tokenMap(uint256 tokenId) external view returns (uint48 start, uint48 end);
        function proxyAddress(uint256 index) external view returns (address);
        function userMints(uint256 tokenId) external view returns (
            address user,
            uint256 term,
            uint256 maturityTs,
            uint256 rank,
            uint256 amplifier,
            uint256 eaaRate
        );

        function mint(uint256 amount, uint256 term, address refer) external;
        function claim(uint256 tokenId, uint256 term) external;
        function force(uint256 tokenId, uint256 term) external;
        function getReward() external;
    }
}

// ============================================================================
// Helper and token
// ============================================================================

sol! {
    /// Read-only helper shared by both box generations
    #[sol(rpc)]
    #[derive(Debug)]
    interface IXenBoxHelper {
        function getOwnedTokenIdList(address target, address owner, uint256 start, uint256 end)
            external view returns (uint256[] memory);
        function getReferTokenIdList(address target, address owner, uint256 start, uint256 end)
            external view returns (uint256[] memory);
        function getForceTokenIdList(address target, uint256 start, uint256 end)
            external view returns (uint256[] memory);
        function calculateMintReward(address user) external view returns (uint256);
        function calculateMintRewardNew(uint256 cRank, uint256 term) external view returns (uint256);
    }
}

sol! {
    /// XEN token mint records, keyed by minter (proxy) address
    #[sol(rpc)]
    #[derive(Debug)]
    interface IXen {
        function userMints(address user) external view returns (
            address user,
            uint256 term,
            uint256 maturityTs,
            uint256 rank,
            uint256 amplifier,
            uint256 eaaRate
        );
    }
}
