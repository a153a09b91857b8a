//! Solidity bindings for the ERC-20 reads/writes and permit typed data.

#![allow(missing_docs)]

use alloy_sol_types::sol;

sol! {
    #[derive(Debug)]
    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);
        function name() external view returns (string);
        function nonces(address owner) external view returns (uint256);
        function version() external view returns (string);
    }

    /// EIP-2612 permit message
    #[derive(Debug)]
    struct Permit {
        address owner;
        address spender;
        uint256 value;
        uint256 nonce;
        uint256 deadline;
    }

    #[derive(Debug)]
    struct TokenPermissions {
        address token;
        uint256 amount;
    }

    /// Permit2 signature transfer message
    #[derive(Debug)]
    struct PermitTransferFrom {
        TokenPermissions permitted;
        address spender;
        uint256 nonce;
        uint256 deadline;
    }
}
