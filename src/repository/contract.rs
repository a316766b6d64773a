use alloy::sol;

// Smart contract ABI definitions for the launchpad protocol
sol! {
    /// ERC20 token interface with the EIP-2612 permit extension.
    #[sol(rpc)]
    interface IERC20 {
        /// Returns the token balance of the specified account.
        function balanceOf(address account) external view returns (uint256);

        /// Returns the remaining amount `spender` may transfer on behalf of `owner`.
        function allowance(address owner, address spender) external view returns (uint256);

        /// Returns the number of decimals used by the token.
        function decimals() external view returns (uint8);

        /// Returns the token symbol.
        function symbol() external view returns (string memory);

        /// Returns the token name. Also the EIP-712 domain name for permits.
        function name() external view returns (string memory);

        /// Returns the total token supply.
        function totalSupply() external view returns (uint256);

        /// Returns the current permit nonce of `owner`.
        function nonces(address owner) external view returns (uint256);

        /// Grants `spender` an allowance of `amount`.
        function approve(address spender, uint256 amount) external returns (bool);

        /// Transfers `amount` tokens to `to`.
        function transfer(address to, uint256 amount) external returns (bool);
    }

    /// Quote and status lens over the bonding curve and the DEX.
    ///
    /// Quotes return the router that will execute the trade: the bonding curve
    /// router before graduation, the DEX router after.
    #[sol(rpc)]
    interface ILens {
        /// Returns the router and the output amount for an exact input.
        function getAmountOut(address token, uint256 amountIn, bool isBuy)
            external
            view
            returns (address router, uint256 amountOut);

        /// Returns the router and the input amount required for an exact output.
        function getAmountIn(address token, uint256 amountOut, bool isBuy)
            external
            view
            returns (address router, uint256 amountIn);

        /// Returns the bonding progress of a token in basis points (10000 = graduated).
        function getProgress(address token) external view returns (uint256);

        /// Returns whether the token has graduated to the DEX.
        function isGraduated(address token) external view returns (bool);

        /// Returns whether the token's curve is locked pending graduation.
        function isLocked(address token) external view returns (bool);

        /// Returns the tokens still purchasable on the curve and the native amount needed.
        function availableBuyTokens(address token)
            external
            view
            returns (uint256 availableBuyToken, uint256 requiredMonAmount);
    }

    /// Trade router. The bonding curve router and the DEX router share this ABI.
    #[sol(rpc)]
    interface IRouter {
        struct BuyParams {
            uint256 amountOutMin;
            address token;
            address to;
            uint256 deadline;
        }

        struct SellParams {
            uint256 amountIn;
            uint256 amountOutMin;
            address token;
            address to;
            uint256 deadline;
        }

        struct SellPermitParams {
            uint256 amountIn;
            uint256 amountOutMin;
            uint256 amountAllowance;
            address token;
            address to;
            uint256 deadline;
            uint8 v;
            bytes32 r;
            bytes32 s;
        }

        /// Buys `token` with the attached native value.
        function buy(BuyParams calldata params) external payable;

        /// Sells `amountIn` of `token`; requires a prior allowance to the router.
        function sell(SellParams calldata params) external;

        /// Sells `amountIn` of `token`, granting the allowance with an EIP-2612 signature.
        function sellPermit(SellPermitParams calldata params) external;
    }

    /// Bonding curve contract: per-token reserves and lifecycle events.
    #[sol(rpc)]
    interface IBondingCurve {
        /// Returns the reserve state of a token's curve.
        function curves(address token)
            external
            view
            returns (
                uint256 realMonReserve,
                uint256 realTokenReserve,
                uint256 virtualMonReserve,
                uint256 virtualTokenReserve,
                uint256 k,
                uint256 targetTokenAmount,
                uint256 initVirtualMonReserve,
                uint256 initVirtualTokenReserve
            );

        event CurveCreate(
            address indexed creator,
            address indexed token,
            address indexed pool,
            string name,
            string symbol,
            string tokenURI,
            uint256 virtualMon,
            uint256 virtualToken,
            uint256 targetTokenAmount
        );

        event CurveBuy(address indexed sender, address indexed token, uint256 amountIn, uint256 amountOut);

        event CurveSell(address indexed sender, address indexed token, uint256 amountIn, uint256 amountOut);

        event CurveSync(
            address indexed token,
            uint256 realMonReserve,
            uint256 realTokenReserve,
            uint256 virtualMonReserve,
            uint256 virtualTokenReserve
        );

        event CurveTokenLocked(address indexed token);

        event CurveGraduate(address indexed token, address indexed pool);
    }

    /// Concentrated-liquidity pool that graduated tokens trade in.
    #[sol(rpc)]
    interface IUniswapV3Pool {
        function token0() external view returns (address);

        function token1() external view returns (address);

        event Swap(
            address indexed sender,
            address indexed recipient,
            int256 amount0,
            int256 amount1,
            uint160 sqrtPriceX96,
            uint128 liquidity,
            int24 tick
        );
    }

    /// Pool factory of the DEX.
    #[sol(rpc)]
    interface IUniswapV3Factory {
        /// Returns the pool for a pair and fee tier, or the zero address.
        function getPool(address tokenA, address tokenB, uint24 fee) external view returns (address pool);
    }

    /// EIP-2612 permit message, hashed under the token's EIP-712 domain.
    struct Permit {
        address owner;
        address spender;
        uint256 value;
        uint256 nonce;
        uint256 deadline;
    }
}
