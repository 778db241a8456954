use alloy_sol_types::sol;

sol! {
    /// The RedPocket contract surface driven by the facade.
    ///
    /// The operation set is fixed and enumerated here; there is no dynamic
    /// method dispatch. `provider()` is the contract's own accessor for the
    /// account that funded the pocket.
    interface IRedPocket {
        function provider() external view returns (address);
        function totalAmount() external view returns (uint256);
        function count() external view returns (uint256);
        function claimedCount() external view returns (uint256);
        function isEqual() external view returns (bool);
        function getBalance() external view returns (uint256);
        function getRemainingCount() external view returns (uint256);
        function redPocketMap(address claimer) external view returns (uint256);

        function deposit() external payable;
        function grabRedPocket() external;
        function refund() external;
        function emergencyStop() external;
    }
}
