use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Decimal precision for payouts
pub const DECIMAL_PRECISION: u32 = 6;

/// Largest payout precision accepted from settings
pub const MAX_PAYOUT_PRECISION: u32 = 12;

/// Tolerance used when checking that ownership percentages sum to one
pub const PERCENTAGE_EPSILON: Decimal = dec!(0.000000001);

/// Share class id given to founders' common stock
pub const COMMON_CLASS_ID: &str = "common";

/// Share class id (and holder id) of the unallocated option pool
pub const OPTION_POOL_ID: &str = "option-pool";

/// Display name of the option pool holder
pub const OPTION_POOL_NAME: &str = "Option Pool";
