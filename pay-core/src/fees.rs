//! Pluggable network-fee estimation, consulted before submission to check
//! the sender's SOL balance covers the transaction fee. §1's Non-goals
//! explicitly leave "fee schedule" open for an implementer to wire in; a
//! flat lamport fee is the only schedule this deployment needs today.

pub trait FeePolicy: Send + Sync {
    fn flat_fee_lamports(&self) -> u64 {
        5_000
    }
}

pub struct DefaultFeePolicy;

impl FeePolicy for DefaultFeePolicy {}
