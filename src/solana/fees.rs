//! Priority fees and compute budget instructions

use super::message::Message;
use super::programs::COMPUTE_BUDGET_PROGRAM_ID;

/// Compute units granted to each instruction without an explicit limit
pub const DEFAULT_UNITS_PER_INSTRUCTION: u32 = 200_000;
pub const MAX_COMPUTE_UNIT_LIMIT: u32 = 1_400_000;

const MICRO_LAMPORTS_PER_LAMPORT: u128 = 1_000_000;

/// Fee estimation data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    /// Base transaction fee in lamports
    pub base_fee: u64,
    /// Priority fee in micro-lamports per compute unit
    pub compute_unit_price: u64,
    pub compute_unit_limit: u32,
    /// Priority fee in lamports
    pub priority_fee: u64,
    pub total: u64,
}

/// Fee calculator for compiled messages
pub struct PriorityFeeCalculator {
    /// Base fee per signature (5000 lamports on mainnet)
    base_fee_per_signature: u64,
}

impl PriorityFeeCalculator {
    pub fn new() -> Self {
        Self {
            base_fee_per_signature: 5000,
        }
    }

    pub fn calculate_base_fee(&self, num_signatures: usize) -> u64 {
        self.base_fee_per_signature.saturating_mul(num_signatures as u64)
    }

    /// Read the compute budget instructions of `message` and price it
    pub fn estimate(&self, message: &Message) -> FeeEstimate {
        let mut price = None;
        let mut limit = None;
        let mut other_instructions = 0u32;

        for instruction in &message.instructions {
            if message.program_id(instruction) != Some(&COMPUTE_BUDGET_PROGRAM_ID) {
                other_instructions += 1;
                continue;
            }
            match compute_budget::parse(&instruction.data) {
                Some(compute_budget::ComputeBudget::UnitLimit(units)) => limit = Some(units),
                Some(compute_budget::ComputeBudget::UnitPrice(micro_lamports)) => {
                    price = Some(micro_lamports)
                }
                None => other_instructions += 1,
            }
        }

        let compute_unit_limit = limit.unwrap_or_else(|| {
            other_instructions
                .saturating_mul(DEFAULT_UNITS_PER_INSTRUCTION)
                .min(MAX_COMPUTE_UNIT_LIMIT)
        });
        let compute_unit_price = price.unwrap_or(0);
        let priority_fee = priority_fee(compute_unit_price, compute_unit_limit);
        let base_fee = self.calculate_base_fee(message.header.num_required_signatures as usize);

        FeeEstimate {
            base_fee,
            compute_unit_price,
            compute_unit_limit,
            priority_fee,
            total: base_fee.saturating_add(priority_fee),
        }
    }
}

impl Default for PriorityFeeCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// `ceil(price * limit / 1_000_000)` lamports
pub fn priority_fee(micro_lamports_per_unit: u64, units: u32) -> u64 {
    let micro = u128::from(micro_lamports_per_unit) * u128::from(units);
    let lamports = micro.div_ceil(MICRO_LAMPORTS_PER_LAMPORT);
    u64::try_from(lamports).unwrap_or(u64::MAX)
}

/// Compute budget program instructions
pub mod compute_budget {
    use super::COMPUTE_BUDGET_PROGRAM_ID;
    use crate::solana::instruction::{Instruction, InstructionEncoder};

    const SET_COMPUTE_UNIT_LIMIT: u8 = 0x02;
    const SET_COMPUTE_UNIT_PRICE: u8 = 0x03;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ComputeBudget {
        UnitLimit(u32),
        /// Micro-lamports per compute unit
        UnitPrice(u64),
    }

    pub fn set_compute_unit_limit(units: u32) -> Instruction {
        InstructionEncoder::new(COMPUTE_BUDGET_PROGRAM_ID)
            .append_u8(SET_COMPUTE_UNIT_LIMIT)
            .append_u32(units)
            .build()
    }

    pub fn set_compute_unit_price(micro_lamports: u64) -> Instruction {
        InstructionEncoder::new(COMPUTE_BUDGET_PROGRAM_ID)
            .append_u8(SET_COMPUTE_UNIT_PRICE)
            .append_u64(micro_lamports)
            .build()
    }

    pub fn parse(data: &[u8]) -> Option<ComputeBudget> {
        match data.split_first()? {
            (&SET_COMPUTE_UNIT_LIMIT, rest) => {
                Some(ComputeBudget::UnitLimit(u32::from_le_bytes(rest.try_into().ok()?)))
            }
            (&SET_COMPUTE_UNIT_PRICE, rest) => {
                Some(ComputeBudget::UnitPrice(u64::from_le_bytes(rest.try_into().ok()?)))
            }
            _ => None,
        }
    }
}
