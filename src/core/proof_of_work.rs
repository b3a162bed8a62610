use crate::error::{BlockchainError, Result};
use crate::utils::sha256_digest;
use log::debug;
use num_bigint::{BigInt, Sign};
use std::borrow::Borrow;
use std::ops::ShlAssign;

/// Difficulty counts required leading zero bits of the SHA-256 digest
pub const MAX_DIFFICULTY: u32 = 256;

const MAX_NONCE: u64 = u64::MAX;

pub struct ProofOfWork {
    target: BigInt,
    difficulty: u32,
}

impl ProofOfWork {
    pub fn new_proof_of_work(difficulty: u32) -> Result<ProofOfWork> {
        if difficulty > MAX_DIFFICULTY {
            return Err(BlockchainError::Validation(format!(
                "Difficulty {difficulty} exceeds {MAX_DIFFICULTY} bits"
            )));
        }
        let mut target = BigInt::from(1);
        target.shl_assign(MAX_DIFFICULTY - difficulty);
        Ok(ProofOfWork { target, difficulty })
    }

    /// Find the first nonce whose digest falls below the target
    pub fn solve(data: &[u8], difficulty: u32) -> Result<(u64, Vec<u8>)> {
        ProofOfWork::new_proof_of_work(difficulty)?.run(data)
    }

    /// Recompute the digest for `nonce` and check it against the target
    pub fn validate(data: &[u8], nonce: u64, difficulty: u32) -> bool {
        match ProofOfWork::new_proof_of_work(difficulty) {
            Ok(pow) => pow.meets_target(&Self::hash_with_nonce(data, nonce)),
            Err(_) => false,
        }
    }

    pub fn hash_with_nonce(data: &[u8], nonce: u64) -> Vec<u8> {
        sha256_digest(Self::prepare_data(data, nonce).as_slice())
    }

    fn prepare_data(data: &[u8], nonce: u64) -> Vec<u8> {
        let mut data_bytes = Vec::with_capacity(data.len() + 8);
        data_bytes.extend_from_slice(data);
        data_bytes.extend(nonce.to_be_bytes());
        data_bytes
    }

    fn meets_target(&self, hash: &[u8]) -> bool {
        let hash_int = BigInt::from_bytes_be(Sign::Plus, hash);
        hash_int.lt(self.target.borrow())
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn run(&self, data: &[u8]) -> Result<(u64, Vec<u8>)> {
        let mut nonce = 0;
        loop {
            let hash = Self::hash_with_nonce(data, nonce);
            if self.meets_target(&hash) {
                debug!("Found nonce {nonce} at difficulty {}", self.difficulty);
                return Ok((nonce, hash));
            }
            if nonce == MAX_NONCE {
                return Err(BlockchainError::Mining(format!(
                    "Nonce space exhausted at difficulty {}",
                    self.difficulty
                )));
            }
            nonce += 1;
        }
    }
}
