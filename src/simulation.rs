//! Load simulation against a development chain
//!
//! Deploys the contract from a compiled artifact, seeds a power-law network
//! of users and joint accounts, then drives random transfers and records how
//! often they succeed. Transactions are sent one at a time and never retried.

use crate::classify::classify;
use crate::contract::{ContractCall, ContractHandle};
use crate::error::{Error, Result};
use crate::failure::Failure;
use crate::orchestrator::{Confirmation, PendingCall};
use alloy::network::{ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::TransactionRequest;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// Mean initial balance of a seeded account, in ether
pub const MEAN_BALANCE_ETH: f64 = 10.0;
/// Success ratio is sampled every this many transfers
pub const RATIO_WINDOW: usize = 100;

const WEI_PER_MILLI_ETHER: u64 = 1_000_000_000_000_000;

/// Compiled contract artifact (Truffle or Foundry layout)
#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    #[serde(default)]
    pub abi: serde_json::Value,
    bytecode: ArtifactBytecode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ArtifactBytecode {
    Hex(Bytes),
    Object { object: Bytes },
}

impl Artifact {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Simulation(format!("{}: {}", path.display(), e)))?;
        let artifact: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Simulation(format!("{}: {}", path.display(), e)))?;
        if artifact.bytecode().is_empty() {
            return Err(Error::Simulation(format!(
                "{}: artifact has no bytecode",
                path.display()
            )));
        }
        Ok(artifact)
    }

    pub fn bytecode(&self) -> &Bytes {
        match &self.bytecode {
            ArtifactBytecode::Hex(bytes) => bytes,
            ArtifactBytecode::Object { object } => object,
        }
    }
}

/// Deploy the artifact's bytecode and wait for the contract address
pub async fn deploy(provider: &DynProvider, from: Address, artifact: &Artifact) -> Result<Address> {
    let tx = TransactionRequest::default()
        .with_from(from)
        .with_deploy_code(artifact.bytecode().clone());

    let pending = provider
        .send_transaction(tx)
        .await
        .map_err(|e| simulation_error("Deployment failed", Failure::from(e)))?;
    let receipt = pending
        .with_required_confirmations(1)
        .get_receipt()
        .await
        .map_err(|e| simulation_error("Deployment failed", Failure::from(e)))?;

    if !receipt.status() {
        return Err(Error::Simulation(format!(
            "Deployment reverted ({})",
            receipt.transaction_hash()
        )));
    }
    let address = receipt
        .contract_address()
        .ok_or_else(|| Error::Simulation("Deployment receipt has no contract address".into()))?;
    info!(contract = %address, "Contract deployed");
    Ok(address)
}

/// Power-law degree sequence: Pareto draws with exponent `alpha - 1`,
/// floored, at least 1 and at most `n - 1`
pub fn power_law_degrees<R: Rng>(n: usize, alpha: f64, rng: &mut R) -> Vec<usize> {
    let shape = (alpha - 1.0).max(f64::MIN_POSITIVE);
    let cap = n.saturating_sub(1).max(1);
    (0..n)
        .map(|_| {
            let u: f64 = rng.gen();
            let draw = (1.0 - u).powf(-1.0 / shape);
            (draw as usize).clamp(1, cap)
        })
        .collect()
}

/// Random undirected edges honouring each node's degree where possible.
/// No self-loops and no pair appears twice in either orientation.
pub fn build_edges<R: Rng>(degrees: &[usize], rng: &mut R) -> Vec<(usize, usize)> {
    let n = degrees.len();
    let mut seen = HashSet::new();
    let mut edges = Vec::new();

    for (i, &degree) in degrees.iter().enumerate() {
        let mut candidates: Vec<usize> = (0..n)
            .filter(|&j| j != i && !seen.contains(&(i.min(j), i.max(j))))
            .collect();
        candidates.shuffle(rng);

        for j in candidates.into_iter().take(degree) {
            seen.insert((i.min(j), i.max(j)));
            edges.push((i, j));
        }
    }
    edges
}

/// Exponentially distributed balance in wei, drawn in milli-ether
pub fn exponential_balance<R: Rng>(mean_eth: f64, rng: &mut R) -> U256 {
    let u: f64 = rng.gen();
    let eth = -mean_eth * (1.0 - u).ln();
    let milli = (eth * 1000.0).round().max(0.0) as u64;
    U256::from(milli) * U256::from(WEI_PER_MILLI_ETHER)
}

/// Success ratio sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioPoint {
    pub transactions: usize,
    pub ratio: f64,
}

/// Running success count with a sample every [`RATIO_WINDOW`] transactions
#[derive(Debug, Default, Clone)]
pub struct SuccessTracker {
    total: usize,
    successful: usize,
    ratios: Vec<RatioPoint>,
}

impl SuccessTracker {
    pub fn record(&mut self, success: bool) -> Option<&RatioPoint> {
        self.total += 1;
        if success {
            self.successful += 1;
        }
        if self.total % RATIO_WINDOW != 0 {
            return None;
        }
        self.ratios.push(RatioPoint {
            transactions: self.total,
            ratio: self.successful as f64 / self.total as f64,
        });
        self.ratios.last()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn successful(&self) -> usize {
        self.successful
    }

    pub fn ratios(&self) -> &[RatioPoint] {
        &self.ratios
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkReport {
    pub users: usize,
    pub edges: usize,
    pub accounts_opened: usize,
    pub accounts_failed: usize,
    pub total_deposit_wei: U256,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    pub transactions: usize,
    pub successful: usize,
    pub ratios: Vec<RatioPoint>,
}

/// Drives the contract from a single funded account
pub struct LoadSimulation {
    contract: ContractHandle,
    from: Address,
    rng: StdRng,
}

impl LoadSimulation {
    pub fn new(contract: ContractHandle, from: Address, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { contract, from, rng }
    }

    async fn execute(&self, call: &ContractCall) -> std::result::Result<Confirmation, Failure> {
        call.send(&self.contract, self.from).await?.confirm().await
    }

    /// Register `users` users and open power-law distributed joint accounts
    pub async fn seed_network(&mut self, users: usize, alpha: f64) -> Result<NetworkReport> {
        if users < 2 {
            return Err(Error::InvalidArgument(
                "at least two users are needed".to_string(),
            ));
        }

        for id in 0..users {
            let call = ContractCall::RegisterUser {
                user_id: U256::from(id),
                name: format!("User{}", id),
            };
            self.execute(&call)
                .await
                .map_err(|f| simulation_error(&format!("Registering user {}", id), f))?;
        }
        info!(users = users, "Users registered");

        let degrees = power_law_degrees(users, alpha, &mut self.rng);
        let edges = build_edges(&degrees, &mut self.rng);

        let mut report = NetworkReport {
            users,
            edges: edges.len(),
            accounts_opened: 0,
            accounts_failed: 0,
            total_deposit_wei: U256::ZERO,
        };

        for (user1, user2) in edges {
            let balance = exponential_balance(MEAN_BALANCE_ETH, &mut self.rng);
            let call = ContractCall::CreateAccount {
                user1: U256::from(user1),
                user2: U256::from(user2),
                initial_balance: balance,
            };
            match self.execute(&call).await {
                Ok(_) => {
                    report.accounts_opened += 1;
                    report.total_deposit_wei += balance;
                }
                Err(failure) => {
                    report.accounts_failed += 1;
                    warn!(user1 = user1, user2 = user2, error = %classify(&failure), "Account creation failed");
                }
            }
        }

        info!(
            opened = report.accounts_opened,
            failed = report.accounts_failed,
            "Network seeded"
        );
        Ok(report)
    }

    /// Send 1 ETH between random distinct users `count` times
    pub async fn drive_transfers(&mut self, users: usize, count: usize) -> Result<TransferReport> {
        if users < 2 {
            return Err(Error::InvalidArgument(
                "at least two users are needed".to_string(),
            ));
        }

        let one_ether = U256::from(1_000u64) * U256::from(WEI_PER_MILLI_ETHER);
        let mut tracker = SuccessTracker::default();

        for _ in 0..count {
            let from = self.rng.gen_range(0..users);
            let mut to = self.rng.gen_range(0..users);
            while to == from {
                to = self.rng.gen_range(0..users);
            }

            let call = ContractCall::SendAmount {
                from: U256::from(from),
                to: U256::from(to),
                amount: one_ether,
            };
            let success = self.execute(&call).await.is_ok();
            if let Some(point) = tracker.record(success) {
                info!(
                    transactions = point.transactions,
                    ratio = point.ratio,
                    "Success ratio"
                );
            }
        }

        Ok(TransferReport {
            transactions: tracker.total(),
            successful: tracker.successful(),
            ratios: tracker.ratios().to_vec(),
        })
    }
}

fn simulation_error(context: &str, failure: Failure) -> Error {
    Error::Simulation(format!("{}: {}", context, classify(&failure)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_degrees_are_bounded() {
        let degrees = power_law_degrees(50, 2.5, &mut rng());
        assert_eq!(degrees.len(), 50);
        assert!(degrees.iter().all(|&d| (1..=49).contains(&d)));
    }

    #[test]
    fn test_degrees_are_heavy_tailed() {
        let degrees = power_law_degrees(2_000, 2.5, &mut rng());
        let ones = degrees.iter().filter(|&&d| d == 1).count();
        // Most nodes sit at the minimum; a few hubs are much larger
        assert!(ones > 1_000);
        assert!(degrees.iter().any(|&d| d >= 10));
    }

    #[test]
    fn test_edges_have_no_loops_or_duplicates() {
        let mut rng = rng();
        let degrees = power_law_degrees(30, 2.0, &mut rng);
        let edges = build_edges(&degrees, &mut rng);

        let mut seen = HashSet::new();
        for &(a, b) in &edges {
            assert_ne!(a, b);
            assert!(seen.insert((a.min(b), a.max(b))), "duplicate edge {:?}", (a, b));
        }
    }

    #[test]
    fn test_edges_saturate_small_graphs() {
        // Every node wants more partners than exist
        let edges = build_edges(&[5, 5, 5], &mut rng());
        assert_eq!(edges.len(), 3);
    }

    #[test]
    fn test_exponential_balance_is_whole_milli_ether() {
        let mut rng = rng();
        let unit = U256::from(WEI_PER_MILLI_ETHER);
        let mut total = U256::ZERO;
        for _ in 0..1_000 {
            let balance = exponential_balance(MEAN_BALANCE_ETH, &mut rng);
            assert_eq!(balance % unit, U256::ZERO);
            total += balance;
        }
        let mean_milli = (total / unit).to::<u64>() / 1_000;
        assert!((8_000..12_000).contains(&mean_milli), "mean {}", mean_milli);
    }

    #[test]
    fn test_tracker_samples_every_window() {
        let mut tracker = SuccessTracker::default();
        for i in 0..250 {
            tracker.record(i % 4 != 0);
        }
        assert_eq!(tracker.total(), 250);
        assert_eq!(
            tracker.ratios(),
            &[
                RatioPoint {
                    transactions: 100,
                    ratio: 0.75
                },
                RatioPoint {
                    transactions: 200,
                    ratio: 0.75
                },
            ]
        );
    }

    #[test]
    fn test_artifact_layouts() {
        let mut truffle = tempfile::NamedTempFile::new().unwrap();
        write!(truffle, r#"{{"abi": [], "bytecode": "0x6080604052"}}"#).unwrap();
        let artifact = Artifact::from_file(truffle.path()).unwrap();
        assert_eq!(artifact.bytecode().len(), 5);

        let mut foundry = tempfile::NamedTempFile::new().unwrap();
        write!(foundry, r#"{{"abi": [], "bytecode": {{"object": "0x6080"}}}}"#).unwrap();
        let artifact = Artifact::from_file(foundry.path()).unwrap();
        assert_eq!(artifact.bytecode().len(), 2);

        let mut empty = tempfile::NamedTempFile::new().unwrap();
        write!(empty, r#"{{"bytecode": "0x"}}"#).unwrap();
        assert!(matches!(
            Artifact::from_file(empty.path()),
            Err(Error::Simulation(_))
        ));
    }
}
