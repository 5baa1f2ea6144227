//! Stake table and validator selection.
//!
//! The stake table is the only shared mutable state of the stake path.
//! [`StakingManager`] owns it behind a single mutex so deposits and
//! selection never interleave: a selection always sees either all or none
//! of a concurrent deposit.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::types::{Address, Block, BlockCandidate, Seal};

use super::error::StakeError;

/// Insertion-ordered mapping from address to stake.
///
/// Enumeration follows first-deposit order, which is what makes tie-breaks
/// in [`StakeTable::select_validator`] deterministic.
#[derive(Clone, Debug, Default)]
pub struct StakeTable {
    entries: Vec<(Address, u64)>,
    index: HashMap<Address, usize>,
}

impl StakeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to `address`, registering it on first sight.
    pub fn add_stake(&mut self, address: Address, amount: i64) -> Result<u64, StakeError> {
        let amount = u64::try_from(amount).map_err(|_| StakeError::InvalidAmount(amount))?;

        match self.index.get(&address) {
            Some(&i) => {
                let entry = &mut self.entries[i].1;
                *entry = entry
                    .checked_add(amount)
                    .ok_or_else(|| StakeError::Overflow(address.clone()))?;
                Ok(*entry)
            }
            None => {
                self.index.insert(address.clone(), self.entries.len());
                self.entries.push((address, amount));
                Ok(amount)
            }
        }
    }

    /// Address with the highest positive stake; the earliest registered
    /// wins ties. Zero-stake entries are never selected.
    pub fn select_validator(&self) -> Result<Address, StakeError> {
        let mut best: Option<&(Address, u64)> = None;
        for entry in self.entries.iter().filter(|(_, stake)| *stake > 0) {
            match best {
                Some((_, max)) if entry.1 <= *max => {}
                _ => best = Some(entry),
            }
        }
        best.map(|(addr, _)| addr.clone())
            .ok_or(StakeError::NoStakers)
    }

    pub fn stake_of(&self, address: &Address) -> Option<u64> {
        self.index.get(address).map(|&i| self.entries[i].1)
    }

    /// Entries in first-deposit order.
    pub fn entries(&self) -> &[(Address, u64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_stake(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |acc, (_, s)| acc.saturating_add(*s))
    }
}

/// Owner of the stake table; every read and write goes through one lock.
#[derive(Debug, Default)]
pub struct StakingManager {
    table: Mutex<StakeTable>,
}

impl StakingManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposits stake and returns the new balance of `address`.
    pub fn add_stake(&self, address: impl Into<Address>, amount: i64) -> Result<u64, StakeError> {
        let address = address.into();
        let balance = self.table.lock().add_stake(address.clone(), amount)?;
        tracing::debug!(%address, amount, balance, "stake deposited");
        Ok(balance)
    }

    pub fn select_validator(&self) -> Result<Address, StakeError> {
        self.table.lock().select_validator()
    }

    /// Returns `true` iff `claimed` is the validator selected right now.
    pub fn is_selected(&self, claimed: &Address) -> bool {
        self.select_validator()
            .map(|selected| &selected == claimed)
            .unwrap_or(false)
    }

    /// Seals `candidate` under `claimed` if and only if `claimed` is the
    /// selected validator. Selection and sealing share one lock guard.
    pub fn seal_by_stake(
        &self,
        candidate: BlockCandidate,
        claimed: &Address,
    ) -> Result<Block, StakeError> {
        let table = self.table.lock();
        let selected = table.select_validator()?;
        if &selected != claimed {
            return Err(StakeError::NotSelected {
                claimed: claimed.clone(),
                selected,
            });
        }
        drop(table);

        Ok(candidate.seal(Seal::Stake {
            validator: selected,
        }))
    }

    /// A validator is eligible while it holds a positive stake.
    pub fn is_eligible(&self, address: &Address) -> bool {
        self.stake_of(address).is_some_and(|s| s > 0)
    }

    pub fn stake_of(&self, address: &Address) -> Option<u64> {
        self.table.lock().stake_of(address)
    }

    /// Ordered copy of the table, for reporting.
    pub fn snapshot(&self) -> Vec<(Address, u64)> {
        self.table.lock().entries().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::BlockHash;

    #[test]
    fn selects_strictly_maximal_stake() {
        let sm = StakingManager::new();
        sm.add_stake("A", 5).unwrap();
        sm.add_stake("B", 9).unwrap();
        sm.add_stake("C", 3).unwrap();

        assert_eq!(sm.select_validator().unwrap(), Address::from("B"));
    }

    #[test]
    fn empty_table_has_no_stakers() {
        let sm = StakingManager::new();
        assert_eq!(sm.select_validator(), Err(StakeError::NoStakers));
        assert!(!sm.is_selected(&Address::from("A")));
    }

    #[test]
    fn negative_amount_is_rejected_without_registering() {
        let sm = StakingManager::new();
        assert_eq!(sm.add_stake("A", -1), Err(StakeError::InvalidAmount(-1)));
        assert!(sm.stake_of(&Address::from("A")).is_none());
        assert_eq!(sm.select_validator(), Err(StakeError::NoStakers));
    }

    #[test]
    fn deposits_accumulate() {
        let sm = StakingManager::new();
        assert_eq!(sm.add_stake("A", 4).unwrap(), 4);
        assert_eq!(sm.add_stake("A", 6).unwrap(), 10);
        assert_eq!(sm.stake_of(&Address::from("A")), Some(10));
    }

    #[test]
    fn overflow_is_reported() {
        let mut table = StakeTable::new();
        table.add_stake(Address::from("A"), i64::MAX).unwrap();
        table.add_stake(Address::from("A"), i64::MAX).unwrap();
        let err = table.add_stake(Address::from("A"), i64::MAX).unwrap_err();
        assert_eq!(err, StakeError::Overflow(Address::from("A")));
    }

    #[test]
    fn ties_go_to_first_registered_address() {
        let mut table = StakeTable::new();
        table.add_stake(Address::from("Z"), 7).unwrap();
        table.add_stake(Address::from("A"), 7).unwrap();
        table.add_stake(Address::from("M"), 2).unwrap();
        assert_eq!(table.select_validator().unwrap(), Address::from("Z"));

        // Later deposits do not change registration order.
        table.add_stake(Address::from("A"), 1).unwrap();
        table.add_stake(Address::from("Z"), 1).unwrap();
        assert_eq!(table.select_validator().unwrap(), Address::from("Z"));
    }

    #[test]
    fn zero_stake_registers_but_is_never_selected() {
        let sm = StakingManager::new();
        sm.add_stake("A", 0).unwrap();
        assert_eq!(sm.stake_of(&Address::from("A")), Some(0));
        assert_eq!(sm.select_validator(), Err(StakeError::NoStakers));
        assert!(!sm.is_selected(&Address::from("A")));
        assert!(!sm.is_eligible(&Address::from("A")));

        let candidate = BlockCandidate::new(BlockHash::ZERO, b"pos".to_vec(), 1);
        assert_eq!(
            sm.seal_by_stake(candidate, &Address::from("A")),
            Err(StakeError::NoStakers)
        );

        sm.add_stake("B", 1).unwrap();
        assert_eq!(sm.select_validator().unwrap(), Address::from("B"));
        assert!(sm.is_eligible(&Address::from("B")));
    }

    #[test]
    fn seal_by_stake_only_accepts_selected_validator() {
        let sm = StakingManager::new();
        sm.add_stake("A", 5).unwrap();
        sm.add_stake("B", 9).unwrap();

        let candidate = BlockCandidate::new(BlockHash::ZERO, b"pos".to_vec(), 1);

        let err = sm
            .seal_by_stake(candidate.clone(), &Address::from("A"))
            .unwrap_err();
        assert_eq!(
            err,
            StakeError::NotSelected {
                claimed: Address::from("A"),
                selected: Address::from("B"),
            }
        );

        let block = sm.seal_by_stake(candidate, &Address::from("B")).unwrap();
        assert_eq!(block.validator(), Some(&Address::from("B")));
        assert!(block.hash_is_consistent());
    }

    #[test]
    fn concurrent_deposits_are_not_lost() {
        let sm = Arc::new(StakingManager::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sm = sm.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        sm.add_stake(format!("node-{}", i % 2).as_str(), 1).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snapshot = sm.snapshot();
        let total: u64 = snapshot.iter().map(|(_, s)| *s).sum();
        assert_eq!(total, 8_000);
        assert_eq!(snapshot.len(), 2);
    }
}
