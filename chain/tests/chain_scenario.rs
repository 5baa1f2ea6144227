//! End-to-end chain behaviour through the public API.

use std::sync::Arc;

use chain::{
    Address, BlockHash, Chain, ConsensusConfig, ConsensusError, StakeError, StakingManager,
    ValidationError, consensus::meets_target,
};

fn config() -> ConsensusConfig {
    ConsensusConfig::with_difficulty(8)
}

#[test]
fn genesis_then_two_appends_validates_until_a_payload_byte_flips() {
    let mut chain = Chain::genesis_with(config()).expect("genesis");
    chain.append("Block 1 Data").expect("block 1");
    chain.append("Block 2 Data").expect("block 2");

    assert_eq!(chain.len(), 3);
    assert!(chain.validate());

    let payloads: Vec<&[u8]> = chain.blocks().iter().map(|b| b.payload.as_slice()).collect();
    assert_eq!(
        payloads,
        vec![&b"Genesis Block"[..], b"Block 1 Data", b"Block 2 Data"]
    );
    for block in chain.blocks() {
        assert!(meets_target(&block.hash, 8));
    }

    chain.store_mut().block_mut(1).unwrap().payload[0] ^= 0x01;
    assert!(!chain.validate());
    assert!(matches!(
        chain.validate_detailed(),
        Err(ValidationError::HashMismatch { index: 1, .. })
    ));
}

#[test]
fn mixed_seal_policies_validate_per_block() {
    let staking = Arc::new(StakingManager::new());
    for (addr, amount) in [("A", 5), ("B", 9), ("C", 3)] {
        staking.add_stake(addr, amount).unwrap();
    }
    assert_eq!(staking.select_validator().unwrap(), Address::from("B"));

    let mut chain = Chain::genesis_with(config())
        .unwrap()
        .with_staking(staking.clone());
    chain.append("mined").unwrap();
    chain
        .append_by_stake("by stake", &Address::from("B"), &staking)
        .unwrap();
    chain.append("mined again").unwrap();
    assert!(chain.validate());

    let err = chain
        .append_by_stake("wrong validator", &Address::from("C"), &staking)
        .unwrap_err();
    assert!(matches!(
        err,
        ConsensusError::Stake(StakeError::NotSelected { .. })
    ));
    assert_eq!(chain.len(), 4);
}

#[test]
fn empty_stake_table_has_no_validator() {
    let staking = StakingManager::new();
    assert!(matches!(
        staking.select_validator(),
        Err(StakeError::NoStakers)
    ));
    assert!(matches!(
        staking.add_stake("A", -1),
        Err(StakeError::InvalidAmount(-1))
    ));
}

#[test]
fn genesis_points_at_the_zero_digest() {
    let chain = Chain::genesis_with(config()).unwrap();
    assert_eq!(chain.blocks()[0].previous_hash, BlockHash::ZERO);
    assert!(chain.blocks()[0].previous_hash.0.is_zero());
}
