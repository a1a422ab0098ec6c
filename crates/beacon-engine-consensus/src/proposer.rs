//! Round-robin proposer selection.
//!
//! Selection is a pure function of the slot and the validator ordering, so
//! every instance observing the same set and clock agrees on the proposer.

use beacon_engine_core::{Slot, ValidatorSet};

use crate::error::ConsensusError;

/// Index of the proposer for `slot` among `validator_count` validators
pub fn proposer_index(slot: Slot, validator_count: usize) -> Result<usize, ConsensusError> {
    if validator_count == 0 {
        return Err(ConsensusError::Config(
            "cannot select a proposer from an empty validator set".to_string(),
        ));
    }
    Ok((slot % validator_count as u64) as usize)
}

/// Address of the proposer for `slot`
pub fn proposer_for(slot: Slot, validators: &ValidatorSet) -> Result<&str, ConsensusError> {
    let index = proposer_index(slot, validators.len())?;
    validators.get(index).ok_or_else(|| {
        ConsensusError::Config(format!("proposer index {index} out of range"))
    })
}

/// Whether `identity` proposes at `slot`
pub fn is_proposer(
    slot: Slot,
    validators: &ValidatorSet,
    identity: &str,
) -> Result<bool, ConsensusError> {
    Ok(is_local(proposer_for(slot, validators)?, identity))
}

/// Addresses compare ASCII case-insensitively
pub fn is_local(proposer: &str, identity: &str) -> bool {
    proposer.eq_ignore_ascii_case(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_engine_core::fallback_address;

    #[test]
    fn test_round_robin_sequence() {
        let indices: Vec<usize> = (0..10).map(|slot| proposer_index(slot, 5).unwrap()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_index_ignores_validator_content() {
        let a = ValidatorSet::fallback(3).unwrap();
        let b = ValidatorSet::new(vec!["x".into(), "y".into(), "z".into()]).unwrap();
        for slot in 0..30 {
            assert_eq!(
                proposer_index(slot, a.len()).unwrap(),
                proposer_index(slot, b.len()).unwrap()
            );
        }
    }

    #[test]
    fn test_empty_set_fails_fast() {
        assert!(matches!(
            proposer_index(7, 0),
            Err(ConsensusError::Config(_))
        ));
    }

    #[test]
    fn test_leader_rotation() {
        let validators = ValidatorSet::fallback(4).unwrap();

        for i in 0..4u64 {
            let identity = fallback_address(i as usize + 1);

            // At slot i, validator i should be proposer
            assert!(is_proposer(i, &validators, &identity).unwrap());
            // At slot i+4, validator i should be proposer again
            assert!(is_proposer(i + 4, &validators, &identity).unwrap());
            // At slot i+1, validator i should not be proposer
            assert!(!is_proposer(i + 1, &validators, &identity).unwrap());
        }
    }

    #[test]
    fn test_exactly_one_proposer_per_slot() {
        let validators = ValidatorSet::fallback(7).unwrap();
        for slot in 0..50 {
            let count = validators
                .iter()
                .filter(|identity| is_proposer(slot, &validators, identity).unwrap())
                .count();
            assert_eq!(count, 1);
        }
    }

    #[test]
    fn test_identity_case_does_not_matter() {
        let validators = ValidatorSet::new(vec!["0xABCD".to_string()]).unwrap();
        assert!(is_proposer(0, &validators, "0xabcd").unwrap());
        assert!(!is_proposer(0, &validators, "0xabce").unwrap());
    }

    #[test]
    fn test_large_slot_numbers() {
        assert_eq!(proposer_index(u64::MAX, 5).unwrap(), (u64::MAX % 5) as usize);
    }
}
