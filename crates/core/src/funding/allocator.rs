use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Order in which shortfall accounts are considered by [`allocate`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationPolicy {
    /// Cheapest top-ups first; funds the most accounts under a tight budget.
    #[default]
    SmallestNeedFirst,
    LargestNeedFirst,
    /// Candidate order as given.
    InputOrder,
}

/// An account whose balance is below the per-account requirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shortfall {
    pub index: u64,
    pub address: Address,
    /// `required - balance`; always non-zero.
    pub missing: U256,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Entries chosen for funding, in the order they were taken.
    pub funded: Vec<Shortfall>,
    pub unfunded: Vec<Shortfall>,
    /// Sum of `missing` over `funded`.
    pub spent: U256,
    /// Budget left after every funded entry and its transfer reserve.
    pub remaining_budget: U256,
}

/// Greedily splits `budget` over `shortfalls`.
///
/// Entries are visited in `policy` order (ties keep input order). An entry is
/// taken while the remaining budget covers its missing amount plus
/// `reserve_per_transfer`, the cost of the funding transaction itself; the walk
/// stops at the first entry that does not fit. Nothing here touches the network.
pub fn allocate(
    shortfalls: &[Shortfall],
    budget: U256,
    reserve_per_transfer: U256,
    policy: AllocationPolicy,
) -> Allocation {
    let mut ordered = shortfalls.to_vec();
    match policy {
        // sort_by_key is stable, so equal needs keep their input order
        AllocationPolicy::SmallestNeedFirst => ordered.sort_by_key(|s| s.missing),
        AllocationPolicy::LargestNeedFirst => {
            ordered.sort_by_key(|s| std::cmp::Reverse(s.missing))
        }
        AllocationPolicy::InputOrder => {}
    }

    let mut allocation = Allocation {
        remaining_budget: budget,
        ..Default::default()
    };
    let mut entries = ordered.into_iter();
    for entry in entries.by_ref() {
        let cost = entry.missing.saturating_add(reserve_per_transfer);
        if cost > allocation.remaining_budget {
            allocation.unfunded.push(entry);
            break;
        }
        allocation.remaining_budget -= cost;
        allocation.spent += entry.missing;
        allocation.funded.push(entry);
    }
    allocation.unfunded.extend(entries);
    allocation
}
