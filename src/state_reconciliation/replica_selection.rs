//! Choosing a user's next replica set

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;

use super::errors::{ReconciliationError, ReconciliationResult};
use super::types::NewReplicaSet;
use crate::observability::Logger;
use crate::peers::ReplicaClient;
use crate::reconfig::ReconfigMode;
use crate::state_monitoring::{UserInfo, UserReplicaRecord};

/// Random draws allowed when looking for new replicas
pub const MAX_SELECT_NEW_REPLICA_SET_ATTEMPTS: usize = 100;

fn clock_of(infos: &HashMap<String, UserInfo>, endpoint: &str) -> i64 {
    infos.get(endpoint).map(|info| info.clock).unwrap_or(-1)
}

/// Decide the next replica set for `user` given which replicas are unhealthy.
///
/// | unhealthy                | new primary              | kept secondary | new nodes | mode |
/// |--------------------------|--------------------------|----------------|-----------|------|
/// | one secondary            | primary                  | other          | 1 | `ONE_SECONDARY` |
/// | primary                  | secondary w/ higher clock | other         | 1 | `PRIMARY_AND_OR_SECONDARIES` |
/// | both secondaries         | primary                  | none           | 2 | `MULTIPLE_SECONDARIES` |
/// | primary + one secondary  | healthy secondary        | none           | 2 | `PRIMARY_AND_OR_SECONDARIES` |
/// | all three                | no reconfig              |                |   | |
///
/// An empty secondary slot counts as unhealthy. `issue_reconfig` is set
/// whenever a change is needed; the caller clears it when the mode is not
/// enabled.
pub async fn determine_new_replica_set(
    user: &UserReplicaRecord,
    unhealthy_replicas: &[String],
    replica_to_user_info: &HashMap<String, UserInfo>,
    healthy_nodes: &[String],
    replicas: &dyn ReplicaClient,
) -> ReconciliationResult<NewReplicaSet> {
    let unhealthy: HashSet<&str> = unhealthy_replicas.iter().map(String::as_str).collect();
    let is_unhealthy = |endpoint: &str| endpoint.is_empty() || unhealthy.contains(endpoint);

    let primary = user.primary.as_str();
    let s1 = user.secondary1.as_str();
    let s2 = user.secondary2.as_str();
    let (primary_bad, s1_bad, s2_bad) = (is_unhealthy(primary), is_unhealthy(s1), is_unhealthy(s2));

    let (new_primary, kept_secondary, num_new, mode) = match (primary_bad, s1_bad, s2_bad) {
        (false, false, false) => return Ok(NewReplicaSet::no_reconfig()),
        (true, true, true) => {
            Logger::error(
                "REPLICA_SET_ALL_UNHEALTHY",
                &[("wallet", user.wallet.as_str()), ("primary", primary)],
            );
            return Ok(NewReplicaSet::no_reconfig());
        }
        (false, true, false) => (primary, Some(s2), 1, ReconfigMode::OneSecondary),
        (false, false, true) => (primary, Some(s1), 1, ReconfigMode::OneSecondary),
        (true, false, false) => {
            let (promoted, kept) = if clock_of(replica_to_user_info, s1) >= clock_of(replica_to_user_info, s2) {
                (s1, s2)
            } else {
                (s2, s1)
            };
            (promoted, Some(kept), 1, ReconfigMode::PrimaryAndOrSecondaries)
        }
        (false, true, true) => (primary, None, 2, ReconfigMode::MultipleSecondaries),
        (true, false, true) => (s1, None, 2, ReconfigMode::PrimaryAndOrSecondaries),
        (true, true, false) => (s2, None, 2, ReconfigMode::PrimaryAndOrSecondaries),
    };

    let current: Vec<&str> = [primary, s1, s2]
        .into_iter()
        .filter(|endpoint| !endpoint.is_empty())
        .collect();
    let mut new_nodes =
        select_random_replica_set_nodes(&user.wallet, &current, num_new, healthy_nodes, replicas)
            .await?
            .into_iter();

    let new_secondary1 = match kept_secondary {
        Some(kept) => kept.to_string(),
        None => new_nodes.next().unwrap_or_default(),
    };
    let new_secondary2 = new_nodes.next().unwrap_or_default();

    Ok(NewReplicaSet {
        new_primary: Some(new_primary.to_string()),
        new_secondary1: Some(new_secondary1),
        new_secondary2: Some(new_secondary2),
        issue_reconfig: true,
        reconfig_type: Some(mode),
    })
}

/// Draw `count` distinct nodes from `healthy_nodes` at random, skipping the
/// user's current replicas and any node that already holds data for the
/// wallet (clock other than -1; a clock of 0 is accepted with a warning).
pub async fn select_random_replica_set_nodes(
    wallet: &str,
    exclude: &[&str],
    count: usize,
    healthy_nodes: &[String],
    replicas: &dyn ReplicaClient,
) -> ReconciliationResult<Vec<String>> {
    let mut chosen: Vec<String> = Vec::with_capacity(count);
    let mut rejected: HashSet<String> = HashSet::new();
    let mut attempts = 0;

    while chosen.len() < count && attempts < MAX_SELECT_NEW_REPLICA_SET_ATTEMPTS {
        attempts += 1;
        let candidate = match healthy_nodes.choose(&mut rand::thread_rng()) {
            Some(candidate) => candidate.clone(),
            None => break,
        };
        if exclude.contains(&candidate.as_str())
            || chosen.contains(&candidate)
            || rejected.contains(&candidate)
        {
            continue;
        }

        match replicas.clock_value(&candidate, wallet).await {
            Ok(-1) => chosen.push(candidate),
            Ok(0) => {
                Logger::warn(
                    "NEW_REPLICA_HAS_ZERO_CLOCK",
                    &[("wallet", wallet), ("endpoint", candidate.as_str())],
                );
                chosen.push(candidate);
            }
            Ok(clock) => {
                let clock = clock.to_string();
                Logger::warn(
                    "NEW_REPLICA_HAS_USER_DATA",
                    &[("wallet", wallet), ("endpoint", candidate.as_str()), ("clock", clock.as_str())],
                );
                rejected.insert(candidate);
            }
            Err(e) => {
                let err = e.to_string();
                Logger::warn(
                    "NEW_REPLICA_CLOCK_CHECK_FAILED",
                    &[("wallet", wallet), ("endpoint", candidate.as_str()), ("error", err.as_str())],
                );
                rejected.insert(candidate);
            }
        }
    }

    if chosen.len() < count {
        return Err(ReconciliationError::NotEnoughHealthyNodes {
            needed: count,
            found: chosen.len(),
            attempts,
        });
    }
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::{PeerError, PeerFuture};

    struct Clocks(HashMap<String, i64>);

    impl ReplicaClient for Clocks {
        fn clock_value<'a>(&'a self, endpoint: &'a str, _wallet: &'a str) -> PeerFuture<'a, i64> {
            let clock = self.0.get(endpoint).copied();
            Box::pin(async move { clock.ok_or_else(|| PeerError::Unreachable("down".into())) })
        }
    }

    fn fresh(nodes: &[&str]) -> Clocks {
        Clocks(nodes.iter().map(|n| (n.to_string(), -1)).collect())
    }

    fn user() -> UserReplicaRecord {
        UserReplicaRecord {
            wallet: "0xabc".into(),
            user_id: 1,
            primary: "http://p.co".into(),
            secondary1: "http://s1.co".into(),
            secondary2: "http://s2.co".into(),
            primary_sp_id: 1,
            secondary1_sp_id: 2,
            secondary2_sp_id: 3,
        }
    }

    fn infos(s1: i64, s2: i64) -> HashMap<String, UserInfo> {
        HashMap::from([
            ("http://s1.co".to_string(), UserInfo { clock: s1, files_hash: None }),
            ("http://s2.co".to_string(), UserInfo { clock: s2, files_hash: None }),
        ])
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_one_unhealthy_secondary() {
        let healthy = strings(&["http://p.co", "http://s1.co", "http://n1.co"]);
        let set = determine_new_replica_set(
            &user(),
            &strings(&["http://s2.co"]),
            &infos(1, 1),
            &healthy,
            &fresh(&["http://n1.co"]),
        )
        .await
        .unwrap();

        assert!(set.issue_reconfig);
        assert_eq!(set.reconfig_type, Some(ReconfigMode::OneSecondary));
        assert_eq!(set.new_primary.as_deref(), Some("http://p.co"));
        assert_eq!(set.new_secondary1.as_deref(), Some("http://s1.co"));
        assert_eq!(set.new_secondary2.as_deref(), Some("http://n1.co"));
    }

    #[tokio::test]
    async fn test_unhealthy_primary_promotes_higher_clock() {
        let healthy = strings(&["http://n1.co"]);
        let set = determine_new_replica_set(
            &user(),
            &strings(&["http://p.co"]),
            &infos(3, 7),
            &healthy,
            &fresh(&["http://n1.co"]),
        )
        .await
        .unwrap();

        assert_eq!(set.reconfig_type, Some(ReconfigMode::PrimaryAndOrSecondaries));
        assert_eq!(set.new_primary.as_deref(), Some("http://s2.co"));
        assert_eq!(set.new_secondary1.as_deref(), Some("http://s1.co"));
        assert_eq!(set.new_secondary2.as_deref(), Some("http://n1.co"));
    }

    #[tokio::test]
    async fn test_equal_clocks_promote_secondary1() {
        let set = determine_new_replica_set(
            &user(),
            &strings(&["http://p.co"]),
            &infos(4, 4),
            &strings(&["http://n1.co"]),
            &fresh(&["http://n1.co"]),
        )
        .await
        .unwrap();
        assert_eq!(set.new_primary.as_deref(), Some("http://s1.co"));
    }

    #[tokio::test]
    async fn test_both_secondaries_unhealthy() {
        let healthy = strings(&["http://n1.co", "http://n2.co"]);
        let set = determine_new_replica_set(
            &user(),
            &strings(&["http://s1.co", "http://s2.co"]),
            &infos(1, 1),
            &healthy,
            &fresh(&["http://n1.co", "http://n2.co"]),
        )
        .await
        .unwrap();

        assert_eq!(set.reconfig_type, Some(ReconfigMode::MultipleSecondaries));
        assert_eq!(set.new_primary.as_deref(), Some("http://p.co"));
        let mut secondaries = vec![set.new_secondary1.unwrap(), set.new_secondary2.unwrap()];
        secondaries.sort();
        assert_eq!(secondaries, healthy);
    }

    #[tokio::test]
    async fn test_primary_and_secondary_unhealthy() {
        let healthy = strings(&["http://n1.co", "http://n2.co"]);
        let set = determine_new_replica_set(
            &user(),
            &strings(&["http://p.co", "http://s1.co"]),
            &infos(1, 1),
            &healthy,
            &fresh(&["http://n1.co", "http://n2.co"]),
        )
        .await
        .unwrap();

        assert_eq!(set.reconfig_type, Some(ReconfigMode::PrimaryAndOrSecondaries));
        assert_eq!(set.new_primary.as_deref(), Some("http://s2.co"));
    }

    #[tokio::test]
    async fn test_all_unhealthy_no_reconfig() {
        let set = determine_new_replica_set(
            &user(),
            &strings(&["http://p.co", "http://s1.co", "http://s2.co"]),
            &infos(1, 1),
            &strings(&["http://n1.co"]),
            &fresh(&["http://n1.co"]),
        )
        .await
        .unwrap();
        assert!(!set.issue_reconfig);
        assert_eq!(set.reconfig_type, None);
    }

    #[tokio::test]
    async fn test_nodes_with_user_data_are_rejected() {
        let clocks = Clocks(HashMap::from([
            ("http://n1.co".to_string(), 12),
            ("http://n2.co".to_string(), 0),
        ]));
        let chosen = select_random_replica_set_nodes(
            "0xabc",
            &[],
            1,
            &strings(&["http://n1.co", "http://n2.co"]),
            &clocks,
        )
        .await
        .unwrap();
        assert_eq!(chosen, strings(&["http://n2.co"]));
    }

    #[tokio::test]
    async fn test_not_enough_nodes() {
        let err = select_random_replica_set_nodes(
            "0xabc",
            &["http://p.co"],
            2,
            &strings(&["http://p.co", "http://n1.co"]),
            &fresh(&["http://n1.co"]),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ReconciliationError::NotEnoughHealthyNodes { needed: 2, found: 1, .. }
        ));
    }
}
