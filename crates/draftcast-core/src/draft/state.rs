// Derived per-draft state: pick count, round, available player pool.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::pick::Pick;
use crate::catalog::{Catalog, Player};

/// Round for a given pick count.
///
/// Round 1 until the first pick lands, then `pick_count / teams + 1`.
/// `teams_per_league` of zero is treated as one team per round.
pub fn round_for(pick_count: usize, teams_per_league: u32) -> u32 {
    if pick_count == 0 {
        return 1;
    }
    let teams = teams_per_league.max(1) as usize;
    (pick_count / teams + 1) as u32
}

/// Summary broadcast to viewers on every detected change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSummary {
    pub pick_count: usize,
    pub round: u32,
}

/// The derived state of one draft.
///
/// Always rebuilt from the full pick list, never patched, so upstream edits
/// or retractions can't leave it out of sync.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftState {
    pub draft_id: String,
    pub pick_count: usize,
    pub round: u32,
    /// Catalog ids not present in the pick list, ascending.
    pub available_player_ids: BTreeSet<String>,
}

impl DraftState {
    /// Compute the state for `draft_id` from the authoritative pick list.
    pub fn compute(
        draft_id: &str,
        picks: &[Pick],
        catalog: &Catalog,
        teams_per_league: u32,
    ) -> Self {
        let picked: HashSet<&str> = picks.iter().map(|p| p.player_id.as_str()).collect();
        let available_player_ids = catalog
            .ids()
            .filter(|id| !picked.contains(id))
            .map(String::from)
            .collect();

        DraftState {
            draft_id: draft_id.to_string(),
            pick_count: picks.len(),
            round: round_for(picks.len(), teams_per_league),
            available_player_ids,
        }
    }

    pub fn summary(&self) -> StateSummary {
        StateSummary {
            pick_count: self.pick_count,
            round: self.round,
        }
    }

    /// Resolve the available ids against the catalog, in id order.
    pub fn available_players<'a>(&self, catalog: &'a Catalog) -> Vec<&'a Player> {
        self.available_player_ids
            .iter()
            .filter_map(|id| catalog.get(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::pick::Position;

    fn player(id: &str) -> Player {
        Player {
            id: id.into(),
            name: format!("Player {id}"),
            position: Position::WideReceiver,
            team: None,
            bye_week: None,
            adp: None,
        }
    }

    fn catalog(ids: &[&str]) -> Catalog {
        Catalog::from_players(ids.iter().map(|id| player(id)))
    }

    fn picks(ids: &[&str]) -> Vec<Pick> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Pick {
                overall_pick: i as u32 + 1,
                player_id: id.to_string(),
                team_id: format!("team_{}", i % 10 + 1),
            })
            .collect()
    }

    #[test]
    fn round_is_one_before_any_pick() {
        assert_eq!(round_for(0, 10), 1);
    }

    #[test]
    fn round_matches_floor_division() {
        assert_eq!(round_for(1, 10), 1);
        assert_eq!(round_for(9, 10), 1);
        assert_eq!(round_for(10, 10), 2);
        assert_eq!(round_for(19, 10), 2);
        assert_eq!(round_for(20, 10), 3);
        assert_eq!(round_for(24, 12), 3);
    }

    #[test]
    fn round_is_monotonic_for_non_decreasing_counts() {
        for teams in [8u32, 10, 12, 14] {
            let mut prev = round_for(0, teams);
            for count in 0..300usize {
                let round = round_for(count, teams);
                assert!(round >= prev, "round decreased at count {count}");
                if count > 0 {
                    assert_eq!(round as usize, count / teams as usize + 1);
                }
                prev = round;
            }
        }
    }

    #[test]
    fn zero_teams_does_not_divide_by_zero() {
        assert_eq!(round_for(5, 0), 6);
    }

    #[test]
    fn available_is_catalog_minus_picked() {
        let cat = catalog(&["1", "2", "3", "4", "5"]);
        let state = DraftState::compute("d1", &picks(&["2", "4"]), &cat, 10);

        let expected: BTreeSet<String> = ["1", "3", "5"].iter().map(|s| s.to_string()).collect();
        assert_eq!(state.available_player_ids, expected);
        assert_eq!(state.pick_count, 2);
        assert_eq!(state.round, 1);
        assert_eq!(state.draft_id, "d1");
    }

    #[test]
    fn no_player_is_both_picked_and_available() {
        let cat = catalog(&["1", "2", "3", "4", "5", "6"]);
        let pick_list = picks(&["6", "1", "3"]);
        let state = DraftState::compute("d1", &pick_list, &cat, 10);
        for pick in &pick_list {
            assert!(!state.available_player_ids.contains(&pick.player_id));
        }
        assert_eq!(state.available_player_ids.len() + pick_list.len(), cat.len());
    }

    #[test]
    fn picks_outside_catalog_still_count() {
        let cat = catalog(&["1", "2"]);
        let state = DraftState::compute("d1", &picks(&["999", "1"]), &cat, 2);
        assert_eq!(state.pick_count, 2);
        assert_eq!(state.round, 2);
        assert_eq!(state.available_player_ids.len(), 1);
        assert!(state.available_player_ids.contains("2"));
    }

    #[test]
    fn recompute_after_retraction_restores_player() {
        let cat = catalog(&["1", "2", "3"]);
        let before = DraftState::compute("d1", &picks(&["1", "2"]), &cat, 10);
        assert!(!before.available_player_ids.contains("2"));

        let after = DraftState::compute("d1", &picks(&["1"]), &cat, 10);
        assert!(after.available_player_ids.contains("2"));
        assert_eq!(after.pick_count, 1);
    }

    #[test]
    fn summary_and_available_players() {
        let cat = catalog(&["1", "2", "3"]);
        let state = DraftState::compute("d1", &picks(&["2"]), &cat, 10);
        assert_eq!(
            state.summary(),
            StateSummary {
                pick_count: 1,
                round: 1
            }
        );
        let ids: Vec<&str> = state
            .available_players(&cat)
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
    }
}
