//! Primary parent anime selection for character activities.

use std::cmp::Ordering;

use crate::domain::CharacterRole;
use crate::store::catalog::ParentCandidate;

const fn role_rank(role: CharacterRole) -> u8 {
    match role {
        CharacterRole::Main => 0,
        CharacterRole::Supporting => 1,
        CharacterRole::Background => 2,
    }
}

/// Total order over parent candidates; the smallest is the primary parent.
///
/// MAIN role first, then earlier `start_date` (unknown dates last), then
/// higher popularity (unknown last), then lower anime id.
#[must_use]
pub fn compare_candidates(a: &ParentCandidate, b: &ParentCandidate) -> Ordering {
    role_rank(a.role)
        .cmp(&role_rank(b.role))
        .then_with(|| match (&a.start_date, &b.start_date) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| match (a.popularity, b.popularity) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.anime_id.cmp(&b.anime_id))
}

/// The primary parent among `candidates`, or `None` for an unlinked character.
#[must_use]
pub fn choose_primary(candidates: &[ParentCandidate]) -> Option<&ParentCandidate> {
    candidates.iter().min_by(|a, b| compare_candidates(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_candidate(
        anime_id: i64,
        role: CharacterRole,
        start_date: Option<&str>,
        popularity: Option<i64>,
    ) -> ParentCandidate {
        ParentCandidate {
            anime_id,
            title: format!("anime-{anime_id}"),
            role,
            start_date: start_date.map(str::to_string),
            popularity,
        }
    }

    #[test]
    fn test_main_role_wins() {
        let candidates = vec![
            make_candidate(1, CharacterRole::Supporting, Some("2000-01-01"), Some(999)),
            make_candidate(2, CharacterRole::Main, Some("2020-01-01"), Some(1)),
        ];
        assert_eq!(choose_primary(&candidates).unwrap().anime_id, 2);
    }

    #[test]
    fn test_earlier_start_date_wins() {
        let candidates = vec![
            make_candidate(1, CharacterRole::Main, Some("2015-04-01"), Some(10)),
            make_candidate(2, CharacterRole::Main, Some("2013-04-07"), Some(5)),
            make_candidate(3, CharacterRole::Main, None, Some(100)),
        ];
        assert_eq!(choose_primary(&candidates).unwrap().anime_id, 2);
    }

    #[test]
    fn test_popularity_then_id_break_ties() {
        let candidates = vec![
            make_candidate(5, CharacterRole::Main, Some("2013-04-07"), Some(10)),
            make_candidate(4, CharacterRole::Main, Some("2013-04-07"), Some(50)),
        ];
        assert_eq!(choose_primary(&candidates).unwrap().anime_id, 4);

        let candidates = vec![
            make_candidate(9, CharacterRole::Supporting, None, None),
            make_candidate(3, CharacterRole::Supporting, None, None),
        ];
        assert_eq!(choose_primary(&candidates).unwrap().anime_id, 3);
    }

    #[test]
    fn test_order_independent() {
        let mut candidates = vec![
            make_candidate(1, CharacterRole::Background, Some("2001-01-01"), None),
            make_candidate(2, CharacterRole::Supporting, None, Some(3)),
            make_candidate(3, CharacterRole::Supporting, None, None),
        ];
        let forward = choose_primary(&candidates).unwrap().anime_id;
        candidates.reverse();
        assert_eq!(choose_primary(&candidates).unwrap().anime_id, forward);
        assert_eq!(forward, 2);
    }

    #[test]
    fn test_no_candidates() {
        assert!(choose_primary(&[]).is_none());
    }
}
