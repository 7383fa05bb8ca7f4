use crate::db::models::{Gender, SexualPreference};

/// Whether `candidate` belongs in the browsing feed of `requester`.
///
/// A missing requester preference counts as bisexual, and a missing requester
/// gender disables the filter. Candidates without a gender never match
/// otherwise. Candidate preferences must accept the requester in return.
pub fn is_compatible(
    requester_gender: Option<Gender>,
    requester_pref: Option<SexualPreference>,
    candidate_gender: Option<Gender>,
    candidate_pref: Option<SexualPreference>,
) -> bool {
    let Some(own) = requester_gender else {
        return true;
    };
    let Some(theirs) = candidate_gender else {
        return false;
    };

    let same = own == theirs;
    let wants = match requester_pref.unwrap_or(SexualPreference::Bisexual) {
        SexualPreference::Straight => !same,
        SexualPreference::Gay => same,
        SexualPreference::Bisexual => true,
    };
    if !wants {
        return false;
    }

    match candidate_pref {
        None | Some(SexualPreference::Bisexual) => true,
        Some(SexualPreference::Straight) => !same,
        Some(SexualPreference::Gay) => same,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Gender::*;
    use SexualPreference::*;

    #[test]
    fn test_straight_requester() {
        assert!(is_compatible(Some(Male), Some(Straight), Some(Female), Some(Straight)));
        assert!(is_compatible(Some(Male), Some(Straight), Some(Female), Some(Bisexual)));
        assert!(is_compatible(Some(Male), Some(Straight), Some(Female), None));
        assert!(!is_compatible(Some(Male), Some(Straight), Some(Female), Some(Gay)));
        assert!(!is_compatible(Some(Male), Some(Straight), Some(Male), Some(Straight)));
    }

    #[test]
    fn test_gay_requester() {
        assert!(is_compatible(Some(Female), Some(Gay), Some(Female), Some(Gay)));
        assert!(is_compatible(Some(Female), Some(Gay), Some(Female), Some(Bisexual)));
        assert!(!is_compatible(Some(Female), Some(Gay), Some(Female), Some(Straight)));
        assert!(!is_compatible(Some(Female), Some(Gay), Some(Male), Some(Gay)));
    }

    #[test]
    fn test_bisexual_requester() {
        assert!(is_compatible(Some(Male), Some(Bisexual), Some(Female), Some(Straight)));
        assert!(is_compatible(Some(Male), Some(Bisexual), Some(Male), Some(Gay)));
        assert!(!is_compatible(Some(Male), Some(Bisexual), Some(Male), Some(Straight)));
        assert!(!is_compatible(Some(Male), Some(Bisexual), Some(Female), Some(Gay)));
    }

    #[test]
    fn test_missing_values() {
        // no preference behaves as bisexual
        assert!(is_compatible(Some(Male), None, Some(Male), Some(Gay)));
        assert!(is_compatible(None, Some(Straight), Some(Male), Some(Straight)));
        assert!(is_compatible(None, None, None, None));
        assert!(!is_compatible(Some(Male), Some(Bisexual), None, None));
    }
}
