use serenity::model::id::UserId;
use std::collections::HashSet;

pub const DEFAULT_REQUIRED_VOTES: usize = 3;

/// Skip votes for the song that is currently playing.
///
/// The requester of a song may always skip it outright. Everyone else votes,
/// each voter counting once per song, and the song is skipped once the number
/// of distinct voters reaches `required`.
#[derive(Debug, Clone)]
pub struct SkipVoteTracker {
    voters: HashSet<UserId>,
    required: usize,
}

/// Result of a single skip request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipVote {
    /// The requester asked; skip now.
    Requester,
    /// The vote reached the threshold; skip now.
    Passed { votes: usize },
    /// Counted, more votes are needed.
    Counted { votes: usize, required: usize },
    /// This voter already voted for the current song.
    AlreadyVoted { votes: usize, required: usize },
}

impl SkipVote {
    pub fn triggers_skip(&self) -> bool {
        matches!(self, Self::Requester | Self::Passed { .. })
    }
}

impl Default for SkipVoteTracker {
    fn default() -> Self {
        Self::new(DEFAULT_REQUIRED_VOTES)
    }
}

impl SkipVoteTracker {
    pub fn new(required: usize) -> Self {
        Self {
            voters: HashSet::new(),
            required: required.max(1),
        }
    }

    /// Records a vote and returns the number of distinct voters so far.
    pub fn register_vote(&mut self, voter: UserId) -> usize {
        self.voters.insert(voter);
        self.voters.len()
    }

    /// Applies the skip policy for `voter` against a song requested by `requester`.
    pub fn vote(&mut self, voter: UserId, requester: UserId) -> SkipVote {
        if voter == requester {
            return SkipVote::Requester;
        }

        if self.voters.contains(&voter) {
            return SkipVote::AlreadyVoted {
                votes: self.voters.len(),
                required: self.required,
            };
        }

        let votes = self.register_vote(voter);
        if votes >= self.required {
            SkipVote::Passed { votes }
        } else {
            SkipVote::Counted {
                votes,
                required: self.required,
            }
        }
    }

    pub fn reset(&mut self) {
        self.voters.clear();
    }

    pub fn count(&self) -> usize {
        self.voters.len()
    }

    pub fn required(&self) -> usize {
        self.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REQUESTER: UserId = UserId::new(100);

    #[test]
    fn requester_skips_immediately() {
        let mut votes = SkipVoteTracker::new(3);
        assert_eq!(votes.vote(REQUESTER, REQUESTER), SkipVote::Requester);
        assert_eq!(votes.count(), 0);
    }

    #[test]
    fn third_distinct_voter_passes() {
        let mut votes = SkipVoteTracker::new(3);
        assert_eq!(votes.vote(UserId::new(1), REQUESTER), SkipVote::Counted { votes: 1, required: 3 });
        assert_eq!(votes.vote(UserId::new(2), REQUESTER), SkipVote::Counted { votes: 2, required: 3 });
        let third = votes.vote(UserId::new(3), REQUESTER);
        assert_eq!(third, SkipVote::Passed { votes: 3 });
        assert!(third.triggers_skip());
    }

    #[test]
    fn repeated_vote_counts_once() {
        let mut votes = SkipVoteTracker::new(3);
        votes.vote(UserId::new(1), REQUESTER);
        assert_eq!(votes.vote(UserId::new(1), REQUESTER), SkipVote::AlreadyVoted { votes: 1, required: 3 });
        assert_eq!(votes.register_vote(UserId::new(1)), 1);
        assert_eq!(votes.count(), 1);
    }

    #[test]
    fn reset_forgets_voters() {
        let mut votes = SkipVoteTracker::default();
        votes.vote(UserId::new(1), REQUESTER);
        votes.reset();
        assert_eq!(votes.count(), 0);
        assert_eq!(votes.vote(UserId::new(1), REQUESTER), SkipVote::Counted { votes: 1, required: 3 });
    }

    #[test]
    fn zero_threshold_is_raised_to_one() {
        let mut votes = SkipVoteTracker::new(0);
        assert_eq!(votes.required(), 1);
        assert_eq!(votes.vote(UserId::new(1), REQUESTER), SkipVote::Passed { votes: 1 });
    }
}
