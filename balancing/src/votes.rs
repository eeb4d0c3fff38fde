//! Latest-message vote state.
//!
//! One entry per validator holding its most recent vote. The fork-choice tally
//! only counts votes for the two competing chains.

use crate::ValidatorId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validator's latest vote
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Vote {
    /// Has not voted yet
    #[default]
    Never,
    /// Voted for genesis
    Genesis,
    /// Voted for the left chain
    Left,
    /// Voted for the right chain
    Right,
}

impl Vote {
    /// Chain this vote supports, if any
    pub fn side(self) -> Option<Side> {
        match self {
            Vote::Left => Some(Side::Left),
            Vote::Right => Some(Side::Right),
            Vote::Never | Vote::Genesis => None,
        }
    }
}

/// One of the two competing chains started by the equivocating proposer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn vote(self) -> Vote {
        match self {
            Side::Left => Vote::Left,
            Side::Right => Vote::Right,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "LEFT"),
            Side::Right => write!(f, "RIGHT"),
        }
    }
}

/// Latest votes for each chain
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Tally {
    pub left: usize,
    pub right: usize,
}

impl Tally {
    pub fn is_tied(&self) -> bool {
        self.left == self.right
    }

    /// Side with strictly more votes, `None` on a tie
    pub fn leading(&self) -> Option<Side> {
        match self.left.cmp(&self.right) {
            std::cmp::Ordering::Greater => Some(Side::Left),
            std::cmp::Ordering::Less => Some(Side::Right),
            std::cmp::Ordering::Equal => None,
        }
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.left, self.right)
    }
}

/// Global latest-message view, indexed by validator id.
///
/// Panics on ids outside `0..N`; ids always come from the committee schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteState {
    votes: Vec<Vote>,
}

impl VoteState {
    /// All validators start without a vote
    pub fn new(validators: usize) -> Self {
        Self {
            votes: vec![Vote::Never; validators],
        }
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn get(&self, id: ValidatorId) -> Vote {
        self.votes[id as usize]
    }

    /// Overwrite a validator's latest vote
    pub fn record(&mut self, id: ValidatorId, vote: Vote) {
        self.votes[id as usize] = vote;
    }

    pub fn tally(&self) -> Tally {
        self.votes.iter().fold(Tally::default(), |mut tally, vote| {
            match vote {
                Vote::Left => tally.left += 1,
                Vote::Right => tally.right += 1,
                Vote::Never | Vote::Genesis => {}
            }
            tally
        })
    }

    pub fn leading(&self) -> Option<Side> {
        self.tally().leading()
    }

    /// Copy of this state with one extra vote applied
    pub fn with_vote(&self, id: ValidatorId, vote: Vote) -> VoteState {
        let mut view = self.clone();
        view.record(id, vote);
        view
    }

    /// Validators whose latest vote is not [`Vote::Never`]
    pub fn voter_count(&self) -> usize {
        self.votes.iter().filter(|&&vote| vote != Vote::Never).count()
    }
}
