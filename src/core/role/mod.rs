mod atomic_flag;

pub use atomic_flag::*;


/// Role of a candidate in its election scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Follower,
    Leader,
}

impl Role {
    pub fn is_leader(self) -> bool {
        matches!(self, Role::Leader)
    }
}

impl From<bool> for Role {
    fn from(is_master: bool) -> Self {
        if is_master {
            Role::Leader
        } else {
            Role::Follower
        }
    }
}
