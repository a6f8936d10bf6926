use super::status::Status;

/// Why a status write was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected<S> {
    /// The new status is not after the current one.
    Stale { current: S },
    /// A sent status may never outrun the known status.
    AheadOfKnown { known: S },
}

/// The known/sent pair of one entity.
///
/// Both fields only ever move forward, and `sent <= known` holds after
/// every accepted write. This type carries no lock of its own; owners keep
/// it inside the same lock as the rest of their mutable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTracker<S> {
    known: S,
    sent: S,
}

impl<S: Status> Default for StatusTracker<S> {
    fn default() -> Self {
        Self {
            known: S::NONE,
            sent: S::NONE,
        }
    }
}

impl<S: Status> StatusTracker<S> {
    pub fn known(&self) -> S {
        self.known
    }

    pub fn sent(&self) -> S {
        self.sent
    }

    pub fn advance_known(&mut self, status: S) -> Result<S, Rejected<S>> {
        if !status.is_after(self.known) {
            return Err(Rejected::Stale {
                current: self.known,
            });
        }
        let previous = self.known;
        self.known = status;
        Ok(previous)
    }

    pub fn advance_sent(&mut self, status: S) -> Result<S, Rejected<S>> {
        if !status.is_after(self.sent) {
            return Err(Rejected::Stale { current: self.sent });
        }
        if status.is_after(self.known) {
            return Err(Rejected::AheadOfKnown { known: self.known });
        }
        let previous = self.sent;
        self.sent = status;
        Ok(previous)
    }

    /// The status still waiting for acknowledgment, if any.
    pub fn unsent(&self) -> Option<S> {
        self.known.is_after(self.sent).then_some(self.known)
    }

    /// Terminal and fully acknowledged.
    pub fn is_settled(&self) -> bool {
        self.known.is_terminal() && self.sent == self.known
    }
}
