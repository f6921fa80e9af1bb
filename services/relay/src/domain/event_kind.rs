/// Event kind classification and storage policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Regular events: stored by id
    /// kind 1, 4-44, 1000-9999
    Regular,

    /// Replaceable events: only the winner per pubkey+kind is kept
    /// kind 0, 3, 10000-19999
    Replaceable,

    /// Ephemeral events: accepted but never stored
    /// kind 20000-29999
    Ephemeral,

    /// Parameterized replaceable events: only the winner per pubkey+kind+d_tag is kept
    /// kind 30000-30999
    ParameterizedReplaceable,

    /// Everything else is refused with `kind: <n>`
    /// kind 2, 45-999, 31000-65535
    Rejected,
}

impl EventKind {
    /// Classify a kind into exactly one category
    pub fn classify(kind: u16) -> Self {
        match kind {
            1 | 4..=44 | 1000..=9999 => EventKind::Regular,
            0 | 3 | 10000..=19999 => EventKind::Replaceable,
            20000..=29999 => EventKind::Ephemeral,
            30000..=30999 => EventKind::ParameterizedReplaceable,
            _ => EventKind::Rejected,
        }
    }

    /// Check if this event kind should be stored
    pub fn should_store(&self) -> bool {
        !matches!(self, EventKind::Ephemeral | EventKind::Rejected)
    }

    /// Check if this event kind replaces existing events
    pub fn is_replaceable(&self) -> bool {
        matches!(
            self,
            EventKind::Replaceable | EventKind::ParameterizedReplaceable
        )
    }

    /// Check if the relay accepts this kind at all
    pub fn is_accepted(&self) -> bool {
        !matches!(self, EventKind::Rejected)
    }
}
