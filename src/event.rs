//! Session events and the delta transform feeding the combine-upsert.

/// Wire values for the event kind column.
pub(crate) const PLUS_KIND: &str = "plus";
pub(crate) const MULTI_KIND: &str = "multi";

/// One immutable input record from the session event feed. `id` is the
/// feed's stable sort key; `user_id` is the aggregation key.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SessionEvent {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub amount: f64,
}

/// The `(adder, multiplier)` pair derived from one event and consumed by the
/// combine rule. Ephemeral: transformed and committed within one chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreDelta {
    pub user_id: i64,
    pub adder: f64,
    pub multiplier: f64,
}

/// An event whose kind is neither `plus` nor `multi`. Unrecoverable input
/// error: the owning worker aborts without committing its partial chunk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown session event kind `{kind}` in event {event_id}")]
pub struct UnknownKindError {
    pub event_id: i64,
    pub kind: String,
}

impl TryFrom<&SessionEvent> for ScoreDelta {
    type Error = UnknownKindError;

    fn try_from(event: &SessionEvent) -> Result<Self, Self::Error> {
        match event.kind.as_str() {
            PLUS_KIND => Ok(Self {
                user_id: event.user_id,
                adder: event.amount,
                multiplier: 1.0,
            }),
            MULTI_KIND => Ok(Self {
                user_id: event.user_id,
                adder: 0.0,
                multiplier: event.amount,
            }),
            _ => Err(UnknownKindError {
                event_id: event.id,
                kind: event.kind.clone(),
            }),
        }
    }
}
