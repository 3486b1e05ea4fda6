use camfeed_db::models::stream::StreamState;

use crate::error::CoreError;

/// The legal transition table for a Stream's lifecycle. INITIALIZING is the
/// only entry state; CLOSED is terminal. ERROR can be reached from READY or
/// LIVE, and can itself recover back to INITIALIZING on restart.
pub fn is_legal_transition(from: StreamState, to: StreamState) -> bool {
    use StreamState::*;
    matches!(
        (from, to),
        (Initializing, Ready)
            | (Initializing, Error)
            | (Ready, Live)
            | (Ready, Error)
            | (Ready, Stopped)
            | (Live, Error)
            | (Live, Stopped)
            | (Error, Initializing)
            | (Error, Stopped)
            | (Stopped, Initializing)
            | (Stopped, Closed)
            | (Error, Closed)
    )
}

pub fn check_transition(
    stream_id: uuid::Uuid,
    from: StreamState,
    to: StreamState,
) -> Result<(), CoreError> {
    if is_legal_transition(from, to) {
        Ok(())
    } else {
        Err(CoreError::IllegalTransition {
            stream_id,
            from: from.as_str(),
            to: to.as_str(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StreamState::*;

    #[test]
    fn ready_to_live_is_legal() {
        assert!(is_legal_transition(Ready, Live));
    }

    #[test]
    fn live_to_ready_is_illegal() {
        assert!(!is_legal_transition(Live, Ready));
    }

    #[test]
    fn closed_is_terminal() {
        for state in [Initializing, Ready, Live, Error, Stopped, Closed] {
            assert!(!is_legal_transition(Closed, state));
        }
    }

    #[test]
    fn error_recovers_via_initializing() {
        assert!(is_legal_transition(Error, Initializing));
        assert!(!is_legal_transition(Error, Live));
    }
}
