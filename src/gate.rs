//! Process-wide operational switch

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Result, SuretyError};
use crate::events::{EventFeed, SuretyEvent};
use crate::models::Identity;

pub struct OperationalGate {
    admin: Identity,
    operational: AtomicBool,
    events: Arc<EventFeed>,
}

impl OperationalGate {
    pub fn new(admin: Identity, events: Arc<EventFeed>) -> Self {
        Self {
            admin,
            operational: AtomicBool::new(true),
            events,
        }
    }

    pub fn admin(&self) -> &Identity {
        &self.admin
    }

    pub fn is_admin(&self, caller: &Identity) -> bool {
        *caller == self.admin
    }

    pub fn is_operational(&self) -> bool {
        self.operational.load(Ordering::SeqCst)
    }

    /// Opens or closes the gate. Setting the current value again is a no-op.
    pub fn set_operational(&self, operational: bool, caller: &Identity) -> Result<()> {
        if !self.is_admin(caller) {
            warn!(%caller, "set_operational rejected: caller is not the administrator");
            return Err(SuretyError::Unauthorized);
        }

        let previous = self.operational.swap(operational, Ordering::SeqCst);
        if previous != operational {
            info!(operational, "operational status changed");
            self.events
                .publish(SuretyEvent::OperationalChanged { operational });
        }
        Ok(())
    }

    /// Entry guard for every mutating operation.
    pub fn require_operational(&self) -> Result<()> {
        if self.is_operational() {
            Ok(())
        } else {
            Err(SuretyError::SystemPaused)
        }
    }

    pub fn require_admin(&self, caller: &Identity) -> Result<()> {
        if self.is_admin(caller) {
            Ok(())
        } else {
            Err(SuretyError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn gate() -> OperationalGate {
        OperationalGate::new(Identity::from("GADMIN"), Arc::new(EventFeed::new(8)))
    }

    #[test]
    fn test_initially_operational() {
        let gate = gate();
        assert!(gate.is_operational());
        assert_eq!(gate.require_operational(), Ok(()));
    }

    #[test]
    fn test_only_admin_can_toggle() {
        let gate = gate();
        assert_eq!(
            gate.set_operational(false, &Identity::from("GSTRANGER")),
            Err(SuretyError::Unauthorized)
        );
        assert!(gate.is_operational());

        gate.set_operational(false, &Identity::from("GADMIN")).unwrap();
        assert!(!gate.is_operational());
        assert_eq!(gate.require_operational(), Err(SuretyError::SystemPaused));

        gate.set_operational(true, &Identity::from("GADMIN")).unwrap();
        assert!(gate.is_operational());
    }

    #[test]
    fn test_repeat_toggle_publishes_once() {
        let events = Arc::new(EventFeed::new(8));
        let gate = OperationalGate::new(Identity::from("GADMIN"), events.clone());
        gate.set_operational(false, &Identity::from("GADMIN")).unwrap();
        gate.set_operational(false, &Identity::from("GADMIN")).unwrap();
        assert_eq!(events.published(), 1);
    }
}
