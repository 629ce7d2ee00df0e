//! Wizard change notifications.
//!
//! Subscribers get every event in emission order over an unbounded
//! channel. Dropped receivers are pruned on the next emit.

use super::phase::Phase;
use crate::credentials::CredentialState;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Sub-steps of an in-flight try-on, for progress display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryOnStage {
    FetchingProduct,
    EstimatingSize,
    GeneratingImage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEvent {
    PhaseChanged(Phase),
    LoadingChanged(bool),
    CredentialChanged(CredentialState),
    Progress(TryOnStage),
}

#[derive(Default)]
pub(super) struct EventHub {
    subscribers: Vec<UnboundedSender<WizardEvent>>,
}

impl EventHub {
    pub(super) fn subscribe(&mut self) -> UnboundedReceiver<WizardEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub(super) fn emit(&mut self, event: WizardEvent) {
        log::debug!("[WIZARD] Event: {:?}", event);
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_reach_every_live_subscriber_in_order() {
        let mut hub = EventHub::default();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.emit(WizardEvent::LoadingChanged(true));
        hub.emit(WizardEvent::PhaseChanged(Phase::Submitting));

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.try_recv().unwrap(), WizardEvent::LoadingChanged(true));
            assert_eq!(
                rx.try_recv().unwrap(),
                WizardEvent::PhaseChanged(Phase::Submitting)
            );
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut hub = EventHub::default();
        let rx = hub.subscribe();
        drop(rx);
        hub.emit(WizardEvent::LoadingChanged(false));
        assert!(hub.subscribers.is_empty());
    }
}
