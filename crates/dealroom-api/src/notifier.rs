use tokio::sync::broadcast;
use tracing::debug;

use dealroom_types::events::NotificationIntent;

/// Hands workflow notifications to whoever delivers them.
///
/// Every intent goes out on one broadcast channel; the delivery sink
/// subscribes there. Publishing never fails: with nobody listening, intents
/// are dropped.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<NotificationIntent>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationIntent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, intents: Vec<NotificationIntent>) {
        for intent in intents {
            debug!("notify {}: {:?}", intent.recipient_id, intent.event);
            let _ = self.tx.send(intent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealroom_types::events::NotificationEvent;
    use uuid::Uuid;

    fn review_intent(recipient_id: Uuid) -> NotificationIntent {
        NotificationIntent {
            recipient_id,
            event: NotificationEvent::ReviewReceived {
                deal_id: Uuid::new_v4(),
                review_id: Uuid::new_v4(),
                rating: 5,
            },
        }
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_intent_in_order() {
        let notifier = Notifier::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let mut sink = notifier.subscribe();
        let mut audit = notifier.clone().subscribe();

        notifier.publish(vec![review_intent(bob), review_intent(alice)]);

        assert_eq!(sink.recv().await.unwrap().recipient_id, bob);
        assert_eq!(sink.recv().await.unwrap().recipient_id, alice);
        assert!(matches!(
            audit.recv().await.unwrap().event,
            NotificationEvent::ReviewReceived { rating: 5, .. }
        ));
    }

    #[test]
    fn publishing_without_listeners_is_fine() {
        Notifier::new().publish(vec![review_intent(Uuid::new_v4())]);
    }
}
